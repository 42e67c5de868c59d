//! Keyword screen for possible cardiac emergencies

use regex::RegexSet;
use std::sync::LazyLock;

/// Symptom groups (AHA 2025 / ESC 2024 presentations), matched
/// case-insensitively anywhere in the message so inflections like "chest pains"
/// or "fainted" still hit. Only the short abbreviations are word-bounded.
const EMERGENCY_PATTERNS: &[&str] = &[
    // core cardiac symptoms
    r"chest pain|chest discomfort|angina|pressure in chest|tightness in chest|burning in chest|heavy chest|squeezing chest",
    r"shortness of breath|difficulty breathing|\bsob\b|breathless|can'?t breathe|gasping for air|trouble breathing",
    r"heart attack|myocardial infarction|\bmi\b|cardiac arrest",
    r"severe pain|unbearable pain|excruciating pain|radiating to arm|radiating to jaw|radiating to neck|radiating to back|pain in shoulder blade|arm numbness",
    // associated symptoms
    r"nausea|vomiting|vomit|cold sweat|clammy sweat|excessive sweating|lightheaded|dizzy|faint|fainting|confusion|disorientation|extreme fatigue|severe tiredness",
    r"irregular heartbeat|palpitations severe|fast heartbeat|racing heart|heart skipping beats|passing out|loss of consciousness|syncope|blackout",
    // urgency and duration modifiers
    r"sudden(ly)?|acute|worsening fast|rapid worsening|for ([0-9]+ )?(minutes|minuts?|hours?)|lasting long|persistent|ongoing for a while",
    // atypical presentations
    r"unusual fatigue|extreme tiredness|jaw pain|upper back pain|stomach pain|epigastric pain|indigestion|heartburn feeling|mid-back pain|shoulder discomfort",
    // aortic dissection, pulmonary embolism, tamponade
    r"sudden severe back pain|ripping pain|tearing pain|chest and back pain|sharp chest pain sudden|pulmonary embolism|lung clot|blood clot in lung",
    r"swelling in legs|edema|leg swelling|ankle swelling|blue lips|cyanosis|bluish skin|rapid breathing|tachypnea",
    // stroke overlap
    r"sudden weakness|arm weakness|face drooping|slurred speech|difficulty speaking|stroke symptoms|sudden numbness",
    // heart failure
    r"swollen ankles|feet swelling|difficulty breathing lying down|orthopnea|waking up breathless|paroxysmal nocturnal dyspnea|coughing at night|pink frothy sputum",
];

static EMERGENCY_SET: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new(
        EMERGENCY_PATTERNS
            .iter()
            .map(|group| format!("(?i)(?:{})", group)),
    )
    .unwrap()
});

/// True if `message` mentions anything from the emergency symptom groups
pub fn is_potential_emergency(message: &str) -> bool {
    EMERGENCY_SET.is_match(message)
}
