//! Matching user text against the lookup tables

use super::tables::KnowledgeBase;
use serde::Serialize;
use serde_json::Value;

/// FAQ matches must score above this (0-100)
const FAQ_THRESHOLD: u8 = 60;

/// Where a finding came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingSource {
    Faq,
    Tip,
    Clinics,
    Who,
}

/// A curated fact relevant to the user's message
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    pub source: FindingSource,
    pub answer: String,
    pub confidence: f64,
}

/// Indel similarity of two strings on a 0-100 scale
///
/// `2 * matches / (len(a) + len(b))`, so extra trailing words cost less than
/// they would under an edit distance.
pub fn fuzzy_ratio(a: &str, b: &str) -> u8 {
    (rapidfuzz::fuzz::ratio(a.chars(), b.chars()) * 100.0).round() as u8
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

impl KnowledgeBase {
    /// Every symptom phrase contained in `text`, with its possible conditions
    ///
    /// Formatted as `'<symptom>': possible -> a, b` joined by `; `.
    pub fn match_symptoms(&self, text: &str) -> Option<String> {
        let lower = text.to_lowercase();
        let lines: Vec<String> = self
            .symptoms
            .iter()
            .filter(|(symptom, _)| lower.contains(&symptom.to_lowercase()))
            .map(|(symptom, conditions)| {
                format!("'{}': possible -> {}", symptom, conditions.join(", "))
            })
            .collect();

        if lines.is_empty() {
            None
        } else {
            Some(lines.join("; "))
        }
    }

    /// Best local answer: fuzzy FAQ hit, then a tip keyword, then the clinic list
    pub fn check_local_db(&self, text: &str) -> Option<Finding> {
        let lower = text.to_lowercase();

        let best_faq = self
            .faq
            .iter()
            .map(|(question, answer)| (fuzzy_ratio(&question.to_lowercase(), &lower), answer))
            .fold(None::<(u8, &String)>, |best, (score, answer)| match best {
                Some((best_score, _)) if best_score >= score => best,
                _ => Some((score, answer)),
            });

        if let Some((score, answer)) = best_faq {
            tracing::debug!(score, "best FAQ match");
            if score > FAQ_THRESHOLD {
                return Some(Finding {
                    source: FindingSource::Faq,
                    answer: answer.clone(),
                    confidence: round2(f64::from(score) / 100.0),
                });
            }
        }

        if let Some(tip) = self
            .tips
            .iter()
            .find(|(key, _)| lower.contains(&key.to_lowercase()))
            .map(|(_, tip)| tip)
        {
            return Some(Finding {
                source: FindingSource::Tip,
                answer: tip.clone(),
                confidence: 0.8,
            });
        }

        if (lower.contains("clinic") || lower.contains("hospital")) && !self.clinics.is_empty() {
            let listed: Vec<String> = self
                .clinics
                .iter()
                .map(|c| format!("{} ({})", c.name, c.phone.as_deref().unwrap_or("N/A")))
                .collect();
            return Some(Finding {
                source: FindingSource::Clinics,
                answer: format!(
                    "Here are some local cardiology clinics: {}",
                    listed.join(", ")
                ),
                confidence: 0.7,
            });
        }

        None
    }

    /// First WHO guideline whose condition is mentioned in `text`
    pub fn check_who_data(&self, text: &str) -> Option<Finding> {
        let lower = text.to_lowercase();
        self.who
            .iter()
            .find(|(condition, _)| lower.contains(&condition.to_lowercase()))
            .map(|(_, info)| Finding {
                source: FindingSource::Who,
                answer: match info {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                },
                confidence: 0.85,
            })
    }

    /// All enrichment lines for a prompt, in a fixed order
    pub fn gather(&self, text: &str) -> Vec<String> {
        let mut info = Vec::new();
        if let Some(symptoms) = self.match_symptoms(text) {
            info.push(format!("Symptom matcher: {}", symptoms));
        }
        if let Some(local) = self.check_local_db(text) {
            info.push(format!("Local DB info: {}", local.answer));
        }
        if let Some(who) = self.check_who_data(text) {
            info.push(format!("WHO data: {}", who.answer));
        }
        info
    }
}
