//! Static lookup tables loaded from JSON

use crate::config::DataPaths;
use crate::store::load_or_default;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A cardiology clinic from the local directory
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Clinic {
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

/// All curated tables used to enrich prompts
///
/// Ordered maps keep "first match" lookups stable across runs.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeBase {
    /// symptom phrase → possible conditions
    pub symptoms: BTreeMap<String, Vec<String>>,

    /// question → answer
    pub faq: BTreeMap<String, String>,

    /// keyword → tip
    pub tips: BTreeMap<String, String>,

    pub clinics: Vec<Clinic>,

    /// condition → guideline (text or structured)
    pub who: BTreeMap<String, Value>,
}

impl KnowledgeBase {
    /// Load every table; missing or malformed files come back empty
    pub async fn load(paths: &DataPaths) -> Self {
        let (symptoms, faq, tips, clinics, who) = tokio::join!(
            load_or_default::<BTreeMap<String, Vec<String>>>(&paths.symptom_map),
            load_or_default::<BTreeMap<String, String>>(&paths.faq),
            load_or_default::<BTreeMap<String, String>>(&paths.tips),
            load_or_default::<Vec<Clinic>>(&paths.clinics),
            load_or_default::<BTreeMap<String, Value>>(&paths.who_data),
        );

        let kb = Self {
            symptoms,
            faq,
            tips,
            clinics,
            who,
        };
        tracing::debug!(
            symptoms = kb.symptoms.len(),
            faq = kb.faq.len(),
            tips = kb.tips.len(),
            clinics = kb.clinics.len(),
            who = kb.who.len(),
            "knowledge tables loaded"
        );
        kb
    }
}
