//! Data directory layout and session settings

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Where lookup tables, mutable state and uploads live
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct DataConfig {
    /// Base directory; relative paths below resolve against it
    pub root: String,

    /// Directory holding the lookup tables, cache and session memory
    pub local_db: String,

    /// WHO guideline table
    pub who_data: String,

    /// Upload directory
    pub uploads: String,

    /// Cached replies older than this are ignored
    pub cache_ttl_secs: u64,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            root: ".".into(),
            local_db: "local_db".into(),
            who_data: "data_sources/who_cardiology_data.json".into(),
            uploads: "uploads".into(),
            cache_ttl_secs: 3600,
        }
    }
}

/// Session memory and audit log settings
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct SessionConfig {
    /// Ask for consent before answering anything
    pub require_consent: bool,

    /// Questions remembered per consenting session
    pub history_limit: usize,

    /// Audit entries kept in the session file
    pub audit_limit: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            require_consent: true,
            history_limit: 5,
            audit_limit: 100,
        }
    }
}

/// Fully resolved file locations
#[derive(Debug, Clone)]
pub struct DataPaths {
    pub symptom_map: PathBuf,
    pub faq: PathBuf,
    pub tips: PathBuf,
    pub clinics: PathBuf,
    pub who_data: PathBuf,
    pub cache: PathBuf,
    pub session: PathBuf,
    pub uploads: PathBuf,
}

impl DataConfig {
    /// Resolve all paths against `base` (the project directory)
    pub fn resolve(&self, base: &Path) -> DataPaths {
        let root = resolve_path(base, &self.root);
        let local_db = resolve_path(&root, &self.local_db);

        DataPaths {
            symptom_map: local_db.join("symptom_disease_map.json"),
            faq: local_db.join("cardio_faq.json"),
            tips: local_db.join("cardio_tips.json"),
            clinics: local_db.join("clinics.json"),
            cache: local_db.join("ai_cache.json"),
            session: local_db.join("session_memory.json"),
            who_data: resolve_path(&root, &self.who_data),
            uploads: resolve_path(&root, &self.uploads),
        }
    }
}

fn resolve_path(base: &Path, raw: &str) -> PathBuf {
    let expanded = PathBuf::from(shellexpand::tilde(raw).as_ref());
    if expanded.is_absolute() {
        expanded
    } else {
        base.join(expanded)
    }
}
