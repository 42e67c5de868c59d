//! Configuration types and loading for doctor-ai

mod data;
mod llm;
mod loader;
mod ocr;

pub use data::{DataConfig, DataPaths, SessionConfig};
pub use llm::LlmConfig;
pub use loader::DoctorConfig;
pub use ocr::OcrConfig;
