//! The chat pipeline: consent, enrichment, triage, generation

mod service;

pub use service::{ChatReply, ChatRequest, ChatService};
