//! Three-level urgency classification by the LLM

use crate::llm::{GenerateRequest, LlmClient};
use serde::Serialize;
use std::time::Duration;

/// Severity bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TriageLevel {
    /// Call emergency services now
    Emergency = 1,
    /// See a doctor within 24 hours
    Urgent = 2,
    /// General advice
    Routine = 3,
}

impl TriageLevel {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Fixed instruction shown to the user for this level
    pub fn action(self) -> &'static str {
        match self {
            TriageLevel::Emergency => {
                "🚨 EMERGENCY! Call 108 or go to nearest hospital IMMEDIATELY. Do not wait."
            }
            TriageLevel::Urgent => "⚠️ URGENT: Contact a doctor or clinic within 24 hours.",
            TriageLevel::Routine => "General advice follows.",
        }
    }

    fn confidence(self) -> f64 {
        match self {
            TriageLevel::Emergency => 1.0,
            TriageLevel::Urgent => 0.8,
            TriageLevel::Routine => 0.5,
        }
    }
}

/// Outcome of classification
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Urgency {
    pub level: TriageLevel,
    pub action: String,
    pub confidence: f64,
    /// The model's one-line justification (empty for routine)
    pub reason: String,
}

impl Urgency {
    pub fn new(level: TriageLevel, reason: impl Into<String>) -> Self {
        let reason = match level {
            TriageLevel::Routine => String::new(),
            _ => reason.into(),
        };
        Self {
            level,
            action: level.action().to_string(),
            confidence: level.confidence(),
            reason,
        }
    }

    pub fn routine() -> Self {
        Self::new(TriageLevel::Routine, "")
    }

    /// Alert text to put in front of the chat prompt, for levels 1 and 2
    pub fn alert(&self) -> Option<String> {
        match self.level {
            TriageLevel::Routine => None,
            _ => Some(format!("{}\nReason: {}", self.action, self.reason)),
        }
    }
}

/// Read the level out of the model's answer (`LEVEL 1|2|3: ...`)
pub fn parse_level(answer: &str) -> TriageLevel {
    let upper = answer.to_uppercase();
    if upper.contains("LEVEL 1") {
        TriageLevel::Emergency
    } else if upper.contains("LEVEL 2") {
        TriageLevel::Urgent
    } else {
        TriageLevel::Routine
    }
}

/// Ask the model to classify; any failure is treated as routine
pub async fn classify_urgency(
    llm: &dyn LlmClient,
    prompt: &str,
    temperature: f32,
    timeout: Duration,
) -> Urgency {
    let request = GenerateRequest::new(prompt, temperature).with_timeout(timeout);
    match llm.generate(&request).await {
        Ok(reply) => {
            let answer = reply.text.trim();
            let level = parse_level(answer);
            tracing::info!(level = level.as_u8(), "urgency classified");
            Urgency::new(level, answer)
        }
        Err(e) => {
            tracing::warn!(error = %e, "urgency classification failed, assuming routine");
            Urgency::routine()
        }
    }
}
