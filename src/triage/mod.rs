//! Emergency detection and urgency classification
//!
//! A cheap keyword screen decides whether a message might describe a cardiac
//! emergency; only then is the LLM asked to place it in one of three levels.

mod classify;
mod emergency;

pub use classify::{Urgency, classify_urgency};
pub use emergency::is_potential_emergency;
