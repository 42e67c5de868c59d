//! Curated cardiology tables and the string matching over them

mod matcher;
mod tables;

pub use tables::KnowledgeBase;
