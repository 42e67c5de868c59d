//! CLI module for doctor-ai
//!
//! This module provides:
//! - Command implementations (serve, doctor, ask, ocr)
//! - Signal handling for graceful shutdown

pub mod commands;
pub mod signals;
