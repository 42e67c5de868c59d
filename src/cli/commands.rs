//! CLI command implementations

use super::signals::with_shutdown;
use crate::chat::{ChatReply, ChatRequest, ChatService};
use crate::config::DoctorConfig;
use crate::llm::{LlmClient, create_client};
use crate::ocr::{OcrEngine, TesseractOcr};
use crate::server::{self, AppState};
use anyhow::{Context, Result};
use futures::StreamExt;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

/// Run the HTTP server until interrupted
pub async fn serve(config: DoctorConfig, base_dir: &Path) -> Result<i32> {
    let state = AppState::from_config(config, base_dir).await?;
    server::serve(state).await?;
    Ok(0)
}

/// Check that the LLM server, OCR engine and data files are usable
pub async fn doctor(config: &DoctorConfig, base_dir: &Path) -> Result<i32> {
    let llm = create_client(&config.llm).context("Failed to create LLM client")?;
    let ocr = TesseractOcr::from_config(&config.ocr);
    let mut out = std::io::stdout();
    Ok(doctor_with(config, base_dir, llm.as_ref(), &ocr, &mut out).await?)
}

pub(crate) async fn doctor_with(
    config: &DoctorConfig,
    base_dir: &Path,
    llm: &dyn LlmClient,
    ocr: &dyn OcrEngine,
    out: &mut impl Write,
) -> std::io::Result<i32> {
    let mut all_ok = true;

    writeln!(out, "Checking LLM server...")?;
    if llm.is_available().await {
        writeln!(out, "✓ {} (model: {})", config.llm.url, llm.model())?;
    } else {
        all_ok = false;
        writeln!(out, "✗ {} - not reachable", config.llm.url)?;
    }

    writeln!(out, "\nChecking OCR engine...")?;
    if !config.ocr.enabled {
        writeln!(out, "  (disabled)")?;
    } else if ocr.is_available().await {
        writeln!(out, "✓ {}", config.ocr.command)?;
    } else {
        all_ok = false;
        writeln!(out, "✗ {} - not found, uploads will not be analyzed", config.ocr.command)?;
    }

    writeln!(out, "\nChecking data files...")?;
    let paths = config.data.resolve(base_dir);
    for (label, path) in [
        ("symptom map", &paths.symptom_map),
        ("FAQ", &paths.faq),
        ("tips", &paths.tips),
        ("clinics", &paths.clinics),
        ("WHO data", &paths.who_data),
    ] {
        if path.exists() {
            writeln!(out, "✓ {}: {}", label, path.display())?;
        } else {
            writeln!(out, "  {}: {} (missing, treated as empty)", label, path.display())?;
        }
    }

    Ok(if all_ok { 0 } else { 1 })
}

/// Answer one message on the terminal, streaming the reply
pub async fn ask(
    config: &DoctorConfig,
    base_dir: &Path,
    message: &str,
    session: Option<String>,
) -> Result<i32> {
    let llm = create_client(&config.llm).context("Failed to create LLM client")?;
    let service = Arc::new(ChatService::new(config, base_dir, llm));

    let mut request = ChatRequest::new(message);
    request.session_id = session;

    let mut out = std::io::stdout();
    match with_shutdown(ask_with(&service, request, &mut out)).await {
        Some(result) => result,
        None => Ok(130),
    }
}

pub(crate) async fn ask_with(
    service: &Arc<ChatService>,
    request: ChatRequest,
    out: &mut impl Write,
) -> Result<i32> {
    match service.handle(request).await? {
        ChatReply::Json(value) => {
            let text = value["answer"]
                .as_str()
                .or_else(|| value["reply"].as_str())
                .unwrap_or_default();
            writeln!(out, "{}", text)?;
        }
        ChatReply::Stream(mut chunks) => {
            while let Some(chunk) = chunks.next().await {
                write!(out, "{}", chunk)?;
                out.flush()?;
            }
            writeln!(out)?;
        }
    }
    Ok(0)
}

/// Print the text found in an image
pub async fn ocr(config: &DoctorConfig, file: &Path) -> Result<i32> {
    let engine = TesseractOcr::from_config(&config.ocr);
    match engine.extract_text(file).await {
        Ok(text) => {
            println!("{}", text);
            Ok(0)
        }
        Err(e) => {
            eprintln!("✗ {}", e);
            Ok(1)
        }
    }
}
