//! Tesseract subprocess runner

use super::{OcrEngine, OcrError};
use crate::config::OcrConfig;
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};

/// Runs `<command> <image> stdout [args]` and captures the text
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    /// Executable to run
    command: String,

    /// Extra arguments after the output target
    args: Vec<String>,

    /// Maximum runtime
    timeout: Duration,

    /// Output is cut to this many characters
    max_chars: usize,
}

impl TesseractOcr {
    /// Create a runner from config
    pub fn from_config(config: &OcrConfig) -> Self {
        Self {
            command: config.command.clone(),
            args: config.args.clone(),
            timeout: Duration::from_secs(config.timeout),
            max_chars: config.max_chars,
        }
    }

    /// Create a runner with explicit parameters
    #[cfg(test)]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            timeout: Duration::from_secs(60),
            max_chars: 2000,
        }
    }

    #[cfg(test)]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[cfg(test)]
    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }

    fn build_command(&self, image: &Path) -> Command {
        let mut cmd = Command::new(&self.command);
        cmd.arg(image)
            .arg("stdout")
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

/// Read stdout and stderr concurrently so neither pipe can fill up and stall the child
async fn collect_output(child: &mut Child) -> Result<(String, String, Option<i32>), OcrError> {
    let stdout_pipe = child.stdout.take();
    let stderr_pipe = child.stderr.take();

    let stdout_fut = async move {
        let mut buf = Vec::new();
        if let Some(mut out) = stdout_pipe {
            out.read_to_end(&mut buf).await?;
        }
        Ok::<_, std::io::Error>(buf)
    };
    let stderr_fut = async move {
        let mut buf = Vec::new();
        if let Some(mut err) = stderr_pipe {
            err.read_to_end(&mut buf).await?;
        }
        Ok::<_, std::io::Error>(buf)
    };

    let (stdout, stderr) = tokio::try_join!(stdout_fut, stderr_fut)?;
    let status = child.wait().await?;

    Ok((
        String::from_utf8_lossy(&stdout).into_owned(),
        String::from_utf8_lossy(&stderr).into_owned(),
        if status.success() { Some(0) } else { status.code() },
    ))
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    async fn extract_text(&self, path: &Path) -> Result<String, OcrError> {
        let start = Instant::now();

        let mut child = self
            .build_command(path)
            .spawn()
            .map_err(|e| OcrError::Unavailable {
                message: format!("failed to spawn '{}': {}", self.command, e),
            })?;

        let (stdout, stderr, exit_code) =
            match tokio::time::timeout(self.timeout, collect_output(&mut child)).await {
                Ok(result) => result?,
                Err(_) => {
                    let _ = child.kill().await;
                    return Err(OcrError::Timeout {
                        elapsed: start.elapsed(),
                    });
                }
            };

        if exit_code != Some(0) {
            return Err(OcrError::Failed {
                exit_code,
                stderr: stderr.trim().to_string(),
            });
        }

        tracing::debug!(
            image = %path.display(),
            chars = stdout.chars().count(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "OCR finished"
        );

        Ok(stdout.chars().take(self.max_chars).collect())
    }

    async fn is_available(&self) -> bool {
        Command::new(&self.command)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }
}
