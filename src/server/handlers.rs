//! Chat, health and index handlers

use super::AppState;
use crate::chat::{ChatReply, ChatRequest};
use crate::error::ApiError;
use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::header;
use axum::response::{Html, IntoResponse, Response};
use futures::StreamExt;
use serde_json::{Value, json};
use std::convert::Infallible;

/// One NDJSON line carrying a reply chunk
fn reply_line(chunk: &str) -> String {
    format!("{}\n", json!({ "reply": chunk }))
}

/// `POST /chat`
pub async fn chat(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;

    match state.chat.handle(request).await? {
        ChatReply::Json(value) => Ok(Json(value).into_response()),
        ChatReply::Stream(chunks) => {
            let lines = chunks.map(|chunk| Ok::<_, Infallible>(reply_line(&chunk)));
            Ok((
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                Body::from_stream(lines),
            )
                .into_response())
        }
    }
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "ollama": state.config.llm.url,
        "model": state.config.llm.model,
        "ocr": state.ocr_available,
    }))
}

/// `GET /`
pub async fn index(State(state): State<AppState>) -> Result<Html<String>, ApiError> {
    let path = state.static_dir.join("index.html");
    match tokio::fs::read_to_string(&path).await {
        Ok(page) => Ok(Html(page)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ApiError::NotFound),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::DISCLAIMER;
    use crate::server::testing::{spawn, state};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_health() {
        let dir = TempDir::new().unwrap();
        let base = spawn(state(dir.path(), true, false)).await;

        let body: Value = reqwest::get(format!("{}/health", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["model"], "llama3:8b");
        assert_eq!(body["ollama"], "http://localhost:11434/api/generate");
        assert_eq!(body["ocr"], false);
    }

    #[tokio::test]
    async fn test_chat_streams_ndjson() {
        let dir = TempDir::new().unwrap();
        let base = spawn(state(dir.path(), false, false)).await;

        let response = reqwest::Client::new()
            .post(format!("{}/chat", base))
            .json(&json!({ "message": "how do statins work" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        assert!(
            response.headers()[header::CONTENT_TYPE]
                .to_str()
                .unwrap()
                .starts_with("text/plain")
        );

        let text = response.text().await.unwrap();
        let replies: Vec<String> = text
            .lines()
            .map(|line| {
                let v: Value = serde_json::from_str(line).unwrap();
                v["reply"].as_str().unwrap().to_string()
            })
            .collect();
        assert_eq!(replies[0], "Hello ");
        assert_eq!(replies[1], "there.");
        assert!(replies.last().unwrap().contains(DISCLAIMER));
    }

    #[tokio::test]
    async fn test_chat_consent_flow() {
        let dir = TempDir::new().unwrap();
        let base = spawn(state(dir.path(), true, false)).await;
        let client = reqwest::Client::new();

        let first: Value = client
            .post(format!("{}/chat", base))
            .json(&json!({ "message": "my heart races" }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(first["requires_consent"], true);

        let second: Value = client
            .post(format!("{}/chat", base))
            .json(&json!({ "message": "yes" }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(second["answer"].as_str().unwrap().starts_with("Consent noted."));
    }

    #[tokio::test]
    async fn test_chat_empty_message() {
        let dir = TempDir::new().unwrap();
        let base = spawn(state(dir.path(), true, false)).await;

        let body: Value = reqwest::Client::new()
            .post(format!("{}/chat", base))
            .json(&json!({}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(body["reply"].as_str().unwrap().starts_with("Please enter a message."));
    }

    #[tokio::test]
    async fn test_chat_malformed_json() {
        let dir = TempDir::new().unwrap();
        let base = spawn(state(dir.path(), true, false)).await;

        let response = reqwest::Client::new()
            .post(format!("{}/chat", base))
            .header("content-type", "application/json")
            .body("{not json")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
        let body: Value = response.json().await.unwrap();
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_index_page() {
        let dir = TempDir::new().unwrap();
        let base = spawn(state(dir.path(), true, false)).await;

        let missing = reqwest::get(format!("{}/", base)).await.unwrap();
        assert_eq!(missing.status(), 404);

        std::fs::write(dir.path().join("index.html"), "<h1>DoctorAI</h1>").unwrap();
        let page = reqwest::get(format!("{}/", base)).await.unwrap();
        assert_eq!(page.status(), 200);
        assert_eq!(page.text().await.unwrap(), "<h1>DoctorAI</h1>");
    }

    #[tokio::test]
    async fn test_static_assets() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("js")).unwrap();
        std::fs::write(dir.path().join("js/app.js"), "console.log('chat');").unwrap();
        let base = spawn(state(dir.path(), true, false)).await;

        let script = reqwest::get(format!("{}/js/app.js", base)).await.unwrap();
        assert_eq!(script.status(), 200);
        assert!(
            script.headers()["content-type"]
                .to_str()
                .unwrap()
                .contains("javascript")
        );
        assert_eq!(script.text().await.unwrap(), "console.log('chat');");

        let missing = reqwest::get(format!("{}/missing.css", base)).await.unwrap();
        assert_eq!(missing.status(), 404);

        let escape = reqwest::get(format!("{}/..%2F..%2Fetc%2Fpasswd", base)).await.unwrap();
        assert_eq!(escape.status(), 404);
    }
}
