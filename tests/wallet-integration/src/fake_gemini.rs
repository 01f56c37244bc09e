//! A stand-in for the Gemini `generateContent` endpoint.
//!
//! Replies are served in order; the last one repeats once the queue runs dry.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Router;

#[derive(Clone)]
struct Script {
    replies: Arc<Mutex<VecDeque<(StatusCode, String)>>>,
    hits: Arc<AtomicUsize>,
    keys: Arc<Mutex<Vec<String>>>,
    bodies: Arc<Mutex<Vec<serde_json::Value>>>,
}

pub struct FakeGemini {
    pub base_url: String,
    script: Script,
}

impl FakeGemini {
    pub async fn start(replies: Vec<(StatusCode, String)>) -> Self {
        let script = Script {
            replies: Arc::new(Mutex::new(replies.into())),
            hits: Arc::new(AtomicUsize::new(0)),
            keys: Arc::new(Mutex::new(Vec::new())),
            bodies: Arc::new(Mutex::new(Vec::new())),
        };
        let app = Router::new().fallback(reply).with_state(script.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake Gemini listener");
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self {
            base_url: format!("http://{addr}"),
            script,
        }
    }

    pub fn hits(&self) -> usize {
        self.script.hits.load(Ordering::SeqCst)
    }

    pub fn api_keys_seen(&self) -> Vec<String> {
        self.script.keys.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> Option<serde_json::Value> {
        self.script.bodies.lock().unwrap().last().cloned()
    }
}

async fn reply(State(script): State<Script>, headers: HeaderMap, body: String) -> impl IntoResponse {
    script.hits.fetch_add(1, Ordering::SeqCst);
    if let Some(key) = headers.get("x-goog-api-key").and_then(|v| v.to_str().ok()) {
        script.keys.lock().unwrap().push(key.to_string());
    }
    if let Ok(json) = serde_json::from_str(&body) {
        script.bodies.lock().unwrap().push(json);
    }
    let mut replies = script.replies.lock().unwrap();
    let next = if replies.len() > 1 {
        replies.pop_front()
    } else {
        replies.front().cloned()
    };
    let (status, body) = next.unwrap_or((StatusCode::INTERNAL_SERVER_ERROR, String::new()));
    (status, [("content-type", "application/json")], body)
}

/// A successful `generateContent` body whose only text part is `text`.
pub fn model_reply(text: &str) -> String {
    serde_json::json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": text }] }
        }]
    })
    .to_string()
}
