//! Mock OpenAI-compatible upstream for testing

#![allow(dead_code)]

use std::net::{SocketAddr, TcpListener};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use actix_web::dev::ServerHandle;
use actix_web::{App, HttpRequest, HttpResponse, HttpServer, http::StatusCode, web};
use bytes::Bytes;
use futures_util::stream::{self, StreamExt};
use serde_json::{Value, json};

/// What the mock does with every chat-completion request.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Stream each string as one content delta, then `[DONE]`.
    Stream(Vec<String>),
    /// Stream the deltas, then break the connection.
    StreamThenDrop(Vec<String>),
    /// Answer with this status and a JSON error body.
    Status(u16),
}

/// A request as the mock received it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub authorization: Option<String>,
    pub body: Value,
}

struct MockState {
    behavior: MockBehavior,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

pub struct MockUpstream {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    handle: ServerHandle,
}

impl MockUpstream {
    pub async fn start(behavior: MockBehavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));

        let state = web::Data::new(MockState {
            behavior,
            requests: requests.clone(),
        });

        let server = HttpServer::new(move || {
            App::new()
                .app_data(state.clone())
                .route("/v1/chat/completions", web::post().to(mock_chat_completions))
        })
        .workers(1)
        .listen(listener)
        .unwrap()
        .run();

        let handle = server.handle();
        actix_web::rt::spawn(server);

        Self {
            addr,
            requests,
            handle,
        }
    }

    /// Base URL including the `/v1` prefix
    pub fn base_url(&self) -> String {
        format!("http://{}/v1", self.addr)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub async fn stop(self) {
        self.handle.stop(true).await;
    }
}

fn chunk(content: &str) -> Bytes {
    let chunk = json!({
        "id": "chatcmpl-mock",
        "object": "chat.completion.chunk",
        "model": "mock-model",
        "choices": [{
            "index": 0,
            "delta": {"content": content},
            "finish_reason": null
        }]
    });
    Bytes::from(format!("data: {}\n\n", chunk))
}

async fn mock_chat_completions(
    req: HttpRequest,
    body: web::Json<Value>,
    state: web::Data<MockState>,
) -> HttpResponse {
    state.requests.lock().unwrap().push(RecordedRequest {
        authorization: req
            .headers()
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body: body.into_inner(),
    });

    match &state.behavior {
        MockBehavior::Status(code) => {
            let status = StatusCode::from_u16(*code).unwrap();
            HttpResponse::build(status).json(json!({"error": {"message": "mock failure"}}))
        }
        MockBehavior::Stream(deltas) => {
            let mut frames: Vec<Bytes> = deltas.iter().map(|d| chunk(d)).collect();
            frames.push(Bytes::from_static(b"data: [DONE]\n\n"));
            HttpResponse::Ok()
                .content_type("text/event-stream")
                .streaming(stream::iter(frames.into_iter().map(Ok::<_, actix_web::Error>)))
        }
        MockBehavior::StreamThenDrop(deltas) => {
            let frames: Vec<Bytes> = deltas.iter().map(|d| chunk(d)).collect();
            // Pause so the frames are flushed before the connection breaks
            let broken = stream::once(async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Err(actix_web::error::ErrorInternalServerError("connection lost"))
            });
            HttpResponse::Ok()
                .content_type("text/event-stream")
                .streaming(
                    stream::iter(frames.into_iter().map(Ok::<_, actix_web::Error>)).chain(broken),
                )
        }
    }
}
