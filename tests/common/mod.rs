// Shared by the integration test binaries
#![allow(dead_code)]

pub mod mock_upstream;

use std::net::TcpListener;

use actix_web::{App, HttpServer, web};
use omomuki_rs::app_state::AppState;
use omomuki_rs::config::{ServerConfig, UpstreamConfig};
use omomuki_rs::grammar::TagSet;
use omomuki_rs::render::{RenderEdit, RenderSurface, VisibleView};
use omomuki_rs::server;
use serde_json::Value;

use mock_upstream::MockUpstream;

pub const TEST_API_KEY: &str = "test-key";

/// Increments of a well-formed answer in the neutral vocabulary, split at
/// awkward places but never next to whitespace.
pub fn sample_deltas() -> Vec<String> {
    [
        "<summary>A quiet street",
        ".</summary>\n<findings>\n<fin",
        "ding><target>lantern</target><category>wabi-sabi</category>",
        "<reasoning>Moss softens the stone",
        ".</reasoning></finding>",
        "<finding><target>rain</target><category>yugen</category><reasoning>Half-seen</reasoning></finding></findings>",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

pub fn test_config(upstream: &MockUpstream) -> ServerConfig {
    ServerConfig {
        upstream: UpstreamConfig {
            base_url: upstream.base_url(),
            api_key: Some(TEST_API_KEY.to_string()),
            ..Default::default()
        },
        tags: TagSet::neutral(),
        ..Default::default()
    }
}

pub fn test_state(config: &ServerConfig) -> web::Data<AppState> {
    web::Data::new(AppState::new(config).expect("Failed to create AppState in test"))
}

/// Serve the real app on an ephemeral port and return its base URL.
pub fn spawn_app(config: &ServerConfig) -> String {
    let state = test_state(config);
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let server = HttpServer::new(move || App::new().configure(server::configure(state.clone())))
        .workers(1)
        .listen(listener)
        .unwrap()
        .run();
    actix_web::rt::spawn(server);

    format!("http://{}", addr)
}

/// Split a server-sent event body into `(event, data)` pairs.
pub fn parse_events(body: &[u8]) -> Vec<(String, Value)> {
    let text = String::from_utf8_lossy(body);
    text.split("\n\n")
        .filter(|block| !block.trim().is_empty())
        .map(|block| {
            let mut event = String::new();
            let mut data = String::new();
            for line in block.lines() {
                if let Some(rest) = line.strip_prefix("event:") {
                    event = rest.trim().to_string();
                } else if let Some(rest) = line.strip_prefix("data:") {
                    data = rest.trim().to_string();
                }
            }
            let data = serde_json::from_str(&data).unwrap_or(Value::Null);
            (event, data)
        })
        .collect()
}

/// Replay the `edit` events of a render stream onto a fresh view.
pub fn replay(events: &[(String, Value)]) -> VisibleView {
    let mut view = VisibleView::new();
    for (event, data) in events {
        match event.as_str() {
            "edit" => {
                let edit: RenderEdit = serde_json::from_value(data.clone()).unwrap();
                view.apply(&edit).unwrap();
            }
            "error" => {
                view.fail(data["error"].as_str().unwrap_or_default()).unwrap();
            }
            _ => {}
        }
    }
    view
}
