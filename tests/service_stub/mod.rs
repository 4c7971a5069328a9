//! Fake Gemini, Bria and image host served from one local port.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;

use serde_json::{Value, json};

pub const GEMINI_KEY: &str = "gemini-test-key";
pub const BRIA_TOKEN: &str = "bria-test-token";
pub const MODEL: &str = "stub-model";
pub const STORY_TITLE: &str = "Moonlit Duel";

pub static PORTRAIT_PNG: &[u8] = &[
    137, 80, 78, 71, 13, 10, 26, 10, 0, 0, 0, 13, 73, 72, 68, 82, 0, 0, 0, 1, 0, 0, 0, 1, 8, 4, 0,
    0, 0, 181, 28, 12, 2, 0, 0, 0, 11, 73, 68, 65, 84, 120, 218, 99, 252, 255, 23, 0, 2, 3, 1, 128,
    110, 220, 25, 0, 0, 0, 0, 73, 69, 78, 68, 174, 66, 96, 130,
];

#[derive(Debug, Clone)]
pub struct StubCall {
    pub method: String,
    pub path: String,
    pub body: String,
}

impl StubCall {
    /// Request body as JSON; bodiless requests such as image downloads give `Null`.
    pub fn json(&self) -> Value {
        if self.body.trim().is_empty() {
            return Value::Null;
        }
        serde_json::from_str(&self.body).expect("stub call body is json")
    }

    /// First text part of a Gemini request.
    pub fn prompt(&self) -> String {
        self.json()
            .pointer("/contents/0/parts/0/text")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_owned()
    }
}

pub struct ServiceStub {
    pub base_url: String,
    calls: Arc<Mutex<Vec<StubCall>>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl ServiceStub {
    pub fn spawn() -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start service stub");
        let base_url = format!("http://{}", server.server_addr());
        let calls = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&calls);
        let image_counter = Arc::new(AtomicUsize::new(0));
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let image_base = base_url.clone();
        let handle = thread::spawn(move || {
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }
                let mut request = match server.recv_timeout(Duration::from_millis(50)) {
                    Ok(Some(req)) => req,
                    Ok(None) => continue,
                    Err(_) => break,
                };

                let mut body = String::new();
                let _ = request.as_reader().read_to_string(&mut body);
                let header = |name: &str| {
                    request
                        .headers()
                        .iter()
                        .find(|h| h.field.to_string().eq_ignore_ascii_case(name))
                        .map(|h| h.value.to_string())
                };
                let call = StubCall {
                    method: request.method().to_string(),
                    path: request.url().to_owned(),
                    body,
                };

                let response = if call.path.ends_with(":generateContent") {
                    if header("x-goog-api-key").as_deref() != Some(GEMINI_KEY) {
                        json_response(403, json!({"error": {"message": "API key not valid"}}))
                    } else {
                        gemini_response(&call)
                    }
                } else if call.path == "/bria/generate" {
                    if header("api_token").as_deref() != Some(BRIA_TOKEN) {
                        json_response(401, json!({"message": "unauthorized"}))
                    } else {
                        let n = image_counter.fetch_add(1, Ordering::SeqCst) + 1;
                        json_response(
                            200,
                            json!({"result": {"image_url": format!("{image_base}/images/{n}.png"), "seed": n}}),
                        )
                    }
                } else if call.path.starts_with("/images/") {
                    let content_type =
                        tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"image/png"[..])
                            .expect("content-type header");
                    tiny_http::Response::from_data(PORTRAIT_PNG.to_vec())
                        .with_header(content_type)
                        .boxed()
                } else {
                    tiny_http::Response::from_string("not found")
                        .with_status_code(404)
                        .boxed()
                };

                recorded.lock().expect("lock stub calls").push(call);
                let _ = request.respond(response);
            }
        });

        Self {
            base_url,
            calls,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    pub fn gemini_base_url(&self) -> String {
        format!("{}/v1beta", self.base_url)
    }

    pub fn bria_url(&self) -> String {
        format!("{}/bria/generate", self.base_url)
    }

    /// Environment that points the binaries at this stub.
    pub fn env(&self) -> Vec<(&'static str, String)> {
        vec![
            ("GOOGLE_API_KEY", GEMINI_KEY.to_owned()),
            ("BRIA_API_TOKEN", BRIA_TOKEN.to_owned()),
            ("VISIONFORGE_GEMINI_BASE_URL", self.gemini_base_url()),
            ("VISIONFORGE_GEMINI_MODEL", MODEL.to_owned()),
            ("VISIONFORGE_BRIA_URL", self.bria_url()),
            ("VISIONFORGE_HTTP_TIMEOUT_SECS", "10".to_owned()),
        ]
    }

    pub fn calls(&self) -> Vec<StubCall> {
        self.calls.lock().expect("lock stub calls").clone()
    }

    pub fn bria_prompts(&self) -> Vec<String> {
        self.calls()
            .iter()
            .filter(|c| c.path == "/bria/generate")
            .map(|c| {
                c.json()
                    .get("prompt")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_owned()
            })
            .collect()
    }
}

impl Drop for ServiceStub {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn json_response(status: u16, value: Value) -> tiny_http::ResponseBox {
    let content_type =
        tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
            .expect("content-type header");
    tiny_http::Response::from_string(value.to_string())
        .with_status_code(status)
        .with_header(content_type)
        .boxed()
}

fn candidate(text: &str) -> tiny_http::ResponseBox {
    json_response(
        200,
        json!({"candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}]}),
    )
}

fn gemini_response(call: &StubCall) -> tiny_http::ResponseBox {
    let prompt = call.prompt();
    if prompt.contains("Return ONLY the title") {
        return candidate(&format!("\"{STORY_TITLE}\""));
    }
    if prompt.contains("STORY TO ANALYZE:") {
        return candidate(&parsed_story().to_string());
    }
    if let Some(name) = prompt
        .lines()
        .find_map(|line| line.strip_prefix("CHARACTER NAME: "))
    {
        return candidate(&character_dna(name.trim()).to_string());
    }
    if prompt.contains("SCENE TO SCRIPT:") {
        let dialogs = json!({"dialogs": [
            {"speaker": "NARRATOR", "text": "The bridge creaks.", "type": "narration"},
            {"speaker": "Kaito", "text": "Stand aside.", "type": "speech"}
        ]});
        return candidate(&format!("```json\n{dialogs}\n```"));
    }
    json_response(400, json!({"error": {"message": "unknown prompt"}}))
}

fn parsed_story() -> Value {
    json!({
        "characters": [
            {"id": "char_01", "name": "Kaito", "description": "young swordsman with silver hair"},
            {"id": "char_02", "name": "Yuki", "description": "calm archer with black hair"}
        ],
        "scenes": [
            {
                "id": "scene_01",
                "title": "The Bridge",
                "description": "Kaito waits on the bridge",
                "visual_direction": "moonlit wooden bridge, low angle",
                "characters_present": ["char_01"]
            },
            {
                "id": "scene_02",
                "title": "The Duel",
                "description": "Kaito faces Yuki",
                "visual_direction": "falling petals, wide shot",
                "characters_present": ["char_01", "char_02"]
            }
        ]
    })
}

fn character_dna(name: &str) -> Value {
    let (hair, outfit) = match name {
        "Kaito" => ("silver", "dark blue haori"),
        _ => ("black", "white hunting coat"),
    };
    json!({
        "name": name,
        "physical_features": {
            "hair": {"color": hair, "style": "long", "texture": "none"},
            "eyes": {"color": "amber", "shape": "sharp", "features": "none"},
            "face": {"structure": "angular", "skin_tone": "fair", "distinctive_marks": "none"},
            "body": {"build": "lean", "height_impression": "tall", "posture": "upright"}
        },
        "clothing": {"default_outfit": outfit, "accessories": ["none"], "weapons": "none"},
        "style_attributes": {"art_style": "anime", "shading": "cel", "color_palette": ["#112233"]},
        "personality_visual_cues": {"default_expression": "focused", "stance": "ready"}
    })
}
