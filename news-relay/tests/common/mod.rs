#![allow(dead_code)]

use async_trait::async_trait;
use news_relay::types::{ChatMessage, PublishError, RelayError, Result, SendOptions, SourceSpec};
use news_relay::{DocumentSource, ExtractorRegistry, Inbox, Pipeline, Publisher, Transport};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::time::Instant;

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub const CHANNEL: &str = "@zakarpattia_news";

pub fn source(name: &str, endpoint: &str) -> SourceSpec {
    SourceSpec {
        name: name.to_string(),
        endpoint: endpoint.to_string(),
    }
}

/// RSS 2.0 document with `(title, link)` items in the given order.
pub fn rss(items: &[(&str, &str)]) -> String {
    let body: String = items
        .iter()
        .map(|(title, link)| format!("<item><title>{}</title><link>{}</link></item>", title, link))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><rss version="2.0"><channel><title>Test</title>{}</channel></rss>"#,
        body
    )
}

/// Serves fixed documents by endpoint. Unknown endpoints fail like a dead host.
#[derive(Default)]
pub struct StaticDocuments {
    docs: Mutex<HashMap<String, String>>,
}

impl StaticDocuments {
    pub fn with(self, endpoint: &str, body: String) -> Self {
        self.set(endpoint, body);
        self
    }

    pub fn set(&self, endpoint: &str, body: String) {
        self.docs.lock().unwrap().insert(endpoint.to_string(), body);
    }
}

#[async_trait]
impl DocumentSource for StaticDocuments {
    async fn fetch(&self, source: &SourceSpec) -> Result<String> {
        self.docs
            .lock()
            .unwrap()
            .get(&source.endpoint)
            .cloned()
            .ok_or_else(|| RelayError::Fetch {
                source_name: source.name.clone(),
                reason: "connection refused".to_string(),
            })
    }
}

#[derive(Debug, Clone)]
pub struct Sent {
    pub channel: String,
    pub text: String,
    pub options: SendOptions,
    pub at: Instant,
}

/// Records every send. Texts containing a url in `failing` are rejected.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    pub sent: Arc<Mutex<Vec<Sent>>>,
    pub failing: Arc<Mutex<HashSet<String>>>,
    pub interrupt_after_first: Arc<Mutex<Option<watch::Sender<bool>>>>,
}

impl RecordingTransport {
    pub fn fail_on(&self, url: &str) {
        self.failing.lock().unwrap().insert(url.to_string());
    }

    pub fn heal(&self) {
        self.failing.lock().unwrap().clear();
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|s| s.text.clone()).collect()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    /// Urls of successful sends, in send order.
    pub fn urls(&self) -> Vec<String> {
        self.texts()
            .iter()
            .filter_map(|t| t.lines().find(|l| l.starts_with("http")).map(str::to_string))
            .collect()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, channel: &str, text: &str, options: SendOptions) -> std::result::Result<(), PublishError> {
        let failing = self.failing.lock().unwrap().iter().any(|url| text.lines().any(|l| l == url));
        if failing {
            return Err(PublishError::Network("connection reset".to_string()));
        }

        self.sent.lock().unwrap().push(Sent {
            channel: channel.to_string(),
            text: text.to_string(),
            options,
            at: Instant::now(),
        });

        if let Some(tx) = self.interrupt_after_first.lock().unwrap().take() {
            let _ = tx.send(true);
        }
        Ok(())
    }
}

pub fn pipeline(sources: Vec<SourceSpec>, docs: StaticDocuments, max_items: usize) -> Pipeline<StaticDocuments> {
    Pipeline::new(sources, docs, ExtractorRegistry::with_default_routes(), CHANNEL, max_items)
}

pub fn publisher(transport: RecordingTransport, interval: Duration) -> Publisher<RecordingTransport> {
    Publisher::new(transport, interval, "#Закарпаття #новини")
}

/// A shutdown flag that never flips.
pub fn no_shutdown() -> watch::Receiver<bool> {
    watch::channel(false).1
}

/// Chat messages queued by the test, handed out on the next `receive`.
#[derive(Clone, Default)]
pub struct ScriptedInbox {
    pub pending: Arc<Mutex<VecDeque<ChatMessage>>>,
    pub polls: Arc<Mutex<usize>>,
    pub broken: bool,
}

impl ScriptedInbox {
    pub fn push(&self, chat: &str, text: &str) {
        self.pending.lock().unwrap().push_back(ChatMessage {
            chat: chat.to_string(),
            text: text.to_string(),
        });
    }

    pub fn poll_count(&self) -> usize {
        *self.polls.lock().unwrap()
    }
}

#[async_trait]
impl Inbox for ScriptedInbox {
    async fn receive(&mut self) -> std::result::Result<Vec<ChatMessage>, PublishError> {
        *self.polls.lock().unwrap() += 1;
        if self.broken {
            return Err(PublishError::Unauthorized("Unauthorized".to_string()));
        }
        Ok(self.pending.lock().unwrap().drain(..).collect())
    }
}

/// Raw HTTP/1.1 response with `Connection: close`.
pub fn http_response(status: &str, headers: &[(&str, &str)], body: &[u8]) -> Vec<u8> {
    let mut head = format!("HTTP/1.1 {}\r\nConnection: close\r\n", status);
    for (name, value) in headers {
        head.push_str(&format!("{}: {}\r\n", name, value));
    }
    head.push_str("\r\n");
    let mut response = head.into_bytes();
    response.extend_from_slice(body);
    response
}

/// `http_response` with a JSON body and a matching Content-Length.
pub fn json_response(status: &str, body: &str) -> Vec<u8> {
    let length = body.len().to_string();
    http_response(
        status,
        &[("Content-Type", "application/json"), ("Content-Length", &length)],
        body.as_bytes(),
    )
}

/// Local server answering each connection with the next canned response.
/// The last response repeats once the list runs out.
pub struct CannedServer {
    pub url: String,
    pub requests: Arc<Mutex<Vec<String>>>,
}

impl CannedServer {
    pub async fn start(responses: Vec<Vec<u8>>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let log = requests.clone();

        tokio::spawn(async move {
            let mut served = 0;
            while let Ok((mut stream, _)) = listener.accept().await {
                let request = read_request(&mut stream).await;
                log.lock().unwrap().push(request);
                let response = &responses[served.min(responses.len() - 1)];
                served += 1;
                let _ = stream.write_all(response).await;
                let _ = stream.shutdown().await;
            }
        });

        Self { url, requests }
    }

    pub fn hits(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn request(&self, index: usize) -> String {
        self.requests.lock().unwrap()[index].clone()
    }
}

async fn read_request(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        buf.extend_from_slice(&chunk[..n]);

        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
            let length = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|value| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}
