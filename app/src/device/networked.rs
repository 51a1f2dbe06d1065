use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde_json::{Value, json};

use super::{AdapterError, Board, BoardHealth, JsonEndpoint};
use crate::settings::{BoardConfig, ConnectionType};

/// Board reached over the network, running firmware that answers JSON on
/// `/health`, `/analog/<ch>`, `/digital/<ch>`, `/frequency/<ch>` and
/// `/relay/<ch>`.
///
/// Connectivity is tracked per request: a failed or timed out call marks the
/// board disconnected, the next successful one marks it connected again.
pub struct NetworkedBoard {
    id: String,
    name: String,
    url: String,
    timeout: Duration,
    endpoint: RwLock<Option<JsonEndpoint>>,
    connected: AtomicBool,
}

impl NetworkedBoard {
    pub fn new(config: &BoardConfig) -> anyhow::Result<Self> {
        let url = config
            .url
            .clone()
            .ok_or_else(|| anyhow::anyhow!("Wireless board {} has no url configured", config.id))?;

        Ok(Self {
            id: config.id.clone(),
            name: config.name.clone(),
            url,
            timeout: config.timeout,
            endpoint: RwLock::new(None),
            connected: AtomicBool::new(false),
        })
    }

    fn endpoint(&self) -> Option<JsonEndpoint> {
        self.endpoint.read().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
    }

    fn set_endpoint(&self, endpoint: Option<JsonEndpoint>) {
        *self.endpoint.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = endpoint;
    }

    async fn request(&self, path: &str) -> Option<Value> {
        let endpoint = self.endpoint()?;

        match endpoint.get(path).await {
            Ok(body) => {
                self.connected.store(true, Ordering::Release);
                Some(body)
            }
            Err(e) => {
                if self.connected.swap(false, Ordering::AcqRel) {
                    tracing::warn!(board = %self.id, "Lost connection to {}: {}", self.name, e);
                } else {
                    tracing::debug!(board = %self.id, "Request {} failed: {}", path, e);
                }
                None
            }
        }
    }

    async fn read_channel(&self, kind: &str, channel: u8) -> Option<Value> {
        let body = self.request(&format!("/{}/{}", kind, channel)).await?;
        body.get("value").cloned()
    }
}

fn status_ok(body: &Value) -> bool {
    body.get("status").and_then(Value::as_str) == Some("ok")
}

impl Board for NetworkedBoard {
    fn id(&self) -> &str {
        &self.id
    }

    #[tracing::instrument(skip(self), fields(board = %self.id, url = %self.url))]
    async fn connect(&self) -> Result<(), AdapterError> {
        let endpoint = JsonEndpoint::new(&self.url, self.timeout)
            .map_err(|e| AdapterError::Unavailable(format!("cannot create client for {}: {:#}", self.url, e)))?;

        let result = match endpoint.get("/health").await {
            Ok(body) if status_ok(&body) => Ok(()),
            Ok(body) => Err(AdapterError::Unavailable(format!("unhealthy response: {}", body))),
            Err(e) => Err(AdapterError::Unavailable(e.to_string())),
        };

        self.set_endpoint(Some(endpoint));
        self.connected.store(result.is_ok(), Ordering::Release);

        match &result {
            Ok(()) => tracing::info!(board = %self.id, url = %self.url, "Connected to wireless board {}", self.name),
            Err(e) => {
                tracing::warn!(board = %self.id, url = %self.url, "Wireless board {} not reachable: {}", self.name, e)
            }
        }

        result
    }

    async fn disconnect(&self) {
        self.set_endpoint(None);
        if self.connected.swap(false, Ordering::AcqRel) {
            tracing::info!(board = %self.id, "Disconnected from wireless board {}", self.name);
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    async fn read_analog(&self, channel: u8) -> Option<f64> {
        self.read_channel("analog", channel).await?.as_f64()
    }

    async fn read_digital(&self, channel: u8) -> Option<bool> {
        let value = self.read_channel("digital", channel).await?;
        value.as_bool().or_else(|| value.as_u64().map(|v| v != 0))
    }

    async fn read_frequency(&self, channel: u8) -> Option<f64> {
        self.read_channel("frequency", channel).await?.as_f64()
    }

    #[tracing::instrument(skip(self), fields(board = %self.id))]
    async fn set_relay(&self, channel: u8, on: bool) -> Result<(), AdapterError> {
        let endpoint = self.endpoint().ok_or_else(|| AdapterError::NotConnected(self.id.clone()))?;

        let body = endpoint
            .post(&format!("/relay/{}", channel), &json!({ "state": on }))
            .await
            .inspect_err(|_| self.connected.store(false, Ordering::Release))?;

        self.connected.store(true, Ordering::Release);

        if status_ok(&body) {
            Ok(())
        } else {
            Err(AdapterError::Rejected(format!("relay {} update answered {}", channel, body)))
        }
    }

    async fn get_relay(&self, channel: u8) -> Option<bool> {
        self.request(&format!("/relay/{}", channel)).await?.get("state")?.as_bool()
    }

    async fn health_check(&self) -> BoardHealth {
        let connected = match self.endpoint() {
            Some(_) => self.request("/health").await.is_some_and(|body| status_ok(&body)),
            None => false,
        };

        BoardHealth {
            board_id: self.id.clone(),
            board_name: self.name.clone(),
            connection: ConnectionType::Wireless,
            connected,
            simulated: false,
            detail: Some(json!({ "url": self.url })),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    /// Minimal stand-in for the board firmware. Answers one request per
    /// connection with the body registered for `METHOD path`.
    struct FakeFirmware {
        url: String,
        requests: Arc<Mutex<Vec<String>>>,
    }

    impl FakeFirmware {
        async fn start(routes: Vec<(&str, Value)>) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let url = format!("http://{}", listener.local_addr().unwrap());
            let routes: HashMap<String, Value> = routes.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
            let requests = Arc::new(Mutex::new(Vec::new()));
            let seen = requests.clone();

            tokio::spawn(async move {
                loop {
                    let Ok((mut socket, _)) = listener.accept().await else {
                        return;
                    };
                    let request = read_request(&mut socket).await;
                    let request_line = request.lines().next().unwrap_or_default().to_string();
                    let key = request_line.split(' ').take(2).collect::<Vec<_>>().join(" ");
                    seen.lock().unwrap().push(request);

                    let response = match routes.get(&key) {
                        Some(body) => {
                            let body = body.to_string();
                            format!(
                                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\n\
                                 content-length: {}\r\nconnection: close\r\n\r\n{}",
                                body.len(),
                                body
                            )
                        }
                        None => "HTTP/1.1 404 Not Found\r\ncontent-length: 0\r\nconnection: close\r\n\r\n".to_string(),
                    };
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                }
            });

            Self { url, requests }
        }

        fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
        let mut data = Vec::new();
        let mut buf = [0u8; 1024];

        loop {
            let n = socket.read(&mut buf).await.unwrap_or(0);
            if n == 0 {
                break;
            }
            data.extend_from_slice(&buf[..n]);

            let text = String::from_utf8_lossy(&data).to_string();
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text[..header_end]
                    .lines()
                    .find_map(|l| l.to_ascii_lowercase().strip_prefix("content-length:").map(|v| v.trim().to_string()))
                    .and_then(|v| v.parse::<usize>().ok())
                    .unwrap_or(0);
                if data.len() >= header_end + 4 + content_length {
                    break;
                }
            }
        }

        String::from_utf8_lossy(&data).to_string()
    }

    fn config(url: &str) -> BoardConfig {
        BoardConfig {
            id: "board_1".to_string(),
            name: "Tank room".to_string(),
            connection: ConnectionType::Wireless,
            i2c_address: None,
            sysfs_root: None,
            url: Some(url.to_string()),
            timeout: Duration::from_millis(300),
        }
    }

    #[test]
    fn requires_url() {
        let mut config = config("http://localhost");
        config.url = None;

        assert!(NetworkedBoard::new(&config).is_err());
    }

    #[tokio::test]
    async fn connects_and_reads_channels() {
        let firmware = FakeFirmware::start(vec![
            ("GET /health", json!({ "status": "ok" })),
            ("GET /analog/1", json!({ "channel": 1, "value": 1234.0 })),
            ("GET /digital/2", json!({ "channel": 2, "value": true })),
            ("GET /frequency/1", json!({ "channel": 1, "value": 12.5 })),
        ])
        .await;
        let board = NetworkedBoard::new(&config(&firmware.url)).unwrap();

        board.connect().await.unwrap();

        assert!(board.is_connected());
        assert_eq!(board.read_analog(1).await, Some(1234.0));
        assert_eq!(board.read_digital(2).await, Some(true));
        assert_eq!(board.read_frequency(1).await, Some(12.5));
    }

    #[tokio::test]
    async fn relay_update_posts_state() {
        let firmware = FakeFirmware::start(vec![
            ("GET /health", json!({ "status": "ok" })),
            ("POST /relay/2", json!({ "status": "ok" })),
            ("GET /relay/2", json!({ "relay": 2, "state": true })),
        ])
        .await;
        let board = NetworkedBoard::new(&config(&firmware.url)).unwrap();
        board.connect().await.unwrap();

        board.set_relay(2, true).await.unwrap();

        assert_eq!(board.get_relay(2).await, Some(true));
        let post = firmware.requests().into_iter().find(|r| r.starts_with("POST /relay/2")).unwrap();
        assert!(post.contains(r#"{"state":true}"#));
    }

    #[tokio::test]
    async fn relay_update_without_ok_status_is_rejected() {
        let firmware = FakeFirmware::start(vec![
            ("GET /health", json!({ "status": "ok" })),
            ("POST /relay/1", json!({ "status": "error" })),
        ])
        .await;
        let board = NetworkedBoard::new(&config(&firmware.url)).unwrap();
        board.connect().await.unwrap();

        let result = board.set_relay(1, true).await;

        assert!(matches!(result, Err(AdapterError::Rejected(_))));
    }

    #[tokio::test]
    async fn failed_read_marks_board_disconnected() {
        let firmware = FakeFirmware::start(vec![("GET /health", json!({ "status": "ok" }))]).await;
        let board = NetworkedBoard::new(&config(&firmware.url)).unwrap();
        board.connect().await.unwrap();

        assert_eq!(board.read_analog(7).await, None);
        assert!(!board.is_connected());
    }

    #[tokio::test]
    async fn unreachable_board_fails_to_connect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);
        let board = NetworkedBoard::new(&config(&url)).unwrap();

        let result = board.connect().await;

        assert!(matches!(result, Err(AdapterError::Unavailable(_))));
        assert!(!board.is_connected());
        assert_eq!(board.read_analog(1).await, None);
    }

    #[tokio::test]
    async fn hanging_board_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        let board = NetworkedBoard::new(&config(&url)).unwrap();

        let started = std::time::Instant::now();
        let result = board.connect().await;

        assert!(result.is_err());
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn operations_without_connect_are_not_connected() {
        let board = NetworkedBoard::new(&config("http://127.0.0.1:9")).unwrap();

        assert_eq!(board.read_analog(1).await, None);
        assert!(matches!(board.set_relay(1, true).await, Err(AdapterError::NotConnected(_))));
        assert!(!board.health_check().await.connected);
    }
}
