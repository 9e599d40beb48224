//! Composite readiness checking for started containers.
//!
//! A listening socket alone does not mean the application layer is
//! initialized, so readiness combines independent signals with AND semantics:
//! every [`WaitStrategy`] in a [`WaitAll`] must report ready within one shared
//! deadline before the fixture is considered usable.

use crate::error::FixtureError;
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tracing::debug;

/// Per-request timeout of the HTTP probe, so a hung request cannot consume
/// the whole startup deadline
const HTTP_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Outcome of a single readiness probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeStatus {
    /// The probed signal is up
    Ready,
    /// The probed signal is not up yet, with the observed reason
    NotReady(String),
}

impl ProbeStatus {
    /// Returns true for [`ProbeStatus::Ready`]
    pub fn is_ready(&self) -> bool {
        matches!(self, ProbeStatus::Ready)
    }
}

/// Host-side address of the service under probe
#[derive(Debug, Clone)]
pub struct ProbeTarget {
    /// Host name or address reachable from the test process
    pub host: String,
    /// Host port mapped to the container's service port
    pub port: u16,
}

/// A single readiness signal
#[async_trait]
pub trait WaitStrategy: Send + Sync {
    /// Probe the target once
    async fn probe(&self, target: &ProbeTarget) -> ProbeStatus;

    /// Short description for logs and timeout errors
    fn describe(&self) -> String;
}

/// Readiness signal: the mapped TCP port accepts connections
#[derive(Debug, Default)]
pub struct ListeningPort;

#[async_trait]
impl WaitStrategy for ListeningPort {
    async fn probe(&self, target: &ProbeTarget) -> ProbeStatus {
        match TcpStream::connect((target.host.as_str(), target.port)).await {
            Ok(_) => ProbeStatus::Ready,
            Err(e) => ProbeStatus::NotReady(format!(
                "port {} not accepting connections: {}",
                target.port, e
            )),
        }
    }

    fn describe(&self) -> String {
        "listening port".to_string()
    }
}

/// Readiness signal: an authenticated HTTP GET returns the expected status
pub struct HttpHealth {
    client: reqwest::Client,
    path: String,
    username: String,
    password: String,
    expected: StatusCode,
}

impl HttpHealth {
    /// Probe `path` with basic credentials, expecting `expected`
    pub fn new(
        path: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        expected: StatusCode,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            path: path.into(),
            username: username.into(),
            password: password.into(),
            expected,
        }
    }
}

#[async_trait]
impl WaitStrategy for HttpHealth {
    async fn probe(&self, target: &ProbeTarget) -> ProbeStatus {
        let url = format!("http://{}:{}{}", target.host, target.port, self.path);
        let request = self
            .client
            .get(&url)
            .basic_auth(&self.username, Some(&self.password))
            .timeout(HTTP_PROBE_TIMEOUT);

        match request.send().await {
            Ok(response) if response.status() == self.expected => ProbeStatus::Ready,
            Ok(response) => ProbeStatus::NotReady(format!(
                "GET {} returned {} (expected {})",
                self.path,
                response.status(),
                self.expected
            )),
            Err(e) => ProbeStatus::NotReady(format!("GET {} failed: {}", self.path, e)),
        }
    }

    fn describe(&self) -> String {
        format!("HTTP GET {} -> {}", self.path, self.expected)
    }
}

/// Composite strategy: ready only when every inner strategy is ready
#[derive(Default)]
pub struct WaitAll {
    strategies: Vec<Box<dyn WaitStrategy>>,
}

impl WaitAll {
    /// Create an empty composite
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a strategy to the composite
    pub fn with_strategy(mut self, strategy: impl WaitStrategy + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    /// Probe every strategy once; the first not-ready signal short-circuits
    pub async fn probe(&self, target: &ProbeTarget) -> ProbeStatus {
        for strategy in &self.strategies {
            if let ProbeStatus::NotReady(reason) = strategy.probe(target).await {
                return ProbeStatus::NotReady(format!("{}: {}", strategy.describe(), reason));
            }
        }
        ProbeStatus::Ready
    }

    /// Poll until every strategy reports ready or the deadline elapses.
    ///
    /// At least one probe round runs even with a zero timeout.
    pub async fn wait_until_ready(
        &self,
        target: &ProbeTarget,
        timeout: Duration,
        interval: Duration,
    ) -> Result<(), FixtureError> {
        let start = Instant::now();
        let mut last_status = "no probe completed".to_string();

        loop {
            match self.probe(target).await {
                ProbeStatus::Ready => {
                    debug!(
                        "Readiness reached after {:?} ({} strategies)",
                        start.elapsed(),
                        self.strategies.len()
                    );
                    return Ok(());
                }
                ProbeStatus::NotReady(reason) => {
                    debug!("Not ready yet: {}", reason);
                    last_status = reason;
                }
            }

            if start.elapsed() >= timeout {
                return Err(FixtureError::StartupTimeout {
                    timeout,
                    last_status,
                });
            }
            tokio::time::sleep(interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    struct AlwaysReady;

    #[async_trait]
    impl WaitStrategy for AlwaysReady {
        async fn probe(&self, _target: &ProbeTarget) -> ProbeStatus {
            ProbeStatus::Ready
        }

        fn describe(&self) -> String {
            "always ready".to_string()
        }
    }

    struct NeverReady;

    #[async_trait]
    impl WaitStrategy for NeverReady {
        async fn probe(&self, _target: &ProbeTarget) -> ProbeStatus {
            ProbeStatus::NotReady("still down".to_string())
        }

        fn describe(&self) -> String {
            "never ready".to_string()
        }
    }

    struct ReadyAfter {
        remaining: AtomicU32,
    }

    #[async_trait]
    impl WaitStrategy for ReadyAfter {
        async fn probe(&self, _target: &ProbeTarget) -> ProbeStatus {
            let countdown = self
                .remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
            match countdown {
                // Still counting down
                Ok(_) => ProbeStatus::NotReady("warming up".to_string()),
                // Counter exhausted
                Err(_) => ProbeStatus::Ready,
            }
        }

        fn describe(&self) -> String {
            "ready after countdown".to_string()
        }
    }

    fn local_target(port: u16) -> ProbeTarget {
        ProbeTarget {
            host: "127.0.0.1".to_string(),
            port,
        }
    }

    #[tokio::test]
    async fn test_listening_port_ready() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let status = ListeningPort.probe(&local_target(port)).await;
        assert!(status.is_ready());
        drop(listener);
    }

    #[tokio::test]
    async fn test_listening_port_not_ready() {
        // Bind then drop to obtain a port that is very likely closed.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let status = ListeningPort.probe(&local_target(port)).await;
        assert!(matches!(status, ProbeStatus::NotReady(_)));
    }

    /// Minimal HTTP responder returning a fixed status line for every request
    async fn spawn_http_stub(response: &'static str) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    break;
                };
                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf).await;
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });
        port
    }

    #[tokio::test]
    async fn test_http_health_expected_status() {
        let port = spawn_http_stub("HTTP/1.1 204 No Content\r\nconnection: close\r\n\r\n").await;
        let probe = HttpHealth::new("/ping", "test-user", "test-password", StatusCode::NO_CONTENT);
        let status = probe.probe(&local_target(port)).await;
        assert!(status.is_ready());
    }

    #[tokio::test]
    async fn test_http_health_unexpected_status() {
        let port = spawn_http_stub(
            "HTTP/1.1 500 Internal Server Error\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
        )
        .await;
        let probe = HttpHealth::new("/ping", "test-user", "test-password", StatusCode::NO_CONTENT);
        let status = probe.probe(&local_target(port)).await;
        assert!(matches!(status, ProbeStatus::NotReady(_)));
    }

    #[tokio::test]
    async fn test_http_health_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let probe = HttpHealth::new("/ping", "test-user", "test-password", StatusCode::NO_CONTENT);
        let status = probe.probe(&local_target(port)).await;
        assert!(matches!(status, ProbeStatus::NotReady(_)));
    }

    #[tokio::test]
    async fn test_wait_all_requires_every_strategy() {
        let composite = WaitAll::new()
            .with_strategy(AlwaysReady)
            .with_strategy(NeverReady);
        let status = composite.probe(&local_target(1)).await;
        assert!(matches!(status, ProbeStatus::NotReady(_)));

        let all_ready = WaitAll::new()
            .with_strategy(AlwaysReady)
            .with_strategy(AlwaysReady);
        assert!(all_ready.probe(&local_target(1)).await.is_ready());
    }

    #[tokio::test]
    async fn test_wait_until_ready_times_out() {
        let composite = WaitAll::new().with_strategy(NeverReady);
        let result = composite
            .wait_until_ready(
                &local_target(1),
                Duration::from_millis(50),
                Duration::from_millis(10),
            )
            .await;
        match result {
            Err(FixtureError::StartupTimeout { last_status, .. }) => {
                assert!(last_status.contains("still down"));
            }
            other => panic!("expected startup timeout, got {:?}", other.err()),
        }
    }

    #[tokio::test]
    async fn test_wait_until_ready_succeeds_after_retries() {
        let composite = WaitAll::new().with_strategy(ReadyAfter {
            remaining: AtomicU32::new(3),
        });
        composite
            .wait_until_ready(
                &local_target(1),
                Duration::from_secs(5),
                Duration::from_millis(5),
            )
            .await
            .unwrap();
    }
}
