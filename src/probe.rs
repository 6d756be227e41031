//! Network and service readiness probes.
//!
//! Probes never raise errors for not-yet-ready conditions; refused or timed
//! out attempts map to `false` so the enclosing poll loop keeps going and
//! only its own deadline can end the wait.

use std::future::Future;
use std::net::IpAddr;
use std::pin::Pin;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;

/// Per-attempt connect timeout for the TCP probe; separate from the poll
/// interval, which only governs the sleep between attempts.
pub const TCP_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

const HEALTH_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Attempts a single TCP connection to `ip:port`.
///
/// Connection refused and unreachable both report `false`; there is no error
/// path.
pub async fn tcp_port_open(ip: IpAddr, port: u16) -> bool {
    let connect = timeout(TCP_CONNECT_TIMEOUT, TcpStream::connect((ip, port))).await;
    matches!(connect, Ok(Ok(_)))
}

/// Future returned by health probe checks.
pub type HealthFuture<'a> = Pin<Box<dyn Future<Output = bool> + Send + 'a>>;

/// Abstraction over the service health check to support fakes in tests.
pub trait HealthProbe {
    /// Reports whether the endpoint currently answers healthy.
    fn check<'a>(&'a self, endpoint: &'a str) -> HealthFuture<'a>;
}

/// Health probe that issues a plain HTTP GET and accepts any 2xx answer.
#[derive(Clone, Debug)]
pub struct HttpHealthProbe {
    client: reqwest::Client,
}

impl HttpHealthProbe {
    /// Constructs a probe with a short per-request timeout.
    #[must_use]
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(HEALTH_REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client }
    }
}

impl Default for HttpHealthProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthProbe for HttpHealthProbe {
    fn check<'a>(&'a self, endpoint: &'a str) -> HealthFuture<'a> {
        Box::pin(async move {
            match self.client.get(endpoint).send().await {
                Ok(response) => response.status().is_success(),
                Err(_) => false,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::net::IpAddr;
    use std::str::FromStr;

    use super::tcp_port_open;

    #[tokio::test]
    async fn open_port_reports_true() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap_or_else(|err| panic!("bind listener: {err}"));
        let addr = listener
            .local_addr()
            .unwrap_or_else(|err| panic!("listener addr: {err}"));

        assert!(tcp_port_open(addr.ip(), addr.port()).await);
    }

    #[tokio::test]
    async fn closed_port_reports_false() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap_or_else(|err| panic!("bind listener: {err}"));
        let addr = listener
            .local_addr()
            .unwrap_or_else(|err| panic!("listener addr: {err}"));
        drop(listener);

        let ip = IpAddr::from_str("127.0.0.1").unwrap_or_else(|err| panic!("loopback: {err}"));
        assert!(!tcp_port_open(ip, addr.port()).await);
    }
}
