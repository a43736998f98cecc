//! Connectivity oracle

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::net::TcpStream;

/// Answers "is the remote authority reachable right now?".
///
/// Implementations must be cheap and side-effect free; callers ask again on
/// every operation.
pub trait Connectivity: Send + Sync {
    fn is_online(&self) -> bool;
}

/// Connectivity flag owned by the composition root and flipped by whatever
/// watches the network.
#[derive(Debug, Default)]
pub struct NetworkStatus {
    online: AtomicBool,
}

impl NetworkStatus {
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    pub fn set_online(&self, online: bool) {
        let previous = self.online.swap(online, Ordering::SeqCst);
        if previous != online {
            tracing::info!(online, "Connectivity changed");
        }
    }
}

impl Connectivity for NetworkStatus {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

/// Bounded TCP reachability check against the host of `base_url`.
pub async fn probe(base_url: &str, timeout: Duration) -> bool {
    let url = match reqwest::Url::parse(base_url) {
        Ok(url) => url,
        Err(e) => {
            tracing::warn!(base_url, error = %e, "Cannot probe an invalid URL");
            return false;
        }
    };
    let (Some(host), Some(port)) = (url.host_str(), url.port_or_known_default()) else {
        return false;
    };

    match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
        Ok(Ok(_)) => true,
        Ok(Err(e)) => {
            tracing::debug!(host, port, error = %e, "Remote unreachable");
            false
        }
        Err(_) => {
            tracing::debug!(host, port, "Connectivity probe timed out");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_status_toggles() {
        let status = NetworkStatus::new(false);
        assert!(!status.is_online());
        status.set_online(true);
        assert!(status.is_online());
    }

    #[tokio::test]
    async fn test_probe_reaches_listener() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let url = format!("http://{}/", addr);
        assert!(probe(&url, Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_probe_rejects_bad_url() {
        assert!(!probe("not a url", Duration::from_millis(100)).await);
    }
}
