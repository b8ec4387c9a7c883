use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::gemini::{ClassifyError, Classifier};

/// Whether the classification service can be used right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    /// No check has completed yet.
    Unknown,
    Connected,
    Disconnected,
    /// No usable API key; no request is ever attempted.
    Unconfigured,
}

impl fmt::Display for Connectivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Connectivity::Unknown => "unknown",
            Connectivity::Connected => "connected",
            Connectivity::Disconnected => "disconnected",
            Connectivity::Unconfigured => "unconfigured",
        })
    }
}

/// Tracks classifier availability and publishes it over a watch channel.
///
/// Status comes from two places: explicit [`check`](Self::check) calls (or
/// the timer task started by [`spawn`](Self::spawn)), and the outcomes of real
/// classification calls fed in through [`record`](Self::record).
#[derive(Clone)]
pub struct ConnectivityMonitor {
    classifier: Classifier,
    tx: Arc<watch::Sender<Connectivity>>,
}

impl ConnectivityMonitor {
    pub fn new(classifier: Classifier) -> Self {
        let (tx, _rx) = watch::channel(Connectivity::Unknown);
        Self {
            classifier,
            tx: Arc::new(tx),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Connectivity> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> Connectivity {
        *self.tx.borrow()
    }

    fn publish(&self, status: Connectivity) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == status {
                return false;
            }
            *current = status;
            true
        });
        if changed {
            tracing::info!(%status, "Classifier connectivity changed");
        }
    }

    /// Probe the service once and publish the result. Never fails.
    pub async fn check(&self) -> Connectivity {
        let status = if !self.classifier.is_available() {
            Connectivity::Unconfigured
        } else {
            match self.classifier.probe().await {
                Ok(()) => Connectivity::Connected,
                Err(e) => {
                    tracing::debug!(error = %e, "Connectivity probe failed");
                    Connectivity::Disconnected
                }
            }
        };
        self.publish(status);
        status
    }

    /// Update status from the outcome of a real classification call.
    ///
    /// Errors that prove the service answered (bad output, 4xx) leave the
    /// status alone.
    pub fn record<T>(&self, result: &Result<T, ClassifyError>) {
        match result {
            Ok(_) => self.publish(Connectivity::Connected),
            Err(ClassifyError::Unavailable) => self.publish(Connectivity::Unconfigured),
            Err(e) if e.is_connectivity() => self.publish(Connectivity::Disconnected),
            Err(_) => {}
        }
    }

    /// Run [`check`](Self::check) every `period` on a background task.
    ///
    /// The first check runs immediately. Dropping the handle stops the task.
    pub fn spawn(&self, period: Duration) -> MonitorHandle {
        let monitor = self.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                monitor.check().await;
            }
        });
        MonitorHandle { task }
    }
}

/// Owns the background check task; aborts it on drop.
pub struct MonitorHandle {
    task: JoinHandle<()>,
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn classifier(base: &str) -> Classifier {
        Classifier::new(
            reqwest::Client::new(),
            Some(SecretString::from("test-api-key-123".to_string())),
        )
        .with_base_url(base)
        .with_timeout(Duration::from_secs(2))
    }

    async fn healthy_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1beta/models"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_unconfigured_without_key() {
        let monitor = ConnectivityMonitor::new(Classifier::new(reqwest::Client::new(), None));
        assert_eq!(monitor.current(), Connectivity::Unknown);
        assert_eq!(monitor.check().await, Connectivity::Unconfigured);
        assert_eq!(monitor.current(), Connectivity::Unconfigured);
    }

    #[tokio::test]
    async fn test_check_connected() {
        let server = healthy_server().await;
        let monitor = ConnectivityMonitor::new(classifier(&server.uri()));
        assert_eq!(monitor.check().await, Connectivity::Connected);
    }

    #[tokio::test]
    async fn test_check_disconnected() {
        let monitor = ConnectivityMonitor::new(classifier("http://127.0.0.1:1"));
        assert_eq!(monitor.check().await, Connectivity::Disconnected);
    }

    #[tokio::test]
    async fn test_record_outcomes() {
        let monitor = ConnectivityMonitor::new(classifier("http://127.0.0.1:1"));

        monitor.record(&Ok::<(), ClassifyError>(()));
        assert_eq!(monitor.current(), Connectivity::Connected);

        // The service answered, so it is still reachable
        monitor.record::<()>(&Err(ClassifyError::Malformed("bad".into())));
        assert_eq!(monitor.current(), Connectivity::Connected);

        monitor.record::<()>(&Err(ClassifyError::Timeout(30)));
        assert_eq!(monitor.current(), Connectivity::Disconnected);

        monitor.record::<()>(&Err(ClassifyError::Unavailable));
        assert_eq!(monitor.current(), Connectivity::Unconfigured);
    }

    #[tokio::test]
    async fn test_spawn_publishes_to_subscribers() {
        let server = healthy_server().await;
        let monitor = ConnectivityMonitor::new(classifier(&server.uri()));
        let mut rx = monitor.subscribe();

        let _handle = monitor.spawn(Duration::from_secs(60));
        tokio::time::timeout(Duration::from_secs(5), rx.changed())
            .await
            .expect("no status published")
            .unwrap();
        assert_eq!(*rx.borrow(), Connectivity::Connected);
    }
}
