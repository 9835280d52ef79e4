use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::encoding::PollPolicy;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("manifests not ready after {rounds} rounds: {}", pending.join(", "))]
    ManifestNotReady { rounds: u32, pending: Vec<String> },
}

pub type ProbeResult<T> = std::result::Result<T, ProbeError>;

/// Single availability check of a URL.
#[async_trait]
pub trait ManifestProbe: Send + Sync {
    async fn is_available(&self, url: &str) -> bool;
}

pub struct HttpManifestProbe {
    client: Client,
}

impl HttpManifestProbe {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ManifestProbe for HttpManifestProbe {
    async fn is_available(&self, url: &str) -> bool {
        match self.client.get(url).send().await {
            Ok(response) => response.status().is_success(),
            Err(err) => {
                debug!(%url, error = %err, "manifest probe failed");
                false
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReadinessReport {
    pub rounds: u32,
    pub checks: u32,
}

pub struct ReadinessProber<'a> {
    probe: &'a dyn ManifestProbe,
    policy: PollPolicy,
}

impl<'a> ReadinessProber<'a> {
    pub fn new(probe: &'a dyn ManifestProbe, policy: PollPolicy) -> Self {
        Self { probe, policy }
    }

    /// Probes every URL each round; ready only when a whole round succeeds.
    pub async fn wait_until_ready(&self, urls: &[String]) -> ProbeResult<ReadinessReport> {
        let mut checks = 0;
        let mut pending = Vec::new();
        for round in 1..=self.policy.max_attempts {
            pending.clear();
            for url in urls {
                checks += 1;
                if !self.probe.is_available(url).await {
                    pending.push(url.clone());
                }
            }
            if pending.is_empty() {
                info!(rounds = round, checks, "manifests ready");
                return Ok(ReadinessReport {
                    rounds: round,
                    checks,
                });
            }
            debug!(round, pending = pending.len(), "manifests not ready yet");
            if round < self.policy.max_attempts {
                sleep(self.policy.interval).await;
            }
        }
        Err(ProbeError::ManifestNotReady {
            rounds: self.policy.max_attempts,
            pending,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::time::Duration;

    struct AlwaysMissing {
        calls: Mutex<u32>,
    }

    #[async_trait]
    impl ManifestProbe for AlwaysMissing {
        async fn is_available(&self, _url: &str) -> bool {
            *self.calls.lock().unwrap() += 1;
            false
        }
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_policy_budget() {
        let probe = AlwaysMissing {
            calls: Mutex::new(0),
        };
        let prober = ReadinessProber::new(&probe, PollPolicy::new(Duration::from_secs(5), 4));
        let urls = vec!["https://origin/a.m3u8".to_string()];
        let err = prober.wait_until_ready(&urls).await.unwrap_err();
        let ProbeError::ManifestNotReady { rounds, pending } = err;
        assert_eq!(rounds, 4);
        assert_eq!(pending, urls);
        assert_eq!(*probe.calls.lock().unwrap(), 4);
    }
}
