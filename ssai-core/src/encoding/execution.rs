use serde::Serialize;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

use crate::config::PollingSection;

use super::api::EncodingApi;
use super::graph::JobGraph;
use super::model::{LiveEncoding, Status, Task};
use super::{EncodingError, EncodingResult};

/// Number of checks that fit in `timeout_minutes` at one check per
/// `interval_seconds`. Never less than one.
pub fn max_attempts(timeout_minutes: f64, interval_seconds: u64) -> u32 {
    if interval_seconds == 0 {
        return 1;
    }
    let attempts = (timeout_minutes * 60.0 / interval_seconds as f64).ceil();
    if attempts < 1.0 {
        1
    } else {
        attempts as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl PollPolicy {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn from_timeout(timeout_minutes: f64, interval_seconds: u64) -> Self {
        Self::new(
            Duration::from_secs(interval_seconds),
            max_attempts(timeout_minutes, interval_seconds),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExecutionPolicies {
    pub vod: PollPolicy,
    pub status: PollPolicy,
    pub live_details: PollPolicy,
}

impl ExecutionPolicies {
    pub fn from_config(polling: &PollingSection) -> Self {
        Self {
            vod: PollPolicy::from_timeout(polling.vod_timeout_minutes, polling.vod_interval_seconds),
            status: PollPolicy::from_timeout(
                polling.status_timeout_minutes,
                polling.status_interval_seconds,
            ),
            live_details: PollPolicy::from_timeout(
                polling.live_details_timeout_minutes,
                polling.live_details_interval_seconds,
            ),
        }
    }
}

impl Default for ExecutionPolicies {
    fn default() -> Self {
        Self::from_config(&PollingSection::default())
    }
}

/// Outcome of a job that reached the awaited status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionReport {
    pub encoding_id: String,
    pub status: Status,
    pub polls: u32,
}

/// Drives a populated job graph through start, polling and (for live)
/// shutdown.
pub struct JobExecutor<'a> {
    api: &'a dyn EncodingApi,
    policies: ExecutionPolicies,
}

impl<'a> JobExecutor<'a> {
    pub fn new(api: &'a dyn EncodingApi, policies: ExecutionPolicies) -> Self {
        Self { api, policies }
    }

    /// Starts a VOD job and polls it until it finishes.
    pub async fn run_vod(&self, graph: &JobGraph) -> EncodingResult<ExecutionReport> {
        let encoding_id = graph.encoding_id();
        let request = graph
            .start_request()
            .ok_or(EncodingError::MissingManifest)?;
        self.api.start_encoding(encoding_id, &request).await?;
        info!(%encoding_id, "encoding started");
        self.poll_vod(encoding_id).await
    }

    /// Sleeps before every check. Only `FINISHED` succeeds.
    pub async fn poll_vod(&self, encoding_id: &str) -> EncodingResult<ExecutionReport> {
        let policy = self.policies.vod;
        for attempt in 1..=policy.max_attempts {
            sleep(policy.interval).await;
            let task = self.api.encoding_status(encoding_id).await?;
            log_progress(encoding_id, attempt, &task);
            match task.status {
                Status::Finished => {
                    info!(%encoding_id, polls = attempt, "encoding finished");
                    return Ok(ExecutionReport {
                        encoding_id: encoding_id.to_string(),
                        status: task.status,
                        polls: attempt,
                    });
                }
                Status::Error => return Err(job_failed(encoding_id, &task)),
                Status::Canceled => {
                    return Err(EncodingError::JobCanceled {
                        encoding_id: encoding_id.to_string(),
                    })
                }
                _ => {}
            }
        }
        Err(EncodingError::JobTimeout {
            encoding_id: encoding_id.to_string(),
            expected: Status::Finished,
            attempts: policy.max_attempts,
        })
    }

    /// Issues the live start. Once this returns `Ok` the remote encoding
    /// exists and must be stopped on every later failure.
    pub async fn start_live(&self, graph: &JobGraph) -> EncodingResult<()> {
        let encoding_id = graph.encoding_id();
        let request = graph
            .live_start_request()
            .ok_or(EncodingError::MissingManifest)?;
        self.api.start_live_encoding(encoding_id, &request).await?;
        info!(%encoding_id, stream_key = %request.stream_key, "live encoding started");
        Ok(())
    }

    /// Waits for a started live job to run and returns the ingest
    /// coordinates.
    pub async fn await_ingest(&self, encoding_id: &str) -> EncodingResult<LiveEncoding> {
        self.wait_for_status(encoding_id, Status::Running).await?;
        self.wait_for_live_details(encoding_id).await
    }

    pub async fn stop_live(&self, encoding_id: &str) -> EncodingResult<ExecutionReport> {
        self.api.stop_live_encoding(encoding_id).await?;
        info!(%encoding_id, "live encoding stop requested");
        self.wait_for_status(encoding_id, Status::Finished).await
    }

    /// Checks first, then sleeps between checks.
    pub async fn wait_for_status(
        &self,
        encoding_id: &str,
        expected: Status,
    ) -> EncodingResult<ExecutionReport> {
        let policy = self.policies.status;
        for attempt in 1..=policy.max_attempts {
            let task = self.api.encoding_status(encoding_id).await?;
            log_progress(encoding_id, attempt, &task);
            if task.status == expected {
                return Ok(ExecutionReport {
                    encoding_id: encoding_id.to_string(),
                    status: task.status,
                    polls: attempt,
                });
            }
            match task.status {
                Status::Error => return Err(job_failed(encoding_id, &task)),
                Status::Canceled => {
                    return Err(EncodingError::JobCanceled {
                        encoding_id: encoding_id.to_string(),
                    })
                }
                _ => {}
            }
            if attempt < policy.max_attempts {
                sleep(policy.interval).await;
            }
        }
        Err(EncodingError::JobTimeout {
            encoding_id: encoding_id.to_string(),
            expected,
            attempts: policy.max_attempts,
        })
    }

    /// A failed fetch counts as one attempt.
    pub async fn wait_for_live_details(&self, encoding_id: &str) -> EncodingResult<LiveEncoding> {
        let policy = self.policies.live_details;
        for attempt in 1..=policy.max_attempts {
            match self.api.live_encoding_details(encoding_id).await {
                Ok(details) => {
                    info!(
                        %encoding_id,
                        encoder_ip = %details.encoder_ip,
                        attempt,
                        "live ingest available"
                    );
                    return Ok(details);
                }
                Err(err) => {
                    warn!(%encoding_id, attempt, error = %err, "live details not available yet");
                }
            }
            if attempt < policy.max_attempts {
                sleep(policy.interval).await;
            }
        }
        Err(EncodingError::LiveDetailsTimeout {
            encoding_id: encoding_id.to_string(),
            attempts: policy.max_attempts,
        })
    }
}

fn log_progress(encoding_id: &str, attempt: u32, task: &Task) {
    info!(
        %encoding_id,
        attempt,
        status = %task.status,
        progress = task.progress.unwrap_or(0.0),
        "encoding status"
    );
}

fn job_failed(encoding_id: &str, task: &Task) -> EncodingError {
    let messages = task.error_messages();
    for message in &messages {
        error!(%encoding_id, message = %message, "encoding error");
    }
    EncodingError::JobFailed {
        encoding_id: encoding_id.to_string(),
        messages,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempts_round_up() {
        assert_eq!(max_attempts(5.0, 15), 20);
        assert_eq!(max_attempts(1.0, 7), 9);
        assert_eq!(max_attempts(0.0, 5), 1);
        assert_eq!(max_attempts(2.0, 0), 1);
    }

    #[test]
    fn default_policies_follow_polling_defaults() {
        let policies = ExecutionPolicies::default();
        assert_eq!(policies.status.interval, Duration::from_secs(15));
        assert_eq!(policies.status.max_attempts, 20);
        assert_eq!(policies.live_details.max_attempts, 60);
        assert_eq!(policies.vod.interval, Duration::from_secs(5));
        assert_eq!(policies.vod.max_attempts, 8640);
    }
}
