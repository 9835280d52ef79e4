pub mod api;
pub mod execution;
pub mod graph;
pub mod ladder;
pub mod model;

use thiserror::Error;

use crate::resource::ResourceKind;

pub use api::{EncodingApi, HttpEncodingApi};
pub use execution::{max_attempts, ExecutionPolicies, ExecutionReport, JobExecutor, PollPolicy};
pub use graph::{
    join_path, AudioTrack, GraphStage, JobGraph, JobGraphBuilder, LiveJobSpec, LiveParameters,
    ManifestFormat, ManifestLocation, OutputTarget, SubtitleTrack, VodJobSpec,
};
pub use ladder::{CodecConfigHandle, LadderExpander};
pub use model::{LiveEncoding, MediaKind, MuxingFormat, Status, Task};

#[derive(Debug, Error)]
pub enum EncodingError {
    #[error("{kind} {id} not found")]
    ResourceNotFound { kind: ResourceKind, id: String },
    #[error("unable to create {endpoint} (HTTP {status}): {body}")]
    RemoteCreateFailed {
        endpoint: String,
        status: u16,
        body: String,
    },
    #[error("request to {endpoint} failed (HTTP {status}): {body}")]
    RemoteRequestFailed {
        endpoint: String,
        status: u16,
        body: String,
    },
    #[error("response from {endpoint} carried no resource id")]
    MissingId { endpoint: String },
    #[error("no live ingest input available on the account")]
    NoLiveInput,
    #[error("no {kind} adaptation set allocated for language {language:?}")]
    MissingAdaptationSet {
        kind: MediaKind,
        language: Option<String>,
    },
    #[error("subtitle track {language} requires a WebVTT configuration")]
    MissingSubtitleConfiguration { language: String },
    #[error("HLS manifest not allocated")]
    MissingManifest,
    #[error("encoding {encoding_id} failed: {}", messages.join("; "))]
    JobFailed {
        encoding_id: String,
        messages: Vec<String>,
    },
    #[error("encoding {encoding_id} was canceled")]
    JobCanceled { encoding_id: String },
    #[error("encoding {encoding_id} did not reach {expected} after {attempts} status checks")]
    JobTimeout {
        encoding_id: String,
        expected: Status,
        attempts: u32,
    },
    #[error("live details of encoding {encoding_id} unavailable after {attempts} attempts")]
    LiveDetailsTimeout { encoding_id: String, attempts: u32 },
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type EncodingResult<T> = std::result::Result<T, EncodingError>;
