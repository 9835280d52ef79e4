pub mod adinsertion;
pub mod config;
pub mod encoding;
pub mod error;
pub mod feed;
pub mod playback;
pub mod readiness;
pub mod resource;
pub mod workflow;

pub use adinsertion::{
    transcoding_profile_suggestion, AdInsertionApi, AdInsertionError, AdInsertionProvisioner,
    HttpAdInsertionApi,
};
pub use config::{load_live_config, load_vod_config, LiveConfig, VodConfig};
pub use encoding::{
    EncodingApi, EncodingError, ExecutionPolicies, HttpEncodingApi, JobExecutor, JobGraph,
    JobGraphBuilder, LadderExpander, ManifestFormat, PollPolicy, Status,
};
pub use error::{ConfigError, Error, Result};
pub use feed::{DummyFeed, FeedError};
pub use playback::{live_playback_url, origin_url, playback_url, public_base_url, PlaybackError};
pub use readiness::{HttpManifestProbe, ManifestProbe, ProbeError, ReadinessProber};
pub use resource::{ResourceKind, ResourceRef};
pub use workflow::{
    generate_run_id, live_resource_plan, vod_resource_plan, LiveReport, LiveSession,
    LiveWorkflow, PlaybackEntry, ResourcePlan, RunNames, ShutdownReport, VodReport, VodWorkflow,
};
