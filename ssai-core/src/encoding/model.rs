use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::H264Profile;
use crate::resource::Identified;

macro_rules! identified {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl Identified for $ty {
                fn resource_id(&self) -> String {
                    self.id.clone()
                }
            }
        )+
    };
}

fn is_empty(value: &str) -> bool {
    value.is_empty()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpsInput {
    #[serde(default, skip_serializing_if = "is_empty")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub host: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtmpInput {
    #[serde(default, skip_serializing_if = "is_empty")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct S3Output {
    #[serde(default, skip_serializing_if = "is_empty")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub bucket_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,
}

impl fmt::Debug for S3Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Output")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("bucket_name", &self.bucket_name)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PresetConfiguration {
    VodStandard,
    LiveStandard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WeightedPredictionPFrames {
    Disabled,
    Simple,
    Smart,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct H264VideoConfiguration {
    #[serde(default, skip_serializing_if = "is_empty")]
    pub id: String,
    pub name: String,
    pub preset_configuration: PresetConfiguration,
    pub height: u32,
    pub bitrate: u64,
    pub rate: f64,
    pub profile: H264Profile,
    pub level: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adaptive_spatial_transform: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bframes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cabac: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weighted_prediction_p_frames: Option<WeightedPredictionPFrames>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AacAudioConfiguration {
    #[serde(default, skip_serializing_if = "is_empty")]
    pub id: String,
    pub name: String,
    pub bitrate: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebVttConfiguration {
    #[serde(default, skip_serializing_if = "is_empty")]
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Encoding {
    #[serde(default, skip_serializing_if = "is_empty")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamSelectionMode {
    Auto,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_stream_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection_mode: Option<StreamSelectionMode>,
}

impl StreamInput {
    pub fn from_file(input_id: &str, input_path: &str) -> Self {
        Self {
            input_id: Some(input_id.to_string()),
            input_path: Some(input_path.to_string()),
            input_stream_id: None,
            selection_mode: Some(StreamSelectionMode::Auto),
        }
    }

    pub fn from_input_stream(input_stream_id: &str) -> Self {
        Self {
            input_stream_id: Some(input_stream_id.to_string()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInputStream {
    #[serde(default, skip_serializing_if = "is_empty")]
    pub id: String,
    pub input_id: String,
    pub input_path: String,
    pub file_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stream {
    #[serde(default, skip_serializing_if = "is_empty")]
    pub id: String,
    pub input_streams: Vec<StreamInput>,
    pub codec_config_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AclPermission {
    PublicRead,
    Private,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AclEntry {
    pub permission: AclPermission,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodingOutput {
    pub output_id: String,
    pub output_path: String,
    #[serde(default)]
    pub acl: Vec<AclEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MuxingStream {
    pub stream_id: String,
}

/// Container formats the job graph emits. Each maps to its own endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MuxingFormat {
    Ts,
    Fmp4,
    ChunkedText,
}

impl MuxingFormat {
    /// Directory segment used in output paths.
    pub fn path_segment(&self) -> &'static str {
        match self {
            MuxingFormat::Ts => "ts",
            MuxingFormat::Fmp4 => "fmp4",
            MuxingFormat::ChunkedText => "vtt",
        }
    }

    pub fn endpoint(&self) -> &'static str {
        match self {
            MuxingFormat::Ts => "ts",
            MuxingFormat::Fmp4 => "fmp4",
            MuxingFormat::ChunkedText => "chunked-text",
        }
    }
}

impl fmt::Display for MuxingFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.endpoint())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Muxing {
    #[serde(default, skip_serializing_if = "is_empty")]
    pub id: String,
    pub outputs: Vec<EncodingOutput>,
    pub segment_length: f64,
    pub streams: Vec<MuxingStream>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Keyframe {
    #[serde(default, skip_serializing_if = "is_empty")]
    pub id: String,
    pub time: f64,
    pub segment_cut: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DashProfile {
    Live,
    OnDemand,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashManifest {
    #[serde(default, skip_serializing_if = "is_empty")]
    pub id: String,
    pub name: String,
    pub manifest_name: String,
    pub outputs: Vec<EncodingOutput>,
    pub profile: DashProfile,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Period {
    #[serde(default, skip_serializing_if = "is_empty")]
    pub id: String,
}

/// Media kinds used for adaptation sets, streams and HLS renditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
    Subtitles,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
            MediaKind::Subtitles => "subtitles",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdaptationSet {
    #[serde(default, skip_serializing_if = "is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DashRepresentationType {
    Timeline,
    Template,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashRepresentation {
    #[serde(default, skip_serializing_if = "is_empty")]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: DashRepresentationType,
    pub encoding_id: String,
    pub muxing_id: String,
    pub segment_path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HlsVersion {
    #[serde(rename = "HLS_V6")]
    V6,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HlsManifest {
    #[serde(default, skip_serializing_if = "is_empty")]
    pub id: String,
    pub name: String,
    pub manifest_name: String,
    pub outputs: Vec<EncodingOutput>,
    pub hls_master_playlist_version: HlsVersion,
    pub hls_media_playlist_version: HlsVersion,
}

/// Variant playlist entry of an HLS master playlist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamInfo {
    #[serde(default, skip_serializing_if = "is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitles: Option<String>,
    pub segment_path: String,
    pub uri: String,
    pub encoding_id: String,
    pub stream_id: String,
    pub muxing_id: String,
    pub force_frame_rate_attribute: bool,
    pub force_video_range_attribute: bool,
}

/// Alternative rendition (audio or subtitles) of an HLS master playlist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaInfo {
    #[serde(default, skip_serializing_if = "is_empty")]
    pub id: String,
    pub name: String,
    pub group_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub segment_path: String,
    pub uri: String,
    pub encoding_id: String,
    pub stream_id: String,
    pub muxing_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestResource {
    pub manifest_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartEncodingRequest {
    pub manifest_generator: String,
    pub vod_hls_manifests: Vec<ManifestResource>,
    pub vod_dash_manifests: Vec<ManifestResource>,
}

impl StartEncodingRequest {
    pub fn with_manifests(hls_manifest_id: &str, dash_manifest_id: Option<&str>) -> Self {
        Self {
            manifest_generator: "V2".to_string(),
            vod_hls_manifests: vec![ManifestResource {
                manifest_id: hls_manifest_id.to_string(),
            }],
            vod_dash_manifests: dash_manifest_id
                .map(|id| ManifestResource {
                    manifest_id: id.to_string(),
                })
                .into_iter()
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveAutoShutdownConfiguration {
    pub bytes_read_timeout_seconds: u64,
    pub stream_timeout_minutes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveHlsManifest {
    pub manifest_id: String,
    pub timeshift: f64,
    pub live_edge_offset: f64,
    pub insert_program_date_time: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartLiveEncodingRequest {
    pub stream_key: String,
    pub auto_shutdown_configuration: LiveAutoShutdownConfiguration,
    pub hls_manifests: Vec<LiveHlsManifest>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Created,
    Queued,
    Running,
    Finished,
    Error,
    Canceled,
    TransferError,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Status::Created => "CREATED",
            Status::Queued => "QUEUED",
            Status::Running => "RUNNING",
            Status::Finished => "FINISHED",
            Status::Error => "ERROR",
            Status::Canceled => "CANCELED",
            Status::TransferError => "TRANSFER_ERROR",
            Status::Unknown => "UNKNOWN",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    Error,
    Warning,
    Info,
    Debug,
    Trace,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(rename = "type")]
    pub kind: MessageType,
    #[serde(default)]
    pub text: String,
}

/// Status snapshot of an encoding job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub status: Status,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl Task {
    pub fn error_messages(&self) -> Vec<String> {
        self.messages
            .iter()
            .filter(|message| message.kind == MessageType::Error)
            .map(|message| message.text.clone())
            .collect()
    }
}

/// Ingest coordinates of a running live encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveEncoding {
    pub stream_key: String,
    pub encoder_ip: String,
    #[serde(default)]
    pub application: Option<String>,
}

identified!(
    HttpsInput,
    RtmpInput,
    S3Output,
    H264VideoConfiguration,
    AacAudioConfiguration,
    WebVttConfiguration,
    Encoding,
    FileInputStream,
    Stream,
    Muxing,
    Keyframe,
    DashManifest,
    Period,
    AdaptationSet,
    DashRepresentation,
    HlsManifest,
    StreamInfo,
    MediaInfo,
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_keeps_only_error_severity_messages() {
        let task: Task = serde_json::from_value(serde_json::json!({
            "status": "ERROR",
            "progress": 40.0,
            "messages": [
                {"type": "INFO", "text": "started"},
                {"type": "ERROR", "text": "input not reachable"},
                {"type": "WARNING", "text": "slow transfer"},
                {"type": "ERROR", "text": "muxing aborted"}
            ]
        }))
        .unwrap();
        assert_eq!(task.status, Status::Error);
        assert_eq!(
            task.error_messages(),
            vec!["input not reachable".to_string(), "muxing aborted".to_string()]
        );
    }

    #[test]
    fn unknown_status_values_do_not_break_polling() {
        let task: Task = serde_json::from_value(serde_json::json!({"status": "PAUSED"})).unwrap();
        assert_eq!(task.status, Status::Unknown);
    }

    #[test]
    fn h264_configuration_serializes_provider_field_names() {
        let config = H264VideoConfiguration {
            id: String::new(),
            name: "H.264 240 0.5 Mbit/s".into(),
            preset_configuration: PresetConfiguration::VodStandard,
            height: 240,
            bitrate: 500_000,
            rate: 24.0,
            profile: H264Profile::Baseline,
            level: "1.3".into(),
            adaptive_spatial_transform: Some(false),
            bframes: Some(0),
            cabac: Some(false),
            weighted_prediction_p_frames: Some(WeightedPredictionPFrames::Disabled),
        };
        let value = serde_json::to_value(&config).unwrap();
        assert!(value.get("id").is_none());
        assert_eq!(value["presetConfiguration"], "VOD_STANDARD");
        assert_eq!(value["profile"], "BASELINE");
        assert_eq!(value["weightedPredictionPFrames"], "DISABLED");
        assert_eq!(value["adaptiveSpatialTransform"], false);
    }
}
