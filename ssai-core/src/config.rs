use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

pub const DEFAULT_ENCODING_API_BASE: &str = "https://api.bitmovin.com/v1";
pub const DEFAULT_AD_INSERTION_API_BASE: &str = "https://api.broadpeak.io/v1";

/// Configuration for a single VOD run: encode a source file, package it and
/// register it behind an ad-insertion service.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct VodConfig {
    pub encoding: EncodingSection,
    pub ad_insertion: AdInsertionSection,
    pub output: OutputSection,
    pub source: SourceSection,
    pub ladder: LadderSection,
    #[serde(default)]
    pub cdn: CdnSection,
    #[serde(default)]
    pub languages: LanguageLabels,
    #[serde(default)]
    pub polling: PollingSection,
    #[serde(default)]
    pub run: RunSection,
}

impl VodConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        self.output.validate()?;
        self.ladder.validate()?;
        if self.source.url.trim().is_empty() {
            return Err(ConfigError::invalid("source.url must not be empty"));
        }
        if self.source.input_id.is_none() {
            url::Url::parse(&self.source.url).map_err(|err| {
                ConfigError::invalid(format!("source.url is not a valid URL: {err}"))
            })?;
        }
        for track in self.source.audio.iter().chain(&self.source.subtitles) {
            if track.language.trim().is_empty() {
                return Err(ConfigError::invalid("source track language must not be empty"));
            }
        }
        if self.source.subtitles.iter().any(|track| track.path.is_none()) {
            return Err(ConfigError::invalid("subtitle tracks need a path"));
        }
        Ok(())
    }
}

/// Configuration for a live run fed over RTMP with a pre-roll ad service.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LiveConfig {
    pub encoding: EncodingSection,
    pub ad_insertion: AdInsertionSection,
    pub output: OutputSection,
    pub ladder: LadderSection,
    pub live: LiveSection,
    #[serde(default)]
    pub cdn: CdnSection,
    #[serde(default)]
    pub polling: PollingSection,
    #[serde(default)]
    pub run: RunSection,
}

impl LiveConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        self.output.validate()?;
        self.ladder.validate()?;
        if self.live.stream_key.trim().is_empty() {
            return Err(ConfigError::invalid("live.stream_key must not be empty"));
        }
        Ok(())
    }
}

/// A secret given either inline or through an environment variable.
#[derive(Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Credential {
    Inline(String),
    Env { env: String },
}

impl Credential {
    pub fn resolve(&self) -> ConfigResult<String> {
        match self {
            Credential::Inline(value) => Ok(value.clone()),
            Credential::Env { env } => {
                std::env::var(env).map_err(|_| ConfigError::MissingEnv { var: env.clone() })
            }
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Inline(_) => f.write_str("Credential::Inline(<redacted>)"),
            Credential::Env { env } => write!(f, "Credential::Env({env})"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EncodingSection {
    pub api_key: Credential,
    #[serde(default)]
    pub tenant_org_id: Option<Credential>,
    #[serde(default = "default_encoding_api_base")]
    pub api_base: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdInsertionSection {
    pub api_key: Credential,
    #[serde(default = "default_ad_insertion_api_base")]
    pub api_base: String,
    #[serde(default)]
    pub transcoding_profile_id: Option<u64>,
    pub vast_tag: String,
    #[serde(default)]
    pub ad_server_id: Option<u64>,
    #[serde(default)]
    pub asset_catalog_id: Option<u64>,
    #[serde(default)]
    pub service_id: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputSection {
    #[serde(default)]
    pub output_id: Option<String>,
    #[serde(default)]
    pub bucket_name: Option<String>,
    #[serde(default)]
    pub access_key: Option<Credential>,
    #[serde(default)]
    pub secret_key: Option<Credential>,
    pub base_path: String,
}

impl OutputSection {
    fn validate(&self) -> ConfigResult<()> {
        if self.output_id.is_some() {
            return Ok(());
        }
        if self.bucket_name.as_deref().map_or(true, str::is_empty) {
            return Err(ConfigError::invalid(
                "output.bucket_name is required when output.output_id is not pinned",
            ));
        }
        if self.access_key.is_none() || self.secret_key.is_none() {
            return Err(ConfigError::invalid(
                "output.access_key and output.secret_key are required when output.output_id is not pinned",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceSection {
    /// Full URL of the source video file on an HTTPS server.
    pub url: String,
    #[serde(default)]
    pub input_id: Option<String>,
    #[serde(default)]
    pub audio: Vec<SourceTrack>,
    #[serde(default)]
    pub subtitles: Vec<SourceTrack>,
    #[serde(default)]
    pub splice_points: Vec<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceTrack {
    pub language: String,
    /// Path on the input host. Audio tracks fall back to the video file.
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CdnSection {
    #[serde(default)]
    pub fqdn: Option<String>,
}

/// Human-readable labels keyed by language code.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct LanguageLabels(pub BTreeMap<String, String>);

impl LanguageLabels {
    pub fn label_for(&self, language: &str) -> String {
        self.0
            .get(language)
            .cloned()
            .unwrap_or_else(|| language.to_string())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LadderSection {
    pub frame_rate: f64,
    pub segment_duration: f64,
    pub renditions: Vec<RenditionDescriptor>,
}

impl LadderSection {
    pub fn video(&self) -> impl Iterator<Item = &VideoRendition> {
        self.renditions.iter().filter_map(|r| match r {
            RenditionDescriptor::Video(video) => Some(video),
            RenditionDescriptor::Audio(_) => None,
        })
    }

    pub fn audio(&self) -> impl Iterator<Item = &AudioRendition> {
        self.renditions.iter().filter_map(|r| match r {
            RenditionDescriptor::Audio(audio) => Some(audio),
            RenditionDescriptor::Video(_) => None,
        })
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.segment_duration <= 0.0 {
            return Err(ConfigError::invalid("ladder.segment_duration must be positive"));
        }
        if self.frame_rate <= 0.0 {
            return Err(ConfigError::invalid("ladder.frame_rate must be positive"));
        }
        if self.video().next().is_none() {
            return Err(ConfigError::invalid("ladder needs at least one video rendition"));
        }
        if self.audio().next().is_none() {
            return Err(ConfigError::invalid("ladder needs at least one audio rendition"));
        }
        if self.renditions.iter().any(|r| r.bitrate() == 0) {
            return Err(ConfigError::invalid("rendition bitrate must be positive"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RenditionDescriptor {
    Video(VideoRendition),
    Audio(AudioRendition),
}

impl RenditionDescriptor {
    pub fn bitrate(&self) -> u64 {
        match self {
            RenditionDescriptor::Video(video) => video.bitrate,
            RenditionDescriptor::Audio(audio) => audio.bitrate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct VideoRendition {
    pub height: u32,
    pub bitrate: u64,
    pub profile: H264Profile,
    pub level: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AudioRendition {
    pub bitrate: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum H264Profile {
    #[serde(alias = "baseline")]
    Baseline,
    #[serde(alias = "main")]
    Main,
    #[serde(alias = "high")]
    High,
}

impl H264Profile {
    pub fn as_str(&self) -> &'static str {
        match self {
            H264Profile::Baseline => "baseline",
            H264Profile::Main => "main",
            H264Profile::High => "high",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LiveSection {
    pub stream_key: String,
    #[serde(default = "default_true")]
    pub dummy_feed: bool,
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,
    #[serde(default = "default_bytes_read_timeout")]
    pub bytes_read_timeout_seconds: u64,
    #[serde(default = "default_stream_timeout")]
    pub stream_timeout_minutes: u64,
    #[serde(default = "default_live_edge_offset")]
    pub live_edge_offset: f64,
    #[serde(default = "default_timeshift")]
    pub timeshift: f64,
}

/// Interval and timeout budgets for every wait in the run.
#[derive(Debug, Clone, Deserialize)]
pub struct PollingSection {
    #[serde(default = "default_five")]
    pub vod_interval_seconds: u64,
    #[serde(default = "default_vod_timeout")]
    pub vod_timeout_minutes: f64,
    #[serde(default = "default_fifteen")]
    pub status_interval_seconds: u64,
    #[serde(default = "default_five_minutes")]
    pub status_timeout_minutes: f64,
    #[serde(default = "default_five")]
    pub live_details_interval_seconds: u64,
    #[serde(default = "default_five_minutes")]
    pub live_details_timeout_minutes: f64,
    #[serde(default = "default_five")]
    pub manifest_interval_seconds: u64,
    #[serde(default = "default_manifest_timeout")]
    pub manifest_timeout_minutes: f64,
}

impl Default for PollingSection {
    fn default() -> Self {
        Self {
            vod_interval_seconds: default_five(),
            vod_timeout_minutes: default_vod_timeout(),
            status_interval_seconds: default_fifteen(),
            status_timeout_minutes: default_five_minutes(),
            live_details_interval_seconds: default_five(),
            live_details_timeout_minutes: default_five_minutes(),
            manifest_interval_seconds: default_five(),
            manifest_timeout_minutes: default_manifest_timeout(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunSection {
    /// Fixed run id; a random one is generated when absent.
    #[serde(default)]
    pub job_id: Option<String>,
}

fn default_encoding_api_base() -> String {
    DEFAULT_ENCODING_API_BASE.to_string()
}

fn default_ad_insertion_api_base() -> String {
    DEFAULT_AD_INSERTION_API_BASE.to_string()
}

fn default_true() -> bool {
    true
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}

fn default_bytes_read_timeout() -> u64 {
    3600
}

fn default_stream_timeout() -> u64 {
    60
}

fn default_live_edge_offset() -> f64 {
    30.0
}

fn default_timeshift() -> f64 {
    300.0
}

fn default_five() -> u64 {
    5
}

fn default_fifteen() -> u64 {
    15
}

fn default_five_minutes() -> f64 {
    5.0
}

fn default_vod_timeout() -> f64 {
    12.0 * 60.0
}

fn default_manifest_timeout() -> f64 {
    2.0
}

pub fn load_vod_config<P: AsRef<Path>>(path: P) -> ConfigResult<VodConfig> {
    let config: VodConfig = load_toml(path.as_ref())?;
    config.validate()?;
    Ok(config)
}

pub fn load_live_config<P: AsRef<Path>>(path: P) -> ConfigResult<LiveConfig> {
    let config: LiveConfig = load_toml(path.as_ref())?;
    config.validate()?;
    Ok(config)
}

fn load_toml<T, P>(path: P) -> ConfigResult<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        source,
        path: path.to_path_buf(),
    })
}
