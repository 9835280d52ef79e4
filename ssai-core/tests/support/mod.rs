#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use ssai_core::adinsertion::model::{
    AdServer, AssetCatalog, LiveSource, NewAdServer, NewAssetCatalog, NewLiveSource, NewService,
    Service, ServiceSource,
};
use ssai_core::adinsertion::{AdInsertionApi, AdInsertionError};
use ssai_core::config::Credential;
use ssai_core::encoding::model::{
    AacAudioConfiguration, AdaptationSet, DashManifest, DashRepresentation, Encoding,
    FileInputStream, H264VideoConfiguration, HlsManifest, HttpsInput, Keyframe, LiveEncoding,
    MediaInfo, MediaKind, Message, MessageType, Muxing, MuxingFormat, Period, RtmpInput, S3Output,
    StartEncodingRequest, StartLiveEncodingRequest, Status, Stream, StreamInfo, Task,
    WebVttConfiguration,
};
use ssai_core::encoding::{EncodingApi, EncodingError};
use ssai_core::readiness::ManifestProbe;
use ssai_core::resource::ResourceKind;

type EncodingResult<T> = Result<T, EncodingError>;
type AdInsertionResult<T> = Result<T, AdInsertionError>;

pub const ENCODER_IP: &str = "10.1.2.3";
pub const PINNED_AD_SERVER_ID: u64 = 7;

pub fn fixture_path(relative: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join(relative)
}

pub fn inline(value: &str) -> Option<Credential> {
    Some(Credential::Inline(value.to_string()))
}

pub fn task(status: Status) -> Task {
    Task {
        status,
        progress: None,
        messages: Vec::new(),
    }
}

pub fn failed_task(messages: &[&str]) -> Task {
    Task {
        status: Status::Error,
        progress: Some(12.0),
        messages: messages
            .iter()
            .map(|text| Message {
                kind: MessageType::Error,
                text: text.to_string(),
            })
            .collect(),
    }
}

/// In-memory encoding provider. Every create echoes the payload back with a
/// fresh id; status checks drain a scripted queue, then repeat `idle`.
pub struct FakeEncoding {
    next_id: AtomicU32,
    calls: Mutex<Vec<String>>,
    statuses: Mutex<VecDeque<Task>>,
    idle: Status,
    rtmp_inputs: Vec<RtmpInput>,
    live_details_failures: Mutex<u32>,
    pub h264: Mutex<Vec<H264VideoConfiguration>>,
    pub https_inputs: Mutex<Vec<HttpsInput>>,
    pub s3_outputs: Mutex<Vec<S3Output>>,
    pub keyframes: Mutex<Vec<Keyframe>>,
    pub start_requests: Mutex<Vec<StartEncodingRequest>>,
    pub live_requests: Mutex<Vec<StartLiveEncodingRequest>>,
}

impl FakeEncoding {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU32::new(1),
            calls: Mutex::new(Vec::new()),
            statuses: Mutex::new(VecDeque::new()),
            idle: Status::Running,
            rtmp_inputs: vec![RtmpInput {
                id: "rtmp-input".into(),
                name: Some("default rtmp".into()),
            }],
            live_details_failures: Mutex::new(0),
            h264: Mutex::new(Vec::new()),
            https_inputs: Mutex::new(Vec::new()),
            s3_outputs: Mutex::new(Vec::new()),
            keyframes: Mutex::new(Vec::new()),
            start_requests: Mutex::new(Vec::new()),
            live_requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_statuses(self, statuses: &[Status]) -> Self {
        self.with_tasks(statuses.iter().copied().map(task).collect())
    }

    pub fn with_tasks(self, tasks: Vec<Task>) -> Self {
        self.statuses.lock().unwrap().extend(tasks);
        self
    }

    pub fn idle_status(mut self, status: Status) -> Self {
        self.idle = status;
        self
    }

    pub fn without_rtmp_inputs(mut self) -> Self {
        self.rtmp_inputs.clear();
        self
    }

    pub fn failing_live_details(self, failures: u32) -> Self {
        *self.live_details_failures.lock().unwrap() = failures;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|recorded| recorded.as_str() == call)
            .count()
    }

    fn record(&self, call: &str) {
        self.calls.lock().unwrap().push(call.to_string());
    }

    fn id(&self, prefix: &str) -> String {
        format!("{prefix}-{}", self.next_id.fetch_add(1, Ordering::SeqCst))
    }
}

#[async_trait]
impl EncodingApi for FakeEncoding {
    async fn get_https_input(&self, id: &str) -> EncodingResult<HttpsInput> {
        self.record("get_https_input");
        if id == "pinned-input" {
            return Ok(HttpsInput {
                id: id.to_string(),
                name: None,
                host: "bpkioassets.s3-eu-west-1.amazonaws.com".into(),
            });
        }
        Err(EncodingError::ResourceNotFound {
            kind: ResourceKind::HttpsInput,
            id: id.to_string(),
        })
    }

    async fn create_https_input(&self, input: &HttpsInput) -> EncodingResult<HttpsInput> {
        self.record("create_https_input");
        let created = HttpsInput {
            id: self.id("input"),
            ..input.clone()
        };
        self.https_inputs.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn list_rtmp_inputs(&self) -> EncodingResult<Vec<RtmpInput>> {
        self.record("list_rtmp_inputs");
        Ok(self.rtmp_inputs.clone())
    }

    async fn get_s3_output(&self, id: &str) -> EncodingResult<S3Output> {
        self.record("get_s3_output");
        Err(EncodingError::ResourceNotFound {
            kind: ResourceKind::S3Output,
            id: id.to_string(),
        })
    }

    async fn create_s3_output(&self, output: &S3Output) -> EncodingResult<S3Output> {
        self.record("create_s3_output");
        let created = S3Output {
            id: self.id("output"),
            ..output.clone()
        };
        self.s3_outputs.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn create_h264_configuration(
        &self,
        config: &H264VideoConfiguration,
    ) -> EncodingResult<H264VideoConfiguration> {
        self.record("create_h264_configuration");
        let created = H264VideoConfiguration {
            id: self.id("h264"),
            ..config.clone()
        };
        self.h264.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn create_aac_configuration(
        &self,
        config: &AacAudioConfiguration,
    ) -> EncodingResult<AacAudioConfiguration> {
        self.record("create_aac_configuration");
        Ok(AacAudioConfiguration {
            id: self.id("aac"),
            ..config.clone()
        })
    }

    async fn create_webvtt_configuration(
        &self,
        config: &WebVttConfiguration,
    ) -> EncodingResult<WebVttConfiguration> {
        self.record("create_webvtt_configuration");
        Ok(WebVttConfiguration {
            id: self.id("webvtt"),
            ..config.clone()
        })
    }

    async fn create_encoding(&self, encoding: &Encoding) -> EncodingResult<Encoding> {
        self.record("create_encoding");
        Ok(Encoding {
            id: self.id("encoding"),
            ..encoding.clone()
        })
    }

    async fn create_file_input_stream(
        &self,
        _encoding_id: &str,
        input_stream: &FileInputStream,
    ) -> EncodingResult<FileInputStream> {
        self.record("create_file_input_stream");
        Ok(FileInputStream {
            id: self.id("file-input-stream"),
            ..input_stream.clone()
        })
    }

    async fn create_stream(&self, _encoding_id: &str, stream: &Stream) -> EncodingResult<Stream> {
        self.record("create_stream");
        Ok(Stream {
            id: self.id("stream"),
            ..stream.clone()
        })
    }

    async fn create_muxing(
        &self,
        _encoding_id: &str,
        format: MuxingFormat,
        muxing: &Muxing,
    ) -> EncodingResult<Muxing> {
        self.record(&format!("create_muxing:{format}"));
        Ok(Muxing {
            id: self.id("muxing"),
            ..muxing.clone()
        })
    }

    async fn create_keyframe(
        &self,
        _encoding_id: &str,
        keyframe: &Keyframe,
    ) -> EncodingResult<Keyframe> {
        self.record("create_keyframe");
        let created = Keyframe {
            id: self.id("keyframe"),
            ..keyframe.clone()
        };
        self.keyframes.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn create_dash_manifest(&self, manifest: &DashManifest) -> EncodingResult<DashManifest> {
        self.record("create_dash_manifest");
        Ok(DashManifest {
            id: self.id("dash"),
            ..manifest.clone()
        })
    }

    async fn create_period(&self, _manifest_id: &str, _period: &Period) -> EncodingResult<Period> {
        self.record("create_period");
        Ok(Period {
            id: self.id("period"),
        })
    }

    async fn create_adaptation_set(
        &self,
        _manifest_id: &str,
        _period_id: &str,
        kind: MediaKind,
        adaptation_set: &AdaptationSet,
    ) -> EncodingResult<AdaptationSet> {
        self.record(&format!("create_adaptation_set:{kind}"));
        Ok(AdaptationSet {
            id: self.id("adaptation-set"),
            ..adaptation_set.clone()
        })
    }

    async fn create_dash_representation(
        &self,
        _manifest_id: &str,
        _period_id: &str,
        _adaptation_set_id: &str,
        format: MuxingFormat,
        representation: &DashRepresentation,
    ) -> EncodingResult<DashRepresentation> {
        self.record(&format!("create_dash_representation:{format}"));
        Ok(DashRepresentation {
            id: self.id("representation"),
            ..representation.clone()
        })
    }

    async fn create_hls_manifest(&self, manifest: &HlsManifest) -> EncodingResult<HlsManifest> {
        self.record("create_hls_manifest");
        Ok(HlsManifest {
            id: self.id("hls"),
            ..manifest.clone()
        })
    }

    async fn create_hls_variant(
        &self,
        _manifest_id: &str,
        stream_info: &StreamInfo,
    ) -> EncodingResult<StreamInfo> {
        self.record("create_hls_variant");
        Ok(StreamInfo {
            id: self.id("variant"),
            ..stream_info.clone()
        })
    }

    async fn create_hls_media(
        &self,
        _manifest_id: &str,
        kind: MediaKind,
        media_info: &MediaInfo,
    ) -> EncodingResult<MediaInfo> {
        self.record(&format!("create_hls_media:{kind}"));
        Ok(MediaInfo {
            id: self.id("media"),
            ..media_info.clone()
        })
    }

    async fn start_encoding(
        &self,
        _encoding_id: &str,
        request: &StartEncodingRequest,
    ) -> EncodingResult<()> {
        self.record("start_encoding");
        self.start_requests.lock().unwrap().push(request.clone());
        Ok(())
    }

    async fn start_live_encoding(
        &self,
        _encoding_id: &str,
        request: &StartLiveEncodingRequest,
    ) -> EncodingResult<()> {
        self.record("start_live_encoding");
        self.live_requests.lock().unwrap().push(request.clone());
        Ok(())
    }

    async fn stop_live_encoding(&self, _encoding_id: &str) -> EncodingResult<()> {
        self.record("stop_live_encoding");
        Ok(())
    }

    async fn encoding_status(&self, _encoding_id: &str) -> EncodingResult<Task> {
        self.record("encoding_status");
        let next = self.statuses.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| task(self.idle)))
    }

    async fn live_encoding_details(&self, encoding_id: &str) -> EncodingResult<LiveEncoding> {
        self.record("live_encoding_details");
        let mut failures = self.live_details_failures.lock().unwrap();
        if *failures > 0 {
            *failures -= 1;
            return Err(EncodingError::RemoteRequestFailed {
                endpoint: format!("encodings/live/{encoding_id}/live"),
                status: 404,
                body: "not yet available".into(),
            });
        }
        Ok(LiveEncoding {
            stream_key: "myStreamKey".into(),
            encoder_ip: ENCODER_IP.into(),
            application: Some("live".into()),
        })
    }
}

/// In-memory ad-insertion provider with numeric ids starting at 100.
pub struct FakeAds {
    next_id: AtomicU64,
    calls: Mutex<Vec<String>>,
    pub ad_servers: Mutex<Vec<NewAdServer>>,
    pub catalogs: Mutex<Vec<(u64, NewAssetCatalog)>>,
    pub live_sources: Mutex<Vec<NewLiveSource>>,
    pub services: Mutex<Vec<(u64, NewService)>>,
}

impl FakeAds {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(100),
            calls: Mutex::new(Vec::new()),
            ad_servers: Mutex::new(Vec::new()),
            catalogs: Mutex::new(Vec::new()),
            live_sources: Mutex::new(Vec::new()),
            services: Mutex::new(Vec::new()),
        }
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|recorded| recorded.as_str() == call)
            .count()
    }

    fn record(&self, call: &str) {
        self.calls.lock().unwrap().push(call.to_string());
    }

    fn id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    fn not_found(kind: ResourceKind, id: &str) -> AdInsertionError {
        AdInsertionError::ResourceNotFound {
            kind,
            id: id.to_string(),
        }
    }
}

pub fn service_url(id: u64) -> String {
    format!("https://stream.broadpeak.io/{id}/")
}

#[async_trait]
impl AdInsertionApi for FakeAds {
    async fn get_ad_server(&self, id: &str) -> AdInsertionResult<AdServer> {
        self.record("get_ad_server");
        if id == PINNED_AD_SERVER_ID.to_string() {
            return Ok(AdServer {
                id: PINNED_AD_SERVER_ID,
                name: "pinned".into(),
                url: None,
            });
        }
        Err(Self::not_found(ResourceKind::AdServer, id))
    }

    async fn create_ad_server(&self, payload: &NewAdServer) -> AdInsertionResult<AdServer> {
        self.record("create_ad_server");
        self.ad_servers.lock().unwrap().push(payload.clone());
        Ok(AdServer {
            id: self.id(),
            name: payload.name.clone(),
            url: payload.url.clone(),
        })
    }

    async fn get_asset_catalog(&self, id: &str) -> AdInsertionResult<AssetCatalog> {
        self.record("get_asset_catalog");
        self.catalogs
            .lock()
            .unwrap()
            .iter()
            .find(|(known, _)| known.to_string() == id)
            .map(|(known, payload)| AssetCatalog {
                id: *known,
                name: payload.name.clone(),
                url: payload.url.clone(),
            })
            .ok_or_else(|| Self::not_found(ResourceKind::AssetCatalog, id))
    }

    async fn create_asset_catalog(
        &self,
        payload: &NewAssetCatalog,
    ) -> AdInsertionResult<AssetCatalog> {
        self.record("create_asset_catalog");
        let id = self.id();
        self.catalogs.lock().unwrap().push((id, payload.clone()));
        Ok(AssetCatalog {
            id,
            name: payload.name.clone(),
            url: payload.url.clone(),
        })
    }

    async fn create_live_source(&self, payload: &NewLiveSource) -> AdInsertionResult<LiveSource> {
        self.record("create_live_source");
        self.live_sources.lock().unwrap().push(payload.clone());
        Ok(LiveSource {
            id: self.id(),
            name: payload.name.clone(),
            url: payload.url.clone(),
        })
    }

    async fn get_service(&self, id: &str) -> AdInsertionResult<Service> {
        self.record("get_service");
        let services = self.services.lock().unwrap();
        let (service_id, payload) = services
            .iter()
            .find(|(known, _)| known.to_string() == id)
            .ok_or_else(|| Self::not_found(ResourceKind::AdInsertionService, id))?;
        let catalogs: HashMap<u64, String> = self
            .catalogs
            .lock()
            .unwrap()
            .iter()
            .map(|(catalog_id, catalog)| (*catalog_id, catalog.url.clone()))
            .collect();
        Ok(Service {
            id: *service_id,
            name: payload.name.clone(),
            url: service_url(*service_id),
            source: Some(ServiceSource {
                id: Some(payload.source.id),
                url: catalogs.get(&payload.source.id).cloned(),
            }),
        })
    }

    async fn create_service(&self, payload: &NewService) -> AdInsertionResult<Service> {
        self.record("create_service");
        let id = self.id();
        self.services.lock().unwrap().push((id, payload.clone()));
        Ok(Service {
            id,
            name: payload.name.clone(),
            url: service_url(id),
            source: None,
        })
    }
}

/// Probe where listed URLs fail a fixed number of times before answering.
pub struct FakeProbe {
    failures: Mutex<HashMap<String, u32>>,
    always_missing: bool,
    checks: AtomicU32,
}

impl FakeProbe {
    pub fn ready() -> Self {
        Self {
            failures: Mutex::new(HashMap::new()),
            always_missing: false,
            checks: AtomicU32::new(0),
        }
    }

    pub fn never_ready() -> Self {
        Self {
            always_missing: true,
            ..Self::ready()
        }
    }

    pub fn failing(url: &str, times: u32) -> Self {
        let probe = Self::ready();
        probe.failures.lock().unwrap().insert(url.to_string(), times);
        probe
    }

    pub fn checks(&self) -> u32 {
        self.checks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ManifestProbe for FakeProbe {
    async fn is_available(&self, url: &str) -> bool {
        self.checks.fetch_add(1, Ordering::SeqCst);
        if self.always_missing {
            return false;
        }
        let mut failures = self.failures.lock().unwrap();
        match failures.get_mut(url) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                false
            }
            _ => true,
        }
    }
}
