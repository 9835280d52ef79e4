use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EncodingSection;
use crate::error::ConfigError;
use crate::resource::{Identified, ResourceKind};

use super::model::{
    AacAudioConfiguration, AdaptationSet, DashManifest, DashRepresentation, Encoding,
    FileInputStream, H264VideoConfiguration, HlsManifest, HttpsInput, Keyframe, LiveEncoding,
    MediaInfo, MediaKind, Muxing, MuxingFormat, Period, RtmpInput, S3Output,
    StartEncodingRequest, StartLiveEncodingRequest, Stream, StreamInfo, Task, WebVttConfiguration,
};
use super::{EncodingError, EncodingResult};

/// Capabilities consumed from the encoding provider.
///
/// Every `create_*` call returns the resource as echoed back by the
/// provider, with its id filled in.
#[async_trait]
pub trait EncodingApi: Send + Sync {
    async fn get_https_input(&self, id: &str) -> EncodingResult<HttpsInput>;
    async fn create_https_input(&self, input: &HttpsInput) -> EncodingResult<HttpsInput>;
    async fn list_rtmp_inputs(&self) -> EncodingResult<Vec<RtmpInput>>;

    async fn get_s3_output(&self, id: &str) -> EncodingResult<S3Output>;
    async fn create_s3_output(&self, output: &S3Output) -> EncodingResult<S3Output>;

    async fn create_h264_configuration(
        &self,
        config: &H264VideoConfiguration,
    ) -> EncodingResult<H264VideoConfiguration>;
    async fn create_aac_configuration(
        &self,
        config: &AacAudioConfiguration,
    ) -> EncodingResult<AacAudioConfiguration>;
    async fn create_webvtt_configuration(
        &self,
        config: &WebVttConfiguration,
    ) -> EncodingResult<WebVttConfiguration>;

    async fn create_encoding(&self, encoding: &Encoding) -> EncodingResult<Encoding>;
    async fn create_file_input_stream(
        &self,
        encoding_id: &str,
        input_stream: &FileInputStream,
    ) -> EncodingResult<FileInputStream>;
    async fn create_stream(&self, encoding_id: &str, stream: &Stream) -> EncodingResult<Stream>;
    async fn create_muxing(
        &self,
        encoding_id: &str,
        format: MuxingFormat,
        muxing: &Muxing,
    ) -> EncodingResult<Muxing>;
    async fn create_keyframe(
        &self,
        encoding_id: &str,
        keyframe: &Keyframe,
    ) -> EncodingResult<Keyframe>;

    async fn create_dash_manifest(&self, manifest: &DashManifest) -> EncodingResult<DashManifest>;
    async fn create_period(&self, manifest_id: &str, period: &Period) -> EncodingResult<Period>;
    async fn create_adaptation_set(
        &self,
        manifest_id: &str,
        period_id: &str,
        kind: MediaKind,
        adaptation_set: &AdaptationSet,
    ) -> EncodingResult<AdaptationSet>;
    async fn create_dash_representation(
        &self,
        manifest_id: &str,
        period_id: &str,
        adaptation_set_id: &str,
        format: MuxingFormat,
        representation: &DashRepresentation,
    ) -> EncodingResult<DashRepresentation>;

    async fn create_hls_manifest(&self, manifest: &HlsManifest) -> EncodingResult<HlsManifest>;
    async fn create_hls_variant(
        &self,
        manifest_id: &str,
        stream_info: &StreamInfo,
    ) -> EncodingResult<StreamInfo>;
    async fn create_hls_media(
        &self,
        manifest_id: &str,
        kind: MediaKind,
        media_info: &MediaInfo,
    ) -> EncodingResult<MediaInfo>;

    async fn start_encoding(
        &self,
        encoding_id: &str,
        request: &StartEncodingRequest,
    ) -> EncodingResult<()>;
    async fn start_live_encoding(
        &self,
        encoding_id: &str,
        request: &StartLiveEncodingRequest,
    ) -> EncodingResult<()>;
    async fn stop_live_encoding(&self, encoding_id: &str) -> EncodingResult<()>;
    async fn encoding_status(&self, encoding_id: &str) -> EncodingResult<Task>;
    async fn live_encoding_details(&self, encoding_id: &str) -> EncodingResult<LiveEncoding>;
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: EnvelopeData<T>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeData<T> {
    result: T,
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

/// Empty JSON result used for calls whose body carries nothing we need.
#[derive(Debug, Deserialize)]
struct Ignored {}

/// REST client for the Bitmovin encoding API.
pub struct HttpEncodingApi {
    client: Client,
    api_base: String,
    api_key: String,
    tenant_org_id: Option<String>,
}

impl HttpEncodingApi {
    pub fn new(client: Client, config: &EncodingSection) -> Result<Self, ConfigError> {
        let tenant_org_id = match &config.tenant_org_id {
            Some(credential) => Some(credential.resolve()?).filter(|value| !value.is_empty()),
            None => None,
        };
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.resolve()?,
            tenant_org_id,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/encoding/{}", self.api_base, path.trim_start_matches('/'))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request
            .header("X-Api-Key", &self.api_key)
            .header("Accept", "application/json");
        match &self.tenant_org_id {
            Some(tenant) => request.header("X-Tenant-Org-Id", tenant),
            None => request,
        }
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        missing: Option<(ResourceKind, &str)>,
    ) -> EncodingResult<T> {
        let endpoint = self.url(path);
        debug!(%endpoint, "GET");
        let response = self.authorize(self.client.get(&endpoint)).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if status == StatusCode::NOT_FOUND {
            if let Some((kind, id)) = missing {
                return Err(EncodingError::ResourceNotFound {
                    kind,
                    id: id.to_string(),
                });
            }
        }
        if !status.is_success() {
            return Err(EncodingError::RemoteRequestFailed {
                endpoint,
                status: status.as_u16(),
                body,
            });
        }
        let envelope: Envelope<T> = serde_json::from_str(&body)?;
        Ok(envelope.data.result)
    }

    async fn post<B, T>(&self, path: &str, payload: &B) -> EncodingResult<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let endpoint = self.url(path);
        debug!(%endpoint, "POST");
        let response = self
            .authorize(self.client.post(&endpoint))
            .json(payload)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(EncodingError::RemoteCreateFailed {
                endpoint,
                status: status.as_u16(),
                body,
            });
        }
        let envelope: Envelope<T> = serde_json::from_str(&body)?;
        Ok(envelope.data.result)
    }

    async fn create<B, T>(&self, path: &str, payload: &B) -> EncodingResult<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned + Identified,
    {
        let created: T = self.post(path, payload).await?;
        if created.resource_id().is_empty() {
            return Err(EncodingError::MissingId {
                endpoint: self.url(path),
            });
        }
        Ok(created)
    }
}

#[async_trait]
impl EncodingApi for HttpEncodingApi {
    async fn get_https_input(&self, id: &str) -> EncodingResult<HttpsInput> {
        self.get(
            &format!("inputs/https/{id}"),
            Some((ResourceKind::HttpsInput, id)),
        )
        .await
    }

    async fn create_https_input(&self, input: &HttpsInput) -> EncodingResult<HttpsInput> {
        self.create("inputs/https", input).await
    }

    async fn list_rtmp_inputs(&self) -> EncodingResult<Vec<RtmpInput>> {
        let page: Page<RtmpInput> = self.get("inputs/rtmp", None).await?;
        Ok(page.items)
    }

    async fn get_s3_output(&self, id: &str) -> EncodingResult<S3Output> {
        self.get(
            &format!("outputs/s3/{id}"),
            Some((ResourceKind::S3Output, id)),
        )
        .await
    }

    async fn create_s3_output(&self, output: &S3Output) -> EncodingResult<S3Output> {
        self.create("outputs/s3", output).await
    }

    async fn create_h264_configuration(
        &self,
        config: &H264VideoConfiguration,
    ) -> EncodingResult<H264VideoConfiguration> {
        self.create("configurations/video/h264", config).await
    }

    async fn create_aac_configuration(
        &self,
        config: &AacAudioConfiguration,
    ) -> EncodingResult<AacAudioConfiguration> {
        self.create("configurations/audio/aac", config).await
    }

    async fn create_webvtt_configuration(
        &self,
        config: &WebVttConfiguration,
    ) -> EncodingResult<WebVttConfiguration> {
        self.create("configurations/subtitles/webvtt", config).await
    }

    async fn create_encoding(&self, encoding: &Encoding) -> EncodingResult<Encoding> {
        self.create("encodings", encoding).await
    }

    async fn create_file_input_stream(
        &self,
        encoding_id: &str,
        input_stream: &FileInputStream,
    ) -> EncodingResult<FileInputStream> {
        self.create(
            &format!("encodings/{encoding_id}/input-streams/file"),
            input_stream,
        )
        .await
    }

    async fn create_stream(&self, encoding_id: &str, stream: &Stream) -> EncodingResult<Stream> {
        self.create(&format!("encodings/{encoding_id}/streams"), stream)
            .await
    }

    async fn create_muxing(
        &self,
        encoding_id: &str,
        format: MuxingFormat,
        muxing: &Muxing,
    ) -> EncodingResult<Muxing> {
        self.create(
            &format!("encodings/{encoding_id}/muxings/{}", format.endpoint()),
            muxing,
        )
        .await
    }

    async fn create_keyframe(
        &self,
        encoding_id: &str,
        keyframe: &Keyframe,
    ) -> EncodingResult<Keyframe> {
        self.create(&format!("encodings/{encoding_id}/keyframes"), keyframe)
            .await
    }

    async fn create_dash_manifest(&self, manifest: &DashManifest) -> EncodingResult<DashManifest> {
        self.create("manifests/dash", manifest).await
    }

    async fn create_period(&self, manifest_id: &str, period: &Period) -> EncodingResult<Period> {
        self.create(&format!("manifests/dash/{manifest_id}/periods"), period)
            .await
    }

    async fn create_adaptation_set(
        &self,
        manifest_id: &str,
        period_id: &str,
        kind: MediaKind,
        adaptation_set: &AdaptationSet,
    ) -> EncodingResult<AdaptationSet> {
        let segment = match kind {
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
            MediaKind::Subtitles => "subtitle",
        };
        self.create(
            &format!("manifests/dash/{manifest_id}/periods/{period_id}/adaptationsets/{segment}"),
            adaptation_set,
        )
        .await
    }

    async fn create_dash_representation(
        &self,
        manifest_id: &str,
        period_id: &str,
        adaptation_set_id: &str,
        format: MuxingFormat,
        representation: &DashRepresentation,
    ) -> EncodingResult<DashRepresentation> {
        self.create(
            &format!(
                "manifests/dash/{manifest_id}/periods/{period_id}/adaptationsets/{adaptation_set_id}/representations/{}",
                format.endpoint()
            ),
            representation,
        )
        .await
    }

    async fn create_hls_manifest(&self, manifest: &HlsManifest) -> EncodingResult<HlsManifest> {
        self.create("manifests/hls", manifest).await
    }

    async fn create_hls_variant(
        &self,
        manifest_id: &str,
        stream_info: &StreamInfo,
    ) -> EncodingResult<StreamInfo> {
        self.create(&format!("manifests/hls/{manifest_id}/streams"), stream_info)
            .await
    }

    async fn create_hls_media(
        &self,
        manifest_id: &str,
        kind: MediaKind,
        media_info: &MediaInfo,
    ) -> EncodingResult<MediaInfo> {
        let segment = match kind {
            MediaKind::Subtitles => "subtitles",
            MediaKind::Audio | MediaKind::Video => "audio",
        };
        self.create(
            &format!("manifests/hls/{manifest_id}/media/{segment}"),
            media_info,
        )
        .await
    }

    async fn start_encoding(
        &self,
        encoding_id: &str,
        request: &StartEncodingRequest,
    ) -> EncodingResult<()> {
        let _: Ignored = self
            .post(&format!("encodings/{encoding_id}/start"), request)
            .await?;
        Ok(())
    }

    async fn start_live_encoding(
        &self,
        encoding_id: &str,
        request: &StartLiveEncodingRequest,
    ) -> EncodingResult<()> {
        let _: Ignored = self
            .post(&format!("encodings/{encoding_id}/live/start"), request)
            .await?;
        Ok(())
    }

    async fn stop_live_encoding(&self, encoding_id: &str) -> EncodingResult<()> {
        let _: Ignored = self
            .post(
                &format!("encodings/{encoding_id}/live/stop"),
                &serde_json::json!({}),
            )
            .await?;
        Ok(())
    }

    async fn encoding_status(&self, encoding_id: &str) -> EncodingResult<Task> {
        self.get(&format!("encodings/{encoding_id}/status"), None)
            .await
    }

    async fn live_encoding_details(&self, encoding_id: &str) -> EncodingResult<LiveEncoding> {
        self.get(&format!("encodings/{encoding_id}/live"), None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credential;

    #[test]
    fn envelope_unwraps_result_payload() {
        let body = r#"{"requestId":"r-1","status":"SUCCESS","data":{"result":{"id":"enc-1","name":"Sintel - x1","description":""}}}"#;
        let envelope: Envelope<Encoding> = serde_json::from_str(body).unwrap();
        assert_eq!(envelope.data.result.id, "enc-1");
        assert_eq!(envelope.data.result.name, "Sintel - x1");
    }

    #[test]
    fn rtmp_listing_reads_items() {
        let body = r#"{"data":{"result":{"totalCount":1,"items":[{"id":"rtmp-1","name":"default"}]}}}"#;
        let envelope: Envelope<Page<RtmpInput>> = serde_json::from_str(body).unwrap();
        assert_eq!(envelope.data.result.items[0].id, "rtmp-1");
    }

    #[test]
    fn endpoints_are_rooted_under_encoding() {
        let api = HttpEncodingApi::new(
            Client::new(),
            &EncodingSection {
                api_key: Credential::Inline("key".into()),
                tenant_org_id: None,
                api_base: "https://api.example.com/v1/".into(),
            },
        )
        .unwrap();
        assert_eq!(
            api.url("/encodings/abc/status"),
            "https://api.example.com/v1/encoding/encodings/abc/status"
        );
        assert!(api.tenant_org_id.is_none());
    }
}
