//! In-memory model of an encoding job and the ordered sequence of remote
//! creates that populates it.
//!
//! Every create embeds ids returned by earlier ones (stream before muxing,
//! muxing before representation or playlist entry), so nothing here is
//! issued speculatively. Paths and playlist names are pure functions of the
//! rendition so that origin URLs can be rebuilt without querying the job.

use serde::Serialize;
use tracing::{debug, info};

use super::api::EncodingApi;
use super::ladder::CodecConfigHandle;
use super::model::{
    AclEntry, AclPermission, AdaptationSet, DashManifest, DashProfile, DashRepresentation,
    DashRepresentationType, Encoding, EncodingOutput, FileInputStream, HlsManifest, HlsVersion,
    Keyframe, LiveAutoShutdownConfiguration, LiveHlsManifest, MediaInfo, MediaKind, Muxing,
    MuxingFormat, MuxingStream, Period, StartEncodingRequest, StartLiveEncodingRequest, Stream,
    StreamInfo, StreamInput,
};
use super::{EncodingError, EncodingResult};

pub const HLS_MANIFEST_NAME: &str = "stream.m3u8";
pub const DASH_MANIFEST_NAME: &str = "stream.mpd";
pub const AUDIO_GROUP_ID: &str = "AUDIO";
pub const SUBTITLE_GROUP_ID: &str = "SUBS";
pub const LIVE_AUDIO_LANGUAGE: &str = "en";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum GraphStage {
    Created,
    ManifestsAllocated,
    VideoWired,
    AudioWired,
    SubtitlesWired,
    KeyframesAttached,
    ReadyToStart,
}

impl GraphStage {
    /// Next stage of the build. Live graphs carry no subtitles.
    pub fn successor(self, live: bool) -> Option<GraphStage> {
        match self {
            GraphStage::Created => Some(GraphStage::ManifestsAllocated),
            GraphStage::ManifestsAllocated => Some(GraphStage::VideoWired),
            GraphStage::VideoWired => Some(GraphStage::AudioWired),
            GraphStage::AudioWired if live => Some(GraphStage::KeyframesAttached),
            GraphStage::AudioWired => Some(GraphStage::SubtitlesWired),
            GraphStage::SubtitlesWired => Some(GraphStage::KeyframesAttached),
            GraphStage::KeyframesAttached => Some(GraphStage::ReadyToStart),
            GraphStage::ReadyToStart => None,
        }
    }
}

/// Joins path fragments with exactly one `/` between non-empty segments.
pub fn join_path(parts: &[&str]) -> String {
    parts
        .iter()
        .flat_map(|part| part.split('/'))
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// `{kind}[_{lang}]/{bitrate}/{format}`; subtitles carry no bitrate.
pub fn rendition_path(
    kind: MediaKind,
    language: Option<&str>,
    bitrate: Option<u64>,
    format: MuxingFormat,
) -> String {
    let mut path = match language {
        Some(lang) => format!("{}_{}", kind.as_str(), lang),
        None => kind.as_str().to_string(),
    };
    if let Some(bitrate) = bitrate {
        path.push('/');
        path.push_str(&bitrate.to_string());
    }
    path.push('/');
    path.push_str(format.path_segment());
    path
}

pub fn video_playlist_uri(height: u32, bitrate: u64) -> String {
    format!("video_{height}p_{bitrate}.m3u8")
}

pub fn audio_playlist_uri(language: Option<&str>, bitrate: u64) -> String {
    match language {
        Some(lang) => format!("audio_{lang}_{bitrate}.m3u8"),
        None => format!("audio_{bitrate}.m3u8"),
    }
}

pub fn subtitle_playlist_uri(language: &str) -> String {
    format!("subtitles_{language}.m3u8")
}

/// Storage destination of every muxing and manifest of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputTarget {
    pub output_id: String,
    pub base_path: String,
}

impl OutputTarget {
    pub fn absolute_path(&self, relative: &str) -> String {
        join_path(&[&self.base_path, relative])
    }

    pub fn encoding_output(&self, relative: &str) -> EncodingOutput {
        EncodingOutput {
            output_id: self.output_id.clone(),
            output_path: self.absolute_path(relative),
            acl: vec![AclEntry {
                permission: AclPermission::PublicRead,
            }],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AudioTrack {
    pub language: Option<String>,
    pub label: String,
    pub input_path: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleTrack {
    pub language: String,
    pub label: String,
    pub input_path: String,
}

#[derive(Debug, Clone)]
pub struct VodJobSpec {
    pub name: String,
    pub input_id: String,
    pub video_input_path: String,
    /// Empty means a single unlabeled track taken from the video file.
    pub audio_tracks: Vec<AudioTrack>,
    pub subtitle_tracks: Vec<SubtitleTrack>,
    pub subtitle_config_id: Option<String>,
    pub output_prefix: String,
    pub segment_duration: f64,
    pub splice_points: Vec<f64>,
}

impl VodJobSpec {
    fn effective_audio_tracks(&self) -> Vec<AudioTrack> {
        if self.audio_tracks.is_empty() {
            vec![AudioTrack {
                language: None,
                label: String::new(),
                input_path: self.video_input_path.clone(),
            }]
        } else {
            self.audio_tracks.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LiveParameters {
    pub stream_key: String,
    pub bytes_read_timeout_seconds: u64,
    pub stream_timeout_minutes: u64,
    pub timeshift: f64,
    pub live_edge_offset: f64,
}

#[derive(Debug, Clone)]
pub struct LiveJobSpec {
    pub name: String,
    pub input_id: String,
    pub input_path: String,
    pub output_prefix: String,
    pub segment_duration: f64,
    pub parameters: LiveParameters,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamRecord {
    pub id: String,
    pub kind: MediaKind,
    pub language: Option<String>,
    pub codec_config_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MuxingRecord {
    pub id: String,
    pub format: MuxingFormat,
    pub stream_id: String,
    pub relative_path: String,
    pub output_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdaptationSetRecord {
    pub id: String,
    pub kind: MediaKind,
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepresentationRecord {
    pub id: String,
    pub adaptation_set_id: String,
    pub muxing_id: String,
    pub format: MuxingFormat,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashTree {
    pub manifest: DashManifest,
    pub period_id: String,
    pub adaptation_sets: Vec<AdaptationSetRecord>,
    pub representations: Vec<RepresentationRecord>,
}

impl DashTree {
    fn adaptation_set_id(&self, kind: MediaKind, language: Option<&str>) -> EncodingResult<String> {
        self.adaptation_sets
            .iter()
            .find(|set| set.kind == kind && set.language.as_deref() == language)
            .map(|set| set.id.clone())
            .ok_or_else(|| EncodingError::MissingAdaptationSet {
                kind,
                language: language.map(str::to_string),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariantRecord {
    pub id: String,
    pub stream_id: String,
    pub muxing_id: String,
    pub uri: String,
    pub audio_group: Option<String>,
    pub subtitle_group: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaRecord {
    pub id: String,
    pub kind: MediaKind,
    pub group_id: String,
    pub name: String,
    pub language: Option<String>,
    pub muxing_id: String,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HlsTree {
    pub manifest: HlsManifest,
    pub variants: Vec<VariantRecord>,
    pub media: Vec<MediaRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestFormat {
    Hls,
    Dash,
}

impl std::fmt::Display for ManifestFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ManifestFormat::Hls => f.write_str("HLS"),
            ManifestFormat::Dash => f.write_str("DASH"),
        }
    }
}

/// Where a manifest lands on the output storage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManifestLocation {
    pub format: ManifestFormat,
    pub output_path: String,
    pub manifest_name: String,
}

#[derive(Debug, Clone)]
pub struct JobGraph {
    pub encoding: Encoding,
    pub stage: GraphStage,
    pub history: Vec<GraphStage>,
    pub streams: Vec<StreamRecord>,
    pub muxings: Vec<MuxingRecord>,
    pub dash: Option<DashTree>,
    pub hls: Option<HlsTree>,
    pub keyframes: Vec<Keyframe>,
    pub live: Option<LiveParameters>,
}

impl JobGraph {
    fn new(encoding: Encoding, live: Option<LiveParameters>) -> Self {
        Self {
            encoding,
            stage: GraphStage::Created,
            history: vec![GraphStage::Created],
            streams: Vec::new(),
            muxings: Vec::new(),
            dash: None,
            hls: None,
            keyframes: Vec::new(),
            live,
        }
    }

    pub fn encoding_id(&self) -> &str {
        &self.encoding.id
    }

    pub fn is_live(&self) -> bool {
        self.live.is_some()
    }

    fn advance(&mut self, next: GraphStage) {
        debug_assert_eq!(self.stage.successor(self.is_live()), Some(next));
        self.stage = next;
        self.history.push(next);
        debug!(encoding_id = %self.encoding.id, stage = ?next, "job graph advanced");
    }

    pub fn streams_of(&self, kind: MediaKind) -> impl Iterator<Item = &StreamRecord> {
        self.streams.iter().filter(move |stream| stream.kind == kind)
    }

    pub fn muxings_of(&self, format: MuxingFormat) -> impl Iterator<Item = &MuxingRecord> {
        self.muxings.iter().filter(move |muxing| muxing.format == format)
    }

    /// HLS first, then DASH when present.
    pub fn manifest_locations(&self) -> Vec<ManifestLocation> {
        let mut locations = Vec::new();
        if let Some(hls) = &self.hls {
            if let Some(output) = hls.manifest.outputs.first() {
                locations.push(ManifestLocation {
                    format: ManifestFormat::Hls,
                    output_path: output.output_path.clone(),
                    manifest_name: hls.manifest.manifest_name.clone(),
                });
            }
        }
        if let Some(dash) = &self.dash {
            if let Some(output) = dash.manifest.outputs.first() {
                locations.push(ManifestLocation {
                    format: ManifestFormat::Dash,
                    output_path: output.output_path.clone(),
                    manifest_name: dash.manifest.manifest_name.clone(),
                });
            }
        }
        locations
    }

    pub fn start_request(&self) -> Option<StartEncodingRequest> {
        let hls = self.hls.as_ref()?;
        Some(StartEncodingRequest::with_manifests(
            &hls.manifest.id,
            self.dash.as_ref().map(|dash| dash.manifest.id.as_str()),
        ))
    }

    pub fn live_start_request(&self) -> Option<StartLiveEncodingRequest> {
        let parameters = self.live.as_ref()?;
        let hls = self.hls.as_ref()?;
        Some(StartLiveEncodingRequest {
            stream_key: parameters.stream_key.clone(),
            auto_shutdown_configuration: LiveAutoShutdownConfiguration {
                bytes_read_timeout_seconds: parameters.bytes_read_timeout_seconds,
                stream_timeout_minutes: parameters.stream_timeout_minutes,
            },
            hls_manifests: vec![LiveHlsManifest {
                manifest_id: hls.manifest.id.clone(),
                timeshift: parameters.timeshift,
                live_edge_offset: parameters.live_edge_offset,
                insert_program_date_time: true,
            }],
        })
    }
}

/// Rendition-level inputs shared by the per-stream wiring steps.
struct Wiring<'s> {
    encoding_id: &'s str,
    prefix: &'s str,
    segment_duration: f64,
    formats: &'s [MuxingFormat],
    /// HLS audio media language when the track itself carries none.
    media_language: Option<&'s str>,
}

pub struct JobGraphBuilder<'a> {
    api: &'a dyn EncodingApi,
    output: OutputTarget,
}

impl<'a> JobGraphBuilder<'a> {
    pub fn new(api: &'a dyn EncodingApi, output: OutputTarget) -> Self {
        Self { api, output }
    }

    pub async fn build_vod(
        &self,
        spec: &VodJobSpec,
        configs: &[CodecConfigHandle],
    ) -> EncodingResult<JobGraph> {
        let encoding = self
            .api
            .create_encoding(&Encoding {
                id: String::new(),
                name: spec.name.clone(),
                description: String::new(),
            })
            .await?;
        info!(encoding_id = %encoding.id, name = %spec.name, "encoding created");
        let mut graph = JobGraph::new(encoding, None);
        let audio_tracks = spec.effective_audio_tracks();

        let audio_languages: Vec<Option<String>> =
            audio_tracks.iter().map(|track| track.language.clone()).collect();
        let subtitle_languages: Vec<String> = spec
            .subtitle_tracks
            .iter()
            .map(|track| track.language.clone())
            .collect();
        graph.dash = Some(
            self.allocate_dash(&spec.output_prefix, &audio_languages, &subtitle_languages)
                .await?,
        );
        graph.hls = Some(self.allocate_hls(&spec.output_prefix).await?);
        graph.advance(GraphStage::ManifestsAllocated);

        let encoding_id = graph.encoding.id.clone();
        let wiring = Wiring {
            encoding_id: &encoding_id,
            prefix: &spec.output_prefix,
            segment_duration: spec.segment_duration,
            formats: &[MuxingFormat::Ts, MuxingFormat::Fmp4],
            media_language: None,
        };
        let subtitle_group = if spec.subtitle_tracks.is_empty() {
            None
        } else {
            Some(SUBTITLE_GROUP_ID)
        };

        for handle in configs {
            if let CodecConfigHandle::Video { id, height, bitrate } = handle {
                self.wire_video(
                    &mut graph,
                    &wiring,
                    &spec.input_id,
                    &spec.video_input_path,
                    id,
                    *height,
                    *bitrate,
                    subtitle_group,
                )
                .await?;
            }
        }
        graph.advance(GraphStage::VideoWired);

        let audio_rungs = configs
            .iter()
            .filter(|handle| matches!(handle, CodecConfigHandle::Audio { .. }))
            .count();
        for track in &audio_tracks {
            for handle in configs {
                if let CodecConfigHandle::Audio { id, bitrate } = handle {
                    self.wire_audio(
                        &mut graph,
                        &wiring,
                        &spec.input_id,
                        track,
                        id,
                        *bitrate,
                        audio_rungs > 1,
                    )
                    .await?;
                }
            }
        }
        graph.advance(GraphStage::AudioWired);

        for track in &spec.subtitle_tracks {
            let config_id = spec.subtitle_config_id.as_deref().ok_or_else(|| {
                EncodingError::MissingSubtitleConfiguration {
                    language: track.language.clone(),
                }
            })?;
            self.wire_subtitles(&mut graph, &wiring, &spec.input_id, track, config_id)
                .await?;
        }
        graph.advance(GraphStage::SubtitlesWired);

        self.attach_keyframes(&mut graph, &spec.splice_points).await?;
        graph.advance(GraphStage::KeyframesAttached);
        graph.advance(GraphStage::ReadyToStart);
        info!(
            encoding_id = %graph.encoding.id,
            streams = graph.streams.len(),
            muxings = graph.muxings.len(),
            keyframes = graph.keyframes.len(),
            "vod job graph ready"
        );
        Ok(graph)
    }

    pub async fn build_live(
        &self,
        spec: &LiveJobSpec,
        configs: &[CodecConfigHandle],
    ) -> EncodingResult<JobGraph> {
        let encoding = self
            .api
            .create_encoding(&Encoding {
                id: String::new(),
                name: spec.name.clone(),
                description: String::new(),
            })
            .await?;
        info!(encoding_id = %encoding.id, name = %spec.name, "live encoding created");
        let mut graph = JobGraph::new(encoding, Some(spec.parameters.clone()));

        graph.hls = Some(self.allocate_hls(&spec.output_prefix).await?);
        graph.advance(GraphStage::ManifestsAllocated);

        let encoding_id = graph.encoding.id.clone();
        let wiring = Wiring {
            encoding_id: &encoding_id,
            prefix: &spec.output_prefix,
            segment_duration: spec.segment_duration,
            formats: &[MuxingFormat::Ts],
            media_language: Some(LIVE_AUDIO_LANGUAGE),
        };

        for handle in configs {
            if let CodecConfigHandle::Video { id, height, bitrate } = handle {
                self.wire_video(
                    &mut graph,
                    &wiring,
                    &spec.input_id,
                    &spec.input_path,
                    id,
                    *height,
                    *bitrate,
                    None,
                )
                .await?;
            }
        }
        graph.advance(GraphStage::VideoWired);

        let track = AudioTrack {
            language: None,
            label: String::new(),
            input_path: spec.input_path.clone(),
        };
        let audio_rungs = configs
            .iter()
            .filter(|handle| matches!(handle, CodecConfigHandle::Audio { .. }))
            .count();
        for handle in configs {
            if let CodecConfigHandle::Audio { id, bitrate } = handle {
                self.wire_audio(
                    &mut graph,
                    &wiring,
                    &spec.input_id,
                    &track,
                    id,
                    *bitrate,
                    audio_rungs > 1,
                )
                .await?;
            }
        }
        graph.advance(GraphStage::AudioWired);

        graph.advance(GraphStage::KeyframesAttached);
        graph.advance(GraphStage::ReadyToStart);
        info!(
            encoding_id = %graph.encoding.id,
            streams = graph.streams.len(),
            muxings = graph.muxings.len(),
            "live job graph ready"
        );
        Ok(graph)
    }

    async fn allocate_dash(
        &self,
        prefix: &str,
        audio_languages: &[Option<String>],
        subtitle_languages: &[String],
    ) -> EncodingResult<DashTree> {
        let manifest = self
            .api
            .create_dash_manifest(&DashManifest {
                id: String::new(),
                name: "Single-Period DASH Manifest".to_string(),
                manifest_name: DASH_MANIFEST_NAME.to_string(),
                outputs: vec![self.output.encoding_output(prefix)],
                profile: DashProfile::Live,
            })
            .await?;
        let period = self.api.create_period(&manifest.id, &Period::default()).await?;

        let mut adaptation_sets = Vec::new();
        let requested = std::iter::once((MediaKind::Video, None))
            .chain(
                audio_languages
                    .iter()
                    .map(|lang| (MediaKind::Audio, lang.clone())),
            )
            .chain(
                subtitle_languages
                    .iter()
                    .map(|lang| (MediaKind::Subtitles, Some(lang.clone()))),
            );
        for (kind, language) in requested {
            let created = self
                .api
                .create_adaptation_set(
                    &manifest.id,
                    &period.id,
                    kind,
                    &AdaptationSet {
                        id: String::new(),
                        lang: language.clone(),
                    },
                )
                .await?;
            adaptation_sets.push(AdaptationSetRecord {
                id: created.id,
                kind,
                language,
            });
        }

        Ok(DashTree {
            manifest,
            period_id: period.id,
            adaptation_sets,
            representations: Vec::new(),
        })
    }

    async fn allocate_hls(&self, prefix: &str) -> EncodingResult<HlsTree> {
        let manifest = self
            .api
            .create_hls_manifest(&HlsManifest {
                id: String::new(),
                name: "HLS/ts Manifest".to_string(),
                manifest_name: HLS_MANIFEST_NAME.to_string(),
                outputs: vec![self.output.encoding_output(prefix)],
                hls_master_playlist_version: HlsVersion::V6,
                hls_media_playlist_version: HlsVersion::V6,
            })
            .await?;
        Ok(HlsTree {
            manifest,
            variants: Vec::new(),
            media: Vec::new(),
        })
    }

    async fn create_stream(
        &self,
        graph: &mut JobGraph,
        wiring: &Wiring<'_>,
        input: StreamInput,
        codec_config_id: &str,
        kind: MediaKind,
        language: Option<&str>,
    ) -> EncodingResult<String> {
        let stream = self
            .api
            .create_stream(
                wiring.encoding_id,
                &Stream {
                    id: String::new(),
                    input_streams: vec![input],
                    codec_config_id: codec_config_id.to_string(),
                },
            )
            .await?;
        graph.streams.push(StreamRecord {
            id: stream.id.clone(),
            kind,
            language: language.map(str::to_string),
            codec_config_id: codec_config_id.to_string(),
        });
        Ok(stream.id)
    }

    async fn create_muxing(
        &self,
        graph: &mut JobGraph,
        wiring: &Wiring<'_>,
        stream_id: &str,
        format: MuxingFormat,
        relative_path: String,
    ) -> EncodingResult<MuxingRecord> {
        let output = self
            .output
            .encoding_output(&join_path(&[wiring.prefix, &relative_path]));
        let output_path = output.output_path.clone();
        let muxing = self
            .api
            .create_muxing(
                wiring.encoding_id,
                format,
                &Muxing {
                    id: String::new(),
                    outputs: vec![output],
                    segment_length: wiring.segment_duration,
                    streams: vec![MuxingStream {
                        stream_id: stream_id.to_string(),
                    }],
                },
            )
            .await?;
        let record = MuxingRecord {
            id: muxing.id,
            format,
            stream_id: stream_id.to_string(),
            relative_path,
            output_path,
        };
        graph.muxings.push(record.clone());
        Ok(record)
    }

    async fn add_representation(
        &self,
        graph: &mut JobGraph,
        encoding_id: &str,
        kind: MediaKind,
        language: Option<&str>,
        muxing: &MuxingRecord,
    ) -> EncodingResult<()> {
        let Some(dash) = graph.dash.as_ref() else {
            return Ok(());
        };
        let adaptation_set_id = dash.adaptation_set_id(kind, language)?;
        let manifest_id = dash.manifest.id.clone();
        let period_id = dash.period_id.clone();
        let representation = self
            .api
            .create_dash_representation(
                &manifest_id,
                &period_id,
                &adaptation_set_id,
                muxing.format,
                &DashRepresentation {
                    id: String::new(),
                    kind: DashRepresentationType::Timeline,
                    encoding_id: encoding_id.to_string(),
                    muxing_id: muxing.id.clone(),
                    segment_path: muxing.relative_path.clone(),
                },
            )
            .await?;
        if let Some(dash) = graph.dash.as_mut() {
            dash.representations.push(RepresentationRecord {
                id: representation.id,
                adaptation_set_id,
                muxing_id: muxing.id.clone(),
                format: muxing.format,
            });
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn wire_video(
        &self,
        graph: &mut JobGraph,
        wiring: &Wiring<'_>,
        input_id: &str,
        input_path: &str,
        codec_config_id: &str,
        height: u32,
        bitrate: u64,
        subtitle_group: Option<&str>,
    ) -> EncodingResult<()> {
        let stream_id = self
            .create_stream(
                graph,
                wiring,
                StreamInput::from_file(input_id, input_path),
                codec_config_id,
                MediaKind::Video,
                None,
            )
            .await?;

        for format in wiring.formats {
            let relative = rendition_path(MediaKind::Video, None, Some(bitrate), *format);
            let muxing = self
                .create_muxing(graph, wiring, &stream_id, *format, relative)
                .await?;
            match format {
                MuxingFormat::Fmp4 => {
                    self.add_representation(
                        graph,
                        wiring.encoding_id,
                        MediaKind::Video,
                        None,
                        &muxing,
                    )
                    .await?;
                }
                MuxingFormat::Ts => {
                    let manifest_id = hls_manifest_id(graph)?;
                    let uri = video_playlist_uri(height, bitrate);
                    let variant = self
                        .api
                        .create_hls_variant(
                            &manifest_id,
                            &StreamInfo {
                                id: String::new(),
                                audio: Some(AUDIO_GROUP_ID.to_string()),
                                subtitles: subtitle_group.map(str::to_string),
                                segment_path: muxing.relative_path.clone(),
                                uri: uri.clone(),
                                encoding_id: wiring.encoding_id.to_string(),
                                stream_id: stream_id.clone(),
                                muxing_id: muxing.id.clone(),
                                force_frame_rate_attribute: true,
                                force_video_range_attribute: true,
                            },
                        )
                        .await?;
                    push_variant(
                        graph,
                        VariantRecord {
                            id: variant.id,
                            stream_id: stream_id.clone(),
                            muxing_id: muxing.id.clone(),
                            uri,
                            audio_group: Some(AUDIO_GROUP_ID.to_string()),
                            subtitle_group: subtitle_group.map(str::to_string),
                        },
                    );
                }
                MuxingFormat::ChunkedText => {}
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn wire_audio(
        &self,
        graph: &mut JobGraph,
        wiring: &Wiring<'_>,
        input_id: &str,
        track: &AudioTrack,
        codec_config_id: &str,
        bitrate: u64,
        several_rungs: bool,
    ) -> EncodingResult<()> {
        let language = track.language.as_deref();
        let stream_id = self
            .create_stream(
                graph,
                wiring,
                StreamInput::from_file(input_id, &track.input_path),
                codec_config_id,
                MediaKind::Audio,
                language,
            )
            .await?;

        for format in wiring.formats {
            let relative = rendition_path(MediaKind::Audio, language, Some(bitrate), *format);
            let muxing = self
                .create_muxing(graph, wiring, &stream_id, *format, relative)
                .await?;
            match format {
                MuxingFormat::Fmp4 => {
                    self.add_representation(
                        graph,
                        wiring.encoding_id,
                        MediaKind::Audio,
                        language,
                        &muxing,
                    )
                    .await?;
                }
                MuxingFormat::Ts => {
                    let manifest_id = hls_manifest_id(graph)?;
                    let name = audio_media_name(track, bitrate, several_rungs);
                    let media_language = track
                        .language
                        .clone()
                        .or_else(|| wiring.media_language.map(str::to_string));
                    let uri = audio_playlist_uri(language, bitrate);
                    let media = self
                        .api
                        .create_hls_media(
                            &manifest_id,
                            MediaKind::Audio,
                            &MediaInfo {
                                id: String::new(),
                                name: name.clone(),
                                group_id: AUDIO_GROUP_ID.to_string(),
                                language: media_language.clone(),
                                segment_path: muxing.relative_path.clone(),
                                uri: uri.clone(),
                                encoding_id: wiring.encoding_id.to_string(),
                                stream_id: stream_id.clone(),
                                muxing_id: muxing.id.clone(),
                            },
                        )
                        .await?;
                    push_media(
                        graph,
                        MediaRecord {
                            id: media.id,
                            kind: MediaKind::Audio,
                            group_id: AUDIO_GROUP_ID.to_string(),
                            name,
                            language: media_language,
                            muxing_id: muxing.id.clone(),
                            uri,
                        },
                    );
                }
                MuxingFormat::ChunkedText => {}
            }
        }
        Ok(())
    }

    async fn wire_subtitles(
        &self,
        graph: &mut JobGraph,
        wiring: &Wiring<'_>,
        input_id: &str,
        track: &SubtitleTrack,
        codec_config_id: &str,
    ) -> EncodingResult<()> {
        let input_stream = self
            .api
            .create_file_input_stream(
                wiring.encoding_id,
                &FileInputStream {
                    id: String::new(),
                    input_id: input_id.to_string(),
                    input_path: track.input_path.clone(),
                    file_type: "WEBVTT".to_string(),
                },
            )
            .await?;
        let language = Some(track.language.as_str());
        let stream_id = self
            .create_stream(
                graph,
                wiring,
                StreamInput::from_input_stream(&input_stream.id),
                codec_config_id,
                MediaKind::Subtitles,
                language,
            )
            .await?;

        let relative = rendition_path(
            MediaKind::Subtitles,
            language,
            None,
            MuxingFormat::ChunkedText,
        );
        let muxing = self
            .create_muxing(graph, wiring, &stream_id, MuxingFormat::ChunkedText, relative)
            .await?;

        self.add_representation(
            graph,
            wiring.encoding_id,
            MediaKind::Subtitles,
            language,
            &muxing,
        )
        .await?;

        let manifest_id = hls_manifest_id(graph)?;
        let uri = subtitle_playlist_uri(&track.language);
        let media = self
            .api
            .create_hls_media(
                &manifest_id,
                MediaKind::Subtitles,
                &MediaInfo {
                    id: String::new(),
                    name: track.label.clone(),
                    group_id: SUBTITLE_GROUP_ID.to_string(),
                    language: Some(track.language.clone()),
                    segment_path: muxing.relative_path.clone(),
                    uri: uri.clone(),
                    encoding_id: wiring.encoding_id.to_string(),
                    stream_id: stream_id.clone(),
                    muxing_id: muxing.id.clone(),
                },
            )
            .await?;
        push_media(
            graph,
            MediaRecord {
                id: media.id,
                kind: MediaKind::Subtitles,
                group_id: SUBTITLE_GROUP_ID.to_string(),
                name: track.label.clone(),
                language: Some(track.language.clone()),
                muxing_id: muxing.id,
                uri,
            },
        );
        Ok(())
    }

    async fn attach_keyframes(
        &self,
        graph: &mut JobGraph,
        splice_points: &[f64],
    ) -> EncodingResult<()> {
        let encoding_id = graph.encoding.id.clone();
        for time in splice_points {
            let keyframe = self
                .api
                .create_keyframe(
                    &encoding_id,
                    &Keyframe {
                        id: String::new(),
                        time: *time,
                        segment_cut: true,
                    },
                )
                .await?;
            graph.keyframes.push(keyframe);
        }
        Ok(())
    }
}

fn audio_media_name(track: &AudioTrack, bitrate: u64, several_rungs: bool) -> String {
    match (&track.language, several_rungs) {
        (None, _) => bitrate.to_string(),
        (Some(_), false) => track.label.clone(),
        (Some(_), true) => format!("{} {}", track.label, bitrate),
    }
}

fn hls_manifest_id(graph: &JobGraph) -> EncodingResult<String> {
    graph
        .hls
        .as_ref()
        .map(|hls| hls.manifest.id.clone())
        .ok_or(EncodingError::MissingManifest)
}

fn push_variant(graph: &mut JobGraph, variant: VariantRecord) {
    if let Some(hls) = graph.hls.as_mut() {
        hls.variants.push(variant);
    }
}

fn push_media(graph: &mut JobGraph, media: MediaRecord) {
    if let Some(hls) = graph.hls.as_mut() {
        hls.media.push(media);
    }
}
