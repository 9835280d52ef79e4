//! End-to-end VOD and live runs: resolve resources, build and run the
//! encoding job, publish it behind an ad-insertion service and derive the
//! playback URLs.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Serialize;
use tracing::{info, warn};
use url::Url;

use crate::adinsertion::{AdInsertionApi, AdInsertionProvisioner, AdServer};
use crate::config::{LiveConfig, OutputSection, SourceSection, VodConfig};
use crate::encoding::model::{HttpsInput, PresetConfiguration, RtmpInput, S3Output};
use crate::encoding::{
    AudioTrack, EncodingApi, EncodingError, ExecutionPolicies, JobExecutor, JobGraph,
    JobGraphBuilder, LadderExpander, LiveJobSpec, LiveParameters, ManifestFormat, OutputTarget,
    PollPolicy, SubtitleTrack, VodJobSpec,
};
use crate::error::{ConfigError, Error, Result};
use crate::feed::{self, DummyFeed};
use crate::playback;
use crate::readiness::{ManifestProbe, ReadinessProber};
use crate::resource::{ResourceKind, ResourceRef};

pub const RUN_ID_LENGTH: usize = 8;
pub const LIVE_INPUT_PATH: &str = "live";

pub fn generate_run_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(RUN_ID_LENGTH)
        .map(char::from)
        .collect()
}

/// File stem of the last path segment of the source.
pub fn asset_name(source: &str) -> String {
    let path = Url::parse(source)
        .map(|url| url.path().to_string())
        .unwrap_or_else(|_| source.to_string());
    let file = path.rsplit('/').find(|s| !s.is_empty()).unwrap_or("asset");
    match file.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => file.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunNames {
    pub run_id: String,
    pub encoding_name: String,
    pub output_prefix: String,
    pub service_name: String,
}

impl RunNames {
    pub fn vod(asset: &str, run_id: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            encoding_name: format!("{asset} - {run_id}"),
            output_prefix: format!("{asset}/{run_id}"),
            service_name: format!("AVOD w/ encoding and Ad Proxy - {run_id}"),
        }
    }

    pub fn live(run_id: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            encoding_name: format!("Live RTMP - test {run_id}"),
            output_prefix: run_id.to_string(),
            service_name: format!("Live w/ PreRoll - {run_id}"),
        }
    }
}

/// One manifest as stored on the origin and as served to players.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackEntry {
    pub format: ManifestFormat,
    pub origin_url: String,
    pub playback_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct VodReport {
    pub names: RunNames,
    pub encoding_id: String,
    pub polls: u32,
    pub ad_server_id: u64,
    pub asset_catalog_id: u64,
    pub service_id: u64,
    pub manifests: Vec<PlaybackEntry>,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LiveReport {
    pub names: RunNames,
    pub encoding_id: String,
    pub encoder_ip: String,
    pub stream_key: String,
    pub ingest_url: String,
    pub frame_rate: f64,
    pub ad_server_id: u64,
    pub manifests: Vec<PlaybackEntry>,
    pub feed_log: Option<PathBuf>,
    pub readiness_rounds: u32,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShutdownReport {
    pub encoding_id: String,
    pub polls: u32,
    pub stopped_at: DateTime<Utc>,
}

/// A running live encoding together with the feed process it owns.
#[derive(Debug)]
pub struct LiveSession {
    pub report: LiveReport,
    feed: Option<DummyFeed>,
}

impl LiveSession {
    pub fn has_dummy_feed(&self) -> bool {
        self.feed.is_some()
    }
}

/// Whether each remote resource of a run is pinned or will be created.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourcePlan {
    pub kind: String,
    pub pinned: Option<String>,
}

fn plan_entry(kind: ResourceKind, pinned: Option<String>) -> ResourcePlan {
    ResourcePlan {
        kind: kind.to_string(),
        pinned,
    }
}

pub fn vod_resource_plan(config: &VodConfig) -> Vec<ResourcePlan> {
    let ads = &config.ad_insertion;
    vec![
        plan_entry(ResourceKind::HttpsInput, config.source.input_id.clone()),
        plan_entry(ResourceKind::S3Output, config.output.output_id.clone()),
        plan_entry(
            ResourceKind::TranscodingProfile,
            ads.transcoding_profile_id.map(|id| id.to_string()),
        ),
        plan_entry(ResourceKind::AdServer, ads.ad_server_id.map(|id| id.to_string())),
        plan_entry(
            ResourceKind::AssetCatalog,
            ads.asset_catalog_id.map(|id| id.to_string()),
        ),
        plan_entry(
            ResourceKind::AdInsertionService,
            ads.service_id.map(|id| id.to_string()),
        ),
    ]
}

pub fn live_resource_plan(config: &LiveConfig) -> Vec<ResourcePlan> {
    let ads = &config.ad_insertion;
    vec![
        plan_entry(ResourceKind::RtmpInput, None),
        plan_entry(ResourceKind::S3Output, config.output.output_id.clone()),
        plan_entry(
            ResourceKind::TranscodingProfile,
            ads.transcoding_profile_id.map(|id| id.to_string()),
        ),
        plan_entry(ResourceKind::AdServer, ads.ad_server_id.map(|id| id.to_string())),
        plan_entry(ResourceKind::LiveSource, None),
        plan_entry(ResourceKind::AdInsertionService, None),
    ]
}

async fn resolve_output(api: &dyn EncodingApi, output: &OutputSection) -> Result<S3Output> {
    let reference = match &output.output_id {
        Some(id) => ResourceRef::Pinned(id.clone()),
        None => ResourceRef::ToCreate(S3Output {
            id: String::new(),
            name: None,
            bucket_name: output.bucket_name.clone().unwrap_or_default(),
            access_key: output.access_key.as_ref().map(|c| c.resolve()).transpose()?,
            secret_key: output.secret_key.as_ref().map(|c| c.resolve()).transpose()?,
        }),
    };
    let resolved = reference
        .resolve(
            ResourceKind::S3Output,
            |id| async move { api.get_s3_output(&id).await },
            |params| async move { api.create_s3_output(&params).await },
        )
        .await?;
    Ok(resolved)
}

fn source_host(source: &SourceSection) -> Result<String> {
    let url = Url::parse(&source.url)
        .map_err(|err| ConfigError::invalid(format!("source.url is not a valid URL: {err}")))?;
    url.host_str()
        .map(str::to_string)
        .ok_or_else(|| ConfigError::invalid("source.url has no host").into())
}

fn source_path(source: &SourceSection) -> String {
    Url::parse(&source.url)
        .map(|url| url.path().to_string())
        .unwrap_or_else(|_| source.url.clone())
}

pub struct VodWorkflow<'a> {
    encoding: &'a dyn EncodingApi,
    ads: &'a dyn AdInsertionApi,
    config: &'a VodConfig,
}

impl<'a> VodWorkflow<'a> {
    pub fn new(
        encoding: &'a dyn EncodingApi,
        ads: &'a dyn AdInsertionApi,
        config: &'a VodConfig,
    ) -> Self {
        Self {
            encoding,
            ads,
            config,
        }
    }

    pub fn names(&self, run_id: &str) -> RunNames {
        RunNames::vod(&asset_name(&self.config.source.url), run_id)
    }

    fn job_spec(
        &self,
        names: &RunNames,
        input_id: String,
        subtitle_config_id: Option<String>,
    ) -> VodJobSpec {
        let source = &self.config.source;
        let video_input_path = source_path(source);
        let audio_tracks = source
            .audio
            .iter()
            .map(|track| AudioTrack {
                language: Some(track.language.clone()),
                label: self.config.languages.label_for(&track.language),
                input_path: track.path.clone().unwrap_or_else(|| video_input_path.clone()),
            })
            .collect();
        let subtitle_tracks = source
            .subtitles
            .iter()
            .filter_map(|track| {
                track.path.as_ref().map(|path| SubtitleTrack {
                    language: track.language.clone(),
                    label: self.config.languages.label_for(&track.language),
                    input_path: path.clone(),
                })
            })
            .collect();
        VodJobSpec {
            name: names.encoding_name.clone(),
            input_id,
            video_input_path,
            audio_tracks,
            subtitle_tracks,
            subtitle_config_id,
            output_prefix: names.output_prefix.clone(),
            segment_duration: self.config.ladder.segment_duration,
            splice_points: source.splice_points.clone(),
        }
    }

    pub async fn run(&self, run_id: &str) -> Result<VodReport> {
        let config = self.config;
        let names = self.names(run_id);
        info!(run_id, encoding_name = %names.encoding_name, "vod run starting");

        let provisioner = AdInsertionProvisioner::new(self.ads, &config.ad_insertion);
        provisioner.transcoding_profile_id()?;

        let api = self.encoding;
        let input_ref = match &config.source.input_id {
            Some(id) => ResourceRef::Pinned(id.clone()),
            None => ResourceRef::ToCreate(HttpsInput {
                id: String::new(),
                name: None,
                host: source_host(&config.source)?,
            }),
        };
        let input = input_ref
            .resolve(
                ResourceKind::HttpsInput,
                |id| async move { api.get_https_input(&id).await },
                |params| async move { api.create_https_input(&params).await },
            )
            .await?;
        let output = resolve_output(api, &config.output).await?;

        let expander = LadderExpander::new(
            api,
            config.ladder.frame_rate,
            PresetConfiguration::VodStandard,
        );
        let configs = expander.expand(&config.ladder.renditions).await?;
        let subtitle_config_id = if config.source.subtitles.is_empty() {
            None
        } else {
            Some(expander.subtitle_configuration().await?)
        };

        let spec = self.job_spec(&names, input.id.clone(), subtitle_config_id);
        let target = OutputTarget {
            output_id: output.id.clone(),
            base_path: config.output.base_path.clone(),
        };
        let graph = JobGraphBuilder::new(api, target)
            .build_vod(&spec, &configs)
            .await?;

        let executor = JobExecutor::new(api, ExecutionPolicies::from_config(&config.polling));
        let execution = executor.run_vod(&graph).await?;

        let origins = origin_urls(&graph, &output.bucket_name)?;
        for (format, url) in &origins {
            info!(%format, %url, "origin manifest");
        }
        let origin_list: Vec<String> = origins.iter().map(|(_, url)| url.clone()).collect();
        let resources = provisioner
            .provision_vod(&names.service_name, &origin_list, &config.output.base_path)
            .await?;

        let mut manifests = Vec::with_capacity(origins.len());
        for (format, origin_url) in origins {
            let playback_url = playback::playback_url(
                &resources.service.url,
                &origin_url,
                resources.source_url(),
                config.cdn.fqdn.as_deref(),
                &config.source.splice_points,
            )?;
            manifests.push(PlaybackEntry {
                format,
                origin_url,
                playback_url,
            });
        }

        info!(run_id, encoding_id = %execution.encoding_id, "vod run complete");
        Ok(VodReport {
            names,
            encoding_id: execution.encoding_id,
            polls: execution.polls,
            ad_server_id: resources.ad_server.id,
            asset_catalog_id: resources.asset_catalog.id,
            service_id: resources.service.id,
            manifests,
            completed_at: Utc::now(),
        })
    }
}

fn origin_urls(graph: &JobGraph, bucket: &str) -> Result<Vec<(ManifestFormat, String)>> {
    let mut urls = Vec::new();
    for location in graph.manifest_locations() {
        urls.push((location.format, playback::origin_url(bucket, &location)?));
    }
    Ok(urls)
}

pub struct LiveWorkflow<'a> {
    encoding: &'a dyn EncodingApi,
    ads: &'a dyn AdInsertionApi,
    probe: &'a dyn ManifestProbe,
    config: &'a LiveConfig,
}

impl<'a> LiveWorkflow<'a> {
    pub fn new(
        encoding: &'a dyn EncodingApi,
        ads: &'a dyn AdInsertionApi,
        probe: &'a dyn ManifestProbe,
        config: &'a LiveConfig,
    ) -> Self {
        Self {
            encoding,
            ads,
            probe,
            config,
        }
    }

    fn executor(&self) -> JobExecutor<'a> {
        JobExecutor::new(
            self.encoding,
            ExecutionPolicies::from_config(&self.config.polling),
        )
    }

    /// Brings the live encoding up and publishes it. If anything fails after
    /// the encoding started, the feed is killed and the encoding stopped
    /// before the error is returned.
    pub async fn start(
        &self,
        run_id: &str,
        dummy_feed: bool,
        feed_log_dir: &Path,
    ) -> Result<LiveSession> {
        let config = self.config;
        let names = RunNames::live(run_id);
        info!(run_id, encoding_name = %names.encoding_name, "live run starting");

        let provisioner = AdInsertionProvisioner::new(self.ads, &config.ad_insertion);
        provisioner.transcoding_profile_id()?;
        let ad_server = provisioner.resolve_live_ad_server().await?;

        let api = self.encoding;
        let input = live_input(api).await?;
        let output = resolve_output(api, &config.output).await?;

        let configs = LadderExpander::new(
            api,
            config.ladder.frame_rate,
            PresetConfiguration::LiveStandard,
        )
        .expand(&config.ladder.renditions)
        .await?;

        let spec = LiveJobSpec {
            name: names.encoding_name.clone(),
            input_id: input.id.clone(),
            input_path: LIVE_INPUT_PATH.to_string(),
            output_prefix: names.output_prefix.clone(),
            segment_duration: config.ladder.segment_duration,
            parameters: LiveParameters {
                stream_key: config.live.stream_key.clone(),
                bytes_read_timeout_seconds: config.live.bytes_read_timeout_seconds,
                stream_timeout_minutes: config.live.stream_timeout_minutes,
                timeshift: config.live.timeshift,
                live_edge_offset: config.live.live_edge_offset,
            },
        };
        let target = OutputTarget {
            output_id: output.id.clone(),
            base_path: config.output.base_path.clone(),
        };
        let graph = JobGraphBuilder::new(api, target)
            .build_live(&spec, &configs)
            .await?;

        let executor = self.executor();
        executor.start_live(&graph).await?;
        let encoding_id = graph.encoding_id().to_string();

        let details = match executor.await_ingest(&encoding_id).await {
            Ok(details) => details,
            Err(err) => {
                let err: Error = err.into();
                self.teardown(&executor, &encoding_id, None, &err).await;
                return Err(err);
            }
        };

        let mut feed_process = None;
        if dummy_feed {
            let log_path = feed_log_dir.join(feed::log_file_name(run_id));
            let args = feed::command_args(
                &details.encoder_ip,
                &details.stream_key,
                config.ladder.frame_rate,
            );
            match DummyFeed::spawn(Path::new(&config.live.ffmpeg_path), &args, &log_path) {
                Ok(spawned) => feed_process = Some(spawned),
                Err(err) => {
                    let err: Error = err.into();
                    self.teardown(&executor, &encoding_id, None, &err).await;
                    return Err(err);
                }
            }
        }

        match self
            .publish(&graph, &output.bucket_name, &ad_server, run_id, &provisioner)
            .await
        {
            Ok((manifests, readiness_rounds)) => {
                let feed_log = feed_process.as_ref().map(|f| f.log_path().to_path_buf());
                Ok(LiveSession {
                    report: LiveReport {
                        names,
                        encoding_id,
                        ingest_url: format!("rtmp://{}/live", details.encoder_ip),
                        encoder_ip: details.encoder_ip,
                        stream_key: details.stream_key,
                        frame_rate: config.ladder.frame_rate,
                        ad_server_id: ad_server.id,
                        manifests,
                        feed_log,
                        readiness_rounds,
                        started_at: Utc::now(),
                    },
                    feed: feed_process,
                })
            }
            Err(err) => {
                self.teardown(&executor, &encoding_id, feed_process, &err).await;
                Err(err)
            }
        }
    }

    async fn teardown(
        &self,
        executor: &JobExecutor<'_>,
        encoding_id: &str,
        feed: Option<DummyFeed>,
        cause: &Error,
    ) {
        warn!(%encoding_id, error = %cause, "live start failed, tearing down");
        if let Some(feed) = feed {
            if let Err(err) = feed.stop().await {
                warn!(error = %err, "failed to stop dummy feed");
            }
        }
        if let Err(err) = executor.stop_live(encoding_id).await {
            warn!(%encoding_id, error = %err, "failed to stop live encoding");
        }
    }

    async fn publish(
        &self,
        graph: &JobGraph,
        bucket: &str,
        ad_server: &AdServer,
        run_id: &str,
        provisioner: &AdInsertionProvisioner<'_>,
    ) -> Result<(Vec<PlaybackEntry>, u32)> {
        let origins = origin_urls(graph, bucket)?;
        for (format, url) in &origins {
            info!(%format, %url, "origin manifest");
        }
        let urls: Vec<String> = origins.iter().map(|(_, url)| url.clone()).collect();
        let polling = &self.config.polling;
        let readiness = ReadinessProber::new(
            self.probe,
            PollPolicy::from_timeout(
                polling.manifest_timeout_minutes,
                polling.manifest_interval_seconds,
            ),
        )
        .wait_until_ready(&urls)
        .await?;

        let bindings = provisioner.provision_live(ad_server, run_id, &origins).await?;
        let mut manifests = Vec::with_capacity(bindings.len());
        for ((format, _), binding) in origins.iter().zip(bindings) {
            manifests.push(PlaybackEntry {
                format: *format,
                playback_url: playback::live_playback_url(
                    &binding.service.url,
                    self.config.cdn.fqdn.as_deref(),
                )?,
                origin_url: binding.origin_url,
            });
        }
        Ok((manifests, readiness.rounds))
    }

    /// Kills the feed, stops the encoding and waits until it is finished.
    pub async fn shutdown(&self, session: LiveSession) -> Result<ShutdownReport> {
        let LiveSession { report, feed } = session;
        if let Some(feed) = feed {
            feed.stop().await?;
        }
        let execution = self.executor().stop_live(&report.encoding_id).await?;
        info!(encoding_id = %execution.encoding_id, "live run shut down");
        Ok(ShutdownReport {
            encoding_id: execution.encoding_id,
            polls: execution.polls,
            stopped_at: Utc::now(),
        })
    }
}

async fn live_input(api: &dyn EncodingApi) -> Result<RtmpInput> {
    let inputs = api.list_rtmp_inputs().await?;
    let input = inputs
        .into_iter()
        .next()
        .ok_or(EncodingError::NoLiveInput)?;
    info!(input_id = %input.id, "using rtmp input");
    Ok(input)
}
