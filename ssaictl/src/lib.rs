use std::fmt::Write as _;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ssai_core::config::{
    AdInsertionSection, Credential, EncodingSection, LadderSection, OutputSection,
};
use ssai_core::{
    generate_run_id, live_resource_plan, load_live_config, load_vod_config,
    transcoding_profile_suggestion, vod_resource_plan, AdInsertionError, HttpAdInsertionApi,
    HttpEncodingApi, HttpManifestProbe, LiveReport, LiveWorkflow, ResourcePlan, ShutdownReport,
    VodReport, VodWorkflow,
};

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] ssai_core::ConfigError),
    #[error("{0}")]
    Run(#[from] ssai_core::Error),
    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("credentials not available: {}", .0.join(", "))]
    MissingCredentials(Vec<String>),
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Encoding and server-side ad insertion orchestrator", long_about = None)]
pub struct Cli {
    /// Config file; defaults to configs/vod.toml or configs/live.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    pub format: OutputFormat,
    /// Debug logging for the orchestrator
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Vod,
    Live,
}

impl Mode {
    fn default_config(self) -> &'static str {
        match self {
            Mode::Vod => "configs/vod.toml",
            Mode::Live => "configs/live.toml",
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Encode a file, package it and publish it behind an AVOD service
    Vod(VodArgs),
    /// Run a live encoding with a pre-roll service until interrupted
    Live(LiveArgs),
    /// Print the transcoding profile matching the configured ladder
    Profile(ModeArgs),
    /// Validate a config and show which resources a run would create
    Check(ModeArgs),
}

#[derive(Args, Debug)]
pub struct VodArgs {
    /// Run id used in resource names and output paths
    #[arg(long)]
    pub run_id: Option<String>,
}

#[derive(Args, Debug)]
pub struct LiveArgs {
    #[arg(long)]
    pub run_id: Option<String>,
    /// Do not start ffmpeg; push your own RTMP stream instead
    #[arg(long, default_value_t = false)]
    pub no_dummy_feed: bool,
    /// Directory for the ffmpeg log
    #[arg(long, default_value = ".")]
    pub feed_log_dir: PathBuf,
}

#[derive(Args, Debug)]
pub struct ModeArgs {
    #[arg(value_enum, default_value_t = Mode::Vod)]
    pub mode: Mode,
}

pub fn init_tracing(verbose: bool) {
    let fallback = if verbose {
        "ssai_core=debug,ssaictl=debug,info"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

pub async fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Commands::Vod(args) => {
            let config = load_vod_config(config_path(&cli, Mode::Vod))?;
            let run_id = pick_run_id(args.run_id.as_deref(), config.run.job_id.as_deref());
            let client = http_client()?;
            let encoding = HttpEncodingApi::new(client.clone(), &config.encoding)?;
            let ads = HttpAdInsertionApi::new(client, &config.ad_insertion)?;
            let report = VodWorkflow::new(&encoding, &ads, &config)
                .run(&run_id)
                .await
                .map_err(|err| with_profile_hint(err, &config.ladder))?;
            render(&report, cli.format)?;
        }
        Commands::Live(args) => {
            let config = load_live_config(config_path(&cli, Mode::Live))?;
            let run_id = pick_run_id(args.run_id.as_deref(), config.run.job_id.as_deref());
            let client = http_client()?;
            let encoding = HttpEncodingApi::new(client.clone(), &config.encoding)?;
            let ads = HttpAdInsertionApi::new(client.clone(), &config.ad_insertion)?;
            let probe = HttpManifestProbe::new(client);
            let workflow = LiveWorkflow::new(&encoding, &ads, &probe, &config);

            let dummy_feed = config.live.dummy_feed && !args.no_dummy_feed;
            let session = workflow
                .start(&run_id, dummy_feed, &args.feed_log_dir)
                .await
                .map_err(|err| with_profile_hint(err, &config.ladder))?;
            render(&session.report, cli.format)?;
            if !session.has_dummy_feed() {
                eprintln!("{}", push_instructions(&session.report));
            }

            info!("live run up; press Ctrl-C to stop the encoding");
            let (shutdown, interrupted) =
                shutdown_after(tokio::signal::ctrl_c(), || async move {
                    workflow.shutdown(session).await.map_err(AppError::from)
                })
                .await?;
            render(&shutdown, cli.format)?;
            interrupted?;
        }
        Commands::Profile(args) => {
            let path = config_path(&cli, args.mode);
            let ladder = match args.mode {
                Mode::Vod => load_vod_config(&path)?.ladder,
                Mode::Live => load_live_config(&path)?.ladder,
            };
            render(&ProfileSuggestion(transcoding_profile_suggestion(&ladder)), cli.format)?;
        }
        Commands::Check(args) => {
            let report = check_report(args.mode, &config_path(&cli, args.mode))?;
            render(&report, cli.format)?;
            let missing: Vec<String> = report
                .credentials
                .iter()
                .filter(|entry| !entry.available)
                .map(|entry| entry.name.clone())
                .collect();
            if !missing.is_empty() {
                return Err(AppError::MissingCredentials(missing));
            }
        }
    }
    Ok(())
}

/// Waits for the interrupt, then always runs the shutdown. A failed signal
/// listener is handed back alongside the shutdown result.
async fn shutdown_after<T, I, S, Fut>(
    interrupt: I,
    shutdown: S,
) -> Result<(T, std::io::Result<()>)>
where
    I: Future<Output = std::io::Result<()>>,
    S: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let interrupted = interrupt.await;
    if let Err(err) = &interrupted {
        warn!(error = %err, "cannot listen for Ctrl-C, shutting the live run down");
    }
    let report = shutdown().await?;
    Ok((report, interrupted))
}

fn config_path(cli: &Cli, mode: Mode) -> PathBuf {
    cli.config
        .clone()
        .unwrap_or_else(|| PathBuf::from(mode.default_config()))
}

fn pick_run_id(flag: Option<&str>, configured: Option<&str>) -> String {
    flag.or(configured)
        .map(str::to_string)
        .unwrap_or_else(generate_run_id)
}

fn http_client() -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .user_agent(concat!("ssaictl/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// A run without a transcoding profile id prints the profile to request first.
fn with_profile_hint(err: ssai_core::Error, ladder: &LadderSection) -> AppError {
    if matches!(
        err,
        ssai_core::Error::AdInsertion(AdInsertionError::MissingTranscodingProfile)
    ) {
        let suggestion = ProfileSuggestion(transcoding_profile_suggestion(ladder));
        eprintln!(
            "Ask the ad insertion provider to install this transcoding profile, \
             then set ad_insertion.transcoding_profile_id:\n{}",
            suggestion.display()
        );
    }
    AppError::Run(err)
}

fn push_instructions(report: &LiveReport) -> String {
    format!(
        "No dummy feed started. Push an RTMP stream to {} with stream key {} \
         at {} fps, for example from OBS.",
        report.ingest_url, report.stream_key, report.frame_rate
    )
}

fn render<T>(value: &T, format: OutputFormat) -> Result<()>
where
    T: Serialize + DisplayFallback,
{
    match format {
        OutputFormat::Text => {
            println!("{}", value.display());
            Ok(())
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{}", json);
            Ok(())
        }
    }
}

trait DisplayFallback {
    fn display(&self) -> String;
}

#[derive(Debug, Serialize)]
#[serde(transparent)]
struct ProfileSuggestion(serde_json::Value);

impl DisplayFallback for ProfileSuggestion {
    fn display(&self) -> String {
        serde_json::to_string_pretty(&self.0).unwrap_or_else(|_| self.0.to_string())
    }
}

#[derive(Debug, Serialize)]
pub struct CredentialCheck {
    pub name: String,
    pub available: bool,
}

#[derive(Debug, Serialize)]
pub struct CheckReport {
    pub mode: Mode,
    pub config: PathBuf,
    pub resources: Vec<ResourcePlan>,
    pub credentials: Vec<CredentialCheck>,
}

/// Loads and validates the config, then lists what a run would create and
/// whether every secret it needs can be resolved.
pub fn check_report(mode: Mode, path: &Path) -> Result<CheckReport> {
    let (resources, credentials) = match mode {
        Mode::Vod => {
            let config = load_vod_config(path)?;
            let checks = credential_checks(&config.encoding, &config.ad_insertion, &config.output);
            (vod_resource_plan(&config), checks)
        }
        Mode::Live => {
            let config = load_live_config(path)?;
            let checks = credential_checks(&config.encoding, &config.ad_insertion, &config.output);
            (live_resource_plan(&config), checks)
        }
    };
    Ok(CheckReport {
        mode,
        config: path.to_path_buf(),
        resources,
        credentials,
    })
}

fn credential_checks(
    encoding: &EncodingSection,
    ads: &AdInsertionSection,
    output: &OutputSection,
) -> Vec<CredentialCheck> {
    let mut required: Vec<(&str, &Credential)> = vec![
        ("encoding.api_key", &encoding.api_key),
        ("ad_insertion.api_key", &ads.api_key),
    ];
    if output.output_id.is_none() {
        required.extend(output.access_key.as_ref().map(|c| ("output.access_key", c)));
        required.extend(output.secret_key.as_ref().map(|c| ("output.secret_key", c)));
    }
    required
        .into_iter()
        .map(|(name, credential)| CredentialCheck {
            name: name.to_string(),
            available: credential.resolve().is_ok(),
        })
        .collect()
}

impl DisplayFallback for CheckReport {
    fn display(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Config: {} ({:?})", self.config.display(), self.mode);
        let _ = writeln!(out, "Resources:");
        for plan in &self.resources {
            match &plan.pinned {
                Some(id) => {
                    let _ = writeln!(out, "  - {:<22} pinned {id}", plan.kind);
                }
                None => {
                    let _ = writeln!(out, "  - {:<22} create", plan.kind);
                }
            }
        }
        let _ = writeln!(out, "Credentials:");
        for entry in &self.credentials {
            let state = if entry.available { "ok" } else { "MISSING" };
            let _ = writeln!(out, "  - {:<22} {state}", entry.name);
        }
        out.trim_end().to_string()
    }
}

impl DisplayFallback for VodReport {
    fn display(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "VOD run {} complete ({} status checks)",
            self.names.run_id, self.polls
        );
        let _ = writeln!(out, "  encoding:      {}", self.encoding_id);
        let _ = writeln!(out, "  ad server:     {}", self.ad_server_id);
        let _ = writeln!(out, "  asset catalog: {}", self.asset_catalog_id);
        let _ = writeln!(out, "  service:       {}", self.service_id);
        for entry in &self.manifests {
            let _ = writeln!(out, "  {} origin:   {}", entry.format, entry.origin_url);
            let _ = writeln!(out, "  {} playback: {}", entry.format, entry.playback_url);
        }
        out.trim_end().to_string()
    }
}

impl DisplayFallback for LiveReport {
    fn display(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Live run {} started", self.names.run_id);
        let _ = writeln!(out, "  encoding:  {}", self.encoding_id);
        let _ = writeln!(out, "  ingest:    {} (key {})", self.ingest_url, self.stream_key);
        let _ = writeln!(out, "  ad server: {}", self.ad_server_id);
        if let Some(log) = &self.feed_log {
            let _ = writeln!(out, "  feed log:  {}", log.display());
        }
        for entry in &self.manifests {
            let _ = writeln!(out, "  {} origin:   {}", entry.format, entry.origin_url);
            let _ = writeln!(out, "  {} playback: {}", entry.format, entry.playback_url);
        }
        out.trim_end().to_string()
    }
}

impl DisplayFallback for ShutdownReport {
    fn display(&self) -> String {
        format!(
            "Live encoding {} finished after {} status checks",
            self.encoding_id, self.polls
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../configs")
            .join(name)
    }

    #[test]
    fn live_flags_parse() {
        let cli = Cli::try_parse_from([
            "ssaictl",
            "--format",
            "json",
            "live",
            "--run-id",
            "Ab12Cd34",
            "--no-dummy-feed",
        ])
        .unwrap();
        assert!(matches!(cli.format, OutputFormat::Json));
        match cli.command {
            Commands::Live(args) => {
                assert_eq!(args.run_id.as_deref(), Some("Ab12Cd34"));
                assert!(args.no_dummy_feed);
                assert_eq!(args.feed_log_dir, PathBuf::from("."));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn config_defaults_follow_mode() {
        let cli = Cli::try_parse_from(["ssaictl", "check", "live"]).unwrap();
        assert_eq!(config_path(&cli, Mode::Live), PathBuf::from("configs/live.toml"));
        let cli = Cli::try_parse_from(["ssaictl", "profile", "--config", "x.toml"]).unwrap();
        assert_eq!(config_path(&cli, Mode::Vod), PathBuf::from("x.toml"));
    }

    #[test]
    fn run_id_prefers_flag_then_config() {
        assert_eq!(pick_run_id(Some("flag"), Some("cfg")), "flag");
        assert_eq!(pick_run_id(None, Some("cfg")), "cfg");
        assert_eq!(pick_run_id(None, None).len(), 8);
    }

    #[test]
    fn check_lists_resources_to_create() {
        let report = check_report(Mode::Vod, &fixture("vod.toml")).unwrap();
        assert_eq!(report.resources.len(), 6);
        assert!(report
            .resources
            .iter()
            .any(|plan| plan.kind == "transcoding profile" && plan.pinned.as_deref() == Some("1234")));
        assert!(report
            .resources
            .iter()
            .any(|plan| plan.kind == "asset catalog" && plan.pinned.is_none()));
        assert_eq!(report.credentials.len(), 4);

        let text = report.display();
        assert!(text.contains("s3 output"));
        assert!(text.contains("create"));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["mode"], "vod");
    }

    #[test]
    fn profile_suggestion_covers_every_video_rung() {
        let config = load_live_config(fixture("live.toml")).unwrap();
        let suggestion = ProfileSuggestion(transcoding_profile_suggestion(&config.ladder));
        assert_eq!(
            suggestion.0["transcoding"]["jobs"].as_array().map(Vec::len),
            Some(5)
        );
        assert!(suggestion.display().contains("\"bitratea\": \"128000\""));
    }

    #[test]
    fn missing_profile_keeps_the_run_error() {
        let config = load_vod_config(fixture("vod.toml")).unwrap();
        let err = with_profile_hint(
            ssai_core::Error::AdInsertion(AdInsertionError::MissingTranscodingProfile),
            &config.ladder,
        );
        assert!(matches!(
            err,
            AppError::Run(ssai_core::Error::AdInsertion(
                AdInsertionError::MissingTranscodingProfile
            ))
        ));
    }

    #[tokio::test]
    async fn live_run_is_shut_down_when_signal_listener_fails() {
        let counter = std::cell::Cell::new(0);
        let stops = &counter;
        let (report, interrupted) = shutdown_after(
            async { Err(std::io::Error::new(std::io::ErrorKind::Other, "no signal handler")) },
            || async move {
                stops.set(stops.get() + 1);
                Ok("stopped")
            },
        )
        .await
        .unwrap();
        assert_eq!(report, "stopped");
        assert_eq!(stops.get(), 1);
        assert!(interrupted.is_err());
    }

    #[tokio::test]
    async fn shutdown_runs_once_after_interrupt() {
        let counter = std::cell::Cell::new(0);
        let stops = &counter;
        let (_, interrupted) = shutdown_after(async { Ok(()) }, || async move {
            stops.set(stops.get() + 1);
            Ok(())
        })
        .await
        .unwrap();
        assert_eq!(stops.get(), 1);
        assert!(interrupted.is_ok());
    }

    #[test]
    fn push_instructions_name_ingest_and_key() {
        let report = LiveReport {
            names: ssai_core::RunNames::live("Ab12Cd34"),
            encoding_id: "enc-1".into(),
            encoder_ip: "10.0.0.7".into(),
            stream_key: "myStreamKey".into(),
            ingest_url: "rtmp://10.0.0.7/live".into(),
            frame_rate: 24.0,
            ad_server_id: 3,
            manifests: Vec::new(),
            feed_log: None,
            readiness_rounds: 1,
            started_at: "2026-01-01T00:00:00Z".parse().unwrap(),
        };
        let text = push_instructions(&report);
        assert!(text.contains("rtmp://10.0.0.7/live"));
        assert!(text.contains("myStreamKey"));
        assert!(report.display().contains("Live run Ab12Cd34 started"));
    }
}
