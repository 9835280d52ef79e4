//! Synthetic RTMP contribution feed pushed by a local ffmpeg process.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use thiserror::Error;
use tokio::process::{Child, Command};
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("failed to open feed log {path}: {source}")]
    Log {
        source: std::io::Error,
        path: PathBuf,
    },
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        source: std::io::Error,
        program: String,
    },
    #[error("failed to stop feed process: {0}")]
    Stop(#[source] std::io::Error),
}

pub type FeedResult<T> = std::result::Result<T, FeedError>;

const OVERLAY_STYLE: &str =
    "fontsize=40: fontcolor=white: box=1: boxborderw=6: boxcolor=black@0.75";

pub fn ingest_url(encoder_ip: &str, stream_key: &str) -> String {
    format!("rtmp://{encoder_ip}/live/{stream_key}")
}

pub fn log_file_name(run_id: &str) -> String {
    format!("ffmpeg_output_{run_id}.txt")
}

/// Test pattern with a two-tone audio bed and wall clock, pts and frame
/// counter overlays, encoded to FLV at real-time pace.
pub fn command_args(encoder_ip: &str, stream_key: &str, frame_rate: f64) -> Vec<String> {
    let overlays = [
        format!(
            "drawtext=text='time %{{localtime\\:%X}}': {OVERLAY_STYLE}: x=40: y=main_h-(2*line_h)"
        ),
        format!(
            "drawtext=text='pts %{{pts \\: hms}}': {OVERLAY_STYLE}: x=(w-text_w)/2: y=main_h-(2*line_h)"
        ),
        format!(
            "drawtext=text='frame %{{n}}': {OVERLAY_STYLE}: x=w-text_w-40: y=main_h-(2*line_h)"
        ),
    ];
    vec![
        "-re".into(),
        "-f".into(),
        "lavfi".into(),
        "-i".into(),
        format!("testsrc2=size=1920x1080:rate={frame_rate}"),
        "-f".into(),
        "lavfi".into(),
        "-i".into(),
        "aevalsrc='0.1*sin(2*PI*(360-2.5/2)*t) | 0.1*cos(2*PI*(440+2.5/2)*t)'".into(),
        "-vf".into(),
        overlays.join(", "),
        "-c:v".into(),
        "libx264".into(),
        "-c:a".into(),
        "aac".into(),
        "-f".into(),
        "flv".into(),
        ingest_url(encoder_ip, stream_key),
    ]
}

/// Owned feed process. Dropping it kills ffmpeg; [`DummyFeed::stop`] does so
/// explicitly and reaps it.
#[derive(Debug)]
pub struct DummyFeed {
    child: Child,
    log_path: PathBuf,
}

impl DummyFeed {
    pub fn spawn(ffmpeg: &Path, args: &[String], log_path: &Path) -> FeedResult<Self> {
        let log = File::create(log_path).map_err(|source| FeedError::Log {
            source,
            path: log_path.to_path_buf(),
        })?;
        let log_err = log.try_clone().map_err(|source| FeedError::Log {
            source,
            path: log_path.to_path_buf(),
        })?;
        let child = Command::new(ffmpeg)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err))
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| FeedError::Spawn {
                source,
                program: ffmpeg.display().to_string(),
            })?;
        info!(
            pid = child.id().unwrap_or_default(),
            log = %log_path.display(),
            "dummy feed started"
        );
        Ok(Self {
            child,
            log_path: log_path.to_path_buf(),
        })
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub async fn stop(mut self) -> FeedResult<()> {
        match self.child.try_wait().map_err(FeedError::Stop)? {
            Some(status) => {
                warn!(%status, log = %self.log_path.display(), "dummy feed had already exited");
            }
            None => {
                self.child.kill().await.map_err(FeedError::Stop)?;
                info!("dummy feed stopped");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_target_encoder_ingest() {
        let args = command_args("10.0.0.7", "myStreamKey", 25.0);
        assert_eq!(args.last().map(String::as_str), Some("rtmp://10.0.0.7/live/myStreamKey"));
        assert!(args.contains(&"testsrc2=size=1920x1080:rate=25".to_string()));
        let filter_index = args.iter().position(|arg| arg == "-vf").unwrap();
        let filters = &args[filter_index + 1];
        assert_eq!(filters.matches("drawtext=").count(), 3);
        assert!(filters.contains("%{localtime\\:%X}"));
        assert!(filters.contains("%{pts \\: hms}"));
    }

    #[test]
    fn log_file_is_named_after_run() {
        assert_eq!(log_file_name("Ab12Cd34"), "ffmpeg_output_Ab12Cd34.txt");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stop_kills_running_process() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("feed.txt");
        let feed = DummyFeed::spawn(Path::new("sleep"), &["30".to_string()], &log).unwrap();
        assert_eq!(feed.log_path(), log.as_path());
        feed.stop().await.unwrap();
    }
}
