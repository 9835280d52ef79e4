//! Origin and consumer-facing playback URLs.
//!
//! All manipulation goes through [`url::Url`]: hosts are replaced, paths are
//! compared segment by segment and queries are appended, never spliced as
//! raw strings.

use thiserror::Error;
use url::Url;

use crate::encoding::ManifestLocation;

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("invalid url {url}: {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },
    #[error("cannot use {host} as host of {url}")]
    InvalidHost { url: String, host: String },
    #[error("url {0} has no hierarchical path")]
    CannotBeABase(String),
}

pub type PlaybackResult<T> = std::result::Result<T, PlaybackError>;

fn parse(raw: &str) -> PlaybackResult<Url> {
    let url = Url::parse(raw).map_err(|source| PlaybackError::InvalidUrl {
        url: raw.to_string(),
        source,
    })?;
    if url.cannot_be_a_base() {
        return Err(PlaybackError::CannotBeABase(raw.to_string()));
    }
    Ok(url)
}

fn segments(url: &Url) -> Vec<&str> {
    url.path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default()
}

pub fn public_base_url(bucket: &str) -> String {
    format!("https://{bucket}.s3.amazonaws.com/")
}

/// Appends path fragments to `base` with exactly one separator between
/// segments.
pub fn join_url(base: &str, parts: &[&str]) -> PlaybackResult<String> {
    let mut url = parse(base)?;
    let mut path: Vec<String> = segments(&url).into_iter().map(str::to_string).collect();
    path.extend(
        parts
            .iter()
            .flat_map(|part| part.split('/'))
            .filter(|segment| !segment.is_empty())
            .map(str::to_string),
    );
    url.set_path(&format!("/{}", path.join("/")));
    Ok(url.to_string())
}

pub fn origin_url(bucket: &str, manifest: &ManifestLocation) -> PlaybackResult<String> {
    join_url(
        &public_base_url(bucket),
        &[&manifest.output_path, &manifest.manifest_name],
    )
}

fn apply_cdn(url: &mut Url, cdn_fqdn: Option<&str>) -> PlaybackResult<()> {
    if let Some(host) = cdn_fqdn.filter(|host| !host.is_empty()) {
        url.set_host(Some(host))
            .map_err(|_| PlaybackError::InvalidHost {
                url: url.to_string(),
                host: host.to_string(),
            })?;
    }
    Ok(())
}

/// Segments of `path` after `prefix`, or all of them when `prefix` does not
/// lead the path.
fn strip_prefix<'p>(path: &[&'p str], prefix: &[&str]) -> Vec<&'p str> {
    if path.starts_with(prefix) {
        path[prefix.len()..].to_vec()
    } else {
        path.to_vec()
    }
}

pub fn format_splice_points(splice_points: &[f64]) -> String {
    splice_points
        .iter()
        .map(|point| point.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Ad-stitched playback URL for one origin manifest.
///
/// The service URL template is extended with the origin path minus the
/// catalog source path, and `bpkio_mids` carries the mid-roll offsets. The
/// commas stay literal.
pub fn playback_url(
    service_url: &str,
    origin_url: &str,
    source_url: &str,
    cdn_fqdn: Option<&str>,
    splice_points: &[f64],
) -> PlaybackResult<String> {
    let mut url = parse(service_url)?;
    apply_cdn(&mut url, cdn_fqdn)?;

    let origin = parse(origin_url)?;
    let source = parse(source_url)?;
    let origin_path = segments(&origin);
    let source_path = segments(&source);
    let asset = strip_prefix(&origin_path, &source_path);

    let mut path: Vec<&str> = segments(&url);
    path.extend(asset);
    let joined = format!("/{}", path.join("/"));
    url.set_path(&joined);

    if !splice_points.is_empty() {
        let mids = format!("bpkio_mids={}", format_splice_points(splice_points));
        let query = match url.query().filter(|q| !q.is_empty()) {
            Some(existing) => format!("{existing}&{mids}"),
            None => mids,
        };
        url.set_query(Some(&query));
    }
    Ok(url.to_string())
}

/// Live services need no path rewrite; only the CDN alias applies.
pub fn live_playback_url(service_url: &str, cdn_fqdn: Option<&str>) -> PlaybackResult<String> {
    let mut url = parse(service_url)?;
    apply_cdn(&mut url, cdn_fqdn)?;
    Ok(url.to_string())
}
