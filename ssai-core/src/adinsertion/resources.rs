use serde_json::{json, Value};
use tracing::info;
use url::Url;

use crate::config::{AdInsertionSection, LadderSection};
use crate::encoding::ManifestFormat;
use crate::resource::{ResourceKind, ResourceRef};

use super::api::AdInsertionApi;
use super::model::{
    AdServer, AdServerBinding, AssetCatalog, IdRef, LiveSource, NewAdServer, NewAssetCatalog,
    NewLiveSource, NewService, Service, ServiceFlavour,
};
use super::{AdInsertionError, AdInsertionResult};

pub const VOD_AD_SERVER_NAME: &str = "AdProxy VMAP Generator";
pub const LIVE_AD_SERVER_NAME: &str = "VAST Ad Server";
pub const ASSET_CATALOG_NAME: &str = "Encoded AVOD outputs";

fn parse_url(raw: &str) -> AdInsertionResult<Url> {
    Url::parse(raw).map_err(|source| AdInsertionError::InvalidUrl {
        url: raw.to_string(),
        source,
    })
}

/// Ad proxy that builds a VMAP with pre-roll, post-roll and the mid-rolls
/// passed on the playback URL.
pub fn vmap_generator_ad_server(vast_tag: &str) -> NewAdServer {
    NewAdServer {
        name: VOD_AD_SERVER_NAME.to_string(),
        template: "ad-proxy-vmap-generator".to_string(),
        url: None,
        queries: [
            "bpkio_pre=true".to_string(),
            "bpkio_post=true".to_string(),
            "bpkio_mids=$arg_bpkio_mids".to_string(),
            format!("bpkio_tag={vast_tag}"),
        ]
        .join("&"),
    }
}

/// Plain VAST ad server: the tag's query moves into `queries`.
pub fn vast_ad_server(vast_tag: &str) -> AdInsertionResult<NewAdServer> {
    let mut url = parse_url(vast_tag)?;
    let queries = url.query().unwrap_or_default().to_string();
    url.set_query(None);
    url.set_fragment(None);
    Ok(NewAdServer {
        name: LIVE_AD_SERVER_NAME.to_string(),
        template: "custom".to_string(),
        url: Some(url.to_string()),
        queries,
    })
}

/// Splits an origin URL right after the output base path: the head becomes
/// the catalog URL, the tail its sample asset. Matching is per path segment.
pub fn split_catalog_url(origin_url: &str, base_path: &str) -> AdInsertionResult<(String, String)> {
    let url = parse_url(origin_url)?;
    let segments: Vec<&str> = url
        .path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();
    let prefix: Vec<&str> = base_path.split('/').filter(|s| !s.is_empty()).collect();

    let start = if prefix.is_empty() {
        Some(0)
    } else {
        segments
            .windows(prefix.len())
            .position(|window| window == prefix.as_slice())
    };
    let Some(start) = start else {
        return Err(AdInsertionError::CatalogPrefixNotFound {
            url: origin_url.to_string(),
            base_path: base_path.to_string(),
        });
    };
    let end = start + prefix.len();

    let mut head = url.clone();
    head.set_query(None);
    head.set_fragment(None);
    if end == 0 {
        head.set_path("/");
    } else {
        head.set_path(&format!("/{}/", segments[..end].join("/")));
    }
    Ok((head.to_string(), segments[end..].join("/")))
}

pub fn asset_catalog(origin_url: &str, base_path: &str) -> AdInsertionResult<NewAssetCatalog> {
    let (url, asset_sample) = split_catalog_url(origin_url, base_path)?;
    Ok(NewAssetCatalog {
        name: ASSET_CATALOG_NAME.to_string(),
        url,
        asset_sample,
    })
}

pub fn vod_service(name: &str, catalog_id: u64, ad_server_id: u64, profile_id: u64) -> NewService {
    NewService {
        name: name.to_string(),
        source: IdRef { id: catalog_id },
        flavour: ServiceFlavour::VodAdInsertion(AdServerBinding {
            ad_server: IdRef { id: ad_server_id },
        }),
        transcoding_profile: IdRef { id: profile_id },
        enable_ad_transcoding: true,
    }
}

pub fn live_preroll_service(
    name: &str,
    live_source_id: u64,
    ad_server_id: u64,
    profile_id: u64,
) -> NewService {
    NewService {
        name: name.to_string(),
        source: IdRef { id: live_source_id },
        flavour: ServiceFlavour::LiveAdPreRoll(AdServerBinding {
            ad_server: IdRef { id: ad_server_id },
        }),
        transcoding_profile: IdRef { id: profile_id },
        enable_ad_transcoding: true,
    }
}

/// Transcoding profile the provider must install so inserted ads match the
/// content ladder.
pub fn transcoding_profile_suggestion(ladder: &LadderSection) -> Value {
    let jobs: Vec<Value> = ladder
        .video()
        .map(|rung| {
            json!({
                "level": rung.level,
                "scale": format!("-2:{}", rung.height),
                "bitratev": rung.bitrate.to_string(),
                "profilev": rung.profile.as_str(),
                "frameratev": ladder.frame_rate.to_string(),
            })
        })
        .collect();
    let audio_bitrate = ladder
        .audio()
        .next()
        .map(|rung| rung.bitrate.to_string())
        .unwrap_or_default();
    json!({
        "packaging": {
            "--hls.client_manifest_version=": "4",
            "--hls.minimum_fragment_length=": "4",
        },
        "servicetype": "offline_transcoding",
        "transcoding": {
            "jobs": jobs,
            "common": {
                "codeca": "aac",
                "codecv": "h264",
                "preset": "veryfast",
                "bitratea": audio_bitrate,
                "loudnorm": "I=-23:TP=-1",
            },
        },
    })
}

#[derive(Debug, Clone)]
pub struct VodResources {
    pub ad_server: AdServer,
    pub asset_catalog: AssetCatalog,
    pub service: Service,
}

impl VodResources {
    /// Path prefix the service strips from origin URLs: the service's own
    /// view of its source when reported, else the catalog URL.
    pub fn source_url(&self) -> &str {
        self.service
            .source
            .as_ref()
            .and_then(|source| source.url.as_deref())
            .unwrap_or(&self.asset_catalog.url)
    }
}

#[derive(Debug, Clone)]
pub struct LiveServiceBinding {
    pub origin_url: String,
    pub live_source: LiveSource,
    pub service: Service,
}

/// Resolves every ad-insertion resource a run needs, fetching pinned ids and
/// creating the rest.
pub struct AdInsertionProvisioner<'a> {
    api: &'a dyn AdInsertionApi,
    config: &'a AdInsertionSection,
}

impl<'a> AdInsertionProvisioner<'a> {
    pub fn new(api: &'a dyn AdInsertionApi, config: &'a AdInsertionSection) -> Self {
        Self { api, config }
    }

    pub fn transcoding_profile_id(&self) -> AdInsertionResult<u64> {
        self.config
            .transcoding_profile_id
            .ok_or(AdInsertionError::MissingTranscodingProfile)
    }

    pub async fn provision_vod(
        &self,
        service_name: &str,
        origin_urls: &[String],
        output_base_path: &str,
    ) -> AdInsertionResult<VodResources> {
        let profile_id = self.transcoding_profile_id()?;
        let api = self.api;

        let ad_server = ResourceRef::from_config(self.config.ad_server_id, || {
            vmap_generator_ad_server(&self.config.vast_tag)
        })
        .resolve(
            ResourceKind::AdServer,
            |id| async move { api.get_ad_server(&id).await },
            |payload| async move { api.create_ad_server(&payload).await },
        )
        .await?;

        let catalog_ref = match self.config.asset_catalog_id {
            Some(id) => ResourceRef::Pinned(id.to_string()),
            None => {
                let first = origin_urls.first().ok_or(AdInsertionError::NoOriginUrl)?;
                ResourceRef::ToCreate(asset_catalog(first, output_base_path)?)
            }
        };
        let asset_catalog = catalog_ref
            .resolve(
                ResourceKind::AssetCatalog,
                |id| async move { api.get_asset_catalog(&id).await },
                |payload| async move { api.create_asset_catalog(&payload).await },
            )
            .await?;

        let service = ResourceRef::from_config(self.config.service_id, || {
            vod_service(service_name, asset_catalog.id, ad_server.id, profile_id)
        })
        .resolve(
            ResourceKind::AdInsertionService,
            |id| async move { api.get_service(&id).await },
            |payload| async move { api.create_service(&payload).await },
        )
        .await?;

        // A freshly created service may not echo its source; re-read it.
        let service = if service.source.is_none() {
            api.get_service(&service.id.to_string()).await?
        } else {
            service
        };

        info!(
            ad_server_id = ad_server.id,
            asset_catalog_id = asset_catalog.id,
            service_id = service.id,
            "vod ad insertion resources ready"
        );
        Ok(VodResources {
            ad_server,
            asset_catalog,
            service,
        })
    }

    pub async fn resolve_live_ad_server(&self) -> AdInsertionResult<AdServer> {
        let api = self.api;
        let reference = match self.config.ad_server_id {
            Some(id) => ResourceRef::Pinned(id.to_string()),
            None => ResourceRef::ToCreate(vast_ad_server(&self.config.vast_tag)?),
        };
        reference
            .resolve(
                ResourceKind::AdServer,
                |id| async move { api.get_ad_server(&id).await },
                |payload| async move { api.create_ad_server(&payload).await },
            )
            .await
    }

    /// One live source and one pre-roll service per origin manifest.
    pub async fn provision_live(
        &self,
        ad_server: &AdServer,
        run_id: &str,
        manifests: &[(ManifestFormat, String)],
    ) -> AdInsertionResult<Vec<LiveServiceBinding>> {
        let profile_id = self.transcoding_profile_id()?;
        let mut bindings = Vec::with_capacity(manifests.len());
        for (label, origin_url) in manifests {
            let live_source = self
                .api
                .create_live_source(&NewLiveSource {
                    name: format!("Live - {run_id} - {label}"),
                    url: origin_url.clone(),
                })
                .await?;
            info!(live_source_id = live_source.id, %label, "live source created");
            let service = self
                .api
                .create_service(&live_preroll_service(
                    &format!("Live w/ PreRoll - {run_id} - {label}"),
                    live_source.id,
                    ad_server.id,
                    profile_id,
                ))
                .await?;
            info!(service_id = service.id, %label, "pre-roll service created");
            bindings.push(LiveServiceBinding {
                origin_url: origin_url.clone(),
                live_source,
                service,
            });
        }
        Ok(bindings)
    }
}
