use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::config::AdInsertionSection;
use crate::error::ConfigError;
use crate::resource::{Identified, ResourceKind};

use super::model::{
    AdServer, AssetCatalog, LiveSource, NewAdServer, NewAssetCatalog, NewLiveSource, NewService,
    Service,
};
use super::{AdInsertionError, AdInsertionResult};

/// Capabilities consumed from the ad-insertion provider.
#[async_trait]
pub trait AdInsertionApi: Send + Sync {
    async fn get_ad_server(&self, id: &str) -> AdInsertionResult<AdServer>;
    async fn create_ad_server(&self, payload: &NewAdServer) -> AdInsertionResult<AdServer>;
    async fn get_asset_catalog(&self, id: &str) -> AdInsertionResult<AssetCatalog>;
    async fn create_asset_catalog(
        &self,
        payload: &NewAssetCatalog,
    ) -> AdInsertionResult<AssetCatalog>;
    async fn create_live_source(&self, payload: &NewLiveSource) -> AdInsertionResult<LiveSource>;
    async fn get_service(&self, id: &str) -> AdInsertionResult<Service>;
    async fn create_service(&self, payload: &NewService) -> AdInsertionResult<Service>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Expect {
    Created,
    Fetched,
}

/// Maps a provider response onto success or the matching error. Creates must
/// answer 201 and reads 200; a 404 on a read names the missing resource.
pub(crate) fn check_response(
    expect: Expect,
    endpoint: &str,
    status: StatusCode,
    body: String,
    missing: Option<(ResourceKind, &str)>,
) -> AdInsertionResult<String> {
    match expect {
        Expect::Created if status == StatusCode::CREATED => Ok(body),
        Expect::Fetched if status == StatusCode::OK => Ok(body),
        Expect::Created => Err(AdInsertionError::RemoteCreateFailed {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            body,
        }),
        Expect::Fetched => match missing {
            Some((kind, id)) if status == StatusCode::NOT_FOUND => {
                Err(AdInsertionError::ResourceNotFound {
                    kind,
                    id: id.to_string(),
                })
            }
            _ => Err(AdInsertionError::RemoteRequestFailed {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body,
            }),
        },
    }
}

/// REST client for the broadpeak.io API.
pub struct HttpAdInsertionApi {
    client: Client,
    api_base: String,
    api_key: String,
}

impl HttpAdInsertionApi {
    pub fn new(client: Client, config: &AdInsertionSection) -> Result<Self, ConfigError> {
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.resolve()?,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path.trim_start_matches('/'))
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        kind: ResourceKind,
        id: &str,
    ) -> AdInsertionResult<T> {
        let endpoint = self.url(path);
        debug!(%endpoint, "GET");
        let response = self
            .client
            .get(&endpoint)
            .bearer_auth(&self.api_key)
            .header("Accept", "application/json")
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        let body = check_response(Expect::Fetched, &endpoint, status, body, Some((kind, id)))?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn create<B, T>(&self, path: &str, payload: &B) -> AdInsertionResult<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned + Identified,
    {
        let endpoint = self.url(path);
        debug!(%endpoint, "POST");
        let response = self
            .client
            .post(&endpoint)
            .bearer_auth(&self.api_key)
            .header("Accept", "application/json")
            .json(payload)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        let body = check_response(Expect::Created, &endpoint, status, body, None)?;
        let created: T = serde_json::from_str(&body)?;
        debug!(%endpoint, id = %created.resource_id(), "created resource");
        Ok(created)
    }
}

#[async_trait]
impl AdInsertionApi for HttpAdInsertionApi {
    async fn get_ad_server(&self, id: &str) -> AdInsertionResult<AdServer> {
        self.get(&format!("sources/ad-server/{id}"), ResourceKind::AdServer, id)
            .await
    }

    async fn create_ad_server(&self, payload: &NewAdServer) -> AdInsertionResult<AdServer> {
        self.create("sources/ad-server", payload).await
    }

    async fn get_asset_catalog(&self, id: &str) -> AdInsertionResult<AssetCatalog> {
        self.get(
            &format!("sources/asset-catalog/{id}"),
            ResourceKind::AssetCatalog,
            id,
        )
        .await
    }

    async fn create_asset_catalog(
        &self,
        payload: &NewAssetCatalog,
    ) -> AdInsertionResult<AssetCatalog> {
        self.create("sources/asset-catalog", payload).await
    }

    async fn create_live_source(&self, payload: &NewLiveSource) -> AdInsertionResult<LiveSource> {
        self.create("sources/live", payload).await
    }

    async fn get_service(&self, id: &str) -> AdInsertionResult<Service> {
        self.get(
            &format!("services/ad-insertion/{id}"),
            ResourceKind::AdInsertionService,
            id,
        )
        .await
    }

    async fn create_service(&self, payload: &NewService) -> AdInsertionResult<Service> {
        self.create("services/ad-insertion", payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credential;

    #[test]
    fn create_requires_201() {
        let ok = check_response(
            Expect::Created,
            "https://api.example.com/v1/sources/live",
            StatusCode::CREATED,
            "{\"id\":1}".into(),
            None,
        );
        assert_eq!(ok.unwrap(), "{\"id\":1}");

        let err = check_response(
            Expect::Created,
            "https://api.example.com/v1/sources/live",
            StatusCode::OK,
            "{\"id\":1}".into(),
            None,
        )
        .unwrap_err();
        match err {
            AdInsertionError::RemoteCreateFailed {
                endpoint, status, ..
            } => {
                assert_eq!(endpoint, "https://api.example.com/v1/sources/live");
                assert_eq!(status, 200);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn missing_pinned_resource_is_reported_by_kind() {
        let err = check_response(
            Expect::Fetched,
            "https://api.example.com/v1/sources/ad-server/77",
            StatusCode::NOT_FOUND,
            "not found".into(),
            Some((ResourceKind::AdServer, "77")),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            AdInsertionError::ResourceNotFound { kind: ResourceKind::AdServer, ref id } if id == "77"
        ));

        let err = check_response(
            Expect::Fetched,
            "https://api.example.com/v1/sources/ad-server/77",
            StatusCode::FORBIDDEN,
            "denied".into(),
            Some((ResourceKind::AdServer, "77")),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            AdInsertionError::RemoteRequestFailed { status: 403, ref body, .. } if body == "denied"
        ));
    }

    #[test]
    fn endpoints_are_rooted_at_api_base() {
        let api = HttpAdInsertionApi::new(
            Client::new(),
            &AdInsertionSection {
                api_key: Credential::Inline("token".into()),
                api_base: "https://api.example.com/v1/".into(),
                transcoding_profile_id: None,
                vast_tag: "https://ads.example.com/vast".into(),
                ad_server_id: None,
                asset_catalog_id: None,
                service_id: None,
            },
        )
        .unwrap();
        assert_eq!(
            api.url("/services/ad-insertion/5"),
            "https://api.example.com/v1/services/ad-insertion/5"
        );
    }
}
