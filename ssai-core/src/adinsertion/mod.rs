pub mod api;
pub mod model;
pub mod resources;

use thiserror::Error;

use crate::resource::ResourceKind;

pub use api::{AdInsertionApi, HttpAdInsertionApi};
pub use model::{AdServer, AssetCatalog, LiveSource, Service};
pub use resources::{
    split_catalog_url, transcoding_profile_suggestion, AdInsertionProvisioner, LiveServiceBinding,
    VodResources,
};

#[derive(Debug, Error)]
pub enum AdInsertionError {
    #[error("{kind} {id} not found")]
    ResourceNotFound { kind: ResourceKind, id: String },
    #[error("unable to create {endpoint} (HTTP {status}): {body}")]
    RemoteCreateFailed {
        endpoint: String,
        status: u16,
        body: String,
    },
    #[error("unable to retrieve {endpoint} (HTTP {status}): {body}")]
    RemoteRequestFailed {
        endpoint: String,
        status: u16,
        body: String,
    },
    #[error("no transcoding profile id configured; ask the provider to install the suggested profile")]
    MissingTranscodingProfile,
    #[error("invalid url {url}: {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },
    #[error("origin url {url} does not contain the output base path {base_path}")]
    CatalogPrefixNotFound { url: String, base_path: String },
    #[error("no origin manifest url to register")]
    NoOriginUrl,
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type AdInsertionResult<T> = std::result::Result<T, AdInsertionError>;
