use serde::{Deserialize, Serialize};

use crate::resource::Identified;

/// Reference to another resource by numeric id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdRef {
    pub id: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAdServer {
    pub name: String,
    pub template: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub queries: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdServer {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAssetCatalog {
    pub name: String,
    pub url: String,
    pub asset_sample: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetCatalog {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewLiveSource {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LiveSource {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdServerBinding {
    pub ad_server: IdRef,
}

/// Which kind of ad insertion the service performs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ServiceFlavour {
    VodAdInsertion(AdServerBinding),
    LiveAdPreRoll(AdServerBinding),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewService {
    pub name: String,
    pub source: IdRef,
    #[serde(flatten)]
    pub flavour: ServiceFlavour,
    pub transcoding_profile: IdRef,
    pub enable_ad_transcoding: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServiceSource {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub url: Option<String>,
}

/// Ad insertion service; `url` is the playback URL template.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Service {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub source: Option<ServiceSource>,
}

macro_rules! numeric_id {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl Identified for $ty {
                fn resource_id(&self) -> String {
                    self.id.to_string()
                }
            }
        )+
    };
}

numeric_id!(AdServer, AssetCatalog, LiveSource, Service);
