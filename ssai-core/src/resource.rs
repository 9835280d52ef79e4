//! Pinned-or-created resolution of remote resources.
//!
//! Re-running without pinning the ids logged here creates duplicate remote
//! resources; pinning them in the config is the only way to resume a setup.

use std::fmt;
use std::future::Future;

use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    HttpsInput,
    RtmpInput,
    S3Output,
    AdServer,
    AssetCatalog,
    LiveSource,
    AdInsertionService,
    TranscodingProfile,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ResourceKind::HttpsInput => "https input",
            ResourceKind::RtmpInput => "rtmp input",
            ResourceKind::S3Output => "s3 output",
            ResourceKind::AdServer => "ad server",
            ResourceKind::AssetCatalog => "asset catalog",
            ResourceKind::LiveSource => "live source",
            ResourceKind::AdInsertionService => "ad insertion service",
            ResourceKind::TranscodingProfile => "transcoding profile",
        };
        f.write_str(label)
    }
}

/// Anything the remote services hand back with an identifier.
pub trait Identified {
    fn resource_id(&self) -> String;
}

/// A remote resource that is either already known by id or must be created
/// from `P`.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceRef<P> {
    Pinned(String),
    ToCreate(P),
}

impl<P> ResourceRef<P> {
    pub fn from_config<I: ToString>(pinned: Option<I>, params: impl FnOnce() -> P) -> Self {
        match pinned {
            Some(id) => ResourceRef::Pinned(id.to_string()),
            None => ResourceRef::ToCreate(params()),
        }
    }

    /// Fetches the pinned resource or creates a new one. The fetch side is
    /// expected to fail with a not-found error when the id is unknown.
    pub async fn resolve<T, E, F, FFut, C, CFut>(
        self,
        kind: ResourceKind,
        fetch: F,
        create: C,
    ) -> Result<T, E>
    where
        T: Identified,
        F: FnOnce(String) -> FFut,
        FFut: Future<Output = Result<T, E>>,
        C: FnOnce(P) -> CFut,
        CFut: Future<Output = Result<T, E>>,
    {
        match self {
            ResourceRef::Pinned(id) => {
                debug!(%kind, %id, "fetching pinned resource");
                fetch(id).await
            }
            ResourceRef::ToCreate(params) => {
                let created = create(params).await?;
                info!(
                    %kind,
                    id = %created.resource_id(),
                    "created resource; pin this id in the config to reuse it"
                );
                Ok(created)
            }
        }
    }
}
