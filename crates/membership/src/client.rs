//! Administrative access to a running consensus engine

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::AdminError;

/// A cluster member as reported by the engine's membership API.
///
/// Members added but not yet started report an empty name and no client
/// URLs.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct MemberRecord {
    /// Member id, rendered as lowercase hex.
    pub id: String,

    /// Member name.
    pub name: String,

    /// Advertised peer URLs.
    pub peer_urls: Vec<Url>,

    /// Advertised client URLs.
    pub client_urls: Vec<Url>,
}

/// Membership operations exposed by a running engine.
#[async_trait]
pub trait AdminClient
where
    Self: Send + Sync + 'static,
{
    /// Lists every member of the cluster.
    async fn list_members(&self) -> Result<Vec<MemberRecord>, AdminError>;

    /// Registers a new member advertising `peer_url`.
    async fn add_member(&self, peer_url: &Url) -> Result<MemberRecord, AdminError>;

    /// Removes the member with the given hex id.
    async fn remove_member(&self, id: &str) -> Result<(), AdminError>;
}

/// Opens administrative clients against a set of endpoints.
#[async_trait]
pub trait AdminConnector
where
    Self: Send + Sync + 'static,
{
    /// The client produced by this connector.
    type Client: AdminClient;

    /// Connects to the first of `endpoints` that answers within `dial_timeout`.
    async fn connect(
        &self,
        endpoints: &[Url],
        dial_timeout: Duration,
    ) -> Result<Self::Client, AdminError>;
}
