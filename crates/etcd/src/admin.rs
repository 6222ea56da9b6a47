//! Membership administration over etcd's JSON gateway

use std::time::Duration;

use async_trait::async_trait;
use minicluster_membership::{AdminClient, AdminConnector, AdminError, MemberRecord};
use minicluster_topology::render_url;
use reqwest::{Client, Response};
use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::debug;
use url::Url;

/// Timeout for requests made without an explicit dial timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Response header carried by every gateway call.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
pub struct ResponseHeader {
    /// Id of the cluster that answered.
    #[serde(default, deserialize_with = "uint64")]
    pub cluster_id: u64,

    /// Id of the member that answered.
    #[serde(default, deserialize_with = "uint64")]
    pub member_id: u64,
}

/// A member as encoded by the gateway.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
pub struct Member {
    /// Member id.
    #[serde(rename = "ID", default, deserialize_with = "uint64")]
    pub id: u64,

    /// Member name; empty until the member first starts.
    #[serde(default)]
    pub name: String,

    /// Advertised peer URLs.
    #[serde(rename = "peerURLs", default)]
    pub peer_urls: Vec<Url>,

    /// Advertised client URLs; empty until the member first starts.
    #[serde(rename = "clientURLs", default)]
    pub client_urls: Vec<Url>,
}

impl From<Member> for MemberRecord {
    fn from(member: Member) -> Self {
        Self {
            id: format!("{:x}", member.id),
            name: member.name,
            peer_urls: member.peer_urls,
            client_urls: member.client_urls,
        }
    }
}

/// Body of a member list response.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
pub struct MemberListResponse {
    /// Response header.
    #[serde(default)]
    pub header: ResponseHeader,

    /// Every member of the cluster.
    #[serde(default)]
    pub members: Vec<Member>,
}

#[derive(Deserialize)]
struct MemberAddResponse {
    member: Member,
}

#[derive(Deserialize)]
struct Health {
    health: String,
}

#[derive(Default, Deserialize)]
struct GatewayError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    error: String,
}

#[derive(Serialize)]
struct MemberAddRequest {
    #[serde(rename = "peerURLs")]
    peer_urls: Vec<String>,
}

#[derive(Serialize)]
struct MemberRemoveRequest {
    #[serde(rename = "ID")]
    id: String,
}

#[derive(Serialize)]
struct Empty {}

// The gateway encodes 64-bit integers as strings, older releases as numbers
fn uint64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

/// Client for the membership API of one or more etcd members.
///
/// Requests go to the endpoints in order. An endpoint that refuses the
/// connection is skipped. Any other failure is final, including a timeout
/// after the request went out, so membership changes are never sent twice.
#[derive(Clone, Debug)]
pub struct HttpAdminClient {
    client: Client,
    endpoints: Vec<Url>,
}

impl HttpAdminClient {
    /// Creates a client with default transport settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(endpoints: Vec<Url>) -> Result<Self, AdminError> {
        Self::with_timeout(endpoints, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Creates a client whose connects and requests are bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_timeout(endpoints: Vec<Url>, timeout: Duration) -> Result<Self, AdminError> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| AdminError::Transport(e.to_string()))?;

        Ok(Self { client, endpoints })
    }

    /// Endpoints in the order they are tried.
    #[must_use]
    pub fn endpoints(&self) -> &[Url] {
        &self.endpoints
    }

    /// Whether the first reachable endpoint reports itself healthy.
    ///
    /// # Errors
    ///
    /// Returns an error if no endpoint answers or the answer is malformed.
    pub async fn health(&self) -> Result<bool, AdminError> {
        let response = self
            .send(|client, endpoint| Ok(client.get(endpoint.join("/health")?)))
            .await?;
        let health: Health = decode(response).await?;

        Ok(health.health == "true")
    }

    /// Answers from `/version`, used to check an endpoint is serving.
    ///
    /// # Errors
    ///
    /// Returns an error if no endpoint answers.
    pub async fn version(&self) -> Result<serde_json::Value, AdminError> {
        let response = self
            .send(|client, endpoint| Ok(client.get(endpoint.join("/version")?)))
            .await?;

        decode(response).await
    }

    /// The full member list response, including the response header.
    ///
    /// # Errors
    ///
    /// Returns an error if no endpoint answers or the answer is rejected.
    pub async fn member_list(&self) -> Result<MemberListResponse, AdminError> {
        self.post("/v3/cluster/member/list", &Empty {}).await
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, AdminError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let response = self
            .send(|client, endpoint| Ok(client.post(endpoint.join(path)?).json(body)))
            .await?;

        decode(response).await
    }

    async fn send<F>(&self, request: F) -> Result<Response, AdminError>
    where
        F: Fn(&Client, &Url) -> Result<reqwest::RequestBuilder, url::ParseError>,
    {
        let mut unreachable = Vec::new();

        for endpoint in &self.endpoints {
            let builder = request(&self.client, endpoint)
                .map_err(|e| AdminError::Transport(format!("bad endpoint {endpoint}: {e}")))?;

            match builder.send().await {
                Ok(response) => return Ok(response),
                // Only a failed connect guarantees the request was never sent
                Err(e) if e.is_connect() => {
                    debug!(%endpoint, "endpoint unreachable: {}", e);
                    unreachable.push(endpoint.to_string());
                }
                Err(e) => return Err(AdminError::Transport(e.to_string())),
            }
        }

        Err(AdminError::Unreachable(unreachable))
    }
}

async fn decode<R>(response: Response) -> Result<R, AdminError>
where
    R: DeserializeOwned,
{
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| AdminError::Transport(e.to_string()))?;

    if !status.is_success() {
        let error: GatewayError = serde_json::from_str(&body).unwrap_or_default();
        let message = [error.message, error.error]
            .into_iter()
            .find(|m| !m.is_empty())
            .unwrap_or(body);

        return Err(AdminError::Rejected {
            status: status.as_u16(),
            message,
        });
    }

    serde_json::from_str(&body).map_err(|e| AdminError::Decode(e.to_string()))
}

#[async_trait]
impl AdminClient for HttpAdminClient {
    async fn list_members(&self) -> Result<Vec<MemberRecord>, AdminError> {
        let response = self.member_list().await?;

        Ok(response.members.into_iter().map(MemberRecord::from).collect())
    }

    async fn add_member(&self, peer_url: &Url) -> Result<MemberRecord, AdminError> {
        let request = MemberAddRequest {
            peer_urls: vec![render_url(peer_url)],
        };
        let response: MemberAddResponse = self.post("/v3/cluster/member/add", &request).await?;

        Ok(response.member.into())
    }

    async fn remove_member(&self, id: &str) -> Result<(), AdminError> {
        let id = u64::from_str_radix(id, 16)
            .map_err(|e| AdminError::Decode(format!("member id {id:?} is not hex: {e}")))?;
        let request = MemberRemoveRequest { id: id.to_string() };

        let _: MemberListResponse = self.post("/v3/cluster/member/remove", &request).await?;

        Ok(())
    }
}

/// Connects [`HttpAdminClient`]s to discovered peers.
///
/// Every endpoint is tried at once; the first to answer `/version` wins.
#[derive(Clone, Copy, Debug, Default)]
pub struct HttpAdminConnector;

#[async_trait]
impl AdminConnector for HttpAdminConnector {
    type Client = HttpAdminClient;

    async fn connect(
        &self,
        endpoints: &[Url],
        dial_timeout: Duration,
    ) -> Result<Self::Client, AdminError> {
        let mut attempts = JoinSet::new();

        for (index, endpoint) in endpoints.iter().cloned().enumerate() {
            attempts.spawn(async move {
                let client = HttpAdminClient::with_timeout(vec![endpoint.clone()], dial_timeout);
                let answer = match client {
                    Ok(client) => client.version().await,
                    Err(e) => Err(e),
                };

                (index, endpoint, answer)
            });
        }

        let mut unreachable = Vec::new();

        while let Some(joined) = attempts.join_next().await {
            match joined {
                Ok((index, endpoint, Ok(version))) => {
                    debug!(%endpoint, %version, "connected to peer");

                    // Start with the endpoint that answered
                    let mut ordered = endpoints.to_vec();
                    ordered.rotate_left(index);

                    return HttpAdminClient::with_timeout(ordered, dial_timeout);
                }
                Ok((index, endpoint, Err(e))) => {
                    debug!(%endpoint, "peer did not answer: {}", e);
                    unreachable.push((index, endpoint.to_string()));
                }
                Err(e) => debug!("connect task failed: {}", e),
            }
        }

        unreachable.sort_unstable();

        Err(AdminError::Unreachable(
            unreachable.into_iter().map(|(_, endpoint)| endpoint).collect(),
        ))
    }
}
