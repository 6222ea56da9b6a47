//! In-memory administrative client for tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use url::Url;

use crate::client::{AdminClient, AdminConnector, MemberRecord};
use crate::error::AdminError;

/// Shared record of the calls made against a mock, in order.
pub type CallLog = Arc<Mutex<Vec<String>>>;

#[derive(Debug, Default)]
struct State {
    members: Vec<MemberRecord>,
    next_id: u64,
    list_error: Option<AdminError>,
    add_error: Option<AdminError>,
}

/// Administrative client holding membership in memory.
///
/// Clones share state, so a test can keep one handle and give another to
/// the code under test.
#[derive(Clone, Debug, Default)]
pub struct MockAdmin {
    calls: CallLog,
    state: Arc<Mutex<State>>,
}

impl MockAdmin {
    /// Creates an empty mock recording into a fresh call log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a mock recording into `calls`.
    #[must_use]
    pub fn with_call_log(calls: CallLog) -> Self {
        Self {
            calls,
            state: Arc::default(),
        }
    }

    /// Adds a started member.
    ///
    /// # Panics
    ///
    /// Panics if the URLs do not parse.
    #[must_use]
    pub fn member(self, id: &str, name: &str, peer_url: &str, client_url: &str) -> Self {
        self.push(MemberRecord {
            id: id.to_string(),
            name: name.to_string(),
            peer_urls: vec![Url::parse(peer_url).unwrap()],
            client_urls: vec![Url::parse(client_url).unwrap()],
        })
    }

    /// Adds an arbitrary member record.
    #[must_use]
    pub fn push(self, record: MemberRecord) -> Self {
        self.state.lock().members.push(record);
        self
    }

    /// Makes every `list_members` call fail.
    #[must_use]
    pub fn failing_list(self, error: AdminError) -> Self {
        self.state.lock().list_error = Some(error);
        self
    }

    /// Makes every `add_member` call fail.
    #[must_use]
    pub fn failing_add(self, error: AdminError) -> Self {
        self.state.lock().add_error = Some(error);
        self
    }

    /// Calls made so far.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Current membership.
    #[must_use]
    pub fn members(&self) -> Vec<MemberRecord> {
        self.state.lock().members.clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl AdminClient for MockAdmin {
    async fn list_members(&self) -> Result<Vec<MemberRecord>, AdminError> {
        self.record("list_members".to_string());

        let state = self.state.lock();
        match &state.list_error {
            Some(error) => Err(error.clone()),
            None => Ok(state.members.clone()),
        }
    }

    async fn add_member(&self, peer_url: &Url) -> Result<MemberRecord, AdminError> {
        self.record(format!("add_member {peer_url}"));

        let mut state = self.state.lock();
        if let Some(error) = &state.add_error {
            return Err(error.clone());
        }

        state.next_id += 1;
        let record = MemberRecord {
            id: format!("{:x}", 0xa000 + state.next_id),
            name: String::new(),
            peer_urls: vec![peer_url.clone()],
            client_urls: Vec::new(),
        };
        state.members.push(record.clone());

        Ok(record)
    }

    async fn remove_member(&self, id: &str) -> Result<(), AdminError> {
        self.record(format!("remove_member {id}"));

        self.state.lock().members.retain(|m| m.id != id);
        Ok(())
    }
}

/// Connector handing out clones of a [`MockAdmin`].
#[derive(Clone, Debug, Default)]
pub struct MockConnector {
    admin: MockAdmin,
    connect_error: Option<AdminError>,
    connect_delay: Option<Duration>,
}

impl MockConnector {
    /// Creates a connector handing out `admin`.
    #[must_use]
    pub const fn new(admin: MockAdmin) -> Self {
        Self {
            admin,
            connect_error: None,
            connect_delay: None,
        }
    }

    /// Makes every connection attempt fail.
    #[must_use]
    pub fn failing(mut self, error: AdminError) -> Self {
        self.connect_error = Some(error);
        self
    }

    /// Delays every connection attempt.
    #[must_use]
    pub const fn delayed(mut self, delay: Duration) -> Self {
        self.connect_delay = Some(delay);
        self
    }
}

#[async_trait]
impl AdminConnector for MockConnector {
    type Client = MockAdmin;

    async fn connect(
        &self,
        endpoints: &[Url],
        _dial_timeout: Duration,
    ) -> Result<Self::Client, AdminError> {
        let endpoints: Vec<String> = endpoints.iter().map(ToString::to_string).collect();
        self.admin
            .record(format!("connect {}", endpoints.join(",")));

        if let Some(delay) = self.connect_delay {
            tokio::time::sleep(delay).await;
        }

        match &self.connect_error {
            Some(error) => Err(error.clone()),
            None => Ok(self.admin.clone()),
        }
    }
}
