//! Runs etcd as the consensus engine of a node and talks to its JSON
//! gateway for membership changes.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod admin;
mod args;
mod logs;
mod process;

pub use admin::{
    DEFAULT_REQUEST_TIMEOUT, HttpAdminClient, HttpAdminConnector, Member, MemberListResponse,
    ResponseHeader,
};
pub use args::etcd_args;
pub use process::{EtcdEngine, EtcdHandle, EtcdOptions, READY_POLL_INTERVAL, STOP_GRACE_PERIOD};
