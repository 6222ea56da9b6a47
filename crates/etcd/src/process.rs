//! The etcd child process

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use minicluster_engine::{Engine, EngineConfig, EngineError, EngineHandle, EngineIds};
use minicluster_membership::AdminClient;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info};

use crate::admin::HttpAdminClient;
use crate::args::etcd_args;
use crate::logs::forward_line;

/// How often readiness is polled.
pub const READY_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// How long etcd has to exit after SIGTERM before it is killed.
pub const STOP_GRACE_PERIOD: Duration = Duration::from_secs(10);

type Exit = Result<(), EngineError>;

/// Options for configuring an [`EtcdEngine`].
#[derive(Clone, Debug)]
pub struct EtcdOptions {
    /// Directory containing the `etcd` binary. Looked up on `PATH` if unset.
    pub bin_dir: Option<PathBuf>,

    /// Interval between readiness checks.
    pub ready_poll_interval: Duration,
}

impl Default for EtcdOptions {
    fn default() -> Self {
        Self {
            bin_dir: None,
            ready_poll_interval: READY_POLL_INTERVAL,
        }
    }
}

/// Launches etcd as a child process.
#[derive(Clone, Debug)]
pub struct EtcdEngine {
    bin_dir: Option<PathBuf>,
    ready_poll_interval: Duration,
}

impl EtcdEngine {
    /// Creates a new `EtcdEngine`.
    #[must_use]
    pub fn new(
        EtcdOptions {
            bin_dir,
            ready_poll_interval,
        }: EtcdOptions,
    ) -> Self {
        Self {
            bin_dir,
            ready_poll_interval,
        }
    }

    fn binary(&self) -> Result<PathBuf, EngineError> {
        match &self.bin_dir {
            Some(dir) => {
                let path = dir.join("etcd");
                if path.is_file() {
                    Ok(path)
                } else {
                    Err(EngineError::BinaryNotFound(path.display().to_string()))
                }
            }
            None => which::which("etcd")
                .map_err(|e| EngineError::BinaryNotFound(format!("etcd on PATH: {e}"))),
        }
    }
}

#[async_trait]
impl Engine for EtcdEngine {
    type Handle = EtcdHandle;

    async fn start(&self, config: &EngineConfig) -> Result<Self::Handle, EngineError> {
        let binary = self.binary()?;
        let admin = HttpAdminClient::new(config.advertise_client_urls.clone())
            .map_err(EngineError::Admin)?;

        let mut cmd = Command::new(&binary);
        cmd.args(etcd_args(config))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!("spawning etcd: {:?}", cmd);

        let mut child = cmd
            .spawn()
            .map_err(|e| EngineError::Spawn(format!("{}: {e}", binary.display())))?;

        let pid = child
            .id()
            .ok_or_else(|| EngineError::Spawn("no pid for spawned etcd".to_string()))?;

        info!(pid, "etcd spawned");

        let shutdown_token = CancellationToken::new();
        let task_tracker = TaskTracker::new();

        if let Some(stdout) = child.stdout.take() {
            task_tracker.spawn(async move {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    forward_line(&line);
                }
            });
        }

        if let Some(stderr) = child.stderr.take() {
            task_tracker.spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    forward_line(&line);
                }
            });
        }

        let (exit_tx, exit_rx) = watch::channel(None);
        task_tracker.spawn(monitor(child, pid, shutdown_token.clone(), exit_tx));
        task_tracker.close();

        Ok(EtcdHandle {
            admin,
            exit: exit_rx,
            fired: false,
            ids: None,
            ready_poll_interval: self.ready_poll_interval,
            shutdown_token,
            task_tracker,
        })
    }
}

async fn monitor(
    mut child: Child,
    pid: u32,
    shutdown_token: CancellationToken,
    exit_tx: watch::Sender<Option<Exit>>,
) {
    let exit = tokio::select! {
        status = child.wait() => exited(status),
        () = shutdown_token.cancelled() => {
            info!("stop requested, terminating etcd...");

            #[allow(clippy::cast_possible_wrap)]
            let pid = Pid::from_raw(pid as i32);

            if let Err(err) = signal::kill(pid, Signal::SIGTERM) {
                error!("failed to send SIGTERM to etcd: {}", err);
            }

            match tokio::time::timeout(STOP_GRACE_PERIOD, child.wait()).await {
                Ok(Ok(status)) => info!("etcd exited with status: {}", status),
                Ok(Err(err)) => error!("failed to wait for etcd: {}", err),
                Err(_) => {
                    error!("timeout waiting for etcd to exit, killing...");
                    if let Err(err) = child.kill().await {
                        error!("failed to kill etcd: {}", err);
                    }
                }
            }

            Ok(())
        }
    };

    exit_tx.send_replace(Some(exit));
}

fn exited(status: std::io::Result<ExitStatus>) -> Exit {
    match status {
        Ok(status) if status.success() => {
            info!("etcd exited with status: {}", status);
            Ok(())
        }
        Ok(status) => {
            error!("etcd exited with non-zero status: {}", status);
            Err(EngineError::Exited(status.to_string()))
        }
        Err(err) => {
            error!("failed to wait for etcd: {}", err);
            Err(EngineError::Exited(err.to_string()))
        }
    }
}

async fn wait_exit(exit: &mut watch::Receiver<Option<Exit>>) -> Exit {
    exit.wait_for(Option::is_some).await.map_or_else(
        |_| Err(EngineError::Exited("etcd monitor ended".to_string())),
        |exit| (*exit).clone().unwrap_or(Ok(())),
    )
}

async fn poll_ready(admin: HttpAdminClient, interval: Duration) -> EngineIds {
    loop {
        match admin.health().await {
            Ok(true) => match admin.member_list().await {
                Ok(list) => {
                    return EngineIds {
                        member_id: format!("{:x}", list.header.member_id),
                        cluster_id: format!("{:x}", list.header.cluster_id),
                    };
                }
                Err(e) => debug!("healthy but member list failed: {}", e),
            },
            Ok(false) => debug!("etcd not healthy yet"),
            Err(e) => debug!("etcd not answering yet: {}", e),
        }

        tokio::time::sleep(interval).await;
    }
}

/// Handle to a running etcd process.
#[derive(Debug)]
pub struct EtcdHandle {
    admin: HttpAdminClient,
    exit: watch::Receiver<Option<Exit>>,
    fired: bool,
    ids: Option<EngineIds>,
    ready_poll_interval: Duration,
    shutdown_token: CancellationToken,
    task_tracker: TaskTracker,
}

#[async_trait]
impl EngineHandle for EtcdHandle {
    async fn wait_ready(&mut self) -> Result<EngineIds, EngineError> {
        let mut exit = self.exit.clone();
        let ready = poll_ready(self.admin.clone(), self.ready_poll_interval);

        tokio::select! {
            outcome = wait_exit(&mut exit) => {
                self.fired = true;

                Err(match outcome {
                    Ok(()) => EngineError::Exited("exited before becoming ready".to_string()),
                    Err(e) => e,
                })
            }
            ids = ready => {
                self.ids = Some(ids.clone());

                Ok(ids)
            }
        }
    }

    async fn terminated(&mut self) -> Result<(), EngineError> {
        if self.fired {
            return std::future::pending().await;
        }

        let outcome = wait_exit(&mut self.exit).await;
        self.fired = true;

        outcome
    }

    async fn remove_self(&self) -> Result<(), EngineError> {
        let ids = self.ids.as_ref().ok_or(EngineError::NotReady)?;

        info!(member_id = %ids.member_id, "removing self from cluster");

        self.admin
            .remove_member(&ids.member_id)
            .await
            .map_err(EngineError::Admin)
    }

    async fn stop(&mut self) -> Result<(), EngineError> {
        if self.shutdown_token.is_cancelled() {
            debug!("etcd already stopped");
            return Ok(());
        }

        info!("etcd shutting down...");

        self.shutdown_token.cancel();
        self.task_tracker.wait().await;

        info!("etcd shutdown");

        Ok(())
    }

    async fn close(&mut self) -> Result<(), EngineError> {
        // Covers handles closed without a prior stop
        self.shutdown_token.cancel();
        self.task_tracker.wait().await;

        debug!("etcd handle closed");

        Ok(())
    }
}
