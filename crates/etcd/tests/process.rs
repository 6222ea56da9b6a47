#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::time::Duration;

use minicluster_engine::{Engine, EngineConfig, EngineError, EngineHandle};
use minicluster_etcd::{EtcdEngine, EtcdOptions};
use minicluster_topology::{InitialMembership, NodeIdentity};
use url::Url;

fn install(bin_dir: &Path, script: &str) {
    std::fs::create_dir_all(bin_dir).unwrap();

    let path = bin_dir.join("etcd");
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

fn engine(bin_dir: &Path) -> EtcdEngine {
    EtcdEngine::new(EtcdOptions {
        bin_dir: Some(bin_dir.to_path_buf()),
        ..EtcdOptions::default()
    })
}

fn config(root: &Path) -> EngineConfig {
    // Nothing answers on this client URL, so the engine never becomes ready
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let identity = NodeIdentity::new(
        "n1",
        "demo",
        Url::parse("http://127.0.0.1:9300").unwrap(),
        Url::parse(&format!("http://127.0.0.1:{port}")).unwrap(),
        root,
    );

    EngineConfig::new(&identity, &InitialMembership::founding())
}

// Scripts are installed before the first spawn to avoid ETXTBSY
#[tokio::test]
async fn termination_reports_how_etcd_exited() {
    let root = tempfile::tempdir().unwrap();
    let long_running = root.path().join("long-running");
    let failing = root.path().join("failing");

    install(&long_running, "#!/bin/sh\nexec sleep 30\n");
    install(
        &failing,
        "#!/bin/sh\necho '{\"level\":\"fatal\",\"msg\":\"cannot access data directory\"}' >&2\nexit 3\n",
    );

    // Stopping on request is a clean termination
    let mut handle = engine(&long_running)
        .start(&config(root.path()))
        .await
        .unwrap();
    handle.stop().await.unwrap();
    assert_eq!(handle.terminated().await, Ok(()));
    assert!(
        tokio::time::timeout(Duration::from_millis(50), handle.terminated())
            .await
            .is_err()
    );
    handle.stop().await.unwrap();
    handle.close().await.unwrap();

    // Exiting on its own with a failure status is not
    let mut handle = engine(&failing).start(&config(root.path())).await.unwrap();
    assert_eq!(
        handle.terminated().await,
        Err(EngineError::Exited("exit status: 3".to_string()))
    );
    handle.close().await.unwrap();
}
