//! Command line rendering

use minicluster_engine::EngineConfig;
use minicluster_topology::render_url;
use url::Url;

/// Renders the etcd flags for `config`.
pub fn etcd_args(config: &EngineConfig) -> Vec<String> {
    vec![
        "--name".to_string(),
        config.name.clone(),
        "--data-dir".to_string(),
        config.data_dir.display().to_string(),
        "--listen-peer-urls".to_string(),
        url_list(&config.listen_peer_urls),
        "--listen-client-urls".to_string(),
        url_list(&config.listen_client_urls),
        "--initial-advertise-peer-urls".to_string(),
        url_list(&config.advertise_peer_urls),
        "--advertise-client-urls".to_string(),
        url_list(&config.advertise_client_urls),
        "--initial-cluster".to_string(),
        config.initial_cluster.clone(),
        "--initial-cluster-token".to_string(),
        config.initial_cluster_token.clone(),
        "--initial-cluster-state".to_string(),
        config.initial_cluster_state.to_string(),
    ]
}

fn url_list(urls: &[Url]) -> String {
    urls.iter().map(render_url).collect::<Vec<_>>().join(",")
}
