use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::{Json, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use minicluster_etcd::{HttpAdminClient, HttpAdminConnector};
use minicluster_membership::{AdminClient, AdminConnector, AdminError, ClusterJoinCoordinator};
use minicluster_topology::{ClusterState, DiscoveredPeer, NodeIdentity};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use url::Url;

const CLUSTER_ID: &str = "14841639068965178418";
const MEMBER_ID: &str = "10276657743932975437";

/// Membership held by the fake gateway.
struct FakeCluster {
    members: Vec<Value>,
    next_id: u64,
    add_delay: Option<Duration>,
}

type Cluster = Arc<Mutex<FakeCluster>>;

fn header() -> Value {
    json!({ "cluster_id": CLUSTER_ID, "member_id": MEMBER_ID, "raft_term": "2" })
}

fn rejected(status: StatusCode, code: u8, message: &str) -> (StatusCode, Json<Value>) {
    (
        status,
        Json(json!({ "error": message, "code": code, "message": message })),
    )
}

async fn health() -> Json<Value> {
    Json(json!({ "health": "true", "reason": "" }))
}

async fn version() -> Json<Value> {
    Json(json!({ "etcdserver": "3.5.17", "etcdcluster": "3.5.0" }))
}

async fn list(State(cluster): State<Cluster>) -> Json<Value> {
    let cluster = cluster.lock();

    Json(json!({ "header": header(), "members": cluster.members }))
}

async fn add(
    State(cluster): State<Cluster>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let (response, delay) = {
        let mut cluster = cluster.lock();
        let peer_urls = body["peerURLs"].clone();

        if cluster.members.iter().any(|m| m["peerURLs"] == peer_urls) {
            return rejected(
                StatusCode::BAD_REQUEST,
                9,
                "etcdserver: Peer URLs already exists",
            );
        }

        cluster.next_id += 1;
        let member = json!({ "ID": cluster.next_id.to_string(), "peerURLs": peer_urls });
        cluster.members.push(member.clone());

        (
            json!({ "header": header(), "member": member, "members": cluster.members }),
            cluster.add_delay,
        )
    };

    // Applied before answering, like a member that is slow to reply
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    (StatusCode::OK, Json(response))
}

async fn remove(
    State(cluster): State<Cluster>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let mut cluster = cluster.lock();
    let before = cluster.members.len();
    cluster.members.retain(|m| m["ID"] != body["ID"]);

    if cluster.members.len() == before {
        return rejected(StatusCode::NOT_FOUND, 5, "etcdserver: member not found");
    }

    (
        StatusCode::OK,
        Json(json!({ "header": header(), "members": cluster.members })),
    )
}

async fn spawn_gateway() -> (Url, Cluster) {
    spawn_gateway_with(None).await
}

async fn spawn_gateway_with(add_delay: Option<Duration>) -> (Url, Cluster) {
    let cluster = Arc::new(Mutex::new(FakeCluster {
        members: vec![json!({
            "ID": MEMBER_ID,
            "name": "n0",
            "peerURLs": ["http://127.0.0.1:9300"],
            "clientURLs": ["http://127.0.0.1:9301"],
        })],
        next_id: 1000,
        add_delay,
    }));

    let app = Router::new()
        .route("/health", get(health))
        .route("/version", get(version))
        .route("/v3/cluster/member/list", post(list))
        .route("/v3/cluster/member/add", post(add))
        .route("/v3/cluster/member/remove", post(remove))
        .with_state(Arc::clone(&cluster));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (Url::parse(&format!("http://{addr}")).unwrap(), cluster)
}

/// An endpoint nothing listens on.
fn dead_endpoint() -> Url {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    Url::parse(&format!("http://{addr}")).unwrap()
}

#[tokio::test]
async fn connector_skips_dead_endpoints() {
    let (live, _) = spawn_gateway().await;
    let dead = dead_endpoint();

    let client = HttpAdminConnector
        .connect(&[dead.clone(), live.clone()], Duration::from_secs(2))
        .await
        .unwrap();

    assert_eq!(client.endpoints(), &[live, dead]);

    let members = client.list_members().await.unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].id, "8e9e05c52164694d");
    assert_eq!(members[0].name, "n0");
}

#[tokio::test]
async fn connector_is_not_held_up_by_a_silent_endpoint() {
    // Accepts connections through the backlog but never answers
    let silent = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let silent_url = Url::parse(&format!("http://{}", silent.local_addr().unwrap())).unwrap();
    let (live, _) = spawn_gateway().await;

    let identity = NodeIdentity::new(
        "n1",
        "demo",
        Url::parse("http://127.0.0.1:9302").unwrap(),
        Url::parse("http://127.0.0.1:9303").unwrap(),
        "data",
    );
    let peers = [
        DiscoveredPeer {
            peer_url: Url::parse("http://127.0.0.1:9304").unwrap(),
            client_url: silent_url.clone(),
        },
        DiscoveredPeer {
            peer_url: Url::parse("http://127.0.0.1:9300").unwrap(),
            client_url: live.clone(),
        },
    ];

    let membership = ClusterJoinCoordinator::new(HttpAdminConnector, Duration::from_secs(2))
        .bootstrap(&identity, &peers)
        .await
        .unwrap();

    assert_eq!(membership.cluster_state(), ClusterState::Existing);

    let client = HttpAdminConnector
        .connect(&[silent_url.clone(), live.clone()], Duration::from_secs(2))
        .await
        .unwrap();
    assert_eq!(client.endpoints(), &[live, silent_url]);
}

#[tokio::test]
async fn connector_reports_every_unreachable_endpoint() {
    let result = HttpAdminConnector
        .connect(&[dead_endpoint(), dead_endpoint()], Duration::from_secs(2))
        .await;

    assert!(matches!(result, Err(AdminError::Unreachable(endpoints)) if endpoints.len() == 2));
}

#[tokio::test]
async fn readiness_endpoints_report_ids() {
    let (endpoint, _) = spawn_gateway().await;
    let client = HttpAdminClient::new(vec![endpoint]).unwrap();

    assert!(client.health().await.unwrap());

    let list = client.member_list().await.unwrap();
    assert_eq!(format!("{:x}", list.header.member_id), "8e9e05c52164694d");
    assert_eq!(format!("{:x}", list.header.cluster_id), "cdf818194e3a8c32");
}

#[tokio::test]
async fn add_then_remove_member() {
    let (endpoint, cluster) = spawn_gateway().await;
    let client = HttpAdminClient::new(vec![endpoint]).unwrap();

    let added = client
        .add_member(&Url::parse("http://127.0.0.1:9302").unwrap())
        .await
        .unwrap();

    assert_eq!(added.id, "3e9");
    assert!(added.client_urls.is_empty());
    assert_eq!(
        cluster.lock().members[1]["peerURLs"],
        json!(["http://127.0.0.1:9302"])
    );

    client.remove_member(&added.id).await.unwrap();
    assert_eq!(cluster.lock().members.len(), 1);
}

#[tokio::test]
async fn gateway_errors_are_rejections() {
    let (endpoint, _) = spawn_gateway().await;
    let client = HttpAdminClient::new(vec![endpoint]).unwrap();

    let duplicate = client
        .add_member(&Url::parse("http://127.0.0.1:9300").unwrap())
        .await;
    assert_eq!(
        duplicate,
        Err(AdminError::Rejected {
            status: 400,
            message: "etcdserver: Peer URLs already exists".to_string(),
        })
    );

    let missing = client.remove_member("ffff").await;
    assert!(matches!(missing, Err(AdminError::Rejected { status: 404, .. })));

    let malformed = client.remove_member("not-hex").await;
    assert!(matches!(malformed, Err(AdminError::Decode(_))));
}

#[tokio::test]
async fn timed_out_add_is_not_resent_to_the_next_endpoint() {
    let (slow, slow_cluster) = spawn_gateway_with(Some(Duration::from_secs(2))).await;
    let (other, other_cluster) = spawn_gateway().await;
    let client =
        HttpAdminClient::with_timeout(vec![slow, other], Duration::from_millis(200)).unwrap();

    let result = client
        .add_member(&Url::parse("http://127.0.0.1:9302").unwrap())
        .await;

    assert!(matches!(result, Err(AdminError::Transport(_))));
    assert_eq!(slow_cluster.lock().members.len(), 2);
    assert_eq!(other_cluster.lock().members.len(), 1);
}

#[tokio::test]
async fn coordinator_joins_through_the_gateway() {
    let (endpoint, cluster) = spawn_gateway().await;
    let identity = NodeIdentity::new(
        "n1",
        "demo",
        Url::parse("http://127.0.0.1:9302").unwrap(),
        Url::parse("http://127.0.0.1:9303").unwrap(),
        "data",
    );
    let peer = DiscoveredPeer {
        peer_url: Url::parse("http://127.0.0.1:9300").unwrap(),
        client_url: endpoint,
    };

    let membership = ClusterJoinCoordinator::new(HttpAdminConnector, Duration::from_secs(2))
        .bootstrap(&identity, &[peer])
        .await
        .unwrap();

    assert_eq!(membership.cluster_state(), ClusterState::Existing);
    assert_eq!(
        membership.initial_cluster(&identity),
        "n1=http://127.0.0.1:9302,n0=http://127.0.0.1:9300"
    );
    assert_eq!(cluster.lock().members.len(), 2);
}
