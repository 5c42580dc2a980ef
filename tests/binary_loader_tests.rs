use axum::{Router, http::StatusCode, routing::get};
use castor::bootstrap::{BootstrapCallbacks, DatabaseManager, LoadingState};
use castor::config::Config;
use castor::engine::Capabilities;
use castor::error::CastorError;
use castor::loader::{
    HttpArtifactSource, ModuleExpectation, ProgressEvent, ProgressSink, load_binary,
};
use sha2::{Digest, Sha256};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use url::Url;

fn engine_module() -> Vec<u8> {
    let mut bytes = b"\0asm".to_vec();
    bytes.extend_from_slice(&1u32.to_le_bytes());
    bytes.resize(4096, 0);
    bytes
}

fn artifacts_router() -> Router {
    Router::new()
        .route("/artifacts/castor-engine.wasm", get(|| async { engine_module() }))
        .route(
            "/artifacts/castor-backend.bin",
            get(|| async { b"backend-bindings".to_vec() }),
        )
        .route("/artifacts/castor-fs.data", get(|| async { Vec::<u8>::new() }))
        .route(
            "/artifacts/broken.wasm",
            get(|| async { b"<html>not a module</html>".to_vec() }),
        )
}

async fn spawn_test_server(app: Router) -> Url {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    let base = Url::parse(&format!("http://{}/artifacts/", addr)).expect("valid base url");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server run");
    });

    base
}

fn http_source(base: Url) -> HttpArtifactSource {
    HttpArtifactSource::with_client(reqwest::Client::new(), base)
}

#[tokio::test]
async fn loads_and_pins_the_engine_over_http() {
    let base = spawn_test_server(artifacts_router()).await;
    let source = http_source(base);
    let digest = format!("{:x}", Sha256::digest(engine_module()));

    let events: Arc<Mutex<Vec<ProgressEvent>>> = Arc::default();
    let recorder = events.clone();
    let sink: ProgressSink = Arc::new(move |event: ProgressEvent| {
        recorder.lock().unwrap().push(event);
    });
    let module = load_binary(
        &source,
        "castor-engine.wasm",
        &ModuleExpectation {
            sha256: Some(digest.clone()),
        },
        Some(sink),
    )
    .await
    .expect("module compiles");

    assert_eq!(module.version(), 1);
    assert_eq!(module.size(), 4096);
    assert_eq!(module.digest(), digest);

    let events = events.lock().unwrap();
    let last = events.last().expect("progress reported");
    assert_eq!(last.progress, 100);
    assert!(last.cost_time.is_some());
}

#[tokio::test]
async fn digest_mismatch_is_a_compile_error() {
    let base = spawn_test_server(artifacts_router()).await;
    let err = load_binary(
        &http_source(base),
        "castor-engine.wasm",
        &ModuleExpectation {
            sha256: Some("00".repeat(32)),
        },
        None,
    )
    .await
    .expect_err("pin does not match");
    assert!(matches!(err, CastorError::Compile(_)));
}

#[tokio::test]
async fn non_module_payload_is_a_compile_error() {
    let base = spawn_test_server(artifacts_router()).await;
    let err = load_binary(
        &http_source(base),
        "broken.wasm",
        &ModuleExpectation::default(),
        None,
    )
    .await
    .expect_err("bad magic");
    assert!(matches!(err, CastorError::Compile(_)));
}

#[tokio::test]
async fn missing_artifact_is_a_transport_error() {
    let app = Router::new().route(
        "/artifacts/castor-engine.wasm",
        get(|| async { (StatusCode::NOT_FOUND, "gone") }),
    );
    let base = spawn_test_server(app).await;

    let err = load_binary(
        &http_source(base),
        "castor-engine.wasm",
        &ModuleExpectation::default(),
        None,
    )
    .await
    .expect_err("404");
    match err {
        CastorError::Transport { artifact, message } => {
            assert_eq!(artifact, "castor-engine.wasm");
            assert!(message.contains("404"), "{message}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn manager_bootstraps_from_http_artifacts() {
    let base = spawn_test_server(artifacts_router()).await;
    let manager = DatabaseManager::new(
        &Config::default(),
        Capabilities::ephemeral(),
        Arc::new(http_source(base)),
        castor_schema::bundled_migrations(),
    );

    let handle = manager
        .initialize(BootstrapCallbacks::default())
        .await
        .expect("initialize");
    assert_eq!(manager.state(), LoadingState::Ready);

    let rows = handle
        .query("SELECT COUNT(*) AS n FROM documents", Vec::new())
        .await
        .expect("documents table exists");
    assert_eq!(rows[0].get("n").and_then(|v| v.as_i64()), Some(0));
}
