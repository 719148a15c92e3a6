//! Clone timeouts against a git server that accepts connections and never
//! answers.
//!
//! Lives in its own test binary because libgit2 transport timeouts are
//! process-wide and must be set before any thread touches libgit2.

use std::io::Read;
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use unspaghetti::answer::MockAnswerer;
use unspaghetti::api;
use unspaghetti::config::Config;
use unspaghetti::git;
use unspaghetti::state::AppState;

#[derive(Default)]
struct Connections {
    accepted: AtomicUsize,
    open: AtomicUsize,
    max_open: AtomicUsize,
}

/// Accept connections, read whatever arrives, never reply.
fn silent_server(connections: Arc<Connections>) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    std::thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { continue };
            connections.accepted.fetch_add(1, Ordering::SeqCst);
            // Let a previous client finish closing before counting.
            std::thread::sleep(Duration::from_millis(200));
            let open = connections.open.fetch_add(1, Ordering::SeqCst) + 1;
            connections.max_open.fetch_max(open, Ordering::SeqCst);

            let connections = connections.clone();
            std::thread::spawn(move || {
                let mut buf = [0u8; 1024];
                while matches!(stream.read(&mut buf), Ok(n) if n > 0) {}
                connections.open.fetch_sub(1, Ordering::SeqCst);
            });
        }
    });

    port
}

async fn analyze(app: Router, url: String) -> (StatusCode, Value, Duration) {
    let started = Instant::now();
    let req = Request::builder()
        .method("POST")
        .uri(format!("/analyze-repo?repo_url={url}"))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap(), started.elapsed())
}

#[test]
fn test_stalled_clones_time_out_one_at_a_time() {
    unsafe { git::set_transport_timeouts(Duration::from_secs(1)).unwrap() };

    let connections = Arc::new(Connections::default());
    let port = silent_server(connections.clone());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap();

    runtime.block_on(async {
        let data = tempfile::tempdir().unwrap();
        let config = Config {
            data_dir: data.path().to_path_buf(),
            clone_timeout_secs: 1,
            max_concurrent_clones: 1,
            ..Config::default()
        };
        let state = AppState::with_answerer(config, Arc::new(MockAnswerer)).unwrap();
        let app = api::router(state.clone());

        let first_url = format!("http%3A%2F%2F127.0.0.1%3A{port}%2Fslow-a.git");
        let second_url = format!("http%3A%2F%2F127.0.0.1%3A{port}%2Fslow-b.git");
        let both = async {
            tokio::join!(
                analyze(app.clone(), first_url),
                analyze(app.clone(), second_url)
            )
        };
        let (first, second) = tokio::time::timeout(Duration::from_secs(30), both)
            .await
            .expect("stalled clones were never cancelled");

        for (status, body, _) in [&first, &second] {
            assert_eq!(*status, StatusCode::GATEWAY_TIMEOUT, "{body}");
            assert_eq!(body["kind"], "timeout");
        }

        // The second clone only starts once the first thread has exited.
        let slower = first.2.max(second.2);
        assert!(slower >= Duration::from_secs(2), "finished after {slower:?}");

        assert!(connections.accepted.load(Ordering::SeqCst) >= 2);
        assert_eq!(connections.max_open.load(Ordering::SeqCst), 1);

        assert!(state.workspaces.is_empty());
        assert_eq!(std::fs::read_dir(data.path()).unwrap().count(), 0);
    });

    // Returns promptly: no clone thread is left running.
    runtime.shutdown_timeout(Duration::from_secs(5));
}
