//! In-process orchestrator used by the channel tests

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

#[derive(Default)]
struct Inner {
    unhealthy: AtomicBool,
    calls: Mutex<Vec<(String, Value)>>,
    replies: Mutex<VecDeque<(String, Value)>>,
    stalled: Mutex<HashSet<String>>,
    resume: Notify,
}

impl Inner {
    fn is_stalled(&self, method: &str) -> bool {
        self.stalled.lock().unwrap().contains(method)
    }
}

/// Records every call and answers pings, acks, and scripted replies
pub struct TestServer {
    addr: std::net::SocketAddr,
    inner: Arc<Inner>,
}

impl TestServer {
    pub async fn start() -> Self {
        let inner = Arc::new(Inner::default());
        let app = Router::new()
            .route("/rpc/{method}", post(handle))
            .with_state(Arc::clone(&inner));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, inner }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.inner.unhealthy.store(!healthy, Ordering::SeqCst);
    }

    /// Queue a reply for the next call to `method`
    pub fn reply(&self, method: &str, body: Value) {
        self.inner
            .replies
            .lock()
            .unwrap()
            .push_back((method.to_string(), body));
    }

    /// Hold replies to `method` until [`TestServer::release`]
    pub fn stall(&self, method: &str) {
        self.inner.stalled.lock().unwrap().insert(method.to_string());
    }

    pub fn release(&self, method: &str) {
        self.inner.stalled.lock().unwrap().remove(method);
        self.inner.resume.notify_waiters();
    }

    /// Every non-ping call received so far
    pub fn calls(&self) -> Vec<(String, Value)> {
        self.inner.calls.lock().unwrap().clone()
    }
}

async fn handle(
    State(inner): State<Arc<Inner>>,
    Path(method): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    if inner.unhealthy.load(Ordering::SeqCst) {
        return (StatusCode::SERVICE_UNAVAILABLE, "down").into_response();
    }

    if method == "Ping.SendV1" {
        return Json(json!({"send": "pong"})).into_response();
    }

    inner.calls.lock().unwrap().push((method.clone(), body));

    loop {
        let resumed = inner.resume.notified();
        if !inner.is_stalled(&method) {
            break;
        }
        resumed.await;
    }

    let scripted = {
        let mut replies = inner.replies.lock().unwrap();
        let position = replies.iter().position(|(m, _)| *m == method);
        position.and_then(|idx| replies.remove(idx))
    };

    match scripted {
        Some((_, reply)) => Json(reply).into_response(),
        None => Json(json!({"done": true})).into_response(),
    }
}
