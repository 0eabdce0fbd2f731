use std::{
    collections::HashMap,
    path::Path,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::State,
    http::{StatusCode, Uri},
    Router,
};
use capture::{CameraDevice, CaptureError, FrameSource};
use image::{DynamicImage, Rgb, RgbImage};
use storage::{KeyValueStore, Storage};
use tokio::{net::TcpListener, sync::Mutex};

use crate::{backend::HttpBackend, RecognitionBackend};

#[derive(Default)]
struct FakeServerInner {
    responses: HashMap<String, (StatusCode, String)>,
    requests: Vec<(String, serde_json::Value)>,
    delay: Option<Duration>,
}

#[derive(Clone, Default)]
struct FakeServerState {
    inner: Arc<Mutex<FakeServerInner>>,
}

/// Local stand-in for the recognition backend with canned responses per path.
pub(crate) struct FakeServer {
    pub(crate) url: String,
    state: FakeServerState,
}

async fn handle_any(State(state): State<FakeServerState>, uri: Uri, body: Bytes) -> (StatusCode, String) {
    let path = uri.path().trim_start_matches('/').to_string();
    let payload = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    let (response, delay) = {
        let mut inner = state.inner.lock().await;
        inner.requests.push((path.clone(), payload));
        (inner.responses.get(&path).cloned(), inner.delay)
    };
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    response.unwrap_or((StatusCode::NOT_FOUND, "no such route".to_string()))
}

impl FakeServer {
    pub(crate) async fn spawn() -> Self {
        std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let state = FakeServerState::default();
        let app = Router::new().fallback(handle_any).with_state(state.clone());
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Self {
            url: format!("http://{addr}"),
            state,
        }
    }

    pub(crate) async fn respond(&self, path: &str, status: u16, body: &str) {
        self.state.inner.lock().await.responses.insert(
            path.to_string(),
            (
                StatusCode::from_u16(status).expect("status"),
                body.to_string(),
            ),
        );
    }

    pub(crate) async fn set_delay(&self, delay: Duration) {
        self.state.inner.lock().await.delay = Some(delay);
    }

    pub(crate) async fn requests(&self, path: &str) -> Vec<serde_json::Value> {
        self.state
            .inner
            .lock()
            .await
            .requests
            .iter()
            .filter(|(seen, _)| seen == path)
            .map(|(_, body)| body.clone())
            .collect()
    }

    pub(crate) async fn hits(&self, path: &str) -> usize {
        self.requests(path).await.len()
    }

    pub(crate) fn backend(&self) -> Arc<dyn RecognitionBackend> {
        Arc::new(HttpBackend::new(&self.url, Duration::from_secs(5)).expect("backend"))
    }
}

/// Backend URL on a port nothing listens on.
pub(crate) async fn unreachable_backend() -> Arc<dyn RecognitionBackend> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    Arc::new(HttpBackend::new(&format!("http://{addr}"), Duration::from_secs(2)).expect("backend"))
}

pub(crate) async fn memory_store() -> Arc<Storage> {
    Arc::new(Storage::in_memory().await.expect("db"))
}

pub(crate) struct FailingStore;

#[async_trait]
impl KeyValueStore for FailingStore {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        Ok(None)
    }

    async fn put(&self, _key: &str, _value: &str) -> Result<()> {
        Err(anyhow!("disk full"))
    }
}

/// Camera producing a solid frame and counting open/release calls.
#[derive(Clone, Default)]
pub(crate) struct TestCamera {
    pub(crate) opens: Arc<AtomicUsize>,
    pub(crate) releases: Arc<AtomicUsize>,
    pub(crate) unavailable: bool,
}

struct TestFrames {
    releases: Arc<AtomicUsize>,
}

impl TestCamera {
    pub(crate) fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub(crate) fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub(crate) fn release_count(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

impl CameraDevice for TestCamera {
    fn open(&self) -> Result<Box<dyn FrameSource>, CaptureError> {
        if self.unavailable {
            return Err(CaptureError::Unavailable("permission denied".to_string()));
        }
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(TestFrames {
            releases: self.releases.clone(),
        }))
    }
}

impl FrameSource for TestFrames {
    fn current_frame(&mut self) -> Result<DynamicImage, CaptureError> {
        Ok(DynamicImage::ImageRgb8(RgbImage::from_pixel(
            32,
            24,
            Rgb([90, 140, 200]),
        )))
    }

    fn release(&mut self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

pub(crate) fn write_png(path: &Path, width: u32, height: u32) {
    RgbImage::from_pixel(width, height, Rgb([30, 60, 90]))
        .save(path)
        .expect("write png");
}

pub(crate) const RECOGNIZED_BUDI: &str = r#"{"status":"success","data":{"name":"Budi","nim":"21001","confidence":"98.2","distance":"0.21"}}"#;
pub(crate) const REJECTED_UNKNOWN: &str = r#"{"status":"failed","message":"Wajah tidak dikenali"}"#;
