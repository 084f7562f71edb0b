//! Shared test harness for integration tests.
//!
//! Provides [`FakeCodec`], a scriptable stand-in for the RAW decoder, and
//! [`TestHarness`], which builds a full [`AppContext`] over a temporary media
//! directory for router-level testing with `oneshot`.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request};
use axum::Router;
use http_body_util::BodyExt;
use parking_lot::{Condvar, Mutex};
use tempfile::TempDir;
use tokio::sync::broadcast::{self, error::RecvError};

use rawdrop::config::Config;
use rawdrop::conversion::{
    BackpressurePolicy, ConversionEvent, ConversionService, ConversionTask, ServiceSettings,
};
use rawdrop::media::MediaStore;
use rawdrop::server::{create_router, AppContext};
use rawdrop_codec::{output_file_name, RawCodec};
use rawdrop_common::paths::create_exclusive;
use rawdrop_common::TaskId;

/// Upper bound on any wait for a pipeline event.
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(10);

pub const TEST_SECRET: &str = "test-session-secret";
pub const TEST_USER: &str = "photographer";
pub const TEST_PASSWORD: &str = "correct horse";

/// Blocks codec calls until opened.
#[derive(Clone, Default)]
pub struct Gate(Arc<(Mutex<bool>, Condvar)>);

impl Gate {
    pub fn closed() -> Self {
        Self(Arc::new((Mutex::new(true), Condvar::new())))
    }

    pub fn open(&self) {
        let (closed, cvar) = &*self.0;
        *closed.lock() = false;
        cvar.notify_all();
    }

    fn wait(&self) {
        let (closed, cvar) = &*self.0;
        let mut closed = closed.lock();
        while *closed {
            cvar.wait(&mut closed);
        }
    }
}

/// Codec driven by the source file name.
///
/// - `*fail*` returns an error
/// - `*panic*` panics
/// - `*slow*` sleeps for `slow_delay` first
/// - anything else writes an empty `<stem>.jpg` into the destination
///
/// Every call first waits on the gate.
pub struct FakeCodec {
    pub gate: Gate,
    pub slow_delay: Duration,
    calls: AtomicUsize,
}

impl FakeCodec {
    pub fn new() -> Self {
        Self::with_gate(Gate::default())
    }

    pub fn with_gate(gate: Gate) -> Self {
        Self {
            gate,
            slow_delay: Duration::from_millis(500),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RawCodec for FakeCodec {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn convert(&self, source: &Path, dest_dir: &Path, _quality: u8) -> rawdrop_codec::Result<PathBuf> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.gate.wait();

        let stem = source
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();

        if stem.contains("panic") {
            panic!("fake codec panic on {stem}");
        }
        if stem.contains("slow") {
            std::thread::sleep(self.slow_delay);
        }
        if stem.contains("fail") {
            return Err(rawdrop_codec::Error::InvalidInput(format!(
                "fake failure for {stem}"
            )));
        }

        let (path, _) = create_exclusive(dest_dir, &output_file_name(source))?;
        Ok(path)
    }
}

pub fn settings(workers: usize, capacity: usize, policy: BackpressurePolicy) -> ServiceSettings {
    ServiceSettings {
        max_workers: workers,
        queue_capacity: capacity,
        backpressure: policy,
        submit_timeout: Duration::from_millis(100),
        task_timeout: Duration::from_secs(30),
        drain_timeout: Duration::from_secs(5),
        jpeg_quality: 100,
    }
}

/// A started conversion service over a temporary directory.
///
/// Opens the codec gate on drop so a failing test never leaves a blocking
/// thread parked.
pub struct Pipeline {
    pub service: Arc<ConversionService>,
    pub codec: Arc<FakeCodec>,
    pub dir: TempDir,
}

impl Pipeline {
    pub fn start(settings: ServiceSettings) -> Self {
        Self::start_with(settings, FakeCodec::new())
    }

    pub fn start_with(settings: ServiceSettings, codec: FakeCodec) -> Self {
        let codec = Arc::new(codec);
        let service = ConversionService::start(settings, codec.clone() as Arc<dyn RawCodec>)
            .expect("failed to start conversion service");
        Self {
            service: Arc::new(service),
            codec,
            dir: tempfile::tempdir().expect("failed to create temp dir"),
        }
    }

    /// Task for `name` inside the temporary directory.
    pub fn task(&self, name: &str) -> ConversionTask {
        let source = self.dir.path().join(name);
        std::fs::write(&source, b"raw").expect("failed to write source");
        ConversionTask::new(source, self.dir.path(), 100).expect("invalid task")
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.codec.gate.open();
    }
}

/// Wait for the next completed or failed event.
pub async fn next_terminal(rx: &mut broadcast::Receiver<ConversionEvent>) -> ConversionEvent {
    tokio::time::timeout(EVENT_TIMEOUT, async {
        loop {
            match rx.recv().await {
                Ok(event) if event.is_terminal() => return event,
                Ok(_) | Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => panic!("event channel closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for a conversion to finish")
}

/// Collect `n` terminal events.
pub async fn collect_terminal(
    rx: &mut broadcast::Receiver<ConversionEvent>,
    n: usize,
) -> Vec<ConversionEvent> {
    let mut events = Vec::with_capacity(n);
    for _ in 0..n {
        events.push(next_terminal(rx).await);
    }
    events
}

/// Wait until a worker has picked up `task`.
pub async fn wait_started(rx: &mut broadcast::Receiver<ConversionEvent>, task: TaskId) {
    tokio::time::timeout(EVENT_TIMEOUT, async {
        loop {
            match rx.recv().await {
                Ok(ConversionEvent::Started { task: t, .. }) if t == task => return,
                Ok(_) | Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => panic!("event channel closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for a worker to start the task")
}

/// Full application context over a temporary media directory.
pub struct TestHarness {
    pub ctx: AppContext,
    pub codec: Arc<FakeCodec>,
    pub media_dir: TempDir,
}

impl TestHarness {
    /// Auth disabled, default pipeline settings.
    pub async fn new() -> Self {
        let mut config = Config::default();
        config.auth.enabled = false;
        Self::with_config(config, settings(2, 16, BackpressurePolicy::Reject), FakeCodec::new())
            .await
    }

    /// Auth enabled with [`TEST_USER`] / [`TEST_PASSWORD`].
    pub async fn with_auth() -> Self {
        Self::with_config(
            auth_config(),
            settings(2, 16, BackpressurePolicy::Reject),
            FakeCodec::new(),
        )
        .await
    }

    pub async fn with_config(config: Config, settings: ServiceSettings, codec: FakeCodec) -> Self {
        let media_dir = tempfile::tempdir().expect("failed to create media dir");
        let media = MediaStore::open(media_dir.path())
            .await
            .expect("failed to open media dir");

        let codec = Arc::new(codec);
        let conversion = ConversionService::start(settings, codec.clone() as Arc<dyn RawCodec>)
            .expect("failed to start conversion service");

        let ctx = AppContext {
            config: Arc::new(config),
            conversion: Arc::new(conversion),
            media,
        };

        Self {
            ctx,
            codec,
            media_dir,
        }
    }

    pub fn router(&self) -> Router {
        create_router(self.ctx.clone())
    }

    pub fn media_path(&self, name: &str) -> PathBuf {
        self.ctx.media.root().join(name)
    }
}

impl Drop for TestHarness {
    fn drop(&mut self) {
        self.codec.gate.open();
    }
}

/// Config with auth enabled and a single known user.
pub fn auth_config() -> Config {
    let mut config = Config::default();
    config.auth.enabled = true;
    config.auth.username = Some(TEST_USER.to_string());
    config.auth.password_hash =
        Some(bcrypt::hash(TEST_PASSWORD, 4).expect("failed to hash password"));
    config.auth.session_secret = Some(TEST_SECRET.to_string());
    config
}

/// Build a `multipart/form-data` POST to `/upload`.
pub fn upload_request(field: &str, filename: &str, content: &[u8], cookie: Option<&str>) -> Request<Body> {
    let boundary = "rawdrop-test-boundary";
    let mut body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        );
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body)).unwrap()
}

/// Build a GET request, optionally carrying a cookie.
pub fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn body_to_string(body: Body) -> String {
    let bytes = body.collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_to_json(body: Body) -> serde_json::Value {
    serde_json::from_str(&body_to_string(body).await).unwrap()
}
