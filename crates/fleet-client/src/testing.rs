//! Test utilities for fleet-client
//!
//! Provides an in-process mock of the fleet backend, a server harness that
//! binds it to a local port, and a command runner that records external tool
//! invocations instead of spawning processes.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path as FsPath;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{Form, Multipart, Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use crate::process::{CommandRunner, ExitStatus};
use crate::types::{Device, DeviceClass, Firmware, NewDevice, NewDeviceClass};
use crate::{ApiClient, Result};

/// Access token the mock backend accepts at `/tokenlogin`
pub const TEST_ACCESS_TOKEN: &str = "test-automation-token";

/// A test server that automatically shuts down when dropped
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: ApiClient,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    /// Serve `router` on a free local port, with a client logging in as
    /// [`TEST_ACCESS_TOKEN`]
    ///
    /// # Example
    ///
    /// ```ignore
    /// use fleet_client::testing::{MockBackend, TestServer};
    ///
    /// let backend = MockBackend::new();
    /// let server = TestServer::start(backend.router()).await?;
    /// let classes = Catalog::new(&server.client).list_classes().await?;
    /// ```
    pub async fn start(router: Router) -> Result<Self> {
        Self::start_with_token(router, TEST_ACCESS_TOKEN).await
    }

    /// Serve `router`, with a client logging in as `access_token`
    pub async fn start_with_token(router: Router, access_token: &str) -> Result<Self> {
        // Bind to any available port
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

        let handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        let base_url = format!("http://{}", addr);
        let client = ApiClient::with_config(
            &base_url,
            access_token,
            Duration::from_secs(5),
            Duration::from_secs(2),
        )?;

        Ok(Self {
            addr,
            client,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// Get the base URL of the test server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Shutdown the server gracefully
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

// =============================================================================
// Mock backend
// =============================================================================

/// A request seen by the mock backend
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: &'static str,
    pub path: String,
    pub body: Value,
}

#[derive(Default)]
struct MockState {
    logins: u32,
    bearer: Option<String>,
    token_lifetime: Option<u64>,
    reject_next: u32,
    classes: Vec<DeviceClass>,
    firmware: Vec<Firmware>,
    artifacts: HashMap<(String, String), Vec<u8>>,
    next_device: Option<Device>,
    next_serial: u64,
    requests: Vec<RecordedRequest>,
}

/// In-memory fleet backend speaking the same routes as the real one
#[derive(Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a class to the catalog
    pub fn with_class(self, class: DeviceClass) -> Self {
        self.state.lock().classes.push(class);
        self
    }

    /// Add a firmware build to the catalog
    pub fn with_firmware(self, firmware: Firmware) -> Self {
        self.state.lock().firmware.push(firmware);
        self
    }

    /// Store a binary for `firmware_id` under `name`
    pub fn with_artifact(self, firmware_id: &str, name: &str, data: impl Into<Vec<u8>>) -> Self {
        self.state
            .lock()
            .artifacts
            .insert((firmware_id.to_string(), name.to_string()), data.into());
        self
    }

    /// Return exactly this record from the next `POST /device/create`
    pub fn with_next_device(self, device: Device) -> Self {
        self.state.lock().next_device = Some(device);
        self
    }

    /// Issue bearer tokens with this `expiresIn`
    pub fn with_token_lifetime(self, seconds: u64) -> Self {
        self.state.lock().token_lifetime = Some(seconds);
        self
    }

    /// Answer the next `count` authorized requests with 401
    pub fn reject_next(&self, count: u32) {
        self.state.lock().reject_next = count;
    }

    /// Number of successful token logins
    pub fn logins(&self) -> u32 {
        self.state.lock().logins
    }

    /// Every request received so far, in order
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().requests.clone()
    }

    /// Requests matching `method` and a path starting with `prefix`
    pub fn requests_to(&self, method: &str, prefix: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.path.starts_with(prefix))
            .collect()
    }

    /// Current state of a class
    pub fn class(&self, class_id: &str) -> Option<DeviceClass> {
        self.state
            .lock()
            .classes
            .iter()
            .find(|c| c.class_id == class_id)
            .cloned()
    }

    /// Stored binary for `firmware_id`/`name`
    pub fn artifact(&self, firmware_id: &str, name: &str) -> Option<Vec<u8>> {
        self.state
            .lock()
            .artifacts
            .get(&(firmware_id.to_string(), name.to_string()))
            .cloned()
    }

    /// Build the axum router serving this backend
    pub fn router(&self) -> Router {
        Router::new()
            .route("/tokenlogin", post(token_login))
            .route("/device/class", get(list_classes).post(create_class))
            .route("/device/class/find/{name}", get(find_class))
            .route("/device/class/{class_id}", get(get_class).post(update_class))
            .route("/device/firmware", get(list_firmware).post(create_firmware))
            .route("/device/firmware/find", get(find_firmware))
            .route(
                "/device/firmware/{firmware_id}/{binary}",
                get(download_artifact).post(upload_artifact),
            )
            .route("/device/create", post(create_device))
            .with_state(self.clone())
    }

    fn record(&self, method: &'static str, path: impl Into<String>, body: Value) {
        self.state.lock().requests.push(RecordedRequest {
            method,
            path: path.into(),
            body,
        });
    }

    fn authorize(&self, headers: &HeaderMap) -> std::result::Result<(), Response> {
        let mut state = self.state.lock();
        if state.reject_next > 0 {
            state.reject_next -= 1;
            return Err(StatusCode::UNAUTHORIZED.into_response());
        }
        let presented = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        match (presented, state.bearer.as_deref()) {
            (Some(presented), Some(valid)) if presented == valid => Ok(()),
            _ => Err(StatusCode::UNAUTHORIZED.into_response()),
        }
    }
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({"status": "not found"}))).into_response()
}

async fn token_login(State(backend): State<MockBackend>, Json(body): Json<Value>) -> Response {
    backend.record("POST", "/tokenlogin", json!({"token": "<redacted>"}));
    let mut state = backend.state.lock();
    if body["token"] != TEST_ACCESS_TOKEN {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    state.logins += 1;
    let bearer = format!("bearer-{}", state.logins);
    state.bearer = Some(bearer.clone());
    Json(json!({
        "userToken": {
            "token": bearer,
            "expiresIn": state.token_lifetime.unwrap_or(300),
            "secret": "s"
        }
    }))
    .into_response()
}

async fn list_classes(State(backend): State<MockBackend>, headers: HeaderMap) -> Response {
    backend.record("GET", "/device/class", Value::Null);
    if let Err(rejection) = backend.authorize(&headers) {
        return rejection;
    }
    Json(backend.state.lock().classes.clone()).into_response()
}

async fn create_class(
    State(backend): State<MockBackend>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    backend.record("POST", "/device/class", body.clone());
    if let Err(rejection) = backend.authorize(&headers) {
        return rejection;
    }
    let new: NewDeviceClass = match serde_json::from_value(body) {
        Ok(new) => new,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };
    let mut state = backend.state.lock();
    let class_id = format!("class-{}", state.classes.len() + 1);
    state.classes.push(DeviceClass {
        class_id,
        name: new.name,
        description: Some(new.description),
        firmware_id: Some(new.firmware_id),
        beta_firmware_id: None,
        concurrent: new.concurrent,
        maxfails: new.maxfails,
    });
    Json(json!({"status": "ok"})).into_response()
}

async fn find_class(
    State(backend): State<MockBackend>,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> Response {
    backend.record("GET", format!("/device/class/find/{}", name), Value::Null);
    if let Err(rejection) = backend.authorize(&headers) {
        return rejection;
    }
    let state = backend.state.lock();
    match state.classes.iter().find(|c| c.name == name) {
        Some(class) => Json(class.clone()).into_response(),
        None => not_found(),
    }
}

async fn get_class(
    State(backend): State<MockBackend>,
    headers: HeaderMap,
    Path(class_id): Path<String>,
) -> Response {
    backend.record("GET", format!("/device/class/{}", class_id), Value::Null);
    if let Err(rejection) = backend.authorize(&headers) {
        return rejection;
    }
    // The real backend answers 200 with a null body for unknown ids
    let class = backend.class(&class_id);
    Json(class).into_response()
}

async fn update_class(
    State(backend): State<MockBackend>,
    headers: HeaderMap,
    Path(class_id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    backend.record("POST", format!("/device/class/{}", class_id), body.clone());
    if let Err(rejection) = backend.authorize(&headers) {
        return rejection;
    }
    let mut state = backend.state.lock();
    let Some(class) = state.classes.iter_mut().find(|c| c.class_id == class_id) else {
        return not_found();
    };
    // Only fields present in the body are written
    let mut merged = serde_json::to_value(&*class).unwrap_or(Value::Null);
    if let (Some(target), Some(fields)) = (merged.as_object_mut(), body.as_object()) {
        for (key, value) in fields {
            target.insert(key.clone(), value.clone());
        }
    }
    match serde_json::from_value(merged) {
        Ok(updated) => {
            *class = updated;
            Json(json!({"status": "ok"})).into_response()
        }
        Err(e) => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    }
}

#[derive(Deserialize)]
struct FirmwareForm {
    name: String,
    version: String,
}

async fn list_firmware(State(backend): State<MockBackend>, headers: HeaderMap) -> Response {
    backend.record("GET", "/device/firmware", Value::Null);
    if let Err(rejection) = backend.authorize(&headers) {
        return rejection;
    }
    Json(backend.state.lock().firmware.clone()).into_response()
}

async fn create_firmware(
    State(backend): State<MockBackend>,
    headers: HeaderMap,
    Form(form): Form<FirmwareForm>,
) -> Response {
    backend.record(
        "POST",
        "/device/firmware",
        json!({"name": form.name, "version": form.version}),
    );
    if let Err(rejection) = backend.authorize(&headers) {
        return rejection;
    }
    let mut state = backend.state.lock();
    let firmware = Firmware {
        firmware_id: format!("fw-{}", state.firmware.len() + 1),
        name: Some(form.name),
        version: form.version,
    };
    state.firmware.push(firmware.clone());
    Json(firmware).into_response()
}

async fn find_firmware(
    State(backend): State<MockBackend>,
    headers: HeaderMap,
    Query(query): Query<FirmwareForm>,
) -> Response {
    backend.record(
        "GET",
        "/device/firmware/find",
        json!({"name": query.name, "version": query.version}),
    );
    if let Err(rejection) = backend.authorize(&headers) {
        return rejection;
    }
    let state = backend.state.lock();
    match state
        .firmware
        .iter()
        .find(|f| f.name.as_deref() == Some(query.name.as_str()) && f.version == query.version)
    {
        Some(firmware) => Json(firmware.clone()).into_response(),
        None => not_found(),
    }
}

async fn download_artifact(
    State(backend): State<MockBackend>,
    headers: HeaderMap,
    Path((firmware_id, binary)): Path<(String, String)>,
) -> Response {
    backend.record(
        "GET",
        format!("/device/firmware/{}/{}", firmware_id, binary),
        Value::Null,
    );
    if let Err(rejection) = backend.authorize(&headers) {
        return rejection;
    }
    match backend.artifact(&firmware_id, &binary) {
        Some(data) => (
            [(header::CONTENT_TYPE, "application/octet-stream")],
            data,
        )
            .into_response(),
        None => not_found(),
    }
}

async fn upload_artifact(
    State(backend): State<MockBackend>,
    headers: HeaderMap,
    Path((firmware_id, binary)): Path<(String, String)>,
    mut multipart: Multipart,
) -> Response {
    let mut stored = None;
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() == Some("binary") {
            if let Ok(data) = field.bytes().await {
                stored = Some(data.to_vec());
            }
        }
    }
    backend.record(
        "POST",
        format!("/device/firmware/{}/{}", firmware_id, binary),
        json!({"binary_len": stored.as_ref().map(Vec::len)}),
    );
    if let Err(rejection) = backend.authorize(&headers) {
        return rejection;
    }
    let Some(data) = stored else {
        return (StatusCode::BAD_REQUEST, "missing binary part").into_response();
    };
    backend
        .state
        .lock()
        .artifacts
        .insert((firmware_id.clone(), binary.clone()), data);
    Json(json!({"firmware_id": firmware_id, "name": binary})).into_response()
}

async fn create_device(
    State(backend): State<MockBackend>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    backend.record("POST", "/device/create", body.clone());
    if let Err(rejection) = backend.authorize(&headers) {
        return rejection;
    }
    let new: NewDevice = match serde_json::from_value(body) {
        Ok(new) => new,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };
    let mut state = backend.state.lock();
    let device = match state.next_device.take() {
        Some(device) => device,
        None => {
            state.next_serial += 1;
            Device {
                device_id: format!("device-{}", state.next_serial),
                serialnumber: state.next_serial,
                username: format!("user-{}", state.next_serial),
                password: format!("pass-{}", state.next_serial),
                device_type: Some(new.device_type.clone()),
                class_id: Some(new.class_id.clone()),
            }
        }
    };
    (StatusCode::CREATED, Json(device)).into_response()
}

// =============================================================================
// Recording command runner
// =============================================================================

/// One recorded external tool invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    /// Contents of `.csv` arguments at the time of the call
    pub csv_inputs: Vec<String>,
}

/// A [`CommandRunner`] that records calls and replays scripted exit codes
#[derive(Debug, Default)]
pub struct RecordingRunner {
    invocations: Mutex<Vec<Invocation>>,
    exit_codes: Mutex<HashMap<usize, i32>>,
}

impl RecordingRunner {
    /// A runner where every invocation succeeds
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the `index`-th invocation (zero-based) exit with `code`
    pub fn fail_on(self, index: usize, code: i32) -> Self {
        self.exit_codes.lock().insert(index, code);
        self
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().clone()
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, program: &str, args: &[String]) -> std::io::Result<ExitStatus> {
        let csv_inputs = args
            .iter()
            .filter(|a| a.ends_with(".csv"))
            .filter_map(|a| std::fs::read_to_string(FsPath::new(a)).ok())
            .collect();

        let mut invocations = self.invocations.lock();
        let index = invocations.len();
        invocations.push(Invocation {
            program: program.to_string(),
            args: args.to_vec(),
            csv_inputs,
        });

        let code = self.exit_codes.lock().get(&index).copied().unwrap_or(0);
        Ok(ExitStatus::from_code(code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_format() {
        let addr: SocketAddr = "127.0.0.1:8080".parse().unwrap();
        let url = format!("http://{}", addr);
        assert_eq!(url, "http://127.0.0.1:8080");
    }

    #[tokio::test]
    async fn test_recording_runner_scripts_exit_codes() {
        let runner = RecordingRunner::new().fail_on(1, 2);
        let first = runner.run("a", &[]).await.unwrap();
        let second = runner.run("b", &["x".to_string()]).await.unwrap();
        assert!(first.success());
        assert_eq!(second.code, Some(2));
        assert_eq!(runner.invocations()[1].args, ["x"]);
    }
}
