//! Test utilities for bmcfw-client
//!
//! Provides an in-process mock Redfish controller and a server wrapper for
//! integration tests.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Multipart, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use crate::client::{RedfishClient, SessionToken};
use crate::config::DeviceConfig;
use crate::error::Result;

/// Token issued by the mock controller
pub const MOCK_TOKEN: &str = "mock-session-token";
/// Credentials accepted by the mock controller
pub const MOCK_USER: &str = "admin";
pub const MOCK_PASSWORD: &str = "password";

const INVENTORY_PATH: &str = "/redfish/v1/UpdateService/FirmwareInventory";
const PUSH_PATH: &str = "/redfish/v1/UpdateService/update";
const TASK_PATH: &str = "/redfish/v1/TaskService/Tasks/1";
const SESSION_PATH: &str = "/redfish/v1/SessionService/Sessions/1";

/// How the mock controller announces a task after a push
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStyle {
    /// No task reference at all
    None,
    /// `Location` header on a 202
    Location,
    /// Task document in the body
    Body,
}

/// One multipart push received by the mock controller
#[derive(Debug, Clone, Default)]
pub struct RecordedPush {
    /// Part names, in the order received
    pub parts: Vec<String>,
    pub session_key: Option<String>,
    pub parameters: Option<Value>,
    pub file_name: Option<String>,
    pub file: Vec<u8>,
    pub signature: Option<Vec<u8>>,
    pub auth_token: Option<String>,
    pub accept: Option<String>,
    pub content_type: Option<String>,
}

impl RecordedPush {
    /// Part names, sorted
    pub fn part_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.parts.iter().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[derive(Debug, Clone)]
struct MockFirmware {
    id: String,
    name: String,
    version: String,
    description: String,
    broken: bool,
    anonymous: bool,
}

impl MockFirmware {
    fn odata_id(&self) -> String {
        format!("{}/{}", INVENTORY_PATH, self.id)
    }
}

#[derive(Debug)]
struct MockState {
    firmware: Mutex<Vec<MockFirmware>>,
    pushes: Mutex<Vec<RecordedPush>>,
    requests: AtomicUsize,
    inventory_fails: Mutex<bool>,
    advertise_push_uri: Mutex<bool>,
    bare_update_service: Mutex<bool>,
    open_sessions: AtomicUsize,
    push_status: Mutex<StatusCode>,
    task_style: Mutex<TaskStyle>,
    install_on_push: Mutex<Option<(String, String)>>,
}

/// In-process Redfish controller with a firmware inventory and a push URI
///
/// Cloning shares state, so a test can keep a handle for assertions after
/// moving a clone into the server.
#[derive(Debug, Clone)]
pub struct MockDevice {
    state: Arc<MockState>,
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDevice {
    pub fn new() -> Self {
        Self {
            state: Arc::new(MockState {
                firmware: Mutex::new(Vec::new()),
                pushes: Mutex::new(Vec::new()),
                requests: AtomicUsize::new(0),
                inventory_fails: Mutex::new(false),
                advertise_push_uri: Mutex::new(true),
                bare_update_service: Mutex::new(false),
                open_sessions: AtomicUsize::new(0),
                push_status: Mutex::new(StatusCode::ACCEPTED),
                task_style: Mutex::new(TaskStyle::Location),
                install_on_push: Mutex::new(None),
            }),
        }
    }

    /// Add a firmware record; its id is the name
    pub fn with_firmware(self, name: &str, version: &str) -> Self {
        self.with_firmware_id(name, name, version)
    }

    /// Add a firmware record with an explicit member id
    pub fn with_firmware_id(self, id: &str, name: &str, version: &str) -> Self {
        self.state.firmware.lock().push(MockFirmware {
            id: id.to_string(),
            name: name.to_string(),
            version: version.to_string(),
            description: format!("{} firmware", name),
            broken: false,
            anonymous: false,
        });
        self
    }

    /// Add a firmware record whose detail document has no `@odata.id`
    pub fn with_anonymous_firmware(self, name: &str, version: &str) -> Self {
        self.state.firmware.lock().push(MockFirmware {
            id: name.to_string(),
            name: name.to_string(),
            version: version.to_string(),
            description: format!("{} firmware", name),
            broken: false,
            anonymous: true,
        });
        self
    }

    /// Add a member whose detail document fails with HTTP 500
    pub fn with_broken_member(self, id: &str, name: &str) -> Self {
        self.state.firmware.lock().push(MockFirmware {
            id: id.to_string(),
            name: name.to_string(),
            version: String::new(),
            description: String::new(),
            broken: true,
            anonymous: false,
        });
        self
    }

    /// Make the inventory collection fail with HTTP 500
    pub fn with_failing_inventory(self) -> Self {
        *self.state.inventory_fails.lock() = true;
        self
    }

    /// Omit `HttpPushUri` from the update service
    pub fn without_push_uri(self) -> Self {
        *self.state.advertise_push_uri.lock() = false;
        self
    }

    /// Serve an update service document with neither `@odata.id` nor a
    /// `FirmwareInventory` link
    pub fn with_bare_update_service(self) -> Self {
        *self.state.bare_update_service.lock() = true;
        self
    }

    /// Status returned for pushes
    pub fn with_push_status(self, status: StatusCode) -> Self {
        *self.state.push_status.lock() = status;
        self
    }

    /// How successful pushes announce a task
    pub fn with_task_style(self, style: TaskStyle) -> Self {
        *self.state.task_style.lock() = style;
        self
    }

    /// After a successful push, report `name` at `version`
    ///
    /// An existing record is updated in place; otherwise a new one is added.
    pub fn install_on_push(self, name: &str, version: &str) -> Self {
        *self.state.install_on_push.lock() = Some((name.to_string(), version.to_string()));
        self
    }

    /// Pushes received so far
    pub fn pushes(&self) -> Vec<RecordedPush> {
        self.state.pushes.lock().clone()
    }

    /// Number of pushes received
    pub fn push_count(&self) -> usize {
        self.state.pushes.lock().len()
    }

    /// Sessions created and not yet deleted
    pub fn open_sessions(&self) -> usize {
        self.state.open_sessions.load(Ordering::SeqCst)
    }

    /// Number of HTTP requests of any kind received
    pub fn request_count(&self) -> usize {
        self.state.requests.load(Ordering::SeqCst)
    }

    /// Current version of the first record named `name`
    pub fn version_of(&self, name: &str) -> Option<String> {
        self.state
            .firmware
            .lock()
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.version.clone())
    }

    /// Build the axum router serving this device
    pub fn router(&self) -> Router {
        Router::new()
            .route("/redfish/v1", get(service_root))
            .route("/redfish/v1/SessionService/Sessions", post(create_session))
            .route(
                "/redfish/v1/SessionService/Sessions/{id}",
                delete(delete_session),
            )
            .route("/redfish/v1/UpdateService", get(update_service))
            .route(INVENTORY_PATH, get(inventory))
            .route("/redfish/v1/UpdateService/FirmwareInventory/{id}", get(member))
            .route(PUSH_PATH, post(push))
            .with_state(self.clone())
    }

    fn count(&self) {
        self.state.requests.fetch_add(1, Ordering::SeqCst);
    }

    fn install_pushed(&self) {
        let Some((name, version)) = self.state.install_on_push.lock().clone() else {
            return;
        };
        let mut firmware = self.state.firmware.lock();
        match firmware.iter_mut().find(|f| f.name == name && !f.broken) {
            Some(existing) => existing.version = version,
            None => firmware.push(MockFirmware {
                id: format!("{}-installed", name),
                description: format!("{} firmware", name),
                name,
                version,
                broken: false,
                anonymous: false,
            }),
        }
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("X-Auth-Token")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|t| t == MOCK_TOKEN)
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"error": {"message": "missing or invalid X-Auth-Token"}})),
    )
        .into_response()
}

async fn service_root(State(device): State<MockDevice>, headers: HeaderMap) -> Response {
    device.count();
    if !authorized(&headers) {
        return unauthorized();
    }
    Json(json!({
        "@odata.id": "/redfish/v1",
        "UpdateService": {"@odata.id": "/redfish/v1/UpdateService"},
        "SessionService": {"@odata.id": "/redfish/v1/SessionService"}
    }))
    .into_response()
}

async fn create_session(State(device): State<MockDevice>, Json(body): Json<Value>) -> Response {
    device.count();
    if body["UserName"] == MOCK_USER && body["Password"] == MOCK_PASSWORD {
        device.state.open_sessions.fetch_add(1, Ordering::SeqCst);
        (
            StatusCode::CREATED,
            [("X-Auth-Token", MOCK_TOKEN), ("Location", SESSION_PATH)],
            Json(json!({"@odata.id": SESSION_PATH})),
        )
            .into_response()
    } else {
        StatusCode::UNAUTHORIZED.into_response()
    }
}

async fn delete_session(
    State(device): State<MockDevice>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    device.count();
    if !authorized(&headers) {
        return unauthorized();
    }
    if id != "1" || device.open_sessions() == 0 {
        return StatusCode::NOT_FOUND.into_response();
    }
    device.state.open_sessions.fetch_sub(1, Ordering::SeqCst);
    StatusCode::NO_CONTENT.into_response()
}

async fn update_service(State(device): State<MockDevice>, headers: HeaderMap) -> Response {
    device.count();
    if !authorized(&headers) {
        return unauthorized();
    }
    let mut doc = if *device.state.bare_update_service.lock() {
        json!({})
    } else {
        json!({
            "@odata.id": "/redfish/v1/UpdateService",
            "FirmwareInventory": {"@odata.id": INVENTORY_PATH}
        })
    };
    if *device.state.advertise_push_uri.lock() {
        doc["HttpPushUri"] = json!(PUSH_PATH);
    }
    Json(doc).into_response()
}

async fn inventory(State(device): State<MockDevice>, headers: HeaderMap) -> Response {
    device.count();
    if !authorized(&headers) {
        return unauthorized();
    }
    if *device.state.inventory_fails.lock() {
        return (StatusCode::INTERNAL_SERVER_ERROR, "inventory unavailable").into_response();
    }
    let members: Vec<Value> = device
        .state
        .firmware
        .lock()
        .iter()
        .map(|f| json!({"@odata.id": f.odata_id()}))
        .collect();
    Json(json!({
        "@odata.id": INVENTORY_PATH,
        "Name": "Firmware Inventory Collection",
        "Members@odata.count": members.len(),
        "Members": members
    }))
    .into_response()
}

async fn member(
    State(device): State<MockDevice>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    device.count();
    if !authorized(&headers) {
        return unauthorized();
    }
    let firmware = device
        .state
        .firmware
        .lock()
        .iter()
        .find(|f| f.id == id)
        .cloned();
    match firmware {
        Some(f) if f.broken => {
            (StatusCode::INTERNAL_SERVER_ERROR, "member unavailable").into_response()
        }
        Some(f) => {
            let mut doc = json!({
                "@odata.type": "#SoftwareInventory.v1_4_0.SoftwareInventory",
                "Id": f.id,
                "Name": f.name,
                "Version": f.version,
                "Description": f.description
            });
            if !f.anonymous {
                doc["@odata.id"] = json!(f.odata_id());
            }
            Json(doc).into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn push(
    State(device): State<MockDevice>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    device.count();

    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
    };
    let mut recorded = RecordedPush {
        auth_token: header("X-Auth-Token"),
        accept: header("Accept"),
        content_type: header("Content-Type"),
        ..Default::default()
    };

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
        };
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(String::from);
        let data = match field.bytes().await {
            Ok(data) => data,
            Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
        };

        match name.as_str() {
            "sessionKey" => recorded.session_key = Some(String::from_utf8_lossy(&data).into()),
            "parameters" => recorded.parameters = serde_json::from_slice(&data).ok(),
            "file" => {
                recorded.file_name = file_name;
                recorded.file = data.to_vec();
            }
            "compsig" => recorded.signature = Some(data.to_vec()),
            _ => {}
        }
        recorded.parts.push(name);
    }

    let token_ok = authorized(&headers) && recorded.session_key.as_deref() == Some(MOCK_TOKEN);
    device.state.pushes.lock().push(recorded);

    if !token_ok {
        return unauthorized();
    }

    let status = *device.state.push_status.lock();
    if !status.is_success() {
        return (status, Json(json!({"error": {"message": "update rejected"}}))).into_response();
    }

    device.install_pushed();

    match *device.state.task_style.lock() {
        TaskStyle::None => (status, Json(json!({}))).into_response(),
        TaskStyle::Location => (
            status,
            [("Location", TASK_PATH)],
            Json(json!({"@odata.id": TASK_PATH, "@odata.type": "#Task.v1_4_3.Task"})),
        )
            .into_response(),
        TaskStyle::Body => (
            status,
            Json(json!({
                "@odata.id": TASK_PATH,
                "@odata.type": "#Task.v1_4_3.Task",
                "TaskState": "New"
            })),
        )
            .into_response(),
    }
}

/// A test server that automatically shuts down when dropped
pub struct TestServer {
    pub addr: SocketAddr,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    /// Serve a mock device on an ephemeral port
    ///
    /// # Example
    ///
    /// ```ignore
    /// let device = MockDevice::new().with_firmware("BIOS", "1.0");
    /// let server = TestServer::start(device.clone()).await?;
    /// let updater = FirmwareUpdater::new(server.client()?);
    /// ```
    pub async fn start(device: MockDevice) -> std::io::Result<Self> {
        Self::start_router(device.router()).await
    }

    /// Serve an arbitrary router
    pub async fn start_router(router: Router) -> std::io::Result<Self> {
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

        // Give server a moment to start
        tokio::time::sleep(Duration::from_millis(10)).await;

        Ok(Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// Get the base URL of the test server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Default configuration pointing at this server
    pub fn config(&self) -> DeviceConfig {
        DeviceConfig::builder(self.base_url())
            .request_timeout_ms(5_000)
            .upload_timeout_ms(5_000)
            .build()
    }

    /// Client carrying the mock session token
    pub fn client(&self) -> Result<RedfishClient> {
        self.client_with(self.config())
    }

    /// Client built from `config`, carrying the mock session token
    pub fn client_with(&self, config: DeviceConfig) -> Result<RedfishClient> {
        Ok(RedfishClient::new(config)?.with_session(SessionToken::new(MOCK_TOKEN)?))
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
        // Send shutdown signal if not already done
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        // Abort the task if still running
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_part_names_sorted() {
        let push = RecordedPush {
            parts: vec!["sessionKey".into(), "file".into(), "parameters".into()],
            ..Default::default()
        };
        assert_eq!(push.part_names(), vec!["file", "parameters", "sessionKey"]);
    }

    #[tokio::test]
    async fn test_server_binds_loopback() {
        let server: std::io::Result<TestServer> = TestServer::start(MockDevice::new()).await;
        let server = server.unwrap();
        assert!(server.base_url().starts_with("http://127.0.0.1:"));
        server.shutdown().await;
    }

    #[test]
    fn test_install_on_push_updates_existing() {
        let device = MockDevice::new()
            .with_firmware("BIOS", "1.0")
            .install_on_push("BIOS", "2.0");
        device.install_pushed();
        assert_eq!(device.version_of("BIOS").as_deref(), Some("2.0"));
    }
}
