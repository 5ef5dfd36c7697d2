//! Multipart firmware push

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, LOCATION};
use reqwest::multipart::{Form, Part};
use reqwest::Body;
use serde::Serialize;
use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::request::UpdateRequest;
use crate::client::{RedfishClient, SessionToken};
use crate::error::{FirmwareError, Result};
use crate::types::TaskDocument;

/// Multipart field carrying the session token
pub const SESSION_KEY_PART: &str = "sessionKey";
/// Multipart field carrying the update parameters JSON
pub const PARAMETERS_PART: &str = "parameters";
/// Multipart field carrying the firmware image
pub const FILE_PART: &str = "file";
/// Multipart field carrying the detached signature
pub const SIGNATURE_PART: &str = "compsig";

/// Control fields sent in the `parameters` part
///
/// Fixed by the push protocol; not user-configurable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateParameters {
    #[serde(rename = "UpdateRepository")]
    pub update_repository: bool,
    #[serde(rename = "UpdateTarget")]
    pub update_target: bool,
    #[serde(rename = "ETag")]
    pub etag: &'static str,
    #[serde(rename = "Section")]
    pub section: u32,
}

impl Default for UpdateParameters {
    fn default() -> Self {
        Self {
            update_repository: true,
            update_target: true,
            etag: "atag",
            section: 0,
        }
    }
}

// =============================================================================
// Payload Sources
// =============================================================================

/// An opened local file, ready to be streamed into a multipart part
///
/// Owns the underlying handle; dropping the payload releases it.
pub struct Payload {
    file_name: String,
    length: u64,
    reader: Box<dyn AsyncRead + Send + Sync + Unpin>,
}

impl Payload {
    pub fn new(
        file_name: impl Into<String>,
        length: u64,
        reader: Box<dyn AsyncRead + Send + Sync + Unpin>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            length,
            reader,
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn len(&self) -> u64 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    fn into_part(self) -> Result<Part> {
        let body = Body::wrap_stream(ReaderStream::new(self.reader));
        Part::stream_with_length(body, self.length)
            .file_name(self.file_name)
            .mime_str("application/octet-stream")
            .map_err(Into::into)
    }
}

impl std::fmt::Debug for Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Payload")
            .field("file_name", &self.file_name)
            .field("length", &self.length)
            .finish()
    }
}

/// Opens local files as streaming payloads
#[async_trait]
pub trait PayloadSource: Send + Sync {
    async fn open(&self, path: &Path) -> std::io::Result<Payload>;
}

/// Reads payloads from the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FsPayloadSource;

#[async_trait]
impl PayloadSource for FsPayloadSource {
    async fn open(&self, path: &Path) -> std::io::Result<Payload> {
        let file = tokio::fs::File::open(path).await?;
        let length = file.metadata().await?.len();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "firmware.bin".to_string());
        Ok(Payload::new(file_name, length, Box::new(file)))
    }
}

// =============================================================================
// Upload Session
// =============================================================================

/// Outcome of a successful push
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadResponse {
    /// HTTP status returned by the device
    pub status: u16,
    /// Raw response body
    pub body: String,
    /// Task handle, when the device issued one
    pub task_reference: Option<String>,
}

/// Builds and sends one multipart firmware push
pub struct UploadSession<'a, S = FsPayloadSource> {
    client: &'a RedfishClient,
    source: &'a S,
}

impl<'a> UploadSession<'a, FsPayloadSource> {
    pub fn new(client: &'a RedfishClient) -> Self {
        Self {
            client,
            source: &FsPayloadSource,
        }
    }
}

impl<'a, S: PayloadSource> UploadSession<'a, S> {
    pub fn with_source(client: &'a RedfishClient, source: &'a S) -> Self {
        Self { client, source }
    }

    /// Push the request's image (and signature) to `push_uri`
    ///
    /// Local files are opened before anything is sent; if either fails to
    /// open no request is made. Not retried.
    #[instrument(skip(self, request), fields(image = %request.local_file.display()))]
    pub async fn upload(&self, push_uri: &Url, request: &UpdateRequest) -> Result<UploadResponse> {
        let token = self.client.session()?;

        let image = self
            .source
            .open(&request.local_file)
            .await
            .map_err(|e| FirmwareError::local_io("image", &request.local_file, e))?;

        let signature = match request.signature() {
            Some(path) => Some(
                self.source
                    .open(path)
                    .await
                    .map_err(|e| FirmwareError::local_io("signature", path, e))?,
            ),
            None => None,
        };

        if request.update_recovery_set {
            warn!("update_recovery_set is not supported by the push protocol; ignoring");
        }

        info!(
            "Pushing {} ({} bytes{}) to {}",
            image.file_name(),
            image.len(),
            if signature.is_some() { ", signed" } else { "" },
            push_uri
        );

        let form = build_form(token, image, signature)?;
        let timeout = Duration::from_millis(self.client.config().timeouts.upload_ms);

        let response = self
            .client
            .authorize(self.client.http_client().post(push_uri.clone()))?
            .header(ACCEPT, "application/json")
            .timeout(timeout)
            .multipart(form)
            .send()
            .await
            .map_err(|e| FirmwareError::upload("post firmware", push_uri.as_str(), e))?;

        let status = response.status();
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            let message = if body.trim().is_empty() {
                format!("HTTP {}", status)
            } else {
                body.trim().to_string()
            };
            return Err(FirmwareError::Upload {
                step: "post firmware",
                uri: push_uri.to_string(),
                status: Some(status.as_u16()),
                message,
            });
        }

        debug!("Push response {}: {}", status, body);

        let task_reference = extract_task_reference(location.as_deref(), &body);
        match &task_reference {
            Some(task) => info!("Firmware accepted, task {}", task),
            None => info!("Firmware accepted (HTTP {})", status),
        }

        Ok(UploadResponse {
            status: status.as_u16(),
            body,
            task_reference,
        })
    }
}

fn build_form(token: &SessionToken, image: Payload, signature: Option<Payload>) -> Result<Form> {
    let parameters = serde_json::to_string(&UpdateParameters::default())
        .map_err(|e| FirmwareError::upload("encode parameters", "", e))?;

    let mut form = Form::new()
        .text(SESSION_KEY_PART, token.expose().to_string())
        .part(
            PARAMETERS_PART,
            Part::text(parameters).mime_str("application/json")?,
        )
        .part(FILE_PART, image.into_part()?);

    if let Some(signature) = signature {
        form = form.part(SIGNATURE_PART, signature.into_part()?);
    }

    Ok(form)
}

/// Best-effort task handle extraction
///
/// Prefers the `Location` header, then a Task document's `@odata.id`, then a
/// `TaskMonitor` field. Anything else yields `None`.
pub fn extract_task_reference(location: Option<&str>, body: &str) -> Option<String> {
    if let Some(location) = location.filter(|l| !l.trim().is_empty()) {
        return Some(location.trim().to_string());
    }

    let doc: TaskDocument = serde_json::from_str(body).ok()?;
    let is_task = doc
        .odata_type
        .as_deref()
        .is_some_and(|t| t.contains("Task"));

    if is_task {
        if let Some(id) = doc.odata_id.filter(|id| !id.is_empty()) {
            return Some(id);
        }
    }
    doc.task_monitor.filter(|m| !m.is_empty())
}
