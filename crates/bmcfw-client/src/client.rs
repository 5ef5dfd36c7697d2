//! Redfish HTTP client implementation

use std::fmt;
use std::time::Duration;

use reqwest::header::{HeaderName, HeaderValue, ACCEPT, LOCATION};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument};
use url::Url;

use crate::config::DeviceConfig;
use crate::error::{FirmwareError, Result};
use crate::types::{ServiceRoot, SessionCreateRequest, UpdateService};

/// Bearer credential issued by a prior login
///
/// Never printed: `Debug` is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    /// Wrap an already-issued token
    ///
    /// Rejects empty tokens and values that cannot be carried in a header.
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(FirmwareError::Auth("session token is empty".into()));
        }
        HeaderValue::from_str(&token)
            .map_err(|e| FirmwareError::Auth(format!("session token is not a valid header: {}", e)))?;
        Ok(Self(token))
    }

    /// The raw token text
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(***)")
    }
}

/// A session created by [`RedfishClient::login`]
#[derive(Debug, Clone)]
pub struct Session {
    /// Token to attach to subsequent requests
    pub token: SessionToken,
    /// Session resource to delete on logout, when the controller reported one
    pub uri: Option<Url>,
}

/// Redfish client for one management controller
///
/// Every request carries the session token in the configured auth header.
#[derive(Debug, Clone)]
pub struct RedfishClient {
    client: Client,
    base_url: Url,
    config: DeviceConfig,
    session: Option<SessionToken>,
}

impl RedfishClient {
    /// Create a new client from configuration
    pub fn new(config: DeviceConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeouts.request_ms))
            .connect_timeout(Duration::from_millis(config.timeouts.connect_ms))
            .danger_accept_invalid_certs(config.connection.accept_invalid_certs)
            .build()?;

        let base_url = Url::parse(&config.connection.base_url)?;

        info!("Redfish client created for {}", base_url);

        Ok(Self {
            client,
            base_url,
            config,
            session: None,
        })
    }

    /// Create a client for `base_url` with default settings
    pub fn for_url(base_url: &str) -> Result<Self> {
        Self::new(DeviceConfig::builder(base_url).build())
    }

    /// Attach an issued session token
    pub fn with_session(mut self, token: SessionToken) -> Self {
        self.session = Some(token);
        self
    }

    /// The attached session token
    pub fn session(&self) -> Result<&SessionToken> {
        self.session
            .as_ref()
            .ok_or_else(|| FirmwareError::Auth("no session token configured".into()))
    }

    /// Get the configuration
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Get the base URL
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Get a reference to the underlying HTTP client
    pub fn http_client(&self) -> &Client {
        &self.client
    }

    // =========================================================================
    // Session
    // =========================================================================

    /// Log in and obtain a session
    ///
    /// Posts credentials to the session collection and returns the token from
    /// the `X-Auth-Token` response header, along with the `Location` of the
    /// created session.
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<Session> {
        let url = self.resolve(&self.config.endpoints.sessions)?;
        info!("Creating session at {}", url);

        let body = SessionCreateRequest {
            user_name: username,
            password,
        };
        let response = self
            .client
            .post(url.clone())
            .header(ACCEPT, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| FirmwareError::Auth(format!("login request to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FirmwareError::Auth(format!(
                "login to {} rejected with HTTP {}",
                url, status
            )));
        }

        let headers = response.headers();
        let token = headers
            .get("X-Auth-Token")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| FirmwareError::Auth("login response carried no X-Auth-Token".into()))?;
        let uri = match headers.get(LOCATION).and_then(|v| v.to_str().ok()) {
            Some(location) => Some(self.resolve(location)?),
            None => {
                debug!("Login response has no Location, session cannot be deleted");
                None
            }
        };

        Ok(Session {
            token: SessionToken::new(token)?,
            uri,
        })
    }

    /// Delete a session created by [`login`](Self::login)
    ///
    /// Authenticates with the attached session token.
    #[instrument(skip(self))]
    pub async fn logout(&self, session_uri: &Url) -> Result<()> {
        let response = self
            .authorize(self.client.delete(session_uri.clone()))?
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| {
                FirmwareError::Auth(format!("logout from {} failed: {}", session_uri, e))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FirmwareError::Auth(format!(
                "logout from {} rejected with HTTP {}",
                session_uri, status
            )));
        }

        info!("Session {} closed", session_uri);
        Ok(())
    }

    // =========================================================================
    // Service Discovery
    // =========================================================================

    /// Fetch the service root
    #[instrument(skip(self))]
    pub async fn service_root(&self) -> Result<ServiceRoot> {
        let path = self.config.endpoints.service_root.clone();
        self.get_json("service root", &path).await
    }

    /// Fetch the update service document
    #[instrument(skip(self))]
    pub async fn update_service(&self) -> Result<UpdateService> {
        let uri = self.update_service_uri().await?;
        self.get_json("update service", &uri).await
    }

    /// Locate the update service, from configuration or the service root
    async fn update_service_uri(&self) -> Result<String> {
        match &self.config.endpoints.update_service {
            Some(path) => Ok(path.clone()),
            None => self
                .service_root()
                .await?
                .update_service
                .map(|link| link.odata_id)
                .ok_or_else(|| {
                    FirmwareError::fetch(
                        "update service",
                        &self.config.endpoints.service_root,
                        "service root has no UpdateService link",
                    )
                }),
        }
    }

    /// Locate the firmware inventory collection
    #[instrument(skip(self))]
    pub async fn firmware_inventory_uri(&self) -> Result<String> {
        if let Some(path) = &self.config.endpoints.firmware_inventory {
            return Ok(path.clone());
        }
        let uri = self.update_service_uri().await?;
        let service: UpdateService = self.get_json("update service", &uri).await?;
        service
            .firmware_inventory
            .map(|link| link.odata_id)
            .ok_or_else(|| {
                FirmwareError::fetch(
                    "firmware inventory",
                    uri,
                    "update service has no FirmwareInventory link",
                )
            })
    }

    /// Locate the multipart push URI
    #[instrument(skip(self))]
    pub async fn push_uri(&self) -> Result<Url> {
        let path = match &self.config.endpoints.push_uri {
            Some(path) => path.clone(),
            None => {
                let uri = self.update_service_uri().await?;
                let service: UpdateService = self.get_json("update service", &uri).await?;
                service.http_push_uri.ok_or_else(|| {
                    FirmwareError::upload(
                        "discover push uri",
                        uri,
                        "update service has no HttpPushUri",
                    )
                })?
            }
        };
        self.resolve(&path)
    }

    // =========================================================================
    // Helper Methods
    // =========================================================================

    /// Resolve a device-supplied path or absolute URI against the base URL
    pub fn resolve(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).map_err(Into::into)
    }

    /// Attach the session token header
    pub(crate) fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let token = self.session()?;
        let name = HeaderName::from_bytes(self.config.connection.auth_header.as_bytes())
            .map_err(|e| FirmwareError::Auth(format!("invalid auth header name: {}", e)))?;
        Ok(request.header(name, token.expose()))
    }

    /// GET a Redfish document; any failure is reported as a fetch error
    #[instrument(skip(self))]
    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        what: &'static str,
        uri: &str,
    ) -> Result<T> {
        let url = self
            .resolve(uri)
            .map_err(|e| FirmwareError::fetch(what, uri, e))?;
        debug!("GET {} ({})", url, what);

        let request = self
            .authorize(self.client.get(url.clone()))?
            .header(ACCEPT, "application/json");

        let response = request
            .send()
            .await
            .map_err(|e| FirmwareError::fetch(what, url.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FirmwareError::fetch(
                what,
                url.as_str(),
                format!("HTTP {}: {}", status, body.trim()),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| FirmwareError::fetch(what, url.as_str(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = RedfishClient::for_url("http://localhost:8000");
        assert!(client.is_ok());
    }

    #[test]
    fn test_invalid_url() {
        assert!(RedfishClient::for_url("not a url").is_err());
    }

    #[test]
    fn test_missing_session_is_auth_error() {
        let client = RedfishClient::for_url("http://localhost:8000").unwrap();
        assert!(matches!(client.session(), Err(FirmwareError::Auth(_))));
    }

    #[test]
    fn test_empty_token_rejected() {
        assert!(matches!(SessionToken::new("  "), Err(FirmwareError::Auth(_))));
        assert!(matches!(
            SessionToken::new("abc\ndef"),
            Err(FirmwareError::Auth(_))
        ));
    }

    #[test]
    fn test_token_debug_is_redacted() {
        let token = SessionToken::new("s3cr3t").unwrap();
        assert_eq!(format!("{:?}", token), "SessionToken(***)");
        assert_eq!(token.expose(), "s3cr3t");
    }

    #[test]
    fn test_resolve_relative_and_absolute() {
        let client = RedfishClient::for_url("https://10.0.0.5").unwrap();
        assert_eq!(
            client.resolve("/redfish/v1/UpdateService").unwrap().as_str(),
            "https://10.0.0.5/redfish/v1/UpdateService"
        );
        assert_eq!(
            client
                .resolve("https://10.0.0.6/redfish/v1/UpdateService/update")
                .unwrap()
                .as_str(),
            "https://10.0.0.6/redfish/v1/UpdateService/update"
        );
    }
}
