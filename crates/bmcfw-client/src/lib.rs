//! Redfish Firmware Client Library
//!
//! Deploys firmware to network-attached management controllers over Redfish.
//! An apply resolves the device's firmware inventory, skips the upload when
//! the requested version is already installed, and otherwise pushes the image
//! (and an optional detached signature) as a multipart request to the
//! update service's push URI.
//!
//! # Example
//!
//! ```rust,no_run
//! use bmcfw_client::firmware::{FirmwareUpdater, UpdateRequest};
//! use bmcfw_client::{DeviceConfig, RedfishClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DeviceConfig::builder("https://10.0.0.5")
//!         .accept_invalid_certs(true)
//!         .build();
//!     let client = RedfishClient::new(config)?;
//!     let session = client.login("admin", "password").await?;
//!
//!     let updater = FirmwareUpdater::new(client.with_session(session.token));
//!     let outcome = updater
//!         .apply(&UpdateRequest::new("BIOS", "2.0", "bios-2.0.bin"))
//!         .await?;
//!
//!     println!("skipped={} task={}", outcome.skipped, outcome.task_uri());
//!     if let Some(uri) = &session.uri {
//!         updater.client().logout(uri).await?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Testing
//!
//! The `testing` module provides an in-process mock controller:
//!
//! ```rust,ignore
//! use bmcfw_client::testing::{MockDevice, TestServer};
//!
//! let device = MockDevice::new().with_firmware("BIOS", "1.0");
//! let server = TestServer::start(device.clone()).await?;
//! let updater = FirmwareUpdater::new(server.client()?);
//! ```

mod client;
mod config;
mod error;
pub mod firmware;
pub mod testing;
mod types;

pub use client::{RedfishClient, Session, SessionToken};
pub use config::*;
pub use error::{FirmwareError, Result};
pub use types::*;

// Re-export the pipeline entry points for convenience
pub use firmware::{FirmwareUpdater, UpdateOutcome, UpdateRequest};
