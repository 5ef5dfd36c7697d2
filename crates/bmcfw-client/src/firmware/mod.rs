//! Firmware update pipeline
//!
//! Inventory resolution, version gating, multipart push and outcome
//! reporting, wired together by [`FirmwareUpdater`].
//!
//! # Example
//!
//! ```rust,ignore
//! use bmcfw_client::firmware::{FirmwareUpdater, UpdateRequest};
//! use bmcfw_client::{RedfishClient, SessionToken};
//!
//! let client = RedfishClient::for_url("https://10.0.0.5")?
//!     .with_session(SessionToken::new(token)?);
//! let updater = FirmwareUpdater::new(client);
//!
//! let request = UpdateRequest::new("BIOS", "2.0", "bios-2.0.bin")
//!     .with_signature("bios-2.0.sig");
//! let outcome = updater.apply(&request).await?;
//! ```

mod gate;
mod inventory;
mod outcome;
mod request;
mod updater;
mod upload;

pub use gate::*;
pub use inventory::*;
pub use outcome::*;
pub use request::*;
pub use updater::*;
pub use upload::*;
