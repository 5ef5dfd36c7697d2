//! Caller-supplied update request

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{FirmwareError, Result};

/// What to install, and from where
///
/// Immutable for the duration of one apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRequest {
    /// Firmware name as reported by the device inventory
    pub name: String,

    /// Desired version; compared to the device's by exact string equality
    pub version: String,

    /// Firmware image to push
    pub local_file: PathBuf,

    /// Detached signature, sent as `compsig` when present
    #[serde(default)]
    pub signature_file: Option<PathBuf>,

    /// Also update the recovery set.
    ///
    /// Accepted for compatibility; the push protocol has no field for it and
    /// it is never transmitted.
    #[serde(default)]
    pub update_recovery_set: bool,
}

impl UpdateRequest {
    /// Create a request for `name` at `version` from `local_file`
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        local_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            local_file: local_file.into(),
            signature_file: None,
            update_recovery_set: false,
        }
    }

    /// Attach a signature file. An empty path means no signature.
    pub fn with_signature(mut self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        self.signature_file = if path.as_os_str().is_empty() {
            None
        } else {
            Some(path)
        };
        self
    }

    /// Request a recovery-set update
    pub fn with_recovery_set(mut self, enabled: bool) -> Self {
        self.update_recovery_set = enabled;
        self
    }

    /// Signature path, treating an empty path as absent
    pub fn signature(&self) -> Option<&Path> {
        self.signature_file
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
    }

    /// Check the required fields are present
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(FirmwareError::InvalidRequest("name is required".into()));
        }
        if self.version.is_empty() {
            return Err(FirmwareError::InvalidRequest("version is required".into()));
        }
        if self.local_file.as_os_str().is_empty() {
            return Err(FirmwareError::InvalidRequest(
                "local_file is required".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_signature_is_absent() {
        let request = UpdateRequest::new("BIOS", "2.0", "/tmp/bios.bin").with_signature("");
        assert_eq!(request.signature(), None);

        let deserialized: UpdateRequest = serde_json::from_str(
            r#"{"name": "BIOS", "version": "2.0", "local_file": "/tmp/bios.bin", "signature_file": ""}"#,
        )
        .unwrap();
        assert_eq!(deserialized.signature(), None);
        assert!(!deserialized.update_recovery_set);
    }

    #[test]
    fn test_signature_present() {
        let request =
            UpdateRequest::new("BIOS", "2.0", "/tmp/bios.bin").with_signature("/tmp/bios.sig");
        assert_eq!(request.signature(), Some(Path::new("/tmp/bios.sig")));
    }

    #[test]
    fn test_validate() {
        assert!(UpdateRequest::new("BIOS", "2.0", "/tmp/bios.bin")
            .validate()
            .is_ok());
        assert!(UpdateRequest::new("", "2.0", "/tmp/bios.bin")
            .validate()
            .is_err());
        assert!(UpdateRequest::new("BIOS", "", "/tmp/bios.bin")
            .validate()
            .is_err());
        assert!(UpdateRequest::new("BIOS", "2.0", "").validate().is_err());
    }
}
