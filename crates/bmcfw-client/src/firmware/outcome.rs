//! Outcome reporting

use serde::{Deserialize, Serialize};

use super::gate::GateDecision;
use super::upload::UploadResponse;
use crate::types::FirmwareRecord;

/// What an apply did, as reported back to the caller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateOutcome {
    /// Identity of the firmware slot, when one is known
    pub resolved_identifier: Option<String>,

    /// Task handle issued by the device for the update
    pub task_reference: Option<String>,

    /// No upload was needed
    pub skipped: bool,

    /// Inventory members that failed to resolve during the decision
    #[serde(default)]
    pub unresolved_members: usize,

    /// HTTP status of the push, when one was made
    #[serde(default)]
    pub upload_status: Option<u16>,
}

impl UpdateOutcome {
    /// Task URI, empty when the device issued none
    pub fn task_uri(&self) -> &str {
        self.task_reference.as_deref().unwrap_or("")
    }

    /// Slot identifier, empty until one is resolved
    pub fn id(&self) -> &str {
        self.resolved_identifier.as_deref().unwrap_or("")
    }

    pub fn with_unresolved(mut self, count: usize) -> Self {
        self.unresolved_members = count;
        self
    }
}

/// Derives the caller-visible outcome of an apply
pub struct OutcomeRecorder;

impl OutcomeRecorder {
    /// Build the outcome from the pre-upload decision
    ///
    /// `after` is the post-upload match when inventory was re-read, and takes
    /// precedence over the pre-upload match. Without a match on either side
    /// the identifier stays unset until a later read finds the record.
    pub fn record(
        decision: &GateDecision<'_>,
        after: Option<&FirmwareRecord>,
        upload: Option<&UploadResponse>,
    ) -> UpdateOutcome {
        if !decision.needs_update {
            return UpdateOutcome {
                resolved_identifier: decision.matched.map(|r| r.identifier.clone()),
                skipped: true,
                ..Default::default()
            };
        }

        UpdateOutcome {
            resolved_identifier: after
                .or(decision.matched)
                .map(|r| r.identifier.clone()),
            task_reference: upload.and_then(|u| u.task_reference.clone()),
            skipped: false,
            unresolved_members: 0,
            upload_status: upload.map(|u| u.status),
        }
    }
}

/// Current device state for one firmware name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirmwareState {
    pub name: String,
    pub found: bool,
    pub identifier: Option<String>,
    pub version: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub unresolved_members: usize,
}

impl FirmwareState {
    pub fn from_match(name: &str, matched: Option<&FirmwareRecord>, unresolved: usize) -> Self {
        Self {
            name: name.to_string(),
            found: matched.is_some(),
            identifier: matched.map(|r| r.identifier.clone()),
            version: matched.map(|r| r.version.clone()),
            description: matched
                .map(|r| r.description.clone())
                .filter(|d| !d.is_empty()),
            unresolved_members: unresolved,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn bios(version: &str) -> FirmwareRecord {
        FirmwareRecord {
            identifier: "/redfish/v1/UpdateService/FirmwareInventory/BIOS".to_string(),
            name: "BIOS".to_string(),
            version: version.to_string(),
            description: "System BIOS".to_string(),
        }
    }

    fn accepted(task: Option<&str>) -> UploadResponse {
        UploadResponse {
            status: 202,
            body: String::new(),
            task_reference: task.map(String::from),
        }
    }

    #[test]
    fn test_skipped_keeps_identity() {
        let record = bios("1.0");
        let decision = GateDecision {
            matched: Some(&record),
            needs_update: false,
        };
        let outcome = OutcomeRecorder::record(&decision, None, None);
        assert_eq!(
            outcome,
            UpdateOutcome {
                resolved_identifier: Some(record.identifier.clone()),
                task_reference: None,
                skipped: true,
                unresolved_members: 0,
                upload_status: None,
            }
        );
        assert_eq!(outcome.task_uri(), "");
    }

    #[test]
    fn test_update_uses_prior_identity() {
        let record = bios("1.0");
        let decision = GateDecision {
            matched: Some(&record),
            needs_update: true,
        };
        let upload = accepted(Some("/redfish/v1/TaskService/Tasks/1"));
        let outcome = OutcomeRecorder::record(&decision, None, Some(&upload));
        assert!(!outcome.skipped);
        assert_eq!(outcome.id(), record.identifier);
        assert_eq!(outcome.task_uri(), "/redfish/v1/TaskService/Tasks/1");
        assert_eq!(outcome.upload_status, Some(202));
    }

    #[test]
    fn test_update_without_match_has_no_identity() {
        let decision = GateDecision {
            matched: None,
            needs_update: true,
        };
        let upload = accepted(None);
        let outcome = OutcomeRecorder::record(&decision, None, Some(&upload));
        assert_eq!(outcome.resolved_identifier, None);
        assert_eq!(outcome.task_reference, None);
    }

    #[test]
    fn test_post_upload_match_wins() {
        let before = bios("1.0");
        let mut after = bios("2.0");
        after.identifier = "/redfish/v1/UpdateService/FirmwareInventory/BIOS-2".to_string();
        let decision = GateDecision {
            matched: Some(&before),
            needs_update: true,
        };
        let outcome = OutcomeRecorder::record(&decision, Some(&after), Some(&accepted(None)));
        assert_eq!(outcome.id(), after.identifier);
    }

    #[test]
    fn test_state_from_match() {
        let record = bios("1.0");
        let state = FirmwareState::from_match("BIOS", Some(&record), 1);
        assert!(state.found);
        assert_eq!(state.version.as_deref(), Some("1.0"));
        assert_eq!(state.description.as_deref(), Some("System BIOS"));

        let missing = FirmwareState::from_match("CPLD", None, 0);
        assert!(!missing.found);
        assert_eq!(missing.identifier, None);
    }
}
