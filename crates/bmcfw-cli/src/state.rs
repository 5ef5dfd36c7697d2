//! Durable record of applied firmware

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bmcfw_client::firmware::{FirmwareState, UpdateOutcome, UpdateRequest};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What was last applied (or observed) for one firmware name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedRecord {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(default)]
    pub task_uri: Option<String>,
    #[serde(default)]
    pub skipped: bool,
    #[serde(default)]
    pub unresolved_members: usize,
    pub updated_at: DateTime<Utc>,
}

impl AppliedRecord {
    pub fn from_outcome(request: &UpdateRequest, outcome: &UpdateOutcome) -> Self {
        Self {
            name: request.name.clone(),
            version: request.version.clone(),
            identifier: outcome.resolved_identifier.clone(),
            task_uri: outcome.task_reference.clone(),
            skipped: outcome.skipped,
            unresolved_members: outcome.unresolved_members,
            updated_at: Utc::now(),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StateFile {
    #[serde(default)]
    firmware: BTreeMap<String, AppliedRecord>,
}

/// JSON state file keyed by firmware name
pub struct StateStore {
    path: PathBuf,
    state: StateFile,
}

impl StateStore {
    /// Open the store at `path`; a missing file is an empty store
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let state = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read state file: {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse state file: {}", path.display()))?
        } else {
            StateFile::default()
        };
        Ok(Self { path, state })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, name: &str) -> Option<&AppliedRecord> {
        self.state.firmware.get(name)
    }

    pub fn put(&mut self, record: AppliedRecord) {
        self.state.firmware.insert(record.name.clone(), record);
    }

    /// Refresh the stored version and identity from a device read
    ///
    /// Firmware that is no longer on the device loses its identifier but keeps
    /// its entry. Returns whether an entry existed.
    pub fn refresh(&mut self, state: &FirmwareState) -> bool {
        let Some(record) = self.state.firmware.get_mut(&state.name) else {
            return false;
        };
        if let Some(version) = &state.version {
            record.version = version.clone();
        }
        record.identifier = state.identifier.clone();
        record.unresolved_members = state.unresolved_members;
        record.updated_at = Utc::now();
        true
    }

    pub fn remove(&mut self, name: &str) -> Option<AppliedRecord> {
        self.state.firmware.remove(name)
    }

    /// Write the store, replacing the file atomically
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(&self.state)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn outcome(id: Option<&str>, task: Option<&str>) -> UpdateOutcome {
        UpdateOutcome {
            resolved_identifier: id.map(String::from),
            task_reference: task.map(String::from),
            skipped: false,
            unresolved_members: 0,
            upload_status: Some(202),
        }
    }

    #[test]
    fn test_save_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let request = UpdateRequest::new("BIOS", "2.0", "/images/bios.bin");
        let mut store = StateStore::open(&path).unwrap();
        store.put(AppliedRecord::from_outcome(
            &request,
            &outcome(Some("/fw/BIOS"), Some("/redfish/v1/TaskService/Tasks/1")),
        ));
        store.save().unwrap();

        let reopened = StateStore::open(&path).unwrap();
        let record = reopened.get("BIOS").unwrap();
        assert_eq!(record.version, "2.0");
        assert_eq!(record.identifier.as_deref(), Some("/fw/BIOS"));
        assert_eq!(
            record.task_uri.as_deref(),
            Some("/redfish/v1/TaskService/Tasks/1")
        );
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_refresh_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = StateStore::open(dir.path().join("state.json")).unwrap();
        let request = UpdateRequest::new("BIOS", "2.0", "/images/bios.bin");
        store.put(AppliedRecord::from_outcome(&request, &outcome(None, None)));

        let observed = FirmwareState {
            name: "BIOS".into(),
            found: true,
            identifier: Some("/fw/BIOS".into()),
            version: Some("2.0".into()),
            description: None,
            unresolved_members: 0,
        };
        assert!(store.refresh(&observed));
        assert_eq!(store.get("BIOS").unwrap().identifier.as_deref(), Some("/fw/BIOS"));

        let unknown = FirmwareState {
            name: "CPLD".into(),
            found: false,
            identifier: None,
            version: None,
            description: None,
            unresolved_members: 0,
        };
        assert!(!store.refresh(&unknown));

        assert!(store.remove("BIOS").is_some());
        assert!(store.get("BIOS").is_none());
    }
}
