//! Redfish wire types consumed by the firmware client
//!
//! Only the fields the update flow needs are modelled; everything else in the
//! device's documents is ignored.

use serde::{Deserialize, Serialize};

// =============================================================================
// Links and Service Documents
// =============================================================================

/// A Redfish `{"@odata.id": "..."}` reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ODataLink {
    #[serde(rename = "@odata.id")]
    pub odata_id: String,
}

impl ODataLink {
    pub fn new(odata_id: impl Into<String>) -> Self {
        Self {
            odata_id: odata_id.into(),
        }
    }
}

/// Service root (`GET /redfish/v1`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceRoot {
    #[serde(rename = "UpdateService", default)]
    pub update_service: Option<ODataLink>,

    #[serde(rename = "SessionService", default)]
    pub session_service: Option<ODataLink>,
}

/// Update service document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateService {
    #[serde(rename = "@odata.id", default)]
    pub odata_id: Option<String>,

    /// URI accepting multipart firmware pushes
    #[serde(rename = "HttpPushUri", default)]
    pub http_push_uri: Option<String>,

    #[serde(rename = "FirmwareInventory", default)]
    pub firmware_inventory: Option<ODataLink>,
}

// =============================================================================
// Firmware Inventory
// =============================================================================

/// Firmware inventory collection
///
/// Members are unresolved references; see
/// [`InventoryResolver`](crate::firmware::InventoryResolver).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirmwareInventory {
    #[serde(rename = "@odata.id", default)]
    pub identifier: String,

    #[serde(rename = "Name", default)]
    pub name: String,

    #[serde(rename = "Members", default)]
    pub members: Vec<ODataLink>,
}

impl FirmwareInventory {
    /// Member references in device order
    pub fn member_refs(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(|m| m.odata_id.as_str())
    }
}

/// A single firmware entry as reported by the device
///
/// Never mutated after resolution. The identifier is the entry's `@odata.id`; some
/// controllers omit it, in which case the resolver uses the member reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirmwareRecord {
    #[serde(rename = "@odata.id", default)]
    pub identifier: String,

    #[serde(rename = "Name", default)]
    pub name: String,

    #[serde(rename = "Version", default)]
    pub version: String,

    #[serde(rename = "Description", default)]
    pub description: String,
}

// =============================================================================
// Upload Response
// =============================================================================

/// Body of a task-bearing upload response
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct TaskDocument {
    #[serde(rename = "@odata.id", default)]
    pub odata_id: Option<String>,

    #[serde(rename = "@odata.type", default)]
    pub odata_type: Option<String>,

    #[serde(rename = "TaskMonitor", default)]
    pub task_monitor: Option<String>,
}

/// Credentials for `POST <sessions>`
#[derive(Debug, Clone, Serialize)]
pub(crate) struct SessionCreateRequest<'a> {
    #[serde(rename = "UserName")]
    pub user_name: &'a str,
    #[serde(rename = "Password")]
    pub password: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inventory_members() {
        let json = r#"{
            "@odata.id": "/redfish/v1/UpdateService/FirmwareInventory",
            "Name": "Firmware Inventory",
            "Members@odata.count": 2,
            "Members": [
                {"@odata.id": "/redfish/v1/UpdateService/FirmwareInventory/BIOS"},
                {"@odata.id": "/redfish/v1/UpdateService/FirmwareInventory/BMC"}
            ]
        }"#;

        let inventory: FirmwareInventory = serde_json::from_str(json).unwrap();
        let refs: Vec<&str> = inventory.member_refs().collect();
        assert_eq!(
            refs,
            vec![
                "/redfish/v1/UpdateService/FirmwareInventory/BIOS",
                "/redfish/v1/UpdateService/FirmwareInventory/BMC"
            ]
        );
    }

    #[test]
    fn test_firmware_record_defaults() {
        let json = r#"{"@odata.id": "/fw/1", "Name": "BIOS"}"#;
        let record: FirmwareRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.identifier, "/fw/1");
        assert_eq!(record.version, "");
        assert_eq!(record.description, "");
    }

    #[test]
    fn test_record_without_identifier_is_accepted() {
        let json = r#"{"Id": "BIOS", "Name": "BIOS", "Version": "1.0"}"#;
        let record: FirmwareRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.identifier, "");
        assert_eq!(record.name, "BIOS");
        assert_eq!(record.version, "1.0");
    }
}
