//! Firmware inventory resolution

use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::client::RedfishClient;
use crate::error::Result;
use crate::types::{FirmwareInventory, FirmwareRecord};

/// An inventory member that could not be resolved
///
/// Gaps are dropped from the resolved records. A caller therefore cannot tell
/// "no such firmware" from "present but unreadable" by the records alone; the
/// gap list is how it finds out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionGap {
    /// Member reference that failed
    pub member: String,
    /// Why it failed
    pub reason: String,
}

/// Inventory with every resolvable member expanded, in device order
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResolvedInventory {
    /// Collection identifier
    pub identifier: String,
    /// Resolved records, in member order
    pub records: Vec<FirmwareRecord>,
    /// Members that failed to resolve
    pub gaps: Vec<ResolutionGap>,
}

impl ResolvedInventory {
    /// Whether any member was dropped
    pub fn is_partial(&self) -> bool {
        !self.gaps.is_empty()
    }
}

/// Fetches the inventory collection and resolves each member
pub struct InventoryResolver<'a> {
    client: &'a RedfishClient,
}

impl<'a> InventoryResolver<'a> {
    pub fn new(client: &'a RedfishClient) -> Self {
        Self { client }
    }

    /// Resolve the inventory discovered from the service root
    #[instrument(skip(self))]
    pub async fn resolve_discovered(&self) -> Result<ResolvedInventory> {
        let uri = self.client.firmware_inventory_uri().await?;
        self.resolve(&uri).await
    }

    /// Resolve the inventory at `inventory_uri`
    ///
    /// The collection is fetched once; failure there is fatal. Members are
    /// then resolved one at a time, and a member that fails is recorded as a
    /// gap rather than aborting the whole resolution.
    #[instrument(skip(self))]
    pub async fn resolve(&self, inventory_uri: &str) -> Result<ResolvedInventory> {
        let inventory: FirmwareInventory = self
            .client
            .get_json("firmware inventory", inventory_uri)
            .await?;

        debug!(
            "Inventory {} lists {} members",
            inventory_uri,
            inventory.members.len()
        );

        let mut records = Vec::with_capacity(inventory.members.len());
        let mut gaps = Vec::new();

        for member in inventory.member_refs() {
            match self
                .client
                .get_json::<FirmwareRecord>("firmware record", member)
                .await
            {
                Ok(mut record) => {
                    if record.identifier.is_empty() {
                        debug!(member = %member, "Member has no @odata.id, using its reference");
                        record.identifier = member.to_string();
                    }
                    records.push(record);
                }
                Err(e) => {
                    warn!(member = %member, error = %e, "Skipping unresolvable firmware member");
                    gaps.push(ResolutionGap {
                        member: member.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        let identifier = if inventory.identifier.is_empty() {
            inventory_uri.to_string()
        } else {
            inventory.identifier
        };

        Ok(ResolvedInventory {
            identifier,
            records,
            gaps,
        })
    }
}
