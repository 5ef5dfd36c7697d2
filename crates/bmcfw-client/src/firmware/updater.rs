//! End-to-end firmware apply

use tracing::{info, instrument, warn};

use super::gate::VersionGate;
use super::inventory::{InventoryResolver, ResolvedInventory};
use super::outcome::{FirmwareState, OutcomeRecorder, UpdateOutcome};
use super::request::UpdateRequest;
use super::upload::{FsPayloadSource, PayloadSource, UploadSession};
use crate::client::RedfishClient;
use crate::error::Result;

/// Applies firmware requests to one controller
///
/// Each call re-reads the device inventory, so repeating an apply that
/// already succeeded is a no-op. Calls sharing a session token against the
/// same device must be serialized by the caller.
#[derive(Debug, Clone)]
pub struct FirmwareUpdater<S = FsPayloadSource> {
    client: RedfishClient,
    source: S,
}

impl FirmwareUpdater<FsPayloadSource> {
    pub fn new(client: RedfishClient) -> Self {
        Self {
            client,
            source: FsPayloadSource,
        }
    }
}

impl<S: PayloadSource> FirmwareUpdater<S> {
    /// Use a custom payload source for image and signature files
    pub fn with_source(client: RedfishClient, source: S) -> Self {
        Self { client, source }
    }

    pub fn client(&self) -> &RedfishClient {
        &self.client
    }

    /// Bring the named firmware to the requested version
    ///
    /// 1. Resolve inventory
    /// 2. Skip if the first record with this name already has the version
    /// 3. Otherwise push image (and signature) to the push URI
    /// 4. Report identity and task handle
    #[instrument(skip(self, request), fields(name = %request.name, version = %request.version))]
    pub async fn apply(&self, request: &UpdateRequest) -> Result<UpdateOutcome> {
        request.validate()?;
        self.client.session()?;

        let resolver = InventoryResolver::new(&self.client);
        let inventory = resolver.resolve_discovered().await?;
        let unresolved = inventory.gaps.len();

        let decision = VersionGate::decide(&inventory.records, &request.name, &request.version);

        if !decision.needs_update {
            info!("{} already at version {}, skipping", request.name, request.version);
            return Ok(OutcomeRecorder::record(&decision, None, None).with_unresolved(unresolved));
        }

        match decision.matched {
            Some(current) => info!(
                "Updating {} from {} to {}",
                request.name, current.version, request.version
            ),
            None => info!(
                "{} not in inventory, installing {}",
                request.name, request.version
            ),
        }

        let push_uri = self.client.push_uri().await?;
        let response = UploadSession::with_source(&self.client, &self.source)
            .upload(&push_uri, request)
            .await?;

        let refreshed = if self.client.config().reresolve_after_upload {
            match resolver.resolve_discovered().await {
                Ok(inventory) => Some(inventory),
                Err(e) => {
                    warn!(error = %e, "Post-upload inventory read failed, keeping prior identity");
                    None
                }
            }
        } else {
            None
        };
        let after = refreshed
            .as_ref()
            .and_then(|inv| VersionGate::decide(&inv.records, &request.name, &request.version).matched);

        Ok(OutcomeRecorder::record(&decision, after, Some(&response)).with_unresolved(unresolved))
    }

    /// Report the device's current state for `name`
    ///
    /// A name absent from the inventory is not an error.
    #[instrument(skip(self))]
    pub async fn read(&self, name: &str) -> Result<FirmwareState> {
        let inventory = self.inventory().await?;
        let matched = inventory.records.iter().find(|r| r.name == name);
        if matched.is_none() {
            info!("{} not found in inventory", name);
        }
        Ok(FirmwareState::from_match(name, matched, inventory.gaps.len()))
    }

    /// Resolve the full firmware inventory
    #[instrument(skip(self))]
    pub async fn inventory(&self) -> Result<ResolvedInventory> {
        InventoryResolver::new(&self.client)
            .resolve_discovered()
            .await
    }
}
