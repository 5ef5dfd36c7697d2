//! Inventory command - list device firmware

use anyhow::Result;
use bmcfw_client::firmware::FirmwareUpdater;

use crate::output::{or_dash, FirmwareRow, OutputContext};

/// List all firmware reported by the device
pub async fn inventory(updater: &FirmwareUpdater, ctx: &OutputContext) -> Result<()> {
    let inventory = updater.inventory().await?;

    for gap in &inventory.gaps {
        ctx.warn(&format!("Could not read {}: {}", gap.member, gap.reason));
    }

    let rows: Vec<FirmwareRow> = inventory
        .records
        .into_iter()
        .map(|r| FirmwareRow {
            version: or_dash(Some(r.version.as_str())),
            description: or_dash(Some(r.description.as_str())),
            name: r.name,
            id: r.identifier,
        })
        .collect();

    ctx.print(&rows);
    Ok(())
}
