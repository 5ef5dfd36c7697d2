//! Read command - show the device's current version of one firmware

use anyhow::{Context, Result};
use bmcfw_client::firmware::FirmwareUpdater;

use crate::output::{or_dash, OutputContext};
use crate::state::StateStore;

/// Read current state from the device and refresh the stored record
pub async fn read(
    updater: &FirmwareUpdater,
    name: &str,
    store: &mut StateStore,
    ctx: &OutputContext,
) -> Result<()> {
    let state = updater
        .read(name)
        .await
        .with_context(|| format!("Failed to read {}", name))?;

    if store.refresh(&state) {
        store.save()?;
    }

    if !state.found {
        ctx.warn(&format!("{} not found in firmware inventory", name));
    }
    if state.unresolved_members > 0 {
        ctx.warn(&format!(
            "{} inventory member(s) could not be read",
            state.unresolved_members
        ));
    }

    let pairs = vec![
        ("Name", state.name.clone()),
        ("Found", state.found.to_string()),
        ("Version", or_dash(state.version.as_deref())),
        ("ID", or_dash(state.identifier.as_deref())),
        ("Description", or_dash(state.description.as_deref())),
    ];
    ctx.print_kv(&pairs);
    Ok(())
}
