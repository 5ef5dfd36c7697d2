//! Apply command - bring firmware to a requested version

use std::time::Duration;

use anyhow::{Context, Result};
use bmcfw_client::firmware::{FirmwareUpdater, UpdateRequest};
use indicatif::{ProgressBar, ProgressStyle};

use crate::output::{or_dash, OutputContext};
use crate::state::{AppliedRecord, StateStore};

/// Apply a firmware request and record the outcome
pub async fn apply(
    updater: &FirmwareUpdater,
    request: &UpdateRequest,
    store: &mut StateStore,
    ctx: &OutputContext,
) -> Result<()> {
    ctx.info(&format!(
        "Applying {} {} from {}...",
        request.name,
        request.version,
        request.local_file.display()
    ));

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .context("Invalid progress template")?,
    );
    spinner.set_message("Checking inventory and pushing firmware...");
    if ctx.quiet {
        spinner.set_draw_target(indicatif::ProgressDrawTarget::hidden());
    }
    spinner.enable_steady_tick(Duration::from_millis(100));

    let result = updater.apply(request).await;
    spinner.finish_and_clear();

    let outcome = result.with_context(|| format!("Failed to apply {}", request.name))?;

    if outcome.unresolved_members > 0 {
        ctx.warn(&format!(
            "{} inventory member(s) could not be read; the decision may be incomplete",
            outcome.unresolved_members
        ));
    }

    store.put(AppliedRecord::from_outcome(request, &outcome));
    store
        .save()
        .with_context(|| format!("Failed to save state to {}", store.path().display()))?;

    if outcome.skipped {
        ctx.success(&format!(
            "{} already at version {}, nothing to do",
            request.name, request.version
        ));
    } else {
        ctx.success(&format!(
            "Firmware update for {} {} initiated",
            request.name, request.version
        ));
    }

    let pairs = vec![
        ("Name", request.name.clone()),
        ("Version", request.version.clone()),
        ("ID", or_dash(outcome.resolved_identifier.as_deref())),
        ("Skipped", outcome.skipped.to_string()),
        ("Task", or_dash(outcome.task_reference.as_deref())),
    ];
    ctx.print_kv(&pairs);

    Ok(())
}
