//! Forget command - drop a stored record without touching the device

use anyhow::Result;

use crate::output::OutputContext;
use crate::state::StateStore;

pub fn forget(name: &str, store: &mut StateStore, ctx: &OutputContext) -> Result<()> {
    match store.remove(name) {
        Some(record) => {
            store.save()?;
            ctx.success(&format!(
                "Forgot {} (version {}); device firmware unchanged",
                record.name, record.version
            ));
        }
        None => ctx.info(&format!("No record for {}", name)),
    }
    Ok(())
}
