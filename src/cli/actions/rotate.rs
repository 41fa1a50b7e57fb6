use anyhow::{Context, Result};
use serde_json::json;
use tracing::error;

use super::store::StoreTarget;
use crate::access::{AccessConfig, DemoAccess, RotationSummary};

#[derive(Debug)]
pub struct Args {
    pub store: StoreTarget,
    pub access: AccessConfig,
}

/// Run one rotation and print its JSON summary on stdout.
///
/// Failures are printed as `{success: false, error}` before the error is returned,
/// so the scheduler log always has a JSON line.
///
/// # Errors
/// Returns an error if the store cannot be opened or the new code cannot be written.
pub async fn execute(args: Args) -> Result<()> {
    let store = args.store.open().await?;
    let access = DemoAccess::new(store, args.access);

    match access.rotate().await {
        Ok(rotation) => {
            let summary = RotationSummary::from(&rotation);
            println!("{}", serde_json::to_string(&summary)?);
            Ok(())
        }
        Err(err) => {
            error!("Failed to rotate access code: {err}");
            println!("{}", json!({ "success": false, "error": err.to_string() }));
            Err(err).context("access code rotation failed")
        }
    }
}
