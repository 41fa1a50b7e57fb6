use anyhow::{Context, Result};
use chrono::Duration;
use serde_json::json;
use tracing::error;

use super::store::StoreTarget;
use crate::access::{AccessConfig, CreatedCode, DemoAccess};

#[derive(Debug)]
pub struct Args {
    pub store: StoreTarget,
    pub access: AccessConfig,
    pub description: Option<String>,
    pub expires_hours: i64,
    pub max_uses: i32,
}

/// Create one operator-issued code and print it as JSON on stdout.
///
/// # Errors
/// Returns an error if the store cannot be opened or the code cannot be written.
pub async fn execute(args: Args) -> Result<()> {
    let store = args.store.open().await?;
    let access = DemoAccess::new(store, args.access);

    match access
        .create_code(
            args.description,
            Duration::hours(args.expires_hours),
            Some(args.max_uses),
        )
        .await
    {
        Ok(code) => {
            println!("{}", serde_json::to_string(&CreatedCode::from(&code))?);
            Ok(())
        }
        Err(err) => {
            error!("Failed to create access code: {err}");
            println!("{}", json!({ "success": false, "error": err.to_string() }));
            Err(err).context("access code creation failed")
        }
    }
}
