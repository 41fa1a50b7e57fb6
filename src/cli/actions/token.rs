use anyhow::{Context, Result};
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

use crate::access::{AccessConfig, DemoAccess, MemoryCodeStore};

#[derive(Debug)]
pub struct Args {
    pub access: AccessConfig,
}

/// Mint a static demo token and print it as JSON.
///
/// The token is self-contained, so no store is opened.
///
/// # Errors
/// Returns an error if the random source fails.
pub fn execute(args: &Args) -> Result<()> {
    if !args.access.allow_bypass() {
        warn!("static demo tokens are only accepted by servers started with --allow-bypass");
    }
    let access = DemoAccess::new(Arc::new(MemoryCodeStore::new()), args.access.clone());
    let session = access
        .issuer()
        .issue_static()
        .context("Failed to mint static demo token")?;
    println!(
        "{}",
        json!({
            "token": session.token,
            "kind": session.kind,
            "expires_at": session.expires_at,
        })
    );
    Ok(())
}
