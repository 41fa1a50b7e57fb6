//! Store selection shared by every action.

use anyhow::{anyhow, Context, Result};
use secrecy::{ExposeSecret, SecretString};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tracing::{debug, warn};
use url::Url;

use crate::access::{CodeStore, MemoryCodeStore, PgCodeStore};

#[derive(Debug)]
pub enum StoreTarget {
    Postgres {
        dsn: String,
        password: Option<SecretString>,
    },
    Memory,
}

impl StoreTarget {
    /// Connect to the configured store; Postgres gets its schema applied.
    ///
    /// # Errors
    /// Returns an error if the DSN is invalid, the database is unreachable, or
    /// the schema cannot be applied.
    pub async fn open(self) -> Result<Arc<dyn CodeStore>> {
        match self {
            Self::Memory => {
                warn!("using the in-memory store; codes and sessions are lost on exit");
                Ok(Arc::new(MemoryCodeStore::new()))
            }
            Self::Postgres { dsn, password } => {
                let dsn = with_password(&dsn, password.as_ref())?;
                let pool = PgPoolOptions::new()
                    .min_connections(1)
                    .max_connections(5)
                    .acquire_timeout(Duration::from_secs(5))
                    .max_lifetime(Duration::from_secs(60 * 2))
                    .test_before_acquire(true)
                    .connect(&dsn)
                    .await
                    .context("Failed to connect to database")?;
                let store = PgCodeStore::new(pool);
                store
                    .apply_schema()
                    .await
                    .context("Failed to apply database schema")?;
                debug!("database schema applied");
                Ok(Arc::new(store))
            }
        }
    }
}

/// Inject `password` into the DSN, keeping any user name already present.
pub(crate) fn with_password(dsn: &str, password: Option<&SecretString>) -> Result<String> {
    let Some(password) = password else {
        return Ok(dsn.to_string());
    };
    let mut dsn = Url::parse(dsn).context("Invalid database DSN")?;
    dsn.set_password(Some(password.expose_secret()))
        .map_err(|()| anyhow!("Error setting password"))?;
    Ok(dsn.to_string())
}
