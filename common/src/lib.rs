/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

pub mod consts;
pub mod database;
pub mod error;
pub mod input;
pub mod lock;
pub mod storage;
pub mod types;

use anyhow::{Context, Result};
use database::{connect_db, connect_lock_db};
use lock::PgAdvisoryMutex;
use std::sync::Arc;
use std::time::Duration;
use storage::FsObjectStore;
use types::*;

pub async fn init_state(cli: Cli) -> Result<Arc<ServerState>> {
    tracing::info!(storage = %cli.storage_path, "Starting Shotline diff worker");

    let db = connect_db(&cli).await?;
    let storage = FsObjectStore::new(&cli.storage_path, &cli.storage_bucket)
        .await
        .context("Failed to open object store")?;
    let lock_db = connect_lock_db(&cli).await?;
    let lock = PgAdvisoryMutex::new(lock_db, Duration::from_secs(cli.lock_timeout));

    Ok(Arc::new(ServerState {
        db,
        cli,
        storage: Arc::new(storage),
        lock: Arc::new(lock),
    }))
}
