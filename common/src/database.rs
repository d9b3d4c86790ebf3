/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::{Context, Result};
use chrono::{TimeDelta, Utc};
use entity::build::JobStatus;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, Condition, ConnectOptions, Database, DatabaseConnection, EntityTrait,
    QueryFilter,
};
use std::time::Duration;
use tracing::{info, warn};
use tracing::log::LevelFilter;

use super::types::*;

fn database_url(cli: &Cli) -> Result<String> {
    if let Some(file) = &cli.database_url_file {
        Ok(std::fs::read_to_string(file)
            .context("Failed to read database url from file")?
            .trim()
            .to_string())
    } else if let Some(url) = &cli.database_url {
        Ok(url.clone())
    } else {
        anyhow::bail!("No database url provided")
    }
}

fn connect_options(cli: &Cli, max_connections: u32) -> Result<ConnectOptions> {
    let mut opt = ConnectOptions::new(database_url(cli)?);

    // Only enable SQL logging at debug level
    if cli.log_level == "debug" {
        opt.sqlx_logging(true)
            .sqlx_logging_level(LevelFilter::Debug);
    } else {
        opt.sqlx_logging(false);
    }

    opt.max_connections(max_connections)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(8))
        .acquire_timeout(Duration::from_secs(8))
        .idle_timeout(Duration::from_secs(60))
        .max_lifetime(Duration::from_secs(300));

    Ok(opt)
}

pub async fn connect_db(cli: &Cli) -> Result<DatabaseConnection> {
    let max_connections = (cli.max_concurrent_diffs as u32 * 2).max(10);
    let db = Database::connect(connect_options(cli, max_connections)?)
        .await
        .context("Failed to connect to database")?;
    update_db(&db, cli).await.context("Failed to update database")?;
    Ok(db)
}

/// Separate pool for advisory lock transactions, which stay open for a whole critical section.
pub async fn connect_lock_db(cli: &Cli) -> Result<DatabaseConnection> {
    let max_connections = cli.max_concurrent_diffs as u32 + 1;
    Database::connect(connect_options(cli, max_connections)?)
        .await
        .context("Failed to connect lock pool")
}

pub async fn update_db(db: &DatabaseConnection, cli: &Cli) -> Result<u64> {
    requeue_stale_diffs(
        db,
        Duration::from_secs(cli.stale_claim_timeout),
        cli.max_diff_attempts,
    )
    .await
}

/// Diffs claimed longer than `stale_timeout` ago belong to a worker that died mid-flight.
/// They go back to the queue, or to `error` once their attempts are used up.
pub async fn requeue_stale_diffs(
    db: &DatabaseConnection,
    stale_timeout: Duration,
    max_attempts: i32,
) -> Result<u64> {
    let stale_before = Utc::now().naive_utc()
        - TimeDelta::from_std(stale_timeout).context("Stale claim timeout out of range")?;

    let stale = Condition::all()
        .add(CScreenshotDiff::JobStatus.eq(JobStatus::Progress))
        .add(
            Condition::any()
                .add(CScreenshotDiff::ClaimedAt.is_null())
                .add(CScreenshotDiff::ClaimedAt.lt(stale_before)),
        );

    let exhausted = EScreenshotDiff::update_many()
        .col_expr(CScreenshotDiff::JobStatus, Expr::value(JobStatus::Error))
        .filter(stale.clone())
        .filter(CScreenshotDiff::Attempts.gte(max_attempts))
        .exec(db)
        .await
        .context("Failed to fail exhausted diffs")?;

    if exhausted.rows_affected > 0 {
        warn!(count = exhausted.rows_affected, "Failed stale screenshot diffs out of attempts");
    }

    let requeued = EScreenshotDiff::update_many()
        .col_expr(CScreenshotDiff::JobStatus, Expr::value(JobStatus::Pending))
        .filter(stale)
        .exec(db)
        .await
        .context("Failed to requeue stale diffs")?;

    if requeued.rows_affected > 0 {
        info!(count = requeued.rows_affected, "Requeued stale screenshot diffs");
    }

    Ok(requeued.rows_affected)
}
