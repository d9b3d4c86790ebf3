/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::{Context, Result};
use chrono::{TimeDelta, Utc};
use common::database::requeue_stale_diffs;
use common::error::is_unretryable;
use common::types::*;
use entity::build::JobStatus;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::{self, MissedTickBehavior};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::Collaborators;
use super::compute::compute_screenshot_diff;

/// Pending rows inspected per claim attempt.
const CLAIM_BATCH: u64 = 10;

/// Flips the oldest claimable diff to `progress`. The conditional update makes the claim exclusive.
/// A diff handed back less than `retry_delay` ago is not claimable yet.
pub async fn claim_next_diff(
    db: &DatabaseConnection,
    retry_delay: Duration,
) -> Result<Option<MScreenshotDiff>> {
    let now = Utc::now().naive_utc();
    let retry_before =
        now - TimeDelta::from_std(retry_delay).context("Retry delay out of range")?;

    let candidates = EScreenshotDiff::find()
        .filter(CScreenshotDiff::JobStatus.eq(JobStatus::Pending))
        .filter(
            Condition::any()
                .add(CScreenshotDiff::ClaimedAt.is_null())
                .add(CScreenshotDiff::ClaimedAt.lte(retry_before)),
        )
        .order_by_asc(CScreenshotDiff::CreatedAt)
        .limit(CLAIM_BATCH)
        .all(db)
        .await
        .context("Failed to query pending diffs")?;

    for candidate in candidates {
        let result = EScreenshotDiff::update_many()
            .col_expr(CScreenshotDiff::JobStatus, Expr::value(JobStatus::Progress))
            .col_expr(CScreenshotDiff::ClaimedAt, Expr::value(now))
            .col_expr(
                CScreenshotDiff::Attempts,
                Expr::col(CScreenshotDiff::Attempts).add(1),
            )
            .filter(CScreenshotDiff::Id.eq(candidate.id))
            .filter(CScreenshotDiff::JobStatus.eq(JobStatus::Pending))
            .exec(db)
            .await
            .context("Failed to claim diff")?;

        if result.rows_affected == 1 {
            return Ok(Some(MScreenshotDiff {
                job_status: JobStatus::Progress,
                attempts: candidate.attempts + 1,
                claimed_at: Some(now),
                ..candidate
            }));
        }
    }

    Ok(None)
}

/// Hands a claimed diff back. Only rows still in `progress` are touched.
/// The release time is recorded so the retry delay counts from here.
pub async fn release_claim(db: &DatabaseConnection, diff_id: Uuid, status: JobStatus) -> Result<()> {
    EScreenshotDiff::update_many()
        .col_expr(CScreenshotDiff::JobStatus, Expr::value(status))
        .col_expr(CScreenshotDiff::ClaimedAt, Expr::value(Utc::now().naive_utc()))
        .filter(CScreenshotDiff::Id.eq(diff_id))
        .filter(CScreenshotDiff::JobStatus.eq(JobStatus::Progress))
        .exec(db)
        .await
        .context("Failed to release diff claim")?;

    Ok(())
}

/// Status a failed diff is handed back with.
pub fn failed_status(unretryable: bool, attempts: i32, max_attempts: i32) -> JobStatus {
    if unretryable || attempts >= max_attempts {
        JobStatus::Error
    } else {
        JobStatus::Pending
    }
}

pub async fn schedule_diff_loop(state: Arc<ServerState>, collaborators: Collaborators) {
    let _guard = state
        .cli
        .sentry_dsn
        .as_deref()
        .map(sentry::init);

    let semaphore = Arc::new(Semaphore::new(state.cli.max_concurrent_diffs));
    let mut interval = time::interval(Duration::from_secs(state.cli.poll_interval));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let retry_delay = Duration::from_secs(state.cli.retry_delay);
    let stale_timeout = Duration::from_secs(state.cli.stale_claim_timeout);

    info!(
        max_concurrent_diffs = state.cli.max_concurrent_diffs,
        max_diff_attempts = state.cli.max_diff_attempts,
        "Diff scheduler loop started"
    );

    loop {
        let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
            break;
        };

        match claim_next_diff(&state.db, retry_delay).await {
            Ok(Some(diff)) => {
                let state = Arc::clone(&state);
                let collaborators = collaborators.clone();
                tokio::spawn(async move {
                    schedule_diff(state, collaborators, diff).await;
                    drop(permit);
                });
            }
            Ok(None) => {
                drop(permit);

                if let Err(e) =
                    requeue_stale_diffs(&state.db, stale_timeout, state.cli.max_diff_attempts)
                        .await
                {
                    error!(error = %e, "Failed to requeue stale diffs");
                }

                interval.tick().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to claim next diff");
                drop(permit);
                interval.tick().await;
            }
        }
    }
}

#[instrument(skip(state, collaborators, diff), fields(diff_id = %diff.id, build_id = %diff.build, attempt = diff.attempts))]
pub async fn schedule_diff(state: Arc<ServerState>, collaborators: Collaborators, diff: MScreenshotDiff) {
    let Err(e) = compute_screenshot_diff(&state, &collaborators, diff.id).await else {
        return;
    };

    let unretryable = is_unretryable(&e);
    let status = failed_status(unretryable, diff.attempts, state.cli.max_diff_attempts);
    error!(error = ?e, unretryable, status = ?status, "Failed to compute screenshot diff");

    if let Err(e) = release_claim(&state.db, diff.id, status).await {
        warn!(error = %e, "Failed to hand back screenshot diff");
    }
}
