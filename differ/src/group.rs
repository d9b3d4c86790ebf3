/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::{Context, Result};
use common::consts::DIFF_GROUP_LOCK;
use common::lock::with_lock;
use common::types::*;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use tracing::debug;
use uuid::Uuid;

/// Bounds the size of each update while the group lock is held.
pub const GROUP_CHUNK_SIZE: usize = 50;

/// Stamps every ungrouped diff of the build that shares the fingerprint.
/// Returns how many rows were stamped.
pub async fn group_similar_diffs(
    state: &ServerState,
    build: Uuid,
    file_key: &str,
    fingerprint: &str,
) -> Result<u64> {
    with_lock(state.lock.as_ref(), &[DIFF_GROUP_LOCK, file_key], move || async move {
        let similar = EScreenshotDiff::find()
            .filter(CScreenshotDiff::Build.eq(build))
            .filter(CScreenshotDiff::Fingerprint.eq(fingerprint))
            .all(&state.db)
            .await
            .context("Failed to query similar diffs")?;

        if similar.len() < 2 {
            return Ok(0);
        }

        let ungrouped: Vec<Uuid> = similar
            .iter()
            .filter(|diff| diff.group.is_none())
            .map(|diff| diff.id)
            .collect();

        let mut stamped = 0;
        for chunk in ungrouped.chunks(GROUP_CHUNK_SIZE) {
            let result = EScreenshotDiff::update_many()
                .col_expr(CScreenshotDiff::Group, Expr::value(fingerprint))
                .filter(CScreenshotDiff::Id.is_in(chunk.iter().copied()))
                .exec(&state.db)
                .await
                .context("Failed to group diffs")?;
            stamped += result.rows_affected;
        }

        debug!(build_id = %build, stamped, "Grouped similar diffs");
        Ok(stamped)
    })
    .await
}
