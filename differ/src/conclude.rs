/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::{Context, Result};
use async_trait::async_trait;
use common::types::*;
use entity::build::{BuildConclusion, JobStatus};
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use std::sync::Arc;
use tracing::info;

/// Owns the conclusion of a build. Called after every finished diff.
#[async_trait]
pub trait BuildConcluder: Send + Sync {
    async fn conclude(&self, build: &MBuild) -> Result<Option<BuildConclusion>>;
}

/// None while any diff is still running.
pub fn derive_conclusion(diffs: &[MScreenshotDiff]) -> Option<BuildConclusion> {
    if diffs
        .iter()
        .any(|diff| diff.job_status != JobStatus::Complete)
    {
        return None;
    }

    let changed = diffs.iter().any(|diff| {
        diff.base_screenshot.is_none()
            || diff.compare_screenshot.is_none()
            || (diff.has_change() && !diff.ignored)
    });

    if changed {
        Some(BuildConclusion::ChangesDetected)
    } else {
        Some(BuildConclusion::NoChanges)
    }
}

pub struct DatabaseConcluder {
    state: Arc<ServerState>,
}

impl DatabaseConcluder {
    pub fn new(state: Arc<ServerState>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl BuildConcluder for DatabaseConcluder {
    async fn conclude(&self, build: &MBuild) -> Result<Option<BuildConclusion>> {
        if build.conclusion.is_some() {
            return Ok(build.conclusion);
        }

        let diffs = EScreenshotDiff::find()
            .filter(CScreenshotDiff::Build.eq(build.id))
            .all(&self.state.db)
            .await
            .context("Failed to query build diffs")?;

        let Some(conclusion) = derive_conclusion(&diffs) else {
            return Ok(None);
        };

        let result = EBuild::update_many()
            .col_expr(CBuild::Conclusion, Expr::value(conclusion))
            .filter(CBuild::Id.eq(build.id))
            .filter(CBuild::Conclusion.is_null())
            .exec(&self.state.db)
            .await
            .context("Failed to record build conclusion")?;

        if result.rows_affected > 0 {
            info!(build_id = %build.id, conclusion = %conclusion, "Concluded build");
        }

        Ok(Some(conclusion))
    }
}
