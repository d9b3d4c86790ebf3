/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

pub mod bucket_merge;
pub mod ci;
pub mod merge_queue;
pub mod query;
pub mod strategy;

use anyhow::{Context, Result};
use common::error::Invariant;
use common::types::*;
use entity::build::{BaseBranchResolvedFrom, BuildMode, BuildType};
use sea_orm::ActiveValue::{Set, Unchanged};
use sea_orm::{ActiveModelTrait, EntityTrait};
use serde::Serialize;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use ci::{AutoApproval, CiBaseArgs, get_ci_base};
use merge_queue::get_merge_queue_base;
use query::{BaseStore, DatabaseBaseStore};
use strategy::StrategyRegistry;

/// Synthesized base, never written back.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VirtualScreenshotBucket {
    pub screenshots: Vec<MScreenshot>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BaseBucket {
    Persisted(MScreenshotBucket),
    Virtual(VirtualScreenshotBucket),
}

impl BaseBucket {
    pub fn persisted(&self) -> Option<&MScreenshotBucket> {
        match self {
            BaseBucket::Persisted(bucket) => Some(bucket),
            BaseBucket::Virtual(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BaseResolution {
    pub base_bucket: Option<BaseBucket>,
    pub base_branch: Option<String>,
    pub base_branch_resolved_from: Option<BaseBranchResolvedFrom>,
}

impl BaseResolution {
    /// A shortcut answer that did not come from a branch.
    pub fn unbranched(bucket: BaseBucket) -> Self {
        Self {
            base_bucket: Some(bucket),
            base_branch: None,
            base_branch_resolved_from: None,
        }
    }
}

pub fn get_build_type(
    compare_bucket: &MScreenshotBucket,
    resolution: &BaseResolution,
    auto_approval: &AutoApproval,
) -> BuildType {
    if auto_approval.check(&compare_bucket.branch) {
        BuildType::Reference
    } else if resolution.base_bucket.is_none() {
        BuildType::Orphan
    } else {
        BuildType::Check
    }
}

/// Resolves the base of a build through the ci or merge queue resolver.
pub async fn find_build_base(
    store: &dyn BaseStore,
    registry: &StrategyRegistry,
    args: CiBaseArgs<'_>,
) -> Result<BaseResolution> {
    let strategy = registry.find(args.project);

    if args.build.merge_queue {
        get_merge_queue_base(store, strategy, args).await
    } else {
        get_ci_base(store, strategy, args).await
    }
}

/// Resolves the base of a ci build and records base bucket, branch, provenance and type on it.
#[instrument(skip(state, registry), fields(build_id = %build_id))]
pub async fn resolve_build_base(
    state: &ServerState,
    registry: &StrategyRegistry,
    build_id: Uuid,
) -> Result<BaseResolution> {
    let build = EBuild::find_by_id(build_id)
        .one(&state.db)
        .await
        .context("Failed to query build")?
        .ok_or(Invariant::NotFound {
            entity: "build",
            id: build_id,
        })?;

    if build.mode != BuildMode::Ci {
        debug!("Build is not a ci build, skipping base resolution");
        return Ok(BaseResolution::default());
    }

    let project = EProject::find_by_id(build.project)
        .one(&state.db)
        .await
        .context("Failed to query project")?
        .ok_or(Invariant::MissingRelation {
            entity: "build",
            relation: "project",
            id: build.id,
        })?;

    let compare_bucket = EScreenshotBucket::find_by_id(build.compare_screenshot_bucket)
        .one(&state.db)
        .await
        .context("Failed to query compare bucket")?
        .ok_or(Invariant::MissingRelation {
            entity: "build",
            relation: "compare_screenshot_bucket",
            id: build.id,
        })?;

    let pull_request = match build.pull_request {
        Some(id) => EPullRequest::find_by_id(id)
            .one(&state.db)
            .await
            .context("Failed to query pull request")?,
        None => None,
    };

    let auto_approval = AutoApproval::new(&project, &build);
    let store = DatabaseBaseStore::new(&state.db);

    let resolution = find_build_base(
        &store,
        registry,
        CiBaseArgs {
            build: &build,
            compare_bucket: &compare_bucket,
            project: &project,
            pull_request: pull_request.as_ref(),
            auto_approval: &auto_approval,
        },
    )
    .await?;

    let build_type = get_build_type(&compare_bucket, &resolution, &auto_approval);
    let base_bucket_id = resolution
        .base_bucket
        .as_ref()
        .and_then(BaseBucket::persisted)
        .map(|bucket| bucket.id);

    let active_build = ABuild {
        id: Unchanged(build.id),
        base_screenshot_bucket: Set(base_bucket_id),
        base_branch: Set(resolution.base_branch.clone()),
        base_branch_resolved_from: Set(resolution.base_branch_resolved_from),
        build_type: Set(Some(build_type)),
        ..Default::default()
    };

    active_build
        .update(&state.db)
        .await
        .context("Failed to record build base")?;

    info!(
        base_bucket_id = ?base_bucket_id,
        base_branch = ?resolution.base_branch,
        build_type = ?build_type,
        "Resolved build base"
    );

    Ok(resolution)
}
