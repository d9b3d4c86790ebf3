/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::Result;
use common::error::Invariant;
use common::input::branch_matches_glob;
use common::types::*;
use entity::build::BaseBranchResolvedFrom;
use tracing::{debug, info};

use super::query::{ApprovalFilter, BaseStore};
use super::strategy::{MergeBaseStrategy, StrategyContext};
use super::{BaseBucket, BaseResolution};

/// Decides whether builds on a branch are trusted without review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoApproval {
    is_pull_request: bool,
    glob: String,
}

impl AutoApproval {
    pub fn new(project: &MProject, build: &MBuild) -> Self {
        Self {
            is_pull_request: build.pull_request.is_some(),
            glob: project.auto_approved_branch_glob().to_string(),
        }
    }

    pub fn check(&self, branch: &str) -> bool {
        !self.is_pull_request && branch_matches_glob(&self.glob, branch)
    }
}

pub struct CiBaseArgs<'a> {
    pub build: &'a MBuild,
    pub compare_bucket: &'a MScreenshotBucket,
    pub project: &'a MProject,
    pub pull_request: Option<&'a MPullRequest>,
    pub auto_approval: &'a AutoApproval,
}

/// Branch to compare against and where it came from.
pub fn resolve_base_branch(
    build: &MBuild,
    project: &MProject,
    pull_request: Option<&MPullRequest>,
) -> (Option<String>, Option<BaseBranchResolvedFrom>) {
    if let Some(branch) = &build.base_branch {
        return (Some(branch.clone()), build.base_branch_resolved_from);
    }

    // A bare base commit has no branch to report.
    if build.base_commit.is_some() {
        return (None, None);
    }

    if let Some(base_ref) = pull_request.and_then(|pr| pr.base_ref.clone()) {
        return (Some(base_ref), Some(BaseBranchResolvedFrom::PullRequest));
    }

    (
        Some(project.default_base_branch.clone()),
        Some(BaseBranchResolvedFrom::Project),
    )
}

async fn parent_commits(
    strategy: &dyn MergeBaseStrategy,
    args: &CiBaseArgs<'_>,
    ctx: &StrategyContext,
    sha: &str,
) -> Result<Vec<String>> {
    match &args.build.parent_commits {
        Some(cached) => Ok(cached.clone()),
        None => {
            strategy
                .list_parent_commit_shas(args.project, ctx, sha)
                .await
        }
    }
}

async fn search_ancestors(
    store: &dyn BaseStore,
    strategy: &dyn MergeBaseStrategy,
    args: &CiBaseArgs<'_>,
    ctx: &StrategyContext,
    sha: &str,
) -> Result<Option<MScreenshotBucket>> {
    let shas = parent_commits(strategy, args, ctx, sha).await?;
    let ancestors = shas.get(1..).unwrap_or_default();
    debug!(sha, ancestors = ancestors.len(), "Searching ancestors for a base bucket");
    store.bucket_from_commits(ancestors, args.build).await
}

/// Base bucket of a ci build from its branch, pull request and commit ancestry.
pub async fn get_ci_base(
    store: &dyn BaseStore,
    strategy: Option<&dyn MergeBaseStrategy>,
    args: CiBaseArgs<'_>,
) -> Result<BaseResolution> {
    let build = args.build;
    let (base_branch, base_branch_resolved_from) =
        resolve_base_branch(build, args.project, args.pull_request);

    let resolution = |bucket: Option<MScreenshotBucket>| BaseResolution {
        base_bucket: bucket.map(BaseBucket::Persisted),
        base_branch: base_branch.clone(),
        base_branch_resolved_from,
    };

    let Some(strategy) = strategy else {
        info!(build_id = %build.id, "No merge base strategy for project");
        return match &build.base_commit {
            Some(commit) => {
                let bucket = store
                    .base_bucket_for_commit(build, commit, ApprovalFilter::Any)
                    .await?;
                Ok(resolution(bucket))
            }
            None => Ok(resolution(None)),
        };
    };

    let head = args.compare_bucket.commit.as_str();

    let Some(ctx) = strategy.get_context(args.project).await? else {
        info!(build_id = %build.id, strategy = strategy.name(), "Merge base strategy unavailable");
        return Ok(resolution(None));
    };

    let merge_base = match (&build.base_commit, &base_branch) {
        (Some(commit), _) => Some(commit.clone()),
        (None, Some(branch)) => {
            strategy
                .get_merge_base_commit_sha(args.project, &ctx, branch, head, build)
                .await?
        }
        (None, None) => {
            return Err(Invariant::Violated(format!(
                "build {} has neither a base branch nor a base commit",
                build.id
            ))
            .into());
        }
    };

    let Some(merge_base) = merge_base else {
        info!(build_id = %build.id, head, "No merge base found");
        return Ok(resolution(None));
    };

    let auto_approved = base_branch
        .as_deref()
        .is_some_and(|branch| args.auto_approval.check(branch));

    // Pushed straight onto the base branch: comparing with itself is meaningless.
    if merge_base == head {
        debug!(build_id = %build.id, "Merge base is head, walking ancestors");
        let bucket = search_ancestors(store, strategy, &args, &ctx, &merge_base).await?;
        return Ok(resolution(bucket));
    }

    let approval = if auto_approved {
        ApprovalFilter::Any
    } else {
        ApprovalFilter::Approved
    };

    if let Some(bucket) = store
        .base_bucket_for_commit(build, &merge_base, approval)
        .await?
    {
        debug!(build_id = %build.id, bucket_id = %bucket.id, "Found bucket for merge base");
        return Ok(resolution(Some(bucket)));
    }

    let bucket = search_ancestors(store, strategy, &args, &ctx, &merge_base).await?;
    Ok(resolution(bucket))
}
