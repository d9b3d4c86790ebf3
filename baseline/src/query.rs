/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::{Context, Result};
use async_trait::async_trait;
use common::error::Invariant;
use common::types::*;
use entity::build::{BuildConclusion, BuildMode, BuildType, JobStatus};
use entity::build_review::ReviewState;
use entity::{build_review, screenshot, screenshot_bucket};
use sea_orm::sea_query::Query;
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
};
use std::collections::HashMap;
use uuid::Uuid;

/// Whether a base candidate must have been approved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalFilter {
    Any,
    Approved,
}

/// A diff of a build with both of its screenshots loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildDiff {
    pub diff: MScreenshotDiff,
    pub base: Option<MScreenshot>,
    pub compare: Option<MScreenshot>,
}

/// Read side of base resolution. Every method is a plain read without locking.
#[async_trait]
pub trait BaseStore: Send + Sync {
    /// Bucket uploaded for `commit`, or by a build whose pull request head is `commit`.
    async fn base_bucket_for_commit(
        &self,
        build: &MBuild,
        commit: &str,
        approval: ApprovalFilter,
    ) -> Result<Option<MScreenshotBucket>>;

    /// Reference bucket of the first sha that has one. `shas` are nearest ancestor first.
    async fn bucket_from_commits(
        &self,
        shas: &[String],
        build: &MBuild,
    ) -> Result<Option<MScreenshotBucket>>;

    /// Most recent other approved ci build on the compare branch, with its compare bucket.
    async fn last_approved_build(
        &self,
        build: &MBuild,
        compare_bucket: &MScreenshotBucket,
    ) -> Result<Option<(MBuild, MScreenshotBucket)>>;

    /// Compare bucket of the newest merge queue build without changes created after `base_bucket`.
    async fn recently_merged_bucket(
        &self,
        build: &MBuild,
        compare_bucket: &MScreenshotBucket,
        base_bucket: &MScreenshotBucket,
    ) -> Result<Option<MScreenshotBucket>>;

    async fn bucket_screenshots(&self, bucket: Uuid) -> Result<Vec<MScreenshot>>;

    async fn build_diffs(&self, build: Uuid) -> Result<Vec<BuildDiff>>;
}

/// Newest submitted review decides. Drafts never count.
pub fn last_submitted_review(reviews: &[MBuildReview]) -> Option<&MBuildReview> {
    reviews
        .iter()
        .filter(|review| review.is_submitted())
        .max_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
}

pub fn is_eligible_base(
    build_type: Option<BuildType>,
    reviews: &[MBuildReview],
    approval: ApprovalFilter,
) -> bool {
    match approval {
        ApprovalFilter::Any => true,
        ApprovalFilter::Approved => match build_type {
            Some(BuildType::Reference) => true,
            Some(BuildType::Check) => last_submitted_review(reviews)
                .is_some_and(|review| review.state == ReviewState::Approved),
            Some(BuildType::Orphan) | None => false,
        },
    }
}

/// Lowest rank in `shas` wins; on equal rank the newest bucket wins.
pub fn pick_nearest_bucket(
    shas: &[String],
    candidates: Vec<MScreenshotBucket>,
) -> Option<MScreenshotBucket> {
    let ranks: HashMap<&str, usize> = shas
        .iter()
        .enumerate()
        .rev()
        .map(|(rank, sha)| (sha.as_str(), rank))
        .collect();

    candidates
        .into_iter()
        .filter_map(|bucket| ranks.get(bucket.commit.as_str()).map(|rank| (*rank, bucket)))
        .min_by(|(rank_a, a), (rank_b, b)| rank_a.cmp(rank_b).then(b.id.cmp(&a.id)))
        .map(|(_, bucket)| bucket)
}

pub struct DatabaseBaseStore<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> DatabaseBaseStore<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    fn expect_bucket(build: MBuild, bucket: Option<MScreenshotBucket>) -> Result<(MBuild, MScreenshotBucket)> {
        match bucket {
            Some(bucket) => Ok((build, bucket)),
            None => Err(Invariant::MissingRelation {
                entity: "build",
                relation: "compare_screenshot_bucket",
                id: build.id,
            }
            .into()),
        }
    }
}

#[async_trait]
impl BaseStore for DatabaseBaseStore<'_> {
    async fn base_bucket_for_commit(
        &self,
        build: &MBuild,
        commit: &str,
        approval: ApprovalFilter,
    ) -> Result<Option<MScreenshotBucket>> {
        let candidates = EBuild::find()
            .find_also_related(screenshot_bucket::Entity)
            .filter(CBuild::Project.eq(build.project))
            .filter(CBuild::Name.eq(build.name.as_str()))
            .filter(CBuild::JobStatus.eq(JobStatus::Complete))
            .filter(CScreenshotBucket::Complete.eq(true))
            .filter(
                Condition::any()
                    .add(CScreenshotBucket::Commit.eq(commit))
                    .add(CBuild::PrHeadCommit.eq(commit)),
            )
            .order_by_desc(CScreenshotBucket::Id)
            .all(self.db)
            .await
            .context("Failed to query base bucket candidates")?;

        if candidates.is_empty() {
            return Ok(None);
        }

        let reviews = if approval == ApprovalFilter::Approved {
            let ids = candidates.iter().map(|(build, _)| build.id).collect::<Vec<_>>();
            EBuildReview::find()
                .filter(CBuildReview::Build.is_in(ids))
                .all(self.db)
                .await
                .context("Failed to query build reviews")?
        } else {
            vec![]
        };

        for (candidate, bucket) in candidates {
            let candidate_reviews = reviews
                .iter()
                .filter(|review| review.build == candidate.id)
                .cloned()
                .collect::<Vec<_>>();

            if is_eligible_base(candidate.build_type, &candidate_reviews, approval) {
                let (_, bucket) = Self::expect_bucket(candidate, bucket)?;
                return Ok(Some(bucket));
            }
        }

        Ok(None)
    }

    async fn bucket_from_commits(
        &self,
        shas: &[String],
        build: &MBuild,
    ) -> Result<Option<MScreenshotBucket>> {
        if shas.is_empty() {
            return Ok(None);
        }

        let candidates = EBuild::find()
            .find_also_related(screenshot_bucket::Entity)
            .filter(CBuild::Project.eq(build.project))
            .filter(CBuild::Name.eq(build.name.as_str()))
            .filter(CBuild::Mode.eq(build.mode))
            .filter(CBuild::JobStatus.eq(JobStatus::Complete))
            .filter(CBuild::BuildType.eq(BuildType::Reference))
            .filter(CScreenshotBucket::Complete.eq(true))
            .filter(CScreenshotBucket::Commit.is_in(shas.iter().map(String::as_str)))
            .all(self.db)
            .await
            .context("Failed to query ancestor buckets")?;

        let buckets = candidates
            .into_iter()
            .filter_map(|(_, bucket)| bucket)
            .collect::<Vec<_>>();

        Ok(pick_nearest_bucket(shas, buckets))
    }

    async fn last_approved_build(
        &self,
        build: &MBuild,
        compare_bucket: &MScreenshotBucket,
    ) -> Result<Option<(MBuild, MScreenshotBucket)>> {
        let approved = Query::select()
            .column(CBuildReview::Build)
            .from(build_review::Entity)
            .and_where(CBuildReview::State.eq(ReviewState::Approved))
            .to_owned();

        let mut query = EBuild::find()
            .find_also_related(screenshot_bucket::Entity)
            .filter(CBuild::Project.eq(build.project))
            .filter(CBuild::Name.eq(build.name.as_str()))
            .filter(CBuild::Mode.eq(BuildMode::Ci))
            .filter(CBuild::JobStatus.eq(JobStatus::Complete))
            .filter(CBuild::Id.ne(build.id))
            .filter(CScreenshotBucket::Branch.eq(compare_bucket.branch.as_str()))
            .filter(CBuild::Id.in_subquery(approved));

        if let Some(pull_request) = build.pull_request {
            query = query.filter(CBuild::PullRequest.eq(pull_request));
        }

        let found = query
            .order_by_desc(CBuild::Id)
            .one(self.db)
            .await
            .context("Failed to query last approved build")?;

        found
            .map(|(build, bucket)| Self::expect_bucket(build, bucket))
            .transpose()
    }

    async fn recently_merged_bucket(
        &self,
        build: &MBuild,
        compare_bucket: &MScreenshotBucket,
        base_bucket: &MScreenshotBucket,
    ) -> Result<Option<MScreenshotBucket>> {
        let found = EBuild::find()
            .find_also_related(screenshot_bucket::Entity)
            .filter(CBuild::Project.eq(build.project))
            .filter(CBuild::Name.eq(build.name.as_str()))
            .filter(CBuild::Mode.eq(BuildMode::Ci))
            .filter(CBuild::JobStatus.eq(JobStatus::Complete))
            .filter(CBuild::Id.ne(build.id))
            .filter(CScreenshotBucket::Branch.eq(compare_bucket.branch.as_str()))
            .filter(CBuild::MergeQueue.eq(true))
            .filter(CBuild::CreatedAt.gt(base_bucket.created_at))
            .filter(CBuild::Conclusion.eq(BuildConclusion::NoChanges))
            .order_by_desc(CBuild::Id)
            .one(self.db)
            .await
            .context("Failed to query recently merged build")?;

        Ok(found
            .map(|(build, bucket)| Self::expect_bucket(build, bucket))
            .transpose()?
            .map(|(_, bucket)| bucket))
    }

    async fn bucket_screenshots(&self, bucket: Uuid) -> Result<Vec<MScreenshot>> {
        EScreenshot::find()
            .filter(CScreenshot::Bucket.eq(bucket))
            .order_by_asc(CScreenshot::Name)
            .all(self.db)
            .await
            .with_context(|| format!("Failed to load screenshots of bucket {}", bucket))
    }

    async fn build_diffs(&self, build: Uuid) -> Result<Vec<BuildDiff>> {
        let diffs = EScreenshotDiff::find()
            .find_also_related(screenshot::Entity)
            .filter(CScreenshotDiff::Build.eq(build))
            .order_by_asc(CScreenshotDiff::Id)
            .all(self.db)
            .await
            .with_context(|| format!("Failed to load diffs of build {}", build))?;

        let base_ids = diffs
            .iter()
            .filter_map(|(diff, _)| diff.base_screenshot)
            .collect::<Vec<_>>();

        let bases = if base_ids.is_empty() {
            HashMap::new()
        } else {
            EScreenshot::find()
                .filter(CScreenshot::Id.is_in(base_ids))
                .all(self.db)
                .await
                .with_context(|| format!("Failed to load base screenshots of build {}", build))?
                .into_iter()
                .map(|screenshot| (screenshot.id, screenshot))
                .collect::<HashMap<_, _>>()
        };

        Ok(diffs
            .into_iter()
            .map(|(diff, compare)| BuildDiff {
                base: diff.base_screenshot.and_then(|id| bases.get(&id).cloned()),
                diff,
                compare,
            })
            .collect())
    }
}
