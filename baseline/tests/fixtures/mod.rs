/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Shared builders and mocks for base resolution tests

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use baseline::query::{ApprovalFilter, BaseStore, BuildDiff};
use baseline::strategy::{MergeBaseStrategy, StrategyContext};
use chrono::{NaiveDate, NaiveDateTime};
use common::types::*;
use entity::build::{BuildMode, BuildType, JobStatus};
use mockall::mock;
use std::path::PathBuf;
use uuid::Uuid;

mock! {
    pub Store {}

    #[async_trait]
    impl BaseStore for Store {
        async fn base_bucket_for_commit(
            &self,
            build: &MBuild,
            commit: &str,
            approval: ApprovalFilter,
        ) -> Result<Option<MScreenshotBucket>>;
        async fn bucket_from_commits(
            &self,
            shas: &[String],
            build: &MBuild,
        ) -> Result<Option<MScreenshotBucket>>;
        async fn last_approved_build(
            &self,
            build: &MBuild,
            compare_bucket: &MScreenshotBucket,
        ) -> Result<Option<(MBuild, MScreenshotBucket)>>;
        async fn recently_merged_bucket(
            &self,
            build: &MBuild,
            compare_bucket: &MScreenshotBucket,
            base_bucket: &MScreenshotBucket,
        ) -> Result<Option<MScreenshotBucket>>;
        async fn bucket_screenshots(&self, bucket: Uuid) -> Result<Vec<MScreenshot>>;
        async fn build_diffs(&self, build: Uuid) -> Result<Vec<BuildDiff>>;
    }
}

mock! {
    pub Strategy {}

    #[async_trait]
    impl MergeBaseStrategy for Strategy {
        fn name(&self) -> &'static str;
        fn detect(&self, project: &MProject) -> bool;
        async fn get_context(&self, project: &MProject) -> Result<Option<StrategyContext>>;
        async fn get_merge_base_commit_sha(
            &self,
            project: &MProject,
            ctx: &StrategyContext,
            base: &str,
            head: &str,
            build: &MBuild,
        ) -> Result<Option<String>>;
        async fn list_parent_commit_shas(
            &self,
            project: &MProject,
            ctx: &StrategyContext,
            sha: &str,
        ) -> Result<Vec<String>>;
    }
}

pub fn at(minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, minute, 0)
        .unwrap()
}

pub fn sha(c: char) -> String {
    c.to_string().repeat(40)
}

pub fn project() -> MProject {
    MProject {
        id: Uuid::now_v7(),
        name: "web".to_string(),
        repository: Some("https://example.com/web.git".to_string()),
        default_base_branch: "main".to_string(),
        auto_approved_branch_glob: None,
        auto_ignore_changes: None,
        created_at: at(0),
    }
}

pub fn bucket(project: &MProject, branch: &str, commit: &str, minute: u32) -> MScreenshotBucket {
    MScreenshotBucket {
        id: Uuid::now_v7(),
        project: project.id,
        name: "default".to_string(),
        branch: branch.to_string(),
        commit: commit.to_string(),
        complete: true,
        created_at: at(minute),
    }
}

pub fn build(project: &MProject, compare: &MScreenshotBucket) -> MBuild {
    MBuild {
        id: Uuid::now_v7(),
        project: project.id,
        name: "default".to_string(),
        mode: BuildMode::Ci,
        merge_queue: false,
        pull_request: None,
        pr_head_commit: None,
        base_branch: None,
        base_branch_resolved_from: None,
        base_commit: None,
        parent_commits: None,
        compare_screenshot_bucket: compare.id,
        base_screenshot_bucket: None,
        build_type: None,
        conclusion: None,
        job_status: JobStatus::Pending,
        created_at: compare.created_at,
    }
}

pub fn reference_build(project: &MProject, compare: &MScreenshotBucket) -> MBuild {
    MBuild {
        build_type: Some(BuildType::Reference),
        job_status: JobStatus::Complete,
        ..build(project, compare)
    }
}

pub fn pull_request(project: &MProject, base_ref: &str) -> MPullRequest {
    MPullRequest {
        id: Uuid::now_v7(),
        project: project.id,
        number: 42,
        base_ref: Some(base_ref.to_string()),
        head_ref: Some("feature".to_string()),
        merged: false,
        created_at: at(0),
    }
}

pub fn screenshot(bucket: &MScreenshotBucket, name: &str) -> MScreenshot {
    MScreenshot {
        id: Uuid::now_v7(),
        bucket: bucket.id,
        name: name.to_string(),
        base_name: None,
        storage_key: format!("{}-{}", bucket.id, name),
        file: None,
        test: None,
        threshold: None,
        metadata: None,
        created_at: bucket.created_at,
    }
}

pub fn build_diff(
    build: &MBuild,
    base: Option<&MScreenshot>,
    compare: Option<&MScreenshot>,
    score: Option<f64>,
) -> BuildDiff {
    BuildDiff {
        diff: MScreenshotDiff {
            id: Uuid::now_v7(),
            build: build.id,
            test: None,
            base_screenshot: base.map(|s| s.id),
            compare_screenshot: compare.map(|s| s.id),
            score,
            storage_key: None,
            file: None,
            fingerprint: None,
            group: None,
            ignored: false,
            job_status: JobStatus::Complete,
            attempts: 0,
            claimed_at: None,
            created_at: build.created_at,
        },
        base: base.cloned(),
        compare: compare.cloned(),
    }
}

pub fn context() -> StrategyContext {
    StrategyContext {
        repository: "https://example.com/web.git".to_string(),
        workdir: PathBuf::from("/tmp/mirror.git"),
    }
}

/// Strategy that detects every project and always has a context.
pub fn strategy() -> MockStrategy {
    let mut strategy = MockStrategy::new();
    strategy.expect_name().return_const("mock");
    strategy.expect_detect().return_const(true);
    strategy
        .expect_get_context()
        .returning(|_| Ok(Some(context())));
    strategy
}
