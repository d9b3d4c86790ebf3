/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Shared builders and mocks for diff engine tests

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use common::lock::LocalMutex;
use common::storage::{MemoryObjectStore, ObjectStore};
use common::types::*;
use differ::Collaborators;
use differ::conclude::BuildConcluder;
use differ::stats::{StatsChange, TestStats};
use entity::build::{BuildConclusion, BuildMode, BuildType, JobStatus};
use entity::file::FileType;
use image::{ImageFormat, Rgba, RgbaImage};
use mockall::mock;
use sea_orm::{DatabaseConnection, Transaction};
use std::io::Cursor;
use std::sync::Arc;
use uuid::Uuid;

mock! {
    pub Concluder {}

    #[async_trait]
    impl BuildConcluder for Concluder {
        async fn conclude(&self, build: &MBuild) -> Result<Option<BuildConclusion>>;
    }
}

mock! {
    pub Stats {}

    #[async_trait]
    impl TestStats for Stats {
        async fn upsert(
            &self,
            test: Uuid,
            date: NaiveDate,
            change: Option<StatsChange>,
        ) -> Result<()>;
        async fn change_count(
            &self,
            test: Uuid,
            fingerprint: &str,
            since: NaiveDate,
        ) -> Result<i64>;
    }
}

pub fn create_mock_cli() -> Cli {
    Cli {
        log_level: "info".to_string(),
        database_url: Some("mock://test".to_string()),
        database_url_file: None,
        storage_path: "./storage".to_string(),
        storage_bucket: "screenshots".to_string(),
        max_concurrent_diffs: 2,
        poll_interval: 5,
        lock_timeout: 30,
        max_diff_attempts: 3,
        retry_delay: 30,
        stale_claim_timeout: 600,
        base_path: std::env::temp_dir().to_string_lossy().to_string(),
        binpath_git: "git".to_string(),
        bot_user: None,
        sentry_dsn: None,
    }
}

pub fn create_state(db: DatabaseConnection, storage: Arc<MemoryObjectStore>) -> ServerState {
    ServerState {
        db,
        cli: create_mock_cli(),
        storage,
        lock: Arc::new(LocalMutex::new(None)),
    }
}

/// Statements run against a shared state's mock connection. Every other handle must be dropped.
pub fn transaction_log(state: Arc<ServerState>) -> Vec<Transaction> {
    match Arc::try_unwrap(state) {
        Ok(state) => state.db.into_transaction_log(),
        Err(_) => panic!("state is still shared"),
    }
}

pub fn collaborators(concluder: MockConcluder, stats: MockStats) -> Collaborators {
    Collaborators {
        concluder: Arc::new(concluder),
        stats: Arc::new(stats),
    }
}

/// Concluder that expects exactly one call.
pub fn concluder_once() -> MockConcluder {
    let mut concluder = MockConcluder::new();
    concluder.expect_conclude().times(1).returning(|_| Ok(None));
    concluder
}

pub fn at(minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, minute, 0)
        .unwrap()
}

pub fn project() -> MProject {
    MProject {
        id: Uuid::now_v7(),
        name: "web".to_string(),
        repository: None,
        default_base_branch: "main".to_string(),
        auto_approved_branch_glob: None,
        auto_ignore_changes: None,
        created_at: at(0),
    }
}

pub fn build(project: &MProject, build_type: BuildType) -> MBuild {
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
        compare_screenshot_bucket: Uuid::now_v7(),
        base_screenshot_bucket: None,
        build_type: Some(build_type),
        conclusion: None,
        job_status: JobStatus::Progress,
        created_at: at(1),
    }
}

pub fn image_file(key: &str, width: i32, height: i32) -> MFile {
    MFile {
        id: Uuid::now_v7(),
        key: key.to_string(),
        file_type: FileType::Screenshot,
        content_type: "image/png".to_string(),
        width: Some(width),
        height: Some(height),
        fingerprint: None,
        created_at: at(1),
    }
}

pub fn text_file(key: &str) -> MFile {
    MFile {
        content_type: "text/plain".to_string(),
        width: None,
        height: None,
        ..image_file(key, 0, 0)
    }
}

pub fn diff_file(key: &str, fingerprint: Option<&str>) -> MFile {
    MFile {
        file_type: FileType::ScreenshotDiff,
        fingerprint: fingerprint.map(str::to_string),
        ..image_file(key, 20, 20)
    }
}

pub fn screenshot(name: &str, storage_key: &str, file: Option<&MFile>) -> MScreenshot {
    MScreenshot {
        id: Uuid::now_v7(),
        bucket: Uuid::now_v7(),
        name: name.to_string(),
        base_name: None,
        storage_key: storage_key.to_string(),
        file: file.map(|f| f.id),
        test: None,
        threshold: None,
        metadata: None,
        created_at: at(1),
    }
}

pub fn diff(build: &MBuild, base: Option<&MScreenshot>, compare: Option<&MScreenshot>) -> MScreenshotDiff {
    MScreenshotDiff {
        id: Uuid::now_v7(),
        build: build.id,
        test: None,
        base_screenshot: base.map(|s| s.id),
        compare_screenshot: compare.map(|s| s.id),
        score: None,
        storage_key: None,
        file: None,
        fingerprint: None,
        group: None,
        ignored: false,
        job_status: JobStatus::Progress,
        attempts: 0,
        claimed_at: None,
        created_at: at(2),
    }
}

pub fn png(width: u32, height: u32, paint: impl Fn(u32, u32) -> Rgba<u8>) -> Vec<u8> {
    let image = RgbaImage::from_fn(width, height, paint);
    let mut out = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .unwrap();
    out
}

pub fn white_png() -> Vec<u8> {
    png(20, 20, |_, _| Rgba([255, 255, 255, 255]))
}

pub fn marked_png() -> Vec<u8> {
    png(20, 20, |x, y| {
        if x < 5 && y < 5 {
            Rgba([0, 0, 0, 255])
        } else {
            Rgba([255, 255, 255, 255])
        }
    })
}

pub async fn store_with(objects: &[(&str, Vec<u8>)]) -> Arc<MemoryObjectStore> {
    let storage = Arc::new(MemoryObjectStore::new());
    for (key, data) in objects {
        storage.put(key, data.clone(), "image/png").await.unwrap();
    }
    storage
}
