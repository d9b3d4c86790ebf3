/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use super::input::greater_than_zero;
use super::lock::NamedMutex;
use super::storage::ObjectStore;
use clap::Parser;
use entity::*;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Parser, Debug, Clone)]
#[command(name = "Shotline", display_name = "Shotline", bin_name = "shotline-server", author = "Wavelens", version, about, long_about = None)]
pub struct Cli {
    #[arg(long, env = "SHOTLINE_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
    #[arg(long, env = "SHOTLINE_DATABASE_URL")]
    pub database_url: Option<String>,
    #[arg(long, env = "SHOTLINE_DATABASE_URL_FILE")]
    pub database_url_file: Option<String>,
    #[arg(long, env = "SHOTLINE_STORAGE_PATH", default_value = "./storage")]
    pub storage_path: String,
    #[arg(long, env = "SHOTLINE_STORAGE_BUCKET", default_value = "screenshots")]
    pub storage_bucket: String,
    #[arg(long, env = "SHOTLINE_MAX_CONCURRENT_DIFFS", value_parser = greater_than_zero::<usize>, default_value = "2")]
    pub max_concurrent_diffs: usize,
    #[arg(long, env = "SHOTLINE_POLL_INTERVAL", value_parser = greater_than_zero::<u64>, default_value = "5")]
    pub poll_interval: u64,
    #[arg(long, env = "SHOTLINE_LOCK_TIMEOUT", value_parser = greater_than_zero::<u64>, default_value = "30")]
    pub lock_timeout: u64,
    #[arg(long, env = "SHOTLINE_MAX_DIFF_ATTEMPTS", value_parser = greater_than_zero::<i32>, default_value = "3")]
    pub max_diff_attempts: i32,
    #[arg(long, env = "SHOTLINE_RETRY_DELAY", default_value = "30")]
    pub retry_delay: u64,
    #[arg(long, env = "SHOTLINE_STALE_CLAIM_TIMEOUT", value_parser = greater_than_zero::<u64>, default_value = "600")]
    pub stale_claim_timeout: u64,
    #[arg(long, env = "SHOTLINE_BASE_PATH", default_value = ".")]
    pub base_path: String,
    #[arg(long, env = "SHOTLINE_BINPATH_GIT", default_value = "git")]
    pub binpath_git: String,
    #[arg(long, env = "SHOTLINE_BOT_USER")]
    pub bot_user: Option<Uuid>,
    #[arg(long, env = "SHOTLINE_SENTRY_DSN")]
    pub sentry_dsn: Option<String>,
}

pub struct ServerState {
    pub db: DatabaseConnection,
    pub cli: Cli,
    pub storage: Arc<dyn ObjectStore>,
    pub lock: Arc<dyn NamedMutex>,
}

pub type EAuditTrail = audit_trail::Entity;
pub type EBuild = build::Entity;
pub type EBuildReview = build_review::Entity;
pub type EFile = file::Entity;
pub type EIgnoredChange = ignored_change::Entity;
pub type EProject = project::Entity;
pub type EPullRequest = pull_request::Entity;
pub type EScreenshot = screenshot::Entity;
pub type EScreenshotBucket = screenshot_bucket::Entity;
pub type EScreenshotDiff = screenshot_diff::Entity;
pub type ETestStatsBuild = test_stats_build::Entity;
pub type ETestStatsChange = test_stats_change::Entity;

pub type MAuditTrail = audit_trail::Model;
pub type MBuild = build::Model;
pub type MBuildReview = build_review::Model;
pub type MFile = file::Model;
pub type MIgnoredChange = ignored_change::Model;
pub type MProject = project::Model;
pub type MPullRequest = pull_request::Model;
pub type MScreenshot = screenshot::Model;
pub type MScreenshotBucket = screenshot_bucket::Model;
pub type MScreenshotDiff = screenshot_diff::Model;
pub type MTestStatsBuild = test_stats_build::Model;
pub type MTestStatsChange = test_stats_change::Model;

pub type AAuditTrail = audit_trail::ActiveModel;
pub type ABuild = build::ActiveModel;
pub type ABuildReview = build_review::ActiveModel;
pub type AFile = file::ActiveModel;
pub type AIgnoredChange = ignored_change::ActiveModel;
pub type AProject = project::ActiveModel;
pub type APullRequest = pull_request::ActiveModel;
pub type AScreenshot = screenshot::ActiveModel;
pub type AScreenshotBucket = screenshot_bucket::ActiveModel;
pub type AScreenshotDiff = screenshot_diff::ActiveModel;
pub type ATestStatsBuild = test_stats_build::ActiveModel;
pub type ATestStatsChange = test_stats_change::ActiveModel;

pub type CAuditTrail = audit_trail::Column;
pub type CBuild = build::Column;
pub type CBuildReview = build_review::Column;
pub type CFile = file::Column;
pub type CIgnoredChange = ignored_change::Column;
pub type CProject = project::Column;
pub type CPullRequest = pull_request::Column;
pub type CScreenshot = screenshot::Column;
pub type CScreenshotBucket = screenshot_bucket::Column;
pub type CScreenshotDiff = screenshot_diff::Column;
pub type CTestStatsBuild = test_stats_build::Column;
pub type CTestStatsChange = test_stats_change::Column;

pub type RBuild = build::Relation;
pub type RBuildReview = build_review::Relation;
pub type RScreenshot = screenshot::Relation;
pub type RScreenshotBucket = screenshot_bucket::Relation;
pub type RScreenshotDiff = screenshot_diff::Relation;
