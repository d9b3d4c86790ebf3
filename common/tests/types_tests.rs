/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Tests for configuration and shared state

use clap::Parser;
use common::lock::LocalMutex;
use common::storage::MemoryObjectStore;
use common::types::*;
use sea_orm::{DatabaseBackend, MockDatabase};
use std::sync::Arc;

fn create_mock_db() -> sea_orm::DatabaseConnection {
    MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([Vec::<entity::project::Model>::new()])
        .into_connection()
}

#[test]
fn test_cli_defaults() {
    let cli = Cli::try_parse_from(["shotline-server", "--database-url", "postgres://localhost/shotline"])
        .unwrap();

    assert_eq!(cli.log_level, "info");
    assert_eq!(cli.max_concurrent_diffs, 2);
    assert_eq!(cli.poll_interval, 5);
    assert_eq!(cli.lock_timeout, 30);
    assert_eq!(cli.binpath_git, "git");
    assert_eq!(cli.storage_bucket, "screenshots");
    assert!(cli.bot_user.is_none());
    assert_eq!(cli.max_diff_attempts, 3);
    assert_eq!(cli.retry_delay, 30);
    assert_eq!(cli.stale_claim_timeout, 600);
    assert!(cli.sentry_dsn.is_none());
}

#[test]
fn test_cli_rejects_zero_concurrency() {
    let result = Cli::try_parse_from(["shotline-server", "--max-concurrent-diffs", "0"]);
    assert!(result.is_err());
}

#[test]
fn test_cli_parses_bot_user() {
    let cli = Cli::try_parse_from([
        "shotline-server",
        "--bot-user",
        "00000000-0000-0000-0000-00000000b07a",
    ])
    .unwrap();

    assert!(cli.bot_user.is_some());
}

#[test]
fn test_server_state_creation() {
    let cli = Cli::try_parse_from(["shotline-server"]).unwrap();
    let state = ServerState {
        db: create_mock_db(),
        cli,
        storage: Arc::new(MemoryObjectStore::new()),
        lock: Arc::new(LocalMutex::new(None)),
    };

    assert_eq!(state.cli.max_concurrent_diffs, 2);
    assert_eq!(state.cli.base_path, ".");
}

#[test]
fn test_cli_parses_retry_and_reporting() {
    let cli = Cli::try_parse_from([
        "shotline-server",
        "--sentry-dsn",
        "https://key@sentry.example.com/7",
        "--max-diff-attempts",
        "5",
        "--retry-delay",
        "0",
        "--stale-claim-timeout",
        "120",
    ])
    .unwrap();

    assert_eq!(cli.sentry_dsn.as_deref(), Some("https://key@sentry.example.com/7"));
    assert_eq!(cli.max_diff_attempts, 5);
    assert_eq!(cli.retry_delay, 0);
    assert_eq!(cli.stale_claim_timeout, 120);

    let result = Cli::try_parse_from(["shotline-server", "--max-diff-attempts", "0"]);
    assert!(result.is_err());
}
