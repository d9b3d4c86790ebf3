/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::{Context, Result};
use async_trait::async_trait;
use common::input::check_commit_sha;
use common::types::*;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, warn};

/// Upper bound of ancestors listed for a single lookup.
pub const MAX_PARENT_COMMITS: usize = 200;

/// Provider handle obtained once per resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyContext {
    pub repository: String,
    pub workdir: PathBuf,
}

/// Git provider capability used to walk commit ancestry.
#[async_trait]
pub trait MergeBaseStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn detect(&self, project: &MProject) -> bool;

    /// `None` when the provider is configured but currently unusable.
    async fn get_context(&self, project: &MProject) -> Result<Option<StrategyContext>>;

    async fn get_merge_base_commit_sha(
        &self,
        project: &MProject,
        ctx: &StrategyContext,
        base: &str,
        head: &str,
        build: &MBuild,
    ) -> Result<Option<String>>;

    /// Nearest first, starting with `sha` itself.
    async fn list_parent_commit_shas(
        &self,
        project: &MProject,
        ctx: &StrategyContext,
        sha: &str,
    ) -> Result<Vec<String>>;
}

#[derive(Clone, Default)]
pub struct StrategyRegistry {
    strategies: Vec<Arc<dyn MergeBaseStrategy>>,
}

impl StrategyRegistry {
    pub fn new(strategies: Vec<Arc<dyn MergeBaseStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn from_cli(cli: &Cli) -> Self {
        Self::new(vec![Arc::new(GitMirrorStrategy::new(
            cli.binpath_git.clone(),
            PathBuf::from(&cli.base_path).join("mirrors"),
        ))])
    }

    /// First strategy whose `detect` accepts the project.
    pub fn find(&self, project: &MProject) -> Option<&dyn MergeBaseStrategy> {
        self.strategies
            .iter()
            .find(|strategy| strategy.detect(project))
            .map(|strategy| strategy.as_ref())
    }
}

/// Keeps a bare mirror of `project.repository` and asks the git CLI.
#[derive(Debug, Clone)]
pub struct GitMirrorStrategy {
    binpath_git: String,
    mirror_root: PathBuf,
}

impl GitMirrorStrategy {
    pub fn new(binpath_git: String, mirror_root: PathBuf) -> Self {
        Self {
            binpath_git,
            mirror_root,
        }
    }

    async fn git(&self, ctx: &StrategyContext, args: &[&str]) -> Result<std::process::Output> {
        Command::new(&self.binpath_git)
            .arg("-C")
            .arg(&ctx.workdir)
            .args(args)
            .output()
            .await
            .with_context(|| format!("Failed to execute git {}", args.join(" ")))
    }
}

#[async_trait]
impl MergeBaseStrategy for GitMirrorStrategy {
    fn name(&self) -> &'static str {
        "git-mirror"
    }

    fn detect(&self, project: &MProject) -> bool {
        project
            .repository
            .as_deref()
            .is_some_and(|repository| !repository.trim().is_empty())
    }

    async fn get_context(&self, project: &MProject) -> Result<Option<StrategyContext>> {
        let Some(repository) = project.repository.clone() else {
            return Ok(None);
        };

        let workdir = self.mirror_root.join(format!("{}.git", project.id));

        let update = if tokio::fs::try_exists(&workdir).await.unwrap_or(false) {
            Command::new(&self.binpath_git)
                .arg("-C")
                .arg(&workdir)
                .args(["remote", "update", "--prune"])
                .output()
                .await
        } else {
            tokio::fs::create_dir_all(&self.mirror_root)
                .await
                .context("Failed to create mirror directory")?;
            Command::new(&self.binpath_git)
                .args(["clone", "--mirror", "--quiet", "--"])
                .arg(&repository)
                .arg(&workdir)
                .output()
                .await
        };
        let output = update.context("Failed to execute git mirror command")?;

        if !output.status.success() {
            warn!(
                project_id = %project.id,
                stderr = %String::from_utf8_lossy(&output.stderr),
                "Repository mirror unavailable"
            );
            return Ok(None);
        }

        Ok(Some(StrategyContext {
            repository,
            workdir,
        }))
    }

    async fn get_merge_base_commit_sha(
        &self,
        project: &MProject,
        ctx: &StrategyContext,
        base: &str,
        head: &str,
        _build: &MBuild,
    ) -> Result<Option<String>> {
        if is_option_like(base) || is_option_like(head) {
            debug!(project_id = %project.id, base, head, "Refusing option-like revision");
            return Ok(None);
        }

        let output = self
            .git(ctx, &["merge-base", "--end-of-options", base, head])
            .await?;

        if !output.status.success() {
            debug!(
                project_id = %project.id,
                base,
                head,
                "No merge base between branch and head"
            );
            return Ok(None);
        }

        Ok(parse_sha_lines(&String::from_utf8_lossy(&output.stdout))
            .into_iter()
            .next())
    }

    async fn list_parent_commit_shas(
        &self,
        project: &MProject,
        ctx: &StrategyContext,
        sha: &str,
    ) -> Result<Vec<String>> {
        if is_option_like(sha) {
            debug!(project_id = %project.id, sha, "Refusing option-like revision");
            return Ok(vec![]);
        }

        let max_count = format!("--max-count={}", MAX_PARENT_COMMITS);
        let output = self
            .git(
                ctx,
                &["rev-list", "--first-parent", &max_count, "--end-of-options", sha],
            )
            .await?;

        if !output.status.success() {
            debug!(project_id = %project.id, sha, "Commit unknown to mirror");
            return Ok(vec![]);
        }

        Ok(parse_sha_lines(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Revisions come from uploads and must never reach git as flags.
fn is_option_like(revision: &str) -> bool {
    revision.starts_with('-')
}

/// Keeps only well formed commit shas, one per line, in order.
pub fn parse_sha_lines(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| check_commit_sha(line).is_ok())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn project(repository: Option<&str>) -> MProject {
        MProject {
            id: Uuid::now_v7(),
            name: "web".to_string(),
            repository: repository.map(str::to_string),
            default_base_branch: "main".to_string(),
            auto_approved_branch_glob: None,
            auto_ignore_changes: None,
            created_at: NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        }
    }

    #[test]
    fn test_parse_sha_lines() {
        let a = "a".repeat(40);
        let b = "b".repeat(40);
        let output = format!("{}\n  {}  \nfatal: bad object\n\n", a, b);

        assert_eq!(parse_sha_lines(&output), vec![a, b]);
    }

    #[test]
    fn test_git_mirror_detects_repository() {
        let strategy = GitMirrorStrategy::new("git".to_string(), PathBuf::from("/tmp"));

        assert!(strategy.detect(&project(Some("https://example.com/web.git"))));
        assert!(!strategy.detect(&project(Some("  "))));
        assert!(!strategy.detect(&project(None)));
    }

    #[test]
    fn test_registry_without_match() {
        let registry = StrategyRegistry::default();
        assert!(registry.find(&project(Some("https://example.com/web.git"))).is_none());

        let registry = StrategyRegistry::new(vec![Arc::new(GitMirrorStrategy::new(
            "git".to_string(),
            PathBuf::from("/tmp"),
        ))]);
        assert!(registry.find(&project(None)).is_none());
        assert_eq!(
            registry
                .find(&project(Some("https://example.com/web.git")))
                .map(|strategy| strategy.name()),
            Some("git-mirror")
        );
    }

    #[test]
    fn test_registry_from_cli() {
        let cli = Cli {
            log_level: "info".to_string(),
            database_url: None,
            database_url_file: None,
            storage_path: "./storage".to_string(),
            storage_bucket: "screenshots".to_string(),
            max_concurrent_diffs: 2,
            poll_interval: 5,
            lock_timeout: 30,
            max_diff_attempts: 3,
            retry_delay: 30,
            stale_claim_timeout: 600,
            base_path: "/var/lib/shotline".to_string(),
            binpath_git: "/usr/bin/git".to_string(),
            bot_user: None,
            sentry_dsn: None,
        };

        let registry = StrategyRegistry::from_cli(&cli);
        let strategy = registry.find(&project(Some("https://example.com/web.git")));
        assert_eq!(strategy.map(|strategy| strategy.name()), Some("git-mirror"));
    }
}
