/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Automatic suppression of changes that keep coming back.

use anyhow::{Context, Result};
use chrono::{Days, NaiveDate, Utc};
use common::types::*;
use entity::audit_trail::{ActorKind, AuditAction};
use sea_orm::ActiveValue::Set;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    TransactionTrait,
};
use tracing::{debug, info};
use uuid::Uuid;

use super::stats::TestStats;

pub const AUTO_IGNORE_WINDOW_DAYS: u64 = 7;

/// First day of the trailing window ending with `today`, both days counted.
pub fn window_start(today: NaiveDate) -> NaiveDate {
    today - Days::new(AUTO_IGNORE_WINDOW_DAYS - 1)
}

#[derive(Debug, Clone, Copy)]
pub struct IgnoreTarget<'a> {
    pub project: Uuid,
    pub test: Uuid,
    pub fingerprint: &'a str,
}

/// A manual unignore always beats the threshold.
pub fn should_auto_ignore(
    change_count: i64,
    threshold: i32,
    latest_audit: Option<&MAuditTrail>,
) -> bool {
    if threshold <= 0 || change_count < i64::from(threshold) {
        return false;
    }

    !latest_audit.is_some_and(MAuditTrail::is_manual_unignore)
}

pub async fn is_change_ignored<C: ConnectionTrait>(db: &C, target: IgnoreTarget<'_>) -> Result<bool> {
    let ignored = EIgnoredChange::find()
        .filter(CIgnoredChange::Project.eq(target.project))
        .filter(CIgnoredChange::Test.eq(target.test))
        .filter(CIgnoredChange::Fingerprint.eq(target.fingerprint))
        .one(db)
        .await
        .context("Failed to query ignored change")?;

    Ok(ignored.is_some())
}

pub async fn latest_audit<C: ConnectionTrait>(
    db: &C,
    target: IgnoreTarget<'_>,
) -> Result<Option<MAuditTrail>> {
    EAuditTrail::find()
        .filter(CAuditTrail::Project.eq(target.project))
        .filter(CAuditTrail::Test.eq(target.test))
        .filter(CAuditTrail::Fingerprint.eq(target.fingerprint))
        .order_by_desc(CAuditTrail::CreatedAt)
        .order_by_desc(CAuditTrail::Id)
        .one(db)
        .await
        .context("Failed to query audit trail")
}

/// Records the ignored change and its audit entry in one transaction.
/// Returns false when another worker got there first.
pub async fn apply_auto_ignore(
    db: &DatabaseConnection,
    bot_user: Option<Uuid>,
    target: IgnoreTarget<'_>,
) -> Result<bool> {
    let txn = db.begin().await.context("Failed to open auto-ignore transaction")?;

    if is_change_ignored(&txn, target).await? {
        txn.commit().await.context("Failed to close auto-ignore transaction")?;
        return Ok(false);
    }

    let now = Utc::now().naive_utc();
    let ignored = AIgnoredChange {
        id: Set(Uuid::now_v7()),
        project: Set(target.project),
        test: Set(target.test),
        fingerprint: Set(target.fingerprint.to_string()),
        created_at: Set(now),
    };

    let inserted = EIgnoredChange::insert(ignored)
        .on_conflict(
            OnConflict::columns([
                CIgnoredChange::Project,
                CIgnoredChange::Test,
                CIgnoredChange::Fingerprint,
            ])
            .do_nothing()
            .to_owned(),
        )
        .exec_without_returning(&txn)
        .await
        .context("Failed to insert ignored change")?;

    if inserted == 0 {
        txn.commit().await.context("Failed to close auto-ignore transaction")?;
        return Ok(false);
    }

    let audit = AAuditTrail {
        id: Set(Uuid::now_v7()),
        project: Set(target.project),
        test: Set(target.test),
        fingerprint: Set(target.fingerprint.to_string()),
        action: Set(AuditAction::FilesIgnored),
        actor: Set(ActorKind::Bot),
        user: Set(bot_user),
        created_at: Set(now),
    };

    EAuditTrail::insert(audit)
        .exec_without_returning(&txn)
        .await
        .context("Failed to insert audit trail")?;

    txn.commit().await.context("Failed to commit auto-ignore")?;
    Ok(true)
}

/// Checks the project policy and ignores the change when it recurred often enough.
/// Returns whether the change is ignored afterwards.
pub async fn evaluate_auto_ignore(
    db: &DatabaseConnection,
    stats: &dyn TestStats,
    bot_user: Option<Uuid>,
    project: &MProject,
    target: IgnoreTarget<'_>,
) -> Result<bool> {
    let Some(threshold) = project.auto_ignore_changes.filter(|t| *t > 0) else {
        return Ok(false);
    };

    let since = window_start(Utc::now().date_naive());
    let change_count = stats
        .change_count(target.test, target.fingerprint, since)
        .await?;
    let latest = latest_audit(db, target).await?;

    if !should_auto_ignore(change_count, threshold, latest.as_ref()) {
        debug!(change_count, threshold, "Change stays reportable");
        return Ok(false);
    }

    if apply_auto_ignore(db, bot_user, target).await? {
        info!(
            test = %target.test,
            fingerprint = %target.fingerprint,
            change_count,
            "Automatically ignored recurring change"
        );
    }

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_covers_seven_days() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let start = window_start(today);

        assert_eq!(start, NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
        assert_eq!(start.iter_days().take_while(|day| *day <= today).count(), 7);
    }

    fn audit(action: AuditAction, actor: ActorKind) -> MAuditTrail {
        MAuditTrail {
            id: Uuid::now_v7(),
            project: Uuid::now_v7(),
            test: Uuid::now_v7(),
            fingerprint: "v1:g16:d1:t0.002,0.02,0.08:0000000000000001".to_string(),
            action,
            actor,
            user: None,
            created_at: Utc::now().naive_utc(),
        }
    }

    #[test]
    fn test_threshold_reached() {
        assert!(should_auto_ignore(1, 1, None));
        assert!(should_auto_ignore(5, 3, None));
        assert!(!should_auto_ignore(2, 3, None));
    }

    #[test]
    fn test_disabled_threshold() {
        assert!(!should_auto_ignore(10, 0, None));
        assert!(!should_auto_ignore(10, -1, None));
    }

    #[test]
    fn test_manual_unignore_is_sticky() {
        let unignored = audit(AuditAction::FilesUnignored, ActorKind::User);
        assert!(!should_auto_ignore(10, 1, Some(&unignored)));
    }

    #[test]
    fn test_bot_entries_do_not_block() {
        let bot_unignored = audit(AuditAction::FilesUnignored, ActorKind::Bot);
        let ignored = audit(AuditAction::FilesIgnored, ActorKind::User);

        assert!(should_auto_ignore(10, 1, Some(&bot_unignored)));
        assert!(should_auto_ignore(10, 1, Some(&ignored)));
    }
}
