/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use common::types::*;
use entity::{test_stats_build, test_stats_change};
use sea_orm::ActiveValue::Set;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ColumnTrait, EntityTrait, FromQueryResult, QueryFilter, QuerySelect,
};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct StatsChange {
    pub file: Uuid,
    pub fingerprint: String,
}

/// Per test daily counters.
#[async_trait]
pub trait TestStats: Send + Sync {
    async fn upsert(&self, test: Uuid, date: NaiveDate, change: Option<StatsChange>)
    -> Result<()>;

    /// Changes recorded for the fingerprint on or after `since`, inclusive.
    async fn change_count(&self, test: Uuid, fingerprint: &str, since: NaiveDate) -> Result<i64>;
}

#[derive(Debug, FromQueryResult)]
struct ChangeSum {
    total: Option<i64>,
}

pub struct DatabaseTestStats {
    state: Arc<ServerState>,
}

impl DatabaseTestStats {
    pub fn new(state: Arc<ServerState>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl TestStats for DatabaseTestStats {
    async fn upsert(
        &self,
        test: Uuid,
        date: NaiveDate,
        change: Option<StatsChange>,
    ) -> Result<()> {
        let build_row = ATestStatsBuild {
            test: Set(test),
            date: Set(date),
            value: Set(1),
        };

        ETestStatsBuild::insert(build_row)
            .on_conflict(
                OnConflict::columns([CTestStatsBuild::Test, CTestStatsBuild::Date])
                    .value(
                        CTestStatsBuild::Value,
                        Expr::col((test_stats_build::Entity, CTestStatsBuild::Value)).add(1),
                    )
                    .to_owned(),
            )
            .exec_without_returning(&self.state.db)
            .await
            .context("Failed to count test build")?;

        let Some(change) = change else {
            return Ok(());
        };

        let change_row = ATestStatsChange {
            test: Set(test),
            fingerprint: Set(change.fingerprint),
            date: Set(date),
            file: Set(change.file),
            value: Set(1),
        };

        ETestStatsChange::insert(change_row)
            .on_conflict(
                OnConflict::columns([
                    CTestStatsChange::Test,
                    CTestStatsChange::Fingerprint,
                    CTestStatsChange::Date,
                ])
                .value(
                    CTestStatsChange::Value,
                    Expr::col((test_stats_change::Entity, CTestStatsChange::Value)).add(1),
                )
                .to_owned(),
            )
            .exec_without_returning(&self.state.db)
            .await
            .context("Failed to count test change")?;

        Ok(())
    }

    async fn change_count(&self, test: Uuid, fingerprint: &str, since: NaiveDate) -> Result<i64> {
        let sum = ETestStatsChange::find()
            .select_only()
            .column_as(CTestStatsChange::Value.sum(), "total")
            .filter(CTestStatsChange::Test.eq(test))
            .filter(CTestStatsChange::Fingerprint.eq(fingerprint))
            .filter(CTestStatsChange::Date.gte(since))
            .into_model::<ChangeSum>()
            .one(&self.state.db)
            .await
            .context("Failed to sum test changes")?;

        Ok(sum.and_then(|sum| sum.total).unwrap_or(0))
    }
}
