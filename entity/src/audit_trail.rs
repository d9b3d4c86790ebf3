/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use chrono::NaiveDateTime;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, DeriveActiveEnum, EnumIter, Deserialize, Serialize)]
#[sea_orm(rs_type = "i16", db_type = "Integer")]
pub enum AuditAction {
    #[sea_orm(num_value = 0)]
    FilesIgnored,
    #[sea_orm(num_value = 1)]
    FilesUnignored,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditAction::FilesIgnored => write!(f, "files.ignored"),
            AuditAction::FilesUnignored => write!(f, "files.unignored"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, DeriveActiveEnum, EnumIter, Deserialize, Serialize)]
#[sea_orm(rs_type = "i16", db_type = "Integer")]
pub enum ActorKind {
    #[sea_orm(num_value = 0)]
    User,
    #[sea_orm(num_value = 1)]
    Bot,
}

/// Append only. The newest entry for a (project, test, fingerprint) wins.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "audit_trail")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: Uuid,
    pub project: Uuid,
    pub test: Uuid,
    pub fingerprint: String,
    pub action: AuditAction,
    pub actor: ActorKind,
    pub user: Option<Uuid>,
    pub created_at: NaiveDateTime,
}

impl Model {
    pub fn is_manual_unignore(&self) -> bool {
        self.action == AuditAction::FilesUnignored && self.actor == ActorKind::User
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::project::Entity",
        from = "Column::Project",
        to = "super::project::Column::Id"
    )]
    Project,
}

impl ActiveModelBehavior for ActiveModel {}
