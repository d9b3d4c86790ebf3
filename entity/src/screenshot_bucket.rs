/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use chrono::NaiveDateTime;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "screenshot_bucket")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: Uuid,
    pub project: Uuid,
    #[sea_orm(indexed)]
    pub name: String,
    pub branch: String,
    #[sea_orm(indexed)]
    pub commit: String,
    pub complete: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::project::Entity",
        from = "Column::Project",
        to = "super::project::Column::Id"
    )]
    Project,
    #[sea_orm(has_many = "super::screenshot::Entity")]
    Screenshot,
}

impl Related<super::screenshot::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Screenshot.def()
    }
}

impl Related<super::build::Entity> for Entity {
    fn to() -> RelationDef {
        super::build::Relation::CompareScreenshotBucket.def().rev()
    }
}

impl ActiveModelBehavior for ActiveModel {}
