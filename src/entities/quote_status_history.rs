use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::quote::QuoteStatus;

/// Append-only record of every status change a quote has undergone.
///
/// One row per transition, plus one creation row with `from_status: None`.
/// Replaying the `to_status` chain reproduces a legal path through the
/// transition table.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "quote_status_history")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub quote_id: Uuid,

    /// `None` only for the creation row.
    pub from_status: Option<QuoteStatus>,

    pub to_status: QuoteStatus,

    pub comment: Option<String>,

    /// `None` for system-initiated transitions (expiration sweep).
    pub changed_by: Option<Uuid>,

    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::quote::Entity",
        from = "Column::QuoteId",
        to = "super::quote::Column::Id",
        on_delete = "Cascade"
    )]
    Quote,
}

impl Related<super::quote::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Quote.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
