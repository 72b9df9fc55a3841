use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// The `number_sequences` table backing document numbering.
///
/// One row per sequence ("quote", "order"). Allocation is a compare-and-swap
/// on `next_value`; the row is never deleted, so issued numbers are never
/// reused even when the owning document is soft-deleted.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "number_sequences")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub name: String,

    pub prefix: String,

    /// Next value to hand out.
    pub next_value: i64,

    /// Zero-padding width of the numeric part.
    pub padding: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
