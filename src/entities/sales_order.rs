use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// The `sales_orders` table.
///
/// Created exclusively by quote conversion. Totals are copied verbatim from
/// the quote at conversion time and are never recomputed: the order is an
/// immutable financial snapshot, decoupled from later changes to products,
/// tax rates, or the client. The unique index on `quote_id` is the
/// structural guarantee that a quote converts at most once.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, Validate)]
#[sea_orm(table_name = "sales_orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[validate(length(
        min = 1,
        max = 50,
        message = "Order number must be between 1 and 50 characters"
    ))]
    pub order_number: String,

    /// Originating quote; unique.
    pub quote_id: Uuid,

    pub client_id: Uuid,

    pub currency_code: String,
    pub currency_symbol: String,

    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub subtotal_ht: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub total_tax: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub total_ttc: Decimal,

    /// Order fulfilment lives outside this core; new orders open as "open".
    pub status: String,

    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::sales_order_item::Entity")]
    Items,

    #[sea_orm(
        belongs_to = "super::quote::Entity",
        from = "Column::QuoteId",
        to = "super::quote::Column::Id"
    )]
    Quote,
}

impl Related<super::sales_order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
    }
}

impl Related<super::quote::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Quote.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
