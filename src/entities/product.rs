use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// The `products` table (boundary data, owned by the surrounding catalog).
///
/// Read exactly once per add-item call; the price, tax rate, and identity
/// fields are copied into the quote item and never consulted again for that
/// line.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, Validate)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[validate(length(min = 1, max = 200))]
    pub name: String,

    pub description: Option<String>,

    #[validate(length(min = 1, max = 64))]
    pub sku: String,

    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub unit_price_ht: Decimal,

    /// Currency the price is denominated in; must match the quote's pinned
    /// currency at add-time.
    pub currency: String,

    /// Tax percentage (0-100) applied to this product.
    #[sea_orm(column_type = "Decimal(Some((5, 2)))")]
    pub tax_rate: Decimal,

    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
