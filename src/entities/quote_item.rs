use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A line on a quote, carrying a frozen snapshot of the product at the
/// moment it was added.
///
/// The snapshot columns (`product_name`, `product_description`,
/// `product_sku`, `unit_price_ht`, `tax_rate`) are copied from the product
/// exactly once and never re-read: later changes to the product must not
/// retroactively alter a quote. `product_id` is a weak traceability
/// reference only.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "quote_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub quote_id: Uuid,
    pub product_id: Option<Uuid>,

    pub product_name: String,
    pub product_description: Option<String>,
    pub product_sku: String,

    /// Positive; fractional quantities (hours, metres) are allowed.
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub quantity: Decimal,

    /// Unit price frozen at add-time.
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub unit_price_ht: Decimal,

    /// Tax percentage (0-100) frozen at add-time.
    #[sea_orm(column_type = "Decimal(Some((5, 2)))")]
    pub tax_rate: Decimal,

    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub line_total_ht: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub line_tax_amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub line_total_ttc: Decimal,

    /// Stable ordering for rendered documents.
    pub position: i32,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::quote::Entity",
        from = "Column::QuoteId",
        to = "super::quote::Column::Id"
    )]
    Quote,
}

impl Related<super::quote::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Quote.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;

        let now = Utc::now();

        if insert {
            if let ActiveValue::NotSet = active_model.created_at {
                active_model.created_at = Set(now);
            }
        }

        if let ActiveValue::NotSet = active_model.updated_at {
            active_model.updated_at = Set(Some(now));
        }

        Ok(active_model)
    }
}
