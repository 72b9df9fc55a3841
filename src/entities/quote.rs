use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Lifecycle status of a quote.
///
/// `draft` is the only state in which line items may change. `converted` is
/// terminal; `rejected` has no outgoing transitions in the modeled workflow.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    #[sea_orm(string_value = "draft")]
    Draft,
    #[sea_orm(string_value = "sent")]
    Sent,
    #[sea_orm(string_value = "viewed")]
    Viewed,
    #[sea_orm(string_value = "accepted")]
    Accepted,
    #[sea_orm(string_value = "rejected")]
    Rejected,
    #[sea_orm(string_value = "expired")]
    Expired,
    #[sea_orm(string_value = "converted")]
    Converted,
}

impl QuoteStatus {
    /// The static transition table. Preconditions (item count, validity
    /// dates, absence of an order) are checked by the status service; this
    /// answers only whether the edge exists at all.
    pub fn can_transition_to(self, to: QuoteStatus) -> bool {
        use QuoteStatus::*;
        matches!(
            (self, to),
            (Draft, Sent)
                | (Draft, Rejected)
                | (Sent, Viewed)
                | (Sent, Accepted)
                | (Sent, Rejected)
                | (Sent, Expired)
                | (Viewed, Accepted)
                | (Viewed, Rejected)
                | (Viewed, Expired)
                | (Accepted, Converted)
                | (Expired, Sent)
        )
    }

    /// Line items may only be added, updated, or removed while in `draft`.
    pub fn allows_item_mutation(self) -> bool {
        matches!(self, QuoteStatus::Draft)
    }

    /// Soft deletion is restricted to states that can never convert.
    pub fn allows_deletion(self) -> bool {
        matches!(self, QuoteStatus::Draft | QuoteStatus::Rejected)
    }

    /// States from which no further transition is possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, QuoteStatus::Converted | QuoteStatus::Rejected)
    }
}

/// The `quotes` table.
///
/// Monetary totals are a persisted cache, recomputed from the line items on
/// every item mutation and never edited directly.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, Validate)]
#[sea_orm(table_name = "quotes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Unique, monotonically assigned, never reused.
    #[validate(length(
        min = 1,
        max = 50,
        message = "Quote number must be between 1 and 50 characters"
    ))]
    pub quote_number: String,

    /// Live reference to the client; client data is never snapshotted.
    pub client_id: Uuid,

    /// User who created the quote.
    pub created_by: Option<Uuid>,

    pub status: QuoteStatus,

    pub quote_date: DateTime<Utc>,

    /// End of the validity window; compared against wall-clock time for
    /// expiration.
    pub valid_until: DateTime<Utc>,

    /// Currency pinned at creation.
    pub currency_code: String,
    pub currency_symbol: String,

    /// Cached sum of the line `line_total_ht` values.
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub subtotal_ht: Decimal,

    /// Cached sum of the line `line_tax_amount` values.
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub total_tax: Decimal,

    /// Always `subtotal_ht + total_tax`.
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub total_ttc: Decimal,

    pub terms_conditions: Option<String>,
    pub notes: Option<String>,

    /// Never rendered into exported documents.
    pub internal_notes: Option<String>,

    /// Set exactly once, by conversion.
    pub converted_order_id: Option<Uuid>,

    pub is_deleted: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,

    /// Optimistic concurrency token; every write filters on the loaded value.
    pub version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::quote_item::Entity")]
    QuoteItems,

    #[sea_orm(has_many = "super::quote_status_history::Entity")]
    StatusHistory,

    #[sea_orm(
        belongs_to = "super::client::Entity",
        from = "Column::ClientId",
        to = "super::client::Column::Id"
    )]
    Client,
}

impl Related<super::quote_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::QuoteItems.def()
    }
}

impl Related<super::quote_status_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StatusHistory.def()
    }
}

impl Related<super::client::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Client.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Derived expiration check for display and filtering.
    ///
    /// This never mutates stored state: the persisted status only becomes
    /// `expired` through an explicit transition (see the status service
    /// sweep). Keeping the read path pure avoids a read mutating the row it
    /// renders.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.status, QuoteStatus::Sent | QuoteStatus::Viewed) && now > self.valid_until
    }
}
