//! Conversion of an accepted quote into a binding sales order.
//!
//! The whole operation is one transaction: order insert, item copies, the
//! quote's back-reference, the status flip to `converted`, and the history
//! row commit together or not at all. A half-converted quote is a
//! data-integrity bug and is prevented structurally, not detected after the
//! fact.

use std::sync::Arc;

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    db::DbPool,
    entities::quote::{self, Entity as QuoteEntity, QuoteStatus},
    entities::quote_item::{self, Entity as QuoteItemEntity},
    entities::sales_order::{self, Entity as SalesOrderEntity},
    entities::sales_order_item,
    errors::ServiceError,
    events::{Event, EventSender},
    services::quote_status::{append_history, load_quote},
    services::sequences::{NumberAllocator, SequenceKind},
};

/// Initial status of a freshly converted order; its further lifecycle is
/// owned elsewhere.
const NEW_ORDER_STATUS: &str = "open";

#[derive(Clone)]
pub struct QuoteConversionService {
    db: Arc<DbPool>,
    event_sender: EventSender,
    allocator: Arc<dyn NumberAllocator>,
}

impl QuoteConversionService {
    pub fn new(
        db: Arc<DbPool>,
        event_sender: EventSender,
        allocator: Arc<dyn NumberAllocator>,
    ) -> Self {
        Self {
            db,
            event_sender,
            allocator,
        }
    }

    /// Converts an accepted quote into a sales order, exactly once.
    ///
    /// Totals and line items are copied verbatim from the quote's snapshots,
    /// not recomputed: the order is the quote's financial state frozen at
    /// conversion time. A repeat call returns `AlreadyConverted` with the
    /// existing order id and writes nothing.
    #[instrument(skip(self), fields(quote_id = %quote_id))]
    pub async fn convert_to_order(
        &self,
        quote_id: Uuid,
        actor: Option<Uuid>,
    ) -> Result<sales_order::Model, ServiceError> {
        let now = Utc::now();
        let txn = self.db.begin().await?;

        let quote = load_quote(&txn, quote_id).await?;

        if let Some(order_id) = quote.converted_order_id {
            return Err(ServiceError::AlreadyConverted { quote_id, order_id });
        }
        // The unique index on sales_orders.quote_id enforces this at the
        // storage layer; checking here surfaces the idempotent signal.
        if let Some(existing) = SalesOrderEntity::find()
            .filter(sales_order::Column::QuoteId.eq(quote_id))
            .one(&txn)
            .await?
        {
            return Err(ServiceError::AlreadyConverted {
                quote_id,
                order_id: existing.id,
            });
        }
        if quote.status != QuoteStatus::Accepted {
            return Err(ServiceError::NotConvertible {
                quote_id,
                status: quote.status,
            });
        }

        let items = QuoteItemEntity::find()
            .filter(quote_item::Column::QuoteId.eq(quote_id))
            .order_by_asc(quote_item::Column::Position)
            .all(&txn)
            .await?;

        let order_number = self
            .allocator
            .next_number(&txn, SequenceKind::Order)
            .await?;
        let order_id = Uuid::new_v4();

        let order = sales_order::ActiveModel {
            id: Set(order_id),
            order_number: Set(order_number.clone()),
            quote_id: Set(quote_id),
            client_id: Set(quote.client_id),
            currency_code: Set(quote.currency_code.clone()),
            currency_symbol: Set(quote.currency_symbol.clone()),
            subtotal_ht: Set(quote.subtotal_ht),
            total_tax: Set(quote.total_tax),
            total_ttc: Set(quote.total_ttc),
            status: Set(NEW_ORDER_STATUS.to_string()),
            created_by: Set(actor),
            created_at: Set(now),
        }
        .insert(&txn)
        .await?;

        for item in &items {
            sales_order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                quote_item_id: Set(item.id),
                product_id: Set(item.product_id),
                product_name: Set(item.product_name.clone()),
                product_description: Set(item.product_description.clone()),
                product_sku: Set(item.product_sku.clone()),
                quantity: Set(item.quantity),
                unit_price_ht: Set(item.unit_price_ht),
                tax_rate: Set(item.tax_rate),
                line_total_ht: Set(item.line_total_ht),
                line_tax_amount: Set(item.line_tax_amount),
                line_total_ttc: Set(item.line_total_ttc),
                position: Set(item.position),
                created_at: Set(now),
            }
            .insert(&txn)
            .await?;
        }

        // Status flip, back-reference, and version bump in one guarded
        // update; a concurrent converter loses this race.
        let updated = QuoteEntity::update_many()
            .col_expr(quote::Column::Status, Expr::value(QuoteStatus::Converted))
            .col_expr(
                quote::Column::ConvertedOrderId,
                Expr::value(Some(order_id)),
            )
            .col_expr(quote::Column::UpdatedAt, Expr::value(Some(now)))
            .col_expr(quote::Column::Version, Expr::value(quote.version + 1))
            .filter(quote::Column::Id.eq(quote_id))
            .filter(quote::Column::Version.eq(quote.version))
            .exec(&txn)
            .await?;

        if updated.rows_affected == 0 {
            // Another writer got there first. Roll back our order and
            // re-read to report the winner's outcome.
            txn.rollback().await?;
            warn!(quote_id = %quote_id, "Lost conversion race, re-reading quote");
            let current = QuoteEntity::find_by_id(quote_id)
                .one(&*self.db)
                .await?
                .ok_or_else(|| ServiceError::NotFound(format!("Quote {} not found", quote_id)))?;
            return match current.converted_order_id {
                Some(order_id) => Err(ServiceError::AlreadyConverted { quote_id, order_id }),
                None => Err(ServiceError::ConcurrentModification(quote_id)),
            };
        }

        append_history(
            &txn,
            quote_id,
            Some(QuoteStatus::Accepted),
            QuoteStatus::Converted,
            Some(format!("Converted to order {}", order_number)),
            actor,
            now,
        )
        .await?;

        txn.commit().await?;

        info!(
            quote_id = %quote_id,
            order_id = %order_id,
            order_number = %order_number,
            "Quote converted to order"
        );

        self.event_sender
            .send_or_log(Event::QuoteStatusChanged {
                quote_id,
                old_status: QuoteStatus::Accepted.to_string(),
                new_status: QuoteStatus::Converted.to_string(),
            })
            .await;
        self.event_sender
            .send_or_log(Event::QuoteConverted { quote_id, order_id })
            .await;

        Ok(order)
    }

    /// Fetches the order a quote was converted into, with its items.
    #[instrument(skip(self), fields(quote_id = %quote_id))]
    pub async fn order_for_quote(
        &self,
        quote_id: Uuid,
    ) -> Result<Option<(sales_order::Model, Vec<sales_order_item::Model>)>, ServiceError> {
        let Some(order) = SalesOrderEntity::find()
            .filter(sales_order::Column::QuoteId.eq(quote_id))
            .one(&*self.db)
            .await?
        else {
            return Ok(None);
        };

        let items = sales_order_item::Entity::find()
            .filter(sales_order_item::Column::OrderId.eq(order.id))
            .order_by_asc(sales_order_item::Column::Position)
            .all(&*self.db)
            .await?;

        Ok(Some((order, items)))
    }
}
