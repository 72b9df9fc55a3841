//! Quote status transitions.
//!
//! The legal edges live on [`QuoteStatus::can_transition_to`]; this service
//! enforces the per-edge preconditions and makes each transition atomic with
//! its history row. Item freezing needs no extra lock: items are mutable
//! only in `draft`, and every transition leaves `draft` permanently.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    db::DbPool,
    entities::quote::{self, Entity as QuoteEntity, QuoteStatus},
    entities::quote_item::{self, Entity as QuoteItemEntity},
    entities::quote_status_history::{self, Entity as HistoryEntity},
    errors::ServiceError,
    events::{Event, EventSender},
};

#[derive(Clone)]
pub struct QuoteStatusService {
    db: Arc<DbPool>,
    event_sender: EventSender,
}

impl QuoteStatusService {
    pub fn new(db: Arc<DbPool>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Applies a status transition requested by a caller.
    ///
    /// The target arrives as text from the boundary; anything that does not
    /// parse is `UnknownStatus`. `converted` is reachable only through the
    /// conversion service, which needs the order write in the same
    /// transaction, so requesting it here is `NotConvertible`.
    #[instrument(skip(self, comment), fields(quote_id = %quote_id, target = %target))]
    pub async fn request_transition(
        &self,
        quote_id: Uuid,
        target: &str,
        comment: Option<String>,
        actor: Option<Uuid>,
    ) -> Result<quote::Model, ServiceError> {
        let to = QuoteStatus::from_str(target)
            .map_err(|_| ServiceError::UnknownStatus(target.to_string()))?;

        let now = Utc::now();
        let txn = self.db.begin().await?;

        let quote = load_quote(&txn, quote_id).await?;

        if to == QuoteStatus::Converted {
            return Err(ServiceError::NotConvertible {
                quote_id,
                status: quote.status,
            });
        }

        let old_status = quote.status;
        let updated = apply_transition(&txn, quote, to, comment, actor, now).await?;

        txn.commit().await?;

        info!(
            quote_id = %quote_id,
            old_status = %old_status,
            new_status = %to,
            "Quote status updated"
        );

        self.event_sender
            .send_or_log(Event::QuoteStatusChanged {
                quote_id,
                old_status: old_status.to_string(),
                new_status: to.to_string(),
            })
            .await;

        Ok(updated)
    }

    /// Transitions every overdue `sent`/`viewed` quote to `expired`.
    ///
    /// This is the explicit sweep the derived [`quote::Model::is_expired`]
    /// check defers to; run it from a scheduled job or on interaction.
    /// Each quote gets its own transaction and an actor-less history row.
    /// Returns the number of quotes transitioned.
    #[instrument(skip(self))]
    pub async fn mark_expired_quotes(&self, now: DateTime<Utc>) -> Result<u64, ServiceError> {
        let candidates = QuoteEntity::find()
            .filter(quote::Column::IsDeleted.eq(false))
            .filter(quote::Column::Status.is_in([QuoteStatus::Sent, QuoteStatus::Viewed]))
            .filter(quote::Column::ValidUntil.lt(now))
            .all(&*self.db)
            .await?;

        let mut expired = 0u64;
        for candidate in candidates {
            let quote_id = candidate.id;
            let txn = self.db.begin().await?;

            // Re-read inside the transaction: the quote may have moved on
            // (accepted, rejected) since the candidate scan.
            let quote = match load_quote(&txn, quote_id).await {
                Ok(quote) => quote,
                Err(ServiceError::NotFound(_)) => continue,
                Err(e) => return Err(e),
            };
            if !quote.is_expired(now) {
                continue;
            }

            match apply_transition(&txn, quote, QuoteStatus::Expired, None, None, now).await {
                Ok(_) => {
                    txn.commit().await?;
                    expired += 1;
                    self.event_sender.send_or_log(Event::QuoteExpired(quote_id)).await;
                }
                Err(
                    ServiceError::IllegalTransition { .. }
                    | ServiceError::ConcurrentModification(_),
                ) => {
                    // Lost a race with an operator action; leave the quote as is.
                    warn!(quote_id = %quote_id, "Skipping expiration of concurrently updated quote");
                }
                Err(e) => return Err(e),
            }
        }

        info!(count = expired, "Expiration sweep finished");
        Ok(expired)
    }

    /// Chronological status history of a quote, creation row first.
    #[instrument(skip(self), fields(quote_id = %quote_id))]
    pub async fn history(
        &self,
        quote_id: Uuid,
    ) -> Result<Vec<quote_status_history::Model>, ServiceError> {
        let rows = HistoryEntity::find()
            .filter(quote_status_history::Column::QuoteId.eq(quote_id))
            .order_by_asc(quote_status_history::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        Ok(rows)
    }
}

/// Loads a live (non-deleted) quote for update.
pub(crate) async fn load_quote(
    txn: &DatabaseTransaction,
    quote_id: Uuid,
) -> Result<quote::Model, ServiceError> {
    QuoteEntity::find_by_id(quote_id)
        .filter(quote::Column::IsDeleted.eq(false))
        .one(txn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Quote {} not found", quote_id)))
}

/// Validates and applies one transition: edge check, precondition check,
/// version-guarded status update, history row. Caller owns the transaction.
pub(crate) async fn apply_transition(
    txn: &DatabaseTransaction,
    quote: quote::Model,
    to: QuoteStatus,
    comment: Option<String>,
    actor: Option<Uuid>,
    now: DateTime<Utc>,
) -> Result<quote::Model, ServiceError> {
    let from = quote.status;

    if !from.can_transition_to(to) {
        return Err(ServiceError::IllegalTransition { from, to });
    }
    check_precondition(txn, &quote, to, now).await?;

    let loaded_version = quote.version;
    let updated = QuoteEntity::update_many()
        .col_expr(quote::Column::Status, Expr::value(to))
        .col_expr(quote::Column::UpdatedAt, Expr::value(Some(now)))
        .col_expr(quote::Column::Version, Expr::value(loaded_version + 1))
        .filter(quote::Column::Id.eq(quote.id))
        .filter(quote::Column::Version.eq(loaded_version))
        .exec(txn)
        .await?;

    if updated.rows_affected == 0 {
        return Err(ServiceError::ConcurrentModification(quote.id));
    }

    append_history(txn, quote.id, Some(from), to, comment, actor, now).await?;

    Ok(quote::Model {
        status: to,
        updated_at: Some(now),
        version: loaded_version + 1,
        ..quote
    })
}

/// Appends one history row; also used for the creation row (`from: None`).
pub(crate) async fn append_history(
    txn: &DatabaseTransaction,
    quote_id: Uuid,
    from: Option<QuoteStatus>,
    to: QuoteStatus,
    comment: Option<String>,
    actor: Option<Uuid>,
    now: DateTime<Utc>,
) -> Result<(), ServiceError> {
    quote_status_history::ActiveModel {
        id: Set(Uuid::new_v4()),
        quote_id: Set(quote_id),
        from_status: Set(from),
        to_status: Set(to),
        comment: Set(comment),
        changed_by: Set(actor),
        created_at: Set(now),
    }
    .insert(txn)
    .await?;
    Ok(())
}

/// Per-edge preconditions. Failures surface as `IllegalTransition`: the
/// edge exists in the table but is not takeable right now.
async fn check_precondition(
    txn: &DatabaseTransaction,
    quote: &quote::Model,
    to: QuoteStatus,
    now: DateTime<Utc>,
) -> Result<(), ServiceError> {
    let from = quote.status;
    match (from, to) {
        // An empty quote cannot be sent to a client.
        (QuoteStatus::Draft, QuoteStatus::Sent) => {
            let items = QuoteItemEntity::find()
                .filter(quote_item::Column::QuoteId.eq(quote.id))
                .count(txn)
                .await?;
            if items == 0 {
                return Err(ServiceError::IllegalTransition { from, to });
            }
        }
        // Expiration is only valid once the validity window has passed.
        (QuoteStatus::Sent | QuoteStatus::Viewed, QuoteStatus::Expired) => {
            if now <= quote.valid_until {
                return Err(ServiceError::IllegalTransition { from, to });
            }
        }
        // Re-issuing requires the validity window to have been extended
        // first, otherwise the sweep would immediately expire it again.
        (QuoteStatus::Expired, QuoteStatus::Sent) => {
            if quote.valid_until <= now {
                return Err(ServiceError::IllegalTransition { from, to });
            }
        }
        _ => {}
    }
    Ok(())
}
