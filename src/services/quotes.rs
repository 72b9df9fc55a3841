//! Quote drafting: creation, line items, duplication, document export,
//! soft deletion.
//!
//! Two read paths are kept deliberately separate. Product data is *frozen*:
//! read once inside the add-item transaction and copied into the item row.
//! Client data is *live*: joined at render time, never copied. Totals are a
//! persisted cache recomputed from the items on every mutation.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::QuoteDefaults,
    db::DbPool,
    entities::client::Entity as ClientEntity,
    entities::product::Entity as ProductEntity,
    entities::quote::{self, Entity as QuoteEntity, QuoteStatus},
    entities::quote_item::{self, Entity as QuoteItemEntity},
    errors::ServiceError,
    events::{Event, EventSender},
    pricing::{self, LineAmounts},
    services::quote_status::{append_history, load_quote},
    services::sequences::{NumberAllocator, SequenceKind},
};

/// Input for creating a draft quote.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuoteInput {
    pub client_id: Uuid,
    /// Defaults to the configured currency; must be a known code.
    #[validate(length(min = 3, max = 3, message = "Currency code must be 3 characters"))]
    pub currency_code: Option<String>,
    /// Defaults to now + the configured validity window.
    pub valid_until: Option<DateTime<Utc>>,
    pub terms_conditions: Option<String>,
    pub notes: Option<String>,
    pub internal_notes: Option<String>,
    pub created_by: Option<Uuid>,
}

/// Input for adding a line item to a draft quote.
#[derive(Debug, Deserialize)]
pub struct AddQuoteItemInput {
    pub product_id: Uuid,
    pub quantity: Decimal,
}

/// Input for changing the quantity of an existing line item.
#[derive(Debug, Deserialize)]
pub struct UpdateQuoteItemInput {
    pub quantity: Decimal,
}

/// A quote with its line items, ordered by position.
#[derive(Debug, Clone, Serialize)]
pub struct QuoteWithItems {
    pub quote: quote::Model,
    pub items: Vec<quote_item::Model>,
}

#[derive(Debug, Serialize)]
pub struct QuoteListPage {
    pub quotes: Vec<quote::Model>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Optional filters for [`QuoteService::list_quotes`].
#[derive(Debug, Default, Deserialize)]
pub struct QuoteListFilter {
    pub client_id: Option<Uuid>,
    pub status: Option<QuoteStatus>,
}

/// Read-only rendering of a quote for document export.
///
/// Client fields are read live at export time; everything monetary comes
/// from the frozen item snapshots. Internal notes are never included.
#[derive(Debug, Clone, Serialize)]
pub struct QuoteDocument {
    pub quote_number: String,
    pub status: QuoteStatus,
    pub quote_date: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub is_expired: bool,
    pub currency_code: String,
    pub currency_symbol: String,
    pub client: ClientBlock,
    pub lines: Vec<DocumentLine>,
    pub subtotal_ht: Decimal,
    pub total_tax: Decimal,
    pub total_ttc: Decimal,
    pub terms_conditions: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClientBlock {
    pub company_name: String,
    pub contact_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub tax_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentLine {
    pub position: i32,
    pub product_name: String,
    pub product_description: Option<String>,
    pub product_sku: String,
    pub quantity: Decimal,
    pub unit_price_ht: Decimal,
    pub tax_rate: Decimal,
    pub line_total_ht: Decimal,
    pub line_tax_amount: Decimal,
    pub line_total_ttc: Decimal,
}

/// Service owning the quote aggregate while it is editable.
#[derive(Clone)]
pub struct QuoteService {
    db: Arc<DbPool>,
    event_sender: EventSender,
    allocator: Arc<dyn NumberAllocator>,
    defaults: QuoteDefaults,
}

impl QuoteService {
    pub fn new(
        db: Arc<DbPool>,
        event_sender: EventSender,
        allocator: Arc<dyn NumberAllocator>,
        defaults: QuoteDefaults,
    ) -> Self {
        Self {
            db,
            event_sender,
            allocator,
            defaults,
        }
    }

    /// Creates a new quote in `draft` with zero items.
    ///
    /// Pins the currency, allocates the quote number, and writes the
    /// creation history row in the same transaction.
    #[instrument(skip(self, input), fields(client_id = %input.client_id))]
    pub async fn create_draft(&self, input: CreateQuoteInput) -> Result<quote::Model, ServiceError> {
        input.validate()?;

        let now = Utc::now();
        let currency_code = input
            .currency_code
            .map(|c| c.to_uppercase())
            .unwrap_or_else(|| self.defaults.default_currency.clone());
        let currency_symbol = self
            .defaults
            .symbol_for(&currency_code)
            .ok_or_else(|| {
                ServiceError::ValidationError(format!("Unknown currency code: {currency_code}"))
            })?
            .to_string();

        let valid_until = input
            .valid_until
            .unwrap_or_else(|| now + Duration::days(self.defaults.validity_days));
        if valid_until <= now {
            return Err(ServiceError::ValidationError(
                "valid_until must be in the future".to_string(),
            ));
        }

        let txn = self.db.begin().await?;

        ClientEntity::find_by_id(input.client_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Client {} not found", input.client_id))
            })?;

        let quote_number = self
            .allocator
            .next_number(&txn, SequenceKind::Quote)
            .await?;
        let quote_id = Uuid::new_v4();

        let created = quote::ActiveModel {
            id: Set(quote_id),
            quote_number: Set(quote_number.clone()),
            client_id: Set(input.client_id),
            created_by: Set(input.created_by),
            status: Set(QuoteStatus::Draft),
            quote_date: Set(now),
            valid_until: Set(valid_until),
            currency_code: Set(currency_code),
            currency_symbol: Set(currency_symbol),
            subtotal_ht: Set(Decimal::ZERO),
            total_tax: Set(Decimal::ZERO),
            total_ttc: Set(Decimal::ZERO),
            terms_conditions: Set(input.terms_conditions),
            notes: Set(input.notes),
            internal_notes: Set(input.internal_notes),
            converted_order_id: Set(None),
            is_deleted: Set(false),
            created_at: Set(now),
            updated_at: Set(None),
            version: Set(1),
        }
        .insert(&txn)
        .await?;

        append_history(
            &txn,
            quote_id,
            None,
            QuoteStatus::Draft,
            None,
            input.created_by,
            now,
        )
        .await?;

        txn.commit().await?;

        info!(quote_id = %quote_id, quote_number = %quote_number, "Quote created");
        self.event_sender.send_or_log(Event::QuoteCreated(quote_id)).await;

        Ok(created)
    }

    /// Adds a line item, snapshotting the product at this moment.
    ///
    /// The product's current name, description, SKU, price, and tax rate are
    /// read once and copied into the item; later product changes never
    /// retroactively affect the line. This is what distinguishes a quote
    /// from a live price list.
    #[instrument(skip(self, input), fields(quote_id = %quote_id, product_id = %input.product_id))]
    pub async fn add_item(
        &self,
        quote_id: Uuid,
        input: AddQuoteItemInput,
    ) -> Result<quote_item::Model, ServiceError> {
        let now = Utc::now();
        let txn = self.db.begin().await?;

        let quote = load_editable(&txn, quote_id).await?;

        let product = ProductEntity::find_by_id(input.product_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", input.product_id))
            })?;

        if !product.is_active {
            return Err(ServiceError::ValidationError(format!(
                "Product {} is not active",
                product.sku
            )));
        }
        if product.currency != quote.currency_code {
            return Err(ServiceError::ValidationError(format!(
                "Product {} is priced in {} but the quote is in {}",
                product.sku, product.currency, quote.currency_code
            )));
        }

        let amounts = pricing::line_amounts(input.quantity, product.unit_price_ht, product.tax_rate)?;

        let last = QuoteItemEntity::find()
            .filter(quote_item::Column::QuoteId.eq(quote_id))
            .order_by_desc(quote_item::Column::Position)
            .one(&txn)
            .await?;
        let position = last.map(|item| item.position + 1).unwrap_or(1);

        let item = quote_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            quote_id: Set(quote_id),
            product_id: Set(Some(product.id)),
            product_name: Set(product.name),
            product_description: Set(product.description),
            product_sku: Set(product.sku),
            quantity: Set(input.quantity),
            unit_price_ht: Set(product.unit_price_ht),
            tax_rate: Set(product.tax_rate),
            line_total_ht: Set(amounts.line_total_ht),
            line_tax_amount: Set(amounts.line_tax_amount),
            line_total_ttc: Set(amounts.line_total_ttc),
            position: Set(position),
            created_at: Set(now),
            updated_at: Set(None),
        }
        .insert(&txn)
        .await?;

        self.recalculate_totals(&txn, &quote, now).await?;
        txn.commit().await?;

        info!(
            quote_id = %quote_id,
            item_id = %item.id,
            sku = %item.product_sku,
            quantity = %item.quantity,
            "Item added to quote"
        );
        self.event_sender
            .send_or_log(Event::QuoteItemAdded {
                quote_id,
                item_id: item.id,
            })
            .await;

        Ok(item)
    }

    /// Changes the quantity of a line item, draft-only.
    ///
    /// Amounts are recomputed from the item's *snapshot* price and tax rate;
    /// the product is deliberately not re-read.
    #[instrument(skip(self, input), fields(quote_id = %quote_id, item_id = %item_id))]
    pub async fn update_item(
        &self,
        quote_id: Uuid,
        item_id: Uuid,
        input: UpdateQuoteItemInput,
    ) -> Result<quote_item::Model, ServiceError> {
        let now = Utc::now();
        let txn = self.db.begin().await?;

        let quote = load_editable(&txn, quote_id).await?;
        let item = load_item(&txn, quote_id, item_id).await?;

        let amounts = pricing::line_amounts(input.quantity, item.unit_price_ht, item.tax_rate)?;

        let mut item: quote_item::ActiveModel = item.into();
        item.quantity = Set(input.quantity);
        item.line_total_ht = Set(amounts.line_total_ht);
        item.line_tax_amount = Set(amounts.line_tax_amount);
        item.line_total_ttc = Set(amounts.line_total_ttc);
        item.updated_at = Set(Some(now));
        let item = item.update(&txn).await?;

        self.recalculate_totals(&txn, &quote, now).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::QuoteItemUpdated { quote_id, item_id })
            .await;

        Ok(item)
    }

    /// Removes a line item, draft-only.
    #[instrument(skip(self), fields(quote_id = %quote_id, item_id = %item_id))]
    pub async fn remove_item(&self, quote_id: Uuid, item_id: Uuid) -> Result<(), ServiceError> {
        let now = Utc::now();
        let txn = self.db.begin().await?;

        let quote = load_editable(&txn, quote_id).await?;
        let item = load_item(&txn, quote_id, item_id).await?;

        QuoteItemEntity::delete_by_id(item.id).exec(&txn).await?;

        self.recalculate_totals(&txn, &quote, now).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::QuoteItemRemoved { quote_id, item_id })
            .await;

        Ok(())
    }

    /// Fetches a quote with its items.
    #[instrument(skip(self), fields(quote_id = %quote_id))]
    pub async fn get_quote(&self, quote_id: Uuid) -> Result<QuoteWithItems, ServiceError> {
        let quote = QuoteEntity::find_by_id(quote_id)
            .filter(quote::Column::IsDeleted.eq(false))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Quote {} not found", quote_id)))?;

        let items = self.items_of(quote_id).await?;
        Ok(QuoteWithItems { quote, items })
    }

    /// Lists quotes with pagination, newest first.
    #[instrument(skip(self, filter))]
    pub async fn list_quotes(
        &self,
        filter: QuoteListFilter,
        page: u64,
        per_page: u64,
    ) -> Result<QuoteListPage, ServiceError> {
        let mut query = QuoteEntity::find()
            .filter(quote::Column::IsDeleted.eq(false))
            .order_by_desc(quote::Column::CreatedAt);

        if let Some(client_id) = filter.client_id {
            query = query.filter(quote::Column::ClientId.eq(client_id));
        }
        if let Some(status) = filter.status {
            query = query.filter(quote::Column::Status.eq(status));
        }

        let paginator = query.paginate(&*self.db, per_page.max(1));
        let total = paginator.num_items().await?;
        let quotes = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok(QuoteListPage {
            quotes,
            total,
            page,
            per_page,
        })
    }

    /// Copies a quote's current snapshots into a new `draft` quote.
    ///
    /// Item snapshots and line amounts are copied verbatim (the source
    /// quote's frozen prices, not today's catalog prices), so the new
    /// draft's totals equal the source totals at duplication time. The new
    /// quote gets a fresh number and validity window.
    #[instrument(skip(self), fields(source_id = %source_id))]
    pub async fn duplicate(
        &self,
        source_id: Uuid,
        actor: Option<Uuid>,
    ) -> Result<QuoteWithItems, ServiceError> {
        let now = Utc::now();
        let txn = self.db.begin().await?;

        let source = load_quote(&txn, source_id).await?;
        let source_items = QuoteItemEntity::find()
            .filter(quote_item::Column::QuoteId.eq(source_id))
            .order_by_asc(quote_item::Column::Position)
            .all(&txn)
            .await?;

        let quote_number = self
            .allocator
            .next_number(&txn, SequenceKind::Quote)
            .await?;
        let new_id = Uuid::new_v4();

        let created = quote::ActiveModel {
            id: Set(new_id),
            quote_number: Set(quote_number.clone()),
            client_id: Set(source.client_id),
            created_by: Set(actor),
            status: Set(QuoteStatus::Draft),
            quote_date: Set(now),
            valid_until: Set(now + Duration::days(self.defaults.validity_days)),
            currency_code: Set(source.currency_code.clone()),
            currency_symbol: Set(source.currency_symbol.clone()),
            subtotal_ht: Set(source.subtotal_ht),
            total_tax: Set(source.total_tax),
            total_ttc: Set(source.total_ttc),
            terms_conditions: Set(source.terms_conditions.clone()),
            notes: Set(source.notes.clone()),
            internal_notes: Set(source.internal_notes.clone()),
            converted_order_id: Set(None),
            is_deleted: Set(false),
            created_at: Set(now),
            updated_at: Set(None),
            version: Set(1),
        }
        .insert(&txn)
        .await?;

        let mut items = Vec::with_capacity(source_items.len());
        for source_item in &source_items {
            let copied = quote_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                quote_id: Set(new_id),
                product_id: Set(source_item.product_id),
                product_name: Set(source_item.product_name.clone()),
                product_description: Set(source_item.product_description.clone()),
                product_sku: Set(source_item.product_sku.clone()),
                quantity: Set(source_item.quantity),
                unit_price_ht: Set(source_item.unit_price_ht),
                tax_rate: Set(source_item.tax_rate),
                line_total_ht: Set(source_item.line_total_ht),
                line_tax_amount: Set(source_item.line_tax_amount),
                line_total_ttc: Set(source_item.line_total_ttc),
                position: Set(source_item.position),
                created_at: Set(now),
                updated_at: Set(None),
            }
            .insert(&txn)
            .await?;
            items.push(copied);
        }

        append_history(&txn, new_id, None, QuoteStatus::Draft, None, actor, now).await?;

        txn.commit().await?;

        info!(
            source_id = %source_id,
            new_id = %new_id,
            quote_number = %quote_number,
            "Quote duplicated"
        );
        self.event_sender
            .send_or_log(Event::QuoteDuplicated { source_id, new_id })
            .await;

        Ok(QuoteWithItems {
            quote: created,
            items,
        })
    }

    /// Extends (or shortens, while still future) the validity window.
    ///
    /// Needed before re-issuing an expired quote: `expired -> sent` requires
    /// `valid_until` to be in the future. Not available once the quote is
    /// terminal.
    #[instrument(skip(self), fields(quote_id = %quote_id))]
    pub async fn update_validity(
        &self,
        quote_id: Uuid,
        valid_until: DateTime<Utc>,
    ) -> Result<quote::Model, ServiceError> {
        let now = Utc::now();
        if valid_until <= now {
            return Err(ServiceError::ValidationError(
                "valid_until must be in the future".to_string(),
            ));
        }

        let txn = self.db.begin().await?;
        let quote = load_quote(&txn, quote_id).await?;

        if quote.status.is_terminal() {
            return Err(ServiceError::ValidationError(format!(
                "Quote {} validity cannot change in status '{}'",
                quote_id, quote.status
            )));
        }

        let updated = QuoteEntity::update_many()
            .col_expr(quote::Column::ValidUntil, Expr::value(valid_until))
            .col_expr(quote::Column::UpdatedAt, Expr::value(Some(now)))
            .col_expr(quote::Column::Version, Expr::value(quote.version + 1))
            .filter(quote::Column::Id.eq(quote_id))
            .filter(quote::Column::Version.eq(quote.version))
            .exec(&txn)
            .await?;
        if updated.rows_affected == 0 {
            return Err(ServiceError::ConcurrentModification(quote_id));
        }

        txn.commit().await?;

        Ok(quote::Model {
            valid_until,
            updated_at: Some(now),
            version: quote.version + 1,
            ..quote
        })
    }

    /// Renders a quote for export. Read-only: no state change, ever.
    ///
    /// Client data is the live read path; everything monetary comes from
    /// the frozen item snapshots. `internal_notes` stays internal.
    #[instrument(skip(self), fields(quote_id = %quote_id))]
    pub async fn export_document(&self, quote_id: Uuid) -> Result<QuoteDocument, ServiceError> {
        let now = Utc::now();
        let QuoteWithItems { quote, items } = self.get_quote(quote_id).await?;

        let client = ClientEntity::find_by_id(quote.client_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Client {} not found", quote.client_id))
            })?;

        let is_expired = quote.is_expired(now);
        let lines = items
            .into_iter()
            .map(|item| DocumentLine {
                position: item.position,
                product_name: item.product_name,
                product_description: item.product_description,
                product_sku: item.product_sku,
                quantity: item.quantity,
                unit_price_ht: item.unit_price_ht,
                tax_rate: item.tax_rate,
                line_total_ht: item.line_total_ht,
                line_tax_amount: item.line_tax_amount,
                line_total_ttc: item.line_total_ttc,
            })
            .collect();

        Ok(QuoteDocument {
            quote_number: quote.quote_number,
            status: quote.status,
            quote_date: quote.quote_date,
            valid_until: quote.valid_until,
            is_expired,
            currency_code: quote.currency_code,
            currency_symbol: quote.currency_symbol,
            client: ClientBlock {
                company_name: client.company_name,
                contact_name: client.contact_name,
                email: client.email,
                phone: client.phone,
                address: client.address,
                tax_id: client.tax_id,
            },
            lines,
            subtotal_ht: quote.subtotal_ht,
            total_tax: quote.total_tax,
            total_ttc: quote.total_ttc,
            terms_conditions: quote.terms_conditions,
            notes: quote.notes,
        })
    }

    /// Soft-deletes a quote. Restricted to `draft` and `rejected`: anything
    /// that could still convert must remain on the books. The quote number
    /// is never reclaimed.
    #[instrument(skip(self), fields(quote_id = %quote_id))]
    pub async fn delete_quote(&self, quote_id: Uuid) -> Result<(), ServiceError> {
        let now = Utc::now();
        let txn = self.db.begin().await?;

        let quote = load_quote(&txn, quote_id).await?;
        if !quote.status.allows_deletion() {
            return Err(ServiceError::QuoteNotDeletable {
                quote_id,
                status: quote.status,
            });
        }

        let updated = QuoteEntity::update_many()
            .col_expr(quote::Column::IsDeleted, Expr::value(true))
            .col_expr(quote::Column::UpdatedAt, Expr::value(Some(now)))
            .col_expr(quote::Column::Version, Expr::value(quote.version + 1))
            .filter(quote::Column::Id.eq(quote_id))
            .filter(quote::Column::Version.eq(quote.version))
            .exec(&txn)
            .await?;
        if updated.rows_affected == 0 {
            return Err(ServiceError::ConcurrentModification(quote_id));
        }

        txn.commit().await?;

        info!(quote_id = %quote_id, "Quote soft-deleted");
        self.event_sender.send_or_log(Event::QuoteDeleted(quote_id)).await;

        Ok(())
    }

    async fn items_of(&self, quote_id: Uuid) -> Result<Vec<quote_item::Model>, ServiceError> {
        let items = QuoteItemEntity::find()
            .filter(quote_item::Column::QuoteId.eq(quote_id))
            .order_by_asc(quote_item::Column::Position)
            .all(&*self.db)
            .await?;
        Ok(items)
    }

    /// Recomputes the cached totals from the current items.
    ///
    /// Version-guarded like every other quote write; the caller's
    /// transaction makes item change + total refresh atomic.
    async fn recalculate_totals(
        &self,
        txn: &DatabaseTransaction,
        quote: &quote::Model,
        now: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        let items = QuoteItemEntity::find()
            .filter(quote_item::Column::QuoteId.eq(quote.id))
            .all(txn)
            .await?;

        let totals = pricing::quote_totals(items.iter().map(|item| LineAmounts {
            line_total_ht: item.line_total_ht,
            line_tax_amount: item.line_tax_amount,
            line_total_ttc: item.line_total_ttc,
        }));

        let updated = QuoteEntity::update_many()
            .col_expr(quote::Column::SubtotalHt, Expr::value(totals.subtotal_ht))
            .col_expr(quote::Column::TotalTax, Expr::value(totals.total_tax))
            .col_expr(quote::Column::TotalTtc, Expr::value(totals.total_ttc))
            .col_expr(quote::Column::UpdatedAt, Expr::value(Some(now)))
            .col_expr(quote::Column::Version, Expr::value(quote.version + 1))
            .filter(quote::Column::Id.eq(quote.id))
            .filter(quote::Column::Version.eq(quote.version))
            .exec(txn)
            .await?;
        if updated.rows_affected == 0 {
            return Err(ServiceError::ConcurrentModification(quote.id));
        }

        info!(
            quote_id = %quote.id,
            subtotal_ht = %totals.subtotal_ht,
            total_tax = %totals.total_tax,
            total_ttc = %totals.total_ttc,
            "Recalculated quote totals"
        );

        Ok(())
    }
}

/// Loads a quote and checks it is still item-editable (`draft`).
async fn load_editable(
    txn: &DatabaseTransaction,
    quote_id: Uuid,
) -> Result<quote::Model, ServiceError> {
    let quote = load_quote(txn, quote_id).await?;
    if !quote.status.allows_item_mutation() {
        return Err(ServiceError::QuoteNotEditable {
            quote_id,
            status: quote.status,
        });
    }
    Ok(quote)
}

/// Loads an item and checks it belongs to the given quote.
async fn load_item(
    txn: &DatabaseTransaction,
    quote_id: Uuid,
    item_id: Uuid,
) -> Result<quote_item::Model, ServiceError> {
    let item = QuoteItemEntity::find_by_id(item_id)
        .one(txn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Quote item {} not found", item_id)))?;

    if item.quote_id != quote_id {
        return Err(ServiceError::ValidationError(format!(
            "Item {} does not belong to quote {}",
            item_id, quote_id
        )));
    }
    Ok(item)
}
