//! End-to-end tests for the quote lifecycle.
//!
//! Covers the full journey:
//! - Draft creation with numbering and the creation history row
//! - Line item mutation and total recomputation
//! - Status transitions, preconditions, and item freezing
//! - Snapshot isolation from later catalog changes
//! - Duplication, expiration, and soft deletion

mod common;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use common::TestContext;
use rust_decimal_macros::dec;
use uuid::Uuid;

use quoteflow::{
    entities::quote::QuoteStatus,
    errors::ServiceError,
    services::quotes::{
        AddQuoteItemInput, CreateQuoteInput, QuoteListFilter, UpdateQuoteItemInput,
    },
};

fn draft_input(client_id: Uuid) -> CreateQuoteInput {
    CreateQuoteInput {
        client_id,
        currency_code: None,
        valid_until: None,
        terms_conditions: Some("Payment within 30 days.".to_string()),
        notes: None,
        internal_notes: Some("Margin already at floor.".to_string()),
        created_by: None,
    }
}

// ==================== Creation & numbering ====================

#[tokio::test]
async fn create_draft_assigns_number_and_creation_history() {
    let ctx = TestContext::new().await;
    let client = ctx.seed_client().await;

    let quote = ctx
        .state
        .quotes
        .create_draft(draft_input(client.id))
        .await
        .expect("draft creation failed");

    assert_eq!(quote.quote_number, "QUO-000001");
    assert_eq!(quote.status, QuoteStatus::Draft);
    assert_eq!(quote.currency_code, "EUR");
    assert_eq!(quote.currency_symbol, "€");
    assert_eq!(quote.subtotal_ht, dec!(0));
    assert_eq!(quote.total_tax, dec!(0));
    assert_eq!(quote.total_ttc, dec!(0));

    let history = ctx
        .state
        .quote_status
        .history(quote.id)
        .await
        .expect("history query failed");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].from_status, None);
    assert_eq!(history[0].to_status, QuoteStatus::Draft);

    // Numbers are monotone across quotes.
    let second = ctx
        .state
        .quotes
        .create_draft(draft_input(client.id))
        .await
        .expect("second draft failed");
    assert_eq!(second.quote_number, "QUO-000002");
}

#[tokio::test]
async fn create_draft_rejects_unknown_client_and_currency() {
    let ctx = TestContext::new().await;
    let client = ctx.seed_client().await;

    let mut input = draft_input(Uuid::new_v4());
    assert_matches!(
        ctx.state.quotes.create_draft(input).await,
        Err(ServiceError::NotFound(_))
    );

    input = draft_input(client.id);
    input.currency_code = Some("XXX".to_string());
    assert_matches!(
        ctx.state.quotes.create_draft(input).await,
        Err(ServiceError::ValidationError(_))
    );
}

// ==================== Line items & totals ====================

#[tokio::test]
async fn worked_example_two_units_at_twenty_percent() {
    let ctx = TestContext::new().await;
    let client = ctx.seed_client().await;
    let product = ctx.seed_product("WID-1", dec!(100.00), dec!(20)).await;

    let quote = ctx
        .state
        .quotes
        .create_draft(draft_input(client.id))
        .await
        .unwrap();

    let item = ctx
        .state
        .quotes
        .add_item(
            quote.id,
            AddQuoteItemInput {
                product_id: product.id,
                quantity: dec!(2),
            },
        )
        .await
        .expect("add_item failed");

    assert_eq!(item.line_total_ht, dec!(200.00));
    assert_eq!(item.line_tax_amount, dec!(40.00));
    assert_eq!(item.line_total_ttc, dec!(240.00));

    let fetched = ctx.state.quotes.get_quote(quote.id).await.unwrap();
    assert_eq!(fetched.quote.subtotal_ht, dec!(200.00));
    assert_eq!(fetched.quote.total_tax, dec!(40.00));
    assert_eq!(fetched.quote.total_ttc, dec!(240.00));
}

#[tokio::test]
async fn totals_follow_item_mutations() {
    let ctx = TestContext::new().await;
    let client = ctx.seed_client().await;
    let widget = ctx.seed_product("WID-1", dec!(19.99), dec!(20)).await;
    let gasket = ctx.seed_product("GSK-1", dec!(5.50), dec!(5.5)).await;

    let quote = ctx
        .state
        .quotes
        .create_draft(draft_input(client.id))
        .await
        .unwrap();

    let widget_line = ctx
        .state
        .quotes
        .add_item(
            quote.id,
            AddQuoteItemInput {
                product_id: widget.id,
                quantity: dec!(3),
            },
        )
        .await
        .unwrap();
    let gasket_line = ctx
        .state
        .quotes
        .add_item(
            quote.id,
            AddQuoteItemInput {
                product_id: gasket.id,
                quantity: dec!(2),
            },
        )
        .await
        .unwrap();

    // 3 x 19.99 = 59.97 HT, 11.99 tax; 2 x 5.50 = 11.00 HT, 0.61 tax.
    assert_eq!(widget_line.line_total_ht, dec!(59.97));
    assert_eq!(widget_line.line_tax_amount, dec!(11.99));
    assert_eq!(gasket_line.line_tax_amount, dec!(0.61));

    let fetched = ctx.state.quotes.get_quote(quote.id).await.unwrap();
    assert_eq!(fetched.quote.subtotal_ht, dec!(70.97));
    assert_eq!(fetched.quote.total_tax, dec!(12.60));
    assert_eq!(fetched.quote.total_ttc, dec!(83.57));
    assert_eq!(
        fetched.quote.subtotal_ht + fetched.quote.total_tax,
        fetched.quote.total_ttc
    );

    let updated = ctx
        .state
        .quotes
        .update_item(
            quote.id,
            widget_line.id,
            UpdateQuoteItemInput { quantity: dec!(1) },
        )
        .await
        .unwrap();
    assert_eq!(updated.line_total_ht, dec!(19.99));
    assert_eq!(updated.line_tax_amount, dec!(4.00));

    let fetched = ctx.state.quotes.get_quote(quote.id).await.unwrap();
    assert_eq!(fetched.quote.subtotal_ht, dec!(30.99));
    assert_eq!(fetched.quote.total_tax, dec!(4.61));
    assert_eq!(fetched.quote.total_ttc, dec!(35.60));

    ctx.state
        .quotes
        .remove_item(quote.id, gasket_line.id)
        .await
        .unwrap();

    let fetched = ctx.state.quotes.get_quote(quote.id).await.unwrap();
    assert_eq!(fetched.items.len(), 1);
    assert_eq!(fetched.quote.subtotal_ht, dec!(19.99));
    assert_eq!(fetched.quote.total_tax, dec!(4.00));
    assert_eq!(fetched.quote.total_ttc, dec!(23.99));
}

#[tokio::test]
async fn invalid_quantities_are_rejected() {
    let ctx = TestContext::new().await;
    let client = ctx.seed_client().await;
    let product = ctx.seed_product("WID-1", dec!(10.00), dec!(20)).await;
    let quote = ctx
        .state
        .quotes
        .create_draft(draft_input(client.id))
        .await
        .unwrap();

    assert_matches!(
        ctx.state
            .quotes
            .add_item(
                quote.id,
                AddQuoteItemInput {
                    product_id: product.id,
                    quantity: dec!(0),
                },
            )
            .await,
        Err(ServiceError::InvalidLineItem(_))
    );
    assert_matches!(
        ctx.state
            .quotes
            .add_item(
                quote.id,
                AddQuoteItemInput {
                    product_id: product.id,
                    quantity: dec!(-2),
                },
            )
            .await,
        Err(ServiceError::InvalidLineItem(_))
    );
}

// ==================== Transitions & freezing ====================

#[tokio::test]
async fn empty_draft_cannot_be_sent() {
    let ctx = TestContext::new().await;
    let client = ctx.seed_client().await;
    let quote = ctx
        .state
        .quotes
        .create_draft(draft_input(client.id))
        .await
        .unwrap();

    assert_matches!(
        ctx.state
            .quote_status
            .request_transition(quote.id, "sent", None, None)
            .await,
        Err(ServiceError::IllegalTransition {
            from: QuoteStatus::Draft,
            to: QuoteStatus::Sent,
        })
    );
}

#[tokio::test]
async fn full_path_to_accepted_freezes_items_and_records_history() {
    let ctx = TestContext::new().await;
    let client = ctx.seed_client().await;
    let product = ctx.seed_product("WID-1", dec!(50.00), dec!(10)).await;
    let actor = Uuid::new_v4();

    let quote = ctx
        .state
        .quotes
        .create_draft(draft_input(client.id))
        .await
        .unwrap();
    let item = ctx
        .state
        .quotes
        .add_item(
            quote.id,
            AddQuoteItemInput {
                product_id: product.id,
                quantity: dec!(1),
            },
        )
        .await
        .unwrap();

    for (target, expected) in [
        ("sent", QuoteStatus::Sent),
        ("viewed", QuoteStatus::Viewed),
        ("accepted", QuoteStatus::Accepted),
    ] {
        let updated = ctx
            .state
            .quote_status
            .request_transition(quote.id, target, None, Some(actor))
            .await
            .unwrap_or_else(|e| panic!("transition to {target} failed: {e}"));
        assert_eq!(updated.status, expected);
    }

    // Items are frozen from `sent` onwards, for every mutation kind.
    assert_matches!(
        ctx.state
            .quotes
            .add_item(
                quote.id,
                AddQuoteItemInput {
                    product_id: product.id,
                    quantity: dec!(1),
                },
            )
            .await,
        Err(ServiceError::QuoteNotEditable { .. })
    );
    assert_matches!(
        ctx.state
            .quotes
            .update_item(quote.id, item.id, UpdateQuoteItemInput { quantity: dec!(9) })
            .await,
        Err(ServiceError::QuoteNotEditable { .. })
    );
    assert_matches!(
        ctx.state.quotes.remove_item(quote.id, item.id).await,
        Err(ServiceError::QuoteNotEditable { .. })
    );

    let history = ctx.state.quote_status.history(quote.id).await.unwrap();
    let chain: Vec<_> = history.iter().map(|row| row.to_status).collect();
    assert_eq!(
        chain,
        vec![
            QuoteStatus::Draft,
            QuoteStatus::Sent,
            QuoteStatus::Viewed,
            QuoteStatus::Accepted,
        ]
    );
    assert_eq!(history[1].from_status, Some(QuoteStatus::Draft));
    assert_eq!(history[3].changed_by, Some(actor));
}

#[tokio::test]
async fn illegal_and_unknown_transitions_are_rejected() {
    let ctx = TestContext::new().await;
    let client = ctx.seed_client().await;
    let quote = ctx
        .state
        .quotes
        .create_draft(draft_input(client.id))
        .await
        .unwrap();

    assert_matches!(
        ctx.state
            .quote_status
            .request_transition(quote.id, "accepted", None, None)
            .await,
        Err(ServiceError::IllegalTransition {
            from: QuoteStatus::Draft,
            to: QuoteStatus::Accepted,
        })
    );
    assert_matches!(
        ctx.state
            .quote_status
            .request_transition(quote.id, "draft", None, None)
            .await,
        Err(ServiceError::IllegalTransition { .. })
    );
    assert_matches!(
        ctx.state
            .quote_status
            .request_transition(quote.id, "shipped", None, None)
            .await,
        Err(ServiceError::UnknownStatus(_))
    );
}

// ==================== Snapshot isolation ====================

#[tokio::test]
async fn later_product_changes_never_touch_existing_lines() {
    let ctx = TestContext::new().await;
    let client = ctx.seed_client().await;
    let product = ctx.seed_product("WID-1", dec!(100.00), dec!(20)).await;

    let quote = ctx
        .state
        .quotes
        .create_draft(draft_input(client.id))
        .await
        .unwrap();
    let item = ctx
        .state
        .quotes
        .add_item(
            quote.id,
            AddQuoteItemInput {
                product_id: product.id,
                quantity: dec!(2),
            },
        )
        .await
        .unwrap();

    // The catalog price doubles after the quote was drawn up.
    ctx.set_product_price(product.id, dec!(200.00)).await;

    let fetched = ctx.state.quotes.get_quote(quote.id).await.unwrap();
    assert_eq!(fetched.items[0].unit_price_ht, dec!(100.00));
    assert_eq!(fetched.quote.total_ttc, dec!(240.00));

    // Even a quantity change recomputes from the frozen price.
    let updated = ctx
        .state
        .quotes
        .update_item(quote.id, item.id, UpdateQuoteItemInput { quantity: dec!(3) })
        .await
        .unwrap();
    assert_eq!(updated.unit_price_ht, dec!(100.00));
    assert_eq!(updated.line_total_ht, dec!(300.00));

    // A new line, however, sees the new catalog price.
    let new_line = ctx
        .state
        .quotes
        .add_item(
            quote.id,
            AddQuoteItemInput {
                product_id: product.id,
                quantity: dec!(1),
            },
        )
        .await
        .unwrap();
    assert_eq!(new_line.unit_price_ht, dec!(200.00));
}

// ==================== Duplication ====================

#[tokio::test]
async fn duplicate_copies_snapshots_and_totals_verbatim() {
    let ctx = TestContext::new().await;
    let client = ctx.seed_client().await;
    let product = ctx.seed_product("WID-1", dec!(33.33), dec!(20)).await;

    let source = ctx
        .state
        .quotes
        .create_draft(draft_input(client.id))
        .await
        .unwrap();
    ctx.state
        .quotes
        .add_item(
            source.id,
            AddQuoteItemInput {
                product_id: product.id,
                quantity: dec!(3),
            },
        )
        .await
        .unwrap();
    ctx.state
        .quote_status
        .request_transition(source.id, "sent", None, None)
        .await
        .unwrap();

    // Catalog moves on; the duplicate must reflect the quote, not the catalog.
    ctx.set_product_price(product.id, dec!(99.99)).await;

    let copy = ctx
        .state
        .quotes
        .duplicate(source.id, None)
        .await
        .expect("duplicate failed");

    let source_fetched = ctx.state.quotes.get_quote(source.id).await.unwrap();
    assert_ne!(copy.quote.id, source.id);
    assert_ne!(copy.quote.quote_number, source_fetched.quote.quote_number);
    assert_eq!(copy.quote.status, QuoteStatus::Draft);
    assert_eq!(copy.quote.subtotal_ht, source_fetched.quote.subtotal_ht);
    assert_eq!(copy.quote.total_tax, source_fetched.quote.total_tax);
    assert_eq!(copy.quote.total_ttc, source_fetched.quote.total_ttc);
    assert_eq!(copy.items.len(), 1);
    assert_eq!(copy.items[0].unit_price_ht, dec!(33.33));

    // Source is untouched by the duplication.
    assert_eq!(source_fetched.quote.status, QuoteStatus::Sent);

    // Re-deriving the copy's totals from its items changes nothing.
    let rederived = ctx
        .state
        .quotes
        .update_item(
            copy.quote.id,
            copy.items[0].id,
            UpdateQuoteItemInput { quantity: dec!(3) },
        )
        .await
        .unwrap();
    assert_eq!(rederived.line_total_ht, copy.items[0].line_total_ht);
    let refetched = ctx.state.quotes.get_quote(copy.quote.id).await.unwrap();
    assert_eq!(refetched.quote.total_ttc, source_fetched.quote.total_ttc);
}

// ==================== Expiration ====================

#[tokio::test]
async fn expiration_is_derived_until_the_sweep_persists_it() {
    let ctx = TestContext::new().await;
    let client = ctx.seed_client().await;
    let product = ctx.seed_product("WID-1", dec!(10.00), dec!(20)).await;

    let quote = ctx
        .state
        .quotes
        .create_draft(draft_input(client.id))
        .await
        .unwrap();
    ctx.state
        .quotes
        .add_item(
            quote.id,
            AddQuoteItemInput {
                product_id: product.id,
                quantity: dec!(1),
            },
        )
        .await
        .unwrap();
    ctx.state
        .quote_status
        .request_transition(quote.id, "sent", None, None)
        .await
        .unwrap();

    ctx.force_valid_until(quote.id, Utc::now() - Duration::days(1))
        .await;

    // Reading the quote shows it as expired without mutating stored state.
    let document = ctx.state.quotes.export_document(quote.id).await.unwrap();
    assert!(document.is_expired);
    assert_eq!(document.status, QuoteStatus::Sent);

    let still_sent = ctx.state.quotes.get_quote(quote.id).await.unwrap();
    assert_eq!(still_sent.quote.status, QuoteStatus::Sent);

    // The sweep applies the stored transition with no actor.
    let swept = ctx
        .state
        .quote_status
        .mark_expired_quotes(Utc::now())
        .await
        .unwrap();
    assert_eq!(swept, 1);

    let expired = ctx.state.quotes.get_quote(quote.id).await.unwrap();
    assert_eq!(expired.quote.status, QuoteStatus::Expired);

    let history = ctx.state.quote_status.history(quote.id).await.unwrap();
    let last = history.last().unwrap();
    assert_eq!(last.to_status, QuoteStatus::Expired);
    assert_eq!(last.changed_by, None);

    // A second sweep finds nothing to do.
    let swept_again = ctx
        .state
        .quote_status
        .mark_expired_quotes(Utc::now())
        .await
        .unwrap();
    assert_eq!(swept_again, 0);
}

#[tokio::test]
async fn reissuing_an_expired_quote_requires_a_fresh_validity_window() {
    let ctx = TestContext::new().await;
    let client = ctx.seed_client().await;
    let product = ctx.seed_product("WID-1", dec!(10.00), dec!(20)).await;

    let quote = ctx
        .state
        .quotes
        .create_draft(draft_input(client.id))
        .await
        .unwrap();
    ctx.state
        .quotes
        .add_item(
            quote.id,
            AddQuoteItemInput {
                product_id: product.id,
                quantity: dec!(1),
            },
        )
        .await
        .unwrap();
    ctx.state
        .quote_status
        .request_transition(quote.id, "sent", None, None)
        .await
        .unwrap();
    ctx.force_valid_until(quote.id, Utc::now() - Duration::days(1))
        .await;
    ctx.state
        .quote_status
        .mark_expired_quotes(Utc::now())
        .await
        .unwrap();

    // Still carries the stale validity date: re-issue refused.
    assert_matches!(
        ctx.state
            .quote_status
            .request_transition(quote.id, "sent", None, None)
            .await,
        Err(ServiceError::IllegalTransition {
            from: QuoteStatus::Expired,
            to: QuoteStatus::Sent,
        })
    );

    ctx.state
        .quotes
        .update_validity(quote.id, Utc::now() + Duration::days(15))
        .await
        .unwrap();

    let reissued = ctx
        .state
        .quote_status
        .request_transition(quote.id, "sent", Some("Re-issued".to_string()), None)
        .await
        .unwrap();
    assert_eq!(reissued.status, QuoteStatus::Sent);
}

// ==================== Documents ====================

#[tokio::test]
async fn export_reads_client_live_and_hides_internal_notes() {
    let ctx = TestContext::new().await;
    let client = ctx.seed_client().await;
    let product = ctx.seed_product("WID-1", dec!(100.00), dec!(20)).await;

    let quote = ctx
        .state
        .quotes
        .create_draft(draft_input(client.id))
        .await
        .unwrap();
    ctx.state
        .quotes
        .add_item(
            quote.id,
            AddQuoteItemInput {
                product_id: product.id,
                quantity: dec!(2),
            },
        )
        .await
        .unwrap();

    let document = ctx.state.quotes.export_document(quote.id).await.unwrap();
    assert_eq!(document.client.company_name, "Acme Industries");
    assert_eq!(document.lines.len(), 1);
    assert_eq!(document.total_ttc, dec!(240.00));
    assert_eq!(document.currency_symbol, "€");
    assert_eq!(
        document.terms_conditions.as_deref(),
        Some("Payment within 30 days.")
    );

    let serialized = serde_json::to_string(&document).unwrap();
    assert!(!serialized.contains("Margin already at floor."));

    // Export changes nothing.
    let after = ctx.state.quotes.get_quote(quote.id).await.unwrap();
    assert_eq!(after.quote.status, QuoteStatus::Draft);
    assert_eq!(after.quote.version, quote.version + 1); // one bump from add_item
}

// ==================== Soft deletion ====================

#[tokio::test]
async fn deletion_is_restricted_and_never_reclaims_numbers() {
    let ctx = TestContext::new().await;
    let client = ctx.seed_client().await;
    let product = ctx.seed_product("WID-1", dec!(10.00), dec!(20)).await;

    let draft = ctx
        .state
        .quotes
        .create_draft(draft_input(client.id))
        .await
        .unwrap();
    assert_eq!(draft.quote_number, "QUO-000001");

    let sent = ctx
        .state
        .quotes
        .create_draft(draft_input(client.id))
        .await
        .unwrap();
    ctx.state
        .quotes
        .add_item(
            sent.id,
            AddQuoteItemInput {
                product_id: product.id,
                quantity: dec!(1),
            },
        )
        .await
        .unwrap();
    ctx.state
        .quote_status
        .request_transition(sent.id, "sent", None, None)
        .await
        .unwrap();

    // A sent quote could still convert; deletion refused.
    assert_matches!(
        ctx.state.quotes.delete_quote(sent.id).await,
        Err(ServiceError::QuoteNotDeletable {
            status: QuoteStatus::Sent,
            ..
        })
    );

    // Draft deletion succeeds and the quote disappears from reads.
    ctx.state.quotes.delete_quote(draft.id).await.unwrap();
    assert_matches!(
        ctx.state.quotes.get_quote(draft.id).await,
        Err(ServiceError::NotFound(_))
    );

    // A rejected quote is deletable too.
    ctx.state
        .quote_status
        .request_transition(sent.id, "rejected", Some("Lost the deal".to_string()), None)
        .await
        .unwrap();
    ctx.state.quotes.delete_quote(sent.id).await.unwrap();

    // Numbers of deleted quotes are never reissued.
    let next = ctx
        .state
        .quotes
        .create_draft(draft_input(client.id))
        .await
        .unwrap();
    assert_eq!(next.quote_number, "QUO-000003");
}

// ==================== Listing ====================

#[tokio::test]
async fn listing_filters_by_client_and_status() {
    let ctx = TestContext::new().await;
    let client_a = ctx.seed_client().await;
    let client_b = ctx.seed_client().await;
    let product = ctx.seed_product("WID-1", dec!(10.00), dec!(20)).await;

    let first = ctx
        .state
        .quotes
        .create_draft(draft_input(client_a.id))
        .await
        .unwrap();
    ctx.state
        .quotes
        .create_draft(draft_input(client_a.id))
        .await
        .unwrap();
    ctx.state
        .quotes
        .create_draft(draft_input(client_b.id))
        .await
        .unwrap();

    ctx.state
        .quotes
        .add_item(
            first.id,
            AddQuoteItemInput {
                product_id: product.id,
                quantity: dec!(1),
            },
        )
        .await
        .unwrap();
    ctx.state
        .quote_status
        .request_transition(first.id, "sent", None, None)
        .await
        .unwrap();

    let by_client = ctx
        .state
        .quotes
        .list_quotes(
            QuoteListFilter {
                client_id: Some(client_a.id),
                status: None,
            },
            1,
            20,
        )
        .await
        .unwrap();
    assert_eq!(by_client.total, 2);

    let sent_only = ctx
        .state
        .quotes
        .list_quotes(
            QuoteListFilter {
                client_id: None,
                status: Some(QuoteStatus::Sent),
            },
            1,
            20,
        )
        .await
        .unwrap();
    assert_eq!(sent_only.total, 1);
    assert_eq!(sent_only.quotes[0].id, first.id);

    let paged = ctx
        .state
        .quotes
        .list_quotes(QuoteListFilter::default(), 1, 2)
        .await
        .unwrap();
    assert_eq!(paged.total, 3);
    assert_eq!(paged.quotes.len(), 2);
}

// ==================== Currency pinning ====================

#[tokio::test]
async fn currency_mismatch_between_product_and_quote_is_rejected() {
    let ctx = TestContext::new().await;
    let client = ctx.seed_client().await;
    let product = ctx.seed_product("WID-1", dec!(10.00), dec!(20)).await; // EUR

    let mut input = draft_input(client.id);
    input.currency_code = Some("USD".to_string());
    let quote = ctx.state.quotes.create_draft(input).await.unwrap();
    assert_eq!(quote.currency_code, "USD");
    assert_eq!(quote.currency_symbol, "$");

    assert_matches!(
        ctx.state
            .quotes
            .add_item(
                quote.id,
                AddQuoteItemInput {
                    product_id: product.id,
                    quantity: dec!(1),
                },
            )
            .await,
        Err(ServiceError::ValidationError(_))
    );
}
