//! Conversion tests: an accepted quote becomes a binding order exactly once,
//! atomically, with totals copied verbatim from the quote's snapshots.

mod common;

use assert_matches::assert_matches;
use common::TestContext;
use rust_decimal_macros::dec;
use uuid::Uuid;

use quoteflow::{
    entities::quote::QuoteStatus,
    errors::ServiceError,
    services::quotes::{AddQuoteItemInput, CreateQuoteInput},
};

async fn accepted_quote(ctx: &TestContext) -> Uuid {
    let client = ctx.seed_client().await;
    let widget = ctx.seed_product("WID-1", dec!(100.00), dec!(20)).await;
    let gasket = ctx.seed_product("GSK-1", dec!(7.25), dec!(5.5)).await;

    let quote = ctx
        .state
        .quotes
        .create_draft(CreateQuoteInput {
            client_id: client.id,
            currency_code: None,
            valid_until: None,
            terms_conditions: None,
            notes: None,
            internal_notes: None,
            created_by: None,
        })
        .await
        .expect("draft creation failed");

    for (product_id, quantity) in [(widget.id, dec!(2)), (gasket.id, dec!(4))] {
        ctx.state
            .quotes
            .add_item(
                quote.id,
                AddQuoteItemInput {
                    product_id,
                    quantity,
                },
            )
            .await
            .expect("add_item failed");
    }

    for target in ["sent", "accepted"] {
        ctx.state
            .quote_status
            .request_transition(quote.id, target, None, None)
            .await
            .expect("transition failed");
    }

    quote.id
}

#[tokio::test]
async fn converting_an_accepted_quote_creates_a_verbatim_order() {
    let ctx = TestContext::new().await;
    let quote_id = accepted_quote(&ctx).await;
    let actor = Uuid::new_v4();

    let order = ctx
        .state
        .conversion
        .convert_to_order(quote_id, Some(actor))
        .await
        .expect("conversion failed");

    assert_eq!(order.order_number, "ORD-000001");
    assert_eq!(order.quote_id, quote_id);
    assert_eq!(order.status, "open");
    assert_eq!(order.created_by, Some(actor));

    // 2 x 100.00 @ 20% = 200.00 / 40.00; 4 x 7.25 @ 5.5% = 29.00 / 1.60.
    assert_eq!(order.subtotal_ht, dec!(229.00));
    assert_eq!(order.total_tax, dec!(41.60));
    assert_eq!(order.total_ttc, dec!(270.60));

    let quote = ctx.state.quotes.get_quote(quote_id).await.unwrap();
    assert_eq!(quote.quote.status, QuoteStatus::Converted);
    assert_eq!(quote.quote.converted_order_id, Some(order.id));

    // Order totals match the quote cache cent for cent.
    assert_eq!(order.subtotal_ht, quote.quote.subtotal_ht);
    assert_eq!(order.total_tax, quote.quote.total_tax);
    assert_eq!(order.total_ttc, quote.quote.total_ttc);

    // Items are copied with their snapshots and amounts.
    let (_, order_items) = ctx
        .state
        .conversion
        .order_for_quote(quote_id)
        .await
        .unwrap()
        .expect("order should exist");
    assert_eq!(order_items.len(), quote.items.len());
    for (order_item, quote_item) in order_items.iter().zip(quote.items.iter()) {
        assert_eq!(order_item.quote_item_id, quote_item.id);
        assert_eq!(order_item.product_sku, quote_item.product_sku);
        assert_eq!(order_item.quantity, quote_item.quantity);
        assert_eq!(order_item.unit_price_ht, quote_item.unit_price_ht);
        assert_eq!(order_item.tax_rate, quote_item.tax_rate);
        assert_eq!(order_item.line_total_ttc, quote_item.line_total_ttc);
    }

    // History closes with accepted -> converted.
    let history = ctx.state.quote_status.history(quote_id).await.unwrap();
    let last = history.last().unwrap();
    assert_eq!(last.from_status, Some(QuoteStatus::Accepted));
    assert_eq!(last.to_status, QuoteStatus::Converted);
    assert_eq!(last.changed_by, Some(actor));
}

#[tokio::test]
async fn conversion_is_idempotent() {
    let ctx = TestContext::new().await;
    let quote_id = accepted_quote(&ctx).await;

    let order = ctx
        .state
        .conversion
        .convert_to_order(quote_id, None)
        .await
        .expect("first conversion failed");

    // The second call signals and writes nothing.
    let second = ctx.state.conversion.convert_to_order(quote_id, None).await;
    match second {
        Err(ServiceError::AlreadyConverted {
            quote_id: reported_quote,
            order_id,
        }) => {
            assert_eq!(reported_quote, quote_id);
            assert_eq!(order_id, order.id);
        }
        other => panic!("expected AlreadyConverted, got {other:?}"),
    }

    // Exactly one order exists for the quote.
    let (existing, items) = ctx
        .state
        .conversion
        .order_for_quote(quote_id)
        .await
        .unwrap()
        .expect("order should exist");
    assert_eq!(existing.id, order.id);
    assert_eq!(items.len(), 2);

    // And exactly one converted history row.
    let history = ctx.state.quote_status.history(quote_id).await.unwrap();
    let converted_rows = history
        .iter()
        .filter(|row| row.to_status == QuoteStatus::Converted)
        .count();
    assert_eq!(converted_rows, 1);
}

#[tokio::test]
async fn only_accepted_quotes_convert() {
    let ctx = TestContext::new().await;
    let client = ctx.seed_client().await;
    let product = ctx.seed_product("WID-1", dec!(10.00), dec!(20)).await;

    let quote = ctx
        .state
        .quotes
        .create_draft(CreateQuoteInput {
            client_id: client.id,
            currency_code: None,
            valid_until: None,
            terms_conditions: None,
            notes: None,
            internal_notes: None,
            created_by: None,
        })
        .await
        .unwrap();

    assert_matches!(
        ctx.state.conversion.convert_to_order(quote.id, None).await,
        Err(ServiceError::NotConvertible {
            status: QuoteStatus::Draft,
            ..
        })
    );

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

    assert_matches!(
        ctx.state.conversion.convert_to_order(quote.id, None).await,
        Err(ServiceError::NotConvertible {
            status: QuoteStatus::Sent,
            ..
        })
    );
}

#[tokio::test]
async fn converted_is_not_reachable_through_request_transition() {
    let ctx = TestContext::new().await;
    let quote_id = accepted_quote(&ctx).await;

    // The edge exists in the table but only the conversion service may take
    // it: a bare status flip would strand a converted quote with no order.
    assert_matches!(
        ctx.state
            .quote_status
            .request_transition(quote_id, "converted", None, None)
            .await,
        Err(ServiceError::NotConvertible { .. })
    );

    let quote = ctx.state.quotes.get_quote(quote_id).await.unwrap();
    assert_eq!(quote.quote.status, QuoteStatus::Accepted);
}

#[tokio::test]
async fn orders_are_immune_to_later_catalog_changes() {
    let ctx = TestContext::new().await;
    let quote_id = accepted_quote(&ctx).await;

    let order = ctx
        .state
        .conversion
        .convert_to_order(quote_id, None)
        .await
        .unwrap();

    let quote = ctx.state.quotes.get_quote(quote_id).await.unwrap();
    let product_id = quote.items[0].product_id.expect("traceability reference");
    ctx.set_product_price(product_id, dec!(999.99)).await;

    let (reloaded, items) = ctx
        .state
        .conversion
        .order_for_quote(quote_id)
        .await
        .unwrap()
        .expect("order should exist");
    assert_eq!(reloaded.total_ttc, order.total_ttc);
    assert_eq!(items[0].unit_price_ht, dec!(100.00));
}

#[tokio::test]
async fn order_numbers_run_on_their_own_sequence() {
    let ctx = TestContext::new().await;
    let first_quote = accepted_quote(&ctx).await;

    let order = ctx
        .state
        .conversion
        .convert_to_order(first_quote, None)
        .await
        .unwrap();

    // Quotes already consumed QUO-000001; the order sequence starts fresh.
    assert_eq!(order.order_number, "ORD-000001");

    let client = ctx.seed_client().await;
    let product = ctx.seed_product("WID-9", dec!(5.00), dec!(20)).await;
    let quote = ctx
        .state
        .quotes
        .create_draft(CreateQuoteInput {
            client_id: client.id,
            currency_code: None,
            valid_until: None,
            terms_conditions: None,
            notes: None,
            internal_notes: None,
            created_by: None,
        })
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
    for target in ["sent", "accepted"] {
        ctx.state
            .quote_status
            .request_transition(quote.id, target, None, None)
            .await
            .unwrap();
    }

    let second_order = ctx
        .state
        .conversion
        .convert_to_order(quote.id, None)
        .await
        .unwrap();
    assert_eq!(second_order.order_number, "ORD-000002");
}
