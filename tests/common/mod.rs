//! Shared harness for integration tests: an in-memory SQLite database with
//! the full schema, the wired services, and seed helpers.
#![allow(dead_code)]

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use tokio::sync::mpsc;
use uuid::Uuid;

use quoteflow::{
    config::AppConfig,
    entities::{client, product, quote},
    events::Event,
    AppState,
};

pub struct TestContext {
    pub state: AppState,
    pub events: mpsc::Receiver<Event>,
}

impl TestContext {
    /// Fresh application state over a private in-memory database.
    pub async fn new() -> Self {
        let mut config = AppConfig::new("sqlite::memory:", "test");
        config.auto_migrate = true;
        // One connection keeps the in-memory database alive and shared.
        config.db_max_connections = 1;
        config.db_min_connections = 1;

        let (state, events) = AppState::initialize(config)
            .await
            .expect("failed to initialize test application");

        Self { state, events }
    }

    pub async fn seed_client(&self) -> client::Model {
        client::ActiveModel {
            id: Set(Uuid::new_v4()),
            company_name: Set("Acme Industries".to_string()),
            contact_name: Set("Jeanne Martin".to_string()),
            email: Set("jeanne.martin@acme.test".to_string()),
            phone: Set(Some("+33 1 23 45 67 89".to_string())),
            address: Set(Some("12 rue des Forges, 69002 Lyon".to_string())),
            tax_id: Set(Some("FR40123456789".to_string())),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        }
        .insert(&*self.state.db)
        .await
        .expect("failed to seed client")
    }

    pub async fn seed_product(
        &self,
        sku: &str,
        unit_price_ht: Decimal,
        tax_rate: Decimal,
    ) -> product::Model {
        product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(format!("Product {sku}")),
            description: Set(Some(format!("Description of {sku}"))),
            sku: Set(sku.to_string()),
            unit_price_ht: Set(unit_price_ht),
            currency: Set("EUR".to_string()),
            tax_rate: Set(tax_rate),
            is_active: Set(true),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        }
        .insert(&*self.state.db)
        .await
        .expect("failed to seed product")
    }

    /// Changes a product's catalog price after the fact, as the catalog
    /// admin would.
    pub async fn set_product_price(&self, product_id: Uuid, unit_price_ht: Decimal) {
        let mut product: product::ActiveModel = product::Entity::find_by_id(product_id)
            .one(&*self.state.db)
            .await
            .expect("product query failed")
            .expect("product not found")
            .into();
        product.unit_price_ht = Set(unit_price_ht);
        product.updated_at = Set(Some(Utc::now()));
        product.update(&*self.state.db).await.expect("price update failed");
    }

    /// Rewrites a quote's validity date directly, simulating the passage of
    /// time without waiting for it.
    pub async fn force_valid_until(&self, quote_id: Uuid, valid_until: DateTime<Utc>) {
        let mut quote: quote::ActiveModel = quote::Entity::find_by_id(quote_id)
            .one(&*self.state.db)
            .await
            .expect("quote query failed")
            .expect("quote not found")
            .into();
        quote.valid_until = Set(valid_until);
        quote.update(&*self.state.db).await.expect("validity update failed");
    }
}
