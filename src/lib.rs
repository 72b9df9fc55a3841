//! Quoteflow
//!
//! Quote lifecycle and financial computation core for a catalog/CRM backend.
//! Covers the path from draft quote through approval to an immutable sales
//! order: deterministic HT/tax/TTC totals derived from snapshot-isolated
//! line items, a status state machine with append-only history, and an
//! atomic, at-most-once conversion into a binding order.
//!
//! Transport, authentication, and catalog CRUD belong to the surrounding
//! application; the public surface here is [`AppState`] and the async
//! service methods it exposes.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod logging;
pub mod migrator;
pub mod pricing;
pub mod services;

use std::sync::Arc;

use sea_orm::DatabaseConnection;
use tokio::sync::mpsc;

use crate::config::AppConfig;
use crate::events::{Event, EventSender};
use crate::services::{
    NumberAllocator, QuoteConversionService, QuoteService, QuoteStatusService, SqlNumberAllocator,
};

/// Shared application state: the pool, configuration, event channel, and
/// the quote services, wired once at startup and cloned cheaply.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: AppConfig,
    pub event_sender: EventSender,
    pub quotes: QuoteService,
    pub quote_status: QuoteStatusService,
    pub conversion: QuoteConversionService,
}

impl AppState {
    /// Connects to the database, optionally migrates, and wires the
    /// services. Returns the state and the receiving end of the event
    /// channel for the embedding application to consume.
    pub async fn initialize(config: AppConfig) -> anyhow::Result<(Self, mpsc::Receiver<Event>)> {
        let db_config = db::DbConfig::from_app_config(&config);
        let pool = db::establish_connection_with_config(&db_config).await?;

        if config.auto_migrate {
            db::run_migrations(&pool).await?;
        }

        let db = Arc::new(pool);
        let (event_sender, event_receiver) = events::channel();
        let allocator: Arc<dyn NumberAllocator> = Arc::new(SqlNumberAllocator);

        let quotes = QuoteService::new(
            db.clone(),
            event_sender.clone(),
            allocator.clone(),
            config.quotes.clone(),
        );
        let quote_status = QuoteStatusService::new(db.clone(), event_sender.clone());
        let conversion =
            QuoteConversionService::new(db.clone(), event_sender.clone(), allocator);

        Ok((
            Self {
                db,
                config,
                event_sender,
                quotes,
                quote_status,
                conversion,
            },
            event_receiver,
        ))
    }
}
