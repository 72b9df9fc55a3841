//! Document number allocation.
//!
//! Quote and order numbers are globally unique, monotonically assigned, and
//! never reused, even when the owning record is soft-deleted. Allocation
//! goes through the [`NumberAllocator`] interface backed by the
//! `number_sequences` table, never a process-local counter, which would
//! reset on restart and collide across instances.

use async_trait::async_trait;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter, Set,
};
use tracing::debug;

use crate::entities::number_sequence::{self, Entity as SequenceEntity};
use crate::errors::ServiceError;

/// Upper bound on optimistic allocation retries.
const MAX_ALLOCATION_ATTEMPTS: usize = 5;

const DEFAULT_PADDING: i32 = 6;

/// The sequences this core allocates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceKind {
    Quote,
    Order,
}

impl SequenceKind {
    pub fn name(self) -> &'static str {
        match self {
            SequenceKind::Quote => "quote",
            SequenceKind::Order => "order",
        }
    }

    pub fn prefix(self) -> &'static str {
        match self {
            SequenceKind::Quote => "QUO-",
            SequenceKind::Order => "ORD-",
        }
    }
}

/// Allocates the next document number of a given kind.
///
/// Runs inside the caller's transaction so an aborted operation rolls the
/// counter back with everything else: no gaps from failed attempts, and a
/// number only ever leaves the allocator attached to a committed row.
#[async_trait]
pub trait NumberAllocator: Send + Sync {
    async fn next_number(
        &self,
        txn: &DatabaseTransaction,
        kind: SequenceKind,
    ) -> Result<String, ServiceError>;
}

/// `number_sequences`-backed allocator using an optimistic compare-and-swap.
#[derive(Debug, Clone, Default)]
pub struct SqlNumberAllocator;

#[async_trait]
impl NumberAllocator for SqlNumberAllocator {
    async fn next_number(
        &self,
        txn: &DatabaseTransaction,
        kind: SequenceKind,
    ) -> Result<String, ServiceError> {
        for _ in 0..MAX_ALLOCATION_ATTEMPTS {
            match SequenceEntity::find_by_id(kind.name()).one(txn).await? {
                None => {
                    // First allocation for this kind: seed the row and hand
                    // out 1. A concurrent seeder may win the insert; retry
                    // through the CAS path in that case.
                    let seeded = number_sequence::ActiveModel {
                        name: Set(kind.name().to_string()),
                        prefix: Set(kind.prefix().to_string()),
                        next_value: Set(2),
                        padding: Set(DEFAULT_PADDING),
                    };
                    match seeded.insert(txn).await {
                        Ok(_) => return Ok(format_number(kind.prefix(), 1, DEFAULT_PADDING)),
                        Err(e) => {
                            debug!(sequence = kind.name(), error = %e, "Lost sequence seeding race, retrying");
                            continue;
                        }
                    }
                }
                Some(row) => {
                    let claimed = row.next_value;
                    let updated = SequenceEntity::update_many()
                        .col_expr(number_sequence::Column::NextValue, Expr::value(claimed + 1))
                        .filter(number_sequence::Column::Name.eq(kind.name()))
                        .filter(number_sequence::Column::NextValue.eq(claimed))
                        .exec(txn)
                        .await?;

                    if updated.rows_affected == 1 {
                        return Ok(format_number(&row.prefix, claimed, row.padding));
                    }
                    // Another writer advanced the counter between our read
                    // and the update; re-read and try again.
                }
            }
        }

        Err(ServiceError::db_error(format!(
            "number sequence '{}' still contended after {} attempts",
            kind.name(),
            MAX_ALLOCATION_ATTEMPTS
        )))
    }
}

fn format_number(prefix: &str, value: i64, padding: i32) -> String {
    format!(
        "{}{:0width$}",
        prefix,
        value,
        width = padding.max(0) as usize
    )
}
