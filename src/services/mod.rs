//! Service layer: the operations the presentation layer consumes.

pub mod conversion;
pub mod quote_status;
pub mod quotes;
pub mod sequences;

pub use conversion::QuoteConversionService;
pub use quote_status::QuoteStatusService;
pub use quotes::QuoteService;
pub use sequences::{NumberAllocator, SequenceKind, SqlNumberAllocator};
