//! Domain models for TikResearch.
//!
//! ## Submodules
//!
//! - [`endpoint`] - The Research API endpoint catalogue
//! - [`query`] - Query, Target, Filter and Condition
//! - [`page`] - Response envelopes, pages and cursors
//! - [`record`] - Normalized values, records and tables
//! - [`region`] - Region codes and video length buckets

pub mod endpoint;
pub mod page;
pub mod query;
pub mod record;
pub mod region;

// Re-export everything at the models level
pub use endpoint::Endpoint;
pub use page::{ApiErrorBody, ApiResponse, Cursor, Page};
pub use query::{
    format_api_date, parse_api_date, Condition, FieldName, Filter, Operation, Query, Target,
    API_DATE_FORMAT, MAX_PAGE_SIZE, MAX_WINDOW_DAYS,
};
pub use record::{Record, Table, Value};
pub use region::{is_known_region, VideoLength, REGION_CODES};
#[cfg(test)]
mod serde_tests;
