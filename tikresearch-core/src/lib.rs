// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `TikResearch` Core
//!
//! Core types, models, normalization and validation for the `TikResearch`
//! client.
//!
//! This crate does no I/O. It provides:
//!
//! - The query model and the Research API endpoint catalogue
//! - Response pages and opaque cursors
//! - Normalization of raw records into flat rows
//! - Query and record validation
//! - Error types
//!
//! ## Key Types
//!
//! ### Queries
//! - [`Query`] - One request stream against one endpoint
//! - [`Target`] - What a query asks for
//! - [`Filter`] / [`Condition`] - Boolean video query expression
//! - [`Endpoint`] - Research API endpoints
//!
//! ### Responses
//! - [`Page`] - One response worth of raw records
//! - [`Cursor`] - Continuation token, sent back verbatim
//! - [`ApiResponse`] - The `{data, error}` envelope
//!
//! ### Results
//! - [`Record`] - A normalized, flat row
//! - [`Value`] - A cell
//! - [`Table`] - Rows with a shared column list
//!
//! ### Validation
//! - [`Schema`] - Expected shape of an endpoint's records
//! - [`CoreError`] - `InvalidQuery` and `Schema` errors

pub mod error;
pub mod models;
pub mod normalize;
pub mod validation;

// Re-export error types
pub use error::{CoreError, Violation};

// Re-export all model types
pub use models::{
    // Queries
    Condition,
    Endpoint,
    FieldName,
    Filter,
    Operation,
    Query,
    Target,
    // Responses
    ApiErrorBody,
    ApiResponse,
    Cursor,
    Page,
    // Results
    Record,
    Table,
    Value,
    // Regions
    VideoLength,
    REGION_CODES,
    is_known_region,
    // Dates and limits
    API_DATE_FORMAT,
    MAX_PAGE_SIZE,
    MAX_WINDOW_DAYS,
    format_api_date,
    parse_api_date,
};

pub use normalize::{normalize, normalize_record};
pub use validation::{FieldSpec, FieldType, Schema};
