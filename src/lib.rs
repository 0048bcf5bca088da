//! IT support incident log: normalization, grouped statistics and a
//! four-page printable report.
//!
//! Data flows one way: the backing CSV is read and normalized on every
//! operation ([`loader`]), [`aggregate`] ranks and buckets it, [`query`]
//! exposes those statistics, and [`report`] composes and renders the
//! document. [`store`] owns appends and deletes on the file.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod loader;
pub mod output;
pub mod query;
pub mod report;
pub mod store;
pub mod types;
pub mod util;

pub use error::{ReportError, Result};
