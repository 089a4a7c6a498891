//! Parsing service access
//!
//! The [`ParseService`] trait captures the contract the batch driver needs from
//! the document parser: submit a document with its parser configuration, ask
//! for a job's status, and download one artifact format for a finished job.
//! [`ParsrClient`] implements it over the service's HTTP API.

mod http;
mod traits;

pub use http::ParsrClient;
pub use traits::ParseService;
