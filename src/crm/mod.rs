//! CRM access: the upstream client, its errors, and cursor pagination.

pub mod client;
pub mod error;
pub mod paging;

pub use client::{ClientConfig, CrmSource, HubSpotClient};
pub use error::CrmError;
pub use paging::{follow_cursor, FailurePolicy, Fetched};
