//! Utility functions for timestamps and input validation.

pub mod timestamps;
mod validation;

pub use timestamps::{format_iso8601, iso_timestamp, Timestamp};
pub use validation::{validate_process_name, MAX_PROCESS_NAME_LEN};
