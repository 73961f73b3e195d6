//! Cooperative cancellation for pipeline invocations.

mod token;

pub use token::CancellationToken;
