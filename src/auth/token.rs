//! Access token records and redacted secret wrappers.

pub mod record;
pub mod secret;
