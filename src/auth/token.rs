//! Token records, their persisted row shape, and redacted secrets.

pub mod record;
pub mod row;
pub mod secret;
