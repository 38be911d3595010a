//! Token lifecycle stages: decide, execute, process.
//!
//! [`determine_refresh_action`] is a pure function over the stored record, the clock reading,
//! and the refresh buffer. The executor stage (`Broker::execute_refresh`) performs the single
//! `grant_type=refresh_token` call and reports a [`RefreshResult`], which
//! [`process_refresh_result`] merges back into the stored record. Only the executor touches
//! the network, so each stage is testable on its own.

mod decision;
mod executor;
mod expiry;
mod metrics;
mod process;

pub use decision::*;
pub use executor::*;
pub use expiry::*;
pub use metrics::RefreshMetrics;
pub use process::*;
