//! Auth-domain identifiers, providers, and token models.

pub mod id;
pub mod provider;
pub mod token;

pub use id::*;
pub use provider::*;
pub use token::{record::*, row::*, secret::*};
