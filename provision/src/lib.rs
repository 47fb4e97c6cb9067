//! Versioned instance provisioning
//!
//! This crate re-exports all the components: template factories, upgradeable
//! instances, the operation journal and the bundled templates.

pub use provision_core::*;
pub use provision_journal::*;
pub use provision_runtime::*;
pub use provision_templates::*;
