pub mod behavior;
pub mod config;
pub mod context;
pub mod ledger;
pub mod runtime;

// Re-export the main types for convenience
pub use behavior::{unknown_method, Behavior, LogicRegistry};
pub use config::LedgerConfig;
pub use context::CallContext;
pub use ledger::Ledger;
pub use runtime::Runtime;

// Re-export types from provision-core
pub use provision_core::{Args, Event, ObjectId, Operation, ProvisionError, Receipt, Value};
