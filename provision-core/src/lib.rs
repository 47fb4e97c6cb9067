pub mod error;
pub mod id;
pub mod objects;
pub mod state;
pub mod transaction;
pub mod value;

// Re-export the main types for convenience
pub use error::ProvisionError;
pub use id::{Fingerprint, ObjectId};
pub use objects::{
    FactoryObject, InstanceObject, InstanceRecord, LedgerObject, LogicObject, ObjectKind,
    ProxyObject, UpgradeRecord,
};
pub use state::{StateDelta, StateStore};
pub use transaction::{
    CommitmentLevel, Event, ObjectChange, ObjectEffect, Operation, OperationHash, Receipt,
};
pub use value::{Args, Value};

/// Milliseconds since the Unix epoch, as stamped on receipts and records
pub fn current_timestamp() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
