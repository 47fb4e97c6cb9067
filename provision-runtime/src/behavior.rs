use crate::context::CallContext;
use provision_core::error::ProvisionError;
use provision_core::id::ObjectId;
use provision_core::value::{Args, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Trait defining a logic module: the behavior shared by every instance of a
/// template, or the active logic of a proxy
///
/// A behavior holds no per-instance data. Everything it persists goes into
/// the [`CallContext`] state of the object it is executing against.
pub trait Behavior: Send + Sync {
    /// Get a string identifier for this behavior
    fn name(&self) -> &str;

    /// Version of the behavior; distinct versions of one name may coexist
    fn version(&self) -> u32 {
        1
    }

    /// Methods accepted by [`Behavior::call`]
    fn methods(&self) -> &[&'static str];

    /// Runs exactly once per instance, right after its (empty) state is created
    fn initialize(&self, ctx: &mut CallContext<'_>, params: &Args) -> Result<(), ProvisionError>;

    /// Execute a method against the context's state
    fn call(&self, ctx: &mut CallContext<'_>, method: &str, args: &Args) -> Result<Value, ProvisionError>;

    /// blake3 hash of the behavior descriptor (name, version, methods)
    fn code_hash(&self) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.name().as_bytes());
        hasher.update(&self.version().to_le_bytes());
        for method in self.methods() {
            hasher.update(b"\0");
            hasher.update(method.as_bytes());
        }
        *hasher.finalize().as_bytes()
    }

    fn supports(&self, method: &str) -> bool {
        self.methods().contains(&method)
    }
}

/// Error for a method the behavior does not implement
pub fn unknown_method(behavior: &dyn Behavior, method: &str) -> ProvisionError {
    ProvisionError::UnknownMethod {
        logic: format!("{} v{}", behavior.name(), behavior.version()),
        method: method.to_string(),
    }
}

/// Registry of published logic modules, keyed by their ledger id
#[derive(Default)]
pub struct LogicRegistry {
    modules: HashMap<ObjectId, Arc<dyn Behavior>>,
}

impl LogicRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module under `id`. Registered modules are never replaced;
    /// returns false if `id` is already taken.
    pub fn register(&mut self, id: ObjectId, behavior: Arc<dyn Behavior>) -> bool {
        if self.modules.contains_key(&id) {
            return false;
        }
        self.modules.insert(id, behavior);
        true
    }

    pub fn get(&self, id: &ObjectId) -> Option<Arc<dyn Behavior>> {
        self.modules.get(id).cloned()
    }

    pub fn contains(&self, id: &ObjectId) -> bool {
        self.modules.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
