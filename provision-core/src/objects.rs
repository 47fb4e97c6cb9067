use crate::id::ObjectId;
use crate::state::StateStore;
use crate::value::Args;
use serde::{Deserialize, Serialize};

/// Enum to represent the different kinds of ledger objects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectKind {
    /// Published, immutable behavior (a template or a proxy logic module)
    Logic,
    /// Registry that spawns instances from one template
    Factory,
    /// Spawned instance with its own state and owner
    Instance,
    /// Upgradeable state container pointing at swappable logic
    Proxy,
}

/// A published logic module
///
/// Logic objects are written once by `publish_logic` and never change, so
/// anything that references one by id sees the same behavior forever.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicObject {
    pub id: ObjectId,
    pub publisher: ObjectId,
    pub name: String,
    pub version: u32,
    /// blake3 hash of the behavior descriptor
    pub code_hash: [u8; 32],
}

/// One entry of a factory's creation log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceRecord {
    pub instance: ObjectId,
    pub owner: ObjectId,
    pub params: Args,
    /// Ledger sequence number of the spawning operation
    pub sequence: u64,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactoryObject {
    pub id: ObjectId,
    pub deployer: ObjectId,
    /// Fixed at construction; there is no operation that changes it
    pub template: ObjectId,
    /// Append-only, in creation order
    pub instances: Vec<InstanceRecord>,
}

impl FactoryObject {
    pub fn new(id: ObjectId, deployer: ObjectId, template: ObjectId) -> Self {
        Self {
            id,
            deployer,
            template,
            instances: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceObject {
    pub id: ObjectId,
    /// Set at spawn time, never transferred
    pub owner: ObjectId,
    pub factory: ObjectId,
    pub template: ObjectId,
    pub params: Args,
    pub state: StateStore,
}

/// One logic swap in a proxy's history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeRecord {
    pub previous: ObjectId,
    pub logic: ObjectId,
    pub sequence: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyObject {
    pub id: ObjectId,
    pub deployer: ObjectId,
    /// Null until `initialize`
    pub admin: ObjectId,
    pub initialized: bool,
    /// Currently active logic module
    pub logic: ObjectId,
    pub upgrades: Vec<UpgradeRecord>,
    pub state: StateStore,
}

impl ProxyObject {
    pub fn new(id: ObjectId, deployer: ObjectId, logic: ObjectId) -> Self {
        Self {
            id,
            deployer,
            admin: ObjectId::null(),
            initialized: false,
            logic,
            upgrades: Vec::new(),
            state: StateStore::new(),
        }
    }

    /// Whether `caller` holds admin rights; nobody does before initialization
    pub fn is_admin(&self, caller: &ObjectId) -> bool {
        self.initialized && !self.admin.is_null() && self.admin == *caller
    }
}

/// Any object stored on the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerObject {
    Logic(LogicObject),
    Factory(FactoryObject),
    Instance(InstanceObject),
    Proxy(ProxyObject),
}

impl LedgerObject {
    pub fn id(&self) -> &ObjectId {
        match self {
            LedgerObject::Logic(logic) => &logic.id,
            LedgerObject::Factory(factory) => &factory.id,
            LedgerObject::Instance(instance) => &instance.id,
            LedgerObject::Proxy(proxy) => &proxy.id,
        }
    }

    pub fn kind(&self) -> ObjectKind {
        match self {
            LedgerObject::Logic(_) => ObjectKind::Logic,
            LedgerObject::Factory(_) => ObjectKind::Factory,
            LedgerObject::Instance(_) => ObjectKind::Instance,
            LedgerObject::Proxy(_) => ObjectKind::Proxy,
        }
    }

    pub fn as_logic(&self) -> Option<&LogicObject> {
        match self {
            LedgerObject::Logic(logic) => Some(logic),
            _ => None,
        }
    }

    pub fn as_factory(&self) -> Option<&FactoryObject> {
        match self {
            LedgerObject::Factory(factory) => Some(factory),
            _ => None,
        }
    }

    pub fn as_instance(&self) -> Option<&InstanceObject> {
        match self {
            LedgerObject::Instance(instance) => Some(instance),
            _ => None,
        }
    }

    pub fn as_proxy(&self) -> Option<&ProxyObject> {
        match self {
            LedgerObject::Proxy(proxy) => Some(proxy),
            _ => None,
        }
    }
}
