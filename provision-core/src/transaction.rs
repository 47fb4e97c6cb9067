use crate::error::ProvisionError;
use crate::id::ObjectId;
use crate::objects::{InstanceRecord, LedgerObject, UpgradeRecord};
use crate::state::{StateDelta, StateStore};
use crate::value::{Args, Value};
use serde::{Deserialize, Serialize};

/// Operation hash type (32-byte array)
pub type OperationHash = [u8; 32];

/// A state-changing request submitted to the ledger by a caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Create a factory bound to a published template
    DeployFactory { template: ObjectId },

    /// Spawn a new instance from a factory's template
    Spawn { factory: ObjectId, params: Args },

    /// Create an upgradeable state container pointing at `logic`.
    /// With `init` set, the deployer initializes it in the same operation.
    DeployProxy { logic: ObjectId, init: Option<Args> },

    /// One-time initialization of a proxy; the caller becomes admin
    Initialize { proxy: ObjectId, params: Args },

    /// Point a proxy at new logic, keeping its state
    Upgrade { proxy: ObjectId, logic: ObjectId },

    /// Invoke a method of an instance's or a proxy's active logic
    Call {
        target: ObjectId,
        method: String,
        args: Args,
    },
}

impl Operation {
    /// Short label used in logs
    pub fn label(&self) -> &str {
        match self {
            Operation::DeployFactory { .. } => "deploy_factory",
            Operation::Spawn { .. } => "spawn",
            Operation::DeployProxy { .. } => "deploy_proxy",
            Operation::Initialize { .. } => "initialize",
            Operation::Upgrade { .. } => "upgrade",
            Operation::Call { method, .. } => method,
        }
    }

    /// The object the operation is addressed to
    pub fn target(&self) -> &ObjectId {
        match self {
            Operation::DeployFactory { template } => template,
            Operation::Spawn { factory, .. } => factory,
            Operation::DeployProxy { logic, .. } => logic,
            Operation::Initialize { proxy, .. } => proxy,
            Operation::Upgrade { proxy, .. } => proxy,
            Operation::Call { target, .. } => target,
        }
    }

    /// Hash identifying this operation as submitted by `caller` at `sequence`
    pub fn hash(&self, caller: &ObjectId, sequence: u64) -> Result<OperationHash, ProvisionError> {
        let encoded = bincode::serialize(&(caller, sequence, self))?;
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"PROVISION_Operation");
        hasher.update(&encoded);
        Ok(*hasher.finalize().as_bytes())
    }
}

/// Observable event emitted while executing an operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    FactoryDeployed {
        factory: ObjectId,
        template: ObjectId,
    },
    InstanceCreated {
        factory: ObjectId,
        instance: ObjectId,
        owner: ObjectId,
        params: Args,
    },
    ProxyDeployed {
        proxy: ObjectId,
        logic: ObjectId,
    },
    Initialized {
        proxy: ObjectId,
        admin: ObjectId,
    },
    Upgraded {
        proxy: ObjectId,
        previous: ObjectId,
        logic: ObjectId,
    },
    /// Domain event raised by a behavior
    Emitted {
        emitter: ObjectId,
        name: String,
        data: Args,
    },
}

impl Event {
    /// Name of a domain event, if this is one
    pub fn name(&self) -> &str {
        match self {
            Event::FactoryDeployed { .. } => "FactoryDeployed",
            Event::InstanceCreated { .. } => "InstanceCreated",
            Event::ProxyDeployed { .. } => "ProxyDeployed",
            Event::Initialized { .. } => "Initialized",
            Event::Upgraded { .. } => "Upgraded",
            Event::Emitted { name, .. } => name,
        }
    }
}

/// A single change an operation made to one ledger object
///
/// Modifications are recorded as deltas so a receipt stays the same size no
/// matter how much history the object already holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectChange {
    /// The object was created with this image
    Created(LedgerObject),
    /// Keys of the object's state store were written or removed
    StateWritten(Vec<StateDelta>),
    /// An instance was appended to a factory's creation log
    InstanceLogged(InstanceRecord),
    /// A proxy was initialized with this admin
    AdminAssigned(ObjectId),
    /// A proxy was pointed at new logic
    LogicReplaced(UpgradeRecord),
}

/// Represents what an operation changed on one ledger object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectEffect {
    /// The operation that caused this effect
    pub operation_hash: OperationHash,

    /// The ID of the object affected
    pub object_id: ObjectId,

    pub changes: Vec<ObjectChange>,
}

impl ObjectEffect {
    /// Describe the transition of one object from `before` (absent when it
    /// is new) to `after`
    pub fn between(
        operation_hash: OperationHash,
        before: Option<&LedgerObject>,
        after: &LedgerObject,
    ) -> Self {
        let mut changes = Vec::new();
        match (before, after) {
            (Some(LedgerObject::Factory(old)), LedgerObject::Factory(new)) => {
                let logged = old.instances.len().min(new.instances.len());
                changes.extend(
                    new.instances[logged..]
                        .iter()
                        .cloned()
                        .map(ObjectChange::InstanceLogged),
                );
            }
            (Some(LedgerObject::Instance(old)), LedgerObject::Instance(new)) => {
                push_state_delta(&mut changes, &old.state, &new.state);
            }
            (Some(LedgerObject::Proxy(old)), LedgerObject::Proxy(new)) => {
                if !old.initialized && new.initialized {
                    changes.push(ObjectChange::AdminAssigned(new.admin));
                }
                let upgraded = old.upgrades.len().min(new.upgrades.len());
                changes.extend(
                    new.upgrades[upgraded..]
                        .iter()
                        .cloned()
                        .map(ObjectChange::LogicReplaced),
                );
                push_state_delta(&mut changes, &old.state, &new.state);
            }
            (Some(old), new) if old == new => {}
            // New object, or an id whose kind changed
            _ => changes.push(ObjectChange::Created(after.clone())),
        }

        Self {
            operation_hash,
            object_id: *after.id(),
            changes,
        }
    }

    /// Check if this effect represents an object creation
    pub fn is_creation(&self) -> bool {
        self.changes
            .iter()
            .any(|change| matches!(change, ObjectChange::Created(_)))
    }

    /// Check if this effect represents an object modification
    pub fn is_modification(&self) -> bool {
        !self.is_creation()
    }
}

fn push_state_delta(changes: &mut Vec<ObjectChange>, before: &StateStore, after: &StateStore) {
    let delta = before.delta_to(after);
    if !delta.is_empty() {
        changes.push(ObjectChange::StateWritten(delta));
    }
}

/// Final outcome of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommitmentLevel {
    /// All effects were applied
    Committed,
    /// Nothing was applied
    Failed,
}

/// A receipt of a processed operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    /// The hash of the operation that was executed
    pub operation_hash: OperationHash,

    /// Position of the operation in the ledger's history
    pub sequence: u64,

    pub caller: ObjectId,

    pub operation: Operation,

    /// Milliseconds since the Unix epoch
    pub timestamp: i64,

    pub commitment_level: CommitmentLevel,

    /// Value returned by the operation (Unit on failure)
    pub output: Value,

    /// Events in emission order; empty on failure
    pub events: Vec<Event>,

    /// Objects created or modified; empty on failure
    pub effects: Vec<ObjectEffect>,

    /// Symbolic reason code when the operation failed
    pub error_code: Option<String>,

    /// Human readable error message when the operation failed
    pub error_message: Option<String>,
}

impl Receipt {
    /// Create a receipt for a committed operation
    pub fn committed(
        operation_hash: OperationHash,
        sequence: u64,
        caller: ObjectId,
        operation: Operation,
        timestamp: i64,
        output: Value,
    ) -> Self {
        Self {
            operation_hash,
            sequence,
            caller,
            operation,
            timestamp,
            commitment_level: CommitmentLevel::Committed,
            output,
            events: Vec::new(),
            effects: Vec::new(),
            error_code: None,
            error_message: None,
        }
    }

    /// Create a receipt for an operation that aborted with `error`
    pub fn failed(
        operation_hash: OperationHash,
        sequence: u64,
        caller: ObjectId,
        operation: Operation,
        timestamp: i64,
        error: &ProvisionError,
    ) -> Self {
        Self {
            operation_hash,
            sequence,
            caller,
            operation,
            timestamp,
            commitment_level: CommitmentLevel::Failed,
            output: Value::Unit,
            events: Vec::new(),
            effects: Vec::new(),
            error_code: Some(error.code().to_string()),
            error_message: Some(error.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.commitment_level == CommitmentLevel::Committed
    }

    /// The instance announced by an `InstanceCreated` event, if any
    pub fn created_instance(&self) -> Option<ObjectId> {
        self.events.iter().find_map(|event| match event {
            Event::InstanceCreated { instance, .. } => Some(*instance),
            _ => None,
        })
    }

    /// The proxy announced by a `ProxyDeployed` event, if any
    pub fn deployed_proxy(&self) -> Option<ObjectId> {
        self.events.iter().find_map(|event| match event {
            Event::ProxyDeployed { proxy, .. } => Some(*proxy),
            _ => None,
        })
    }

    /// The factory announced by a `FactoryDeployed` event, if any
    pub fn deployed_factory(&self) -> Option<ObjectId> {
        self.events.iter().find_map(|event| match event {
            Event::FactoryDeployed { factory, .. } => Some(*factory),
            _ => None,
        })
    }

    /// Events with the given name, in emission order
    pub fn events_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Event> + 'a {
        self.events.iter().filter(move |event| event.name() == name)
    }

    /// Whether this receipt created or modified `object_id`
    pub fn touches(&self, object_id: &ObjectId) -> bool {
        self.effects.iter().any(|effect| effect.object_id == *object_id)
    }
}
