use provision_core::error::ProvisionError;
use provision_core::id::ObjectId;
use provision_core::state::StateStore;
use provision_core::transaction::Event;
use provision_core::value::Args;

/// The execution context handed to a behavior for one initializer or call
///
/// It exposes the caller, the object being executed, that object's owner
/// (instance owner or proxy admin) and mutable access to the object's own
/// state. Nothing else on the ledger is reachable from here.
pub struct CallContext<'a> {
    caller: ObjectId,
    this: ObjectId,
    owner: ObjectId,
    sequence: u64,
    state: &'a mut StateStore,
    events: &'a mut Vec<Event>,
}

impl<'a> CallContext<'a> {
    pub fn new(
        caller: ObjectId,
        this: ObjectId,
        owner: ObjectId,
        sequence: u64,
        state: &'a mut StateStore,
        events: &'a mut Vec<Event>,
    ) -> Self {
        Self {
            caller,
            this,
            owner,
            sequence,
            state,
            events,
        }
    }

    /// Identity that submitted the operation (null for read-only queries)
    pub fn caller(&self) -> ObjectId {
        self.caller
    }

    /// The instance or proxy being executed
    pub fn this(&self) -> ObjectId {
        self.this
    }

    /// Owner of the instance, or admin of the proxy
    pub fn owner(&self) -> ObjectId {
        self.owner
    }

    /// Sequence number of the enclosing operation
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn state(&self) -> &StateStore {
        self.state
    }

    pub fn state_mut(&mut self) -> &mut StateStore {
        self.state
    }

    pub fn is_owner(&self) -> bool {
        !self.owner.is_null() && self.caller == self.owner
    }

    /// Fail with `Unauthorized` unless the caller is the owner/admin
    pub fn require_owner(&self, action: &str) -> Result<(), ProvisionError> {
        if self.is_owner() {
            Ok(())
        } else {
            Err(ProvisionError::unauthorized(self.caller, action))
        }
    }

    /// Emit a domain event attributed to this object
    pub fn emit(&mut self, name: &str, data: Args) {
        self.events.push(Event::Emitted {
            emitter: self.this,
            name: name.to_string(),
            data,
        });
    }
}
