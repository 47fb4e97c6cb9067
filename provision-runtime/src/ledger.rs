use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use log::{debug, info, warn};
use provision_core::error::ProvisionError;
use provision_core::id::ObjectId;
use provision_core::objects::{
    FactoryObject, InstanceObject, InstanceRecord, LedgerObject, LogicObject, ProxyObject,
    UpgradeRecord,
};
use provision_core::state::StateStore;
use provision_core::transaction::{Event, ObjectEffect, Operation, OperationHash, Receipt};
use provision_core::value::{Args, Value};
use provision_journal::{FileJournal, OperationJournal};

use crate::behavior::{Behavior, LogicRegistry};
use crate::config::LedgerConfig;
use crate::context::CallContext;
use crate::runtime::Runtime;

/// Tentative writes of one operation
///
/// Reads see these writes first and the committed objects second. The whole
/// overlay is either merged into the ledger or dropped.
struct PendingOperation {
    sequence: u64,
    timestamp: i64,
    nonce: u64,
    writes: BTreeMap<ObjectId, LedgerObject>,
    events: Vec<Event>,
}

impl PendingOperation {
    fn new(sequence: u64, timestamp: i64, nonce: u64) -> Self {
        Self {
            sequence,
            timestamp,
            nonce,
            writes: BTreeMap::new(),
            events: Vec::new(),
        }
    }

    fn write(&mut self, object: LedgerObject) {
        self.writes.insert(*object.id(), object);
    }
}

/// In-process ledger executing operations one at a time, all or nothing
///
/// `&mut self` on every state-changing method is what serializes
/// operations; wrap the ledger in a `Mutex` to share it between threads.
pub struct Ledger {
    config: LedgerConfig,
    objects: BTreeMap<ObjectId, LedgerObject>,
    logic: LogicRegistry,
    receipts: Vec<Receipt>,
    receipt_index: HashMap<OperationHash, usize>,
    /// Number of operations processed, committed or not
    sequence: u64,
    /// Id derivation counter; only committed work advances it
    nonce: u64,
    journal: Option<Box<dyn OperationJournal>>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    /// Create an empty ledger without a journal
    pub fn new() -> Self {
        Self {
            config: LedgerConfig::default(),
            objects: BTreeMap::new(),
            logic: LogicRegistry::new(),
            receipts: Vec::new(),
            receipt_index: HashMap::new(),
            sequence: 0,
            nonce: 0,
            journal: None,
        }
    }

    /// Create a ledger from configuration, opening the file journal if one is configured
    pub fn from_config(config: LedgerConfig) -> Result<Self, ProvisionError> {
        let mut ledger = Self::new();
        if let Some(path) = &config.journal_path {
            ledger.journal = Some(Box::new(FileJournal::open(path)?));
        }
        ledger.config = config;
        Ok(ledger)
    }

    /// Attach a journal; every committed operation is written to it first
    pub fn with_journal(mut self, journal: Box<dyn OperationJournal>) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn journal(&self) -> Option<&dyn OperationJournal> {
        self.journal.as_deref()
    }

    /// Number of operations processed so far
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Publish an immutable logic module and return its id
    ///
    /// Published modules can serve as factory templates or as proxy logic.
    /// They are never replaced or removed.
    pub fn publish_logic(
        &mut self,
        publisher: ObjectId,
        behavior: Arc<dyn Behavior>,
    ) -> Result<ObjectId, ProvisionError> {
        let code_hash = behavior.code_hash();
        let nonce = self.nonce + 1;
        let id = derive_id(b"logic", &code_hash, nonce)?;
        if self.objects.contains_key(&id) || !self.logic.register(id, behavior.clone()) {
            return Err(ProvisionError::IdDerivation(format!("logic {}", behavior.name())));
        }
        self.nonce = nonce;

        self.objects.insert(
            id,
            LedgerObject::Logic(LogicObject {
                id,
                publisher,
                name: behavior.name().to_string(),
                version: behavior.version(),
                code_hash,
            }),
        );

        info!(
            "Published logic {} v{} as {} (code hash {})",
            behavior.name(),
            behavior.version(),
            id,
            hex::encode(&code_hash[..6])
        );
        Ok(id)
    }

    /// Execute an operation and return its receipt, whether it committed or not
    pub fn submit(&mut self, caller: ObjectId, operation: Operation) -> Receipt {
        self.process(caller, operation).0
    }

    fn process(
        &mut self,
        caller: ObjectId,
        operation: Operation,
    ) -> (Receipt, Result<(), ProvisionError>) {
        self.sequence += 1;
        let sequence = self.sequence;
        let timestamp = provision_core::current_timestamp();

        let hash = match operation.hash(&caller, sequence) {
            Ok(hash) => hash,
            Err(err) => {
                let receipt = Receipt::failed([0; 32], sequence, caller, operation, timestamp, &err);
                self.record(receipt.clone());
                return (receipt, Err(err));
            }
        };

        let mut pending = PendingOperation::new(sequence, timestamp, self.nonce);
        match self.apply(&mut pending, caller, &operation) {
            Ok(output) => {
                let effects = pending
                    .writes
                    .iter()
                    .map(|(id, after)| ObjectEffect::between(hash, self.objects.get(id), after))
                    .collect();

                let mut receipt =
                    Receipt::committed(hash, sequence, caller, operation, timestamp, output);
                receipt.events = pending.events;
                receipt.effects = effects;

                // Write-ahead: nothing is applied unless the journal accepted it
                if let Some(journal) = &self.journal {
                    if let Err(err) = journal.append(&receipt) {
                        warn!(
                            "Operation #{} ({}) aborted, journal rejected it: {}",
                            sequence,
                            receipt.operation.label(),
                            err
                        );
                        let failed = Receipt::failed(
                            hash,
                            sequence,
                            caller,
                            receipt.operation,
                            timestamp,
                            &err,
                        );
                        self.record(failed.clone());
                        return (failed, Err(err));
                    }
                }

                self.nonce = pending.nonce;
                for (id, object) in pending.writes {
                    self.objects.insert(id, object);
                }

                debug!(
                    "Operation #{} ({}) by {} committed with {} effect(s)",
                    sequence,
                    receipt.operation.label(),
                    caller,
                    receipt.effects.len()
                );
                self.record(receipt.clone());
                (receipt, Ok(()))
            }
            Err(err) => {
                debug!(
                    "Operation #{} ({}) by {} aborted: {}",
                    sequence,
                    operation.label(),
                    caller,
                    err
                );
                let receipt = Receipt::failed(hash, sequence, caller, operation, timestamp, &err);
                if self.config.journal_failed_operations {
                    if let Some(journal) = &self.journal {
                        if let Err(journal_err) = journal.append(&receipt) {
                            warn!("Could not journal failed operation #{}: {}", sequence, journal_err);
                        }
                    }
                }
                self.record(receipt.clone());
                (receipt, Err(err))
            }
        }
    }

    fn record(&mut self, receipt: Receipt) {
        self.receipt_index
            .insert(receipt.operation_hash, self.receipts.len());
        self.receipts.push(receipt);
    }

    fn apply(
        &self,
        pending: &mut PendingOperation,
        caller: ObjectId,
        operation: &Operation,
    ) -> Result<Value, ProvisionError> {
        match operation {
            Operation::DeployFactory { template } => {
                self.apply_deploy_factory(pending, caller, *template)
            }
            Operation::Spawn { factory, params } => {
                self.apply_spawn(pending, caller, *factory, params)
            }
            Operation::DeployProxy { logic, init } => {
                self.apply_deploy_proxy(pending, caller, *logic, init.as_ref())
            }
            Operation::Initialize { proxy, params } => {
                self.apply_initialize(pending, caller, *proxy, params)
            }
            Operation::Upgrade { proxy, logic } => {
                self.apply_upgrade(pending, caller, *proxy, *logic)
            }
            Operation::Call {
                target,
                method,
                args,
            } => self.apply_call(pending, caller, *target, method, args),
        }
    }

    fn load(&self, pending: &PendingOperation, id: &ObjectId) -> Option<LedgerObject> {
        pending
            .writes
            .get(id)
            .or_else(|| self.objects.get(id))
            .cloned()
    }

    fn behavior(&self, logic: &ObjectId) -> Result<Arc<dyn Behavior>, ProvisionError> {
        self.logic
            .get(logic)
            .ok_or_else(|| ProvisionError::not_found(format!("logic module {}", logic)))
    }

    fn next_id(
        &self,
        pending: &mut PendingOperation,
        domain: &[u8],
        anchor: &ObjectId,
    ) -> Result<ObjectId, ProvisionError> {
        pending.nonce += 1;
        let id = derive_id(domain, anchor.bytes(), pending.nonce)?;
        if self.load(pending, &id).is_some() {
            return Err(ProvisionError::IdDerivation(format!(
                "{} collides with an existing object",
                id
            )));
        }
        Ok(id)
    }

    fn apply_deploy_factory(
        &self,
        pending: &mut PendingOperation,
        deployer: ObjectId,
        template: ObjectId,
    ) -> Result<Value, ProvisionError> {
        let behavior = self.behavior(&template)?;
        let id = self.next_id(pending, b"factory", &template)?;

        pending.write(LedgerObject::Factory(FactoryObject::new(id, deployer, template)));
        pending.events.push(Event::FactoryDeployed {
            factory: id,
            template,
        });

        info!("Factory {} deployed for template {}", id, behavior.name());
        Ok(Value::Id(id))
    }

    fn apply_spawn(
        &self,
        pending: &mut PendingOperation,
        caller: ObjectId,
        factory_id: ObjectId,
        params: &Args,
    ) -> Result<Value, ProvisionError> {
        let mut factory = match self.load(pending, &factory_id) {
            Some(LedgerObject::Factory(factory)) => factory,
            _ => return Err(ProvisionError::not_found(format!("factory {}", factory_id))),
        };
        if caller.is_null() {
            return Err(ProvisionError::unauthorized(caller, "own an instance as the null identity"));
        }
        let template = self.behavior(&factory.template)?;
        let instance_id = self.next_id(pending, b"instance", &factory_id)?;

        let mut instance = InstanceObject {
            id: instance_id,
            owner: caller,
            factory: factory_id,
            template: factory.template,
            params: params.clone(),
            state: StateStore::new(),
        };

        {
            let mut ctx = CallContext::new(
                caller,
                instance_id,
                caller,
                pending.sequence,
                &mut instance.state,
                &mut pending.events,
            );
            template.initialize(&mut ctx, params)?;
        }

        factory.instances.push(InstanceRecord {
            instance: instance_id,
            owner: caller,
            params: params.clone(),
            sequence: pending.sequence,
            timestamp: pending.timestamp,
        });
        pending.events.push(Event::InstanceCreated {
            factory: factory_id,
            instance: instance_id,
            owner: caller,
            params: params.clone(),
        });
        pending.write(LedgerObject::Instance(instance));
        pending.write(LedgerObject::Factory(factory));

        info!(
            "Spawned {} instance {} for {} with {}",
            template.name(),
            instance_id,
            caller,
            params
        );
        Ok(Value::Id(instance_id))
    }

    fn apply_deploy_proxy(
        &self,
        pending: &mut PendingOperation,
        deployer: ObjectId,
        logic: ObjectId,
        init: Option<&Args>,
    ) -> Result<Value, ProvisionError> {
        let behavior = self.behavior(&logic)?;
        let id = self.next_id(pending, b"proxy", &deployer)?;

        pending.write(LedgerObject::Proxy(ProxyObject::new(id, deployer, logic)));
        pending.events.push(Event::ProxyDeployed { proxy: id, logic });
        info!("Proxy {} deployed with logic {} v{}", id, behavior.name(), behavior.version());

        if let Some(params) = init {
            self.apply_initialize(pending, deployer, id, params)?;
        }
        Ok(Value::Id(id))
    }

    fn apply_initialize(
        &self,
        pending: &mut PendingOperation,
        caller: ObjectId,
        proxy_id: ObjectId,
        params: &Args,
    ) -> Result<Value, ProvisionError> {
        let mut proxy = self.load_proxy(pending, &proxy_id)?;
        if proxy.initialized {
            return Err(ProvisionError::AlreadyInitialized(proxy_id));
        }
        if caller.is_null() {
            return Err(ProvisionError::unauthorized(caller, "initialize as the null identity"));
        }
        let behavior = self.behavior(&proxy.logic)?;

        proxy.admin = caller;
        proxy.initialized = true;
        {
            let mut ctx = CallContext::new(
                caller,
                proxy_id,
                caller,
                pending.sequence,
                &mut proxy.state,
                &mut pending.events,
            );
            behavior.initialize(&mut ctx, params)?;
        }

        pending.events.push(Event::Initialized {
            proxy: proxy_id,
            admin: caller,
        });
        pending.write(LedgerObject::Proxy(proxy));

        info!("Proxy {} initialized, admin {}", proxy_id, caller);
        Ok(Value::Unit)
    }

    fn apply_upgrade(
        &self,
        pending: &mut PendingOperation,
        caller: ObjectId,
        proxy_id: ObjectId,
        logic: ObjectId,
    ) -> Result<Value, ProvisionError> {
        let mut proxy = self.load_proxy(pending, &proxy_id)?;
        if !proxy.is_admin(&caller) {
            return Err(ProvisionError::unauthorized(
                caller,
                format!("upgrade proxy {}", proxy_id),
            ));
        }
        let behavior = self.behavior(&logic)?;

        let previous = proxy.logic;
        proxy.logic = logic;
        proxy.upgrades.push(UpgradeRecord {
            previous,
            logic,
            sequence: pending.sequence,
        });

        pending.events.push(Event::Upgraded {
            proxy: proxy_id,
            previous,
            logic,
        });
        pending.write(LedgerObject::Proxy(proxy));

        info!(
            "Proxy {} upgraded from {} to {} ({} v{})",
            proxy_id,
            previous,
            logic,
            behavior.name(),
            behavior.version()
        );
        Ok(Value::Unit)
    }

    fn apply_call(
        &self,
        pending: &mut PendingOperation,
        caller: ObjectId,
        target: ObjectId,
        method: &str,
        args: &Args,
    ) -> Result<Value, ProvisionError> {
        match self.load(pending, &target) {
            Some(LedgerObject::Instance(mut instance)) => {
                let behavior = self.behavior(&instance.template)?;
                let before = instance.state.clone();
                let output = {
                    let mut ctx = CallContext::new(
                        caller,
                        target,
                        instance.owner,
                        pending.sequence,
                        &mut instance.state,
                        &mut pending.events,
                    );
                    behavior.call(&mut ctx, method, args)?
                };
                if instance.state != before {
                    pending.write(LedgerObject::Instance(instance));
                }
                Ok(output)
            }
            Some(LedgerObject::Proxy(mut proxy)) => {
                if !proxy.initialized {
                    return Err(ProvisionError::Uninitialized(target));
                }
                let behavior = self.behavior(&proxy.logic)?;
                let before = proxy.state.clone();
                let output = {
                    let mut ctx = CallContext::new(
                        caller,
                        target,
                        proxy.admin,
                        pending.sequence,
                        &mut proxy.state,
                        &mut pending.events,
                    );
                    behavior.call(&mut ctx, method, args)?
                };
                if proxy.state != before {
                    pending.write(LedgerObject::Proxy(proxy));
                }
                Ok(output)
            }
            Some(other) => Err(ProvisionError::invalid(format!(
                "{:?} object {} does not accept calls",
                other.kind(),
                target
            ))),
            None => Err(ProvisionError::not_found(format!("object {}", target))),
        }
    }

    fn load_proxy(
        &self,
        pending: &PendingOperation,
        proxy_id: &ObjectId,
    ) -> Result<ProxyObject, ProvisionError> {
        match self.load(pending, proxy_id) {
            Some(LedgerObject::Proxy(proxy)) => Ok(proxy),
            _ => Err(ProvisionError::not_found(format!("proxy {}", proxy_id))),
        }
    }

    /// Run a method without committing anything, as the null identity
    fn run_query(&self, target: &ObjectId, method: &str, args: &Args) -> Result<Value, ProvisionError> {
        let mut scratch = PendingOperation::new(
            self.sequence,
            provision_core::current_timestamp(),
            self.nonce,
        );
        self.apply_call(&mut scratch, ObjectId::null(), *target, method, args)
    }

    // ---- Read surface: open to everyone, no admin rights needed ----

    pub fn object(&self, id: &ObjectId) -> Option<&LedgerObject> {
        self.objects.get(id)
    }

    pub fn logic_object(&self, id: &ObjectId) -> Result<&LogicObject, ProvisionError> {
        self.objects
            .get(id)
            .and_then(LedgerObject::as_logic)
            .ok_or_else(|| ProvisionError::not_found(format!("logic module {}", id)))
    }

    /// The behavior registered for a logic id
    pub fn behavior_of(&self, logic: &ObjectId) -> Option<Arc<dyn Behavior>> {
        self.logic.get(logic)
    }

    pub fn factory(&self, id: &ObjectId) -> Result<&FactoryObject, ProvisionError> {
        self.objects
            .get(id)
            .and_then(LedgerObject::as_factory)
            .ok_or_else(|| ProvisionError::not_found(format!("factory {}", id)))
    }

    pub fn instance(&self, id: &ObjectId) -> Result<&InstanceObject, ProvisionError> {
        self.objects
            .get(id)
            .and_then(LedgerObject::as_instance)
            .ok_or_else(|| ProvisionError::not_found(format!("instance {}", id)))
    }

    pub fn proxy(&self, id: &ObjectId) -> Result<&ProxyObject, ProvisionError> {
        self.objects
            .get(id)
            .and_then(LedgerObject::as_proxy)
            .ok_or_else(|| ProvisionError::not_found(format!("proxy {}", id)))
    }

    /// Template a factory was constructed with
    pub fn template_of(&self, factory: &ObjectId) -> Result<ObjectId, ProvisionError> {
        Ok(self.factory(factory)?.template)
    }

    /// Every instance a factory has spawned, in creation order
    pub fn creation_log(&self, factory: &ObjectId) -> Result<&[InstanceRecord], ProvisionError> {
        Ok(&self.factory(factory)?.instances)
    }

    /// Owner of an instance, or admin of a proxy (null before initialization)
    pub fn owner_of(&self, id: &ObjectId) -> Result<ObjectId, ProvisionError> {
        match self.objects.get(id) {
            Some(LedgerObject::Instance(instance)) => Ok(instance.owner),
            Some(LedgerObject::Proxy(proxy)) => Ok(proxy.admin),
            _ => Err(ProvisionError::not_found(format!("owned object {}", id))),
        }
    }

    /// Logic module a proxy currently delegates to
    pub fn implementation(&self, proxy: &ObjectId) -> Result<ObjectId, ProvisionError> {
        Ok(self.proxy(proxy)?.logic)
    }

    pub fn admin(&self, proxy: &ObjectId) -> Result<ObjectId, ProvisionError> {
        Ok(self.proxy(proxy)?.admin)
    }

    pub fn receipt(&self, hash: &OperationHash) -> Option<&Receipt> {
        self.receipt_index
            .get(hash)
            .and_then(|index| self.receipts.get(*index))
    }

    pub fn receipts(&self) -> &[Receipt] {
        &self.receipts
    }

    pub fn last_receipt(&self) -> Option<&Receipt> {
        self.receipts.last()
    }

    /// Committed receipts that created or modified `id`, oldest first
    pub fn receipts_for_object<'a>(&'a self, id: &'a ObjectId) -> impl Iterator<Item = &'a Receipt> + 'a {
        self.receipts.iter().filter(move |receipt| receipt.touches(id))
    }
}

impl Runtime for Ledger {
    fn execute(&mut self, caller: ObjectId, operation: Operation) -> Result<Receipt, ProvisionError> {
        let (receipt, outcome) = self.process(caller, operation);
        outcome.map(|_| receipt)
    }

    fn query(&self, target: &ObjectId, method: &str, args: &Args) -> Result<Value, ProvisionError> {
        self.run_query(target, method, args)
    }

    fn get_receipt(&self, hash: &OperationHash) -> Option<&Receipt> {
        self.receipt(hash)
    }
}

fn derive_id(domain: &[u8], anchor: &[u8], nonce: u64) -> Result<ObjectId, ProvisionError> {
    ObjectId::find_uid(&[domain, anchor, &nonce.to_le_bytes()])
        .map(|(id, _)| id)
        .ok_or_else(|| ProvisionError::IdDerivation(String::from_utf8_lossy(domain).into_owned()))
}
