use provision_core::error::ProvisionError;
use provision_core::id::ObjectId;
use provision_core::transaction::{Operation, OperationHash, Receipt};
use provision_core::value::{Args, Value};

/// Operation execution surface shared by every ledger backend
///
/// Implementors provide [`Runtime::execute`], [`Runtime::query`] and
/// [`Runtime::get_receipt`]; the typed helpers build the matching
/// [`Operation`] and unpack the receipt.
pub trait Runtime {
    /// Execute an operation atomically. `Err` means nothing was applied.
    fn execute(&mut self, caller: ObjectId, operation: Operation) -> Result<Receipt, ProvisionError>;

    /// Run a method against current state without committing anything
    fn query(&self, target: &ObjectId, method: &str, args: &Args) -> Result<Value, ProvisionError>;

    /// Get a receipt by operation hash
    fn get_receipt(&self, hash: &OperationHash) -> Option<&Receipt>;

    /// Deploy a factory for a published template and return its id
    fn deploy_factory(&mut self, caller: ObjectId, template: ObjectId) -> Result<ObjectId, ProvisionError> {
        let receipt = self.execute(caller, Operation::DeployFactory { template })?;
        receipt
            .deployed_factory()
            .ok_or_else(|| ProvisionError::not_found("FactoryDeployed event"))
    }

    /// Spawn an instance owned by `caller`
    ///
    /// The id is read from the `InstanceCreated` event, the same way an
    /// off-ledger observer would discover it.
    fn spawn(&mut self, caller: ObjectId, factory: ObjectId, params: Args) -> Result<ObjectId, ProvisionError> {
        let receipt = self.execute(caller, Operation::Spawn { factory, params })?;
        receipt
            .created_instance()
            .ok_or_else(|| ProvisionError::not_found("InstanceCreated event"))
    }

    fn deploy_proxy(
        &mut self,
        caller: ObjectId,
        logic: ObjectId,
        init: Option<Args>,
    ) -> Result<ObjectId, ProvisionError> {
        let receipt = self.execute(caller, Operation::DeployProxy { logic, init })?;
        receipt
            .deployed_proxy()
            .ok_or_else(|| ProvisionError::not_found("ProxyDeployed event"))
    }

    fn initialize(&mut self, caller: ObjectId, proxy: ObjectId, params: Args) -> Result<Receipt, ProvisionError> {
        self.execute(caller, Operation::Initialize { proxy, params })
    }

    fn upgrade(&mut self, caller: ObjectId, proxy: ObjectId, logic: ObjectId) -> Result<Receipt, ProvisionError> {
        self.execute(caller, Operation::Upgrade { proxy, logic })
    }

    /// Invoke a method and return its output
    fn call(
        &mut self,
        caller: ObjectId,
        target: ObjectId,
        method: &str,
        args: Args,
    ) -> Result<Value, ProvisionError> {
        let receipt = self.execute(
            caller,
            Operation::Call {
                target,
                method: method.to_string(),
                args,
            },
        )?;
        Ok(receipt.output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use provision_core::args;
    use provision_core::transaction::Event;
    use std::collections::HashMap;

    /// Records operations and answers with canned events
    #[derive(Default)]
    struct ScriptedRuntime {
        executed: Vec<Operation>,
        receipts: HashMap<OperationHash, Receipt>,
    }

    impl Runtime for ScriptedRuntime {
        fn execute(&mut self, caller: ObjectId, operation: Operation) -> Result<Receipt, ProvisionError> {
            self.executed.push(operation.clone());
            let sequence = self.executed.len() as u64;
            let hash = operation.hash(&caller, sequence)?;
            let output = Value::Text(operation.label().to_string());
            let mut receipt = Receipt::committed(hash, sequence, caller, operation.clone(), 0, output);
            match operation {
                Operation::Spawn { factory, params } => receipt.events.push(Event::InstanceCreated {
                    factory,
                    instance: ObjectId::new([9; 32]),
                    owner: caller,
                    params,
                }),
                Operation::DeployProxy { logic, .. } => receipt.events.push(Event::ProxyDeployed {
                    proxy: ObjectId::new([8; 32]),
                    logic,
                }),
                _ => {}
            }
            self.receipts.insert(hash, receipt.clone());
            Ok(receipt)
        }

        fn query(&self, _target: &ObjectId, _method: &str, _args: &Args) -> Result<Value, ProvisionError> {
            Ok(Value::Unit)
        }

        fn get_receipt(&self, hash: &OperationHash) -> Option<&Receipt> {
            self.receipts.get(hash)
        }
    }

    #[test]
    fn test_helpers_build_operations() {
        let caller = ObjectId::from_label("alice");
        let factory = ObjectId::new([3; 32]);
        let mut runtime = ScriptedRuntime::default();

        let instance = runtime.spawn(caller, factory, args!["Clone One", "C1"]).unwrap();
        assert_eq!(instance, ObjectId::new([9; 32]));

        let proxy = runtime.deploy_proxy(caller, ObjectId::new([1; 32]), None).unwrap();
        assert_eq!(proxy, ObjectId::new([8; 32]));

        let output = runtime.call(caller, proxy, "owner", args![]).unwrap();
        assert_eq!(output, Value::Text("owner".to_string()));

        assert_eq!(
            runtime.executed[0],
            Operation::Spawn { factory, params: args!["Clone One", "C1"] }
        );
        assert_eq!(runtime.executed.len(), 3);
    }

    #[test]
    fn test_missing_event_is_reported() {
        let caller = ObjectId::from_label("alice");
        let mut runtime = ScriptedRuntime::default();

        // The scripted runtime never emits FactoryDeployed
        let err = runtime.deploy_factory(caller, ObjectId::new([1; 32])).unwrap_err();
        assert_eq!(err.code(), "NotFound");

        let receipt = runtime.upgrade(caller, ObjectId::new([8; 32]), ObjectId::new([2; 32])).unwrap();
        assert!(runtime.get_receipt(&receipt.operation_hash).is_some());
    }
}
