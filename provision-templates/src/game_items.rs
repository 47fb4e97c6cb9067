use log::debug;
use provision_core::{args, Args, ObjectId, ProvisionError, Value};
use provision_runtime::{unknown_method, Behavior, CallContext};

pub const GOLD_COIN: u64 = 0;
pub const LEGENDARY_SWORD: u64 = 1;
pub const VALOROUS_SWORD: u64 = 2;
pub const HERO_SWORD: u64 = 3;
pub const COMMON_SWORD: u64 = 4;

/// Gold coins minted to the owner of every new game set
pub const INITIAL_GOLD: u64 = 1000;

const URI_KEY: &str = "uri";

fn balance_key(account: &ObjectId, id: u64) -> String {
    format!("balance/{}/{}", id, hex::encode(account.bytes()))
}

fn approval_key(owner: &ObjectId, operator: &ObjectId) -> String {
    format!(
        "approval/{}/{}",
        hex::encode(owner.bytes()),
        hex::encode(operator.bytes())
    )
}

/// Multi-token game item set
///
/// Spawned with a single metadata uri; the instance owner starts with
/// [`INITIAL_GOLD`] gold coins and one of each sword, and is the only
/// identity allowed to mint more.
pub struct GameItems;

impl GameItems {
    fn balance(ctx: &CallContext<'_>, account: &ObjectId, id: u64) -> Result<u64, ProvisionError> {
        ctx.state().get_or_default(&balance_key(account, id))
    }

    fn credit(ctx: &mut CallContext<'_>, account: &ObjectId, id: u64, amount: u64) -> Result<(), ProvisionError> {
        let balance = Self::balance(ctx, account, id)?;
        let updated = balance
            .checked_add(amount)
            .ok_or_else(|| ProvisionError::invalid(format!("balance of item {} overflows", id)))?;
        ctx.state_mut().set(balance_key(account, id), &updated)
    }

    fn debit(ctx: &mut CallContext<'_>, account: &ObjectId, id: u64, amount: u64) -> Result<(), ProvisionError> {
        let balance = Self::balance(ctx, account, id)?;
        if balance < amount {
            return Err(ProvisionError::InsufficientResource {
                resource: format!("balance of item {}", id),
                required: amount,
                available: balance,
            });
        }
        ctx.state_mut().set(balance_key(account, id), &(balance - amount))
    }

    fn approved_for_all(ctx: &CallContext<'_>, owner: &ObjectId, operator: &ObjectId) -> Result<bool, ProvisionError> {
        ctx.state().get_or_default(&approval_key(owner, operator))
    }

    /// Transfers need the holder's own signature or an operator approval
    fn authorize_transfer(ctx: &CallContext<'_>, from: &ObjectId) -> Result<(), ProvisionError> {
        let caller = ctx.caller();
        if caller.is_null() {
            return Err(ProvisionError::unauthorized(caller, "transfer items"));
        }
        if caller == *from || Self::approved_for_all(ctx, from, &caller)? {
            Ok(())
        } else {
            Err(ProvisionError::unauthorized(
                caller,
                format!("transfer items held by {}", from),
            ))
        }
    }

    fn require_recipient(to: &ObjectId) -> Result<(), ProvisionError> {
        if to.is_null() {
            return Err(ProvisionError::invalid("cannot transfer to the null identity"));
        }
        Ok(())
    }
}

impl Behavior for GameItems {
    fn name(&self) -> &str {
        "game-items"
    }

    fn methods(&self) -> &[&'static str] {
        &[
            "uri",
            "owner",
            "balance_of",
            "mint",
            "set_approval_for_all",
            "is_approved_for_all",
            "safe_transfer_from",
            "safe_batch_transfer_from",
        ]
    }

    fn initialize(&self, ctx: &mut CallContext<'_>, params: &Args) -> Result<(), ProvisionError> {
        params.expect_len(1)?;
        let uri = params.text(0)?;
        if uri.is_empty() {
            return Err(ProvisionError::invalid("uri must not be empty"));
        }
        ctx.state_mut().set(URI_KEY, &uri.to_string())?;

        let owner = ctx.owner();
        let ids = vec![GOLD_COIN, LEGENDARY_SWORD, VALOROUS_SWORD, HERO_SWORD, COMMON_SWORD];
        let amounts = vec![INITIAL_GOLD, 1, 1, 1, 1];
        for (id, amount) in ids.iter().zip(&amounts) {
            Self::credit(ctx, &owner, *id, *amount)?;
        }
        ctx.emit(
            "TransferBatch",
            args![owner, ObjectId::null(), owner, ids, amounts],
        );
        Ok(())
    }

    fn call(&self, ctx: &mut CallContext<'_>, method: &str, args: &Args) -> Result<Value, ProvisionError> {
        match method {
            "uri" => {
                args.expect_len(1)?;
                args.u64(0)?;
                let uri: String = ctx.state().get_or_default(URI_KEY)?;
                Ok(Value::Text(uri))
            }
            "owner" => Ok(Value::Id(ctx.owner())),
            "balance_of" => {
                args.expect_len(2)?;
                let account = args.id(0)?;
                let id = args.u64(1)?;
                Ok(Value::U64(Self::balance(ctx, &account, id)?))
            }
            "mint" => {
                ctx.require_owner("mint items")?;
                args.expect_len(3)?;
                let to = args.id(0)?;
                let id = args.u64(1)?;
                let amount = args.u64(2)?;
                Self::require_recipient(&to)?;

                Self::credit(ctx, &to, id, amount)?;
                let operator = ctx.caller();
                ctx.emit("TransferSingle", args![operator, ObjectId::null(), to, id, amount]);
                debug!("Minted {} of item {} to {} on {}", amount, id, to, ctx.this());
                Ok(Value::Unit)
            }
            "set_approval_for_all" => {
                args.expect_len(2)?;
                let operator = args.id(0)?;
                let approved = args.bool(1)?;
                let owner = ctx.caller();
                if owner.is_null() {
                    return Err(ProvisionError::unauthorized(owner, "approve operators"));
                }
                if operator == owner {
                    return Err(ProvisionError::invalid("cannot set approval status for self"));
                }
                ctx.state_mut().set(approval_key(&owner, &operator), &approved)?;
                ctx.emit("ApprovalForAll", args![owner, operator, approved]);
                Ok(Value::Unit)
            }
            "is_approved_for_all" => {
                args.expect_len(2)?;
                let owner = args.id(0)?;
                let operator = args.id(1)?;
                Ok(Value::Bool(Self::approved_for_all(ctx, &owner, &operator)?))
            }
            "safe_transfer_from" => {
                args.expect_len(4)?;
                let from = args.id(0)?;
                let to = args.id(1)?;
                let id = args.u64(2)?;
                let amount = args.u64(3)?;
                Self::authorize_transfer(ctx, &from)?;
                Self::require_recipient(&to)?;

                Self::debit(ctx, &from, id, amount)?;
                Self::credit(ctx, &to, id, amount)?;
                let operator = ctx.caller();
                ctx.emit("TransferSingle", args![operator, from, to, id, amount]);
                Ok(Value::Unit)
            }
            "safe_batch_transfer_from" => {
                args.expect_len(4)?;
                let from = args.id(0)?;
                let to = args.id(1)?;
                let ids = args.u64_list(2)?;
                let amounts = args.u64_list(3)?;
                if ids.len() != amounts.len() {
                    return Err(ProvisionError::invalid(format!(
                        "ids and amounts length mismatch ({} vs {})",
                        ids.len(),
                        amounts.len()
                    )));
                }
                Self::authorize_transfer(ctx, &from)?;
                Self::require_recipient(&to)?;

                // A failure part way leaves the whole call uncommitted
                for (id, amount) in ids.iter().zip(&amounts) {
                    Self::debit(ctx, &from, *id, *amount)?;
                    Self::credit(ctx, &to, *id, *amount)?;
                }
                let operator = ctx.caller();
                ctx.emit("TransferBatch", args![operator, from, to, ids, amounts]);
                Ok(Value::Unit)
            }
            _ => Err(unknown_method(self, method)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use provision_core::transaction::Event;
    use provision_runtime::{Ledger, Runtime};
    use std::sync::Arc;

    struct Setup {
        ledger: Ledger,
        factory: ObjectId,
        alice: ObjectId,
        bob: ObjectId,
    }

    fn setup() -> Setup {
        let publisher = ObjectId::from_label("studio");
        let alice = ObjectId::from_label("alice");
        let bob = ObjectId::from_label("bob");
        let mut ledger = Ledger::new();
        let template = ledger.publish_logic(publisher, Arc::new(GameItems)).unwrap();
        let factory = ledger.deploy_factory(publisher, template).unwrap();
        Setup { ledger, factory, alice, bob }
    }

    fn balance(ledger: &Ledger, set: &ObjectId, account: ObjectId, id: u64) -> u64 {
        ledger
            .query(set, "balance_of", &args![account, id])
            .unwrap()
            .as_u64()
            .unwrap()
    }

    #[test]
    fn test_new_set_mints_starting_items() {
        let mut s = setup();
        let receipt = s
            .ledger
            .execute(s.alice, provision_core::Operation::Spawn {
                factory: s.factory,
                params: args!["https://game.example/{id}.json"],
            })
            .unwrap();
        let set = receipt.created_instance().unwrap();

        assert_eq!(balance(&s.ledger, &set, s.alice, GOLD_COIN), INITIAL_GOLD);
        for sword in [LEGENDARY_SWORD, VALOROUS_SWORD, HERO_SWORD, COMMON_SWORD] {
            assert_eq!(balance(&s.ledger, &set, s.alice, sword), 1);
        }
        assert_eq!(balance(&s.ledger, &set, s.bob, GOLD_COIN), 0);
        assert_eq!(
            s.ledger.query(&set, "uri", &args![HERO_SWORD]).unwrap(),
            Value::Text("https://game.example/{id}.json".to_string())
        );
        assert_eq!(receipt.events_named("TransferBatch").count(), 1);
        match receipt.events.last() {
            Some(Event::InstanceCreated { owner, .. }) => assert_eq!(*owner, s.alice),
            other => panic!("expected InstanceCreated last, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_uri_spawns_nothing() {
        let mut s = setup();
        let err = s.ledger.spawn(s.alice, s.factory, args![""]).unwrap_err();
        assert_eq!(err.code(), "InvalidParameters");
        let err = s.ledger.spawn(s.alice, s.factory, args![]).unwrap_err();
        assert_eq!(err.code(), "InvalidParameters");
        assert!(s.ledger.creation_log(&s.factory).unwrap().is_empty());
    }

    #[test]
    fn test_sets_are_independent() {
        let mut s = setup();
        let first = s.ledger.spawn(s.alice, s.factory, args!["ipfs://one"]).unwrap();
        let second = s.ledger.spawn(s.bob, s.factory, args!["ipfs://two"]).unwrap();
        assert_ne!(first, second);

        s.ledger
            .call(s.alice, first, "mint", args![s.alice, GOLD_COIN, 5u64])
            .unwrap();
        assert_eq!(balance(&s.ledger, &first, s.alice, GOLD_COIN), INITIAL_GOLD + 5);
        assert_eq!(balance(&s.ledger, &second, s.bob, GOLD_COIN), INITIAL_GOLD);
        assert_eq!(balance(&s.ledger, &second, s.alice, GOLD_COIN), 0);

        let log = s.ledger.creation_log(&s.factory).unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[1].owner, s.bob);
        assert_eq!(log[1].params, args!["ipfs://two"]);
    }

    #[test]
    fn test_only_owner_mints() {
        let mut s = setup();
        let set = s.ledger.spawn(s.alice, s.factory, args!["ipfs://set"]).unwrap();

        let err = s
            .ledger
            .call(s.bob, set, "mint", args![s.bob, LEGENDARY_SWORD, 1u64])
            .unwrap_err();
        assert_eq!(err.code(), "Unauthorized");
        assert_eq!(balance(&s.ledger, &set, s.bob, LEGENDARY_SWORD), 0);

        s.ledger
            .call(s.alice, set, "mint", args![s.bob, LEGENDARY_SWORD, 1u64])
            .unwrap();
        assert_eq!(balance(&s.ledger, &set, s.bob, LEGENDARY_SWORD), 1);
    }

    #[test]
    fn test_transfers_and_operators() {
        let mut s = setup();
        let carol = ObjectId::from_label("carol");
        let set = s.ledger.spawn(s.alice, s.factory, args!["ipfs://set"]).unwrap();

        s.ledger
            .call(s.alice, set, "safe_transfer_from", args![s.alice, s.bob, GOLD_COIN, 100u64])
            .unwrap();
        assert_eq!(balance(&s.ledger, &set, s.alice, GOLD_COIN), 900);
        assert_eq!(balance(&s.ledger, &set, s.bob, GOLD_COIN), 100);

        // Carol may not move Alice's items until approved
        let err = s
            .ledger
            .call(carol, set, "safe_transfer_from", args![s.alice, carol, GOLD_COIN, 1u64])
            .unwrap_err();
        assert_eq!(err.code(), "Unauthorized");

        s.ledger
            .call(s.alice, set, "set_approval_for_all", args![carol, true])
            .unwrap();
        assert_eq!(
            s.ledger.query(&set, "is_approved_for_all", &args![s.alice, carol]).unwrap(),
            Value::Bool(true)
        );
        s.ledger
            .call(carol, set, "safe_transfer_from", args![s.alice, carol, HERO_SWORD, 1u64])
            .unwrap();
        assert_eq!(balance(&s.ledger, &set, carol, HERO_SWORD), 1);

        let err = s
            .ledger
            .call(s.alice, set, "safe_transfer_from", args![s.alice, s.bob, HERO_SWORD, 1u64])
            .unwrap_err();
        assert_eq!(err.code(), "InsufficientResource");

        let err = s
            .ledger
            .call(s.alice, set, "safe_transfer_from", args![s.alice, ObjectId::null(), GOLD_COIN, 1u64])
            .unwrap_err();
        assert_eq!(err.code(), "InvalidParameters");

        let err = s
            .ledger
            .call(s.alice, set, "set_approval_for_all", args![s.alice, true])
            .unwrap_err();
        assert_eq!(err.code(), "InvalidParameters");
    }

    #[test]
    fn test_batch_transfer_is_all_or_nothing() {
        let mut s = setup();
        let set = s.ledger.spawn(s.alice, s.factory, args!["ipfs://set"]).unwrap();

        let err = s
            .ledger
            .call(
                s.alice,
                set,
                "safe_batch_transfer_from",
                args![s.alice, s.bob, vec![GOLD_COIN, COMMON_SWORD], vec![10u64]],
            )
            .unwrap_err();
        assert_eq!(err.code(), "InvalidParameters");

        // Second entry overdraws, so the gold must stay put too
        let err = s
            .ledger
            .call(
                s.alice,
                set,
                "safe_batch_transfer_from",
                args![s.alice, s.bob, vec![GOLD_COIN, COMMON_SWORD], vec![10u64, 2]],
            )
            .unwrap_err();
        assert_eq!(err.code(), "InsufficientResource");
        assert_eq!(balance(&s.ledger, &set, s.alice, GOLD_COIN), INITIAL_GOLD);
        assert_eq!(balance(&s.ledger, &set, s.bob, GOLD_COIN), 0);

        let receipt = s
            .ledger
            .execute(s.alice, provision_core::Operation::Call {
                target: set,
                method: "safe_batch_transfer_from".into(),
                args: args![s.alice, s.bob, vec![GOLD_COIN, COMMON_SWORD], vec![10u64, 1]],
            })
            .unwrap();
        assert_eq!(balance(&s.ledger, &set, s.bob, GOLD_COIN), 10);
        assert_eq!(balance(&s.ledger, &set, s.bob, COMMON_SWORD), 1);
        assert_eq!(balance(&s.ledger, &set, s.alice, COMMON_SWORD), 0);
        assert_eq!(receipt.events_named("TransferBatch").count(), 1);
    }
}
