use log::debug;
use provision_core::{args, Args, ObjectId, ProvisionError, Value};
use provision_runtime::{unknown_method, Behavior, CallContext};
use serde::{Deserialize, Serialize};

const NAME_KEY: &str = "name";
const SYMBOL_KEY: &str = "symbol";
const NEXT_TOKEN_KEY: &str = "next_token";

/// Ownership record of one minted token
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct TokenRecord {
    owner: ObjectId,
    /// Single spender allowed to move the token; null when none
    approved: ObjectId,
}

fn token_key(token: u64) -> String {
    format!("token/{}", token)
}

fn balance_key(account: &ObjectId) -> String {
    format!("balance/{}", hex::encode(account.bytes()))
}

/// Named single-token collection (one owner per token id)
///
/// Each spawn takes `(name, symbol)`; the spawning caller owns the
/// collection and alone may mint. Token ids count up from zero.
pub struct Collectible;

impl Collectible {
    fn token(ctx: &CallContext<'_>, token: u64) -> Result<TokenRecord, ProvisionError> {
        ctx.state()
            .get(&token_key(token))?
            .ok_or_else(|| ProvisionError::not_found(format!("token {} in {}", token, ctx.this())))
    }

    fn balance(ctx: &CallContext<'_>, account: &ObjectId) -> Result<u64, ProvisionError> {
        ctx.state().get_or_default(&balance_key(account))
    }

    fn adjust_balance(ctx: &mut CallContext<'_>, account: &ObjectId, add: bool) -> Result<(), ProvisionError> {
        let balance = Self::balance(ctx, account)?;
        let updated = if add {
            balance + 1
        } else {
            balance.saturating_sub(1)
        };
        ctx.state_mut().set(balance_key(account), &updated)
    }

    fn text(ctx: &CallContext<'_>, key: &str) -> Result<Value, ProvisionError> {
        let text: String = ctx.state().get_or_default(key)?;
        Ok(Value::Text(text))
    }
}

impl Behavior for Collectible {
    fn name(&self) -> &str {
        "collectible"
    }

    fn methods(&self) -> &[&'static str] {
        &[
            "name",
            "symbol",
            "owner",
            "total_minted",
            "safe_mint",
            "balance_of",
            "owner_of",
            "approve",
            "get_approved",
            "transfer_from",
        ]
    }

    fn initialize(&self, ctx: &mut CallContext<'_>, params: &Args) -> Result<(), ProvisionError> {
        params.expect_len(2)?;
        let name = params.text(0)?;
        let symbol = params.text(1)?;
        if name.is_empty() || symbol.is_empty() {
            return Err(ProvisionError::invalid("name and symbol must not be empty"));
        }
        ctx.state_mut().set(NAME_KEY, &name.to_string())?;
        ctx.state_mut().set(SYMBOL_KEY, &symbol.to_string())?;
        Ok(())
    }

    fn call(&self, ctx: &mut CallContext<'_>, method: &str, args: &Args) -> Result<Value, ProvisionError> {
        match method {
            "name" => Self::text(ctx, NAME_KEY),
            "symbol" => Self::text(ctx, SYMBOL_KEY),
            "owner" => Ok(Value::Id(ctx.owner())),
            "total_minted" => Ok(Value::U64(ctx.state().get_or_default(NEXT_TOKEN_KEY)?)),
            "safe_mint" => {
                ctx.require_owner("mint tokens")?;
                args.expect_len(1)?;
                let to = args.id(0)?;
                if to.is_null() {
                    return Err(ProvisionError::invalid("cannot mint to the null identity"));
                }

                let token: u64 = ctx.state().get_or_default(NEXT_TOKEN_KEY)?;
                ctx.state_mut().set(NEXT_TOKEN_KEY, &(token + 1))?;
                ctx.state_mut().set(
                    token_key(token),
                    &TokenRecord {
                        owner: to,
                        approved: ObjectId::null(),
                    },
                )?;
                Self::adjust_balance(ctx, &to, true)?;
                ctx.emit("Transfer", args![ObjectId::null(), to, token]);
                debug!("Minted token {} to {} on {}", token, to, ctx.this());
                Ok(Value::U64(token))
            }
            "balance_of" => {
                args.expect_len(1)?;
                let account = args.id(0)?;
                Ok(Value::U64(Self::balance(ctx, &account)?))
            }
            "owner_of" => {
                args.expect_len(1)?;
                Ok(Value::Id(Self::token(ctx, args.u64(0)?)?.owner))
            }
            "get_approved" => {
                args.expect_len(1)?;
                Ok(Value::Id(Self::token(ctx, args.u64(0)?)?.approved))
            }
            "approve" => {
                args.expect_len(2)?;
                let spender = args.id(0)?;
                let token = args.u64(1)?;
                let mut record = Self::token(ctx, token)?;
                let caller = ctx.caller();
                if caller.is_null() || caller != record.owner {
                    return Err(ProvisionError::unauthorized(
                        caller,
                        format!("approve spenders of token {}", token),
                    ));
                }
                if spender == record.owner {
                    return Err(ProvisionError::invalid("approval to the current owner"));
                }

                record.approved = spender;
                ctx.state_mut().set(token_key(token), &record)?;
                ctx.emit("Approval", args![caller, spender, token]);
                Ok(Value::Unit)
            }
            "transfer_from" => {
                args.expect_len(3)?;
                let from = args.id(0)?;
                let to = args.id(1)?;
                let token = args.u64(2)?;
                let mut record = Self::token(ctx, token)?;
                let caller = ctx.caller();

                let allowed = !caller.is_null() && (caller == record.owner || caller == record.approved);
                if !allowed {
                    return Err(ProvisionError::unauthorized(
                        caller,
                        format!("transfer token {}", token),
                    ));
                }
                if from != record.owner {
                    return Err(ProvisionError::invalid(format!(
                        "token {} is not held by {}",
                        token, from
                    )));
                }
                if to.is_null() {
                    return Err(ProvisionError::invalid("cannot transfer to the null identity"));
                }

                record.owner = to;
                record.approved = ObjectId::null();
                ctx.state_mut().set(token_key(token), &record)?;
                Self::adjust_balance(ctx, &from, false)?;
                Self::adjust_balance(ctx, &to, true)?;
                ctx.emit("Transfer", args![from, to, token]);
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

    fn alice() -> ObjectId {
        ObjectId::from_label("alice")
    }

    fn bob() -> ObjectId {
        ObjectId::from_label("bob")
    }

    fn ledger_with_factory() -> (Ledger, ObjectId) {
        let mut ledger = Ledger::new();
        let publisher = ObjectId::from_label("publisher");
        let template = ledger.publish_logic(publisher, Arc::new(Collectible)).unwrap();
        let factory = ledger.deploy_factory(publisher, template).unwrap();
        (ledger, factory)
    }

    fn text(ledger: &Ledger, target: &ObjectId, method: &str) -> String {
        ledger
            .query(target, method, &args![])
            .unwrap()
            .as_text()
            .unwrap()
            .to_string()
    }

    #[test]
    fn test_two_clones_keep_their_own_metadata() {
        let (mut ledger, factory) = ledger_with_factory();

        let one = ledger.spawn(alice(), factory, args!["Clone One", "C1"]).unwrap();
        let two = ledger.spawn(bob(), factory, args!["Clone Two", "C2"]).unwrap();
        assert_ne!(one, two);

        assert_eq!(text(&ledger, &one, "name"), "Clone One");
        assert_eq!(text(&ledger, &one, "symbol"), "C1");
        assert_eq!(text(&ledger, &two, "name"), "Clone Two");
        assert_eq!(text(&ledger, &two, "symbol"), "C2");
        assert_eq!(ledger.query(&one, "owner", &args![]).unwrap(), Value::Id(alice()));
        assert_eq!(ledger.query(&two, "owner", &args![]).unwrap(), Value::Id(bob()));
        assert_eq!(ledger.instance(&two).unwrap().params, args!["Clone Two", "C2"]);

        ledger.call(alice(), one, "safe_mint", args![alice()]).unwrap();
        assert_eq!(ledger.query(&one, "total_minted", &args![]).unwrap(), Value::U64(1));
        assert_eq!(ledger.query(&two, "total_minted", &args![]).unwrap(), Value::U64(0));

        let log = ledger.creation_log(&factory).unwrap();
        let owners: Vec<_> = log.iter().map(|record| (record.instance, record.owner)).collect();
        assert_eq!(owners, vec![(one, alice()), (two, bob())]);
    }

    #[test]
    fn test_creation_event_names_the_clone() {
        let (mut ledger, factory) = ledger_with_factory();
        let receipt = ledger
            .execute(alice(), provision_core::Operation::Spawn {
                factory,
                params: args!["Clone One", "C1"],
            })
            .unwrap();

        let created = receipt.events_named("InstanceCreated").next().cloned();
        assert_eq!(
            created,
            Some(Event::InstanceCreated {
                factory,
                instance: receipt.created_instance().unwrap(),
                owner: alice(),
                params: args!["Clone One", "C1"],
            })
        );
    }

    #[test]
    fn test_missing_symbol_is_rejected() {
        let (mut ledger, factory) = ledger_with_factory();
        let err = ledger.spawn(alice(), factory, args!["Clone One"]).unwrap_err();
        assert_eq!(err.code(), "InvalidParameters");
        let err = ledger.spawn(alice(), factory, args!["Clone One", ""]).unwrap_err();
        assert_eq!(err.code(), "InvalidParameters");
        assert!(ledger.creation_log(&factory).unwrap().is_empty());
    }

    #[test]
    fn test_mint_and_transfer() {
        let (mut ledger, factory) = ledger_with_factory();
        let carol = ObjectId::from_label("carol");
        let nft = ledger.spawn(alice(), factory, args!["Clone One", "C1"]).unwrap();

        let err = ledger.call(bob(), nft, "safe_mint", args![bob()]).unwrap_err();
        assert_eq!(err.code(), "Unauthorized");

        assert_eq!(ledger.call(alice(), nft, "safe_mint", args![bob()]).unwrap(), Value::U64(0));
        assert_eq!(ledger.call(alice(), nft, "safe_mint", args![bob()]).unwrap(), Value::U64(1));
        assert_eq!(ledger.query(&nft, "balance_of", &args![bob()]).unwrap(), Value::U64(2));
        assert_eq!(ledger.query(&nft, "owner_of", &args![1u64]).unwrap(), Value::Id(bob()));

        let err = ledger.query(&nft, "owner_of", &args![7u64]).unwrap_err();
        assert_eq!(err.code(), "NotFound");

        // The collection owner has no say over tokens it does not hold
        let err = ledger
            .call(alice(), nft, "transfer_from", args![bob(), alice(), 0u64])
            .unwrap_err();
        assert_eq!(err.code(), "Unauthorized");

        ledger.call(bob(), nft, "approve", args![carol, 0u64]).unwrap();
        assert_eq!(ledger.query(&nft, "get_approved", &args![0u64]).unwrap(), Value::Id(carol));

        ledger.call(carol, nft, "transfer_from", args![bob(), carol, 0u64]).unwrap();
        assert_eq!(ledger.query(&nft, "owner_of", &args![0u64]).unwrap(), Value::Id(carol));
        assert_eq!(ledger.query(&nft, "get_approved", &args![0u64]).unwrap(), Value::Id(ObjectId::null()));
        assert_eq!(ledger.query(&nft, "balance_of", &args![bob()]).unwrap(), Value::U64(1));
        assert_eq!(ledger.query(&nft, "balance_of", &args![carol]).unwrap(), Value::U64(1));

        // Approval was consumed by the transfer
        let err = ledger
            .call(carol, nft, "transfer_from", args![bob(), carol, 1u64])
            .unwrap_err();
        assert_eq!(err.code(), "Unauthorized");
    }

    #[test]
    fn test_transfer_checks_holder_and_recipient() {
        let (mut ledger, factory) = ledger_with_factory();
        let nft = ledger.spawn(alice(), factory, args!["Clone One", "C1"]).unwrap();
        ledger.call(alice(), nft, "safe_mint", args![alice()]).unwrap();

        let err = ledger
            .call(alice(), nft, "transfer_from", args![bob(), alice(), 0u64])
            .unwrap_err();
        assert_eq!(err.code(), "InvalidParameters");

        let err = ledger
            .call(alice(), nft, "transfer_from", args![alice(), ObjectId::null(), 0u64])
            .unwrap_err();
        assert_eq!(err.code(), "InvalidParameters");

        let err = ledger.call(bob(), nft, "approve", args![bob(), 0u64]).unwrap_err();
        assert_eq!(err.code(), "Unauthorized");
    }
}
