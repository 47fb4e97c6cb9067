//! Document notary logic, published as two versions of one upgradeable
//! instance.
//!
//! Both versions keep registrations under the same `doc/<hex>` keys, so a
//! proxy upgraded from [`NotaryV1`] to [`NotaryV2`] keeps every document.

use log::debug;
use provision_core::{Args, Fingerprint, ObjectId, ProvisionError, Value};
use provision_runtime::{unknown_method, Behavior, CallContext};

const DOCUMENT_PREFIX: &str = "doc/";

fn document_key(hash: &Fingerprint) -> String {
    format!("{}{}", DOCUMENT_PREFIX, hash.to_hex())
}

fn registrant(ctx: &CallContext<'_>, hash: &Fingerprint) -> Result<Option<ObjectId>, ProvisionError> {
    ctx.state().get(&document_key(hash))
}

/// Methods shared by both versions
fn call_common(
    logic: &dyn Behavior,
    ctx: &mut CallContext<'_>,
    method: &str,
    args: &Args,
) -> Result<Value, ProvisionError> {
    match method {
        "add_document" => {
            args.expect_len(1)?;
            let hash = args.hash(0)?;
            if registrant(ctx, &hash)?.is_some() {
                return Err(ProvisionError::DocumentExists(hash));
            }
            let caller = ctx.caller();
            ctx.state_mut().set(document_key(&hash), &caller)?;
            debug!("{} registered document {} on {}", caller, hash, ctx.this());
            Ok(Value::Unit)
        }
        "get_document_owner" => {
            args.expect_len(1)?;
            let hash = args.hash(0)?;
            Ok(Value::Id(registrant(ctx, &hash)?.unwrap_or_default()))
        }
        "owner" => Ok(Value::Id(ctx.owner())),
        _ => Err(unknown_method(logic, method)),
    }
}

/// First notary release: register documents and look up their registrants
pub struct NotaryV1;

impl Behavior for NotaryV1 {
    fn name(&self) -> &str {
        "notary"
    }

    fn methods(&self) -> &[&'static str] {
        &["add_document", "get_document_owner", "owner"]
    }

    fn initialize(&self, _ctx: &mut CallContext<'_>, params: &Args) -> Result<(), ProvisionError> {
        params.expect_len(0)
    }

    fn call(&self, ctx: &mut CallContext<'_>, method: &str, args: &Args) -> Result<Value, ProvisionError> {
        call_common(self, ctx, method, args)
    }
}

/// Second release, adding the admin-only `rename_document`
pub struct NotaryV2;

impl Behavior for NotaryV2 {
    fn name(&self) -> &str {
        "notary"
    }

    fn version(&self) -> u32 {
        2
    }

    fn methods(&self) -> &[&'static str] {
        &["add_document", "get_document_owner", "owner", "rename_document"]
    }

    fn initialize(&self, _ctx: &mut CallContext<'_>, params: &Args) -> Result<(), ProvisionError> {
        params.expect_len(0)
    }

    fn call(&self, ctx: &mut CallContext<'_>, method: &str, args: &Args) -> Result<Value, ProvisionError> {
        if method != "rename_document" {
            return call_common(self, ctx, method, args);
        }

        ctx.require_owner("rename documents")?;
        args.expect_len(2)?;
        let old = args.hash(0)?;
        let new = args.hash(1)?;

        let owner = registrant(ctx, &old)?
            .ok_or_else(|| ProvisionError::not_found(format!("document {}", old)))?;
        if registrant(ctx, &new)?.is_some() {
            return Err(ProvisionError::DocumentExists(new));
        }

        ctx.state_mut().remove(&document_key(&old));
        ctx.state_mut().set(document_key(&new), &owner)?;
        debug!("Document {} renamed to {} on {}", old, new, ctx.this());
        Ok(Value::Unit)
    }
}
