//! Behaviors ready to publish on a [`provision_runtime::Ledger`]
//!
//! [`GameItems`] and [`Collectible`] are factory templates; [`NotaryV1`] and
//! [`NotaryV2`] are two versions of the logic behind one upgradeable notary.

pub mod collectible;
pub mod game_items;
pub mod notary;

pub use collectible::Collectible;
pub use game_items::{
    GameItems, COMMON_SWORD, GOLD_COIN, HERO_SWORD, INITIAL_GOLD, LEGENDARY_SWORD, VALOROUS_SWORD,
};
pub use notary::{NotaryV1, NotaryV2};
