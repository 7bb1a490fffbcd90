// Entity Models
//
// - Account: balance + tier-derived overdraft limit, shared per slot
// - Card: credentials and the per-slot card → PIN registry

pub mod account;
pub mod card;

pub use account::{Account, AccountKey, SharedAccount, Tier};
pub use card::{mask_card_number, Card, CardBinding, CardRegistry};
