// ATM Bank - Core Library
// Account/card model, persistent bank store and ATM session for the CLI and tests

pub mod error;
pub mod entities;
pub mod db;
pub mod bank;
pub mod atm;
pub mod config;

// Re-export commonly used types
pub use error::{BankError, BankResult, StorageError, StorageResult};
pub use entities::{
    Account, AccountKey, SharedAccount, Tier,
    Card, CardBinding, CardRegistry, mask_card_number,
};
pub use db::{AccountRecord, RecordStore, CsvStore, MemoryStore, RECORD_FIELDS};
#[cfg(feature = "sqlite")]
pub use db::SqliteStore;
pub use bank::{BankStore, Operator, AccountSummary};
pub use atm::AtmSession;
pub use config::{BankConfig, Backend};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
