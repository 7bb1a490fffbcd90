// ⚠️ Error Types - Domain and storage failures
// Every failure surfaces to the direct caller; nothing is retried internally.
//
// Flow: StorageError → BankError → anyhow (CLI only)

use crate::entities::AccountKey;
use thiserror::Error;

// ============================================================================
// BANK ERROR
// ============================================================================

/// Errors raised by accounts, the bank store and the ATM session.
///
/// A failed PIN check is NOT an error: `AtmSession::insert_card` returns `false`.
#[derive(Debug, Error)]
pub enum BankError {
    /// Deposit or withdrawal called with a non-positive amount.
    #[error("Invalid amount {amount}: must be greater than 0")]
    InvalidAmount { amount: i64 },

    /// Withdrawal would push the balance below `-overdraft_limit`.
    #[error("Insufficient funds in {account}: requested {requested}, available {available} including overdraft")]
    InsufficientFunds {
        account: AccountKey,
        requested: i64,
        available: i64,
    },

    /// Opening balance already below what the tier allows.
    #[error("Opening balance {balance} for {account} is below the overdraft limit of {overdraft_limit}")]
    BalanceBelowOverdraft {
        account: AccountKey,
        balance: i64,
        overdraft_limit: i64,
    },

    /// Deposit would overflow the balance.
    #[error("Balance overflow in {account}")]
    BalanceOverflow { account: AccountKey },

    #[error("Account {0} already exists")]
    DuplicateAccount(AccountKey),

    #[error("Account {0} not found")]
    AccountNotFound(AccountKey),

    #[error("Card must be authenticated before selecting an account")]
    NotAuthenticated,

    /// The chosen account is not bound to the inserted card (interbank is unsupported).
    #[error("Account {0} is not accessible with this card")]
    AccountNotAccessible(AccountKey),

    #[error("No account is currently active")]
    NoActiveAccount,

    #[error("Invalid operator '{0}': must be one of banker, atm")]
    InvalidOperator(String),

    #[error("Invalid tier '{0}': must be one of Standard, Gold, Platinum")]
    InvalidTier(String),

    #[error("Invalid backend '{0}': must be one of csv, sqlite")]
    InvalidBackend(String),

    /// Backend exists but was not compiled in (see the "sqlite" feature)
    #[error("Backend '{0}' is not available in this build")]
    BackendUnavailable(&'static str),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

// ============================================================================
// STORAGE ERROR
// ============================================================================

/// Failures of the backing record store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[cfg(feature = "sqlite")]
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A persisted row failed validation (row is 1-based, header excluded).
    #[error("Invalid record at row {row}: {reason}")]
    InvalidRecord { row: usize, reason: String },
}

pub type BankResult<T> = Result<T, BankError>;

pub type StorageResult<T> = Result<T, StorageError>;
