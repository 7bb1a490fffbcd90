// 💳 Account Entity - Balance with a tier-derived overdraft limit
//
// Invariant: balance >= -overdraft_limit after every operation.
// A rejected deposit/withdrawal leaves the balance untouched.

use crate::error::{BankError, BankResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

// ============================================================================
// TIER
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    /// No overdraft
    #[default]
    Standard,

    /// Overdraft up to 500
    Gold,

    /// Overdraft up to 1000
    Platinum,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Standard => "Standard",
            Tier::Gold => "Gold",
            Tier::Platinum => "Platinum",
        }
    }

    /// How far below zero an account of this tier may go
    pub fn overdraft_limit(&self) -> i64 {
        match self {
            Tier::Standard => 0,
            Tier::Gold => 500,
            Tier::Platinum => 1000,
        }
    }
}

impl FromStr for Tier {
    type Err = BankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Standard" => Ok(Tier::Standard),
            "Gold" => Ok(Tier::Gold),
            "Platinum" => Ok(Tier::Platinum),
            other => Err(BankError::InvalidTier(other.to_string())),
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// ACCOUNT KEY
// ============================================================================

/// Identity of a slot: (account_id, account_type)
///
/// Account type is an open key ("Checking", "Saving", ...), not a closed enum.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountKey {
    pub account_id: String,
    pub account_type: String,
}

impl AccountKey {
    pub fn new(account_id: impl Into<String>, account_type: impl Into<String>) -> Self {
        AccountKey {
            account_id: account_id.into(),
            account_type: account_type.into(),
        }
    }
}

impl fmt::Display for AccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.account_id, self.account_type)
    }
}

// ============================================================================
// ACCOUNT ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    key: AccountKey,
    balance: i64,
    tier: Tier,

    /// Fixed at creation from the tier
    overdraft_limit: i64,
}

impl Account {
    pub fn new(key: AccountKey, balance: i64, tier: Tier) -> Self {
        Account {
            key,
            balance,
            tier,
            overdraft_limit: tier.overdraft_limit(),
        }
    }

    pub fn key(&self) -> &AccountKey {
        &self.key
    }

    pub fn balance(&self) -> i64 {
        self.balance
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn overdraft_limit(&self) -> i64 {
        self.overdraft_limit
    }

    /// Balance plus overdraft headroom (saturates instead of overflowing)
    pub fn available_funds(&self) -> i64 {
        self.balance.saturating_add(self.overdraft_limit)
    }

    /// Check if account is overdrawn (negative balance)
    pub fn is_overdrawn(&self) -> bool {
        self.balance < 0
    }

    pub fn deposit(&mut self, amount: i64) -> BankResult<()> {
        if amount <= 0 {
            return Err(BankError::InvalidAmount { amount });
        }
        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or_else(|| BankError::BalanceOverflow {
                account: self.key.clone(),
            })?;
        Ok(())
    }

    pub fn withdraw(&mut self, amount: i64) -> BankResult<()> {
        if amount <= 0 {
            return Err(BankError::InvalidAmount { amount });
        }
        let available = self.available_funds();
        if available < amount {
            return Err(BankError::InsufficientFunds {
                account: self.key.clone(),
                requested: amount,
                available,
            });
        }
        // available >= amount keeps the result >= -overdraft_limit
        self.balance -= amount;
        Ok(())
    }
}

// ============================================================================
// SHARED ACCOUNT HANDLE
// ============================================================================

/// One lock per slot. The bank store and every ATM session that selected the
/// slot hold clones of the same handle.
#[derive(Debug, Clone)]
pub struct SharedAccount(Arc<RwLock<Account>>);

impl SharedAccount {
    pub fn new(account: Account) -> Self {
        SharedAccount(Arc::new(RwLock::new(account)))
    }

    /// Read guard (a poisoned lock is recovered; account state is always valid)
    pub fn read(&self) -> RwLockReadGuard<'_, Account> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Account> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn balance(&self) -> i64 {
        self.read().balance()
    }

    /// Check-and-mutate happens under a single write guard
    pub fn deposit(&self, amount: i64) -> BankResult<i64> {
        let mut account = self.write();
        account.deposit(amount)?;
        Ok(account.balance())
    }

    pub fn withdraw(&self, amount: i64) -> BankResult<i64> {
        let mut account = self.write();
        account.withdraw(amount)?;
        Ok(account.balance())
    }

    /// True if both handles point at the same slot
    pub fn ptr_eq(&self, other: &SharedAccount) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn create_test_account(balance: i64, tier: Tier) -> Account {
        Account::new(AccountKey::new("C1", "Checking"), balance, tier)
    }

    #[test]
    fn test_overdraft_limit_from_tier() {
        assert_eq!(create_test_account(0, Tier::Standard).overdraft_limit(), 0);
        assert_eq!(create_test_account(0, Tier::Gold).overdraft_limit(), 500);
        assert_eq!(create_test_account(0, Tier::Platinum).overdraft_limit(), 1000);
    }

    #[test]
    fn test_tier_parsing() {
        assert_eq!("Gold".parse::<Tier>().unwrap(), Tier::Gold);
        assert_eq!(" Platinum ".parse::<Tier>().unwrap(), Tier::Platinum);
        assert!(matches!(
            "Diamond".parse::<Tier>(),
            Err(BankError::InvalidTier(t)) if t == "Diamond"
        ));
        assert_eq!(Tier::default(), Tier::Standard);
    }

    #[test]
    fn test_deposit_adds_exact_amount() {
        let mut account = create_test_account(1500, Tier::Gold);
        account.deposit(100).unwrap();
        assert_eq!(account.balance(), 1600);
    }

    #[test]
    fn test_non_positive_amounts_rejected() {
        let mut account = create_test_account(100, Tier::Standard);

        assert!(matches!(account.deposit(0), Err(BankError::InvalidAmount { amount: 0 })));
        assert!(matches!(account.deposit(-10), Err(BankError::InvalidAmount { amount: -10 })));
        assert!(matches!(account.withdraw(0), Err(BankError::InvalidAmount { .. })));
        assert!(matches!(account.withdraw(-1), Err(BankError::InvalidAmount { .. })));
        assert_eq!(account.balance(), 100);
    }

    #[test]
    fn test_withdraw_into_overdraft() {
        let mut account = create_test_account(1600, Tier::Gold);

        // 1600 + 500 = 2100 >= 2000
        account.withdraw(2000).unwrap();
        assert_eq!(account.balance(), -400);
        assert!(account.is_overdrawn());
    }

    #[test]
    fn test_withdraw_beyond_overdraft_rejected() {
        let mut account = create_test_account(1600, Tier::Gold);

        let err = account.withdraw(2200).unwrap_err();
        match err {
            BankError::InsufficientFunds { requested, available, .. } => {
                assert_eq!(requested, 2200);
                assert_eq!(available, 2100);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(account.balance(), 1600);
    }

    #[test]
    fn test_standard_tier_cannot_go_negative() {
        let mut account = create_test_account(50, Tier::Standard);
        account.withdraw(50).unwrap();
        assert_eq!(account.balance(), 0);
        assert!(account.withdraw(1).is_err());
    }

    #[test]
    fn test_deposit_overflow_rejected() {
        let mut account = create_test_account(i64::MAX - 1, Tier::Platinum);
        assert!(matches!(account.deposit(5), Err(BankError::BalanceOverflow { .. })));
        assert_eq!(account.balance(), i64::MAX - 1);
        // Headroom saturates, so a large withdrawal still works
        account.withdraw(10).unwrap();
        assert_eq!(account.balance(), i64::MAX - 11);
    }

    #[test]
    fn test_shared_account_mutations_visible_through_clones() {
        let shared = SharedAccount::new(create_test_account(1000, Tier::Standard));
        let other = shared.clone();

        assert_eq!(shared.deposit(250).unwrap(), 1250);
        assert_eq!(other.balance(), 1250);
        assert!(shared.ptr_eq(&other));
    }

    #[derive(Debug, Clone)]
    enum Op {
        Deposit(i64),
        Withdraw(i64),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (-100i64..5_000).prop_map(Op::Deposit),
            (-100i64..5_000).prop_map(Op::Withdraw),
        ]
    }

    fn tier_strategy() -> impl Strategy<Value = Tier> {
        prop_oneof![Just(Tier::Standard), Just(Tier::Gold), Just(Tier::Platinum)]
    }

    proptest! {
        #[test]
        fn prop_overdraft_invariant_holds(
            tier in tier_strategy(),
            start in 0i64..10_000,
            ops in prop::collection::vec(op_strategy(), 0..64),
        ) {
            let mut account = create_test_account(start, tier);
            for op in ops {
                let before = account.balance();
                let result = match op {
                    Op::Deposit(amount) => account.deposit(amount),
                    Op::Withdraw(amount) => account.withdraw(amount),
                };
                match (result, op) {
                    (Ok(()), Op::Deposit(amount)) => {
                        prop_assert_eq!(account.balance(), before + amount);
                    }
                    (Ok(()), Op::Withdraw(amount)) => {
                        prop_assert_eq!(account.balance(), before - amount);
                    }
                    (Err(_), _) => {
                        prop_assert_eq!(account.balance(), before);
                    }
                }
                prop_assert!(account.balance() >= -account.overdraft_limit());
            }
        }
    }
}
