// 🏦 Bank Store - Catalog of accounts reachable by card + PIN
//
// Catalog: account_id → account_type → slot { account, cards }
// Iteration is insertion order at both levels.
//
// Persistence runs on every catalog mutation (create_account, add_card_to_account)
// and on save_all(). Balance changes made through an Account handle are NOT
// persisted until save_all() is called.

use crate::db::{AccountRecord, RecordStore};
use crate::entities::{mask_card_number, Account, AccountKey, Card, CardRegistry, SharedAccount, Tier};
use crate::error::{BankError, BankResult, StorageError, StorageResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

// ============================================================================
// OPERATOR
// ============================================================================

/// Role that opened the store. Recorded and logged; grants no permissions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    #[default]
    Banker,
    Atm,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Banker => "banker",
            Operator::Atm => "atm",
        }
    }
}

impl FromStr for Operator {
    type Err = BankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "banker" => Ok(Operator::Banker),
            "atm" => Ok(Operator::Atm),
            other => Err(BankError::InvalidOperator(other.to_string())),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SLOTS
// ============================================================================

/// One (account_id, account_type) unit: exactly one account and its cards
struct Slot {
    account_type: String,
    account: SharedAccount,
    cards: CardRegistry,
}

/// All slots of one account_id, in insertion order
struct AccountSlots {
    account_id: String,
    slots: Vec<Slot>,
}

impl AccountSlots {
    fn slot(&self, account_type: &str) -> Option<&Slot> {
        self.slots.iter().find(|s| s.account_type == account_type)
    }

    fn slot_mut(&mut self, account_type: &str) -> Option<&mut Slot> {
        self.slots.iter_mut().find(|s| s.account_type == account_type)
    }
}

/// Read-only view of a slot for listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountSummary {
    pub key: AccountKey,
    pub balance: i64,
    pub tier: Tier,
    pub overdraft_limit: i64,
    pub card_count: usize,
}

// ============================================================================
// BANK STORE
// ============================================================================

pub struct BankStore {
    catalog: Vec<AccountSlots>,

    /// account_id → position in `catalog`
    index: HashMap<String, usize>,

    store: Box<dyn RecordStore>,
    operator: Operator,
}

impl BankStore {
    /// Build the catalog from the record store.
    ///
    /// Several rows for one slot share a single account: the first row's
    /// balance/tier win, later rows only add (or rebind) cards. That first row
    /// must name a known tier and a balance the tier's overdraft allows.
    pub fn load(store: Box<dyn RecordStore>, operator: Operator) -> BankResult<Self> {
        let records = store.load()?;

        let mut bank = BankStore {
            catalog: Vec::new(),
            index: HashMap::new(),
            store,
            operator,
        };

        for (i, record) in records.iter().enumerate() {
            let row = i + 1;
            record.validate(row)?;

            let key = AccountKey::new(record.account_id.clone(), record.account_type.clone());
            if bank.slot(&key).is_none() {
                let tier = record_tier(record, row)?;
                let balance = record.balance_or_default();
                if balance < -tier.overdraft_limit() {
                    return Err(StorageError::InvalidRecord {
                        row,
                        reason: format!(
                            "balance {} is below the {} overdraft limit of {}",
                            balance,
                            tier,
                            tier.overdraft_limit()
                        ),
                    }
                    .into());
                }
                bank.insert_slot(Account::new(key.clone(), balance, tier));
            }
            if let Some(slot) = bank.slot_mut(&key) {
                slot.cards.bind(&record.card_number, &record.pin);
            }
        }

        info!(
            operator = %bank.operator,
            source = %bank.store.describe(),
            rows = records.len(),
            accounts = bank.len(),
            "Bank store loaded"
        );
        Ok(bank)
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.catalog.iter().map(|a| a.slots.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ========================================================================
    // CATALOG MUTATION (persists immediately)
    // ========================================================================

    pub fn create_account(
        &mut self,
        account_id: &str,
        account_type: &str,
        initial_balance: i64,
        tier: Tier,
        card_number: &str,
        pin: &str,
    ) -> BankResult<()> {
        let key = AccountKey::new(account_id, account_type);
        if self.slot(&key).is_some() {
            return Err(BankError::DuplicateAccount(key));
        }
        if initial_balance < -tier.overdraft_limit() {
            return Err(BankError::BalanceBelowOverdraft {
                account: key,
                balance: initial_balance,
                overdraft_limit: tier.overdraft_limit(),
            });
        }

        let slot = self.insert_slot(Account::new(key.clone(), initial_balance, tier));
        slot.cards.bind(card_number, pin);

        info!(
            account = %key,
            tier = %tier,
            balance = initial_balance,
            card = %mask_card_number(card_number),
            "Account created"
        );
        self.persist()
    }

    pub fn add_card_to_account(
        &mut self,
        account_id: &str,
        account_type: &str,
        card_number: &str,
        pin: &str,
    ) -> BankResult<()> {
        let key = AccountKey::new(account_id, account_type);
        let slot = self
            .slot_mut(&key)
            .ok_or_else(|| BankError::AccountNotFound(key.clone()))?;
        slot.cards.bind(card_number, pin);

        info!(account = %key, card = %mask_card_number(card_number), "Card bound to account");
        self.persist()
    }

    /// Flush every slot, including balance changes made through account handles
    pub fn save_all(&self) -> BankResult<()> {
        self.persist()
    }

    // ========================================================================
    // LOOKUPS (scan the whole catalog; card numbers are not globally unique)
    // ========================================================================

    /// Every slot where the card is bound to exactly this PIN
    pub fn verify_card_pin(&self, card_number: &str, pin: &str) -> Vec<AccountKey> {
        let found: Vec<AccountKey> = self
            .slots()
            .filter(|(_, slot)| slot.cards.matches(card_number, pin))
            .map(|(account_id, slot)| AccountKey::new(account_id, slot.account_type.as_str()))
            .collect();

        debug!(card = %mask_card_number(card_number), matches = found.len(), "Verified card PIN");
        found
    }

    /// Authentication gate: true if any slot has this exact card + PIN
    pub fn validate_pin(&self, card: &Card) -> bool {
        self.slots()
            .any(|(_, slot)| slot.cards.matches(&card.card_number, &card.pin))
    }

    /// Every slot the card is bound to, whatever PIN is stored there.
    /// Callers authenticate with `validate_pin` first.
    pub fn get_accessible_accounts(&self, card_number: &str) -> Vec<(AccountKey, SharedAccount)> {
        self.slots()
            .filter(|(_, slot)| slot.cards.contains(card_number))
            .map(|(account_id, slot)| {
                (
                    AccountKey::new(account_id, slot.account_type.as_str()),
                    slot.account.clone(),
                )
            })
            .collect()
    }

    pub fn get_account(&self, account_id: &str, account_type: &str) -> Option<SharedAccount> {
        self.index
            .get(account_id)
            .and_then(|&i| self.catalog[i].slot(account_type))
            .map(|slot| slot.account.clone())
    }

    /// All slots in catalog order
    pub fn accounts(&self) -> Vec<AccountSummary> {
        self.slots()
            .map(|(_, slot)| {
                let account = slot.account.read();
                AccountSummary {
                    key: account.key().clone(),
                    balance: account.balance(),
                    tier: account.tier(),
                    overdraft_limit: account.overdraft_limit(),
                    card_count: slot.cards.len(),
                }
            })
            .collect()
    }

    // ========================================================================
    // INTERNALS
    // ========================================================================

    fn slots(&self) -> impl Iterator<Item = (&str, &Slot)> {
        self.catalog.iter().flat_map(|entry| {
            entry
                .slots
                .iter()
                .map(move |slot| (entry.account_id.as_str(), slot))
        })
    }

    fn slot(&self, key: &AccountKey) -> Option<&Slot> {
        self.index
            .get(&key.account_id)
            .and_then(|&i| self.catalog[i].slot(&key.account_type))
    }

    fn slot_mut(&mut self, key: &AccountKey) -> Option<&mut Slot> {
        let i = *self.index.get(&key.account_id)?;
        self.catalog[i].slot_mut(&key.account_type)
    }

    /// Append a new slot with no cards; caller checked it does not exist
    fn insert_slot(&mut self, account: Account) -> &mut Slot {
        let key = account.key().clone();
        let i = match self.index.get(&key.account_id) {
            Some(&i) => i,
            None => {
                self.catalog.push(AccountSlots {
                    account_id: key.account_id.clone(),
                    slots: Vec::new(),
                });
                let i = self.catalog.len() - 1;
                self.index.insert(key.account_id.clone(), i);
                i
            }
        };

        let slots = &mut self.catalog[i].slots;
        slots.push(Slot {
            account_type: key.account_type,
            account: SharedAccount::new(account),
            cards: CardRegistry::new(),
        });
        let last = slots.len() - 1;
        &mut slots[last]
    }

    /// One row per (slot, card), carrying the slot's current balance and tier
    fn to_records(&self) -> Vec<AccountRecord> {
        let mut records = Vec::new();
        for (account_id, slot) in self.slots() {
            let account = slot.account.read();
            for binding in slot.cards.iter() {
                records.push(AccountRecord {
                    account_id: account_id.to_string(),
                    account_type: slot.account_type.clone(),
                    balance: Some(account.balance()),
                    tier: Some(account.tier().as_str().to_string()),
                    card_number: binding.card_number.clone(),
                    pin: binding.pin.clone(),
                });
            }
        }
        records
    }

    fn persist(&self) -> BankResult<()> {
        let records = self.to_records();
        self.store.save(&records)?;
        info!(
            operator = %self.operator,
            target = %self.store.describe(),
            rows = records.len(),
            "Bank store saved"
        );
        Ok(())
    }
}

/// Blank tier → Standard; an unknown tier rejects the row
fn record_tier(record: &AccountRecord, row: usize) -> StorageResult<Tier> {
    match record.tier_name() {
        None => Ok(Tier::Standard),
        Some(name) => name.parse().map_err(|_| StorageError::InvalidRecord {
            row,
            reason: format!("unknown tier '{}'", name),
        }),
    }
}

// ============================================================================
// TESTS
// ============================================================================
