// 🏧 ATM Session - insert card → authenticate → choose account → transact → end
//
// The session borrows the bank store (no global catalog). Accessible accounts
// are snapshotted at authentication; the active account is the same shared
// handle the store holds, so deposits/withdrawals mutate the store's account.

use crate::bank::BankStore;
use crate::entities::{AccountKey, Card, SharedAccount};
use crate::error::{BankError, BankResult};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

// ============================================================================
// SESSION STATE
// ============================================================================

/// An active account can only exist inside an authenticated state.
enum SessionState {
    NoCard,

    /// Card held, PIN check failed
    Rejected { card: Card },

    Authenticated {
        card: Card,
        accounts: Vec<(AccountKey, SharedAccount)>,
    },

    AccountActive {
        card: Card,
        accounts: Vec<(AccountKey, SharedAccount)>,
        active: (AccountKey, SharedAccount),
    },
}

// ============================================================================
// ATM SESSION
// ============================================================================

pub struct AtmSession<'a> {
    bank: &'a BankStore,
    state: SessionState,
    session_id: Uuid,
    started_at: Option<DateTime<Utc>>,
}

impl<'a> AtmSession<'a> {
    pub fn new(bank: &'a BankStore) -> Self {
        AtmSession {
            bank,
            state: SessionState::NoCard,
            session_id: Uuid::new_v4(),
            started_at: None,
        }
    }

    fn reset(&mut self) {
        self.state = SessionState::NoCard;
        self.session_id = Uuid::new_v4();
        self.started_at = None;
    }

    /// Authenticate a card. Returns false on a wrong card/PIN (not an error).
    pub fn insert_card(&mut self, card: Card) -> bool {
        self.reset();
        self.started_at = Some(Utc::now());
        debug!(session = %self.session_id, card = %card.masked_number(), "Card inserted");

        if !self.bank.validate_pin(&card) {
            warn!(session = %self.session_id, card = %card.masked_number(), "PIN validation failed");
            self.state = SessionState::Rejected { card };
            return false;
        }

        let accounts = self.bank.get_accessible_accounts(&card.card_number);
        info!(
            session = %self.session_id,
            card = %card.masked_number(),
            accounts = accounts.len(),
            "Card authenticated"
        );
        self.state = SessionState::Authenticated { card, accounts };
        true
    }

    /// Select an account from the authentication-time snapshot.
    /// A failed choice leaves any previous selection in place.
    pub fn choose_account(&mut self, key: &AccountKey) -> BankResult<()> {
        let accounts = match &self.state {
            SessionState::Authenticated { accounts, .. }
            | SessionState::AccountActive { accounts, .. } => accounts,
            _ => return Err(BankError::NotAuthenticated),
        };

        let active = accounts
            .iter()
            .find(|(k, _)| k == key)
            .map(|(k, account)| (k.clone(), account.clone()))
            .ok_or_else(|| BankError::AccountNotAccessible(key.clone()))?;

        self.state = match std::mem::replace(&mut self.state, SessionState::NoCard) {
            SessionState::Authenticated { card, accounts }
            | SessionState::AccountActive { card, accounts, .. } => {
                SessionState::AccountActive { card, accounts, active }
            }
            other => other,
        };

        info!(session = %self.session_id, account = %key, "Account selected");
        Ok(())
    }

    pub fn current_balance(&self) -> BankResult<i64> {
        Ok(self.active()?.1.balance())
    }

    /// Deposit into the active account, returning the new balance
    pub fn make_deposit(&self, amount: i64) -> BankResult<i64> {
        let (key, account) = self.active()?;
        match account.deposit(amount) {
            Ok(balance) => {
                info!(session = %self.session_id, account = %key, amount, balance, "Deposit");
                Ok(balance)
            }
            Err(e) => {
                warn!(session = %self.session_id, account = %key, amount, error = %e, "Deposit rejected");
                Err(e)
            }
        }
    }

    /// Withdraw from the active account, returning the new balance
    pub fn make_withdrawal(&self, amount: i64) -> BankResult<i64> {
        let (key, account) = self.active()?;
        match account.withdraw(amount) {
            Ok(balance) => {
                info!(session = %self.session_id, account = %key, amount, balance, "Withdrawal");
                Ok(balance)
            }
            Err(e) => {
                warn!(session = %self.session_id, account = %key, amount, error = %e, "Withdrawal rejected");
                Err(e)
            }
        }
    }

    pub fn end_session(&mut self) {
        if let Some(card) = self.card() {
            let duration_ms = self
                .started_at
                .map(|t| (Utc::now() - t).num_milliseconds())
                .unwrap_or(0);
            info!(
                session = %self.session_id,
                card = %card.masked_number(),
                duration_ms,
                "Card ejected, session ended"
            );
        }
        self.reset();
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn card(&self) -> Option<&Card> {
        match &self.state {
            SessionState::NoCard => None,
            SessionState::Rejected { card }
            | SessionState::Authenticated { card, .. }
            | SessionState::AccountActive { card, .. } => Some(card),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(
            self.state,
            SessionState::Authenticated { .. } | SessionState::AccountActive { .. }
        )
    }

    /// Keys of the authentication-time snapshot, in catalog order
    pub fn accessible_accounts(&self) -> Vec<AccountKey> {
        match &self.state {
            SessionState::Authenticated { accounts, .. }
            | SessionState::AccountActive { accounts, .. } => {
                accounts.iter().map(|(k, _)| k.clone()).collect()
            }
            _ => Vec::new(),
        }
    }

    pub fn active_account(&self) -> Option<&AccountKey> {
        match &self.state {
            SessionState::AccountActive { active, .. } => Some(&active.0),
            _ => None,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    fn active(&self) -> BankResult<(&AccountKey, &SharedAccount)> {
        match &self.state {
            SessionState::AccountActive { active, .. } => Ok((&active.0, &active.1)),
            _ => Err(BankError::NoActiveAccount),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
