// 🪪 Card Entity - Card credentials and per-slot PIN bindings
//
// PINs are compared as plaintext strings (no hashing, no lockout).

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// CARD
// ============================================================================

/// Credentials presented at the ATM
#[derive(Clone, PartialEq, Eq)]
pub struct Card {
    pub card_number: String,
    pub pin: String,
}

impl Card {
    pub fn new(card_number: impl Into<String>, pin: impl Into<String>) -> Self {
        Card {
            card_number: card_number.into(),
            pin: pin.into(),
        }
    }

    /// Card number for log output
    pub fn masked_number(&self) -> String {
        mask_card_number(&self.card_number)
    }
}

// Never print the PIN
impl fmt::Debug for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Card")
            .field("card_number", &self.masked_number())
            .field("pin", &"****")
            .finish()
    }
}

/// Mask card number (show only last 4 characters)
///
/// Example: "1111-2222-3333-4444" → "*4444"
pub fn mask_card_number(card_number: &str) -> String {
    let chars: Vec<char> = card_number.chars().collect();
    if chars.len() <= 4 {
        return card_number.to_string();
    }
    let last4: String = chars[chars.len() - 4..].iter().collect();
    format!("*{}", last4)
}

// ============================================================================
// CARD REGISTRY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardBinding {
    pub card_number: String,
    pub pin: String,
}

/// Cards bound to one slot, in binding order.
///
/// Each card number maps to exactly one PIN; rebinding overwrites in place.
#[derive(Debug, Clone, Default)]
pub struct CardRegistry {
    bindings: Vec<CardBinding>,
}

impl CardRegistry {
    pub fn new() -> Self {
        CardRegistry::default()
    }

    /// Bind a PIN to a card, replacing any previous PIN for that card
    pub fn bind(&mut self, card_number: &str, pin: &str) {
        match self.bindings.iter_mut().find(|b| b.card_number == card_number) {
            Some(binding) => binding.pin = pin.to_string(),
            None => self.bindings.push(CardBinding {
                card_number: card_number.to_string(),
                pin: pin.to_string(),
            }),
        }
    }

    /// Exact card + PIN match
    pub fn matches(&self, card_number: &str, pin: &str) -> bool {
        self.bindings
            .iter()
            .any(|b| b.card_number == card_number && b.pin == pin)
    }

    /// Card is bound here, whatever its PIN
    pub fn contains(&self, card_number: &str) -> bool {
        self.bindings.iter().any(|b| b.card_number == card_number)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CardBinding> {
        self.bindings.iter()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

// ============================================================================
// TESTS
// ============================================================================
