//! Confidence-tagged field readings

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::Deref;

/// Rank alphabet, lowest first
pub const RANKS: &str = "23456789TJQKA";
/// Suit alphabet (clubs, diamonds, hearts, spades)
pub const SUITS: &str = "cdhs";

/// A value paired with the confidence in [0, 1] of the reading that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldReading<T> {
    pub value: T,
    pub confidence: f64,
}

impl<T> FieldReading<T> {
    /// Create a reading; confidence is clamped into [0, 1] (NaN reads as 0)
    pub fn new(value: T, confidence: f64) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self { value, confidence }
    }

    /// Whether the reading meets `threshold`
    pub fn is_trusted(&self, threshold: f64) -> bool {
        self.confidence >= threshold
    }
}

impl<T: Default> FieldReading<T> {
    /// The "nothing recognised" reading: default value, zero confidence
    pub fn unknown() -> Self {
        Self {
            value: T::default(),
            confidence: 0.0,
        }
    }
}

impl<T: Default> Default for FieldReading<T> {
    fn default() -> Self {
        Self::unknown()
    }
}

/// A playing card code such as `Ah` or `Td`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Card {
    rank: char,
    suit: char,
}

impl Card {
    /// Build a card from a rank and suit token.
    ///
    /// Accepts ranks case-insensitively and suits as letters or symbols;
    /// anything outside the alphabets yields `None`.
    pub fn new(rank: char, suit: char) -> Option<Self> {
        let rank = rank.to_ascii_uppercase();
        if !RANKS.contains(rank) {
            return None;
        }
        let suit = match suit {
            '♣' => 'c',
            '♦' => 'd',
            '♥' => 'h',
            '♠' => 's',
            other => other.to_ascii_lowercase(),
        };
        if !SUITS.contains(suit) {
            return None;
        }
        Some(Self { rank, suit })
    }

    pub fn rank(&self) -> char {
        self.rank
    }

    pub fn suit(&self) -> char {
        self.suit
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.rank, self.suit)
    }
}

impl std::str::FromStr for Card {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.trim().chars();
        match (chars.next(), chars.next(), chars.next()) {
            (Some(rank), Some(suit), None) => {
                Card::new(rank, suit).ok_or_else(|| format!("Invalid card: {}", s))
            }
            _ => Err(format!("Invalid card: {}", s)),
        }
    }
}

impl TryFrom<String> for Card {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Card> for String {
    fn from(card: Card) -> Self {
        card.to_string()
    }
}

/// Betting actions recognised in the action area
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ActionLabel {
    #[serde(rename = "RAISE")]
    Raise,
    #[serde(rename = "CALL")]
    Call,
    #[serde(rename = "CHECK")]
    Check,
    #[serde(rename = "FOLD")]
    Fold,
    #[serde(rename = "ALL-IN")]
    AllIn,
}

impl ActionLabel {
    pub const ALL: [ActionLabel; 5] = [
        ActionLabel::Raise,
        ActionLabel::Call,
        ActionLabel::Check,
        ActionLabel::Fold,
        ActionLabel::AllIn,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionLabel::Raise => "RAISE",
            ActionLabel::Call => "CALL",
            ActionLabel::Check => "CHECK",
            ActionLabel::Fold => "FOLD",
            ActionLabel::AllIn => "ALL-IN",
        }
    }
}

impl fmt::Display for ActionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Amount seen next to one action label. An amount of 0 means "not present".
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ActionEntry {
    pub amount: f64,
    pub confidence: f64,
}

/// Action label -> amount/confidence, for one frame
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ActionReading(BTreeMap<ActionLabel, ActionEntry>);

impl ActionReading {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every label with amount 0 at the given confidence
    pub fn empty_with_confidence(confidence: f64) -> Self {
        let mut reading = Self::new();
        for label in ActionLabel::ALL {
            reading.insert(label, 0.0, confidence);
        }
        reading
    }

    pub fn insert(&mut self, label: ActionLabel, amount: f64, confidence: f64) {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        self.0.insert(label, ActionEntry { amount, confidence });
    }

    /// Labels whose amount is positive
    pub fn active_labels(&self) -> BTreeSet<ActionLabel> {
        self.0
            .iter()
            .filter(|(_, entry)| entry.amount > 0.0)
            .map(|(label, _)| *label)
            .collect()
    }
}

impl Deref for ActionReading {
    type Target = BTreeMap<ActionLabel, ActionEntry>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
