//! Card engine: deck model, shoes and hand valuation for blackjack and baccarat.

use crate::errors::GameError;
use crate::games::rng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Suit {
    Clubs,
    Diamonds,
    Hearts,
    Spades,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Clubs, Suit::Diamonds, Suit::Hearts, Suit::Spades];
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Rank {
    Ace = 1,
    Two = 2,
    Three = 3,
    Four = 4,
    Five = 5,
    Six = 6,
    Seven = 7,
    Eight = 8,
    Nine = 9,
    Ten = 10,
    Jack = 11,
    Queen = 12,
    King = 13,
}

impl Rank {
    pub const ALL: [Rank; 13] = [
        Rank::Ace,
        Rank::Two,
        Rank::Three,
        Rank::Four,
        Rank::Five,
        Rank::Six,
        Rank::Seven,
        Rank::Eight,
        Rank::Nine,
        Rank::Ten,
        Rank::Jack,
        Rank::Queen,
        Rank::King,
    ];

    /// Blackjack pip value with the ace counted low
    pub fn blackjack_points(&self) -> u8 {
        match self {
            Rank::Jack | Rank::Queen | Rank::King => 10,
            other => *other as u8,
        }
    }

    /// Baccarat pip value: tens and faces are worth 0
    pub fn baccarat_points(&self) -> u8 {
        match self {
            Rank::Ten | Rank::Jack | Rank::Queen | Rank::King => 0,
            other => *other as u8,
        }
    }
}

impl TryFrom<u8> for Rank {
    type Error = GameError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Rank::ALL
            .get((value as usize).wrapping_sub(1))
            .copied()
            .ok_or_else(|| GameError::InvalidSelection(format!("no card rank {}", value)))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Card {
    pub rank: Rank,
    pub suit: Suit,
}

impl Card {
    pub fn new(rank: Rank, suit: Suit) -> Self {
        Self { rank, suit }
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rank = match self.rank {
            Rank::Ace => "A".to_string(),
            Rank::Jack => "J".to_string(),
            Rank::Queen => "Q".to_string(),
            Rank::King => "K".to_string(),
            other => (other as u8).to_string(),
        };
        let suit = match self.suit {
            Suit::Clubs => 'c',
            Suit::Diamonds => 'd',
            Suit::Hearts => 'h',
            Suit::Spades => 's',
        };
        write!(f, "{}{}", rank, suit)
    }
}

/// Which ruleset to value a hand under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandRules {
    Blackjack,
    Baccarat,
}

/// Blackjack hand total plus whether an ace is still counted as 11
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandValue {
    pub total: u8,
    pub soft: bool,
}

impl HandValue {
    pub fn is_bust(&self) -> bool {
        self.total > 21
    }
}

/// `deck_count` standard 52-card decks, shuffled
pub fn create_shoe<R: Rng + ?Sized>(deck_count: usize, rng: &mut R) -> Result<Vec<Card>, GameError> {
    if deck_count == 0 {
        return Err(GameError::EmptyDomain);
    }
    let mut cards = Vec::with_capacity(deck_count * 52);
    for _ in 0..deck_count {
        for suit in Suit::ALL {
            for rank in Rank::ALL {
                cards.push(Card::new(rank, suit));
            }
        }
    }
    Ok(rng::shuffle(cards, rng))
}

/// Hand value under the given rules
pub fn hand_value(cards: &[Card], rules: HandRules) -> u8 {
    match rules {
        HandRules::Blackjack => blackjack_value(cards).total,
        HandRules::Baccarat => baccarat_value(cards),
    }
}

/// Aces start at 11 and degrade to 1 one at a time while the hand busts.
pub fn blackjack_value(cards: &[Card]) -> HandValue {
    let mut total: u16 = 0;
    let mut high_aces: u8 = 0;

    for card in cards {
        if card.rank == Rank::Ace {
            high_aces += 1;
            total += 11;
        } else {
            total += card.rank.blackjack_points() as u16;
        }
    }

    while total > 21 && high_aces > 0 {
        total -= 10;
        high_aces -= 1;
    }

    HandValue {
        total: total.min(u8::MAX as u16) as u8,
        soft: high_aces > 0,
    }
}

/// Baccarat total: last digit of the pip sum
pub fn baccarat_value(cards: &[Card]) -> u8 {
    let sum: u32 = cards.iter().map(|c| c.rank.baccarat_points() as u32).sum();
    (sum % 10) as u8
}

/// Exactly two cards totalling 21
pub fn is_blackjack_natural(cards: &[Card]) -> bool {
    cards.len() == 2 && blackjack_value(cards).total == 21
}

/// Exactly two cards with a baccarat value of 8 or 9
pub fn is_baccarat_natural(cards: &[Card]) -> bool {
    cards.len() == 2 && baccarat_value(cards) >= 8
}

/// A shoe dealt from the top
#[derive(Debug, Clone)]
pub struct Shoe {
    cards: Vec<Card>,
}

impl Shoe {
    pub fn new<R: Rng + ?Sized>(deck_count: usize, rng: &mut R) -> Result<Self, GameError> {
        Ok(Self {
            cards: create_shoe(deck_count, rng)?,
        })
    }

    /// Stacked shoe; the first card in `cards` is dealt first
    pub fn stacked(mut cards: Vec<Card>) -> Self {
        cards.reverse();
        Self { cards }
    }

    pub fn draw(&mut self) -> Result<Card, GameError> {
        self.cards.pop().ok_or(GameError::ShoeExhausted)
    }

    pub fn remaining(&self) -> usize {
        self.cards.len()
    }
}

#[cfg(test)]
pub(crate) fn hand(ranks: &[u8]) -> Vec<Card> {
    ranks
        .iter()
        .map(|&r| Card::new(Rank::try_from(r).expect("valid rank"), Suit::Spades))
        .collect()
}
