//! European roulette: wheel draw, per-bet payouts and a hot/cold history window.
//!
//! Payout = stake × multiplier:
//! straight = 35
//! color, even/odd, high/low = 2
//! dozen, column = 3
//!
//! Zero loses every bet except a straight bet on 0.

use crate::errors::GameError;
use crate::games::types::{Amount, GameKind, RoundSettlement};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Pocket order of a physical single-zero wheel, clockwise from zero.
pub const WHEEL_ORDER: [u8; 37] = [
    0, 32, 15, 19, 4, 21, 2, 25, 17, 34, 6, 27, 13, 36, 11, 30, 8, 23, 10, 5, 24, 16, 33, 1, 20, 14,
    31, 9, 22, 18, 29, 7, 28, 12, 35, 3, 26,
];

/// Red numbers on a roulette wheel.
const RED_NUMBERS: [u8; 18] = [1, 3, 5, 7, 9, 12, 14, 16, 18, 19, 21, 23, 25, 27, 30, 32, 34, 36];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Red,
    Black,
    Green,
}

pub fn color_of(number: u8) -> Color {
    if number == 0 {
        Color::Green
    } else if RED_NUMBERS.contains(&number) {
        Color::Red
    } else {
        Color::Black
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    Even,
    Odd,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Half {
    Low,
    High,
}

/// Bet type together with the value it was placed on
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum BetKind {
    Straight(u8),
    Color(Color),
    EvenOdd(Parity),
    /// 1, 2 or 3
    Dozen(u8),
    /// 1, 2 or 3
    Column(u8),
    HighLow(Half),
}

impl BetKind {
    pub fn validate(&self) -> Result<(), GameError> {
        match *self {
            BetKind::Straight(n) if n > 36 => Err(GameError::InvalidSelection(format!(
                "straight bet on {} is off the wheel",
                n
            ))),
            BetKind::Color(Color::Green) => Err(GameError::InvalidSelection(
                "color bets take red or black".to_string(),
            )),
            BetKind::Dozen(d) if !(1..=3).contains(&d) => {
                Err(GameError::InvalidSelection(format!("no dozen {}", d)))
            }
            BetKind::Column(c) if !(1..=3).contains(&c) => {
                Err(GameError::InvalidSelection(format!("no column {}", c)))
            }
            _ => Ok(()),
        }
    }

    pub fn multiplier(&self) -> u64 {
        match self {
            BetKind::Straight(_) => 35,
            BetKind::Color(_) | BetKind::EvenOdd(_) | BetKind::HighLow(_) => 2,
            BetKind::Dozen(_) | BetKind::Column(_) => 3,
        }
    }

    pub fn wins(&self, result: &WheelResult) -> bool {
        let n = result.number;
        match *self {
            BetKind::Straight(v) => n == v,
            BetKind::Color(c) => result.color == c,
            _ if n == 0 => false,
            BetKind::EvenOdd(Parity::Even) => n % 2 == 0,
            BetKind::EvenOdd(Parity::Odd) => n % 2 == 1,
            BetKind::Dozen(d) => (n + 11) / 12 == d,
            BetKind::Column(c) => (n - 1) % 3 + 1 == c,
            BetKind::HighLow(Half::Low) => n <= 18,
            BetKind::HighLow(Half::High) => n >= 19,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RouletteBet {
    pub kind: BetKind,
    pub stake: Amount,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct WheelResult {
    pub number: u8,
    pub color: Color,
}

impl WheelResult {
    pub fn new(number: u8) -> Self {
        Self {
            number,
            color: color_of(number),
        }
    }
}

/// Land the ball on a uniformly random pocket
pub fn spin<R: Rng + ?Sized>(rng: &mut R) -> WheelResult {
    let pocket = rng.gen_range(0..WHEEL_ORDER.len());
    WheelResult::new(WHEEL_ORDER[pocket])
}

/// Pure payout for one bet against one draw
pub fn bet_payout(kind: BetKind, stake: Amount, result: &WheelResult) -> Amount {
    if kind.wins(result) {
        stake.saturating_mul(kind.multiplier())
    } else {
        0
    }
}

/// All bets placed on a single spin, evaluated independently
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouletteSpin {
    pub bets: Vec<RouletteBet>,
    pub result: WheelResult,
    pub payouts: Vec<Amount>,
}

impl RouletteSpin {
    pub fn play<R: Rng + ?Sized>(bets: Vec<RouletteBet>, rng: &mut R) -> Result<Self, GameError> {
        Self::validate(&bets)?;
        Ok(Self::resolve(bets, spin(rng)))
    }

    /// Resolve bets against a known draw
    pub fn resolve(bets: Vec<RouletteBet>, result: WheelResult) -> Self {
        let payouts = bets
            .iter()
            .map(|b| bet_payout(b.kind, b.stake, &result))
            .collect();
        Self {
            bets,
            result,
            payouts,
        }
    }

    fn validate(bets: &[RouletteBet]) -> Result<(), GameError> {
        if bets.is_empty() {
            return Err(GameError::EmptyDomain);
        }
        for bet in bets {
            bet.kind.validate()?;
        }
        Ok(())
    }

    pub fn total_stake(&self) -> Amount {
        self.bets.iter().map(|b| b.stake).sum()
    }
}

impl RoundSettlement for RouletteSpin {
    fn game_kind(&self) -> GameKind {
        GameKind::Roulette
    }

    fn payout(&self) -> Amount {
        self.payouts.iter().sum()
    }
}

/// Bounded window of recent results for hot/cold statistics
#[derive(Debug, Clone)]
pub struct SpinHistory {
    capacity: usize,
    results: VecDeque<u8>,
}

impl SpinHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            results: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    pub fn record(&mut self, result: &WheelResult) {
        if self.results.len() == self.capacity {
            self.results.pop_front();
        }
        self.results.push_back(result.number);
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    fn counts(&self) -> [usize; 37] {
        let mut counts = [0usize; 37];
        for &n in &self.results {
            counts[n as usize] += 1;
        }
        counts
    }

    /// Most frequent numbers, ties broken by wheel position
    pub fn hot(&self, n: usize) -> Vec<u8> {
        let counts = self.counts();
        let mut numbers: Vec<u8> = WHEEL_ORDER.to_vec();
        numbers.sort_by(|a, b| counts[*b as usize].cmp(&counts[*a as usize]));
        numbers.truncate(n);
        numbers
    }

    /// Least frequent numbers, ties broken by wheel position
    pub fn cold(&self, n: usize) -> Vec<u8> {
        let counts = self.counts();
        let mut numbers: Vec<u8> = WHEEL_ORDER.to_vec();
        numbers.sort_by_key(|x| counts[*x as usize]);
        numbers.truncate(n);
        numbers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::rng;

    #[test]
    fn test_wheel_covers_every_number_once() {
        let mut seen = WHEEL_ORDER.to_vec();
        seen.sort();
        assert_eq!(seen, (0..=36).collect::<Vec<u8>>());
    }

    #[test]
    fn test_colors() {
        assert_eq!(color_of(0), Color::Green);
        assert_eq!(color_of(1), Color::Red);
        assert_eq!(color_of(2), Color::Black);
        assert_eq!(color_of(36), Color::Red);
        assert_eq!(WHEEL_ORDER.iter().filter(|&&n| color_of(n) == Color::Red).count(), 18);
    }

    #[test]
    fn test_straight_bet() {
        assert_eq!(bet_payout(BetKind::Straight(17), 100, &WheelResult::new(17)), 3500);
        assert_eq!(bet_payout(BetKind::Straight(17), 100, &WheelResult::new(18)), 0);
        assert_eq!(bet_payout(BetKind::Straight(0), 10, &WheelResult::new(0)), 350);
    }

    #[test]
    fn test_zero_loses_outside_bets() {
        let zero = WheelResult::new(0);
        for kind in [
            BetKind::Color(Color::Red),
            BetKind::Color(Color::Black),
            BetKind::EvenOdd(Parity::Even),
            BetKind::EvenOdd(Parity::Odd),
            BetKind::Dozen(1),
            BetKind::Column(3),
            BetKind::HighLow(Half::Low),
            BetKind::HighLow(Half::High),
        ] {
            assert_eq!(bet_payout(kind, 100, &zero), 0, "{:?}", kind);
        }
    }

    #[test]
    fn test_dozens_and_columns() {
        assert!(BetKind::Dozen(1).wins(&WheelResult::new(12)));
        assert!(BetKind::Dozen(2).wins(&WheelResult::new(13)));
        assert!(BetKind::Dozen(3).wins(&WheelResult::new(36)));
        assert!(BetKind::Column(1).wins(&WheelResult::new(34)));
        assert!(BetKind::Column(2).wins(&WheelResult::new(17)));
        assert!(BetKind::Column(3).wins(&WheelResult::new(36)));
        assert_eq!(bet_payout(BetKind::Dozen(3), 10, &WheelResult::new(30)), 30);
    }

    #[test]
    fn test_even_money_bets() {
        let r = WheelResult::new(19);
        assert_eq!(bet_payout(BetKind::Color(Color::Red), 50, &r), 100);
        assert_eq!(bet_payout(BetKind::EvenOdd(Parity::Odd), 50, &r), 100);
        assert_eq!(bet_payout(BetKind::HighLow(Half::High), 50, &r), 100);
        assert_eq!(bet_payout(BetKind::HighLow(Half::Low), 50, &r), 0);
    }

    #[test]
    fn test_multiple_bets_sum_independently() {
        let bets = vec![
            RouletteBet { kind: BetKind::Straight(17), stake: 100 },
            RouletteBet { kind: BetKind::Color(Color::Black), stake: 100 },
            RouletteBet { kind: BetKind::Dozen(3), stake: 100 },
        ];
        let spin = RouletteSpin::resolve(bets, WheelResult::new(17));
        assert_eq!(spin.payouts, vec![3500, 200, 0]);
        assert_eq!(spin.payout(), 3700);
        assert_eq!(spin.total_stake(), 300);
    }

    #[test]
    fn test_invalid_bets_rejected() {
        let mut rng = rng::seeded(1);
        assert!(RouletteSpin::play(vec![], &mut rng).is_err());
        let bad = vec![RouletteBet { kind: BetKind::Dozen(4), stake: 1 }];
        assert!(matches!(RouletteSpin::play(bad, &mut rng), Err(GameError::InvalidSelection(_))));
        let bad = vec![RouletteBet { kind: BetKind::Straight(37), stake: 1 }];
        assert!(RouletteSpin::play(bad, &mut rng).is_err());
    }

    #[test]
    fn test_history_window() {
        let mut history = SpinHistory::new(3);
        for n in [5, 5, 7, 9] {
            history.record(&WheelResult::new(n));
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.hot(1), vec![5]);
        assert!(!history.cold(30).contains(&5));
    }
}
