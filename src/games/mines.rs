//! Mines: push-your-luck grid with a fair combinatorial multiplier.
//!
//! multiplier(m, r) = Π_{i=0}^{r-1} (N - i) / (N - m - i) = C(N, r) / C(N - m, r)
//!
//! The product is kept as an exact reduced fraction; only the final
//! `stake × multiplier` is floored to currency units.

use crate::errors::GameError;
use crate::games::rng;
use crate::games::types::{Amount, GameKind, RoundSettlement};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Grid size of the reference game
pub const DEFAULT_GRID_SIZE: usize = 25;

fn gcd(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

/// Exact non-negative rational, always stored in lowest terms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ratio {
    numer: u128,
    denom: u128,
}

impl Ratio {
    pub const ONE: Ratio = Ratio { numer: 1, denom: 1 };

    pub fn new(numer: u128, denom: u128) -> Option<Self> {
        if denom == 0 {
            return None;
        }
        let g = gcd(numer, denom).max(1);
        Some(Self {
            numer: numer / g,
            denom: denom / g,
        })
    }

    pub fn numer(&self) -> u128 {
        self.numer
    }

    pub fn denom(&self) -> u128 {
        self.denom
    }

    /// Multiply by n/d, cross-reducing first so intermediates stay small.
    /// `None` if the reduced result no longer fits in `u128`.
    fn checked_mul_frac(self, n: u128, d: u128) -> Option<Self> {
        let g = gcd(n, d).max(1);
        let (n, d) = (n / g, d / g);
        let g1 = gcd(n, self.denom).max(1);
        let g2 = gcd(self.numer, d).max(1);
        Some(Self {
            numer: (self.numer / g2).checked_mul(n / g1)?,
            denom: (self.denom / g1).checked_mul(d / g2)?,
        })
    }

    /// floor(amount × self)
    pub fn apply_floor(&self, amount: Amount) -> Amount {
        let scaled = (amount as u128).saturating_mul(self.numer) / self.denom;
        scaled.min(Amount::MAX as u128) as Amount
    }

    pub fn to_f64(&self) -> f64 {
        self.numer as f64 / self.denom as f64
    }
}

impl fmt::Display for Ratio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numer, self.denom)
    }
}

/// Fair multiplier after `revealed` safe picks with `mines` mines in `grid_size` cells
pub fn multiplier(grid_size: usize, mines: usize, revealed: usize) -> Result<Ratio, GameError> {
    if mines == 0 || mines >= grid_size {
        return Err(GameError::InvalidSelection(format!(
            "{} mines do not fit a grid of {}",
            mines, grid_size
        )));
    }
    if revealed > grid_size - mines {
        return Err(GameError::InvalidSelection(format!(
            "only {} safe cells exist, {} revealed",
            grid_size - mines,
            revealed
        )));
    }

    let n = grid_size as u128;
    let m = mines as u128;
    let mut acc = Ratio::ONE;
    for i in 0..revealed as u128 {
        acc = acc
            .checked_mul_frac(n - i, n - m - i)
            .ok_or(GameError::MultiplierOverflow {
                grid_size,
                mines,
                revealed,
            })?;
    }
    Ok(acc)
}

/// Check that every mine count and reveal depth on a grid has a representable
/// multiplier, so no round on it can fail mid-play
pub fn validate_grid(grid_size: usize) -> Result<(), GameError> {
    if grid_size < 2 {
        return Err(GameError::InvalidConfig(format!(
            "a grid of {} cannot hold a mine and a safe cell",
            grid_size
        )));
    }
    for mines in 1..grid_size {
        // Partial products along the way are the multipliers for fewer reveals
        multiplier(grid_size, mines, grid_size - mines)?;
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MinesState {
    Active,
    HitMine,
    CashedOut,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Reveal {
    Safe { multiplier: Ratio },
    Mine,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinesRound {
    grid_size: usize,
    stake: Amount,
    mines: BTreeSet<usize>,
    revealed: BTreeSet<usize>,
    state: MinesState,
    cashed_out: Option<Amount>,
}

impl MinesRound {
    /// Place `mine_count` mines uniformly without replacement
    pub fn new<R: Rng + ?Sized>(
        grid_size: usize,
        mine_count: usize,
        stake: Amount,
        rng: &mut R,
    ) -> Result<Self, GameError> {
        multiplier(grid_size, mine_count, 0)?;
        // Clearing the board is the largest multiplier the round can reach
        multiplier(grid_size, mine_count, grid_size - mine_count)?;
        let mines = rng::sample_indices(grid_size, mine_count, rng)?
            .into_iter()
            .collect();
        Ok(Self::with_mines(grid_size, mines, stake))
    }

    /// Round with a fixed mine layout
    pub fn with_mines(grid_size: usize, mines: BTreeSet<usize>, stake: Amount) -> Self {
        Self {
            grid_size,
            stake,
            mines,
            revealed: BTreeSet::new(),
            state: MinesState::Active,
            cashed_out: None,
        }
    }

    pub fn reveal(&mut self, cell: usize) -> Result<Reveal, GameError> {
        if self.state != MinesState::Active {
            return Err(GameError::RoundOver);
        }
        if cell >= self.grid_size {
            return Err(GameError::CellOutOfRange {
                cell,
                grid_size: self.grid_size,
            });
        }
        if self.revealed.contains(&cell) {
            return Err(GameError::CellAlreadyRevealed(cell));
        }

        if self.mines.contains(&cell) {
            tracing::debug!("Mines: cell {} was a mine after {} safe reveals", cell, self.revealed.len());
            self.state = MinesState::HitMine;
            return Ok(Reveal::Mine);
        }

        let multiplier = multiplier(self.grid_size, self.mines.len(), self.revealed.len() + 1)?;
        self.revealed.insert(cell);
        Ok(Reveal::Safe { multiplier })
    }

    /// Take `stake × multiplier` and end the round
    pub fn cash_out(&mut self) -> Result<Amount, GameError> {
        if self.state != MinesState::Active {
            return Err(GameError::RoundOver);
        }
        let payout = self.current_multiplier()?.apply_floor(self.stake);
        self.state = MinesState::CashedOut;
        self.cashed_out = Some(payout);
        Ok(payout)
    }

    pub fn current_multiplier(&self) -> Result<Ratio, GameError> {
        multiplier(self.grid_size, self.mines.len(), self.revealed.len())
    }

    /// Multiplier the next safe reveal would reach, if any safe cell remains
    pub fn next_multiplier(&self) -> Option<Ratio> {
        multiplier(self.grid_size, self.mines.len(), self.revealed.len() + 1).ok()
    }

    pub fn state(&self) -> MinesState {
        self.state
    }

    pub fn revealed(&self) -> &BTreeSet<usize> {
        &self.revealed
    }

    /// Mine positions; callers should only expose these once the round is over
    pub fn mines(&self) -> &BTreeSet<usize> {
        &self.mines
    }
}

impl RoundSettlement for MinesRound {
    fn game_kind(&self) -> GameKind {
        GameKind::Mines
    }

    fn payout(&self) -> Amount {
        self.cashed_out.unwrap_or(0)
    }

    fn is_complete(&self) -> bool {
        self.state != MinesState::Active
    }
}
