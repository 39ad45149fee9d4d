//! Slot machine: weighted reels, left-to-right paylines, progressive jackpot.

use crate::errors::GameError;
use crate::games::rng;
use crate::games::types::{Amount, GameKind, RoundSettlement};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Basis points in one whole
const BPS: u128 = 10_000;

/// Minimum run length that pays
pub const MIN_RUN: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolDef {
    pub id: String,
    /// Line multiplier for a run of exactly three
    pub multiplier: f64,
    /// Probability of landing in any single cell
    pub weight: f64,
}

impl SymbolDef {
    pub fn new(id: &str, multiplier: f64, weight: f64) -> Self {
        Self {
            id: id.to_string(),
            multiplier,
            weight,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlotConfig {
    pub reels: usize,
    pub rows: usize,
    /// One row index per reel
    pub paylines: Vec<Vec<usize>>,
    pub wild: String,
    pub jackpot_symbol: String,
    pub growth_factor: f64,
    /// Share of every stake fed into the progressive jackpot
    pub jackpot_contribution_bps: u32,
    pub jackpot_floor: Amount,
    pub symbols: Vec<SymbolDef>,
}

impl Default for SlotConfig {
    fn default() -> Self {
        Self {
            reels: 5,
            rows: 3,
            symbols: vec![
                SymbolDef::new("cherry", 2.0, 0.30),
                SymbolDef::new("lemon", 3.0, 0.25),
                SymbolDef::new("bell", 5.0, 0.18),
                SymbolDef::new("bar", 10.0, 0.12),
                SymbolDef::new("seven", 25.0, 0.08),
                SymbolDef::new("wild", 50.0, 0.05),
                SymbolDef::new("diamond", 100.0, 0.02),
            ],
            paylines: vec![
                vec![1, 1, 1, 1, 1],
                vec![0, 0, 0, 0, 0],
                vec![2, 2, 2, 2, 2],
                vec![0, 1, 2, 1, 0],
                vec![2, 1, 0, 1, 2],
            ],
            wild: "wild".to_string(),
            jackpot_symbol: "diamond".to_string(),
            growth_factor: 1.5,
            jackpot_contribution_bps: 100,
            jackpot_floor: 100_000,
        }
    }
}

impl SlotConfig {
    pub fn validate(&self) -> Result<(), GameError> {
        if self.reels < MIN_RUN || self.rows == 0 {
            return Err(GameError::InvalidConfig(format!(
                "need at least {} reels and one row, got {}x{}",
                MIN_RUN, self.reels, self.rows
            )));
        }
        if self.symbols.is_empty() {
            return Err(GameError::InvalidConfig("symbol table is empty".to_string()));
        }
        let total: f64 = self.symbols.iter().map(|s| s.weight).sum();
        if (total - 1.0).abs() > 1e-6 || self.symbols.iter().any(|s| s.weight < 0.0) {
            return Err(GameError::InvalidConfig(format!(
                "symbol weights must be non-negative and sum to 1.0, got {}",
                total
            )));
        }
        for id in [&self.wild, &self.jackpot_symbol] {
            if self.symbol(id).is_none() {
                return Err(GameError::InvalidConfig(format!("symbol '{}' is not in the table", id)));
            }
        }
        if self.paylines.is_empty() {
            return Err(GameError::InvalidConfig("no paylines configured".to_string()));
        }
        for (idx, line) in self.paylines.iter().enumerate() {
            if line.len() != self.reels || line.iter().any(|&row| row >= self.rows) {
                return Err(GameError::InvalidConfig(format!(
                    "payline {} does not fit a {}x{} grid",
                    idx, self.reels, self.rows
                )));
            }
        }
        if !(self.growth_factor > 1.0) {
            return Err(GameError::InvalidConfig(format!(
                "growth_factor must exceed 1, got {}",
                self.growth_factor
            )));
        }
        if self.jackpot_contribution_bps as u128 > BPS {
            return Err(GameError::InvalidConfig("jackpot contribution above 100%".to_string()));
        }
        Ok(())
    }

    pub fn symbol(&self, id: &str) -> Option<&SymbolDef> {
        self.symbols.iter().find(|s| s.id == id)
    }
}

/// Process-wide progressive jackpot. Clones share the same pot.
#[derive(Debug, Clone)]
pub struct JackpotAccumulator {
    pot: Arc<AtomicU64>,
}

impl JackpotAccumulator {
    pub fn new(initial: Amount) -> Self {
        Self {
            pot: Arc::new(AtomicU64::new(initial)),
        }
    }

    pub fn value(&self) -> Amount {
        self.pot.load(Ordering::SeqCst)
    }

    /// Overwrite the pot with a persisted value
    pub fn restore(&self, value: Amount) {
        self.pot.store(value, Ordering::SeqCst);
    }

    /// Add `stake × bps / 10000` and return the amount added
    pub fn contribute(&self, stake: Amount, bps: u32) -> Amount {
        let share = (stake as u128 * bps as u128 / BPS) as Amount;
        if share > 0 {
            self.pot.fetch_add(share, Ordering::SeqCst);
        }
        share
    }

    /// Pay out the whole pot and reseed it at `floor`
    pub fn award(&self, floor: Amount) -> Amount {
        self.pot.swap(floor, Ordering::SeqCst)
    }
}

/// `grid[reel][row]`
pub type Grid = Vec<Vec<String>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineWin {
    pub line: usize,
    pub symbol: String,
    pub count: usize,
    pub amount: Amount,
}

/// Symbol and run length of a payline, or `None` when the run is shorter than three.
///
/// The target is the first non-wild symbol on the line; wilds match it
/// anywhere in the run.
pub fn evaluate_line(grid: &Grid, payline: &[usize], wild: &str) -> Option<(String, usize)> {
    let cells: Vec<&str> = payline
        .iter()
        .enumerate()
        .map(|(reel, &row)| grid.get(reel).and_then(|r| r.get(row)).map(String::as_str))
        .collect::<Option<Vec<_>>>()?;

    let target = cells.iter().copied().find(|s| *s != wild).unwrap_or(wild);
    let count = cells
        .iter()
        .take_while(|s| **s == target || **s == wild)
        .count();

    if count >= MIN_RUN {
        Some((target.to_string(), count))
    } else {
        None
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotSpin {
    pub grid: Grid,
    pub stake: Amount,
    pub lines: usize,
    pub line_wins: Vec<LineWin>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jackpot: Option<Amount>,
    pub payout: Amount,
}

impl RoundSettlement for SlotSpin {
    fn game_kind(&self) -> GameKind {
        GameKind::Slot
    }

    fn payout(&self) -> Amount {
        self.payout
    }
}

#[derive(Debug, Clone)]
pub struct SlotMachine {
    config: SlotConfig,
    jackpot: JackpotAccumulator,
}

impl SlotMachine {
    pub fn new(config: SlotConfig, jackpot: JackpotAccumulator) -> Result<Self, GameError> {
        config.validate()?;
        Ok(Self { config, jackpot })
    }

    pub fn config(&self) -> &SlotConfig {
        &self.config
    }

    pub fn jackpot(&self) -> &JackpotAccumulator {
        &self.jackpot
    }

    /// Draw every cell independently from the symbol table
    pub fn draw_grid<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Grid, GameError> {
        let mut grid = Vec::with_capacity(self.config.reels);
        for _ in 0..self.config.reels {
            let mut reel = Vec::with_capacity(self.config.rows);
            for _ in 0..self.config.rows {
                let symbol = rng::weighted_pick(&self.config.symbols, |s| s.weight, rng)?;
                reel.push(symbol.id.clone());
            }
            grid.push(reel);
        }
        Ok(grid)
    }

    /// Spin with the first `lines` paylines active, stake split evenly across them
    pub fn spin<R: Rng + ?Sized>(&self, stake: Amount, lines: usize, rng: &mut R) -> Result<SlotSpin, GameError> {
        self.check_lines(stake, lines)?;
        let grid = self.draw_grid(rng)?;
        self.settle_grid(grid, stake, lines)
    }

    /// Pay out a given grid. Feeds the jackpot with this stake before evaluating.
    pub fn settle_grid(&self, grid: Grid, stake: Amount, lines: usize) -> Result<SlotSpin, GameError> {
        self.check_lines(stake, lines)?;
        if grid.len() != self.config.reels || grid.iter().any(|reel| reel.len() != self.config.rows) {
            return Err(GameError::InvalidSelection(format!(
                "grid must be {}x{}",
                self.config.reels, self.config.rows
            )));
        }
        self.jackpot.contribute(stake, self.config.jackpot_contribution_bps);

        let stake_per_line = stake / lines as Amount;
        let mut line_wins = Vec::new();
        let mut jackpot_hit = false;

        for (idx, payline) in self.config.paylines.iter().take(lines).enumerate() {
            let jackpot_line = payline
                .iter()
                .enumerate()
                .all(|(reel, &row)| grid[reel][row] == self.config.jackpot_symbol);
            if jackpot_line {
                jackpot_hit = true;
                continue;
            }

            if let Some((symbol, count)) = evaluate_line(&grid, payline, &self.config.wild) {
                let multiplier = self.config.symbol(&symbol).map(|s| s.multiplier).unwrap_or(0.0);
                let amount = line_amount(stake_per_line, multiplier, self.config.growth_factor, count);
                if amount > 0 {
                    line_wins.push(LineWin {
                        line: idx,
                        symbol,
                        count,
                        amount,
                    });
                }
            }
        }

        let jackpot = if jackpot_hit {
            let won = self.jackpot.award(self.config.jackpot_floor);
            tracing::info!("Slot jackpot hit: {} awarded, pot reset to {}", won, self.config.jackpot_floor);
            Some(won)
        } else {
            None
        };

        let payout = line_wins
            .iter()
            .map(|w| w.amount)
            .chain(jackpot)
            .fold(0 as Amount, |acc, x| acc.saturating_add(x));

        Ok(SlotSpin {
            grid,
            stake,
            lines,
            line_wins,
            jackpot,
            payout,
        })
    }

    fn check_lines(&self, stake: Amount, lines: usize) -> Result<(), GameError> {
        if lines == 0 || lines > self.config.paylines.len() {
            return Err(GameError::InvalidSelection(format!(
                "between 1 and {} lines can be played, got {}",
                self.config.paylines.len(),
                lines
            )));
        }
        if stake < lines as Amount {
            return Err(GameError::InvalidSelection(format!(
                "stake {} cannot cover {} lines",
                stake, lines
            )));
        }
        Ok(())
    }
}

/// `floor(stake_per_line × multiplier × growth^(count - 3))`
pub fn line_amount(stake_per_line: Amount, multiplier: f64, growth_factor: f64, count: usize) -> Amount {
    let extra = count.saturating_sub(MIN_RUN) as i32;
    (stake_per_line as f64 * multiplier * growth_factor.powi(extra)).floor() as Amount
}
