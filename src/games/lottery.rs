//! Number-pick lottery with a stake-scaled win chance.
//!
//! Whether a ticket wins is decided by a single roll against
//! `min(base × (1 + stake / unit), cap)`. The drawn numbers and the match
//! count are reported for display only and play no part in the result.
//! A winning ticket draws one prize from the tiers its stake unlocks,
//! weighted by `1 / rarity`.

use crate::errors::GameError;
use crate::games::rng;
use crate::games::types::{Amount, GameKind, RoundSettlement};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One prize tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prize {
    pub name: String,
    /// Total return as a multiple of the stake
    pub multiplier: f64,
    /// Higher is rarer; draw weight is `1 / rarity`
    pub rarity: f64,
    /// Smallest stake that unlocks this tier
    #[serde(default)]
    pub min_stake: Amount,
}

impl Prize {
    pub fn new(name: &str, multiplier: f64, rarity: f64, min_stake: Amount) -> Self {
        Self {
            name: name.to_string(),
            multiplier,
            rarity,
            min_stake,
        }
    }

    pub fn weight(&self) -> f64 {
        1.0 / self.rarity
    }

    pub fn payout(&self, stake: Amount) -> Amount {
        (stake as f64 * self.multiplier).floor() as Amount
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LotteryConfig {
    /// Numbers the player selects
    pub picks: usize,
    /// Numbers are chosen from `1..=max_number`
    pub max_number: u32,
    pub base_chance: f64,
    /// Stake that adds one `base_chance` to the win chance
    pub stake_unit: Amount,
    pub cap_chance: f64,
    pub prizes: Vec<Prize>,
}

impl Default for LotteryConfig {
    fn default() -> Self {
        Self {
            picks: 6,
            max_number: 49,
            base_chance: 0.05,
            stake_unit: 1_000,
            cap_chance: 0.5,
            prizes: vec![
                Prize::new("lucky_dip", 2.0, 1.0, 0),
                Prize::new("silver", 5.0, 4.0, 0),
                Prize::new("gold", 20.0, 15.0, 500),
                Prize::new("diamond", 100.0, 60.0, 2_500),
            ],
        }
    }
}

impl LotteryConfig {
    pub fn validate(&self) -> Result<(), GameError> {
        if self.picks == 0 || self.picks as u64 > self.max_number as u64 {
            return Err(GameError::InvalidConfig(format!(
                "picks must be in 1..={}, got {}",
                self.max_number, self.picks
            )));
        }
        for (name, chance) in [("base_chance", self.base_chance), ("cap_chance", self.cap_chance)] {
            if !(chance > 0.0 && chance <= 1.0) {
                return Err(GameError::InvalidConfig(format!("{} must be in (0, 1], got {}", name, chance)));
            }
        }
        if self.stake_unit == 0 {
            return Err(GameError::InvalidConfig("stake_unit must be positive".to_string()));
        }
        if self.prizes.is_empty() {
            return Err(GameError::InvalidConfig("prize table is empty".to_string()));
        }
        for prize in &self.prizes {
            if !(prize.rarity > 0.0 && prize.rarity.is_finite()) || !(prize.multiplier > 0.0) {
                return Err(GameError::InvalidConfig(format!(
                    "prize '{}' needs a positive multiplier and rarity",
                    prize.name
                )));
            }
        }
        if !self.prizes.iter().any(|p| p.min_stake == 0) {
            return Err(GameError::InvalidConfig(
                "at least one prize must have min_stake 0".to_string(),
            ));
        }
        Ok(())
    }

    /// `min(base × (1 + stake / unit), cap)`
    pub fn win_chance(&self, stake: Amount) -> f64 {
        let scaled = self.base_chance * (1.0 + stake as f64 / self.stake_unit as f64);
        scaled.min(self.cap_chance)
    }

    pub fn eligible_prizes(&self, stake: Amount) -> Vec<&Prize> {
        self.prizes.iter().filter(|p| p.min_stake <= stake).collect()
    }

    /// Check a player's selection: exactly `picks` distinct numbers in range
    pub fn validate_selection(&self, numbers: &[u32]) -> Result<BTreeSet<u32>, GameError> {
        if numbers.len() != self.picks {
            return Err(GameError::InvalidSelection(format!(
                "expected {} numbers, got {}",
                self.picks,
                numbers.len()
            )));
        }
        let mut selection = BTreeSet::new();
        for &n in numbers {
            if n == 0 || n > self.max_number {
                return Err(GameError::InvalidSelection(format!(
                    "{} is outside 1..={}",
                    n, self.max_number
                )));
            }
            if !selection.insert(n) {
                return Err(GameError::InvalidSelection(format!("{} picked twice", n)));
            }
        }
        Ok(selection)
    }
}

/// A played ticket
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LotteryDraw {
    pub stake: Amount,
    pub selection: BTreeSet<u32>,
    pub drawn: BTreeSet<u32>,
    pub matches: usize,
    pub won: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prize: Option<Prize>,
    pub payout: Amount,
}

impl LotteryDraw {
    pub fn play<R: Rng + ?Sized>(
        config: &LotteryConfig,
        numbers: &[u32],
        stake: Amount,
        rng: &mut R,
    ) -> Result<Self, GameError> {
        // A table without a base tier would turn a winning roll into an error
        config.validate()?;
        let selection = config.validate_selection(numbers)?;

        let chance = config.win_chance(stake);
        let won = rng.gen::<f64>() < chance;

        let prize = if won {
            let eligible = config.eligible_prizes(stake);
            Some((*rng::weighted_pick(&eligible, |p| p.weight(), rng)?).clone())
        } else {
            None
        };

        let drawn: BTreeSet<u32> = rng::sample_indices(config.max_number as usize, config.picks, rng)?
            .into_iter()
            .map(|i| i as u32 + 1)
            .collect();
        let matches = selection.intersection(&drawn).count();
        let payout = prize.as_ref().map(|p| p.payout(stake)).unwrap_or(0);

        tracing::debug!(
            "Lottery ticket: chance {:.3}, won {}, prize {:?}, {} cosmetic matches",
            chance,
            won,
            prize.as_ref().map(|p| p.name.as_str()),
            matches
        );

        Ok(Self {
            stake,
            selection,
            drawn,
            matches,
            won,
            prize,
            payout,
        })
    }
}

impl RoundSettlement for LotteryDraw {
    fn game_kind(&self) -> GameKind {
        GameKind::Lottery
    }

    fn payout(&self) -> Amount {
        self.payout
    }
}
