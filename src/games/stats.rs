//! Session aggregates derived from bet history. Never a source of truth.

use crate::games::types::{Amount, Bet, BetStatus, GameKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindStats {
    /// Settled rounds (won, lost or pushed)
    pub rounds: u64,
    pub wins: u64,
    pub losses: u64,
    pub pushes: u64,
    /// Bets the backend refused before play
    pub failed: u64,
    pub wagered: Amount,
    pub returned: Amount,
}

impl KindStats {
    fn record(&mut self, bet: &Bet) {
        match bet.status {
            BetStatus::Won => self.wins += 1,
            BetStatus::Lost => self.losses += 1,
            BetStatus::Push => self.pushes += 1,
            BetStatus::Failed => {
                self.failed += 1;
                return;
            }
            _ => return,
        }
        self.rounds += 1;
        self.wagered = self.wagered.saturating_add(bet.stake);
        self.returned = self.returned.saturating_add(bet.payout.unwrap_or(0));
    }

    /// Returned minus wagered, from the player's side
    pub fn net(&self) -> i128 {
        self.returned as i128 - self.wagered as i128
    }

    /// Return to player as a fraction of the amount wagered
    pub fn rtp(&self) -> Option<f64> {
        if self.wagered == 0 {
            None
        } else {
            Some(self.returned as f64 / self.wagered as f64)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub overall: KindStats,
    pub per_kind: BTreeMap<GameKind, KindStats>,
}

impl SessionStats {
    pub fn from_bets<'a, I>(bets: I) -> Self
    where
        I: IntoIterator<Item = &'a Bet>,
    {
        let mut stats = SessionStats::default();
        for bet in bets {
            stats.overall.record(bet);
            stats.per_kind.entry(bet.game_kind).or_default().record(bet);
        }
        stats
    }

    pub fn kind(&self, kind: GameKind) -> KindStats {
        self.per_kind.get(&kind).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::types::Outcome;

    fn settled(kind: GameKind, stake: Amount, outcome: Outcome) -> Bet {
        let mut bet = Bet::new(kind, stake);
        bet.transition(BetStatus::Debited).unwrap();
        bet.transition(BetStatus::Resolving).unwrap();
        bet.transition(outcome.terminal_status()).unwrap();
        if !matches!(outcome, Outcome::Loss) {
            bet.payout = Some(outcome.payout(stake));
        }
        bet
    }

    #[test]
    fn test_aggregates_per_kind() {
        let bets = vec![
            settled(GameKind::Roulette, 100, Outcome::Win { payout: 3_600 }),
            settled(GameKind::Roulette, 100, Outcome::Loss),
            settled(GameKind::Blackjack, 50, Outcome::Push),
        ];
        let stats = SessionStats::from_bets(&bets);

        assert_eq!(stats.overall.rounds, 3);
        assert_eq!(stats.overall.wagered, 250);
        assert_eq!(stats.overall.returned, 3_650);
        assert_eq!(stats.overall.net(), 3_400);

        let roulette = stats.kind(GameKind::Roulette);
        assert_eq!((roulette.wins, roulette.losses), (1, 1));
        assert_eq!(stats.kind(GameKind::Blackjack).pushes, 1);
        assert_eq!(stats.kind(GameKind::Mines), KindStats::default());
    }

    #[test]
    fn test_open_and_failed_bets_are_not_rounds() {
        let open = Bet::new(GameKind::Slot, 10);
        let mut failed = Bet::new(GameKind::Slot, 10);
        failed.transition(BetStatus::Failed).unwrap();

        let stats = SessionStats::from_bets([&open, &failed]);
        assert_eq!(stats.overall.rounds, 0);
        assert_eq!(stats.overall.failed, 1);
        assert_eq!(stats.overall.wagered, 0);
        assert!(stats.overall.rtp().is_none());
    }
}
