use crate::errors::SettlementError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Account currency in minor units (cents)
pub type Amount = u64;

/// Supported game kinds
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum GameKind {
    Slot,
    Blackjack,
    Baccarat,
    Roulette,
    Mines,
    Lottery,
}

impl GameKind {
    pub const ALL: [GameKind; 6] = [
        GameKind::Slot,
        GameKind::Blackjack,
        GameKind::Baccarat,
        GameKind::Roulette,
        GameKind::Mines,
        GameKind::Lottery,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GameKind::Slot => "slot",
            GameKind::Blackjack => "blackjack",
            GameKind::Baccarat => "baccarat",
            GameKind::Roulette => "roulette",
            GameKind::Mines => "mines",
            GameKind::Lottery => "lottery",
        }
    }
}

impl fmt::Display for GameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GameKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GameKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown game kind '{}'", s))
    }
}

/// Client-generated bet identifier, also the idempotency key at the wallet backend
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct BetId(Uuid);

impl BetId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for BetId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for BetId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for BetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bet lifecycle states
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BetStatus {
    Requested,
    Debited,
    Confirmed,
    Resolving,
    Won,
    Lost,
    Push,
    Failed,
}

impl BetStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BetStatus::Won | BetStatus::Lost | BetStatus::Push | BetStatus::Failed
        )
    }

    /// Edges of the bet state machine. Resolving is reachable from Debited
    /// because a timed-out debit must never block resolution.
    pub fn can_transition_to(&self, next: BetStatus) -> bool {
        use BetStatus::*;
        matches!(
            (self, next),
            (Requested, Debited)
                | (Requested, Failed)
                | (Debited, Confirmed)
                | (Debited, Failed)
                | (Debited, Resolving)
                | (Confirmed, Resolving)
                | (Resolving, Won)
                | (Resolving, Lost)
                | (Resolving, Push)
        )
    }
}

/// Terminal result of a round from the settlement point of view
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "result", rename_all = "lowercase")]
pub enum Outcome {
    /// Total return to the player (stake included)
    Win { payout: Amount },
    Loss,
    /// Stake returned
    Push,
}

impl Outcome {
    /// Classify an engine's total return against the stake it was played with
    pub fn from_payout(stake: Amount, payout: Amount) -> Self {
        if payout == 0 {
            Outcome::Loss
        } else if payout == stake {
            Outcome::Push
        } else {
            Outcome::Win { payout }
        }
    }

    pub fn payout(&self, stake: Amount) -> Amount {
        match self {
            Outcome::Win { payout } => *payout,
            Outcome::Loss => 0,
            Outcome::Push => stake,
        }
    }

    pub fn terminal_status(&self) -> BetStatus {
        match self {
            Outcome::Win { .. } => BetStatus::Won,
            Outcome::Loss => BetStatus::Lost,
            Outcome::Push => BetStatus::Push,
        }
    }
}

/// One wager instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bet {
    pub id: BetId,
    pub game_kind: GameKind,
    pub stake: Amount,
    pub status: BetStatus,
    /// Populated only for Won and Push
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payout: Option<Amount>,
    /// The wallet backend acknowledged the debit
    pub debit_confirmed: bool,
    /// The wallet backend acknowledged the credit or loss mark
    pub settlement_acknowledged: bool,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Bet {
    pub fn new(game_kind: GameKind, stake: Amount) -> Self {
        Self {
            id: BetId::new(),
            game_kind,
            stake,
            status: BetStatus::Requested,
            payout: None,
            debit_confirmed: false,
            settlement_acknowledged: false,
            created_at: Utc::now(),
            resolved_at: None,
        }
    }

    /// Move along one edge of the state machine; terminal states never move
    pub fn transition(&mut self, to: BetStatus) -> Result<(), SettlementError> {
        if !self.status.can_transition_to(to) {
            return Err(SettlementError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        tracing::debug!("Bet {} {:?} -> {:?}", self.id, self.status, to);
        self.status = to;
        if to.is_terminal() {
            self.resolved_at = Some(Utc::now());
        }
        Ok(())
    }

    /// The outcome this bet settled with, if it reached Won/Lost/Push
    pub fn outcome(&self) -> Option<Outcome> {
        match self.status {
            BetStatus::Won => Some(Outcome::Win {
                payout: self.payout.unwrap_or(0),
            }),
            BetStatus::Lost => Some(Outcome::Loss),
            BetStatus::Push => Some(Outcome::Push),
            _ => None,
        }
    }
}

/// Engine round results that the settlement protocol can resolve generically
pub trait RoundSettlement {
    fn game_kind(&self) -> GameKind;

    /// Total return for the round (stake included), 0 for a loss
    fn payout(&self) -> Amount;

    /// Whether the engine has reached a deterministic outcome
    fn is_complete(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_game_kind_round_trips_through_str() {
        for kind in GameKind::ALL {
            assert_eq!(kind.as_str().parse::<GameKind>().unwrap(), kind);
        }
        assert!("keno".parse::<GameKind>().is_err());
    }

    #[test]
    fn test_outcome_classification() {
        assert_eq!(Outcome::from_payout(100, 0), Outcome::Loss);
        assert_eq!(Outcome::from_payout(100, 100), Outcome::Push);
        assert_eq!(Outcome::from_payout(100, 250), Outcome::Win { payout: 250 });
        assert_eq!(Outcome::Push.payout(40), 40);
    }

    #[test]
    fn test_bet_happy_path_transitions() {
        let mut bet = Bet::new(GameKind::Roulette, 100);
        bet.transition(BetStatus::Debited).unwrap();
        bet.transition(BetStatus::Confirmed).unwrap();
        bet.transition(BetStatus::Resolving).unwrap();
        bet.transition(BetStatus::Won).unwrap();
        assert!(bet.status.is_terminal());
        assert!(bet.resolved_at.is_some());
    }

    #[test]
    fn test_terminal_states_are_immutable() {
        let mut bet = Bet::new(GameKind::Mines, 10);
        bet.transition(BetStatus::Debited).unwrap();
        bet.transition(BetStatus::Resolving).unwrap();
        bet.transition(BetStatus::Lost).unwrap();

        for next in [BetStatus::Won, BetStatus::Push, BetStatus::Resolving, BetStatus::Failed] {
            assert!(bet.transition(next).is_err());
        }
        assert_eq!(bet.status, BetStatus::Lost);
    }

    #[test]
    fn test_cannot_resolve_before_debit() {
        let mut bet = Bet::new(GameKind::Slot, 10);
        assert!(matches!(
            bet.transition(BetStatus::Resolving),
            Err(SettlementError::InvalidTransition { .. })
        ));
    }
}
