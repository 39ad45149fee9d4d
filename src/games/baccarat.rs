//! Baccarat coup with the standard tableau.
//!
//! Bets:
//! Player = 1:1
//! Banker = 0.95:1 (5% commission)
//! Tie = 8:1
//!
//! Player and Banker bets push on a tie.

use crate::errors::GameError;
use crate::games::cards::{baccarat_value, is_baccarat_natural, Card, Shoe};
use crate::games::types::{Amount, GameKind, RoundSettlement};
use serde::{Deserialize, Serialize};

/// Player draws a third card on 0-5, stands on 6-7.
pub fn player_draws(player_total: u8) -> bool {
    player_total <= 5
}

/// Banker's third-card decision given the player's third card value (if any).
pub fn banker_draws(banker_total: u8, player_third_card: Option<u8>) -> bool {
    match player_third_card {
        None => banker_total <= 5,
        Some(v) => match banker_total {
            0..=2 => true,
            3 => v != 8,
            4 => (2..=7).contains(&v),
            5 => (4..=7).contains(&v),
            6 => v == 6 || v == 7,
            _ => false,
        },
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BaccaratBet {
    Player,
    Banker,
    Tie,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Winner {
    Player,
    Banker,
    Tie,
}

/// A completed coup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaccaratCoup {
    pub player_cards: Vec<Card>,
    pub banker_cards: Vec<Card>,
    pub player_total: u8,
    pub banker_total: u8,
    pub natural: bool,
    pub winner: Winner,
    pub bet: BaccaratBet,
    pub stake: Amount,
}

impl BaccaratCoup {
    /// Deal a full coup: two cards each, naturals stand, then the tableau.
    pub fn play(bet: BaccaratBet, stake: Amount, shoe: &mut Shoe) -> Result<Self, GameError> {
        // Player, Banker, Player, Banker
        let mut player_cards = Vec::with_capacity(3);
        let mut banker_cards = Vec::with_capacity(3);
        player_cards.push(shoe.draw()?);
        banker_cards.push(shoe.draw()?);
        player_cards.push(shoe.draw()?);
        banker_cards.push(shoe.draw()?);

        let natural = is_baccarat_natural(&player_cards) || is_baccarat_natural(&banker_cards);

        if !natural {
            let mut player_third: Option<u8> = None;
            if player_draws(baccarat_value(&player_cards)) {
                let card = shoe.draw()?;
                player_third = Some(card.rank.baccarat_points());
                player_cards.push(card);
            }
            if banker_draws(baccarat_value(&banker_cards), player_third) {
                banker_cards.push(shoe.draw()?);
            }
        }

        let player_total = baccarat_value(&player_cards);
        let banker_total = baccarat_value(&banker_cards);
        let winner = if player_total > banker_total {
            Winner::Player
        } else if banker_total > player_total {
            Winner::Banker
        } else {
            Winner::Tie
        };

        tracing::debug!(
            "Baccarat coup: player {} banker {} -> {:?}",
            player_total,
            banker_total,
            winner
        );

        Ok(Self {
            player_cards,
            banker_cards,
            player_total,
            banker_total,
            natural,
            winner,
            bet,
            stake,
        })
    }
}

/// Total return for a bet given the coup winner
pub fn bet_payout(bet: BaccaratBet, winner: Winner, stake: Amount) -> Amount {
    match (bet, winner) {
        (BaccaratBet::Player, Winner::Player) => stake.saturating_mul(2),
        (BaccaratBet::Banker, Winner::Banker) => stake.saturating_add(stake.saturating_mul(95) / 100),
        (BaccaratBet::Tie, Winner::Tie) => stake.saturating_mul(9),
        (BaccaratBet::Player | BaccaratBet::Banker, Winner::Tie) => stake,
        _ => 0,
    }
}

impl RoundSettlement for BaccaratCoup {
    fn game_kind(&self) -> GameKind {
        GameKind::Baccarat
    }

    fn payout(&self) -> Amount {
        bet_payout(self.bet, self.winner, self.stake)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::cards::hand;
    use crate::games::rng;

    #[test]
    fn test_player_draws() {
        assert!(player_draws(0));
        assert!(player_draws(5));
        assert!(!player_draws(6));
        assert!(!player_draws(7));
    }

    #[test]
    fn test_banker_draws_no_player_third() {
        assert!(banker_draws(0, None));
        assert!(banker_draws(5, None));
        assert!(!banker_draws(6, None));
        assert!(!banker_draws(7, None));
    }

    #[test]
    fn test_banker_draws_with_player_third() {
        assert!(banker_draws(2, Some(8)));
        assert!(banker_draws(3, Some(7)));
        assert!(!banker_draws(3, Some(8)));
        assert!(banker_draws(4, Some(5)));
        assert!(!banker_draws(4, Some(8)));
        assert!(!banker_draws(4, Some(1)));
        assert!(banker_draws(5, Some(4)));
        assert!(!banker_draws(5, Some(3)));
        assert!(banker_draws(6, Some(6)));
        assert!(!banker_draws(6, Some(5)));
        assert!(!banker_draws(7, Some(6)));
    }

    #[test]
    fn test_natural_stands() {
        // Player 4,4 (natural 8) vs banker 2,3: nobody draws
        let mut shoe = Shoe::stacked(hand(&[4, 2, 4, 3, 5, 5]));
        let coup = BaccaratCoup::play(BaccaratBet::Player, 100, &mut shoe).unwrap();
        assert!(coup.natural);
        assert_eq!(coup.player_cards.len(), 2);
        assert_eq!(coup.banker_cards.len(), 2);
        assert_eq!(coup.winner, Winner::Player);
        assert_eq!(coup.payout(), 200);
        assert_eq!(shoe.remaining(), 2);
    }

    #[test]
    fn test_tableau_banker_four_vs_player_five() {
        // Player 2,1 = 3 draws a 5; banker 3,1 = 4 draws on a 5
        let mut shoe = Shoe::stacked(hand(&[2, 3, 1, 1, 5, 10]));
        let coup = BaccaratCoup::play(BaccaratBet::Banker, 100, &mut shoe).unwrap();
        assert_eq!(coup.player_cards.len(), 3);
        assert_eq!(coup.banker_cards.len(), 3);
        assert_eq!(coup.player_total, 8);
        assert_eq!(coup.banker_total, 4);
        assert_eq!(coup.payout(), 0);
    }

    #[test]
    fn test_tableau_banker_four_vs_player_eight_stands() {
        let mut shoe = Shoe::stacked(hand(&[2, 3, 1, 1, 8, 10]));
        let coup = BaccaratCoup::play(BaccaratBet::Banker, 100, &mut shoe).unwrap();
        assert_eq!(coup.player_cards.len(), 3);
        assert_eq!(coup.banker_cards.len(), 2);
        assert_eq!(coup.player_total, 1);
        assert_eq!(coup.banker_total, 4);
        assert_eq!(coup.winner, Winner::Banker);
        assert_eq!(coup.payout(), 195);
    }

    #[test]
    fn test_tie_payouts() {
        assert_eq!(bet_payout(BaccaratBet::Tie, Winner::Tie, 10), 90);
        assert_eq!(bet_payout(BaccaratBet::Player, Winner::Tie, 10), 10);
        assert_eq!(bet_payout(BaccaratBet::Banker, Winner::Tie, 10), 10);
        assert_eq!(bet_payout(BaccaratBet::Tie, Winner::Banker, 10), 0);
    }

    #[test]
    fn test_naturals_never_take_third_card() {
        let mut rng = rng::seeded(8);
        for _ in 0..500 {
            let mut shoe = Shoe::new(1, &mut rng).unwrap();
            let coup = BaccaratCoup::play(BaccaratBet::Player, 10, &mut shoe).unwrap();
            if coup.natural {
                assert_eq!(coup.player_cards.len(), 2);
                assert_eq!(coup.banker_cards.len(), 2);
            }
            assert!(coup.player_cards.len() <= 3 && coup.banker_cards.len() <= 3);
        }
    }
}
