//! Blackjack round with a fixed dealer policy.
//!
//! Dealer hits below 17 and on soft 17, stands otherwise. Payouts are total
//! returns: natural 3:2, win 1:1, push returns the stake.

use crate::errors::GameError;
use crate::games::cards::{blackjack_value, is_blackjack_natural, Card, HandValue, Shoe};
use crate::games::types::{Amount, GameKind, RoundSettlement};
use serde::{Deserialize, Serialize};

/// Dealer draws while below 17 or on a soft 17.
pub fn dealer_should_draw(cards: &[Card]) -> bool {
    let value = blackjack_value(cards);
    value.total < 17 || (value.total == 17 && value.soft)
}

/// Run the dealer policy to completion
pub fn play_dealer(cards: &mut Vec<Card>, shoe: &mut Shoe) -> Result<HandValue, GameError> {
    while dealer_should_draw(cards) {
        cards.push(shoe.draw()?);
    }
    Ok(blackjack_value(cards))
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HandResult {
    PlayerBlackjack,
    PlayerWin,
    DealerBust,
    DealerWin,
    PlayerBust,
    Push,
}

impl HandResult {
    /// Total return for a given stake
    pub fn payout(&self, stake: Amount) -> Amount {
        match self {
            HandResult::PlayerBlackjack => stake.saturating_mul(5) / 2,
            HandResult::PlayerWin | HandResult::DealerBust => stake.saturating_mul(2),
            HandResult::Push => stake,
            HandResult::DealerWin | HandResult::PlayerBust => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Phase {
    PlayerTurn,
    Finished,
}

#[derive(Debug, Clone)]
pub struct BlackjackRound {
    stake: Amount,
    shoe: Shoe,
    player: Vec<Card>,
    dealer: Vec<Card>,
    phase: Phase,
    result: Option<HandResult>,
}

impl BlackjackRound {
    /// Deal player, dealer, player, dealer. A natural on either side ends the round.
    pub fn deal(stake: Amount, mut shoe: Shoe) -> Result<Self, GameError> {
        let mut player = Vec::with_capacity(4);
        let mut dealer = Vec::with_capacity(4);
        player.push(shoe.draw()?);
        dealer.push(shoe.draw()?);
        player.push(shoe.draw()?);
        dealer.push(shoe.draw()?);

        let mut round = Self {
            stake,
            shoe,
            player,
            dealer,
            phase: Phase::PlayerTurn,
            result: None,
        };

        let player_natural = is_blackjack_natural(&round.player);
        let dealer_natural = is_blackjack_natural(&round.dealer);
        if player_natural || dealer_natural {
            let result = match (player_natural, dealer_natural) {
                (true, true) => HandResult::Push,
                (true, false) => HandResult::PlayerBlackjack,
                _ => HandResult::DealerWin,
            };
            round.finish(result);
        }

        Ok(round)
    }

    pub fn hit(&mut self) -> Result<HandValue, GameError> {
        self.require_player_turn()?;
        self.player.push(self.shoe.draw()?);
        let value = blackjack_value(&self.player);

        if value.is_bust() {
            self.finish(HandResult::PlayerBust);
        } else if value.total == 21 {
            self.stand()?;
        }
        Ok(value)
    }

    pub fn stand(&mut self) -> Result<HandResult, GameError> {
        self.require_player_turn()?;
        let dealer = play_dealer(&mut self.dealer, &mut self.shoe)?;
        let player = blackjack_value(&self.player);

        let result = if dealer.is_bust() {
            HandResult::DealerBust
        } else if player.total > dealer.total {
            HandResult::PlayerWin
        } else if player.total < dealer.total {
            HandResult::DealerWin
        } else {
            HandResult::Push
        };
        self.finish(result);
        Ok(result)
    }

    fn require_player_turn(&self) -> Result<(), GameError> {
        match self.phase {
            Phase::PlayerTurn => Ok(()),
            Phase::Finished => Err(GameError::RoundOver),
        }
    }

    fn finish(&mut self, result: HandResult) {
        tracing::debug!("Blackjack round finished: {:?}", result);
        self.phase = Phase::Finished;
        self.result = Some(result);
    }

    pub fn player_cards(&self) -> &[Card] {
        &self.player
    }

    /// Full dealer hand; only the first card is public during the player's turn
    pub fn dealer_cards(&self) -> &[Card] {
        &self.dealer
    }

    pub fn dealer_upcard(&self) -> Card {
        self.dealer[0]
    }

    pub fn player_value(&self) -> HandValue {
        blackjack_value(&self.player)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn result(&self) -> Option<HandResult> {
        self.result
    }

    pub fn stake(&self) -> Amount {
        self.stake
    }
}

impl RoundSettlement for BlackjackRound {
    fn game_kind(&self) -> GameKind {
        GameKind::Blackjack
    }

    fn payout(&self) -> Amount {
        self.result.map(|r| r.payout(self.stake)).unwrap_or(0)
    }

    fn is_complete(&self) -> bool {
        self.phase == Phase::Finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::cards::hand;
    use crate::games::rng;

    #[test]
    fn test_dealer_policy() {
        assert!(dealer_should_draw(&hand(&[10, 6])));
        assert!(dealer_should_draw(&hand(&[1, 6])));
        assert!(!dealer_should_draw(&hand(&[10, 7])));
        assert!(!dealer_should_draw(&hand(&[1, 7])));
        assert!(!dealer_should_draw(&hand(&[1, 6, 10])));
    }

    #[test]
    fn test_dealer_hits_soft_17_then_stands() {
        let mut dealer = hand(&[1, 6]);
        let mut shoe = Shoe::stacked(hand(&[10]));
        let value = play_dealer(&mut dealer, &mut shoe).unwrap();
        assert_eq!(value.total, 17);
        assert!(!value.soft);
        assert_eq!(dealer.len(), 3);
    }

    #[test]
    fn test_player_natural_pays_three_to_two() {
        // P: A, D: 9, P: K, D: 7
        let shoe = Shoe::stacked(hand(&[1, 9, 13, 7]));
        let round = BlackjackRound::deal(100, shoe).unwrap();
        assert_eq!(round.result(), Some(HandResult::PlayerBlackjack));
        assert!(round.is_complete());
        assert_eq!(round.payout(), 250);
    }

    #[test]
    fn test_both_naturals_push() {
        let shoe = Shoe::stacked(hand(&[1, 1, 13, 12]));
        let round = BlackjackRound::deal(100, shoe).unwrap();
        assert_eq!(round.result(), Some(HandResult::Push));
        assert_eq!(round.payout(), 100);
    }

    #[test]
    fn test_player_bust_skips_dealer() {
        // P: 10, D: 10, P: 6, D: 7, hit: K
        let shoe = Shoe::stacked(hand(&[10, 10, 6, 7, 13]));
        let mut round = BlackjackRound::deal(50, shoe).unwrap();
        let value = round.hit().unwrap();
        assert!(value.is_bust());
        assert_eq!(round.result(), Some(HandResult::PlayerBust));
        assert_eq!(round.dealer_cards().len(), 2);
        assert_eq!(round.payout(), 0);
        assert_eq!(round.hit(), Err(GameError::RoundOver));
    }

    #[test]
    fn test_stand_against_dealer_bust() {
        // P: 10, D: 10, P: 8, D: 6, dealer draws 9 -> 25
        let shoe = Shoe::stacked(hand(&[10, 10, 8, 6, 9]));
        let mut round = BlackjackRound::deal(40, shoe).unwrap();
        assert_eq!(round.stand().unwrap(), HandResult::DealerBust);
        assert_eq!(round.payout(), 80);
    }

    #[test]
    fn test_incomplete_round_pays_nothing() {
        let shoe = Shoe::stacked(hand(&[10, 10, 5, 7]));
        let round = BlackjackRound::deal(40, shoe).unwrap();
        assert!(!round.is_complete());
        assert_eq!(round.payout(), 0);
        assert_eq!(round.dealer_upcard().rank, crate::games::cards::Rank::Ten);
    }

    #[test]
    fn test_random_rounds_always_finish() {
        let mut rng = rng::seeded(21);
        for _ in 0..200 {
            let shoe = Shoe::new(1, &mut rng).unwrap();
            let mut round = BlackjackRound::deal(10, shoe).unwrap();
            while round.phase() == Phase::PlayerTurn && round.player_value().total < 15 {
                round.hit().unwrap();
            }
            if round.phase() == Phase::PlayerTurn {
                round.stand().unwrap();
            }
            assert!(round.is_complete());
            assert!(round.payout() <= 25);
        }
    }
}
