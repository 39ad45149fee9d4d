//! End-to-end settlement: engine rounds carried through the protocol to the wallet,
//! including parked results surviving a restart.

use croupier::{
    errors::SettlementError,
    games::{
        blackjack::{BlackjackRound, HandResult},
        cards::{Card, Rank, Shoe, Suit},
        mines::MinesRound,
        pending_pool::{FilePendingStore, MemoryPendingStore, PendingStore},
        roulette::{BetKind, RouletteBet, RouletteSpin, WheelResult},
        Amount, BetStatus, GameKind, RoundSettlement, SettlementConfig, SettlementProtocol,
    },
    wallet::{InMemoryWallet, WalletFaults},
};
use std::{collections::BTreeSet, sync::Arc, time::Duration};
use tempfile::TempDir;

const USER: &str = "table-7";

fn unavailable() -> WalletFaults {
    WalletFaults {
        unavailable: true,
        ..WalletFaults::default()
    }
}

async fn connect(wallet: &Arc<InMemoryWallet>, store: Arc<dyn PendingStore>) -> SettlementProtocol {
    SettlementProtocol::connect(USER, SettlementConfig::default(), wallet.clone(), store)
        .await
        .expect("Failed to connect session")
}

fn card(rank: Rank) -> Card {
    Card::new(rank, Suit::Spades)
}

#[tokio::test]
async fn test_blackjack_round_settles_into_wallet() {
    let wallet = Arc::new(InMemoryWallet::new());
    wallet.set_balance(USER, 1_000);
    let protocol = connect(&wallet, Arc::new(MemoryPendingStore::new())).await;

    let bet_id = protocol.open(GameKind::Blackjack, 100).await.unwrap();

    // Player 19 against dealer 17
    let shoe = Shoe::stacked(vec![
        card(Rank::Ten),
        card(Rank::Ten),
        card(Rank::Nine),
        card(Rank::Seven),
    ]);
    let mut round = BlackjackRound::deal(100, shoe).unwrap();
    assert_eq!(round.stand().unwrap(), HandResult::PlayerWin);

    let bet = protocol.settle(bet_id, &round).await.unwrap();
    assert_eq!(bet.status, BetStatus::Won);
    assert_eq!(bet.payout, Some(200));
    assert_eq!(wallet.balance(USER), 1_100);
    assert_eq!(protocol.mirror().await, 1_100);
}

#[tokio::test]
async fn test_mines_cash_out_and_mine_hit() {
    let wallet = Arc::new(InMemoryWallet::new());
    wallet.set_balance(USER, 5_000);
    let protocol = connect(&wallet, Arc::new(MemoryPendingStore::new())).await;
    let mines: BTreeSet<usize> = [0, 1, 2].into_iter().collect();

    let cashed = protocol.open(GameKind::Mines, 1_000).await.unwrap();
    let mut round = MinesRound::with_mines(25, mines.clone(), 1_000);
    round.reveal(10).unwrap();
    round.reveal(11).unwrap();

    // Settling mid-round is refused and leaves the bet open
    assert!(matches!(
        protocol.settle(cashed, &round).await,
        Err(SettlementError::RoundIncomplete(_))
    ));
    assert!(protocol.is_playing().await);

    let payout = round.cash_out().unwrap();
    assert!(payout > 1_000);
    protocol.settle(cashed, &round).await.unwrap();
    assert_eq!(wallet.balance(USER), 5_000 - 1_000 + payout);

    let busted = protocol.open(GameKind::Mines, 1_000).await.unwrap();
    let mut round = MinesRound::with_mines(25, mines, 1_000);
    round.reveal(1).unwrap();
    let bet = protocol.settle(busted, &round).await.unwrap();
    assert_eq!(bet.status, BetStatus::Lost);
    assert!(wallet.is_marked_lost(busted));
    assert_eq!(wallet.balance(USER), 5_000 - 2_000 + payout);
}

#[tokio::test]
async fn test_round_for_another_game_is_refused() {
    let wallet = Arc::new(InMemoryWallet::new());
    wallet.set_balance(USER, 1_000);
    let protocol = connect(&wallet, Arc::new(MemoryPendingStore::new())).await;

    let bet_id = protocol.open(GameKind::Roulette, 100).await.unwrap();
    let spin = RouletteSpin::resolve(
        vec![RouletteBet {
            kind: BetKind::Straight(17),
            stake: 100,
        }],
        WheelResult::new(17),
    );

    let mut other = MinesRound::with_mines(25, [3].into_iter().collect(), 100);
    other.reveal(3).unwrap();
    assert!(matches!(
        protocol.settle(bet_id, &other).await,
        Err(SettlementError::GameKindMismatch {
            expected: GameKind::Roulette,
            actual: GameKind::Mines,
        })
    ));

    let bet = protocol.settle(bet_id, &spin).await.unwrap();
    assert_eq!(bet.payout, Some(spin.payout()));
    assert_eq!(wallet.balance(USER), 900 + spin.payout());
}

#[tokio::test]
async fn test_parked_result_blocks_only_its_game() {
    let wallet = Arc::new(InMemoryWallet::new());
    wallet.set_balance(USER, 1_000);
    let store = Arc::new(MemoryPendingStore::new());
    let protocol = connect(&wallet, store.clone()).await;

    let bet_id = protocol.open(GameKind::Lottery, 100).await.unwrap();
    wallet.set_faults(unavailable());
    let bet = protocol.resolve(bet_id, croupier::Outcome::Win { payout: 500 }).await.unwrap();
    assert!(!bet.settlement_acknowledged);
    assert!(store.load(GameKind::Lottery).unwrap().is_some());

    assert!(matches!(
        protocol.open(GameKind::Lottery, 100).await,
        Err(SettlementError::PendingSettlement(GameKind::Lottery))
    ));

    wallet.clear_faults();
    let report = protocol.flush_pending().await.unwrap();
    assert_eq!(report.flushed, 1);
    assert_eq!(wallet.balance(USER), 1_400);
    assert!(protocol.open(GameKind::Lottery, 100).await.is_ok());
}

#[tokio::test]
async fn test_parked_result_survives_restart() {
    let dir = TempDir::new().unwrap();
    let wallet = Arc::new(InMemoryWallet::new());
    wallet.set_balance(USER, 2_000);

    let bet_id = {
        let store = Arc::new(FilePendingStore::open(dir.path()).unwrap());
        let protocol = connect(&wallet, store).await;
        let bet_id = protocol.open(GameKind::Slot, 300).await.unwrap();

        wallet.set_faults(unavailable());
        protocol
            .resolve(bet_id, croupier::Outcome::Win { payout: 900 })
            .await
            .unwrap();
        assert_eq!(protocol.mirror().await, 2_600);
        bet_id
    };

    // The debit landed but the credit did not
    assert_eq!(wallet.balance(USER), 1_700);
    assert_eq!(wallet.credited(bet_id), None);

    wallet.clear_faults();
    let store = Arc::new(FilePendingStore::open(dir.path()).unwrap());
    let protocol = connect(&wallet, store.clone()).await;

    assert_eq!(wallet.credited(bet_id), Some(900));
    assert_eq!(wallet.balance(USER), 2_600);
    assert_eq!(protocol.mirror().await, 2_600);
    assert!(store.load(GameKind::Slot).unwrap().is_none());
}

#[tokio::test]
async fn test_unconfirmed_debit_is_delivered_with_the_result() {
    let wallet = Arc::new(InMemoryWallet::new());
    wallet.set_balance(USER, 1_000);
    let protocol = connect(&wallet, Arc::new(MemoryPendingStore::new())).await;

    wallet.set_faults(unavailable());
    let bet_id = protocol.open(GameKind::Baccarat, 200).await.unwrap();
    assert_eq!(wallet.debited(bet_id), None);
    assert_eq!(protocol.mirror().await, 800);

    protocol.resolve(bet_id, croupier::Outcome::Loss).await.unwrap();
    wallet.clear_faults();
    protocol.reconcile().await.unwrap();

    assert_eq!(wallet.debited(bet_id), Some(200));
    assert!(wallet.is_marked_lost(bet_id));
    assert_eq!(wallet.balance(USER), 800);
    assert_eq!(protocol.mirror().await, 800);
}

#[tokio::test(start_paused = true)]
async fn test_background_reconciler_picks_up_external_changes() {
    let wallet = Arc::new(InMemoryWallet::new());
    wallet.set_balance(USER, 1_000);
    let protocol = Arc::new(connect(&wallet, Arc::new(MemoryPendingStore::new())).await);
    let interval = protocol.config().reconcile_interval();

    let handle = protocol.clone().spawn_reconciler();

    // Deposit made elsewhere
    wallet.set_balance(USER, 4_000);
    assert_eq!(protocol.mirror().await, 1_000);

    tokio::time::sleep(interval + Duration::from_millis(100)).await;
    assert_eq!(protocol.mirror().await, 4_000);

    handle.abort();
}

#[tokio::test]
async fn test_stats_follow_settled_rounds() {
    let wallet = Arc::new(InMemoryWallet::new());
    wallet.set_balance(USER, 1_000);
    let protocol = connect(&wallet, Arc::new(MemoryPendingStore::new())).await;

    let stakes: [(Amount, Amount); 3] = [(100, 0), (100, 250), (100, 100)];
    for (stake, payout) in stakes {
        let bet_id = protocol.open(GameKind::Roulette, stake).await.unwrap();
        protocol
            .resolve(bet_id, croupier::Outcome::from_payout(stake, payout))
            .await
            .unwrap();
    }

    let stats = protocol.stats().await;
    let roulette = stats.kind(GameKind::Roulette);
    assert_eq!(roulette.rounds, 3);
    assert_eq!(roulette.wins, 1);
    assert_eq!(roulette.losses, 1);
    assert_eq!(roulette.pushes, 1);
    assert_eq!(roulette.wagered, 300);
    assert_eq!(roulette.returned, 350);
    assert_eq!(stats.overall.net(), 50);
}
