//! Croupier CLI
//!
//! Drives simulated sessions through the rule engines and the settlement
//! protocol against the in-memory wallet.

use clap::{Parser, Subcommand};
use croupier::{
    config::{generate_sample_config, ConfigLoader, CroupierConfig, LogLevel},
    errors::{CroupierResult, SettlementError},
    games::{
        baccarat::{BaccaratBet, BaccaratCoup},
        blackjack::{BlackjackRound, Phase},
        cards::Shoe,
        lottery::LotteryDraw,
        mines::{MinesRound, MinesState},
        pending_pool::{FilePendingStore, MemoryPendingStore, PendingStore},
        rng,
        roulette::{BetKind, Color, RouletteBet, RouletteSpin, SpinHistory},
        slots::{JackpotAccumulator, SlotMachine},
        Amount, GameKind, RoundSettlement, SettlementProtocol,
    },
    logging,
    wallet::{InMemoryWallet, WalletFaults},
};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use std::{path::PathBuf, sync::Arc};
use tracing::{debug, warn};

const SIM_USER: &str = "sim-player";
const SHOE_DECKS: usize = 6;
const MINES_PER_ROUND: usize = 3;
const MINES_REVEALS: usize = 3;

/// Croupier CLI
#[derive(Parser)]
#[command(name = "croupier")]
#[command(about = "Casino game engines with fault-tolerant bet settlement")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Play rounds of one game through the settlement protocol
    Simulate {
        /// Game to play (slot, blackjack, baccarat, roulette, mines, lottery)
        #[arg(short, long, default_value = "slot")]
        game: GameKind,

        /// Number of rounds
        #[arg(short, long, default_value = "100")]
        rounds: u64,

        /// Stake per round
        #[arg(short, long, default_value = "100")]
        stake: Amount,

        /// Starting wallet balance
        #[arg(short, long, default_value = "100000")]
        balance: Amount,

        /// Seed for reproducible rounds and wallet faults
        #[arg(long)]
        seed: Option<u64>,

        /// Probability that any wallet call fails
        #[arg(short, long, default_value = "0.0")]
        failure_rate: f64,
    },

    /// Write a sample configuration file
    SampleConfig {
        /// Output path
        #[arg(short, long, default_value = "croupier.toml")]
        output: String,
    },
}

#[tokio::main]
async fn main() -> CroupierResult<()> {
    let cli = Cli::parse();

    let mut loader = ConfigLoader::new();
    if let Some(path) = &cli.config {
        loader = loader.with_path(path);
    }
    let mut config = loader.load()?;
    if cli.verbose {
        config.logging.level = LogLevel::Debug;
    }
    logging::init(&config.logging);

    match cli.command {
        Commands::Simulate {
            game,
            rounds,
            stake,
            balance,
            seed,
            failure_rate,
        } => {
            let options = SimOptions {
                game,
                rounds,
                stake,
                balance,
                seed,
                failure_rate,
            };
            simulate(config, options).await
        }
        Commands::SampleConfig { output } => {
            generate_sample_config(&output)?;
            println!("Sample configuration written to {}", output);
            Ok(())
        }
    }
}

struct SimOptions {
    game: GameKind,
    rounds: u64,
    stake: Amount,
    balance: Amount,
    seed: Option<u64>,
    failure_rate: f64,
}

/// Engines and table state that persist between rounds
struct Table {
    config: CroupierConfig,
    slots: SlotMachine,
    baccarat_shoe: Shoe,
    roulette_history: SpinHistory,
    rng: ChaCha8Rng,
}

impl Table {
    fn new(config: CroupierConfig, mut rng: ChaCha8Rng) -> CroupierResult<Self> {
        let slots = SlotMachine::new(
            config.slots.clone(),
            JackpotAccumulator::new(config.slots.jackpot_floor),
        )?;
        let baccarat_shoe = Shoe::new(SHOE_DECKS, &mut rng)?;
        let roulette_history = SpinHistory::new(config.roulette.history_len);
        Ok(Self {
            config,
            slots,
            baccarat_shoe,
            roulette_history,
            rng,
        })
    }

    /// Play one round of `game` to completion with a fixed strategy
    fn play(&mut self, game: GameKind, stake: Amount) -> CroupierResult<Box<dyn RoundSettlement>> {
        let round: Box<dyn RoundSettlement> = match game {
            GameKind::Slot => {
                let lines = self.slots.config().paylines.len();
                Box::new(self.slots.spin(stake, lines, &mut self.rng)?)
            }
            GameKind::Blackjack => {
                let shoe = Shoe::new(SHOE_DECKS, &mut self.rng)?;
                let mut round = BlackjackRound::deal(stake, shoe)?;
                while round.phase() == Phase::PlayerTurn && round.player_value().total < 17 {
                    round.hit()?;
                }
                if round.phase() == Phase::PlayerTurn {
                    round.stand()?;
                }
                Box::new(round)
            }
            GameKind::Baccarat => {
                if self.baccarat_shoe.remaining() < 52 {
                    self.baccarat_shoe = Shoe::new(SHOE_DECKS, &mut self.rng)?;
                }
                Box::new(BaccaratCoup::play(BaccaratBet::Banker, stake, &mut self.baccarat_shoe)?)
            }
            GameKind::Roulette => {
                let bets = vec![RouletteBet {
                    kind: BetKind::Color(Color::Red),
                    stake,
                }];
                let spin = RouletteSpin::play(bets, &mut self.rng)?;
                self.roulette_history.record(&spin.result);
                Box::new(spin)
            }
            GameKind::Mines => {
                let grid = self.config.mines.grid_size;
                let mut round = MinesRound::new(grid, MINES_PER_ROUND, stake, &mut self.rng)?;
                for cell in rng::sample_indices(grid, MINES_REVEALS, &mut self.rng)? {
                    round.reveal(cell)?;
                    if round.state() != MinesState::Active {
                        break;
                    }
                }
                if round.state() == MinesState::Active {
                    round.cash_out()?;
                }
                Box::new(round)
            }
            GameKind::Lottery => {
                let picks = self.config.lottery.picks;
                let max = self.config.lottery.max_number as usize;
                let numbers: Vec<u32> = rng::sample_indices(max, picks, &mut self.rng)?
                    .into_iter()
                    .map(|i| i as u32 + 1)
                    .collect();
                Box::new(LotteryDraw::play(&self.config.lottery, &numbers, stake, &mut self.rng)?)
            }
        };
        Ok(round)
    }
}

async fn simulate(config: CroupierConfig, options: SimOptions) -> CroupierResult<()> {
    let seed = options.seed.unwrap_or_else(|| rand::thread_rng().gen());
    println!(
        "Simulating {} rounds of {} at stake {} (seed {})",
        options.rounds, options.game, options.stake, seed
    );

    let wallet = Arc::new(InMemoryWallet::with_seed(seed));
    wallet.set_balance(SIM_USER, options.balance);

    let store: Arc<dyn PendingStore> = match &config.settlement.pending_dir {
        Some(dir) => Arc::new(FilePendingStore::open(dir)?),
        None => Arc::new(MemoryPendingStore::new()),
    };

    let protocol = SettlementProtocol::connect(
        SIM_USER,
        config.settlement.clone(),
        wallet.clone(),
        store,
    )
    .await?;

    wallet.set_faults(WalletFaults {
        failure_rate: options.failure_rate,
        ..WalletFaults::default()
    });

    let mut table = Table::new(config, rng::seeded(seed))?;
    let mut refused = 0u64;

    for round_no in 0..options.rounds {
        let bet_id = match protocol.open(options.game, options.stake).await {
            Ok(bet_id) => bet_id,
            Err(SettlementError::InsufficientFunds { .. }) => {
                println!("Bankroll exhausted after {} rounds", round_no);
                break;
            }
            Err(e) => {
                debug!("Round {} refused: {}", round_no, e);
                refused += 1;
                continue;
            }
        };

        let round = table.play(options.game, options.stake)?;
        if let Err(e) = protocol.settle(bet_id, &*round).await {
            warn!("Settlement of round {} failed: {}", round_no, e);
        }
    }

    // Let the backend recover so parked results can drain
    wallet.clear_faults();
    let report = protocol.reconcile().await?;
    let stats = protocol.stats().await;

    println!("Refused opens: {}", refused);
    println!(
        "Final balance: {} (started {}, drift at close {})",
        report.authoritative, options.balance, report.drift
    );
    if let Some(rtp) = stats.overall.rtp() {
        println!("Return to player: {:.2}%", rtp * 100.0);
    }
    if options.game == GameKind::Slot {
        println!("Progressive jackpot: {}", table.slots.jackpot().value());
    }
    if options.game == GameKind::Roulette {
        println!("Hot numbers: {:?}", table.roulette_history.hot(5));
        println!("Cold numbers: {:?}", table.roulette_history.cold(5));
    }

    let summary = serde_json::to_string_pretty(&stats)
        .map_err(croupier::errors::StorageError::from)?;
    println!("{}", summary);

    Ok(())
}
