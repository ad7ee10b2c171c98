mod bot;

use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
};

use bot::{spawn_detector, AutoPlayer, SimClock};
use clap::{Parser, Subcommand};
use rand::{rngs::StdRng, SeedableRng};
use saber_beat_core::{
    Chart, ChartGenerator, Difficulty, GameConfig, GameEvent, ItemPerks, SaberError, Session,
    SessionInit, SessionSummary, SharedHands,
};
use tracing_subscriber::EnvFilter;

/// Simulation ticks per second of song time.
const TICK_RATE: f32 = 60.0;
/// Detection cycles per second of song time.
const DETECTOR_RATE: f32 = 30.0;

fn main() -> saber_beat_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => GameConfig::load(path)?,
        None => GameConfig::default(),
    };

    match cli.command {
        Commands::Chart {
            difficulty,
            seed,
            output,
        } => run_chart(&config, difficulty, seed, output.as_ref()),
        Commands::Simulate {
            difficulty,
            seed,
            skill,
            time_scale,
            auto_perfect,
            abandon_after,
            xp,
        } => {
            let options = SimulateOptions {
                difficulty,
                seed,
                skill,
                time_scale,
                auto_perfect,
                abandon_after,
                xp,
            };
            run_simulate(&config, &options)
        }
        Commands::Config { output } => run_config(&config, output.as_ref()),
    }
}

fn generate_chart(config: &GameConfig, difficulty: Difficulty, seed: Option<u64>) -> Chart {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    ChartGenerator::new(&config.chart).generate(difficulty, &mut rng)
}

fn run_chart(
    config: &GameConfig,
    difficulty: Difficulty,
    seed: Option<u64>,
    output: Option<&PathBuf>,
) -> saber_beat_core::Result<()> {
    let chart = generate_chart(config, difficulty, seed);
    let stats = chart.stats();
    tracing::info!(%difficulty, ?seed, "generated chart");

    match output {
        Some(path) => {
            std::fs::write(path, serde_json::to_string_pretty(&chart)?)?;
            tracing::info!(?path, notes = stats.notes, "chart written");
        }
        None => {
            println!("difficulty : {difficulty}");
            println!("bpm        : {}", chart.bpm);
            println!("duration   : {:.1}s", chart.duration);
            println!("notes      : {}", stats.notes);
            println!("doubles    : {}", stats.doubles);
            println!("gold stars : {}", stats.gold_stars);
            println!("off-beat   : {}", stats.off_beat);
        }
    }
    Ok(())
}

struct SimulateOptions {
    difficulty: Difficulty,
    seed: Option<u64>,
    skill: f32,
    time_scale: f32,
    auto_perfect: bool,
    abandon_after: Option<f32>,
    xp: u64,
}

fn run_simulate(config: &GameConfig, options: &SimulateOptions) -> saber_beat_core::Result<()> {
    let chart = generate_chart(config, options.difficulty, options.seed);
    let mut rng = match options.seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(1)),
        None => StdRng::from_entropy(),
    };
    let player = AutoPlayer::new(&chart.notes, &config.field, options.skill, &mut rng);

    let init = SessionInit {
        perks: ItemPerks {
            auto_perfect: options.auto_perfect,
            ..ItemPerks::default()
        },
        starting_xp: options.xp,
    };
    let mut session = Session::start(config, chart, init);

    let shared = SharedHands::new();
    let stop = Arc::new(AtomicBool::new(false));
    let clock = SimClock::start(options.time_scale);
    let detector = spawn_detector(
        player,
        shared.clone(),
        clock,
        1.0 / DETECTOR_RATE,
        stop.clone(),
    );

    let result = drive(&mut session, &shared, clock, options.abandon_after);

    stop.store(true, Ordering::Relaxed);
    detector
        .join()
        .map_err(|_| SaberError::msg("detector thread panicked"))??;
    result?;

    print_summary(&session.summary());
    Ok(())
}

fn drive(
    session: &mut Session,
    shared: &SharedHands,
    clock: SimClock,
    abandon_after: Option<f32>,
) -> saber_beat_core::Result<()> {
    while session.is_running() {
        let now = clock.song_time();
        if abandon_after.is_some_and(|limit| now >= limit) {
            session.abandon();
        } else {
            let hands = shared.snapshot()?;
            session.tick(now, &hands);
        }

        for event in session.drain_events() {
            log_event(session, &event);
        }
        thread::sleep(clock.wall(1.0 / TICK_RATE));
    }
    Ok(())
}

fn log_event(session: &Session, event: &GameEvent) {
    match *event {
        GameEvent::NoteHit {
            id,
            tier,
            hand,
            points,
            ..
        } => tracing::info!(
            id,
            tier = tier.label(),
            ?hand,
            points,
            combo = session.combo(),
            multiplier = session.multiplier(),
            "hit"
        ),
        GameEvent::NoteMissed { id } => {
            tracing::info!(id, health = session.health(), "miss")
        }
        GameEvent::ComboBroken { previous } => tracing::info!(previous, "combo broken"),
        GameEvent::LevelUp { level } => tracing::info!(level, "level up"),
        GameEvent::SessionEnded { outcome } => tracing::info!(?outcome, "session over"),
    }
}

fn print_summary(summary: &SessionSummary) {
    let outcome = summary
        .outcome
        .map(|outcome| format!("{outcome:?}"))
        .unwrap_or_else(|| "running".to_string());
    println!("outcome   : {outcome}");
    println!("grade     : {:?}", summary.grade);
    println!("score     : {}", summary.score);
    println!("coins     : {}", summary.coins);
    println!("accuracy  : {:.1}%", summary.accuracy * 100.0);
    println!("max combo : {}", summary.max_combo);
    println!("xp        : {} (level {})", summary.xp, summary.level);
    for (tier, count) in &summary.stats.tier_counts {
        println!("  {:<12}: {count}", tier.label());
    }
    println!("  {:<12}: {}", "MISS", summary.stats.misses);
}

fn run_config(config: &GameConfig, output: Option<&PathBuf>) -> saber_beat_core::Result<()> {
    let json = config.to_json_pretty()?;
    match output {
        Some(path) => std::fs::write(path, json)?,
        None => println!("{json}"),
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Motion-controlled rhythm game simulation core",
    long_about = None
)]
struct Cli {
    /// Game configuration (JSON). Built-in balance values are used otherwise.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a chart and print its statistics or write it as JSON.
    Chart {
        #[arg(short, long, default_value = "normal", value_parser = parse_difficulty)]
        difficulty: Difficulty,
        /// Seed for reproducible charts.
        #[arg(short, long)]
        seed: Option<u64>,
        /// Write the chart to this file instead of printing a summary.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Play a full session with an autoplay bot standing in for the tracker.
    Simulate {
        #[arg(short, long, default_value = "normal", value_parser = parse_difficulty)]
        difficulty: Difficulty,
        #[arg(short, long)]
        seed: Option<u64>,
        /// Bot skill between 0 (never plays) and 1 (never misses).
        #[arg(long, default_value_t = 0.9, value_parser = parse_skill)]
        skill: f32,
        /// Song seconds per wall-clock second.
        #[arg(long, default_value_t = 4.0, value_parser = parse_time_scale)]
        time_scale: f32,
        /// Equip the auto-perfect novelty saber.
        #[arg(long)]
        auto_perfect: bool,
        /// Abandon the session after this many song seconds.
        #[arg(long)]
        abandon_after: Option<f32>,
        /// Experience carried into the session.
        #[arg(long, default_value_t = 0)]
        xp: u64,
    },
    /// Print the active configuration as JSON.
    Config {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn parse_difficulty(value: &str) -> Result<Difficulty, String> {
    value.parse().map_err(|err: SaberError| err.to_string())
}

fn parse_skill(value: &str) -> Result<f32, String> {
    let skill: f32 = value.parse().map_err(|err| format!("{err}"))?;
    if !(0.0..=1.0).contains(&skill) {
        return Err(format!("skill must be between 0 and 1, got {value}"));
    }
    Ok(skill)
}

fn parse_time_scale(value: &str) -> Result<f32, String> {
    let scale: f32 = value.parse().map_err(|err| format!("{err}"))?;
    if !scale.is_finite() || scale <= 0.0 {
        return Err(format!("time scale must be a positive number, got {value}"));
    }
    Ok(scale)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skill_must_be_a_fraction() {
        assert_eq!(parse_skill("0.75"), Ok(0.75));
        assert_eq!(parse_skill("1"), Ok(1.0));
        assert!(parse_skill("nan").is_err());
        assert!(parse_skill("inf").is_err());
        assert!(parse_skill("1.5").is_err());
        assert!(parse_skill("-0.1").is_err());
    }

    #[test]
    fn time_scale_must_be_positive_and_finite() {
        assert_eq!(parse_time_scale("4"), Ok(4.0));
        assert!(parse_time_scale("0").is_err());
        assert!(parse_time_scale("NaN").is_err());
        assert!(parse_time_scale("inf").is_err());
    }

    #[test]
    fn simulate_rejects_a_nan_skill() {
        let parsed = Cli::try_parse_from(["saber-beat", "simulate", "--skill", "nan"]);
        assert!(parsed.is_err());
    }
}
