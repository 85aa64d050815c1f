//! Run a headless skirmish and print the combat log.
//!
//! Usage: `cargo run -p edoria-core --example skirmish -- goblin wolf`
//! Set `RUST_LOG=edoria_core=debug` to watch turns advance.

use edoria_core::headless::{Skirmish, SkirmishConfig};
use edoria_core::notify::Severity;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut monsters: Vec<String> = std::env::args().skip(1).collect();
    if monsters.is_empty() {
        monsters = vec!["goblin".to_string(), "giant_rat".to_string()];
    }

    let seed = std::env::var("EDORIA_SEED").ok().and_then(|s| s.parse().ok());
    let mut config = SkirmishConfig::new("Rook", monsters);
    if let Some(seed) = seed {
        config = config.with_seed(seed);
    }

    let summary = Skirmish::new(config)?.run().await?;

    println!("=== Combat Log ===\n");
    for notice in &summary.log {
        let marker = match notice.severity {
            Severity::Success => "+",
            Severity::Failure => "!",
            Severity::Warning => "?",
            Severity::Info | Severity::Normal => " ",
        };
        println!("{marker} {}", notice.message);
    }

    println!("\n=== Summary ===");
    println!("Result: {:?}", summary.result);
    println!("Rounds: {}", summary.rounds);
    println!("Hits: {}/{}", summary.hits, summary.attacks);
    println!("HP: {}/{}", summary.player_health, summary.player_max_health);
    println!("Level {} ({} XP)", summary.player_level, summary.experience);
    Ok(())
}
