//! Combat, dice and derived-stat engine for Edoria.
//!
//! This crate provides:
//! - Ability scores, skills and the modifier model
//! - Equipment slots, inventory and derived-stat recalculation
//! - Dice notation, advantage and two-phase (roll, then reveal) resolution
//! - Turn-based combat with initiative, resistances and conditions
//! - Experience, level-up plans and ability-score improvements
//! - Player save files
//!
//! # Quick Start
//!
//! ```ignore
//! use edoria_core::{GameSession, SessionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut session = GameSession::new(SessionConfig::new("Rook"));
//!
//!     session.equip("steel_longsword", None)?;
//!     session.start_combat(&["goblin"])?;
//!     if session.is_player_turn() {
//!         let report = session.attack("Goblin").await?;
//!         println!("hit: {}", report.hit());
//!     }
//!
//!     session.save("rook.json").await?;
//!     Ok(())
//! }
//! ```

pub mod ability;
pub mod bestiary;
pub mod character;
pub mod checks;
pub mod combat;
pub mod config;
pub mod dice;
pub mod equipment;
pub mod headless;
pub mod inventory;
pub mod items;
pub mod notify;
pub mod persist;
pub mod progression;
pub mod session;
pub mod state;
pub mod testing;

// Primary public API
pub use ability::{Ability, AbilityModel, AbilityScores, ProficiencyLevel, Skill};
pub use character::{create_sample_adventurer, DerivedStats, Player};
pub use combat::{CombatEngine, CombatError, CombatResult, MonsterTemplate, PendingAttack};
pub use config::Settings;
pub use dice::{Advantage, DiceEngine, DiceError, DiceExpression, Pending, RollObserver, RollResult};
pub use equipment::{EquipError, EquipSlot, EquipmentResolver};
pub use headless::{Skirmish, SkirmishConfig, SkirmishSummary};
pub use items::{DamageType, Item, ItemCatalog};
pub use notify::{MessageLog, Notifier, Severity};
pub use progression::{LevelResolution, LevelUpPlan, ProgressionEngine};
pub use session::{GameSession, SessionConfig, SessionError};
pub use state::GameState;
pub use testing::{ScriptedDice, TestHarness};
