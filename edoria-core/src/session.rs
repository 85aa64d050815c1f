//! GameSession - the high-level API hosts drive.
//!
//! Wraps a [`GameState`] and the engines into one object. Roll-driven
//! operations here are async: they wait out the reveal delay before the
//! outcome is applied, so a UI can play its dice animation in between.

use crate::ability::{Ability, ActiveEffect, Skill};
use crate::bestiary;
use crate::character::{create_sample_adventurer, Player};
use crate::checks::{CheckOutcome, CheckResolver};
use crate::combat::{AttackReport, CombatEngine, CombatError, CombatResult, MonsterTemplate};
use crate::config::Settings;
use crate::dice::{Advantage, RandomDice};
use crate::equipment::{EquipError, EquipReport, EquipmentResolver, UnequipReport};
use crate::notify::Severity;
use crate::persist::{PersistError, SavedPlayer};
use crate::progression::{
    LevelResolution, LevelUpPlan, LevelUpSummary, ProgressionEngine, ProgressionError,
};
use crate::state::GameState;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Errors from GameSession operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Combat(#[from] CombatError),

    #[error(transparent)]
    Equip(#[from] EquipError),

    #[error(transparent)]
    Progression(#[from] ProgressionError),

    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error("Unknown item: {0}")]
    UnknownItem(String),

    #[error("Unknown monster: {0}")]
    UnknownMonster(String),

    #[error("You don't have {0}")]
    NotInInventory(String),

    #[error("{0} can't be used")]
    NotUsable(String),

    #[error("No combatant named {0}")]
    UnknownTarget(String),

    #[error("Rolls reveal after {0:?}; they can't be applied immediately")]
    RevealDelayActive(Duration),
}

/// Configuration for creating a new game session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Player character name.
    pub player_name: String,

    pub settings: Settings,

    /// Fixed dice seed for reproducible sessions.
    pub seed: Option<u64>,
}

impl SessionConfig {
    pub fn new(player_name: impl Into<String>) -> Self {
        Self {
            player_name: player_name.into(),
            settings: Settings::default(),
            seed: None,
        }
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// What drinking or using an item did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemUseReport {
    pub healed: i32,
    pub mana_restored: i32,
    pub effects: Vec<String>,
}

/// A play session.
#[derive(Debug)]
pub struct GameSession {
    state: GameState,
}

impl GameSession {
    /// New session with the sample adventurer.
    pub fn new(config: SessionConfig) -> Self {
        let player = create_sample_adventurer(&config.player_name);
        Self::with_player(player, config)
    }

    pub fn with_player(player: Player, config: SessionConfig) -> Self {
        let state = GameState::new(player, config.settings);
        let state = match config.seed {
            Some(seed) => state.with_dice(RandomDice::seeded(seed)),
            None => state,
        };
        Self { state }
    }

    pub fn from_state(state: GameState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut GameState {
        &mut self.state
    }

    pub fn into_state(self) -> GameState {
        self.state
    }

    pub fn player(&self) -> &Player {
        &self.state.player
    }

    pub fn in_combat(&self) -> bool {
        self.state.in_combat()
    }

    /// True when combat is on and it is the player's turn.
    pub fn is_player_turn(&self) -> bool {
        self.state
            .combat
            .as_ref()
            .and_then(|s| s.current())
            .is_some_and(|p| p.is_player)
    }

    pub fn apply_settings(&mut self, settings: Settings) {
        self.state.apply_settings(settings);
    }

    // ========================================================================
    // Equipment & items
    // ========================================================================

    pub fn equip(&mut self, item_id: &str, slot: Option<&str>) -> Result<EquipReport, SessionError> {
        Ok(EquipmentResolver::equip(&mut self.state, item_id, slot)?)
    }

    pub fn unequip(&mut self, slot: &str) -> Result<UnequipReport, SessionError> {
        Ok(EquipmentResolver::unequip(&mut self.state, slot)?)
    }

    /// Consume one unit of a consumable: restore health and mana and start
    /// any timed stat bonus it grants.
    pub fn use_item(&mut self, item_id: &str) -> Result<ItemUseReport, SessionError> {
        let item = match self.state.catalog.get(item_id) {
            Some(item) if !item.is_consumable() => Err(SessionError::NotUsable(item.name.clone())),
            Some(item) if !self.state.player.inventory.contains(item_id) => {
                Err(SessionError::NotInInventory(item.name.clone()))
            }
            Some(item) => Ok(item.clone()),
            None => Err(SessionError::UnknownItem(item_id.to_string())),
        };
        let item = match item {
            Ok(item) => item,
            Err(err) => {
                self.state.notify(err.to_string(), Severity::Warning);
                return Err(err);
            }
        };
        let resolving = self.state.combat.as_ref().is_some_and(|s| s.is_resolving());
        if item.heal_amount.is_some() && resolving {
            return Err(self.reject_combat(CombatError::ResolutionInFlight));
        }

        self.state
            .player
            .inventory
            .remove(item_id, 1)
            .map_err(|_| SessionError::NotInInventory(item.name.clone()))?;

        let mut report = ItemUseReport::default();

        if let Some(amount) = item.heal_amount {
            report.healed = self.restore_health(amount)?;
        }
        if let Some(amount) = item.mana_amount {
            let stats = &mut self.state.player.stats;
            let restored = amount.max(0).min(stats.max_mana - stats.mana).max(0);
            stats.mana += restored;
            report.mana_restored = restored;
        }
        for (ability, bonus) in &item.stat_bonus {
            let mut effect = ActiveEffect::new(item.name.clone(), *ability, *bonus);
            if let Some(turns) = item.effect_turns {
                effect = effect.with_duration(turns);
            }
            report.effects.push(format!("{bonus:+} {}", ability.abbreviation()));
            self.state.player.add_effect(effect);
        }

        let mut parts = Vec::new();
        if report.healed > 0 {
            parts.push(format!("{} HP", report.healed));
        }
        if report.mana_restored > 0 {
            parts.push(format!("{} mana", report.mana_restored));
        }
        parts.extend(report.effects.iter().cloned());
        let detail = if parts.is_empty() {
            String::new()
        } else {
            format!(" ({})", parts.join(", "))
        };
        self.state
            .notify(format!("Used {}{detail}", item.name), Severity::Success);

        Ok(report)
    }

    fn restore_health(&mut self, amount: i32) -> Result<i32, SessionError> {
        let combat_player = self.state.combat.as_ref().and_then(|s| s.player_id());
        match combat_player {
            Some(id) => Ok(CombatEngine::heal(&mut self.state, id, amount)?),
            None => {
                let stats = &mut self.state.player.stats;
                let healed = amount.max(0).min(stats.max_health - stats.health).max(0);
                stats.health += healed;
                Ok(healed)
            }
        }
    }

    // ========================================================================
    // Checks
    // ========================================================================

    pub async fn skill_check(&mut self, skill: Skill, dc: i32, advantage: Advantage) -> CheckOutcome {
        let pending =
            CheckResolver::skill_check(&self.state.player, &mut self.state.dice, skill, dc, advantage);
        let outcome = pending.reveal().await;
        self.report_check(&outcome);
        outcome
    }

    pub async fn saving_throw(&mut self, ability: Ability, dc: i32, advantage: Advantage) -> CheckOutcome {
        let pending = CheckResolver::saving_throw(
            &self.state.player,
            &mut self.state.dice,
            ability,
            dc,
            advantage,
        );
        let outcome = pending.reveal().await;
        self.report_check(&outcome);
        outcome
    }

    fn report_check(&mut self, outcome: &CheckOutcome) {
        let roll = &outcome.roll;
        let dc = roll.dc.unwrap_or_default();
        let (verdict, severity) = if outcome.success() {
            ("succeeds", Severity::Success)
        } else {
            ("fails", Severity::Failure)
        };
        self.state.notify(
            format!("{} {verdict} ({} vs DC {dc})", roll.label, roll.total),
            severity,
        );
    }

    // ========================================================================
    // Combat
    // ========================================================================

    /// Start a fight against built-in monsters by id.
    pub fn start_combat(&mut self, monster_ids: &[&str]) -> Result<Uuid, SessionError> {
        let mut templates = Vec::with_capacity(monster_ids.len());
        for id in monster_ids {
            match bestiary::get_monster(id) {
                Some(template) => templates.push(template),
                None => {
                    let err = SessionError::UnknownMonster(id.to_string());
                    self.state.notify(err.to_string(), Severity::Warning);
                    return Err(err);
                }
            }
        }
        self.start_combat_with(&templates)
    }

    pub fn start_combat_with(&mut self, templates: &[MonsterTemplate]) -> Result<Uuid, SessionError> {
        Ok(CombatEngine::start(&mut self.state, templates)?)
    }

    /// The player attacks the named combatant.
    pub async fn attack(&mut self, target_name: &str) -> Result<AttackReport, SessionError> {
        let ids = self.state.combat.as_ref().map(|session| {
            (
                session.player_id(),
                session.find_by_name(target_name).map(|p| p.id),
            )
        });

        let (player, target) = match ids {
            None => return Err(self.reject_combat(CombatError::NotInCombat)),
            Some((Some(player), Some(target))) => (player, target),
            Some((None, _)) => return Err(self.reject_combat(CombatError::PlayerUnavailable)),
            Some((_, None)) => {
                let err = SessionError::UnknownTarget(target_name.to_string());
                self.state.notify(err.to_string(), Severity::Warning);
                return Err(err);
            }
        };

        Ok(CombatEngine::perform_attack(&mut self.state, player, target).await?)
    }

    fn reject_combat(&mut self, err: CombatError) -> SessionError {
        self.state.notify(err.to_string(), err.severity());
        SessionError::Combat(err)
    }

    /// Let the current monster act.
    pub async fn monster_turn(&mut self) -> Result<Option<AttackReport>, SessionError> {
        Ok(CombatEngine::run_monster_turn(&mut self.state).await?)
    }

    pub fn end_turn(&mut self) -> Result<(), SessionError> {
        CombatEngine::end_turn(&mut self.state)?;
        Ok(())
    }

    pub fn flee(&mut self) -> Result<CombatResult, SessionError> {
        Ok(CombatEngine::flee(&mut self.state)?)
    }

    // ========================================================================
    // Progression
    // ========================================================================

    pub fn award_experience(&mut self, amount: u32, source: &str) -> Result<(), SessionError> {
        ProgressionEngine::award_experience(&mut self.state, amount, source)?;
        Ok(())
    }

    pub fn check_for_level_up(&self) -> Option<LevelUpPlan> {
        ProgressionEngine::check_for_level_up(&self.state.player)
    }

    pub fn apply_level_up(
        &mut self,
        plan: &LevelUpPlan,
        resolutions: &[LevelResolution],
    ) -> Result<LevelUpSummary, SessionError> {
        Ok(ProgressionEngine::apply_level_up(&mut self.state, plan, resolutions)?)
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    pub async fn save(&mut self, path: impl AsRef<Path>) -> Result<(), SessionError> {
        SavedPlayer::new(self.state.player.clone())
            .save_json(path)
            .await?;
        self.state.notify("Game saved", Severity::Info);
        Ok(())
    }

    /// Replace the player with a saved one. Refused during combat.
    pub async fn load(&mut self, path: impl AsRef<Path>) -> Result<(), SessionError> {
        if self.state.in_combat() {
            return Err(self.reject_combat(CombatError::AlreadyInCombat));
        }
        let saved = match SavedPlayer::load_json(path).await {
            Ok(saved) => saved,
            Err(err) => {
                self.state
                    .notify(format!("Failed to load save: {err}"), Severity::Failure);
                return Err(err.into());
            }
        };
        self.state.player = saved.player;
        EquipmentResolver::refresh(&mut self.state);
        let name = self.state.player.name.clone();
        self.state
            .notify(format!("Welcome back, {name}"), Severity::Info);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedDice;

    fn session() -> GameSession {
        let state = GameState::new(create_sample_adventurer("Rook"), Settings::instant())
            .with_dice(ScriptedDice::new(vec![10; 8]));
        GameSession::from_state(state)
    }

    #[test]
    fn test_use_health_potion() {
        let mut session = session();
        session.state_mut().player.stats.health = 5;

        let report = session.use_item("health_potion").unwrap();
        assert_eq!(report.healed, 10);
        assert_eq!(session.player().stats.health, 15);
        assert_eq!(session.player().inventory.count("health_potion"), 2);
    }

    #[test]
    fn test_healing_is_capped() {
        let mut session = session();
        let max = session.player().stats.max_health;
        session.state_mut().player.stats.health = max - 3;

        let report = session.use_item("health_potion").unwrap();
        assert_eq!(report.healed, 3);
        assert_eq!(session.player().stats.health, max);
    }

    #[test]
    fn test_elixir_adds_timed_effect() {
        let mut session = session();
        let before = session.player().modifier(Ability::Strength);

        let report = session.use_item("elixir_of_strength").unwrap();
        assert_eq!(report.effects, vec!["+4 STR".to_string()]);
        assert_eq!(session.player().modifier(Ability::Strength), before + 2);
        assert_eq!(session.player().active_effects[0].remaining_rounds, Some(3));
    }

    #[test]
    fn test_use_item_errors() {
        let mut session = session();
        assert!(matches!(
            session.use_item("steel_longsword"),
            Err(SessionError::NotUsable(_))
        ));
        assert!(matches!(
            session.use_item("greater_health_potion"),
            Err(SessionError::NotInInventory(_))
        ));
        assert!(matches!(
            session.use_item("philosophers_stone"),
            Err(SessionError::UnknownItem(_))
        ));
    }

    #[test]
    fn test_potion_waits_for_pending_attack() {
        let mut session = session();
        session.start_combat(&["goblin"]).unwrap();
        assert!(session.is_player_turn());
        let combat = session.state().combat.as_ref().unwrap();
        let player = combat.player_id().unwrap();
        let goblin = combat.find_by_name("Goblin").unwrap().id;

        let pending = CombatEngine::begin_attack(session.state_mut(), player, goblin).unwrap();
        assert!(matches!(
            session.use_item("health_potion"),
            Err(SessionError::Combat(CombatError::ResolutionInFlight))
        ));
        assert_eq!(session.player().inventory.count("health_potion"), 3);

        CombatEngine::resolve_attack(session.state_mut(), pending).unwrap();
        assert!(!session.state().combat.as_ref().unwrap().is_resolving());
    }

    #[test]
    fn test_unknown_monster() {
        let mut session = session();
        assert!(matches!(
            session.start_combat(&["goblin", "dragon_king"]),
            Err(SessionError::UnknownMonster(_))
        ));
        assert!(!session.in_combat());
    }

    #[tokio::test]
    async fn test_skill_check_reports() {
        let mut session = session();
        let outcome = session.skill_check(Skill::Stealth, 15, Advantage::Normal).await;
        // d20 10 + dex 3 + expertise 4
        assert_eq!(outcome.roll.total, 17);
        assert!(outcome.success());
        let last = session.state().messages.last().unwrap();
        assert_eq!(last.message, "Stealth check succeeds (17 vs DC 15)");
    }

    #[tokio::test]
    async fn test_attack_unknown_target() {
        let mut session = session();
        session.start_combat(&["goblin"]).unwrap();
        assert!(matches!(
            session.attack("Dragon").await,
            Err(SessionError::UnknownTarget(_))
        ));
    }
}
