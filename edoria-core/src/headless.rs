//! Headless skirmish runner.
//!
//! Plays a whole fight without a UI: the player attacks the first living
//! monster on each of their turns and monsters act by initiative until one
//! side falls or the round cap is hit. Useful for balance checks, smoke
//! tests and scripted demos.
//!
//! # Example
//!
//! ```ignore
//! use edoria_core::headless::{Skirmish, SkirmishConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SkirmishConfig::new("Rook", ["goblin", "wolf"]).with_seed(7);
//!     let summary = Skirmish::new(config)?.run().await?;
//!
//!     println!("{:?} after {} rounds", summary.result, summary.rounds);
//!     println!("HP: {}/{}", summary.player_health, summary.player_max_health);
//!     Ok(())
//! }
//! ```

use crate::combat::{AttackReport, CombatEngine, CombatError, CombatResult, ParticipantId};
use crate::config::Settings;
use crate::notify::Notice;
use crate::session::{GameSession, SessionConfig, SessionError};
use crate::state::GameState;
use tracing::{debug, info};

/// Rounds played before a skirmish is called off.
pub const DEFAULT_ROUND_CAP: u32 = 50;

/// Configuration for a headless skirmish.
#[derive(Debug, Clone)]
pub struct SkirmishConfig {
    pub player_name: String,
    /// Bestiary ids, one participant each.
    pub monsters: Vec<String>,
    pub seed: Option<u64>,
    pub settings: Settings,
    pub round_cap: u32,
}

impl SkirmishConfig {
    /// Instant reveals and the default round cap.
    pub fn new<I, S>(player_name: impl Into<String>, monsters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            player_name: player_name.into(),
            monsters: monsters.into_iter().map(Into::into).collect(),
            seed: None,
            settings: Settings::instant(),
            round_cap: DEFAULT_ROUND_CAP,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_round_cap(mut self, rounds: u32) -> Self {
        self.round_cap = rounds.max(1);
        self
    }
}

/// How a skirmish went.
#[derive(Debug, Clone)]
pub struct SkirmishSummary {
    pub result: CombatResult,
    pub rounds: u32,
    pub attacks: usize,
    pub hits: usize,
    pub player_health: i32,
    pub player_max_health: i32,
    pub player_level: u32,
    pub experience: u32,
    pub log: Vec<Notice>,
}

/// A fight in progress, driven turn by turn.
#[derive(Debug)]
pub struct Skirmish {
    session: GameSession,
    round_cap: u32,
    rounds: u32,
    attacks: usize,
    hits: usize,
    result: Option<CombatResult>,
}

impl Skirmish {
    /// Build the session and start the fight.
    pub fn new(config: SkirmishConfig) -> Result<Self, SessionError> {
        let session_config = SessionConfig {
            player_name: config.player_name,
            settings: config.settings,
            seed: config.seed,
        };
        let mut session = GameSession::new(session_config);
        let ids: Vec<&str> = config.monsters.iter().map(String::as_str).collect();
        session.start_combat(&ids)?;
        Ok(Self::from_session(session, config.round_cap))
    }

    /// Drive a session that is already in combat.
    pub fn from_session(session: GameSession, round_cap: u32) -> Self {
        Self {
            session,
            round_cap: round_cap.max(1),
            rounds: 0,
            attacks: 0,
            hits: 0,
            result: None,
        }
    }

    pub fn session(&self) -> &GameSession {
        &self.session
    }

    pub fn state(&self) -> &GameState {
        self.session.state()
    }

    pub fn is_finished(&self) -> bool {
        self.result.is_some() || !self.session.in_combat()
    }

    /// Play one turn with reveals applied immediately. Only valid with
    /// instant reveals; otherwise use [`Skirmish::step_async`].
    pub fn step(&mut self) -> Result<Option<CombatResult>, SessionError> {
        if let Some(result) = self.check_finished()? {
            return Ok(Some(result));
        }
        let delay = self.state().dice.reveal_delay();
        if !delay.is_zero() {
            return Err(SessionError::RevealDelayActive(delay));
        }

        let state = self.session.state_mut();
        let report = match next_action(state)? {
            Action::Attack(target) => {
                let player = player_id(state)?;
                let pending = CombatEngine::begin_attack(state, player, target)?;
                Some(CombatEngine::resolve_attack(state, pending)?)
            }
            Action::Monster => match CombatEngine::take_monster_turn(state)? {
                Some(pending) => Some(CombatEngine::resolve_attack(state, pending)?),
                None => None,
            },
            Action::Pass => {
                CombatEngine::end_turn(state)?;
                None
            }
        };
        Ok(self.record(report))
    }

    /// Play one turn, waiting out each reveal delay.
    pub async fn step_async(&mut self) -> Result<Option<CombatResult>, SessionError> {
        if let Some(result) = self.check_finished()? {
            return Ok(Some(result));
        }

        let report = match next_action(self.session.state())? {
            Action::Attack(target) => {
                let player = player_id(self.session.state())?;
                Some(CombatEngine::perform_attack(self.session.state_mut(), player, target).await?)
            }
            Action::Monster => self.session.monster_turn().await?,
            Action::Pass => {
                self.session.end_turn()?;
                None
            }
        };
        Ok(self.record(report))
    }

    /// Play to the end, honoring reveal delays.
    pub async fn run(mut self) -> Result<SkirmishSummary, SessionError> {
        loop {
            if let Some(result) = self.step_async().await? {
                return Ok(self.summarize(result));
            }
        }
    }

    /// Play to the end without waiting on reveals. Requires instant
    /// settings, as [`Skirmish::step`] does.
    pub fn run_instant(mut self) -> Result<SkirmishSummary, SessionError> {
        loop {
            if let Some(result) = self.step()? {
                return Ok(self.summarize(result));
            }
        }
    }

    fn check_finished(&mut self) -> Result<Option<CombatResult>, SessionError> {
        if let Some(result) = self.result {
            return Ok(Some(result));
        }
        let round = match self.session.state().combat.as_ref() {
            Some(session) => session.round(),
            None => {
                self.result = Some(CombatResult::Ended);
                return Ok(self.result);
            }
        };
        if round > self.round_cap {
            info!(round, cap = self.round_cap, "Skirmish hit round cap");
            let result = CombatEngine::exit(self.session.state_mut())?;
            self.result = Some(result);
            return Ok(self.result);
        }
        self.rounds = round;
        Ok(None)
    }

    fn record(&mut self, report: Option<AttackReport>) -> Option<CombatResult> {
        if let Some(report) = report {
            self.attacks += 1;
            if report.hit() {
                self.hits += 1;
            }
            debug!(
                attacker = %report.attacker_name,
                target = %report.target_name,
                damage = report.damage_dealt,
                "Skirmish attack"
            );
            if report.result.is_some() {
                self.result = report.result;
            }
        }
        self.result
    }

    fn summarize(self, result: CombatResult) -> SkirmishSummary {
        let state = self.session.into_state();
        let player = &state.player;
        SkirmishSummary {
            result,
            rounds: self.rounds,
            attacks: self.attacks,
            hits: self.hits,
            player_health: player.stats.health,
            player_max_health: player.stats.max_health,
            player_level: player.level(),
            experience: player.progress.experience,
            log: state.messages.entries().cloned().collect(),
        }
    }
}

enum Action {
    Attack(ParticipantId),
    Monster,
    Pass,
}

fn next_action(state: &GameState) -> Result<Action, CombatError> {
    let session = state.combat.as_ref().ok_or(CombatError::NotInCombat)?;
    let current = session.current().ok_or(CombatError::NotInCombat)?;
    if !current.is_player {
        return Ok(Action::Monster);
    }
    if !current.can_act() {
        return Ok(Action::Pass);
    }
    match session.living_monsters().next() {
        Some(target) => Ok(Action::Attack(target.id)),
        None => Ok(Action::Pass),
    }
}

fn player_id(state: &GameState) -> Result<ParticipantId, CombatError> {
    state
        .combat
        .as_ref()
        .and_then(|s| s.player_id())
        .ok_or(CombatError::PlayerUnavailable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::create_sample_adventurer;
    use crate::combat::MonsterTemplate;
    use crate::items::DamageType;
    use crate::testing::ScriptedDice;

    fn skirmish(rolls: Vec<u32>, monsters: &[MonsterTemplate], cap: u32) -> Skirmish {
        let state = GameState::new(create_sample_adventurer("Rook"), Settings::instant())
            .with_dice(ScriptedDice::new(rolls));
        let mut session = GameSession::from_state(state);
        session.start_combat_with(monsters).unwrap();
        Skirmish::from_session(session, cap)
    }

    #[test]
    fn test_player_wins_against_dummy() {
        let dummy = MonsterTemplate::new("dummy", "Dummy", 3, 5).with_experience(10);
        // Initiative 20 vs 1, then a natural 20; unarmed 1 + STR 2 fells it.
        let summary = skirmish(vec![20, 1, 20], &[dummy], 10)
            .run_instant()
            .unwrap();
        assert_eq!(summary.result, CombatResult::Victory { experience: 10 });
        assert_eq!(summary.attacks, 1);
        assert_eq!(summary.hits, 1);
        assert_eq!(summary.experience, 10);
    }

    #[test]
    fn test_round_cap_ends_fight() {
        let wall = MonsterTemplate::new("wall", "Wall", 500, 30)
            .with_attack("Lean", 0, "1", DamageType::Bludgeoning);
        // Fallback rolls of 10 never hit AC 30 and the wall barely scratches.
        let summary = skirmish(Vec::new(), &[wall], 2).run_instant().unwrap();
        assert_eq!(summary.result, CombatResult::Ended);
        assert!(summary.attacks >= 2);
    }

    #[test]
    fn test_step_refuses_to_skip_reveal_delay() {
        let state = GameState::new(create_sample_adventurer("Rook"), Settings::new())
            .with_dice(ScriptedDice::new(vec![20, 1]));
        let mut session = GameSession::from_state(state);
        let dummy = MonsterTemplate::new("dummy", "Dummy", 3, 5);
        session.start_combat_with(&[dummy]).unwrap();
        let mut skirmish = Skirmish::from_session(session, 10);

        assert!(matches!(
            skirmish.step(),
            Err(SessionError::RevealDelayActive(delay)) if delay == Settings::new().reveal_delay()
        ));
        let combat = skirmish.state().combat.as_ref().unwrap();
        assert!(!combat.is_resolving());
        assert!(combat.monsters().all(|m| m.current_hit_points == 3));
    }

    #[tokio::test]
    async fn test_async_run_matches_instant() {
        let dummy = MonsterTemplate::new("dummy", "Dummy", 3, 5);
        let summary = skirmish(vec![20, 1, 20], &[dummy], 10)
            .run()
            .await
            .unwrap();
        assert!(matches!(summary.result, CombatResult::Victory { .. }));
    }
}
