//! Testing utilities.
//!
//! - `ScriptedDice` for deterministic rolls
//! - `RecordingNotifier` and `RecordingObserver` to capture what a host
//!   would have been shown
//! - `TestHarness` for scripted combat scenarios
//! - Assertion helpers for verifying game state

use crate::character::{create_sample_adventurer, Player};
use crate::combat::{AttackReport, CombatEngine, CombatError, MonsterTemplate, ParticipantId};
use crate::config::Settings;
use crate::dice::{DiceSource, RollObserver, RollResult};
use crate::equipment::EquipSlot;
use crate::notify::{Notice, Notifier, Severity};
use crate::state::GameState;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use uuid::Uuid;

/// Dice that return queued values in order.
///
/// Clones share the queue, so a test can keep a handle and push more rolls
/// after handing the dice to a [`GameState`]. Values are clamped to the
/// die size; an empty queue yields the fallback.
#[derive(Debug, Clone)]
pub struct ScriptedDice {
    queue: Rc<RefCell<VecDeque<u32>>>,
    fallback: u32,
}

impl ScriptedDice {
    pub fn new(rolls: Vec<u32>) -> Self {
        Self {
            queue: Rc::new(RefCell::new(rolls.into())),
            fallback: 10,
        }
    }

    pub fn with_fallback(mut self, fallback: u32) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn push(&self, roll: u32) {
        self.queue.borrow_mut().push_back(roll);
    }

    pub fn extend(&self, rolls: &[u32]) {
        self.queue.borrow_mut().extend(rolls.iter().copied());
    }

    pub fn remaining(&self) -> usize {
        self.queue.borrow().len()
    }
}

impl DiceSource for ScriptedDice {
    fn roll_die(&mut self, sides: u32) -> u32 {
        let sides = sides.max(1);
        let roll = self.queue.borrow_mut().pop_front().unwrap_or(self.fallback);
        roll.clamp(1, sides)
    }
}

/// Notifier that keeps everything it is sent.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    notices: Rc<RefCell<Vec<Notice>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.borrow().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.notices
            .borrow()
            .iter()
            .map(|n| n.message.clone())
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&mut self, message: &str, severity: Severity) {
        self.notices.borrow_mut().push(Notice {
            message: message.to_string(),
            severity,
        });
    }
}

/// Roll observer that keeps every result it sees.
#[derive(Debug, Clone, Default)]
pub struct RecordingObserver {
    results: Rc<RefCell<Vec<RollResult>>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn results(&self) -> Vec<RollResult> {
        self.results.borrow().clone()
    }
}

impl RollObserver for RecordingObserver {
    fn on_dice_roll(&mut self, result: &RollResult) {
        self.results.borrow_mut().push(result.clone());
    }
}

/// Test harness for running scripted scenarios.
///
/// Runs with animations disabled, scripted dice and a recording notifier.
pub struct TestHarness {
    pub state: GameState,
    pub dice: ScriptedDice,
    pub notifier: RecordingNotifier,
    pub observer: RecordingObserver,
}

impl TestHarness {
    /// Harness around the sample adventurer.
    pub fn new() -> Self {
        Self::with_player(create_sample_adventurer("Tester"))
    }

    pub fn with_player(player: Player) -> Self {
        let dice = ScriptedDice::new(Vec::new());
        let notifier = RecordingNotifier::new();
        let observer = RecordingObserver::new();
        let state = GameState::new(player, Settings::instant())
            .with_dice(dice.clone())
            .with_notifier(Box::new(notifier.clone()))
            .with_roll_observer(Box::new(observer.clone()));
        Self {
            state,
            dice,
            notifier,
            observer,
        }
    }

    /// Queue the next die results.
    pub fn queue_rolls(&mut self, rolls: &[u32]) -> &mut Self {
        self.dice.extend(rolls);
        self
    }

    pub fn start_combat(&mut self, templates: &[MonsterTemplate]) -> Result<Uuid, CombatError> {
        CombatEngine::start(&mut self.state, templates)
    }

    pub fn player_id(&self) -> Option<ParticipantId> {
        self.state.combat.as_ref().and_then(|s| s.player_id())
    }

    pub fn participant_id(&self, name: &str) -> Option<ParticipantId> {
        self.state
            .combat
            .as_ref()
            .and_then(|s| s.find_by_name(name))
            .map(|p| p.id)
    }

    /// Name of whoever's turn it is.
    pub fn current_turn(&self) -> Option<String> {
        self.state
            .combat
            .as_ref()
            .and_then(|s| s.current())
            .map(|p| p.name.clone())
    }

    /// Player attacks `target` and the result is applied straight away.
    pub fn player_attack(&mut self, target: &str) -> Result<AttackReport, CombatError> {
        let player = self.player_id().ok_or(CombatError::NotInCombat)?;
        let target = self
            .participant_id(target)
            .ok_or_else(|| CombatError::InvalidTarget(target.to_string()))?;
        let pending = CombatEngine::begin_attack(&mut self.state, player, target)?;
        CombatEngine::resolve_attack(&mut self.state, pending)
    }

    /// Current monster acts and the result is applied straight away.
    pub fn monster_turn(&mut self) -> Result<Option<AttackReport>, CombatError> {
        match CombatEngine::take_monster_turn(&mut self.state)? {
            Some(pending) => CombatEngine::resolve_attack(&mut self.state, pending).map(Some),
            None => Ok(None),
        }
    }

    pub fn player_hp(&self) -> (i32, i32) {
        let stats = &self.state.player.stats;
        (stats.health, stats.max_health)
    }

    pub fn in_combat(&self) -> bool {
        self.state.in_combat()
    }

    pub fn has_message(&self, fragment: &str) -> bool {
        self.notifier
            .messages()
            .iter()
            .any(|m| m.contains(fragment))
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Assert player HP is at expected values.
#[track_caller]
pub fn assert_hp(harness: &TestHarness, current: i32, max: i32) {
    let (actual_current, actual_max) = harness.player_hp();
    assert_eq!(
        (actual_current, actual_max),
        (current, max),
        "Expected HP {current}/{max}, got {actual_current}/{actual_max}"
    );
}

/// Assert player is in combat.
#[track_caller]
pub fn assert_in_combat(harness: &TestHarness) {
    assert!(harness.in_combat(), "Expected to be in combat");
}

/// Assert player is NOT in combat.
#[track_caller]
pub fn assert_not_in_combat(harness: &TestHarness) {
    assert!(!harness.in_combat(), "Expected to NOT be in combat");
}

/// Assert some message contained `fragment`.
#[track_caller]
pub fn assert_message(harness: &TestHarness, fragment: &str) {
    assert!(
        harness.has_message(fragment),
        "Expected a message containing '{fragment}', got {:?}",
        harness.notifier.messages()
    );
}

/// Assert how many of an item the player carries.
#[track_caller]
pub fn assert_inventory_count(harness: &TestHarness, item_id: &str, expected: u32) {
    let actual = harness.state.player.inventory.count(item_id);
    assert_eq!(
        actual, expected,
        "Expected {expected} x {item_id} in inventory, found {actual}"
    );
}

/// Assert what a slot holds.
#[track_caller]
pub fn assert_equipped(harness: &TestHarness, slot: EquipSlot, item_id: Option<&str>) {
    let actual = harness.state.player.equipment.get(slot);
    assert_eq!(
        actual, item_id,
        "Expected {slot} to hold {item_id:?}, found {actual:?}"
    );
}

/// Assert the derived-stat clamp invariant.
#[track_caller]
pub fn assert_stats_clamped(harness: &TestHarness) {
    let stats = &harness.state.player.stats;
    assert!(
        stats.health <= stats.max_health && stats.mana <= stats.max_mana,
        "Stats out of range: {}/{} HP, {}/{} mana",
        stats.health,
        stats.max_health,
        stats.mana,
        stats.max_mana
    );
}
