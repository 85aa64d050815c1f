//! The session context every engine operates on.

use crate::character::Player;
use crate::combat::CombatSession;
use crate::config::Settings;
use crate::dice::{DiceEngine, DiceSource, RollObserver};
use crate::items::ItemCatalog;
use crate::notify::{MessageLog, Notifier, Severity};

/// Everything one play session owns. Engines borrow it mutably for the
/// duration of an operation; nothing lives in globals.
#[derive(Debug)]
pub struct GameState {
    pub player: Player,
    /// At most one fight at a time.
    pub combat: Option<CombatSession>,
    pub catalog: ItemCatalog,
    pub settings: Settings,
    pub dice: DiceEngine,
    pub messages: MessageLog,
}

impl GameState {
    /// State with the standard item catalog and entropy-seeded dice.
    pub fn new(player: Player, settings: Settings) -> Self {
        Self {
            player,
            combat: None,
            catalog: ItemCatalog::standard(),
            dice: DiceEngine::random(&settings),
            messages: MessageLog::new(settings.message_log_capacity),
            settings,
        }
    }

    /// Swap the dice source, keeping the configured reveal delay.
    pub fn with_dice(mut self, source: impl DiceSource + 'static) -> Self {
        self.dice = DiceEngine::new(source, &self.settings);
        self
    }

    pub fn with_catalog(mut self, catalog: ItemCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_notifier(mut self, notifier: Box<dyn Notifier>) -> Self {
        self.messages.set_sink(notifier);
        self
    }

    pub fn with_roll_observer(mut self, observer: Box<dyn RollObserver>) -> Self {
        self.dice.set_observer(observer);
        self
    }

    /// Replace settings; the new reveal delay applies to the next roll.
    pub fn apply_settings(&mut self, settings: Settings) {
        self.dice.apply_settings(&settings);
        self.settings = settings;
    }

    /// Carry recalculated player stats into the active fight, if any.
    pub fn sync_combatant(&mut self) {
        if let Some(session) = self.combat.as_mut() {
            session.sync_player(&self.player);
        }
    }

    pub fn in_combat(&self) -> bool {
        self.combat.is_some()
    }

    pub fn notify(&mut self, message: impl Into<String>, severity: Severity) {
        self.messages.push(message, severity);
    }
}
