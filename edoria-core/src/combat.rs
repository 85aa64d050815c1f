//! Turn-based combat.
//!
//! A combat session lives in [`GameState::combat`] while a fight is on.
//! Attacks are two-phase: [`CombatEngine::begin_attack`] rolls everything
//! and parks the attack in the session's in-flight slot, and
//! [`CombatEngine::resolve_attack`] applies it once the reveal delay has
//! passed. Only one attack can be in flight per session.

use crate::ability::{proficiency_bonus, Ability, AbilityScores};
use crate::character::Player;
use crate::checks::{AttackRoll, CheckResolver};
use crate::dice::{Advantage, DiceError, DiceExpression, DiceRoll, Pending};
use crate::equipment::EquipSlot;
use crate::items::{DamageType, ItemCatalog, ItemKind};
use crate::notify::{MessageLog, Severity};
use crate::progression::{ProgressionEngine, ProgressionError};
use crate::state::GameState;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

/// Damage for attacks made without a weapon.
const UNARMED_DAMAGE: &str = "1";

/// Damage for a monster with no attack of its own.
const BASIC_STRIKE_DAMAGE: &str = "1d4";

/// Unique identifier for a combat participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParticipantId(pub Uuid);

impl ParticipantId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ParticipantId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Creature Data
// ============================================================================

fn default_attack_type() -> DamageType {
    DamageType::Bludgeoning
}

/// Something a monster can do or is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CreatureAbility {
    Attack {
        name: String,
        #[serde(default)]
        bonus: i32,
        damage: String,
        #[serde(default = "default_attack_type")]
        damage_type: DamageType,
    },
    Resistance {
        damage_type: DamageType,
    },
}

/// Static monster data used to build participants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonsterTemplate {
    pub id: String,
    pub name: String,
    pub hit_points: i32,
    pub armor_class: i32,
    #[serde(default)]
    pub attributes: AbilityScores,
    #[serde(default)]
    pub abilities: Vec<CreatureAbility>,
    /// Experience awarded for defeating it.
    #[serde(default)]
    pub experience: u32,
}

impl MonsterTemplate {
    pub fn new(id: impl Into<String>, name: impl Into<String>, hit_points: i32, armor_class: i32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            hit_points,
            armor_class,
            attributes: AbilityScores::default(),
            abilities: Vec::new(),
            experience: 0,
        }
    }

    pub fn with_attributes(mut self, attributes: AbilityScores) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn with_attack(mut self, name: &str, bonus: i32, damage: &str, damage_type: DamageType) -> Self {
        self.abilities.push(CreatureAbility::Attack {
            name: name.to_string(),
            bonus,
            damage: damage.to_string(),
            damage_type,
        });
        self
    }

    pub fn with_resistance(mut self, damage_type: DamageType) -> Self {
        self.abilities.push(CreatureAbility::Resistance { damage_type });
        self
    }

    pub fn with_experience(mut self, experience: u32) -> Self {
        self.experience = experience;
        self
    }

    pub fn validate(&self) -> Result<(), CombatError> {
        if self.name.trim().is_empty() {
            return Err(CombatError::InvalidTemplate(format!(
                "monster '{}' has no name",
                self.id
            )));
        }
        if self.hit_points <= 0 {
            return Err(CombatError::InvalidTemplate(format!(
                "{} has {} hit points",
                self.name, self.hit_points
            )));
        }
        for ability in &self.abilities {
            if let CreatureAbility::Attack { damage, .. } = ability {
                DiceExpression::parse(damage).map_err(|e| {
                    CombatError::InvalidTemplate(format!("{}: {e}", self.name))
                })?;
            }
        }
        Ok(())
    }
}

/// Status effects that matter in combat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionKind {
    Poisoned,
    Blinded,
    Frightened,
    Invisible,
    Stunned,
    Paralyzed,
    Unconscious,
}

impl ConditionKind {
    pub fn name(&self) -> &'static str {
        match self {
            ConditionKind::Poisoned => "poisoned",
            ConditionKind::Blinded => "blinded",
            ConditionKind::Frightened => "frightened",
            ConditionKind::Invisible => "invisible",
            ConditionKind::Stunned => "stunned",
            ConditionKind::Paralyzed => "paralyzed",
            ConditionKind::Unconscious => "unconscious",
        }
    }

    /// Attacks made by the affected creature roll with disadvantage.
    pub fn hinders_attacks(&self) -> bool {
        matches!(
            self,
            ConditionKind::Poisoned | ConditionKind::Blinded | ConditionKind::Frightened
        )
    }

    pub fn prevents_action(&self) -> bool {
        matches!(
            self,
            ConditionKind::Stunned | ConditionKind::Paralyzed | ConditionKind::Unconscious
        )
    }

    /// Attacks against the affected creature roll with advantage.
    pub fn exposes_defender(&self) -> bool {
        matches!(
            self,
            ConditionKind::Blinded
                | ConditionKind::Stunned
                | ConditionKind::Paralyzed
                | ConditionKind::Unconscious
        )
    }
}

impl fmt::Display for ConditionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveCondition {
    pub kind: ConditionKind,
    /// Rounds left; `None` lasts until removed.
    pub remaining_rounds: Option<u32>,
}

// ============================================================================
// Participants
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatParticipant {
    pub id: ParticipantId,
    pub name: String,
    pub is_player: bool,
    pub max_hit_points: i32,
    pub current_hit_points: i32,
    pub armor_class: i32,
    pub attributes: AbilityScores,
    pub abilities: Vec<CreatureAbility>,
    pub conditions: Vec<ActiveCondition>,
    pub initiative: i32,
    pub has_acted: bool,
    pub has_moved: bool,
    pub experience: u32,
}

impl CombatParticipant {
    fn from_player(player: &Player) -> Self {
        Self {
            id: ParticipantId::new(),
            name: player.name.clone(),
            is_player: true,
            max_hit_points: player.stats.max_health,
            current_hit_points: player.stats.health,
            armor_class: player.stats.armor_class,
            attributes: player.effective_abilities,
            abilities: Vec::new(),
            conditions: Vec::new(),
            initiative: 0,
            has_acted: false,
            has_moved: false,
            experience: 0,
        }
    }

    fn from_template(template: &MonsterTemplate, name: String) -> Self {
        Self {
            id: ParticipantId::new(),
            name,
            is_player: false,
            max_hit_points: template.hit_points,
            current_hit_points: template.hit_points,
            armor_class: template.armor_class,
            attributes: template.attributes,
            abilities: template.abilities.clone(),
            conditions: Vec::new(),
            initiative: 0,
            has_acted: false,
            has_moved: false,
            experience: template.experience,
        }
    }

    pub fn is_dead(&self) -> bool {
        self.current_hit_points <= 0
    }

    pub fn resists(&self, damage_type: DamageType) -> bool {
        self.abilities.iter().any(|ability| match ability {
            CreatureAbility::Resistance { damage_type: resisted } => resisted.matches(damage_type),
            CreatureAbility::Attack { .. } => false,
        })
    }

    /// Reduce HP, halving (rounded down) on a matching resistance. HP never
    /// drops below zero. Returns the damage after resistance.
    pub fn take_damage(&mut self, amount: i32, damage_type: DamageType) -> i32 {
        let amount = amount.max(0);
        let amount = if self.resists(damage_type) {
            amount / 2
        } else {
            amount
        };
        self.current_hit_points = (self.current_hit_points - amount).max(0);
        amount
    }

    /// Restore HP up to the maximum. Returns the amount actually healed.
    pub fn heal(&mut self, amount: i32) -> i32 {
        let healed = amount.max(0).min(self.max_hit_points - self.current_hit_points).max(0);
        self.current_hit_points += healed;
        healed
    }

    pub fn has_condition(&self, kind: ConditionKind) -> bool {
        self.conditions.iter().any(|c| c.kind == kind)
    }

    /// First condition stopping this participant from acting.
    pub fn incapacitated_by(&self) -> Option<ConditionKind> {
        self.conditions
            .iter()
            .map(|c| c.kind)
            .find(ConditionKind::prevents_action)
    }

    pub fn can_act(&self) -> bool {
        !self.is_dead() && self.incapacitated_by().is_none()
    }

    fn add_condition(&mut self, kind: ConditionKind, rounds: Option<u32>) {
        self.conditions.retain(|c| c.kind != kind);
        self.conditions.push(ActiveCondition {
            kind,
            remaining_rounds: rounds,
        });
    }

    /// Advance timed conditions one round; returns those that wore off.
    fn tick_conditions(&mut self) -> Vec<ConditionKind> {
        for condition in self.conditions.iter_mut() {
            if let Some(rounds) = condition.remaining_rounds.as_mut() {
                *rounds = rounds.saturating_sub(1);
            }
        }
        let expired = self
            .conditions
            .iter()
            .filter(|c| c.remaining_rounds == Some(0))
            .map(|c| c.kind)
            .collect();
        self.conditions.retain(|c| c.remaining_rounds != Some(0));
        expired
    }

    fn monster_attack(&self) -> Result<AttackStats, CombatError> {
        let attack = self.abilities.iter().find_map(|ability| match ability {
            CreatureAbility::Attack {
                name,
                bonus,
                damage,
                damage_type,
            } => Some((name, *bonus, damage, *damage_type)),
            CreatureAbility::Resistance { .. } => None,
        });

        match attack {
            Some((name, bonus, damage, damage_type)) => Ok(AttackStats {
                modifier: bonus,
                damage: DiceExpression::parse(damage)?,
                damage_type,
                weapon: name.clone(),
            }),
            None => {
                let str_mod = self.attributes.modifier(Ability::Strength);
                let mut damage = DiceExpression::parse(BASIC_STRIKE_DAMAGE)?;
                damage.modifier += str_mod;
                Ok(AttackStats {
                    modifier: proficiency_bonus(1) + str_mod,
                    damage,
                    damage_type: DamageType::Bludgeoning,
                    weapon: "strike".to_string(),
                })
            }
        }
    }
}

// ============================================================================
// Session
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct InFlight {
    attacker: ParticipantId,
    target: ParticipantId,
}

/// An active fight. Participants are ordered by initiative, highest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatSession {
    pub id: Uuid,
    participants: Vec<CombatParticipant>,
    turn_index: usize,
    round: u32,
    in_flight: Option<InFlight>,
}

impl CombatSession {
    pub fn participants(&self) -> &[CombatParticipant] {
        &self.participants
    }

    pub fn participant(&self, id: ParticipantId) -> Option<&CombatParticipant> {
        self.participants.iter().find(|p| p.id == id)
    }

    fn participant_mut(&mut self, id: ParticipantId) -> Option<&mut CombatParticipant> {
        self.participants.iter_mut().find(|p| p.id == id)
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn turn_index(&self) -> usize {
        self.turn_index
    }

    /// Whose turn it is.
    pub fn current(&self) -> Option<&CombatParticipant> {
        self.participants.get(self.turn_index)
    }

    pub fn current_id(&self) -> Option<ParticipantId> {
        self.current().map(|p| p.id)
    }

    pub fn player(&self) -> Option<&CombatParticipant> {
        self.participants.iter().find(|p| p.is_player)
    }

    pub fn player_id(&self) -> Option<ParticipantId> {
        self.player().map(|p| p.id)
    }

    pub fn monsters(&self) -> impl Iterator<Item = &CombatParticipant> {
        self.participants.iter().filter(|p| !p.is_player)
    }

    pub fn living_monsters(&self) -> impl Iterator<Item = &CombatParticipant> {
        self.monsters().filter(|p| !p.is_dead())
    }

    /// Find a participant by name, ignoring case.
    pub fn find_by_name(&self, name: &str) -> Option<&CombatParticipant> {
        self.participants
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// True while an attack waits to be resolved.
    pub fn is_resolving(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Names and initiatives in turn order.
    pub fn initiative_order(&self) -> Vec<(&str, i32)> {
        self.participants
            .iter()
            .map(|p| (p.name.as_str(), p.initiative))
            .collect()
    }

    /// Copy recalculated player stats onto the player's participant.
    pub(crate) fn sync_player(&mut self, player: &Player) {
        if let Some(participant) = self.participants.iter_mut().find(|p| p.is_player) {
            participant.max_hit_points = player.stats.max_health;
            participant.current_hit_points = player.stats.health.min(player.stats.max_health);
            participant.armor_class = player.stats.armor_class;
            participant.attributes = player.effective_abilities;
        }
    }

    fn total_experience(&self) -> u32 {
        self.monsters().map(|m| m.experience).sum()
    }
}

// ============================================================================
// Errors & Reports
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CombatError {
    #[error("You are not in combat")]
    NotInCombat,

    #[error("Already in combat")]
    AlreadyInCombat,

    #[error("There is nothing to fight")]
    NoMonsters,

    #[error("Invalid monster template: {0}")]
    InvalidTemplate(String),

    #[error("You are in no condition to fight")]
    PlayerUnavailable,

    #[error("Wait for the current roll to resolve")]
    ResolutionInFlight,

    #[error("Unknown combatant: {0}")]
    UnknownParticipant(ParticipantId),

    #[error("It is not {0}'s turn")]
    NotYourTurn(String),

    #[error("It is not a monster's turn")]
    NotMonsterTurn,

    #[error("{0} has been defeated and cannot act")]
    AttackerDefeated(String),

    #[error("{name} is {condition} and cannot act")]
    CannotAct { name: String, condition: ConditionKind },

    #[error("{0} is already defeated")]
    TargetDefeated(String),

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("This attack no longer applies")]
    StaleResolution,

    #[error(transparent)]
    Dice(#[from] DiceError),

    #[error(transparent)]
    Progression(#[from] ProgressionError),
}

impl CombatError {
    pub fn severity(&self) -> Severity {
        match self {
            CombatError::Dice(_) | CombatError::InvalidTemplate(_) => Severity::Failure,
            _ => Severity::Warning,
        }
    }
}

/// How a fight ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CombatResult {
    Victory { experience: u32 },
    Defeat,
    Fled,
    Ended,
}

/// Everything rolled for one attack, hidden until revealed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttackOutcome {
    pub attacker: ParticipantId,
    pub target: ParticipantId,
    pub weapon: String,
    pub attack: AttackRoll,
    pub damage: Option<DiceRoll>,
    pub damage_type: DamageType,
}

/// An attack that has been rolled but not applied. Consumed by
/// [`CombatEngine::resolve_attack`].
#[must_use = "a pending attack holds the combat session until it is resolved"]
#[derive(Debug)]
pub struct PendingAttack {
    session_id: Uuid,
    attacker: ParticipantId,
    target: ParticipantId,
    outcome: Pending<AttackOutcome>,
}

impl PendingAttack {
    pub fn delay(&self) -> Duration {
        self.outcome.delay()
    }

    pub fn attacker(&self) -> ParticipantId {
        self.attacker
    }

    pub fn target(&self) -> ParticipantId {
        self.target
    }
}

/// What an applied attack did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttackReport {
    pub attacker_name: String,
    pub target_name: String,
    pub outcome: AttackOutcome,
    pub damage_dealt: i32,
    pub target_defeated: bool,
    pub result: Option<CombatResult>,
}

impl AttackReport {
    pub fn hit(&self) -> bool {
        self.outcome.attack.hit
    }

    pub fn critical(&self) -> bool {
        self.outcome.attack.critical
    }
}

struct AttackStats {
    modifier: i32,
    damage: DiceExpression,
    damage_type: DamageType,
    weapon: String,
}

struct DamageResult {
    name: String,
    is_player: bool,
    dealt: i32,
    defeated: bool,
}

// ============================================================================
// Engine
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct CombatEngine;

impl CombatEngine {
    fn reject<T>(messages: &mut MessageLog, err: CombatError) -> Result<T, CombatError> {
        messages.push(err.to_string(), err.severity());
        Err(err)
    }

    /// Start a fight against `templates`. Returns the new session id.
    pub fn start(state: &mut GameState, templates: &[MonsterTemplate]) -> Result<Uuid, CombatError> {
        if let Err(err) = Self::check_can_start(state, templates) {
            return Self::reject(&mut state.messages, err);
        }

        let mut participants = Vec::with_capacity(templates.len() + 1);

        let mut player = CombatParticipant::from_player(&state.player);
        let dex_mod = state.player.modifier(Ability::Dexterity);
        player.initiative = Self::roll_initiative(state, dex_mod);
        participants.push(player);

        let mut seen: HashMap<&str, usize> = HashMap::new();
        for template in templates {
            let copies = templates.iter().filter(|t| t.name == template.name).count();
            let index = seen.entry(template.name.as_str()).or_insert(0);
            *index += 1;
            let name = if copies > 1 {
                format!("{} {}", template.name, index)
            } else {
                template.name.clone()
            };

            let mut monster = CombatParticipant::from_template(template, name);
            monster.initiative =
                Self::roll_initiative(state, template.attributes.modifier(Ability::Dexterity));
            participants.push(monster);
        }

        // Stable: ties keep the player first, then template order
        participants.sort_by(|a, b| b.initiative.cmp(&a.initiative));

        let session = CombatSession {
            id: Uuid::new_v4(),
            participants,
            turn_index: 0,
            round: 1,
            in_flight: None,
        };
        let id = session.id;

        let order = session
            .initiative_order()
            .iter()
            .map(|(name, init)| format!("{name} ({init})"))
            .collect::<Vec<_>>()
            .join(", ");
        info!(session = %id, monsters = templates.len(), "Combat started");
        state.combat = Some(session);
        state
            .messages
            .push(format!("Combat begins! Turn order: {order}"), Severity::Info);

        Ok(id)
    }

    fn check_can_start(state: &GameState, templates: &[MonsterTemplate]) -> Result<(), CombatError> {
        if state.combat.is_some() {
            return Err(CombatError::AlreadyInCombat);
        }
        if templates.is_empty() {
            return Err(CombatError::NoMonsters);
        }
        for template in templates {
            template.validate()?;
        }
        if !state.player.is_alive() {
            return Err(CombatError::PlayerUnavailable);
        }
        Ok(())
    }

    fn roll_initiative(state: &mut GameState, dex_mod: i32) -> i32 {
        state.dice.roll(20, 1).first().map(|r| *r as i32).unwrap_or(1) + dex_mod
    }

    /// Roll an attack and park it in the session's in-flight slot.
    pub fn begin_attack(
        state: &mut GameState,
        attacker: ParticipantId,
        target: ParticipantId,
    ) -> Result<PendingAttack, CombatError> {
        let prepared = Self::prepare_attack(state, attacker, target);
        let (session_id, attacker_name, target_name, target_ac, advantage, stats) = match prepared {
            Ok(prepared) => prepared,
            Err(err) => return Self::reject(&mut state.messages, err),
        };

        let label = format!("{attacker_name} attacks {target_name}");
        let (attack, delay) = CheckResolver::attack_roll(
            &mut state.dice,
            stats.modifier,
            target_ac,
            advantage,
            label,
        )
        .into_parts();

        let damage = if attack.hit {
            let expr = if attack.critical {
                stats.damage.with_doubled_dice()
            } else {
                stats.damage.clone()
            };
            Some(state.dice.evaluate(&expr))
        } else {
            None
        };

        if let Some(session) = state.combat.as_mut() {
            session.in_flight = Some(InFlight { attacker, target });
        }
        debug!(
            attacker = %attacker_name,
            target = %target_name,
            total = attack.roll.total,
            hit = attack.hit,
            "Attack rolled"
        );

        let outcome = AttackOutcome {
            attacker,
            target,
            weapon: stats.weapon,
            attack,
            damage,
            damage_type: stats.damage_type,
        };
        Ok(PendingAttack {
            session_id,
            attacker,
            target,
            outcome: Pending::new(outcome, delay),
        })
    }

    #[allow(clippy::type_complexity)]
    fn prepare_attack(
        state: &GameState,
        attacker: ParticipantId,
        target: ParticipantId,
    ) -> Result<(Uuid, String, String, i32, Advantage, AttackStats), CombatError> {
        let session = state.combat.as_ref().ok_or(CombatError::NotInCombat)?;
        if session.is_resolving() {
            return Err(CombatError::ResolutionInFlight);
        }

        let attacker_p = session
            .participant(attacker)
            .ok_or(CombatError::UnknownParticipant(attacker))?;
        if session.current_id() != Some(attacker) {
            return Err(CombatError::NotYourTurn(attacker_p.name.clone()));
        }
        if attacker_p.is_dead() {
            return Err(CombatError::AttackerDefeated(attacker_p.name.clone()));
        }
        if let Some(condition) = attacker_p.incapacitated_by() {
            return Err(CombatError::CannotAct {
                name: attacker_p.name.clone(),
                condition,
            });
        }

        if target == attacker {
            return Err(CombatError::InvalidTarget(format!(
                "{} can't attack itself",
                attacker_p.name
            )));
        }
        let target_p = session
            .participant(target)
            .ok_or(CombatError::UnknownParticipant(target))?;
        if target_p.is_dead() {
            return Err(CombatError::TargetDefeated(target_p.name.clone()));
        }
        if target_p.is_player == attacker_p.is_player {
            return Err(CombatError::InvalidTarget(format!(
                "{} is on the same side",
                target_p.name
            )));
        }

        let stats = if attacker_p.is_player {
            Self::player_attack(&state.player, &state.catalog)?
        } else {
            attacker_p.monster_attack()?
        };

        Ok((
            session.id,
            attacker_p.name.clone(),
            target_p.name.clone(),
            target_p.armor_class,
            Self::attack_advantage(attacker_p, target_p),
            stats,
        ))
    }

    /// Main-hand weapon stats. Ranged weapons use DEX, finesse weapons the
    /// better of STR and DEX, everything else STR. The ability modifier
    /// applies to both the attack and the damage.
    fn player_attack(player: &Player, catalog: &ItemCatalog) -> Result<AttackStats, CombatError> {
        let weapon = player
            .equipment
            .get(EquipSlot::MainHand)
            .and_then(|id| catalog.get(id))
            .filter(|item| item.kind == ItemKind::Weapon);

        let str_mod = player.modifier(Ability::Strength);
        let dex_mod = player.modifier(Ability::Dexterity);

        let (name, notation, damage_type, ability_mod) = match weapon {
            Some(w) => {
                let ability_mod = if w.ranged {
                    dex_mod
                } else if w.finesse {
                    str_mod.max(dex_mod)
                } else {
                    str_mod
                };
                (
                    w.name.clone(),
                    w.damage.as_deref().unwrap_or(UNARMED_DAMAGE),
                    w.damage_type.unwrap_or(DamageType::Bludgeoning),
                    ability_mod,
                )
            }
            None => (
                "fists".to_string(),
                UNARMED_DAMAGE,
                DamageType::Bludgeoning,
                str_mod,
            ),
        };

        let mut damage = DiceExpression::parse(notation)?;
        damage.modifier += ability_mod;

        Ok(AttackStats {
            modifier: ability_mod + proficiency_bonus(player.level()),
            damage,
            damage_type,
            weapon: name,
        })
    }

    fn attack_advantage(attacker: &CombatParticipant, target: &CombatParticipant) -> Advantage {
        let advantage = attacker.has_condition(ConditionKind::Invisible)
            || target.conditions.iter().any(|c| c.kind.exposes_defender());
        let disadvantage = attacker.conditions.iter().any(|c| c.kind.hinders_attacks())
            || target.has_condition(ConditionKind::Invisible);
        Advantage::from_flags(advantage, disadvantage)
    }

    /// Apply a pending attack. Consumes it, so each roll lands once.
    pub fn resolve_attack(
        state: &mut GameState,
        pending: PendingAttack,
    ) -> Result<AttackReport, CombatError> {
        let PendingAttack {
            session_id,
            attacker,
            target,
            outcome,
        } = pending;
        let outcome = outcome.reveal_now();

        let session = match state.combat.as_mut() {
            Some(session)
                if session.id == session_id
                    && session.in_flight == Some(InFlight { attacker, target }) =>
            {
                session
            }
            _ => return Self::reject(&mut state.messages, CombatError::StaleResolution),
        };
        session.in_flight = None;

        let attacker_name = match session.participant_mut(attacker) {
            Some(p) => {
                p.has_acted = true;
                p.name.clone()
            }
            None => String::new(),
        };
        let target_name = session
            .participant(target)
            .map(|p| p.name.clone())
            .unwrap_or_default();
        let player_attacking = session.participant(attacker).is_some_and(|p| p.is_player);

        let mut damage_dealt = 0;
        let mut target_defeated = false;

        if let Some(damage) = &outcome.damage {
            let hit_text = if outcome.attack.critical {
                "Critical hit! "
            } else {
                ""
            };
            let amount = damage.total.max(0);
            if let Some(result) =
                Self::damage_participant(state, target, amount, outcome.damage_type)
            {
                damage_dealt = result.dealt;
                target_defeated = result.defeated;
                let resisted = if result.dealt < amount { " (resisted)" } else { "" };
                let severity = if player_attacking {
                    Severity::Success
                } else {
                    Severity::Failure
                };
                state.messages.push(
                    format!(
                        "{hit_text}{attacker_name} hits {target_name} with {} for {} {} damage{resisted}",
                        outcome.weapon, result.dealt, outcome.damage_type
                    ),
                    severity,
                );
            }
        } else {
            state.messages.push(
                format!(
                    "{attacker_name} misses {target_name} ({} vs AC {})",
                    outcome.attack.roll.total, outcome.attack.target_ac
                ),
                Severity::Normal,
            );
        }

        let result = Self::settle(state)?;
        if result.is_none() {
            Self::advance_turn(state);
        }

        Ok(AttackReport {
            attacker_name,
            target_name,
            outcome,
            damage_dealt,
            target_defeated,
            result,
        })
    }

    /// Begin an attack, wait out the reveal delay, then resolve it.
    pub async fn perform_attack(
        state: &mut GameState,
        attacker: ParticipantId,
        target: ParticipantId,
    ) -> Result<AttackReport, CombatError> {
        let pending = Self::begin_attack(state, attacker, target)?;
        let delay = pending.delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Self::resolve_attack(state, pending)
    }

    /// Let the monster whose turn it is attack the player. A monster that
    /// cannot act passes its turn and `None` is returned.
    pub fn take_monster_turn(state: &mut GameState) -> Result<Option<PendingAttack>, CombatError> {
        let turn = Self::monster_turn(state);
        let (monster, player, blocked) = match turn {
            Ok(turn) => turn,
            Err(err) => return Self::reject(&mut state.messages, err),
        };

        if let Some((name, condition)) = blocked {
            state.messages.push(
                format!("{name} is {condition} and loses its turn"),
                Severity::Info,
            );
            Self::advance_turn(state);
            return Ok(None);
        }

        Self::begin_attack(state, monster, player).map(Some)
    }

    #[allow(clippy::type_complexity)]
    fn monster_turn(
        state: &GameState,
    ) -> Result<(ParticipantId, ParticipantId, Option<(String, ConditionKind)>), CombatError> {
        let session = state.combat.as_ref().ok_or(CombatError::NotInCombat)?;
        if session.is_resolving() {
            return Err(CombatError::ResolutionInFlight);
        }
        let current = session.current().ok_or(CombatError::NotMonsterTurn)?;
        if current.is_player {
            return Err(CombatError::NotMonsterTurn);
        }
        let player = session.player_id().ok_or(CombatError::PlayerUnavailable)?;
        let blocked = current
            .incapacitated_by()
            .map(|condition| (current.name.clone(), condition));
        Ok((current.id, player, blocked))
    }

    /// Run the current monster's turn, waiting out the reveal delay.
    pub async fn run_monster_turn(state: &mut GameState) -> Result<Option<AttackReport>, CombatError> {
        let Some(pending) = Self::take_monster_turn(state)? else {
            return Ok(None);
        };
        let delay = pending.delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Self::resolve_attack(state, pending).map(Some)
    }

    /// Deal damage outside of an attack (traps, spells, hazards). Returns
    /// the damage after resistance.
    pub fn apply_damage(
        state: &mut GameState,
        target: ParticipantId,
        amount: i32,
        damage_type: DamageType,
    ) -> Result<i32, CombatError> {
        if let Err(err) = Self::check_target(state, target) {
            return Self::reject(&mut state.messages, err);
        }
        let Some(result) = Self::damage_participant(state, target, amount, damage_type) else {
            return Self::reject(&mut state.messages, CombatError::UnknownParticipant(target));
        };

        let severity = if result.is_player {
            Severity::Failure
        } else {
            Severity::Normal
        };
        state.messages.push(
            format!("{} takes {} {damage_type} damage", result.name, result.dealt),
            severity,
        );
        Self::settle(state)?;
        Ok(result.dealt)
    }

    /// Heal a living participant. Returns the amount healed.
    pub fn heal(state: &mut GameState, target: ParticipantId, amount: i32) -> Result<i32, CombatError> {
        if let Err(err) = Self::check_target(state, target) {
            return Self::reject(&mut state.messages, err);
        }
        let GameState {
            combat,
            player,
            messages,
            ..
        } = state;
        let Some(participant) = combat.as_mut().and_then(|s| s.participant_mut(target)) else {
            return Self::reject(messages, CombatError::UnknownParticipant(target));
        };

        let healed = participant.heal(amount);
        if participant.is_player {
            player.stats.health = participant.current_hit_points;
        }
        messages.push(
            format!("{} recovers {healed} HP", participant.name),
            Severity::Success,
        );
        Ok(healed)
    }

    fn check_target(state: &GameState, target: ParticipantId) -> Result<(), CombatError> {
        let session = state.combat.as_ref().ok_or(CombatError::NotInCombat)?;
        if session.is_resolving() {
            return Err(CombatError::ResolutionInFlight);
        }
        let participant = session
            .participant(target)
            .ok_or(CombatError::UnknownParticipant(target))?;
        if participant.is_dead() {
            return Err(CombatError::TargetDefeated(participant.name.clone()));
        }
        Ok(())
    }

    /// Apply damage to one participant, mirror the player's HP and report
    /// a defeat. `None` when there is no such participant.
    fn damage_participant(
        state: &mut GameState,
        target: ParticipantId,
        amount: i32,
        damage_type: DamageType,
    ) -> Option<DamageResult> {
        let GameState {
            combat,
            player,
            messages,
            ..
        } = state;
        let participant = combat.as_mut()?.participant_mut(target)?;
        let was_alive = !participant.is_dead();

        let dealt = participant.take_damage(amount, damage_type);
        if participant.is_player {
            player.stats.health = participant.current_hit_points;
        }

        let defeated = was_alive && participant.is_dead();
        if defeated {
            let severity = if participant.is_player {
                Severity::Failure
            } else {
                Severity::Success
            };
            messages.push(format!("{} is defeated!", participant.name), severity);
        }

        Some(DamageResult {
            name: participant.name.clone(),
            is_player: participant.is_player,
            dealt,
            defeated,
        })
    }

    /// End the fight if one side is down.
    fn settle(state: &mut GameState) -> Result<Option<CombatResult>, CombatError> {
        let Some(session) = state.combat.as_ref() else {
            return Ok(None);
        };

        if session.player().map_or(true, |p| p.is_dead()) {
            Self::finish(state, CombatResult::Defeat);
            state.messages.push(
                "You have been defeated...".to_string(),
                Severity::Failure,
            );
            return Ok(Some(CombatResult::Defeat));
        }

        if session.living_monsters().next().is_none() {
            let experience = session.total_experience();
            Self::finish(state, CombatResult::Victory { experience });
            state
                .messages
                .push("Victory! All enemies defeated.".to_string(), Severity::Success);
            if experience > 0 {
                ProgressionEngine::award_experience(state, experience, "combat")?;
            }
            return Ok(Some(CombatResult::Victory { experience }));
        }

        Ok(None)
    }

    fn finish(state: &mut GameState, result: CombatResult) {
        if let Some(session) = state.combat.take() {
            info!(session = %session.id, rounds = session.round, result = ?result, "Combat ended");
        }
    }

    /// Pass the turn to the next living participant.
    pub fn end_turn(state: &mut GameState) -> Result<ParticipantId, CombatError> {
        let check = match state.combat.as_ref() {
            None => Err(CombatError::NotInCombat),
            Some(session) if session.is_resolving() => Err(CombatError::ResolutionInFlight),
            Some(_) => Ok(()),
        };
        if let Err(err) = check {
            return Self::reject(&mut state.messages, err);
        }

        match Self::advance_turn(state) {
            Some(next) => Ok(next),
            None => Self::reject(&mut state.messages, CombatError::NotInCombat),
        }
    }

    /// Advance the turn index, skipping the dead. Wrapping past the end
    /// starts a new round: per-turn flags reset and timed conditions and
    /// player effects tick.
    fn advance_turn(state: &mut GameState) -> Option<ParticipantId> {
        let GameState {
            combat,
            player,
            messages,
            ..
        } = state;
        let session = combat.as_mut()?;
        let count = session.participants.len();
        if count == 0 {
            return None;
        }

        let mut index = session.turn_index;
        let mut wrapped = false;
        for _ in 0..count {
            index = (index + 1) % count;
            if index == 0 {
                wrapped = true;
            }
            if !session.participants[index].is_dead() {
                break;
            }
        }
        session.turn_index = index;

        if wrapped {
            session.round += 1;
            for participant in session.participants.iter_mut() {
                participant.has_acted = false;
                participant.has_moved = false;
                for condition in participant.tick_conditions() {
                    messages.push(
                        format!("{} is no longer {condition}", participant.name),
                        Severity::Info,
                    );
                }
            }
            for effect in player.tick_effects() {
                messages.push(format!("{effect} has worn off"), Severity::Info);
            }
        }

        let current = &session.participants[index];
        debug!(round = session.round, turn = %current.name, "Turn advanced");
        Some(current.id)
    }

    /// Put a condition on a living participant, replacing any of the
    /// same kind.
    pub fn apply_condition(
        state: &mut GameState,
        target: ParticipantId,
        kind: ConditionKind,
        rounds: Option<u32>,
    ) -> Result<(), CombatError> {
        if let Err(err) = Self::check_target(state, target) {
            return Self::reject(&mut state.messages, err);
        }
        let GameState {
            combat, messages, ..
        } = state;
        let Some(participant) = combat.as_mut().and_then(|s| s.participant_mut(target)) else {
            return Self::reject(messages, CombatError::UnknownParticipant(target));
        };
        participant.add_condition(kind, rounds);
        messages.push(format!("{} is {kind}", participant.name), Severity::Info);
        Ok(())
    }

    /// Run away. HP changes made during the fight stay.
    pub fn flee(state: &mut GameState) -> Result<CombatResult, CombatError> {
        Self::leave(state, CombatResult::Fled, "You flee from combat")
    }

    /// End the fight without a winner.
    pub fn exit(state: &mut GameState) -> Result<CombatResult, CombatError> {
        Self::leave(state, CombatResult::Ended, "Combat ended")
    }

    fn leave(
        state: &mut GameState,
        result: CombatResult,
        message: &str,
    ) -> Result<CombatResult, CombatError> {
        let check = match state.combat.as_ref() {
            None => Err(CombatError::NotInCombat),
            Some(session) if session.is_resolving() => Err(CombatError::ResolutionInFlight),
            Some(_) => Ok(()),
        };
        if let Err(err) = check {
            return Self::reject(&mut state.messages, err);
        }
        Self::finish(state, result);
        state.messages.push(message.to_string(), Severity::Info);
        Ok(result)
    }
}
