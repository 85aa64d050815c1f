//! Experience, level-up detection and level-up commit.
//!
//! Awarding experience never changes the level on its own. The host asks
//! [`ProgressionEngine::check_for_level_up`] for a plan, gathers one
//! resolution per gained level from the player, and commits them with
//! [`ProgressionEngine::apply_level_up`].

use crate::ability::{Ability, ABILITY_IMPROVEMENT_CAP};
use crate::character::Player;
use crate::equipment::EquipmentResolver;
use crate::notify::Severity;
use crate::state::GameState;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::info;

pub const MAX_LEVEL: u32 = 20;

/// Cumulative experience needed for each level, starting at level 1.
pub const XP_THRESHOLDS: [u32; MAX_LEVEL as usize] = [
    0, 300, 900, 2700, 6500, 14000, 23000, 34000, 48000, 64000, 85000, 100000, 120000, 140000,
    165000, 195000, 225000, 265000, 305000, 355000,
];

/// Levels that grant an ability-score improvement.
pub const ASI_LEVELS: [u32; 5] = [4, 8, 12, 16, 19];

/// Experience history entries kept per player.
pub const HISTORY_LIMIT: usize = 50;

/// Highest level whose threshold `experience` has reached.
pub fn level_for_experience(experience: u32) -> u32 {
    XP_THRESHOLDS
        .iter()
        .take_while(|threshold| **threshold <= experience)
        .count()
        .max(1) as u32
}

/// Experience required to reach `level` (clamped to 1..=20).
pub fn experience_for_level(level: u32) -> u32 {
    let index = level.clamp(1, MAX_LEVEL) as usize - 1;
    XP_THRESHOLDS[index]
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn default_level() -> u32 {
    1
}

// ============================================================================
// Experience State
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperienceEntry {
    pub source: String,
    pub amount: u32,
    /// Cumulative experience after this award.
    pub total: u32,
    /// Unix seconds.
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperienceState {
    #[serde(default = "default_level")]
    pub level: u32,
    #[serde(default)]
    pub experience: u32,
    #[serde(default)]
    pub history: VecDeque<ExperienceEntry>,
}

impl Default for ExperienceState {
    fn default() -> Self {
        Self {
            level: 1,
            experience: 0,
            history: VecDeque::new(),
        }
    }
}

impl ExperienceState {
    /// The level the current experience supports.
    pub fn implied_level(&self) -> u32 {
        level_for_experience(self.experience)
    }

    pub fn has_pending_level_up(&self) -> bool {
        self.implied_level() > self.level
    }

    /// Experience still needed for the next level, or `None` at the cap.
    pub fn experience_to_next(&self) -> Option<u32> {
        if self.level >= MAX_LEVEL {
            return None;
        }
        Some(experience_for_level(self.level + 1).saturating_sub(self.experience))
    }

    fn record(&mut self, entry: ExperienceEntry) {
        if self.history.len() == HISTORY_LIMIT {
            self.history.pop_front();
        }
        self.history.push_back(entry);
    }
}

// ============================================================================
// Plans & Resolutions
// ============================================================================

/// What one gained level offers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelChoice {
    pub level: u32,
    pub hit_die: u32,
    pub average_hit_points: i32,
    pub ability_improvement: bool,
}

/// Every level between the stored and the implied level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelUpPlan {
    pub from_level: u32,
    pub to_level: u32,
    pub levels: Vec<LevelChoice>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HitPointChoice {
    Average,
    Roll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbilityImprovement {
    /// +2 to one ability.
    Single(Ability),
    /// +1 to two different abilities.
    Split(Ability, Ability),
}

impl AbilityImprovement {
    fn increases(&self) -> Vec<(Ability, i32)> {
        match *self {
            AbilityImprovement::Single(ability) => vec![(ability, 2)],
            AbilityImprovement::Split(a, b) => vec![(a, 1), (b, 1)],
        }
    }
}

/// The player's answer for one gained level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelResolution {
    pub hit_points: HitPointChoice,
    #[serde(default)]
    pub improvement: Option<AbilityImprovement>,
}

impl LevelResolution {
    pub fn average() -> Self {
        Self {
            hit_points: HitPointChoice::Average,
            improvement: None,
        }
    }

    pub fn rolled() -> Self {
        Self {
            hit_points: HitPointChoice::Roll,
            improvement: None,
        }
    }

    pub fn with_improvement(mut self, improvement: AbilityImprovement) -> Self {
        self.improvement = Some(improvement);
        self
    }
}

/// What a committed level-up changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelUpSummary {
    pub from_level: u32,
    pub to_level: u32,
    pub hit_points_gained: i32,
    pub max_health_increase: i32,
    pub ability_increases: Vec<(Ability, i32)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProgressionError {
    #[error("Experience awards must be positive")]
    InvalidAmount,

    #[error("No level up is available")]
    NoLevelUpPending,

    #[error("Level up plan is out of date")]
    StalePlan,

    #[error("Expected {expected} level choices, got {found}")]
    ResolutionCountMismatch { expected: usize, found: usize },

    #[error("Level {0} requires an ability score improvement")]
    MissingImprovement(u32),

    #[error("Level {0} does not grant an ability score improvement")]
    UnexpectedImprovement(u32),

    #[error("An ability score improvement must pick two different abilities, got {0} twice")]
    DuplicateAbility(Ability),
}

impl ProgressionError {
    pub fn severity(&self) -> Severity {
        Severity::Warning
    }
}

// ============================================================================
// Engine
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct ProgressionEngine;

impl ProgressionEngine {
    /// Add experience and record it in the history. The level is untouched.
    pub fn award_experience(
        state: &mut GameState,
        amount: u32,
        source: &str,
    ) -> Result<ExperienceEntry, ProgressionError> {
        if amount == 0 {
            let err = ProgressionError::InvalidAmount;
            state.messages.push(err.to_string(), err.severity());
            return Err(err);
        }

        let progress = &mut state.player.progress;
        progress.experience = progress.experience.saturating_add(amount);
        let entry = ExperienceEntry {
            source: source.to_string(),
            amount,
            total: progress.experience,
            timestamp: unix_now(),
        };
        progress.record(entry.clone());
        let pending = progress.has_pending_level_up();

        info!(amount, source, total = entry.total, "Experience awarded");
        state
            .messages
            .push(format!("Gained {amount} XP ({source})"), Severity::Success);
        if pending {
            state
                .messages
                .push("Level up available!".to_string(), Severity::Info);
        }

        Ok(entry)
    }

    /// The pending level-up, if experience supports a higher level.
    /// Calling this never changes anything.
    pub fn check_for_level_up(player: &Player) -> Option<LevelUpPlan> {
        let from_level = player.progress.level;
        let to_level = player.progress.implied_level();
        if to_level <= from_level {
            return None;
        }

        let hit_die = player.hit_die.max(1);
        let levels = (from_level + 1..=to_level)
            .map(|level| LevelChoice {
                level,
                hit_die,
                average_hit_points: (hit_die / 2 + 1) as i32,
                ability_improvement: ASI_LEVELS.contains(&level),
            })
            .collect();

        Some(LevelUpPlan {
            from_level,
            to_level,
            levels,
        })
    }

    /// Commit a level-up plan with one resolution per gained level.
    pub fn apply_level_up(
        state: &mut GameState,
        plan: &LevelUpPlan,
        resolutions: &[LevelResolution],
    ) -> Result<LevelUpSummary, ProgressionError> {
        if let Err(err) = Self::validate(&state.player, plan, resolutions) {
            state.messages.push(err.to_string(), err.severity());
            return Err(err);
        }

        let mut hit_points_gained = 0;
        let mut ability_increases: Vec<(Ability, i32)> = Vec::new();

        for (choice, resolution) in plan.levels.iter().zip(resolutions) {
            hit_points_gained += match resolution.hit_points {
                HitPointChoice::Average => choice.average_hit_points,
                HitPointChoice::Roll => state
                    .dice
                    .roll(choice.hit_die, 1)
                    .first()
                    .map(|r| *r as i32)
                    .unwrap_or(choice.average_hit_points),
            };

            if let Some(improvement) = resolution.improvement {
                for (ability, amount) in improvement.increases() {
                    let current = state.player.abilities.get(ability);
                    let raised = (current + amount).min(ABILITY_IMPROVEMENT_CAP).max(current);
                    state.player.abilities.set(ability, raised);
                    if raised > current {
                        ability_increases.push((ability, raised - current));
                    }
                }
            }
        }

        let player = &mut state.player;
        let before_max = player.stats.max_health;
        player.progress.level = plan.to_level;
        player.hit_point_bonus += hit_points_gained;
        EquipmentResolver::recalculate(player, &state.catalog);

        let max_health_increase = player.stats.max_health - before_max;
        player.stats.health =
            (player.stats.health + max_health_increase.max(0)).min(player.stats.max_health);
        state.sync_combatant();

        info!(
            from = plan.from_level,
            to = plan.to_level,
            hit_points_gained,
            "Level up applied"
        );
        let message = format!("{} reached level {}!", state.player.name, plan.to_level);
        state.messages.push(message, Severity::Success);

        Ok(LevelUpSummary {
            from_level: plan.from_level,
            to_level: plan.to_level,
            hit_points_gained,
            max_health_increase,
            ability_increases,
        })
    }

    fn validate(
        player: &Player,
        plan: &LevelUpPlan,
        resolutions: &[LevelResolution],
    ) -> Result<(), ProgressionError> {
        let current = Self::check_for_level_up(player).ok_or(ProgressionError::NoLevelUpPending)?;
        if current != *plan {
            return Err(ProgressionError::StalePlan);
        }
        if resolutions.len() != plan.levels.len() {
            return Err(ProgressionError::ResolutionCountMismatch {
                expected: plan.levels.len(),
                found: resolutions.len(),
            });
        }

        for (choice, resolution) in plan.levels.iter().zip(resolutions) {
            match (choice.ability_improvement, resolution.improvement) {
                (true, None) => return Err(ProgressionError::MissingImprovement(choice.level)),
                (false, Some(_)) => {
                    return Err(ProgressionError::UnexpectedImprovement(choice.level))
                }
                (_, Some(AbilityImprovement::Split(a, b))) if a == b => {
                    return Err(ProgressionError::DuplicateAbility(a))
                }
                _ => {}
            }
        }
        Ok(())
    }
}
