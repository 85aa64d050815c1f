//! The player record.

use crate::ability::{
    tick_effects, Ability, AbilityModel, AbilityScores, ActiveEffect, ProficiencyLevel, Skill,
};
use crate::equipment::{EquipmentResolver, EquipmentSlots};
use crate::inventory::Inventory;
use crate::items::ItemCatalog;
use crate::progression::ExperienceState;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

fn default_hit_die() -> u32 {
    8
}

/// Stats derived from abilities, level and equipment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DerivedStats {
    pub health: i32,
    pub max_health: i32,
    pub mana: i32,
    pub max_mana: i32,
    pub armor_class: i32,
    pub carry_capacity: i32,
}

/// Canonical player state. Combat mirrors HP changes back into `stats`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: Uuid,
    pub name: String,
    /// Base scores. Only level-up improvements change these.
    pub abilities: AbilityScores,
    /// Base scores plus equipment bonuses, rebuilt on every recalculation.
    #[serde(default)]
    pub effective_abilities: AbilityScores,
    #[serde(default)]
    pub stats: DerivedStats,
    #[serde(default)]
    pub equipment: EquipmentSlots,
    #[serde(default)]
    pub inventory: Inventory,
    #[serde(default)]
    pub active_effects: Vec<ActiveEffect>,
    #[serde(default)]
    pub skill_proficiencies: HashMap<Skill, ProficiencyLevel>,
    #[serde(default)]
    pub saving_throw_proficiencies: Vec<Ability>,
    #[serde(default)]
    pub progress: ExperienceState,
    #[serde(default = "default_hit_die")]
    pub hit_die: u32,
    /// Max HP gained from level-up hit-die choices.
    #[serde(default)]
    pub hit_point_bonus: i32,
}

impl Player {
    /// A fresh level-1 player at full health and mana.
    pub fn new(name: impl Into<String>, abilities: AbilityScores) -> Self {
        let mut player = Self {
            id: Uuid::new_v4(),
            name: name.into(),
            abilities,
            effective_abilities: abilities,
            stats: DerivedStats::default(),
            equipment: EquipmentSlots::default(),
            inventory: Inventory::default(),
            active_effects: Vec::new(),
            skill_proficiencies: HashMap::new(),
            saving_throw_proficiencies: Vec::new(),
            progress: ExperienceState::default(),
            hit_die: default_hit_die(),
            hit_point_bonus: 0,
        };
        EquipmentResolver::recalculate(&mut player, &ItemCatalog::new());
        player.stats.health = player.stats.max_health;
        player.stats.mana = player.stats.max_mana;
        player
    }

    pub fn with_hit_die(mut self, hit_die: u32) -> Self {
        self.hit_die = hit_die.max(1);
        self
    }

    pub fn with_skill(mut self, skill: Skill, level: ProficiencyLevel) -> Self {
        self.skill_proficiencies.insert(skill, level);
        self
    }

    pub fn with_saving_throw(mut self, ability: Ability) -> Self {
        if !self.saving_throw_proficiencies.contains(&ability) {
            self.saving_throw_proficiencies.push(ability);
        }
        self
    }

    pub fn with_item(mut self, id: &str, quantity: u32) -> Self {
        self.inventory.add(id, quantity);
        self
    }

    pub fn level(&self) -> u32 {
        self.progress.level
    }

    /// Working scores combined with active timed effects.
    pub fn abilities(&self) -> AbilityModel<'_> {
        AbilityModel::new(&self.effective_abilities, &self.active_effects)
    }

    pub fn modifier(&self, ability: Ability) -> i32 {
        self.abilities().modifier_for(ability)
    }

    pub fn skill_proficiency(&self, skill: Skill) -> ProficiencyLevel {
        self.skill_proficiencies
            .get(&skill)
            .copied()
            .unwrap_or_default()
    }

    pub fn is_proficient_save(&self, ability: Ability) -> bool {
        self.saving_throw_proficiencies.contains(&ability)
    }

    pub fn is_alive(&self) -> bool {
        self.stats.health > 0
    }

    pub fn add_effect(&mut self, effect: ActiveEffect) {
        self.active_effects.push(effect);
    }

    /// Advance timed effects one round; returns the names that expired.
    pub fn tick_effects(&mut self) -> Vec<String> {
        tick_effects(&mut self.active_effects)
    }
}

/// A ready-to-play level-1 fighter with a starter kit.
pub fn create_sample_adventurer(name: &str) -> Player {
    Player::new(name, AbilityScores::new(15, 16, 14, 12, 10, 8))
        .with_hit_die(10)
        .with_skill(Skill::Athletics, ProficiencyLevel::Proficient)
        .with_skill(Skill::Perception, ProficiencyLevel::Proficient)
        .with_skill(Skill::Stealth, ProficiencyLevel::Expertise)
        .with_saving_throw(Ability::Strength)
        .with_saving_throw(Ability::Constitution)
        .with_item("steel_longsword", 1)
        .with_item("rapier", 1)
        .with_item("leather_armor", 1)
        .with_item("iron_shield", 1)
        .with_item("ring_of_wit", 1)
        .with_item("health_potion", 3)
        .with_item("mana_potion", 1)
        .with_item("elixir_of_strength", 1)
        .with_item("gold_coin", 25)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_player_derived_stats() {
        let player = Player::new("Tessa", AbilityScores::new(14, 16, 12, 10, 10, 10));

        // 20 + con mod (1) * level 1
        assert_eq!(player.stats.max_health, 21);
        assert_eq!(player.stats.health, 21);
        // 10 + int mod (0)
        assert_eq!(player.stats.max_mana, 10);
        // 10 + dex mod (3)
        assert_eq!(player.stats.armor_class, 13);
        // 150 + str mod (2) * 15
        assert_eq!(player.stats.carry_capacity, 180);
        assert_eq!(player.level(), 1);
    }

    #[test]
    fn test_sample_adventurer() {
        let player = create_sample_adventurer("Rook");
        assert_eq!(player.skill_proficiency(Skill::Stealth), ProficiencyLevel::Expertise);
        assert_eq!(player.skill_proficiency(Skill::Arcana), ProficiencyLevel::None);
        assert!(player.is_proficient_save(Ability::Constitution));
        assert_eq!(player.inventory.count("health_potion"), 3);
        assert!(player.is_alive());
    }

    #[test]
    fn test_effects_feed_modifiers() {
        let mut player = Player::new("Tessa", AbilityScores::default());
        player.add_effect(ActiveEffect::new("Elixir", Ability::Strength, 4).with_duration(1));
        assert_eq!(player.modifier(Ability::Strength), 2);

        assert_eq!(player.tick_effects(), vec!["Elixir".to_string()]);
        assert_eq!(player.modifier(Ability::Strength), 0);
    }

    #[test]
    fn test_player_json_round_trip() {
        let player = create_sample_adventurer("Rook");
        let json = serde_json::to_string(&player).unwrap();
        let loaded: Player = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded, player);
    }
}
