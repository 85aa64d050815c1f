//! Ability scores, skills, proficiency and timed effect bonuses.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Highest score an ability-score improvement may raise an ability to.
pub const ABILITY_IMPROVEMENT_CAP: i32 = 20;

fn default_score() -> i32 {
    10
}

// ============================================================================
// Abilities
// ============================================================================

/// The six ability scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ability {
    Strength,
    Dexterity,
    Constitution,
    Intelligence,
    Wisdom,
    Charisma,
}

impl Ability {
    pub fn abbreviation(&self) -> &'static str {
        match self {
            Ability::Strength => "STR",
            Ability::Dexterity => "DEX",
            Ability::Constitution => "CON",
            Ability::Intelligence => "INT",
            Ability::Wisdom => "WIS",
            Ability::Charisma => "CHA",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Ability::Strength => "Strength",
            Ability::Dexterity => "Dexterity",
            Ability::Constitution => "Constitution",
            Ability::Intelligence => "Intelligence",
            Ability::Wisdom => "Wisdom",
            Ability::Charisma => "Charisma",
        }
    }

    pub fn all() -> [Ability; 6] {
        [
            Ability::Strength,
            Ability::Dexterity,
            Ability::Constitution,
            Ability::Intelligence,
            Ability::Wisdom,
            Ability::Charisma,
        ]
    }
}

impl fmt::Display for Ability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.abbreviation())
    }
}

impl FromStr for Ability {
    type Err = String;

    /// Accepts full names and abbreviations, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strength" | "str" => Ok(Ability::Strength),
            "dexterity" | "dex" => Ok(Ability::Dexterity),
            "constitution" | "con" => Ok(Ability::Constitution),
            "intelligence" | "int" => Ok(Ability::Intelligence),
            "wisdom" | "wis" => Ok(Ability::Wisdom),
            "charisma" | "cha" => Ok(Ability::Charisma),
            other => Err(format!("Unknown ability: {other}")),
        }
    }
}

/// Modifier for a raw score: `floor((score - 10) / 2)`.
pub fn modifier_for_score(score: i32) -> i32 {
    (score - 10).div_euclid(2)
}

/// Ability scores container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityScores {
    #[serde(default = "default_score")]
    pub strength: i32,
    #[serde(default = "default_score")]
    pub dexterity: i32,
    #[serde(default = "default_score")]
    pub constitution: i32,
    #[serde(default = "default_score")]
    pub intelligence: i32,
    #[serde(default = "default_score")]
    pub wisdom: i32,
    #[serde(default = "default_score")]
    pub charisma: i32,
}

impl AbilityScores {
    pub fn new(str: i32, dex: i32, con: i32, int: i32, wis: i32, cha: i32) -> Self {
        Self {
            strength: str,
            dexterity: dex,
            constitution: con,
            intelligence: int,
            wisdom: wis,
            charisma: cha,
        }
    }

    pub fn get(&self, ability: Ability) -> i32 {
        match ability {
            Ability::Strength => self.strength,
            Ability::Dexterity => self.dexterity,
            Ability::Constitution => self.constitution,
            Ability::Intelligence => self.intelligence,
            Ability::Wisdom => self.wisdom,
            Ability::Charisma => self.charisma,
        }
    }

    pub fn set(&mut self, ability: Ability, value: i32) {
        match ability {
            Ability::Strength => self.strength = value,
            Ability::Dexterity => self.dexterity = value,
            Ability::Constitution => self.constitution = value,
            Ability::Intelligence => self.intelligence = value,
            Ability::Wisdom => self.wisdom = value,
            Ability::Charisma => self.charisma = value,
        }
    }

    pub fn add(&mut self, ability: Ability, amount: i32) {
        self.set(ability, self.get(ability) + amount);
    }

    pub fn modifier(&self, ability: Ability) -> i32 {
        modifier_for_score(self.get(ability))
    }
}

impl Default for AbilityScores {
    fn default() -> Self {
        Self::new(10, 10, 10, 10, 10, 10)
    }
}

// ============================================================================
// Timed Effects
// ============================================================================

/// A temporary bonus to one ability, e.g. from a potion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveEffect {
    pub name: String,
    pub ability: Ability,
    pub bonus: i32,
    /// Rounds left; `None` lasts until removed.
    pub remaining_rounds: Option<u32>,
}

impl ActiveEffect {
    pub fn new(name: impl Into<String>, ability: Ability, bonus: i32) -> Self {
        Self {
            name: name.into(),
            ability,
            bonus,
            remaining_rounds: None,
        }
    }

    pub fn with_duration(mut self, rounds: u32) -> Self {
        self.remaining_rounds = Some(rounds);
        self
    }

    pub fn is_active(&self) -> bool {
        self.remaining_rounds != Some(0)
    }
}

/// Advance every effect by one round and drop the expired ones.
/// Returns the names of effects that expired.
pub fn tick_effects(effects: &mut Vec<ActiveEffect>) -> Vec<String> {
    for effect in effects.iter_mut() {
        if let Some(rounds) = effect.remaining_rounds.as_mut() {
            *rounds = rounds.saturating_sub(1);
        }
    }
    let expired = effects
        .iter()
        .filter(|e| !e.is_active())
        .map(|e| e.name.clone())
        .collect();
    effects.retain(|e| e.is_active());
    expired
}

// ============================================================================
// Ability Model
// ============================================================================

/// Read-only view combining working scores with active timed effects.
#[derive(Debug, Clone, Copy)]
pub struct AbilityModel<'a> {
    scores: &'a AbilityScores,
    effects: &'a [ActiveEffect],
}

impl<'a> AbilityModel<'a> {
    pub fn new(scores: &'a AbilityScores, effects: &'a [ActiveEffect]) -> Self {
        Self { scores, effects }
    }

    /// Sum of every active effect targeting `ability`.
    pub fn effect_bonus(&self, ability: Ability) -> i32 {
        self.effects
            .iter()
            .filter(|e| e.ability == ability && e.is_active())
            .map(|e| e.bonus)
            .sum()
    }

    pub fn score_for(&self, ability: Ability) -> i32 {
        self.scores.get(ability) + self.effect_bonus(ability)
    }

    pub fn modifier_for(&self, ability: Ability) -> i32 {
        modifier_for_score(self.score_for(ability))
    }
}

/// Proficiency bonus by character level.
pub fn proficiency_bonus(level: u32) -> i32 {
    match level {
        0..=4 => 2,
        5..=8 => 3,
        9..=12 => 4,
        13..=16 => 5,
        _ => 6,
    }
}

// ============================================================================
// Skills
// ============================================================================

/// Skills a character can be trained in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Skill {
    Athletics,
    Acrobatics,
    SleightOfHand,
    Stealth,
    Arcana,
    History,
    Investigation,
    Nature,
    Religion,
    AnimalHandling,
    Insight,
    Medicine,
    Perception,
    Survival,
    Deception,
    Intimidation,
    Performance,
    Persuasion,
}

impl Skill {
    pub fn ability(&self) -> Ability {
        match self {
            Skill::Athletics => Ability::Strength,
            Skill::Acrobatics | Skill::SleightOfHand | Skill::Stealth => Ability::Dexterity,
            Skill::Arcana
            | Skill::History
            | Skill::Investigation
            | Skill::Nature
            | Skill::Religion => Ability::Intelligence,
            Skill::AnimalHandling
            | Skill::Insight
            | Skill::Medicine
            | Skill::Perception
            | Skill::Survival => Ability::Wisdom,
            Skill::Deception | Skill::Intimidation | Skill::Performance | Skill::Persuasion => {
                Ability::Charisma
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Skill::Athletics => "Athletics",
            Skill::Acrobatics => "Acrobatics",
            Skill::SleightOfHand => "Sleight of Hand",
            Skill::Stealth => "Stealth",
            Skill::Arcana => "Arcana",
            Skill::History => "History",
            Skill::Investigation => "Investigation",
            Skill::Nature => "Nature",
            Skill::Religion => "Religion",
            Skill::AnimalHandling => "Animal Handling",
            Skill::Insight => "Insight",
            Skill::Medicine => "Medicine",
            Skill::Perception => "Perception",
            Skill::Survival => "Survival",
            Skill::Deception => "Deception",
            Skill::Intimidation => "Intimidation",
            Skill::Performance => "Performance",
            Skill::Persuasion => "Persuasion",
        }
    }
}

impl fmt::Display for Skill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Proficiency level for skills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProficiencyLevel {
    #[default]
    None,
    Half,
    Proficient,
    Expertise,
}

impl ProficiencyLevel {
    pub fn bonus(&self, proficiency_bonus: i32) -> i32 {
        match self {
            ProficiencyLevel::None => 0,
            ProficiencyLevel::Half => proficiency_bonus / 2,
            ProficiencyLevel::Proficient => proficiency_bonus,
            ProficiencyLevel::Expertise => proficiency_bonus * 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ability_modifier() {
        let scores = AbilityScores::new(16, 14, 12, 10, 8, 6);
        assert_eq!(scores.modifier(Ability::Strength), 3);
        assert_eq!(scores.modifier(Ability::Dexterity), 2);
        assert_eq!(scores.modifier(Ability::Constitution), 1);
        assert_eq!(scores.modifier(Ability::Intelligence), 0);
        assert_eq!(scores.modifier(Ability::Wisdom), -1);
        assert_eq!(scores.modifier(Ability::Charisma), -2);

        // Odd scores below 10 round toward negative infinity
        let odd = AbilityScores::new(9, 7, 5, 11, 13, 15);
        assert_eq!(odd.modifier(Ability::Strength), -1);
        assert_eq!(odd.modifier(Ability::Dexterity), -2);
        assert_eq!(odd.modifier(Ability::Constitution), -3);
        assert_eq!(odd.modifier(Ability::Intelligence), 0);
        assert_eq!(odd.modifier(Ability::Wisdom), 1);
        assert_eq!(odd.modifier(Ability::Charisma), 2);
    }

    #[test]
    fn test_missing_scores_default_to_ten() {
        let scores: AbilityScores = serde_json::from_str(r#"{"strength": 14}"#).unwrap();
        assert_eq!(scores.strength, 14);
        assert_eq!(scores.wisdom, 10);
        assert_eq!(scores.modifier(Ability::Wisdom), 0);
    }

    #[test]
    fn test_effects_raise_score_without_mutating_base() {
        let scores = AbilityScores::new(10, 12, 10, 10, 10, 10);
        let effects = vec![
            ActiveEffect::new("Potion of Grace", Ability::Dexterity, 4).with_duration(3),
            ActiveEffect::new("Blessing", Ability::Dexterity, 1),
            ActiveEffect::new("Bull's Draught", Ability::Strength, 2),
        ];
        let model = AbilityModel::new(&scores, &effects);

        assert_eq!(model.score_for(Ability::Dexterity), 17);
        assert_eq!(model.modifier_for(Ability::Dexterity), 3);
        assert_eq!(model.score_for(Ability::Wisdom), 10);
        assert_eq!(scores.dexterity, 12);
    }

    #[test]
    fn test_tick_effects_expires() {
        let mut effects = vec![
            ActiveEffect::new("Short", Ability::Strength, 2).with_duration(1),
            ActiveEffect::new("Long", Ability::Strength, 1).with_duration(3),
            ActiveEffect::new("Permanent", Ability::Wisdom, 1),
        ];

        let expired = tick_effects(&mut effects);
        assert_eq!(expired, vec!["Short".to_string()]);
        assert_eq!(effects.len(), 2);
        assert_eq!(effects[0].remaining_rounds, Some(2));
    }

    #[test]
    fn test_proficiency_bonus() {
        assert_eq!(proficiency_bonus(1), 2);
        assert_eq!(proficiency_bonus(5), 3);
        assert_eq!(proficiency_bonus(12), 4);
        assert_eq!(proficiency_bonus(17), 6);
        assert_eq!(proficiency_bonus(20), 6);
    }

    #[test]
    fn test_proficiency_levels() {
        assert_eq!(ProficiencyLevel::None.bonus(3), 0);
        assert_eq!(ProficiencyLevel::Half.bonus(3), 1);
        assert_eq!(ProficiencyLevel::Proficient.bonus(3), 3);
        assert_eq!(ProficiencyLevel::Expertise.bonus(3), 6);
    }

    #[test]
    fn test_ability_from_str() {
        assert_eq!("DEX".parse::<Ability>(), Ok(Ability::Dexterity));
        assert_eq!("wisdom".parse::<Ability>(), Ok(Ability::Wisdom));
        assert!("luck".parse::<Ability>().is_err());
    }
}
