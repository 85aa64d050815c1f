//! Built-in monster templates.

use crate::ability::AbilityScores;
use crate::combat::MonsterTemplate;
use crate::items::DamageType;

/// Look up a built-in monster by id.
pub fn get_monster(id: &str) -> Option<MonsterTemplate> {
    MONSTERS.iter().find(|m| m.id == id).cloned()
}

/// Look up a built-in monster by display name, ignoring case.
pub fn find_monster(name: &str) -> Option<MonsterTemplate> {
    let name_lower = name.to_lowercase();
    MONSTERS
        .iter()
        .find(|m| m.name.to_lowercase() == name_lower)
        .cloned()
}

/// Parse a JSON array of monster templates, rejecting invalid ones.
pub fn load_monsters(json: &str) -> Result<Vec<MonsterTemplate>, String> {
    let monsters: Vec<MonsterTemplate> =
        serde_json::from_str(json).map_err(|e| format!("Invalid monster data: {e}"))?;
    for monster in &monsters {
        monster.validate().map_err(|e| e.to_string())?;
    }
    Ok(monsters)
}

lazy_static::lazy_static! {
    pub static ref MONSTERS: Vec<MonsterTemplate> = vec![
        MonsterTemplate::new("giant_rat", "Giant Rat", 7, 12)
            .with_attributes(AbilityScores::new(7, 15, 11, 2, 10, 4))
            .with_attack("Bite", 4, "1d4+2", DamageType::Piercing)
            .with_experience(25),
        MonsterTemplate::new("goblin", "Goblin", 7, 15)
            .with_attributes(AbilityScores::new(8, 14, 10, 10, 8, 8))
            .with_attack("Scimitar", 4, "1d6+2", DamageType::Slashing)
            .with_experience(50),
        MonsterTemplate::new("wolf", "Wolf", 11, 13)
            .with_attributes(AbilityScores::new(12, 15, 12, 3, 12, 6))
            .with_attack("Bite", 4, "2d4+2", DamageType::Piercing)
            .with_experience(50),
        MonsterTemplate::new("skeleton", "Skeleton", 13, 13)
            .with_attributes(AbilityScores::new(10, 14, 15, 6, 8, 5))
            .with_attack("Shortsword", 4, "1d6+2", DamageType::Piercing)
            .with_resistance(DamageType::Piercing)
            .with_experience(50),
        MonsterTemplate::new("fire_imp", "Fire Imp", 10, 13)
            .with_attributes(AbilityScores::new(6, 17, 13, 11, 12, 14))
            .with_attack("Ember Claw", 5, "1d4+3", DamageType::Fire)
            .with_resistance(DamageType::Fire)
            .with_experience(100),
        MonsterTemplate::new("stone_golem", "Stone Golem", 30, 17)
            .with_attributes(AbilityScores::new(19, 9, 18, 3, 11, 1))
            .with_attack("Slam", 6, "2d8+4", DamageType::Bludgeoning)
            .with_resistance(DamageType::Physical)
            .with_experience(450),
        MonsterTemplate::new("training_dummy", "Training Dummy", 20, 10)
            .with_attributes(AbilityScores::new(10, 1, 10, 1, 1, 1)),
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_monsters_are_valid() {
        for monster in MONSTERS.iter() {
            assert!(monster.validate().is_ok(), "{} is invalid", monster.id);
        }
    }

    #[test]
    fn test_lookup() {
        assert_eq!(get_monster("goblin").unwrap().name, "Goblin");
        assert_eq!(find_monster("fire imp").unwrap().id, "fire_imp");
        assert!(get_monster("tarrasque").is_none());
    }

    #[test]
    fn test_load_monsters_rejects_invalid() {
        let json = r#"[{"id": "wisp", "name": "Wisp", "hit_points": -3, "armor_class": 12}]"#;
        assert!(load_monsters(json).is_err());

        let json = r#"[{"id": "wisp", "name": "Wisp", "hit_points": 3, "armor_class": 12}]"#;
        assert_eq!(load_monsters(json).unwrap()[0].experience, 0);
    }
}
