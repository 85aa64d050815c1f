//! Skill checks, saving throws and attack rolls.

use crate::ability::{proficiency_bonus, Ability, ProficiencyLevel, Skill};
use crate::character::Player;
use crate::dice::{Advantage, DiceEngine, Pending, RollResult};
use serde::{Deserialize, Serialize};

/// How a check modifier was built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckBreakdown {
    pub ability: Ability,
    pub ability_modifier: i32,
    pub proficiency_level: ProficiencyLevel,
    pub proficiency_bonus: i32,
}

impl CheckBreakdown {
    pub fn total_modifier(&self) -> i32 {
        self.ability_modifier + self.proficiency_bonus
    }
}

/// A revealed skill check or saving throw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub roll: RollResult,
    pub breakdown: CheckBreakdown,
}

impl CheckOutcome {
    /// Total against DC; natural 20s and 1s don't change this.
    pub fn success(&self) -> bool {
        self.roll.succeeded()
    }
}

/// A revealed attack roll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackRoll {
    pub roll: RollResult,
    pub target_ac: i32,
    pub hit: bool,
    pub critical: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CheckResolver;

impl CheckResolver {
    /// d20 + ability modifier + proficiency scaled by the skill's level.
    pub fn skill_check(
        player: &Player,
        dice: &mut DiceEngine,
        skill: Skill,
        dc: i32,
        advantage: Advantage,
    ) -> Pending<CheckOutcome> {
        let ability = skill.ability();
        let level = player.skill_proficiency(skill);
        let breakdown = CheckBreakdown {
            ability,
            ability_modifier: player.modifier(ability),
            proficiency_level: level,
            proficiency_bonus: level.bonus(proficiency_bonus(player.level())),
        };

        dice.roll_checked(
            20,
            breakdown.total_modifier(),
            format!("{} check", skill.name()),
            Some(dc),
            advantage,
        )
        .map(|roll| CheckOutcome { roll, breakdown })
    }

    /// d20 + ability modifier, plus proficiency when proficient in the save.
    pub fn saving_throw(
        player: &Player,
        dice: &mut DiceEngine,
        ability: Ability,
        dc: i32,
        advantage: Advantage,
    ) -> Pending<CheckOutcome> {
        let level = if player.is_proficient_save(ability) {
            ProficiencyLevel::Proficient
        } else {
            ProficiencyLevel::None
        };
        let breakdown = CheckBreakdown {
            ability,
            ability_modifier: player.modifier(ability),
            proficiency_level: level,
            proficiency_bonus: level.bonus(proficiency_bonus(player.level())),
        };

        dice.roll_checked(
            20,
            breakdown.total_modifier(),
            format!("{} saving throw", ability.name()),
            Some(dc),
            advantage,
        )
        .map(|roll| CheckOutcome { roll, breakdown })
    }

    /// Attack against armor class. A natural 20 always hits and is critical;
    /// a natural 1 always misses.
    pub fn attack_roll(
        dice: &mut DiceEngine,
        attacker_modifier: i32,
        target_ac: i32,
        advantage: Advantage,
        label: impl Into<String>,
    ) -> Pending<AttackRoll> {
        dice.roll_attack(attacker_modifier, target_ac, label, advantage)
            .map(|roll| AttackRoll {
                hit: roll.succeeded(),
                critical: roll.critical,
                roll,
                target_ac,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ability::AbilityScores;
    use crate::config::Settings;
    use crate::testing::{RecordingObserver, ScriptedDice};

    fn dice(rolls: &[u32]) -> DiceEngine {
        DiceEngine::new(ScriptedDice::new(rolls.to_vec()), &Settings::instant())
    }

    fn rogue() -> Player {
        Player::new("Vex", AbilityScores::new(10, 16, 10, 10, 14, 10))
            .with_skill(Skill::Stealth, ProficiencyLevel::Expertise)
            .with_skill(Skill::Insight, ProficiencyLevel::Half)
            .with_saving_throw(Ability::Dexterity)
    }

    #[test]
    fn test_skill_check_expertise() {
        let player = rogue();
        let mut dice = dice(&[10]);
        let outcome =
            CheckResolver::skill_check(&player, &mut dice, Skill::Stealth, 17, Advantage::Normal)
                .reveal_now();

        // dex +3, expertise 2 * 2
        assert_eq!(outcome.breakdown.total_modifier(), 7);
        assert_eq!(outcome.roll.total, 17);
        assert!(outcome.success());
    }

    #[test]
    fn test_skill_check_half_proficiency() {
        let player = rogue();
        let mut dice = dice(&[5]);
        let outcome =
            CheckResolver::skill_check(&player, &mut dice, Skill::Insight, 10, Advantage::Normal)
                .reveal_now();
        // wis +2, half of 2
        assert_eq!(outcome.roll.total, 8);
        assert!(!outcome.success());
    }

    #[test]
    fn test_natural_twenty_does_not_rescue_skill_check() {
        let player = Player::new("Dull", AbilityScores::new(10, 10, 10, 4, 10, 10));
        let mut dice = dice(&[20]);
        let outcome =
            CheckResolver::skill_check(&player, &mut dice, Skill::Arcana, 25, Advantage::Normal)
                .reveal_now();
        assert!(outcome.roll.critical);
        assert!(!outcome.success());
    }

    #[test]
    fn test_saving_throw_proficiency() {
        let player = rogue();
        let mut dice = dice(&[8, 8]);

        let dex = CheckResolver::saving_throw(&player, &mut dice, Ability::Dexterity, 13, Advantage::Normal)
            .reveal_now();
        assert_eq!(dex.roll.total, 13);
        assert!(dex.success());

        let con = CheckResolver::saving_throw(&player, &mut dice, Ability::Constitution, 13, Advantage::Normal)
            .reveal_now();
        assert_eq!(con.roll.total, 8);
        assert!(!con.success());
    }

    #[test]
    fn test_attack_natural_results_override_total() {
        let mut dice = dice(&[20, 1, 12]);

        let crit = CheckResolver::attack_roll(&mut dice, 0, 30, Advantage::Normal, "Attack")
            .reveal_now();
        assert!(crit.hit && crit.critical);

        let fumble = CheckResolver::attack_roll(&mut dice, 15, 10, Advantage::Normal, "Attack")
            .reveal_now();
        assert!(!fumble.hit);
        assert_eq!(fumble.roll.success, Some(false));

        let plain = CheckResolver::attack_roll(&mut dice, 3, 15, Advantage::Normal, "Attack")
            .reveal_now();
        assert!(plain.hit && !plain.critical);
    }

    #[test]
    fn test_observer_sees_final_attack_verdict() {
        let observer = RecordingObserver::new();
        let mut dice = dice(&[1, 20]).with_observer(Box::new(observer.clone()));

        let fumble = CheckResolver::attack_roll(&mut dice, 15, 10, Advantage::Normal, "Attack")
            .reveal_now();
        let crit = CheckResolver::attack_roll(&mut dice, -5, 30, Advantage::Normal, "Attack")
            .reveal_now();

        let seen = observer.results();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].success, Some(false));
        assert_eq!(seen[0], fumble.roll);
        assert_eq!(seen[1].success, Some(true));
        assert!(crit.hit);
    }

    #[test]
    fn test_attack_with_advantage_keeps_higher() {
        let mut dice = dice(&[3, 14]);
        let attack = CheckResolver::attack_roll(&mut dice, 2, 15, Advantage::Advantage, "Attack")
            .reveal_now();
        assert_eq!(attack.roll.roll, 14);
        assert_eq!(attack.roll.rolls, vec![3, 14]);
        assert!(attack.hit);
    }
}
