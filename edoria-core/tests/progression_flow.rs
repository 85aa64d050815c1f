//! Experience and level-up tests through the session API.

use edoria_core::ability::{Ability, AbilityScores};
use edoria_core::character::{create_sample_adventurer, Player};
use edoria_core::config::Settings;
use edoria_core::progression::{
    AbilityImprovement, LevelResolution, ProgressionEngine, ProgressionError, HISTORY_LIMIT,
};
use edoria_core::session::{GameSession, SessionError};
use edoria_core::state::GameState;
use edoria_core::testing::ScriptedDice;

fn session_with(player: Player, rolls: Vec<u32>) -> GameSession {
    let state = GameState::new(player, Settings::instant()).with_dice(ScriptedDice::new(rolls));
    GameSession::from_state(state)
}

#[test]
fn test_multi_level_up_with_improvement() {
    let mut session = session_with(create_sample_adventurer("Rook"), vec![7]);
    assert_eq!(session.player().stats.max_health, 22);

    session.award_experience(2700, "quest").unwrap();
    assert_eq!(session.player().level(), 1);

    let plan = session.check_for_level_up().unwrap();
    assert_eq!((plan.from_level, plan.to_level), (1, 4));
    let gated: Vec<bool> = plan.levels.iter().map(|l| l.ability_improvement).collect();
    assert_eq!(gated, vec![false, false, true]);
    assert!(plan.levels.iter().all(|l| l.average_hit_points == 6));

    let resolutions = [
        LevelResolution::average(),
        LevelResolution::rolled(),
        LevelResolution::average().with_improvement(AbilityImprovement::Single(Ability::Constitution)),
    ];
    let summary = session.apply_level_up(&plan, &resolutions).unwrap();

    assert_eq!(summary.hit_points_gained, 6 + 7 + 6);
    assert_eq!(summary.ability_increases, vec![(Ability::Constitution, 2)]);
    let player = session.player();
    assert_eq!(player.level(), 4);
    assert_eq!(player.abilities.get(Ability::Constitution), 16);
    // 20 + con 3 * level 4 + 19
    assert_eq!(player.stats.max_health, 51);
    assert_eq!(player.stats.health, 51);
    assert_eq!(summary.max_health_increase, 29);
}

#[test]
fn test_level_up_mid_fight_reaches_combatant() {
    let mut session = session_with(create_sample_adventurer("Rook"), Vec::new());
    session.award_experience(300, "quest").unwrap();
    session.start_combat(&["goblin"]).unwrap();

    let plan = session.check_for_level_up().unwrap();
    session
        .apply_level_up(&plan, &[LevelResolution::average()])
        .unwrap();

    // 20 + con 2 * level 2 + 6
    assert_eq!(session.player().stats.max_health, 30);
    let combatant = session.state().combat.as_ref().unwrap().player().unwrap();
    assert_eq!(combatant.max_hit_points, 30);
    assert_eq!(combatant.current_hit_points, 30);
}

#[test]
fn test_level_up_is_idempotent() {
    let mut session = session_with(create_sample_adventurer("Rook"), Vec::new());
    session.award_experience(300, "combat").unwrap();
    let plan = session.check_for_level_up().unwrap();
    // Checking again is pure.
    assert_eq!(session.check_for_level_up(), Some(plan.clone()));

    session
        .apply_level_up(&plan, &[LevelResolution::average()])
        .unwrap();
    let after = session.player().clone();

    assert!(session.check_for_level_up().is_none());
    assert!(matches!(
        session.apply_level_up(&plan, &[LevelResolution::average()]),
        Err(SessionError::Progression(ProgressionError::NoLevelUpPending))
    ));
    assert_eq!(session.player(), &after);
    assert_eq!(after.level(), 2);
}

#[test]
fn test_stale_plan_is_rejected() {
    let mut session = session_with(create_sample_adventurer("Rook"), Vec::new());
    session.award_experience(300, "combat").unwrap();
    let stale = session.check_for_level_up().unwrap();

    session.award_experience(600, "combat").unwrap();
    assert!(matches!(
        session.apply_level_up(&stale, &[LevelResolution::average()]),
        Err(SessionError::Progression(ProgressionError::StalePlan))
    ));
    assert_eq!(session.player().level(), 1);
    assert_eq!(session.check_for_level_up().unwrap().to_level, 3);
}

#[test]
fn test_resolution_validation() {
    let mut session = session_with(create_sample_adventurer("Rook"), Vec::new());
    session.award_experience(2700, "quest").unwrap();
    let plan = session.check_for_level_up().unwrap();

    assert!(matches!(
        session.apply_level_up(&plan, &[LevelResolution::average()]),
        Err(SessionError::Progression(ProgressionError::ResolutionCountMismatch {
            expected: 3,
            found: 1
        }))
    ));
    assert!(matches!(
        session.apply_level_up(&plan, &[LevelResolution::average(); 3]),
        Err(SessionError::Progression(ProgressionError::MissingImprovement(4)))
    ));

    let split = AbilityImprovement::Split(Ability::Wisdom, Ability::Wisdom);
    let resolutions = [
        LevelResolution::average(),
        LevelResolution::average(),
        LevelResolution::average().with_improvement(split),
    ];
    assert!(matches!(
        session.apply_level_up(&plan, &resolutions),
        Err(SessionError::Progression(ProgressionError::DuplicateAbility(Ability::Wisdom)))
    ));
    assert_eq!(session.player().level(), 1);
}

#[test]
fn test_improvement_caps_at_twenty() {
    let player = Player::new("Brute", AbilityScores::new(19, 10, 10, 10, 10, 10));
    let mut session = session_with(player, Vec::new());
    session.award_experience(2700, "quest").unwrap();
    let plan = session.check_for_level_up().unwrap();

    let resolutions = [
        LevelResolution::average(),
        LevelResolution::average(),
        LevelResolution::average().with_improvement(AbilityImprovement::Single(Ability::Strength)),
    ];
    let summary = session.apply_level_up(&plan, &resolutions).unwrap();
    assert_eq!(session.player().abilities.get(Ability::Strength), 20);
    assert_eq!(summary.ability_increases, vec![(Ability::Strength, 1)]);
}

#[test]
fn test_experience_history_is_bounded() {
    let mut session = session_with(create_sample_adventurer("Rook"), Vec::new());
    for i in 0..(HISTORY_LIMIT as u32 + 10) {
        session.award_experience(1, &format!("kill {i}")).unwrap();
    }
    let progress = &session.player().progress;
    assert_eq!(progress.history.len(), HISTORY_LIMIT);
    assert_eq!(progress.history.back().unwrap().source, "kill 59");
    assert_eq!(progress.history.back().unwrap().total, 60);
}

#[test]
fn test_zero_award_is_rejected() {
    let mut state = GameState::new(create_sample_adventurer("Rook"), Settings::instant());
    assert_eq!(
        ProgressionEngine::award_experience(&mut state, 0, "nothing").unwrap_err(),
        ProgressionError::InvalidAmount
    );
    assert_eq!(state.player.progress.experience, 0);
    assert!(state.player.progress.history.is_empty());
}
