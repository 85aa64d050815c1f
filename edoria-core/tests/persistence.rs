//! Save and load round trips through the filesystem.

use edoria_core::ability::{Ability, ActiveEffect};
use edoria_core::character::create_sample_adventurer;
use edoria_core::config::Settings;
use edoria_core::equipment::EquipSlot;
use edoria_core::persist::{list_player_saves, player_save_path, PersistError, SavedPlayer};
use edoria_core::session::{GameSession, SessionConfig, SessionError};
use edoria_core::state::GameState;
use edoria_core::testing::ScriptedDice;
use tempfile::TempDir;

fn session() -> GameSession {
    let state = GameState::new(create_sample_adventurer("Rook"), Settings::instant())
        .with_dice(ScriptedDice::new(Vec::new()));
    GameSession::from_state(state)
}

#[tokio::test]
async fn test_session_save_and_load_is_lossless() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = player_save_path(dir.path(), "Rook");

    let mut session = session();
    session.equip("leather_armor", None).unwrap();
    session.equip("ring_of_wit", None).unwrap();
    session.award_experience(120, "tutorial").unwrap();
    session
        .state_mut()
        .player
        .add_effect(ActiveEffect::new("Blessing", Ability::Wisdom, 1).with_duration(2));
    session.state_mut().player.stats.health = 9;
    let expected = session.player().clone();

    session.save(&path).await.expect("Save should succeed");

    let mut restored = GameSession::new(SessionConfig::new("Someone"));
    restored.load(&path).await.expect("Load should succeed");
    assert_eq!(restored.player(), &expected);
    assert_eq!(
        restored.player().equipment.get(EquipSlot::Finger1),
        Some("ring_of_wit")
    );
    assert_eq!(restored.player().stats.health, 9);
    assert_eq!(restored.player().progress.history.len(), 1);
}

#[tokio::test]
async fn test_load_refused_in_combat() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = player_save_path(dir.path(), "Rook");

    let mut session = session();
    session.save(&path).await.unwrap();
    session.start_combat(&["goblin"]).unwrap();

    assert!(session.load(&path).await.is_err());
    assert!(session.in_combat());
}

#[tokio::test]
async fn test_load_missing_file_reports_error() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let mut session = session();

    let result = session.load(dir.path().join("nobody.json")).await;
    assert!(matches!(result, Err(SessionError::Persist(PersistError::Io(_)))));
    let last = session.state().messages.last().unwrap();
    assert!(last.message.starts_with("Failed to load save"));
}

#[tokio::test]
async fn test_list_saves_reads_metadata() {
    let dir = TempDir::new().expect("Failed to create temp dir");

    let mut veteran = create_sample_adventurer("Veteran");
    veteran.progress.experience = 900;
    veteran.progress.level = 3;
    for player in [veteran, create_sample_adventurer("Apprentice")] {
        SavedPlayer::new(player.clone())
            .save_json(player_save_path(dir.path(), &player.name))
            .await
            .unwrap();
    }

    let saves = list_player_saves(dir.path()).await.unwrap();
    assert_eq!(saves.len(), 2);
    assert_eq!(saves[0].metadata.player_name, "Apprentice");
    assert_eq!(saves[1].metadata.level, 3);
    assert_eq!(saves[1].metadata.experience, 900);
}

#[test]
fn test_legacy_inventory_entries_load() {
    let mut saved = SavedPlayer::new(create_sample_adventurer("Rook"));
    saved.player.inventory = Default::default();
    let mut json: serde_json::Value = serde_json::to_value(&saved).unwrap();
    json["player"]["inventory"] = serde_json::json!([
        "rope",
        {"id": "health_potion", "quantity": 2},
        "rope"
    ]);

    let loaded = SavedPlayer::from_json(&json.to_string()).unwrap();
    assert_eq!(loaded.player.inventory.count("rope"), 2);
    assert_eq!(loaded.player.inventory.count("health_potion"), 2);
}
