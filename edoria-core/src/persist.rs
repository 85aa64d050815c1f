//! Player save files.
//!
//! The player record round-trips through JSON without loss. Saves carry a
//! format version and a small metadata block that can be read without
//! deserializing the whole player.

use crate::character::Player;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info};

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

/// Current save file version.
pub const SAVE_VERSION: u32 = 1;

/// Summary shown in save lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveMetadata {
    pub player_name: String,
    pub level: u32,
    pub experience: u32,
    /// Unix seconds, as a string.
    pub saved_at: String,
}

/// A saved player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedPlayer {
    pub version: u32,
    pub saved_at: String,
    pub player: Player,
    pub metadata: SaveMetadata,
}

impl SavedPlayer {
    pub fn new(player: Player) -> Self {
        let saved_at = unix_timestamp();
        let metadata = SaveMetadata {
            player_name: player.name.clone(),
            level: player.level(),
            experience: player.progress.experience,
            saved_at: saved_at.clone(),
        };
        Self {
            version: SAVE_VERSION,
            saved_at,
            player,
            metadata,
        }
    }

    pub fn to_json(&self) -> Result<String, PersistError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(content: &str) -> Result<Self, PersistError> {
        let saved: Self = serde_json::from_str(content)?;
        check_version(saved.version)?;
        Ok(saved)
    }

    /// Save to a JSON file.
    pub async fn save_json(&self, path: impl AsRef<Path>) -> Result<(), PersistError> {
        let path = path.as_ref();
        fs::write(path, self.to_json()?).await?;
        info!(path = %path.display(), player = %self.player.name, "Player saved");
        Ok(())
    }

    /// Load from a JSON file.
    pub async fn load_json(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).await?;
        let saved = Self::from_json(&content)?;
        info!(path = %path.display(), player = %saved.player.name, "Player loaded");
        Ok(saved)
    }

    /// Read only the metadata block of a save file.
    pub async fn peek_metadata(path: impl AsRef<Path>) -> Result<SaveMetadata, PersistError> {
        let content = fs::read_to_string(path).await?;

        #[derive(Deserialize)]
        struct Partial {
            version: u32,
            metadata: SaveMetadata,
        }

        let partial: Partial = serde_json::from_str(&content)?;
        check_version(partial.version)?;
        Ok(partial.metadata)
    }
}

fn check_version(found: u32) -> Result<(), PersistError> {
    if found != SAVE_VERSION {
        return Err(PersistError::VersionMismatch {
            expected: SAVE_VERSION,
            found,
        });
    }
    Ok(())
}

fn unix_timestamp() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
        .to_string()
}

/// A save file found on disk.
#[derive(Debug, Clone)]
pub struct SaveInfo {
    pub path: PathBuf,
    pub metadata: SaveMetadata,
}

/// Every readable player save in `dir`, sorted by player name.
pub async fn list_player_saves(dir: impl AsRef<Path>) -> Result<Vec<SaveInfo>, PersistError> {
    let mut saves = Vec::new();
    let mut entries = fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().map(|e| e == "json").unwrap_or(false) {
            match SavedPlayer::peek_metadata(&path).await {
                Ok(metadata) => saves.push(SaveInfo { path, metadata }),
                Err(err) => debug!(path = %path.display(), error = %err, "Skipping unreadable save"),
            }
        }
    }

    saves.sort_by(|a, b| a.metadata.player_name.cmp(&b.metadata.player_name));
    Ok(saves)
}

/// File path for a player's save.
pub fn player_save_path(dir: impl AsRef<Path>, name: &str) -> PathBuf {
    let sanitized = name
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect::<String>()
        .to_lowercase();
    dir.as_ref().join(format!("{sanitized}.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::create_sample_adventurer;
    use tempfile::TempDir;

    #[test]
    fn test_saved_player_metadata() {
        let saved = SavedPlayer::new(create_sample_adventurer("Rook"));
        assert_eq!(saved.version, SAVE_VERSION);
        assert_eq!(saved.metadata.player_name, "Rook");
        assert_eq!(saved.metadata.level, 1);
        assert!(saved.saved_at.parse::<u64>().is_ok());
    }

    #[test]
    fn test_player_save_path() {
        let path = player_save_path("/saves", "Sir Rook the 3rd!");
        assert_eq!(path, PathBuf::from("/saves/sir_rook_the_3rd_.json"));
    }

    #[test]
    fn test_version_mismatch() {
        let mut saved = SavedPlayer::new(create_sample_adventurer("Rook"));
        saved.version = 99;
        let json = serde_json::to_string(&saved).unwrap();
        assert!(matches!(
            SavedPlayer::from_json(&json),
            Err(PersistError::VersionMismatch {
                expected: 1,
                found: 99
            })
        ));
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = player_save_path(dir.path(), "Rook");

        let saved = SavedPlayer::new(create_sample_adventurer("Rook"));
        saved.save_json(&path).await.expect("Save should succeed");

        let loaded = SavedPlayer::load_json(&path).await.expect("Load should succeed");
        assert_eq!(loaded, saved);
    }

    #[tokio::test]
    async fn test_list_player_saves() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        for name in ["Wren", "Ash"] {
            SavedPlayer::new(create_sample_adventurer(name))
                .save_json(player_save_path(dir.path(), name))
                .await
                .unwrap();
        }
        tokio::fs::write(dir.path().join("notes.json"), "not a save")
            .await
            .unwrap();
        tokio::fs::write(dir.path().join("readme.txt"), "ignored")
            .await
            .unwrap();

        let saves = list_player_saves(dir.path()).await.unwrap();
        let names: Vec<_> = saves.iter().map(|s| s.metadata.player_name.as_str()).collect();
        assert_eq!(names, vec!["Ash", "Wren"]);
    }
}
