//! Equipment slots and derived-stat recalculation.
//!
//! Every equip and unequip goes through [`EquipmentResolver`], which keeps
//! three things consistent: the slot map, the inventory, and the player's
//! derived stats. The reported stat delta is measured by snapshotting the
//! player before the change and diffing after the recalculation, so it
//! always reflects what actually happened.

use crate::ability::{Ability, AbilityScores};
use crate::character::Player;
use crate::items::{Item, ItemCatalog, ItemSlot};
use crate::notify::Severity;
use crate::state::GameState;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, warn};

const UNARMORED_AC: i32 = 10;
const BASE_HEALTH: i32 = 20;
const BASE_MANA: i32 = 10;
const BASE_CARRY_CAPACITY: i32 = 150;
const CARRY_PER_STRENGTH_MOD: i32 = 15;

// ============================================================================
// Slots
// ============================================================================

/// A concrete slot on the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EquipSlot {
    Head,
    Neck,
    Chest,
    Hands,
    Legs,
    Feet,
    #[serde(alias = "mainHand", alias = "main_hand")]
    MainHand,
    #[serde(alias = "offHand", alias = "off_hand")]
    OffHand,
    Finger1,
    Finger2,
}

impl EquipSlot {
    pub fn all() -> [EquipSlot; 10] {
        [
            EquipSlot::Head,
            EquipSlot::Neck,
            EquipSlot::Chest,
            EquipSlot::Hands,
            EquipSlot::Legs,
            EquipSlot::Feet,
            EquipSlot::MainHand,
            EquipSlot::OffHand,
            EquipSlot::Finger1,
            EquipSlot::Finger2,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            EquipSlot::Head => "head",
            EquipSlot::Neck => "neck",
            EquipSlot::Chest => "chest",
            EquipSlot::Hands => "hands",
            EquipSlot::Legs => "legs",
            EquipSlot::Feet => "feet",
            EquipSlot::MainHand => "mainhand",
            EquipSlot::OffHand => "offhand",
            EquipSlot::Finger1 => "finger1",
            EquipSlot::Finger2 => "finger2",
        }
    }

    pub fn is_finger(&self) -> bool {
        matches!(self, EquipSlot::Finger1 | EquipSlot::Finger2)
    }

    /// Whether an item declaring `item_slot` may go here.
    pub fn accepts(&self, item_slot: ItemSlot) -> bool {
        match item_slot {
            ItemSlot::Ring => self.is_finger(),
            other => Some(*self) == Self::for_item_slot(other),
        }
    }

    /// The natural slot for a non-ring item.
    fn for_item_slot(item_slot: ItemSlot) -> Option<EquipSlot> {
        match item_slot {
            ItemSlot::Head => Some(EquipSlot::Head),
            ItemSlot::Neck => Some(EquipSlot::Neck),
            ItemSlot::Chest => Some(EquipSlot::Chest),
            ItemSlot::Hands => Some(EquipSlot::Hands),
            ItemSlot::Legs => Some(EquipSlot::Legs),
            ItemSlot::Feet => Some(EquipSlot::Feet),
            ItemSlot::MainHand => Some(EquipSlot::MainHand),
            ItemSlot::OffHand => Some(EquipSlot::OffHand),
            ItemSlot::Ring => None,
        }
    }
}

impl fmt::Display for EquipSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for EquipSlot {
    type Err = EquipError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-' && *c != ' ')
            .collect::<String>()
            .to_lowercase();
        match key.as_str() {
            "head" => Ok(EquipSlot::Head),
            "neck" => Ok(EquipSlot::Neck),
            "chest" | "body" => Ok(EquipSlot::Chest),
            "hands" => Ok(EquipSlot::Hands),
            "legs" => Ok(EquipSlot::Legs),
            "feet" => Ok(EquipSlot::Feet),
            "mainhand" | "weapon" => Ok(EquipSlot::MainHand),
            "offhand" | "shield" => Ok(EquipSlot::OffHand),
            "finger1" | "ring1" => Ok(EquipSlot::Finger1),
            "finger2" | "ring2" => Ok(EquipSlot::Finger2),
            _ => Err(EquipError::UnknownSlot(s.to_string())),
        }
    }
}

/// Slot → item id. Empty slots are absent.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EquipmentSlots {
    slots: BTreeMap<EquipSlot, String>,
}

impl EquipmentSlots {
    pub fn get(&self, slot: EquipSlot) -> Option<&str> {
        self.slots.get(&slot).map(String::as_str)
    }

    pub fn is_empty_slot(&self, slot: EquipSlot) -> bool {
        !self.slots.contains_key(&slot)
    }

    /// Which slot, if any, holds `item_id`.
    pub fn slot_of(&self, item_id: &str) -> Option<EquipSlot> {
        self.slots
            .iter()
            .find(|(_, id)| id.as_str() == item_id)
            .map(|(slot, _)| *slot)
    }

    pub fn iter(&self) -> impl Iterator<Item = (EquipSlot, &str)> {
        self.slots.iter().map(|(slot, id)| (*slot, id.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn set(&mut self, slot: EquipSlot, item_id: &str) -> Option<String> {
        self.slots.insert(slot, item_id.to_string())
    }

    fn take(&mut self, slot: EquipSlot) -> Option<String> {
        self.slots.remove(&slot)
    }
}

// ============================================================================
// Errors & Reports
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EquipError {
    #[error("You don't have {0} in your inventory")]
    NotInInventory(String),

    #[error("Unknown item: {0}")]
    UnknownItem(String),

    #[error("Unknown equipment slot: {0}")]
    UnknownSlot(String),

    #[error("{0} can't be equipped")]
    NotEquippable(String),

    #[error("{item} doesn't fit in the {slot} slot")]
    SlotMismatch { item: String, slot: EquipSlot },

    #[error("{item} is already equipped in the {slot} slot")]
    AlreadyEquipped { item: String, slot: EquipSlot },

    #[error("Nothing is equipped in the {0} slot")]
    SlotEmpty(EquipSlot),
}

impl EquipError {
    pub fn severity(&self) -> Severity {
        Severity::Warning
    }
}

/// Which derived value moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatKind {
    Ability(Ability),
    ArmorClass,
    MaxHealth,
    MaxMana,
    CarryCapacity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatChange {
    pub stat: StatKind,
    pub delta: i32,
}

impl fmt::Display for StatChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.stat {
            StatKind::Ability(ability) => ability.abbreviation(),
            StatKind::ArmorClass => "AC",
            StatKind::MaxHealth => "Max HP",
            StatKind::MaxMana => "Max Mana",
            StatKind::CarryCapacity => "Carry",
        };
        write!(f, "{:+} {}", self.delta, label)
    }
}

/// Values compared before and after an equipment change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StatSnapshot {
    abilities: AbilityScores,
    armor_class: i32,
    max_health: i32,
    max_mana: i32,
    carry_capacity: i32,
}

impl StatSnapshot {
    fn of(player: &Player) -> Self {
        Self {
            abilities: player.effective_abilities,
            armor_class: player.stats.armor_class,
            max_health: player.stats.max_health,
            max_mana: player.stats.max_mana,
            carry_capacity: player.stats.carry_capacity,
        }
    }

    fn diff(&self, after: &StatSnapshot) -> Vec<StatChange> {
        let mut changes: Vec<StatChange> = Ability::all()
            .into_iter()
            .map(|ability| StatChange {
                stat: StatKind::Ability(ability),
                delta: after.abilities.get(ability) - self.abilities.get(ability),
            })
            .collect();
        changes.extend([
            StatChange {
                stat: StatKind::ArmorClass,
                delta: after.armor_class - self.armor_class,
            },
            StatChange {
                stat: StatKind::MaxHealth,
                delta: after.max_health - self.max_health,
            },
            StatChange {
                stat: StatKind::MaxMana,
                delta: after.max_mana - self.max_mana,
            },
            StatChange {
                stat: StatKind::CarryCapacity,
                delta: after.carry_capacity - self.carry_capacity,
            },
        ]);
        changes.retain(|c| c.delta != 0);
        changes
    }
}

/// Result of a successful equip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EquipReport {
    pub slot: EquipSlot,
    pub item_id: String,
    /// Item that was in the slot before, now back in the inventory.
    pub replaced: Option<String>,
    pub changes: Vec<StatChange>,
}

/// Result of a successful unequip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnequipReport {
    pub slot: EquipSlot,
    pub item_id: String,
    pub changes: Vec<StatChange>,
}

fn describe_changes(changes: &[StatChange]) -> String {
    if changes.is_empty() {
        return String::new();
    }
    let parts: Vec<String> = changes.iter().map(|c| c.to_string()).collect();
    format!(" ({})", parts.join(", "))
}

// ============================================================================
// Resolver
// ============================================================================

/// Applies equipment changes and recomputes derived stats.
#[derive(Debug, Clone, Copy, Default)]
pub struct EquipmentResolver;

impl EquipmentResolver {
    /// Equip one unit of `item_id`. Without a hint the slot comes from the
    /// item; rings fill finger1, then finger2, then replace finger1.
    pub fn equip(
        state: &mut GameState,
        item_id: &str,
        slot_hint: Option<&str>,
    ) -> Result<EquipReport, EquipError> {
        let result = Self::try_equip(&mut state.player, &state.catalog, item_id, slot_hint);
        match &result {
            Ok(report) => {
                state.sync_combatant();
                let name = state.catalog.name_of(item_id).to_string();
                let mut message = format!("Equipped {name}{}", describe_changes(&report.changes));
                if let Some(old) = &report.replaced {
                    message.push_str(&format!(", replacing {}", state.catalog.name_of(old)));
                }
                state.messages.push(message, Severity::Success);
            }
            Err(err) => state.messages.push(err.to_string(), err.severity()),
        }
        result
    }

    fn try_equip(
        player: &mut Player,
        catalog: &ItemCatalog,
        item_id: &str,
        slot_hint: Option<&str>,
    ) -> Result<EquipReport, EquipError> {
        let hinted = slot_hint.map(EquipSlot::from_str).transpose()?;

        if !player.inventory.contains(item_id) {
            return Err(EquipError::NotInInventory(item_id.to_string()));
        }
        let item = catalog
            .get(item_id)
            .ok_or_else(|| EquipError::UnknownItem(item_id.to_string()))?;
        let item_slot = item
            .slot
            .ok_or_else(|| EquipError::NotEquippable(item.name.clone()))?;

        let slot = match hinted {
            Some(slot) if slot.accepts(item_slot) => slot,
            Some(slot) => {
                return Err(EquipError::SlotMismatch {
                    item: item.name.clone(),
                    slot,
                })
            }
            None => Self::default_slot(&player.equipment, item_slot),
        };

        if let Some(existing) = player.equipment.slot_of(item_id) {
            return Err(EquipError::AlreadyEquipped {
                item: item.name.clone(),
                slot: existing,
            });
        }

        // Validation done; from here on every step succeeds.
        let before = StatSnapshot::of(player);

        let replaced = player.equipment.take(slot);
        if let Some(old) = &replaced {
            player.inventory.add(old, 1);
        }
        player
            .inventory
            .remove(item_id, 1)
            .map_err(|_| EquipError::NotInInventory(item_id.to_string()))?;
        player.equipment.set(slot, item_id);

        Self::recalculate(player, catalog);
        let changes = before.diff(&StatSnapshot::of(player));

        debug!(item = item_id, slot = %slot, replaced = ?replaced, "Equipped item");

        Ok(EquipReport {
            slot,
            item_id: item_id.to_string(),
            replaced,
            changes,
        })
    }

    fn default_slot(equipment: &EquipmentSlots, item_slot: ItemSlot) -> EquipSlot {
        match EquipSlot::for_item_slot(item_slot) {
            Some(slot) => slot,
            None if equipment.is_empty_slot(EquipSlot::Finger1) => EquipSlot::Finger1,
            None if equipment.is_empty_slot(EquipSlot::Finger2) => EquipSlot::Finger2,
            None => EquipSlot::Finger1,
        }
    }

    /// Unequip by slot name (aliases accepted).
    pub fn unequip(state: &mut GameState, slot_name: &str) -> Result<UnequipReport, EquipError> {
        match EquipSlot::from_str(slot_name) {
            Ok(slot) => Self::unequip_slot(state, slot),
            Err(err) => {
                state.messages.push(err.to_string(), err.severity());
                Err(err)
            }
        }
    }

    /// Clear `slot` and return its item to the inventory.
    pub fn unequip_slot(state: &mut GameState, slot: EquipSlot) -> Result<UnequipReport, EquipError> {
        let player = &mut state.player;
        let Some(item_id) = player.equipment.take(slot) else {
            let err = EquipError::SlotEmpty(slot);
            state.messages.push(err.to_string(), err.severity());
            return Err(err);
        };

        let before = StatSnapshot::of(player);
        player.inventory.add(&item_id, 1);
        Self::recalculate(player, &state.catalog);
        let changes = before.diff(&StatSnapshot::of(player));
        state.sync_combatant();

        debug!(item = %item_id, slot = %slot, "Unequipped item");
        let message = format!(
            "Unequipped {}{}",
            state.catalog.name_of(&item_id),
            describe_changes(&changes)
        );
        state.messages.push(message, Severity::Info);

        Ok(UnequipReport {
            slot,
            item_id,
            changes,
        })
    }

    /// Rebuild the working ability copy and every derived stat from base
    /// scores, level and equipped items, then clamp current health and mana
    /// down to their maximums.
    pub fn recalculate(player: &mut Player, catalog: &ItemCatalog) {
        let mut working = player.abilities;
        let mut body_armor: Option<&Item> = None;
        let mut extra_ac = 0;

        for (slot, id) in player.equipment.iter() {
            let Some(item) = catalog.get(id) else {
                warn!(item = id, slot = %slot, "Equipped item missing from catalog; skipping");
                continue;
            };
            for (ability, bonus) in &item.stat_bonus {
                working.add(*ability, *bonus);
            }
            if item.is_body_armor() {
                let better = body_armor
                    .map(|current| item.armor_class > current.armor_class)
                    .unwrap_or(true);
                if better {
                    if let Some(previous) = body_armor.replace(item) {
                        extra_ac += previous.armor_class.unwrap_or(0);
                    }
                } else {
                    extra_ac += item.armor_class.unwrap_or(0);
                }
            } else if let Some(ac) = item.armor_class {
                extra_ac += ac;
            }
        }

        player.effective_abilities = working;

        let dex_mod = working.modifier(Ability::Dexterity);
        let con_mod = working.modifier(Ability::Constitution);
        let int_mod = working.modifier(Ability::Intelligence);
        let str_mod = working.modifier(Ability::Strength);
        let level = player.progress.level.max(1) as i32;

        let base_ac = match body_armor {
            Some(armor) => {
                let dex = armor.max_dex_mod.map_or(dex_mod, |cap| dex_mod.min(cap));
                armor.armor_class.unwrap_or(UNARMORED_AC) + dex
            }
            None => UNARMORED_AC + dex_mod,
        };

        let stats = &mut player.stats;
        stats.armor_class = base_ac + extra_ac;
        stats.max_health = (BASE_HEALTH + con_mod * level + player.hit_point_bonus).max(1);
        stats.max_mana = (BASE_MANA + int_mod * level).max(0);
        stats.carry_capacity = (BASE_CARRY_CAPACITY + str_mod * CARRY_PER_STRENGTH_MOD).max(0);

        stats.health = stats.health.min(stats.max_health);
        stats.mana = stats.mana.min(stats.max_mana);
    }

    /// Recalculate the player in `state`; used after loads and resets.
    pub fn refresh(state: &mut GameState) {
        Self::recalculate(&mut state.player, &state.catalog);
        state.sync_combatant();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::items::{ArmorCategory, ItemKind};

    fn state_with(abilities: AbilityScores, items: &[&str]) -> GameState {
        let mut player = Player::new("Tester", abilities);
        for id in items {
            player.inventory.add(id, 1);
        }
        GameState::new(player, Settings::instant())
    }

    fn dex16() -> AbilityScores {
        AbilityScores::new(10, 16, 10, 10, 10, 10)
    }

    #[test]
    fn test_slot_aliases() {
        assert_eq!("mainHand".parse::<EquipSlot>(), Ok(EquipSlot::MainHand));
        assert_eq!("main_hand".parse::<EquipSlot>(), Ok(EquipSlot::MainHand));
        assert_eq!("OFFHAND".parse::<EquipSlot>(), Ok(EquipSlot::OffHand));
        assert_eq!(
            "tail".parse::<EquipSlot>(),
            Err(EquipError::UnknownSlot("tail".into()))
        );
    }

    #[test]
    fn test_armor_class_composition() {
        let mut state = state_with(dex16(), &["scale_mail", "iron_shield"]);
        assert_eq!(state.player.stats.armor_class, 13);

        EquipmentResolver::equip(&mut state, "scale_mail", None).unwrap();
        assert_eq!(state.player.stats.armor_class, 16);

        let report = EquipmentResolver::equip(&mut state, "iron_shield", None).unwrap();
        assert_eq!(state.player.stats.armor_class, 18);
        assert_eq!(
            report.changes,
            vec![StatChange {
                stat: StatKind::ArmorClass,
                delta: 2
            }]
        );
    }

    #[test]
    fn test_heavy_armor_ignores_dex() {
        let mut state = state_with(dex16(), &["chain_mail"]);
        EquipmentResolver::equip(&mut state, "chain_mail", Some("chest")).unwrap();
        assert_eq!(state.player.stats.armor_class, 16);
    }

    #[test]
    fn test_rings_fill_fingers_in_order() {
        let mut state = state_with(
            AbilityScores::default(),
            &["ring_of_wit", "ring_of_might", "ring_of_protection"],
        );

        let first = EquipmentResolver::equip(&mut state, "ring_of_wit", None).unwrap();
        assert_eq!(first.slot, EquipSlot::Finger1);

        let second = EquipmentResolver::equip(&mut state, "ring_of_might", None).unwrap();
        assert_eq!(second.slot, EquipSlot::Finger2);

        let third = EquipmentResolver::equip(&mut state, "ring_of_protection", None).unwrap();
        assert_eq!(third.slot, EquipSlot::Finger1);
        assert_eq!(third.replaced.as_deref(), Some("ring_of_wit"));
        assert_eq!(state.player.inventory.count("ring_of_wit"), 1);
    }

    #[test]
    fn test_stat_bonus_applies_to_working_copy_only() {
        let mut state = state_with(AbilityScores::default(), &["ring_of_wit"]);
        let report = EquipmentResolver::equip(&mut state, "ring_of_wit", None).unwrap();

        assert_eq!(state.player.abilities.intelligence, 10);
        assert_eq!(state.player.effective_abilities.intelligence, 12);
        assert!(report.changes.contains(&StatChange {
            stat: StatKind::Ability(Ability::Intelligence),
            delta: 2
        }));
        assert!(report.changes.contains(&StatChange {
            stat: StatKind::MaxMana,
            delta: 1
        }));
    }

    #[test]
    fn test_equip_failures_leave_state_untouched() {
        let mut state = state_with(AbilityScores::default(), &["health_potion", "iron_shield"]);
        let before = state.player.clone();

        assert_eq!(
            EquipmentResolver::equip(&mut state, "chain_mail", None),
            Err(EquipError::NotInInventory("chain_mail".into()))
        );
        assert_eq!(
            EquipmentResolver::equip(&mut state, "health_potion", None),
            Err(EquipError::NotEquippable("Health Potion".into()))
        );
        assert!(matches!(
            EquipmentResolver::equip(&mut state, "iron_shield", Some("head")),
            Err(EquipError::SlotMismatch { .. })
        ));
        assert!(matches!(
            EquipmentResolver::equip(&mut state, "iron_shield", Some("elbow")),
            Err(EquipError::UnknownSlot(_))
        ));

        assert_eq!(state.player, before);
        assert_eq!(state.messages.len(), 4);
        assert_eq!(state.messages.last().unwrap().severity, Severity::Warning);
    }

    #[test]
    fn test_unknown_item_in_inventory() {
        let mut state = state_with(AbilityScores::default(), &["mystery_relic"]);
        assert_eq!(
            EquipmentResolver::equip(&mut state, "mystery_relic", None),
            Err(EquipError::UnknownItem("mystery_relic".into()))
        );
    }

    #[test]
    fn test_already_equipped_is_rejected() {
        let mut state = state_with(AbilityScores::default(), &["ring_of_wit", "ring_of_wit"]);
        EquipmentResolver::equip(&mut state, "ring_of_wit", None).unwrap();
        assert_eq!(
            EquipmentResolver::equip(&mut state, "ring_of_wit", Some("finger2")),
            Err(EquipError::AlreadyEquipped {
                item: "Ring of Wit".into(),
                slot: EquipSlot::Finger1
            })
        );
    }

    #[test]
    fn test_unequip_empty_slot() {
        let mut state = state_with(AbilityScores::default(), &[]);
        assert_eq!(
            EquipmentResolver::unequip(&mut state, "mainhand"),
            Err(EquipError::SlotEmpty(EquipSlot::MainHand))
        );
    }

    #[test]
    fn test_recalculate_clamps_down() {
        let mut state = state_with(AbilityScores::new(10, 10, 14, 10, 10, 10), &["amulet_of_vigor"]);
        EquipmentResolver::equip(&mut state, "amulet_of_vigor", None).unwrap();
        // max rises, current stays
        assert_eq!(state.player.stats.max_health, 23);
        assert_eq!(state.player.stats.health, 22);

        state.player.stats.health = 23;
        EquipmentResolver::unequip(&mut state, "neck").unwrap();
        assert_eq!(state.player.stats.max_health, 22);
        assert_eq!(state.player.stats.health, 22);
    }

    #[test]
    fn test_missing_catalog_entry_is_skipped() {
        let mut player = Player::new("Tester", dex16());
        player.equipment.set(EquipSlot::Chest, "lost_armor");

        let mut catalog = ItemCatalog::new();
        catalog.insert(Item::new("trinket", "Trinket", ItemKind::Misc));
        EquipmentResolver::recalculate(&mut player, &catalog);

        assert_eq!(player.stats.armor_class, 13);
    }

    #[test]
    fn test_custom_armor_without_dex_cap() {
        let mut player = Player::new("Tester", dex16());
        let mut catalog = ItemCatalog::new();
        catalog.insert(Item::armor("robe", "Robe", ArmorCategory::Clothing, 11));
        player.equipment.set(EquipSlot::Chest, "robe");

        EquipmentResolver::recalculate(&mut player, &catalog);
        assert_eq!(player.stats.armor_class, 14);
    }
}
