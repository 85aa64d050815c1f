//! Equipment, inventory and derived-stat tests.

use edoria_core::ability::{Ability, AbilityScores};
use edoria_core::character::Player;
use edoria_core::equipment::{EquipError, EquipSlot, EquipmentResolver, StatKind};
use edoria_core::items::ItemCatalog;
use edoria_core::testing::{
    assert_equipped, assert_inventory_count, assert_message, assert_stats_clamped, TestHarness,
};

fn harness_with(items: &[(&str, u32)]) -> TestHarness {
    let mut player = Player::new("Wren", AbilityScores::new(12, 16, 14, 10, 10, 10));
    for (id, quantity) in items {
        player = player.with_item(id, *quantity);
    }
    TestHarness::with_player(player)
}

#[test]
fn test_armor_class_composition() {
    let mut harness = harness_with(&[("scale_mail", 1), ("iron_shield", 1)]);
    // 10 + dex 3
    assert_eq!(harness.state.player.stats.armor_class, 13);

    // 14 + dex capped at 2
    EquipmentResolver::equip(&mut harness.state, "scale_mail", None).unwrap();
    assert_eq!(harness.state.player.stats.armor_class, 16);

    let report = EquipmentResolver::equip(&mut harness.state, "iron_shield", None).unwrap();
    assert_eq!(report.slot, EquipSlot::OffHand);
    assert_eq!(harness.state.player.stats.armor_class, 18);
    assert!(report
        .changes
        .iter()
        .any(|c| c.stat == StatKind::ArmorClass && c.delta == 2));
}

#[test]
fn test_equip_unequip_round_trip() {
    let mut harness = harness_with(&[("ring_of_might", 1), ("amulet_of_vigor", 1), ("rope", 1)]);
    let inventory_before = harness.state.player.inventory.coalesced();
    let stats_before = harness.state.player.stats;
    let abilities_before = harness.state.player.effective_abilities;

    EquipmentResolver::equip(&mut harness.state, "amulet_of_vigor", None).unwrap();
    assert_equipped(&harness, EquipSlot::Neck, Some("amulet_of_vigor"));
    assert_inventory_count(&harness, "amulet_of_vigor", 0);
    assert_eq!(
        harness.state.player.effective_abilities.get(Ability::Constitution),
        16
    );
    // Base scores never move.
    assert_eq!(harness.state.player.abilities.get(Ability::Constitution), 14);

    EquipmentResolver::unequip(&mut harness.state, "neck").unwrap();
    assert_equipped(&harness, EquipSlot::Neck, None);
    assert_eq!(harness.state.player.inventory.coalesced(), inventory_before);
    assert_eq!(harness.state.player.stats, stats_before);
    assert_eq!(harness.state.player.effective_abilities, abilities_before);
}

#[test]
fn test_unequip_clamps_current_values() {
    let mut harness = harness_with(&[("amulet_of_vigor", 1), ("ring_of_wit", 1)]);
    EquipmentResolver::equip(&mut harness.state, "amulet_of_vigor", None).unwrap();
    EquipmentResolver::equip(&mut harness.state, "ring_of_wit", None).unwrap();

    let stats = &mut harness.state.player.stats;
    stats.health = stats.max_health;
    stats.mana = stats.max_mana;
    assert_eq!((stats.max_health, stats.max_mana), (23, 11));

    EquipmentResolver::unequip(&mut harness.state, "neck").unwrap();
    EquipmentResolver::unequip(&mut harness.state, "finger1").unwrap();
    assert_stats_clamped(&harness);
    assert_eq!(harness.state.player.stats.health, 22);
    assert_eq!(harness.state.player.stats.mana, 10);
}

#[test]
fn test_unequip_stacks_onto_existing_entry() {
    let mut harness = harness_with(&[("ring_of_might", 2)]);
    EquipmentResolver::equip(&mut harness.state, "ring_of_might", None).unwrap();
    assert_inventory_count(&harness, "ring_of_might", 1);

    EquipmentResolver::unequip_slot(&mut harness.state, EquipSlot::Finger1).unwrap();
    assert_inventory_count(&harness, "ring_of_might", 2);
    assert_eq!(harness.state.player.inventory.entries().len(), 1);
}

#[test]
fn test_rings_fill_both_fingers_then_replace_first() {
    let mut harness = harness_with(&[
        ("ring_of_wit", 1),
        ("ring_of_might", 1),
        ("ring_of_protection", 1),
    ]);

    let first = EquipmentResolver::equip(&mut harness.state, "ring_of_wit", None).unwrap();
    let second = EquipmentResolver::equip(&mut harness.state, "ring_of_might", None).unwrap();
    let third = EquipmentResolver::equip(&mut harness.state, "ring_of_protection", None).unwrap();

    assert_eq!(first.slot, EquipSlot::Finger1);
    assert_eq!(second.slot, EquipSlot::Finger2);
    assert_eq!(third.slot, EquipSlot::Finger1);
    assert_eq!(third.replaced.as_deref(), Some("ring_of_wit"));
    assert_inventory_count(&harness, "ring_of_wit", 1);
    assert_message(&harness, "replacing Ring of Wit");
}

#[test]
fn test_weapon_swap_returns_old_weapon() {
    let mut harness = harness_with(&[("steel_longsword", 1), ("rapier", 1)]);
    EquipmentResolver::equip(&mut harness.state, "steel_longsword", Some("main_hand")).unwrap();
    let report = EquipmentResolver::equip(&mut harness.state, "rapier", None).unwrap();

    assert_eq!(report.slot, EquipSlot::MainHand);
    assert_eq!(report.replaced.as_deref(), Some("steel_longsword"));
    assert_equipped(&harness, EquipSlot::MainHand, Some("rapier"));
    assert_inventory_count(&harness, "steel_longsword", 1);
    assert_inventory_count(&harness, "rapier", 0);
}

#[test]
fn test_equip_rejections_change_nothing() {
    let mut harness = harness_with(&[("steel_longsword", 1), ("health_potion", 2)]);
    let before = harness.state.player.clone();

    assert_eq!(
        EquipmentResolver::equip(&mut harness.state, "chain_mail", None).unwrap_err(),
        EquipError::NotInInventory("chain_mail".to_string())
    );
    assert!(matches!(
        EquipmentResolver::equip(&mut harness.state, "health_potion", None),
        Err(EquipError::NotEquippable(_))
    ));
    assert!(matches!(
        EquipmentResolver::equip(&mut harness.state, "steel_longsword", Some("head")),
        Err(EquipError::SlotMismatch { .. })
    ));
    assert!(matches!(
        EquipmentResolver::equip(&mut harness.state, "steel_longsword", Some("tail")),
        Err(EquipError::UnknownSlot(_))
    ));
    assert_eq!(
        EquipmentResolver::unequip_slot(&mut harness.state, EquipSlot::Head).unwrap_err(),
        EquipError::SlotEmpty(EquipSlot::Head)
    );

    assert_eq!(harness.state.player, before);
    assert_eq!(harness.notifier.messages().len(), 5);
}

#[test]
fn test_missing_catalog_item_is_skipped() {
    let mut harness = harness_with(&[("iron_helm", 1)]);
    EquipmentResolver::equip(&mut harness.state, "iron_helm", None).unwrap();
    assert_eq!(harness.state.player.stats.armor_class, 14);

    harness.state.catalog = ItemCatalog::new();
    EquipmentResolver::refresh(&mut harness.state);
    assert_eq!(harness.state.player.stats.armor_class, 13);
    assert_equipped(&harness, EquipSlot::Head, Some("iron_helm"));
}
