//! Item definitions and the item catalog.
//!
//! Items are immutable lookup data keyed by id. The engine only ever stores
//! ids in inventories and equipment slots and resolves them through an
//! [`ItemCatalog`].

use crate::ability::Ability;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Broad item category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Weapon,
    Armor,
    Consumable,
    Accessory,
    Quest,
    Misc,
    Currency,
}

/// Armor weight class. Shields are their own category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArmorCategory {
    Light,
    Medium,
    Heavy,
    Clothing,
    Shield,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    #[default]
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

/// Where an item is worn, as declared by the item itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemSlot {
    #[serde(rename = "head")]
    Head,
    #[serde(rename = "neck")]
    Neck,
    #[serde(rename = "chest", alias = "body")]
    Chest,
    #[serde(rename = "hands")]
    Hands,
    #[serde(rename = "legs")]
    Legs,
    #[serde(rename = "feet")]
    Feet,
    #[serde(rename = "mainhand", alias = "mainHand", alias = "main_hand", alias = "weapon")]
    MainHand,
    #[serde(rename = "offhand", alias = "offHand", alias = "off_hand", alias = "shield")]
    OffHand,
    #[serde(rename = "ring", alias = "finger")]
    Ring,
}

/// Damage types, including the `physical` umbrella used by resistances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DamageType {
    Slashing,
    Piercing,
    Bludgeoning,
    Fire,
    Cold,
    Lightning,
    Thunder,
    Acid,
    Poison,
    Necrotic,
    Radiant,
    Psychic,
    Force,
    Physical,
}

impl DamageType {
    pub fn name(&self) -> &'static str {
        match self {
            DamageType::Slashing => "slashing",
            DamageType::Piercing => "piercing",
            DamageType::Bludgeoning => "bludgeoning",
            DamageType::Fire => "fire",
            DamageType::Cold => "cold",
            DamageType::Lightning => "lightning",
            DamageType::Thunder => "thunder",
            DamageType::Acid => "acid",
            DamageType::Poison => "poison",
            DamageType::Necrotic => "necrotic",
            DamageType::Radiant => "radiant",
            DamageType::Psychic => "psychic",
            DamageType::Force => "force",
            DamageType::Physical => "physical",
        }
    }

    pub fn is_physical(&self) -> bool {
        matches!(
            self,
            DamageType::Slashing
                | DamageType::Piercing
                | DamageType::Bludgeoning
                | DamageType::Physical
        )
    }

    /// Whether a resistance of this type applies to `incoming` damage.
    pub fn matches(&self, incoming: DamageType) -> bool {
        *self == incoming || (*self == DamageType::Physical && incoming.is_physical())
    }
}

impl fmt::Display for DamageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Static item data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ItemKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<ArmorCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot: Option<ItemSlot>,
    #[serde(default)]
    pub rarity: Rarity,
    #[serde(default)]
    pub weight: f32,
    #[serde(default)]
    pub value: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub damage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub damage_type: Option<DamageType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub armor_class: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_dex_mod: Option<i32>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub stat_bonus: BTreeMap<Ability, i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heal_amount: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mana_amount: Option<i32>,
    /// Rounds a consumable's stat bonus lasts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect_turns: Option<u32>,
    #[serde(default)]
    pub finesse: bool,
    #[serde(default)]
    pub ranged: bool,
}

impl Item {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: ItemKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            subtype: None,
            slot: None,
            rarity: Rarity::Common,
            weight: 0.0,
            value: 0,
            damage: None,
            damage_type: None,
            armor_class: None,
            max_dex_mod: None,
            stat_bonus: BTreeMap::new(),
            heal_amount: None,
            mana_amount: None,
            effect_turns: None,
            finesse: false,
            ranged: false,
        }
    }

    /// A main-hand weapon.
    pub fn weapon(
        id: impl Into<String>,
        name: impl Into<String>,
        damage: impl Into<String>,
        damage_type: DamageType,
    ) -> Self {
        let mut item = Self::new(id, name, ItemKind::Weapon);
        item.slot = Some(ItemSlot::MainHand);
        item.damage = Some(damage.into());
        item.damage_type = Some(damage_type);
        item
    }

    /// Body armor, or an off-hand shield for [`ArmorCategory::Shield`].
    pub fn armor(
        id: impl Into<String>,
        name: impl Into<String>,
        category: ArmorCategory,
        armor_class: i32,
    ) -> Self {
        let mut item = Self::new(id, name, ItemKind::Armor);
        item.subtype = Some(category);
        item.armor_class = Some(armor_class);
        item.slot = Some(if category == ArmorCategory::Shield {
            ItemSlot::OffHand
        } else {
            ItemSlot::Chest
        });
        item
    }

    pub fn with_slot(mut self, slot: ItemSlot) -> Self {
        self.slot = Some(slot);
        self
    }

    pub fn with_rarity(mut self, rarity: Rarity) -> Self {
        self.rarity = rarity;
        self
    }

    pub fn with_weight(mut self, weight: f32) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_value(mut self, value: u32) -> Self {
        self.value = value;
        self
    }

    pub fn with_max_dex(mut self, max_dex_mod: i32) -> Self {
        self.max_dex_mod = Some(max_dex_mod);
        self
    }

    pub fn with_armor_class(mut self, armor_class: i32) -> Self {
        self.armor_class = Some(armor_class);
        self
    }

    pub fn with_stat_bonus(mut self, ability: Ability, bonus: i32) -> Self {
        self.stat_bonus.insert(ability, bonus);
        self
    }

    pub fn with_heal(mut self, amount: i32) -> Self {
        self.heal_amount = Some(amount);
        self
    }

    pub fn with_mana(mut self, amount: i32) -> Self {
        self.mana_amount = Some(amount);
        self
    }

    pub fn with_effect_turns(mut self, turns: u32) -> Self {
        self.effect_turns = Some(turns);
        self
    }

    pub fn finesse(mut self) -> Self {
        self.finesse = true;
        self
    }

    pub fn ranged(mut self) -> Self {
        self.ranged = true;
        self
    }

    pub fn is_equippable(&self) -> bool {
        self.slot.is_some()
    }

    /// Chest armor whose AC replaces the unarmored base.
    pub fn is_body_armor(&self) -> bool {
        self.kind == ItemKind::Armor
            && self.slot == Some(ItemSlot::Chest)
            && self.armor_class.is_some()
            && self.subtype != Some(ArmorCategory::Shield)
    }

    pub fn is_consumable(&self) -> bool {
        self.kind == ItemKind::Consumable
    }
}

// ============================================================================
// Catalog
// ============================================================================

/// Item lookup table.
#[derive(Debug, Clone, Default)]
pub struct ItemCatalog {
    items: HashMap<String, Item>,
}

impl ItemCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog preloaded with [`STANDARD_ITEMS`].
    pub fn standard() -> Self {
        let mut catalog = Self::new();
        for item in STANDARD_ITEMS.iter() {
            catalog.insert(item.clone());
        }
        catalog
    }

    /// Load a JSON array of items.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let mut catalog = Self::new();
        catalog.extend_from_json(json)?;
        Ok(catalog)
    }

    /// Add (or replace) items from a JSON array.
    pub fn extend_from_json(&mut self, json: &str) -> Result<usize, serde_json::Error> {
        let items: Vec<Item> = serde_json::from_str(json)?;
        let count = items.len();
        for item in items {
            self.insert(item);
        }
        Ok(count)
    }

    pub fn insert(&mut self, item: Item) {
        self.items.insert(item.id.clone(), item);
    }

    pub fn get(&self, id: &str) -> Option<&Item> {
        self.items.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }

    /// Display name for an id, falling back to the id itself.
    pub fn name_of<'a>(&'a self, id: &'a str) -> &'a str {
        self.get(id).map(|item| item.name.as_str()).unwrap_or(id)
    }
}

lazy_static::lazy_static! {
    /// The built-in item set.
    pub static ref STANDARD_ITEMS: Vec<Item> = vec![
        // Weapons
        Item::weapon("rusty_dagger", "Rusty Dagger", "1d4", DamageType::Piercing)
            .finesse()
            .with_weight(1.0)
            .with_value(2),
        Item::weapon("steel_longsword", "Steel Longsword", "1d8", DamageType::Slashing)
            .with_rarity(Rarity::Uncommon)
            .with_weight(3.0)
            .with_value(15),
        Item::weapon("rapier", "Rapier", "1d8", DamageType::Piercing)
            .finesse()
            .with_weight(2.0)
            .with_value(25),
        Item::weapon("hunting_bow", "Hunting Bow", "1d6", DamageType::Piercing)
            .ranged()
            .with_weight(2.0)
            .with_value(25),
        Item::weapon("oak_staff", "Oak Staff", "1d6", DamageType::Bludgeoning)
            .with_weight(4.0)
            .with_value(1),
        Item::weapon("ember_wand", "Ember Wand", "1d10", DamageType::Fire)
            .ranged()
            .with_rarity(Rarity::Rare)
            .with_stat_bonus(Ability::Intelligence, 1)
            .with_weight(1.0)
            .with_value(120),

        // Armor
        Item::armor("padded_tunic", "Padded Tunic", ArmorCategory::Clothing, 11)
            .with_weight(4.0)
            .with_value(5),
        Item::armor("leather_armor", "Leather Armor", ArmorCategory::Light, 11)
            .with_weight(10.0)
            .with_value(10),
        Item::armor("scale_mail", "Scale Mail", ArmorCategory::Medium, 14)
            .with_max_dex(2)
            .with_weight(45.0)
            .with_value(50),
        Item::armor("chain_mail", "Chain Mail", ArmorCategory::Heavy, 16)
            .with_max_dex(0)
            .with_weight(55.0)
            .with_value(75),
        Item::armor("iron_shield", "Iron Shield", ArmorCategory::Shield, 2)
            .with_weight(6.0)
            .with_value(10),
        Item::armor("iron_helm", "Iron Helm", ArmorCategory::Heavy, 1)
            .with_slot(ItemSlot::Head)
            .with_weight(3.0)
            .with_value(8),
        Item::new("travelers_boots", "Traveler's Boots", ItemKind::Armor)
            .with_slot(ItemSlot::Feet)
            .with_weight(1.0)
            .with_value(2),

        // Accessories
        Item::new("ring_of_wit", "Ring of Wit", ItemKind::Accessory)
            .with_slot(ItemSlot::Ring)
            .with_rarity(Rarity::Uncommon)
            .with_stat_bonus(Ability::Intelligence, 2)
            .with_value(150),
        Item::new("ring_of_might", "Ring of Might", ItemKind::Accessory)
            .with_slot(ItemSlot::Ring)
            .with_rarity(Rarity::Uncommon)
            .with_stat_bonus(Ability::Strength, 2)
            .with_value(150),
        Item::new("ring_of_protection", "Ring of Protection", ItemKind::Accessory)
            .with_slot(ItemSlot::Ring)
            .with_rarity(Rarity::Rare)
            .with_armor_class(1)
            .with_value(300),
        Item::new("amulet_of_vigor", "Amulet of Vigor", ItemKind::Accessory)
            .with_slot(ItemSlot::Neck)
            .with_rarity(Rarity::Rare)
            .with_stat_bonus(Ability::Constitution, 2)
            .with_value(250),
        Item::new("gloves_of_grace", "Gloves of Grace", ItemKind::Accessory)
            .with_slot(ItemSlot::Hands)
            .with_stat_bonus(Ability::Dexterity, 2)
            .with_value(200),

        // Consumables
        Item::new("health_potion", "Health Potion", ItemKind::Consumable)
            .with_heal(10)
            .with_weight(0.5)
            .with_value(25),
        Item::new("greater_health_potion", "Greater Health Potion", ItemKind::Consumable)
            .with_rarity(Rarity::Uncommon)
            .with_heal(25)
            .with_weight(0.5)
            .with_value(75),
        Item::new("mana_potion", "Mana Potion", ItemKind::Consumable)
            .with_mana(10)
            .with_weight(0.5)
            .with_value(25),
        Item::new("elixir_of_strength", "Elixir of Strength", ItemKind::Consumable)
            .with_stat_bonus(Ability::Strength, 4)
            .with_effect_turns(3)
            .with_weight(0.5)
            .with_value(60),

        // Everything else
        Item::new("gold_coin", "Gold Coin", ItemKind::Currency).with_value(1),
        Item::new("rope", "Hempen Rope", ItemKind::Misc)
            .with_weight(10.0)
            .with_value(1),
        Item::new("convergence_shard", "Convergence Shard", ItemKind::Quest)
            .with_rarity(Rarity::Legendary),
    ];
}
