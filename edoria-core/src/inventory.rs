//! Player inventory.

use crate::items::ItemCatalog;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InventoryError {
    #[error("Not enough {id}: have {available}, need {requested}")]
    InsufficientQuantity {
        id: String,
        available: u32,
        requested: u32,
    },
}

/// One inventory record. Saved data uses either a bare id or `{id, quantity}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InventoryEntry {
    Bare(String),
    Stack { id: String, quantity: u32 },
}

impl InventoryEntry {
    pub fn id(&self) -> &str {
        match self {
            InventoryEntry::Bare(id) => id,
            InventoryEntry::Stack { id, .. } => id,
        }
    }

    pub fn quantity(&self) -> u32 {
        match self {
            InventoryEntry::Bare(_) => 1,
            InventoryEntry::Stack { quantity, .. } => *quantity,
        }
    }

    fn set_quantity(&mut self, amount: u32) {
        let id = self.id().to_string();
        *self = InventoryEntry::Stack {
            id,
            quantity: amount,
        };
    }
}

/// Ordered list of inventory entries. Several entries may share an id;
/// totals always coalesce them.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Inventory {
    entries: Vec<InventoryEntry>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<InventoryEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[InventoryEntry] {
        &self.entries
    }

    /// Total quantity held across every entry for `id`.
    pub fn count(&self, id: &str) -> u32 {
        self.entries
            .iter()
            .filter(|e| e.id() == id)
            .map(|e| e.quantity())
            .sum()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.count(id) > 0
    }

    /// Add `quantity` units, stacking onto the first entry with the same id.
    pub fn add(&mut self, id: &str, quantity: u32) {
        if quantity == 0 {
            return;
        }
        if let Some(entry) = self.entries.iter_mut().find(|e| e.id() == id) {
            let total = entry.quantity() + quantity;
            entry.set_quantity(total);
        } else {
            self.entries.push(InventoryEntry::Stack {
                id: id.to_string(),
                quantity,
            });
        }
    }

    /// Remove `quantity` units. Fails without changing anything when not
    /// enough are held. Entries that reach zero are dropped.
    pub fn remove(&mut self, id: &str, quantity: u32) -> Result<(), InventoryError> {
        let available = self.count(id);
        if available < quantity {
            return Err(InventoryError::InsufficientQuantity {
                id: id.to_string(),
                available,
                requested: quantity,
            });
        }

        let mut remaining = quantity;
        for entry in self.entries.iter_mut().filter(|e| e.id() == id) {
            if remaining == 0 {
                break;
            }
            let take = remaining.min(entry.quantity());
            entry.set_quantity(entry.quantity() - take);
            remaining -= take;
        }
        self.entries.retain(|e| e.quantity() > 0);
        Ok(())
    }

    /// `(id, total)` pairs in first-seen order.
    pub fn coalesced(&self) -> Vec<(String, u32)> {
        let mut totals: Vec<(String, u32)> = Vec::new();
        for entry in &self.entries {
            match totals.iter_mut().find(|(id, _)| id == entry.id()) {
                Some((_, total)) => *total += entry.quantity(),
                None => totals.push((entry.id().to_string(), entry.quantity())),
            }
        }
        totals.retain(|(_, total)| *total > 0);
        totals
    }

    /// Carried weight. Unknown ids weigh nothing.
    pub fn total_weight(&self, catalog: &ItemCatalog) -> f32 {
        self.entries
            .iter()
            .filter_map(|e| catalog.get(e.id()).map(|item| item.weight * e.quantity() as f32))
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
