//! Element table owned by the composer.
//!
//! Every element declared by any scene gets one slot for the lifetime of
//! the composer. Parent links are slot indices, so a child never keeps its
//! parent alive and a scene switch only rewrites indices.

use std::collections::{BTreeMap, HashMap};
use std::ops::{Index, IndexMut};

use glam::Vec2;
use livemix_animator::{PictureAnimator, SoundAnimator};
use livemix_common::SharedClock;
use livemix_scene_model::DeclaredState;

/// Position of a slot in the [`ElementArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementIndex(usize);

/// One element: its animators, the states the current scene gives it and
/// the asset bound to it.
#[derive(Debug)]
pub struct ElementSlot {
    pub id: String,
    pub picture: PictureAnimator,
    pub sound: SoundAnimator,
    pub states: BTreeMap<String, DeclaredState>,
    pub initial_state: Option<String>,
    pub parent: Option<ElementIndex>,
    pub asset: Option<String>,
    /// Declared by the current scene.
    pub active: bool,
    /// Size of the last picture routed through this element.
    pub source_size: Vec2,
}

impl ElementSlot {
    pub fn new(id: impl Into<String>, clock: SharedClock, canvas_size: Vec2) -> Self {
        Self {
            id: id.into(),
            picture: PictureAnimator::new(clock.clone(), canvas_size),
            sound: SoundAnimator::new(clock),
            states: BTreeMap::new(),
            initial_state: None,
            parent: None,
            asset: None,
            active: false,
            source_size: Vec2::ZERO,
        }
    }

    /// Bound and part of the current scene, so its samples reach the mixers.
    pub fn is_connected(&self) -> bool {
        self.active && self.asset.is_some()
    }
}

#[derive(Debug, Default)]
pub struct ElementArena {
    slots: Vec<ElementSlot>,
    by_id: HashMap<String, ElementIndex>,
}

impl ElementArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a slot, or return the existing index for its id.
    pub fn insert(&mut self, slot: ElementSlot) -> ElementIndex {
        if let Some(index) = self.by_id.get(&slot.id) {
            return *index;
        }
        let index = ElementIndex(self.slots.len());
        self.by_id.insert(slot.id.clone(), index);
        self.slots.push(slot);
        index
    }

    pub fn index_of(&self, id: &str) -> Option<ElementIndex> {
        self.by_id.get(id).copied()
    }

    pub fn get(&self, id: &str) -> Option<&ElementSlot> {
        self.index_of(id).map(|index| &self[index])
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ElementIndex, &ElementSlot)> {
        self.slots
            .iter()
            .enumerate()
            .map(|(i, slot)| (ElementIndex(i), slot))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (ElementIndex, &mut ElementSlot)> {
        self.slots
            .iter_mut()
            .enumerate()
            .map(|(i, slot)| (ElementIndex(i), slot))
    }

    /// Connected slots fed by `asset_id`.
    pub fn connected_to(&self, asset_id: &str) -> Vec<ElementIndex> {
        self.iter()
            .filter(|(_, slot)| slot.is_connected() && slot.asset.as_deref() == Some(asset_id))
            .map(|(index, _)| index)
            .collect()
    }

    /// Ancestors of `index`, outermost first.
    ///
    /// A parent cycle is cut once every slot has been visited.
    pub fn ancestors(&self, index: ElementIndex) -> Vec<ElementIndex> {
        let mut chain = Vec::new();
        let mut next = self[index].parent;
        while let Some(parent) = next {
            if chain.len() >= self.slots.len() {
                tracing::warn!(element = %self[index].id, "Parent cycle detected");
                break;
            }
            chain.push(parent);
            next = self[parent].parent;
        }
        chain.reverse();
        chain
    }
}

impl Index<ElementIndex> for ElementArena {
    type Output = ElementSlot;

    fn index(&self, index: ElementIndex) -> &ElementSlot {
        &self.slots[index.0]
    }
}

impl IndexMut<ElementIndex> for ElementArena {
    fn index_mut(&mut self, index: ElementIndex) -> &mut ElementSlot {
        &mut self.slots[index.0]
    }
}
