use log::info;
use std::collections::BTreeSet;

use crate::color::NamedColor;
use crate::store::{ItemStore, KeyValueStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    /// An entry with the same name is already saved; nothing changed.
    AlreadyInList,
}

/// The user's saved colors, plus the transient sort order used to show them.
/// Every mutation rewrites the whole stored list.
pub struct ColorList<S: KeyValueStore> {
    store: ItemStore<S>,
    items: Vec<NamedColor>,
    ascending: bool,
}

impl<S: KeyValueStore> ColorList<S> {
    pub fn new(store: ItemStore<S>) -> Self {
        Self {
            store,
            items: Vec::new(),
            ascending: true,
        }
    }

    /// Builds the list and reads the stored items in one go.
    pub fn load(store: ItemStore<S>) -> Self {
        let mut list = Self::new(store);
        list.reload();
        list
    }

    /// Replaces the in-memory items with what storage holds, sorted in the
    /// current direction.
    pub fn reload(&mut self) {
        self.items = self.store.load();
        self.sort();
    }

    /// Items in display order.
    pub fn items(&self) -> &[NamedColor] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Exact, case-sensitive match on the color name.
    pub fn contains_name(&self, name: &str) -> bool {
        self.items.iter().any(|item| item.name.value == name)
    }

    /// Appends `item` and persists the list, unless an entry with the same
    /// name exists.
    pub fn add(&mut self, item: NamedColor) -> Result<AddOutcome, StoreError> {
        if self.contains_name(&item.name.value) {
            info!("{} already in list", item.name.value);
            return Ok(AddOutcome::AlreadyInList);
        }

        info!("Saving {}", item);
        let mut updated = self.items.clone();
        updated.push(item);
        self.commit(updated)?;
        Ok(AddOutcome::Added)
    }

    /// Removes the first entry with the same hex value. Returns whether
    /// anything was removed.
    pub fn delete_item(&mut self, item: &NamedColor) -> Result<bool, StoreError> {
        self.delete_hex(&item.hex.value)
    }

    /// Removes the first entry whose hex matches `hex`, ignoring case.
    pub fn delete_hex(&mut self, hex: &str) -> Result<bool, StoreError> {
        let Some(index) = self
            .items
            .iter()
            .position(|existing| existing.hex.value.eq_ignore_ascii_case(hex))
        else {
            return Ok(false);
        };

        let mut updated = self.items.clone();
        let removed = updated.remove(index);
        self.commit(updated)?;
        info!("Deleted {}", removed);
        Ok(true)
    }

    /// Removes every listed position. Indices past the end are ignored.
    pub fn delete_at<I: IntoIterator<Item = usize>>(&mut self, indices: I) -> Result<usize, StoreError> {
        let indices: BTreeSet<usize> = indices.into_iter().collect();
        let updated: Vec<NamedColor> = self
            .items
            .iter()
            .enumerate()
            .filter(|(position, _)| !indices.contains(position))
            .map(|(_, item)| item.clone())
            .collect();

        let removed = self.items.len() - updated.len();
        self.commit(updated)?;
        Ok(removed)
    }

    /// Writes `updated` to storage, then makes it the visible list. On a
    /// failed write the items are left untouched.
    fn commit(&mut self, updated: Vec<NamedColor>) -> Result<(), StoreError> {
        self.store.save(&updated)?;
        self.items = updated;
        Ok(())
    }

    pub fn is_ascending(&self) -> bool {
        self.ascending
    }

    /// Changes the direction and re-sorts.
    pub fn set_ascending(&mut self, ascending: bool) {
        self.ascending = ascending;
        self.sort();
    }

    /// Lexicographic by name in the current direction. Not persisted.
    pub fn sort(&mut self) {
        if self.ascending {
            self.items.sort_by(|a, b| a.name.value.cmp(&b.name.value));
        } else {
            self.items.sort_by(|a, b| b.name.value.cmp(&a.name.value));
        }
    }
}
