//! Typed slot storage for inventory entities.
//!
//! Entities never move once inserted, so an `Id<T>` stays valid for the
//! lifetime of the inventory, also while the entity is detached from the
//! tree. Every handle remembers the inventory that issued it.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use uuid::Uuid;

/// Handle to an entity of type `T` stored in an inventory.
pub struct Id<T> {
    owner: Uuid,
    index: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Id<T> {
    pub fn index(&self) -> usize {
        self.index as usize
    }
}

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Id<T> {}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.owner == other.owner && self.index == other.index
    }
}

impl<T> Eq for Id<T> {}

impl<T> Hash for Id<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.owner.hash(state);
        self.index.hash(state);
    }
}

impl<T> PartialOrd for Id<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Id<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.owner, self.index).cmp(&(other.owner, other.index))
    }
}

impl<T> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = std::any::type_name::<T>().rsplit("::").next().unwrap_or("?");
        write!(f, "{}#{}", kind, self.index)
    }
}

/// Append-only storage issuing `Id<T>` handles.
#[derive(Debug, Clone)]
pub struct Arena<T> {
    owner: Uuid,
    items: Vec<T>,
}

impl<T> Arena<T> {
    pub fn new(owner: Uuid) -> Self {
        Self {
            owner,
            items: Vec::new(),
        }
    }

    /// Store `value` and issue its handle.
    ///
    /// `None` once the arena holds `u32::MAX + 1` entries; the value is
    /// dropped.
    pub fn insert(&mut self, value: T) -> Option<Id<T>> {
        let Some(index) = slot_index(self.items.len()) else {
            log::error!(
                "ARENA_FULL kind={} len={}",
                std::any::type_name::<T>().rsplit("::").next().unwrap_or("?"),
                self.items.len()
            );
            return None;
        };
        self.items.push(value);
        Some(Id {
            owner: self.owner,
            index,
            _marker: PhantomData,
        })
    }

    /// `None` for handles issued by another inventory.
    pub fn get(&self, id: Id<T>) -> Option<&T> {
        if id.owner != self.owner {
            return None;
        }
        self.items.get(id.index())
    }

    pub fn get_mut(&mut self, id: Id<T>) -> Option<&mut T> {
        if id.owner != self.owner {
            return None;
        }
        self.items.get_mut(id.index())
    }

    pub fn contains(&self, id: Id<T>) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Id<T>, &T)> {
        let owner = self.owner;
        self.items.iter().enumerate().map(move |(index, item)| {
            (
                Id {
                    owner,
                    index: index as u32,
                    _marker: PhantomData,
                },
                item,
            )
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.items.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

/// Index of the slot following `len` stored entries.
fn slot_index(len: usize) -> Option<u32> {
    u32::try_from(len).ok()
}
