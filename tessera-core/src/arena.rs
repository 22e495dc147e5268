//! Generational slot storage
//!
//! Displays, objects, touch devices and timers are addressed through small
//! copyable handles instead of pointers. A handle carries the slot index and
//! the generation it was issued for; once the slot is freed and reused the
//! old handle stops resolving.

use alloc::vec::Vec;

/// Slot index plus generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Key {
    pub index: u32,
    pub generation: u32,
}

/// Declare a typed handle wrapping a [`Key`]
macro_rules! handle_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "defmt", derive(defmt::Format))]
        pub struct $name(pub $crate::arena::Key);

        impl From<$crate::arena::Key> for $name {
            fn from(key: $crate::arena::Key) -> Self {
                Self(key)
            }
        }

        impl From<$name> for $crate::arena::Key {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}
pub(crate) use handle_type;

#[derive(Debug)]
enum Slot<T> {
    Occupied { generation: u32, value: T },
    Free { generation: u32, next_free: Option<u32> },
}

/// Vector of slots with a free list
#[derive(Debug)]
pub struct Arena<T> {
    slots: Vec<Slot<T>>,
    free_head: Option<u32>,
    len: usize,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Arena<T> {
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_head: None,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Store a value, reusing a freed slot when one exists
    ///
    /// Fails only when the slot vector cannot grow.
    pub fn try_insert(&mut self, value: T) -> Result<Key, T> {
        if let Some(index) = self.free_head {
            let slot = &mut self.slots[index as usize];
            if let Slot::Free { generation, next_free } = *slot {
                self.free_head = next_free;
                *slot = Slot::Occupied { generation, value };
                self.len += 1;
                return Ok(Key { index, generation });
            }
        }

        if self.slots.try_reserve(1).is_err() {
            return Err(value);
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot::Occupied { generation: 0, value });
        self.len += 1;
        Ok(Key { index, generation: 0 })
    }

    /// Key the next insert will be stored under
    ///
    /// Room for that insert is reserved, so it cannot fail afterwards.
    /// Returns `None` when the slot vector cannot grow.
    pub fn next_key(&mut self) -> Option<Key> {
        match self.free_head {
            Some(index) => match self.slots[index as usize] {
                Slot::Free { generation, .. } => Some(Key { index, generation }),
                Slot::Occupied { .. } => None,
            },
            None => {
                self.slots.try_reserve(1).ok()?;
                Some(Key {
                    index: self.slots.len() as u32,
                    generation: 0,
                })
            }
        }
    }

    /// Store a value built from the key it will live under
    ///
    /// Returns `None` when the slot vector cannot grow; `f` is not called then.
    pub fn try_insert_with(&mut self, f: impl FnOnce(Key) -> T) -> Option<Key> {
        let key = self.next_key()?;
        let value = f(key);
        match self.try_insert(value) {
            Ok(k) => {
                debug_assert_eq!(k, key);
                Some(k)
            }
            Err(_) => None,
        }
    }

    /// Free a slot and return its value
    pub fn remove(&mut self, key: Key) -> Option<T> {
        let slot = self.slots.get_mut(key.index as usize)?;
        match slot {
            Slot::Occupied { generation, .. } if *generation == key.generation => {
                let next = Slot::Free {
                    generation: generation.wrapping_add(1),
                    next_free: self.free_head,
                };
                let old = core::mem::replace(slot, next);
                self.free_head = Some(key.index);
                self.len -= 1;
                match old {
                    Slot::Occupied { value, .. } => Some(value),
                    Slot::Free { .. } => None,
                }
            }
            _ => None,
        }
    }

    pub fn contains(&self, key: Key) -> bool {
        self.get(key).is_some()
    }

    pub fn get(&self, key: Key) -> Option<&T> {
        match self.slots.get(key.index as usize)? {
            Slot::Occupied { generation, value } if *generation == key.generation => Some(value),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, key: Key) -> Option<&mut T> {
        match self.slots.get_mut(key.index as usize)? {
            Slot::Occupied { generation, value } if *generation == key.generation => Some(value),
            _ => None,
        }
    }

    /// Live entries in slot order
    pub fn iter(&self) -> impl Iterator<Item = (Key, &T)> {
        self.slots.iter().enumerate().filter_map(|(i, s)| match s {
            Slot::Occupied { generation, value } => Some((
                Key {
                    index: i as u32,
                    generation: *generation,
                },
                value,
            )),
            Slot::Free { .. } => None,
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Key, &mut T)> {
        self.slots.iter_mut().enumerate().filter_map(|(i, s)| match s {
            Slot::Occupied { generation, value } => Some((
                Key {
                    index: i as u32,
                    generation: *generation,
                },
                value,
            )),
            Slot::Free { .. } => None,
        })
    }

    /// Keys of all live entries
    pub fn keys(&self) -> Vec<Key> {
        self.iter().map(|(k, _)| k).collect()
    }

    /// Remove every entry, returning the values in slot order
    pub fn drain(&mut self) -> Vec<T> {
        let slots = core::mem::take(&mut self.slots);
        self.free_head = None;
        self.len = 0;
        slots
            .into_iter()
            .filter_map(|s| match s {
                Slot::Occupied { value, .. } => Some(value),
                Slot::Free { .. } => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_get_remove() {
        let mut a = Arena::new();
        let k = a.try_insert(5u32).unwrap();
        assert_eq!(a.get(k), Some(&5));
        assert_eq!(a.len(), 1);
        assert_eq!(a.remove(k), Some(5));
        assert!(a.is_empty());
        assert_eq!(a.get(k), None);
    }

    #[test]
    fn test_stale_key_after_reuse() {
        let mut a = Arena::new();
        let old = a.try_insert("a").unwrap();
        a.remove(old);
        let new = a.try_insert("b").unwrap();

        // Same slot, new generation
        assert_eq!(old.index, new.index);
        assert_ne!(old.generation, new.generation);
        assert_eq!(a.get(old), None);
        assert_eq!(a.get(new), Some(&"b"));
        assert_eq!(a.remove(old), None);
    }

    #[test]
    fn test_iter_skips_free_slots() {
        let mut a = Arena::new();
        let k0 = a.try_insert(0).unwrap();
        let _k1 = a.try_insert(1).unwrap();
        let _k2 = a.try_insert(2).unwrap();
        a.remove(k0);
        let vals: Vec<i32> = a.iter().map(|(_, v)| *v).collect();
        assert_eq!(vals, [1, 2]);
        assert_eq!(a.keys().len(), 2);
    }

    #[test]
    fn test_drain() {
        let mut a = Arena::new();
        a.try_insert(1).unwrap();
        a.try_insert(2).unwrap();
        assert_eq!(a.drain(), [1, 2]);
        assert!(a.is_empty());
        assert!(a.iter().next().is_none());
    }

    #[test]
    fn test_insert_with_sees_own_key() {
        let mut a = Arena::new();
        let first = a.try_insert(Key { index: 9, generation: 9 }).unwrap();
        a.remove(first);
        let k = a.try_insert_with(|key| key).unwrap();
        assert_eq!(a.get(k), Some(&k));
        assert_eq!(k.generation, 1);
    }
}
