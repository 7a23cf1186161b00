//! Key-state snapshots with both edge-triggered and level-triggered queries.
//!
//! The input source only reports raw down/up transitions; it keeps no state.
//! `InputState` holds the `current` snapshot those transitions mutate and the
//! `previous` snapshot captured at the last frame boundary.
//!
//! - **Level-triggered (held):** `is_held(key)` is true every frame the key is
//!   down. Used for the arm motor and jump sustain.
//!
//! - **Edge-triggered (just_pressed / just_released):** derived by comparing the
//!   two snapshots, so they stay true for the whole frame no matter how many
//!   times they are queried. `end_frame()` copies `current` into `previous`.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    W,
    E,
    I,
    O,
    Escape,
}

impl Key {
    pub const ALL: &'static [Key] = &[Key::W, Key::E, Key::I, Key::O, Key::Escape];

    const fn bit(self) -> u8 {
        match self {
            Key::W => 1 << 0,
            Key::E => 1 << 1,
            Key::I => 1 << 2,
            Key::O => 1 << 3,
            Key::Escape => 1 << 4,
        }
    }

    /// Browser-style key name.
    pub fn name(self) -> &'static str {
        match self {
            Key::W => "w",
            Key::E => "e",
            Key::I => "i",
            Key::O => "o",
            Key::Escape => "Escape",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Key::ALL
            .iter()
            .copied()
            .find(|key| key.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Set of keys that are down at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeySet(u8);

impl KeySet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn contains(self, key: Key) -> bool {
        self.0 & key.bit() != 0
    }

    pub fn insert(&mut self, key: Key) {
        self.0 |= key.bit();
    }

    pub fn remove(&mut self, key: Key) {
        self.0 &= !key.bit();
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl FromIterator<Key> for KeySet {
    fn from_iter<T: IntoIterator<Item = Key>>(iter: T) -> Self {
        let mut set = KeySet::empty();
        for key in iter {
            set.insert(key);
        }
        set
    }
}

#[derive(Debug, Clone, Default)]
pub struct InputState {
    current: KeySet,
    previous: KeySet,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key_down(&mut self, key: Key) {
        self.current.insert(key);
    }

    pub fn key_up(&mut self, key: Key) {
        self.current.remove(key);
    }

    /// Replace the whole current snapshot, e.g. from a scripted frame.
    pub fn set_current(&mut self, keys: KeySet) {
        self.current = keys;
    }

    pub fn current(&self) -> KeySet {
        self.current
    }

    pub fn previous(&self) -> KeySet {
        self.previous
    }

    pub fn is_held(&self, key: Key) -> bool {
        self.current.contains(key)
    }

    pub fn is_just_pressed(&self, key: Key) -> bool {
        self.current.contains(key) && !self.previous.contains(key)
    }

    pub fn is_just_released(&self, key: Key) -> bool {
        !self.current.contains(key) && self.previous.contains(key)
    }

    pub fn end_frame(&mut self) {
        self.previous = self.current;
    }

    /// Drop all key state, used on teardown so no stale edge survives.
    pub fn clear(&mut self) {
        self.current = KeySet::empty();
        self.previous = KeySet::empty();
    }
}
