use std::collections::BTreeMap;

/// A declared packet: its name and the argument bytes that follow its key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub name: String,
    pub arg_size: usize,
}

/// Table of packet keys shared by both ends of the link.
#[derive(Debug, Clone, Default)]
pub struct Keyring {
    slots: BTreeMap<u8, Slot>,
}

impl Keyring {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `key` with a fixed argument size, replacing any earlier
    /// declaration.
    pub fn with(mut self, key: u8, name: impl Into<String>, arg_size: usize) -> Self {
        self.insert(key, name, arg_size);
        self
    }

    pub fn insert(&mut self, key: u8, name: impl Into<String>, arg_size: usize) {
        self.slots.insert(
            key,
            Slot {
                name: name.into(),
                arg_size,
            },
        );
    }

    pub fn get(&self, key: u8) -> Option<&Slot> {
        self.slots.get(&key)
    }

    pub fn contains(&self, key: u8) -> bool {
        self.slots.contains_key(&key)
    }

    /// Declared keys in ascending order.
    pub fn keys(&self) -> impl Iterator<Item = u8> + '_ {
        self.slots.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_declaration_wins() {
        let keyring = Keyring::new().with(3, "report", 6).with(3, "report", 8);
        assert_eq!(keyring.len(), 1);
        assert_eq!(keyring.get(3).map(|s| s.arg_size), Some(8));
    }

    #[test]
    fn keys_are_sorted() {
        let keyring = Keyring::new().with(7, "b", 0).with(1, "a", 2);
        assert_eq!(keyring.keys().collect::<Vec<_>>(), vec![1, 7]);
        assert!(!keyring.contains(2));
    }
}
