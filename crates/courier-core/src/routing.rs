//! Channel routing table.
//!
//! Maps each channel id to the subscriber sessions interested in it. The
//! table stores session *keys* only; session state is owned by the
//! engine's session table, never borrowed from here.

use crate::channels::ChannelSet;

/// Channel id to subscriber-key index, fixed at 256 entries.
#[derive(Debug)]
pub struct RoutingTable<K> {
    subscribers: [Vec<K>; 256],
}

impl<K: Copy + PartialEq> RoutingTable<K> {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscribers: std::array::from_fn(|_| Vec::new()),
        }
    }

    /// Register `key` as a subscriber of `channel`.
    ///
    /// Returns `true` if the key was not already registered.
    pub fn insert(&mut self, channel: u8, key: K) -> bool {
        let entry = &mut self.subscribers[channel as usize];
        if entry.contains(&key) {
            return false;
        }
        entry.push(key);
        true
    }

    /// Remove `key` from `channel`. Returns `true` if it was registered.
    pub fn remove(&mut self, channel: u8, key: K) -> bool {
        let entry = &mut self.subscribers[channel as usize];
        match entry.iter().position(|k| *k == key) {
            Some(idx) => {
                entry.swap_remove(idx);
                true
            }
            None => false,
        }
    }

    /// Remove `key` from every channel in `channels`.
    ///
    /// Used at session teardown with the session's own interest set.
    pub fn remove_session(&mut self, key: K, channels: &ChannelSet) {
        for channel in channels.iter() {
            self.remove(channel, key);
        }
    }

    /// The subscribers of `channel`.
    #[must_use]
    pub fn subscribers(&self, channel: u8) -> &[K] {
        &self.subscribers[channel as usize]
    }

    /// Number of subscribers on `channel`.
    #[must_use]
    pub fn subscriber_count(&self, channel: u8) -> usize {
        self.subscribers[channel as usize].len()
    }
}

impl<K: Copy + PartialEq> Default for RoutingTable<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_is_deduplicated() {
        let mut table: RoutingTable<u32> = RoutingTable::new();

        assert!(table.insert(7, 1));
        assert!(!table.insert(7, 1));
        assert!(table.insert(7, 2));

        assert_eq!(table.subscriber_count(7), 2);
        assert_eq!(table.subscriber_count(8), 0);
    }

    #[test]
    fn remove_unknown_key_is_noop() {
        let mut table: RoutingTable<u32> = RoutingTable::new();
        table.insert(0, 1);

        assert!(!table.remove(0, 2));
        assert!(!table.remove(1, 1));
        assert_eq!(table.subscriber_count(0), 1);
    }

    #[test]
    fn remove_session_clears_every_channel() {
        let mut table: RoutingTable<u32> = RoutingTable::new();
        let channels: ChannelSet = [3, 9].into_iter().collect();

        for channel in channels.iter() {
            table.insert(channel, 5);
            table.insert(channel, 6);
        }

        table.remove_session(5, &channels);

        assert_eq!(table.subscribers(3), &[6]);
        assert_eq!(table.subscribers(9), &[6]);
    }
}
