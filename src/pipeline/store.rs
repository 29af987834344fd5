//! Concurrent append-only packet store.
//!
//! Readers share an `RwLock`; inserts and `clear` take it exclusively for
//! the duration of one operation. Ids are assigned under the write lock, so
//! they are 1-based, strictly increasing and gap-free within one generation
//! (between two `clear` calls). A record with id `n` lives at index `n - 1`.

use crate::error::{PacketScopeError, Result};
use crate::types::DecodedPacket;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct StoreInner {
    packets: Vec<DecodedPacket>,
    last_id: u64,
}

/// Shared repository of decoded packets
#[derive(Debug, Default)]
pub struct PacketStore {
    inner: RwLock<StoreInner>,
}

impl PacketStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a packet, assigning it the next id
    ///
    /// Returns the assigned id.
    pub fn add_packet(&self, mut packet: DecodedPacket) -> u64 {
        let mut inner = self.write();
        inner.last_id += 1;
        packet.id = inner.last_id;
        inner.packets.push(packet);
        inner.last_id
    }

    /// Get a copy of the packet with the given id
    ///
    /// Fails with [`PacketScopeError::OutOfRange`] unless `1 <= id <= count()`.
    pub fn get_by_id(&self, id: u64) -> Result<DecodedPacket> {
        let inner = self.read();
        let count = inner.packets.len();
        id.checked_sub(1)
            .and_then(|index| usize::try_from(index).ok())
            .and_then(|index| inner.packets.get(index))
            .cloned()
            .ok_or(PacketScopeError::OutOfRange { id, count })
    }

    /// Number of stored packets
    pub fn count(&self) -> usize {
        self.read().packets.len()
    }

    /// Whether the store holds no packets
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Point-in-time copy of every stored packet
    pub fn get_all_packets(&self) -> Vec<DecodedPacket> {
        self.read().packets.clone()
    }

    /// Copy of every packet with an id greater than `last_seen_id`
    ///
    /// Lets a poller fetch only what arrived since its previous call.
    pub fn get_since(&self, last_seen_id: u64) -> Vec<DecodedPacket> {
        let inner = self.read();
        let start = usize::try_from(last_seen_id)
            .unwrap_or(usize::MAX)
            .min(inner.packets.len());
        inner.packets[start..].to_vec()
    }

    /// Drop every packet and restart numbering at 1
    pub fn clear(&self) {
        let mut inner = self.write();
        // Replacing the vector releases its allocation.
        inner.packets = Vec::new();
        inner.last_id = 0;
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreInner> {
        // A panicking writer cannot leave a half-pushed record behind, so the data stays usable.
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Arc;
    use std::thread;

    fn packet(protocol: &str) -> DecodedPacket {
        DecodedPacket {
            id: 0,
            timestamp: Utc::now(),
            data: vec![0xde, 0xad],
            captured_len: 2,
            frame_len: 2,
            src_addr: "10.0.0.1".to_string(),
            dst_addr: "10.0.0.2".to_string(),
            protocol: protocol.to_string(),
            info: String::new(),
            layer_summaries: Vec::new(),
        }
    }

    #[test]
    fn test_ids_start_at_one() {
        let store = PacketStore::new();
        assert_eq!(store.add_packet(packet("TCP")), 1);
        assert_eq!(store.add_packet(packet("UDP")), 2);

        let first = store.get_by_id(1).unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(first.protocol, "TCP");
        assert_eq!(store.get_by_id(2).unwrap().protocol, "UDP");
        assert_eq!(store.count(), 2);
    }

    #[test]
    fn test_get_by_id_out_of_range() {
        let store = PacketStore::new();
        assert!(matches!(
            store.get_by_id(1),
            Err(PacketScopeError::OutOfRange { id: 1, count: 0 })
        ));

        store.add_packet(packet("TCP"));
        assert!(store.get_by_id(0).unwrap_err().is_out_of_range());
        assert!(store.get_by_id(2).unwrap_err().is_out_of_range());
        assert!(store.get_by_id(u64::MAX).unwrap_err().is_out_of_range());
        assert!(store.get_by_id(1).is_ok());
    }

    #[test]
    fn test_clear_resets_numbering() {
        let store = PacketStore::new();
        for _ in 0..5 {
            store.add_packet(packet("ARP"));
        }
        store.clear();
        assert!(store.is_empty());
        assert!(store.get_by_id(1).is_err());
        assert_eq!(store.add_packet(packet("ICMP")), 1);
        assert_eq!(store.get_by_id(1).unwrap().protocol, "ICMP");
    }

    #[test]
    fn test_get_all_is_a_snapshot() {
        let store = PacketStore::new();
        store.add_packet(packet("TCP"));
        let snapshot = store.get_all_packets();
        store.add_packet(packet("UDP"));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(store.get_all_packets().len(), 2);
    }

    #[test]
    fn test_get_since() {
        let store = PacketStore::new();
        for _ in 0..4 {
            store.add_packet(packet("DNS"));
        }
        let ids: Vec<u64> = store.get_since(2).iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![3, 4]);
        assert!(store.get_since(4).is_empty());
        assert!(store.get_since(100).is_empty());
        assert_eq!(store.get_since(0).len(), 4);
    }

    #[test]
    fn test_concurrent_writers_produce_gap_free_ids() {
        let store = Arc::new(PacketStore::new());
        let writers: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                thread::spawn(move || {
                    for _ in 0..200 {
                        store.add_packet(packet("UDP"));
                    }
                })
            })
            .collect();
        let reader = {
            let store = store.clone();
            thread::spawn(move || {
                for _ in 0..200 {
                    let count = store.count();
                    if count > 0 {
                        assert!(store.get_by_id(count as u64).is_ok());
                    }
                }
            })
        };

        for handle in writers {
            handle.join().unwrap();
        }
        reader.join().unwrap();

        let ids: Vec<u64> = store.get_all_packets().iter().map(|p| p.id).collect();
        let expected: Vec<u64> = (1..=1600).collect();
        assert_eq!(ids, expected);
    }
}
