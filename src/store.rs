//! Persistent configuration store
//!
//! Settings are small named blobs. [`FileStore`] keeps all of them in one
//! protobuf image that is rewritten on every `set`.

use prost::Message;
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Setting names used by the built-in commands
pub mod keys {
    pub const MAC: &str = "net.mac";
    /// Address, netmask and gateway as one 12-byte block
    pub const NETWORK: &str = "net.ipv4";
}

/// Errors raised by a configuration store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store image is corrupt: {0}")]
    Decode(#[from] prost::DecodeError),
}

/// Ethernet address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    pub const DEFAULT: Self = Self([0xac, 0xde, 0x48, 0xfd, 0x0f, 0xd0]);
}

impl std::fmt::Display for MacAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let m = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            m[0], m[1], m[2], m[3], m[4], m[5]
        )
    }
}

/// IPv4 addressing of the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkConfig {
    pub ip: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub gateway: Ipv4Addr,
}

impl NetworkConfig {
    pub const ENCODED_LEN: usize = 12;

    pub fn encode(&self) -> [u8; Self::ENCODED_LEN] {
        let mut raw = [0u8; Self::ENCODED_LEN];
        raw[..4].copy_from_slice(&self.ip.octets());
        raw[4..8].copy_from_slice(&self.netmask.octets());
        raw[8..].copy_from_slice(&self.gateway.octets());
        raw
    }

    pub fn decode(raw: &[u8]) -> Option<Self> {
        let raw = <[u8; Self::ENCODED_LEN]>::try_from(raw).ok()?;
        let addr = |at: usize| Ipv4Addr::new(raw[at], raw[at + 1], raw[at + 2], raw[at + 3]);
        Some(Self {
            ip: addr(0),
            netmask: addr(4),
            gateway: addr(8),
        })
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            ip: Ipv4Addr::new(192, 168, 23, 244),
            netmask: Ipv4Addr::new(255, 255, 255, 0),
            gateway: Ipv4Addr::new(192, 168, 23, 1),
        }
    }
}

/// Get/set contract for named settings
pub trait ConfigStore: Send {
    fn get(&self, key: &str) -> Option<Vec<u8>>;

    fn set(&mut self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    /// Stored MAC address, or the factory default
    fn mac(&self) -> MacAddr {
        self.get(keys::MAC)
            .and_then(|raw| <[u8; 6]>::try_from(raw.as_slice()).ok())
            .map(MacAddr)
            .unwrap_or(MacAddr::DEFAULT)
    }

    fn set_mac(&mut self, mac: MacAddr) -> Result<(), StoreError> {
        self.set(keys::MAC, &mac.0)
    }

    /// Stored addressing, or the factory default
    fn network(&self) -> NetworkConfig {
        self.get(keys::NETWORK)
            .and_then(|raw| NetworkConfig::decode(&raw))
            .unwrap_or_default()
    }

    /// Written as a single entry: either all three addresses change or none
    fn set_network(&mut self, network: &NetworkConfig) -> Result<(), StoreError> {
        self.set(keys::NETWORK, &network.encode())
    }
}

/// Volatile store, lost on restart
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: BTreeMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

/// One setting in the on-disk image
#[derive(Clone, PartialEq, Message)]
pub struct StoreEntry {
    #[prost(string, tag = "1")]
    pub key: String,

    #[prost(bytes = "vec", tag = "2")]
    pub value: Vec<u8>,
}

/// On-disk image of a [`FileStore`]
#[derive(Clone, PartialEq, Message)]
pub struct StoreImage {
    #[prost(message, repeated, tag = "1")]
    pub entries: Vec<StoreEntry>,
}

/// Store backed by a single file
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    cache: MemoryStore,
}

impl FileStore {
    /// Open a store, loading the image if the file exists
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let mut cache = MemoryStore::new();

        match std::fs::read(&path) {
            Ok(raw) => {
                let image = StoreImage::decode(raw.as_slice())?;
                for entry in image.entries {
                    cache.entries.insert(entry.key, entry.value);
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        Ok(Self { path, cache })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), StoreError> {
        let image = StoreImage {
            entries: self
                .cache
                .entries
                .iter()
                .map(|(key, value)| StoreEntry {
                    key: key.clone(),
                    value: value.clone(),
                })
                .collect(),
        };

        // atomic replace
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, image.encode_to_vec())?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl ConfigStore for FileStore {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.cache.get(key)
    }

    fn set(&mut self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let previous = self.cache.get(key);
        self.cache.set(key, value)?;

        if let Err(e) = self.flush() {
            // roll back to what is on disk
            match previous {
                Some(old) => self.cache.entries.insert(key.to_string(), old),
                None => self.cache.entries.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_empty() {
        let store = MemoryStore::new();
        assert_eq!(store.mac(), MacAddr::DEFAULT);
        assert_eq!(store.network(), NetworkConfig::default());
    }

    #[test]
    fn test_mac_display() {
        let mac = MacAddr([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0x0f]);
        assert_eq!(mac.to_string(), "aa:bb:cc:dd:ee:0f");
    }

    #[test]
    fn test_network_round_trip() {
        let mut store = MemoryStore::new();
        let network = NetworkConfig {
            ip: Ipv4Addr::new(10, 0, 0, 5),
            netmask: Ipv4Addr::new(255, 0, 0, 0),
            gateway: Ipv4Addr::new(10, 0, 0, 1),
        };
        store.set_network(&network).unwrap();
        assert_eq!(store.network(), network);
        assert_eq!(
            store.get(keys::NETWORK).unwrap(),
            [10, 0, 0, 5, 255, 0, 0, 0, 10, 0, 0, 1]
        );
    }

    #[test]
    fn test_malformed_entry_falls_back() {
        let mut store = MemoryStore::new();
        store.set(keys::MAC, &[1, 2, 3]).unwrap();
        store.set(keys::NETWORK, &[10, 0, 0, 5]).unwrap();
        assert_eq!(store.mac(), MacAddr::DEFAULT);
        assert_eq!(store.network(), NetworkConfig::default());
    }

    #[test]
    fn test_file_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ecmd.store");

        let mut store = FileStore::open(&path).unwrap();
        store
            .set_mac(MacAddr([0x02, 0, 0, 0, 0, 0x01]))
            .unwrap();
        drop(store);

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.mac(), MacAddr([0x02, 0, 0, 0, 0, 0x01]));
        assert_eq!(reopened.path(), path.as_path());
    }

    #[test]
    fn test_file_store_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ecmd.store");
        std::fs::write(&path, [0xff, 0xff, 0xff]).unwrap();

        assert!(matches!(FileStore::open(&path), Err(StoreError::Decode(_))));
    }
}
