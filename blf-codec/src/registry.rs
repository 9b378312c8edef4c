//! Interface/channel registry
//!
//! BLF identifies a bus by (protocol, channel, hardware channel); downstream
//! consumers want a dense interface-id space. The registry assigns ids in
//! discovery order and supports deferred naming: a channel's human name may
//! arrive in a metadata object before the first frame on that channel, in
//! which case interface creation picks the pending name up. Names arriving
//! after an interface was created do not rename it; discovery-order id/name
//! stability matters more to downstream consumers than late metadata.

use std::collections::HashMap;
use std::fmt;

/// Sentinel channel value meaning "no hardware channel"
pub const NO_HW_CHANNEL: u16 = u16::MAX;

/// Bus protocol of an interface key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Can,
    FlexRay,
    Lin,
    Ethernet,
    Wlan,
    /// Pseudo-protocol for metadata/status interfaces
    UpperPdu,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Can => write!(f, "CAN"),
            Protocol::FlexRay => write!(f, "FR"),
            Protocol::Lin => write!(f, "LIN"),
            Protocol::Ethernet => write!(f, "ETH"),
            Protocol::Wlan => write!(f, "WLAN"),
            Protocol::UpperPdu => write!(f, "UPPER"),
        }
    }
}

/// Key identifying one bus attachment point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InterfaceKey {
    pub protocol: Protocol,
    pub channel: u16,
    pub hw_channel: u16,
}

impl InterfaceKey {
    pub fn new(protocol: Protocol, channel: u16, hw_channel: u16) -> Self {
        InterfaceKey {
            protocol,
            channel,
            hw_channel,
        }
    }

    /// Key without a hardware channel
    pub fn simple(protocol: Protocol, channel: u16) -> Self {
        Self::new(protocol, channel, NO_HW_CHANNEL)
    }

    fn default_name(&self) -> String {
        if self.hw_channel == NO_HW_CHANNEL {
            format!("{}-{}", self.protocol, self.channel)
        } else {
            format!("{}-{}-{}", self.protocol, self.channel, self.hw_channel)
        }
    }
}

/// A created interface slot
#[derive(Debug, Clone)]
pub struct InterfaceInfo {
    pub key: InterfaceKey,
    pub name: String,
}

/// Registry mapping interface keys to dense ids, with deferred naming
#[derive(Debug, Default)]
pub struct InterfaceRegistry {
    ids: HashMap<InterfaceKey, u32>,
    pending_names: HashMap<InterfaceKey, String>,
    entries: Vec<InterfaceInfo>,
}

impl InterfaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the interface id for `key`, creating it on first use.
    ///
    /// Name precedence on creation: a pending name registered for the key,
    /// then `fallback_name`, then a synthesized `<PROTO>-<channel>` name.
    /// Ids are assigned monotonically from 0 in discovery order and are
    /// never reused.
    pub fn lookup_or_create(&mut self, key: InterfaceKey, fallback_name: Option<&str>) -> u32 {
        if let Some(&id) = self.ids.get(&key) {
            return id;
        }
        let name = match self.pending_names.remove(&key) {
            Some(pending) => pending,
            None => fallback_name
                .map(str::to_owned)
                .unwrap_or_else(|| key.default_name()),
        };
        let id = self.entries.len() as u32;
        log::debug!("new interface {}: {} ({:?})", id, name, key);
        self.entries.push(InterfaceInfo { key, name });
        self.ids.insert(key, id);
        id
    }

    /// Store a name for a future `lookup_or_create` of `key`.
    ///
    /// Does not rename an already-created interface. With `force_overwrite`
    /// a later announcement replaces an earlier pending name, otherwise the
    /// first one wins. Ethernet keys also register a `STATUS-<name>` sibling
    /// under the Upper-PDU pseudo-protocol so status and phy-state records
    /// resolve next to their data interface.
    pub fn register_pending_name(&mut self, key: InterfaceKey, name: &str, force_overwrite: bool) {
        if self.ids.contains_key(&key) {
            log::debug!(
                "interface {:?} already created, not renaming to {:?}",
                key,
                name
            );
            return;
        }
        if force_overwrite || !self.pending_names.contains_key(&key) {
            self.pending_names.insert(key, name.to_owned());
        }
        if key.protocol == Protocol::Ethernet {
            let status_key =
                InterfaceKey::new(Protocol::UpperPdu, key.channel, key.hw_channel);
            if !self.ids.contains_key(&status_key)
                && (force_overwrite || !self.pending_names.contains_key(&status_key))
            {
                self.pending_names
                    .insert(status_key, format!("STATUS-{}", name));
            }
        }
    }

    /// Look up an interface by id
    pub fn get(&self, id: u32) -> Option<&InterfaceInfo> {
        self.entries.get(id as usize)
    }

    /// Number of created interfaces
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate created interfaces in id order
    pub fn iter(&self) -> impl Iterator<Item = (u32, &InterfaceInfo)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, info)| (i as u32, info))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_and_discovery_order() {
        let mut reg = InterfaceRegistry::new();
        let can1 = InterfaceKey::simple(Protocol::Can, 1);
        let can2 = InterfaceKey::simple(Protocol::Can, 2);
        let lin1 = InterfaceKey::simple(Protocol::Lin, 1);

        assert_eq!(reg.lookup_or_create(can1, None), 0);
        assert_eq!(reg.lookup_or_create(can2, None), 1);
        assert_eq!(reg.lookup_or_create(can1, None), 0);
        assert_eq!(reg.lookup_or_create(lin1, None), 2);
        assert_eq!(reg.len(), 3);
        assert_eq!(reg.get(0).unwrap().name, "CAN-1");
        assert_eq!(reg.get(2).unwrap().name, "LIN-1");
    }

    #[test]
    fn test_hw_channel_distinguishes_keys() {
        let mut reg = InterfaceRegistry::new();
        let a = InterfaceKey::new(Protocol::Ethernet, 1, 0);
        let b = InterfaceKey::new(Protocol::Ethernet, 1, 1);
        assert_ne!(reg.lookup_or_create(a, None), reg.lookup_or_create(b, None));
        assert_eq!(reg.get(0).unwrap().name, "ETH-1-0");
    }

    #[test]
    fn test_pending_name_used_on_create() {
        let mut reg = InterfaceRegistry::new();
        let key = InterfaceKey::simple(Protocol::Can, 1);
        reg.register_pending_name(key, "Powertrain", false);
        assert_eq!(reg.lookup_or_create(key, None), 0);
        assert_eq!(reg.get(0).unwrap().name, "Powertrain");

        // pending entry is consumed
        let key2 = InterfaceKey::simple(Protocol::Can, 2);
        assert_eq!(reg.lookup_or_create(key2, None), 1);
        assert_eq!(reg.get(1).unwrap().name, "CAN-2");
    }

    #[test]
    fn test_no_retroactive_rename() {
        let mut reg = InterfaceRegistry::new();
        let key = InterfaceKey::simple(Protocol::Can, 1);
        reg.lookup_or_create(key, None);
        reg.register_pending_name(key, "LateName", true);
        assert_eq!(reg.get(0).unwrap().name, "CAN-1");
    }

    #[test]
    fn test_pending_overwrite_rules() {
        let mut reg = InterfaceRegistry::new();
        let key = InterfaceKey::simple(Protocol::Lin, 3);
        reg.register_pending_name(key, "first", false);
        reg.register_pending_name(key, "second", false);
        assert_eq!(reg.lookup_or_create(key, None), 0);
        assert_eq!(reg.get(0).unwrap().name, "first");

        let key2 = InterfaceKey::simple(Protocol::Lin, 4);
        reg.register_pending_name(key2, "first", false);
        reg.register_pending_name(key2, "second", true);
        reg.lookup_or_create(key2, None);
        assert_eq!(reg.get(1).unwrap().name, "second");
    }

    #[test]
    fn test_ethernet_registers_status_sibling() {
        let mut reg = InterfaceRegistry::new();
        let eth = InterfaceKey::new(Protocol::Ethernet, 1, 0);
        reg.register_pending_name(eth, "Backbone", false);

        let status = InterfaceKey::new(Protocol::UpperPdu, 1, 0);
        reg.lookup_or_create(status, None);
        assert_eq!(reg.get(0).unwrap().name, "STATUS-Backbone");
    }

    #[test]
    fn test_fallback_name() {
        let mut reg = InterfaceRegistry::new();
        let key = InterfaceKey::simple(Protocol::FlexRay, 1);
        reg.lookup_or_create(key, Some("ChassisFR"));
        assert_eq!(reg.get(0).unwrap().name, "ChassisFR");
    }
}
