//! Probe configuration consumed by the decoders.
//!
//! A probe describes one configured flow source: its name, how interface
//! values should be interpreted, the per-exporter quirk switches, and
//! which chatty log categories are enabled. The struct is immutable for
//! the lifetime of a session.

use serde::Serialize;

/// How the input/output fields of emitted records are populated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InterfaceKind {
    /// Use ingressInterface / egressInterface.
    Snmp,
    /// Use vlanId / postVlanId.
    Vlan,
}

/// Per-probe behavioral switches for known-odd exporters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Quirks(pub u32);

impl Quirks {
    /// Promote firewall events (Cisco ASA) to flow records.
    pub const FW_EVENT: Quirks = Quirks(1 << 0);
    /// The exporter abuses post volume counters as reverse volumes.
    pub const NF9_OUT_IS_REVERSE: Quirks = Quirks(1 << 1);
    /// The exporter reports sysUpTime in seconds instead of ms.
    pub const NF9_SYSUPTIME_SECS: Quirks = Quirks(1 << 2);
    /// The exporter never fills packet counts; accept zero packets.
    pub const ZERO_PACKETS: Quirks = Quirks(1 << 3);
    /// The exporter omits address elements; accept records without IPs.
    pub const MISSING_IPS: Quirks = Quirks(1 << 4);

    pub fn contains(self, other: Quirks) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for Quirks {
    type Output = Quirks;

    fn bitor(self, rhs: Quirks) -> Quirks {
        Quirks(self.0 | rhs.0)
    }
}

/// Log categories that are too chatty to leave unconditionally enabled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LogFlags(pub u32);

impl LogFlags {
    /// Log which time elements produced each record's timestamps.
    pub const TIMESTAMPS: LogFlags = LogFlags(1 << 0);
    /// Log sampling options records.
    pub const SAMPLING: LogFlags = LogFlags(1 << 1);
    /// Log ignored firewall events.
    pub const FIREWALL: LogFlags = LogFlags(1 << 2);
    /// Log template arrival and classification outcomes.
    pub const TEMPLATES: LogFlags = LogFlags(1 << 3);

    pub fn contains(self, other: LogFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for LogFlags {
    type Output = LogFlags;

    fn bitor(self, rhs: LogFlags) -> LogFlags {
        LogFlags(self.0 | rhs.0)
    }
}

/// Immutable description of one configured flow source.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeConfig {
    pub name: String,
    pub interface_kind: InterfaceKind,
    pub quirks: Quirks,
    pub log_flags: LogFlags,
}

impl ProbeConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            interface_kind: InterfaceKind::Snmp,
            quirks: Quirks::default(),
            log_flags: LogFlags::default(),
        }
    }

    pub fn with_interface_kind(mut self, kind: InterfaceKind) -> Self {
        self.interface_kind = kind;
        self
    }

    pub fn with_quirks(mut self, quirks: Quirks) -> Self {
        self.quirks = quirks;
        self
    }

    pub fn with_log_flags(mut self, flags: LogFlags) -> Self {
        self.log_flags = flags;
        self
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self::new("default")
    }
}
