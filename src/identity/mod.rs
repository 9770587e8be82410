//! Identifiers shared between the host, the registry, and the script API.
//!
//! Vessel and monitor ids are UUIDs so they survive docking and scene reloads
//! unchanged. Parts use the host's numeric flight id.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Host-assigned identity of a vessel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VesselKey(Uuid);

impl VesselKey {
    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for VesselKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}

/// Stable identity of one on-screen monitor widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MonitorId(Uuid);

impl MonitorId {
    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// First eight hex digits, the form scripts usually print.
    pub fn short(&self) -> String {
        let mut text = self.0.hyphenated().to_string();
        text.truncate(8);
        text
    }

    /// Accepts either the full hyphenated form or the eight digit short form.
    pub fn matches_str(&self, guid: &str) -> bool {
        let full = self.0.hyphenated().to_string();
        guid.eq_ignore_ascii_case(&full) || guid.eq_ignore_ascii_case(&full[..8])
    }
}

impl fmt::Display for MonitorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}

/// Host flight id of a part carrying a widget or a processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartId(pub u32);

impl fmt::Display for PartId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "part#{}", self.0)
    }
}
