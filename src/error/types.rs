use thiserror::Error;

use crate::identity::{MonitorId, PartId, VesselKey};
use crate::registry::SignalKind;

/// Unified result type for the prop monitor crate.
pub type Result<T> = std::result::Result<T, PropMonitorError>;

/// Errors surfaced by the focus and shared-signal registry.
#[derive(Debug, Error)]
pub enum PropMonitorError {
    #[error("vessel `{0}` is not registered")]
    VesselNotFound(VesselKey),
    #[error("monitor `{0}` is not registered")]
    MonitorNotFound(MonitorId),
    #[error("monitor index {index} out of range ({count} registered)")]
    MonitorIndexOutOfRange { index: usize, count: usize },
    #[error("{kind} {number} is not initialised for monitor index {index}")]
    SignalOutOfRange {
        kind: SignalKind,
        index: usize,
        number: usize,
    },
    #[error("navigation button index {0} out of range")]
    NavigationOutOfRange(i32),
    #[error("signal `{name}` received a value of the wrong type")]
    SignalType { name: String },
    #[error("monitor on {0} has not been initialised")]
    NotInitialized(PartId),
    #[error("monitor registry lock poisoned")]
    RegistryPoisoned,
    #[error("template error: {0}")]
    Template(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl PropMonitorError {
    /// True for errors naming a vessel or monitor the registry never saw.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            PropMonitorError::VesselNotFound(_) | PropMonitorError::MonitorNotFound(_)
        )
    }

    /// True for signal-table accesses outside the initialised range.
    pub fn is_range(&self) -> bool {
        matches!(
            self,
            PropMonitorError::MonitorIndexOutOfRange { .. }
                | PropMonitorError::SignalOutOfRange { .. }
                | PropMonitorError::NavigationOutOfRange(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_error_families() {
        let missing = PropMonitorError::VesselNotFound(VesselKey::new_v4());
        assert!(missing.is_not_found());
        assert!(!missing.is_range());

        let range = PropMonitorError::SignalOutOfRange {
            kind: SignalKind::Button,
            index: 0,
            number: 9,
        };
        assert!(range.is_range());
        assert_eq!(
            range.to_string(),
            "button 9 is not initialised for monitor index 0"
        );
    }
}
