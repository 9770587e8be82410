//! Focus & shared-signal registry.
//!
//! [`MonitorRegistry`] is the process-wide arbiter of keyboard focus and the
//! owner of every vessel's [`VesselMonitorSet`]. Monitor widgets implement
//! [`MonitorInstance`] and receive decoded keystrokes while they hold focus.

mod core;
mod instance;
mod signals;
mod vessel;

pub use self::core::{FocusToken, MonitorRegistry, SharedRegistry, lock_registry};
pub use instance::{MonitorInstance, SharedMonitor};
pub use signals::{
    ButtonDelegate, ButtonDelegates, NavigationButton, SignalDefaults, SignalKind, SignalTables,
};
pub use vessel::VesselMonitorSet;
