//! Focus and shared-signal registry for kOS cockpit prop monitors.
//!
//! One [`MonitorRegistry`] per flight scene arbitrates which monitor owns the
//! keyboard and holds the per-vessel button/flag tables that both the cockpit
//! widgets and running scripts read and write. [`FlightRuntime`] drives it
//! from host events.

pub mod bindings;
pub mod error;
pub mod identity;
pub mod input;
pub mod logging;
pub mod metrics;
pub mod monitor;
pub mod registry;
pub mod runtime;
pub mod script;
pub mod tokens;
pub mod width;

#[cfg(test)]
mod test_support;

pub use bindings::{
    BindingSlot, KeyBinding, KeyBindingHost, MemoryKeyBindings, RememberedBindings,
};
pub use error::{PropMonitorError, Result};
pub use identity::{MonitorId, PartId, VesselKey};
pub use input::{InputSymbol, TerminalKey, decode_key};
pub use logging::{
    FileSink, LogEvent, LogFields, LogLevel, LogSink, Logger, LoggingError, LoggingResult,
    MemorySink,
};
pub use metrics::{MetricSnapshot, RegistryMetrics};
pub use monitor::{BlinkTimer, MonitorConfig, TerminalMonitor};
pub use registry::{
    ButtonDelegate, ButtonDelegates, FocusToken, MonitorInstance, MonitorRegistry,
    NavigationButton, SharedMonitor, SharedRegistry, SignalDefaults, SignalKind, SignalTables,
    VesselMonitorSet, lock_registry,
};
pub use runtime::{
    EventFlow, FlightHost, FlightRuntime, FrameContext, HostEvent, Processor, RuntimeConfig,
    ScreenSnapshot, SharedProcessor,
};
pub use script::{
    BindingTable, DelegateApi, MemoryBindingTable, ProcessorRebinder, ScriptAddon, SignalApi,
    SignalValue, bind_signals,
};
pub use tokens::{DisplayTemplate, TemplateValues};
pub use width::{clip_to_width, display_width};
