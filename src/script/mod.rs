//! Script-facing surface: the per-vessel addon, processor binding tables,
//! and the rebinder that keeps those tables current.

mod api;
mod binding;
mod rebind;

pub use api::{DelegateApi, ScriptAddon, SignalApi};
pub use binding::{
    BindingTable, MemoryBindingTable, SignalGetter, SignalSetter, SignalValue, bind_signals,
};
pub use rebind::ProcessorRebinder;
