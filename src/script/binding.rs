use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PropMonitorError, Result};
use crate::identity::{MonitorId, VesselKey};
use crate::registry::{MonitorRegistry, SharedRegistry, SignalKind, lock_registry};

/// Value crossing the script boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SignalValue {
    Bool(bool),
    Text(String),
}

impl SignalValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SignalValue::Bool(value) => Some(*value),
            SignalValue::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            SignalValue::Text(value) => Some(value),
            SignalValue::Bool(_) => None,
        }
    }
}

impl fmt::Display for SignalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalValue::Bool(value) => write!(f, "{value}"),
            SignalValue::Text(value) => f.write_str(value),
        }
    }
}

pub type SignalGetter = Box<dyn Fn() -> Result<SignalValue> + Send>;
pub type SignalSetter = Box<dyn Fn(SignalValue) -> Result<()> + Send>;

/// Named getter/setter table a processor exposes to its scripts.
pub trait BindingTable: Send {
    fn add_getter(&mut self, name: String, getter: SignalGetter);
    fn add_setter(&mut self, name: String, setter: SignalSetter);
}

/// Binding table kept in memory; scripts resolve names with `get`/`set`.
#[derive(Default)]
pub struct MemoryBindingTable {
    getters: HashMap<String, SignalGetter>,
    setters: HashMap<String, SignalSetter>,
}

impl MemoryBindingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Result<SignalValue>> {
        self.getters.get(name).map(|getter| getter())
    }

    pub fn set(&self, name: &str, value: SignalValue) -> Option<Result<()>> {
        self.setters.get(name).map(|setter| setter(value))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.getters.contains_key(name) || self.setters.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.getters.keys().cloned().collect();
        names.sort();
        names
    }
}

impl BindingTable for MemoryBindingTable {
    fn add_getter(&mut self, name: String, getter: SignalGetter) {
        self.getters.insert(name, getter);
    }

    fn add_setter(&mut self, name: String, setter: SignalSetter) {
        self.setters.insert(name, setter);
    }
}

/// Register `BUTTON{n}`, `BUTTON{n}LABEL`, `FLAG{n}` and `FLAG{n}LABEL` for
/// every signal the monitor has. Closures resolve the monitor by id on each
/// call so docking or a rebuilt widget never leaves them pointing at a stale
/// index. Returns the number of names registered.
pub fn bind_signals(
    table: &mut dyn BindingTable,
    shared: &SharedRegistry,
    registry: &MonitorRegistry,
    monitor: MonitorId,
) -> Result<usize> {
    let vessel = registry
        .owner_of(monitor)
        .ok_or(PropMonitorError::MonitorNotFound(monitor))?;
    let set = registry.vessel_set(vessel)?;
    let index = set
        .index_of(monitor)
        .ok_or(PropMonitorError::MonitorNotFound(monitor))?;

    let mut registered = 0;
    for kind in [SignalKind::Button, SignalKind::Flag] {
        for number in set.signal_numbers(index, kind)? {
            let prefix = kind.binding_prefix();
            bind_state(table, shared, monitor, kind, number, format!("{prefix}{number}"));
            bind_label(table, shared, monitor, kind, number, format!("{prefix}{number}LABEL"));
            registered += 2;
        }
    }
    Ok(registered)
}

fn bind_state(
    table: &mut dyn BindingTable,
    shared: &SharedRegistry,
    monitor: MonitorId,
    kind: SignalKind,
    number: usize,
    name: String,
) {
    let registry = SharedRegistry::clone(shared);
    table.add_getter(
        name.clone(),
        Box::new(move || {
            with_monitor(&registry, monitor, |reg, vessel, index| {
                reg.vessel_set(vessel)?
                    .state(index, kind, number)
                    .map(SignalValue::Bool)
            })
        }),
    );

    let registry = SharedRegistry::clone(shared);
    table.add_setter(
        name.clone(),
        Box::new(move |value| {
            let value = value.as_bool().ok_or_else(|| PropMonitorError::SignalType {
                name: name.clone(),
            })?;
            with_monitor_mut(&registry, monitor, |reg, vessel, index| {
                reg.vessel_set_mut(vessel)?
                    .set_state(index, kind, number, value)
            })
        }),
    );
}

fn bind_label(
    table: &mut dyn BindingTable,
    shared: &SharedRegistry,
    monitor: MonitorId,
    kind: SignalKind,
    number: usize,
    name: String,
) {
    let registry = SharedRegistry::clone(shared);
    table.add_getter(
        name.clone(),
        Box::new(move || {
            with_monitor(&registry, monitor, |reg, vessel, index| {
                reg.vessel_set(vessel)?
                    .label(index, kind, number)
                    .map(SignalValue::Text)
            })
        }),
    );

    let registry = SharedRegistry::clone(shared);
    table.add_setter(
        name.clone(),
        Box::new(move |value| {
            let SignalValue::Text(value) = value else {
                return Err(PropMonitorError::SignalType { name: name.clone() });
            };
            with_monitor_mut(&registry, monitor, |reg, vessel, index| {
                reg.vessel_set_mut(vessel)?
                    .set_label(index, kind, number, value)
            })
        }),
    );
}

fn with_monitor<T>(
    shared: &SharedRegistry,
    monitor: MonitorId,
    read: impl FnOnce(&MonitorRegistry, VesselKey, usize) -> Result<T>,
) -> Result<T> {
    let registry = lock_registry(shared)?;
    let (vessel, index) = locate(&registry, monitor)?;
    read(&registry, vessel, index)
}

fn with_monitor_mut<T>(
    shared: &SharedRegistry,
    monitor: MonitorId,
    write: impl FnOnce(&mut MonitorRegistry, VesselKey, usize) -> Result<T>,
) -> Result<T> {
    let mut registry = lock_registry(shared)?;
    let (vessel, index) = locate(&registry, monitor)?;
    write(&mut registry, vessel, index)
}

fn locate(
    registry: &MonitorRegistry,
    monitor: MonitorId,
) -> Result<(VesselKey, usize)> {
    let vessel = registry
        .owner_of(monitor)
        .ok_or(PropMonitorError::MonitorNotFound(monitor))?;
    let index = registry
        .vessel_set(vessel)?
        .index_of(monitor)
        .ok_or(PropMonitorError::MonitorNotFound(monitor))?;
    Ok((vessel, index))
}
