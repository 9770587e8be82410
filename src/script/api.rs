use crate::error::{PropMonitorError, Result};
use crate::identity::VesselKey;
use crate::registry::{NavigationButton, SharedRegistry, SignalKind, lock_registry};

/// Per-vessel addon scripts reach the cockpit through.
#[derive(Clone)]
pub struct ScriptAddon {
    registry: SharedRegistry,
    vessel: VesselKey,
}

impl ScriptAddon {
    pub fn new(registry: SharedRegistry, vessel: VesselKey) -> Self {
        Self { registry, vessel }
    }

    pub fn vessel(&self) -> VesselKey {
        self.vessel
    }

    /// Whether the vessel has a monitor set at all.
    pub fn available(&self) -> bool {
        lock_registry(&self.registry)
            .map(|registry| registry.contains_vessel(self.vessel))
            .unwrap_or(false)
    }

    pub fn buttons(&self) -> SignalApi {
        SignalApi::new(self.clone(), SignalKind::Button)
    }

    pub fn flags(&self) -> SignalApi {
        SignalApi::new(self.clone(), SignalKind::Flag)
    }

    pub fn delegates(&self) -> DelegateApi {
        DelegateApi {
            addon: self.clone(),
            monitor: 0,
        }
    }

    pub fn monitor_count(&self) -> Result<usize> {
        let registry = lock_registry(&self.registry)?;
        Ok(registry.vessel_set(self.vessel)?.monitor_count())
    }

    pub fn guid(&self, index: usize) -> Result<String> {
        let registry = lock_registry(&self.registry)?;
        Ok(registry.vessel_set(self.vessel)?.monitor_at(index)?.to_string())
    }

    pub fn guid_short(&self, index: usize) -> Result<String> {
        let registry = lock_registry(&self.registry)?;
        Ok(registry.vessel_set(self.vessel)?.monitor_at(index)?.short())
    }

    /// Index of the monitor whose full or short id matches `guid`.
    pub fn index_of(&self, guid: &str) -> Result<Option<usize>> {
        let registry = lock_registry(&self.registry)?;
        Ok(registry.vessel_set(self.vessel)?.index_of_str(guid))
    }
}

/// Labels and states of one signal kind, addressed through a current
/// monitor index. Button numbers -1 through -6 select the navigation keys.
#[derive(Clone)]
pub struct SignalApi {
    addon: ScriptAddon,
    kind: SignalKind,
    monitor: usize,
}

impl SignalApi {
    fn new(addon: ScriptAddon, kind: SignalKind) -> Self {
        Self {
            addon,
            kind,
            monitor: 0,
        }
    }

    pub fn kind(&self) -> SignalKind {
        self.kind
    }

    pub fn current_monitor(&self) -> usize {
        self.monitor
    }

    pub fn set_current_monitor(&mut self, index: usize) -> Result<()> {
        let count = self.addon.monitor_count()?;
        if index >= count {
            return Err(PropMonitorError::MonitorIndexOutOfRange { index, count });
        }
        self.monitor = index;
        Ok(())
    }

    pub fn label(&self, number: i32) -> Result<String> {
        let number = self.signal_number(number)?;
        let registry = lock_registry(&self.addon.registry)?;
        registry
            .vessel_set(self.addon.vessel)?
            .label(self.monitor, self.kind, number)
    }

    pub fn set_label(&self, number: i32, value: impl Into<String>) -> Result<()> {
        let number = self.signal_number(number)?;
        let mut registry = lock_registry(&self.addon.registry)?;
        registry
            .vessel_set_mut(self.addon.vessel)?
            .set_label(self.monitor, self.kind, number, value)
    }

    pub fn state(&self, number: i32) -> Result<bool> {
        let registry = lock_registry(&self.addon.registry)?;
        let set = registry.vessel_set(self.addon.vessel)?;
        match self.navigation(number)? {
            Some(button) => set.navigation_state(self.monitor, button),
            None => set.state(self.monitor, self.kind, number as usize),
        }
    }

    pub fn set_state(&self, number: i32, value: bool) -> Result<()> {
        let mut registry = lock_registry(&self.addon.registry)?;
        let set = registry.vessel_set_mut(self.addon.vessel)?;
        match self.navigation(number)? {
            Some(button) => set.set_navigation_state(self.monitor, button, value),
            None => set.set_state(self.monitor, self.kind, number as usize, value),
        }
    }

    fn navigation(&self, number: i32) -> Result<Option<NavigationButton>> {
        if number >= 0 {
            return Ok(None);
        }
        match (self.kind, NavigationButton::from_script_index(number)) {
            (SignalKind::Button, Some(button)) => Ok(Some(button)),
            _ => Err(PropMonitorError::NavigationOutOfRange(number)),
        }
    }

    fn signal_number(&self, number: i32) -> Result<usize> {
        usize::try_from(number).map_err(|_| PropMonitorError::NavigationOutOfRange(number))
    }
}

/// Press callbacks for the current monitor's buttons. Numbers -1 through -6
/// select the navigation keys.
#[derive(Clone)]
pub struct DelegateApi {
    addon: ScriptAddon,
    monitor: usize,
}

impl DelegateApi {
    pub fn current_monitor(&self) -> usize {
        self.monitor
    }

    pub fn set_current_monitor(&mut self, index: usize) -> Result<()> {
        let count = self.addon.monitor_count()?;
        if index >= count {
            return Err(PropMonitorError::MonitorIndexOutOfRange { index, count });
        }
        self.monitor = index;
        Ok(())
    }

    /// Run `delegate` whenever button `number` is pressed. The delegate runs
    /// with the registry locked and must not call back into this addon.
    pub fn set_delegate<F>(&self, number: i32, delegate: F) -> Result<()>
    where
        F: FnMut() + Send + 'static,
    {
        let mut registry = lock_registry(&self.addon.registry)?;
        registry
            .vessel_set_mut(self.addon.vessel)?
            .set_delegate(self.monitor, number, Box::new(delegate))
    }

    pub fn clear_delegate(&self, number: i32) -> Result<bool> {
        let mut registry = lock_registry(&self.addon.registry)?;
        registry
            .vessel_set_mut(self.addon.vessel)?
            .clear_delegate(self.monitor, number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::MemoryKeyBindings;
    use crate::identity::MonitorId;
    use crate::registry::MonitorRegistry;

    fn setup() -> (SharedRegistry, VesselKey, MonitorId) {
        let mut registry = MonitorRegistry::new(Box::new(MemoryKeyBindings::new()));
        let vessel = VesselKey::new_v4();
        registry.register_vessel(vessel);
        let id = MonitorId::new_v4();
        let set = registry.vessel_set_mut(vessel).unwrap();
        let index = set.register(id);
        set.get_or_init_signal_tables(index, 4, 2).unwrap();
        (registry.into_shared(), vessel, id)
    }

    #[test]
    fn unknown_vessel_is_unavailable() {
        let (registry, _, _) = setup();
        let addon = ScriptAddon::new(registry, VesselKey::new_v4());

        assert!(!addon.available());
        assert!(addon.monitor_count().unwrap_err().is_not_found());
        assert!(addon.buttons().label(0).unwrap_err().is_not_found());
    }

    #[test]
    fn guid_lookups() {
        let (registry, vessel, id) = setup();
        let addon = ScriptAddon::new(registry, vessel);

        assert!(addon.available());
        assert_eq!(addon.monitor_count().unwrap(), 1);
        assert_eq!(addon.guid(0).unwrap(), id.to_string());
        assert_eq!(addon.guid_short(0).unwrap(), id.short());
        assert_eq!(addon.index_of(&id.short()).unwrap(), Some(0));
        assert_eq!(addon.index_of(&id.to_string()).unwrap(), Some(0));
        assert_eq!(addon.index_of("00000000").unwrap(), None);
        assert!(addon.guid(1).unwrap_err().is_range());
    }

    #[test]
    fn buttons_and_flags_are_separate_tables() {
        let (registry, vessel, _) = setup();
        let addon = ScriptAddon::new(registry, vessel);
        let buttons = addon.buttons();
        let flags = addon.flags();

        buttons.set_label(2, "STAGE").unwrap();
        buttons.set_state(3, true).unwrap();
        flags.set_state(1, true).unwrap();

        assert_eq!(buttons.label(2).unwrap(), "STAGE");
        assert!(buttons.state(3).unwrap());
        assert!(!buttons.state(1).unwrap());
        assert!(flags.state(1).unwrap());
        assert_eq!(flags.label(1).unwrap(), "-");
        assert!(buttons.label(4).unwrap_err().is_range());
        assert!(flags.state(2).unwrap_err().is_range());
    }

    #[test]
    fn negative_button_numbers_address_navigation() {
        let (registry, vessel, _) = setup();
        let addon = ScriptAddon::new(registry, vessel);
        let buttons = addon.buttons();

        buttons.set_state(-2, true).unwrap();

        assert!(buttons.state(-2).unwrap());
        assert!(!buttons.state(-1).unwrap());
        assert!(matches!(
            buttons.state(-7),
            Err(PropMonitorError::NavigationOutOfRange(-7))
        ));
        assert!(addon.flags().state(-1).unwrap_err().is_range());
        assert!(buttons.label(-1).unwrap_err().is_range());
    }

    #[test]
    fn delegates_attach_to_the_current_monitor() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicBool, Ordering};

        let (registry, vessel, _) = setup();
        let second = MonitorId::new_v4();
        {
            let mut guard = lock_registry(&registry).unwrap();
            let set = guard.vessel_set_mut(vessel).unwrap();
            let index = set.register(second);
            set.get_or_init_signal_tables(index, 4, 2).unwrap();
        }
        let addon = ScriptAddon::new(Arc::clone(&registry), vessel);
        let mut delegates = addon.delegates();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);

        assert!(delegates.set_current_monitor(2).unwrap_err().is_range());
        delegates.set_current_monitor(1).unwrap();
        delegates
            .set_delegate(-3, move || flag.store(true, Ordering::SeqCst))
            .unwrap();
        assert!(delegates.set_delegate(4, || {}).unwrap_err().is_range());
        assert!(matches!(
            delegates.set_delegate(-9, || {}),
            Err(PropMonitorError::NavigationOutOfRange(-9))
        ));

        {
            let mut guard = lock_registry(&registry).unwrap();
            let set = guard.vessel_set_mut(vessel).unwrap();
            assert!(!set.has_delegate(0, -3));
            assert!(set.fire_delegate(1, -3).unwrap());
        }
        assert!(fired.load(Ordering::SeqCst));
        assert!(delegates.clear_delegate(-3).unwrap());
        assert!(!delegates.clear_delegate(-3).unwrap());
    }

    #[test]
    fn current_monitor_selects_tables() {
        let (registry, vessel, _) = setup();
        {
            let mut guard = lock_registry(&registry).unwrap();
            let set = guard.vessel_set_mut(vessel).unwrap();
            let index = set.register(crate::identity::MonitorId::new_v4());
            set.get_or_init_signal_tables(index, 4, 2).unwrap();
        }
        let addon = ScriptAddon::new(registry, vessel);
        let mut buttons = addon.buttons();

        assert!(buttons.set_current_monitor(2).unwrap_err().is_range());
        buttons.set_label(0, "FIRST").unwrap();
        buttons.set_current_monitor(1).unwrap();
        assert_eq!(buttons.current_monitor(), 1);
        assert_eq!(buttons.label(0).unwrap(), "-");
        buttons.set_label(0, "SECOND").unwrap();

        buttons.set_current_monitor(0).unwrap();
        assert_eq!(buttons.label(0).unwrap(), "FIRST");
    }
}
