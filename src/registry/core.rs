use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::json;

use crate::bindings::{KeyBindingHost, RememberedBindings};
use crate::error::{PropMonitorError, Result};
use crate::identity::{MonitorId, VesselKey};
use crate::input::InputSymbol;
use crate::logging::{LogLevel, Logger, REGISTRY_TARGET, emit, json_kv, json_str};
use crate::metrics::RegistryMetrics;

use super::instance::SharedMonitor;
use super::signals::SignalDefaults;
use super::vessel::{DetachedMonitor, VesselMonitorSet};

/// Owner of the shared keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FocusToken {
    /// No monitor holds focus; the simulator's own bindings are active.
    Master,
    Monitor(MonitorId),
}

pub type SharedRegistry = Arc<Mutex<MonitorRegistry>>;

pub fn lock_registry(registry: &SharedRegistry) -> Result<MutexGuard<'_, MonitorRegistry>> {
    registry.lock().map_err(|_| PropMonitorError::RegistryPoisoned)
}

/// Process-wide focus arbiter and per-vessel state registry.
///
/// Invariant: `focus == Master` exactly when the host's five camera/throttle
/// bindings equal the snapshot taken at construction.
pub struct MonitorRegistry {
    vessels: HashMap<VesselKey, VesselMonitorSet>,
    handles: HashMap<MonitorId, SharedMonitor>,
    focus: FocusToken,
    remembered: RememberedBindings,
    bindings: Box<dyn KeyBindingHost>,
    defaults: SignalDefaults,
    logger: Option<Logger>,
    metrics: Option<Arc<Mutex<RegistryMetrics>>>,
}

impl MonitorRegistry {
    pub fn new(bindings: Box<dyn KeyBindingHost>) -> Self {
        let remembered = RememberedBindings::capture(bindings.as_ref());
        Self {
            vessels: HashMap::new(),
            handles: HashMap::new(),
            focus: FocusToken::Master,
            remembered,
            bindings,
            defaults: SignalDefaults::default(),
            logger: None,
            metrics: None,
        }
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Mutex<RegistryMetrics>>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_signal_defaults(mut self, defaults: SignalDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn into_shared(self) -> SharedRegistry {
        Arc::new(Mutex::new(self))
    }

    pub fn signal_defaults(&self) -> &SignalDefaults {
        &self.defaults
    }

    pub fn bindings(&self) -> &dyn KeyBindingHost {
        self.bindings.as_ref()
    }

    pub fn remembered_bindings(&self) -> &RememberedBindings {
        &self.remembered
    }

    // Vessel lifecycle

    pub fn register_vessel(&mut self, vessel: VesselKey) {
        if self.vessels.contains_key(&vessel) {
            return;
        }
        self.vessels
            .insert(vessel, VesselMonitorSet::new(vessel, self.defaults.clone()));
        self.log(
            LogLevel::Debug,
            "vessel_registered",
            [json_str("vessel", vessel.to_string())],
        );
    }

    /// Remove the vessel's set and forget every monitor it owned. Focus held
    /// by one of those monitors returns to the simulator.
    pub fn deregister_vessel(&mut self, vessel: VesselKey) -> Result<()> {
        let set = self
            .vessels
            .remove(&vessel)
            .ok_or(PropMonitorError::VesselNotFound(vessel))?;

        let mut purged = 0usize;
        for id in set.owned_ids() {
            if self.handles.remove(&id).is_some() {
                purged += 1;
            }
            if self.focus == FocusToken::Monitor(id) {
                self.force_master();
            }
        }

        self.log(
            LogLevel::Info,
            "vessel_deregistered",
            [
                json_str("vessel", vessel.to_string()),
                json_kv("monitors_purged", json!(purged)),
            ],
        );
        Ok(())
    }

    pub fn contains_vessel(&self, vessel: VesselKey) -> bool {
        self.vessels.contains_key(&vessel)
    }

    pub fn vessel_keys(&self) -> Vec<VesselKey> {
        self.vessels.keys().copied().collect()
    }

    pub fn vessel_set(&self, vessel: VesselKey) -> Result<&VesselMonitorSet> {
        self.vessels
            .get(&vessel)
            .ok_or(PropMonitorError::VesselNotFound(vessel))
    }

    pub fn vessel_set_mut(&mut self, vessel: VesselKey) -> Result<&mut VesselMonitorSet> {
        self.vessels
            .get_mut(&vessel)
            .ok_or(PropMonitorError::VesselNotFound(vessel))
    }

    /// Vessel whose live monitor list contains `id`.
    pub fn owner_of(&self, id: MonitorId) -> Option<VesselKey> {
        self.vessels
            .values()
            .find(|set| set.index_of(id).is_some())
            .map(VesselMonitorSet::vessel)
    }

    /// Docking: append the absorbed vessel's live monitors, tables and
    /// delegates included, to the survivor and drop the absorbed set.
    /// Returns the new indices.
    pub fn merge_vessel(
        &mut self,
        absorbed: VesselKey,
        survivor: VesselKey,
    ) -> Result<Vec<(MonitorId, usize)>> {
        if absorbed == survivor {
            return Ok(Vec::new());
        }
        let mut source = self
            .vessels
            .remove(&absorbed)
            .ok_or(PropMonitorError::VesselNotFound(absorbed))?;
        self.register_vessel(survivor);

        let live = source.monitors();
        let mut moved = Vec::with_capacity(live.len());
        for id in live {
            let state = source.detach(id);
            let target = self.vessel_set_mut(survivor)?;
            moved.push((id, target.adopt(id, state)));
        }

        // Retired ids of the absorbed vessel cannot be reclaimed any more.
        for id in source.owned_ids() {
            self.handles.remove(&id);
            if self.focus == FocusToken::Monitor(id) {
                self.force_master();
            }
        }

        self.log(
            LogLevel::Info,
            "vessels_merged",
            [
                json_str("absorbed", absorbed.to_string()),
                json_str("survivor", survivor.to_string()),
                json_kv("monitors_moved", json!(moved.len())),
            ],
        );
        Ok(moved)
    }

    /// Move one monitor, tables and delegates included, to `vessel`. Registers the target
    /// vessel when needed and returns the monitor's index there.
    pub fn move_monitor(&mut self, id: MonitorId, vessel: VesselKey) -> Result<usize> {
        let state = match self.owner_of(id) {
            Some(owner) if owner == vessel => {
                return self
                    .vessel_set(vessel)?
                    .index_of(id)
                    .ok_or(PropMonitorError::MonitorNotFound(id));
            }
            Some(owner) => self.vessel_set_mut(owner)?.detach(id),
            None => DetachedMonitor::default(),
        };
        self.register_vessel(vessel);
        let index = self.vessel_set_mut(vessel)?.adopt(id, state);
        self.log(
            LogLevel::Debug,
            "monitor_moved",
            [
                json_str("monitor", id.to_string()),
                json_str("vessel", vessel.to_string()),
                json_kv("index", json!(index)),
            ],
        );
        Ok(index)
    }

    // Monitor handles

    /// Record the live handle used for key dispatch. Re-registering replaces
    /// the handle; it does not register any vessel.
    pub fn register_monitor_instance(&mut self, id: MonitorId, handle: SharedMonitor) {
        if self.handles.insert(id, handle).is_none() {
            self.log(
                LogLevel::Debug,
                "monitor_registered",
                [json_str("monitor", id.to_string())],
            );
        }
    }

    /// The widget is gone. Its id leaves the live list of its vessel but its
    /// tables stay behind for a rebuilt widget to reclaim.
    pub fn remove_monitor_instance(&mut self, id: MonitorId) -> Result<()> {
        self.handles
            .remove(&id)
            .ok_or(PropMonitorError::MonitorNotFound(id))?;
        if self.focus == FocusToken::Monitor(id) {
            self.force_master();
        }
        if let Some(owner) = self.owner_of(id) {
            self.vessel_set_mut(owner)?.retire(id);
        }
        Ok(())
    }

    pub fn contains_monitor(&self, id: MonitorId) -> bool {
        self.handles.contains_key(&id)
    }

    pub fn monitor_handle(&self, id: MonitorId) -> Result<SharedMonitor> {
        self.handles
            .get(&id)
            .cloned()
            .ok_or(PropMonitorError::MonitorNotFound(id))
    }

    /// Live handles of the monitors currently listed on `vessel`, in index
    /// order. Monitors without a registered handle are skipped.
    pub fn monitor_handles_for(&self, vessel: VesselKey) -> Result<Vec<SharedMonitor>> {
        let set = self.vessel_set(vessel)?;
        Ok(set
            .monitors()
            .into_iter()
            .filter_map(|id| self.handles.get(&id).cloned())
            .collect())
    }

    // Focus arbitration

    pub fn focus_token(&self) -> FocusToken {
        self.focus
    }

    pub fn focused_monitor(&self) -> Option<MonitorId> {
        match self.focus {
            FocusToken::Master => None,
            FocusToken::Monitor(id) => Some(id),
        }
    }

    pub fn is_focused(&self, id: MonitorId) -> bool {
        self.focus == FocusToken::Monitor(id)
    }

    /// Grant focus only when nobody holds it. The loser of a same-frame race
    /// gets `Ok(false)` and nothing changes.
    pub fn request_focus(&mut self, id: MonitorId) -> Result<bool> {
        self.ensure_known(id)?;
        let granted = self.focus == FocusToken::Master;
        if granted {
            RememberedBindings::unbind_all(self.bindings.as_mut());
            self.focus = FocusToken::Monitor(id);
        }
        self.record(|m| m.record_focus_request(granted));
        self.log(
            LogLevel::Info,
            if granted { "focus_granted" } else { "focus_denied" },
            [json_str("monitor", id.to_string())],
        );
        Ok(granted)
    }

    /// Return focus to the simulator if `id` holds it.
    pub fn release_focus(&mut self, id: MonitorId) -> Result<bool> {
        self.ensure_known(id)?;
        if self.focus != FocusToken::Monitor(id) {
            return Ok(false);
        }
        self.force_master();
        Ok(true)
    }

    /// Release when held by `id`, otherwise request. Returns whether `id`
    /// holds focus afterwards.
    pub fn toggle_focus(&mut self, id: MonitorId) -> Result<bool> {
        if self.is_focused(id) {
            self.release_focus(id)?;
            Ok(false)
        } else {
            self.request_focus(id)
        }
    }

    /// Forward a decoded symbol to the focused monitor. `Ok(false)` when the
    /// simulator holds focus.
    pub fn dispatch_key(&self, symbol: InputSymbol) -> Result<bool> {
        let Some(handle) = self.focused_handle()? else {
            return Ok(false);
        };
        let mut monitor = handle
            .lock()
            .map_err(|_| PropMonitorError::RegistryPoisoned)?;
        monitor.handle_input(symbol);
        Ok(true)
    }

    /// Handle of the focus holder, `None` while the simulator has focus.
    pub fn focused_handle(&self) -> Result<Option<SharedMonitor>> {
        match self.focus {
            FocusToken::Master => Ok(None),
            FocusToken::Monitor(id) => self.monitor_handle(id).map(Some),
        }
    }

    // Scene transitions

    pub fn on_enter_flight(&mut self) {
        self.reset("enter_flight");
    }

    pub fn on_exit_flight(&mut self) {
        self.reset("exit_flight");
    }

    fn reset(&mut self, reason: &str) {
        if self.focus != FocusToken::Master {
            self.force_master();
        }
        let vessels = self.vessels.len();
        self.vessels.clear();
        self.handles.clear();
        self.log(
            LogLevel::Info,
            "registry_reset",
            [
                json_str("reason", reason),
                json_kv("vessels_dropped", json!(vessels)),
            ],
        );
    }

    fn force_master(&mut self) {
        let previous = self.focus;
        self.focus = FocusToken::Master;
        self.remembered.restore(self.bindings.as_mut());
        self.record(RegistryMetrics::record_focus_release);
        if let FocusToken::Monitor(id) = previous {
            self.log(
                LogLevel::Info,
                "focus_released",
                [json_str("monitor", id.to_string())],
            );
        }
    }

    fn ensure_known(&self, id: MonitorId) -> Result<()> {
        if self.handles.contains_key(&id) {
            Ok(())
        } else {
            Err(PropMonitorError::MonitorNotFound(id))
        }
    }

    fn record(&self, f: impl FnOnce(&mut RegistryMetrics)) {
        if let Some(metrics) = self.metrics.as_ref() {
            if let Ok(mut guard) = metrics.lock() {
                f(&mut guard);
            }
        }
    }

    fn log<I>(&self, level: LogLevel, message: &str, fields: I)
    where
        I: IntoIterator<Item = (String, serde_json::Value)>,
    {
        emit(self.logger.as_ref(), level, REGISTRY_TARGET, message, fields);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::{BindingSlot, KeyBinding, MemoryKeyBindings};
    use crate::input::TerminalKey;
    use crate::registry::MonitorInstance;
    use crossterm::event::{KeyCode, KeyModifiers};

    #[derive(Default)]
    struct Recorder {
        id: Option<MonitorId>,
        received: Vec<InputSymbol>,
    }

    impl MonitorInstance for Recorder {
        fn monitor_id(&self) -> Option<MonitorId> {
            self.id
        }

        fn handle_input(&mut self, symbol: InputSymbol) {
            self.received.push(symbol);
        }
    }

    fn registry() -> MonitorRegistry {
        MonitorRegistry::new(Box::new(MemoryKeyBindings::new()))
    }

    fn attach(
        registry: &mut MonitorRegistry,
        vessel: VesselKey,
    ) -> (MonitorId, Arc<Mutex<Recorder>>) {
        let id = MonitorId::new_v4();
        let recorder = Arc::new(Mutex::new(Recorder {
            id: Some(id),
            received: Vec::new(),
        }));
        registry.register_vessel(vessel);
        let index = registry.vessel_set_mut(vessel).unwrap().register(id);
        let defaults = registry.signal_defaults().clone();
        registry
            .vessel_set_mut(vessel)
            .unwrap()
            .get_or_init_signal_tables(index, defaults.button_count, defaults.flag_count)
            .unwrap();
        registry.register_monitor_instance(id, recorder.clone());
        (id, recorder)
    }

    #[test]
    fn only_one_monitor_holds_focus() {
        let mut registry = registry();
        let vessel = VesselKey::new_v4();
        let (a, _) = attach(&mut registry, vessel);
        let (b, _) = attach(&mut registry, vessel);
        let (c, _) = attach(&mut registry, VesselKey::new_v4());

        assert!(registry.request_focus(a).unwrap());
        assert!(!registry.request_focus(b).unwrap());
        assert!(!registry.request_focus(c).unwrap());
        assert!(!registry.request_focus(a).unwrap());
        assert_eq!(registry.focus_token(), FocusToken::Monitor(a));
        assert!(registry.is_focused(a));
        assert!(!registry.is_focused(b));
    }

    #[test]
    fn bindings_round_trip_through_focus() {
        let custom = KeyBinding::new(KeyCode::Char('q'), KeyModifiers::ALT);
        let host = MemoryKeyBindings::new().with_binding(BindingSlot::CameraMode, custom);
        let mut registry = MonitorRegistry::new(Box::new(host));
        let snapshot = registry.remembered_bindings().clone();
        let (a, _) = attach(&mut registry, VesselKey::new_v4());

        registry.request_focus(a).unwrap();
        for slot in BindingSlot::ALL {
            assert!(registry.bindings().binding(slot).is_unbound());
        }

        assert!(registry.release_focus(a).unwrap());
        assert!(snapshot.matches(registry.bindings()));
        assert_eq!(registry.bindings().binding(BindingSlot::CameraMode), custom);
        assert_eq!(registry.focus_token(), FocusToken::Master);
    }

    #[test]
    fn release_by_non_holder_is_a_noop() {
        let mut registry = registry();
        let vessel = VesselKey::new_v4();
        let (a, _) = attach(&mut registry, vessel);
        let (b, _) = attach(&mut registry, vessel);

        assert!(!registry.release_focus(a).unwrap());
        registry.request_focus(a).unwrap();
        assert!(!registry.release_focus(b).unwrap());
        assert!(registry.is_focused(a));
        assert!(!registry.toggle_focus(a).unwrap());
        assert!(registry.toggle_focus(b).unwrap());
    }

    #[test]
    fn unknown_ids_fail_fast() {
        let mut registry = registry();
        let stranger = MonitorId::new_v4();
        assert!(registry.request_focus(stranger).unwrap_err().is_not_found());
        assert!(registry.release_focus(stranger).unwrap_err().is_not_found());
        assert!(
            registry
                .vessel_set(VesselKey::new_v4())
                .unwrap_err()
                .is_not_found()
        );
        assert!(
            registry
                .deregister_vessel(VesselKey::new_v4())
                .unwrap_err()
                .is_not_found()
        );
    }

    #[test]
    fn deregistration_purges_focus() {
        let mut registry = registry();
        let vessel = VesselKey::new_v4();
        let (m, _) = attach(&mut registry, vessel);
        registry.request_focus(m).unwrap();

        registry.deregister_vessel(vessel).unwrap();
        assert!(!registry.is_focused(m));
        assert_eq!(registry.focus_token(), FocusToken::Master);
        assert!(!registry.contains_monitor(m));
        assert!(registry.remembered_bindings().matches(registry.bindings()));
    }

    #[test]
    fn dispatch_reaches_only_the_focused_monitor() {
        let mut registry = registry();
        let vessel = VesselKey::new_v4();
        let (a, rec_a) = attach(&mut registry, vessel);
        let (_b, rec_b) = attach(&mut registry, vessel);

        assert!(!registry.dispatch_key(InputSymbol::Char('x')).unwrap());
        registry.request_focus(a).unwrap();
        assert!(registry.dispatch_key(InputSymbol::Key(TerminalKey::Break)).unwrap());
        assert!(registry.dispatch_key(InputSymbol::Char('a')).unwrap());

        assert_eq!(
            rec_a.lock().unwrap().received,
            vec![InputSymbol::Key(TerminalKey::Break), InputSymbol::Char('a')]
        );
        assert!(rec_b.lock().unwrap().received.is_empty());
    }

    #[test]
    fn docking_merge_keeps_each_monitors_tables() {
        let mut registry = registry();
        let vessel_a = VesselKey::new_v4();
        let vessel_b = VesselKey::new_v4();
        let (ma, _) = attach(&mut registry, vessel_a);
        let (mb, _) = attach(&mut registry, vessel_b);
        registry
            .vessel_set_mut(vessel_a)
            .unwrap()
            .set_button_label(0, 0, "A-zero")
            .unwrap();
        registry
            .vessel_set_mut(vessel_b)
            .unwrap()
            .set_flag_label(0, 2, "B-two")
            .unwrap();
        registry.request_focus(mb).unwrap();

        let moved = registry.merge_vessel(vessel_b, vessel_a).unwrap();
        assert_eq!(moved, vec![(mb, 1)]);
        assert!(!registry.contains_vessel(vessel_b));

        let set = registry.vessel_set(vessel_a).unwrap();
        assert_eq!(set.monitors(), vec![ma, mb]);
        assert_eq!(set.button_label(0, 0).unwrap(), "A-zero");
        assert_eq!(set.flag_label(0, 2).unwrap(), "-");
        assert_eq!(set.flag_label(1, 2).unwrap(), "B-two");
        assert_eq!(set.button_label(1, 0).unwrap(), "-");
        assert!(registry.is_focused(mb));
    }

    #[test]
    fn undocking_moves_one_monitor() {
        let mut registry = registry();
        let vessel = VesselKey::new_v4();
        let split = VesselKey::new_v4();
        let (_a, _) = attach(&mut registry, vessel);
        let (b, _) = attach(&mut registry, vessel);
        registry
            .vessel_set_mut(vessel)
            .unwrap()
            .set_button_state(1, 3, true)
            .unwrap();

        assert_eq!(registry.move_monitor(b, split).unwrap(), 0);
        assert_eq!(registry.owner_of(b), Some(split));
        assert_eq!(registry.vessel_set(vessel).unwrap().monitor_count(), 1);
        assert!(registry.vessel_set(split).unwrap().button_state(0, 3).unwrap());
        assert_eq!(registry.move_monitor(b, split).unwrap(), 0);
    }

    #[test]
    fn removed_instance_releases_focus_and_keeps_tables() {
        let mut registry = registry();
        let vessel = VesselKey::new_v4();
        let (m, _) = attach(&mut registry, vessel);
        registry
            .vessel_set_mut(vessel)
            .unwrap()
            .set_flag_state(0, 1, true)
            .unwrap();
        registry.request_focus(m).unwrap();

        registry.remove_monitor_instance(m).unwrap();
        assert_eq!(registry.focus_token(), FocusToken::Master);

        let set = registry.vessel_set_mut(vessel).unwrap();
        assert_eq!(set.live_count(), 0);
        assert_eq!(set.claim_identity(), m);
        let index = set.register(m);
        assert!(set.flag_state(index, 1).unwrap());
    }

    #[test]
    fn leaving_flight_resets_everything() {
        let mut registry = registry();
        let vessel = VesselKey::new_v4();
        let (m, _) = attach(&mut registry, vessel);
        registry.request_focus(m).unwrap();

        registry.on_exit_flight();
        assert_eq!(registry.focus_token(), FocusToken::Master);
        assert!(registry.vessel_keys().is_empty());
        assert!(!registry.contains_monitor(m));
        assert!(registry.remembered_bindings().matches(registry.bindings()));
    }
}
