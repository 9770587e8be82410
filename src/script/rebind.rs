use std::collections::{HashMap, HashSet};
use std::time::Duration;

use serde_json::json;

use crate::error::{PropMonitorError, Result};
use crate::identity::{MonitorId, PartId};
use crate::logging::{LogLevel, Logger, SCRIPT_TARGET, emit, json_kv, json_str};
use crate::registry::{MonitorRegistry, SharedRegistry};
use crate::runtime::FlightHost;

use super::binding::bind_signals;

#[derive(Debug, Default, Clone, Copy)]
struct WatchState {
    powered: bool,
    waited: Option<Duration>,
    bound_to: Option<MonitorId>,
}

/// Watches processor power and re-registers signal bindings once a
/// processor has been powered for `delay`. A processor that comes up
/// before any monitor has tables keeps waiting until one does.
pub struct ProcessorRebinder {
    delay: Duration,
    monitor_index: usize,
    watched: HashMap<PartId, WatchState>,
    logger: Option<Logger>,
}

impl ProcessorRebinder {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            monitor_index: 0,
            watched: HashMap::new(),
            logger: None,
        }
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Monitor whose signals scripts see through the binding names.
    pub fn with_monitor_index(mut self, index: usize) -> Self {
        self.monitor_index = index;
        self
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn forget(&mut self, part: PartId) {
        self.watched.remove(&part);
    }

    pub fn clear(&mut self) {
        self.watched.clear();
    }

    pub fn is_pending(&self, part: PartId) -> bool {
        self.watched
            .get(&part)
            .is_some_and(|state| state.waited.is_some())
    }

    /// Advance every processor on every registered vessel by `elapsed`.
    /// Returns how many processors were rebound this frame.
    pub fn tick(
        &mut self,
        registry: &MonitorRegistry,
        shared: &SharedRegistry,
        host: &dyn FlightHost,
        elapsed: Duration,
    ) -> Result<usize> {
        let mut seen = HashSet::new();
        let mut rebound = 0;

        for vessel in registry.vessel_keys() {
            let set = registry.vessel_set(vessel)?;
            let target = set
                .monitor_at(self.monitor_index)
                .ok()
                .filter(|_| set.has_tables(self.monitor_index));

            for processor in host.processors(vessel) {
                let mut processor = processor
                    .lock()
                    .map_err(|_| PropMonitorError::RegistryPoisoned)?;
                let part = processor.part();
                let powered = processor.is_powered();
                seen.insert(part);

                let state = self.watched.entry(part).or_default();
                if !powered {
                    *state = WatchState::default();
                    continue;
                }
                if !state.powered || (state.waited.is_none() && state.bound_to != target) {
                    state.waited = Some(Duration::ZERO);
                }
                state.powered = true;

                let Some(waited) = state.waited.as_mut() else {
                    continue;
                };
                *waited += elapsed;
                if *waited < self.delay {
                    continue;
                }
                let Some(monitor) = target else {
                    continue;
                };

                let names = bind_signals(processor.bindings(), shared, registry, monitor)?;
                state.waited = None;
                state.bound_to = Some(monitor);
                rebound += 1;
                emit(
                    self.logger.as_ref(),
                    LogLevel::Info,
                    SCRIPT_TARGET,
                    "processor_rebound",
                    [
                        json_str("part", part.to_string()),
                        json_str("monitor", monitor.to_string()),
                        json_kv("names", json!(names)),
                    ],
                );
            }
        }

        self.watched.retain(|part, _| seen.contains(part));
        Ok(rebound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::MemoryKeyBindings;
    use crate::identity::VesselKey;
    use crate::registry::lock_registry;
    use crate::test_support::{FakeHost, FakeProcessor};

    fn add_monitor(shared: &SharedRegistry, vessel: VesselKey) {
        let mut registry = lock_registry(shared).unwrap();
        registry.register_vessel(vessel);
        let set = registry.vessel_set_mut(vessel).unwrap();
        let index = set.register(MonitorId::new_v4());
        set.get_or_init_signal_tables(index, 1, 1).unwrap();
    }

    fn tick(
        rebinder: &mut ProcessorRebinder,
        shared: &SharedRegistry,
        host: &FakeHost,
        millis: u64,
    ) -> usize {
        let registry = lock_registry(shared).unwrap();
        rebinder
            .tick(&registry, shared, host, Duration::from_millis(millis))
            .unwrap()
    }

    #[test]
    fn binds_after_grace_delay() {
        let shared = MonitorRegistry::new(Box::new(MemoryKeyBindings::new())).into_shared();
        let vessel = VesselKey::new_v4();
        add_monitor(&shared, vessel);
        let host = FakeHost::new();
        let processor = host.add_processor(vessel, FakeProcessor::new(7, true));
        let mut rebinder = ProcessorRebinder::new(Duration::from_secs(1));

        assert_eq!(tick(&mut rebinder, &shared, &host, 400), 0);
        assert!(rebinder.is_pending(PartId(7)));
        assert!(!processor.lock().unwrap().table.contains("BUTTON0"));

        assert_eq!(tick(&mut rebinder, &shared, &host, 600), 1);
        assert!(processor.lock().unwrap().table.contains("BUTTON0"));
        assert_eq!(tick(&mut rebinder, &shared, &host, 5_000), 0);
    }

    #[test]
    fn power_cycle_rebinds() {
        let shared = MonitorRegistry::new(Box::new(MemoryKeyBindings::new())).into_shared();
        let vessel = VesselKey::new_v4();
        add_monitor(&shared, vessel);
        let host = FakeHost::new();
        let processor = host.add_processor(vessel, FakeProcessor::new(7, true));
        let mut rebinder = ProcessorRebinder::new(Duration::from_secs(1));
        assert_eq!(tick(&mut rebinder, &shared, &host, 1_000), 1);

        processor.lock().unwrap().powered = false;
        assert_eq!(tick(&mut rebinder, &shared, &host, 1_000), 0);
        processor.lock().unwrap().powered = true;
        assert_eq!(tick(&mut rebinder, &shared, &host, 500), 0);
        assert_eq!(tick(&mut rebinder, &shared, &host, 500), 1);
    }

    #[test]
    fn waits_for_monitor_tables() {
        let shared = MonitorRegistry::new(Box::new(MemoryKeyBindings::new())).into_shared();
        let vessel = VesselKey::new_v4();
        lock_registry(&shared).unwrap().register_vessel(vessel);
        let host = FakeHost::new();
        let processor = host.add_processor(vessel, FakeProcessor::new(7, true));
        let mut rebinder = ProcessorRebinder::new(Duration::from_secs(1));

        assert_eq!(tick(&mut rebinder, &shared, &host, 2_000), 0);
        add_monitor(&shared, vessel);
        assert_eq!(tick(&mut rebinder, &shared, &host, 0), 1);
        assert!(processor.lock().unwrap().table.contains("FLAG0LABEL"));
    }

    #[test]
    fn vanished_processors_are_dropped() {
        let shared = MonitorRegistry::new(Box::new(MemoryKeyBindings::new())).into_shared();
        let vessel = VesselKey::new_v4();
        add_monitor(&shared, vessel);
        let host = FakeHost::new();
        host.add_processor(vessel, FakeProcessor::new(7, true));
        let mut rebinder = ProcessorRebinder::new(Duration::from_secs(1));
        tick(&mut rebinder, &shared, &host, 100);
        assert!(rebinder.is_pending(PartId(7)));

        host.state.lock().unwrap().processors.clear();
        tick(&mut rebinder, &shared, &host, 100);
        assert!(!rebinder.is_pending(PartId(7)));
    }
}
