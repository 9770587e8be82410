use std::collections::HashMap;

use crate::error::{PropMonitorError, Result};
use crate::identity::{MonitorId, VesselKey};

use super::signals::{
    ButtonDelegate, ButtonDelegates, NavigationButton, SignalDefaults, SignalKind, SignalTables,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Slot {
    id: MonitorId,
    live: bool,
}

/// State a monitor carries when it leaves a vessel.
#[derive(Debug, Default)]
pub(crate) struct DetachedMonitor {
    pub(crate) tables: Option<SignalTables>,
    pub(crate) delegates: Option<ButtonDelegates>,
}

/// Monitors registered on one vessel and the signal tables they expose.
///
/// Every id the vessel has seen keeps its slot; a slot's position is the
/// monitor's index for script addressing. A destroyed widget leaves its slot
/// retired rather than removed, so later monitors keep their index and a
/// rebuilt widget reclaims both the id and the position. Tables and delegates
/// are keyed by id so they follow a monitor through docking and rebuilds.
#[derive(Debug)]
pub struct VesselMonitorSet {
    vessel: VesselKey,
    slots: Vec<Slot>,
    tables: HashMap<MonitorId, SignalTables>,
    delegates: HashMap<MonitorId, ButtonDelegates>,
    defaults: SignalDefaults,
    part_count: Option<usize>,
}

impl VesselMonitorSet {
    pub fn new(vessel: VesselKey, defaults: SignalDefaults) -> Self {
        Self {
            vessel,
            slots: Vec::new(),
            tables: HashMap::new(),
            delegates: HashMap::new(),
            defaults,
            part_count: None,
        }
    }

    pub fn vessel(&self) -> VesselKey {
        self.vessel
    }

    /// Live monitors in index order.
    pub fn monitors(&self) -> Vec<MonitorId> {
        self.slots
            .iter()
            .filter(|slot| slot.live)
            .map(|slot| slot.id)
            .collect()
    }

    /// Every id that holds a slot, live or retired, in index order.
    pub fn registered_monitors(&self) -> Vec<MonitorId> {
        self.slots.iter().map(|slot| slot.id).collect()
    }

    /// Number of addressable indices, retired slots included.
    pub fn monitor_count(&self) -> usize {
        self.slots.len()
    }

    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.live).count()
    }

    pub fn defaults(&self) -> &SignalDefaults {
        &self.defaults
    }

    /// Register `id` and return its index. An id that already holds a slot
    /// goes back to it; a new id takes the next free index.
    pub fn register(&mut self, id: MonitorId) -> usize {
        match self.slots.iter().position(|slot| slot.id == id) {
            Some(index) => {
                self.slots[index].live = true;
                index
            }
            None => {
                self.slots.push(Slot { id, live: true });
                self.slots.len() - 1
            }
        }
    }

    /// Identity for a widget that lost its own: the id of the first retired
    /// slot, or a fresh one.
    pub fn claim_identity(&self) -> MonitorId {
        self.slots
            .iter()
            .find(|slot| !slot.live)
            .map(|slot| slot.id)
            .unwrap_or_else(MonitorId::new_v4)
    }

    /// Index of a live monitor.
    pub fn index_of(&self, id: MonitorId) -> Option<usize> {
        self.slots.iter().position(|slot| slot.live && slot.id == id)
    }

    /// Look up a live monitor by full or short guid text.
    pub fn index_of_str(&self, guid: &str) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.live && slot.id.matches_str(guid))
    }

    /// Live monitor at `index`. A retired slot reports its id as not found.
    pub fn monitor_at(&self, index: usize) -> Result<MonitorId> {
        match self.slots.get(index) {
            Some(slot) if slot.live => Ok(slot.id),
            Some(slot) => Err(PropMonitorError::MonitorNotFound(slot.id)),
            None => Err(PropMonitorError::MonitorIndexOutOfRange {
                index,
                count: self.slots.len(),
            }),
        }
    }

    /// Create the tables for `index` the first time it is seen; later calls
    /// leave existing values untouched.
    pub fn get_or_init_signal_tables(
        &mut self,
        index: usize,
        button_count: usize,
        flag_count: usize,
    ) -> Result<&mut SignalTables> {
        let id = self.monitor_at(index)?;
        let defaults = &self.defaults;
        Ok(self
            .tables
            .entry(id)
            .or_insert_with(|| SignalTables::new(button_count, flag_count, defaults)))
    }

    pub fn has_tables(&self, index: usize) -> bool {
        self.monitor_at(index)
            .is_ok_and(|id| self.tables.contains_key(&id))
    }

    pub fn label(&self, index: usize, kind: SignalKind, number: usize) -> Result<String> {
        self.tables_at(index, kind, number)?
            .label(kind, number)
            .map(str::to_string)
            .ok_or(PropMonitorError::SignalOutOfRange { kind, index, number })
    }

    pub fn set_label(
        &mut self,
        index: usize,
        kind: SignalKind,
        number: usize,
        value: impl Into<String>,
    ) -> Result<()> {
        let tables = self.tables_at_mut(index, kind, number)?;
        if tables.set_label(kind, number, value.into()) {
            Ok(())
        } else {
            Err(PropMonitorError::SignalOutOfRange { kind, index, number })
        }
    }

    pub fn state(&self, index: usize, kind: SignalKind, number: usize) -> Result<bool> {
        self.tables_at(index, kind, number)?
            .state(kind, number)
            .ok_or(PropMonitorError::SignalOutOfRange { kind, index, number })
    }

    pub fn set_state(
        &mut self,
        index: usize,
        kind: SignalKind,
        number: usize,
        value: bool,
    ) -> Result<()> {
        let tables = self.tables_at_mut(index, kind, number)?;
        if tables.set_state(kind, number, value) {
            Ok(())
        } else {
            Err(PropMonitorError::SignalOutOfRange { kind, index, number })
        }
    }

    pub fn button_label(&self, index: usize, number: usize) -> Result<String> {
        self.label(index, SignalKind::Button, number)
    }

    pub fn set_button_label(
        &mut self,
        index: usize,
        number: usize,
        value: impl Into<String>,
    ) -> Result<()> {
        self.set_label(index, SignalKind::Button, number, value)
    }

    pub fn button_state(&self, index: usize, number: usize) -> Result<bool> {
        self.state(index, SignalKind::Button, number)
    }

    pub fn set_button_state(&mut self, index: usize, number: usize, value: bool) -> Result<()> {
        self.set_state(index, SignalKind::Button, number, value)
    }

    pub fn flag_label(&self, index: usize, number: usize) -> Result<String> {
        self.label(index, SignalKind::Flag, number)
    }

    pub fn set_flag_label(
        &mut self,
        index: usize,
        number: usize,
        value: impl Into<String>,
    ) -> Result<()> {
        self.set_label(index, SignalKind::Flag, number, value)
    }

    pub fn flag_state(&self, index: usize, number: usize) -> Result<bool> {
        self.state(index, SignalKind::Flag, number)
    }

    pub fn set_flag_state(&mut self, index: usize, number: usize, value: bool) -> Result<()> {
        self.set_state(index, SignalKind::Flag, number, value)
    }

    pub fn navigation_state(&self, index: usize, button: NavigationButton) -> Result<bool> {
        let id = self.monitor_at(index)?;
        self.tables
            .get(&id)
            .map(|tables| tables.navigation(button))
            .ok_or(PropMonitorError::MonitorIndexOutOfRange {
                index,
                count: self.slots.len(),
            })
    }

    pub fn set_navigation_state(
        &mut self,
        index: usize,
        button: NavigationButton,
        value: bool,
    ) -> Result<()> {
        let id = self.monitor_at(index)?;
        let count = self.slots.len();
        let tables = self
            .tables
            .get_mut(&id)
            .ok_or(PropMonitorError::MonitorIndexOutOfRange { index, count })?;
        tables.set_navigation(button, value);
        Ok(())
    }

    /// Initialised signal numbers for `index`, in ascending order.
    pub fn signal_numbers(&self, index: usize, kind: SignalKind) -> Result<Vec<usize>> {
        let id = self.monitor_at(index)?;
        Ok(self
            .tables
            .get(&id)
            .map(|tables| tables.numbers(kind).collect())
            .unwrap_or_default())
    }

    /// Attach a press callback to button `number` of the monitor at `index`.
    /// Numbers -1..=-6 address the navigation keys; other numbers must lie
    /// in the monitor's initialised button range.
    pub fn set_delegate(
        &mut self,
        index: usize,
        number: i32,
        delegate: ButtonDelegate,
    ) -> Result<()> {
        let id = self.delegate_target(index, number)?;
        self.delegates.entry(id).or_default().set(number, delegate);
        Ok(())
    }

    pub fn clear_delegate(&mut self, index: usize, number: i32) -> Result<bool> {
        let id = self.delegate_target(index, number)?;
        Ok(self
            .delegates
            .get_mut(&id)
            .is_some_and(|delegates| delegates.clear(number)))
    }

    pub fn has_delegate(&self, index: usize, number: i32) -> bool {
        self.monitor_at(index).is_ok_and(|id| {
            self.delegates
                .get(&id)
                .is_some_and(|delegates| delegates.contains(number))
        })
    }

    /// Run the callback attached to `number`, if any. Delegates run while the
    /// registry is locked and must not reach back into it.
    pub fn fire_delegate(&mut self, index: usize, number: i32) -> Result<bool> {
        let id = self.monitor_at(index)?;
        Ok(self
            .delegates
            .get_mut(&id)
            .is_some_and(|delegates| delegates.fire(number)))
    }

    /// Record the vessel's structural fingerprint. Returns true when it
    /// differs from the previous observation; the first call sets the
    /// baseline.
    pub fn observe_part_count(&mut self, count: usize) -> bool {
        let changed = self.part_count.is_some_and(|previous| previous != count);
        self.part_count = Some(count);
        changed
    }

    pub fn part_count(&self) -> Option<usize> {
        self.part_count
    }

    /// Retire `id`'s slot. Its index, tables and delegates stay behind for a
    /// rebuilt widget to reclaim.
    pub(crate) fn retire(&mut self, id: MonitorId) -> bool {
        match self.index_of(id) {
            Some(index) => {
                self.slots[index].live = false;
                true
            }
            None => false,
        }
    }

    /// Remove every trace of `id`, handing its state to the caller. Later
    /// slots shift down one index.
    pub(crate) fn detach(&mut self, id: MonitorId) -> DetachedMonitor {
        self.slots.retain(|slot| slot.id != id);
        DetachedMonitor {
            tables: self.tables.remove(&id),
            delegates: self.delegates.remove(&id),
        }
    }

    /// Register `id` and install the state it brought from another vessel.
    pub(crate) fn adopt(&mut self, id: MonitorId, state: DetachedMonitor) -> usize {
        let index = self.register(id);
        if let Some(tables) = state.tables {
            self.tables.insert(id, tables);
        }
        if let Some(delegates) = state.delegates {
            self.delegates.insert(id, delegates);
        }
        index
    }

    /// Every id the vessel has owned, live or retired.
    pub(crate) fn owned_ids(&self) -> impl Iterator<Item = MonitorId> + '_ {
        self.slots.iter().map(|slot| slot.id)
    }

    fn delegate_target(&self, index: usize, number: i32) -> Result<MonitorId> {
        let id = self.monitor_at(index)?;
        match usize::try_from(number) {
            Ok(button) => {
                let in_range = self
                    .tables
                    .get(&id)
                    .is_some_and(|tables| tables.state(SignalKind::Button, button).is_some());
                if !in_range {
                    return Err(PropMonitorError::SignalOutOfRange {
                        kind: SignalKind::Button,
                        index,
                        number: button,
                    });
                }
            }
            Err(_) if NavigationButton::from_script_index(number).is_none() => {
                return Err(PropMonitorError::NavigationOutOfRange(number));
            }
            Err(_) => {}
        }
        Ok(id)
    }

    fn tables_at(&self, index: usize, kind: SignalKind, number: usize) -> Result<&SignalTables> {
        let id = self.monitor_at(index)?;
        self.tables
            .get(&id)
            .ok_or(PropMonitorError::SignalOutOfRange { kind, index, number })
    }

    fn tables_at_mut(
        &mut self,
        index: usize,
        kind: SignalKind,
        number: usize,
    ) -> Result<&mut SignalTables> {
        let id = self.monitor_at(index)?;
        self.tables
            .get_mut(&id)
            .ok_or(PropMonitorError::SignalOutOfRange { kind, index, number })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set() -> VesselMonitorSet {
        VesselMonitorSet::new(VesselKey::new_v4(), SignalDefaults::default())
    }

    #[test]
    fn register_is_idempotent_and_order_preserving() {
        let mut set = set();
        let a = MonitorId::new_v4();
        let b = MonitorId::new_v4();

        assert_eq!(set.register(a), 0);
        assert_eq!(set.register(b), 1);
        assert_eq!(set.register(a), 0);
        assert_eq!(set.monitors(), vec![a, b]);
        assert_eq!(set.registered_monitors(), vec![a, b]);
    }

    #[test]
    fn signal_tables_init_once() {
        let mut set = set();
        let index = set.register(MonitorId::new_v4());
        set.get_or_init_signal_tables(index, 4, 2).unwrap();
        set.set_button_label(index, 1, "ARM").unwrap();

        set.get_or_init_signal_tables(index, 8, 8).unwrap();
        assert_eq!(set.button_label(index, 1).unwrap(), "ARM");
        assert!(set.button_state(index, 4).unwrap_err().is_range());
        assert_eq!(set.flag_label(index, 0).unwrap(), "-");
    }

    #[test]
    fn access_outside_initialised_range_fails() {
        let mut set = set();
        let index = set.register(MonitorId::new_v4());

        let before_init = set.button_state(index, 0).unwrap_err();
        assert!(before_init.is_range());

        set.get_or_init_signal_tables(index, 2, 2).unwrap();
        let bad_number = set.button_state(index, 7).unwrap_err();
        assert!(matches!(
            bad_number,
            PropMonitorError::SignalOutOfRange { number: 7, .. }
        ));
        let bad_index = set.flag_state(3, 0).unwrap_err();
        assert!(matches!(
            bad_index,
            PropMonitorError::MonitorIndexOutOfRange { index: 3, count: 1 }
        ));
        assert!(set.set_flag_state(index, 2, true).unwrap_err().is_range());
        assert!(set.get_or_init_signal_tables(5, 1, 1).is_err());
    }

    #[test]
    fn retired_identity_is_reclaimed_by_ordinal() {
        let mut set = set();
        let first = MonitorId::new_v4();
        let second = MonitorId::new_v4();
        set.register(first);
        set.register(second);
        set.get_or_init_signal_tables(0, 2, 2).unwrap();
        set.set_flag_label(0, 1, "SAS").unwrap();

        assert!(set.retire(first));
        assert!(set.retire(second));
        assert_eq!(set.live_count(), 0);
        assert_eq!(set.monitor_count(), 2);

        let reclaimed = set.claim_identity();
        assert_eq!(reclaimed, first);
        let index = set.register(reclaimed);
        assert_eq!(index, 0);
        assert_eq!(set.flag_label(index, 1).unwrap(), "SAS");

        assert_eq!(set.claim_identity(), second);
        assert_eq!(set.register(second), 1);
        let fresh = set.claim_identity();
        assert!(fresh != first && fresh != second);
    }

    #[test]
    fn destroying_the_first_widget_keeps_later_indices() {
        let mut set = set();
        let first = MonitorId::new_v4();
        let second = MonitorId::new_v4();
        set.register(first);
        set.register(second);
        set.get_or_init_signal_tables(0, 2, 2).unwrap();
        set.get_or_init_signal_tables(1, 2, 2).unwrap();
        set.set_button_label(1, 0, "GEAR").unwrap();

        set.retire(first);

        assert_eq!(set.index_of(second), Some(1));
        assert_eq!(set.index_of(first), None);
        assert_eq!(set.button_label(1, 0).unwrap(), "GEAR");
        assert!(set.button_label(0, 0).unwrap_err().is_not_found());
        assert_eq!(set.monitors(), vec![second]);

        let rebuilt = set.claim_identity();
        assert_eq!(rebuilt, first);
        assert_eq!(set.register(rebuilt), 0);
        assert_eq!(set.monitors(), vec![first, second]);
        assert_eq!(set.button_label(0, 0).unwrap(), "-");
    }

    #[test]
    fn delegates_follow_the_monitor() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicUsize, Ordering};

        let mut set = set();
        let id = MonitorId::new_v4();
        let index = set.register(id);
        set.get_or_init_signal_tables(index, 3, 1).unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        set.set_delegate(
            index,
            2,
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .unwrap();

        assert!(set.set_delegate(index, 3, Box::new(|| {})).unwrap_err().is_range());
        assert!(matches!(
            set.set_delegate(index, -7, Box::new(|| {})),
            Err(PropMonitorError::NavigationOutOfRange(-7))
        ));
        set.set_delegate(index, -1, Box::new(|| {})).unwrap();
        assert!(set.fire_delegate(index, 2).unwrap());
        assert!(!set.fire_delegate(index, 0).unwrap());

        let state = set.detach(id);
        assert!(state.delegates.is_some());
        let mut other = self::set();
        let moved = other.adopt(id, state);
        assert!(other.has_delegate(moved, -1));
        assert!(other.fire_delegate(moved, 2).unwrap());
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert!(other.clear_delegate(moved, 2).unwrap());
        assert!(!other.has_delegate(moved, 2));
    }

    #[test]
    fn part_count_changes_are_reported_after_baseline() {
        let mut set = set();
        assert!(!set.observe_part_count(12));
        assert!(!set.observe_part_count(12));
        assert!(set.observe_part_count(20));
        assert_eq!(set.part_count(), Some(20));
    }

    #[test]
    fn guid_lookup_accepts_short_form() {
        let mut set = set();
        let id = MonitorId::new_v4();
        set.register(MonitorId::new_v4());
        set.register(id);
        assert_eq!(set.index_of_str(&id.short()), Some(1));
        assert_eq!(set.index_of_str(&id.to_string()), Some(1));
        assert_eq!(set.index_of_str("nope"), None);
    }
}
