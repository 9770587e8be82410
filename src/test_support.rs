use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::identity::{PartId, VesselKey};
use crate::input::{InputSymbol, TerminalKey};
use crate::runtime::{FlightHost, Processor, ScreenSnapshot, SharedProcessor};
use crate::script::{BindingTable, MemoryBindingTable, SignalValue};

pub struct FakeProcessor {
    pub part: PartId,
    pub powered: bool,
    pub received: Vec<InputSymbol>,
    pub screen: ScreenSnapshot,
    pub table: MemoryBindingTable,
    /// Binding read on every typed character, as a script polling a
    /// button from its input loop would.
    pub watch: Option<String>,
    pub watched: Vec<Option<SignalValue>>,
}

impl FakeProcessor {
    pub fn new(part: u32, powered: bool) -> Self {
        Self {
            part: PartId(part),
            powered,
            received: Vec::new(),
            screen: ScreenSnapshot::default(),
            table: MemoryBindingTable::new(),
            watch: None,
            watched: Vec::new(),
        }
    }

    pub fn with_rows(mut self, rows: &[&str]) -> Self {
        self.screen.rows = rows.iter().map(|row| row.to_string()).collect();
        self
    }
}

impl Processor for FakeProcessor {
    fn part(&self) -> PartId {
        self.part
    }

    fn is_powered(&self) -> bool {
        self.powered
    }

    fn toggle_power(&mut self) {
        self.powered = !self.powered;
    }

    fn type_char(&mut self, ch: char) {
        self.received.push(InputSymbol::Char(ch));
        if let Some(name) = &self.watch {
            let value = self.table.get(name).and_then(|read| read.ok());
            self.watched.push(value);
        }
    }

    fn special_key(&mut self, key: TerminalKey) {
        self.received.push(InputSymbol::Key(key));
    }

    fn screen(&self) -> ScreenSnapshot {
        self.screen.clone()
    }

    fn set_screen_size(&mut self, rows: usize, columns: usize) {
        self.screen.row_count = rows;
        self.screen.column_count = columns;
        self.screen.rows.resize(rows, String::new());
    }

    fn bindings(&mut self) -> &mut dyn BindingTable {
        &mut self.table
    }
}

#[derive(Default)]
pub struct HostState {
    pub parts: HashMap<PartId, VesselKey>,
    pub part_counts: HashMap<VesselKey, usize>,
    pub processors: HashMap<VesselKey, Vec<SharedProcessor>>,
}

/// Host whose flight state tests mutate after handing a clone to a runtime.
#[derive(Clone, Default)]
pub struct FakeHost {
    pub state: Arc<Mutex<HostState>>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mount(&self, part: u32, vessel: VesselKey) {
        let mut state = self.state.lock().expect("host state");
        state.parts.insert(PartId(part), vessel);
        *state.part_counts.entry(vessel).or_insert(0) += 1;
    }

    pub fn set_part_count(&self, vessel: VesselKey, count: usize) {
        let mut state = self.state.lock().expect("host state");
        state.part_counts.insert(vessel, count);
    }

    pub fn add_processor(
        &self,
        vessel: VesselKey,
        processor: FakeProcessor,
    ) -> Arc<Mutex<FakeProcessor>> {
        let processor = Arc::new(Mutex::new(processor));
        let shared: SharedProcessor = processor.clone();
        let mut state = self.state.lock().expect("host state");
        state.processors.entry(vessel).or_default().push(shared);
        *state.part_counts.entry(vessel).or_insert(0) += 1;
        processor
    }

    /// Move every part of `from` onto `to`, as docking does.
    pub fn dock(&self, from: VesselKey, to: VesselKey) {
        let mut state = self.state.lock().expect("host state");
        for owner in state.parts.values_mut() {
            if *owner == from {
                *owner = to;
            }
        }
        let moved = state.processors.remove(&from).unwrap_or_default();
        state.processors.entry(to).or_default().extend(moved);
        let count = state.part_counts.remove(&from).unwrap_or(0);
        *state.part_counts.entry(to).or_insert(0) += count;
    }
}

impl FlightHost for FakeHost {
    fn vessel_of(&self, part: PartId) -> Option<VesselKey> {
        self.state.lock().ok()?.parts.get(&part).copied()
    }

    fn part_count(&self, vessel: VesselKey) -> Option<usize> {
        self.state.lock().ok()?.part_counts.get(&vessel).copied()
    }

    fn processors(&self, vessel: VesselKey) -> Vec<SharedProcessor> {
        self.state
            .lock()
            .map(|state| state.processors.get(&vessel).cloned().unwrap_or_default())
            .unwrap_or_default()
    }
}
