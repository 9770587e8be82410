use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::Deserialize;

/// The two families of script-visible signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    Button,
    Flag,
}

impl SignalKind {
    /// Prefix used for processor binding names (`BUTTON3`, `FLAG3LABEL`).
    pub fn binding_prefix(self) -> &'static str {
        match self {
            SignalKind::Button => "BUTTON",
            SignalKind::Flag => "FLAG",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalKind::Button => f.write_str("button"),
            SignalKind::Flag => f.write_str("flag"),
        }
    }
}

/// Cockpit-global buttons a monitor exposes besides its numbered buttons.
/// Scripts address them with negative button indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NavigationButton {
    Enter,
    Cancel,
    Up,
    Down,
    Left,
    Right,
}

impl NavigationButton {
    pub const ALL: [NavigationButton; 6] = [
        NavigationButton::Enter,
        NavigationButton::Cancel,
        NavigationButton::Up,
        NavigationButton::Down,
        NavigationButton::Left,
        NavigationButton::Right,
    ];

    /// Maps -1..=-6 to Enter..=Right.
    pub fn from_script_index(index: i32) -> Option<Self> {
        match index {
            -1 => Some(NavigationButton::Enter),
            -2 => Some(NavigationButton::Cancel),
            -3 => Some(NavigationButton::Up),
            -4 => Some(NavigationButton::Down),
            -5 => Some(NavigationButton::Left),
            -6 => Some(NavigationButton::Right),
            _ => None,
        }
    }

    /// Inverse of [`NavigationButton::from_script_index`].
    pub fn script_index(self) -> i32 {
        -(self.slot() as i32) - 1
    }

    fn slot(self) -> usize {
        match self {
            NavigationButton::Enter => 0,
            NavigationButton::Cancel => 1,
            NavigationButton::Up => 2,
            NavigationButton::Down => 3,
            NavigationButton::Left => 4,
            NavigationButton::Right => 5,
        }
    }
}

/// Values used when a monitor index is first seen.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SignalDefaults {
    pub button_label: String,
    pub flag_label: String,
    pub button_count: usize,
    pub flag_count: usize,
}

impl Default for SignalDefaults {
    fn default() -> Self {
        Self {
            button_label: "-".to_string(),
            flag_label: "-".to_string(),
            button_count: 10,
            flag_count: 10,
        }
    }
}

/// Label and state tables for one monitor. Signal numbers are dense from
/// zero; numbers outside the initialised range are absent, never defaulted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalTables {
    button_labels: BTreeMap<usize, String>,
    button_states: BTreeMap<usize, bool>,
    flag_labels: BTreeMap<usize, String>,
    flag_states: BTreeMap<usize, bool>,
    navigation: [bool; 6],
}

impl SignalTables {
    pub fn new(button_count: usize, flag_count: usize, defaults: &SignalDefaults) -> Self {
        Self {
            button_labels: (0..button_count)
                .map(|n| (n, defaults.button_label.clone()))
                .collect(),
            button_states: (0..button_count).map(|n| (n, false)).collect(),
            flag_labels: (0..flag_count)
                .map(|n| (n, defaults.flag_label.clone()))
                .collect(),
            flag_states: (0..flag_count).map(|n| (n, false)).collect(),
            navigation: [false; 6],
        }
    }

    pub fn count(&self, kind: SignalKind) -> usize {
        self.labels(kind).len()
    }

    pub fn label(&self, kind: SignalKind, number: usize) -> Option<&str> {
        self.labels(kind).get(&number).map(String::as_str)
    }

    pub fn state(&self, kind: SignalKind, number: usize) -> Option<bool> {
        self.states(kind).get(&number).copied()
    }

    /// Returns false when `number` was never initialised.
    pub fn set_label(&mut self, kind: SignalKind, number: usize, value: String) -> bool {
        match self.labels_mut(kind).get_mut(&number) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Returns false when `number` was never initialised.
    pub fn set_state(&mut self, kind: SignalKind, number: usize, value: bool) -> bool {
        match self.states_mut(kind).get_mut(&number) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn numbers(&self, kind: SignalKind) -> impl Iterator<Item = usize> + '_ {
        self.labels(kind).keys().copied()
    }

    pub fn navigation(&self, button: NavigationButton) -> bool {
        self.navigation[button.slot()]
    }

    pub fn set_navigation(&mut self, button: NavigationButton, value: bool) {
        self.navigation[button.slot()] = value;
    }

    fn labels(&self, kind: SignalKind) -> &BTreeMap<usize, String> {
        match kind {
            SignalKind::Button => &self.button_labels,
            SignalKind::Flag => &self.flag_labels,
        }
    }

    fn labels_mut(&mut self, kind: SignalKind) -> &mut BTreeMap<usize, String> {
        match kind {
            SignalKind::Button => &mut self.button_labels,
            SignalKind::Flag => &mut self.flag_labels,
        }
    }

    fn states(&self, kind: SignalKind) -> &BTreeMap<usize, bool> {
        match kind {
            SignalKind::Button => &self.button_states,
            SignalKind::Flag => &self.flag_states,
        }
    }

    fn states_mut(&mut self, kind: SignalKind) -> &mut BTreeMap<usize, bool> {
        match kind {
            SignalKind::Button => &mut self.button_states,
            SignalKind::Flag => &mut self.flag_states,
        }
    }
}

/// Callback a script attaches to a button press.
pub type ButtonDelegate = Box<dyn FnMut() + Send>;

/// Press callbacks of one monitor, keyed by script button number. Numbered
/// buttons use 0.. and the navigation keys -1..=-6.
#[derive(Default)]
pub struct ButtonDelegates {
    delegates: HashMap<i32, ButtonDelegate>,
}

impl ButtonDelegates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `delegate` for `number`, replacing any previous one.
    pub fn set(&mut self, number: i32, delegate: ButtonDelegate) {
        self.delegates.insert(number, delegate);
    }

    pub fn clear(&mut self, number: i32) -> bool {
        self.delegates.remove(&number).is_some()
    }

    pub fn contains(&self, number: i32) -> bool {
        self.delegates.contains_key(&number)
    }

    pub fn len(&self) -> usize {
        self.delegates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.delegates.is_empty()
    }

    /// Run the delegate for `number`. Returns false when none is installed.
    pub fn fire(&mut self, number: i32) -> bool {
        match self.delegates.get_mut(&number) {
            Some(delegate) => {
                delegate();
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for ButtonDelegates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut numbers: Vec<_> = self.delegates.keys().copied().collect();
        numbers.sort_unstable();
        f.debug_struct("ButtonDelegates")
            .field("numbers", &numbers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_are_dense_and_bounded() {
        let defaults = SignalDefaults::default();
        let mut tables = SignalTables::new(3, 2, &defaults);

        assert_eq!(tables.count(SignalKind::Button), 3);
        assert_eq!(tables.count(SignalKind::Flag), 2);
        assert_eq!(tables.label(SignalKind::Button, 2), Some("-"));
        assert_eq!(tables.state(SignalKind::Flag, 1), Some(false));
        assert_eq!(tables.state(SignalKind::Flag, 2), None);

        assert!(tables.set_state(SignalKind::Button, 0, true));
        assert!(!tables.set_state(SignalKind::Button, 3, true));
        assert!(!tables.set_label(SignalKind::Flag, 5, "x".into()));
        assert_eq!(tables.state(SignalKind::Button, 0), Some(true));
    }

    #[test]
    fn navigation_indices_map_to_buttons() {
        assert_eq!(
            NavigationButton::from_script_index(-1),
            Some(NavigationButton::Enter)
        );
        assert_eq!(
            NavigationButton::from_script_index(-6),
            Some(NavigationButton::Right)
        );
        assert_eq!(NavigationButton::from_script_index(-7), None);
        assert_eq!(NavigationButton::from_script_index(0), None);

        let mut tables = SignalTables::new(0, 0, &SignalDefaults::default());
        tables.set_navigation(NavigationButton::Cancel, true);
        assert!(tables.navigation(NavigationButton::Cancel));
        assert!(!tables.navigation(NavigationButton::Enter));

        for button in NavigationButton::ALL {
            assert_eq!(
                NavigationButton::from_script_index(button.script_index()),
                Some(button)
            );
        }
    }

    #[test]
    fn delegates_fire_by_number() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicUsize, Ordering};

        let hits = Arc::new(AtomicUsize::new(0));
        let mut delegates = ButtonDelegates::new();
        let counter = Arc::clone(&hits);
        delegates.set(-2, Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        assert!(delegates.fire(-2));
        assert!(delegates.fire(-2));
        assert!(!delegates.fire(3));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert!(delegates.clear(-2));
        assert!(delegates.is_empty());
    }
}
