//! Simulator key bindings that must be silenced while a monitor owns the
//! keyboard.
//!
//! The host exposes five camera/throttle slots. The registry snapshots them
//! once at startup and writes them back verbatim whenever focus returns to
//! the simulator, so user customisations survive any number of focus cycles.

use std::collections::HashMap;

use crossterm::event::{KeyCode, KeyModifiers};

/// The five host binding slots touched by focus arbitration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingSlot {
    CameraReset,
    CameraMode,
    CameraNext,
    ThrottleCutoff,
    ThrottleFull,
}

impl BindingSlot {
    pub const ALL: [BindingSlot; 5] = [
        BindingSlot::CameraReset,
        BindingSlot::CameraMode,
        BindingSlot::CameraNext,
        BindingSlot::ThrottleCutoff,
        BindingSlot::ThrottleFull,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BindingSlot::CameraReset => "CAMERA_RESET",
            BindingSlot::CameraMode => "CAMERA_MODE",
            BindingSlot::CameraNext => "CAMERA_NEXT",
            BindingSlot::ThrottleCutoff => "THROTTLE_CUTOFF",
            BindingSlot::ThrottleFull => "THROTTLE_FULL",
        }
    }
}

/// One host key binding. `code == None` is the inert binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyBinding {
    pub code: Option<KeyCode>,
    pub modifiers: KeyModifiers,
}

impl KeyBinding {
    pub const fn new(code: KeyCode, modifiers: KeyModifiers) -> Self {
        Self {
            code: Some(code),
            modifiers,
        }
    }

    pub const fn key(code: KeyCode) -> Self {
        Self::new(code, KeyModifiers::NONE)
    }

    pub const fn unbound() -> Self {
        Self {
            code: None,
            modifiers: KeyModifiers::NONE,
        }
    }

    pub fn is_unbound(&self) -> bool {
        self.code.is_none()
    }
}

/// Host capability to read and overwrite the binding slots.
pub trait KeyBindingHost: Send {
    fn binding(&self, slot: BindingSlot) -> KeyBinding;
    fn set_binding(&mut self, slot: BindingSlot, binding: KeyBinding);
}

/// In-memory binding table seeded with the simulator's stock keys.
#[derive(Debug, Clone)]
pub struct MemoryKeyBindings {
    slots: HashMap<BindingSlot, KeyBinding>,
}

impl Default for MemoryKeyBindings {
    fn default() -> Self {
        let mut slots = HashMap::new();
        slots.insert(BindingSlot::CameraReset, KeyBinding::key(KeyCode::Char('`')));
        slots.insert(BindingSlot::CameraMode, KeyBinding::key(KeyCode::Char('v')));
        slots.insert(BindingSlot::CameraNext, KeyBinding::key(KeyCode::Char('c')));
        slots.insert(BindingSlot::ThrottleCutoff, KeyBinding::key(KeyCode::Char('x')));
        slots.insert(BindingSlot::ThrottleFull, KeyBinding::key(KeyCode::Char('z')));
        Self { slots }
    }
}

impl MemoryKeyBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_binding(mut self, slot: BindingSlot, binding: KeyBinding) -> Self {
        self.slots.insert(slot, binding);
        self
    }
}

impl KeyBindingHost for MemoryKeyBindings {
    fn binding(&self, slot: BindingSlot) -> KeyBinding {
        self.slots
            .get(&slot)
            .copied()
            .unwrap_or_else(KeyBinding::unbound)
    }

    fn set_binding(&mut self, slot: BindingSlot, binding: KeyBinding) {
        self.slots.insert(slot, binding);
    }
}

/// Snapshot of all five slots. Restoration writes every slot or none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RememberedBindings {
    slots: [(BindingSlot, KeyBinding); 5],
}

impl RememberedBindings {
    pub fn capture(host: &dyn KeyBindingHost) -> Self {
        Self {
            slots: BindingSlot::ALL.map(|slot| (slot, host.binding(slot))),
        }
    }

    pub fn get(&self, slot: BindingSlot) -> KeyBinding {
        self.slots
            .iter()
            .find(|(s, _)| *s == slot)
            .map(|(_, binding)| *binding)
            .unwrap_or_else(KeyBinding::unbound)
    }

    pub fn restore(&self, host: &mut dyn KeyBindingHost) {
        for (slot, binding) in self.slots {
            host.set_binding(slot, binding);
        }
    }

    pub fn unbind_all(host: &mut dyn KeyBindingHost) {
        for slot in BindingSlot::ALL {
            host.set_binding(slot, KeyBinding::unbound());
        }
    }

    /// True when the host currently holds exactly the remembered values.
    pub fn matches(&self, host: &dyn KeyBindingHost) -> bool {
        self.slots
            .iter()
            .all(|(slot, binding)| host.binding(*slot) == *binding)
    }
}
