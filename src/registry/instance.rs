use std::sync::{Arc, Mutex};

use crate::error::Result;
use crate::identity::{MonitorId, PartId};
use crate::input::InputSymbol;
use crate::runtime::FrameContext;

use super::signals::NavigationButton;

/// Contract a cockpit monitor widget satisfies toward the registry.
///
/// The registry calls `handle_input` while it holds its own lock, so
/// implementations must not reach back into the registry from there. The
/// frame hooks receive the registry through [`FrameContext`] instead.
pub trait MonitorInstance: Send {
    fn name(&self) -> &str {
        "kpm_monitor"
    }

    /// Current identity, `None` until the widget has initialised once.
    fn monitor_id(&self) -> Option<MonitorId>;

    /// Host part the widget is mounted on, if it is bound to one.
    fn part(&self) -> Option<PartId> {
        None
    }

    /// Text the cockpit prop should display this frame.
    fn content(&self) -> String {
        String::new()
    }

    /// Receive one decoded keystroke while holding focus.
    fn handle_input(&mut self, symbol: InputSymbol);

    /// Structural change on the owning vessel; processor bindings are stale.
    fn reinitialize(&mut self) {}

    fn update(&mut self, _ctx: &mut FrameContext<'_>) -> Result<()> {
        Ok(())
    }

    fn press_button(&mut self, _ctx: &mut FrameContext<'_>, _button: usize) -> Result<()> {
        Ok(())
    }

    fn press_navigation(
        &mut self,
        _ctx: &mut FrameContext<'_>,
        _button: NavigationButton,
    ) -> Result<()> {
        Ok(())
    }
}

pub type SharedMonitor = Arc<Mutex<dyn MonitorInstance>>;
