//! Terminal monitor widget: renders a scripting processor's console on a
//! cockpit prop and forwards keystrokes to it while focused.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::error::Result;

mod blink;
mod terminal;

pub use blink::BlinkTimer;
pub use terminal::TerminalMonitor;

/// Widget-level settings supplied with the cockpit prop.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub processor_selector_up_button: usize,
    pub processor_selector_down_button: usize,
    pub open_console_button: usize,
    pub toggle_processor_power_button: usize,
    pub toggle_keyboard_button: usize,
    pub text_tint: String,
    pub text_tint_unpowered: String,
    pub console_width: usize,
    pub console_height: usize,
    pub template_path: Option<PathBuf>,
    pub replacements_path: Option<PathBuf>,
    pub flag_on_marker: String,
    pub flag_off_marker: String,
    pub standing_by_text: String,
    pub not_installed_text: String,
    /// Minimum interval between processor screen snapshots, in milliseconds.
    pub screen_refresh_ms: u64,
    /// Overrides for the registry's default signal counts.
    pub button_count: Option<usize>,
    pub flag_count: Option<usize>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            processor_selector_up_button: 0,
            processor_selector_down_button: 1,
            open_console_button: 2,
            toggle_processor_power_button: 3,
            toggle_keyboard_button: 4,
            text_tint: "[#009900ff]".to_string(),
            text_tint_unpowered: "[#ffffff3e]".to_string(),
            console_width: 50,
            console_height: 36,
            template_path: None,
            replacements_path: None,
            flag_on_marker: "[#00ff00ff]|".to_string(),
            flag_off_marker: "[#ff0000ff]|".to_string(),
            standing_by_text: "kOS Terminal Standing By".to_string(),
            not_installed_text: "kOS is not installed!".to_string(),
            screen_refresh_ms: 50,
            button_count: None,
            flag_count: None,
        }
    }
}

impl MonitorConfig {
    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn screen_refresh(&self) -> Duration {
        Duration::from_millis(self.screen_refresh_ms)
    }

    /// Button ids the widget interprets itself rather than latching.
    pub fn control_buttons(&self) -> [usize; 5] {
        [
            self.processor_selector_up_button,
            self.processor_selector_down_button,
            self.open_console_button,
            self.toggle_processor_power_button,
            self.toggle_keyboard_button,
        ]
    }
}
