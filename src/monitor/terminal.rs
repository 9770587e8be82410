use std::time::Duration;

use blake3::Hash;
use serde_json::json;

use crate::error::{PropMonitorError, Result};
use crate::identity::{MonitorId, PartId, VesselKey};
use crate::input::InputSymbol;
use crate::logging::{LogLevel, Logger, MONITOR_TARGET, emit, json_kv, json_str};
use crate::registry::{MonitorInstance, MonitorRegistry, NavigationButton, SignalKind};
use crate::runtime::{FrameContext, ScreenSnapshot, SharedProcessor};
use crate::tokens::{DisplayTemplate, TemplateValues, load_replacements, load_template};
use crate::width::clip_to_width;

use super::MonitorConfig;
use super::blink::BlinkTimer;

const RESET_TINT: &str = "[#ffffffff]";

/// Cockpit terminal bound to one host part.
pub struct TerminalMonitor {
    part: PartId,
    config: MonitorConfig,
    logger: Option<Logger>,
    id: Option<MonitorId>,
    vessel: Option<VesselKey>,
    initialized: bool,
    processors: Vec<SharedProcessor>,
    current: usize,
    powered: bool,
    console_open: bool,
    response: String,
    blink: BlinkTimer,
    since_refresh: Option<Duration>,
    screen: ScreenSnapshot,
    template: Option<DisplayTemplate>,
    replacements: TemplateValues,
    assets_loaded: bool,
    content: String,
    content_hash: Option<Hash>,
    dirty: bool,
}

impl TerminalMonitor {
    pub fn new(part: PartId, config: MonitorConfig) -> Self {
        let content = config.standing_by_text.clone();
        Self {
            part,
            config,
            logger: None,
            id: None,
            vessel: None,
            initialized: false,
            processors: Vec::new(),
            current: 0,
            powered: false,
            console_open: false,
            response: String::new(),
            blink: BlinkTimer::default(),
            since_refresh: None,
            screen: ScreenSnapshot::default(),
            template: None,
            replacements: TemplateValues::new(),
            assets_loaded: false,
            content,
            content_hash: None,
            dirty: true,
        }
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn vessel(&self) -> Option<VesselKey> {
        self.vessel
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn is_console_open(&self) -> bool {
        self.console_open
    }

    pub fn is_powered(&self) -> bool {
        self.powered
    }

    pub fn current_processor(&self) -> usize {
        self.current
    }

    pub fn processor_count(&self) -> usize {
        self.processors.len()
    }

    /// True once after every change to the displayed text.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Latch a navigation key and run the script delegate attached to it.
    pub fn latch_navigation(
        &mut self,
        registry: &mut MonitorRegistry,
        button: NavigationButton,
    ) -> Result<()> {
        let (vessel, index) = self.location(registry)?;
        let set = registry.vessel_set_mut(vessel)?;
        set.set_navigation_state(index, button, true)?;
        set.fire_delegate(index, button.script_index())?;
        Ok(())
    }

    fn initialize(&mut self, ctx: &mut FrameContext<'_>) -> Result<()> {
        if !self.assets_loaded {
            self.load_assets();
        }
        let Some(vessel) = ctx.host().vessel_of(self.part) else {
            return Ok(());
        };

        ctx.registry.register_vessel(vessel);
        let id = match self.id {
            Some(id) => id,
            None => ctx.registry.vessel_set(vessel)?.claim_identity(),
        };
        let index = ctx.registry.move_monitor(id, vessel)?;

        let defaults = ctx.registry.signal_defaults();
        let buttons = self.config.button_count.unwrap_or(defaults.button_count);
        let flags = self.config.flag_count.unwrap_or(defaults.flag_count);
        ctx.registry
            .vessel_set_mut(vessel)?
            .get_or_init_signal_tables(index, buttons, flags)?;

        self.processors = ctx.host().processors(vessel);
        self.current = self.current.min(self.processors.len().saturating_sub(1));
        self.powered = self.selected_powered();
        self.response = if self.processors.is_empty() {
            self.config.not_installed_text.clone()
        } else {
            self.processor_list()
        };
        self.id = Some(id);
        self.vessel = Some(vessel);
        self.initialized = true;
        self.since_refresh = None;

        self.log(
            LogLevel::Info,
            "monitor_initialized",
            [
                json_str("monitor", id.to_string()),
                json_str("vessel", vessel.to_string()),
                json_kv("index", json!(index)),
                json_kv("processors", json!(self.processors.len())),
            ],
        );
        Ok(())
    }

    fn load_assets(&mut self) {
        self.assets_loaded = true;
        let logger = self.logger.as_ref();
        if let Some(path) = self.config.template_path.as_deref() {
            self.template = load_template(path, logger);
        }
        if let Some(path) = self.config.replacements_path.as_deref() {
            self.replacements = load_replacements(path, logger);
        }
    }

    fn location(&self, registry: &MonitorRegistry) -> Result<(VesselKey, usize)> {
        let id = self.id.ok_or(PropMonitorError::NotInitialized(self.part))?;
        let vessel = registry
            .owner_of(id)
            .ok_or(PropMonitorError::MonitorNotFound(id))?;
        let index = registry
            .vessel_set(vessel)?
            .index_of(id)
            .ok_or(PropMonitorError::MonitorNotFound(id))?;
        Ok((vessel, index))
    }

    fn selected(&self) -> Option<&SharedProcessor> {
        self.processors.get(self.current)
    }

    fn selected_powered(&self) -> bool {
        self.selected()
            .and_then(|processor| processor.lock().ok().map(|p| p.is_powered()))
            .unwrap_or(false)
    }

    fn tint(&self) -> &str {
        if self.powered {
            &self.config.text_tint
        } else {
            &self.config.text_tint_unpowered
        }
    }

    fn processor_list(&self) -> String {
        let tint = self.tint();
        (0..self.processors.len())
            .map(|n| {
                if n == self.current {
                    format!("kOS Processor {tint}{n}[#FFFFFF] <--")
                } else {
                    format!("kOS Processor {n}")
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn cycle(&mut self, forward: bool) {
        let count = self.processors.len();
        self.current = if forward {
            (self.current + 1) % count
        } else {
            (self.current + count - 1) % count
        };
        self.powered = self.selected_powered();
        self.response = self.processor_list();
    }

    fn toggle_power(&mut self) -> Result<()> {
        if let Some(processor) = self.selected() {
            processor
                .lock()
                .map_err(|_| PropMonitorError::RegistryPoisoned)?
                .toggle_power();
        }
        self.powered = self.selected_powered();
        if !self.console_open {
            self.response = self.processor_list();
        }
        Ok(())
    }

    fn refresh_screen(&mut self, elapsed: Duration) -> Result<()> {
        let due = match self.since_refresh.as_mut() {
            None => true,
            Some(since) => {
                *since += elapsed;
                *since >= self.config.screen_refresh()
            }
        };
        if !due {
            return Ok(());
        }
        let Some(processor) = self.selected() else {
            return Ok(());
        };
        let mut processor = processor
            .lock()
            .map_err(|_| PropMonitorError::RegistryPoisoned)?;
        let mut snapshot = processor.screen();
        if snapshot.row_count != self.config.console_height
            || snapshot.column_count != self.config.console_width
        {
            processor.set_screen_size(self.config.console_height, self.config.console_width);
            snapshot = processor.screen();
        }
        drop(processor);
        self.screen = snapshot;
        self.since_refresh = Some(Duration::ZERO);
        Ok(())
    }

    fn buffer_console(&self) -> String {
        let screen = &self.screen;
        let blink_on = self.blink.is_on() && screen.cursor_row < screen.row_count && self.powered;
        let cursor = if blink_on { '_' } else { ' ' };
        let tint = self.tint();

        screen
            .rows
            .iter()
            .take(screen.row_count.min(self.config.console_height))
            .enumerate()
            .map(|(row, text)| {
                let line = if row == screen.cursor_row {
                    place_cursor(text, screen.cursor_column, cursor)
                } else {
                    text.clone()
                };
                let line = clip_to_width(&line, self.config.console_width);
                format!("{tint}{line}{RESET_TINT}")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn compose(&mut self, registry: &MonitorRegistry) -> Result<()> {
        let Some(template) = self.template.as_ref() else {
            let text = self.response.clone();
            self.set_content(text);
            return Ok(());
        };

        let mut values = self.replacements.clone();
        let mut lines = self.response.lines();
        for row in 0..self.config.console_height {
            values.insert(format!("l{row}"), lines.next().unwrap_or_default().to_string());
        }

        let (vessel, index) = self.location(registry)?;
        let set = registry.vessel_set(vessel)?;
        for number in set.signal_numbers(index, SignalKind::Button)? {
            values.insert(
                format!("buttonLabel{number}"),
                set.label(index, SignalKind::Button, number)?,
            );
            values.insert(
                format!("buttonState{number}"),
                set.state(index, SignalKind::Button, number)?.to_string(),
            );
        }
        for number in set.signal_numbers(index, SignalKind::Flag)? {
            values.insert(
                format!("flagLabel{number}"),
                set.label(index, SignalKind::Flag, number)?,
            );
            let marker = if set.state(index, SignalKind::Flag, number)? {
                &self.config.flag_on_marker
            } else {
                &self.config.flag_off_marker
            };
            values.insert(format!("flagSide{number}"), marker.clone());
        }
        let id = set.monitor_at(index)?;
        values.insert("GUID".to_string(), id.to_string());
        values.insert("GUIDSHORT".to_string(), id.short());

        let text = template.render(&values);
        self.set_content(text);
        Ok(())
    }

    fn set_content(&mut self, content: String) {
        let hash = blake3::hash(content.as_bytes());
        if self.content_hash.map(|h| h != hash).unwrap_or(true) {
            self.content = content;
            self.content_hash = Some(hash);
            self.dirty = true;
        }
    }

    fn log<I>(&self, level: LogLevel, message: &str, fields: I)
    where
        I: IntoIterator<Item = (String, serde_json::Value)>,
    {
        emit(self.logger.as_ref(), level, MONITOR_TARGET, message, fields);
    }
}

/// Insert the cursor glyph before the character at `column`.
fn place_cursor(text: &str, column: usize, cursor: char) -> String {
    let mut line = String::with_capacity(text.len() + 1);
    let mut placed = false;
    for (n, ch) in text.chars().enumerate() {
        if n == column {
            line.push(cursor);
            placed = true;
        }
        line.push(ch);
    }
    if !placed && column == text.chars().count() {
        line.push(cursor);
    }
    line
}

impl MonitorInstance for TerminalMonitor {
    fn name(&self) -> &str {
        "kpm_terminal"
    }

    fn monitor_id(&self) -> Option<MonitorId> {
        self.id
    }

    fn part(&self) -> Option<PartId> {
        Some(self.part)
    }

    fn content(&self) -> String {
        self.content.clone()
    }

    fn handle_input(&mut self, symbol: InputSymbol) {
        let Some(processor) = self.selected() else {
            return;
        };
        let Ok(mut processor) = processor.lock() else {
            return;
        };
        match symbol {
            InputSymbol::Char(ch) => processor.type_char(ch),
            InputSymbol::Key(key) => processor.special_key(key),
        }
    }

    fn reinitialize(&mut self) {
        self.initialized = false;
        self.processors.clear();
        self.since_refresh = None;
    }

    fn update(&mut self, ctx: &mut FrameContext<'_>) -> Result<()> {
        if !self.initialized {
            self.initialize(ctx)?;
        }
        if !self.initialized {
            let text = self.config.standing_by_text.clone();
            self.set_content(text);
            return Ok(());
        }

        self.blink.advance(ctx.elapsed());
        if self.processors.is_empty() {
            self.console_open = false;
            self.response = self.config.not_installed_text.clone();
        } else {
            self.powered = self.selected_powered();
            if self.console_open {
                self.refresh_screen(ctx.elapsed())?;
                self.response = self.buffer_console();
            }
        }

        if let Some(id) = self.id {
            if ctx.registry.is_focused(id) && (!self.console_open || !self.powered) {
                ctx.registry.release_focus(id)?;
                self.log(
                    LogLevel::Debug,
                    "focus_auto_released",
                    [json_str("monitor", id.to_string())],
                );
            }
        }

        self.compose(ctx.registry)
    }

    fn press_button(&mut self, ctx: &mut FrameContext<'_>, button: usize) -> Result<()> {
        if !self.initialized {
            return Ok(());
        }

        if !self.config.control_buttons().contains(&button) {
            let (vessel, index) = self.location(ctx.registry)?;
            let set = ctx.registry.vessel_set_mut(vessel)?;
            set.set_state(index, SignalKind::Button, button, true)?;
            if let Ok(number) = i32::try_from(button) {
                set.fire_delegate(index, number)?;
            }
        } else if !self.processors.is_empty() {
            if button == self.config.processor_selector_up_button {
                self.cycle(false);
            } else if button == self.config.processor_selector_down_button {
                self.cycle(true);
            } else if button == self.config.open_console_button {
                self.console_open = true;
                self.since_refresh = None;
            } else if button == self.config.toggle_processor_power_button {
                self.toggle_power()?;
            } else if button == self.config.toggle_keyboard_button && self.console_open {
                if let Some(id) = self.id {
                    ctx.registry.toggle_focus(id)?;
                }
            }
        }

        let keeps_console = [
            self.config.open_console_button,
            self.config.toggle_keyboard_button,
            self.config.toggle_processor_power_button,
        ]
        .contains(&button);
        if self.console_open && !keeps_console {
            self.console_open = false;
            if !self.processors.is_empty() {
                self.response = self.processor_list();
            }
        }
        Ok(())
    }

    fn press_navigation(
        &mut self,
        ctx: &mut FrameContext<'_>,
        button: NavigationButton,
    ) -> Result<()> {
        if !self.initialized {
            return Ok(());
        }
        self.latch_navigation(ctx.registry, button)
    }
}
