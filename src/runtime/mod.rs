use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crossterm::event::KeyEvent;
use serde_json::json;

use crate::bindings::KeyBindingHost;
use crate::error::{PropMonitorError, Result};
use crate::identity::{MonitorId, PartId, VesselKey};
use crate::input::decode_key;
use crate::logging::{LogLevel, Logger, METRICS_TARGET, RUNTIME_TARGET, emit, json_kv, json_str};
use crate::metrics::RegistryMetrics;
use crate::registry::{
    MonitorInstance, MonitorRegistry, NavigationButton, SharedMonitor, SharedRegistry,
    SignalDefaults, lock_registry,
};
use crate::script::{ProcessorRebinder, ScriptAddon};

mod processor;

pub use processor::{Processor, ScreenSnapshot, SharedProcessor};

/// Configuration knobs for the flight runtime.
#[derive(Clone)]
pub struct RuntimeConfig {
    /// Optional structured logger shared with the registry.
    pub logger: Option<Logger>,
    /// Metrics accumulator used for periodic snapshots.
    pub metrics: Option<Arc<Mutex<RegistryMetrics>>>,
    /// Interval between metrics snapshot emissions. Zero disables snapshots.
    pub metrics_interval: Duration,
    /// Target field used when emitting metrics snapshots.
    pub metrics_target: String,
    /// How long a processor must stay powered before its signals are bound.
    pub rebind_delay: Duration,
    /// Monitor index whose signals the processor binding names address.
    pub binding_monitor_index: usize,
    /// Defaults applied to every monitor's signal tables.
    pub signal_defaults: SignalDefaults,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            logger: None,
            metrics: None,
            metrics_interval: Duration::from_secs(5),
            metrics_target: METRICS_TARGET.to_string(),
            rebind_delay: Duration::from_secs(1),
            binding_monitor_index: 0,
            signal_defaults: SignalDefaults::default(),
        }
    }
}

impl RuntimeConfig {
    /// Enable metrics collection if it has not already been configured.
    pub fn enable_metrics(&mut self) {
        if self.metrics.is_none() {
            self.metrics = Some(Arc::new(Mutex::new(RegistryMetrics::new())));
        }
    }

    pub fn disable_metrics(&mut self) {
        self.metrics = None;
    }

    pub fn metrics_handle(&self) -> Option<Arc<Mutex<RegistryMetrics>>> {
        self.metrics.as_ref().map(Arc::clone)
    }
}

/// Lifecycle and input notifications delivered by the simulator.
#[derive(Debug, Clone)]
pub enum HostEvent {
    EnterFlight,
    ExitFlight,
    VesselCreated(VesselKey),
    VesselDestroyed(VesselKey),
    VesselsDocked {
        absorbed: VesselKey,
        survivor: VesselKey,
    },
    PartDestroyed(PartId),
    Key(KeyEvent),
    Button {
        monitor: MonitorId,
        button: usize,
    },
    Navigation {
        monitor: MonitorId,
        button: NavigationButton,
    },
    Tick {
        elapsed: Duration,
    },
}

/// Whether the cockpit swallowed an event or the simulator should see it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventFlow {
    Continue,
    Consumed,
}

/// Read access to the simulator's flight state.
pub trait FlightHost: Send {
    /// Vessel the part currently belongs to, `None` when it no longer exists.
    fn vessel_of(&self, part: PartId) -> Option<VesselKey>;

    fn part_count(&self, vessel: VesselKey) -> Option<usize>;

    /// Scripting processors on the vessel in part order.
    fn processors(&self, vessel: VesselKey) -> Vec<SharedProcessor>;
}

/// Per-frame view handed to monitor hooks.
pub struct FrameContext<'a> {
    pub registry: &'a mut MonitorRegistry,
    host: &'a dyn FlightHost,
    logger: Option<&'a Logger>,
    elapsed: Duration,
}

impl<'a> FrameContext<'a> {
    pub fn new(
        registry: &'a mut MonitorRegistry,
        host: &'a dyn FlightHost,
        logger: Option<&'a Logger>,
        elapsed: Duration,
    ) -> Self {
        Self {
            registry,
            host,
            logger,
            elapsed,
        }
    }

    pub fn host(&self) -> &dyn FlightHost {
        self.host
    }

    pub fn logger(&self) -> Option<&Logger> {
        self.logger
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlightPhase {
    Outside,
    InFlight,
}

/// Drives the registry from host events: scene resets, vessel lifecycle,
/// keyboard routing, and the per-frame monitor update.
pub struct FlightRuntime {
    registry: SharedRegistry,
    host: Box<dyn FlightHost>,
    monitors: Vec<SharedMonitor>,
    rebinder: ProcessorRebinder,
    config: RuntimeConfig,
    phase: FlightPhase,
    start_instant: Option<Instant>,
    last_metrics_emit: Option<Instant>,
}

impl FlightRuntime {
    pub fn new(
        bindings: Box<dyn KeyBindingHost>,
        host: Box<dyn FlightHost>,
        mut config: RuntimeConfig,
    ) -> Self {
        if config.metrics.is_none() && config.metrics_interval > Duration::ZERO {
            config.enable_metrics();
        }

        let mut registry =
            MonitorRegistry::new(bindings).with_signal_defaults(config.signal_defaults.clone());
        if let Some(logger) = config.logger.clone() {
            registry = registry.with_logger(logger);
        }
        if let Some(metrics) = config.metrics_handle() {
            registry = registry.with_metrics(metrics);
        }

        let mut rebinder = ProcessorRebinder::new(config.rebind_delay)
            .with_monitor_index(config.binding_monitor_index);
        if let Some(logger) = config.logger.clone() {
            rebinder = rebinder.with_logger(logger);
        }

        Self {
            registry: registry.into_shared(),
            host,
            monitors: Vec::new(),
            rebinder,
            config,
            phase: FlightPhase::Outside,
            start_instant: None,
            last_metrics_emit: None,
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn registry(&self) -> SharedRegistry {
        Arc::clone(&self.registry)
    }

    pub fn is_in_flight(&self) -> bool {
        self.phase == FlightPhase::InFlight
    }

    /// Script-facing view of one vessel's signals.
    pub fn script_addon(&self, vessel: VesselKey) -> ScriptAddon {
        ScriptAddon::new(self.registry(), vessel)
    }

    /// Take ownership of a monitor widget. It is initialised on the next
    /// frame and becomes eligible for focus once it has an identity.
    pub fn attach_monitor(&mut self, monitor: SharedMonitor) -> Result<()> {
        let id = monitor
            .lock()
            .map_err(|_| PropMonitorError::RegistryPoisoned)?
            .monitor_id();
        if let Some(id) = id {
            lock_registry(&self.registry)?.register_monitor_instance(id, Arc::clone(&monitor));
        }
        self.monitors.push(monitor);
        Ok(())
    }

    pub fn attached_monitors(&self) -> &[SharedMonitor] {
        &self.monitors
    }

    pub fn handle_event(&mut self, event: HostEvent) -> Result<EventFlow> {
        let flow = match event {
            HostEvent::EnterFlight => {
                self.enter_flight()?;
                EventFlow::Continue
            }
            HostEvent::ExitFlight => {
                self.exit_flight()?;
                EventFlow::Continue
            }
            HostEvent::VesselCreated(vessel) => {
                lock_registry(&self.registry)?.register_vessel(vessel);
                EventFlow::Continue
            }
            HostEvent::VesselDestroyed(vessel) => {
                let mut registry = lock_registry(&self.registry)?;
                if registry.contains_vessel(vessel) {
                    self.reinitialize_vessel(&registry, vessel)?;
                    registry.deregister_vessel(vessel)?;
                }
                EventFlow::Continue
            }
            HostEvent::VesselsDocked { absorbed, survivor } => {
                let mut registry = lock_registry(&self.registry)?;
                if registry.contains_vessel(absorbed) {
                    registry.merge_vessel(absorbed, survivor)?;
                } else {
                    registry.register_vessel(survivor);
                }
                self.reinitialize_vessel(&registry, survivor)?;
                EventFlow::Continue
            }
            HostEvent::PartDestroyed(part) => {
                self.detach_part(part)?;
                EventFlow::Continue
            }
            HostEvent::Key(key) => self.on_gui(&key)?,
            HostEvent::Button { monitor, button } => {
                self.press_button(monitor, button)?;
                EventFlow::Consumed
            }
            HostEvent::Navigation { monitor, button } => {
                self.press_navigation(monitor, button)?;
                EventFlow::Consumed
            }
            HostEvent::Tick { elapsed } => {
                self.update(elapsed)?;
                EventFlow::Continue
            }
        };
        Ok(flow)
    }

    pub fn run_scripted<I>(&mut self, events: I) -> Result<Vec<EventFlow>>
    where
        I: IntoIterator<Item = HostEvent>,
    {
        let mut flows = Vec::new();
        for event in events {
            flows.push(self.handle_event(event)?);
        }
        Ok(flows)
    }

    pub fn enter_flight(&mut self) -> Result<()> {
        lock_registry(&self.registry)?.on_enter_flight();
        self.monitors.clear();
        self.rebinder.clear();
        self.phase = FlightPhase::InFlight;
        self.start_instant = Some(Instant::now());
        self.last_metrics_emit = None;
        self.log(
            LogLevel::Info,
            "flight_entered",
            [json_kv("rebind_delay_ms", json!(self.config.rebind_delay.as_millis() as u64))],
        );
        Ok(())
    }

    pub fn exit_flight(&mut self) -> Result<()> {
        lock_registry(&self.registry)?.on_exit_flight();
        self.monitors.clear();
        self.rebinder.clear();
        self.phase = FlightPhase::Outside;
        let uptime = self
            .start_instant
            .take()
            .map(|start| start.elapsed().as_millis() as u64)
            .unwrap_or_default();
        self.log(
            LogLevel::Info,
            "flight_exited",
            [json_kv("uptime_ms", json!(uptime))],
        );
        Ok(())
    }

    /// Route one raw keyboard event. Decoded keystrokes go to the focused
    /// monitor; everything else is left for the simulator.
    pub fn on_gui(&mut self, key: &KeyEvent) -> Result<EventFlow> {
        if self.phase != FlightPhase::InFlight {
            return Ok(EventFlow::Continue);
        }
        let registry = lock_registry(&self.registry)?;
        let Some(handle) = registry.focused_handle()? else {
            return Ok(EventFlow::Continue);
        };
        drop(registry);
        let Some(symbol) = decode_key(key) else {
            self.record_key_metric(false);
            return Ok(EventFlow::Continue);
        };
        // Registry stays unlocked while the processor handles the key.
        handle
            .lock()
            .map_err(|_| PropMonitorError::RegistryPoisoned)?
            .handle_input(symbol);
        self.record_key_metric(true);
        Ok(EventFlow::Consumed)
    }

    /// Deliver a prop button press to one monitor.
    pub fn press_button(&mut self, monitor: MonitorId, button: usize) -> Result<()> {
        self.with_monitor(monitor, |widget, ctx| widget.press_button(ctx, button))
    }

    pub fn press_navigation(&mut self, monitor: MonitorId, button: NavigationButton) -> Result<()> {
        self.with_monitor(monitor, |widget, ctx| widget.press_navigation(ctx, button))
    }

    fn with_monitor<F>(&self, monitor: MonitorId, action: F) -> Result<()>
    where
        F: FnOnce(&mut dyn MonitorInstance, &mut FrameContext<'_>) -> Result<()>,
    {
        let mut registry = lock_registry(&self.registry)?;
        let handle = registry.monitor_handle(monitor)?;
        let mut widget = handle
            .lock()
            .map_err(|_| PropMonitorError::RegistryPoisoned)?;
        let mut ctx = FrameContext::new(
            &mut registry,
            self.host.as_ref(),
            self.config.logger.as_ref(),
            Duration::ZERO,
        );
        action(&mut *widget, &mut ctx)
    }

    /// One simulation frame: detect structural changes, update every attached
    /// monitor, and rebind freshly powered processors.
    pub fn update(&mut self, elapsed: Duration) -> Result<()> {
        if self.phase != FlightPhase::InFlight {
            return Ok(());
        }

        let mut registry = lock_registry(&self.registry)?;
        self.detect_structural_changes(&mut registry)?;

        let mut first_error = None;
        for handle in &self.monitors {
            let mut widget = handle
                .lock()
                .map_err(|_| PropMonitorError::RegistryPoisoned)?;
            let outcome = {
                let mut ctx = FrameContext::new(
                    &mut registry,
                    self.host.as_ref(),
                    self.config.logger.as_ref(),
                    elapsed,
                );
                widget.update(&mut ctx)
            };
            if let Err(err) = outcome {
                emit(
                    self.config.logger.as_ref(),
                    LogLevel::Error,
                    RUNTIME_TARGET,
                    "monitor_update_failed",
                    [
                        json_str("monitor", widget.name()),
                        json_str("error", err.to_string()),
                    ],
                );
                first_error.get_or_insert(err);
            }
            if let Some(id) = widget.monitor_id() {
                if !registry.contains_monitor(id) {
                    registry.register_monitor_instance(id, Arc::clone(handle));
                }
            }
        }

        let rebound = self
            .rebinder
            .tick(&registry, &self.registry, self.host.as_ref(), elapsed)?;
        drop(registry);

        for _ in 0..rebound {
            self.record_metric(RegistryMetrics::record_rebind);
        }
        self.record_metric(RegistryMetrics::record_frame);
        self.maybe_emit_metrics();

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn detect_structural_changes(&self, registry: &mut MonitorRegistry) -> Result<()> {
        for vessel in registry.vessel_keys() {
            let Some(count) = self.host.part_count(vessel) else {
                continue;
            };
            if registry.vessel_set_mut(vessel)?.observe_part_count(count) {
                self.reinitialize_vessel(registry, vessel)?;
            }
        }
        Ok(())
    }

    /// Mark every monitor on `vessel` stale so it re-resolves its vessel,
    /// index and processors on its next update.
    fn reinitialize_vessel(&self, registry: &MonitorRegistry, vessel: VesselKey) -> Result<()> {
        let handles = registry.monitor_handles_for(vessel)?;
        for handle in &handles {
            handle
                .lock()
                .map_err(|_| PropMonitorError::RegistryPoisoned)?
                .reinitialize();
        }
        let monitors = handles.len();
        self.record_metric(|m| m.record_reconfiguration(monitors));
        self.log(
            LogLevel::Info,
            "vessel_reconfigured",
            [
                json_str("vessel", vessel.to_string()),
                json_kv("monitors", json!(monitors)),
            ],
        );
        Ok(())
    }

    fn detach_part(&mut self, part: PartId) -> Result<()> {
        let mut registry = lock_registry(&self.registry)?;
        let attached = std::mem::take(&mut self.monitors);
        let mut kept = Vec::with_capacity(attached.len());
        for handle in attached {
            let (mounted_on, id) = {
                let widget = handle
                    .lock()
                    .map_err(|_| PropMonitorError::RegistryPoisoned)?;
                (widget.part(), widget.monitor_id())
            };
            if mounted_on != Some(part) {
                kept.push(handle);
                continue;
            }
            if let Some(id) = id.filter(|id| registry.contains_monitor(*id)) {
                registry.remove_monitor_instance(id)?;
            }
            self.log(
                LogLevel::Debug,
                "monitor_detached",
                [json_str("part", part.to_string())],
            );
        }
        self.monitors = kept;
        self.rebinder.forget(part);
        Ok(())
    }

    fn log<I>(&self, level: LogLevel, message: &str, fields: I)
    where
        I: IntoIterator<Item = (String, serde_json::Value)>,
    {
        emit(
            self.config.logger.as_ref(),
            level,
            RUNTIME_TARGET,
            message,
            fields,
        );
    }

    fn record_key_metric(&self, consumed: bool) {
        self.record_metric(|m| m.record_key(consumed));
    }

    fn record_metric(&self, update: impl FnOnce(&mut RegistryMetrics)) {
        if let Some(metrics) = self.config.metrics.as_ref() {
            if let Ok(mut guard) = metrics.lock() {
                update(&mut guard);
            }
        }
    }

    fn maybe_emit_metrics(&mut self) {
        if self.config.metrics.is_none() || self.config.metrics_interval == Duration::ZERO {
            return;
        }

        let now = Instant::now();
        match self.last_metrics_emit {
            Some(last) if now.duration_since(last) < self.config.metrics_interval => return,
            _ => self.last_metrics_emit = Some(now),
        }

        let uptime = self
            .start_instant
            .map(|start| now.duration_since(start))
            .unwrap_or_default();

        if let (Some(logger), Some(metrics)) =
            (self.config.logger.as_ref(), self.config.metrics.as_ref())
        {
            if let Ok(guard) = metrics.lock() {
                let event = guard
                    .snapshot(uptime)
                    .to_log_event(self.config.metrics_target.as_str());
                let _ = logger.log_event(event);
            }
        }
    }
}
