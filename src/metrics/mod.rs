use crate::logging::{LogEvent, LogFields, LogLevel};
use serde_json::json;
use std::time::Duration;

/// Counters accumulated by the flight runtime and the registry.
#[derive(Debug, Default, Clone)]
pub struct RegistryMetrics {
    frames: u64,
    keys_dispatched: u64,
    keys_ignored: u64,
    focus_grants: u64,
    focus_denials: u64,
    focus_releases: u64,
    reconfigurations: u64,
    processor_rebinds: u64,
}

impl RegistryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_frame(&mut self) {
        self.frames = self.frames.saturating_add(1);
    }

    pub fn record_key(&mut self, consumed: bool) {
        if consumed {
            self.keys_dispatched = self.keys_dispatched.saturating_add(1);
        } else {
            self.keys_ignored = self.keys_ignored.saturating_add(1);
        }
    }

    pub fn record_focus_request(&mut self, granted: bool) {
        if granted {
            self.focus_grants = self.focus_grants.saturating_add(1);
        } else {
            self.focus_denials = self.focus_denials.saturating_add(1);
        }
    }

    pub fn record_focus_release(&mut self) {
        self.focus_releases = self.focus_releases.saturating_add(1);
    }

    pub fn record_reconfiguration(&mut self, monitors: usize) {
        self.reconfigurations = self.reconfigurations.saturating_add(monitors as u64);
    }

    pub fn record_rebind(&mut self) {
        self.processor_rebinds = self.processor_rebinds.saturating_add(1);
    }

    pub fn snapshot(&self, uptime: Duration) -> MetricSnapshot {
        MetricSnapshot {
            uptime_ms: uptime.as_millis() as u64,
            frames: self.frames,
            keys_dispatched: self.keys_dispatched,
            keys_ignored: self.keys_ignored,
            focus_grants: self.focus_grants,
            focus_denials: self.focus_denials,
            focus_releases: self.focus_releases,
            reconfigurations: self.reconfigurations,
            processor_rebinds: self.processor_rebinds,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricSnapshot {
    pub uptime_ms: u64,
    pub frames: u64,
    pub keys_dispatched: u64,
    pub keys_ignored: u64,
    pub focus_grants: u64,
    pub focus_denials: u64,
    pub focus_releases: u64,
    pub reconfigurations: u64,
    pub processor_rebinds: u64,
}

impl MetricSnapshot {
    pub fn to_log_event(&self, target: &str) -> LogEvent {
        LogEvent::with_fields(LogLevel::Info, target, "registry_metrics", self.as_fields())
    }

    pub fn as_fields(&self) -> LogFields {
        let mut map = LogFields::new();
        map.insert("uptime_ms".to_string(), json!(self.uptime_ms));
        map.insert("frames".to_string(), json!(self.frames));
        map.insert("keys_dispatched".to_string(), json!(self.keys_dispatched));
        map.insert("keys_ignored".to_string(), json!(self.keys_ignored));
        map.insert("focus_grants".to_string(), json!(self.focus_grants));
        map.insert("focus_denials".to_string(), json!(self.focus_denials));
        map.insert("focus_releases".to_string(), json!(self.focus_releases));
        map.insert("reconfigurations".to_string(), json!(self.reconfigurations));
        map.insert("processor_rebinds".to_string(), json!(self.processor_rebinds));
        map
    }
}
