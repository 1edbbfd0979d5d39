//! Host utilisation sampling for the settings page.

use serde::Serialize;
use std::thread;
use std::time::Duration;
use sysinfo::System;

/// CPU usage is the average over this window.
pub const CPU_SAMPLE_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SystemStatus {
    /// Percent, 0-100
    pub cpu: f32,
    /// Percent of physical memory in use, 0-100
    pub memory: f32,
}

/// Blocks for [`CPU_SAMPLE_INTERVAL`].
pub fn sample() -> SystemStatus {
    sample_over(CPU_SAMPLE_INTERVAL)
}

pub fn sample_over(interval: Duration) -> SystemStatus {
    let mut sys = System::new();
    sys.refresh_cpu();
    thread::sleep(interval.max(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL));
    sys.refresh_cpu();
    sys.refresh_memory();

    let total = sys.total_memory();
    let memory = if total == 0 {
        0.0
    } else {
        sys.used_memory() as f64 / total as f64 * 100.0
    };
    SystemStatus {
        cpu: round1(sys.global_cpu_info().cpu_usage() as f64),
        memory: round1(memory),
    }
}

fn round1(value: f64) -> f32 {
    ((value * 10.0).round() / 10.0).clamp(0.0, 100.0) as f32
}
