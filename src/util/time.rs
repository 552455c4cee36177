//! Time utilities for the simulation

use std::time::Instant;

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Default simulation rate
pub const DEFAULT_TICK_RATE: u32 = 20;

/// Upper bound on a single integration step, in nominal ticks
pub const MAX_TICK_STEPS: f32 = 3.0;

/// Nominal delta time for a tick rate (in seconds)
pub fn tick_delta(tick_rate: u32) -> f32 {
    1.0 / tick_rate.max(1) as f32
}

/// Clamp a measured delta so a stalled process never produces a huge step
pub fn clamp_delta(measured: f32, tick_rate: u32) -> f32 {
    let max = tick_delta(tick_rate) * MAX_TICK_STEPS;
    if measured.is_finite() {
        measured.clamp(0.0, max)
    } else {
        tick_delta(tick_rate)
    }
}

/// Measures wall-clock time between ticks
#[derive(Debug, Clone)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_secs(&self) -> f32 {
        self.start.elapsed().as_secs_f32()
    }

    pub fn reset(&mut self) {
        self.start = Instant::now();
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
