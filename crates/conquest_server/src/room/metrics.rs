//! Lock-free counters describing a room's health.
//!
//! The room task is the only writer. Readers (the periodic metrics logger,
//! tests) take a [`MetricsSnapshot`] at any time without blocking a tick.

use conquest_core::TickReport;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct RoomMetrics {
    ticks: AtomicU64,
    last_tick_micros: AtomicU64,
    max_tick_micros: AtomicU64,
    agents: AtomicUsize,
    frames_sent: AtomicU64,
    frames_failed: AtomicU64,
    captures: AtomicU64,
    eliminations: AtomicU64,
    repairs: AtomicU64,
    start_time: Instant,
}

/// Point-in-time copy of [`RoomMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub uptime_seconds: u64,
    pub ticks: u64,
    pub last_tick_micros: u64,
    pub max_tick_micros: u64,
    pub agents: usize,
    pub frames_sent: u64,
    pub frames_failed: u64,
    pub captures: u64,
    pub eliminations: u64,
    pub repairs: u64,
}

impl RoomMetrics {
    pub fn new() -> Self {
        Self {
            ticks: AtomicU64::new(0),
            last_tick_micros: AtomicU64::new(0),
            max_tick_micros: AtomicU64::new(0),
            agents: AtomicUsize::new(0),
            frames_sent: AtomicU64::new(0),
            frames_failed: AtomicU64::new(0),
            captures: AtomicU64::new(0),
            eliminations: AtomicU64::new(0),
            repairs: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Records one simulation tick and what it produced.
    pub fn record_tick(&self, elapsed: Duration, report: &TickReport) {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.ticks.fetch_add(1, Ordering::Relaxed);
        self.last_tick_micros.store(micros, Ordering::Relaxed);
        self.max_tick_micros.fetch_max(micros, Ordering::Relaxed);
        self.captures.fetch_add(report.captures.len() as u64, Ordering::Relaxed);
        self.eliminations.fetch_add(report.eliminations.len() as u64, Ordering::Relaxed);
        self.repairs.fetch_add(report.repaired.len() as u64, Ordering::Relaxed);
    }

    pub fn set_agents(&self, agents: usize) {
        self.agents.store(agents, Ordering::Relaxed);
    }

    pub fn record_frame(&self) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// A frame that could not be serialised.
    pub fn record_failed_frame(&self) {
        self.frames_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn agents(&self) -> usize {
        self.agents.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_seconds: self.start_time.elapsed().as_secs(),
            ticks: self.ticks(),
            last_tick_micros: self.last_tick_micros.load(Ordering::Relaxed),
            max_tick_micros: self.max_tick_micros.load(Ordering::Relaxed),
            agents: self.agents(),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            frames_failed: self.frames_failed.load(Ordering::Relaxed),
            captures: self.captures.load(Ordering::Relaxed),
            eliminations: self.eliminations.load(Ordering::Relaxed),
            repairs: self.repairs.load(Ordering::Relaxed),
        }
    }
}

impl Default for RoomMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conquest_core::{AgentId, CaptureEvent};

    #[test]
    fn test_record_tick_tracks_max_duration() {
        let metrics = RoomMetrics::new();
        let report = TickReport {
            tick: 1,
            captures: vec![CaptureEvent { agent: AgentId(1), trail_cells: 4, enclosed: 2 }],
            ..TickReport::default()
        };

        metrics.record_tick(Duration::from_micros(800), &report);
        metrics.record_tick(Duration::from_micros(300), &TickReport::default());

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.ticks, 2);
        assert_eq!(snapshot.last_tick_micros, 300);
        assert_eq!(snapshot.max_tick_micros, 800);
        assert_eq!(snapshot.captures, 1);
        assert_eq!(snapshot.eliminations, 0);
    }

    #[test]
    fn test_counters() {
        let metrics = RoomMetrics::new();
        metrics.set_agents(3);
        metrics.record_frame();
        metrics.record_frame();
        metrics.record_failed_frame();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.agents, 3);
        assert_eq!(snapshot.frames_sent, 2);
        assert_eq!(snapshot.frames_failed, 1);
    }
}
