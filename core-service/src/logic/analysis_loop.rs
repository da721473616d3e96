//! Analysis Loop - Simulated Network Monitor
//!
//! Background thread: wait, simulate a flow, score it, count it, log
//! threats, then push `new_threat` and `stats_update` to the dashboard.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rand::Rng;

use crate::constants::{get_monitor_delay_window, MAX_MONITOR_DELAY_SECS, MONITOR_ERROR_BACKOFF_SECS};
use crate::logic::events::EventBus;
use crate::logic::model::{detect_or_fallback, ThreatDetector};
use crate::logic::simulator::FlowSimulator;
use crate::logic::threat::{FrontendThreat, ThreatDetection};
use crate::logic::threat_log::{StoreError, ThreatStats, ThreatStore};

/// Stop-flag poll interval while waiting
const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    /// Seconds between detections, drawn uniformly from the window
    pub min_delay_secs: f64,
    pub max_delay_secs: f64,
    pub error_backoff: Duration,
    /// Fixed seed for reproducible runs
    pub seed: Option<u64>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl MonitorConfig {
    pub fn from_env() -> Self {
        let (min_delay_secs, max_delay_secs) = get_monitor_delay_window();
        Self {
            min_delay_secs,
            max_delay_secs,
            error_backoff: Duration::from_secs(MONITOR_ERROR_BACKOFF_SECS),
            seed: None,
        }
    }

    fn next_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let (min, max) = (self.min_delay_secs, self.max_delay_secs);
        let secs = if min.is_finite() && max.is_finite() && max > min {
            rng.gen_range(min..max)
        } else {
            min
        };
        // NaN maps to zero, infinity to the cap
        Duration::from_secs_f64(secs.max(0.0).min(MAX_MONITOR_DELAY_SECS))
    }
}

// ============================================================================
// MONITOR
// ============================================================================

pub struct Monitor {
    config: MonitorConfig,
    store: Arc<ThreatStore>,
    bus: EventBus,
    detector: Option<Arc<ThreatDetector>>,
    simulator: FlowSimulator,
    threat_counter: u64,
}

impl Monitor {
    pub fn new(
        config: MonitorConfig,
        store: Arc<ThreatStore>,
        bus: EventBus,
        detector: Option<Arc<ThreatDetector>>,
    ) -> Self {
        let simulator = match config.seed {
            Some(seed) => FlowSimulator::new(seed),
            None => FlowSimulator::from_entropy(),
        };

        Self {
            config,
            store,
            bus,
            detector,
            simulator,
            threat_counter: 0,
        }
    }

    /// One iteration without the wait
    pub fn run_once(&mut self) -> Result<ThreatDetection, StoreError> {
        let (flow, label) = self.simulator.next_flow();
        let detection = detect_or_fallback(self.detector.as_deref(), &flow, Some(label), self.simulator.rng());

        if detection.is_threat() {
            self.threat_counter += 1;
            log::warn!(
                "[{}] {:15} | {:20} | Conf: {:.0}%",
                self.threat_counter,
                detection.threat_type.as_str(),
                detection.source_ip,
                detection.confidence * 100.0
            );
        }

        record_detection(&self.store, &self.bus, &detection)?;
        Ok(detection)
    }

    /// Run until `stop` is set
    pub fn run(&mut self, stop: &AtomicBool) {
        log::info!("Network monitoring started");

        while !stop.load(Ordering::Relaxed) {
            let delay = self.config.next_delay(self.simulator.rng());
            log::debug!("[Monitor] Waiting {:.1}s before next detection...", delay.as_secs_f64());
            if !wait(delay, stop) {
                break;
            }

            if let Err(e) = self.run_once() {
                log::error!("Error in monitoring: {}", e);
                if !wait(self.config.error_backoff, stop) {
                    break;
                }
            }
        }

        log::info!("Network monitoring stopped");
    }

    pub fn start(mut self) -> std::io::Result<MonitorHandle> {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);

        let thread = thread::Builder::new()
            .name("threat-monitor".to_string())
            .spawn(move || self.run(&flag))?;

        Ok(MonitorHandle { stop, thread: Some(thread) })
    }
}

/// Count a scored flow, log it if it is a threat, and push `new_threat`
/// plus fresh stats to the dashboard
pub fn record_detection(
    store: &ThreatStore,
    bus: &EventBus,
    detection: &ThreatDetection,
) -> Result<ThreatStats, StoreError> {
    store.record_flow()?;

    // A failed insert does not stop the broadcast
    if let Err(e) = store.log_threat(detection) {
        log::error!("Database error: {}", e);
    }

    bus.emit_new_threat(&FrontendThreat::from(detection));
    let stats = store.stats()?;
    bus.emit_stats_update(&stats);
    Ok(stats)
}

/// Sleep for `duration` unless `stop` is raised first; false when stopped
fn wait(duration: Duration, stop: &AtomicBool) -> bool {
    let deadline = Instant::now() + duration;
    loop {
        if stop.load(Ordering::Relaxed) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep(POLL_INTERVAL.min(deadline - now));
    }
}

/// Owner of the running monitor thread; stops it on drop
pub struct MonitorHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl MonitorHandle {
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().map(|t| !t.is_finished()).unwrap_or(false)
    }

    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("Monitor thread panicked");
            }
        }
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
