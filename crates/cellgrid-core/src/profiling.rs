//! Tick-rate sampling and rolling simulation statistics.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tracing::info;

/// Counts updates and reports them as a rate between samples.
#[derive(Debug, Clone)]
pub struct TickRateSampler {
    updates: u64,
    last_sample: Instant,
}

impl TickRateSampler {
    pub fn new() -> Self {
        Self {
            updates: 0,
            last_sample: Instant::now(),
        }
    }

    pub fn record_update(&mut self) {
        self.updates += 1;
    }

    pub fn updates(&self) -> u64 {
        self.updates
    }

    /// Updates per second since the previous sample. Resets the counter.
    pub fn sample(&mut self) -> f64 {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_sample).as_secs_f64();
        let rate = if elapsed > 0.0 {
            self.updates as f64 / elapsed
        } else {
            0.0
        };
        self.updates = 0;
        self.last_sample = now;
        rate
    }
}

impl Default for TickRateSampler {
    fn default() -> Self {
        Self::new()
    }
}

/// Mean over the most recent `capacity` samples.
#[derive(Debug, Clone)]
pub struct AveragingList {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl AveragingList {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn add_sample(&mut self, sample: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Mean of the retained samples, or 0 when empty.
    pub fn calculate(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }
}

/// Averaged rate and time reported by [`SimulationStats::record`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatsSnapshot {
    /// Summed graph steps per second, averaged over the window.
    pub rate: f64,
    /// Summed step wall time in seconds, averaged over the window.
    pub spent_time: f64,
}

/// Rolling totals across every world, logged periodically.
#[derive(Debug, Clone)]
pub struct SimulationStats {
    rate: AveragingList,
    time: AveragingList,
    log_interval: u32,
    countdown: u32,
}

impl SimulationStats {
    pub fn new(window: usize, log_interval: u32) -> Self {
        Self {
            rate: AveragingList::new(window),
            time: AveragingList::new(window),
            log_interval,
            countdown: 0,
        }
    }

    /// Feed one tick's totals. Every `log_interval + 1` calls, starting with
    /// the first, the averages are logged and returned.
    pub fn record(&mut self, rate: f64, spent: Duration) -> Option<StatsSnapshot> {
        self.rate.add_sample(rate);
        self.time.add_sample(spent.as_secs_f64());

        if self.countdown > 0 {
            self.countdown -= 1;
            return None;
        }
        self.countdown = self.log_interval;

        let snapshot = self.snapshot();
        info!(
            rate = snapshot.rate,
            time_ms = snapshot.spent_time * 1000.0,
            "total simulation rate"
        );
        Some(snapshot)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            rate: self.rate.calculate(),
            spent_time: self.time.calculate(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn averaging_list_drops_oldest() {
        let mut list = AveragingList::new(3);
        for s in [1.0, 2.0, 3.0, 10.0] {
            list.add_sample(s);
        }
        assert_eq!(list.len(), 3);
        assert_eq!(list.calculate(), 5.0);
    }

    #[test]
    fn empty_average_is_zero() {
        assert_eq!(AveragingList::new(4).calculate(), 0.0);
    }

    #[test]
    fn sampler_resets_counter() {
        let mut sampler = TickRateSampler::new();
        sampler.record_update();
        sampler.record_update();
        assert_eq!(sampler.updates(), 2);
        let rate = sampler.sample();
        assert!(rate >= 0.0);
        assert_eq!(sampler.updates(), 0);
    }

    #[test]
    fn stats_report_on_interval() {
        let mut stats = SimulationStats::new(10, 2);
        let reports: Vec<bool> = (0..7)
            .map(|_| stats.record(20.0, Duration::from_millis(1)).is_some())
            .collect();
        assert_eq!(reports, [true, false, false, true, false, false, true]);
        assert_eq!(stats.snapshot().rate, 20.0);
    }
}
