//! The periodic collection loop.
//!
//! Each cycle runs the same fixed sequence: acquire a reading, persist it,
//! publish it to live subscribers, go back to idle. The sequence is modeled
//! as an explicit [`Phase`] state machine and exposed as a single
//! [`CollectorLoop::step`] so every phase and failure mode is testable in
//! isolation; [`CollectorLoop::run`] drives steps on a fixed period until
//! the stop flag is raised.
//!
//! Failure policy per cycle:
//! - acquisition failure: log, skip the cycle, stay available
//! - store append failure: retry once, then drop the sample and continue
//! - publish: best effort, never blocks the write path

pub mod publish;

pub use publish::SamplePublisher;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::sample::Sample;
use crate::sensor::{FileSystem, MetricSource};
use crate::store::SampleStore;

/// Where the loop currently is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Sampling,
    Persisting,
    Publishing,
    /// Terminal: the stop flag was observed at an idle boundary.
    Stopped,
}

/// Result of one cycle, mainly for tests and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Sample persisted and published.
    Written,
    /// Acquisition failed; nothing persisted or published this cycle.
    SkippedSensor,
    /// Store rejected the append twice; the sample was dropped but still
    /// published to live subscribers.
    DroppedStore,
}

/// Periodic sampler: one writer to the store, any number of live readers
/// through the publisher.
pub struct CollectorLoop<F: FileSystem> {
    source: MetricSource<F>,
    store: SampleStore,
    publisher: Arc<SamplePublisher>,
    phase: Phase,
    /// Highest timestamp handed out so far; persisted timestamps are
    /// strictly increasing because every cycle gets at least `last + 1`.
    last_timestamp_ms: i64,
    samples_written: u64,
    samples_dropped: u64,
    cycles_skipped: u64,
}

impl<F: FileSystem> CollectorLoop<F> {
    /// Creates a loop over the given source and store. The last persisted
    /// timestamp is re-read so monotonicity holds across restarts.
    pub fn new(source: MetricSource<F>, store: SampleStore, publisher: Arc<SamplePublisher>) -> Self {
        let last_timestamp_ms = match store.last_timestamp_ms() {
            Ok(ts) => ts.unwrap_or(0),
            Err(e) => {
                warn!("cannot read last stored timestamp: {}", e);
                0
            }
        };

        Self {
            source,
            store,
            publisher,
            phase: Phase::Idle,
            last_timestamp_ms,
            samples_written: 0,
            samples_dropped: 0,
            cycles_skipped: 0,
        }
    }

    /// Primes the adapter's retained counters with one discarded reading so
    /// the first persisted sample carries real disk rates instead of the
    /// first-observation sentinel.
    pub fn warm_up(&mut self) {
        if let Err(e) = self.source.acquire(Utc::now().timestamp_millis()) {
            debug!("warm-up acquisition failed: {}", e);
        }
    }

    /// Runs one full cycle: Sampling, Persisting, Publishing, back to Idle.
    pub fn step(&mut self) -> StepOutcome {
        self.phase = Phase::Sampling;
        let timestamp_ms = self.next_timestamp_ms();

        let reading = match self.source.acquire(timestamp_ms) {
            Ok(reading) => reading,
            Err(e) => {
                warn!("cycle skipped, sensors unavailable: {}", e);
                self.cycles_skipped += 1;
                self.phase = Phase::Idle;
                return StepOutcome::SkippedSensor;
            }
        };

        let sample = Sample {
            timestamp_ms,
            cpu_percent: reading.cpu_percent,
            ram_percent: reading.ram_percent,
            gpu_percent: reading.gpu_percent,
            disk_read_bps: reading.disk_read_bps,
            disk_write_bps: reading.disk_write_bps,
        };

        self.phase = Phase::Persisting;
        let persisted = match self.store.append(&sample) {
            Ok(()) => true,
            Err(first) => {
                warn!("append failed, retrying once: {}", first);
                match self.store.append(&sample) {
                    Ok(()) => true,
                    Err(second) => {
                        error!("append retry failed, sample dropped: {}", second);
                        false
                    }
                }
            }
        };
        if persisted {
            self.samples_written += 1;
        } else {
            self.samples_dropped += 1;
        }

        // The live view is deliberately decoupled from persistence: a
        // dropped sample is still worth showing.
        self.phase = Phase::Publishing;
        self.publisher.publish(&sample);

        self.phase = Phase::Idle;
        if persisted {
            StepOutcome::Written
        } else {
            StepOutcome::DroppedStore
        }
    }

    /// Drives [`step`](Self::step) every `period` until `running` goes
    /// false. The flag is checked only at idle boundaries, so an in-flight
    /// append always completes; sleeping is sliced so shutdown stays
    /// responsive.
    pub fn run(&mut self, period: Duration, running: &AtomicBool) {
        self.warm_up();

        let slice = Duration::from_millis(100);
        loop {
            // Sleep before sampling so the first persisted reading sits one
            // full period after the warm-up observation.
            let mut remaining = period;
            while remaining > Duration::ZERO && running.load(Ordering::SeqCst) {
                let sleep_time = remaining.min(slice);
                std::thread::sleep(sleep_time);
                remaining = remaining.saturating_sub(sleep_time);
            }
            if !running.load(Ordering::SeqCst) {
                break;
            }

            self.step();
        }

        self.phase = Phase::Stopped;
        info!(
            "collector stopped: {} written, {} dropped, {} skipped",
            self.samples_written, self.samples_dropped, self.cycles_skipped
        );
    }

    /// Current phase (Idle between cycles, Stopped after shutdown).
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Samples persisted so far.
    pub fn samples_written(&self) -> u64 {
        self.samples_written
    }

    /// Samples lost to store failures after the retry.
    pub fn samples_dropped(&self) -> u64 {
        self.samples_dropped
    }

    /// Cycles skipped due to acquisition failures.
    pub fn cycles_skipped(&self) -> u64 {
        self.cycles_skipped
    }

    fn next_timestamp_ms(&mut self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let ts = now.max(self.last_timestamp_ms + 1);
        self.last_timestamp_ms = ts;
        ts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::MockFs;
    use crate::store::DEFAULT_DB_NAME;
    use tempfile::TempDir;

    fn mock_source() -> MetricSource<MockFs> {
        MetricSource::new(MockFs::typical_host(), "/proc", "/sys/class/drm")
    }

    fn new_loop(store: SampleStore) -> CollectorLoop<MockFs> {
        CollectorLoop::new(mock_source(), store, Arc::new(SamplePublisher::new()))
    }

    fn open_temp() -> (TempDir, SampleStore) {
        let dir = TempDir::new().unwrap();
        let store = SampleStore::open(dir.path().join(DEFAULT_DB_NAME)).unwrap();
        (dir, store)
    }

    #[test]
    fn five_steps_persist_five_increasing_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DEFAULT_DB_NAME);
        let mut collector = new_loop(SampleStore::open(&path).unwrap());

        collector.warm_up();
        for _ in 0..5 {
            assert_eq!(collector.step(), StepOutcome::Written);
        }
        assert_eq!(collector.samples_written(), 5);

        let reader = SampleStore::open_read_only(&path).unwrap();
        let rows = reader.query_range(0, i64::MAX).unwrap();
        assert_eq!(rows.len(), 5);

        for pair in rows.windows(2) {
            assert!(pair[0].timestamp_ms < pair[1].timestamp_ms);
        }
        for row in &rows {
            assert!((0.0..=100.0).contains(&row.cpu_percent));
            assert!((0.0..=100.0).contains(&row.ram_percent));
            assert!(row.disk_read_bps >= 0.0);
            assert!(row.disk_write_bps >= 0.0);
        }
    }

    #[test]
    fn sensor_failure_skips_cycle_and_loop_stays_available() {
        let (_dir, store) = open_temp();
        // No /proc/stat at all: every acquisition fails.
        let mut fs = MockFs::new();
        fs.add_file("/proc/meminfo", "MemTotal: 1000 kB\nMemAvailable: 500 kB\n");
        let source = MetricSource::new(fs, "/proc", "/sys/class/drm");
        let mut collector = CollectorLoop::new(source, store, Arc::new(SamplePublisher::new()));

        assert_eq!(collector.step(), StepOutcome::SkippedSensor);
        assert_eq!(collector.step(), StepOutcome::SkippedSensor);
        assert_eq!(collector.cycles_skipped(), 2);
        assert_eq!(collector.samples_written(), 0);
        assert_eq!(collector.phase(), Phase::Idle);
    }

    #[test]
    fn gpu_unavailable_still_records_other_metrics() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DEFAULT_DB_NAME);

        let host = MockFs::typical_host();
        let mut fs = MockFs::new();
        for file in ["/proc/stat", "/proc/meminfo", "/proc/diskstats"] {
            fs.add_file(file, host.read_to_string(file.as_ref()).unwrap());
        }
        let source = MetricSource::new(fs, "/proc", "/sys/class/drm");
        let mut collector = CollectorLoop::new(
            source,
            SampleStore::open(&path).unwrap(),
            Arc::new(SamplePublisher::new()),
        );

        assert_eq!(collector.step(), StepOutcome::Written);

        let rows = SampleStore::open_read_only(&path)
            .unwrap()
            .query_range(0, i64::MAX)
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].gpu_percent, None);
        assert!(rows[0].ram_percent > 0.0);
    }

    #[test]
    fn store_failure_drops_sample_but_loop_and_publishing_continue() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DEFAULT_DB_NAME);
        // Bootstrap the schema, then hand the loop a read-only connection so
        // every append (and its retry) fails.
        drop(SampleStore::open(&path).unwrap());
        let store = SampleStore::open_read_only(&path).unwrap();

        let publisher = Arc::new(SamplePublisher::new());
        let rx = publisher.subscribe();
        let mut collector = CollectorLoop::new(mock_source(), store, publisher);

        assert_eq!(collector.step(), StepOutcome::DroppedStore);
        assert_eq!(collector.samples_dropped(), 1);

        // The live view still saw the dropped sample.
        assert!(rx.try_recv().is_ok());

        // The following cycle keeps collecting.
        assert_eq!(collector.step(), StepOutcome::DroppedStore);
        assert_eq!(collector.samples_dropped(), 2);
    }

    #[test]
    fn timestamps_strictly_increase_within_one_millisecond() {
        let (_dir, store) = open_temp();
        let mut collector = new_loop(store);

        // Steps run far faster than the clock ticks; the bump keeps them
        // distinct anyway.
        let a = collector.next_timestamp_ms();
        let b = collector.next_timestamp_ms();
        let c = collector.next_timestamp_ms();
        assert!(a < b && b < c);
    }

    #[test]
    fn restart_keeps_timestamps_increasing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DEFAULT_DB_NAME);

        let future_ts = Utc::now().timestamp_millis() + 60_000;
        {
            let store = SampleStore::open(&path).unwrap();
            store
                .append(&Sample {
                    timestamp_ms: future_ts,
                    cpu_percent: 1.0,
                    ram_percent: 1.0,
                    gpu_percent: None,
                    disk_read_bps: 0.0,
                    disk_write_bps: 0.0,
                })
                .unwrap();
        }

        // A restarted collector must not step backwards behind the stored
        // maximum even if the wall clock is behind it.
        let mut collector = new_loop(SampleStore::open(&path).unwrap());
        assert_eq!(collector.step(), StepOutcome::Written);

        let rows = SampleStore::open_read_only(&path)
            .unwrap()
            .query_range(0, i64::MAX)
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows[1].timestamp_ms > future_ts);
    }

    #[test]
    fn stop_flag_reaches_stopped_phase_without_sampling() {
        let (_dir, store) = open_temp();
        let mut collector = new_loop(store);

        let running = AtomicBool::new(false);
        collector.run(Duration::from_millis(10), &running);

        assert_eq!(collector.phase(), Phase::Stopped);
        assert_eq!(collector.samples_written(), 0);
    }

    #[test]
    fn run_collects_until_stopped() {
        let (_dir, store) = open_temp();
        let mut collector = new_loop(store);

        let running = AtomicBool::new(true);
        std::thread::scope(|scope| {
            let handle = scope.spawn(|| {
                std::thread::sleep(Duration::from_millis(50));
                running.store(false, Ordering::SeqCst);
            });
            collector.run(Duration::from_millis(10), &running);
            handle.join().unwrap();
        });

        assert_eq!(collector.phase(), Phase::Stopped);
        assert!(collector.samples_written() >= 1);
    }
}
