use serde::Serialize;
use std::io;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::mpsc;
use std::sync::mpsc::RecvTimeoutError;
use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;
use std::time::Instant;

/// Heap counters shared with observers on other threads.
///
/// The runtime itself is single-threaded; these atomics are the only state a sampling thread ever
/// reads.
#[derive(Debug, Default)]
pub struct RuntimeCounters {
  used_bytes: AtomicUsize,
  peak_used_bytes: AtomicUsize,
  gc_runs: AtomicU64,
  allocations: AtomicU64,
}

/// A point-in-time copy of [`RuntimeCounters`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
  pub used_bytes: usize,
  pub peak_used_bytes: usize,
  pub gc_runs: u64,
  pub allocations: u64,
}

impl RuntimeCounters {
  pub(crate) fn record_used_bytes(&self, used_bytes: usize) {
    self.used_bytes.store(used_bytes, Ordering::Relaxed);
    self.peak_used_bytes.fetch_max(used_bytes, Ordering::Relaxed);
  }

  pub(crate) fn record_allocation(&self) {
    self.allocations.fetch_add(1, Ordering::Relaxed);
  }

  pub(crate) fn record_gc(&self) {
    self.gc_runs.fetch_add(1, Ordering::Relaxed);
  }

  pub fn snapshot(&self) -> CounterSnapshot {
    CounterSnapshot {
      used_bytes: self.used_bytes.load(Ordering::Relaxed),
      peak_used_bytes: self.peak_used_bytes.load(Ordering::Relaxed),
      gc_runs: self.gc_runs.load(Ordering::Relaxed),
      allocations: self.allocations.load(Ordering::Relaxed),
    }
  }
}

/// One collection cycle, recorded when `GcConfig::should_record_stats` is set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GcEvent {
  pub cause: String,
  pub before_bytes: usize,
  pub after_bytes: usize,
  pub freed_cells: usize,
  pub moved_cells: usize,
  pub duration_us: u64,
}

/// Heap statistics reported by [`Runtime::gc_stats`](crate::Runtime::gc_stats).
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GcStats {
  pub name: String,
  pub gc_runs: u64,
  pub used_bytes: usize,
  pub peak_used_bytes: usize,
  pub allocations: u64,
  pub live_cells: usize,
  pub events: Vec<GcEvent>,
}

/// Summary produced by [`StatSamplingThread::stop`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SampledStats {
  pub samples: usize,
  pub duration_ms: u64,
  pub peak_used_bytes: usize,
  pub last: CounterSnapshot,
}

/// Periodically samples [`RuntimeCounters`] on an auxiliary thread while script runs.
pub struct StatSamplingThread {
  stop: mpsc::Sender<()>,
  thread: JoinHandle<Vec<CounterSnapshot>>,
  started: Instant,
}

impl StatSamplingThread {
  pub fn start(counters: Arc<RuntimeCounters>, interval: Duration) -> io::Result<Self> {
    let (stop, stopped) = mpsc::channel::<()>();
    let thread = thread::Builder::new()
      .name("engine-js-stats".to_string())
      .spawn(move || {
        let mut samples = Vec::new();
        loop {
          samples.push(counters.snapshot());
          match stopped.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => continue,
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
          }
        }
        samples.push(counters.snapshot());
        samples
      })?;
    Ok(Self {
      stop,
      thread,
      started: Instant::now(),
    })
  }

  pub fn stop(self) -> SampledStats {
    let _ = self.stop.send(());
    let duration_ms = self.started.elapsed().as_millis() as u64;
    let samples = self.thread.join().unwrap_or_default();
    let peak_used_bytes = samples
      .iter()
      .map(|s| s.peak_used_bytes)
      .max()
      .unwrap_or(0);
    SampledStats {
      samples: samples.len(),
      duration_ms,
      peak_used_bytes,
      last: samples.last().copied().unwrap_or_default(),
    }
  }
}
