use std::time::{Duration, Instant};

/// Times one processing pass and logs the result at debug level.
pub struct TaskTimer {
    task: &'static str,
    started: Instant,
}

impl TaskTimer {
    pub fn new(task: &'static str) -> TaskTimer {
        tracing::trace!(task, "pass started");
        TaskTimer {
            task,
            started: Instant::now(),
        }
    }

    pub fn stop(&self) -> Duration {
        let elapsed = self.started.elapsed();
        tracing::debug!(
            task = self.task,
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            "pass finished"
        );
        elapsed
    }
}
