use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::VmError;

/// Resource bounds shared by one VM instance's execution of a call:
/// an instruction-count budget and a cooperative cancellation flag, both
/// checked at back-edge jumps and at every call.
#[derive(Debug, Clone)]
pub struct ExecutionLimits {
    max_instructions: Option<u64>,
    cancel_flag: Arc<AtomicBool>,
    executed: Arc<AtomicU64>,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        ExecutionLimits {
            max_instructions: None,
            cancel_flag: Arc::new(AtomicBool::new(false)),
            executed: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl ExecutionLimits {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn with_max_instructions(max_instructions: u64) -> Self {
        ExecutionLimits {
            max_instructions: Some(max_instructions),
            ..Self::default()
        }
    }

    /// A clone sharing this instance's cancellation flag, so the host can
    /// request termination from another thread.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancel_flag.clone()
    }

    pub fn request_cancel(&self) {
        self.cancel_flag.store(true, Ordering::Relaxed);
    }

    /// Called once per dispatched instruction. Returns an error if the
    /// instruction budget or the cancellation flag has tripped.
    pub fn tick(&self) -> Result<(), VmError> {
        if self.cancel_flag.load(Ordering::Relaxed) {
            tracing::warn!("execution cancelled");
            return Err(VmError::ExecutionCancelled);
        }
        let count = self.executed.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(max) = self.max_instructions {
            if count > max {
                tracing::warn!(max, "execution exceeded instruction budget");
                return Err(VmError::ExecutionTimeout);
            }
        }
        Ok(())
    }

    pub fn executed_count(&self) -> u64 {
        self.executed.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbounded_limits_never_time_out() {
        let limits = ExecutionLimits::unbounded();
        for _ in 0..1000 {
            limits.tick().unwrap();
        }
    }

    #[test]
    fn bounded_limits_time_out_after_the_budget() {
        let limits = ExecutionLimits::with_max_instructions(3);
        limits.tick().unwrap();
        limits.tick().unwrap();
        limits.tick().unwrap();
        assert!(matches!(limits.tick(), Err(VmError::ExecutionTimeout)));
    }

    #[test]
    fn cancel_handle_stops_the_next_tick() {
        let limits = ExecutionLimits::unbounded();
        let handle = limits.cancel_handle();
        limits.tick().unwrap();
        handle.store(true, Ordering::Relaxed);
        assert!(matches!(limits.tick(), Err(VmError::ExecutionCancelled)));
    }
}
