//! Pump phase shared between the pump thread and its observers.

use std::fmt;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use log::debug;

/// Where a pump is in its life.
///
/// `Created → Listening → Draining → Terminated`, or `Created → Failed` when
/// the endpoint cannot be acquired. A transport that dies while listening
/// also ends in `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PumpPhase {
    Created,
    Listening,
    Draining,
    Terminated,
    Failed,
}

impl PumpPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, PumpPhase::Terminated | PumpPhase::Failed)
    }
}

impl fmt::Display for PumpPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PumpPhase::Created => "created",
            PumpPhase::Listening => "listening",
            PumpPhase::Draining => "draining",
            PumpPhase::Terminated => "terminated",
            PumpPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
struct StatusInner {
    phase: PumpPhase,
    class_label: Option<String>,
}

#[derive(Debug)]
pub(crate) struct PumpStatus {
    inner: Mutex<StatusInner>,
    changed: Condvar,
}

impl PumpStatus {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(StatusInner {
                phase: PumpPhase::Created,
                class_label: None,
            }),
            changed: Condvar::new(),
        }
    }

    pub(crate) fn phase(&self) -> PumpPhase {
        self.lock().phase
    }

    pub(crate) fn class_label(&self) -> Option<String> {
        self.lock().class_label.clone()
    }

    pub(crate) fn set_phase(&self, phase: PumpPhase) {
        let mut inner = self.lock();
        if inner.phase.is_terminal() {
            return;
        }
        debug!("Pump phase {} -> {phase}", inner.phase);
        inner.phase = phase;
        self.changed.notify_all();
    }

    pub(crate) fn set_listening(&self, class_label: &str) {
        let mut inner = self.lock();
        inner.class_label = Some(class_label.to_string());
        debug!("Pump phase {} -> {}", inner.phase, PumpPhase::Listening);
        inner.phase = PumpPhase::Listening;
        self.changed.notify_all();
    }

    /// Block until the pump has left `Created`, or `timeout` elapses.
    pub(crate) fn wait_until_started(&self, timeout: Duration) -> PumpPhase {
        let deadline = Instant::now() + timeout;
        let mut inner = self.lock();

        while inner.phase == PumpPhase::Created {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            inner = self
                .changed
                .wait_timeout(inner, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }

        inner.phase
    }

    /// Block until the pump reaches a terminal phase.
    pub(crate) fn wait_until_finished(&self) -> PumpPhase {
        let mut inner = self.lock();
        while !inner.phase.is_terminal() {
            inner = self
                .changed
                .wait(inner)
                .unwrap_or_else(PoisonError::into_inner);
        }
        inner.phase
    }

    fn lock(&self) -> MutexGuard<'_, StatusInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
