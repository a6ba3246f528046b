use crate::error::TerminationReason;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

/// Per-run execution budget.
#[derive(Debug, Clone)]
pub struct Budget {
  pub fuel: Option<u64>,
  pub deadline: Option<Instant>,
  pub check_time_every: u32,
}

impl Budget {
  pub fn unlimited(check_time_every: u32) -> Self {
    Self {
      fuel: None,
      deadline: None,
      check_time_every,
    }
  }

  /// A budget that expires `limit` from now.
  pub fn with_time_limit(limit: Duration, check_time_every: u32) -> Self {
    Self {
      fuel: None,
      deadline: Instant::now().checked_add(limit),
      check_time_every,
    }
  }
}

#[derive(Debug, Clone)]
pub(crate) struct BudgetState {
  budget: Budget,
  ticks: u64,
}

impl BudgetState {
  pub(crate) fn new(budget: Budget) -> Self {
    Self { budget, ticks: 0 }
  }

  /// Consumes one tick of the budget.
  pub(crate) fn tick(&mut self, interrupt: &InterruptToken) -> Result<(), TerminationReason> {
    if let Some(fuel) = &mut self.budget.fuel {
      if *fuel == 0 {
        return Err(TerminationReason::OutOfFuel);
      }
      *fuel -= 1;
    }

    self.ticks = self.ticks.wrapping_add(1);

    if interrupt.is_interrupted() {
      return Err(TerminationReason::Interrupted);
    }

    if let Some(deadline) = self.budget.deadline {
      let interval = self.budget.check_time_every.max(1) as u64;
      if self.ticks % interval == 0 && Instant::now() >= deadline {
        return Err(TerminationReason::DeadlineExceeded);
      }
    }

    Ok(())
  }
}

/// A token observed by the runtime to detect host interrupts.
#[derive(Debug, Clone)]
pub struct InterruptToken {
  interrupted: Arc<AtomicBool>,
}

impl InterruptToken {
  /// Create a new interrupt token + handle pair.
  pub fn new() -> (Self, InterruptHandle) {
    Self::from_shared_flag(Arc::new(AtomicBool::new(false)))
  }

  pub fn from_shared_flag(interrupted: Arc<AtomicBool>) -> (Self, InterruptHandle) {
    (
      Self {
        interrupted: interrupted.clone(),
      },
      InterruptHandle { interrupted },
    )
  }

  pub fn is_interrupted(&self) -> bool {
    self.interrupted.load(Ordering::Relaxed)
  }
}

/// A host handle used to request that the runtime terminates execution.
#[derive(Debug, Clone)]
pub struct InterruptHandle {
  interrupted: Arc<AtomicBool>,
}

impl InterruptHandle {
  /// Request that the runtime cooperatively terminates at its next tick.
  pub fn interrupt(&self) {
    self.interrupted.store(true, Ordering::Relaxed);
  }

  pub fn reset(&self) {
    self.interrupted.store(false, Ordering::Relaxed);
  }
}
