use crate::bytecode::BytecodeError;
use std::fmt::Display;

/// Errors produced by the runtime.
#[derive(Debug, Clone, thiserror::Error)]
pub enum VmError {
  /// The heap has exceeded its configured memory limit, or the identifier table is full.
  #[error("out of memory")]
  OutOfMemory,

  /// A handle was used after the GC scope that created it was flushed, or a handle does not refer
  /// to a value of the expected kind.
  #[error("invalid handle")]
  InvalidHandle,

  /// A JavaScript exception is pending on the runtime. The thrown value is available through
  /// [`Runtime::thrown_value`](crate::Runtime::thrown_value) until it is caught or cleared.
  #[error("uncaught exception")]
  Exception,

  /// A host-level misuse of an engine API that is not observable from JavaScript.
  #[error("invalid argument: {0}")]
  InvalidArgument(&'static str),

  /// A non-catchable termination condition (fuel exhausted, deadline exceeded, host interrupt).
  #[error("{0}")]
  Termination(TerminationReason),

  /// The bytecode handed to the runtime could not be loaded.
  #[error(transparent)]
  Bytecode(#[from] BytecodeError),
}

/// Result of any runtime operation that can raise a JavaScript exception or fail to allocate.
pub type CallResult<T> = Result<T, VmError>;

/// The reason execution terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminationReason {
  OutOfFuel,
  DeadlineExceeded,
  Interrupted,
}

impl Display for TerminationReason {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      TerminationReason::OutOfFuel => f.write_str("execution terminated: out of fuel"),
      TerminationReason::DeadlineExceeded => {
        f.write_str("execution terminated: deadline exceeded")
      }
      TerminationReason::Interrupted => f.write_str("execution terminated: interrupted"),
    }
  }
}

impl VmError {
  /// Whether this error means an exception value is pending on the runtime.
  pub fn is_exception(&self) -> bool {
    matches!(self, VmError::Exception)
  }
}
