use crate::bootstrap::SessionState;
use engine_js::VmError;

/// Failure of a [`Bindings::install`](crate::Bindings::install) pass.
#[derive(Debug, Clone, thiserror::Error)]
pub enum InstallError {
  #[error("failed to define native function `{name}`")]
  DefineFailed { name: String },

  #[error(transparent)]
  Vm(#[from] VmError),
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum BootstrapError {
  /// A phase was requested out of order, e.g. installing after the script started running.
  #[error("cannot {action} a session that is {state}")]
  InvalidState {
    action: &'static str,
    state: SessionState,
  },

  #[error("failed to install bindings: {0}")]
  Install(#[from] InstallError),

  #[error(transparent)]
  Vm(#[from] VmError),
}
