use crate::error::BootstrapError;
use crate::error::InstallError;
use crate::handle::ValueHandle;
use crate::session::BindingsSession;
use engine_js::Bytecode;
use engine_js::GcStats;
use engine_js::Runtime;
use engine_js::RuntimeConfig;
use engine_js::RuntimeModuleFlags;
use engine_js::SampledStats;
use engine_js::StatSamplingThread;
use engine_js::TerminationReason;
use engine_js::Value;
use engine_js::VmError;
use serde::Deserialize;
use serde::Serialize;
use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Duration;

/// The session's module stays loaded after it runs.
const MODULE_FLAGS: RuntimeModuleFlags = RuntimeModuleFlags { persistent: true };

/// A set of native bindings to install into a fresh runtime.
pub trait Bindings {
  /// Registers callbacks. Runs once, before the runtime is touched.
  fn start(&mut self, _session: &mut BindingsSession) {}

  /// Defines the registered callbacks as script-visible functions. Runs once, before any script.
  fn install(&mut self, session: &mut BindingsSession, rt: &mut Runtime) -> Result<(), InstallError>;
}

/// Options for one [`execute_bytecode`] run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecuteOptions {
  pub runtime_config: RuntimeConfig,
  /// Wall-clock limit for the script, in milliseconds.
  pub time_limit_ms: Option<u64>,
  /// Load the module without running it.
  pub stop_after_init: bool,
  /// Collect heap statistics and report them after the run.
  pub gc_stats: bool,
  /// Run a full collection before taking the statistics.
  pub force_gc_before_stats: bool,
  /// Sample heap counters on a background thread at this interval.
  pub sample_stats_interval_ms: Option<u64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SessionState {
  Created,
  Populated,
  Installed,
  Running,
  Completed,
  Threw,
  /// Installation failed; the runtime may hold partially defined globals.
  Failed,
}

impl fmt::Display for SessionState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      SessionState::Created => "created",
      SessionState::Populated => "populated",
      SessionState::Installed => "installed",
      SessionState::Running => "running",
      SessionState::Completed => "completed",
      SessionState::Threw => "threw",
      SessionState::Failed => "failed",
    })
  }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunOutcome {
  /// The script finished. `value` is rooted for the lifetime of the runtime.
  Completed { value: ValueHandle },
  /// The script threw and nothing caught it.
  Threw { exception: ValueHandle, message: String },
  /// The script was stopped by the time limit or an interrupt.
  Terminated { reason: TerminationReason },
}

impl RunOutcome {
  pub fn is_success(&self) -> bool {
    matches!(self, RunOutcome::Completed { .. })
  }
}

/// Heap statistics gathered after a run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StatsReport {
  pub gc: GcStats,
  pub sampled: Option<SampledStats>,
}

/// Drives one runtime through `Created → Populated → Installed → Running → Completed | Threw`.
/// A failed install ends in `Failed`.
///
/// Each phase may run once and only in order; anything else is a [`BootstrapError::InvalidState`].
pub struct SessionBootstrap {
  options: ExecuteOptions,
  runtime: Runtime,
  session: BindingsSession,
  state: SessionState,
  stats: Option<StatsReport>,
}

impl SessionBootstrap {
  pub fn new(options: ExecuteOptions) -> Result<Self, BootstrapError> {
    let mut config = options.runtime_config.clone();
    if options.gc_stats {
      config.gc.should_record_stats = true;
    }
    let runtime = {
      let _span = tracing::info_span!("create_runtime").entered();
      Runtime::create(config)?
    };
    Ok(Self {
      options,
      runtime,
      session: BindingsSession::new(),
      state: SessionState::Created,
      stats: None,
    })
  }

  pub fn state(&self) -> SessionState {
    self.state
  }

  pub fn session(&self) -> &BindingsSession {
    &self.session
  }

  pub fn session_mut(&mut self) -> &mut BindingsSession {
    &mut self.session
  }

  pub fn runtime(&self) -> &Runtime {
    &self.runtime
  }

  pub fn runtime_mut(&mut self) -> &mut Runtime {
    &mut self.runtime
  }

  pub fn stats(&self) -> Option<&StatsReport> {
    self.stats.as_ref()
  }

  fn expect_state(&self, expected: SessionState, action: &'static str) -> Result<(), BootstrapError> {
    if self.state == expected {
      Ok(())
    } else {
      Err(BootstrapError::InvalidState {
        action,
        state: self.state,
      })
    }
  }

  pub fn populate(&mut self, bindings: &mut dyn Bindings) -> Result<(), BootstrapError> {
    self.expect_state(SessionState::Created, "populate")?;
    let _span = tracing::info_span!("populate").entered();
    bindings.start(&mut self.session);
    tracing::debug!(registrations = self.session.len(), "session populated");
    self.state = SessionState::Populated;
    Ok(())
  }

  pub fn install(&mut self, bindings: &mut dyn Bindings) -> Result<(), BootstrapError> {
    self.expect_state(SessionState::Populated, "install")?;
    let _span = tracing::info_span!("install").entered();
    let result = {
      let mut scope = self.runtime.scope();
      bindings.install(&mut self.session, &mut scope)
    };
    if let Err(err) = result {
      tracing::error!(error = %err, "failed to install bindings");
      self.state = SessionState::Failed;
      return Err(err.into());
    }
    self.state = SessionState::Installed;
    Ok(())
  }

  /// Runs `bytecode` on the installed runtime.
  ///
  /// An uncaught exception is printed as `Uncaught ...` on stderr and reported as
  /// [`RunOutcome::Threw`]; it is not an `Err`. Errors are reserved for misuse and for engine
  /// failures such as running out of memory or rejecting the module.
  pub fn run(&mut self, bytecode: Arc<Bytecode>, source_name: &str) -> Result<RunOutcome, BootstrapError> {
    self.expect_state(SessionState::Installed, "run")?;
    self.state = SessionState::Running;
    let _span = tracing::info_span!("run", source = source_name).entered();

    if self.options.stop_after_init {
      if let Err(err) = self.runtime.load_module(&bytecode, MODULE_FLAGS) {
        self.state = SessionState::Threw;
        return Err(err.into());
      }
      self.state = SessionState::Completed;
      return Ok(RunOutcome::Completed {
        value: ValueHandle::undefined(),
      });
    }

    self
      .runtime
      .set_time_limit(self.options.time_limit_ms.map(Duration::from_millis));
    let sampler = self.start_sampler();

    let result = {
      let mut scope = self.runtime.scope();
      scope.run_bytecode(bytecode, MODULE_FLAGS, source_name)
    };
    // Nothing allocates between the scope closing and the result being rooted.
    let outcome = match result {
      Ok(value) => Ok(RunOutcome::Completed {
        value: ValueHandle::from_raw(self.runtime.make_handle(value)),
      }),
      Err(VmError::Exception) => Ok(self.report_uncaught()),
      Err(VmError::Termination(reason)) => {
        tracing::error!(%reason, "script terminated");
        eprintln!("{reason}");
        Ok(RunOutcome::Terminated { reason })
      }
      Err(err) => Err(BootstrapError::from(err)),
    };
    self.runtime.set_time_limit(None);

    if self.options.gc_stats {
      if self.options.force_gc_before_stats {
        self.runtime.collect_garbage("forced");
      }
      self.stats = Some(StatsReport {
        gc: self.runtime.gc_stats(),
        sampled: sampler.map(StatSamplingThread::stop),
      });
    } else if let Some(sampler) = sampler {
      sampler.stop();
    }

    self.state = match &outcome {
      Ok(RunOutcome::Completed { .. }) => SessionState::Completed,
      _ => SessionState::Threw,
    };
    outcome
  }

  fn start_sampler(&self) -> Option<StatSamplingThread> {
    let interval = Duration::from_millis(self.options.sample_stats_interval_ms?);
    match StatSamplingThread::start(self.runtime.counters(), interval) {
      Ok(sampler) => Some(sampler),
      Err(err) => {
        tracing::warn!(error = %err, "failed to start stats sampling thread");
        None
      }
    }
  }

  fn report_uncaught(&mut self) -> RunOutcome {
    let thrown = self
      .runtime
      .clear_thrown_value()
      .unwrap_or_else(Value::undefined);
    let message = self.runtime.to_display_string(thrown);
    tracing::error!(exception = %message, "uncaught exception");
    let _ = self.runtime.print_exception(&mut io::stderr().lock(), thrown);
    RunOutcome::Threw {
      exception: ValueHandle::from_raw(self.runtime.make_handle(thrown)),
      message,
    }
  }
}

/// Runs the whole bootstrap for `bindings` and `bytecode`.
///
/// Returns whether the script completed. Failures are reported on stderr; none of them abort the
/// process. When statistics are enabled they are printed to stderr as JSON.
pub fn execute_bytecode(
  bytecode: Arc<Bytecode>,
  source_name: &str,
  bindings: &mut dyn Bindings,
  options: ExecuteOptions,
) -> bool {
  let mut bootstrap = match SessionBootstrap::new(options) {
    Ok(bootstrap) => bootstrap,
    Err(err) => {
      tracing::error!(error = %err, "failed to create runtime");
      eprintln!("{err}");
      return false;
    }
  };
  let outcome = run_all_phases(&mut bootstrap, bytecode, source_name, bindings);
  if let Some(stats) = bootstrap.stats() {
    match serde_json::to_string_pretty(stats) {
      Ok(json) => eprintln!("{json}"),
      Err(err) => tracing::warn!(error = %err, "failed to serialise stats"),
    }
  }
  match outcome {
    Ok(outcome) => outcome.is_success(),
    Err(err) => {
      tracing::error!(error = %err, "bootstrap failed");
      eprintln!("{err}");
      false
    }
  }
}

fn run_all_phases(
  bootstrap: &mut SessionBootstrap,
  bytecode: Arc<Bytecode>,
  source_name: &str,
  bindings: &mut dyn Bindings,
) -> Result<RunOutcome, BootstrapError> {
  bootstrap.populate(bindings)?;
  bootstrap.install(bindings)?;
  bootstrap.run(bytecode, source_name)
}
