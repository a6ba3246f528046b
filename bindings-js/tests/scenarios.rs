use bindings_js::execute_bytecode;
use bindings_js::ArgsView;
use bindings_js::Bindings;
use bindings_js::BindingsSession;
use bindings_js::BootstrapError;
use bindings_js::CallbackResult;
use bindings_js::ExecuteOptions;
use bindings_js::InstallError;
use bindings_js::NoopCallback;
use bindings_js::RegistrationRef;
use bindings_js::RunOutcome;
use bindings_js::SessionBootstrap;
use bindings_js::SessionState;
use bindings_js::TaggedValue;
use engine_js::Bytecode;
use engine_js::BytecodeBuilder;
use engine_js::Instruction;
use engine_js::Runtime;
use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;

struct InstallWith<F>(F);

impl<F> Bindings for InstallWith<F>
where
  F: FnMut(&mut BindingsSession, &mut Runtime) -> Result<(), InstallError>,
{
  fn install(&mut self, session: &mut BindingsSession, rt: &mut Runtime) -> Result<(), InstallError> {
    (self.0)(session, rt)
  }
}

fn define_global(
  session: &BindingsSession,
  rt: &mut Runtime,
  registration: &RegistrationRef,
  name: &str,
  arity: u32,
) -> Result<(), InstallError> {
  let symbol = session.intern_symbol(rt, name)?;
  let defined = session
    .function_with_only_runtime(rt)
    .bind_callback(registration)
    .set_identity(symbol, arity)
    .define();
  if defined {
    Ok(())
  } else {
    Err(InstallError::DefineFailed {
      name: name.to_string(),
    })
  }
}

fn run_script(
  bindings: &mut dyn Bindings,
  bytecode: Bytecode,
) -> Result<(SessionBootstrap, RunOutcome), BootstrapError> {
  let mut bootstrap = SessionBootstrap::new(ExecuteOptions::default())?;
  bootstrap.populate(bindings)?;
  bootstrap.install(bindings)?;
  let outcome = bootstrap.run(Arc::new(bytecode), "scenario.js")?;
  Ok((bootstrap, outcome))
}

fn completion_number(bootstrap: &SessionBootstrap, outcome: &RunOutcome) -> Option<f64> {
  match outcome {
    RunOutcome::Completed { value } => value.value(bootstrap.runtime()).as_number(),
    _ => None,
  }
}

fn add2(_session: &mut BindingsSession, rt: &mut Runtime, args: ArgsView) -> CallbackResult {
  let a = args.get(rt, 0).to_number(rt)?;
  let b = args.get(rt, 1).to_number(rt)?;
  Ok(TaggedValue::number(a + b))
}

fn install_add2(session: &mut BindingsSession, rt: &mut Runtime) -> Result<(), InstallError> {
  let registration = session.register_callback(add2);
  define_global(session, rt, &registration, "add2", 2)
}

#[test]
fn noop_callback_completes_the_session() -> Result<(), BootstrapError> {
  let mut bindings = InstallWith(|session: &mut BindingsSession, rt: &mut Runtime| {
    let registration = session.register_callback(NoopCallback);
    define_global(session, rt, &registration, "f", 0)
  });
  let bytecode = BytecodeBuilder::new().call_global("f", 0, |b| b).ret().build();
  let (bootstrap, outcome) = run_script(&mut bindings, bytecode)?;

  let RunOutcome::Completed { value } = outcome else {
    panic!("expected completion, got {outcome:?}");
  };
  assert!(value.value(bootstrap.runtime()).is_undefined());
  assert_eq!(bootstrap.state(), SessionState::Completed);
  assert!(bootstrap.runtime().thrown_value().is_none());
  Ok(())
}

#[test]
fn add2_sums_its_arguments() -> Result<(), BootstrapError> {
  let bytecode = BytecodeBuilder::new()
    .call_global("add2", 2, |b| b.load_number(3.0).load_number(4.0))
    .ret()
    .build();
  let (bootstrap, outcome) = run_script(&mut InstallWith(install_add2), bytecode)?;
  assert_eq!(completion_number(&bootstrap, &outcome), Some(7.0));
  Ok(())
}

#[test]
fn add2_without_arguments_is_nan() -> Result<(), BootstrapError> {
  let bytecode = BytecodeBuilder::new().call_global("add2", 0, |b| b).ret().build();
  let (bootstrap, outcome) = run_script(&mut InstallWith(install_add2), bytecode)?;
  let result = completion_number(&bootstrap, &outcome).expect("numeric completion");
  assert!(result.is_nan());
  Ok(())
}

#[test]
fn add2_with_one_argument_is_nan() -> Result<(), BootstrapError> {
  let bytecode = BytecodeBuilder::new()
    .call_global("add2", 1, |b| b.load_number(3.0))
    .ret()
    .build();
  let (bootstrap, outcome) = run_script(&mut InstallWith(install_add2), bytecode)?;
  let result = completion_number(&bootstrap, &outcome).expect("numeric completion");
  assert!(result.is_nan());
  Ok(())
}

#[test]
fn throwing_callback_reports_failure_without_aborting() {
  let mut bindings = InstallWith(|session: &mut BindingsSession, rt: &mut Runtime| {
    let registration = session.register_callback(
      |_: &mut BindingsSession, rt: &mut Runtime, _: ArgsView| -> CallbackResult {
        Err(rt.raise_type_error("nope"))
      },
    );
    define_global(session, rt, &registration, "fail", 0)
  });
  let bytecode = BytecodeBuilder::new().call_global("fail", 0, |b| b).ret().build();
  assert!(!execute_bytecode(
    Arc::new(bytecode),
    "throws.js",
    &mut bindings,
    ExecuteOptions::default()
  ));
}

#[test]
fn script_throw_is_reported_as_threw() -> Result<(), BootstrapError> {
  let bytecode = BytecodeBuilder::new()
    .load_string("thrown from script")
    .push(Instruction::Throw)
    .build();
  let (bootstrap, outcome) = run_script(&mut InstallWith(install_add2), bytecode)?;
  let RunOutcome::Threw { exception, message } = outcome else {
    panic!("expected a throw, got {outcome:?}");
  };
  assert_eq!(message, "thrown from script");
  assert!(exception.value(bootstrap.runtime()).is_string());
  assert_eq!(bootstrap.state(), SessionState::Threw);
  Ok(())
}

#[test]
fn callbacks_only_see_their_own_state() -> Result<(), BootstrapError> {
  let a_calls = Rc::new(Cell::new(0u32));
  let b_calls = Rc::new(Cell::new(0u32));
  let (a_state, b_state) = (a_calls.clone(), b_calls.clone());
  let mut bindings = InstallWith(move |session: &mut BindingsSession, rt: &mut Runtime| -> Result<(), InstallError> {
    let a_state = a_state.clone();
    let a = session.register_callback(move |_: &mut BindingsSession, _: &mut Runtime, _: ArgsView| -> CallbackResult {
      a_state.set(a_state.get() + 1);
      Ok(TaggedValue::number(a_state.get() as f64))
    });
    let b_state = b_state.clone();
    let b = session.register_callback(move |_: &mut BindingsSession, _: &mut Runtime, _: ArgsView| -> CallbackResult {
      b_state.set(b_state.get() + 1);
      Ok(TaggedValue::number(100.0 + b_state.get() as f64))
    });
    define_global(session, rt, &a, "a", 0)?;
    define_global(session, rt, &b, "b", 0)
  });

  // a(); b(); a(); return a() + b();
  let bytecode = BytecodeBuilder::new()
    .call_global("a", 0, |b| b)
    .push(Instruction::Pop)
    .call_global("b", 0, |b| b)
    .push(Instruction::Pop)
    .call_global("a", 0, |b| b)
    .push(Instruction::Pop)
    .call_global("a", 0, |b| b)
    .call_global("b", 0, |b| b)
    .push(Instruction::Add)
    .ret()
    .build();
  let (bootstrap, outcome) = run_script(&mut bindings, bytecode)?;

  assert_eq!(completion_number(&bootstrap, &outcome), Some(3.0 + 102.0));
  assert_eq!(a_calls.get(), 3);
  assert_eq!(b_calls.get(), 2);
  Ok(())
}
