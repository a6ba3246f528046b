use bindings_js::ArgsView;
use bindings_js::Bindings;
use bindings_js::BindingsSession;
use bindings_js::Callback;
use bindings_js::CallbackResult;
use bindings_js::InstallError;
use bindings_js::RegistrationRef;
use bindings_js::TaggedValue;
use engine_js::format_number;
use engine_js::Runtime;

/// Reports what it was called with: the argument count, a numeric first argument and the storage
/// of a string second argument.
#[derive(Default)]
pub struct NativeTest;

impl Callback for NativeTest {
  fn invoke(&mut self, _session: &mut BindingsSession, rt: &mut Runtime, args: ArgsView) -> CallbackResult {
    println!("nativeTest called with {} arguments", args.count());
    if args.is_empty() {
      return Ok(TaggedValue::encode_undefined());
    }

    let Some(number) = args.get(rt, 0).as_number() else {
      return Err(rt.raise_type_error("expected argument to be a number"));
    };
    println!("argument is {}", format_number(number));
    if args.count() < 2 {
      return Ok(TaggedValue::encode_undefined());
    }

    let Some(string) = args.get_handle(1).as_string_handle(rt) else {
      return Err(rt.raise_type_error("expected argument to be a string"));
    };
    let view = string.view(rt)?;
    if view.is_ascii() {
      println!("argument is in ASCII encoding");
    } else {
      println!("argument is in UTF16 encoding");
      let units: Vec<String> = view.code_units().map(|unit| format!("{unit:X}")).collect();
      println!("{}", units.join(" "));
    }
    Ok(TaggedValue::encode_undefined())
  }
}

fn print(_session: &mut BindingsSession, rt: &mut Runtime, args: ArgsView) -> CallbackResult {
  let line: Vec<String> = (0..args.count())
    .map(|i| args.get(rt, i).to_display_string(rt))
    .collect();
  println!("{}", line.join(" "));
  Ok(TaggedValue::encode_undefined())
}

/// `nativeTest` and `print`, installed on the global object.
#[derive(Default)]
pub struct DemoBindings {
  native_test: Option<RegistrationRef>,
  print: Option<RegistrationRef>,
}

impl DemoBindings {
  fn define(
    session: &BindingsSession,
    rt: &mut Runtime,
    registration: Option<&RegistrationRef>,
    name: &str,
    arity: u32,
  ) -> Result<(), InstallError> {
    let failed = || InstallError::DefineFailed {
      name: name.to_string(),
    };
    let registration = registration.ok_or_else(failed)?;
    let symbol = session.intern_symbol(rt, name)?;
    let defined = session
      .function_with_only_runtime(rt)
      .bind_callback(registration)
      .set_identity(symbol, arity)
      .define();
    if defined {
      Ok(())
    } else {
      Err(failed())
    }
  }
}

impl Bindings for DemoBindings {
  fn start(&mut self, session: &mut BindingsSession) {
    tracing::debug!("registering demo callbacks");
    self.native_test = Some(session.register_callback(NativeTest));
    self.print = Some(session.register_callback(print));
  }

  fn install(&mut self, session: &mut BindingsSession, rt: &mut Runtime) -> Result<(), InstallError> {
    Self::define(session, rt, self.native_test.as_ref(), "nativeTest", 2)?;
    Self::define(session, rt, self.print.as_ref(), "print", 0)
  }
}
