use bindings_js::ArgsView;
use bindings_js::BindingsSession;
use bindings_js::CallbackResult;
use bindings_js::RegistrationId;
use bindings_js::TaggedValue;
use engine_js::Handle;
use engine_js::Runtime;
use engine_js::RuntimeConfig;
use engine_js::Value;
use engine_js::VmError;
use proptest::prelude::*;
use std::cell::RefCell;
use std::rc::Rc;

fn noop(_: &mut BindingsSession, _: &mut Runtime, _: ArgsView) -> CallbackResult {
  Ok(TaggedValue::encode_undefined())
}

struct Observed {
  count: usize,
  values: Vec<TaggedValue>,
  through_handles: Vec<TaggedValue>,
  at_usize_max: (TaggedValue, TaggedValue),
}

/// Calls a native function with `argc` numeric arguments `0, 1, ..` and returns what the callback
/// saw at indices `0..argc + overshoot`, both by value and through handles.
fn observe_arguments(argc: usize, overshoot: usize) -> Result<Observed, VmError> {
  let mut rt = Runtime::create(RuntimeConfig::default())?;
  let mut session = BindingsSession::new();
  let seen: Rc<RefCell<Option<Observed>>> = Rc::new(RefCell::new(None));
  let sink = seen.clone();
  let registration = session.register_callback(
    move |_: &mut BindingsSession, rt: &mut Runtime, args: ArgsView| -> CallbackResult {
      let indices = 0..argc + overshoot;
      *sink.borrow_mut() = Some(Observed {
        count: args.count(),
        values: indices.clone().map(|i| args.get(rt, i)).collect(),
        through_handles: indices.map(|i| args.get_handle(i).value(rt)).collect(),
        at_usize_max: (
          args.get(rt, usize::MAX),
          args.get_handle(usize::MAX).value(rt),
        ),
      });
      Ok(TaggedValue::encode_undefined())
    },
  );
  let name = session.intern_symbol(&mut rt, "observe")?;
  let function = session
    .function_with_only_runtime(&mut rt)
    .bind_callback(&registration)
    .set_identity(name, 0)
    .create()?;

  let args: Vec<Handle<Value>> = (0..argc)
    .map(|i| rt.make_handle(Value::from_number(i as f64)))
    .collect();
  rt.call(function.into_value(), Handle::undefined(), &args)?;
  let observed = seen.borrow_mut().take();
  Ok(observed.expect("callback ran"))
}

proptest! {
  #[test]
  fn registrations_are_never_invalidated(before in 0usize..16, after in 0usize..64) {
    let mut session = BindingsSession::new();
    for _ in 0..before {
      session.register_callback(noop);
    }
    let kept = session.register_callback(noop);
    let id = kept.id();
    for _ in 0..after {
      session.register_callback(noop);
    }

    prop_assert_eq!(id, RegistrationId(before as u32 + 1));
    prop_assert_eq!(session.len(), before + after + 2);
    let found = session.find(id).expect("registration is still listed");
    prop_assert!(Rc::ptr_eq(&found, &kept));
    prop_assert!(kept.is_attached());
  }

  #[test]
  fn arguments_past_the_count_read_as_undefined_by_value_and_handle(
    argc in prop_oneof![Just(0usize), Just(1), Just(8), Just(255), 0usize..32],
    overshoot in 1usize..4,
  ) {
    let observed = observe_arguments(argc, overshoot).expect("call succeeds");
    prop_assert_eq!(observed.count, argc);
    prop_assert_eq!(observed.values.len(), argc + overshoot);
    prop_assert_eq!(&observed.through_handles, &observed.values);
    for (i, value) in observed.values.iter().enumerate() {
      if i < argc {
        prop_assert_eq!(value.as_number(), Some(i as f64));
      } else {
        prop_assert!(value.is_undefined());
      }
    }
    prop_assert!(observed.at_usize_max.0.is_undefined());
    prop_assert!(observed.at_usize_max.1.is_undefined());
  }

  #[test]
  fn interned_names_are_stable(names in prop::collection::vec("\\PC{1,12}", 1..8)) {
    let mut rt = Runtime::create(RuntimeConfig::default()).expect("runtime");
    let session = BindingsSession::new();
    let first: Vec<_> = names
      .iter()
      .map(|name| session.intern_symbol(&mut rt, name).expect("intern"))
      .collect();
    for (name, id) in names.iter().zip(&first) {
      prop_assert_eq!(session.intern_symbol(&mut rt, name).expect("intern"), *id);
      prop_assert_eq!(rt.symbol_name(*id), Some(name.clone()));
    }
  }
}
