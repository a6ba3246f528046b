use engine_js::CallResult;
use engine_js::DefinePropertyFlags;
use engine_js::Handle;
use engine_js::NativeArgs;
use engine_js::NativeContext;
use engine_js::Runtime;
use engine_js::RuntimeConfig;
use engine_js::Value;
use engine_js::VmError;
use std::cell::Cell;
use std::rc::Rc;

fn return_42(_cx: &NativeContext, _rt: &mut Runtime, _args: NativeArgs) -> CallResult<Value> {
  Ok(Value::from_number(42.0))
}

fn count_calls(cx: &NativeContext, rt: &mut Runtime, _args: NativeArgs) -> CallResult<Value> {
  let Some(counter) = cx.downcast::<Cell<u32>>() else {
    return Err(rt.raise_type_error("unexpected context"));
  };
  counter.set(counter.get() + 1);
  Ok(Value::from_number(counter.get() as f64))
}

fn echo_arg(_cx: &NativeContext, rt: &mut Runtime, args: NativeArgs) -> CallResult<Value> {
  Ok(args.arg(rt, 0))
}

fn allocate_then_read(_cx: &NativeContext, rt: &mut Runtime, args: NativeArgs) -> CallResult<Value> {
  let arg = args.arg_handle(0);
  {
    let mut scope = rt.scope();
    for _ in 0..100 {
      scope.alloc_string("churn")?;
    }
  }
  rt.collect_garbage("native");
  Ok(rt.get(arg))
}

#[test]
fn native_function_can_be_created_and_called() -> Result<(), VmError> {
  let mut rt = Runtime::create(RuntimeConfig::default())?;
  let name = rt.intern_ascii("return42")?;
  let parent = rt.function_prototype();
  let func = rt.create_native_function(parent, NativeContext::empty(), return_42, name, 0, None, 0)?;

  let result = rt.call(func.into_value(), Handle::undefined(), &[])?;
  assert_eq!(result, Value::from_number(42.0));
  assert!(rt.is_callable(rt.get(func)));
  assert_eq!(rt.type_of(rt.get(func)), "function");
  Ok(())
}

#[test]
fn name_and_length_are_non_enumerable() -> Result<(), VmError> {
  let mut rt = Runtime::create(RuntimeConfig::default())?;
  let name = rt.intern_ascii("add2")?;
  let length = rt.intern_ascii("length")?;
  let name_key = rt.intern_ascii("name")?;
  let parent = rt.function_prototype();
  let func = rt.create_native_function(parent, NativeContext::empty(), return_42, name, 2, None, 0)?;
  let object = func.cast_unchecked();

  assert_eq!(rt.get_named(object, length)?, Value::from_number(2.0));
  let flags = rt.own_property_flags(object, length)?.expect("length defined");
  assert!(!flags.enumerable);
  assert!(!flags.writable);
  let own = rt.own_property_names(object)?;
  assert!(own.contains(&length) && own.contains(&name_key));

  let name_value = rt.get_named(object, name_key)?;
  assert_eq!(
    rt.string_view_of(name_value).map(|v| v.to_string_lossy()),
    Some("add2".to_string())
  );
  Ok(())
}

#[test]
fn arity_is_kept_when_length_is_redefined() -> Result<(), VmError> {
  let mut rt = Runtime::create(RuntimeConfig::default())?;
  let name = rt.intern_ascii("add3")?;
  let length = rt.intern_ascii("length")?;
  let parent = rt.function_prototype();
  let func = rt.create_native_function(parent, NativeContext::empty(), return_42, name, 3, None, 0)?;
  assert_eq!(rt.native_function_arity(func)?, 3);

  let flags = DefinePropertyFlags {
    enumerable: false,
    writable: false,
    configurable: true,
    allow_redefinition: true,
  };
  let seven = rt.make_handle(Value::from_number(7.0));
  assert!(rt.define_property(func.cast_unchecked(), length, flags, seven)?);
  assert_eq!(rt.get_named(func.cast_unchecked(), length)?, Value::from_number(7.0));
  assert_eq!(rt.native_function_arity(func)?, 3);

  let plain = rt.alloc_object(None)?;
  assert!(matches!(
    rt.native_function_arity(plain.cast_unchecked()),
    Err(VmError::InvalidHandle)
  ));
  Ok(())
}

#[test]
fn each_function_sees_its_own_context() -> Result<(), VmError> {
  let mut rt = Runtime::create(RuntimeConfig::default())?;
  let a_counter = Rc::new(Cell::new(0u32));
  let b_counter = Rc::new(Cell::new(100u32));
  let parent = rt.function_prototype();
  let a_name = rt.intern_ascii("a")?;
  let b_name = rt.intern_ascii("b")?;
  let a = rt.create_native_function(
    parent,
    NativeContext::new(a_counter.clone()),
    count_calls,
    a_name,
    0,
    None,
    0,
  )?;
  let b = rt.create_native_function(
    parent,
    NativeContext::new(b_counter.clone()),
    count_calls,
    b_name,
    0,
    None,
    0,
  )?;

  rt.call(a.into_value(), Handle::undefined(), &[])?;
  rt.call(b.into_value(), Handle::undefined(), &[])?;
  rt.call(a.into_value(), Handle::undefined(), &[])?;

  assert_eq!(a_counter.get(), 2);
  assert_eq!(b_counter.get(), 101);
  Ok(())
}

#[test]
fn foreign_context_is_rejected_by_downcast() -> Result<(), VmError> {
  let mut rt = Runtime::create(RuntimeConfig::default())?;
  let parent = rt.function_prototype();
  let name = rt.intern_ascii("wrong")?;
  let func = rt.create_native_function(
    parent,
    NativeContext::new(Rc::new("not a counter")),
    count_calls,
    name,
    0,
    None,
    0,
  )?;
  let err = rt
    .call(func.into_value(), Handle::undefined(), &[])
    .unwrap_err();
  assert!(err.is_exception());
  let thrown = rt.clear_thrown_value().expect("pending exception");
  assert_eq!(
    rt.to_display_string(thrown),
    "TypeError: unexpected context"
  );
  Ok(())
}

#[test]
fn missing_arguments_read_as_undefined() -> Result<(), VmError> {
  let mut rt = Runtime::create(RuntimeConfig::default())?;
  let parent = rt.function_prototype();
  let name = rt.intern_ascii("echo")?;
  let func = rt.create_native_function(parent, NativeContext::empty(), echo_arg, name, 1, None, 0)?;
  let result = rt.call(func.into_value(), Handle::undefined(), &[])?;
  assert!(result.is_undefined());
  Ok(())
}

#[test]
fn argument_handles_survive_collection_inside_the_call() -> Result<(), VmError> {
  let mut rt = Runtime::create(RuntimeConfig::default())?;
  let parent = rt.function_prototype();
  let name = rt.intern_ascii("allocateThenRead")?;
  let func = rt.create_native_function(
    parent,
    NativeContext::empty(),
    allocate_then_read,
    name,
    1,
    None,
    0,
  )?;
  let _dead = {
    let mut scope = rt.scope();
    let dead = scope.alloc_string("dead")?;
    scope.get(dead)
  };
  let arg = rt.alloc_string("payload")?;
  let result = rt.call(func.into_value(), Handle::undefined(), &[arg.into_value()])?;
  assert_eq!(
    rt.string_view_of(result).map(|v| v.to_string_lossy()),
    Some("payload".to_string())
  );
  Ok(())
}

#[test]
fn redefinition_requires_opt_in() -> Result<(), VmError> {
  let mut rt = Runtime::create(RuntimeConfig::default())?;
  let global = rt.global_object();
  let key = rt.intern_ascii("answer")?;
  let first = rt.make_handle(Value::from_number(1.0));
  let second = rt.make_handle(Value::from_number(2.0));
  let flags = DefinePropertyFlags::new_non_enumerable();

  assert!(rt.define_property(global, key, flags, first)?);
  assert!(!rt.define_property(global, key, flags, second)?);
  assert_eq!(rt.get_named(global, key)?, Value::from_number(1.0));

  assert!(rt.define_property(global, key, flags.with_redefinition(), second)?);
  assert_eq!(rt.get_named(global, key)?, Value::from_number(2.0));

  let err = rt
    .define_property_or_throw(global, key, flags, first)
    .unwrap_err();
  assert!(err.is_exception());
  let thrown = rt.clear_thrown_value().expect("pending exception");
  assert_eq!(
    rt.to_display_string(thrown),
    "TypeError: Cannot redefine property: answer"
  );
  Ok(())
}

#[test]
fn extra_slots_are_traced() -> Result<(), VmError> {
  let mut rt = Runtime::create(RuntimeConfig::default())?;
  let parent = rt.function_prototype();
  let name = rt.intern_ascii("withSlots")?;
  let func = rt.create_native_function(parent, NativeContext::empty(), return_42, name, 0, None, 2)?;
  assert!(rt.native_function_slot(func, 1)?.is_undefined());

  {
    let mut scope = rt.scope();
    let s = scope.alloc_string("slot value")?;
    scope.set_native_function_slot(func, 1, s.into_value())?;
  }
  rt.collect_garbage("test");

  let slot = rt.native_function_slot(func, 1)?;
  assert_eq!(
    rt.string_view_of(slot).map(|v| v.to_string_lossy()),
    Some("slot value".to_string())
  );
  assert!(matches!(
    rt.native_function_slot(func, 2),
    Err(VmError::InvalidArgument(_))
  ));
  Ok(())
}

#[test]
fn prototype_property_is_installed_when_given() -> Result<(), VmError> {
  let mut rt = Runtime::create(RuntimeConfig::default())?;
  let parent = rt.function_prototype();
  let proto = rt.alloc_object(Some(rt.object_prototype()))?;
  let name = rt.intern_ascii("Ctor")?;
  let key = rt.intern_ascii("prototype")?;
  let func = rt.create_native_function(
    parent,
    NativeContext::empty(),
    return_42,
    name,
    0,
    Some(proto),
    0,
  )?;
  let stored = rt.get_named(func.cast_unchecked(), key)?;
  assert_eq!(stored, rt.get(proto));
  Ok(())
}

#[test]
fn calling_a_non_function_throws_type_error() -> Result<(), VmError> {
  let mut rt = Runtime::create(RuntimeConfig::default())?;
  let not_callable = rt.make_handle(Value::from_number(3.0));
  let err = rt.call(not_callable, Handle::undefined(), &[]).unwrap_err();
  assert!(err.is_exception());
  let thrown = rt.clear_thrown_value().expect("pending exception");
  assert_eq!(rt.to_display_string(thrown), "TypeError: 3 is not a function");
  Ok(())
}
