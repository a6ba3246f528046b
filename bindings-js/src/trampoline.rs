use crate::args::ArgsView;
use crate::session::CallbackRegistration;
use crate::value::TaggedValue;
use engine_js::CallResult;
use engine_js::NativeArgs;
use engine_js::NativeContext;
use engine_js::Runtime;
use engine_js::Value;

/// The engine entrypoint shared by every function built through
/// [`NativeFunctionDefinition`](crate::NativeFunctionDefinition).
///
/// The function's context selects the [`CallbackRegistration`] to run. A context that is not a
/// registration raises a `TypeError`.
pub fn trampoline(cx: &NativeContext, rt: &mut Runtime, args: NativeArgs) -> CallResult<Value> {
  let Some(registration) = cx.downcast::<CallbackRegistration>() else {
    return Err(rt.raise_type_error("native function is not bound to a callback"));
  };
  registration
    .invoke(rt, ArgsView::new(args))
    .map(TaggedValue::into_raw)
}
