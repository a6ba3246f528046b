use crate::args::ArgsView;
use crate::session::BindingsSession;
use crate::value::TaggedValue;
use engine_js::Runtime;
use engine_js::VmError;

/// Outcome of a callback: a value, or `Err(VmError::Exception)` once an exception has been raised
/// on the runtime (e.g. through [`Runtime::raise_type_error`]).
pub type CallbackResult = Result<TaggedValue, VmError>;

/// A unit of native behaviour installed into script.
///
/// The callback itself is long-lived and may keep owned state across calls. It must not retain
/// the runtime, the session or anything borrowed from `args` past the call.
pub trait Callback {
  fn invoke(&mut self, session: &mut BindingsSession, rt: &mut Runtime, args: ArgsView) -> CallbackResult;
}

/// Returns `undefined` for every call. Every session starts with one of these as its default
/// registration.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopCallback;

impl Callback for NoopCallback {
  fn invoke(&mut self, _session: &mut BindingsSession, _rt: &mut Runtime, _args: ArgsView) -> CallbackResult {
    Ok(TaggedValue::encode_undefined())
  }
}

impl<F> Callback for F
where
  F: FnMut(&mut BindingsSession, &mut Runtime, ArgsView) -> CallbackResult,
{
  fn invoke(&mut self, session: &mut BindingsSession, rt: &mut Runtime, args: ArgsView) -> CallbackResult {
    self(session, rt, args)
  }
}
