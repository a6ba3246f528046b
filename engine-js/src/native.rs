use crate::error::CallResult;
use crate::handle::Handle;
use crate::runtime::Runtime;
use crate::value::Value;
use std::any::Any;
use std::fmt;
use std::rc::Rc;

/// A native `[[Call]]` entrypoint implemented in Rust.
///
/// # GC / rooting expectations
///
/// The callee, `this` and every argument are rooted in handle slots for the duration of the call,
/// so [`NativeArgs::arg_handle`] stays valid across allocations. A raw [`Value`] read through
/// [`NativeArgs::arg`] does not: any allocation may move the cell it references.
///
/// The returned value is unrooted; it must be produced after the last allocation the native
/// performs. Returning `Err(VmError::Exception)` signals that an exception has been raised on the
/// runtime.
///
/// [`VmError::Exception`]: crate::VmError::Exception
pub type NativeFunctionPtr = fn(&NativeContext, &mut Runtime, NativeArgs) -> CallResult<Value>;

/// Opaque per-function context handed back to a native on every call.
///
/// The context is type-erased and shared; the only way to get at the concrete type is a checked
/// [`downcast`](NativeContext::downcast), so a native can never reinterpret a context that was
/// created for some other function.
#[derive(Clone)]
pub struct NativeContext(Rc<dyn Any>);

impl NativeContext {
  pub fn new<T: Any>(context: Rc<T>) -> Self {
    Self(context)
  }

  /// A context for natives that carry no state.
  pub fn empty() -> Self {
    Self(Rc::new(()))
  }

  pub fn downcast<T: Any>(&self) -> Option<Rc<T>> {
    self.0.clone().downcast::<T>().ok()
  }

  pub fn is<T: Any>(&self) -> bool {
    self.0.is::<T>()
  }
}

impl fmt::Debug for NativeContext {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("NativeContext").finish_non_exhaustive()
  }
}

const CALLEE_OFFSET: u32 = 0;
const THIS_OFFSET: u32 = 1;
const FIRST_ARG_OFFSET: u32 = 2;

/// The arguments of a native call.
///
/// The frame occupies consecutive handle slots: callee, `this`, then the positional arguments.
/// Every accessor is total; reading past the end yields `undefined`.
#[derive(Clone, Copy, Debug)]
pub struct NativeArgs {
  base: u32,
  serial: u32,
  count: u32,
}

impl NativeArgs {
  pub(crate) fn new(base: u32, serial: u32, count: u32) -> Self {
    Self {
      base,
      serial,
      count,
    }
  }

  /// Number of handle slots occupied by a frame with `count` arguments.
  pub(crate) fn frame_len(count: u32) -> u32 {
    FIRST_ARG_OFFSET + count
  }

  fn slot_handle(&self, offset: u32) -> Handle<Value> {
    Handle::new(self.base + offset, self.serial.wrapping_add(offset))
  }

  pub fn arg_count(&self) -> u32 {
    self.count
  }

  pub fn callee(&self) -> Handle<Value> {
    self.slot_handle(CALLEE_OFFSET)
  }

  pub fn this_arg(&self) -> Handle<Value> {
    self.slot_handle(THIS_OFFSET)
  }

  pub fn arg_handle(&self, index: u32) -> Handle<Value> {
    if index < self.count {
      self.slot_handle(FIRST_ARG_OFFSET + index)
    } else {
      Handle::undefined()
    }
  }

  pub fn arg(&self, rt: &Runtime, index: u32) -> Value {
    if index < self.count {
      rt.get(self.slot_handle(FIRST_ARG_OFFSET + index))
    } else {
      Value::undefined()
    }
  }
}
