use crate::handle::ValueHandle;
use crate::value::TaggedValue;
use engine_js::NativeArgs;
use engine_js::Runtime;

/// The arguments of one native call.
///
/// Script decides how many arguments a native receives, so every accessor is total: reading past
/// [`count`](Self::count) yields `undefined` rather than failing.
#[derive(Clone, Copy, Debug)]
pub struct ArgsView {
  args: NativeArgs,
}

impl ArgsView {
  pub(crate) fn new(args: NativeArgs) -> Self {
    Self { args }
  }

  pub fn count(&self) -> usize {
    self.args.arg_count() as usize
  }

  pub fn is_empty(&self) -> bool {
    self.count() == 0
  }

  /// The current value of argument `index`. The result is unrooted; prefer
  /// [`get_handle`](Self::get_handle) when it must survive an allocation.
  pub fn get(&self, rt: &Runtime, index: usize) -> TaggedValue {
    match u32::try_from(index) {
      Ok(index) => TaggedValue::from_raw(self.args.arg(rt, index)),
      Err(_) => TaggedValue::encode_undefined(),
    }
  }

  pub fn get_handle(&self, index: usize) -> ValueHandle {
    match u32::try_from(index) {
      Ok(index) => ValueHandle::from_raw(self.args.arg_handle(index)),
      Err(_) => ValueHandle::undefined(),
    }
  }

  pub fn this_handle(&self) -> ValueHandle {
    ValueHandle::from_raw(self.args.this_arg())
  }

  pub fn callee_handle(&self) -> ValueHandle {
    ValueHandle::from_raw(self.args.callee())
  }

  pub fn handles(&self) -> impl Iterator<Item = ValueHandle> {
    let view = *self;
    (0..view.count()).map(move |index| view.get_handle(index))
  }
}
