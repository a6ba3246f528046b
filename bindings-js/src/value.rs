use crate::handle::ValueHandle;
use engine_js::CallResult;
use engine_js::Runtime;
use engine_js::SymbolId;
use engine_js::Value;
use std::fmt;

/// A script value as seen from a native callback.
///
/// This is the engine's NaN-boxed [`Value`] behind a checked surface: one predicate per kind and
/// one `as_*` accessor per kind that returns `None` instead of reinterpreting the payload when the
/// kind does not match.
///
/// A tagged value that references a string, bigint or object is only valid until the next engine
/// operation that may allocate. Use [`TaggedValue::root`] (or keep the [`ValueHandle`] it came
/// from) to hold onto it across such calls.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TaggedValue(Value);

impl TaggedValue {
  pub const fn from_raw(value: Value) -> Self {
    Self(value)
  }

  pub const fn into_raw(self) -> Value {
    self.0
  }

  pub const fn encode_undefined() -> Self {
    Self(Value::undefined())
  }

  pub const fn encode_nan() -> Self {
    Self(Value::nan())
  }

  pub const fn null() -> Self {
    Self(Value::null())
  }

  pub const fn boolean(value: bool) -> Self {
    Self(Value::from_bool(value))
  }

  pub fn number(value: f64) -> Self {
    Self(Value::from_number(value))
  }

  pub fn native_integer(value: i32) -> Self {
    Self(Value::from_native_int(value))
  }

  pub fn symbol(id: SymbolId) -> Self {
    Self(Value::from_symbol(id))
  }

  /// The uninitialised marker; never observable from script.
  pub fn is_empty(self) -> bool {
    self.0.is_empty()
  }

  pub fn is_undefined(self) -> bool {
    self.0.is_undefined()
  }

  pub fn is_null(self) -> bool {
    self.0.is_null()
  }

  pub fn is_boolean(self) -> bool {
    self.0.is_bool()
  }

  /// Whether this is a double. Native integers are reported separately by
  /// [`is_native_integer`](Self::is_native_integer).
  pub fn is_number(self) -> bool {
    self.0.is_number()
  }

  pub fn is_native_integer(self) -> bool {
    self.0.is_native_int()
  }

  pub fn is_string(self) -> bool {
    self.0.is_string()
  }

  pub fn is_object(self) -> bool {
    self.0.is_object()
  }

  pub fn is_symbol(self) -> bool {
    self.0.is_symbol()
  }

  pub fn is_bigint(self) -> bool {
    self.0.is_bigint()
  }

  /// Whether the payload references a heap cell (string, bigint or object).
  pub fn is_pointer_backed(self) -> bool {
    self.0.is_pointer()
  }

  pub fn as_boolean(self) -> Option<bool> {
    self.is_boolean().then(|| self.0.get_bool_unchecked())
  }

  /// The numeric payload of a double or a native integer.
  pub fn as_number(self) -> Option<f64> {
    if self.is_number() {
      Some(self.0.get_number_unchecked())
    } else if self.is_native_integer() {
      Some(self.0.get_native_int_unchecked() as f64)
    } else {
      None
    }
  }

  pub fn as_native_integer(self) -> Option<i32> {
    self
      .is_native_integer()
      .then(|| self.0.get_native_int_unchecked())
  }

  pub fn as_symbol(self) -> Option<SymbolId> {
    self.is_symbol().then(|| self.0.get_symbol_unchecked())
  }

  /// Numeric coercion with script semantics: `undefined` becomes `NaN`, strings are parsed.
  ///
  /// Symbols and bigints raise a `TypeError` on the runtime.
  pub fn to_number(self, rt: &mut Runtime) -> CallResult<f64> {
    rt.to_number(self.0)
  }

  pub fn to_boolean(self, rt: &Runtime) -> bool {
    rt.to_boolean(self.0)
  }

  pub fn type_of(self, rt: &Runtime) -> &'static str {
    rt.type_of(self.0)
  }

  pub fn to_display_string(self, rt: &Runtime) -> String {
    rt.to_display_string(self.0)
  }

  /// Roots the value in a handle slot of the current scope.
  pub fn root(self, rt: &mut Runtime) -> ValueHandle {
    ValueHandle::from_raw(rt.make_handle(self.0))
  }
}

impl From<Value> for TaggedValue {
  fn from(value: Value) -> Self {
    Self(value)
  }
}

impl From<TaggedValue> for Value {
  fn from(value: TaggedValue) -> Self {
    value.0
  }
}

impl From<bool> for TaggedValue {
  fn from(value: bool) -> Self {
    Self::boolean(value)
  }
}

impl From<f64> for TaggedValue {
  fn from(value: f64) -> Self {
    Self::number(value)
  }
}

impl fmt::Debug for TaggedValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Debug::fmt(&self.0, f)
  }
}
