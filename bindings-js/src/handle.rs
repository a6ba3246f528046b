use crate::value::TaggedValue;
use engine_js::BigInt;
use engine_js::BigIntPrimitive;
use engine_js::CallResult;
use engine_js::DefinePropertyFlags;
use engine_js::Handle;
use engine_js::JsObject;
use engine_js::Runtime;
use engine_js::StringPrimitive;
use engine_js::StringView;
use engine_js::SymbolId;
use engine_js::Value;

/// A rooted reference to any script value.
///
/// Engine handles carry no runtime type information at the type level, so narrowing goes through
/// the checked `as_*_handle` casts, which test the slot's current content first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ValueHandle(Handle<Value>);

impl ValueHandle {
  pub fn from_raw(handle: Handle<Value>) -> Self {
    Self(handle)
  }

  pub fn into_raw(self) -> Handle<Value> {
    self.0
  }

  /// A handle that always reads as `undefined`.
  pub fn undefined() -> Self {
    Self(Handle::undefined())
  }

  pub fn value(self, rt: &Runtime) -> TaggedValue {
    TaggedValue::from_raw(rt.get(self.0))
  }

  /// Like [`value`](Self::value), but reports a released handle as
  /// [`VmError::InvalidHandle`](engine_js::VmError::InvalidHandle).
  pub fn try_value(self, rt: &Runtime) -> CallResult<TaggedValue> {
    rt.try_get(self.0).map(TaggedValue::from_raw)
  }

  fn test(self, rt: &Runtime, predicate: impl FnOnce(Value) -> bool) -> bool {
    rt.try_get(self.0).is_ok_and(predicate)
  }

  pub fn is_symbol_handle(self, rt: &Runtime) -> bool {
    self.test(rt, Value::is_symbol)
  }

  pub fn is_string_handle(self, rt: &Runtime) -> bool {
    self.test(rt, Value::is_string)
  }

  pub fn is_bigint_handle(self, rt: &Runtime) -> bool {
    self.test(rt, Value::is_bigint)
  }

  pub fn is_object_handle(self, rt: &Runtime) -> bool {
    self.test(rt, Value::is_object)
  }

  pub fn as_symbol_handle(self, rt: &Runtime) -> Option<SymbolHandle> {
    self
      .is_symbol_handle(rt)
      .then(|| SymbolHandle(self.0.cast_unchecked()))
  }

  pub fn as_string_handle(self, rt: &Runtime) -> Option<StringHandle> {
    self
      .is_string_handle(rt)
      .then(|| StringHandle(self.0.cast_unchecked()))
  }

  pub fn as_bigint_handle(self, rt: &Runtime) -> Option<BigIntHandle> {
    self
      .is_bigint_handle(rt)
      .then(|| BigIntHandle(self.0.cast_unchecked()))
  }

  pub fn as_object_handle(self, rt: &Runtime) -> Option<ObjectHandle> {
    self
      .is_object_handle(rt)
      .then(|| ObjectHandle(self.0.cast_unchecked()))
  }
}

/// A rooted symbol.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SymbolHandle(Handle<SymbolId>);

impl SymbolHandle {
  pub fn new(rt: &mut Runtime, id: SymbolId) -> Self {
    Self(rt.symbol_handle(id))
  }

  pub fn symbol_id(self, rt: &Runtime) -> CallResult<SymbolId> {
    rt.symbol_of(self.0)
  }

  /// The symbol's description, if the handle is live.
  pub fn name(self, rt: &Runtime) -> Option<String> {
    self
      .symbol_id(rt)
      .ok()
      .and_then(|id| rt.symbol_name(id))
  }

  pub fn as_value_handle(self) -> ValueHandle {
    ValueHandle(self.0.into_value())
  }
}

/// A rooted string.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StringHandle(Handle<StringPrimitive>);

impl StringHandle {
  /// Allocates a string in the current scope.
  pub fn alloc(rt: &mut Runtime, s: &str) -> CallResult<Self> {
    rt.alloc_string(s).map(Self)
  }

  /// Borrows the string's code units.
  ///
  /// The view borrows the runtime, so no allocation (and therefore no collection) can happen
  /// while it is alive.
  pub fn view(self, rt: &Runtime) -> CallResult<StringView<'_>> {
    rt.string_view(self.0)
  }

  pub fn len(self, rt: &Runtime) -> CallResult<usize> {
    self.view(rt).map(|view| view.len())
  }

  pub fn is_empty(self, rt: &Runtime) -> CallResult<bool> {
    self.view(rt).map(|view| view.is_empty())
  }

  pub fn to_string_lossy(self, rt: &Runtime) -> CallResult<String> {
    self.view(rt).map(|view| view.to_string_lossy())
  }

  pub fn as_value_handle(self) -> ValueHandle {
    ValueHandle(self.0.into_value())
  }
}

/// A rooted bigint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BigIntHandle(Handle<BigIntPrimitive>);

impl BigIntHandle {
  pub fn alloc(rt: &mut Runtime, value: BigInt) -> CallResult<Self> {
    rt.alloc_bigint(value).map(Self)
  }

  pub fn value(self, rt: &Runtime) -> CallResult<&BigInt> {
    rt.bigint_value(self.0)
  }

  /// The value as an `i64`, or `None` when it does not fit.
  pub fn to_i64(self, rt: &Runtime) -> CallResult<Option<i64>> {
    self.value(rt).map(|n| i64::try_from(n).ok())
  }

  pub fn as_value_handle(self) -> ValueHandle {
    ValueHandle(self.0.into_value())
  }
}

/// A rooted ordinary or function object.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ObjectHandle(Handle<JsObject>);

impl ObjectHandle {
  pub fn from_raw(handle: Handle<JsObject>) -> Self {
    Self(handle)
  }

  pub fn into_raw(self) -> Handle<JsObject> {
    self.0
  }

  pub fn global(rt: &Runtime) -> Self {
    Self(rt.global_object())
  }

  pub fn get(self, rt: &Runtime, name: SymbolId) -> CallResult<TaggedValue> {
    rt.get_named(self.0, name).map(TaggedValue::from_raw)
  }

  /// Defines an own property; `Ok(false)` when the engine refused the definition.
  pub fn define(
    self,
    rt: &mut Runtime,
    name: SymbolId,
    flags: DefinePropertyFlags,
    value: ValueHandle,
  ) -> CallResult<bool> {
    rt.define_property(self.0, name, flags, value.into_raw())
  }

  pub fn is_callable(self, rt: &Runtime) -> bool {
    rt.try_get(self.0).is_ok_and(|value| rt.is_callable(value))
  }

  pub fn as_value_handle(self) -> ValueHandle {
    ValueHandle(self.0.into_value())
  }
}
