use crate::identifier::SymbolId;
use crate::native::NativeContext;
use crate::native::NativeFunctionPtr;
use crate::property::PropertySlot;
use crate::value::Value;
use num_bigint::BigInt;

/// A heap-allocated object.
pub struct JsObject {
  pub(crate) prototype: Value,
  pub(crate) properties: Vec<PropertySlot>,
  pub(crate) kind: ObjectKind,
  pub(crate) slots: Vec<Value>,
}

/// Marker for handles to callable objects created by
/// [`Runtime::create_native_function`](crate::Runtime::create_native_function).
pub enum NativeFunction {}

pub(crate) enum ObjectKind {
  Ordinary,
  Error,
  NativeFunction(NativeFunctionData),
}

pub(crate) struct NativeFunctionData {
  pub(crate) context: NativeContext,
  pub(crate) func: NativeFunctionPtr,
  pub(crate) name: SymbolId,
  pub(crate) arity: u32,
}

impl JsObject {
  pub(crate) fn new(prototype: Value, kind: ObjectKind, extra_slots: usize) -> Self {
    Self {
      prototype,
      properties: Vec::new(),
      kind,
      slots: vec![Value::undefined(); extra_slots],
    }
  }

  pub(crate) fn find(&self, name: SymbolId) -> Option<&PropertySlot> {
    self.properties.iter().find(|p| p.name == name)
  }

  pub(crate) fn find_mut(&mut self, name: SymbolId) -> Option<&mut PropertySlot> {
    self.properties.iter_mut().find(|p| p.name == name)
  }

  pub(crate) fn is_callable(&self) -> bool {
    matches!(self.kind, ObjectKind::NativeFunction(_))
  }

  pub(crate) fn native_function(&self) -> Option<&NativeFunctionData> {
    match &self.kind {
      ObjectKind::NativeFunction(data) => Some(data),
      _ => None,
    }
  }

  pub(crate) fn for_each_value(&self, f: &mut dyn FnMut(Value)) {
    f(self.prototype);
    for property in &self.properties {
      f(property.value);
    }
    for slot in &self.slots {
      f(*slot);
    }
  }

  pub(crate) fn for_each_value_mut(&mut self, f: &mut dyn FnMut(&mut Value)) {
    f(&mut self.prototype);
    for property in &mut self.properties {
      f(&mut property.value);
    }
    for slot in &mut self.slots {
      f(slot);
    }
  }
}

/// A heap-allocated arbitrary-precision integer.
pub struct BigIntPrimitive {
  value: BigInt,
}

impl BigIntPrimitive {
  pub(crate) fn new(value: BigInt) -> Self {
    Self { value }
  }

  pub fn value(&self) -> &BigInt {
    &self.value
  }

  pub(crate) fn payload_bytes(&self) -> usize {
    (self.value.bits() as usize).div_ceil(8)
  }
}
