use crate::runtime::Runtime;
use crate::value::Value;
use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::ops::DerefMut;

/// A GC-safe reference to a value held in a handle slot.
///
/// Handle slots are GC roots: the collector rewrites them when it moves cells, so reading through a
/// handle always yields the current location. `T` records what the slot is known to hold
/// (`Value`, [`JsObject`](crate::JsObject), [`StringPrimitive`](crate::StringPrimitive),
/// [`BigIntPrimitive`](crate::BigIntPrimitive), [`SymbolId`](crate::SymbolId), ...); it is not
/// checked by the engine.
///
/// A handle is valid until the [`GcScope`] (or marker) that created it is flushed. Each slot carries
/// a serial number, so a stale handle is detected instead of silently reading whatever now occupies
/// the slot.
pub struct Handle<T = Value> {
  slot: u32,
  serial: u32,
  _kind: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
  pub(crate) const fn new(slot: u32, serial: u32) -> Self {
    Self {
      slot,
      serial,
      _kind: PhantomData,
    }
  }

  pub fn slot(self) -> u32 {
    self.slot
  }

  pub(crate) fn serial(self) -> u32 {
    self.serial
  }

  /// Reinterprets the handle as referring to a `U`. Nothing is checked.
  pub fn cast_unchecked<U>(self) -> Handle<U> {
    Handle::new(self.slot, self.serial)
  }

  pub fn into_value(self) -> Handle<Value> {
    self.cast_unchecked()
  }
}

impl Handle<Value> {
  /// A handle that always reads as `undefined`.
  pub const fn undefined() -> Self {
    Handle::new(UNDEFINED_SLOT, UNDEFINED_SLOT)
  }

  /// A handle that always reads as `null`.
  pub const fn null() -> Self {
    Handle::new(NULL_SLOT, NULL_SLOT)
  }
}

impl<T> Clone for Handle<T> {
  fn clone(&self) -> Self {
    *self
  }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
  fn eq(&self, other: &Self) -> bool {
    self.slot == other.slot && self.serial == other.serial
  }
}

impl<T> Eq for Handle<T> {}

impl<T> fmt::Debug for Handle<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Handle")
      .field("slot", &self.slot)
      .field("serial", &self.serial)
      .finish()
  }
}

pub(crate) const UNDEFINED_SLOT: u32 = 0;
pub(crate) const NULL_SLOT: u32 = 1;
pub(crate) const GLOBAL_OBJECT_SLOT: u32 = 2;
pub(crate) const OBJECT_PROTOTYPE_SLOT: u32 = 3;
pub(crate) const FUNCTION_PROTOTYPE_SLOT: u32 = 4;
pub(crate) const RESERVED_SLOTS: u32 = 5;

/// Position in the handle stack; flushing to it releases every handle created after it was taken.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GcScopeMarker(u32);

struct HandleSlot {
  value: Value,
  serial: u32,
}

/// The stack of handle slots. The first [`RESERVED_SLOTS`] entries are runtime roots that are
/// never released.
pub(crate) struct HandleStack {
  slots: Vec<HandleSlot>,
  next_serial: u32,
}

impl HandleStack {
  pub(crate) fn new() -> Self {
    let mut slots = Vec::with_capacity(64);
    for slot in 0..RESERVED_SLOTS {
      let value = if slot == NULL_SLOT {
        Value::null()
      } else {
        Value::undefined()
      };
      slots.push(HandleSlot {
        value,
        serial: slot,
      });
    }
    Self {
      slots,
      next_serial: RESERVED_SLOTS,
    }
  }

  pub(crate) fn len(&self) -> u32 {
    self.slots.len() as u32
  }

  pub(crate) fn push(&mut self, value: Value) -> (u32, u32) {
    let slot = self.slots.len() as u32;
    let serial = self.next_serial;
    self.next_serial = self.next_serial.wrapping_add(1);
    self.slots.push(HandleSlot { value, serial });
    (slot, serial)
  }

  pub(crate) fn get(&self, slot: u32, serial: u32) -> Option<Value> {
    self
      .slots
      .get(slot as usize)
      .filter(|s| s.serial == serial)
      .map(|s| s.value)
  }

  pub(crate) fn set(&mut self, slot: u32, serial: u32, value: Value) -> bool {
    match self.slots.get_mut(slot as usize) {
      Some(s) if s.serial == serial => {
        s.value = value;
        true
      }
      _ => false,
    }
  }

  pub(crate) fn set_reserved(&mut self, slot: u32, value: Value) {
    debug_assert!(slot < RESERVED_SLOTS);
    self.slots[slot as usize].value = value;
  }

  pub(crate) fn marker(&self) -> GcScopeMarker {
    GcScopeMarker(self.len())
  }

  pub(crate) fn flush(&mut self, marker: GcScopeMarker) {
    debug_assert!(
      marker.0 <= self.len(),
      "flushing to a marker above the current handle stack"
    );
    self.slots.truncate(marker.0.max(RESERVED_SLOTS) as usize);
  }

  pub(crate) fn values_mut(&mut self) -> impl Iterator<Item = &mut Value> {
    self.slots.iter_mut().map(|s| &mut s.value)
  }
}

/// RAII GC scope.
///
/// Handles created through the scope are released when it is dropped. The scope dereferences to
/// the [`Runtime`], so it can be used anywhere a runtime is expected, including to open nested
/// scopes.
pub struct GcScope<'rt> {
  runtime: &'rt mut Runtime,
  marker: GcScopeMarker,
}

impl<'rt> GcScope<'rt> {
  pub(crate) fn new(runtime: &'rt mut Runtime) -> Self {
    let marker = runtime.gc_scope_marker();
    Self { runtime, marker }
  }

  pub fn marker(&self) -> GcScopeMarker {
    self.marker
  }
}

impl Deref for GcScope<'_> {
  type Target = Runtime;

  fn deref(&self) -> &Runtime {
    self.runtime
  }
}

impl DerefMut for GcScope<'_> {
  fn deref_mut(&mut self) -> &mut Runtime {
    self.runtime
  }
}

impl Drop for GcScope<'_> {
  fn drop(&mut self) {
    self.runtime.flush_to_marker(self.marker);
  }
}
