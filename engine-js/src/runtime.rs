use crate::budget::Budget;
use crate::budget::BudgetState;
use crate::budget::InterruptHandle;
use crate::budget::InterruptToken;
use crate::bytecode::Bytecode;
use crate::error::CallResult;
use crate::error::VmError;
use crate::handle::GcScope;
use crate::handle::GcScopeMarker;
use crate::handle::Handle;
use crate::handle::HandleStack;
use crate::handle::FUNCTION_PROTOTYPE_SLOT;
use crate::handle::GLOBAL_OBJECT_SLOT;
use crate::handle::OBJECT_PROTOTYPE_SLOT;
use crate::handle::RESERVED_SLOTS;
use crate::heap::Heap;
use crate::heap::HeapCell;
use crate::heap::HeapLimits;
use crate::heap::CELL_OVERHEAD;
use crate::heap::PROPERTY_SLOT_BYTES;
use crate::identifier::IdentifierTable;
use crate::identifier::SymbolId;
use crate::native::NativeArgs;
use crate::native::NativeContext;
use crate::native::NativeFunctionPtr;
use crate::object::BigIntPrimitive;
use crate::object::JsObject;
use crate::object::NativeFunction;
use crate::object::NativeFunctionData;
use crate::object::ObjectKind;
use crate::property::DefinePropertyFlags;
use crate::property::PropertyFlags;
use crate::property::PropertySlot;
use crate::stats::GcEvent;
use crate::stats::GcStats;
use crate::stats::RuntimeCounters;
use crate::string::StringPrimitive;
use crate::string::StringView;
use crate::value::CellId;
use crate::value::Value;
use num_bigint::BigInt;
use serde::Deserialize;
use serde::Serialize;
use std::io;
use std::mem;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

/// Hard upper bound for `[[Prototype]]` chain traversals.
pub const MAX_PROTOTYPE_CHAIN: usize = 10_000;

/// Collector configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GcConfig {
  /// Name reported in statistics.
  pub name: String,
  /// Heap size below which no collection is attempted.
  pub init_heap_size: usize,
  /// Hard heap limit; allocations beyond it fail with [`VmError::OutOfMemory`].
  pub max_heap_size: usize,
  /// Record a [`GcEvent`] for every collection.
  pub should_record_stats: bool,
}

impl Default for GcConfig {
  fn default() -> Self {
    Self {
      name: "hvm-rust".to_string(),
      init_heap_size: 1 << 20,
      max_heap_size: 1 << 30,
      should_record_stats: false,
    }
  }
}

/// Construction-time runtime options.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
  pub gc: GcConfig,
  /// Maximum nesting of native calls.
  pub max_stack_depth: usize,
  /// Maximum number of operand stack entries.
  pub max_num_registers: usize,
  /// Maximum number of interned identifiers.
  pub max_symbols: usize,
  /// How many interpreter ticks pass between deadline checks.
  pub check_time_every: u32,
}

impl Default for RuntimeConfig {
  fn default() -> Self {
    Self {
      gc: GcConfig::default(),
      max_stack_depth: 1024,
      max_num_registers: 1024 * 1024,
      max_symbols: 1 << 20,
      check_time_every: 100,
    }
  }
}

/// Identifier of a persistent root created by [`Runtime::add_root`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RootId(u32);

pub(crate) struct Predefined {
  pub(crate) length: SymbolId,
  pub(crate) name: SymbolId,
  pub(crate) message: SymbolId,
  pub(crate) prototype: SymbolId,
}

/// A single-threaded engine instance: heap, identifier table, global object and interpreter.
pub struct Runtime {
  pub(crate) config: RuntimeConfig,
  pub(crate) heap: Heap,
  pub(crate) identifiers: IdentifierTable,
  pub(crate) predefined: Predefined,
  handles: HandleStack,
  pub(crate) stack: Vec<Value>,
  call_depth: usize,
  persistent_roots: Vec<Option<Value>>,
  persistent_roots_free: Vec<u32>,
  thrown_value: Option<Value>,
  budget: BudgetState,
  interrupt: InterruptToken,
  interrupt_handle: InterruptHandle,
  gc_events: Vec<GcEvent>,
  pub(crate) modules: Vec<Arc<Bytecode>>,
}

impl Runtime {
  /// Creates a runtime with its intrinsic objects: `Object.prototype`, `Function.prototype` and
  /// the global object.
  pub fn create(config: RuntimeConfig) -> CallResult<Self> {
    let counters = Arc::new(RuntimeCounters::default());
    let max_bytes = config.gc.max_heap_size;
    let threshold = config.gc.init_heap_size.min(max_bytes);
    let heap = Heap::new(HeapLimits::new(max_bytes, threshold), counters);

    let mut identifiers = IdentifierTable::new(config.max_symbols);
    let predefined = Predefined {
      length: identifiers.intern_ascii("length")?,
      name: identifiers.intern_ascii("name")?,
      message: identifiers.intern_ascii("message")?,
      prototype: identifiers.intern_ascii("prototype")?,
    };
    let (interrupt, interrupt_handle) = InterruptToken::new();
    let budget = BudgetState::new(Budget::unlimited(config.check_time_every));

    let mut rt = Self {
      config,
      heap,
      identifiers,
      predefined,
      handles: HandleStack::new(),
      stack: Vec::new(),
      call_depth: 0,
      persistent_roots: Vec::new(),
      persistent_roots_free: Vec::new(),
      thrown_value: None,
      budget,
      interrupt,
      interrupt_handle,
      gc_events: Vec::new(),
      modules: Vec::new(),
    };

    let object_prototype = rt.alloc_object_cell(Handle::null(), ObjectKind::Ordinary, 0)?;
    rt.handles.set_reserved(
      OBJECT_PROTOTYPE_SLOT,
      Value::from_object_cell(object_prototype),
    );
    let parent = rt.object_prototype().into_value();
    let function_prototype = rt.alloc_object_cell(parent, ObjectKind::Ordinary, 0)?;
    rt.handles.set_reserved(
      FUNCTION_PROTOTYPE_SLOT,
      Value::from_object_cell(function_prototype),
    );
    let global = rt.alloc_object_cell(parent, ObjectKind::Ordinary, 0)?;
    rt.handles
      .set_reserved(GLOBAL_OBJECT_SLOT, Value::from_object_cell(global));

    tracing::debug!(
      gc = %rt.config.gc.name,
      init_heap_size = rt.config.gc.init_heap_size,
      max_heap_size = rt.config.gc.max_heap_size,
      "runtime created"
    );
    Ok(rt)
  }

  pub fn config(&self) -> &RuntimeConfig {
    &self.config
  }

  // Intrinsics.

  pub fn global_object(&self) -> Handle<JsObject> {
    Handle::new(GLOBAL_OBJECT_SLOT, GLOBAL_OBJECT_SLOT)
  }

  pub fn object_prototype(&self) -> Handle<JsObject> {
    Handle::new(OBJECT_PROTOTYPE_SLOT, OBJECT_PROTOTYPE_SLOT)
  }

  pub fn function_prototype(&self) -> Handle<JsObject> {
    Handle::new(FUNCTION_PROTOTYPE_SLOT, FUNCTION_PROTOTYPE_SLOT)
  }

  // Handles and scopes.

  /// Enters a GC scope; handles created through it are released when it is dropped.
  pub fn scope(&mut self) -> GcScope<'_> {
    GcScope::new(self)
  }

  pub fn gc_scope_marker(&self) -> GcScopeMarker {
    self.handles.marker()
  }

  /// Releases every handle created after `marker` was taken.
  pub fn flush_to_marker(&mut self, marker: GcScopeMarker) {
    self.handles.flush(marker);
  }

  /// Number of live handle slots, including the reserved runtime roots.
  pub fn handle_count(&self) -> u32 {
    self.handles.len()
  }

  pub fn make_handle(&mut self, value: Value) -> Handle<Value> {
    self.make_typed_handle(value)
  }

  pub(crate) fn make_typed_handle<T>(&mut self, value: Value) -> Handle<T> {
    let (slot, serial) = self.handles.push(value);
    Handle::new(slot, serial)
  }

  /// Reads the current value of a handle.
  ///
  /// Reading a released handle is a host bug: it trips a debug assertion and yields the empty
  /// value in release builds. Use [`Runtime::try_get`] to test a handle that may be stale.
  pub fn get<T>(&self, handle: Handle<T>) -> Value {
    match self.handles.get(handle.slot(), handle.serial()) {
      Some(value) => value,
      None => {
        debug_assert!(false, "read through a released handle: {handle:?}");
        Value::empty()
      }
    }
  }

  pub fn try_get<T>(&self, handle: Handle<T>) -> CallResult<Value> {
    self
      .handles
      .get(handle.slot(), handle.serial())
      .ok_or(VmError::InvalidHandle)
  }

  /// Overwrites the value held by a handle.
  pub fn set_handle(&mut self, handle: Handle<Value>, value: Value) -> CallResult<()> {
    if handle.slot() < RESERVED_SLOTS {
      return Err(VmError::InvalidArgument("cannot overwrite a runtime root"));
    }
    if self.handles.set(handle.slot(), handle.serial(), value) {
      Ok(())
    } else {
      Err(VmError::InvalidHandle)
    }
  }

  // Persistent roots.

  /// Adds `value` to the persistent root set. It stays alive, and is relocated by the collector,
  /// until [`Runtime::remove_root`] is called.
  pub fn add_root(&mut self, value: Value) -> RootId {
    match self.persistent_roots_free.pop() {
      Some(index) => {
        self.persistent_roots[index as usize] = Some(value);
        RootId(index)
      }
      None => {
        self.persistent_roots.push(Some(value));
        RootId(self.persistent_roots.len() as u32 - 1)
      }
    }
  }

  pub fn get_root(&self, id: RootId) -> Option<Value> {
    self.persistent_roots.get(id.0 as usize).copied().flatten()
  }

  pub fn set_root(&mut self, id: RootId, value: Value) {
    if let Some(slot @ Some(_)) = self.persistent_roots.get_mut(id.0 as usize) {
      *slot = Some(value);
    }
  }

  pub fn remove_root(&mut self, id: RootId) {
    if let Some(slot) = self.persistent_roots.get_mut(id.0 as usize) {
      if slot.take().is_some() {
        self.persistent_roots_free.push(id.0);
      }
    }
  }

  // Identifiers.

  pub fn identifiers(&self) -> &IdentifierTable {
    &self.identifiers
  }

  pub fn intern_ascii(&mut self, name: &str) -> CallResult<SymbolId> {
    self.identifiers.intern_ascii(name)
  }

  pub fn intern_utf16(&mut self, units: &[u16]) -> CallResult<SymbolId> {
    self.identifiers.intern_utf16(units)
  }

  pub(crate) fn intern_str(&mut self, name: &str) -> CallResult<SymbolId> {
    if name.is_ascii() {
      self.identifiers.intern_ascii(name)
    } else {
      let units: Vec<u16> = name.encode_utf16().collect();
      self.identifiers.intern_utf16(&units)
    }
  }

  pub fn symbol_name(&self, id: SymbolId) -> Option<String> {
    self.identifiers.name(id)
  }

  pub(crate) fn symbol_display(&self, id: SymbolId) -> String {
    self
      .identifiers
      .name(id)
      .unwrap_or_else(|| format!("<symbol {}>", id.raw()))
  }

  /// Roots a symbol in a handle slot.
  pub fn symbol_handle(&mut self, id: SymbolId) -> Handle<SymbolId> {
    self.make_typed_handle(Value::from_symbol(id))
  }

  pub fn symbol_of(&self, handle: Handle<SymbolId>) -> CallResult<SymbolId> {
    let value = self.try_get(handle)?;
    if value.is_symbol() {
      Ok(value.get_symbol_unchecked())
    } else {
      Err(VmError::InvalidHandle)
    }
  }

  // Allocation.

  /// Makes room for `bytes`, collecting first if the heap is past its threshold.
  ///
  /// Every raw `Value` the caller holds outside a root is invalid once this returns.
  fn reserve(&mut self, bytes: usize) -> CallResult<()> {
    if self.heap.wants_collection(bytes) {
      self.collect_garbage("allocation");
    }
    if !self.heap.fits(bytes) {
      tracing::debug!(
        bytes,
        used_bytes = self.heap.used_bytes(),
        "allocation exceeds heap limit"
      );
      return Err(VmError::OutOfMemory);
    }
    Ok(())
  }

  pub(crate) fn alloc_leaf(&mut self, data: HeapCell) -> CallResult<CellId> {
    self.reserve(data.size_of())?;
    Ok(self.heap.alloc(data))
  }

  pub(crate) fn alloc_object_cell(
    &mut self,
    prototype: Handle<Value>,
    kind: ObjectKind,
    extra_slots: usize,
  ) -> CallResult<CellId> {
    self.reserve(CELL_OVERHEAD + extra_slots * mem::size_of::<Value>())?;
    let prototype = self.get(prototype);
    Ok(
      self
        .heap
        .alloc(HeapCell::Object(JsObject::new(prototype, kind, extra_slots))),
    )
  }

  pub fn alloc_string(&mut self, s: &str) -> CallResult<Handle<StringPrimitive>> {
    let value = self.alloc_string_value(s)?;
    Ok(self.make_typed_handle(value))
  }

  pub fn alloc_string_utf16(&mut self, units: &[u16]) -> CallResult<Handle<StringPrimitive>> {
    let id = self.alloc_leaf(HeapCell::String(StringPrimitive::from_utf16(units)))?;
    Ok(self.make_typed_handle(Value::from_string_cell(id)))
  }

  pub(crate) fn alloc_string_value(&mut self, s: &str) -> CallResult<Value> {
    let id = self.alloc_leaf(HeapCell::String(StringPrimitive::new(s)))?;
    Ok(Value::from_string_cell(id))
  }

  pub fn alloc_bigint(&mut self, value: BigInt) -> CallResult<Handle<BigIntPrimitive>> {
    let value = self.alloc_bigint_value(value)?;
    Ok(self.make_typed_handle(value))
  }

  pub(crate) fn alloc_bigint_value(&mut self, value: BigInt) -> CallResult<Value> {
    let id = self.alloc_leaf(HeapCell::BigInt(BigIntPrimitive::new(value)))?;
    Ok(Value::from_bigint_cell(id))
  }

  /// Allocates an ordinary object; `None` gives it a null prototype.
  pub fn alloc_object(&mut self, prototype: Option<Handle<JsObject>>) -> CallResult<Handle<JsObject>> {
    let prototype = prototype.map_or(Handle::null(), Handle::into_value);
    let id = self.alloc_object_cell(prototype, ObjectKind::Ordinary, 0)?;
    Ok(self.make_typed_handle(Value::from_object_cell(id)))
  }

  // Reading heap values.

  pub fn string_view(&self, handle: Handle<StringPrimitive>) -> CallResult<StringView<'_>> {
    let value = self.try_get(handle)?;
    self.string_view_of(value).ok_or(VmError::InvalidHandle)
  }

  pub fn string_view_of(&self, value: Value) -> Option<StringView<'_>> {
    value
      .as_string_cell()
      .and_then(|id| self.heap.string(id))
      .map(StringPrimitive::view)
  }

  pub fn bigint_value(&self, handle: Handle<BigIntPrimitive>) -> CallResult<&BigInt> {
    let value = self.try_get(handle)?;
    self.bigint_of(value).ok_or(VmError::InvalidHandle)
  }

  pub fn bigint_of(&self, value: Value) -> Option<&BigInt> {
    value
      .as_bigint_cell()
      .and_then(|id| self.heap.bigint(id))
      .map(BigIntPrimitive::value)
  }

  pub(crate) fn object_of(&self, value: Value) -> Option<&JsObject> {
    value.as_object_cell().and_then(|id| self.heap.object(id))
  }

  fn object_cell<T>(&self, handle: Handle<T>) -> CallResult<CellId> {
    self
      .try_get(handle)?
      .as_object_cell()
      .filter(|id| self.heap.object(*id).is_some())
      .ok_or(VmError::InvalidHandle)
  }

  pub fn is_callable(&self, value: Value) -> bool {
    self.object_of(value).is_some_and(JsObject::is_callable)
  }

  // Properties.

  /// Defines an own data property.
  ///
  /// Returns `Ok(false)` when the property already exists and either `allow_redefinition` is not
  /// set or the existing property is not configurable.
  pub fn define_property(
    &mut self,
    object: Handle<JsObject>,
    name: SymbolId,
    flags: DefinePropertyFlags,
    value: Handle<Value>,
  ) -> CallResult<bool> {
    self.reserve(PROPERTY_SLOT_BYTES)?;
    let id = self.object_cell(object)?;
    let value = self.try_get(value)?;
    let Some(target) = self.heap.object_mut(id) else {
      return Err(VmError::InvalidHandle);
    };
    match target.find_mut(name) {
      Some(existing) => {
        if !flags.allow_redefinition || !existing.flags.configurable {
          return Ok(false);
        }
        existing.flags = flags.property_flags();
        existing.value = value;
      }
      None => {
        target.properties.push(PropertySlot {
          name,
          flags: flags.property_flags(),
          value,
        });
        self.heap.grow(id, PROPERTY_SLOT_BYTES);
      }
    }
    Ok(true)
  }

  /// Like [`Runtime::define_property`], but a refused definition raises a `TypeError`.
  pub fn define_property_or_throw(
    &mut self,
    object: Handle<JsObject>,
    name: SymbolId,
    flags: DefinePropertyFlags,
    value: Handle<Value>,
  ) -> CallResult<()> {
    if self.define_property(object, name, flags, value)? {
      Ok(())
    } else {
      let message = format!("Cannot redefine property: {}", self.symbol_display(name));
      Err(self.raise_type_error(&message))
    }
  }

  /// Assigns a property: updates a writable own or inherited-absent property, or creates it with
  /// default flags.
  pub fn put_named(
    &mut self,
    object: Handle<JsObject>,
    name: SymbolId,
    value: Handle<Value>,
  ) -> CallResult<()> {
    let id = self.object_cell(object)?;
    let existing = self
      .heap
      .object(id)
      .and_then(|o| o.find(name))
      .map(|p| p.flags);
    match existing {
      Some(flags) if !flags.writable => {
        let message = format!(
          "Cannot assign to read only property '{}'",
          self.symbol_display(name)
        );
        Err(self.raise_type_error(&message))
      }
      Some(_) => {
        let value = self.try_get(value)?;
        if let Some(slot) = self.heap.object_mut(id).and_then(|o| o.find_mut(name)) {
          slot.value = value;
        }
        Ok(())
      }
      None => {
        self.define_property(
          object,
          name,
          DefinePropertyFlags::default_new_property(),
          value,
        )?;
        Ok(())
      }
    }
  }

  /// Reads a property through the prototype chain; absent properties read as `undefined`.
  pub fn get_named(&self, object: Handle<JsObject>, name: SymbolId) -> CallResult<Value> {
    let id = self.object_cell(object)?;
    Ok(
      self
        .lookup(Value::from_object_cell(id), name)
        .unwrap_or_else(Value::undefined),
    )
  }

  /// Convenience for reading a global by name.
  pub fn get_global(&mut self, name: &str) -> CallResult<Value> {
    let name = self.intern_str(name)?;
    self.get_named(self.global_object(), name)
  }

  pub(crate) fn lookup(&self, object: Value, name: SymbolId) -> Option<Value> {
    let mut current = object;
    for _ in 0..MAX_PROTOTYPE_CHAIN {
      let obj = self.object_of(current)?;
      if let Some(slot) = obj.find(name) {
        return Some(slot.value);
      }
      current = obj.prototype;
    }
    None
  }

  pub fn own_property_flags(
    &self,
    object: Handle<JsObject>,
    name: SymbolId,
  ) -> CallResult<Option<PropertyFlags>> {
    let id = self.object_cell(object)?;
    Ok(self.heap.object(id).and_then(|o| o.find(name)).map(|p| p.flags))
  }

  /// Own property names in definition order.
  pub fn own_property_names(&self, object: Handle<JsObject>) -> CallResult<Vec<SymbolId>> {
    let id = self.object_cell(object)?;
    Ok(
      self
        .heap
        .object(id)
        .map(|o| o.properties.iter().map(|p| p.name).collect())
        .unwrap_or_default(),
    )
  }

  // Native functions.

  /// Creates a callable object backed by `func`.
  ///
  /// `parent` becomes the function's `[[Prototype]]`. `context` is handed back to `func` on every
  /// call. The function gets non-enumerable `length` and `name` properties, plus a `prototype`
  /// property when one is supplied, and `extra_slots` internal slots initialised to `undefined`.
  #[allow(clippy::too_many_arguments)]
  pub fn create_native_function(
    &mut self,
    parent: Handle<JsObject>,
    context: NativeContext,
    func: NativeFunctionPtr,
    name: SymbolId,
    arity: u32,
    prototype: Option<Handle<JsObject>>,
    extra_slots: u32,
  ) -> CallResult<Handle<NativeFunction>> {
    let kind = ObjectKind::NativeFunction(NativeFunctionData {
      context,
      func,
      name,
      arity,
    });
    let id = self.alloc_object_cell(parent.into_value(), kind, extra_slots as usize)?;
    let function: Handle<NativeFunction> = self.make_typed_handle(Value::from_object_cell(id));
    let object = function.cast_unchecked::<JsObject>();

    let mut scope = self.scope();
    let readonly = DefinePropertyFlags {
      enumerable: false,
      writable: false,
      configurable: true,
      allow_redefinition: false,
    };
    let length_name = scope.predefined.length;
    let length = scope.make_handle(Value::from_number(arity as f64));
    scope.define_property(object, length_name, readonly, length)?;

    let name_name = scope.predefined.name;
    let units = scope
      .identifiers
      .name_units(name)
      .map(<[u16]>::to_vec)
      .unwrap_or_default();
    let name_string = scope.alloc_string_utf16(&units)?.into_value();
    scope.define_property(object, name_name, readonly, name_string)?;

    if let Some(prototype) = prototype {
      let prototype_name = scope.predefined.prototype;
      let flags = DefinePropertyFlags {
        enumerable: false,
        writable: true,
        configurable: false,
        allow_redefinition: false,
      };
      scope.define_property(object, prototype_name, flags, prototype.into_value())?;
    }
    drop(scope);

    tracing::debug!(name = %self.symbol_display(name), arity, extra_slots, "created native function");
    Ok(function)
  }

  fn native_data(&self, function: Handle<NativeFunction>) -> CallResult<(CellId, &JsObject)> {
    let id = self.object_cell(function)?;
    match self.heap.object(id) {
      Some(object) if object.is_callable() => Ok((id, object)),
      _ => Err(VmError::InvalidHandle),
    }
  }

  /// The arity the function was created with, regardless of later changes to its `length`.
  pub fn native_function_arity(&self, function: Handle<NativeFunction>) -> CallResult<u32> {
    let (_, object) = self.native_data(function)?;
    object
      .native_function()
      .map(|data| data.arity)
      .ok_or(VmError::InvalidHandle)
  }

  pub fn native_function_slot(&self, function: Handle<NativeFunction>, index: u32) -> CallResult<Value> {
    let (_, object) = self.native_data(function)?;
    object
      .slots
      .get(index as usize)
      .copied()
      .ok_or(VmError::InvalidArgument("native function slot index out of range"))
  }

  pub fn set_native_function_slot(
    &mut self,
    function: Handle<NativeFunction>,
    index: u32,
    value: Handle<Value>,
  ) -> CallResult<()> {
    let (id, _) = self.native_data(function)?;
    let value = self.try_get(value)?;
    let slot = self
      .heap
      .object_mut(id)
      .and_then(|o| o.slots.get_mut(index as usize))
      .ok_or(VmError::InvalidArgument("native function slot index out of range"))?;
    *slot = value;
    Ok(())
  }

  // Calls.

  /// Calls `callee` with `this` and `args`.
  ///
  /// The result is unrooted; root it before the next allocation if it must be kept.
  pub fn call(
    &mut self,
    callee: Handle<Value>,
    this: Handle<Value>,
    args: &[Handle<Value>],
  ) -> CallResult<Value> {
    let mut scope = self.scope();
    let callee = scope.try_get(callee)?;
    let this = scope.try_get(this)?;
    let args = args
      .iter()
      .map(|arg| scope.try_get(*arg))
      .collect::<CallResult<Vec<_>>>()?;
    let frame = scope.push_native_frame(callee, this, &args);
    scope.invoke_native(frame)
  }

  pub(crate) fn push_native_frame(&mut self, callee: Value, this: Value, args: &[Value]) -> NativeArgs {
    let (base, serial) = self.handles.push(callee);
    self.handles.push(this);
    for arg in args {
      self.handles.push(*arg);
    }
    debug_assert_eq!(
      self.handles.len(),
      base + NativeArgs::frame_len(args.len() as u32)
    );
    NativeArgs::new(base, serial, args.len() as u32)
  }

  pub(crate) fn invoke_native(&mut self, frame: NativeArgs) -> CallResult<Value> {
    let callee = self.get(frame.callee());
    let target = self
      .object_of(callee)
      .and_then(JsObject::native_function)
      .map(|data| (data.func, data.context.clone(), data.name, data.arity));
    let Some((func, context, name, arity)) = target else {
      let message = format!("{} is not a function", self.to_display_string(callee));
      return Err(self.raise_type_error(&message));
    };
    if self.call_depth >= self.config.max_stack_depth {
      return Err(self.raise_range_error("Maximum call stack size exceeded"));
    }

    self.call_depth += 1;
    tracing::trace!(
      function = name.raw(),
      arity,
      argc = frame.arg_count(),
      depth = self.call_depth,
      "native call"
    );
    let result = func(&context, self, frame);
    self.call_depth -= 1;
    result
  }

  pub fn call_depth(&self) -> usize {
    self.call_depth
  }

  // Exceptions.

  /// Sets `value` as the pending exception.
  pub fn throw_value(&mut self, value: Value) -> VmError {
    self.thrown_value = Some(value);
    VmError::Exception
  }

  pub fn thrown_value(&self) -> Option<Value> {
    self.thrown_value
  }

  pub fn clear_thrown_value(&mut self) -> Option<Value> {
    self.thrown_value.take()
  }

  pub fn raise_type_error(&mut self, message: &str) -> VmError {
    self.raise_error("TypeError", message)
  }

  pub fn raise_range_error(&mut self, message: &str) -> VmError {
    self.raise_error("RangeError", message)
  }

  pub fn raise_reference_error(&mut self, message: &str) -> VmError {
    self.raise_error("ReferenceError", message)
  }

  fn raise_error(&mut self, name: &str, message: &str) -> VmError {
    match self.make_error(name, message) {
      Ok(error) => self.throw_value(error),
      Err(err) => err,
    }
  }

  /// Allocates an error object with `name` and `message` properties. The result is unrooted.
  pub fn make_error(&mut self, name: &str, message: &str) -> CallResult<Value> {
    let mut scope = self.scope();
    let prototype = scope.object_prototype().into_value();
    let id = scope.alloc_object_cell(prototype, ObjectKind::Error, 0)?;
    let error: Handle<JsObject> = scope.make_typed_handle(Value::from_object_cell(id));
    let name_value = scope.alloc_string(name)?.into_value();
    let message_value = scope.alloc_string(message)?.into_value();
    let flags = DefinePropertyFlags::new_non_enumerable();
    let (name_key, message_key) = (scope.predefined.name, scope.predefined.message);
    scope.define_property(error, name_key, flags, name_value)?;
    scope.define_property(error, message_key, flags, message_value)?;
    Ok(scope.get(error))
  }

  /// Writes `Uncaught <description>` for a thrown value.
  pub fn print_exception(&self, out: &mut dyn io::Write, value: Value) -> io::Result<()> {
    writeln!(out, "Uncaught {}", self.to_display_string(value))
  }

  // Budget.

  pub fn set_budget(&mut self, budget: Budget) {
    self.budget = BudgetState::new(budget);
  }

  /// Limits how long script may run from now; `None` removes the limit.
  pub fn set_time_limit(&mut self, limit: Option<Duration>) {
    let every = self.config.check_time_every;
    self.set_budget(match limit {
      Some(limit) => Budget::with_time_limit(limit, every),
      None => Budget::unlimited(every),
    });
  }

  pub fn interrupt_handle(&self) -> InterruptHandle {
    self.interrupt_handle.clone()
  }

  /// Consume one tick: checks fuel, deadline and interrupt state.
  pub fn tick(&mut self) -> CallResult<()> {
    self
      .budget
      .tick(&self.interrupt)
      .map_err(VmError::Termination)
  }

  // Collection and statistics.

  /// Runs a full collection. Every raw `Value` held outside a root is invalid afterwards.
  pub fn collect_garbage(&mut self, cause: &str) {
    let started = Instant::now();
    let Runtime {
      heap,
      handles,
      stack,
      persistent_roots,
      thrown_value,
      ..
    } = self;
    let collection = heap.collect(|visit| {
      for value in handles.values_mut() {
        visit(value);
      }
      for value in stack.iter_mut() {
        visit(value);
      }
      for value in persistent_roots.iter_mut().flatten() {
        visit(value);
      }
      if let Some(value) = thrown_value.as_mut() {
        visit(value);
      }
    });
    let duration_us = started.elapsed().as_micros() as u64;
    tracing::debug!(
      cause,
      before_bytes = collection.before_bytes,
      after_bytes = collection.after_bytes,
      freed_cells = collection.freed_cells,
      moved_cells = collection.moved_cells,
      duration_us,
      "garbage collection"
    );
    if self.config.gc.should_record_stats {
      self.gc_events.push(GcEvent {
        cause: cause.to_string(),
        before_bytes: collection.before_bytes,
        after_bytes: collection.after_bytes,
        freed_cells: collection.freed_cells,
        moved_cells: collection.moved_cells,
        duration_us,
      });
    }
  }

  pub fn heap_limits(&self) -> HeapLimits {
    self.heap.limits()
  }

  pub fn used_bytes(&self) -> usize {
    self.heap.used_bytes()
  }

  pub fn counters(&self) -> Arc<RuntimeCounters> {
    self.heap.counters().clone()
  }

  pub fn gc_stats(&self) -> GcStats {
    let snapshot = self.heap.counters().snapshot();
    GcStats {
      name: self.config.gc.name.clone(),
      gc_runs: self.heap.gc_runs(),
      used_bytes: self.heap.used_bytes(),
      peak_used_bytes: snapshot.peak_used_bytes,
      allocations: snapshot.allocations,
      live_cells: self.heap.live_cells(),
      events: self.gc_events.clone(),
    }
  }

  /// Modules retained because they were loaded with `persistent` set.
  pub fn loaded_modules(&self) -> usize {
    self.modules.len()
  }
}
