use crate::session::RegistrationRef;
use crate::trampoline::trampoline;
use engine_js::CallResult;
use engine_js::DefinePropertyFlags;
use engine_js::Handle;
use engine_js::JsObject;
use engine_js::NativeContext;
use engine_js::NativeFunction;
use engine_js::NativeFunctionPtr;
use engine_js::Runtime;
use engine_js::SymbolId;
use engine_js::VmError;

/// Builder for one native function object.
///
/// Every function built here shares the same engine-level entrypoint, [`trampoline`]; what
/// distinguishes them is the registration carried as the function's context.
pub struct NativeFunctionDefinition<'rt> {
  rt: &'rt mut Runtime,
  parent: Handle<JsObject>,
  prototype: Option<Handle<JsObject>>,
  registration: RegistrationRef,
  entrypoint: NativeFunctionPtr,
  name: Option<SymbolId>,
  arity: u32,
  extra_slots: u32,
}

impl<'rt> NativeFunctionDefinition<'rt> {
  pub(crate) fn new(
    rt: &'rt mut Runtime,
    parent: Handle<JsObject>,
    prototype: Option<Handle<JsObject>>,
    registration: RegistrationRef,
  ) -> Self {
    Self {
      rt,
      parent,
      prototype,
      registration,
      entrypoint: trampoline,
      name: None,
      arity: 0,
      extra_slots: 0,
    }
  }

  /// Routes calls of the function to `registration`.
  pub fn bind_callback(mut self, registration: &RegistrationRef) -> Self {
    self.registration = registration.clone();
    self.entrypoint = trampoline;
    self
  }

  pub fn set_identity(mut self, name: SymbolId, arity: u32) -> Self {
    self.name = Some(name);
    self.arity = arity;
    self
  }

  /// Internal slots reserved on the function object, readable through
  /// [`Runtime::native_function_slot`].
  pub fn set_extra_slots(mut self, extra_slots: u32) -> Self {
    self.extra_slots = extra_slots;
    self
  }

  /// Creates the function object. The returned handle lives in the caller's current scope.
  pub fn create(&mut self) -> CallResult<Handle<NativeFunction>> {
    let Some(name) = self.name else {
      return Err(VmError::InvalidArgument("native function has no name"));
    };
    self.rt.create_native_function(
      self.parent,
      NativeContext::new(self.registration.clone()),
      self.entrypoint,
      name,
      self.arity,
      self.prototype,
      self.extra_slots,
    )
  }

  /// Creates the function and installs it as a non-enumerable property of the global object.
  ///
  /// Returns false when the engine refused: allocation failure, or a property of that name
  /// already exists. The failure is logged and any pending exception is cleared.
  pub fn define(self) -> bool {
    let global = self.rt.global_object();
    self.define_on(global)
  }

  /// Like [`define`](Self::define), with an arbitrary target object.
  pub fn define_on(mut self, target: Handle<JsObject>) -> bool {
    let Some(name) = self.name else {
      tracing::warn!("native function definition has no identity");
      return false;
    };
    let marker = self.rt.gc_scope_marker();
    let result = match self.create() {
      Ok(function) => self.rt.define_property(
        target,
        name,
        DefinePropertyFlags::new_non_enumerable(),
        function.into_value(),
      ),
      Err(err) => Err(err),
    };
    self.rt.flush_to_marker(marker);

    let display_name = self.rt.symbol_name(name).unwrap_or_default();
    match result {
      Ok(true) => {
        tracing::debug!(
          name = %display_name,
          arity = self.arity,
          registration = self.registration.id().0,
          "defined native function"
        );
        true
      }
      Ok(false) => {
        tracing::warn!(name = %display_name, "property already defined");
        false
      }
      Err(err) => {
        if let Some(thrown) = self.rt.clear_thrown_value() {
          tracing::warn!(
            name = %display_name,
            exception = %self.rt.to_display_string(thrown),
            "failed to define native function"
          );
        } else {
          tracing::warn!(name = %display_name, error = %err, "failed to define native function");
        }
        false
      }
    }
  }
}
