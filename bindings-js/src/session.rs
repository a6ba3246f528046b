use crate::args::ArgsView;
use crate::callback::Callback;
use crate::callback::CallbackResult;
use crate::callback::NoopCallback;
use crate::definition::NativeFunctionDefinition;
use engine_js::CallResult;
use engine_js::Handle;
use engine_js::JsObject;
use engine_js::Runtime;
use engine_js::SymbolId;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::rc::Weak;

/// Identifies a registration within its session, in registration order. The default registration
/// is always `RegistrationId(0)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegistrationId(pub u32);

/// Shared reference to a registration. It stays valid however many registrations follow it.
pub type RegistrationRef = Rc<CallbackRegistration>;

/// One registered callback, paired with a back-reference to the session that owns it.
///
/// The registration is what native functions carry as their context: the engine keeps it alive
/// for as long as the function object lives, but the session link is weak, so a registration
/// outliving its session refuses to run.
pub struct CallbackRegistration {
  id: RegistrationId,
  session: Weak<SessionInner>,
  callback: RefCell<Box<dyn Callback>>,
}

impl CallbackRegistration {
  pub fn id(&self) -> RegistrationId {
    self.id
  }

  /// Whether the owning session is still alive.
  pub fn is_attached(&self) -> bool {
    self.session.strong_count() > 0
  }

  pub(crate) fn invoke(&self, rt: &mut Runtime, args: ArgsView) -> CallbackResult {
    let Some(inner) = self.session.upgrade() else {
      return Err(rt.raise_type_error("bindings session has been torn down"));
    };
    let Ok(mut callback) = self.callback.try_borrow_mut() else {
      return Err(rt.raise_type_error("native callback invoked re-entrantly"));
    };
    tracing::trace!(registration = self.id.0, argc = args.count(), "invoking callback");
    let mut session = BindingsSession { inner };
    callback.invoke(&mut session, rt, args)
  }
}

impl fmt::Debug for CallbackRegistration {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CallbackRegistration")
      .field("id", &self.id)
      .field("attached", &self.is_attached())
      .finish_non_exhaustive()
  }
}

struct SessionInner {
  registrations: RefCell<Vec<RegistrationRef>>,
}

/// The function-context registry of one bindings session.
///
/// It owns every registered callback, in registration order, and always holds at least the
/// default (no-op) registration. Callbacks receive the session on every call, so they can
/// register and install further functions.
pub struct BindingsSession {
  inner: Rc<SessionInner>,
}

impl BindingsSession {
  pub fn new() -> Self {
    let inner = Rc::new(SessionInner {
      registrations: RefCell::new(Vec::new()),
    });
    let mut session = Self { inner };
    session.register_callback(NoopCallback);
    session
  }

  /// Appends a registration for `callback` and returns it.
  pub fn register_callback(&mut self, callback: impl Callback + 'static) -> RegistrationRef {
    let mut registrations = self.inner.registrations.borrow_mut();
    let id = RegistrationId(registrations.len() as u32);
    let registration = Rc::new(CallbackRegistration {
      id,
      session: Rc::downgrade(&self.inner),
      callback: RefCell::new(Box::new(callback)),
    });
    registrations.push(registration.clone());
    tracing::debug!(registration = id.0, "registered callback");
    registration
  }

  /// The first registration, created with the session.
  pub fn default_registration(&self) -> RegistrationRef {
    self.inner.registrations.borrow()[0].clone()
  }

  pub fn registrations(&self) -> Vec<RegistrationRef> {
    self.inner.registrations.borrow().clone()
  }

  pub fn find(&self, id: RegistrationId) -> Option<RegistrationRef> {
    self
      .inner
      .registrations
      .borrow()
      .get(id.0 as usize)
      .cloned()
  }

  /// Number of registrations, including the default one.
  pub fn len(&self) -> usize {
    self.inner.registrations.borrow().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn intern_symbol(&self, rt: &mut Runtime, name: &str) -> CallResult<SymbolId> {
    if name.is_ascii() {
      rt.intern_ascii(name)
    } else {
      let units: Vec<u16> = name.encode_utf16().collect();
      rt.intern_utf16(&units)
    }
  }

  /// Unwraps an engine result at a call site that cannot continue without it.
  ///
  /// # Panics
  ///
  /// Panics when `result` is an error.
  #[track_caller]
  pub fn ignore_allocation_failure<T>(result: CallResult<T>) -> T {
    match result {
      Ok(value) => value,
      Err(err) => panic!("unrecoverable engine failure: {err}"),
    }
  }

  /// Starts a native function definition bound to the default registration.
  pub fn function<'rt>(
    &self,
    rt: &'rt mut Runtime,
    parent: Handle<JsObject>,
    prototype: Option<Handle<JsObject>>,
  ) -> NativeFunctionDefinition<'rt> {
    NativeFunctionDefinition::new(rt, parent, prototype, self.default_registration())
  }

  pub fn function_with_null_prototype<'rt>(
    &self,
    rt: &'rt mut Runtime,
    parent: Handle<JsObject>,
  ) -> NativeFunctionDefinition<'rt> {
    self.function(rt, parent, None)
  }

  /// A definition whose parent is `Function.prototype`.
  pub fn function_with_only_runtime<'rt>(&self, rt: &'rt mut Runtime) -> NativeFunctionDefinition<'rt> {
    let parent = rt.function_prototype();
    self.function_with_null_prototype(rt, parent)
  }
}

impl Default for BindingsSession {
  fn default() -> Self {
    Self::new()
  }
}

impl fmt::Debug for BindingsSession {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("BindingsSession")
      .field("registrations", &self.len())
      .finish()
  }
}
