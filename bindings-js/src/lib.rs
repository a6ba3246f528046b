//! Stateful native callbacks for `engine-js`.
//!
//! The engine calls natives through a plain function pointer plus an opaque context. This crate
//! turns that into closures and trait objects:
//!
//! - A [`BindingsSession`] owns every registered [`Callback`]. Each registration is a
//!   reference-counted node, so the reference handed out by
//!   [`register_callback`](BindingsSession::register_callback) is never invalidated.
//! - A [`NativeFunctionDefinition`] creates the engine function object with the registration as
//!   its context and the shared [`trampoline`] as its entrypoint, and installs it as a property.
//! - The [`trampoline`] recovers the registration through a checked downcast and runs its callback
//!   with the owning session.
//! - [`TaggedValue`], the handle wrappers ([`ValueHandle`] and friends) and [`ArgsView`] give the
//!   callback checked access to script values.
//!
//! [`SessionBootstrap`] and [`execute_bytecode`] drive a runtime from creation through installing
//! a [`Bindings`] set to running a module.
//!
//! ```no_run
//! use bindings_js::{execute_bytecode, ArgsView, Bindings, BindingsSession, ExecuteOptions};
//! use bindings_js::{CallbackResult, InstallError, TaggedValue};
//! use engine_js::{BytecodeBuilder, Runtime};
//! use std::sync::Arc;
//!
//! struct Add2;
//!
//! impl Bindings for Add2 {
//!   fn install(&mut self, session: &mut BindingsSession, rt: &mut Runtime) -> Result<(), InstallError> {
//!     let add2 = session.register_callback(|_: &mut BindingsSession, rt: &mut Runtime, args: ArgsView| -> CallbackResult {
//!       let a = args.get(rt, 0).to_number(rt)?;
//!       let b = args.get(rt, 1).to_number(rt)?;
//!       Ok(TaggedValue::number(a + b))
//!     });
//!     let name = session.intern_symbol(rt, "add2")?;
//!     let installed = session
//!       .function_with_only_runtime(rt)
//!       .bind_callback(&add2)
//!       .set_identity(name, 2)
//!       .define();
//!     if installed {
//!       Ok(())
//!     } else {
//!       Err(InstallError::DefineFailed { name: "add2".to_string() })
//!     }
//!   }
//! }
//!
//! let bytecode = BytecodeBuilder::new()
//!   .call_global("add2", 2, |b| b.load_number(3.0).load_number(4.0))
//!   .ret()
//!   .build();
//! assert!(execute_bytecode(Arc::new(bytecode), "add2.js", &mut Add2, ExecuteOptions::default()));
//! ```

mod args;
mod bootstrap;
mod callback;
mod definition;
mod error;
mod handle;
mod session;
mod trampoline;
mod value;

pub use crate::args::ArgsView;
pub use crate::bootstrap::execute_bytecode;
pub use crate::bootstrap::Bindings;
pub use crate::bootstrap::ExecuteOptions;
pub use crate::bootstrap::RunOutcome;
pub use crate::bootstrap::SessionBootstrap;
pub use crate::bootstrap::SessionState;
pub use crate::bootstrap::StatsReport;
pub use crate::callback::Callback;
pub use crate::callback::CallbackResult;
pub use crate::callback::NoopCallback;
pub use crate::definition::NativeFunctionDefinition;
pub use crate::error::BootstrapError;
pub use crate::error::InstallError;
pub use crate::handle::BigIntHandle;
pub use crate::handle::ObjectHandle;
pub use crate::handle::StringHandle;
pub use crate::handle::SymbolHandle;
pub use crate::handle::ValueHandle;
pub use crate::session::BindingsSession;
pub use crate::session::CallbackRegistration;
pub use crate::session::RegistrationId;
pub use crate::session::RegistrationRef;
pub use crate::trampoline::trampoline;
pub use crate::value::TaggedValue;
