//! Compact embeddable JavaScript engine core.
//!
//! This crate provides the pieces a host needs to expose native functions to script:
//! - NaN-boxed tagged values ([`Value`])
//! - A precise, *moving* (compacting) GC heap
//! - Root-registered handles ([`Handle`]) with RAII GC scopes ([`GcScope`]) and persistent roots
//!   ([`RootId`])
//! - An identifier table ([`SymbolId`])
//! - Native function objects with an opaque, type-checked per-function context
//!   ([`NativeContext`], [`NativeFunctionPtr`], [`NativeArgs`])
//! - A small stack bytecode ([`Bytecode`]) and its interpreter
//! - Cooperative interruption ([`Budget`], [`InterruptHandle`]) and heap statistics
//!   ([`GcStats`], [`StatSamplingThread`])
//!
//! # Rooting and handle validity
//!
//! The collector moves cells. A raw [`Value`] that references a string, bigint or object is only
//! valid until the next operation that may allocate: allocation can trigger a collection, and the
//! collection rewrites every *root* but cannot know about values held in host locals.
//!
//! The roots are:
//! - **Handle slots**, managed as a stack by [`GcScope`] / [`Runtime::flush_to_marker`]. Native
//!   call frames (callee, `this`, arguments) live here for the duration of the call.
//! - **Persistent roots**, managed by [`Runtime::add_root`] / [`Runtime::remove_root`], intended
//!   for host state that must survive across calls.
//! - The operand stack and the pending exception.
//!
//! Handles are `(slot, serial)` pairs. Reading a handle whose scope has been flushed is detected
//! through the serial; [`Runtime::try_get`] reports it as [`VmError::InvalidHandle`].

mod budget;
mod bytecode;
mod error;
mod handle;
mod heap;
mod identifier;
mod interpreter;
mod native;
mod object;
mod ops;
mod property;
mod runtime;
mod stats;
mod string;
mod value;

pub use crate::budget::Budget;
pub use crate::budget::InterruptHandle;
pub use crate::budget::InterruptToken;
pub use crate::bytecode::Bytecode;
pub use crate::bytecode::BytecodeBuilder;
pub use crate::bytecode::BytecodeError;
pub use crate::bytecode::Instruction;
pub use crate::bytecode::RuntimeModuleFlags;
pub use crate::bytecode::BYTECODE_VERSION;
pub use crate::error::CallResult;
pub use crate::error::TerminationReason;
pub use crate::error::VmError;
pub use crate::handle::GcScope;
pub use crate::handle::GcScopeMarker;
pub use crate::handle::Handle;
pub use crate::heap::HeapLimits;
pub use crate::identifier::IdentifierTable;
pub use crate::identifier::SymbolId;
pub use crate::native::NativeArgs;
pub use crate::native::NativeContext;
pub use crate::native::NativeFunctionPtr;
pub use crate::object::BigIntPrimitive;
pub use crate::object::JsObject;
pub use crate::object::NativeFunction;
pub use crate::ops::format_number;
pub use crate::property::DefinePropertyFlags;
pub use crate::property::PropertyFlags;
pub use crate::runtime::GcConfig;
pub use crate::runtime::RootId;
pub use crate::runtime::Runtime;
pub use crate::runtime::RuntimeConfig;
pub use crate::runtime::MAX_PROTOTYPE_CHAIN;
pub use crate::stats::CounterSnapshot;
pub use crate::stats::GcEvent;
pub use crate::stats::GcStats;
pub use crate::stats::RuntimeCounters;
pub use crate::stats::SampledStats;
pub use crate::stats::StatSamplingThread;
pub use crate::string::CodeUnits;
pub use crate::string::StringPrimitive;
pub use crate::string::StringView;
pub use crate::value::CellId;
pub use crate::value::Value;
pub use crate::value::ValueTag;
pub use num_bigint::BigInt;
