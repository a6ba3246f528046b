use crate::bytecode::parse_bigint;
use crate::bytecode::Bytecode;
use crate::bytecode::Instruction;
use crate::bytecode::RuntimeModuleFlags;
use crate::error::CallResult;
use crate::error::VmError;
use crate::heap::HeapCell;
use crate::runtime::Runtime;
use crate::string::StringPrimitive;
use crate::value::Value;
use std::sync::Arc;

enum Flow {
  Next,
  Jump(usize),
  Return(Value),
}

struct TryHandler {
  target: usize,
  depth: usize,
}

impl Runtime {
  /// Validates a module without running it. Persistent modules are retained by the runtime.
  pub fn load_module(&mut self, bytecode: &Arc<Bytecode>, flags: RuntimeModuleFlags) -> CallResult<()> {
    bytecode.validate()?;
    tracing::debug!(
      instructions = bytecode.instructions.len(),
      persistent = flags.persistent,
      "loaded module"
    );
    if flags.persistent {
      self.modules.push(bytecode.clone());
    }
    Ok(())
  }

  /// Loads and runs a module, returning its completion value.
  ///
  /// An uncaught exception is reported as `Err(VmError::Exception)` with the value left pending on
  /// the runtime. Termination (deadline, interrupt, fuel) cannot be caught by script handlers.
  pub fn run_bytecode(
    &mut self,
    bytecode: Arc<Bytecode>,
    flags: RuntimeModuleFlags,
    source_name: &str,
  ) -> CallResult<Value> {
    self.load_module(&bytecode, flags)?;
    let _span = tracing::debug_span!("run_bytecode", source = source_name).entered();
    let base = self.stack.len();
    let result = self.interpret(&bytecode, base);
    self.stack.truncate(base);
    result
  }

  fn interpret(&mut self, code: &Bytecode, base: usize) -> CallResult<Value> {
    let mut ip = 0usize;
    let mut handlers: Vec<TryHandler> = Vec::new();
    loop {
      self.tick()?;
      let Some(instruction) = code.instructions.get(ip) else {
        return Ok(Value::undefined());
      };
      ip += 1;
      match self.execute(instruction, base, &mut handlers) {
        Ok(Flow::Next) => {}
        Ok(Flow::Jump(target)) => ip = target,
        Ok(Flow::Return(value)) => return Ok(value),
        Err(VmError::Exception) => {
          let Some(handler) = handlers.pop() else {
            return Err(VmError::Exception);
          };
          self.stack.truncate(handler.depth);
          let thrown = self.clear_thrown_value().unwrap_or_else(Value::undefined);
          self.push(thrown)?;
          ip = handler.target;
        }
        Err(err) => return Err(err),
      }
    }
  }

  fn execute(
    &mut self,
    instruction: &Instruction,
    base: usize,
    handlers: &mut Vec<TryHandler>,
  ) -> CallResult<Flow> {
    match instruction {
      Instruction::LoadUndefined => self.push(Value::undefined())?,
      Instruction::LoadNull => self.push(Value::null())?,
      Instruction::LoadBool { value } => self.push(Value::from_bool(*value))?,
      Instruction::LoadNumber { value } => self.push(Value::from_number(*value))?,
      Instruction::LoadString { value } => {
        let value = self.alloc_string_value(value)?;
        self.push(value)?;
      }
      Instruction::LoadBigInt { value } => {
        let Some(n) = parse_bigint(value) else {
          return Err(VmError::InvalidArgument("invalid bigint literal"));
        };
        let value = self.alloc_bigint_value(n)?;
        self.push(value)?;
      }
      Instruction::LoadGlobal { name } => {
        let key = self.intern_str(name)?;
        let global = self.get(self.global_object());
        match self.lookup(global, key) {
          Some(value) => self.push(value)?,
          None => return Err(self.raise_reference_error(&format!("{name} is not defined"))),
        }
      }
      Instruction::StoreGlobal { name } => {
        let key = self.intern_str(name)?;
        let value = self.pop(base)?;
        let mut scope = self.scope();
        let value = scope.make_handle(value);
        let global = scope.global_object();
        scope.put_named(global, key, value)?;
      }
      Instruction::GetProperty { name } => {
        let key = self.intern_str(name)?;
        let object = self.pop(base)?;
        if object.is_object() {
          let value = self.lookup(object, key).unwrap_or_else(Value::undefined);
          self.push(value)?;
        } else if object.is_undefined() || object.is_null() {
          let message = format!(
            "Cannot read properties of {} (reading '{name}')",
            self.to_display_string(object)
          );
          return Err(self.raise_type_error(&message));
        } else {
          self.push(Value::undefined())?;
        }
      }
      Instruction::Call { argc } => {
        let result = self.call_from_stack(*argc as usize, base)?;
        self.push(result)?;
      }
      Instruction::Add => self.add(base)?,
      Instruction::Sub => self.sub(base)?,
      Instruction::StrictEquals => {
        let b = self.pop(base)?;
        let a = self.pop(base)?;
        let equal = self.strict_equals(a, b);
        self.push(Value::from_bool(equal))?;
      }
      Instruction::TypeOf => {
        let value = self.pop(base)?;
        let type_name = self.type_of(value);
        let value = self.alloc_string_value(type_name)?;
        self.push(value)?;
      }
      Instruction::Pop => {
        self.pop(base)?;
      }
      Instruction::Dup => {
        let value = self.peek(base)?;
        self.push(value)?;
      }
      Instruction::Jump { target } => return Ok(Flow::Jump(*target as usize)),
      Instruction::JumpIfFalse { target } => {
        let value = self.pop(base)?;
        if !self.to_boolean(value) {
          return Ok(Flow::Jump(*target as usize));
        }
      }
      Instruction::EnterTry { handler } => handlers.push(TryHandler {
        target: *handler as usize,
        depth: self.stack.len(),
      }),
      Instruction::ExitTry => {
        handlers.pop();
      }
      Instruction::Throw => {
        let value = self.pop(base)?;
        return Err(self.throw_value(value));
      }
      Instruction::Return => {
        let value = if self.stack.len() > base {
          self.pop(base)?
        } else {
          Value::undefined()
        };
        return Ok(Flow::Return(value));
      }
    }
    Ok(Flow::Next)
  }

  fn push(&mut self, value: Value) -> CallResult<()> {
    if self.stack.len() >= self.config.max_num_registers {
      return Err(self.raise_range_error("Maximum call stack size exceeded"));
    }
    self.stack.push(value);
    Ok(())
  }

  fn pop(&mut self, base: usize) -> CallResult<Value> {
    if self.stack.len() <= base {
      return Err(VmError::InvalidArgument("operand stack underflow"));
    }
    self
      .stack
      .pop()
      .ok_or(VmError::InvalidArgument("operand stack underflow"))
  }

  fn peek(&self, base: usize) -> CallResult<Value> {
    if self.stack.len() <= base {
      return Err(VmError::InvalidArgument("operand stack underflow"));
    }
    self
      .stack
      .last()
      .copied()
      .ok_or(VmError::InvalidArgument("operand stack underflow"))
  }

  fn call_from_stack(&mut self, argc: usize, base: usize) -> CallResult<Value> {
    if self.stack.len() < base + argc + 1 {
      return Err(VmError::InvalidArgument("operand stack underflow"));
    }
    let marker = self.gc_scope_marker();
    let args_start = self.stack.len() - argc;
    let args: Vec<Value> = self.stack.drain(args_start..).collect();
    let callee = self.pop(base)?;
    let frame = self.push_native_frame(callee, Value::undefined(), &args);
    let result = self.invoke_native(frame);
    self.flush_to_marker(marker);
    result
  }

  // Operands stay on the operand stack (and so stay rooted) until the result has been computed
  // into owned memory; only then is anything allocated.

  fn add(&mut self, base: usize) -> CallResult<()> {
    let b = self.peek(base)?;
    let a = self
      .stack
      .len()
      .checked_sub(2)
      .filter(|i| *i >= base)
      .map(|i| self.stack[i])
      .ok_or(VmError::InvalidArgument("operand stack underflow"))?;

    let result = if a.is_string() || b.is_string() || a.is_object() || b.is_object() {
      let primitive = match (self.string_view_of(a), self.string_view_of(b)) {
        (Some(x), Some(y)) => StringPrimitive::concat(x, y),
        _ => {
          let mut units = self.display_units(a);
          units.extend(self.display_units(b));
          StringPrimitive::from_utf16(&units)
        }
      };
      let id = self.alloc_leaf(HeapCell::String(primitive))?;
      Value::from_string_cell(id)
    } else if a.is_bigint() && b.is_bigint() {
      let sum = match (self.bigint_of(a), self.bigint_of(b)) {
        (Some(x), Some(y)) => x + y,
        _ => return Err(VmError::InvalidHandle),
      };
      self.alloc_bigint_value(sum)?
    } else if a.is_bigint() || b.is_bigint() {
      return Err(self.raise_type_error(
        "Cannot mix BigInt and other types, use explicit conversions",
      ));
    } else {
      let x = self.to_number(a)?;
      let y = self.to_number(b)?;
      Value::from_number(x + y)
    };
    self.pop(base)?;
    self.pop(base)?;
    self.push(result)
  }

  fn sub(&mut self, base: usize) -> CallResult<()> {
    let b = self.pop(base)?;
    let a = self.pop(base)?;
    let result = if a.is_bigint() && b.is_bigint() {
      let difference = match (self.bigint_of(a), self.bigint_of(b)) {
        (Some(x), Some(y)) => x - y,
        _ => return Err(VmError::InvalidHandle),
      };
      // `a` and `b` are dead from here on, so allocating is safe.
      self.alloc_bigint_value(difference)?
    } else if a.is_bigint() || b.is_bigint() {
      return Err(self.raise_type_error(
        "Cannot mix BigInt and other types, use explicit conversions",
      ));
    } else {
      let x = self.to_number(a)?;
      let y = self.to_number(b)?;
      Value::from_number(x - y)
    };
    self.push(result)
  }

  fn display_units(&self, value: Value) -> Vec<u16> {
    match self.string_view_of(value) {
      Some(view) => view.to_utf16(),
      None => self.to_display_string(value).encode_utf16().collect(),
    }
  }
}
