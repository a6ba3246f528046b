//! The engine's stack bytecode.
//!
//! A module is a flat list of [`Instruction`]s executed against an operand stack. Modules are
//! serialised as JSON, e.g.
//!
//! ```json
//! {"version":1,"instructions":[
//!   {"op":"load_global","name":"add2"},
//!   {"op":"load_number","value":3},
//!   {"op":"load_number","value":4},
//!   {"op":"call","argc":2},
//!   {"op":"return"}
//! ]}
//! ```

use num_bigint::BigInt;
use serde::Deserialize;
use serde::Serialize;

pub const BYTECODE_VERSION: u32 = 1;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Instruction {
  LoadUndefined,
  LoadNull,
  LoadBool { value: bool },
  LoadNumber { value: f64 },
  LoadString { value: String },
  /// Decimal literal, optionally signed.
  LoadBigInt { value: String },
  LoadGlobal { name: String },
  /// Pops the value and assigns it to the global.
  StoreGlobal { name: String },
  /// Pops an object and pushes its named property.
  GetProperty { name: String },
  /// Pops `argc` arguments and then the callee; pushes the result.
  Call { argc: u32 },
  Add,
  Sub,
  StrictEquals,
  TypeOf,
  Pop,
  Dup,
  Jump { target: u32 },
  /// Pops a value and jumps when it is falsy.
  JumpIfFalse { target: u32 },
  /// Installs a handler: an exception thrown before the matching `ExitTry` unwinds the operand
  /// stack to its depth at this point, pushes the thrown value and continues at `handler`.
  EnterTry { handler: u32 },
  ExitTry,
  Throw,
  /// Pops the completion value (or `undefined` if the stack is empty) and ends the module.
  Return,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BytecodeError {
  #[error("malformed bytecode: {0}")]
  Malformed(String),

  #[error("unsupported bytecode version {found} (expected {expected})")]
  UnsupportedVersion { found: u32, expected: u32 },

  #[error("instruction {index} jumps to {target}, past the end of the module")]
  JumpOutOfRange { index: usize, target: u32 },

  #[error("instruction {index} has an invalid bigint literal {literal:?}")]
  InvalidBigInt { index: usize, literal: String },
}

/// Flags controlling how a module is loaded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RuntimeModuleFlags {
  /// The runtime keeps the module alive after it finishes running.
  pub persistent: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bytecode {
  pub version: u32,
  pub instructions: Vec<Instruction>,
}

impl Bytecode {
  pub fn new(instructions: Vec<Instruction>) -> Self {
    Self {
      version: BYTECODE_VERSION,
      instructions,
    }
  }

  /// Parses and validates a serialised module.
  pub fn from_slice(bytes: &[u8]) -> Result<Self, BytecodeError> {
    let bytecode: Bytecode =
      serde_json::from_slice(bytes).map_err(|err| BytecodeError::Malformed(err.to_string()))?;
    bytecode.validate()?;
    Ok(bytecode)
  }

  pub fn to_vec(&self) -> Result<Vec<u8>, BytecodeError> {
    serde_json::to_vec(self).map_err(|err| BytecodeError::Malformed(err.to_string()))
  }

  pub fn validate(&self) -> Result<(), BytecodeError> {
    if self.version != BYTECODE_VERSION {
      return Err(BytecodeError::UnsupportedVersion {
        found: self.version,
        expected: BYTECODE_VERSION,
      });
    }
    let len = self.instructions.len();
    for (index, instruction) in self.instructions.iter().enumerate() {
      match instruction {
        Instruction::Jump { target }
        | Instruction::JumpIfFalse { target }
        | Instruction::EnterTry { handler: target } => {
          if *target as usize > len {
            return Err(BytecodeError::JumpOutOfRange {
              index,
              target: *target,
            });
          }
        }
        Instruction::LoadBigInt { value } => {
          if parse_bigint(value).is_none() {
            return Err(BytecodeError::InvalidBigInt {
              index,
              literal: value.clone(),
            });
          }
        }
        _ => {}
      }
    }
    Ok(())
  }
}

pub(crate) fn parse_bigint(literal: &str) -> Option<BigInt> {
  BigInt::parse_bytes(literal.as_bytes(), 10)
}

/// Incrementally assembles a [`Bytecode`] module.
#[derive(Clone, Debug, Default)]
pub struct BytecodeBuilder {
  instructions: Vec<Instruction>,
}

impl BytecodeBuilder {
  pub fn new() -> Self {
    Self::default()
  }

  /// Offset of the next instruction, for use as a jump target.
  pub fn offset(&self) -> u32 {
    self.instructions.len() as u32
  }

  pub fn push(mut self, instruction: Instruction) -> Self {
    self.instructions.push(instruction);
    self
  }

  pub fn load_undefined(self) -> Self {
    self.push(Instruction::LoadUndefined)
  }

  pub fn load_number(self, value: f64) -> Self {
    self.push(Instruction::LoadNumber { value })
  }

  pub fn load_string(self, value: &str) -> Self {
    self.push(Instruction::LoadString {
      value: value.to_string(),
    })
  }

  pub fn load_global(self, name: &str) -> Self {
    self.push(Instruction::LoadGlobal {
      name: name.to_string(),
    })
  }

  pub fn store_global(self, name: &str) -> Self {
    self.push(Instruction::StoreGlobal {
      name: name.to_string(),
    })
  }

  pub fn call(self, argc: u32) -> Self {
    self.push(Instruction::Call { argc })
  }

  /// `name(args...)` for a global function, with the arguments emitted by `args`.
  pub fn call_global(self, name: &str, argc: u32, args: impl FnOnce(Self) -> Self) -> Self {
    args(self.load_global(name)).call(argc)
  }

  pub fn ret(self) -> Self {
    self.push(Instruction::Return)
  }

  pub fn build(self) -> Bytecode {
    Bytecode::new(self.instructions)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_json_modules() {
    let json = br#"{"version":1,"instructions":[
      {"op":"load_global","name":"add2"},
      {"op":"load_number","value":3},
      {"op":"load_number","value":4.5},
      {"op":"call","argc":2},
      {"op":"return"}
    ]}"#;
    let bytecode = Bytecode::from_slice(json).unwrap();
    assert_eq!(
      bytecode,
      BytecodeBuilder::new()
        .call_global("add2", 2, |b| b.load_number(3.0).load_number(4.5))
        .ret()
        .build()
    );
  }

  #[test]
  fn rejects_out_of_range_jumps() {
    let bytecode = Bytecode::new(vec![Instruction::Jump { target: 5 }]);
    assert_eq!(
      bytecode.validate(),
      Err(BytecodeError::JumpOutOfRange {
        index: 0,
        target: 5
      })
    );
  }

  #[test]
  fn rejects_unknown_versions() {
    let err = Bytecode::from_slice(br#"{"version":7,"instructions":[]}"#).unwrap_err();
    assert!(matches!(
      err,
      BytecodeError::UnsupportedVersion { found: 7, .. }
    ));
  }

  #[test]
  fn rejects_invalid_bigints() {
    let bytecode = Bytecode::new(vec![Instruction::LoadBigInt {
      value: "12x".to_string(),
    }]);
    assert!(matches!(
      bytecode.validate(),
      Err(BytecodeError::InvalidBigInt { index: 0, .. })
    ));
  }

  #[test]
  fn malformed_json_is_reported() {
    assert!(matches!(
      Bytecode::from_slice(b"not json"),
      Err(BytecodeError::Malformed(_))
    ));
  }
}
