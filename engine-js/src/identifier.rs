use crate::error::CallResult;
use crate::error::VmError;
use ahash::AHashMap;

/// An interned property name.
///
/// Identifiers are never collected, so a `SymbolId` stays valid for the lifetime of the runtime
/// that produced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(pub(crate) u32);

impl SymbolId {
  pub fn raw(self) -> u32 {
    self.0
  }
}

struct IdentifierEntry {
  units: Box<[u16]>,
}

/// Interning table mapping names (as UTF-16 code units) to [`SymbolId`]s.
pub struct IdentifierTable {
  by_name: AHashMap<Box<[u16]>, SymbolId>,
  entries: Vec<IdentifierEntry>,
  max_symbols: usize,
}

impl IdentifierTable {
  pub fn new(max_symbols: usize) -> Self {
    Self {
      by_name: AHashMap::new(),
      entries: Vec::new(),
      max_symbols,
    }
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Interns an ASCII name. Non-ASCII input is rejected rather than reinterpreted.
  pub fn intern_ascii(&mut self, name: &str) -> CallResult<SymbolId> {
    if !name.is_ascii() {
      return Err(VmError::InvalidArgument("identifier is not ASCII"));
    }
    let units: Vec<u16> = name.bytes().map(u16::from).collect();
    self.intern_utf16(&units)
  }

  pub fn intern_utf16(&mut self, units: &[u16]) -> CallResult<SymbolId> {
    if let Some(id) = self.by_name.get(units) {
      return Ok(*id);
    }
    if self.entries.len() >= self.max_symbols {
      return Err(VmError::OutOfMemory);
    }
    let id = SymbolId(self.entries.len() as u32);
    let units: Box<[u16]> = units.into();
    self.entries.push(IdentifierEntry {
      units: units.clone(),
    });
    self.by_name.insert(units, id);
    Ok(id)
  }

  /// Looks up an already-interned name without interning it.
  pub fn lookup(&self, name: &str) -> Option<SymbolId> {
    let units: Vec<u16> = name.encode_utf16().collect();
    self.by_name.get(units.as_slice()).copied()
  }

  pub fn name_units(&self, id: SymbolId) -> Option<&[u16]> {
    self.entries.get(id.0 as usize).map(|e| &*e.units)
  }

  pub fn name(&self, id: SymbolId) -> Option<String> {
    self.name_units(id).map(String::from_utf16_lossy)
  }
}
