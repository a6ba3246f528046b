use crate::identifier::SymbolId;
use crate::value::Value;

/// Attributes stored on an own data property.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PropertyFlags {
  pub enumerable: bool,
  pub writable: bool,
  pub configurable: bool,
}

/// Flags for [`Runtime::define_property`](crate::Runtime::define_property).
///
/// `allow_redefinition` controls what happens when the property already exists: without it the
/// definition is refused, with it a configurable property is replaced in place.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DefinePropertyFlags {
  pub enumerable: bool,
  pub writable: bool,
  pub configurable: bool,
  pub allow_redefinition: bool,
}

impl DefinePropertyFlags {
  /// Flags of a property created by plain assignment.
  pub fn default_new_property() -> Self {
    Self {
      enumerable: true,
      writable: true,
      configurable: true,
      allow_redefinition: false,
    }
  }

  /// Flags used for natives and other host-installed globals.
  pub fn new_non_enumerable() -> Self {
    Self {
      enumerable: false,
      ..Self::default_new_property()
    }
  }

  pub fn with_redefinition(mut self) -> Self {
    self.allow_redefinition = true;
    self
  }

  pub(crate) fn property_flags(&self) -> PropertyFlags {
    PropertyFlags {
      enumerable: self.enumerable,
      writable: self.writable,
      configurable: self.configurable,
    }
  }
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct PropertySlot {
  pub(crate) name: SymbolId,
  pub(crate) flags: PropertyFlags,
  pub(crate) value: Value,
}
