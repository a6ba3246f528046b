use crate::identifier::SymbolId;
use std::fmt;

/// Index of a heap cell.
///
/// The collector compacts the heap, so a `CellId` is only meaningful until the next operation that
/// may allocate. Anything that must survive an allocation has to be held through a
/// [`Handle`](crate::Handle) or a persistent root.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId(pub(crate) u32);

impl CellId {
  pub fn index(self) -> u32 {
    self.0
  }
}

/// A NaN-boxed JavaScript value.
///
/// Doubles are stored as their IEEE-754 bits. Every other kind lives in the negative quiet-NaN
/// space: the top 16 bits select the tag and the low 48 bits carry the payload. Any NaN produced by
/// arithmetic is canonicalised to [`CANONICAL_NAN`] so it can never alias a tag.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Value(u64);

const TAG_SHIFT: u32 = 48;
const PAYLOAD_MASK: u64 = (1 << TAG_SHIFT) - 1;
const CANONICAL_NAN: u64 = 0x7ff8_0000_0000_0000;

const FIRST_TAG: u64 = 0xfff9;
const TAG_SPECIAL: u64 = 0xfff9;
const TAG_BOOL: u64 = 0xfffa;
const TAG_NATIVE_INT: u64 = 0xfffb;
const TAG_SYMBOL: u64 = 0xfffc;
const TAG_STRING: u64 = 0xfffd;
const TAG_BIGINT: u64 = 0xfffe;
const TAG_OBJECT: u64 = 0xffff;

const SPECIAL_EMPTY: u64 = 0;
const SPECIAL_UNDEFINED: u64 = 1;
const SPECIAL_NULL: u64 = 2;

/// The decoded kind of a [`Value`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueTag {
  Empty,
  Undefined,
  Null,
  Boolean,
  Number,
  NativeInt,
  Symbol,
  String,
  BigInt,
  Object,
}

impl Value {
  const fn from_parts(tag: u64, payload: u64) -> Self {
    Value((tag << TAG_SHIFT) | (payload & PAYLOAD_MASK))
  }

  #[inline]
  fn tag_bits(self) -> u64 {
    self.0 >> TAG_SHIFT
  }

  #[inline]
  fn payload(self) -> u64 {
    self.0 & PAYLOAD_MASK
  }

  /// The "no value" marker used for uninitialised slots. Never observable from script.
  pub const fn empty() -> Self {
    Self::from_parts(TAG_SPECIAL, SPECIAL_EMPTY)
  }

  pub const fn undefined() -> Self {
    Self::from_parts(TAG_SPECIAL, SPECIAL_UNDEFINED)
  }

  pub const fn null() -> Self {
    Self::from_parts(TAG_SPECIAL, SPECIAL_NULL)
  }

  pub const fn nan() -> Self {
    Value(CANONICAL_NAN)
  }

  pub const fn from_bool(value: bool) -> Self {
    Self::from_parts(TAG_BOOL, value as u64)
  }

  pub fn from_number(value: f64) -> Self {
    if value.is_nan() {
      Self::nan()
    } else {
      Value(value.to_bits())
    }
  }

  pub fn from_native_int(value: i32) -> Self {
    Self::from_parts(TAG_NATIVE_INT, value as u32 as u64)
  }

  pub fn from_symbol(id: SymbolId) -> Self {
    Self::from_parts(TAG_SYMBOL, id.0 as u64)
  }

  pub(crate) fn from_string_cell(id: CellId) -> Self {
    Self::from_parts(TAG_STRING, id.0 as u64)
  }

  pub(crate) fn from_bigint_cell(id: CellId) -> Self {
    Self::from_parts(TAG_BIGINT, id.0 as u64)
  }

  pub(crate) fn from_object_cell(id: CellId) -> Self {
    Self::from_parts(TAG_OBJECT, id.0 as u64)
  }

  /// The raw 64-bit encoding.
  pub fn to_bits(self) -> u64 {
    self.0
  }

  pub fn tag(self) -> ValueTag {
    match self.tag_bits() {
      t if t < FIRST_TAG => ValueTag::Number,
      TAG_SPECIAL => match self.payload() {
        SPECIAL_UNDEFINED => ValueTag::Undefined,
        SPECIAL_NULL => ValueTag::Null,
        _ => ValueTag::Empty,
      },
      TAG_BOOL => ValueTag::Boolean,
      TAG_NATIVE_INT => ValueTag::NativeInt,
      TAG_SYMBOL => ValueTag::Symbol,
      TAG_STRING => ValueTag::String,
      TAG_BIGINT => ValueTag::BigInt,
      _ => ValueTag::Object,
    }
  }

  #[inline]
  pub fn is_empty(self) -> bool {
    self == Self::empty()
  }

  #[inline]
  pub fn is_undefined(self) -> bool {
    self == Self::undefined()
  }

  #[inline]
  pub fn is_null(self) -> bool {
    self == Self::null()
  }

  #[inline]
  pub fn is_bool(self) -> bool {
    self.tag_bits() == TAG_BOOL
  }

  #[inline]
  pub fn is_number(self) -> bool {
    self.tag_bits() < FIRST_TAG
  }

  #[inline]
  pub fn is_native_int(self) -> bool {
    self.tag_bits() == TAG_NATIVE_INT
  }

  #[inline]
  pub fn is_symbol(self) -> bool {
    self.tag_bits() == TAG_SYMBOL
  }

  #[inline]
  pub fn is_string(self) -> bool {
    self.tag_bits() == TAG_STRING
  }

  #[inline]
  pub fn is_bigint(self) -> bool {
    self.tag_bits() == TAG_BIGINT
  }

  #[inline]
  pub fn is_object(self) -> bool {
    self.tag_bits() == TAG_OBJECT
  }

  /// Whether the payload is a heap cell reference (string, bigint or object).
  #[inline]
  pub fn is_pointer(self) -> bool {
    matches!(self.tag_bits(), TAG_STRING | TAG_BIGINT | TAG_OBJECT)
  }

  // The raw accessors below reinterpret the payload without checking the tag. Callers must test
  // the matching predicate first.

  pub fn get_bool_unchecked(self) -> bool {
    debug_assert!(self.is_bool(), "get_bool_unchecked on {self:?}");
    self.payload() != 0
  }

  pub fn get_number_unchecked(self) -> f64 {
    debug_assert!(self.is_number(), "get_number_unchecked on {self:?}");
    f64::from_bits(self.0)
  }

  pub fn get_native_int_unchecked(self) -> i32 {
    debug_assert!(self.is_native_int(), "get_native_int_unchecked on {self:?}");
    self.payload() as u32 as i32
  }

  pub fn get_symbol_unchecked(self) -> SymbolId {
    debug_assert!(self.is_symbol(), "get_symbol_unchecked on {self:?}");
    SymbolId(self.payload() as u32)
  }

  pub fn get_cell_unchecked(self) -> CellId {
    debug_assert!(self.is_pointer(), "get_cell_unchecked on {self:?}");
    CellId(self.payload() as u32)
  }

  pub(crate) fn as_cell(self) -> Option<CellId> {
    self.is_pointer().then(|| CellId(self.payload() as u32))
  }

  pub(crate) fn as_string_cell(self) -> Option<CellId> {
    self.is_string().then(|| CellId(self.payload() as u32))
  }

  pub(crate) fn as_bigint_cell(self) -> Option<CellId> {
    self.is_bigint().then(|| CellId(self.payload() as u32))
  }

  pub(crate) fn as_object_cell(self) -> Option<CellId> {
    self.is_object().then(|| CellId(self.payload() as u32))
  }

  /// Returns this value with its cell reference replaced, keeping the tag.
  pub(crate) fn with_cell(self, id: CellId) -> Self {
    debug_assert!(self.is_pointer());
    Self::from_parts(self.tag_bits(), id.0 as u64)
  }
}

impl Default for Value {
  fn default() -> Self {
    Self::undefined()
  }
}

impl fmt::Debug for Value {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.tag() {
      ValueTag::Empty => f.write_str("Empty"),
      ValueTag::Undefined => f.write_str("Undefined"),
      ValueTag::Null => f.write_str("Null"),
      ValueTag::Boolean => write!(f, "Bool({})", self.payload() != 0),
      ValueTag::Number => write!(f, "Number({:?})", f64::from_bits(self.0)),
      ValueTag::NativeInt => write!(f, "NativeInt({})", self.payload() as u32 as i32),
      ValueTag::Symbol => write!(f, "Symbol({})", self.payload()),
      ValueTag::String => write!(f, "String(#{})", self.payload()),
      ValueTag::BigInt => write!(f, "BigInt(#{})", self.payload()),
      ValueTag::Object => write!(f, "Object(#{})", self.payload()),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn nan_is_canonicalised() {
    let weird_nan = f64::from_bits(0xfffd_0000_0000_0001);
    assert!(weird_nan.is_nan());
    let value = Value::from_number(weird_nan);
    assert!(value.is_number());
    assert!(!value.is_string());
    assert_eq!(value, Value::nan());
  }

  #[test]
  fn special_numbers_stay_numbers() {
    for n in [0.0, -0.0, f64::INFINITY, f64::NEG_INFINITY, f64::MAX, f64::MIN_POSITIVE] {
      let value = Value::from_number(n);
      assert!(value.is_number(), "{n}");
      assert_eq!(value.get_number_unchecked().to_bits(), n.to_bits());
    }
  }

  #[test]
  fn tags_are_disjoint() {
    let values = [
      Value::empty(),
      Value::undefined(),
      Value::null(),
      Value::from_bool(true),
      Value::from_number(1.5),
      Value::from_native_int(-7),
      Value::from_symbol(SymbolId(3)),
      Value::from_string_cell(CellId(3)),
      Value::from_bigint_cell(CellId(3)),
      Value::from_object_cell(CellId(3)),
    ];
    for (i, a) in values.iter().enumerate() {
      for (j, b) in values.iter().enumerate() {
        assert_eq!(i == j, a.tag() == b.tag(), "{a:?} vs {b:?}");
      }
    }
  }

  #[test]
  fn native_int_round_trips_sign() {
    assert_eq!(Value::from_native_int(-1).get_native_int_unchecked(), -1);
    assert_eq!(
      Value::from_native_int(i32::MIN).get_native_int_unchecked(),
      i32::MIN
    );
  }

  #[test]
  fn with_cell_keeps_tag() {
    let value = Value::from_bigint_cell(CellId(9)).with_cell(CellId(2));
    assert!(value.is_bigint());
    assert_eq!(value.get_cell_unchecked(), CellId(2));
  }
}
