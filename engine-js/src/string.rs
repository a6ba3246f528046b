use std::mem;

enum StringStorage {
  Ascii(Box<[u8]>),
  Utf16(Box<[u16]>),
}

/// A heap-allocated primitive string.
///
/// Strings whose code units all fit in 7 bits are stored one byte per unit; everything else is
/// stored as UTF-16 code units.
pub struct StringPrimitive {
  storage: StringStorage,
}

impl StringPrimitive {
  pub(crate) fn new(s: &str) -> Self {
    if s.is_ascii() {
      Self {
        storage: StringStorage::Ascii(s.as_bytes().into()),
      }
    } else {
      Self {
        storage: StringStorage::Utf16(s.encode_utf16().collect()),
      }
    }
  }

  pub(crate) fn from_utf16(units: &[u16]) -> Self {
    if units.iter().all(|&u| u < 0x80) {
      Self {
        storage: StringStorage::Ascii(units.iter().map(|&u| u as u8).collect()),
      }
    } else {
      Self {
        storage: StringStorage::Utf16(units.into()),
      }
    }
  }

  pub(crate) fn concat(a: StringView<'_>, b: StringView<'_>) -> Self {
    match (a, b) {
      (StringView::Ascii(a), StringView::Ascii(b)) => {
        let mut bytes = Vec::with_capacity(a.len() + b.len());
        bytes.extend_from_slice(a);
        bytes.extend_from_slice(b);
        Self {
          storage: StringStorage::Ascii(bytes.into()),
        }
      }
      _ => {
        let mut units = Vec::with_capacity(a.len() + b.len());
        units.extend(a.code_units());
        units.extend(b.code_units());
        Self {
          storage: StringStorage::Utf16(units.into()),
        }
      }
    }
  }

  pub fn view(&self) -> StringView<'_> {
    match &self.storage {
      StringStorage::Ascii(bytes) => StringView::Ascii(bytes),
      StringStorage::Utf16(units) => StringView::Utf16(units),
    }
  }

  pub(crate) fn payload_bytes(&self) -> usize {
    match &self.storage {
      StringStorage::Ascii(bytes) => bytes.len(),
      StringStorage::Utf16(units) => units.len() * mem::size_of::<u16>(),
    }
  }
}

/// A borrowed view of a string's contents.
///
/// The view borrows the runtime, so it cannot be held across anything that may collect garbage.
#[derive(Clone, Copy, Debug)]
pub enum StringView<'a> {
  Ascii(&'a [u8]),
  Utf16(&'a [u16]),
}

impl<'a> StringView<'a> {
  pub fn is_ascii(&self) -> bool {
    matches!(self, StringView::Ascii(_))
  }

  /// Length in UTF-16 code units.
  pub fn len(&self) -> usize {
    match self {
      StringView::Ascii(bytes) => bytes.len(),
      StringView::Utf16(units) => units.len(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn code_unit(&self, index: usize) -> Option<u16> {
    match self {
      StringView::Ascii(bytes) => bytes.get(index).map(|&b| u16::from(b)),
      StringView::Utf16(units) => units.get(index).copied(),
    }
  }

  pub fn code_units(&self) -> CodeUnits<'a> {
    CodeUnits {
      view: *self,
      next: 0,
    }
  }

  pub fn to_utf16(&self) -> Vec<u16> {
    self.code_units().collect()
  }

  pub fn to_string_lossy(&self) -> String {
    match self {
      StringView::Ascii(bytes) => String::from_utf8_lossy(bytes).into_owned(),
      StringView::Utf16(units) => String::from_utf16_lossy(units),
    }
  }
}

impl PartialEq for StringView<'_> {
  fn eq(&self, other: &Self) -> bool {
    self.len() == other.len() && self.code_units().eq(other.code_units())
  }
}

impl PartialEq<str> for StringView<'_> {
  fn eq(&self, other: &str) -> bool {
    self.code_units().eq(other.encode_utf16())
  }
}

impl PartialEq<&str> for StringView<'_> {
  fn eq(&self, other: &&str) -> bool {
    <Self as PartialEq<str>>::eq(self, other)
  }
}

/// Iterator over the UTF-16 code units of a [`StringView`].
#[derive(Clone, Debug)]
pub struct CodeUnits<'a> {
  view: StringView<'a>,
  next: usize,
}

impl Iterator for CodeUnits<'_> {
  type Item = u16;

  fn next(&mut self) -> Option<u16> {
    let unit = self.view.code_unit(self.next)?;
    self.next += 1;
    Some(unit)
  }

  fn size_hint(&self) -> (usize, Option<usize>) {
    let remaining = self.view.len().saturating_sub(self.next);
    (remaining, Some(remaining))
  }
}

impl ExactSizeIterator for CodeUnits<'_> {}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn ascii_and_utf16_views_compare_by_code_units() {
    let ascii = StringPrimitive::new("hello");
    let wide: Vec<u16> = "hello".encode_utf16().collect();
    let wide = StringPrimitive {
      storage: StringStorage::Utf16(wide.into()),
    };
    assert!(ascii.view().is_ascii());
    assert!(!wide.view().is_ascii());
    assert_eq!(ascii.view(), wide.view());
    assert_eq!(ascii.view(), "hello");
  }

  #[test]
  fn non_ascii_uses_utf16_storage() {
    let s = StringPrimitive::new("héllo 😀");
    let view = s.view();
    assert!(!view.is_ascii());
    assert_eq!(view.len(), "héllo 😀".encode_utf16().count());
    assert_eq!(view.to_string_lossy(), "héllo 😀");
  }

  #[test]
  fn utf16_input_narrows_to_ascii_when_possible() {
    let units: Vec<u16> = "abc".encode_utf16().collect();
    assert!(StringPrimitive::from_utf16(&units).view().is_ascii());
  }

  #[test]
  fn concat_widens_when_needed() {
    let a = StringPrimitive::new("a");
    let b = StringPrimitive::new("é");
    let joined = StringPrimitive::concat(a.view(), b.view());
    assert!(!joined.view().is_ascii());
    assert_eq!(joined.view(), "aé");
  }
}
