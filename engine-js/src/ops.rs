use crate::error::CallResult;
use crate::identifier::SymbolId;
use crate::object::ObjectKind;
use crate::runtime::Runtime;
use crate::value::Value;
use crate::value::ValueTag;

impl Runtime {
  /// `ToNumber` for the values this engine supports. Objects have no `valueOf` and convert to
  /// `NaN`.
  pub fn to_number(&mut self, value: Value) -> CallResult<f64> {
    Ok(match value.tag() {
      ValueTag::Empty | ValueTag::Undefined => f64::NAN,
      ValueTag::Null => 0.0,
      ValueTag::Boolean => {
        if value.get_bool_unchecked() {
          1.0
        } else {
          0.0
        }
      }
      ValueTag::Number => value.get_number_unchecked(),
      ValueTag::NativeInt => value.get_native_int_unchecked() as f64,
      ValueTag::String => self
        .string_view_of(value)
        .map(|view| string_to_number(&view.to_string_lossy()))
        .unwrap_or(f64::NAN),
      ValueTag::Symbol => {
        return Err(self.raise_type_error("Cannot convert a Symbol value to a number"))
      }
      ValueTag::BigInt => {
        return Err(self.raise_type_error("Cannot convert a BigInt value to a number"))
      }
      ValueTag::Object => f64::NAN,
    })
  }

  pub fn to_boolean(&self, value: Value) -> bool {
    match value.tag() {
      ValueTag::Empty | ValueTag::Undefined | ValueTag::Null => false,
      ValueTag::Boolean => value.get_bool_unchecked(),
      ValueTag::Number => {
        let n = value.get_number_unchecked();
        !(n == 0.0 || n.is_nan())
      }
      ValueTag::NativeInt => value.get_native_int_unchecked() != 0,
      ValueTag::String => self.string_view_of(value).is_some_and(|v| !v.is_empty()),
      ValueTag::BigInt => self
        .bigint_of(value)
        .is_some_and(|n| n.sign() != num_bigint::Sign::NoSign),
      ValueTag::Symbol | ValueTag::Object => true,
    }
  }

  pub fn type_of(&self, value: Value) -> &'static str {
    match value.tag() {
      ValueTag::Empty | ValueTag::Undefined => "undefined",
      ValueTag::Null => "object",
      ValueTag::Boolean => "boolean",
      ValueTag::Number | ValueTag::NativeInt => "number",
      ValueTag::String => "string",
      ValueTag::Symbol => "symbol",
      ValueTag::BigInt => "bigint",
      ValueTag::Object => {
        if self.is_callable(value) {
          "function"
        } else {
          "object"
        }
      }
    }
  }

  /// The `===` operator.
  pub fn strict_equals(&self, a: Value, b: Value) -> bool {
    let numeric = |v: Value| match v.tag() {
      ValueTag::Number => Some(v.get_number_unchecked()),
      ValueTag::NativeInt => Some(v.get_native_int_unchecked() as f64),
      _ => None,
    };
    if let (Some(x), Some(y)) = (numeric(a), numeric(b)) {
      return x == y;
    }
    match (a.tag(), b.tag()) {
      (ValueTag::String, ValueTag::String) => self.string_view_of(a) == self.string_view_of(b),
      (ValueTag::BigInt, ValueTag::BigInt) => self.bigint_of(a) == self.bigint_of(b),
      _ => a == b,
    }
  }

  /// Human-readable rendering used by `String(value)`-like contexts and diagnostics.
  pub fn to_display_string(&self, value: Value) -> String {
    match value.tag() {
      ValueTag::Empty => "<empty>".to_string(),
      ValueTag::Undefined => "undefined".to_string(),
      ValueTag::Null => "null".to_string(),
      ValueTag::Boolean => value.get_bool_unchecked().to_string(),
      ValueTag::Number => format_number(value.get_number_unchecked()),
      ValueTag::NativeInt => value.get_native_int_unchecked().to_string(),
      ValueTag::String => self
        .string_view_of(value)
        .map(|v| v.to_string_lossy())
        .unwrap_or_default(),
      ValueTag::Symbol => format!(
        "Symbol({})",
        self.symbol_display(value.get_symbol_unchecked())
      ),
      ValueTag::BigInt => self
        .bigint_of(value)
        .map(ToString::to_string)
        .unwrap_or_default(),
      ValueTag::Object => self.describe_object(value),
    }
  }

  fn describe_object(&self, value: Value) -> String {
    let Some(object) = self.object_of(value) else {
      return "[object Object]".to_string();
    };
    match &object.kind {
      ObjectKind::NativeFunction(data) => {
        format!(
          "function {}() {{ [native code] }}",
          self.symbol_display(data.name)
        )
      }
      ObjectKind::Error => {
        let field = |key: SymbolId| {
          self
            .lookup(value, key)
            .filter(|v| v.is_string())
            .map(|v| self.to_display_string(v))
            .unwrap_or_default()
        };
        let name = field(self.predefined.name);
        let message = field(self.predefined.message);
        let name = if name.is_empty() {
          "Error".to_string()
        } else {
          name
        };
        if message.is_empty() {
          name
        } else {
          format!("{name}: {message}")
        }
      }
      ObjectKind::Ordinary => "[object Object]".to_string(),
    }
  }
}

/// `ToNumber` applied to a string.
pub(crate) fn string_to_number(s: &str) -> f64 {
  let trimmed = s.trim();
  if trimmed.is_empty() {
    return 0.0;
  }
  match trimmed {
    "Infinity" | "+Infinity" => return f64::INFINITY,
    "-Infinity" => return f64::NEG_INFINITY,
    _ => {}
  }
  if let Some(hex) = trimmed
    .strip_prefix("0x")
    .or_else(|| trimmed.strip_prefix("0X"))
  {
    return u64::from_str_radix(hex, 16)
      .map(|n| n as f64)
      .unwrap_or(f64::NAN);
  }
  // Rust also accepts spellings like "inf" and "NaN", which are not numeric literals in JS.
  if trimmed
    .chars()
    .any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E')
  {
    return f64::NAN;
  }
  trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

/// `Number::toString` for radix 10.
pub fn format_number(n: f64) -> String {
  if n.is_nan() {
    return "NaN".to_string();
  }
  if n.is_infinite() {
    return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
  }
  if n == 0.0 {
    return "0".to_string();
  }
  let abs = n.abs();
  if (1e-6..1e21).contains(&abs) {
    return format!("{n}");
  }
  let formatted = format!("{n:e}");
  match formatted.split_once('e') {
    Some((mantissa, exponent)) if !exponent.starts_with('-') => format!("{mantissa}e+{exponent}"),
    _ => formatted,
  }
}
