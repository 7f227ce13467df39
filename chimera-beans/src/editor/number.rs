use super::PropertyEditor;
use crate::value::{PrimitiveKind, Value};
use anyhow::{anyhow, bail, Result};

/// 解析数字文本
///
/// 忽略所有空白；整数支持 `0x`、`0X`、`#` 前缀的十六进制写法，超出目标类型范围时报错。
pub fn parse_number(text: &str, kind: PrimitiveKind) -> Result<Value> {
    let trimmed: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    match kind {
        PrimitiveKind::Float => trimmed
            .parse::<f32>()
            .map(Value::Float)
            .map_err(|_| anyhow!("For input string: \"{}\"", text)),
        PrimitiveKind::Double => trimmed
            .parse::<f64>()
            .map(Value::Double)
            .map_err(|_| anyhow!("For input string: \"{}\"", text)),
        PrimitiveKind::Bool | PrimitiveKind::Char => bail!(
            "Cannot convert String [{}] to target class [{}]",
            text,
            kind.wrapper_name()
        ),
        integral => {
            let parsed =
                parse_integer(&trimmed).ok_or_else(|| anyhow!("For input string: \"{}\"", text))?;
            integer_value(parsed, integral).ok_or_else(|| {
                anyhow!(
                    "Value \"{}\" out of range for {}",
                    text,
                    integral.wrapper_name()
                )
            })
        }
    }
}

fn parse_integer(text: &str) -> Option<i128> {
    let (negative, unsigned) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let hex = unsigned
        .strip_prefix("0x")
        .or_else(|| unsigned.strip_prefix("0X"))
        .or_else(|| unsigned.strip_prefix('#'));
    let (radix, digits) = match hex {
        Some(digits) => (16, digits),
        None => (10, unsigned),
    };
    if digits.is_empty() || digits.starts_with(['+', '-']) {
        return None;
    }
    let magnitude = i128::from_str_radix(digits, radix).ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

fn integer_value(v: i128, kind: PrimitiveKind) -> Option<Value> {
    match kind {
        PrimitiveKind::Byte => i8::try_from(v).ok().map(Value::Byte),
        PrimitiveKind::Short => i16::try_from(v).ok().map(Value::Short),
        PrimitiveKind::Int => i32::try_from(v).ok().map(Value::Int),
        PrimitiveKind::Long => i64::try_from(v).ok().map(Value::Long),
        PrimitiveKind::Float => Some(Value::Float(v as f32)),
        PrimitiveKind::Double => Some(Value::Double(v as f64)),
        PrimitiveKind::Bool | PrimitiveKind::Char => None,
    }
}

/// 在数字类型之间转换，整数目标类型溢出时报错，浮点数转整数时截断小数部分
pub fn convert_number(value: &Value, kind: PrimitiveKind) -> Result<Value> {
    let overflow = || {
        anyhow!(
            "Could not convert number [{}] of type [{}] to target class [{}]: overflow",
            value,
            value.type_name(),
            kind.wrapper_name()
        )
    };
    if !value.is_number() || !kind.is_numeric() {
        bail!(
            "Could not convert number [{}] of type [{}] to unsupported target class [{}]",
            value,
            value.type_name(),
            kind.wrapper_name()
        );
    }
    if value.primitive_kind() == Some(kind) {
        return Ok(value.clone());
    }
    if let Some(v) = value.as_i128() {
        return integer_value(v, kind).ok_or_else(overflow);
    }
    let f = value.as_f64().ok_or_else(overflow)?;
    match kind {
        PrimitiveKind::Float => Ok(Value::Float(f as f32)),
        PrimitiveKind::Double => Ok(Value::Double(f)),
        _ => {
            if !f.is_finite() || f.abs() >= i128::MAX as f64 {
                return Err(overflow());
            }
            integer_value(f.trunc() as i128, kind).ok_or_else(overflow)
        }
    }
}

/// 数字编辑器
#[derive(Debug, Clone)]
pub struct CustomNumberEditor {
    kind: PrimitiveKind,
    allow_empty: bool,
    value: Value,
}

impl CustomNumberEditor {
    /// `allow_empty` 为 true 时空文本转换为 null
    pub fn new(kind: PrimitiveKind, allow_empty: bool) -> Self {
        Self {
            kind,
            allow_empty,
            value: Value::Null,
        }
    }
}

impl PropertyEditor for CustomNumberEditor {
    fn name(&self) -> &str {
        "CustomNumberEditor"
    }

    fn set_value(&mut self, value: Value) -> Result<()> {
        self.value = if value.is_number() {
            convert_number(&value, self.kind)?
        } else {
            value
        };
        Ok(())
    }

    fn value(&self) -> Value {
        self.value.clone()
    }

    fn set_as_text(&mut self, text: &str) -> Result<()> {
        if self.allow_empty && text.trim().is_empty() {
            self.value = Value::Null;
            return Ok(());
        }
        self.value = parse_number(text, self.kind)?;
        Ok(())
    }
}

/// 布尔编辑器
///
/// 默认识别 `true/on/yes/1` 与 `false/off/no/0`（不区分大小写），也可以指定自定义的真假文本。
#[derive(Debug, Clone)]
pub struct CustomBooleanEditor {
    allow_empty: bool,
    true_string: Option<String>,
    false_string: Option<String>,
    value: Value,
}

impl CustomBooleanEditor {
    pub fn new(allow_empty: bool) -> Self {
        Self {
            allow_empty,
            true_string: None,
            false_string: None,
            value: Value::Null,
        }
    }

    pub fn with_strings(
        mut self,
        true_string: impl Into<String>,
        false_string: impl Into<String>,
    ) -> Self {
        self.true_string = Some(true_string.into());
        self.false_string = Some(false_string.into());
        self
    }
}

impl PropertyEditor for CustomBooleanEditor {
    fn name(&self) -> &str {
        "CustomBooleanEditor"
    }

    fn set_value(&mut self, value: Value) -> Result<()> {
        self.value = value;
        Ok(())
    }

    fn value(&self) -> Value {
        self.value.clone()
    }

    fn set_as_text(&mut self, text: &str) -> Result<()> {
        let input = text.trim();
        let is = |s: &Option<String>| s.as_deref().map_or(false, |s| s.eq_ignore_ascii_case(input));
        let any_of = |words: &[&str]| words.iter().any(|w| w.eq_ignore_ascii_case(input));

        self.value = if self.allow_empty && input.is_empty() {
            Value::Null
        } else if is(&self.true_string) {
            Value::Bool(true)
        } else if is(&self.false_string) {
            Value::Bool(false)
        } else if self.true_string.is_none() && any_of(&["true", "on", "yes", "1"]) {
            Value::Bool(true)
        } else if self.false_string.is_none() && any_of(&["false", "off", "no", "0"]) {
            Value::Bool(false)
        } else {
            bail!("Invalid boolean value [{}]", text);
        };
        Ok(())
    }

    fn as_text(&self) -> Option<String> {
        match &self.value {
            Value::Bool(true) => Some(self.true_string.clone().unwrap_or_else(|| "true".into())),
            Value::Bool(false) => Some(self.false_string.clone().unwrap_or_else(|| "false".into())),
            _ => None,
        }
    }
}

/// 字符编辑器，支持 `\uXXXX` 写法
#[derive(Debug, Clone)]
pub struct CharacterEditor {
    allow_empty: bool,
    value: Value,
}

impl CharacterEditor {
    pub fn new(allow_empty: bool) -> Self {
        Self {
            allow_empty,
            value: Value::Null,
        }
    }
}

impl PropertyEditor for CharacterEditor {
    fn name(&self) -> &str {
        "CharacterEditor"
    }

    fn set_value(&mut self, value: Value) -> Result<()> {
        self.value = value;
        Ok(())
    }

    fn value(&self) -> Value {
        self.value.clone()
    }

    fn set_as_text(&mut self, text: &str) -> Result<()> {
        if self.allow_empty && text.is_empty() {
            self.value = Value::Null;
            return Ok(());
        }
        if let Some(code) = text.strip_prefix("\\u").filter(|code| code.len() == 4) {
            let c = u32::from_str_radix(code, 16)
                .ok()
                .and_then(char::from_u32)
                .ok_or_else(|| anyhow!("Invalid Unicode escape [{}]", text))?;
            self.value = Value::Char(c);
            return Ok(());
        }
        let mut chars = text.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => {
                self.value = Value::Char(c);
                Ok(())
            }
            _ => bail!(
                "String [{}] with length {} cannot be converted to char type: \
                 neither Unicode escape nor single character",
                text,
                text.chars().count()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_decimal_and_hex() {
        assert_eq!(parse_number(" 42 ", PrimitiveKind::Int).unwrap(), Value::Int(42));
        assert_eq!(parse_number("0x1F", PrimitiveKind::Long).unwrap(), Value::Long(31));
        assert_eq!(parse_number("-#10", PrimitiveKind::Short).unwrap(), Value::Short(-16));
        assert_eq!(parse_number("1.5", PrimitiveKind::Double).unwrap(), Value::Double(1.5));
        assert!(parse_number("abc", PrimitiveKind::Int).is_err());
        assert!(parse_number("128", PrimitiveKind::Byte).is_err());
    }

    #[test]
    fn test_convert_number_checks_overflow() {
        assert_eq!(
            convert_number(&Value::Long(7), PrimitiveKind::Int).unwrap(),
            Value::Int(7)
        );
        assert_eq!(
            convert_number(&Value::Double(3.9), PrimitiveKind::Int).unwrap(),
            Value::Int(3)
        );
        let err = convert_number(&Value::Long(i64::MAX), PrimitiveKind::Int).unwrap_err();
        assert!(err.to_string().contains("overflow"));
        assert!(convert_number(&Value::Double(f64::NAN), PrimitiveKind::Long).is_err());
    }

    #[test]
    fn test_number_editor_empty_text() {
        let mut boxed = CustomNumberEditor::new(PrimitiveKind::Int, true);
        boxed.set_as_text("  ").unwrap();
        assert_eq!(boxed.value(), Value::Null);

        let mut primitive = CustomNumberEditor::new(PrimitiveKind::Int, false);
        assert!(primitive.set_as_text("").is_err());
        primitive.set_value(Value::Short(5)).unwrap();
        assert_eq!(primitive.value(), Value::Int(5));
    }

    #[test]
    fn test_boolean_editor_is_lenient() {
        let mut editor = CustomBooleanEditor::new(false);
        for (text, expected) in [("on", true), ("YES", true), ("1", true), ("off", false), ("No", false)] {
            editor.set_as_text(text).unwrap();
            assert_eq!(editor.value(), Value::Bool(expected), "{}", text);
        }
        assert!(editor.set_as_text("maybe").is_err());

        let mut custom = CustomBooleanEditor::new(true).with_strings("enabled", "disabled");
        custom.set_as_text("Enabled").unwrap();
        assert_eq!(custom.value(), Value::Bool(true));
        assert!(custom.set_as_text("yes").is_err());
        custom.set_as_text("").unwrap();
        assert_eq!(custom.value(), Value::Null);
    }

    #[test]
    fn test_character_editor() {
        let mut editor = CharacterEditor::new(false);
        editor.set_as_text("\\u0041").unwrap();
        assert_eq!(editor.value(), Value::Char('A'));
        editor.set_as_text("中").unwrap();
        assert_eq!(editor.value(), Value::Char('中'));
        assert!(editor.set_as_text("ab").is_err());
        assert!(editor.set_as_text("").is_err());
    }
}
