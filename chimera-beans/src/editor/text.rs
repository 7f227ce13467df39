use super::PropertyEditor;
use crate::value::{PrimitiveKind, Value, ValueType};
use anyhow::Result;
use std::fmt;
use std::sync::Arc;

/// 逗号分隔文本与字符串数组之间的编辑器
#[derive(Debug, Clone)]
pub struct StringArrayPropertyEditor {
    separator: String,
    chars_to_delete: Option<String>,
    empty_array_as_null: bool,
    trim_values: bool,
    value: Value,
}

impl StringArrayPropertyEditor {
    pub const DEFAULT_SEPARATOR: &'static str = ",";

    pub fn new() -> Self {
        Self {
            separator: Self::DEFAULT_SEPARATOR.to_string(),
            chars_to_delete: None,
            empty_array_as_null: false,
            trim_values: true,
            value: Value::Null,
        }
    }

    pub fn separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    /// 每个元素中需要删除的字符，例如换行符
    pub fn chars_to_delete(mut self, chars: impl Into<String>) -> Self {
        self.chars_to_delete = Some(chars.into());
        self
    }

    pub fn empty_array_as_null(mut self, enabled: bool) -> Self {
        self.empty_array_as_null = enabled;
        self
    }

    pub fn trim_values(mut self, enabled: bool) -> Self {
        self.trim_values = enabled;
        self
    }

    fn split(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }
        let parts: Vec<&str> = if self.separator.is_empty() {
            text.char_indices()
                .map(|(i, c)| &text[i..i + c.len_utf8()])
                .collect()
        } else {
            text.split(self.separator.as_str()).collect()
        };
        parts
            .into_iter()
            .map(|part| match &self.chars_to_delete {
                Some(chars) => part.chars().filter(|c| !chars.contains(*c)).collect(),
                None => part.to_string(),
            })
            .collect()
    }
}

impl Default for StringArrayPropertyEditor {
    fn default() -> Self {
        Self::new()
    }
}

impl PropertyEditor for StringArrayPropertyEditor {
    fn name(&self) -> &str {
        "StringArrayPropertyEditor"
    }

    fn set_value(&mut self, value: Value) -> Result<()> {
        self.value = value;
        Ok(())
    }

    fn value(&self) -> Value {
        self.value.clone()
    }

    fn set_as_text(&mut self, text: &str) -> Result<()> {
        let mut items = self.split(text);
        if self.empty_array_as_null && items.is_empty() {
            self.value = Value::Null;
            return Ok(());
        }
        if self.trim_values {
            items = items.into_iter().map(|s| s.trim().to_string()).collect();
        }
        self.value = Value::array(ValueType::String, items.into_iter().map(Value::Str).collect());
        Ok(())
    }

    fn as_text(&self) -> Option<String> {
        match &self.value {
            Value::Array(array) => Some(
                array
                    .read()
                    .items
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(&self.separator),
            ),
            _ => None,
        }
    }
}

/// 去除首尾空白的字符串编辑器，需要显式注册
#[derive(Debug, Clone)]
pub struct StringTrimmerEditor {
    chars_to_delete: Option<String>,
    empty_as_null: bool,
    value: Value,
}

impl StringTrimmerEditor {
    /// `empty_as_null` 为 true 时空字符串转换为 null
    pub fn new(empty_as_null: bool) -> Self {
        Self {
            chars_to_delete: None,
            empty_as_null,
            value: Value::Null,
        }
    }

    pub fn chars_to_delete(mut self, chars: impl Into<String>) -> Self {
        self.chars_to_delete = Some(chars.into());
        self
    }
}

impl PropertyEditor for StringTrimmerEditor {
    fn name(&self) -> &str {
        "StringTrimmerEditor"
    }

    fn set_value(&mut self, value: Value) -> Result<()> {
        self.value = value;
        Ok(())
    }

    fn value(&self) -> Value {
        self.value.clone()
    }

    fn set_as_text(&mut self, text: &str) -> Result<()> {
        let mut value = text.trim().to_string();
        if let Some(chars) = &self.chars_to_delete {
            value.retain(|c| !chars.contains(c));
        }
        self.value = if self.empty_as_null && value.is_empty() {
            Value::Null
        } else {
            Value::Str(value)
        };
        Ok(())
    }
}

type ParseFn = dyn Fn(&str) -> Result<Value> + Send + Sync;

/// 用闭包实现文本解析的编辑器，用于注册自定义转换
#[derive(Clone)]
pub struct TextEditor {
    name: String,
    parse: Arc<ParseFn>,
    value: Value,
}

impl TextEditor {
    pub fn new(
        name: impl Into<String>,
        parse: impl Fn(&str) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            parse: Arc::new(parse),
            value: Value::Null,
        }
    }
}

impl fmt::Debug for TextEditor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextEditor").field("name", &self.name).finish()
    }
}

impl PropertyEditor for TextEditor {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_value(&mut self, value: Value) -> Result<()> {
        self.value = value;
        Ok(())
    }

    fn value(&self) -> Value {
        self.value.clone()
    }

    fn set_as_text(&mut self, text: &str) -> Result<()> {
        self.value = (self.parse)(text)?;
        Ok(())
    }
}

/// 文本按字节转换为 `byte[]`
#[derive(Debug, Clone, Default)]
pub struct ByteArrayPropertyEditor {
    value: Value,
}

impl PropertyEditor for ByteArrayPropertyEditor {
    fn name(&self) -> &str {
        "ByteArrayPropertyEditor"
    }

    fn set_value(&mut self, value: Value) -> Result<()> {
        self.value = value;
        Ok(())
    }

    fn value(&self) -> Value {
        self.value.clone()
    }

    fn set_as_text(&mut self, text: &str) -> Result<()> {
        self.value = Value::array(
            ValueType::Primitive(PrimitiveKind::Byte),
            text.bytes().map(|b| Value::Byte(b as i8)).collect(),
        );
        Ok(())
    }

    fn as_text(&self) -> Option<String> {
        let Value::Array(array) = &self.value else {
            return None;
        };
        let bytes: Vec<u8> = array
            .read()
            .items
            .iter()
            .filter_map(|v| match v {
                Value::Byte(b) => Some(*b as u8),
                _ => None,
            })
            .collect();
        Some(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// 文本按字符转换为 `char[]`
#[derive(Debug, Clone, Default)]
pub struct CharArrayPropertyEditor {
    value: Value,
}

impl PropertyEditor for CharArrayPropertyEditor {
    fn name(&self) -> &str {
        "CharArrayPropertyEditor"
    }

    fn set_value(&mut self, value: Value) -> Result<()> {
        self.value = value;
        Ok(())
    }

    fn value(&self) -> Value {
        self.value.clone()
    }

    fn set_as_text(&mut self, text: &str) -> Result<()> {
        self.value = Value::array(
            ValueType::Primitive(PrimitiveKind::Char),
            text.chars().map(Value::Char).collect(),
        );
        Ok(())
    }

    fn as_text(&self) -> Option<String> {
        let Value::Array(array) = &self.value else {
            return None;
        };
        let text = array
            .read()
            .items
            .iter()
            .filter_map(|v| match v {
                Value::Char(c) => Some(*c),
                _ => None,
            })
            .collect();
        Some(text)
    }
}
