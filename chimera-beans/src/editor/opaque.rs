use super::PropertyEditor;
use crate::value::{OpaqueType, OpaqueValue, Value};
use anyhow::{anyhow, bail, Context, Result};
use std::path::PathBuf;

macro_rules! value_accessors {
    () => {
        fn set_value(&mut self, value: Value) -> Result<()> {
            self.value = value;
            Ok(())
        }

        fn value(&self) -> Value {
            self.value.clone()
        }
    };
}

/// 文件系统路径，支持 `file:` 前缀
#[derive(Debug, Clone, Default)]
pub struct PathEditor {
    value: Value,
}

impl PropertyEditor for PathEditor {
    fn name(&self) -> &str {
        "PathEditor"
    }

    value_accessors!();

    fn set_as_text(&mut self, text: &str) -> Result<()> {
        let raw = text
            .strip_prefix("file://")
            .or_else(|| text.strip_prefix("file:"))
            .unwrap_or(text);
        let path = PathBuf::from(raw);
        let display = path.display().to_string();
        self.value = Value::Opaque(OpaqueValue::new(OpaqueType::PATH, path, display));
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct UrlEditor {
    value: Value,
}

impl PropertyEditor for UrlEditor {
    fn name(&self) -> &str {
        "UrlEditor"
    }

    value_accessors!();

    fn set_as_text(&mut self, text: &str) -> Result<()> {
        let url = url::Url::parse(text.trim())
            .with_context(|| format!("Malformed URL [{}]", text))?;
        let display = url.to_string();
        self.value = Value::Opaque(OpaqueValue::new(OpaqueType::URL, url, display));
        Ok(())
    }
}

/// 区域设置，`en-US` 与 `en_US` 都规范化为 `en_US`
#[derive(Debug, Clone, Default)]
pub struct LocaleEditor {
    value: Value,
}

impl LocaleEditor {
    fn parse(text: &str) -> Result<Option<String>> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        let normalized = trimmed.replace(['-', ' '], "_");
        let mut parts = normalized.split('_');
        let language = parts.next().unwrap_or_default().to_lowercase();
        let country = parts.next().unwrap_or_default().to_uppercase();
        let variant: Vec<&str> = parts.collect();

        let valid = |part: &str| part.chars().all(|c| c.is_ascii_alphanumeric());
        if !valid(&language) || !valid(&country) || !variant.iter().all(|p| valid(p)) {
            bail!("Invalid locale format: [{}]", text);
        }

        let mut locale = language;
        if !country.is_empty() || !variant.is_empty() {
            locale.push('_');
            locale.push_str(&country);
        }
        if !variant.is_empty() {
            locale.push('_');
            locale.push_str(&variant.join("_"));
        }
        Ok(Some(locale))
    }
}

impl PropertyEditor for LocaleEditor {
    fn name(&self) -> &str {
        "LocaleEditor"
    }

    value_accessors!();

    fn set_as_text(&mut self, text: &str) -> Result<()> {
        self.value = match Self::parse(text)? {
            Some(locale) => {
                Value::Opaque(OpaqueValue::new(OpaqueType::LOCALE, locale.clone(), locale))
            }
            None => Value::Null,
        };
        Ok(())
    }
}

/// 正则表达式
#[derive(Debug, Clone, Default)]
pub struct PatternEditor {
    case_insensitive: bool,
    value: Value,
}

impl PatternEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn case_insensitive(mut self, enabled: bool) -> Self {
        self.case_insensitive = enabled;
        self
    }
}

impl PropertyEditor for PatternEditor {
    fn name(&self) -> &str {
        "PatternEditor"
    }

    value_accessors!();

    fn set_as_text(&mut self, text: &str) -> Result<()> {
        let regex = regex::RegexBuilder::new(text)
            .case_insensitive(self.case_insensitive)
            .build()
            .with_context(|| format!("Invalid regular expression [{}]", text))?;
        self.value = Value::Opaque(OpaqueValue::new(OpaqueType::PATTERN, regex, text));
        Ok(())
    }
}

const CHARSETS: &[(&str, &[&str])] = &[
    ("UTF-8", &["utf-8", "utf8"]),
    ("US-ASCII", &["us-ascii", "ascii"]),
    ("ISO-8859-1", &["iso-8859-1", "iso8859_1", "latin1"]),
    ("UTF-16", &["utf-16", "utf16"]),
    ("UTF-16BE", &["utf-16be"]),
    ("UTF-16LE", &["utf-16le"]),
];

/// 字符集名称，别名规范化为标准名称
#[derive(Debug, Clone, Default)]
pub struct CharsetEditor {
    value: Value,
}

impl PropertyEditor for CharsetEditor {
    fn name(&self) -> &str {
        "CharsetEditor"
    }

    value_accessors!();

    fn set_as_text(&mut self, text: &str) -> Result<()> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            self.value = Value::Null;
            return Ok(());
        }
        let lower = trimmed.to_lowercase();
        let canonical = CHARSETS
            .iter()
            .find(|(_, aliases)| aliases.contains(&lower.as_str()))
            .map(|(name, _)| *name)
            .ok_or_else(|| anyhow!("Unsupported charset [{}]", trimmed))?;
        self.value = Value::Opaque(OpaqueValue::new(OpaqueType::CHARSET, canonical, canonical));
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct UuidEditor {
    value: Value,
}

impl PropertyEditor for UuidEditor {
    fn name(&self) -> &str {
        "UuidEditor"
    }

    value_accessors!();

    fn set_as_text(&mut self, text: &str) -> Result<()> {
        let trimmed = text.trim();
        self.value = if trimmed.is_empty() {
            Value::Null
        } else {
            let uuid = uuid::Uuid::parse_str(trimmed)
                .with_context(|| format!("Invalid UUID string: {}", trimmed))?;
            Value::Opaque(OpaqueValue::new(OpaqueType::UUID, uuid, uuid.to_string()))
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opaque(value: Value) -> OpaqueValue {
        match value {
            Value::Opaque(o) => o,
            other => panic!("expected opaque value, got {:?}", other),
        }
    }

    #[test]
    fn test_locale_normalization() {
        let mut editor = LocaleEditor::default();
        editor.set_as_text("en-us").unwrap();
        assert_eq!(opaque(editor.value()).text(), "en_US");
        editor.set_as_text("de").unwrap();
        assert_eq!(opaque(editor.value()).text(), "de");
        editor.set_as_text(" ").unwrap();
        assert_eq!(editor.value(), Value::Null);
        assert!(editor.set_as_text("en/US").is_err());
    }

    #[test]
    fn test_url_and_path() {
        let mut url = UrlEditor::default();
        url.set_as_text("https://example.com/a").unwrap();
        let parsed = opaque(url.value());
        assert_eq!(parsed.opaque_type(), OpaqueType::URL);
        assert_eq!(parsed.downcast_ref::<url::Url>().unwrap().host_str(), Some("example.com"));
        assert!(url.set_as_text("not a url").is_err());

        let mut path = PathEditor::default();
        path.set_as_text("file:/tmp/data").unwrap();
        let p = opaque(path.value());
        assert_eq!(p.downcast_ref::<PathBuf>().unwrap(), &PathBuf::from("/tmp/data"));
    }

    #[test]
    fn test_pattern_charset_uuid() {
        let mut pattern = PatternEditor::new().case_insensitive(true);
        pattern.set_as_text("^ab+$").unwrap();
        let regex = opaque(pattern.value());
        assert!(regex.downcast_ref::<regex::Regex>().unwrap().is_match("ABB"));
        assert!(pattern.set_as_text("(").is_err());

        let mut charset = CharsetEditor::default();
        charset.set_as_text("utf8").unwrap();
        assert_eq!(opaque(charset.value()).text(), "UTF-8");
        assert!(charset.set_as_text("klingon").is_err());

        let mut uuid = UuidEditor::default();
        uuid.set_as_text("").unwrap();
        assert_eq!(uuid.value(), Value::Null);
        let id = uuid::Uuid::new_v4();
        uuid.set_as_text(&id.to_string()).unwrap();
        assert_eq!(opaque(uuid.value()).downcast_ref::<uuid::Uuid>(), Some(&id));
    }
}
