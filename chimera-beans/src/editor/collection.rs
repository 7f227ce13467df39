use super::PropertyEditor;
use crate::value::{Value, ValueType};
use anyhow::Result;

/// 集合编辑器的目标类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKind {
    List,
    Set,
}

/// 把数组、其他集合或单个值包装为目标集合
///
/// 已经是目标集合类型的值原样保留，元素类型转换由转换器在之后完成。
#[derive(Debug, Clone)]
pub struct CustomCollectionEditor {
    kind: CollectionKind,
    null_as_empty_collection: bool,
    value: Value,
}

impl CustomCollectionEditor {
    pub fn new(kind: CollectionKind) -> Self {
        Self {
            kind,
            null_as_empty_collection: false,
            value: Value::Null,
        }
    }

    /// null 转换为空集合而不是保留 null
    pub fn null_as_empty_collection(mut self, enabled: bool) -> Self {
        self.null_as_empty_collection = enabled;
        self
    }

    fn create(&self, element_type: ValueType, items: Vec<Value>) -> Value {
        match self.kind {
            CollectionKind::List => Value::list(element_type, items),
            CollectionKind::Set => Value::set(element_type, items),
        }
    }
}

impl PropertyEditor for CustomCollectionEditor {
    fn name(&self) -> &str {
        "CustomCollectionEditor"
    }

    fn set_value(&mut self, value: Value) -> Result<()> {
        self.value = match value {
            Value::Null if self.null_as_empty_collection => self.create(ValueType::Any, Vec::new()),
            Value::Null => Value::Null,
            Value::List(_) if self.kind == CollectionKind::List => value,
            Value::Set(_) if self.kind == CollectionKind::Set => value,
            Value::Array(array) => {
                let array = array.read();
                self.create(array.element_type.clone(), array.items.clone())
            }
            Value::List(list) => {
                let list = list.read();
                self.create(list.element_type.clone(), list.items.clone())
            }
            Value::Set(set) => {
                let set = set.read();
                self.create(set.element_type.clone(), set.items.iter().cloned().collect())
            }
            single => self.create(ValueType::Any, vec![single]),
        };
        Ok(())
    }

    fn value(&self) -> Value {
        self.value.clone()
    }

    fn set_as_text(&mut self, text: &str) -> Result<()> {
        self.set_value(Value::from(text))
    }

    fn as_text(&self) -> Option<String> {
        None
    }
}

/// 把 `key=value` 形式的多行文本解析为字符串映射
///
/// 空行和以 `#`、`!` 开头的行被忽略，`:` 也可以作为分隔符。
#[derive(Debug, Clone, Default)]
pub struct PropertiesEditor {
    value: Value,
}

impl PropertiesEditor {
    fn parse(text: &str) -> Vec<(Value, Value)> {
        text.lines()
            .map(str::trim_start)
            .filter(|line| !line.is_empty() && !line.starts_with(['#', '!']))
            .map(|line| match line.find(['=', ':']) {
                Some(index) => (line[..index].trim(), line[index + 1..].trim()),
                None => (line.trim(), ""),
            })
            .map(|(key, value)| (Value::from(key), Value::from(value)))
            .collect()
    }
}

impl PropertyEditor for PropertiesEditor {
    fn name(&self) -> &str {
        "PropertiesEditor"
    }

    fn set_value(&mut self, value: Value) -> Result<()> {
        self.value = value;
        Ok(())
    }

    fn value(&self) -> Value {
        self.value.clone()
    }

    fn set_as_text(&mut self, text: &str) -> Result<()> {
        self.value = Value::map(ValueType::String, ValueType::String, Self::parse(text));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_collection_editor_wraps_values() {
        let mut editor = CustomCollectionEditor::new(CollectionKind::List);
        editor
            .set_value(Value::array(ValueType::String, vec!["a".into(), "b".into()]))
            .unwrap();
        assert_eq!(
            editor.value(),
            Value::list(ValueType::String, vec!["a".into(), "b".into()])
        );

        editor.set_as_text("single").unwrap();
        assert_eq!(editor.value(), Value::list(ValueType::Any, vec!["single".into()]));

        editor.set_value(Value::Null).unwrap();
        assert_eq!(editor.value(), Value::Null);
    }

    #[test]
    fn test_collection_editor_keeps_matching_instance() {
        let original = Value::set(ValueType::String, vec![Value::from("x")]);
        let mut editor = CustomCollectionEditor::new(CollectionKind::Set);
        editor.set_value(original.clone()).unwrap();
        assert!(editor.value().same_instance(&original));

        let mut lists = CustomCollectionEditor::new(CollectionKind::List).null_as_empty_collection(true);
        lists.set_value(original).unwrap();
        assert_eq!(lists.value(), Value::list(ValueType::String, vec!["x".into()]));
        lists.set_value(Value::Null).unwrap();
        assert_eq!(lists.value(), Value::list(ValueType::Any, Vec::new()));
    }

    #[test]
    fn test_properties_parsing() {
        let mut editor = PropertiesEditor::default();
        editor
            .set_as_text("# comment\nhost = localhost\nport:8080\n\n! other\nflag")
            .unwrap();
        assert_eq!(
            editor.value(),
            Value::map(
                ValueType::String,
                ValueType::String,
                vec![
                    ("host".into(), "localhost".into()),
                    ("port".into(), "8080".into()),
                    ("flag".into(), "".into()),
                ]
            )
        );
    }
}
