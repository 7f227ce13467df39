//! 可合并的托管集合
//!
//! 子定义中的集合可以与父定义中同名属性的集合合并，而不是直接覆盖。

use crate::value::{ListValue, MapValue, SetValue, Shared, Value, ValueType};
use anyhow::{anyhow, bail};
use indexmap::{IndexMap, IndexSet};
use std::sync::Arc;

/// 可与父值合并的值
pub trait Mergeable {
    /// 是否开启合并
    fn is_merge_enabled(&self) -> bool;

    /// 与父值合并，父值的元素在前，当前值的元素覆盖父值中的同名项
    fn merge(&self, parent: &Value) -> anyhow::Result<Value>;
}

fn ensure_merge_enabled(enabled: bool) -> anyhow::Result<()> {
    if !enabled {
        bail!("Not allowed to merge when the 'merge_enabled' property is set to 'false'");
    }
    Ok(())
}

/// 托管列表
#[derive(Debug, Clone, PartialEq)]
pub struct ManagedList {
    pub element_type: ValueType,
    pub items: Vec<Value>,
    pub merge_enabled: bool,
}

impl ManagedList {
    pub fn new(element_type: ValueType, items: Vec<Value>) -> Self {
        Self {
            element_type,
            items,
            merge_enabled: false,
        }
    }

    pub fn merge_enabled(mut self, enabled: bool) -> Self {
        self.merge_enabled = enabled;
        self
    }
}

/// 托管集合
#[derive(Debug, Clone, PartialEq)]
pub struct ManagedSet {
    pub element_type: ValueType,
    pub items: IndexSet<Value>,
    pub merge_enabled: bool,
}

impl ManagedSet {
    pub fn new(element_type: ValueType, items: impl IntoIterator<Item = Value>) -> Self {
        Self {
            element_type,
            items: items.into_iter().collect(),
            merge_enabled: false,
        }
    }

    pub fn merge_enabled(mut self, enabled: bool) -> Self {
        self.merge_enabled = enabled;
        self
    }
}

/// 托管映射
#[derive(Debug, Clone, PartialEq)]
pub struct ManagedMap {
    pub key_type: ValueType,
    pub value_type: ValueType,
    pub entries: IndexMap<Value, Value>,
    pub merge_enabled: bool,
}

impl ManagedMap {
    pub fn new(
        key_type: ValueType,
        value_type: ValueType,
        entries: impl IntoIterator<Item = (Value, Value)>,
    ) -> Self {
        Self {
            key_type,
            value_type,
            entries: entries.into_iter().collect(),
            merge_enabled: false,
        }
    }

    pub fn merge_enabled(mut self, enabled: bool) -> Self {
        self.merge_enabled = enabled;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ManagedValue {
    List(ManagedList),
    Set(ManagedSet),
    Map(ManagedMap),
}

impl ManagedValue {
    pub fn len(&self) -> usize {
        match self {
            ManagedValue::List(l) => l.items.len(),
            ManagedValue::Set(s) => s.items.len(),
            ManagedValue::Map(m) => m.entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_value(self) -> Value {
        Value::Managed(Arc::new(self))
    }

    /// 物化为普通容器
    pub fn materialize(&self) -> Value {
        match self {
            ManagedValue::List(l) => Value::List(Shared::new(ListValue::with_items(
                l.element_type.clone(),
                l.items.clone(),
            ))),
            ManagedValue::Set(s) => Value::Set(Shared::new(SetValue::with_items(
                s.element_type.clone(),
                s.items.iter().cloned(),
            ))),
            ManagedValue::Map(m) => Value::Map(Shared::new(MapValue::with_entries(
                m.key_type.clone(),
                m.value_type.clone(),
                m.entries.iter().map(|(k, v)| (k.clone(), v.clone())),
            ))),
        }
    }
}

impl From<ManagedList> for ManagedValue {
    fn from(list: ManagedList) -> Self {
        ManagedValue::List(list)
    }
}

impl From<ManagedSet> for ManagedValue {
    fn from(set: ManagedSet) -> Self {
        ManagedValue::Set(set)
    }
}

impl From<ManagedMap> for ManagedValue {
    fn from(map: ManagedMap) -> Self {
        ManagedValue::Map(map)
    }
}

impl Mergeable for ManagedValue {
    fn is_merge_enabled(&self) -> bool {
        match self {
            ManagedValue::List(l) => l.merge_enabled,
            ManagedValue::Set(s) => s.merge_enabled,
            ManagedValue::Map(m) => m.merge_enabled,
        }
    }

    fn merge(&self, parent: &Value) -> anyhow::Result<Value> {
        ensure_merge_enabled(self.is_merge_enabled())?;
        if parent.is_null() {
            return Ok(self.clone().into_value());
        }
        let cannot_merge = || anyhow!("Cannot merge with object of type [{}]", parent.type_name());

        let merged = match self {
            ManagedValue::List(child) => {
                let mut items = match parent {
                    Value::List(l) => l.read().items.clone(),
                    Value::Managed(m) => match m.as_ref() {
                        ManagedValue::List(l) => l.items.clone(),
                        _ => return Err(cannot_merge()),
                    },
                    _ => return Err(cannot_merge()),
                };
                items.extend(child.items.iter().cloned());
                ManagedValue::List(ManagedList::new(child.element_type.clone(), items))
            }
            ManagedValue::Set(child) => {
                let mut items: IndexSet<Value> = match parent {
                    Value::Set(s) => s.read().items.clone(),
                    Value::Managed(m) => match m.as_ref() {
                        ManagedValue::Set(s) => s.items.clone(),
                        _ => return Err(cannot_merge()),
                    },
                    _ => return Err(cannot_merge()),
                };
                items.extend(child.items.iter().cloned());
                ManagedValue::Set(ManagedSet::new(child.element_type.clone(), items))
            }
            ManagedValue::Map(child) => {
                let mut entries: IndexMap<Value, Value> = match parent {
                    Value::Map(m) => m.read().entries.clone(),
                    Value::Managed(m) => match m.as_ref() {
                        ManagedValue::Map(map) => map.entries.clone(),
                        _ => return Err(cannot_merge()),
                    },
                    _ => return Err(cannot_merge()),
                };
                for (k, v) in &child.entries {
                    entries.insert(k.clone(), v.clone());
                }
                ManagedValue::Map(ManagedMap::new(
                    child.key_type.clone(),
                    child.value_type.clone(),
                    entries,
                ))
            }
        };
        Ok(merged.into_value())
    }
}
