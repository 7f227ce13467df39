use super::{
    ByteArrayPropertyEditor, CharArrayPropertyEditor, CharacterEditor, CharsetEditor,
    CollectionKind, CustomBooleanEditor, CustomCollectionEditor, CustomNumberEditor, EditorHandle,
    LocaleEditor, PathEditor, PatternEditor, PropertiesEditor, PropertyEditor,
    StringArrayPropertyEditor, UrlEditor, UuidEditor,
};
use crate::error::{BeansError, BeansResult};
use crate::path::{
    first_nested_separator, matches_property, property_name, PROPERTY_KEY_PREFIX,
    PROPERTY_KEY_SUFFIX,
};
use crate::value::{OpaqueType, PrimitiveKind, ValueType};
use indexmap::IndexMap;
use once_cell::unsync::OnceCell;
use std::cell::RefCell;
use std::collections::HashMap;

/// 按路径注册的编辑器，可以限定适用的类型
#[derive(Debug, Clone)]
struct CustomEditorHolder {
    registered_type: Option<ValueType>,
    editor: EditorHandle,
}

impl CustomEditorHolder {
    /// 类型过滤：
    /// - 未限定类型时总是适用
    /// - 给出了所需类型时，两者任一方向可赋值即适用
    /// - 未给出所需类型时，只要限定的不是集合或数组类型就适用
    fn editor_for(&self, required_type: Option<&ValueType>) -> Option<&EditorHandle> {
        let applies = match (&self.registered_type, required_type) {
            (None, _) => true,
            (Some(registered), Some(required)) => {
                registered.is_assignable_from(required) || required.is_assignable_from(registered)
            }
            (Some(registered), None) => !registered.is_collection() && !registered.is_array(),
        };
        applies.then_some(&self.editor)
    }
}

/// 属性编辑器注册表
///
/// 查找顺序：精确路径 → 去掉键的路径（越具体越优先）→ 按类型精确匹配 → 按可赋值类型匹配。
/// 默认编辑器在第一次使用时才创建。
pub struct PropertyEditorRegistry {
    default_editors_active: bool,
    config_value_editors_active: bool,
    default_editors: OnceCell<HashMap<ValueType, EditorHandle>>,
    overridden_default_editors: HashMap<ValueType, EditorHandle>,
    custom_editors: IndexMap<ValueType, EditorHandle>,
    custom_editors_for_path: IndexMap<String, CustomEditorHolder>,
    custom_editor_cache: RefCell<HashMap<ValueType, EditorHandle>>,
}

impl PropertyEditorRegistry {
    pub fn new() -> Self {
        Self {
            default_editors_active: true,
            config_value_editors_active: false,
            default_editors: OnceCell::new(),
            overridden_default_editors: HashMap::new(),
            custom_editors: IndexMap::new(),
            custom_editors_for_path: IndexMap::new(),
            custom_editor_cache: RefCell::new(HashMap::new()),
        }
    }

    // ========== 默认编辑器 ==========

    /// 启用默认编辑器
    pub fn register_default_editors(&mut self) {
        self.default_editors_active = true;
    }

    pub fn set_default_editors_active(&mut self, active: bool) {
        self.default_editors_active = active;
    }

    pub fn default_editors_active(&self) -> bool {
        self.default_editors_active
    }

    /// 额外注册把逗号分隔文本转换为数组的编辑器
    ///
    /// 必须在第一次使用默认编辑器之前调用才会生效。
    pub fn use_config_value_editors(&mut self) {
        self.config_value_editors_active = true;
    }

    /// 替换某个类型的默认编辑器
    pub fn override_default_editor(&mut self, required_type: &ValueType, editor: EditorHandle) {
        self.overridden_default_editors
            .insert(required_type.erased(), editor);
    }

    /// 获取类型的默认编辑器
    pub fn default_editor(&self, required_type: &ValueType) -> Option<EditorHandle> {
        if !self.default_editors_active {
            return None;
        }
        let key = required_type.erased();
        if let Some(editor) = self.overridden_default_editors.get(&key) {
            return Some(editor.clone());
        }
        self.default_editors
            .get_or_init(|| self.create_default_editors())
            .get(&key)
            .cloned()
    }

    fn create_default_editors(&self) -> HashMap<ValueType, EditorHandle> {
        let mut editors = HashMap::new();

        for kind in PrimitiveKind::ALL {
            let (primitive, boxed) = match kind {
                PrimitiveKind::Bool => (
                    EditorHandle::new(CustomBooleanEditor::new(false)),
                    EditorHandle::new(CustomBooleanEditor::new(true)),
                ),
                PrimitiveKind::Char => (
                    EditorHandle::new(CharacterEditor::new(false)),
                    EditorHandle::new(CharacterEditor::new(true)),
                ),
                numeric => (
                    EditorHandle::new(CustomNumberEditor::new(numeric, false)),
                    EditorHandle::new(CustomNumberEditor::new(numeric, true)),
                ),
            };
            editors.insert(ValueType::Primitive(kind), primitive);
            editors.insert(ValueType::Boxed(kind), boxed);
        }

        editors.insert(
            ValueType::list_of(ValueType::Any),
            EditorHandle::new(CustomCollectionEditor::new(CollectionKind::List)),
        );
        editors.insert(
            ValueType::set_of(ValueType::Any),
            EditorHandle::new(CustomCollectionEditor::new(CollectionKind::Set)),
        );
        editors.insert(
            ValueType::map_of(ValueType::Any, ValueType::Any),
            EditorHandle::new(PropertiesEditor::default()),
        );

        editors.insert(
            ValueType::Opaque(OpaqueType::PATH),
            EditorHandle::new(PathEditor::default()),
        );
        editors.insert(
            ValueType::Opaque(OpaqueType::URL),
            EditorHandle::new(UrlEditor::default()),
        );
        editors.insert(
            ValueType::Opaque(OpaqueType::LOCALE),
            EditorHandle::new(LocaleEditor::default()),
        );
        editors.insert(
            ValueType::Opaque(OpaqueType::PATTERN),
            EditorHandle::new(PatternEditor::new()),
        );
        editors.insert(
            ValueType::Opaque(OpaqueType::CHARSET),
            EditorHandle::new(CharsetEditor::default()),
        );
        editors.insert(
            ValueType::Opaque(OpaqueType::UUID),
            EditorHandle::new(UuidEditor::default()),
        );

        editors.insert(
            ValueType::array_of(ValueType::Primitive(PrimitiveKind::Byte)),
            EditorHandle::new(ByteArrayPropertyEditor::default()),
        );
        editors.insert(
            ValueType::array_of(ValueType::Primitive(PrimitiveKind::Char)),
            EditorHandle::new(CharArrayPropertyEditor::default()),
        );

        if self.config_value_editors_active {
            let arrays = [
                ValueType::String,
                ValueType::Primitive(PrimitiveKind::Short),
                ValueType::Primitive(PrimitiveKind::Int),
                ValueType::Primitive(PrimitiveKind::Long),
            ];
            for element in arrays {
                editors.insert(
                    ValueType::array_of(element),
                    EditorHandle::new(StringArrayPropertyEditor::new()),
                );
            }
        }

        tracing::trace!("Created {} default property editors", editors.len());
        editors
    }

    /// 把默认编辑器配置复制到另一个注册表，编辑器实例共享
    pub fn copy_default_editors_to(&self, target: &mut PropertyEditorRegistry) {
        target.default_editors_active = self.default_editors_active;
        target.config_value_editors_active = self.config_value_editors_active;
        if let Some(editors) = self.default_editors.get() {
            target.default_editors = OnceCell::from(editors.clone());
        }
        target.overridden_default_editors = self.overridden_default_editors.clone();
    }

    // ========== 自定义编辑器 ==========

    /// 注册自定义编辑器
    ///
    /// `required_type` 与 `property_path` 至少给出一个。给出路径时，编辑器只作用于该路径，
    /// 此时 `required_type` 用于过滤适用的类型。
    pub fn register_custom_editor(
        &mut self,
        required_type: Option<&ValueType>,
        property_path: Option<&str>,
        editor: EditorHandle,
    ) -> BeansResult<()> {
        match (required_type, property_path) {
            (None, None) => Err(BeansError::fatal(
                "Either required type or property path is required",
            )),
            (registered_type, Some(path)) => {
                tracing::debug!(
                    "Registering custom editor {:?} for property path '{}'",
                    editor,
                    path
                );
                self.custom_editors_for_path.insert(
                    path.to_string(),
                    CustomEditorHolder {
                        registered_type: registered_type.map(ValueType::erased),
                        editor,
                    },
                );
                Ok(())
            }
            (Some(required), None) => {
                tracing::debug!("Registering custom editor {:?} for type [{}]", editor, required);
                self.custom_editors.insert(required.erased(), editor);
                self.custom_editor_cache.borrow_mut().clear();
                Ok(())
            }
        }
    }

    /// 注册可能被多个线程同时使用的编辑器
    pub fn register_shared_editor(
        &mut self,
        required_type: &ValueType,
        editor: impl PropertyEditor + 'static,
    ) -> BeansResult<()> {
        self.register_custom_editor(Some(required_type), None, EditorHandle::shared(editor))
    }

    /// 查找自定义编辑器
    pub fn find_custom_editor(
        &self,
        required_type: Option<&ValueType>,
        property_path: Option<&str>,
    ) -> Option<EditorHandle> {
        if let Some(path) = property_path {
            if !self.custom_editors_for_path.is_empty() {
                let found = self.custom_editor_for_path(path, required_type).or_else(|| {
                    let mut stripped = Vec::new();
                    add_stripped_property_paths(&mut stripped, "", path);
                    stripped
                        .iter()
                        .find_map(|p| self.custom_editor_for_path(p, required_type))
                });
                if found.is_some() {
                    return found;
                }
            }
        }
        self.custom_editor_for_type(required_type?)
    }

    fn custom_editor_for_path(
        &self,
        path: &str,
        required_type: Option<&ValueType>,
    ) -> Option<EditorHandle> {
        self.custom_editors_for_path
            .get(path)
            .and_then(|holder| holder.editor_for(required_type))
            .cloned()
    }

    fn custom_editor_for_type(&self, required_type: &ValueType) -> Option<EditorHandle> {
        if self.custom_editors.is_empty() {
            return None;
        }
        let key = required_type.erased();
        if let Some(editor) = self.custom_editors.get(&key) {
            return Some(editor.clone());
        }
        if let Some(editor) = self.custom_editor_cache.borrow().get(&key) {
            return Some(editor.clone());
        }
        let editor = self
            .custom_editors
            .iter()
            .find(|(registered, _)| registered.is_assignable_from(&key))
            .map(|(_, editor)| editor.clone())?;
        self.custom_editor_cache
            .borrow_mut()
            .insert(key, editor.clone());
        Some(editor)
    }

    /// 是否为集合元素或映射值注册了自定义编辑器
    pub fn has_custom_editor_for_element(
        &self,
        element_type: Option<&ValueType>,
        property_path: Option<&str>,
    ) -> bool {
        if let Some(path) = property_path {
            let by_path = self
                .custom_editors_for_path
                .iter()
                .any(|(registered, holder)| {
                    matches_property(registered, path) && holder.editor_for(element_type).is_some()
                });
            if by_path {
                return true;
            }
        }
        element_type.map_or(false, |ty| self.custom_editors.contains_key(&ty.erased()))
    }

    /// 根据按路径注册的编辑器推断属性类型
    pub fn guess_property_type_from_editors(&self, property_name: &str) -> Option<ValueType> {
        let holder = self
            .custom_editors_for_path
            .get(property_name)
            .or_else(|| {
                let mut stripped = Vec::new();
                add_stripped_property_paths(&mut stripped, "", property_name);
                stripped
                    .iter()
                    .find_map(|p| self.custom_editors_for_path.get(p))
            })?;
        holder.registered_type.clone()
    }

    /// 把自定义编辑器复制到嵌套属性的注册表
    ///
    /// 按类型注册的编辑器全部复制。给出 `nested_property` 时，只复制以该属性开头的路径编辑器，
    /// 并去掉开头的属性段，例如 `address.city` 在 `address` 的注册表中注册为 `city`。
    pub fn copy_custom_editors_to(
        &self,
        target: &mut PropertyEditorRegistry,
        nested_property: Option<&str>,
    ) {
        for (registered, editor) in &self.custom_editors {
            target.custom_editors.insert(registered.clone(), editor.clone());
        }
        target.custom_editor_cache.borrow_mut().clear();

        let actual_property_name = nested_property.map(property_name);
        for (editor_path, holder) in &self.custom_editors_for_path {
            match nested_property {
                Some(nested) => {
                    let Some(pos) = first_nested_separator(editor_path) else {
                        continue;
                    };
                    let editor_nested_property = &editor_path[..pos];
                    let editor_nested_path = &editor_path[pos + 1..];
                    if editor_nested_property == nested
                        || Some(editor_nested_property) == actual_property_name
                    {
                        target
                            .custom_editors_for_path
                            .insert(editor_nested_path.to_string(), holder.clone());
                    }
                }
                None => {
                    target
                        .custom_editors_for_path
                        .insert(editor_path.clone(), holder.clone());
                }
            }
        }
    }
}

impl Default for PropertyEditorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// 生成去掉方括号键的所有路径组合，越具体的排在越前面
///
/// 例如 `a[1].b[2]` 依次得到 `a.b[2]`、`a.b`、`a[1].b`。
fn add_stripped_property_paths(out: &mut Vec<String>, nested_path: &str, property_path: &str) {
    let Some(start) = property_path.find(PROPERTY_KEY_PREFIX) else {
        return;
    };
    let Some(end) = property_path.find(PROPERTY_KEY_SUFFIX) else {
        return;
    };
    if end < start {
        return;
    }
    let prefix = &property_path[..start];
    let key = &property_path[start..=end];
    let suffix = &property_path[end + 1..];

    out.push(format!("{}{}{}", nested_path, prefix, suffix));
    add_stripped_property_paths(out, &format!("{}{}", nested_path, prefix), suffix);
    add_stripped_property_paths(out, &format!("{}{}{}", nested_path, prefix, key), suffix);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::{StringTrimmerEditor, TextEditor};
    use crate::value::Value;
    use pretty_assertions::assert_eq;

    fn int() -> ValueType {
        ValueType::Boxed(PrimitiveKind::Int)
    }

    fn text_editor(name: &'static str) -> EditorHandle {
        EditorHandle::new(TextEditor::new(name, |t| Ok(Value::from(t))))
    }

    #[test]
    fn test_stripped_paths_order() {
        let mut out = Vec::new();
        add_stripped_property_paths(&mut out, "", "a[1].b[2]");
        assert_eq!(out, vec!["a.b[2]", "a.b", "a[1].b"]);

        let mut none = Vec::new();
        add_stripped_property_paths(&mut none, "", "plain.path");
        assert!(none.is_empty());
    }

    #[test]
    fn test_either_type_or_path_is_required() {
        let mut registry = PropertyEditorRegistry::new();
        assert!(registry
            .register_custom_editor(None, None, text_editor("x"))
            .is_err());
    }

    #[test]
    fn test_path_editor_beats_type_editor() {
        let mut registry = PropertyEditorRegistry::new();
        let by_type = text_editor("by-type");
        let by_path = text_editor("by-path");
        registry
            .register_custom_editor(Some(&int()), None, by_type.clone())
            .unwrap();
        registry
            .register_custom_editor(Some(&int()), Some("a.b"), by_path.clone())
            .unwrap();

        let found = registry.find_custom_editor(Some(&int()), Some("a.b")).unwrap();
        assert!(found.ptr_eq(&by_path));
        let found = registry.find_custom_editor(Some(&int()), Some("a.c")).unwrap();
        assert!(found.ptr_eq(&by_type));
    }

    #[test]
    fn test_untyped_path_editor_beats_type_editor() {
        let mut registry = PropertyEditorRegistry::new();
        let by_type = text_editor("by-type");
        let by_path = text_editor("by-path");
        registry
            .register_custom_editor(None, Some("a.b"), by_path.clone())
            .unwrap();
        registry
            .register_custom_editor(Some(&int()), None, by_type.clone())
            .unwrap();

        let found = registry.find_custom_editor(Some(&int()), Some("a.b")).unwrap();
        assert!(found.ptr_eq(&by_path));
        let found = registry.find_custom_editor(Some(&ValueType::String), Some("a.b")).unwrap();
        assert!(found.ptr_eq(&by_path));
        let found = registry.find_custom_editor(None, Some("a.b")).unwrap();
        assert!(found.ptr_eq(&by_path));

        let found = registry.find_custom_editor(Some(&int()), Some("a.c")).unwrap();
        assert!(found.ptr_eq(&by_type));
        assert!(registry.find_custom_editor(None, Some("a.c")).is_none());
    }

    #[test]
    fn test_stripped_path_lookup() {
        let mut registry = PropertyEditorRegistry::new();
        let editor = text_editor("items");
        registry
            .register_custom_editor(None, Some("items.name"), editor.clone())
            .unwrap();
        let found = registry
            .find_custom_editor(Some(&ValueType::String), Some("items[3].name"))
            .unwrap();
        assert!(found.ptr_eq(&editor));
        assert_eq!(registry.guess_property_type_from_editors("items[0].name"), None);
    }

    #[test]
    fn test_holder_type_filter() {
        let mut registry = PropertyEditorRegistry::new();
        let editor = text_editor("list");
        let list_type = ValueType::list_of(ValueType::String);
        registry
            .register_custom_editor(Some(&list_type), Some("tags"), editor.clone())
            .unwrap();

        assert!(registry.find_custom_editor(Some(&list_type), Some("tags")).is_some());
        assert!(registry.find_custom_editor(Some(&ValueType::String), Some("tags")).is_none());
        // 未给出类型时，集合类型的路径编辑器不适用
        assert!(registry.find_custom_editor(None, Some("tags")).is_none());
        assert_eq!(
            registry.guess_property_type_from_editors("tags"),
            Some(ValueType::list_of(ValueType::Any))
        );
    }

    #[test]
    fn test_assignable_type_lookup_is_memoized() {
        let base = crate::class::BeanClass::dynamic("Animal").build();
        let derived = crate::class::BeanClass::dynamic("Dog").superclass(&base).build();
        let mut registry = PropertyEditorRegistry::new();
        let editor = text_editor("animal");
        registry
            .register_custom_editor(Some(&ValueType::Bean(base)), None, editor.clone())
            .unwrap();

        let derived_type = ValueType::Bean(derived);
        let found = registry.find_custom_editor(Some(&derived_type), None).unwrap();
        assert!(found.ptr_eq(&editor));
        assert!(registry.custom_editor_cache.borrow().contains_key(&derived_type));

        registry
            .register_custom_editor(Some(&ValueType::String), None, text_editor("s"))
            .unwrap();
        assert!(registry.custom_editor_cache.borrow().is_empty());
    }

    #[test]
    fn test_default_editors() {
        let mut registry = PropertyEditorRegistry::new();
        let editor = registry
            .default_editor(&ValueType::Primitive(PrimitiveKind::Int))
            .unwrap();
        editor.lock().set_as_text("0x10").unwrap();
        assert_eq!(editor.lock().value(), Value::Int(16));
        assert!(registry
            .default_editor(&ValueType::array_of(ValueType::String))
            .is_none());

        let trimmer = EditorHandle::new(StringTrimmerEditor::new(true));
        registry.override_default_editor(&ValueType::String, trimmer.clone());
        assert!(registry.default_editor(&ValueType::String).unwrap().ptr_eq(&trimmer));

        registry.set_default_editors_active(false);
        assert!(registry.default_editor(&ValueType::Primitive(PrimitiveKind::Int)).is_none());
    }

    #[test]
    fn test_config_value_editors() {
        let mut registry = PropertyEditorRegistry::new();
        registry.use_config_value_editors();
        let editor = registry
            .default_editor(&ValueType::array_of(ValueType::Primitive(PrimitiveKind::Int)))
            .unwrap();
        assert_eq!(editor.name(), "StringArrayPropertyEditor");
    }

    #[test]
    fn test_copy_custom_editors_to_nested() {
        let mut parent = PropertyEditorRegistry::new();
        let city = text_editor("city");
        let other = text_editor("other");
        let typed = text_editor("typed");
        parent
            .register_custom_editor(None, Some("address.city"), city.clone())
            .unwrap();
        parent
            .register_custom_editor(None, Some("billing.city"), other)
            .unwrap();
        parent
            .register_custom_editor(Some(&int()), None, typed.clone())
            .unwrap();

        let mut child = PropertyEditorRegistry::new();
        parent.copy_custom_editors_to(&mut child, Some("address"));
        assert!(child
            .find_custom_editor(Some(&ValueType::String), Some("city"))
            .unwrap()
            .ptr_eq(&city));
        assert!(child.find_custom_editor(Some(&int()), None).unwrap().ptr_eq(&typed));

        let mut indexed = PropertyEditorRegistry::new();
        parent.copy_custom_editors_to(&mut indexed, Some("address[0]"));
        assert!(indexed.find_custom_editor(None, Some("city")).is_some());
    }

    #[test]
    fn test_has_custom_editor_for_element() {
        let mut registry = PropertyEditorRegistry::new();
        registry
            .register_custom_editor(Some(&ValueType::String), Some("names[0]"), text_editor("n"))
            .unwrap();
        assert!(registry.has_custom_editor_for_element(Some(&ValueType::String), Some("names")));
        assert!(!registry.has_custom_editor_for_element(Some(&int()), Some("names")));
        assert!(!registry.has_custom_editor_for_element(Some(&ValueType::String), Some("other")));
    }
}
