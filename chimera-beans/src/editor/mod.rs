//! 属性编辑器
//!
//! 编辑器是有状态的文本/值转换器：先 `set_value` 或 `set_as_text`，再用 `value` 取出结果。
//! [`PropertyEditorRegistry`] 按类型和属性路径管理自定义编辑器，并惰性创建一组默认编辑器。

mod collection;
mod number;
mod opaque;
mod registry;
mod text;

pub use collection::{CollectionKind, CustomCollectionEditor, PropertiesEditor};
pub use number::{
    convert_number, parse_number, CharacterEditor, CustomBooleanEditor, CustomNumberEditor,
};
pub use opaque::{CharsetEditor, LocaleEditor, PathEditor, PatternEditor, UrlEditor, UuidEditor};
pub use registry::PropertyEditorRegistry;
pub use text::{
    ByteArrayPropertyEditor, CharArrayPropertyEditor, StringArrayPropertyEditor,
    StringTrimmerEditor, TextEditor,
};

use crate::value::Value;
use parking_lot::{Mutex, MutexGuard};
use std::fmt;
use std::sync::Arc;

/// 属性编辑器
pub trait PropertyEditor: Send {
    /// 编辑器名称，用于日志和错误信息
    fn name(&self) -> &str;

    /// 设置要编辑的值；编辑器可以在这里把值转换为目标类型
    fn set_value(&mut self, value: Value) -> anyhow::Result<()>;

    /// 当前值
    fn value(&self) -> Value;

    /// 从文本解析值
    fn set_as_text(&mut self, text: &str) -> anyhow::Result<()> {
        anyhow::bail!("{} does not support text conversion of [{}]", self.name(), text)
    }

    /// 当前值的文本形式
    fn as_text(&self) -> Option<String> {
        match self.value() {
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

/// 共享的编辑器句柄
///
/// 同一个编辑器实例可以注册到多个位置（例如复制到嵌套访问器的注册表），
/// 每次使用都需要先加锁。
#[derive(Clone)]
pub struct EditorHandle {
    editor: Arc<Mutex<Box<dyn PropertyEditor>>>,
    shared: bool,
}

impl EditorHandle {
    pub fn new(editor: impl PropertyEditor + 'static) -> Self {
        Self {
            editor: Arc::new(Mutex::new(Box::new(editor))),
            shared: false,
        }
    }

    /// 可能被多个线程同时使用的编辑器
    pub fn shared(editor: impl PropertyEditor + 'static) -> Self {
        Self {
            shared: true,
            ..Self::new(editor)
        }
    }

    pub fn is_shared(&self) -> bool {
        self.shared
    }

    pub fn lock(&self) -> MutexGuard<'_, Box<dyn PropertyEditor>> {
        self.editor.lock()
    }

    pub fn name(&self) -> String {
        self.editor.lock().name().to_string()
    }

    /// 是否为同一个编辑器实例
    pub fn ptr_eq(&self, other: &EditorHandle) -> bool {
        Arc::ptr_eq(&self.editor, &other.editor)
    }
}

impl fmt::Debug for EditorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.editor.try_lock() {
            Some(editor) => write!(f, "EditorHandle({})", editor.name()),
            None => write!(f, "EditorHandle(<in use>)"),
        }
    }
}
