//! 类型元数据
//!
//! 提供属性访问所需的最小对象模型：类加载器层次、Bean 类（父类、接口、字段、访问器方法、
//! 泛型绑定）以及 Bean 实例的共享引用。

use crate::error::{BeansError, BeansResult};
use crate::introspection::BeanInfo;
use crate::utils::naming::capitalize;
use crate::value::{PrimitiveKind, Value, ValueType};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

static NEXT_LOADER_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_CLASS_ID: AtomicU64 = AtomicU64::new(1);

static SYSTEM_LOADER: Lazy<ClassLoader> = Lazy::new(|| ClassLoader::create("system", None));

struct LoaderInner {
    id: u64,
    name: String,
    parent: Option<ClassLoader>,
}

/// 类加载器
///
/// 只用于缓存安全性判断和按加载器清理缓存。
#[derive(Clone)]
pub struct ClassLoader(Arc<LoaderInner>);

impl ClassLoader {
    fn create(name: &str, parent: Option<ClassLoader>) -> Self {
        Self(Arc::new(LoaderInner {
            id: NEXT_LOADER_ID.fetch_add(1, Ordering::Relaxed),
            name: name.to_string(),
            parent,
        }))
    }

    /// 进程级根加载器
    pub fn system() -> ClassLoader {
        SYSTEM_LOADER.clone()
    }

    /// 创建子加载器
    pub fn new_child(&self, name: &str) -> ClassLoader {
        Self::create(name, Some(self.clone()))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn parent(&self) -> Option<&ClassLoader> {
        self.0.parent.as_ref()
    }

    /// 当前加载器是否就是 `parent`，或者是它的后代
    pub fn is_same_or_descendant_of(&self, parent: &ClassLoader) -> bool {
        let mut current = Some(self);
        while let Some(loader) = current {
            if loader == parent {
                return true;
            }
            current = loader.parent();
        }
        false
    }
}

impl PartialEq for ClassLoader {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for ClassLoader {}

impl Hash for ClassLoader {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl fmt::Debug for ClassLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClassLoader({}#{})", self.0.name, self.0.id)
    }
}

/// 访问器方法调用失败
#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("class {actual} cannot be cast to class {expected}")]
    ClassCast { expected: String, actual: String },

    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

impl InvokeError {
    pub fn class_cast(expected: impl Into<String>, actual: &Value) -> Self {
        Self::ClassCast {
            expected: expected.into(),
            actual: actual.type_name(),
        }
    }
}

/// Bean 实例
pub trait Bean: Any + Send + Sync {
    fn bean_class(&self) -> ClassRef;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

struct BeanCell {
    class: ClassRef,
    bean: RwLock<Box<dyn Bean>>,
}

/// Bean 实例的共享引用，按引用判等
///
/// 实例的类在创建时记录下来，查询类型不需要加锁，写方法执行期间也可以对同一实例做类型检查。
#[derive(Clone)]
pub struct BeanRef(Arc<BeanCell>);

impl BeanRef {
    pub fn new<B: Bean>(bean: B) -> Self {
        Self(Arc::new(BeanCell {
            class: bean.bean_class(),
            bean: RwLock::new(Box::new(bean)),
        }))
    }

    pub fn bean_class(&self) -> ClassRef {
        self.0.class.clone()
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Box<dyn Bean>> {
        self.0.bean.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Box<dyn Bean>> {
        self.0.bean.write()
    }

    pub fn ptr_eq(&self, other: &BeanRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// 实例标识
    pub fn identity(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    /// 以具体类型读取 Bean
    pub fn with<T: Bean, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let guard = self.0.bean.read();
        guard.as_any().downcast_ref::<T>().map(f)
    }

    /// 以具体类型修改 Bean
    pub fn with_mut<T: Bean, R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut guard = self.0.bean.write();
        guard.as_any_mut().downcast_mut::<T>().map(f)
    }
}

impl fmt::Debug for BeanRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bean({}@{:x})", self.0.class.name(), self.identity())
    }
}

pub type ReadFn = dyn Fn(&dyn Bean) -> Result<Value, InvokeError> + Send + Sync;
pub type WriteFn = dyn Fn(&mut dyn Bean, Value) -> Result<Value, InvokeError> + Send + Sync;
pub type ConstructorFn = dyn Fn(&ClassRef) -> BeanRef + Send + Sync;

/// 方法调用器
#[derive(Clone)]
pub enum Invoker {
    /// 无参读方法
    Read(Arc<ReadFn>),
    /// 单参数写方法
    Write(Arc<WriteFn>),
}

/// 方法定义
pub struct MethodDef {
    name: String,
    params: Vec<ValueType>,
    returns: Option<ValueType>,
    declaring_class: String,
    invoker: Invoker,
}

impl MethodDef {
    pub fn reader(
        name: impl Into<String>,
        returns: ValueType,
        f: impl Fn(&dyn Bean) -> Result<Value, InvokeError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            returns: Some(returns),
            declaring_class: String::new(),
            invoker: Invoker::Read(Arc::new(f)),
        }
    }

    /// `returns` 为 None 表示 void
    pub fn writer(
        name: impl Into<String>,
        param: ValueType,
        returns: Option<ValueType>,
        f: impl Fn(&mut dyn Bean, Value) -> Result<Value, InvokeError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            params: vec![param],
            returns,
            declaring_class: String::new(),
            invoker: Invoker::Write(Arc::new(f)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[ValueType] {
        &self.params
    }

    pub fn return_type(&self) -> Option<&ValueType> {
        self.returns.as_ref()
    }

    pub fn declaring_class(&self) -> &str {
        &self.declaring_class
    }

    pub fn is_reader(&self) -> bool {
        matches!(self.invoker, Invoker::Read(_)) && self.params.is_empty() && self.returns.is_some()
    }

    pub fn is_writer(&self) -> bool {
        matches!(self.invoker, Invoker::Write(_)) && self.params.len() == 1
    }

    pub fn invoke_read(&self, bean: &BeanRef) -> Result<Value, InvokeError> {
        match &self.invoker {
            Invoker::Read(f) => {
                let guard = bean.read();
                f(&**guard)
            }
            Invoker::Write(_) => Err(InvokeError::Failed(anyhow::anyhow!(
                "Method '{}' is not a read method",
                self.name
            ))),
        }
    }

    pub fn invoke_write(&self, bean: &BeanRef, value: Value) -> Result<Value, InvokeError> {
        match &self.invoker {
            Invoker::Write(f) => {
                let mut guard = bean.write();
                f(&mut **guard, value)
            }
            Invoker::Read(_) => Err(InvokeError::Failed(anyhow::anyhow!(
                "Method '{}' is not a write method",
                self.name
            ))),
        }
    }
}

impl fmt::Debug for MethodDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}(", self.declaring_class, self.name)?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", p)?;
        }
        match &self.returns {
            Some(ty) => write!(f, ") -> {}", ty),
            None => write!(f, ")"),
        }
    }
}

/// 字段定义
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub field_type: ValueType,
}

/// Bean 类
pub struct BeanClass {
    id: u64,
    name: String,
    loader: ClassLoader,
    superclass: Option<ClassRef>,
    interfaces: Vec<ClassRef>,
    is_interface: bool,
    fields: Vec<FieldDef>,
    methods: Vec<Arc<MethodDef>>,
    type_bindings: HashMap<String, ValueType>,
    constructor: Option<Arc<ConstructorFn>>,
    bean_info: Option<BeanInfo>,
}

impl BeanClass {
    /// 构建类型化 Bean 的类描述
    pub fn builder(name: impl Into<String>) -> ClassBuilder {
        ClassBuilder::new(name.into())
    }

    /// 构建字段驱动的动态 Bean 类
    pub fn dynamic(name: impl Into<String>) -> DynamicClassBuilder {
        DynamicClassBuilder {
            inner: ClassBuilder::new(name.into()),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn loader(&self) -> &ClassLoader {
        &self.loader
    }

    pub fn superclass(&self) -> Option<&ClassRef> {
        self.superclass.as_ref()
    }

    pub fn interfaces(&self) -> &[ClassRef] {
        &self.interfaces
    }

    pub fn is_interface(&self) -> bool {
        self.is_interface
    }

    /// 本类声明的字段
    pub fn declared_fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// 本类声明的方法
    pub fn declared_methods(&self) -> &[Arc<MethodDef>] {
        &self.methods
    }

    /// 显式提供的 BeanInfo
    pub fn explicit_bean_info(&self) -> Option<&BeanInfo> {
        self.bean_info.as_ref()
    }

    /// 沿父类链解析泛型类型变量
    pub fn resolve_type_variable(&self, name: &str) -> Option<ValueType> {
        if let Some(ty) = self.type_bindings.get(name) {
            return Some(ty.clone());
        }
        self.superclass
            .as_ref()
            .and_then(|s| s.resolve_type_variable(name))
    }

    /// 在本类及父类中查找字段
    pub fn find_field(&self, name: &str) -> Option<&FieldDef> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .or_else(|| self.superclass.as_ref().and_then(|s| s.find_field(name)))
    }
}

/// Bean 类引用，按类标识判等
#[derive(Clone)]
pub struct ClassRef(Arc<BeanClass>);

impl ClassRef {
    /// 是否为 `other` 本身、其子类或实现类
    pub fn is_subclass_of(&self, other: &ClassRef) -> bool {
        if self == other {
            return true;
        }
        if let Some(superclass) = &self.0.superclass {
            if superclass.is_subclass_of(other) {
                return true;
            }
        }
        self.0.interfaces.iter().any(|i| i.is_subclass_of(other))
    }

    /// 本类及所有父类，从本类开始
    pub fn hierarchy(&self) -> Vec<ClassRef> {
        let mut chain = vec![self.clone()];
        let mut current = self.0.superclass.clone();
        while let Some(class) = current {
            current = class.0.superclass.clone();
            chain.push(class);
        }
        chain
    }

    /// 通过无参构造函数创建实例
    pub fn instantiate(&self) -> BeansResult<BeanRef> {
        if self.0.is_interface {
            return Err(BeansError::fatal(format!(
                "Cannot instantiate [{}]: specified class is an interface",
                self.0.name
            )));
        }
        match &self.0.constructor {
            Some(constructor) => Ok(constructor(self)),
            None => Err(BeansError::fatal(format!(
                "Cannot instantiate [{}]: no default constructor found",
                self.0.name
            ))),
        }
    }
}

impl Deref for ClassRef {
    type Target = BeanClass;

    fn deref(&self) -> &BeanClass {
        &self.0
    }
}

impl PartialEq for ClassRef {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for ClassRef {}

impl Hash for ClassRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl fmt::Debug for ClassRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "class {}", self.0.name)
    }
}

fn reader_name(property: &str, ty: &ValueType) -> String {
    match ty {
        ValueType::Primitive(PrimitiveKind::Bool) => format!("is{}", capitalize(property)),
        _ => format!("get{}", capitalize(property)),
    }
}

fn writer_name(property: &str) -> String {
    format!("set{}", capitalize(property))
}

fn wrong_bean<T>(bean: &dyn Bean) -> InvokeError {
    InvokeError::ClassCast {
        expected: std::any::type_name::<T>().to_string(),
        actual: bean.bean_class().name().to_string(),
    }
}

/// Bean 类构建器
pub struct ClassBuilder {
    name: String,
    loader: Option<ClassLoader>,
    superclass: Option<ClassRef>,
    interfaces: Vec<ClassRef>,
    is_interface: bool,
    fields: Vec<FieldDef>,
    methods: Vec<MethodDef>,
    type_bindings: HashMap<String, ValueType>,
    constructor: Option<Arc<ConstructorFn>>,
    bean_info: Option<BeanInfo>,
}

impl ClassBuilder {
    fn new(name: String) -> Self {
        Self {
            name,
            loader: None,
            superclass: None,
            interfaces: Vec::new(),
            is_interface: false,
            fields: Vec::new(),
            methods: Vec::new(),
            type_bindings: HashMap::new(),
            constructor: None,
            bean_info: None,
        }
    }

    /// 设置类加载器（默认：系统加载器）
    pub fn loader(mut self, loader: &ClassLoader) -> Self {
        self.loader = Some(loader.clone());
        self
    }

    pub fn superclass(mut self, superclass: &ClassRef) -> Self {
        self.superclass = Some(superclass.clone());
        self
    }

    pub fn interface(mut self, interface: &ClassRef) -> Self {
        self.interfaces.push(interface.clone());
        self
    }

    /// 标记为接口
    pub fn as_interface(mut self) -> Self {
        self.is_interface = true;
        self
    }

    pub fn field(mut self, name: impl Into<String>, field_type: ValueType) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            field_type,
        });
        self
    }

    /// 绑定泛型类型变量
    pub fn bind_type(mut self, variable: impl Into<String>, ty: ValueType) -> Self {
        self.type_bindings.insert(variable.into(), ty);
        self
    }

    pub fn constructor(
        mut self,
        constructor: impl Fn(&ClassRef) -> BeanRef + Send + Sync + 'static,
    ) -> Self {
        self.constructor = Some(Arc::new(constructor));
        self
    }

    /// 显式 BeanInfo，除非配置忽略，否则内省时直接使用
    pub fn bean_info(mut self, info: BeanInfo) -> Self {
        self.bean_info = Some(info);
        self
    }

    pub fn method(mut self, method: MethodDef) -> Self {
        self.methods.push(method);
        self
    }

    /// 添加 `getXxx` / `isXxx` 读方法
    pub fn getter<T: Bean>(
        self,
        property: &str,
        ty: ValueType,
        f: impl Fn(&T) -> Value + Send + Sync + 'static,
    ) -> Self {
        let name = reader_name(property, &ty);
        self.method(MethodDef::reader(name, ty, move |bean: &dyn Bean| {
            bean.as_any()
                .downcast_ref::<T>()
                .map(&f)
                .ok_or_else(|| wrong_bean::<T>(bean))
        }))
    }

    /// 添加 `setXxx` void 写方法
    pub fn setter<T: Bean>(
        self,
        property: &str,
        ty: ValueType,
        f: impl Fn(&mut T, Value) -> Result<(), InvokeError> + Send + Sync + 'static,
    ) -> Self {
        self.method(MethodDef::writer(
            writer_name(property),
            ty,
            None,
            move |bean: &mut dyn Bean, value| {
                let error = wrong_bean::<T>(bean);
                match bean.as_any_mut().downcast_mut::<T>() {
                    Some(target) => f(target, value).map(|_| Value::Null),
                    None => Err(error),
                }
            },
        ))
    }

    /// 添加返回非 void 的链式写方法
    pub fn fluent_setter<T: Bean>(
        self,
        property: &str,
        ty: ValueType,
        f: impl Fn(&mut T, Value) -> Result<(), InvokeError> + Send + Sync + 'static,
    ) -> Self {
        self.method(MethodDef::writer(
            writer_name(property),
            ty,
            Some(ValueType::Any),
            move |bean: &mut dyn Bean, value| {
                let error = wrong_bean::<T>(bean);
                match bean.as_any_mut().downcast_mut::<T>() {
                    Some(target) => f(target, value).map(|_| Value::Null),
                    None => Err(error),
                }
            },
        ))
    }

    /// 添加与字段同名的记录式读方法
    pub fn record_accessor<T: Bean>(
        self,
        field: &str,
        ty: ValueType,
        f: impl Fn(&T) -> Value + Send + Sync + 'static,
    ) -> Self {
        let name = field.to_string();
        self.field(field, ty.clone())
            .method(MethodDef::reader(name, ty, move |bean: &dyn Bean| {
                bean.as_any()
                    .downcast_ref::<T>()
                    .map(&f)
                    .ok_or_else(|| wrong_bean::<T>(bean))
            }))
    }

    pub fn build(self) -> ClassRef {
        let name = self.name;
        let methods = self
            .methods
            .into_iter()
            .map(|mut m| {
                m.declaring_class = name.clone();
                Arc::new(m)
            })
            .collect();
        tracing::trace!("Defining bean class: {}", name);
        ClassRef(Arc::new(BeanClass {
            id: NEXT_CLASS_ID.fetch_add(1, Ordering::Relaxed),
            loader: self.loader.unwrap_or_else(ClassLoader::system),
            name,
            superclass: self.superclass,
            interfaces: self.interfaces,
            is_interface: self.is_interface,
            fields: self.fields,
            methods,
            type_bindings: self.type_bindings,
            constructor: self.constructor,
            bean_info: self.bean_info,
        }))
    }
}

/// 字段驱动的 Bean 实例
pub struct DynamicBean {
    class: ClassRef,
    values: IndexMap<String, Value>,
}

impl DynamicBean {
    /// 按类及其父类声明的字段创建实例，原始类型字段初始化为零值
    pub fn new(class: &ClassRef) -> Self {
        let mut values = IndexMap::new();
        for c in class.hierarchy().iter().rev() {
            for field in c.declared_fields() {
                let initial = match &field.field_type {
                    ValueType::Primitive(kind) => kind.zero(),
                    _ => Value::Null,
                };
                values.insert(field.name.clone(), initial);
            }
        }
        Self {
            class: class.clone(),
            values,
        }
    }

    pub fn get(&self, field: &str) -> Value {
        self.values.get(field).cloned().unwrap_or(Value::Null)
    }

    pub fn set(&mut self, field: &str, value: Value) {
        self.values.insert(field.to_string(), value);
    }
}

impl Bean for DynamicBean {
    fn bean_class(&self) -> ClassRef {
        self.class.clone()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// 动态 Bean 类构建器
///
/// 每个属性对应一个字段，读写方法自动生成。写方法会校验值的类型，不匹配时返回
/// [`InvokeError::ClassCast`]。
pub struct DynamicClassBuilder {
    inner: ClassBuilder,
}

impl DynamicClassBuilder {
    pub fn loader(mut self, loader: &ClassLoader) -> Self {
        self.inner = self.inner.loader(loader);
        self
    }

    pub fn superclass(mut self, superclass: &ClassRef) -> Self {
        self.inner = self.inner.superclass(superclass);
        self
    }

    pub fn interface(mut self, interface: &ClassRef) -> Self {
        self.inner = self.inner.interface(interface);
        self
    }

    pub fn bind_type(mut self, variable: impl Into<String>, ty: ValueType) -> Self {
        self.inner = self.inner.bind_type(variable, ty);
        self
    }

    pub fn bean_info(mut self, info: BeanInfo) -> Self {
        self.inner = self.inner.bean_info(info);
        self
    }

    pub fn method(mut self, method: MethodDef) -> Self {
        self.inner = self.inner.method(method);
        self
    }

    /// 可读写属性
    pub fn property(self, name: &str, ty: ValueType) -> Self {
        self.field(name, ty.clone()).reader(name, ty.clone()).writer(name, ty, None)
    }

    /// 只读属性
    pub fn read_only(self, name: &str, ty: ValueType) -> Self {
        self.field(name, ty.clone()).reader(name, ty)
    }

    /// 只写属性
    pub fn write_only(self, name: &str, ty: ValueType) -> Self {
        self.field(name, ty.clone()).writer(name, ty, None)
    }

    /// 读方法加上返回非 void 的链式写方法
    pub fn fluent(self, name: &str, ty: ValueType) -> Self {
        self.field(name, ty.clone())
            .reader(name, ty.clone())
            .writer(name, ty, Some(ValueType::Any))
    }

    /// 只有字段和同名读方法的记录式属性
    pub fn record_component(self, name: &str, ty: ValueType) -> Self {
        let field = name.to_string();
        self.field(name, ty.clone())
            .method(MethodDef::reader(name, ty, move |bean: &dyn Bean| {
                dynamic_ref(bean).map(|d| d.get(&field))
            }))
    }

    /// 只声明字段
    pub fn field(mut self, name: &str, ty: ValueType) -> Self {
        self.inner = self.inner.field(name, ty);
        self
    }

    fn reader(self, name: &str, ty: ValueType) -> Self {
        let field = name.to_string();
        let method_name = reader_name(name, &ty);
        self.method(MethodDef::reader(method_name, ty, move |bean: &dyn Bean| {
            dynamic_ref(bean).map(|d| d.get(&field))
        }))
    }

    fn writer(self, name: &str, ty: ValueType, returns: Option<ValueType>) -> Self {
        let field = name.to_string();
        let expected = ty.clone();
        self.method(MethodDef::writer(
            writer_name(name),
            ty,
            returns,
            move |bean: &mut dyn Bean, value| {
                let declared = match &expected {
                    ValueType::Variable(var) => bean
                        .bean_class()
                        .resolve_type_variable(var)
                        .unwrap_or(ValueType::Any),
                    other => other.clone(),
                };
                if !declared.is_instance(&value) {
                    return Err(InvokeError::class_cast(declared.to_string(), &value));
                }
                let class_name = bean.bean_class().name().to_string();
                match bean.as_any_mut().downcast_mut::<DynamicBean>() {
                    Some(target) => {
                        target.set(&field, value);
                        Ok(Value::Null)
                    }
                    None => Err(InvokeError::ClassCast {
                        expected: "DynamicBean".to_string(),
                        actual: class_name,
                    }),
                }
            },
        ))
    }

    pub fn build(self) -> ClassRef {
        self.inner
            .constructor(|class| BeanRef::new(DynamicBean::new(class)))
            .build()
    }
}

fn dynamic_ref(bean: &dyn Bean) -> Result<&DynamicBean, InvokeError> {
    bean.as_any()
        .downcast_ref::<DynamicBean>()
        .ok_or_else(|| InvokeError::ClassCast {
            expected: "DynamicBean".to_string(),
            actual: bean.bean_class().name().to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loader_hierarchy() {
        let system = ClassLoader::system();
        let app = system.new_child("app");
        let plugin = app.new_child("plugin");
        assert!(plugin.is_same_or_descendant_of(&app));
        assert!(plugin.is_same_or_descendant_of(&system));
        assert!(app.is_same_or_descendant_of(&app));
        assert!(!app.is_same_or_descendant_of(&plugin));
    }

    #[test]
    fn test_bean_class_is_available_while_locked() {
        let class = BeanClass::dynamic("Node")
            .property("next", ValueType::Any)
            .build();
        let bean = class.instantiate().unwrap();
        let _guard = bean.write();
        assert_eq!(bean.bean_class(), class);
        assert!(ValueType::Bean(class.clone()).is_instance(&Value::Bean(bean.clone())));
        assert!(format!("{:?}", bean).starts_with("Bean(Node@"));
    }

    #[test]
    fn test_dynamic_bean_accessors() {
        let class = BeanClass::dynamic("Person")
            .property("name", ValueType::String)
            .property("age", ValueType::Primitive(PrimitiveKind::Int))
            .build();
        let bean = class.instantiate().unwrap();

        let setter = class
            .declared_methods()
            .iter()
            .find(|m| m.name() == "setName")
            .unwrap();
        setter.invoke_write(&bean, Value::from("Ada")).unwrap();

        let getter = class
            .declared_methods()
            .iter()
            .find(|m| m.name() == "getName")
            .unwrap();
        assert_eq!(getter.invoke_read(&bean).unwrap(), Value::from("Ada"));

        let age_setter = class
            .declared_methods()
            .iter()
            .find(|m| m.name() == "setAge")
            .unwrap();
        assert!(matches!(
            age_setter.invoke_write(&bean, Value::from("old")),
            Err(InvokeError::ClassCast { .. })
        ));
    }

    #[test]
    fn test_subclass_and_interface_chain() {
        let named = BeanClass::builder("Named").as_interface().build();
        let base = BeanClass::dynamic("Base").interface(&named).build();
        let derived = BeanClass::dynamic("Derived").superclass(&base).build();
        assert!(derived.is_subclass_of(&base));
        assert!(derived.is_subclass_of(&named));
        assert!(!base.is_subclass_of(&derived));
        assert!(named.instantiate().is_err());
        assert_eq!(derived.hierarchy().len(), 2);
    }

    #[test]
    fn test_boolean_reader_uses_is_prefix() {
        let class = BeanClass::dynamic("Flag")
            .property("active", ValueType::Primitive(PrimitiveKind::Bool))
            .property("enabled", ValueType::Boxed(PrimitiveKind::Bool))
            .build();
        let names: Vec<&str> = class.declared_methods().iter().map(|m| m.name()).collect();
        assert!(names.contains(&"isActive"));
        assert!(names.contains(&"getEnabled"));
    }
}
