use super::*;
use crate::class::{BeanClass, ClassRef, DynamicBean, InvokeError, MethodDef};
use crate::editor::TextEditor;
use crate::property_value::MutablePropertyValues;
use crate::value::{ListValue, PrimitiveKind, Shared};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};

fn address_class() -> ClassRef {
    BeanClass::dynamic("Address")
        .property("city", ValueType::String)
        .property("zip", ValueType::String)
        .build()
}

fn person_class(address: &ClassRef) -> ClassRef {
    BeanClass::dynamic("Person")
        .property("name", ValueType::String)
        .property("nickname", ValueType::String)
        .property("age", ValueType::Primitive(PrimitiveKind::Int))
        .property("address", ValueType::Bean(address.clone()))
        .property("addresses", ValueType::list_of(ValueType::Bean(address.clone())))
        .property("aliases", ValueType::list_of(ValueType::String))
        .property("tags", ValueType::array_of(ValueType::String))
        .property("labels", ValueType::set_of(ValueType::String))
        .property("attributes", ValueType::map_of(ValueType::String, ValueType::String))
        .property(
            "scores",
            ValueType::map_of(ValueType::Boxed(PrimitiveKind::Int), ValueType::String),
        )
        .read_only("id", ValueType::String)
        .build()
}

fn person() -> (BeanRef, BeanWrapper) {
    let bean = person_class(&address_class()).instantiate().unwrap();
    (bean.clone(), BeanWrapper::for_bean(bean))
}

fn field(bean: &BeanRef, name: &str) -> Value {
    bean.with(|b: &DynamicBean| b.get(name)).unwrap()
}

fn set_field(bean: &BeanRef, name: &str, value: Value) {
    bean.with_mut(|b: &mut DynamicBean| b.set(name, value)).unwrap();
}

fn strings(items: &[&str]) -> Vec<Value> {
    items.iter().map(|s| Value::from(*s)).collect()
}

#[test]
fn test_simple_property_with_conversion() {
    let (bean, mut wrapper) = person();
    wrapper.set_property_value("age", "42").unwrap();
    wrapper.set_property_value("name", "Ann").unwrap();

    assert_eq!(field(&bean, "age"), Value::Int(42));
    assert_eq!(wrapper.get_property_value("name").unwrap(), Value::from("Ann"));
    assert_eq!(wrapper.root_class_name(), "Person");
    assert_eq!(wrapper.nested_path(), "");
}

#[test]
fn test_lenient_property_name() {
    let (bean, mut wrapper) = person();
    wrapper.set_property_value("Name", "Bob").unwrap();
    assert_eq!(field(&bean, "name"), Value::from("Bob"));
}

#[test]
fn test_null_nested_path_without_auto_grow() {
    let (_, mut wrapper) = person();
    let err = wrapper.set_property_value("address.city", "Paris").unwrap_err();
    match err {
        BeansError::Navigation {
            bean_class,
            property_path,
            message,
        } => {
            assert_eq!(bean_class, "Person");
            assert_eq!(property_path, "address");
            assert_eq!(message, "Value of nested property 'address' is null");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_auto_grow_nested_list_path() {
    let (bean, wrapper) = person();
    let mut wrapper = wrapper.auto_grow_nested_paths(true);
    wrapper.set_property_value("addresses[1].city", "Paris").unwrap();

    let Value::List(list) = field(&bean, "addresses") else {
        panic!("addresses should be a list");
    };
    let items = list.read().items.clone();
    assert_eq!(items.len(), 2);
    assert_eq!(field(items[0].as_bean().unwrap(), "city"), Value::Null);
    assert_eq!(field(items[1].as_bean().unwrap(), "city"), Value::from("Paris"));
    assert_eq!(
        wrapper.get_property_value("addresses[1].city").unwrap(),
        Value::from("Paris")
    );
}

#[test]
fn test_auto_grow_nested_bean() {
    let (bean, wrapper) = person();
    let mut wrapper = wrapper.auto_grow_nested_paths(true);
    assert_eq!(wrapper.get_property_value("address.city").unwrap(), Value::Null);
    assert!(field(&bean, "address").as_bean().is_some());
}

#[test]
fn test_array_write_grows_with_defaults() {
    let (bean, wrapper) = person();
    set_field(&bean, "tags", Value::array(ValueType::String, strings(&["a", "b"])));
    let mut wrapper = wrapper.auto_grow_nested_paths(true);
    wrapper.set_property_value("tags[4]", "e").unwrap();

    assert_eq!(
        field(&bean, "tags"),
        Value::array(ValueType::String, strings(&["a", "b", "", "", "e"]))
    );
}

#[test]
fn test_array_write_without_auto_grow_keeps_array() {
    let (bean, mut wrapper) = person();
    let tags = Value::array(ValueType::String, strings(&["a", "b"]));
    set_field(&bean, "tags", tags.clone());

    let err = wrapper.set_property_value("tags[4]", "e").unwrap_err();
    assert!(matches!(err, BeansError::Index { .. }), "{:?}", err);
    assert!(field(&bean, "tags").same_instance(&tags));
    assert_eq!(field(&bean, "tags"), Value::array(ValueType::String, strings(&["a", "b"])));

    wrapper.set_property_value("tags[1]", "z").unwrap();
    assert_eq!(field(&bean, "tags"), Value::array(ValueType::String, strings(&["a", "z"])));
}

#[test]
fn test_auto_grow_respects_collection_limit() {
    let (bean, wrapper) = person();
    set_field(&bean, "tags", Value::array(ValueType::String, strings(&["a"])));
    let mut wrapper = wrapper
        .auto_grow_nested_paths(true)
        .auto_grow_collection_limit(3);

    wrapper.set_property_value("tags[2]", "c").unwrap();
    let err = wrapper.set_property_value("tags[3]", "d").unwrap_err();
    assert!(matches!(err, BeansError::Index { .. }));
    assert_eq!(
        field(&bean, "tags"),
        Value::array(ValueType::String, strings(&["a", "", "c"]))
    );
}

#[test]
fn test_list_write_fills_gaps_with_null() {
    let (bean, wrapper) = person();
    let mut wrapper = wrapper.auto_grow_nested_paths(true);
    wrapper.set_property_value("aliases[2]", "c").unwrap();
    assert_eq!(
        field(&bean, "aliases"),
        Value::list(ValueType::String, vec![Value::Null, Value::Null, "c".into()])
    );

    let strict = Value::List(Shared::new(ListValue::new(ValueType::String).rejecting_null()));
    set_field(&bean, "aliases", strict);
    let err = wrapper.set_property_value("aliases[2]", "c").unwrap_err();
    match err {
        BeansError::Index { message, .. } => {
            assert!(message.contains("does not support filling up gaps"), "{}", message)
        }
        other => panic!("unexpected error: {:?}", other),
    }
    wrapper.set_property_value("aliases[0]", "a").unwrap();
}

#[test]
fn test_set_elements_are_read_only_by_index() {
    let (bean, mut wrapper) = person();
    set_field(&bean, "labels", Value::set(ValueType::String, strings(&["x", "y"])));

    assert_eq!(wrapper.get_property_value("labels[1]").unwrap(), Value::from("y"));
    assert!(matches!(
        wrapper.get_property_value("labels[5]").unwrap_err(),
        BeansError::Index { .. }
    ));
    assert!(matches!(
        wrapper.set_property_value("labels[0]", "z").unwrap_err(),
        BeansError::Index { .. }
    ));
}

#[test]
fn test_map_keys_bypass_path_editors() {
    let (bean, mut wrapper) = person();
    set_field(
        &bean,
        "attributes",
        Value::map(ValueType::String, ValueType::String, Vec::new()),
    );
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    wrapper
        .register_custom_editor(
            None,
            Some("attributes"),
            EditorHandle::new(TextEditor::new("tagging", move |text| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Value::str(format!("edited:{}", text)))
            })),
        )
        .unwrap();

    wrapper.set_property_value("attributes[color]", "red").unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        field(&bean, "attributes"),
        Value::map(
            ValueType::String,
            ValueType::String,
            vec![("color".into(), "edited:red".into())]
        )
    );
}

#[test]
fn test_map_keys_converted_to_declared_type() {
    let (bean, wrapper) = person();
    let mut wrapper = wrapper.auto_grow_nested_paths(true);
    wrapper.set_property_value("scores[7]", "seven").unwrap();

    let Value::Map(scores) = field(&bean, "scores") else {
        panic!("scores should be a map");
    };
    assert_eq!(
        scores.read().entries.get(&Value::Int(7)).cloned(),
        Some(Value::from("seven"))
    );
    assert_eq!(wrapper.get_property_value("scores['7']").unwrap(), Value::from("seven"));
    assert_eq!(wrapper.get_property_value("scores[8]").unwrap(), Value::Null);
    assert!(matches!(
        wrapper.get_property_value("scores[x]").unwrap_err(),
        BeansError::Index { cause: Some(_), .. }
    ));
}

#[test]
fn test_nested_accessor_rebuilt_when_instance_changes() {
    let address = address_class();
    let bean = person_class(&address).instantiate().unwrap();
    let first = address.instantiate().unwrap();
    let second = address.instantiate().unwrap();
    let mut wrapper = BeanWrapper::for_bean(bean.clone());

    wrapper.set_property_value("address", first.clone()).unwrap();
    wrapper.set_property_value("address.city", "Lyon").unwrap();
    wrapper.set_property_value("address", second.clone()).unwrap();
    wrapper.set_property_value("address.city", "Nice").unwrap();

    assert_eq!(field(&first, "city"), Value::from("Lyon"));
    assert_eq!(field(&second, "city"), Value::from("Nice"));
}

#[test]
fn test_nested_accessor_inherits_path_editors() {
    let (bean, wrapper) = person();
    let mut wrapper = wrapper.auto_grow_nested_paths(true);
    wrapper
        .register_custom_editor(
            Some(&ValueType::String),
            Some("address.city"),
            EditorHandle::new(TextEditor::new("upper", |text| Ok(Value::str(text.to_uppercase())))),
        )
        .unwrap();

    wrapper.set_property_value("address.city", "paris").unwrap();
    wrapper.set_property_value("address.zip", "75001").unwrap();

    let address = field(&bean, "address");
    let address = address.as_bean().unwrap();
    assert_eq!(field(address, "city"), Value::from("PARIS"));
    assert_eq!(field(address, "zip"), Value::from("75001"));
}

#[test]
fn test_unknown_property_lists_close_matches() {
    let (_, mut wrapper) = person();
    let err = wrapper.set_property_value("nmae", "x").unwrap_err();
    assert_eq!(err.possible_matches(), &["name".to_string()][..]);
    match err {
        BeansError::UnknownProperty { message, .. } => {
            assert!(message.ends_with("Did you mean 'name'?"), "{}", message)
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_read_only_property_is_not_writable() {
    let (_, mut wrapper) = person();
    assert!(matches!(
        wrapper.set_property_value("id", "1").unwrap_err(),
        BeansError::NotWritable { .. }
    ));
    assert!(matches!(
        wrapper.get_property_value("missing").unwrap_err(),
        BeansError::NotReadable { .. }
    ));
}

#[test]
fn test_optional_value_for_missing_property_is_ignored() {
    let (_, mut wrapper) = person();
    let pv = PropertyValue::new("missing", "x").optional(true);
    wrapper.apply_property_value(&pv).unwrap();
}

#[test]
fn test_batch_collects_errors_and_applies_the_rest() {
    let (bean, mut wrapper) = person();
    let values = MutablePropertyValues::from_pairs([
        ("name", "Ann"),
        ("nmae", "typo"),
        ("age", "abc"),
        ("nickname", "Nan"),
    ])
    .unwrap();

    let err = wrapper.set_property_values(&values, false, false).unwrap_err();
    let BeansError::Batch(batch) = err else {
        panic!("expected a batch error");
    };
    assert_eq!(batch.len(), 2);
    assert!(matches!(batch.error_for("nmae"), Some(BeansError::UnknownProperty { .. })));
    assert!(matches!(batch.error_for("age"), Some(BeansError::TypeMismatch { .. })));
    assert_eq!(field(&bean, "name"), Value::from("Ann"));
    assert_eq!(field(&bean, "nickname"), Value::from("Nan"));
    assert_eq!(field(&bean, "age"), Value::Int(0));

    let err = wrapper.set_property_values(&values, true, false).unwrap_err();
    let BeansError::Batch(batch) = err else {
        panic!("expected a batch error");
    };
    assert_eq!(batch.len(), 1);
}

#[test]
fn test_batch_ignore_invalid() {
    let (bean, mut wrapper) = person();
    let values =
        MutablePropertyValues::from_pairs([("id", "1"), ("address.city", "Paris"), ("name", "Ann")])
            .unwrap();

    let err = wrapper.set_property_values(&values, false, false).unwrap_err();
    let BeansError::Batch(batch) = err else {
        panic!("expected a batch error");
    };
    assert_eq!(batch.len(), 2);

    wrapper.set_property_values(&values, false, true).unwrap();
    assert_eq!(field(&bean, "name"), Value::from("Ann"));
}

#[test]
fn test_unbound_wrapper_fails_fast() {
    let mut wrapper = BeanWrapper::new(Value::Null);
    let values = MutablePropertyValues::from_pairs([("name", "Ann")]).unwrap();
    assert!(matches!(
        wrapper.set_property_values(&values, true, true).unwrap_err(),
        BeansError::Fatal { .. }
    ));
    assert!(matches!(
        wrapper.get_property_value("name").unwrap_err(),
        BeansError::Fatal { .. }
    ));
}

#[test]
fn test_class_cast_and_invocation_failures() {
    let class = BeanClass::dynamic("Gadget")
        .method(MethodDef::reader("getCode", ValueType::Any, |_| Ok(Value::Null)))
        .method(MethodDef::writer("setCode", ValueType::Any, None, |_, v| {
            Err(InvokeError::class_cast("Code", &v))
        }))
        .method(MethodDef::writer("setFuse", ValueType::String, None, |_, _| {
            Err(InvokeError::Failed(anyhow::anyhow!("boom")))
        }))
        .build();
    let mut wrapper = BeanWrapper::for_bean(class.instantiate().unwrap());

    match wrapper.set_property_value("code", "x").unwrap_err() {
        BeansError::TypeMismatch {
            property_path,
            not_supported,
            cause,
            ..
        } => {
            assert_eq!(property_path.as_deref(), Some("code"));
            assert!(!not_supported);
            assert!(cause.is_some());
        }
        other => panic!("unexpected error: {:?}", other),
    }
    match wrapper.set_property_value("fuse", "x").unwrap_err() {
        BeansError::Invocation {
            property_path,
            cause,
        } => {
            assert_eq!(property_path, "fuse");
            assert_eq!(cause.to_string(), "boom");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_conversion_is_cached_on_the_property_value() {
    let class = person_class(&address_class());
    let pv = PropertyValue::new("age", "42");
    let plain = PropertyValue::new("name", "Ann");

    for _ in 0..2 {
        let bean = class.instantiate().unwrap();
        let mut wrapper = BeanWrapper::for_bean(bean.clone());
        wrapper.apply_property_value(&pv).unwrap();
        wrapper.apply_property_value(&plain).unwrap();
        assert_eq!(field(&bean, "age"), Value::Int(42));
        assert_eq!(field(&bean, "name"), Value::from("Ann"));
    }

    assert!(pv.is_converted());
    assert_eq!(pv.converted_value(), Some(Value::Int(42)));
    assert_eq!(pv.conversion_necessary(), Some(true));
    assert_eq!(pv.resolved_tokens(), Some(PropertyTokens::plain("age")));
    assert_eq!(pv.resolved_descriptor().map(|pd| pd.name().to_string()), Some("age".to_string()));
    assert_eq!(plain.conversion_necessary(), Some(false));
}

#[test]
fn test_linked_value_leaves_original_conversion_alone() {
    let class = person_class(&address_class());
    let original = Arc::new(PropertyValue::new("age", "36"));
    let linked = PropertyValue::linked(&original, "7");

    let first = class.instantiate().unwrap();
    BeanWrapper::for_bean(first.clone())
        .apply_property_value(&linked)
        .unwrap();
    assert_eq!(field(&first, "age"), Value::Int(7));
    assert!(!original.is_converted());
    assert_eq!(original.conversion_necessary(), None);

    let second = class.instantiate().unwrap();
    BeanWrapper::for_bean(second.clone())
        .apply_property_value(&original)
        .unwrap();
    assert_eq!(field(&second, "age"), Value::Int(36));
    assert_eq!(original.converted_value(), Some(Value::Int(36)));

    let third = class.instantiate().unwrap();
    BeanWrapper::for_bean(third.clone())
        .apply_property_value(&linked)
        .unwrap();
    assert_eq!(field(&third, "age"), Value::Int(7));
    assert_eq!(original.converted_value(), Some(Value::Int(36)));
}

#[test]
fn test_recorded_conversion_follows_property_type() {
    let counter_class = BeanClass::dynamic("Counter")
        .property("code", ValueType::Primitive(PrimitiveKind::Int))
        .build();
    let label_class = BeanClass::dynamic("Label")
        .property("code", ValueType::String)
        .build();
    let pv = PropertyValue::new("code", "42");

    let counter = counter_class.instantiate().unwrap();
    BeanWrapper::for_bean(counter.clone())
        .apply_property_value(&pv)
        .unwrap();
    assert_eq!(field(&counter, "code"), Value::Int(42));
    assert_eq!(pv.converted_value(), Some(Value::Int(42)));

    let label = label_class.instantiate().unwrap();
    BeanWrapper::for_bean(label.clone())
        .apply_property_value(&pv)
        .unwrap();
    assert_eq!(field(&label, "code"), Value::from("42"));
    assert_eq!(pv.conversion_necessary(), Some(false));

    let counter = counter_class.instantiate().unwrap();
    BeanWrapper::for_bean(counter.clone())
        .apply_property_value(&pv)
        .unwrap();
    assert_eq!(field(&counter, "code"), Value::Int(42));
}

#[test]
fn test_self_referencing_write() {
    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let base = BeanClass::dynamic("Base").build();
        let node_class = BeanClass::dynamic("Node")
            .superclass(&base)
            .property("next", ValueType::Bean(base.clone()))
            .build();
        let node = node_class.instantiate().unwrap();
        let mut wrapper = BeanWrapper::for_bean(node.clone());
        wrapper
            .set_property_value("next", Value::Bean(node.clone()))
            .unwrap();

        let stored = field(&node, "next").same_instance(&Value::Bean(node.clone()));
        let nested = wrapper
            .get_property_value("next.next")
            .unwrap()
            .same_instance(&Value::Bean(node.clone()));
        let _ = tx.send(stored && nested);
    });

    let linked = rx
        .recv_timeout(std::time::Duration::from_secs(5))
        .expect("self-referencing write did not finish");
    assert!(linked);
}

#[test]
fn test_property_metadata_queries() {
    let (bean, wrapper) = person();
    let mut wrapper = wrapper.auto_grow_nested_paths(true);
    set_field(&bean, "tags", Value::array(ValueType::String, strings(&["a"])));

    assert!(wrapper.is_readable_property("id"));
    assert!(!wrapper.is_writable_property("id"));
    assert!(wrapper.is_readable_property("tags[0]"));
    assert!(!wrapper.is_readable_property("missing"));
    assert!(!wrapper.is_writable_property("missing.city"));

    assert_eq!(
        wrapper.get_property_type("address.city").unwrap(),
        Some(ValueType::String)
    );
    assert_eq!(
        wrapper.get_property_type("age").unwrap(),
        Some(ValueType::Primitive(PrimitiveKind::Int))
    );
    assert_eq!(wrapper.get_property_type("tags[0]").unwrap(), Some(ValueType::String));
    assert_eq!(wrapper.get_property_type("missing").unwrap(), None);

    let pd = wrapper.get_property_descriptor("address.city").unwrap();
    assert_eq!(pd.name(), "city");
    assert!(matches!(
        wrapper.get_property_descriptor("address.nope").unwrap_err(),
        BeansError::UnknownProperty { .. }
    ));
    assert!(wrapper
        .property_descriptors()
        .unwrap()
        .iter()
        .any(|pd| pd.name() == "addresses"));
}

#[test]
fn test_find_custom_editor_guesses_type_from_path() {
    let (_, mut wrapper) = person();
    wrapper
        .register_custom_editor(
            Some(&ValueType::Primitive(PrimitiveKind::Int)),
            None,
            EditorHandle::new(TextEditor::new("int", |text| Ok(Value::Int(text.len() as i32)))),
        )
        .unwrap();

    let editor = wrapper.find_custom_editor(None, Some("age")).unwrap();
    assert_eq!(editor.name(), "int");
    assert!(wrapper.find_custom_editor(None, Some("name")).is_none());
}

#[test]
fn test_convert_without_writing() {
    let (bean, wrapper) = person();
    assert_eq!(wrapper.convert_for_property("age", "7").unwrap(), Value::Int(7));
    assert_eq!(field(&bean, "age"), Value::Int(0));
    assert_eq!(
        wrapper
            .convert_if_necessary("8", &ValueType::Boxed(PrimitiveKind::Long))
            .unwrap(),
        Value::Long(8)
    );
    assert!(matches!(
        wrapper.convert_for_property("missing", "7").unwrap_err(),
        BeansError::UnknownProperty { .. }
    ));
}

#[test]
fn test_old_value_reaches_the_editor() {
    let (bean, wrapper) = person();
    set_field(&bean, "name", Value::from("Ann"));
    let mut wrapper = wrapper.extract_old_value_for_editor(true);

    struct AppendingEditor {
        value: Value,
    }
    impl crate::editor::PropertyEditor for AppendingEditor {
        fn name(&self) -> &str {
            "appending"
        }
        fn set_value(&mut self, value: Value) -> anyhow::Result<()> {
            self.value = value;
            Ok(())
        }
        fn value(&self) -> Value {
            self.value.clone()
        }
        fn set_as_text(&mut self, text: &str) -> anyhow::Result<()> {
            let previous = self.value.as_str().unwrap_or_default().to_string();
            self.value = Value::str(format!("{}{}", previous, text));
            Ok(())
        }
    }

    wrapper
        .register_custom_editor(
            None,
            Some("name"),
            EditorHandle::new(AppendingEditor { value: Value::Null }),
        )
        .unwrap();
    wrapper.set_property_value("name", "+Bob").unwrap();
    assert_eq!(field(&bean, "name"), Value::from("Ann+Bob"));
}
