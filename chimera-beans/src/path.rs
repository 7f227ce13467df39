//! 属性路径解析
//!
//! 路径语法：`.` 分隔嵌套属性，`[...]` 表示索引或映射键，键可以用单引号或双引号包裹，
//! 例如 `orders[0].items['sku'].price`。
//!
//! [`PropertyTokens::parse`] 只处理单个路径段内的方括号键，按 `.` 拆分嵌套路径由访问器负责。

/// 嵌套属性分隔符
pub const NESTED_PROPERTY_SEPARATOR: char = '.';
/// 键前缀
pub const PROPERTY_KEY_PREFIX: char = '[';
/// 键后缀
pub const PROPERTY_KEY_SUFFIX: char = ']';

/// 单个路径段的解析结果
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyTokens {
    /// 去掉所有键之后的属性名
    pub actual_name: String,
    /// 规范形式：`actual_name[k1][k2]`，可作为稳定的缓存键
    pub canonical_name: String,
    pub keys: Vec<String>,
}

impl PropertyTokens {
    /// 解析路径段
    ///
    /// 未闭合的 `[` 按普通文本处理，不报错。
    pub fn parse(property_name: &str) -> Self {
        let mut actual_name: Option<&str> = None;
        let mut keys = Vec::new();
        let mut search_index = Some(0);

        while let Some(from) = search_index.take() {
            let Some(key_start) = property_name[from..]
                .find(PROPERTY_KEY_PREFIX)
                .map(|i| i + from)
            else {
                break;
            };
            let Some(key_end) = key_end(property_name, key_start + 1) else {
                break;
            };
            if actual_name.is_none() {
                actual_name = Some(&property_name[..key_start]);
            }
            keys.push(strip_quotes(&property_name[key_start + 1..key_end]).to_string());
            search_index = Some(key_end + 1);
        }

        let actual_name = actual_name.unwrap_or(property_name).to_string();
        let mut canonical_name = actual_name.clone();
        for key in &keys {
            canonical_name.push(PROPERTY_KEY_PREFIX);
            canonical_name.push_str(key);
            canonical_name.push(PROPERTY_KEY_SUFFIX);
        }
        Self {
            actual_name,
            canonical_name,
            keys,
        }
    }

    /// 是否带有索引或映射键
    pub fn is_keyed(&self) -> bool {
        !self.keys.is_empty()
    }

    pub fn last_key(&self) -> Option<&str> {
        self.keys.last().map(String::as_str)
    }

    /// 去掉最后一个键，规范名保持不变
    pub fn without_last_key(&self) -> Self {
        let mut keys = self.keys.clone();
        keys.pop();
        Self {
            actual_name: self.actual_name.clone(),
            canonical_name: self.canonical_name.clone(),
            keys,
        }
    }

    /// 只含属性名、不含键的 token
    pub fn plain(actual_name: &str) -> Self {
        Self {
            actual_name: actual_name.to_string(),
            canonical_name: actual_name.to_string(),
            keys: Vec::new(),
        }
    }
}

/// 从 `start` 开始查找与之匹配的 `]`，嵌套的方括号会被配对
fn key_end(property_name: &str, start: usize) -> Option<usize> {
    let mut unclosed_prefixes = 0usize;
    for (i, b) in property_name.bytes().enumerate().skip(start) {
        match b {
            b'[' => unclosed_prefixes += 1,
            b']' => {
                if unclosed_prefixes == 0 {
                    return Some(i);
                }
                unclosed_prefixes -= 1;
            }
            _ => {}
        }
    }
    None
}

fn strip_quotes(key: &str) -> &str {
    let quoted = (key.starts_with('\'') && key.ends_with('\''))
        || (key.starts_with('"') && key.ends_with('"'));
    if key.len() > 1 && quoted {
        &key[1..key.len() - 1]
    } else {
        key
    }
}

fn nested_separator_index(path: &str, last: bool) -> Option<usize> {
    let mut in_key = false;
    let bytes = path.as_bytes();
    let check = |i: usize, in_key: &mut bool| match bytes[i] {
        b'[' | b']' => {
            *in_key = !*in_key;
            false
        }
        b'.' => !*in_key,
        _ => false,
    };
    if last {
        (0..bytes.len()).rev().find(|&i| check(i, &mut in_key))
    } else {
        (0..bytes.len()).find(|&i| check(i, &mut in_key))
    }
}

/// 第一个不在方括号内的 `.` 的位置
pub fn first_nested_separator(path: &str) -> Option<usize> {
    nested_separator_index(path, false)
}

/// 最后一个不在方括号内的 `.` 的位置
pub fn last_nested_separator(path: &str) -> Option<usize> {
    nested_separator_index(path, true)
}

/// 去掉末尾键之后的属性名：`map[key]` -> `map`
pub fn property_name(path: &str) -> &str {
    if path.ends_with(PROPERTY_KEY_SUFFIX) {
        if let Some(index) = path.find(PROPERTY_KEY_PREFIX) {
            return &path[..index];
        }
    }
    path
}

/// 路径是否包含嵌套或索引访问
pub fn is_nested_or_indexed(path: &str) -> bool {
    path.contains([NESTED_PROPERTY_SEPARATOR, PROPERTY_KEY_PREFIX])
}

/// `registered_path` 是否就是 `property_path`，或者只是在其后多了一个键
pub fn matches_property(registered_path: &str, property_path: &str) -> bool {
    if !registered_path.starts_with(property_path) {
        return false;
    }
    if registered_path.len() == property_path.len() {
        return true;
    }
    if registered_path.as_bytes()[property_path.len()] != b'[' {
        return false;
    }
    registered_path[property_path.len() + 1..]
        .find(PROPERTY_KEY_SUFFIX)
        .map(|i| i + property_path.len() + 1)
        == Some(registered_path.len() - 1)
}

/// 去掉整条路径中所有键的引号：`map["key"].items['a']` -> `map[key].items[a]`
pub fn canonical_property_name(path: &str) -> String {
    let mut result = path.to_string();
    let mut search_index = Some(0);
    while let Some(from) = search_index.take() {
        let Some(key_start) = result[from..].find(PROPERTY_KEY_PREFIX).map(|i| i + from) else {
            break;
        };
        let Some(mut key_end) = result[key_start + 1..]
            .find(PROPERTY_KEY_SUFFIX)
            .map(|i| i + key_start + 1)
        else {
            break;
        };
        let key = &result[key_start + 1..key_end];
        let quoted = key.len() > 1
            && ((key.starts_with('\'') && key.ends_with('\''))
                || (key.starts_with('"') && key.ends_with('"')));
        if quoted {
            result.remove(key_end - 1);
            result.remove(key_start + 1);
            key_end -= 2;
        }
        search_index = Some(key_end + 1);
    }
    result
}

pub fn canonical_property_names<'a>(paths: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    paths.into_iter().map(canonical_property_name).collect()
}
