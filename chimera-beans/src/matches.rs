//! 相近属性名
//!
//! 找不到可写属性时，按编辑距离列出名称相近的可写属性作为提示。

use crate::introspection::IntrospectionResults;
use crate::utils::naming::string_distance;

/// 默认最大编辑距离
pub const DEFAULT_MAX_DISTANCE: usize = 2;

/// 某个属性名的相近候选
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyMatches {
    property_name: String,
    possible_matches: Vec<String>,
}

impl PropertyMatches {
    /// 在类的可写属性中查找
    pub fn for_property(property_name: &str, results: &IntrospectionResults) -> Self {
        Self::with_max_distance(property_name, results, DEFAULT_MAX_DISTANCE)
    }

    pub fn with_max_distance(
        property_name: &str,
        results: &IntrospectionResults,
        max_distance: usize,
    ) -> Self {
        let candidates = results
            .property_descriptors()
            .into_iter()
            .filter(|pd| pd.is_writable())
            .map(|pd| pd.name().to_string());
        Self::from_candidates(property_name, candidates, max_distance)
    }

    /// 在给定的名称中查找，结果按字母排序
    pub fn from_candidates(
        property_name: &str,
        candidates: impl IntoIterator<Item = String>,
        max_distance: usize,
    ) -> Self {
        let mut possible_matches: Vec<String> = candidates
            .into_iter()
            .filter(|candidate| string_distance(property_name, candidate) <= max_distance)
            .collect();
        possible_matches.sort();
        possible_matches.dedup();
        Self {
            property_name: property_name.to_string(),
            possible_matches,
        }
    }

    pub fn property_name(&self) -> &str {
        &self.property_name
    }

    pub fn possible_matches(&self) -> &[String] {
        &self.possible_matches
    }

    pub fn into_possible_matches(self) -> Vec<String> {
        self.possible_matches
    }

    /// 不可写属性的错误信息
    pub fn build_error_message(&self) -> String {
        let mut msg = format!(
            "Bean property '{}' is not writable or has an invalid setter method. ",
            self.property_name
        );
        if self.possible_matches.is_empty() {
            msg.push_str("Does the parameter type of the setter match the return type of the getter?");
        } else {
            msg.push_str("Did you mean ");
            let count = self.possible_matches.len();
            for (i, candidate) in self.possible_matches.iter().enumerate() {
                msg.push('\'');
                msg.push_str(candidate);
                if i + 2 < count {
                    msg.push_str("', ");
                } else if i + 2 == count {
                    msg.push_str("', or ");
                }
            }
            msg.push_str("'?");
        }
        msg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_matches_within_distance() {
        let matches =
            PropertyMatches::from_candidates("nme", names(&["name", "age", "game", "nickname"]), 2);
        assert_eq!(matches.possible_matches(), &names(&["age", "game", "name"])[..]);
        assert_eq!(
            matches.build_error_message(),
            "Bean property 'nme' is not writable or has an invalid setter method. \
             Did you mean 'age', 'game', or 'name'?"
        );
    }

    #[test]
    fn test_hint_variants() {
        let one = PropertyMatches::from_candidates("agee", names(&["age"]), 2);
        assert!(one.build_error_message().ends_with("Did you mean 'age'?"));

        let two = PropertyMatches::from_candidates("nam", names(&["name", "nap"]), 1);
        assert!(two.build_error_message().ends_with("Did you mean 'name', or 'nap'?"));

        let none = PropertyMatches::from_candidates("zzzzzz", names(&["age"]), 2);
        assert!(none.possible_matches().is_empty());
        assert!(none
            .build_error_message()
            .ends_with("Does the parameter type of the setter match the return type of the getter?"));
    }
}
