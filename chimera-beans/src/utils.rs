//! Utility functions for the property access layer
//!
//! Naming helpers shared by the introspector, the accessor builders and the
//! lenient property lookup.

/// Naming convention utilities for bean properties
pub mod naming {
    /// Upper-cases the first character, leaving the rest untouched.
    ///
    /// # Examples
    ///
    /// ```
    /// use chimera_beans::utils::naming::capitalize;
    ///
    /// assert_eq!(capitalize("name"), "Name");
    /// assert_eq!(capitalize("url"), "Url");
    /// assert_eq!(capitalize(""), "");
    /// ```
    pub fn capitalize(s: &str) -> String {
        change_first(s, true)
    }

    /// Lower-cases the first character, leaving the rest untouched.
    ///
    /// ```
    /// use chimera_beans::utils::naming::uncapitalize;
    ///
    /// assert_eq!(uncapitalize("Name"), "name");
    /// assert_eq!(uncapitalize("URL"), "uRL");
    /// ```
    pub fn uncapitalize(s: &str) -> String {
        change_first(s, false)
    }

    fn change_first(s: &str, upper: bool) -> String {
        let mut chars = s.chars();
        match chars.next() {
            None => String::new(),
            Some(first) => {
                let mut result = String::with_capacity(s.len());
                if upper {
                    result.extend(first.to_uppercase());
                } else {
                    result.extend(first.to_lowercase());
                }
                result.push_str(chars.as_str());
                result
            }
        }
    }

    /// Derives a property name from the remainder of an accessor name.
    ///
    /// Follows the JavaBeans rule: when the first two characters are both
    /// upper case the name is left alone, so `URL` stays `URL` while `Name`
    /// becomes `name`.
    ///
    /// ```
    /// use chimera_beans::utils::naming::decapitalize;
    ///
    /// assert_eq!(decapitalize("Name"), "name");
    /// assert_eq!(decapitalize("URL"), "URL");
    /// assert_eq!(decapitalize("X"), "x");
    /// ```
    pub fn decapitalize(s: &str) -> String {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(a), Some(b)) if a.is_uppercase() && b.is_uppercase() => s.to_string(),
            _ => uncapitalize(s),
        }
    }

    /// Levenshtein distance between two property names, case sensitive.
    pub fn string_distance(a: &str, b: &str) -> usize {
        let b_chars: Vec<char> = b.chars().collect();
        let mut previous: Vec<usize> = (0..=b_chars.len()).collect();
        let mut current = vec![0; b_chars.len() + 1];

        for (i, ca) in a.chars().enumerate() {
            current[0] = i + 1;
            for (j, cb) in b_chars.iter().enumerate() {
                let cost = if ca == *cb { 0 } else { 1 };
                current[j + 1] = (previous[j + 1] + 1)
                    .min(current[j] + 1)
                    .min(previous[j] + cost);
            }
            std::mem::swap(&mut previous, &mut current);
        }

        previous[b_chars.len()]
    }
}
