//! Identifier helpers for generated runtime names

use crate::value::OptionValue;

fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '$' || c == '_'
}

fn is_identifier_part(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '$'
}

/// Sanitize a string into a JavaScript identifier
///
/// A leading character that cannot start an identifier is prefixed with `_`,
/// then every run of characters outside `[a-zA-Z0-9$]` collapses to one `_`.
pub fn to_identifier(input: &str) -> String {
    let mut prefixed = String::with_capacity(input.len() + 1);
    if input.chars().next().is_some_and(|c| !is_identifier_start(c)) {
        prefixed.push('_');
    }
    prefixed.push_str(input);

    let mut out = String::with_capacity(prefixed.len());
    let mut in_run = false;
    for c in prefixed.chars() {
        if is_identifier_part(c) {
            out.push(c);
            in_run = false;
        } else if !in_run {
            out.push('_');
            in_run = true;
        }
    }
    out
}

/// [`to_identifier`] over an option value; non-strings sanitize to `""`
pub fn value_to_identifier(value: Option<&OptionValue>) -> String {
    match value {
        Some(OptionValue::String(s)) => to_identifier(s),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_identifier_unchanged() {
        assert_eq!(to_identifier("MyLib"), "MyLib");
        assert_eq!(to_identifier("$jq"), "$jq");
    }

    #[test]
    fn test_invalid_characters_collapse() {
        assert_eq!(to_identifier("my-lib"), "my_lib");
        assert_eq!(to_identifier("@scope/pkg--name"), "_scope_pkg_name");
    }

    #[test]
    fn test_leading_digit_prefixed() {
        assert_eq!(to_identifier("1lib"), "_1lib");
    }

    #[test]
    fn test_empty_and_non_string() {
        assert_eq!(to_identifier(""), "");
        assert_eq!(value_to_identifier(None), "");
        assert_eq!(value_to_identifier(Some(&OptionValue::strings(&["A", "B"]))), "");
    }
}
