//! Document codec adapters.

mod yaml;

pub use yaml::YamlCodec;

/// `text` with JSON string escapes applied and no surrounding quotes.
///
/// The result is valid inside a YAML double-quoted scalar.
pub fn escape_double_quoted(text: &str) -> String {
    let quoted = serde_json::Value::from(text).to_string();
    quoted[1..quoted.len() - 1].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_quotes_backslashes_and_controls() {
        assert_eq!(escape_double_quoted(r#"say "hi"\"#), r#"say \"hi\"\\"#);
        assert_eq!(escape_double_quoted("a\nb\tc"), "a\\nb\\tc");
        assert_eq!(escape_double_quoted("#1: x"), "#1: x");
    }
}
