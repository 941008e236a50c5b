//! Small string helpers shared by the transformer and the evaluator.

use lazy_static::lazy_static;
use regex::Regex;

use crate::diag::RunnerError;

lazy_static! {
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
    static ref NON_IDENT: Regex = Regex::new(r"[^a-z0-9_]").unwrap();
}

/// Decode a JSON-quoted string literal, escapes included.
pub fn unquote_string(raw: &str) -> Result<String, RunnerError> {
    serde_json::from_str::<String>(raw)
        .map_err(|_| RunnerError::syntax(format!("{} is not a valid STRING", raw)))
}

/// Lower a human label into the procedure identifier it binds to:
/// lowercase, whitespace runs become a single underscore, everything
/// outside `[a-z0-9_]` is deleted.
pub fn sanitize_label(label: &str) -> String {
    let lowered = label.to_lowercase();
    let underscored = WHITESPACE.replace_all(&lowered, "_");
    NON_IDENT.replace_all(&underscored, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_fixtures() {
        assert_eq!(sanitize_label("Hello, world!"), "hello_world");
        assert_eq!(
            sanitize_label("Check  contents w.r.t. NDA"),
            "check_contents_wrt_nda"
        );
        assert_eq!(
            sanitize_label("Check PEP8 coding standard"),
            "check_pep8_coding_standard"
        );
    }

    #[test]
    fn unquote_decodes_escapes() {
        assert_eq!(unquote_string(r#""hello""#).unwrap(), "hello");
        assert_eq!(unquote_string(r#""a\nb""#).unwrap(), "a\nb");
    }

    #[test]
    fn unquote_rejects_single_quotes() {
        assert!(unquote_string("'hello'").is_err());
    }
}
