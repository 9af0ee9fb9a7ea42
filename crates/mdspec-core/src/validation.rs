//! Compiles validation list items into a single boolean expression.
//!
//! | item | expression |
//! |------|------------|
//! | `cel: EXPR` | `EXPR` |
//! | `contains: "TEXT"` | `stdout.contains("TEXT")` |
//! | `regex: PATTERN` | `stdout.matches("PATTERN")` |
//! | `not: contains: "TEXT"` | `!stdout.contains("TEXT")` |
//! | `not: EXPR` | `!(EXPR)` |
//! | anything else | passed through unchanged |
//!
//! Label items such as `Validation` or `Checks:` that only introduce nested
//! rules are dropped.

/// Tokens that mark a markdown list as a validation list.
const VALIDATION_MARKERS: [&str; 3] = ["cel:", "regex:", "contains:"];

/// Whether a list whose concatenated item text is `text` holds validations.
#[must_use]
pub fn is_validation_list(text: &str) -> bool {
    text.to_ascii_lowercase().contains("validation")
        || VALIDATION_MARKERS.iter().any(|marker| text.contains(marker))
}

/// Compile validation items into one expression joined with `&&`.
///
/// Empty items are ignored. A single item compiles to its fragment verbatim;
/// with several items, fragments containing `||` are parenthesized so the
/// conjunction keeps its meaning.
#[must_use]
pub fn compile<S: AsRef<str>>(items: &[S]) -> String {
    let fragments: Vec<String> = items
        .iter()
        .map(|item| item.as_ref().trim())
        .filter(|item| !item.is_empty() && !is_label(item))
        .map(compile_item)
        .filter(|fragment| !fragment.is_empty())
        .collect();

    if fragments.len() == 1 {
        return fragments.into_iter().next().unwrap_or_default();
    }

    fragments
        .into_iter()
        .map(|fragment| {
            if fragment.contains("||") {
                format!("({fragment})")
            } else {
                fragment
            }
        })
        .collect::<Vec<_>>()
        .join(" && ")
}

/// Compile one validation item.
#[must_use]
pub fn compile_item(item: &str) -> String {
    let item = item.trim();

    if let Some(expr) = strip_key(item, "cel") {
        return expr.to_owned();
    }
    if let Some(text) = strip_key(item, "contains") {
        return contains_expression(text);
    }
    if let Some(pattern) = strip_key(item, "regex") {
        return format!("stdout.matches(\"{}\")", escape_quotes(unquote(pattern)));
    }
    if let Some(inner) = strip_key(item, "not") {
        if let Some(text) = strip_key(inner, "contains") {
            return format!("!{}", contains_expression(text));
        }
        return format!("!({})", compile_item(inner));
    }

    item.to_owned()
}

fn contains_expression(text: &str) -> String {
    format!("stdout.contains(\"{}\")", escape_quotes(unquote(text)))
}

/// Whether `item` only introduces the rules nested under it: a bare
/// `key:` with nothing after it, or a colon-free label naming validation.
fn is_label(item: &str) -> bool {
    if let Some(key) = item.strip_suffix(':') {
        return !key.contains(':');
    }
    !item.contains(':') && item.to_ascii_lowercase().contains("validation")
}

/// Return the value after `key:` when `item` starts with it.
fn strip_key<'item>(item: &'item str, key: &str) -> Option<&'item str> {
    let rest = item.strip_prefix(key)?;
    let value = rest.strip_prefix(':')?;
    Some(value.trim())
}

/// Strip one pair of matching surrounding quotes or backticks.
fn unquote(text: &str) -> &str {
    let text = text.trim();
    for quote in ['"', '\'', '`'] {
        if text.len() >= 2 && text.starts_with(quote) && text.ends_with(quote) {
            return &text[1..text.len() - 1];
        }
    }
    text
}

/// Escape embedded double quotes that are not already escaped.
fn escape_quotes(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    let mut previous = None;
    for current in text.chars() {
        if current == '"' && previous != Some('\\') {
            escaped.push('\\');
        }
        escaped.push(current);
        previous = Some(current);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_contains() {
        assert_eq!(compile(&[r#"not: contains: "error""#]), r#"!stdout.contains("error")"#);
    }

    #[test]
    fn test_two_items_join() {
        assert_eq!(
            compile(&["cel: exitCode == 0", r#"contains: "OK""#]),
            r#"exitCode == 0 && stdout.contains("OK")"#
        );
    }

    #[test]
    fn test_single_item_verbatim() {
        assert_eq!(compile(&["cel: a || b"]), "a || b");
    }

    #[test]
    fn test_disjunction_parenthesized_in_conjunction() {
        assert_eq!(compile(&["cel: a || b", "cel: c"]), "(a || b) && c");
    }

    #[test]
    fn test_regex_escapes_quotes() {
        assert_eq!(
            compile_item(r#"regex: say "hi" \d+"#),
            r#"stdout.matches("say \"hi\" \d+")"#
        );
        assert_eq!(compile_item(r#"regex: "^v\d+""#), r#"stdout.matches("^v\d+")"#);
    }

    #[test]
    fn test_not_expression() {
        assert_eq!(compile_item("not: exitCode == 0"), "!(exitCode == 0)");
        assert_eq!(
            compile_item("not: regex: fail"),
            r#"!(stdout.matches("fail"))"#
        );
    }

    #[test]
    fn test_unquoted_contains() {
        assert_eq!(compile_item("contains: ready"), r#"stdout.contains("ready")"#);
    }

    #[test]
    fn test_passthrough() {
        assert_eq!(compile_item("json.count: 3"), "json.count: 3");
        assert_eq!(compile_item("exitCode == 1"), "exitCode == 1");
    }

    #[test]
    fn test_empty_items_skipped() {
        assert_eq!(compile(&["", "  ", "cel: x"]), "x");
        assert_eq!(compile::<&str>(&[]), "");
    }

    #[test]
    fn test_label_items_dropped() {
        assert_eq!(
            compile(&["Validation", r#"contains: "ok""#]),
            r#"stdout.contains("ok")"#
        );
        assert_eq!(
            compile(&["Validation rules:", "Checks:", "cel: exitCode == 0"]),
            "exitCode == 0"
        );
        assert_eq!(compile(&["exitCode == 1"]), "exitCode == 1");
    }

    #[test]
    fn test_is_validation_list() {
        assert!(is_validation_list("Validation rules"));
        assert!(is_validation_list(r#"contains: "x""#));
        assert!(is_validation_list("cel: true"));
        assert!(!is_validation_list("install the tool\nrun it"));
    }
}
