//! YAML parsing and block-style serialization.
//!
//! Documents are parsed into `serde_json::Value` trees. Serialization is done
//! here rather than by `serde_yaml` so that scalar styles are fixed:
//! - strings containing a newline are written as literal block scalars (`|`)
//! - all-digit strings, including octal-looking ones such as `0644`, are
//!   single-quoted so consumers do not read them back as numbers
//! - mapping key order is preserved and sequences inside mappings are not
//!   indented, matching what provisioning tools emit

use serde_json::{Map, Value};

const INDENT: usize = 2;

/// Parse a YAML document.
///
/// Blank or comment-only input parses to `Null`.
pub fn parse_document(text: &str) -> Result<Value, serde_yaml::Error> {
    let has_content = text.lines().any(|line| {
        let trimmed = line.trim();
        !trimmed.is_empty() && !trimmed.starts_with('#') && trimmed != "---"
    });
    if !has_content {
        return Ok(Value::Null);
    }
    serde_yaml::from_str(text)
}

/// True for values that contribute nothing when merged.
pub fn is_empty_document(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Number(n) => n.as_f64() == Some(0.0),
    }
}

/// Serialize a value as a block-style YAML document ending in a newline.
pub fn to_string(value: &Value) -> String {
    let mut out = String::new();
    match value {
        Value::Object(map) if !map.is_empty() => write_map(&mut out, map, 0),
        Value::Array(items) if !items.is_empty() => write_seq(&mut out, items, 0),
        scalar => {
            write_inline_scalar(&mut out, scalar, INDENT);
            out.push('\n');
        }
    }
    out
}

fn pad(out: &mut String, indent: usize) {
    out.extend(std::iter::repeat_n(' ', indent));
}

fn write_map(out: &mut String, map: &Map<String, Value>, indent: usize) {
    for (key, value) in map {
        pad(out, indent);
        write_string_flow(out, key);
        out.push(':');
        write_value_after_key(out, value, indent);
    }
}

/// Write the value that follows `key:`; sequences stay at the key's indent.
fn write_value_after_key(out: &mut String, value: &Value, indent: usize) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            out.push('\n');
            write_map(out, map, indent + INDENT);
        }
        Value::Array(items) if !items.is_empty() => {
            out.push('\n');
            write_seq(out, items, indent);
        }
        scalar => {
            out.push(' ');
            write_inline_scalar(out, scalar, indent + INDENT);
            out.push('\n');
        }
    }
}

fn write_seq(out: &mut String, items: &[Value], indent: usize) {
    for item in items {
        pad(out, indent);
        out.push_str("- ");
        write_seq_item(out, item, indent + INDENT);
    }
}

/// Write a sequence item whose `- ` marker has already been written.
///
/// `indent` is the column of the item content.
fn write_seq_item(out: &mut String, item: &Value, indent: usize) {
    match item {
        Value::Object(map) if !map.is_empty() => {
            // First key shares the marker line; the rest align under it.
            let mut entries = map.iter();
            if let Some((key, value)) = entries.next() {
                write_string_flow(out, key);
                out.push(':');
                write_value_after_key(out, value, indent);
            }
            for (key, value) in entries {
                pad(out, indent);
                write_string_flow(out, key);
                out.push(':');
                write_value_after_key(out, value, indent);
            }
        }
        Value::Array(items) if !items.is_empty() => {
            let mut iter = items.iter();
            if let Some(first) = iter.next() {
                out.push_str("- ");
                write_seq_item(out, first, indent + INDENT);
            }
            for rest in iter {
                pad(out, indent);
                out.push_str("- ");
                write_seq_item(out, rest, indent + INDENT);
            }
        }
        scalar => {
            write_inline_scalar(out, scalar, indent);
            out.push('\n');
        }
    }
}

/// Write a scalar (or empty collection) on the current line.
///
/// `block_indent` is where literal block lines go if the value needs one.
fn write_inline_scalar(out: &mut String, value: &Value, block_indent: usize) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) if use_literal_block(s) => write_literal_block(out, s, block_indent),
        Value::String(s) => write_string_flow(out, s),
        Value::Array(_) => out.push_str("[]"),
        Value::Object(_) => out.push_str("{}"),
    }
}

fn use_literal_block(s: &str) -> bool {
    // Block indentation is detected from the first non-empty line, so that
    // line must not start with whitespace.
    s.contains('\n')
        && s
            .split('\n')
            .find(|line| !line.is_empty())
            .is_some_and(|line| !line.starts_with([' ', '\t']))
        && !s.chars().any(|c| c != '\n' && ((c.is_control() && c != '\t') || is_unicode_special(c)))
}

/// Characters a YAML reader treats as line breaks or a byte order mark.
fn is_unicode_special(c: char) -> bool {
    matches!(c, '\u{85}' | '\u{2028}' | '\u{2029}' | '\u{FEFF}')
}

fn write_literal_block(out: &mut String, s: &str, indent: usize) {
    let (indicator, body) = match s.strip_suffix('\n') {
        Some(body) if body.ends_with('\n') => ("|+", body),
        Some(body) => ("|", body),
        None => ("|-", s),
    };
    out.push_str(indicator);
    for line in body.split('\n') {
        out.push('\n');
        if !line.is_empty() {
            pad(out, indent);
            out.push_str(line);
        }
    }
}

/// True if the string is all ASCII digits, or `0` followed by all digits.
pub fn is_numeric_like(s: &str) -> bool {
    let digits = |t: &str| !t.is_empty() && t.bytes().all(|b| b.is_ascii_digit());
    digits(s) || (s.len() > 1 && s.starts_with('0') && digits(&s[1..]))
}

fn write_string_flow(out: &mut String, s: &str) {
    if s.chars().any(|c| c.is_control() || is_unicode_special(c)) {
        write_double_quoted(out, s);
    } else if is_numeric_like(s) || needs_quotes(s) {
        out.push('\'');
        out.push_str(&s.replace('\'', "''"));
        out.push('\'');
    } else {
        out.push_str(s);
    }
}

fn write_double_quoted(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\u{85}' => out.push_str("\\N"),
            '\u{2028}' => out.push_str("\\L"),
            '\u{2029}' => out.push_str("\\P"),
            c if c.is_control() || c == '\u{FEFF}' => {
                out.push_str(&format!("\\u{:04X}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

/// Plain-scalar safety check: would this string read back as something else
/// or break the surrounding syntax?
fn needs_quotes(s: &str) -> bool {
    if s.is_empty() || s.trim() != s {
        return true;
    }
    // Document markers.
    if s.starts_with("---") || s.starts_with("...") {
        return true;
    }

    let lower = s.to_ascii_lowercase();
    if matches!(
        lower.as_str(),
        "~" | "null" | "true" | "false" | "yes" | "no" | "on" | "off" | "y" | "n"
    ) {
        return true;
    }

    if looks_numeric(s) {
        return true;
    }

    let first = s.chars().next().unwrap_or(' ');
    if matches!(
        first,
        '-' | '?' | ':' | ',' | '[' | ']' | '{' | '}' | '#' | '&' | '*' | '!' | '|' | '>' | '\''
            | '"' | '%' | '@' | '`'
    ) && !(first == '-' && s.len() > 1 && !s[1..].starts_with(' ') && !looks_numeric(s))
    {
        return true;
    }

    s.contains(": ") || s.contains(" #") || s.ends_with(':')
}

/// Integer, float, or YAML special float spelling.
fn looks_numeric(s: &str) -> bool {
    if s.parse::<f64>().is_ok() {
        return true;
    }
    let lower = s.to_ascii_lowercase();
    if matches!(lower.as_str(), ".inf" | "-.inf" | "+.inf" | ".nan") {
        return true;
    }
    // Hex, octal and binary integer forms.
    let unsigned = lower.trim_start_matches(['+', '-']);
    ["0x", "0o", "0b"].iter().any(|prefix| {
        unsigned
            .strip_prefix(prefix)
            .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_hexdigit() || c == '_'))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_document() {
        assert_eq!(parse_document("a: 1\nb: [x, y]\n").unwrap(), json!({"a": 1, "b": ["x", "y"]}));
        assert_eq!(parse_document("").unwrap(), Value::Null);
        assert_eq!(parse_document("# only a comment\n\n").unwrap(), Value::Null);
        assert!(parse_document("a: [1, 2\n").is_err());
    }

    #[test]
    fn test_is_numeric_like() {
        assert!(is_numeric_like("644"));
        assert!(is_numeric_like("0644"));
        assert!(is_numeric_like("0"));
        assert!(!is_numeric_like(""));
        assert!(!is_numeric_like("0x1"));
        assert!(!is_numeric_like("12a"));
    }

    #[test]
    fn test_numeric_strings_quoted() {
        let doc = json!({"permissions": "0644", "mode": "755", "count": 3});
        assert_eq!(to_string(&doc), "permissions: '0644'\nmode: '755'\ncount: 3\n");
    }

    #[test]
    fn test_multiline_literal_block() {
        let doc = json!({"write_files": [{"path": "/etc/x", "content": "line1\nline2\n"}]});
        assert_eq!(
            to_string(&doc),
            "write_files:\n- path: /etc/x\n  content: |\n    line1\n    line2\n"
        );
    }

    #[test]
    fn test_literal_block_chomping() {
        assert_eq!(to_string(&json!({"a": "x\ny"})), "a: |-\n  x\n  y\n");
        assert_eq!(to_string(&json!({"a": "x\n\n"})), "a: |+\n  x\n\n");
        assert_eq!(to_string(&json!({"a": "x\n\ny\n"})), "a: |\n  x\n\n  y\n");
    }

    #[test]
    fn test_nested_structures() {
        let doc = json!({
            "users": [{"name": "admin", "groups": ["sudo", "docker"]}],
            "network": {"version": 2, "ethernets": {}},
            "packages": []
        });
        assert_eq!(
            to_string(&doc),
            "users:\n- name: admin\n  groups:\n  - sudo\n  - docker\nnetwork:\n  version: 2\n  ethernets: {}\npackages: []\n"
        );
    }

    #[test]
    fn test_nested_sequences() {
        let doc = json!({"runcmd": [["echo", "hi"], "reboot"]});
        assert_eq!(to_string(&doc), "runcmd:\n- - echo\n  - hi\n- reboot\n");
    }

    #[test]
    fn test_ambiguous_strings_quoted() {
        let doc = json!({"a": "yes", "b": "1.5", "c": "", "d": "key: value", "e": "* glob", "f": "it's"});
        assert_eq!(
            to_string(&doc),
            "a: 'yes'\nb: '1.5'\nc: ''\nd: 'key: value'\ne: '* glob'\nf: it's\n"
        );
    }

    #[test]
    fn test_plain_dash_strings() {
        let doc = json!(["-flag", "- item", "-5"]);
        assert_eq!(to_string(&doc), "- -flag\n- '- item'\n- '-5'\n");
    }

    #[test]
    fn test_control_chars_double_quoted() {
        let doc = json!({"a": "tab\there"});
        assert_eq!(to_string(&doc), "a: \"tab\\there\"\n");
    }

    #[test]
    fn test_output_parses_back() {
        let doc = json!({
            "hostname": "node-1",
            "write_files": [{"path": "/a", "permissions": "0600", "content": "#!/bin/sh\necho 'hi'\n"}],
            "bootcmd": [["sh", "-c", "true"]],
            "flags": {"enabled": true, "ratio": 0.5, "missing": null},
            "x\u{2028}y": "a\u{85}b\u{2029}c",
            "bom": "\u{FEFF}start",
            "markers": ["---", "...", "--- x", "... y"],
            "block": "x\n  y\u{2028}\n"
        });
        let text = to_string(&doc);
        assert_eq!(parse_document(&text).unwrap(), doc);
    }

    #[test]
    fn test_top_level_scalars_parse_back() {
        for value in [
            json!("x\n  y\n"),
            json!("line1\nline2"),
            json!("---"),
            json!("..."),
            json!("x\u{2028}y"),
            json!("0644"),
            json!("quote \" and \\ slash"),
            json!(""),
            json!(12),
        ] {
            let text = to_string(&value);
            assert_eq!(parse_document(&text).unwrap(), value, "{:?}", text);
        }
    }

    #[test]
    fn test_top_level_block_indented() {
        assert_eq!(to_string(&json!("x\n  y\n")), "|\n  x\n    y\n");
    }

    #[test]
    fn test_unicode_breaks_escaped() {
        assert_eq!(
            to_string(&json!({"a\u{2028}b": "c\u{85}d\u{2029}\u{FEFF}"})),
            "\"a\\Lb\": \"c\\Nd\\P\\uFEFF\"\n"
        );
    }

    #[test]
    fn test_scalar_document() {
        assert_eq!(to_string(&json!("plain")), "plain\n");
        assert_eq!(to_string(&json!({})), "{}\n");
    }

    #[test]
    fn test_is_empty_document() {
        assert!(is_empty_document(&Value::Null));
        assert!(is_empty_document(&json!({})));
        assert!(is_empty_document(&json!([])));
        assert!(!is_empty_document(&json!({"a": 1})));
    }
}
