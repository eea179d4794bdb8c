//! Template filters available to every fragment, script and artifact template.

use crate::crypt;
use crate::yaml;
use base64::{Engine, engine::general_purpose::STANDARD};
use minijinja::{Environment, Error, ErrorKind, Value};

/// Prefix length assumed when an address carries none.
pub const DEFAULT_CIDR_PREFIX: &str = "24";

/// Register every filter on `env`.
pub fn register(env: &mut Environment<'_>) {
    env.add_filter("shell_quote", shell_quote);
    env.add_filter("shell_array", shell_array);
    env.add_filter("sha512_hash", sha512_hash);
    env.add_filter("ip_only", ip_only);
    env.add_filter("cidr_only", cidr_only);
    env.add_filter("to_yaml", to_yaml);
    env.add_filter("to_base64", to_base64);
}

fn quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', r"'\''"))
}

/// Wrap a value in POSIX single quotes: `it's` becomes `'it'\''s'`.
pub fn shell_quote(value: Value) -> String {
    quote(&value.to_string())
}

/// Bash array literal: `["a", "b c"]` becomes `('a' 'b c')`.
pub fn shell_array(items: Value) -> Result<String, Error> {
    let quoted: Vec<String> = items
        .try_iter()?
        .map(|item| quote(&item.to_string()))
        .collect();
    Ok(format!("({})", quoted.join(" ")))
}

/// `$6$` crypt hash for `/etc/shadow`, with a fresh salt on every call.
pub fn sha512_hash(password: Value) -> String {
    crypt::sha512_hash(&password.to_string())
}

/// Address part of CIDR notation: `192.168.1.1/24` becomes `192.168.1.1`.
pub fn ip_only(cidr: Value) -> String {
    let text = cidr.to_string();
    text.split('/').next().unwrap_or_default().to_string()
}

/// Prefix part of CIDR notation: `192.168.1.1/24` becomes `24`.
pub fn cidr_only(cidr: Value) -> String {
    let text = cidr.to_string();
    match text.split_once('/') {
        Some((_, prefix)) => prefix.split('/').next().unwrap_or_default().to_string(),
        None => DEFAULT_CIDR_PREFIX.to_string(),
    }
}

/// Serialize a value as block YAML with trailing whitespace removed.
pub fn to_yaml(value: Value) -> Result<String, Error> {
    let json = serde_json::to_value(&value).map_err(|e| {
        Error::new(
            ErrorKind::InvalidOperation,
            format!("cannot convert value to YAML: {}", e),
        )
    })?;
    Ok(yaml::to_string(&json).trim_end().to_string())
}

/// Standard padded base64 of the value's text.
pub fn to_base64(value: Value) -> String {
    STANDARD.encode(value.to_string())
}
