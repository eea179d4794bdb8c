//! Structured error types for build failures.

use serde::Serialize;
use std::fmt;
use std::path::Path;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Input errors
    ConfigParse,
    DescriptorInvalid,
    FragmentInvalid,
    InvalidArgument,

    // Template errors
    TemplateNotFound,
    TemplateError,

    // Internal errors
    IoError,
}

/// Structured error for build operations.
///
/// Library functions return `anyhow::Result`; callers recover this type with
/// `downcast_ref::<BuildError>()` when they need the code or the source name.
#[derive(Debug, Serialize)]
pub struct BuildError {
    pub code: ErrorCode,
    pub message: String,
    /// Config source, fragment, or template the error belongs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl BuildError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source_name: None,
            details: None,
        }
    }

    pub fn with_source(mut self, name: impl Into<String>) -> Self {
        self.source_name = Some(name.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    // Convenience constructors

    pub fn config_parse(source_name: &str, err: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::ConfigParse,
            format!("Config source '{}' failed to parse: {}", source_name, err),
        )
        .with_source(source_name)
    }

    pub fn descriptor_invalid(path: &Path, reason: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::DescriptorInvalid,
            format!("Invalid fragment descriptor {}: {}", path.display(), reason),
        )
        .with_source(path.display().to_string())
    }

    /// A fragment rendered to text that is not parseable YAML.
    ///
    /// The rendered text is kept in `details` with 1-based line numbers.
    pub fn fragment_invalid(fragment: &str, err: impl fmt::Display, rendered: &str) -> Self {
        Self::new(ErrorCode::FragmentInvalid, err.to_string())
            .with_source(fragment)
            .with_details(numbered_lines(rendered))
    }

    pub fn template_not_found(template: &str) -> Self {
        Self::new(
            ErrorCode::TemplateNotFound,
            format!("Template not found: {}", template),
        )
        .with_source(template)
    }

    pub fn template(template: &str, err: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::TemplateError,
            format!("Failed to render {}: {}", template, err),
        )
        .with_source(template)
    }

    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidArgument, reason)
    }

    pub fn io(path: &Path, err: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::IoError,
            format!("{}: {}", path.display(), err),
        )
        .with_source(path.display().to_string())
    }
}

/// Prefix every line of `text` with a right-aligned 1-based line number.
pub fn numbered_lines(text: &str) -> String {
    text.split('\n')
        .enumerate()
        .map(|(i, line)| format!("  {:3}: {}", i + 1, line))
        .collect::<Vec<_>>()
        .join("\n")
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            ErrorCode::FragmentInvalid => {
                write!(
                    f,
                    "Fragment '{}' produced invalid YAML:\n  {}",
                    self.source_name.as_deref().unwrap_or("?"),
                    self.message
                )?;
                if let Some(ref details) = self.details {
                    write!(f, "\nRendered content:\n{}", details)?;
                }
                Ok(())
            }
            _ => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for BuildError {}

/// Return the error code if `err` wraps a [`BuildError`].
pub fn error_code(err: &anyhow::Error) -> Option<ErrorCode> {
    err.downcast_ref::<BuildError>().map(|e| e.code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbered_lines() {
        let numbered = numbered_lines("a: 1\nb: [\n");
        assert_eq!(numbered, "    1: a: 1\n    2: b: [\n    3: ");
    }

    #[test]
    fn test_fragment_invalid_display() {
        let err = BuildError::fragment_invalid("20-users", "bad indentation", "users:\n - x");
        let text = err.to_string();
        assert!(text.starts_with("Fragment '20-users' produced invalid YAML:\n  bad indentation"));
        assert!(text.contains("Rendered content:\n    1: users:\n    2:  - x"));
        assert_eq!(err.source_name.as_deref(), Some("20-users"));
    }

    #[test]
    fn test_error_code_downcast() {
        let err: anyhow::Error = BuildError::config_parse("network", "oops").into();
        assert_eq!(error_code(&err), Some(ErrorCode::ConfigParse));

        let other = anyhow::anyhow!("plain");
        assert_eq!(error_code(&other), None);
    }

    #[test]
    fn test_serialize_code() {
        let err = BuildError::template_not_found("x.tpl");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "TEMPLATE_NOT_FOUND");
        assert_eq!(json["source_name"], "x.tpl");
        assert!(json.get("details").is_none());
    }
}
