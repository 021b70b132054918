//! Path template matching
//!
//! A format string like `/$user/files/$path` describes how storage-relative
//! paths are laid out after the configured base prefix. The template is
//! compiled into a regex once, at handler construction, and reused for every
//! event. `$user` captures a single path segment, `$path` captures the rest
//! of the path including separators.

use regex::Regex;
use thiserror::Error;

/// Error building a matcher from a raw template
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("format ({0}) must contain exactly one $user and one $path placeholder")]
    BadPlaceholders(String),
    #[error("failed to compile format regex: {0}")]
    Regex(#[from] regex::Error),
}

/// Reason a path could not be remapped
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathMatchError {
    #[error("path ({path}) outside base path ({base})")]
    OutsideBase { path: String, base: String },
    #[error("path ({path}) doesn't match format ({format})")]
    FormatMismatch { path: String, format: String },
}

/// Compiled `$user`/`$path` template
pub struct PathTemplate {
    raw: String,
    regex: Regex,
}

impl PathTemplate {
    /// Compile a template
    ///
    /// The template is left-trimmed of a leading separator, regex
    /// metacharacters are escaped, and the two placeholders become named
    /// capture groups.
    pub fn new(template: &str) -> Result<Self, TemplateError> {
        if template.matches("$user").count() != 1 || template.matches("$path").count() != 1 {
            return Err(TemplateError::BadPlaceholders(template.to_string()));
        }

        let pattern = regex::escape(template.trim_start_matches('/'))
            .replace(r"\$user", "(?P<user>[^/]+)")
            .replace(r"\$path", "(?P<path>.*)");

        Ok(Self {
            raw: template.to_string(),
            regex: Regex::new(&pattern)?,
        })
    }

    /// The template string this matcher was built from
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Remap an absolute storage path into the logical namespace
    ///
    /// The path must start with `base_path` plus a separator; the remainder
    /// must match the compiled template. On success the logical path is
    /// `<user>/files/<path>` — the `files` segment is the fixed namespace the
    /// index stores user content under, not a template parameter.
    pub fn resolve(&self, path: &str, base_path: &str) -> Result<String, PathMatchError> {
        let relative = path
            .strip_prefix(base_path)
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or_else(|| PathMatchError::OutsideBase {
                path: path.to_string(),
                base: base_path.to_string(),
            })?;

        let mismatch = || PathMatchError::FormatMismatch {
            path: relative.to_string(),
            format: self.raw.clone(),
        };

        let captures = self.regex.captures(relative).ok_or_else(mismatch)?;
        match (captures.name("user"), captures.name("path")) {
            (Some(user), Some(sub_path)) => {
                Ok(format!("{}/files/{}", user.as_str(), sub_path.as_str()))
            }
            _ => Err(mismatch()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_default_format() {
        let template = PathTemplate::new("/$user/files/$path").unwrap();
        let logical = template.resolve("/base/foo/files/the/path", "/base").unwrap();
        assert_eq!(logical, "foo/files/the/path");
    }

    #[test]
    fn path_placeholder_spans_separators() {
        let template = PathTemplate::new("/$user/files/$path").unwrap();
        let logical = template
            .resolve("/base/foo/files/a/deeply/nested/file.txt", "/base")
            .unwrap();
        assert_eq!(logical, "foo/files/a/deeply/nested/file.txt");
    }

    #[test]
    fn outside_base_is_rejected() {
        let template = PathTemplate::new("/$user/files/$path").unwrap();
        let err = template.resolve("/other/foo/files/x", "/base").unwrap_err();
        assert_eq!(
            err,
            PathMatchError::OutsideBase {
                path: "/other/foo/files/x".to_string(),
                base: "/base".to_string(),
            }
        );
        assert!(err.to_string().contains("outside base path"));
    }

    #[test]
    fn base_prefix_requires_separator() {
        let template = PathTemplate::new("/$user/files/$path").unwrap();
        // "/based/..." starts with "/base" but is a different directory
        assert!(template.resolve("/based/foo/files/x", "/base").is_err());
    }

    #[test]
    fn format_mismatch_is_rejected() {
        let template = PathTemplate::new("/$user/files/$path").unwrap();
        let err = template.resolve("/base/foo/other/x", "/base").unwrap_err();
        assert!(matches!(err, PathMatchError::FormatMismatch { .. }));
        assert!(err.to_string().contains("doesn't match format"));
    }

    #[test]
    fn custom_format_with_extra_segment() {
        let template = PathTemplate::new("/homes/$user/data/$path").unwrap();
        let logical = template.resolve("/srv/homes/bob/data/x/y", "/srv").unwrap();
        assert_eq!(logical, "bob/files/x/y");
    }

    #[test]
    fn metacharacters_in_template_are_literal() {
        let template = PathTemplate::new("/$user/my.files/$path").unwrap();
        assert!(template.resolve("/base/u/my.files/p", "/base").is_ok());
        // "." must not act as a regex wildcard
        assert!(template.resolve("/base/u/myxfiles/p", "/base").is_err());
    }

    #[test]
    fn placeholders_are_validated() {
        assert!(matches!(
            PathTemplate::new("/$user/files"),
            Err(TemplateError::BadPlaceholders(_))
        ));
        assert!(matches!(
            PathTemplate::new("/$user/$user/$path"),
            Err(TemplateError::BadPlaceholders(_))
        ));
    }
}
