//! Parses the CLI's compact location notation: `<file>[:<scope>][@<find>]`.
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LocateParseError {
    #[error("empty locate string")]
    Empty,
    #[error("invalid line range `{0}`")]
    InvalidRange(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    Line(u32),
    LineRange(u32, u32),
    SymbolPath(String),
}

/// A text snippet to search for, optionally carrying a `<|>` cursor marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Find {
    raw: String,
}

impl Find {
    /// Split into the literal text to search for and the character offset
    /// within that text the marker indicates (0 if no marker is present).
    pub fn split_marker(&self) -> (String, usize) {
        match self.raw.find("<|>") {
            Some(idx) => {
                let mut needle = self.raw.clone();
                needle.replace_range(idx..idx + 3, "");
                (needle, idx)
            }
            None => (self.raw.clone(), 0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocateTarget {
    pub file: PathBuf,
    pub scope: Option<Scope>,
    pub find: Option<Find>,
}

impl LocateTarget {
    pub fn parse(input: &str) -> Result<Self, LocateParseError> {
        if input.is_empty() {
            return Err(LocateParseError::Empty);
        }

        let (head, find) = match input.find('@') {
            Some(idx) => (
                &input[..idx],
                Some(Find {
                    raw: input[idx + 1..].to_string(),
                }),
            ),
            None => (input, None),
        };

        let (file_part, scope) = split_scope(head)?;

        Ok(Self {
            file: PathBuf::from(file_part),
            scope,
            find,
        })
    }
}

/// Splits `file[:scope]` into its parts. A trailing `:scope` segment is only
/// recognized as a scope if it looks like a line number, a line range, or a
/// dotted symbol path — otherwise the whole string is treated as a bare path
/// (handles Windows drive letters and paths that legitimately contain `:`).
fn split_scope(head: &str) -> Result<(&str, Option<Scope>), LocateParseError> {
    let Some(idx) = head.rfind(':') else {
        return Ok((head, None));
    };
    // Don't split a Windows drive letter like `C:`.
    if idx == 1 && head.as_bytes()[0].is_ascii_alphabetic() {
        return Ok((head, None));
    }

    let file_part = &head[..idx];
    let scope_part = &head[idx + 1..];

    if scope_part.is_empty() {
        return Ok((head, None));
    }

    if let Ok(n) = scope_part.parse::<u32>() {
        return Ok((file_part, Some(Scope::Line(n))));
    }

    if let Some((a, b)) = scope_part
        .split_once(',')
        .or_else(|| scope_part.split_once('-'))
    {
        if let (Ok(a), Ok(b)) = (a.parse::<u32>(), b.parse::<u32>()) {
            if a > b {
                return Err(LocateParseError::InvalidRange(scope_part.to_string()));
            }
            return Ok((file_part, Some(Scope::LineRange(a, b))));
        }
    }

    if scope_part.contains('.')
        && !scope_part.contains('/')
        && !scope_part.contains('\\')
        && scope_part
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '_')
    {
        return Ok((file_part, Some(Scope::SymbolPath(scope_part.to_string()))));
    }

    // Didn't look like a recognized scope shape — treat the colon as part of the path.
    Ok((head, None))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_file_has_no_scope_or_find() {
        let t = LocateTarget::parse("src/main.rs").unwrap();
        assert_eq!(t.file, PathBuf::from("src/main.rs"));
        assert!(t.scope.is_none());
        assert!(t.find.is_none());
    }

    #[test]
    fn line_scope_parses_as_number() {
        let t = LocateTarget::parse("src/main.rs:42").unwrap();
        assert_eq!(t.scope, Some(Scope::Line(42)));
    }

    #[test]
    fn line_range_with_comma() {
        let t = LocateTarget::parse("src/main.rs:10,20").unwrap();
        assert_eq!(t.scope, Some(Scope::LineRange(10, 20)));
    }

    #[test]
    fn line_range_with_dash() {
        let t = LocateTarget::parse("src/main.rs:10-20").unwrap();
        assert_eq!(t.scope, Some(Scope::LineRange(10, 20)));
    }

    #[test]
    fn inverted_range_is_an_error() {
        let err = LocateTarget::parse("src/main.rs:20-10").unwrap_err();
        assert_eq!(err, LocateParseError::InvalidRange("20-10".to_string()));
    }

    #[test]
    fn dotted_symbol_path_scope() {
        let t = LocateTarget::parse("src/main.rs:Foo.bar").unwrap();
        assert_eq!(t.scope, Some(Scope::SymbolPath("Foo.bar".to_string())));
    }

    #[test]
    fn find_snippet_without_marker() {
        let t = LocateTarget::parse("src/main.rs@fn main").unwrap();
        let (needle, offset) = t.find.unwrap().split_marker();
        assert_eq!(needle, "fn main");
        assert_eq!(offset, 0);
    }

    #[test]
    fn find_snippet_with_marker() {
        let t = LocateTarget::parse("src/main.rs@fn <|>main").unwrap();
        let (needle, offset) = t.find.unwrap().split_marker();
        assert_eq!(needle, "fn main");
        assert_eq!(offset, 3);
    }

    #[test]
    fn scope_and_find_together() {
        let t = LocateTarget::parse("src/main.rs:10-20@foo").unwrap();
        assert_eq!(t.scope, Some(Scope::LineRange(10, 20)));
        assert!(t.find.is_some());
    }

    #[test]
    fn windows_drive_letter_is_not_a_scope() {
        let t = LocateTarget::parse("C:/code/main.rs").unwrap();
        assert_eq!(t.file, PathBuf::from("C:/code/main.rs"));
        assert!(t.scope.is_none());
    }

    #[test]
    fn empty_string_is_an_error() {
        assert_eq!(LocateTarget::parse(""), Err(LocateParseError::Empty));
    }
}
