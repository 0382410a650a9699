//! Route path patterns.
//!
//! A pattern is a `/` separated list of segments:
//! - `user`: a literal, compared case-sensitively
//! - `*`: exactly one non-empty segment
//! - `{id}`: exactly one non-empty segment, captured percent-decoded as the variable `id`
//! - `**`: zero or more trailing segments, only allowed as the last segment
//!
//! ```
//! use micro_dispatch::router::PathPattern;
//!
//! let pattern = PathPattern::parse("/user/{id}").unwrap();
//! let params = pattern.matches("/user/42").unwrap();
//! assert_eq!(params.get("id"), Some("42"));
//! assert!(pattern.matches("/user/42/extra").is_none());
//! ```

use crate::PathParams;
use crate::error::PatternError;
use percent_encoding::percent_decode_str;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Wildcard,
    MultiWildcard,
    Variable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
    literal_prefix: usize,
}

impl PathPattern {
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        let Some(rest) = pattern.strip_prefix('/') else {
            return Err(PatternError::MissingLeadingSlash { pattern: pattern.to_owned() });
        };

        let mut segments = Vec::new();
        if !rest.is_empty() {
            let parts = rest.split('/').collect::<Vec<_>>();
            let last = parts.len() - 1;
            for (index, part) in parts.into_iter().enumerate() {
                let segment = parse_segment(pattern, part)?;
                if segment == Segment::MultiWildcard && index != last {
                    return Err(PatternError::MisplacedMultiWildcard { pattern: pattern.to_owned() });
                }
                if let Segment::Variable(name) = &segment
                    && segments.iter().any(|s| matches!(s, Segment::Variable(n) if n == name))
                {
                    return Err(PatternError::DuplicateVariable { pattern: pattern.to_owned(), name: name.clone() });
                }
                segments.push(segment);
            }
        }

        let literal_prefix = segments.iter().take_while(|s| matches!(s, Segment::Literal(_))).count();
        Ok(Self { raw: pattern.to_owned(), segments, literal_prefix })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Number of leading literal segments, the primary tie-break between patterns
    /// matching the same path.
    pub fn literal_prefix(&self) -> usize {
        self.literal_prefix
    }

    /// True when the pattern has no wildcard or variable segment.
    pub fn is_exact(&self) -> bool {
        self.literal_prefix == self.segments.len()
    }

    /// Matches `path` segment by segment, returning the captured variables.
    ///
    /// Literals compare against the raw segment. Variables are percent-decoded, and a
    /// segment that does not decode to UTF-8 does not match.
    pub fn matches(&self, path: &str) -> Option<PathParams> {
        let path_segments = split_path(path)?;
        let mut params = PathParams::empty();

        for (index, segment) in self.segments.iter().enumerate() {
            if *segment == Segment::MultiWildcard {
                return Some(params);
            }

            let value = path_segments.get(index)?;
            match segment {
                Segment::Literal(literal) if literal != value => return None,
                Segment::Variable(name) => params.push(name.as_str(), percent_decode_str(value).decode_utf8().ok()?),
                _ => {}
            }
        }

        (path_segments.len() == self.segments.len()).then_some(params)
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn parse_segment(pattern: &str, part: &str) -> Result<Segment, PatternError> {
    match part {
        "" => Err(PatternError::EmptySegment { pattern: pattern.to_owned() }),
        "*" => Ok(Segment::Wildcard),
        "**" => Ok(Segment::MultiWildcard),
        _ => match part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
            Some(name) if is_variable_name(name) => Ok(Segment::Variable(name.to_owned())),
            Some(_) => Err(PatternError::InvalidVariable { pattern: pattern.to_owned(), segment: part.to_owned() }),
            None if part.contains(['{', '}']) => {
                Err(PatternError::InvalidVariable { pattern: pattern.to_owned(), segment: part.to_owned() })
            }
            None => Ok(Segment::Literal(part.to_owned())),
        },
    }
}

fn is_variable_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-')
}

/// Splits a request path into segments, `None` when the path is not absolute or has an
/// empty segment (`//`, or a trailing `/` on a non-root path).
fn split_path(path: &str) -> Option<Vec<&str>> {
    let rest = path.strip_prefix('/')?;
    if rest.is_empty() {
        return Some(Vec::new());
    }

    let segments = rest.split('/').collect::<Vec<_>>();
    if segments.iter().any(|s| s.is_empty()) {
        return None;
    }
    Some(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(raw: &str) -> PathPattern {
        PathPattern::parse(raw).unwrap()
    }

    #[test]
    fn test_exact_pattern_matches_only_itself() {
        let cases = ["/", "/hello", "/user/info", "/a/b/c"];
        for p in cases {
            for x in cases {
                assert_eq!(pattern(p).matches(x).is_some(), p == x, "pattern {p} path {x}");
            }
        }
        assert!(pattern("/hello").matches("/Hello").is_none());
        assert!(pattern("/hello").is_exact());
    }

    #[test]
    fn test_variable() {
        let params = pattern("/user/{id}").matches("/user/42").unwrap();
        assert_eq!(params.len(), 1);
        assert_eq!(params.get("id"), Some("42"));

        assert!(pattern("/user/{id}").matches("/user/42/extra").is_none());
        assert!(pattern("/user/{id}").matches("/user").is_none());
        assert!(pattern("/user/{id}").matches("/user/").is_none());
    }

    #[test]
    fn test_variable_is_percent_decoded() {
        let p = pattern("/user/{name}");
        assert_eq!(p.matches("/user/a%20b").unwrap().get("name"), Some("a b"));
        assert_eq!(p.matches("/user/%E4%B8%AD").unwrap().get("name"), Some("中"));
        assert_eq!(p.matches("/user/a+b").unwrap().get("name"), Some("a+b"));
        assert!(p.matches("/user/%FF").is_none());
        assert!(pattern("/a%20b").matches("/a%20b").is_some());
    }

    #[test]
    fn test_multiple_variables_keep_order() {
        let params = pattern("/org/{org}/repo/{repo}").matches("/org/rust/repo/cargo").unwrap();
        assert_eq!(params.iter().collect::<Vec<_>>(), vec![("org", "rust"), ("repo", "cargo")]);
    }

    #[test]
    fn test_single_wildcard() {
        let p = pattern("/files/*/raw");
        assert!(p.matches("/files/a/raw").is_some());
        assert!(p.matches("/files/raw").is_none());
        assert!(p.matches("/files/a/b/raw").is_none());
        assert!(p.matches("/files/a/raw").unwrap().is_empty());
    }

    #[test]
    fn test_multi_wildcard() {
        let p = pattern("/test/**");
        let params = p.matches("/test/123/456").unwrap();
        assert!(params.is_empty());
        assert!(p.matches("/test").is_some());
        assert!(p.matches("/test/1").is_some());
        assert!(p.matches("/other/1").is_none());

        assert!(pattern("/**").matches("/").is_some());
        assert!(pattern("/**").matches("/any/thing").is_some());
    }

    #[test]
    fn test_empty_segment_never_matches() {
        assert!(pattern("/user/{id}/info").matches("/user//info").is_none());
        assert!(pattern("/a/*/c").matches("/a//c").is_none());
        assert!(pattern("/test/**").matches("/test//x").is_none());
        assert!(pattern("/hello").matches("hello").is_none());
    }

    #[test]
    fn test_literal_prefix() {
        assert_eq!(pattern("/").literal_prefix(), 0);
        assert_eq!(pattern("/user/new").literal_prefix(), 2);
        assert_eq!(pattern("/user/{id}").literal_prefix(), 1);
        assert_eq!(pattern("/user/{id}/info").literal_prefix(), 1);
        assert_eq!(pattern("/**").literal_prefix(), 0);
    }

    #[test]
    fn test_invalid_patterns() {
        assert!(matches!(PathPattern::parse("hello"), Err(PatternError::MissingLeadingSlash { .. })));
        assert!(matches!(PathPattern::parse("/a//b"), Err(PatternError::EmptySegment { .. })));
        assert!(matches!(PathPattern::parse("/a/"), Err(PatternError::EmptySegment { .. })));
        assert!(matches!(PathPattern::parse("/**/a"), Err(PatternError::MisplacedMultiWildcard { .. })));
        assert!(matches!(PathPattern::parse("/{}"), Err(PatternError::InvalidVariable { .. })));
        assert!(matches!(PathPattern::parse("/a{b}"), Err(PatternError::InvalidVariable { .. })));
        assert!(matches!(PathPattern::parse("/{a}/{a}"), Err(PatternError::DuplicateVariable { .. })));
    }
}
