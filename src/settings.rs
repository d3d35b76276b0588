use crate::error::{Result, TemploaderError};
use regex::Regex;

/// Default escape delimiter, `<%- value %>`
pub const DEFAULT_ESCAPE: &str = r"<%-([\s\S]+?)%>";
/// Default evaluate delimiter, `<% code %>`
pub const DEFAULT_EVALUATE: &str = r"<%([\s\S]+?)%>";
/// Default interpolate delimiter, `<%= value %>`
pub const DEFAULT_INTERPOLATE: &str = r"<%=([\s\S]+?)%>";

/// ES template literal interpolation, only active with the default interpolate delimiter
const ES_TEMPLATE: &str = r"\$\{([^\\}]*(?:\\.[^\\}]*)*)\}";

/// Settings handed explicitly to the template compiler for one compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSettings {
    /// Pattern for HTML-escaped output
    pub escape: String,
    /// Pattern for raw output
    pub interpolate: String,
    /// Pattern for statements
    pub evaluate: String,
    /// Name of the data parameter; `None` scopes the data object with `with`
    pub variable: Option<String>,
}

impl Default for TemplateSettings {
    fn default() -> Self {
        Self {
            escape: DEFAULT_ESCAPE.to_string(),
            interpolate: DEFAULT_INTERPOLATE.to_string(),
            evaluate: DEFAULT_EVALUATE.to_string(),
            variable: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelimiterKind {
    Escape,
    Interpolate,
    Evaluate,
}

/// One delimited region found in a piece of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delimited<'t> {
    pub kind: DelimiterKind,
    pub start: usize,
    pub end: usize,
    /// Whole region including the delimiters
    pub text: &'t str,
    /// Inner expression captured by the pattern's first group
    pub expression: &'t str,
}

#[derive(Debug, Clone)]
struct Alternative {
    kind: DelimiterKind,
    outer: usize,
    inner: Option<usize>,
}

/// All delimiter patterns compiled into one leftmost-first alternation.
///
/// Both the compiler and the segment splitter scan with the same set, so an
/// attribute value is classified with exactly the syntax that will later be
/// compiled.
#[derive(Debug, Clone)]
pub struct DelimiterSet {
    combined: Regex,
    alternatives: Vec<Alternative>,
}

impl DelimiterSet {
    /// Compiles the delimiter patterns of `settings`.
    ///
    /// # Errors
    ///
    /// Returns `TemploaderError::MalformedDelimiter` naming the first pattern that
    /// fails to compile.
    pub fn new(settings: &TemplateSettings) -> Result<Self> {
        let mut parts = vec![
            ("escape", DelimiterKind::Escape, settings.escape.as_str()),
            (
                "interpolate",
                DelimiterKind::Interpolate,
                settings.interpolate.as_str(),
            ),
        ];
        if settings.interpolate == DEFAULT_INTERPOLATE {
            parts.push(("interpolate", DelimiterKind::Interpolate, ES_TEMPLATE));
        }
        parts.push(("evaluate", DelimiterKind::Evaluate, settings.evaluate.as_str()));

        let mut sources = Vec::with_capacity(parts.len());
        let mut alternatives = Vec::with_capacity(parts.len());
        let mut next_group = 1;

        for (name, kind, pattern) in parts {
            let single = Regex::new(pattern).map_err(|source| TemploaderError::MalformedDelimiter {
                name,
                pattern: pattern.to_string(),
                source,
            })?;
            let inner_groups = single.captures_len() - 1;
            alternatives.push(Alternative {
                kind,
                outer: next_group,
                inner: (inner_groups > 0).then_some(next_group + 1),
            });
            next_group += 1 + inner_groups;
            sources.push(format!("({pattern})"));
        }

        let combined = Regex::new(&sources.join("|"))?;
        Ok(Self {
            combined,
            alternatives,
        })
    }

    /// Finds delimited regions left to right; empty matches are skipped.
    pub fn find_iter<'s, 't>(&'s self, text: &'t str) -> impl Iterator<Item = Delimited<'t>> + 's
    where
        't: 's,
    {
        self.combined.captures_iter(text).filter_map(move |caps| {
            let (alternative, whole) = self
                .alternatives
                .iter()
                .find_map(|alt| caps.get(alt.outer).map(|m| (alt, m)))?;
            if whole.is_empty() {
                return None;
            }
            let expression = alternative
                .inner
                .and_then(|group| caps.get(group))
                .map_or("", |m| m.as_str());
            Some(Delimited {
                kind: alternative.kind,
                start: whole.start(),
                end: whole.end(),
                text: whole.as_str(),
                expression,
            })
        })
    }

    /// Whether `text` contains at least one delimited region
    pub fn is_dynamic(&self, text: &str) -> bool {
        self.find_iter(text).next().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn braces() -> TemplateSettings {
        TemplateSettings {
            interpolate: r"\{\[(.+?)\]\}".to_string(),
            escape: r"\{\{(.+?)\}\}".to_string(),
            evaluate: r"\{%([\s\S]+?)%\}".to_string(),
            variable: None,
        }
    }

    #[test]
    fn test_default_delimiters() {
        let set = DelimiterSet::new(&TemplateSettings::default()).unwrap();
        let found: Vec<_> = set.find_iter("a <%- e %> b <%= i %> c <% v %>").collect();
        assert_eq!(found.len(), 3);
        assert_eq!(found[0].kind, DelimiterKind::Escape);
        assert_eq!(found[0].expression, " e ");
        assert_eq!(found[1].kind, DelimiterKind::Interpolate);
        assert_eq!(found[1].text, "<%= i %>");
        assert_eq!(found[2].kind, DelimiterKind::Evaluate);
        assert_eq!(found[2].expression, " v ");
    }

    #[test]
    fn test_es_template_only_with_default_interpolate() {
        let set = DelimiterSet::new(&TemplateSettings::default()).unwrap();
        let found: Vec<_> = set.find_iter("x ${name} y").collect();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, DelimiterKind::Interpolate);
        assert_eq!(found[0].expression, "name");

        let set = DelimiterSet::new(&braces()).unwrap();
        assert!(!set.is_dynamic("x ${name} y"));
        assert!(set.is_dynamic("x {[ name ]} y"));
    }

    #[test]
    fn test_custom_delimiters_offsets() {
        let set = DelimiterSet::new(&braces()).unwrap();
        let text = "/img/{[ name ]}.png";
        let found: Vec<_> = set.find_iter(text).collect();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].start, 5);
        assert_eq!(found[0].end, 15);
        assert_eq!(&text[found[0].start..found[0].end], "{[ name ]}");
    }

    #[test]
    fn test_pattern_with_extra_groups() {
        let settings = TemplateSettings {
            interpolate: r"\[\[((a)|(b))\]\]".to_string(),
            ..braces()
        };
        let set = DelimiterSet::new(&settings).unwrap();
        let found: Vec<_> = set.find_iter("[[b]] {% x %}").collect();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].expression, "b");
        assert_eq!(found[1].kind, DelimiterKind::Evaluate);
        assert_eq!(found[1].expression, " x ");
    }

    #[test]
    fn test_malformed_pattern() {
        let settings = TemplateSettings {
            evaluate: "(unclosed".to_string(),
            ..TemplateSettings::default()
        };
        let err = DelimiterSet::new(&settings).unwrap_err();
        assert!(matches!(
            err,
            TemploaderError::MalformedDelimiter {
                name: "evaluate",
                ..
            }
        ));
    }
}
