use crate::settings::DelimiterSet;

/// A piece of an attribute value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Literal text
    Static(String),
    /// Delimited template expression
    Dynamic {
        /// Original text including the delimiters
        raw: String,
        /// Bare expression between the delimiters
        expression: String,
    },
}

impl Segment {
    /// Original text of the segment as it appeared in the value
    pub fn raw(&self) -> &str {
        match self {
            Segment::Static(text) => text,
            Segment::Dynamic { raw, .. } => raw,
        }
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, Segment::Dynamic { .. })
    }
}

/// Splits `value` into static and dynamic segments in one left-to-right pass.
///
/// Joining the `raw()` text of the result reproduces `value` exactly. A value
/// without delimiters yields a single static segment, including the empty value.
pub fn split(value: &str, delimiters: &DelimiterSet) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut cursor = 0;

    for region in delimiters.find_iter(value) {
        if region.start > cursor {
            segments.push(Segment::Static(value[cursor..region.start].to_string()));
        }
        segments.push(Segment::Dynamic {
            raw: region.text.to_string(),
            expression: region.expression.trim().to_string(),
        });
        cursor = region.end;
    }

    if cursor < value.len() || segments.is_empty() {
        segments.push(Segment::Static(value[cursor..].to_string()));
    }

    segments
}

/// Reassembles the original value from its segments
pub fn join_raw(segments: &[Segment]) -> String {
    segments.iter().map(Segment::raw).collect()
}

/// Whether any segment carries a template expression
pub fn has_dynamic(segments: &[Segment]) -> bool {
    segments.iter().any(Segment::is_dynamic)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::TemplateSettings;

    fn braces() -> DelimiterSet {
        DelimiterSet::new(&TemplateSettings {
            interpolate: r"\{\[(.+?)\]\}".to_string(),
            escape: r"\{\{(.+?)\}\}".to_string(),
            evaluate: r"\{%([\s\S]+?)%\}".to_string(),
            variable: None,
        })
        .unwrap()
    }

    #[test]
    fn test_static_value() {
        let set = braces();
        assert_eq!(
            split("logo.png", &set),
            vec![Segment::Static("logo.png".to_string())]
        );
        assert_eq!(split("", &set), vec![Segment::Static(String::new())]);
    }

    #[test]
    fn test_mixed_value() {
        let set = braces();
        let segments = split("/img/{[ name ]}.png", &set);
        assert_eq!(
            segments,
            vec![
                Segment::Static("/img/".to_string()),
                Segment::Dynamic {
                    raw: "{[ name ]}".to_string(),
                    expression: "name".to_string(),
                },
                Segment::Static(".png".to_string()),
            ]
        );
        assert!(has_dynamic(&segments));
    }

    #[test]
    fn test_adjacent_and_edge_dynamics() {
        let set = braces();
        let segments = split("{[ a ]}{{ b }}-{% c %}", &set);
        assert_eq!(segments.len(), 4);
        assert!(segments[0].is_dynamic());
        assert!(segments[1].is_dynamic());
        assert_eq!(segments[2], Segment::Static("-".to_string()));
        assert!(segments[3].is_dynamic());
    }

    #[test]
    fn test_round_trip() {
        let set = braces();
        let values = [
            "",
            "plain.png",
            "{[ x ]}",
            "a{[ x ]}b{[ y ]}c",
            "{[ unterminated",
            "üñí{[ ç ]}ødé",
            "{{ esc }}{% ev %}",
        ];
        for value in values {
            assert_eq!(join_raw(&split(value, &set)), value, "value {value:?}");
        }

        let defaults = DelimiterSet::new(&TemplateSettings::default()).unwrap();
        for value in ["<%= a %>/${b}/<%- c %>", "x<% if (y) { %>z"] {
            assert_eq!(join_raw(&split(value, &defaults)), value);
        }
    }
}
