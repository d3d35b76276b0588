//! Lenient scanner that finds tag attributes in raw markup.
//!
//! This is not an HTML parser: it only walks opening tags and their attributes,
//! skipping comments, CDATA sections, declarations and closing tags. Malformed
//! input never fails, the scanner simply stops at the end of the text.

/// Default `tag:attribute` pair rewritten when no attribute list is configured
pub const DEFAULT_ATTRIBUTES: &[&str] = &["img:src"];

/// One occurrence of a qualifying attribute.
///
/// `start..end` spans the value without its quotes, so an empty value has
/// `start == end`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeMatch {
    pub tag: String,
    pub attribute: String,
    pub raw_value: String,
    pub start: usize,
    pub end: usize,
}

/// Set of `tag:attribute` pairs whose values are treated as asset references.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeFilter {
    pairs: Vec<(String, String)>,
}

impl AttributeFilter {
    /// Filter that matches nothing
    pub fn disabled() -> Self {
        Self::default()
    }

    /// The `img:src` filter used when nothing else is configured
    pub fn default_set() -> Self {
        Self::from_items(DEFAULT_ATTRIBUTES.iter().copied())
    }

    /// Builds a filter from `tag:attribute` items; whitespace is ignored and items
    /// without a colon are dropped.
    pub fn from_items<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let pairs = items
            .into_iter()
            .filter_map(|item| {
                let cleaned: String = item
                    .as_ref()
                    .chars()
                    .filter(|c| !c.is_whitespace())
                    .collect();
                let (tag, attribute) = cleaned.split_once(':')?;
                if tag.is_empty() || attribute.is_empty() {
                    return None;
                }
                Some((tag.to_ascii_lowercase(), attribute.to_ascii_lowercase()))
            })
            .collect();
        Self { pairs }
    }

    /// Parses a comma separated list such as `img:src, div:data-img-src`
    pub fn parse_list(list: &str) -> Self {
        Self::from_items(list.split(','))
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Case-insensitive membership test
    pub fn matches(&self, tag: &str, attribute: &str) -> bool {
        self.pairs
            .iter()
            .any(|(t, a)| t.eq_ignore_ascii_case(tag) && a.eq_ignore_ascii_case(attribute))
    }
}

fn starts_with_ignore_ascii_case(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.len() >= needle.len() && haystack[..needle.len()].eq_ignore_ascii_case(needle)
}

fn find_from(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    bytes
        .get(from..)?
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|pos| from + pos)
}

fn is_tag_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b':'
}

fn is_attribute_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b':' | b'.')
}

/// Finds every attribute accepted by `predicate`, in document order.
pub fn find_attributes<F>(markup: &str, predicate: F) -> Vec<AttributeMatch>
where
    F: Fn(&str, &str) -> bool,
{
    let bytes = markup.as_bytes();
    let mut matches = Vec::new();
    let mut i = 0;

    // Only ASCII structural bytes are used as slice endpoints, so every slice
    // taken below falls on a UTF-8 boundary.
    while i < bytes.len() {
        let Some(rel) = bytes[i..].iter().position(|&b| b == b'<') else {
            break;
        };
        i += rel;
        let rest = &bytes[i..];

        if rest.starts_with(b"<!--") {
            i = find_from(bytes, i + 4, b"-->").map_or(bytes.len(), |end| end + 3);
            continue;
        }
        if starts_with_ignore_ascii_case(rest, b"<![CDATA[") {
            i = find_from(bytes, i + 9, b"]]>").map_or(bytes.len(), |end| end + 3);
            continue;
        }
        if rest.starts_with(b"<!") || rest.starts_with(b"<?") || rest.starts_with(b"</") {
            i = find_from(bytes, i + 2, b">").map_or(bytes.len(), |end| end + 1);
            continue;
        }

        let name_start = i + 1;
        let mut name_end = name_start;
        while name_end < bytes.len() && is_tag_name_byte(bytes[name_end]) {
            name_end += 1;
        }
        if name_end == name_start || !bytes[name_start].is_ascii_alphabetic() {
            i += 1;
            continue;
        }

        let tag = &markup[name_start..name_end];
        i = scan_attributes(markup, name_end, tag, &predicate, &mut matches);
    }

    matches
}

/// Walks the attributes of one opening tag and returns the offset after it.
fn scan_attributes<F>(
    markup: &str,
    mut i: usize,
    tag: &str,
    predicate: &F,
    matches: &mut Vec<AttributeMatch>,
) -> usize
where
    F: Fn(&str, &str) -> bool,
{
    let bytes = markup.as_bytes();

    while i < bytes.len() {
        let b = bytes[i];
        if b.is_ascii_whitespace() || b == b'/' {
            i += 1;
            continue;
        }
        if b == b'>' {
            return i + 1;
        }
        if !is_attribute_name_byte(b) {
            i += 1;
            continue;
        }

        let name_start = i;
        while i < bytes.len() && is_attribute_name_byte(bytes[i]) {
            i += 1;
        }
        let name = &markup[name_start..i];

        let mut j = i;
        while j < bytes.len() && bytes[j].is_ascii_whitespace() {
            j += 1;
        }
        if j >= bytes.len() || bytes[j] != b'=' {
            // Attribute without a value
            continue;
        }
        j += 1;
        while j < bytes.len() && bytes[j].is_ascii_whitespace() {
            j += 1;
        }
        if j >= bytes.len() {
            return bytes.len();
        }

        let (start, end, next) = match bytes[j] {
            quote @ (b'"' | b'\'') => {
                let Some(close) = find_from(bytes, j + 1, &[quote]) else {
                    // Unterminated value swallows the rest of the input
                    return bytes.len();
                };
                (j + 1, close, close + 1)
            }
            _ => {
                let mut k = j;
                while k < bytes.len() && !bytes[k].is_ascii_whitespace() && bytes[k] != b'>' {
                    k += 1;
                }
                (j, k, k)
            }
        };

        if predicate(tag, name) {
            matches.push(AttributeMatch {
                tag: tag.to_string(),
                attribute: name.to_string(),
                raw_value: markup[start..end].to_string(),
                start,
                end,
            });
        }
        i = next;
    }

    bytes.len()
}
