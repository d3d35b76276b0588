use crate::matcher::AttributeMatch;
use crate::segments::Segment;
use std::sync::atomic::{AtomicU64, Ordering};

/// Marker surrounding every placeholder token.
///
/// Tokens are plain ASCII letters and digits so they pass untouched through
/// markup and through quoted string literals in compiled output.
const TOKEN_HEAD: &str = "xxxTEMPLOADER";
const TOKEN_TAIL: &str = "xxx";

static INVOCATIONS: AtomicU64 = AtomicU64::new(0);

/// Hands out placeholder tokens for one transform call.
///
/// Each generator takes a fresh process-wide invocation number, so tokens from
/// concurrent transforms never collide, and the per-call index restarts at zero.
#[derive(Debug, Clone)]
pub struct TokenGenerator {
    prefix: String,
    next: usize,
}

impl TokenGenerator {
    /// Creates a generator whose token prefix does not occur anywhere in `markup`
    pub fn for_markup(markup: &str) -> Self {
        loop {
            let invocation = INVOCATIONS.fetch_add(1, Ordering::Relaxed);
            let prefix = format!("{TOKEN_HEAD}{invocation}ATTR");
            if !markup.contains(&prefix) {
                return Self { prefix, next: 0 };
            }
        }
    }

    pub fn next_token(&mut self) -> String {
        let token = format!("{}{}{TOKEN_TAIL}", self.prefix, self.next);
        self.next += 1;
        token
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

/// A substituted attribute value waiting for resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderEntry {
    pub token: String,
    pub tag: String,
    pub attribute: String,
    pub segments: Vec<Segment>,
}

impl PlaceholderEntry {
    pub fn is_dynamic(&self) -> bool {
        crate::segments::has_dynamic(&self.segments)
    }
}

/// Placeholders of one transform call, in document order.
#[derive(Debug, Clone, Default)]
pub struct PlaceholderMap {
    prefix: String,
    entries: Vec<PlaceholderEntry>,
}

impl PlaceholderMap {
    /// Common prefix shared by every token in the map
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Regex source matching any token of this map
    pub fn token_pattern(&self) -> String {
        format!(r"{}\d+{TOKEN_TAIL}", regex::escape(&self.prefix))
    }

    pub fn get(&self, token: &str) -> Option<&PlaceholderEntry> {
        self.entries.iter().find(|entry| entry.token == token)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlaceholderEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Replaces each matched value span with a fresh token.
///
/// The output is rebuilt in a single pass over the untouched original, so the
/// offsets of later matches never drift when earlier values change length.
/// Quotes around each value are preserved because only the value span is
/// replaced.
pub fn substitute<I>(markup: &str, matches: I) -> (String, PlaceholderMap)
where
    I: IntoIterator<Item = (AttributeMatch, Vec<Segment>)>,
{
    let mut matches: Vec<_> = matches.into_iter().collect();
    matches.sort_by_key(|(m, _)| m.start);

    let mut tokens = TokenGenerator::for_markup(markup);
    let mut output = String::with_capacity(markup.len());
    let mut entries = Vec::with_capacity(matches.len());
    let mut cursor = 0;

    for (found, segments) in matches {
        if found.start < cursor || found.end > markup.len() {
            log::warn!(
                "Skipping overlapping attribute {}:{} at {}..{}",
                found.tag,
                found.attribute,
                found.start,
                found.end
            );
            continue;
        }
        let token = tokens.next_token();
        output.push_str(&markup[cursor..found.start]);
        output.push_str(&token);
        cursor = found.end;

        entries.push(PlaceholderEntry {
            token,
            tag: found.tag,
            attribute: found.attribute,
            segments,
        });
    }
    output.push_str(&markup[cursor..]);

    let map = PlaceholderMap {
        prefix: tokens.prefix().to_string(),
        entries,
    };
    (output, map)
}
