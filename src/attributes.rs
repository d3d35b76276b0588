use crate::compiler::CompiledTemplate;
use crate::error::Result;
use crate::matcher::{AttributeFilter, AttributeMatch, find_attributes};
use crate::placeholder::{PlaceholderMap, substitute};
use crate::resolver::{AssetRequester, ResolveOptions, is_rewritable, resolve};
use crate::segments::{Segment, split};
use crate::settings::DelimiterSet;

/// An attribute occurrence together with its split value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedAttribute {
    pub found: AttributeMatch,
    pub segments: Vec<Segment>,
    /// Whether the value will be replaced by a placeholder
    pub rewritable: bool,
}

impl ClassifiedAttribute {
    pub fn is_dynamic(&self) -> bool {
        crate::segments::has_dynamic(&self.segments)
    }
}

/// Finds and classifies every attribute selected by `filter`
pub fn classify(
    markup: &str,
    filter: &AttributeFilter,
    delimiters: &DelimiterSet,
    root: Option<&str>,
    parse_dynamic_routes: bool,
) -> Vec<ClassifiedAttribute> {
    if filter.is_empty() {
        return Vec::new();
    }
    find_attributes(markup, |tag, attribute| filter.matches(tag, attribute))
        .into_iter()
        .map(|found| {
            let segments = split(&found.raw_value, delimiters);
            let rewritable = is_rewritable(&segments, root, parse_dynamic_routes);
            ClassifiedAttribute {
                found,
                segments,
                rewritable,
            }
        })
        .collect()
}

/// Attribute rewriting state for a single transform.
///
/// `parse` protects asset references from the template compiler by swapping
/// them for placeholders; `resolve_attributes` turns the placeholders in the
/// compiled output into asset requests.
#[derive(Debug, Clone)]
pub struct AttributeContext {
    placeholders: PlaceholderMap,
    root: Option<String>,
    parse_dynamic_routes: bool,
}

impl AttributeContext {
    /// Returns the placeholder-bearing markup and the context to resolve it with
    pub fn parse(
        markup: &str,
        filter: &AttributeFilter,
        delimiters: &DelimiterSet,
        root: Option<&str>,
        parse_dynamic_routes: bool,
    ) -> (String, Self) {
        let candidates = classify(markup, filter, delimiters, root, parse_dynamic_routes)
            .into_iter()
            .filter(|attr| attr.rewritable)
            .map(|attr| (attr.found, attr.segments));
        let (replaced, placeholders) = substitute(markup, candidates);
        log::debug!("Replaced {} attribute value(s) with placeholders", placeholders.len());

        let context = Self {
            placeholders,
            root: root.map(str::to_string),
            parse_dynamic_routes,
        };
        (replaced, context)
    }

    pub fn placeholders(&self) -> &PlaceholderMap {
        &self.placeholders
    }

    /// Rewrites placeholders in `compiled` into asset request expressions.
    ///
    /// # Errors
    ///
    /// Propagates asset resolution failures from `requester`.
    pub fn resolve_attributes(
        &self,
        compiled: &CompiledTemplate,
        requester: &dyn AssetRequester,
    ) -> Result<String> {
        let options = ResolveOptions {
            root: self.root.as_deref(),
            parse_dynamic_routes: self.parse_dynamic_routes,
            quote: compiled.quote,
        };
        resolve(&compiled.source, &self.placeholders, &options, requester)
    }
}
