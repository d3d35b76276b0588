use crate::error::Result;
use crate::placeholder::{PlaceholderEntry, PlaceholderMap};
use crate::segments::{Segment, join_raw};
use regex::{Captures, Regex};
use std::collections::{HashMap, HashSet};

/// Produces the expression that loads an asset through the build host.
pub trait AssetRequester {
    /// Returns a self-contained expression for `request`, such as
    /// `require("./logo.png")`.
    ///
    /// # Errors
    ///
    /// Returns `TemploaderError::AssetResolution` when the host cannot resolve
    /// the request.
    fn asset_request(&self, request: &str) -> Result<String>;
}

/// How placeholders are turned back into expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOptions<'a> {
    /// Prefix joined onto static references
    pub root: Option<&'a str>,
    /// Rewrite values that mix static text and template expressions
    pub parse_dynamic_routes: bool,
    /// Quote character of the string literal the tokens sit in
    pub quote: char,
}

/// Whether `url` names something the build should resolve.
///
/// Absolute URLs, protocol-relative URLs, fragments and empty values are left
/// alone; a root-relative path is only a request once a root is configured.
pub fn is_url_request(url: &str, root: Option<&str>) -> bool {
    if url.is_empty() || url.starts_with('#') || url.starts_with("//") {
        return false;
    }
    if has_scheme(url) {
        return false;
    }
    !(url.starts_with('/') && root.is_none())
}

fn has_scheme(url: &str) -> bool {
    // Windows drive letters look like a one-letter scheme
    if has_windows_drive(url) {
        return false;
    }
    let Some(colon) = url.find(':') else {
        return false;
    };
    let scheme = &url[..colon];
    scheme
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Joins `root` and `value` with exactly one slash between them
pub fn join_root(root: &str, value: &str) -> String {
    format!(
        "{}/{}",
        root.trim_end_matches('/'),
        value.trim_start_matches('/')
    )
}

fn has_windows_drive(url: &str) -> bool {
    let bytes = url.as_bytes();
    bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && matches!(bytes[2], b'\\' | b'/')
}

/// Turns a leading attribute value into the request handed to the build host.
///
/// `~name/file` addresses a module and is never joined with the root. Without a
/// root, a bare relative path gets a `./` prefix so it resolves next to the
/// template instead of as a package name.
pub fn to_request(value: &str, root: Option<&str>) -> String {
    if let Some(module) = value.strip_prefix('~') {
        return module.to_string();
    }
    match root {
        Some(root) => join_root(root, value),
        None if value.starts_with("./")
            || value.starts_with("../")
            || value.starts_with('/')
            || has_windows_drive(value) =>
        {
            value.to_string()
        }
        None => format!("./{value}"),
    }
}

/// Whether a value split into `segments` should be replaced by a placeholder.
pub fn is_rewritable(segments: &[Segment], root: Option<&str>, parse_dynamic_routes: bool) -> bool {
    let dynamic = crate::segments::has_dynamic(segments);
    if dynamic && !parse_dynamic_routes {
        return false;
    }
    match segments.first() {
        Some(Segment::Static(leading)) if dynamic => is_url_request(leading, root),
        Some(Segment::Static(_)) => is_url_request(&join_raw(segments), root),
        Some(Segment::Dynamic { .. }) => true,
        None => false,
    }
}

/// Builds the expression standing in for one placeholder, or `None` when the
/// entry is dynamic and dynamic routes are disabled.
fn entry_expression(
    entry: &PlaceholderEntry,
    options: &ResolveOptions<'_>,
    requester: &dyn AssetRequester,
) -> Result<Option<String>> {
    if !entry.is_dynamic() {
        let request = to_request(&join_raw(&entry.segments), options.root);
        return Ok(Some(requester.asset_request(&request)?));
    }
    if !options.parse_dynamic_routes {
        return Ok(None);
    }

    let mut pieces = Vec::with_capacity(entry.segments.len());
    for (index, segment) in entry.segments.iter().enumerate() {
        match segment {
            Segment::Static(text) if index == 0 => {
                pieces.push(requester.asset_request(&to_request(text, options.root))?);
            }
            Segment::Static(text) => pieces.push(requester.asset_request(text)?),
            Segment::Dynamic { expression, .. } => pieces.push(format!("({expression})")),
        }
    }
    Ok(Some(pieces.join(" + ")))
}

/// Rewrites every placeholder token in `compiled` into its final expression.
///
/// Each expression is spliced between closing and reopening `options.quote`
/// so it is evaluated at render time instead of printed literally. Tokens for
/// dynamic values are left untouched when dynamic routes are disabled.
///
/// # Errors
///
/// Propagates asset resolution failures from `requester`; nothing is returned
/// partially rewritten.
pub fn resolve(
    compiled: &str,
    map: &PlaceholderMap,
    options: &ResolveOptions<'_>,
    requester: &dyn AssetRequester,
) -> Result<String> {
    if map.is_empty() {
        return Ok(compiled.to_string());
    }

    let mut replacements = HashMap::with_capacity(map.len());
    for entry in map.iter() {
        match entry_expression(entry, options, requester)? {
            Some(expression) => {
                let q = options.quote;
                replacements.insert(entry.token.as_str(), format!("{q} + {expression} + {q}"));
            }
            None => log::debug!(
                "Leaving dynamic {}:{} value unresolved",
                entry.tag,
                entry.attribute
            ),
        }
    }

    let pattern = Regex::new(&map.token_pattern())?;
    let mut seen = HashSet::new();
    let resolved = pattern.replace_all(compiled, |caps: &Captures<'_>| {
        let token = &caps[0];
        seen.insert(token.to_string());
        replacements
            .get(token)
            .cloned()
            .unwrap_or_else(|| token.to_string())
    });

    for entry in map.iter() {
        if replacements.contains_key(entry.token.as_str()) && !seen.contains(&entry.token) {
            log::warn!(
                "Placeholder for {}:{} is missing from the compiled template",
                entry.tag,
                entry.attribute
            );
        }
    }

    Ok(resolved.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TemploaderError;
    use crate::matcher::find_attributes;
    use crate::placeholder::substitute;
    use crate::segments::split;
    use crate::settings::{DelimiterSet, TemplateSettings};

    struct Require;

    impl AssetRequester for Require {
        fn asset_request(&self, request: &str) -> Result<String> {
            Ok(format!("require({})", serde_json::to_string(request)?))
        }
    }

    struct Failing;

    impl AssetRequester for Failing {
        fn asset_request(&self, request: &str) -> Result<String> {
            Err(TemploaderError::AssetResolution {
                request: request.to_string(),
                message: "missing".to_string(),
            })
        }
    }

    fn braces() -> DelimiterSet {
        DelimiterSet::new(&TemplateSettings {
            interpolate: r"\{\[(.+?)\]\}".to_string(),
            escape: r"\{\{(.+?)\}\}".to_string(),
            evaluate: r"\{%([\s\S]+?)%\}".to_string(),
            variable: None,
        })
        .unwrap()
    }

    fn prepare(markup: &str, delimiters: &DelimiterSet) -> (String, PlaceholderMap) {
        let found = find_attributes(markup, |t, a| t == "img" && a == "src");
        substitute(
            markup,
            found.into_iter().map(|m| {
                let segments = split(&m.raw_value, delimiters);
                (m, segments)
            }),
        )
    }

    fn options(root: Option<&str>, parse_dynamic_routes: bool) -> ResolveOptions<'_> {
        ResolveOptions {
            root,
            parse_dynamic_routes,
            quote: '\'',
        }
    }

    #[test]
    fn test_is_url_request() {
        assert!(is_url_request("logo.png", None));
        assert!(is_url_request("./logo.png", None));
        assert!(is_url_request("~pkg/logo.png", None));
        assert!(is_url_request("C:/img/logo.png", None));
        assert!(!is_url_request("", None));
        assert!(!is_url_request("#top", None));
        assert!(!is_url_request("http://example.com/a.png", None));
        assert!(!is_url_request("data:image/png;base64,AAA", None));
        assert!(!is_url_request("//cdn.example.com/a.png", None));
        assert!(!is_url_request("/abs.png", None));
        assert!(is_url_request("/abs.png", Some("/assets")));
    }

    #[test]
    fn test_to_request() {
        assert_eq!(to_request("logo.png", None), "./logo.png");
        assert_eq!(to_request("img/logo.png", None), "./img/logo.png");
        assert_eq!(to_request("./logo.png", None), "./logo.png");
        assert_eq!(to_request("../logo.png", None), "../logo.png");
        assert_eq!(to_request("C:/img/logo.png", None), "C:/img/logo.png");
        assert_eq!(to_request("~pkg/a.png", None), "pkg/a.png");
        assert_eq!(to_request("logo.png", Some("/assets")), "/assets/logo.png");
        assert_eq!(to_request("/logo.png", Some("/assets/")), "/assets/logo.png");
        assert_eq!(to_request("/img.png", Some(".")), "./img.png");
        assert_eq!(to_request("~pkg/a.png", Some("/assets")), "pkg/a.png");
    }

    #[test]
    fn test_static_resolution() {
        let (markup, map) = prepare(r#"<img src="logo.png">"#, &braces());
        let compiled = format!("__p += '{markup}';");
        let out = resolve(&compiled, &map, &options(None, false), &Require).unwrap();
        assert_eq!(
            out,
            r#"__p += '<img src="' + require("./logo.png") + '">';"#
        );
    }

    #[test]
    fn test_root_prefixed_resolution() {
        let (markup, map) = prepare(r#"<img src="logo.png">"#, &braces());
        let compiled = format!("__p += '{markup}';");
        let out = resolve(&compiled, &map, &options(Some("/assets"), false), &Require).unwrap();
        assert!(out.contains(r#"require("/assets/logo.png")"#));
    }

    #[test]
    fn test_dynamic_disabled_leaves_token() {
        let (markup, map) = prepare(r#"<img src="{[ path ]}">"#, &braces());
        let out = resolve(&markup, &map, &options(None, false), &Require).unwrap();
        assert_eq!(out, markup);
    }

    #[test]
    fn test_dynamic_enabled_concatenation() {
        let (markup, map) = prepare(r#"<img src="/{[ name ]}.png">"#, &braces());
        let compiled = format!("__p += '{markup}';");
        let out = resolve(
            &compiled,
            &map,
            &options(Some("/assets/img"), true),
            &Require,
        )
        .unwrap();
        assert_eq!(
            out,
            r#"__p += '<img src="' + require("/assets/img/") + (name) + require(".png") + '">';"#
        );
    }

    #[test]
    fn test_root_prefixes_leading_directory() {
        let (markup, map) = prepare(r#"<img src="/img/{[ name ]}.png">"#, &braces());
        let compiled = format!("__p += '{markup}';");
        let out = resolve(
            &compiled,
            &map,
            &options(Some("/assets/img"), true),
            &Require,
        )
        .unwrap();
        assert_eq!(
            out,
            r#"__p += '<img src="' + require("/assets/img/img/") + (name) + require(".png") + '">';"#
        );
    }

    #[test]
    fn test_leading_dynamic_segment_has_no_root() {
        let (markup, map) = prepare(r#"<img src="{[ base ]}/x.png">"#, &braces());
        let out = resolve(&markup, &map, &options(Some("/r"), true), &Require).unwrap();
        assert!(out.contains(r#"' + (base) + require("/x.png") + '"#));
    }

    #[test]
    fn test_every_occurrence_replaced() {
        let (markup, map) = prepare(r#"<img src="a.png">"#, &braces());
        let doubled = format!("{markup}{markup}");
        let out = resolve(&doubled, &map, &options(None, false), &Require).unwrap();
        assert_eq!(out.matches(r#"require("./a.png")"#).count(), 2);
        assert!(!out.contains(map.prefix()));
    }

    #[test]
    fn test_missing_token_is_not_fatal() {
        let (_, map) = prepare(r#"<img src="a.png">"#, &braces());
        let out = resolve("compiled without tokens", &map, &options(None, false), &Require).unwrap();
        assert_eq!(out, "compiled without tokens");
    }

    #[test]
    fn test_asset_failure_propagates() {
        let (markup, map) = prepare(r#"<img src="a.png">"#, &braces());
        let err = resolve(&markup, &map, &options(None, false), &Failing).unwrap_err();
        assert!(matches!(err, TemploaderError::AssetResolution { .. }));
    }

    #[test]
    fn test_is_rewritable() {
        let set = braces();
        assert!(is_rewritable(&split("a.png", &set), None, false));
        assert!(!is_rewritable(&split("http://x/a.png", &set), None, false));
        assert!(!is_rewritable(&split("/a.png", &set), None, false));
        assert!(!is_rewritable(&split("{[ a ]}", &set), None, false));
        assert!(is_rewritable(&split("{[ a ]}", &set), None, true));
        assert!(is_rewritable(&split("/{[ a ]}.png", &set), Some("/r"), true));
        assert!(!is_rewritable(&split("/{[ a ]}.png", &set), None, true));
        assert!(!is_rewritable(&split("", &set), None, false));
    }
}
