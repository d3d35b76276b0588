use crate::attributes::AttributeContext;
use crate::compiler::{LodashCompiler, TemplateCompiler};
use crate::error::Result;
use crate::fs_utils::{read_file_contents, relative_display_path};
use crate::options::{EffectiveOptions, HelperSource};
use crate::resolver::AssetRequester;
use crate::settings::DelimiterSet;
use std::path::Path;

/// Services the surrounding build tool provides to a transform.
pub trait BuildHost: AssetRequester {
    /// Resolves a helper module request, such as `lodash/escape`, to the
    /// specifier required by the generated module.
    ///
    /// # Errors
    ///
    /// Returns an error when the helper module cannot be found.
    fn resolve_module(&self, request: &str) -> Result<String> {
        Ok(request.to_string())
    }
}

/// Host emitting CommonJS `require` calls with requests left as written.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequireHost;

impl AssetRequester for RequireHost {
    fn asset_request(&self, request: &str) -> Result<String> {
        Ok(format!("require({})", serde_json::to_string(request)?))
    }
}

impl BuildHost for RequireHost {}

/// Result of transforming one template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderOutput {
    /// Module source exporting the render function
    pub source: String,
    /// Incoming source map, passed through unchanged
    pub map: Option<String>,
    /// Whether the build may cache this result
    pub cacheable: bool,
    /// Helper modules the output depends on besides the template itself
    pub dependencies: Vec<String>,
}

/// Turns templates into render modules.
#[derive(Debug, Clone, Default)]
pub struct Loader<H = RequireHost, C = LodashCompiler> {
    host: H,
    compiler: C,
}

impl Loader {
    pub fn new() -> Self {
        Self::default()
    }
}

fn require(specifier: &str) -> Result<String> {
    Ok(format!("require({})", serde_json::to_string(specifier)?))
}

impl<H: BuildHost, C: TemplateCompiler> Loader<H, C> {
    pub fn with_parts(host: H, compiler: C) -> Self {
        Self { host, compiler }
    }

    /// Transforms template `content` read from `resource_path`.
    ///
    /// # Errors
    ///
    /// - `TemploaderError::MalformedDelimiter` if a delimiter pattern is invalid.
    /// - `TemploaderError::AssetResolution` if the host cannot resolve an asset.
    /// - Other errors from the compiler or the host.
    pub fn transform(
        &self,
        content: &str,
        resource_path: &Path,
        options: &EffectiveOptions,
        map: Option<String>,
    ) -> Result<LoaderOutput> {
        let mut content = content.to_string();
        if let Some(base) = &options.prepend_filename_comment {
            let relative = relative_display_path(base, resource_path)?;
            content = format!("<!-- {relative} -->\n{content}");
        }

        let delimiters = DelimiterSet::new(&options.settings)?;
        let (content, attributes) = AttributeContext::parse(
            &content,
            &options.attributes,
            &delimiters,
            options.root.as_deref(),
            options.parse_dynamic_routes,
        );

        log::debug!("Compiling {}", resource_path.display());
        let compiled = self.compiler.compile(&content, &options.settings)?;
        let template_source = attributes.resolve_attributes(&compiled, &self.host)?;

        let mut pieces = Vec::new();
        let mut dependencies = Vec::new();

        match &options.helper {
            HelperSource::Module(engine) => pieces.push(format!("var _ = {};", require(engine)?)),
            HelperSource::Bundled => {
                let escape = self.host.resolve_module("lodash/escape")?;
                pieces.push(format!("var _ = {{escape:{}}};", require(&escape)?));
            }
            HelperSource::Global | HelperSource::None => {}
        }

        if let Some(imports) = &options.imports {
            pieces.push(format!("var _imports = {imports};"));
            if options.helper.provides_library() {
                pieces.push("var _keys = _.keys;".to_string());
                pieces.push("var _values = _.values;".to_string());
            } else {
                for (name, helper) in [("_keys", "lodash/keys"), ("_values", "lodash/values")] {
                    dependencies.push(helper.to_string());
                    let resolved = self.host.resolve_module(helper)?;
                    pieces.push(format!("var {name} = {};", require(&resolved)?));
                }
            }
            pieces.push(format!(
                "module.exports = Function(_keys(_imports), 'return ' + {template_source}.toString()).apply(undefined, _values(_imports));"
            ));
        } else {
            pieces.push(format!("module.exports = {template_source};"));
        }

        Ok(LoaderOutput {
            source: pieces.join("\n"),
            map,
            cacheable: options.cacheable,
            dependencies,
        })
    }

    /// Reads a template from disk and transforms it.
    ///
    /// # Errors
    ///
    /// - `TemploaderError::FileNotFound` if the template doesn't exist.
    /// - Other errors from `transform`.
    pub fn transform_file(&self, path: &Path, options: &EffectiveOptions) -> Result<LoaderOutput> {
        let content = read_file_contents(path)?;
        self.transform(&content, path, options, None)
    }
}
