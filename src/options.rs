//! Merges loader query parameters and static build configuration into one
//! effective option set.
//!
//! Query parameters follow the usual loader conventions:
//!
//! - `?flag` and `?+flag` set `flag` to `true`, `?-flag` sets it to `false`
//! - `?name=value` percent-decodes `value`, keeping `+` as is; `true`, `false`
//!   and `null` become JSON values
//! - `?name[]=a&name[]=b` collects an array
//! - `?{"name": "value"}` passes a JSON object verbatim
//!
//! Static configuration is a JSON object of options, or of named packs with an
//! optional `defaults` pack; the `pack` parameter picks one.

use crate::error::{Result, TemploaderError};
use crate::matcher::AttributeFilter;
use crate::settings::TemplateSettings;
use percent_encoding::percent_decode_str;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::path::PathBuf;

/// Expression used for template imports when a lodash build provides them.
const AMBIENT_IMPORTS: &str = "(typeof _ !== 'undefined') ? _.templateSettings.imports : {}";

/// `attributes` option: a toggle, a comma separated list or an array.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum AttributesOption {
    Toggle(bool),
    List(String),
    Items(Vec<String>),
}

/// `imports` option: a JS expression, or an object serialised as a literal.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ImportsOption {
    Expression(String),
    Object(Map<String, Value>),
}

/// Which helper source wins when both `engine` and `globalLodash` are set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HelperPrecedence {
    #[default]
    Engine,
    Global,
}

/// Raw options as they appear in a query string or configuration pack.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoaderOptions {
    pub pack: Option<String>,
    pub attributes: Option<AttributesOption>,
    pub parse_dynamic_routes: Option<bool>,
    pub root: Option<String>,
    pub interpolate: Option<String>,
    pub escape: Option<String>,
    pub evaluate: Option<String>,
    pub variable: Option<String>,
    pub imports: Option<ImportsOption>,
    pub imports_module: Option<String>,
    pub engine: Option<String>,
    pub template_escape: Option<bool>,
    pub global_lodash: Option<bool>,
    pub helper_precedence: Option<HelperPrecedence>,
    pub prepend_filename_comment: Option<String>,
    pub no_cache: Option<bool>,
}

impl LoaderOptions {
    /// Deserialises options from a JSON object; `origin` names the source in errors
    ///
    /// # Errors
    ///
    /// Returns `TemploaderError::InvalidOption` when a field has the wrong type.
    pub fn from_value(value: Value, origin: &str) -> Result<Self> {
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value).map_err(|e| TemploaderError::InvalidOption {
            name: origin.to_string(),
            message: e.to_string(),
        })
    }

    /// Field-by-field merge where `self` wins over `fallback`
    pub fn or(self, fallback: Self) -> Self {
        Self {
            pack: self.pack.or(fallback.pack),
            attributes: self.attributes.or(fallback.attributes),
            parse_dynamic_routes: self.parse_dynamic_routes.or(fallback.parse_dynamic_routes),
            root: self.root.or(fallback.root),
            interpolate: self.interpolate.or(fallback.interpolate),
            escape: self.escape.or(fallback.escape),
            evaluate: self.evaluate.or(fallback.evaluate),
            variable: self.variable.or(fallback.variable),
            imports: self.imports.or(fallback.imports),
            imports_module: self.imports_module.or(fallback.imports_module),
            engine: self.engine.or(fallback.engine),
            template_escape: self.template_escape.or(fallback.template_escape),
            global_lodash: self.global_lodash.or(fallback.global_lodash),
            helper_precedence: self.helper_precedence.or(fallback.helper_precedence),
            prepend_filename_comment: self
                .prepend_filename_comment
                .or(fallback.prepend_filename_comment),
            no_cache: self.no_cache.or(fallback.no_cache),
        }
    }
}

/// Where the rendered module finds its `_` helpers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HelperSource {
    /// No helpers at all; escaped output fails at render time
    None,
    /// Only the bundled `escape` helper is required
    Bundled,
    /// A lodash-compatible `_` already exists as a global
    Global,
    /// `_` is required from the named module
    Module(String),
}

impl HelperSource {
    /// Whether a complete lodash-like `_` is available
    pub fn provides_library(&self) -> bool {
        matches!(self, HelperSource::Global | HelperSource::Module(_))
    }

    fn select(
        engine: Option<String>,
        global: bool,
        precedence: HelperPrecedence,
        template_escape: bool,
    ) -> Self {
        match (engine, global) {
            (Some(engine), true) => {
                log::debug!("Both engine '{engine}' and globalLodash set, {precedence:?} wins");
                match precedence {
                    HelperPrecedence::Engine => HelperSource::Module(engine),
                    HelperPrecedence::Global => HelperSource::Global,
                }
            }
            (Some(engine), false) => HelperSource::Module(engine),
            (None, true) => HelperSource::Global,
            (None, false) if template_escape => HelperSource::Bundled,
            (None, false) => HelperSource::None,
        }
    }
}

/// Fully resolved options for one transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveOptions {
    pub attributes: AttributeFilter,
    pub parse_dynamic_routes: bool,
    pub root: Option<String>,
    pub settings: TemplateSettings,
    pub helper: HelperSource,
    /// JS expression evaluating to the imports object
    pub imports: Option<String>,
    pub prepend_filename_comment: Option<PathBuf>,
    pub cacheable: bool,
}

impl Default for EffectiveOptions {
    fn default() -> Self {
        Self {
            attributes: AttributeFilter::default_set(),
            parse_dynamic_routes: false,
            root: None,
            settings: TemplateSettings::default(),
            helper: HelperSource::Bundled,
            imports: None,
            prepend_filename_comment: None,
            cacheable: true,
        }
    }
}

impl EffectiveOptions {
    /// Resolves options from a loader query and a static configuration value.
    ///
    /// # Errors
    ///
    /// Returns `TemploaderError::InvalidQuery` for an unparsable query and
    /// `TemploaderError::InvalidOption` for values of the wrong type.
    pub fn from_sources(query: &str, config: &Value) -> Result<Self> {
        Self::from_params(parse_query(query)?, config)
    }

    /// Like `from_sources` for a query that is already parsed.
    ///
    /// # Errors
    ///
    /// Returns `TemploaderError::InvalidOption` for values of the wrong type.
    pub fn from_params(params: Map<String, Value>, config: &Value) -> Result<Self> {
        let params = LoaderOptions::from_value(Value::Object(params), "query")?;
        let configured = select_pack(config, params.pack.as_deref()).clone();
        let configured = LoaderOptions::from_value(configured, "configuration")?;
        Self::from_options(params.or(configured))
    }

    /// Applies defaults to already merged options.
    ///
    /// # Errors
    ///
    /// Returns `TemploaderError::Json` when an `imports` object cannot be serialised.
    pub fn from_options(options: LoaderOptions) -> Result<Self> {
        let attributes = match options.attributes {
            Some(AttributesOption::Toggle(false)) => AttributeFilter::disabled(),
            Some(AttributesOption::Toggle(true)) | None => AttributeFilter::default_set(),
            Some(AttributesOption::List(list)) => AttributeFilter::parse_list(&list),
            Some(AttributesOption::Items(items)) => AttributeFilter::from_items(items),
        };

        let defaults = TemplateSettings::default();
        let settings = TemplateSettings {
            escape: options.escape.unwrap_or(defaults.escape),
            interpolate: options.interpolate.unwrap_or(defaults.interpolate),
            evaluate: options.evaluate.unwrap_or(defaults.evaluate),
            variable: options.variable.filter(|v| !v.is_empty()),
        };

        let template_escape = options.template_escape.unwrap_or(true);
        let helper = HelperSource::select(
            options.engine.filter(|e| !e.is_empty()),
            options.global_lodash.unwrap_or(false),
            options.helper_precedence.unwrap_or_default(),
            template_escape,
        );

        let imports = match (options.imports, options.imports_module) {
            (Some(imports), module) => {
                if let Some(module) = module {
                    log::debug!("Explicit imports take precedence over importsModule '{module}'");
                }
                Some(match imports {
                    ImportsOption::Expression(expression) => expression,
                    ImportsOption::Object(object) => serde_json::to_string(&object)?,
                })
            }
            (None, Some(module)) => Some(format!("require({})", serde_json::to_string(&module)?)),
            (None, None) => match &helper {
                HelperSource::Module(engine) if engine == "underscore" => None,
                HelperSource::Global => {
                    log::info!("Template imports resolve from the global _ at render time");
                    Some(AMBIENT_IMPORTS.to_string())
                }
                HelperSource::Module(_) => Some(AMBIENT_IMPORTS.to_string()),
                HelperSource::None | HelperSource::Bundled => None,
            },
        };

        Ok(Self {
            attributes,
            parse_dynamic_routes: options.parse_dynamic_routes.unwrap_or(false),
            root: options.root.filter(|r| !r.is_empty()),
            settings,
            helper,
            imports,
            prepend_filename_comment: options
                .prepend_filename_comment
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
            cacheable: !options.no_cache.unwrap_or(false),
        })
    }
}

/// Picks the configuration pack named `pack`, else `defaults`, else the whole value
pub fn select_pack<'v>(config: &'v Value, pack: Option<&str>) -> &'v Value {
    let Value::Object(map) = config else {
        return config;
    };
    if let Some(selected) = pack.and_then(|name| map.get(name)) {
        return selected;
    }
    if let Some(pack) = pack {
        log::debug!("Unknown option pack '{pack}', falling back to defaults");
    }
    map.get("defaults").unwrap_or(config)
}

fn special_value(value: String) -> Value {
    match value.as_str() {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "null" => Value::Null,
        _ => Value::String(value),
    }
}

/// Parses a loader query string into a JSON object.
///
/// # Errors
///
/// Returns `TemploaderError::InvalidQuery` when a `?{...}` query is not a JSON
/// object.
pub fn parse_query(query: &str) -> Result<Map<String, Value>> {
    let query = query.trim().strip_prefix('?').unwrap_or(query.trim());
    if query.is_empty() {
        return Ok(Map::new());
    }

    if query.starts_with('{') {
        return match serde_json::from_str(query) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(TemploaderError::InvalidQuery {
                query: query.to_string(),
                message: "expected a JSON object".to_string(),
            }),
            Err(e) => Err(TemploaderError::InvalidQuery {
                query: query.to_string(),
                message: e.to_string(),
            }),
        };
    }

    let mut result = Map::new();
    for arg in query.split('&').filter(|arg| !arg.is_empty()) {
        let (name, value) = if let Some((name, value)) = arg.split_once('=') {
            (decode(name, query)?, special_value(decode(value, query)?))
        } else if let Some(name) = arg.strip_prefix('-') {
            (decode(name, query)?, Value::Bool(false))
        } else {
            let name = arg.strip_prefix('+').unwrap_or(arg);
            (decode(name, query)?, Value::Bool(true))
        };

        if let Some(name) = name.strip_suffix("[]") {
            let entry = result
                .entry(name.to_string())
                .or_insert_with(|| Value::Array(Vec::new()));
            match entry {
                Value::Array(items) => items.push(value),
                other => *other = Value::Array(vec![other.take(), value]),
            }
        } else {
            result.insert(name, value);
        }
    }

    Ok(result)
}

/// Percent-decodes one query component; `+` is kept as a literal plus.
fn decode(component: &str, query: &str) -> Result<String> {
    percent_decode_str(component)
        .decode_utf8()
        .map(Cow::into_owned)
        .map_err(|e| TemploaderError::InvalidQuery {
            query: query.to_string(),
            message: e.to_string(),
        })
}
