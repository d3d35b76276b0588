use crate::error::{Result, TemploaderError};
use crate::settings::{DelimiterKind, DelimiterSet, TemplateSettings};
use regex::Regex;

/// Source text of a compiled render function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledTemplate {
    /// A function expression taking the template data
    pub source: String,
    /// Quote character used for static text literals in `source`
    pub quote: char,
}

/// Turns markup into the source of a render function.
pub trait TemplateCompiler {
    /// # Errors
    ///
    /// Returns an error when the settings cannot be applied, for example a
    /// malformed delimiter pattern or an invalid variable name.
    fn compile(&self, markup: &str, settings: &TemplateSettings) -> Result<CompiledTemplate>;
}

/// Compiler producing the same render functions as lodash's `_.template`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LodashCompiler;

fn push_escaped(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            _ => out.push(c),
        }
    }
}

fn validate_variable(variable: &str) -> Result<()> {
    let forbidden = |c: char| c.is_whitespace() || "()=,{}[]/".contains(c);
    if variable.contains(forbidden) {
        return Err(TemploaderError::InvalidOption {
            name: "variable".to_string(),
            message: format!("'{variable}' is not a valid identifier"),
        });
    }
    Ok(())
}

impl TemplateCompiler for LodashCompiler {
    fn compile(&self, markup: &str, settings: &TemplateSettings) -> Result<CompiledTemplate> {
        let delimiters = DelimiterSet::new(settings)?;
        let variable = settings.variable.as_deref().filter(|v| !v.is_empty());
        if let Some(variable) = variable {
            validate_variable(variable)?;
        }

        let mut body = String::from("__p += '");
        let mut is_escaping = false;
        let mut is_evaluating = false;
        let mut index = 0;

        for region in delimiters.find_iter(markup) {
            push_escaped(&mut body, &markup[index..region.start]);
            index = region.end;
            if region.expression.is_empty() {
                continue;
            }
            match region.kind {
                DelimiterKind::Escape => {
                    is_escaping = true;
                    body.push_str("' +\n__e(");
                    body.push_str(region.expression);
                    body.push_str(") +\n'");
                }
                DelimiterKind::Evaluate => {
                    is_evaluating = true;
                    body.push_str("';\n");
                    body.push_str(region.expression);
                    body.push_str(";\n__p += '");
                }
                DelimiterKind::Interpolate => {
                    body.push_str("' +\n((__t = (");
                    body.push_str(region.expression);
                    body.push_str(")) == null ? '' : __t) +\n'");
                }
            }
        }
        push_escaped(&mut body, &markup[index..]);
        body.push_str("';\n");

        if variable.is_none() {
            body = format!("with (obj) {{\n{body}\n}}\n");
        }

        if is_evaluating {
            body = Regex::new(r"\b__p \+= '';")?
                .replace_all(&body, "")
                .into_owned();
        }
        body = Regex::new(r"\b(__p \+=) '' \+")?
            .replace_all(&body, "$1")
            .into_owned();
        body = Regex::new(r"(__e\(.*?\)|\b__t\)) \+\n'';")?
            .replace_all(&body, "$1;")
            .into_owned();

        let mut source = format!("function({}) {{\n", variable.unwrap_or("obj"));
        if variable.is_none() {
            source.push_str("obj || (obj = {});\n");
        }
        source.push_str("var __t, __p = ''");
        if is_escaping {
            source.push_str(", __e = _.escape");
        }
        if is_evaluating {
            source.push_str(
                ", __j = Array.prototype.join;\nfunction print() { __p += __j.call(arguments, '') }\n",
            );
        } else {
            source.push_str(";\n");
        }
        source.push_str(&body);
        source.push_str("return __p\n}");

        Ok(CompiledTemplate { source, quote: '\'' })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(markup: &str, settings: &TemplateSettings) -> String {
        LodashCompiler.compile(markup, settings).unwrap().source
    }

    #[test]
    fn test_static_text() {
        let source = compile("Hello 'world'\n", &TemplateSettings::default());
        assert_eq!(
            source,
            "function(obj) {\nobj || (obj = {});\nvar __t, __p = '';\nwith (obj) {\n__p += 'Hello \\'world\\'\\n';\n\n}\nreturn __p\n}"
        );
    }

    #[test]
    fn test_interpolate() {
        let source = compile("Hello <%= name %>!", &TemplateSettings::default());
        assert_eq!(
            source,
            "function(obj) {\nobj || (obj = {});\nvar __t, __p = '';\nwith (obj) {\n__p += 'Hello ' +\n((__t = ( name )) == null ? '' : __t) +\n'!';\n\n}\nreturn __p\n}"
        );
    }

    #[test]
    fn test_escape_strips_empty_strings() {
        let source = compile("<%- test %>", &TemplateSettings::default());
        assert!(source.contains("var __t, __p = '', __e = _.escape;\n"));
        assert!(source.contains("__p +=\n__e( test );\n"));
        assert!(!source.contains("'';"));
    }

    #[test]
    fn test_evaluate_adds_print() {
        let source = compile("<% for (var i = 0; i < 2; i++) { %>x<% } %>", &TemplateSettings::default());
        assert!(source.contains("function print() { __p += __j.call(arguments, '') }"));
        assert!(source.contains(" for (var i = 0; i < 2; i++) { ;\n__p += 'x';\n } ;\n"));
        assert!(!source.contains("__p += '';"));
    }

    #[test]
    fn test_variable_setting() {
        let settings = TemplateSettings {
            variable: Some("data".to_string()),
            ..TemplateSettings::default()
        };
        let source = compile("<%= data.title %>", &settings);
        assert!(source.starts_with("function(data) {\nvar __t, __p = '';\n"));
        assert!(!source.contains("with (obj)"));
    }

    #[test]
    fn test_invalid_variable() {
        let settings = TemplateSettings {
            variable: Some("a, b".to_string()),
            ..TemplateSettings::default()
        };
        let err = LodashCompiler.compile("x", &settings).unwrap_err();
        assert!(matches!(err, TemploaderError::InvalidOption { .. }));
    }

    #[test]
    fn test_custom_delimiters() {
        let settings = TemplateSettings {
            interpolate: r"\{\[(.+?)\]\}".to_string(),
            escape: r"\{\{(.+?)\}\}".to_string(),
            evaluate: r"\{%([\s\S]+?)%\}".to_string(),
            variable: None,
        };
        let source = compile("{[ raw ]} {{ safe }} ${literal} <%= literal %>", &settings);
        assert!(source.contains("((__t = ( raw )) == null ? '' : __t)"));
        assert!(source.contains("__e( safe )"));
        assert!(source.contains("${literal} <%= literal %>"));
    }

    #[test]
    fn test_es_template_interpolation() {
        let source = compile("${ name }", &TemplateSettings::default());
        assert!(source.contains("((__t = ( name )) == null ? '' : __t)"));
    }

    #[test]
    fn test_placeholder_survives_compilation() {
        let token = "xxxTEMPLOADER7ATTR0xxx";
        let source = compile(&format!("<img src=\"{token}\">"), &TemplateSettings::default());
        assert!(source.contains(&format!("'<img src=\"{token}\">'")));
    }
}
