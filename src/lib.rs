//! # temploader
//!
//! A build-time loader that compiles lodash-style markup templates into
//! JavaScript modules exporting a render function. Asset references in
//! selected attributes, such as `<img src="logo.png">`, become module requests
//! so the bundler can resolve and fingerprint them.
//!
//! ## Features
//!
//! - Render functions identical to lodash's `_.template`
//! - Configurable `escape`, `interpolate` and `evaluate` delimiters
//! - Rewriting of configurable `tag:attribute` pairs into asset requests
//! - Optional rewriting of values mixing static paths and template expressions
//! - Template imports, helper engines and option packs
//!
//! ## Usage
//!
//! ### As a Library
//!
//! ```no_run
//! use std::path::Path;
//! use temploader::{EffectiveOptions, Loader};
//!
//! let options = EffectiveOptions::from_sources("?root=/assets", &serde_json::Value::Null)?;
//! let output = Loader::new().transform(
//!     r#"<img src="logo.png"><h1><%- title %></h1>"#,
//!     Path::new("templates/page.html"),
//!     &options,
//!     None,
//! )?;
//! println!("{}", output.source);
//! # Ok::<(), temploader::TemploaderError>(())
//! ```
//!
//! ### As a CLI Tool
//!
//! ```bash
//! # Compile a template
//! temploader page.html
//!
//! # Compile from stdin with loader query options
//! cat page.html | temploader - --query '?root=/assets&parseDynamicRoutes'
//!
//! # List the attribute values that would be rewritten
//! temploader page.html --list=json
//! ```

pub mod attributes;
pub mod compiler;
pub mod error;
pub mod fs_utils;
pub mod loader;
pub mod matcher;
pub mod options;
pub mod placeholder;
pub mod resolver;
pub mod segments;
pub mod settings;

// Re-export main types and functions for convenience
pub use attributes::{AttributeContext, ClassifiedAttribute, classify};
pub use compiler::{CompiledTemplate, LodashCompiler, TemplateCompiler};
pub use error::{Result, TemploaderError};
pub use loader::{BuildHost, Loader, LoaderOutput, RequireHost};
pub use matcher::{AttributeFilter, AttributeMatch, find_attributes};
pub use options::{EffectiveOptions, HelperSource, LoaderOptions, parse_query};
pub use resolver::AssetRequester;
pub use segments::Segment;
pub use settings::{DelimiterSet, TemplateSettings};
