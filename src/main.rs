use clap::{Parser, ValueEnum};
use log::LevelFilter;
use serde::Serialize;
use serde_json::Value;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use temploader::fs_utils::{read_config, read_file_contents};
use temploader::{
    DelimiterSet, EffectiveOptions, Loader, Result, Segment, classify, parse_query,
};

const LONG_HELP: &str = r#"
Delimiters (defaults):
  <%= value %>         - Interpolate a value
  <%- value %>         - Interpolate an HTML-escaped value
  <% code %>           - Evaluate JavaScript
  ${ value }           - Interpolate (only with the default interpolate delimiter)

Query options:
  attributes=img:src,div:data-src  - Attributes rewritten into asset requests
  -attributes                      - Disable attribute rewriting
  root=/assets                     - Prefix joined onto attribute values
  parseDynamicRoutes               - Rewrite values mixing paths and expressions
  variable=data                    - Name the data argument instead of using `with`
  engine=lodash | globalLodash     - Where the `_` helpers come from
  -templateEscape                  - Don't require the bundled escape helper
  imports={...} | importsModule=m  - Names visible inside the template
  prependFilenameComment=DIR       - Prefix output with the template path
  noCache                          - Mark the result as not cacheable

Examples:
  # Compile a template into a module
  temploader page.html
  # Compile from stdin
  cat page.html | temploader -
  # Pass loader query options
  temploader page.html --query '?root=/assets&parseDynamicRoutes'
  # Use a pack from a JSON configuration file
  temploader page.html --config loader.json --pack customAttributes
  # List attribute values found in the template
  temploader page.html --list
  # Output as JSON for scripting
  temploader page.html --list=json
  # Save output to file
  temploader page.html -o page.js
"#;

/// Compile markup templates into render modules.
///
/// Licensed under the EUPL v1.2.
#[derive(Parser, Debug)]
#[command(
    name = "temploader",
    version,
    about = "Compile markup templates into render modules.",
    after_long_help = LONG_HELP
)]
struct Cli {
    /// Template file to compile. Use '-' for stdin.
    #[arg(value_name = "TEMPLATE", default_value = "-")]
    template: PathBuf,

    /// Loader query string, e.g. '?root=/assets&-templateEscape'
    #[arg(long, short = 'Q', value_name = "QUERY", default_value = "")]
    query: String,

    /// JSON file holding options or named option packs
    #[arg(short, long, value_name = "FILE", env = "TEMPLOADER_CONFIG")]
    config: Option<PathBuf>,

    /// Option pack to select from the configuration file
    #[arg(short, long, value_name = "NAME")]
    pack: Option<String>,

    /// Source map of the incoming template, passed through to the output
    #[arg(long, value_name = "FILE")]
    input_map: Option<PathBuf>,

    /// Output file (defaults to stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// List attribute values in the template (optionally with format: plain, json)
    #[arg(
        long,
        value_name = "FORMAT",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "plain"
    )]
    list: Option<ListFormat>,

    /// Increase verbosity (can be used multiple times)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq)]
enum ListFormat {
    /// One attribute value per line
    Plain,
    /// JSON output for scripting
    Json,
}

#[derive(Serialize)]
struct AttributeInfo {
    tag: String,
    attribute: String,
    value: String,
    start: usize,
    end: usize,
    dynamic: bool,
    rewritten: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    expressions: Vec<String>,
}

fn main() {
    let cli = Cli::parse();

    let level = match (cli.quiet, cli.verbose) {
        (true, _) => LevelFilter::Error,
        (false, 0) => LevelFilter::Warn,
        (false, 1) => LevelFilter::Info,
        (false, 2) => LevelFilter::Debug,
        (false, _) => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .format_target(false)
        .init();

    if let Err(e) = run(&cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let (content, resource_path) = read_template(&cli.template)?;

    let config = match &cli.config {
        Some(path) => {
            log::info!("Reading configuration from {}", path.display());
            read_config(path)?
        }
        None => Value::Null,
    };
    let mut params = parse_query(&cli.query)?;
    if let Some(pack) = &cli.pack {
        params.insert("pack".to_string(), Value::String(pack.clone()));
    }
    let options = EffectiveOptions::from_params(params, &config)?;

    if let Some(format) = cli.list {
        return list_attributes(&content, &options, format);
    }

    let map = cli
        .input_map
        .as_deref()
        .map(read_file_contents)
        .transpose()?;

    let output = Loader::new().transform(&content, &resource_path, &options, map)?;
    if !output.cacheable {
        log::info!("Result is marked as not cacheable");
    }
    for dependency in &output.dependencies {
        log::debug!("Depends on {dependency}");
    }

    if let Some(output_path) = &cli.output {
        log::info!("Writing output to {}", output_path.display());
        std::fs::write(output_path, format!("{}\n", output.source))?;
        if let Some(map) = &output.map {
            let mut map_path = output_path.clone().into_os_string();
            map_path.push(".map");
            std::fs::write(PathBuf::from(map_path), map)?;
        }
    } else {
        println!("{}", output.source);
        io::stdout().flush()?;
    }

    log::info!("Compilation complete!");
    Ok(())
}

fn read_template(template: &Path) -> Result<(String, PathBuf)> {
    if template == Path::new("-") {
        log::info!("Reading template from stdin...");
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok((buffer, PathBuf::from("stdin")))
    } else {
        log::info!("Reading template from {}", template.display());
        Ok((read_file_contents(template)?, template.to_path_buf()))
    }
}

fn list_attributes(content: &str, options: &EffectiveOptions, format: ListFormat) -> Result<()> {
    log::debug!("Listing template attributes...");

    let delimiters = DelimiterSet::new(&options.settings)?;
    let found = classify(
        content,
        &options.attributes,
        &delimiters,
        options.root.as_deref(),
        options.parse_dynamic_routes,
    );

    match format {
        ListFormat::Plain => {
            for attr in &found {
                let marker = if attr.rewritable { "*" } else { " " };
                println!(
                    "{marker} {}:{} {}",
                    attr.found.tag, attr.found.attribute, attr.found.raw_value
                );
            }
        }
        ListFormat::Json => {
            let infos: Vec<AttributeInfo> = found
                .iter()
                .map(|attr| AttributeInfo {
                    tag: attr.found.tag.clone(),
                    attribute: attr.found.attribute.clone(),
                    value: attr.found.raw_value.clone(),
                    start: attr.found.start,
                    end: attr.found.end,
                    dynamic: attr.is_dynamic(),
                    rewritten: attr.rewritable,
                    expressions: attr
                        .segments
                        .iter()
                        .filter_map(|segment| match segment {
                            Segment::Dynamic { expression, .. } => Some(expression.clone()),
                            Segment::Static(_) => None,
                        })
                        .collect(),
                })
                .collect();

            let json = serde_json::to_string_pretty(&infos)?;
            println!("{json}");
        }
    }

    Ok(())
}
