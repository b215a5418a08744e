//! Scenario file loading
//!
//! Scenario YAML is read into loose raw structs and then converted into the
//! typed model, so that type problems (a numeric body, an empty assertion)
//! are reported with the scenario's own vocabulary.

use loadwire_core::{
    AssertRule, Body, Error, ExtractRule, Fields, LoadProfile, RequestKind, RequestSpec, Result,
    Scenario,
};
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use std::path::Path;
use std::time::Duration;

// ============================================================================
// Raw file structures
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawScenario {
    default_address: Option<String>,
    #[serde(default = "default_true")]
    keepalive: bool,
    #[serde(default)]
    headers: Mapping,
    #[serde(default)]
    variables: Mapping,
    #[serde(default)]
    requests: Option<RawRequests>,
    #[serde(default = "default_protocol")]
    protocol: String,
    #[serde(default, with = "humantime_serde")]
    timeout: Option<Duration>,
    #[serde(default)]
    tls_config: Mapping,
    trace_level: Option<u16>,
    enable_regex: Option<bool>,
    #[serde(default)]
    single_target: bool,
}

fn default_true() -> bool {
    true
}

fn default_protocol() -> String {
    "http".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawRequests {
    File(String),
    List(Vec<RawEntry>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawEntry {
    Url(String),
    Block(Mapping),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawRequest {
    url: String,
    #[serde(default = "default_method")]
    method: String,
    label: Option<String>,
    #[serde(default)]
    headers: Mapping,
    #[serde(default)]
    body: Value,
    #[serde(default)]
    extract_regexp: Mapping,
    #[serde(default)]
    assert: Vec<RawAssert>,
}

fn default_method() -> String {
    "GET".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawExtract {
    Regexp(String),
    Full(RawExtractFull),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawExtractFull {
    regexp: String,
    #[serde(default)]
    match_no: i32,
    #[serde(default = "default_template")]
    template: u32,
}

fn default_template() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawAssert {
    Pattern(String),
    Full(RawAssertFull),
}

#[derive(Debug, Deserialize)]
struct RawAssertFull {
    contains: OneOrMany,
    #[serde(default, rename = "not")]
    invert: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

// ============================================================================
// Conversion
// ============================================================================

fn yaml_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}

fn render(value: &Value) -> String {
    serde_yaml::to_string(value)
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|_| format!("{value:?}"))
}

fn scalar(value: &Value, what: &str) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(Error::config(format!(
            "{what} must be a scalar, got {}: {}",
            yaml_kind(other),
            render(other)
        ))),
    }
}

/// Scalar-valued mapping, in declaration order
fn scalar_map(raw: &Mapping, what: &str) -> Result<Fields> {
    let mut fields = Fields::new();
    for (key, value) in raw {
        let key = scalar(key, &format!("{what} name"))?;
        let value = scalar(value, &format!("{what} '{key}'"))?;
        fields.insert(key, value);
    }
    Ok(fields)
}

/// Convert a raw body value; anything but absent, text or a map is fatal
fn convert_body(value: Value) -> Result<Option<Body>> {
    match value {
        Value::Null => Ok(None),
        Value::String(text) => Ok(Some(Body::Text(text))),
        Value::Mapping(mapping) => Ok(Some(Body::Form(scalar_map(&mapping, "body field")?))),
        other => Err(Error::UnsupportedBody {
            kind: yaml_kind(&other),
            value: render(&other),
        }),
    }
}

fn convert_request(raw: RawRequest) -> Result<RequestSpec> {
    let mut spec = RequestSpec::new(raw.method, raw.url);
    spec.label = raw.label;
    spec.headers = scalar_map(&raw.headers, "header")?;
    spec.body = convert_body(raw.body)?;

    spec.extract = raw
        .extract_regexp
        .into_iter()
        .map(|(name, rule)| {
            let name = scalar(&name, "extract-regexp name")?;
            let rule = match serde_yaml::from_value(rule)? {
                RawExtract::Regexp(regexp) => ExtractRule::new(name, regexp),
                RawExtract::Full(full) => ExtractRule {
                    name,
                    regexp: full.regexp,
                    match_no: full.match_no,
                    template: full.template,
                },
            };
            Ok(rule)
        })
        .collect::<Result<_>>()?;

    spec.assertions = raw
        .assert
        .into_iter()
        .map(|rule| match rule {
            RawAssert::Pattern(pattern) => AssertRule::contains(pattern),
            RawAssert::Full(full) => AssertRule {
                contains: match full.contains {
                    OneOrMany::One(pattern) => vec![pattern],
                    OneOrMany::Many(patterns) => patterns,
                },
                invert: full.invert,
            },
        })
        .collect();

    Ok(spec)
}

fn convert_entry(entry: RawEntry) -> Result<RequestKind> {
    match entry {
        RawEntry::Url(url) => Ok(RequestKind::Http(RequestSpec::get(url))),
        RawEntry::Block(mapping) if mapping.contains_key("url") => {
            let raw: RawRequest = serde_yaml::from_value(Value::Mapping(mapping))?;
            Ok(RequestKind::Http(convert_request(raw)?))
        }
        RawEntry::Block(mapping) => {
            let kind = mapping
                .keys()
                .next()
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string();
            Ok(RequestKind::Unsupported { kind })
        }
    }
}

/// Parse a plain-text request list: `"<url>"` or `"<label> <url>"` per line
pub fn parse_request_lines(text: &str) -> Vec<RequestKind> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            let parts: Vec<&str> = line.split(' ').collect();
            let spec = if parts.len() > 1 {
                RequestSpec::get(parts[1]).with_label(parts[0])
            } else {
                RequestSpec::get(parts[0])
            };
            RequestKind::Http(spec)
        })
        .collect()
}

fn convert_scenario(raw: RawScenario, base_dir: &Path) -> Result<Scenario> {
    let requests = match raw.requests {
        None => Vec::new(),
        Some(RawRequests::List(entries)) => entries
            .into_iter()
            .map(convert_entry)
            .collect::<Result<_>>()?,
        Some(RawRequests::File(file)) => {
            let path = base_dir.join(&file);
            tracing::info!(path = %path.display(), "reading requests from text file");
            let text = std::fs::read_to_string(&path).map_err(|e| {
                Error::config(format!("cannot read requests file {}: {e}", path.display()))
            })?;
            parse_request_lines(&text)
        }
    };

    Ok(Scenario {
        default_address: raw.default_address,
        keepalive: raw.keepalive,
        headers: scalar_map(&raw.headers, "header")?,
        variables: scalar_map(&raw.variables, "variable")?,
        requests,
        protocol: raw.protocol,
        timeout: raw.timeout.unwrap_or(Duration::from_secs(10)),
        tls_config: raw.tls_config,
        trace_level: raw.trace_level.unwrap_or(1000),
        enable_regex: raw.enable_regex,
        single_target: raw.single_target,
    })
}

/// Parse a run file from YAML text
///
/// Relative request-file paths resolve against `base_dir`.
///
/// The optional top-level `load` section carries the load profile; every
/// other key belongs to the scenario.
pub fn parse_run(yaml: &str, base_dir: &Path) -> Result<(Scenario, LoadProfile)> {
    let mut document: Value = serde_yaml::from_str(yaml)?;
    if document.is_null() {
        document = Value::Mapping(Mapping::new());
    }
    let load = match document.as_mapping_mut().and_then(|m| m.remove("load")) {
        Some(section) => serde_yaml::from_value(section)?,
        None => LoadProfile::default(),
    };
    let raw: RawScenario = serde_yaml::from_value(document)?;
    let scenario = convert_scenario(raw, base_dir)?;
    Ok((scenario, load))
}

/// Load a run file from disk
pub fn load_run(path: &Path) -> Result<(Scenario, LoadProfile)> {
    tracing::info!(path = %path.display(), "loading scenario");
    let yaml = std::fs::read_to_string(path)?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    parse_run(&yaml, base_dir)
}
