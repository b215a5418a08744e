//! Request definitions consumed by the payload compiler

use crate::fields::Fields;

/// Request body as declared in a scenario
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// Raw text sent verbatim
    Text(String),
    /// Key-value form fields, urlencoded into the body (or the query for GET)
    Form(Fields),
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Body::Text(text.to_string())
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Text(text)
    }
}

/// Regex extraction rule producing a named variable from a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractRule {
    /// Variable name written by this rule
    pub name: String,
    /// Regular expression applied to the response
    pub regexp: String,
    /// Which match to take (0-based, negative means random)
    pub match_no: i32,
    /// Capture group used as the value
    pub template: u32,
}

impl ExtractRule {
    /// Create a rule taking group 1 of the first match
    pub fn new(name: impl Into<String>, regexp: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            regexp: regexp.into(),
            match_no: 0,
            template: 1,
        }
    }

    /// Canonical template string: `"<name> <matchIndex> <captureTemplate> <regex>"`
    pub fn to_template(&self) -> String {
        format!(
            "{} {} {} {}",
            self.name, self.match_no, self.template, self.regexp
        )
    }
}

/// Response assertion rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertRule {
    /// Patterns the response must contain. Only the first is sent to the generator.
    pub contains: Vec<String>,
    /// Fail when the pattern IS found
    pub invert: bool,
}

impl AssertRule {
    /// Create a positive assertion on a single pattern
    pub fn contains(pattern: impl Into<String>) -> Self {
        Self {
            contains: vec![pattern.into()],
            invert: false,
        }
    }

    /// Create an inverted assertion on a single pattern
    pub fn not_contains(pattern: impl Into<String>) -> Self {
        Self {
            contains: vec![pattern.into()],
            invert: true,
        }
    }

    /// The pattern that gets encoded on the wire
    pub fn first_pattern(&self) -> Option<&str> {
        self.contains.first().map(String::as_str)
    }
}

/// A single HTTP request definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSpec {
    /// HTTP method, upper case
    pub method: String,
    /// Absolute URL, or a path resolved against the scenario default address
    pub url: String,
    /// Sample label; defaults to the URL
    pub label: Option<String>,
    /// Request-level headers, applied last
    pub headers: Fields,
    /// Optional body
    pub body: Option<Body>,
    /// Extraction rules, in declaration order
    pub extract: Vec<ExtractRule>,
    /// Assertion rules, in declaration order
    pub assertions: Vec<AssertRule>,
}

impl RequestSpec {
    /// Create a request with the given method and URL
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into().to_uppercase(),
            url: url.into(),
            label: None,
            headers: Fields::new(),
            body: None,
            extract: Vec::new(),
            assertions: Vec::new(),
        }
    }

    /// Create a GET request
    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    /// Create a POST request
    pub fn post(url: impl Into<String>) -> Self {
        Self::new("POST", url)
    }

    /// Label used in results
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.url)
    }

    /// Set the label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Add a request-level header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Set the body
    pub fn with_body(mut self, body: impl Into<Body>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Add an extraction rule
    pub fn with_extract(mut self, rule: ExtractRule) -> Self {
        self.extract.push(rule);
        self
    }

    /// Add an assertion rule
    pub fn with_assert(mut self, rule: AssertRule) -> Self {
        self.assertions.push(rule);
        self
    }
}

/// Kind of a scenario entry
///
/// Only HTTP requests can be compiled; other block kinds are carried through
/// so the compiler can skip them with a warning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestKind {
    /// Plain HTTP request
    Http(RequestSpec),
    /// A block kind the payload format cannot express
    Unsupported {
        /// Block name as written in the scenario (e.g. `include-scenario`)
        kind: String,
    },
}

impl From<RequestSpec> for RequestKind {
    fn from(spec: RequestSpec) -> Self {
        RequestKind::Http(spec)
    }
}
