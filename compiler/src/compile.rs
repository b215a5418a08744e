//! Payload compiler
//!
//! Walks the scenario's requests in order and turns each into a
//! [`WireRecord`]. Interning state lives in an explicit [`StringTable`]
//! owned by the compilation result.

use crate::http::build_request;
use crate::metadata::{IndexedMeta, LiteralAssert, LiteralMeta, RecordMeta, WireRecord};
use crate::vars;
use loadwire_core::{Error, RequestKind, RequestSpec, Result, Scenario, StringTable};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Compiler switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    /// Replace literal metadata strings with string-table indices
    pub intern_strings: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            intern_strings: true,
        }
    }
}

/// Output of one compilation
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledPayload {
    /// Records in request order
    pub records: Vec<WireRecord>,
    /// Input string table, present when interning is enabled
    pub strings: Option<StringTable>,
    /// Whether the generator must evaluate extraction regexes
    pub uses_regex: bool,
}

impl CompiledPayload {
    /// Write the payload file
    pub fn write_payload(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        for record in &self.records {
            record.write_to(&mut writer)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Write the string table, if any
    pub fn write_strings(&self, path: &Path) -> Result<()> {
        if let Some(table) = &self.strings {
            table.write_to(BufWriter::new(File::create(path)?))?;
        }
        Ok(())
    }
}

/// Per-compilation bookkeeping
struct CompileState {
    records: Vec<WireRecord>,
    strings: Option<StringTable>,
    produced: BTreeSet<String>,
    consumed: BTreeSet<String>,
    first_address: Option<String>,
}

/// Compiles a scenario's requests into wire records
#[derive(Debug)]
pub struct PayloadCompiler<'a> {
    scenario: &'a Scenario,
    options: CompileOptions,
}

impl<'a> PayloadCompiler<'a> {
    /// Create a compiler for a scenario
    pub fn new(scenario: &'a Scenario, options: CompileOptions) -> Self {
        Self { scenario, options }
    }

    /// Compile all requests
    ///
    /// Zero records is fatal, except for the synthetic driver which gets a
    /// single `GET /` instead.
    pub fn compile(&self) -> Result<CompiledPayload> {
        let compiled = self.compile_requests(&self.scenario.requests)?;
        if !compiled.records.is_empty() {
            return Ok(compiled);
        }

        if self.scenario.is_synthetic() {
            tracing::info!("synthetic protocol without requests, using a single 'GET /'");
            let url = if self.scenario.default_address.is_some() {
                "/"
            } else {
                "http://localhost/"
            };
            let fallback = [RequestKind::Http(RequestSpec::get(url).with_label("/"))];
            let compiled = self.compile_requests(&fallback)?;
            if !compiled.records.is_empty() {
                return Ok(compiled);
            }
        }

        Err(Error::NoRequests)
    }

    fn compile_requests(&self, requests: &[RequestKind]) -> Result<CompiledPayload> {
        let mut state = CompileState {
            records: Vec::with_capacity(requests.len()),
            strings: self.options.intern_strings.then(StringTable::new),
            produced: self.scenario.variables.keys().map(str::to_string).collect(),
            consumed: BTreeSet::new(),
            first_address: None,
        };

        for request in requests {
            match request {
                RequestKind::Http(spec) => self.compile_one(spec, &mut state)?,
                RequestKind::Unsupported { kind } => {
                    tracing::warn!(kind = %kind, "payload compiler doesn't support this block, skipping");
                }
            }
        }

        let uses_regex = self
            .scenario
            .enable_regex
            .unwrap_or(!state.produced.is_empty() && !state.consumed.is_empty());

        tracing::debug!(
            records = state.records.len(),
            strings = state.strings.as_ref().map_or(0, StringTable::len),
            uses_regex,
            "payload compiled"
        );

        Ok(CompiledPayload {
            records: state.records,
            strings: state.strings,
            uses_regex,
        })
    }

    fn compile_one(&self, spec: &RequestSpec, state: &mut CompileState) -> Result<()> {
        let (target, payload) = build_request(spec, self.scenario)?;
        let label = spec.label();

        if self.scenario.single_target {
            match &state.first_address {
                Some(expected) if *expected != target.address => {
                    return Err(Error::InconsistentTarget {
                        expected: expected.clone(),
                        found: target.address,
                    });
                }
                Some(_) => {}
                None => state.first_address = Some(target.address.clone()),
            }
        }

        let consumes = vars::collect_unique([payload.as_str(), target.address.as_str(), label]);
        for name in &consumes {
            if !state.produced.contains(name) {
                tracing::debug!(
                    variable = %name,
                    label,
                    "variable is consumed before any request produces it"
                );
            }
        }
        state.consumed.extend(consumes.iter().cloned());

        let extracts: Vec<String> = spec.extract.iter().map(|rule| rule.to_template()).collect();
        state
            .produced
            .extend(spec.extract.iter().map(|rule| rule.name.clone()));

        let asserts = spec
            .assertions
            .iter()
            .map(|rule| {
                rule.first_pattern()
                    .map(|pattern| LiteralAssert {
                        pattern: pattern.to_string(),
                        invert: rule.invert,
                    })
                    .ok_or_else(|| {
                        Error::config(format!("assertion without 'contains' pattern in '{label}'"))
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        let literal = LiteralMeta {
            payload_len: payload.len(),
            address: target.address,
            label: label.to_string(),
            consumes,
            extracts,
            asserts,
        };

        let meta = match state.strings.as_mut() {
            Some(table) => {
                check_single_line(&literal)?;
                RecordMeta::Indexed(IndexedMeta::intern(&literal, table))
            }
            None => RecordMeta::Literal(literal),
        };

        state.records.push(WireRecord { meta, payload });
        Ok(())
    }
}

/// The string table is addressed by line number, so interned strings must
/// not contain line breaks.
fn check_single_line(meta: &LiteralMeta) -> Result<()> {
    let fields = [("address", meta.address.as_str()), ("label", meta.label.as_str())]
        .into_iter()
        .chain(meta.extracts.iter().map(|tpl| ("extract-regexp", tpl.as_str())))
        .chain(meta.asserts.iter().map(|a| ("assert", a.pattern.as_str())));

    for (field, value) in fields {
        if value.contains(['\n', '\r']) {
            return Err(Error::config(format!(
                "{field} of request '{}' contains a line break: {value:?}",
                meta.label
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use loadwire_core::{AssertRule, ExtractRule};
    use std::collections::HashSet;

    fn login_scenario() -> Scenario {
        Scenario::with_requests([
            RequestSpec::post("/login")
                .with_label("login")
                .with_body("user=${user}")
                .with_extract(ExtractRule::new("token", "token=(\\w+)"))
                .with_assert(AssertRule::contains("Welcome")),
            RequestSpec::post("/api")
                .with_label("api")
                .with_body("token=${token}")
                .with_assert(AssertRule::not_contains("error")),
        ])
        .default_address("http://localhost:8080")
    }

    fn literal(record: &WireRecord) -> &LiteralMeta {
        match &record.meta {
            RecordMeta::Literal(meta) => meta,
            RecordMeta::Indexed(_) => panic!("expected literal metadata"),
        }
    }

    #[test]
    fn test_consumer_of_extracted_variable() {
        let scenario = login_scenario();
        let compiled = PayloadCompiler::new(&scenario, CompileOptions { intern_strings: false })
            .compile()
            .unwrap();

        assert_eq!(compiled.records.len(), 2);
        assert_eq!(literal(&compiled.records[0]).consumes, vec!["user"]);
        assert_eq!(literal(&compiled.records[1]).consumes, vec!["token"]);
        assert_eq!(
            literal(&compiled.records[0]).extracts,
            vec!["token 0 1 token=(\\w+)"]
        );
        assert!(compiled.uses_regex);
        assert!(compiled.strings.is_none());
    }

    #[test]
    fn test_payload_len_is_utf8_bytes() {
        let scenario = Scenario::with_requests([RequestSpec::post("/").with_body("ünïcödé")])
            .default_address("http://localhost");
        let compiled = PayloadCompiler::new(&scenario, CompileOptions { intern_strings: false })
            .compile()
            .unwrap();
        let record = &compiled.records[0];

        assert_eq!(record.meta.payload_len(), record.payload.len());
        assert!(record.payload.len() > record.payload.chars().count());
    }

    #[test]
    fn test_interned_table_has_no_duplicates_and_resolves() {
        let scenario = login_scenario();
        let interned = PayloadCompiler::new(&scenario, CompileOptions { intern_strings: true })
            .compile()
            .unwrap();
        let literal_run = PayloadCompiler::new(&scenario, CompileOptions { intern_strings: false })
            .compile()
            .unwrap();

        let table = interned.strings.as_ref().unwrap();
        let unique: HashSet<&str> = table.iter().collect();
        assert_eq!(unique.len(), table.len());

        for (indexed, plain) in interned.records.iter().zip(&literal_run.records) {
            let RecordMeta::Indexed(meta) = &indexed.meta else {
                panic!("expected indexed metadata");
            };
            assert_eq!(meta.resolve(table).as_ref(), Some(literal(plain)));
            assert_eq!(indexed.payload, plain.payload);
        }
    }

    #[test]
    fn test_recompilation_is_deterministic() {
        let scenario = login_scenario();
        let compiler = PayloadCompiler::new(&scenario, CompileOptions::default());
        assert_eq!(compiler.compile().unwrap(), compiler.compile().unwrap());
    }

    #[test]
    fn test_unsupported_blocks_are_skipped() {
        let mut scenario = login_scenario();
        scenario.requests.insert(
            0,
            RequestKind::Unsupported {
                kind: "include-scenario".into(),
            },
        );
        let compiled = PayloadCompiler::new(&scenario, CompileOptions::default())
            .compile()
            .unwrap();
        assert_eq!(compiled.records.len(), 2);
    }

    #[test]
    fn test_no_requests_is_fatal() {
        let scenario = Scenario::default();
        let result = PayloadCompiler::new(&scenario, CompileOptions::default()).compile();
        assert!(matches!(result, Err(Error::NoRequests)));
    }

    #[test]
    fn test_synthetic_driver_falls_back_to_root() {
        let scenario = Scenario {
            protocol: "dummy".into(),
            ..Default::default()
        };
        let compiled = PayloadCompiler::new(&scenario, CompileOptions { intern_strings: false })
            .compile()
            .unwrap();

        assert_eq!(compiled.records.len(), 1);
        assert!(compiled.records[0].payload.starts_with("GET / HTTP/1.1\r\n"));
        assert!(!compiled.uses_regex);
    }

    #[test]
    fn test_single_target_rejects_second_host() {
        let mut scenario = Scenario::with_requests([
            RequestSpec::get("http://a.local/"),
            RequestSpec::get("http://b.local/"),
        ]);
        scenario.single_target = true;
        let result = PayloadCompiler::new(&scenario, CompileOptions::default()).compile();
        assert!(matches!(
            result,
            Err(Error::InconsistentTarget { expected, found })
                if expected == "http://a.local" && found == "http://b.local"
        ));
    }

    #[test]
    fn test_empty_assertion_is_config_error() {
        let mut request = RequestSpec::get("http://localhost/");
        request.assertions.push(AssertRule {
            contains: vec![],
            invert: false,
        });
        let scenario = Scenario::with_requests([request]);
        let result = PayloadCompiler::new(&scenario, CompileOptions::default()).compile();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_interned_strings_reject_line_breaks() {
        let scenario = Scenario::with_requests([
            RequestSpec::get("http://localhost/").with_label("multi\nline label")
        ]);
        let err = PayloadCompiler::new(&scenario, CompileOptions::default())
            .compile()
            .unwrap_err();
        assert!(matches!(&err, Error::Config(msg) if msg.starts_with("label of request")));

        let scenario = Scenario::with_requests([RequestSpec::get("http://localhost/")
            .with_label("home")
            .with_assert(AssertRule::contains("ok\r\n"))]);
        let err = PayloadCompiler::new(&scenario, CompileOptions::default())
            .compile()
            .unwrap_err();
        assert!(matches!(&err, Error::Config(msg) if msg.starts_with("assert of request 'home'")));
    }

    #[test]
    fn test_literal_metadata_keeps_line_breaks() {
        let scenario = Scenario::with_requests([
            RequestSpec::get("http://localhost/").with_label("multi\nline label")
        ]);
        let compiled = PayloadCompiler::new(&scenario, CompileOptions { intern_strings: false })
            .compile()
            .unwrap();
        assert_eq!(literal(&compiled.records[0]).label, "multi\nline label");
    }

    #[test]
    fn test_enable_regex_override() {
        let mut scenario = login_scenario();
        scenario.enable_regex = Some(false);
        let compiled = PayloadCompiler::new(&scenario, CompileOptions::default())
            .compile()
            .unwrap();
        assert!(!compiled.uses_regex);
    }

    #[test]
    fn test_write_payload_file() {
        let dir = tempfile::tempdir().unwrap();
        let scenario = login_scenario();
        let compiled = PayloadCompiler::new(&scenario, CompileOptions::default())
            .compile()
            .unwrap();

        let payload_path = dir.path().join("payload.inp");
        let strings_path = dir.path().join("payload.istr");
        compiled.write_payload(&payload_path).unwrap();
        compiled.write_strings(&strings_path).unwrap();

        let payload = std::fs::read_to_string(&payload_path).unwrap();
        assert!(payload.starts_with("{\"plen\":"));
        assert_eq!(payload.matches("HTTP/1.1\r\n").count(), 2);

        let strings = std::fs::read_to_string(&strings_path).unwrap();
        assert_eq!(strings.lines().next(), Some("http://localhost:8080"));
        assert!(strings.ends_with('\n'));
    }
}
