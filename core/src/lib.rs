//! loadwire-core: shared data model for loadwire
//!
//! This crate holds the types passed between the payload compiler, the
//! result decoders and the run controller:
//!
//! - Request and scenario definitions
//! - The string interning table
//! - Decoded result samples and health snapshots
//! - The typed generator configuration document
//! - The `ResultDecoder` trait and error types

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod fields;
pub mod request;
pub mod sample;
pub mod scenario;
pub mod strings;
pub mod traits;

pub use config::{
    workload_schedule, ArtifactPaths, GeneratorConfig, OutputFormat, WorkerMode, WorkloadLevel,
};
pub use error::{Error, Result};
pub use fields::Fields;
pub use request::{AssertRule, Body, ExtractRule, RequestKind, RequestSpec};
pub use sample::{HealthSnapshot, ResultSample};
pub use scenario::{LoadProfile, Scenario, SYNTHETIC_DRIVER};
pub use strings::{StringIndex, StringTable};
pub use traits::{DecodeError, ResultDecoder};
