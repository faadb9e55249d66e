//! Minid
//!
//! Minimal, checksum-verifiable identifiers for data files.
//!
//! ## Features
//!
//! - **Identifier Translation**: Classify `minid:`, `hdl:` and `ark:` identifiers
//!   and rewrite them between schemes without leaving their namespace
//! - **Checksum Comparison**: Decide whether two checksum sets describe the same
//!   content, even when they were computed with different hash functions
//! - **Manifest Reading**: Remote file manifests as a JSON array or a stream of
//!   one JSON object per line
//! - **Batch Registration**: Register, update or replace identifiers for every
//!   entry of a manifest
//!
//! ## Architecture
//!
//! ```text
//! manifest ──> BatchReconciler ──> MinidClient ──> IdentifierService
//!                    │                  │              ├── HttpIdentifierService
//!                    │                  │              └── InMemoryIdentifierService
//!                    └── checksums_match└── IdentifierTranslator (PrefixTable)
//! ```

pub mod auth;
pub mod checksum;
pub mod client;
pub mod config;
pub mod error;
pub mod format;
pub mod identifier;
pub mod manifest;
pub mod memory;
pub mod reconcile;
pub mod record;
pub mod service;

pub use auth::{AuthProvider, BearerToken, NoAuth, StaticToken};
pub use checksum::{checksums_match, compute_checksum, Algorithm, Checksum};
pub use client::{MinidClient, RegisterOptions};
pub use config::MinidConfig;
pub use error::{ErrorKind, MinidError, Result};
pub use identifier::{Identifier, IdentifierTranslator, Namespace, PrefixTable};
pub use manifest::{write_manifest, ManifestEntry, ManifestReader};
pub use memory::InMemoryIdentifierService;
pub use reconcile::{decide, Action, BatchOptions, BatchReconciler, BatchReport, CancelToken, DecisionInputs};
pub use record::{IdentifierLookup, IdentifierRecord, IdentifierUpdate, NewIdentifier};
pub use service::{HttpIdentifierService, IdentifierService};
