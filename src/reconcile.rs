//! Batch registration of manifests
//!
//! Each manifest entry gets an identifier. By default that is always a
//! freshly minted one. With `update_if_exists`, an entry whose `url` already
//! holds an identifier from the requested namespace may keep it:
//!
//! | update_if_exists | valid id | same namespace | checksums match | action   |
//! |------------------|----------|----------------|-----------------|----------|
//! | false            | -        | -              | -               | register |
//! | true             | false    | -              | -               | register |
//! | true             | true     | false          | -               | register |
//! | true             | true     | true           | true            | update   |
//! | true             | true     | true           | false           | replace  |
//!
//! An existing identifier is only taken over when both its namespace and its
//! content are proven to match.

use serde::Serialize;

use std::fmt;
use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::auth::AuthProvider;
use crate::checksum::checksums_match;
use crate::client::{MinidClient, RegisterOptions};
use crate::error::{MinidError, Result};
use crate::manifest::{ManifestEntry, ManifestReader};
use crate::record::IdentifierUpdate;
use crate::service::IdentifierService;

/// What to do with one manifest entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Mint a new identifier
    Register,
    /// Keep the existing identifier, refresh its title and locations
    Update,
    /// Mint a new identifier that replaces the existing one
    Replace,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Register => f.write_str("register"),
            Action::Update => f.write_str("update"),
            Action::Replace => f.write_str("replace"),
        }
    }
}

/// Everything the decision depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecisionInputs {
    pub update_if_exists: bool,
    pub is_valid: bool,
    pub matches_namespace: bool,
    /// Comparison with the existing record; `None` until it has been fetched
    pub checksums_match: Option<bool>,
}

impl DecisionInputs {
    /// True when the existing record must be fetched to decide
    pub fn requires_lookup(&self) -> bool {
        self.update_if_exists && self.is_valid && self.matches_namespace
    }
}

/// The reconciliation decision table
pub fn decide(inputs: &DecisionInputs) -> Action {
    match (inputs.requires_lookup(), inputs.checksums_match) {
        (false, _) => Action::Register,
        (true, Some(true)) => Action::Update,
        (true, Some(false) | None) => Action::Replace,
    }
}

/// Options for a batch run
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchOptions {
    /// Register in the test namespace
    pub test: bool,
    /// Keep existing identifiers whose content is unchanged
    pub update_if_exists: bool,
}

/// Cooperative cancellation for a batch, checked before each entry
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Result of reconciling one entry
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub action: Action,
    /// The entry with `url` replaced by the resulting identifier
    pub entry: ManifestEntry,
}

/// Result of a batch run
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// Updated entries, in manifest order
    pub entries: Vec<ManifestEntry>,
    pub registered: usize,
    pub updated: usize,
    pub replaced: usize,
    pub elapsed: Duration,
}

impl BatchReport {
    fn record(&mut self, outcome: Outcome) {
        match outcome.action {
            Action::Register => self.registered += 1,
            Action::Update => self.updated += 1,
            Action::Replace => self.replaced += 1,
        }
        self.entries.push(outcome.entry);
    }
}

/// Reconciles manifest entries against the identifier service
pub struct BatchReconciler<'a, S, A> {
    client: &'a MinidClient<S, A>,
    options: BatchOptions,
    cancel: CancelToken,
}

impl<'a, S: IdentifierService, A: AuthProvider> BatchReconciler<'a, S, A> {
    pub fn new(client: &'a MinidClient<S, A>, options: BatchOptions) -> Self {
        Self {
            client,
            options,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Identifier already held by the entry: `url` itself, or the first
    /// location that is a known identifier
    fn existing_identifier(&self, locations: &[String]) -> Option<String> {
        let translator = self.client.translator();
        locations
            .iter()
            .find(|l| translator.is_valid_identifier(l))
            .or_else(|| locations.first())
            .cloned()
    }

    /// Register, update or replace the identifier for one entry
    pub fn reconcile(&self, entry: ManifestEntry) -> Result<Outcome> {
        // Checked before the existing-record lookup
        self.client.require_login()?;

        let filename = entry.filename().to_string();
        let (checksums, unsupported) = entry.checksums();
        if !unsupported.is_empty() {
            tracing::warn!(
                %filename,
                ?unsupported,
                "unsupported checksums will not be included"
            );
        }
        if checksums.is_empty() {
            return Err(MinidError::Validation(format!(
                "manifest entry \"{}\" has no supported checksum",
                filename
            )));
        }

        let locations = entry.locations();
        let url = self.existing_identifier(&locations).unwrap_or_default();
        let translator = self.client.translator();

        let mut inputs = DecisionInputs {
            update_if_exists: self.options.update_if_exists,
            is_valid: translator.is_valid_identifier(&url),
            matches_namespace: translator.is_test(&url) == self.options.test,
            checksums_match: None,
        };
        tracing::debug!(
            %url,
            is_valid = inputs.is_valid,
            matches_namespace = inputs.matches_namespace,
            "reconciling entry"
        );

        if inputs.requires_lookup() {
            let existing = self.client.get(&url)?;
            inputs.checksums_match = Some(checksums_match(&existing.checksums, &checksums));
        }

        let action = decide(&inputs);
        let options = RegisterOptions::default()
            .title(filename.clone())
            .locations(locations)
            .test(self.options.test);

        let identifier = match action {
            Action::Register => {
                let record = self.client.register(checksums, options)?;
                tracing::info!(%filename, from = %url, to = %record.identifier, "registered");
                record.identifier
            }
            Action::Update => {
                let update = IdentifierUpdate::default()
                    .title(filename.clone())
                    .locations(options.locations);
                let record = self.client.update(&url, update)?;
                tracing::info!(%filename, identifier = %record.identifier, "updated existing identifier");
                url
            }
            Action::Replace => {
                let record = self.client.register(checksums, options.replaces(url.clone()))?;
                tracing::info!(%filename, old = %url, new = %record.identifier, "replaced existing identifier");
                record.identifier
            }
        };

        let mut entry = entry;
        entry.set_url(identifier);
        Ok(Outcome { action, entry })
    }

    /// Reconcile every entry in order, stopping at the first failure
    pub fn run<I>(&self, entries: I) -> Result<BatchReport>
    where
        I: IntoIterator<Item = Result<ManifestEntry>>,
    {
        tracing::info!("processing batch registrations");
        let start = Instant::now();
        let mut report = BatchReport::default();

        for entry in entries {
            if self.cancel.is_cancelled() {
                return Err(MinidError::Cancelled {
                    completed: report.entries.len(),
                });
            }
            report.record(self.reconcile(entry?)?);
        }

        report.elapsed = start.elapsed();
        tracing::info!(
            entries = report.entries.len(),
            registered = report.registered,
            updated = report.updated,
            replaced = report.replaced,
            elapsed = ?report.elapsed,
            "batch register complete"
        );
        Ok(report)
    }

    /// Read a manifest and reconcile all of its entries
    pub fn run_manifest<R: BufRead>(&self, manifest: ManifestReader<R>) -> Result<BatchReport> {
        self.run(manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(update: bool, valid: bool, ns: bool, matched: Option<bool>) -> DecisionInputs {
        DecisionInputs {
            update_if_exists: update,
            is_valid: valid,
            matches_namespace: ns,
            checksums_match: matched,
        }
    }

    #[test]
    fn test_decision_table() {
        assert_eq!(decide(&inputs(false, true, true, Some(true))), Action::Register);
        assert_eq!(decide(&inputs(true, false, true, None)), Action::Register);
        assert_eq!(decide(&inputs(true, true, false, None)), Action::Register);
        assert_eq!(decide(&inputs(true, true, true, Some(true))), Action::Update);
        assert_eq!(decide(&inputs(true, true, true, Some(false))), Action::Replace);
    }

    #[test]
    fn test_lookup_only_when_all_gates_pass() {
        assert!(inputs(true, true, true, None).requires_lookup());
        assert!(!inputs(false, true, true, None).requires_lookup());
        assert!(!inputs(true, false, true, None).requires_lookup());
        assert!(!inputs(true, true, false, None).requires_lookup());
    }

    #[test]
    fn test_cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }
}
