//! In-memory identifier service (for tests and dry runs)

use chrono::Utc;

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{MinidError, Result};
use crate::identifier::{IdentifierTranslator, Namespace, HDL};
use crate::record::{IdentifierLookup, IdentifierRecord, IdentifierUpdate, NewIdentifier, NAMESPACE_TEST};
use crate::service::IdentifierService;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// A request seen by [`InMemoryIdentifierService`]
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceCall {
    Create(NewIdentifier),
    Update(String, IdentifierUpdate),
    Get(String),
    GetByChecksum(String),
}

#[derive(Default)]
struct State {
    records: BTreeMap<String, IdentifierRecord>,
    calls: Vec<ServiceCall>,
    minted: usize,
    fail_creates_after: Option<usize>,
}

/// Identifier service that keeps everything in memory.
///
/// Minted identifiers are hdl identifiers in the namespace of the request.
/// Creating with `replaces` links both records, like the hosted service.
#[derive(Default)]
pub struct InMemoryIdentifierService {
    translator: IdentifierTranslator,
    state: Mutex<State>,
}

impl InMemoryIdentifierService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_translator(translator: IdentifierTranslator) -> Self {
        Self {
            translator,
            state: Mutex::default(),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed a record as if it had been registered earlier
    pub fn insert(&self, record: IdentifierRecord) {
        self.state().records.insert(record.identifier.clone(), record);
    }

    /// Every request received so far, oldest first
    pub fn calls(&self) -> Vec<ServiceCall> {
        self.state().calls.clone()
    }

    pub fn create_count(&self) -> usize {
        self.count(|c| matches!(c, ServiceCall::Create(_)))
    }

    pub fn update_count(&self) -> usize {
        self.count(|c| matches!(c, ServiceCall::Update(..)))
    }

    fn count(&self, predicate: impl Fn(&ServiceCall) -> bool) -> usize {
        self.state().calls.iter().filter(|c| predicate(c)).count()
    }

    pub fn len(&self) -> usize {
        self.state().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make every create after the first `n` fail with a 503
    pub fn fail_creates_after(&self, n: usize) {
        self.state().fail_creates_after = Some(n);
    }

    fn not_found(identifier: &str) -> MinidError {
        MinidError::Registry {
            status: 404,
            message: format!("Identifier {} not found", identifier),
        }
    }

    fn mint(&self, state: &mut State, namespace: Namespace) -> Result<String> {
        state.minted += 1;
        let prefix = self
            .translator
            .table()
            .prefix(HDL, namespace)
            .ok_or_else(|| MinidError::UnknownIdentifierType(HDL.to_string()))?;
        Ok(format!("{}{:012x}", prefix, state.minted))
    }
}

impl IdentifierService for InMemoryIdentifierService {
    fn create_identifier(&self, request: &NewIdentifier) -> Result<IdentifierRecord> {
        let mut state = self.state();
        state.calls.push(ServiceCall::Create(request.clone()));

        if let Some(limit) = state.fail_creates_after {
            if state.minted >= limit {
                return Err(MinidError::Registry {
                    status: 503,
                    message: "Service unavailable".to_string(),
                });
            }
        }

        let namespace = Namespace::from_test_flag(request.namespace == NAMESPACE_TEST);
        let identifier = self.mint(&mut state, namespace)?;
        let now = Utc::now().format(TIMESTAMP_FORMAT).to_string();

        if let Some(old) = &request.replaces {
            let old_record = state
                .records
                .get_mut(old)
                .ok_or_else(|| Self::not_found(old))?;
            old_record.replaced_by = Some(identifier.clone());
            old_record.updated = Some(now.clone());
        }

        let record = IdentifierRecord {
            identifier: identifier.clone(),
            checksums: request.checksums.clone(),
            active: true,
            metadata: request.metadata.clone(),
            location: request.location.clone(),
            landing_page: Some(format!("https://identifiers.fair-research.org/{}", identifier)),
            visible_to: request.visible_to.clone(),
            admins: Vec::new(),
            created: Some(now.clone()),
            updated: Some(now),
            replaces: request.replaces.clone(),
            replaced_by: None,
        };
        state.records.insert(identifier, record.clone());
        Ok(record)
    }

    fn update_identifier(&self, identifier: &str, update: &IdentifierUpdate) -> Result<IdentifierRecord> {
        let mut state = self.state();
        state
            .calls
            .push(ServiceCall::Update(identifier.to_string(), update.clone()));

        let record = state
            .records
            .get_mut(identifier)
            .ok_or_else(|| Self::not_found(identifier))?;
        if let Some(metadata) = &update.metadata {
            record
                .metadata
                .extend(metadata.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        if let Some(location) = &update.location {
            record.location = location.clone();
        }
        if let Some(active) = update.active {
            record.active = active;
        }
        if let Some(replaces) = &update.replaces {
            record.replaces = replaces.clone();
        }
        if let Some(replaced_by) = &update.replaced_by {
            record.replaced_by = replaced_by.clone();
        }
        record.updated = Some(Utc::now().format(TIMESTAMP_FORMAT).to_string());
        Ok(record.clone())
    }

    fn get_identifier(&self, identifier: &str) -> Result<IdentifierRecord> {
        let mut state = self.state();
        state.calls.push(ServiceCall::Get(identifier.to_string()));
        state
            .records
            .get(identifier)
            .cloned()
            .ok_or_else(|| Self::not_found(identifier))
    }

    fn get_identifier_by_checksum(&self, checksum: &str) -> Result<IdentifierLookup> {
        let mut state = self.state();
        state
            .calls
            .push(ServiceCall::GetByChecksum(checksum.to_string()));
        let identifiers = state
            .records
            .values()
            .filter(|r| r.checksums.iter().any(|c| c.value == checksum))
            .cloned()
            .collect();
        Ok(IdentifierLookup { identifiers })
    }
}
