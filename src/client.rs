//! Minid client
//!
//! Ties identifier translation, checksums and the identifier service
//! together. All write operations require a logged-in [`AuthProvider`] and
//! fail with [`MinidError::LoginRequired`] before any request is sent.

use std::path::Path;

use serde_json::{Map, Value};

use crate::auth::{AuthProvider, NoAuth};
use crate::checksum::{compute_checksum, partition_supported, Algorithm, Checksum};
use crate::error::{MinidError, Result};
use crate::identifier::IdentifierTranslator;
use crate::record::{
    IdentifierLookup, IdentifierRecord, IdentifierUpdate, NewIdentifier, NAMESPACE, NAMESPACE_TEST,
};
use crate::service::IdentifierService;

/// Options for registering a new identifier
#[derive(Debug, Clone, Default)]
pub struct RegisterOptions {
    /// Human readable title; defaults to the filename for files
    pub title: Option<String>,
    /// Network locations the content can be fetched from
    pub locations: Vec<String>,
    /// Register in the non-permanent test namespace
    pub test: bool,
    /// Extra metadata stored with the identifier
    pub metadata: Map<String, Value>,
    /// Identifier this registration supersedes, in any known scheme
    pub replaces: Option<String>,
}

impl RegisterOptions {
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn locations(mut self, locations: Vec<String>) -> Self {
        self.locations = locations;
        self
    }

    pub fn test(mut self, test: bool) -> Self {
        self.test = test;
        self
    }

    pub fn replaces(mut self, replaces: impl Into<String>) -> Self {
        self.replaces = Some(replaces.into());
        self
    }
}

/// Client for minting and managing minids
pub struct MinidClient<S, A = NoAuth> {
    service: S,
    auth: A,
    translator: IdentifierTranslator,
    created_by: Option<String>,
}

impl<S: IdentifierService, A: AuthProvider> MinidClient<S, A> {
    pub fn new(service: S, auth: A) -> Self {
        Self {
            service,
            auth,
            translator: IdentifierTranslator::default(),
            created_by: None,
        }
    }

    /// Use a custom prefix table
    pub fn with_translator(mut self, translator: IdentifierTranslator) -> Self {
        self.translator = translator;
        self
    }

    /// Name recorded as `created_by` on registered files
    pub fn with_created_by(mut self, created_by: Option<String>) -> Self {
        self.created_by = created_by;
        self
    }

    pub fn translator(&self) -> &IdentifierTranslator {
        &self.translator
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn is_logged_in(&self) -> bool {
        self.auth.is_logged_in()
    }

    pub(crate) fn require_login(&self) -> Result<()> {
        if self.auth.is_logged_in() {
            Ok(())
        } else {
            Err(MinidError::LoginRequired)
        }
    }

    /// Register pre-computed checksums.
    ///
    /// Checksums with functions the service does not support are dropped with
    /// a warning; at least one supported checksum must remain.
    pub fn register(&self, checksums: Vec<Checksum>, options: RegisterOptions) -> Result<IdentifierRecord> {
        self.require_login()?;

        let title = options.title.unwrap_or_default();
        let (supported, unsupported) = partition_supported(checksums);
        if !unsupported.is_empty() {
            let names: Vec<&str> = unsupported.iter().map(|c| c.function.as_str()).collect();
            tracing::warn!(
                %title,
                unsupported = ?names,
                "unsupported checksums will not be included"
            );
        }
        if supported.is_empty() {
            return Err(MinidError::Validation(format!(
                "no supported checksum for \"{}\"",
                title
            )));
        }

        let replaces = options
            .replaces
            .as_deref()
            .map(|id| self.translator.to_hdl(id))
            .transpose()?;

        let mut metadata = options.metadata;
        metadata.insert("title".to_string(), Value::String(title));

        let request = NewIdentifier {
            namespace: if options.test { NAMESPACE_TEST } else { NAMESPACE }.to_string(),
            visible_to: vec!["public".to_string()],
            metadata,
            location: options.locations,
            checksums: supported,
            replaces,
        };
        self.service.create_identifier(&request)
    }

    /// Checksum a file with sha256 and register it
    pub fn register_file(&self, path: impl AsRef<Path>, options: RegisterOptions) -> Result<IdentifierRecord> {
        self.require_login()?;

        let path = path.as_ref();
        let checksum = Checksum::from_file(path, Algorithm::Sha256)?;
        let length = std::fs::metadata(path)?.len();

        let title = options
            .title
            .clone()
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| path.display().to_string());

        let mut options = options.title(title);
        options
            .metadata
            .insert("length".to_string(), Value::from(length));
        if let Some(created_by) = &self.created_by {
            options
                .metadata
                .insert("created_by".to_string(), Value::String(created_by.clone()));
        }

        let record = self.register(vec![checksum], options)?;
        tracing::info!(path = %path.display(), identifier = %record.identifier, "registered file");
        Ok(record)
    }

    /// Update title, locations, state or version links of an identifier.
    ///
    /// The identifier and any `replaces`/`replaced_by` links may be given in
    /// any known scheme; they are sent to the service in hdl form.
    pub fn update(&self, identifier: &str, update: IdentifierUpdate) -> Result<IdentifierRecord> {
        self.require_login()?;

        let hdl = self.translator.to_hdl(identifier)?;
        let mut update = update;
        if let Some(Some(replaces)) = &update.replaces {
            update.replaces = Some(Some(self.translator.to_hdl(replaces)?));
        }
        if let Some(Some(replaced_by)) = &update.replaced_by {
            update.replaced_by = Some(Some(self.translator.to_hdl(replaced_by)?));
        }
        self.service.update_identifier(&hdl, &update)
    }

    /// Fetch a single identifier, given in any known scheme
    pub fn get(&self, identifier: &str) -> Result<IdentifierRecord> {
        let hdl = self.translator.to_hdl(identifier)?;
        self.service.get_identifier(&hdl)
    }

    /// Look up an identifier, or the identifiers registered for a file.
    ///
    /// Anything with a known identifier prefix is fetched directly; any other
    /// entity is treated as a path and checksummed with `algorithm`.
    pub fn check(&self, entity: &str, algorithm: Algorithm) -> Result<IdentifierLookup> {
        if self.translator.is_valid_identifier(entity) {
            return self.get(entity).map(IdentifierLookup::from);
        }

        let checksum = compute_checksum(entity, algorithm)?;
        tracing::debug!(%algorithm, %checksum, "file lookup");
        self.service.get_identifier_by_checksum(&checksum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticToken;
    use crate::memory::{InMemoryIdentifierService, ServiceCall};
    use serde_json::json;

    fn logged_in() -> MinidClient<InMemoryIdentifierService, StaticToken> {
        MinidClient::new(InMemoryIdentifierService::new(), StaticToken::new("token"))
    }

    fn sha256(value: &str) -> Checksum {
        Checksum::new(Algorithm::Sha256, value)
    }

    fn last_create(client: &MinidClient<InMemoryIdentifierService, StaticToken>) -> NewIdentifier {
        client
            .service()
            .calls()
            .into_iter()
            .rev()
            .find_map(|call| match call {
                ServiceCall::Create(request) => Some(request),
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn test_write_requires_login() {
        let client = MinidClient::new(InMemoryIdentifierService::new(), NoAuth);
        assert!(matches!(
            client.register(vec![sha256("abc")], RegisterOptions::default()),
            Err(MinidError::LoginRequired)
        ));
        assert!(matches!(
            client.update("minid:abc", IdentifierUpdate::default()),
            Err(MinidError::LoginRequired)
        ));
        assert!(client.service().calls().is_empty());
    }

    #[test]
    fn test_register_drops_unsupported_checksums() {
        let client = logged_in();
        let checksums = vec![
            sha256("mock_checksum"),
            Checksum { function: "NOT_REAL".into(), value: "irrelevant!".into() },
        ];
        client
            .register(checksums, RegisterOptions::default().title("foo.txt"))
            .unwrap();

        let request = last_create(&client);
        assert_eq!(request.checksums, vec![sha256("mock_checksum")]);
        assert_eq!(request.namespace, NAMESPACE);
        assert_eq!(request.visible_to, vec!["public"]);
        assert_eq!(serde_json::to_value(&request.metadata).unwrap(), json!({"title": "foo.txt"}));
    }

    #[test]
    fn test_register_without_supported_checksum_fails() {
        let client = logged_in();
        let result = client.register(
            vec![Checksum { function: "crc32".into(), value: "1".into() }],
            RegisterOptions::default(),
        );
        assert!(matches!(result, Err(MinidError::Validation(_))));
        assert!(client.service().calls().is_empty());
    }

    #[test]
    fn test_register_translates_replaces() {
        let client = logged_in();
        let old = client
            .register(vec![sha256("a")], RegisterOptions::default())
            .unwrap();
        let minid = client.translator().to_minid(&old.identifier).unwrap();
        client
            .register(vec![sha256("b")], RegisterOptions::default().replaces(minid))
            .unwrap();
        assert_eq!(last_create(&client).replaces.as_deref(), Some(old.identifier.as_str()));
    }

    #[test]
    fn test_register_test_namespace() {
        let client = logged_in();
        let record = client
            .register(vec![sha256("a")], RegisterOptions::default().test(true))
            .unwrap();
        assert_eq!(last_create(&client).namespace, NAMESPACE_TEST);
        assert!(client.translator().is_test(&record.identifier));
    }

    #[test]
    fn test_register_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("foo.txt");
        std::fs::write(&path, "hello").unwrap();

        let client = logged_in().with_created_by(Some("Test User".to_string()));
        let record = client
            .register_file(&path, RegisterOptions::default().title("foo.txt"))
            .unwrap();

        assert_eq!(record.title(), Some("foo.txt"));
        assert_eq!(record.length(), Some(5));
        assert_eq!(record.metadata.get("created_by"), Some(&json!("Test User")));
        assert_eq!(
            record.checksums,
            vec![sha256("2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824")]
        );
    }

    #[test]
    fn test_update_translates_identifiers() {
        let client = logged_in();
        let first = client.register(vec![sha256("a")], RegisterOptions::default()).unwrap();
        let first_minid = client.translator().to_minid(&first.identifier).unwrap();

        client
            .update(
                &first_minid,
                IdentifierUpdate::default()
                    .replaces(Some("minid:second".to_string()))
                    .replaced_by(Some("minid:thd".to_string())),
            )
            .unwrap();

        let call = client.service().calls().pop().unwrap();
        match call {
            ServiceCall::Update(identifier, update) => {
                assert_eq!(identifier, first.identifier);
                assert_eq!(update.replaces, Some(Some("hdl:20.500.12582/second".to_string())));
                assert_eq!(update.replaced_by, Some(Some("hdl:20.500.12582/thd".to_string())));
            }
            other => panic!("Expected update, got {:?}", other),
        }
    }

    #[test]
    fn test_update_can_clear_links() {
        let client = logged_in();
        let record = client.register(vec![sha256("a")], RegisterOptions::default()).unwrap();
        let updated = client
            .update(&record.identifier, IdentifierUpdate::default().replaces(None))
            .unwrap();
        assert!(updated.replaces.is_none());
    }

    #[test]
    fn test_update_rejects_unknown_identifier() {
        let client = logged_in();
        assert!(matches!(
            client.update("doi:10.1/x", IdentifierUpdate::default()),
            Err(MinidError::UnknownIdentifier(_))
        ));
    }

    #[test]
    fn test_check_identifier_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("foo.txt");
        std::fs::write(&path, "hello").unwrap();

        let client = logged_in();
        let record = client.register_file(&path, RegisterOptions::default()).unwrap();
        let minid = client.translator().to_minid(&record.identifier).unwrap();

        let by_id = client.check(&minid, Algorithm::Sha256).unwrap();
        assert_eq!(by_id.identifiers[0].identifier, record.identifier);

        let by_file = client.check(path.to_str().unwrap(), Algorithm::Sha256).unwrap();
        assert_eq!(by_file.identifiers.len(), 1);

        let by_md5 = client.check(path.to_str().unwrap(), Algorithm::Md5).unwrap();
        assert!(by_md5.identifiers.is_empty());
    }

    #[test]
    fn test_check_missing_file() {
        let client = logged_in();
        assert!(matches!(
            client.check("does_not_exist.txt", Algorithm::Sha256),
            Err(MinidError::FileNotFound(_))
        ));
    }
}
