//! Identifier classification and translation
//!
//! Every identifier the client understands carries exactly one known prefix.
//! The prefix tells us both the scheme (`minid`, `hdl`, `ark`, ...) and the
//! namespace (production or test). Translating an identifier swaps its prefix
//! for the target scheme's prefix in the same namespace; the body after the
//! prefix is never touched.
//!
//! ```text
//! minid:abc123  <->  hdl:20.500.12582/abc123  <->  ark:/57799/abc123
//! minid.test:x  <->  hdl:20.500.12633/x       <->  ark:/99999/x
//! ```

use serde::{Deserialize, Serialize};

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::{MinidError, Result};

/// Scheme used for short-form identifiers
pub const MINID: &str = "minid";
/// Scheme understood by the identifier service
pub const HDL: &str = "hdl";
pub const ARK: &str = "ark";

/// Partition of the identifier space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    /// Permanent identifiers
    Production,
    /// Non-permanent identifiers for trying things out
    Test,
}

impl Namespace {
    pub fn from_test_flag(test: bool) -> Self {
        if test {
            Namespace::Test
        } else {
            Namespace::Production
        }
    }

    pub fn is_test(&self) -> bool {
        matches!(self, Namespace::Test)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Namespace::Production => f.write_str("production"),
            Namespace::Test => f.write_str("test"),
        }
    }
}

/// Immutable mapping of `(scheme, namespace)` to prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixTable {
    prefixes: BTreeMap<(String, Namespace), String>,
}

impl PrefixTable {
    /// Build a table, rejecting configurations where classification would be
    /// ambiguous.
    ///
    /// Every scheme must have a prefix in both namespaces, prefixes must be
    /// non-empty, and no prefix may be a prefix of another one.
    pub fn new<I, S, P>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Namespace, P)>,
        S: Into<String>,
        P: Into<String>,
    {
        let mut prefixes = BTreeMap::new();
        for (scheme, namespace, prefix) in entries {
            let scheme = scheme.into();
            let prefix = prefix.into();
            if prefix.is_empty() {
                return Err(MinidError::Config(format!(
                    "empty prefix for {} ({})",
                    scheme, namespace
                )));
            }
            if prefixes.insert((scheme.clone(), namespace), prefix).is_some() {
                return Err(MinidError::Config(format!(
                    "duplicate prefix for {} ({})",
                    scheme, namespace
                )));
            }
        }

        let table = Self { prefixes };
        table.validate()?;
        Ok(table)
    }

    /// Build a table from per-namespace `scheme -> prefix` maps
    pub fn from_namespaces(
        production: &BTreeMap<String, String>,
        test: &BTreeMap<String, String>,
    ) -> Result<Self> {
        let production = production
            .iter()
            .map(|(scheme, prefix)| (scheme.clone(), Namespace::Production, prefix.clone()));
        let test = test
            .iter()
            .map(|(scheme, prefix)| (scheme.clone(), Namespace::Test, prefix.clone()));
        Self::new(production.chain(test))
    }

    /// Copy of this table with `overrides` layered on top
    pub fn with_overrides(
        &self,
        production: &BTreeMap<String, String>,
        test: &BTreeMap<String, String>,
    ) -> Result<Self> {
        let mut merged_production = self.namespace_map(Namespace::Production);
        let mut merged_test = self.namespace_map(Namespace::Test);
        merged_production.extend(production.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged_test.extend(test.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self::from_namespaces(&merged_production, &merged_test)
    }

    fn namespace_map(&self, namespace: Namespace) -> BTreeMap<String, String> {
        self.prefixes
            .iter()
            .filter(|((_, ns), _)| *ns == namespace)
            .map(|((scheme, _), prefix)| (scheme.clone(), prefix.clone()))
            .collect()
    }

    fn validate(&self) -> Result<()> {
        for scheme in self.schemes() {
            for namespace in [Namespace::Production, Namespace::Test] {
                if !self.prefixes.contains_key(&(scheme.to_string(), namespace)) {
                    return Err(MinidError::Config(format!(
                        "scheme {} has no {} prefix",
                        scheme, namespace
                    )));
                }
            }
        }

        let all: Vec<(&(String, Namespace), &String)> = self.prefixes.iter().collect();
        for (i, (key_a, a)) in all.iter().enumerate() {
            for (key_b, b) in all.iter().skip(i + 1) {
                if a.starts_with(b.as_str()) || b.starts_with(a.as_str()) {
                    return Err(MinidError::Config(format!(
                        "ambiguous prefixes \"{}\" ({} {}) and \"{}\" ({} {})",
                        a, key_a.0, key_a.1, b, key_b.0, key_b.1
                    )));
                }
            }
        }
        Ok(())
    }

    /// Prefix for a scheme in a namespace
    pub fn prefix(&self, scheme: &str, namespace: Namespace) -> Option<&str> {
        self.prefixes
            .get(&(scheme.to_string(), namespace))
            .map(String::as_str)
    }

    /// All known schemes
    pub fn schemes(&self) -> BTreeSet<&str> {
        self.prefixes.keys().map(|(scheme, _)| scheme.as_str()).collect()
    }

    pub fn contains_scheme(&self, scheme: &str) -> bool {
        self.prefixes.keys().any(|(s, _)| s == scheme)
    }

    /// The single entry whose prefix starts `identifier`
    fn lookup(&self, identifier: &str) -> Option<(&str, Namespace, &str)> {
        self.prefixes
            .iter()
            .find(|(_, prefix)| identifier.starts_with(prefix.as_str()))
            .map(|((scheme, namespace), prefix)| (scheme.as_str(), *namespace, prefix.as_str()))
    }
}

impl Default for PrefixTable {
    fn default() -> Self {
        let prefixes = [
            (MINID, Namespace::Production, "minid:"),
            (HDL, Namespace::Production, "hdl:20.500.12582/"),
            (ARK, Namespace::Production, "ark:/57799/"),
            (MINID, Namespace::Test, "minid.test:"),
            (HDL, Namespace::Test, "hdl:20.500.12633/"),
            (ARK, Namespace::Test, "ark:/99999/"),
        ]
        .into_iter()
        .map(|(scheme, namespace, prefix)| ((scheme.to_string(), namespace), prefix.to_string()))
        .collect();
        Self { prefixes }
    }
}

/// An identifier broken into its parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identifier {
    pub scheme: String,
    pub namespace: Namespace,
    /// Everything after the prefix
    pub body: String,
}

/// Classifies identifier strings and rewrites them between schemes
#[derive(Debug, Clone, Default)]
pub struct IdentifierTranslator {
    table: PrefixTable,
}

impl IdentifierTranslator {
    pub fn new(table: PrefixTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &PrefixTable {
        &self.table
    }

    /// True if `identifier` carries a known prefix
    pub fn is_valid_identifier(&self, identifier: &str) -> bool {
        self.get_prefix(identifier).is_some()
    }

    /// The known prefix `identifier` starts with, if any
    pub fn get_prefix(&self, identifier: &str) -> Option<&str> {
        self.table.lookup(identifier).map(|(_, _, prefix)| prefix)
    }

    pub fn namespace_of(&self, identifier: &str) -> Option<Namespace> {
        self.table.lookup(identifier).map(|(_, namespace, _)| namespace)
    }

    /// True if `identifier` lives in the test namespace
    pub fn is_test(&self, identifier: &str) -> bool {
        self.namespace_of(identifier) == Some(Namespace::Test)
    }

    pub fn parse(&self, identifier: &str) -> Result<Identifier> {
        let (scheme, namespace, prefix) = self
            .table
            .lookup(identifier)
            .ok_or_else(|| MinidError::UnknownIdentifier(identifier.to_string()))?;
        Ok(Identifier {
            scheme: scheme.to_string(),
            namespace,
            body: identifier[prefix.len()..].to_string(),
        })
    }

    /// Rewrite `identifier` into `scheme`, keeping its namespace
    pub fn to_identifier(&self, identifier: &str, scheme: &str) -> Result<String> {
        if !self.table.contains_scheme(scheme) {
            return Err(MinidError::UnknownIdentifierType(scheme.to_string()));
        }
        let parsed = self.parse(identifier)?;
        let prefix = self
            .table
            .prefix(scheme, parsed.namespace)
            .ok_or_else(|| MinidError::UnknownIdentifierType(scheme.to_string()))?;
        Ok(format!("{}{}", prefix, parsed.body))
    }

    pub fn to_minid(&self, identifier: &str) -> Result<String> {
        self.to_identifier(identifier, MINID)
    }

    /// Form the identifier service expects
    pub fn to_hdl(&self, identifier: &str) -> Result<String> {
        self.to_identifier(identifier, HDL)
    }

    /// True if `entity` is a string in minid form, in either namespace
    pub fn is_minid(&self, entity: &serde_json::Value) -> bool {
        entity.as_str().is_some_and(|s| self.is_minid_str(s))
    }

    pub fn is_minid_str(&self, identifier: &str) -> bool {
        matches!(self.table.lookup(identifier), Some((MINID, _, _)))
    }
}
