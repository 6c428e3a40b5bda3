//! Domain models shared by the reconciler, the migration applier and the
//! capability implementations.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A named backend resource, such as a storage bucket.
///
/// Resources are compared by `name` only, verbatim and case-sensitive. The
/// remaining attributes are used when a missing resource has to be created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedResource {
    pub name: String,
    /// Whether objects are readable without a signed URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public: Option<bool>,
    /// Maximum object size in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size_limit: Option<u64>,
    /// Allowed content-type patterns, e.g. `image/*`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_mime_types: Option<Vec<String>>,
}

impl NamedResource {
    /// Creates a resource with only a name and no attributes.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            public: None,
            file_size_limit: None,
            allowed_mime_types: None,
        }
    }
}

/// One named block of SQL, applied as a single execution call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationUnit {
    pub name: String,
    pub sql: String,
}

impl MigrationUnit {
    pub fn new(name: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql: sql.into(),
        }
    }

    /// Lowercase hex SHA-256 of the SQL text.
    ///
    /// Printed alongside each outcome so operators can tell which revision of
    /// a file was applied.
    pub fn checksum(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.sql.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_resource_new_has_no_attributes() {
        let res = NamedResource::new("avatars");
        assert_eq!(res.name, "avatars");
        assert!(res.public.is_none());
        assert!(res.file_size_limit.is_none());
        assert!(res.allowed_mime_types.is_none());
    }

    #[test]
    fn test_named_resource_deserialize_partial() {
        let json = r#"{"name": "receipts", "public": false}"#;
        let res: NamedResource = serde_json::from_str(json).unwrap();
        assert_eq!(res.name, "receipts");
        assert_eq!(res.public, Some(false));
        assert!(res.allowed_mime_types.is_none());
    }

    #[test]
    fn test_checksum_is_stable_and_hex() {
        let unit = MigrationUnit::new("001.sql", "CREATE TABLE IF NOT EXISTS t (id int);");
        let a = unit.checksum();
        let b = unit.checksum();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_checksum_differs_on_content() {
        let a = MigrationUnit::new("001.sql", "SELECT 1;");
        let b = MigrationUnit::new("001.sql", "SELECT 2;");
        assert_ne!(a.checksum(), b.checksum());
    }
}
