use serde::{Deserialize, Serialize};

use super::catalog::Catalog;
use super::profile::Profile;

/// Top-level document: either a catalog or a profile
///
/// This is the unit a document loader returns. The wire form is externally
/// tagged: `{"catalog": {...}}` or `{"profile": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Document {
    Catalog(Catalog),
    Profile(Profile),
}

impl Document {
    /// The document kind as a display name
    pub fn kind(&self) -> &'static str {
        match self {
            Document::Catalog(_) => "catalog",
            Document::Profile(_) => "profile",
        }
    }

    /// True if this document is a profile needing resolution
    pub fn is_profile(&self) -> bool {
        matches!(self, Document::Profile(_))
    }

    /// The catalog, if this document is one
    pub fn as_catalog(&self) -> Option<&Catalog> {
        match self {
            Document::Catalog(catalog) => Some(catalog),
            Document::Profile(_) => None,
        }
    }

    /// The profile, if this document is one
    pub fn as_profile(&self) -> Option<&Profile> {
        match self {
            Document::Profile(profile) => Some(profile),
            Document::Catalog(_) => None,
        }
    }
}

impl From<Catalog> for Document {
    fn from(catalog: Catalog) -> Self {
        Document::Catalog(catalog)
    }
}

impl From<Profile> for Document {
    fn from(profile: Profile) -> Self {
        Document::Profile(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_document_tagging() {
        let doc = Document::from(Catalog::new(Uuid::new_v4()));
        let json = serde_json::to_value(&doc).unwrap();

        assert!(json.get("catalog").is_some());
        assert_eq!(doc.kind(), "catalog");
        assert!(!doc.is_profile());
    }

    #[test]
    fn test_profile_document_accessors() {
        let doc = Document::from(Profile::new(Uuid::new_v4()));

        assert!(doc.is_profile());
        assert!(doc.as_profile().is_some());
        assert!(doc.as_catalog().is_none());
    }
}
