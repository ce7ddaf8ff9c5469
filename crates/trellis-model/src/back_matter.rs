use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::metadata::Property;

/// Back matter - the document's resource attachments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct BackMatter {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<Resource>,
}

impl BackMatter {
    /// Look up a resource by uuid
    pub fn resource(&self, uuid: Uuid) -> Option<&Resource> {
        self.resources.iter().find(|r| r.uuid == uuid)
    }
}

/// Resource - an attachable or referencable artifact, keyed by UUID
///
/// Profile imports may address a resource through an internal fragment
/// reference (`#<uuid>`); the resource's rlinks locate the actual content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Resource {
    pub uuid: Uuid,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub props: Vec<Property>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rlinks: Vec<ResourceLink>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub base64: Option<Base64Content>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
}

impl Resource {
    /// Create a resource with the given uuid and no content
    pub fn new(uuid: Uuid) -> Self {
        Self {
            uuid,
            title: None,
            description: None,
            props: Vec::new(),
            rlinks: Vec::new(),
            base64: None,
            remarks: None,
        }
    }
}

/// Pointer from a resource to its retrievable location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ResourceLink {
    pub href: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
}

/// Inline base64-encoded resource content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Base64Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,

    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_lookup_by_uuid() {
        let uuid = Uuid::new_v4();
        let back_matter = BackMatter {
            resources: vec![Resource::new(uuid)],
        };

        assert!(back_matter.resource(uuid).is_some());
        assert!(back_matter.resource(Uuid::new_v4()).is_none());
    }
}
