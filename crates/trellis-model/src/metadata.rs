use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace used for trellis-defined properties, including the reserved
/// `keep = always` retention marker and the `resolution-tool` stamp.
pub const TRELLIS_NS: &str = "https://trellis.dev/ns/catalog";

/// Document metadata shared by catalogs and profiles
///
/// Holds the document's descriptive fields plus the shared entity lists
/// (roles, parties, locations) that resolution prunes by reference count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct Metadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Timestamp of the last modification; resolution stamps this with the
    /// resolution time (UTC)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub props: Vec<Property>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Link>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<Role>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parties: Vec<Party>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<Location>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub responsible_parties: Vec<ResponsibleParty>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
}

impl Metadata {
    /// Create empty metadata
    pub fn new() -> Self {
        Self::default()
    }
}

/// Name/value annotation attached to most model nodes
///
/// Properties carry an optional namespace; properties without one belong to
/// the document's default vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Property {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<Uuid>,

    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ns: Option<String>,

    pub value: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
}

impl Property {
    /// Create a property with the given name and value and no namespace
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            uuid: None,
            name: name.into(),
            ns: None,
            value: value.into(),
            class: None,
            remarks: None,
        }
    }

    /// Set the property namespace
    pub fn with_ns(mut self, ns: impl Into<String>) -> Self {
        self.ns = Some(ns.into());
        self
    }

    /// Set the property uuid
    pub fn with_uuid(mut self, uuid: Uuid) -> Self {
        self.uuid = Some(uuid);
        self
    }
}

/// Hypertext reference from a model node to another resource or entity
///
/// An href beginning with `#` is an internal reference addressing an entity
/// of the same document by identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Link {
    pub href: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rel: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Link {
    /// Create a link with the given href and no relation
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            rel: None,
            media_type: None,
            text: None,
        }
    }

    /// Set the link relation
    pub fn with_rel(mut self, rel: impl Into<String>) -> Self {
        self.rel = Some(rel.into());
        self
    }

    /// The fragment identifier if this link is an internal reference
    pub fn internal_target(&self) -> Option<&str> {
        self.href.strip_prefix('#')
    }
}

/// Role definition, keyed by a case-sensitive name identifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Role {
    pub id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub props: Vec<Property>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Link>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
}

impl Role {
    /// Create a role with the given id
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            short_name: None,
            description: None,
            props: Vec::new(),
            links: Vec::new(),
            remarks: None,
        }
    }
}

/// Party (person or organization), keyed by UUID
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Party {
    pub uuid: Uuid,

    #[serde(rename = "type")]
    pub party_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_name: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub props: Vec<Property>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Link>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub email_addresses: Vec<String>,

    /// Locations this party operates from, by location UUID
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub location_uuids: Vec<Uuid>,

    /// Organizations this party belongs to, by party UUID
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub member_of_organizations: Vec<Uuid>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
}

impl Party {
    /// Create a party of the given type with the given uuid
    pub fn new(uuid: Uuid, party_type: impl Into<String>) -> Self {
        Self {
            uuid,
            party_type: party_type.into(),
            name: None,
            short_name: None,
            props: Vec::new(),
            links: Vec::new(),
            email_addresses: Vec::new(),
            location_uuids: Vec::new(),
            member_of_organizations: Vec::new(),
            remarks: None,
        }
    }
}

/// Location, keyed by UUID
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Location {
    pub uuid: Uuid,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub email_addresses: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub urls: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub props: Vec<Property>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Link>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
}

impl Location {
    /// Create a location with the given uuid
    pub fn new(uuid: Uuid) -> Self {
        Self {
            uuid,
            title: None,
            address: None,
            email_addresses: Vec::new(),
            urls: Vec::new(),
            props: Vec::new(),
            links: Vec::new(),
            remarks: None,
        }
    }
}

/// Postal address of a location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct Address {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_type: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub addr_lines: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

/// Binding of a role to the parties responsible for it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ResponsibleParty {
    pub role_id: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub party_uuids: Vec<Uuid>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub props: Vec<Property>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Link>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
}
