use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::back_matter::BackMatter;
use super::metadata::{Link, Metadata, Property};
use super::parameter::Parameter;

/// Catalog - a hierarchy of identifier-addressable controls
///
/// Controls sit either directly on the catalog or nested in groups. Groups
/// are an organizational device only; controls carry the substance. A
/// resolved catalog additionally guarantees unique identifiers per entity
/// type and no surviving entity that is neither selected, referenced, nor
/// keep-marked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Catalog {
    pub uuid: Uuid,

    pub metadata: Metadata,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<Parameter>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub controls: Vec<Control>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<Group>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub back_matter: Option<BackMatter>,
}

impl Catalog {
    /// Create an empty catalog with the given uuid
    pub fn new(uuid: Uuid) -> Self {
        Self {
            uuid,
            metadata: Metadata::new(),
            params: Vec::new(),
            controls: Vec::new(),
            groups: Vec::new(),
            back_matter: None,
        }
    }
}

/// Group - an organizational container for controls and nested groups
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct Group {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<Parameter>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub props: Vec<Property>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Link>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parts: Vec<Part>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<Group>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub controls: Vec<Control>,
}

impl Group {
    /// Create an empty group with the given id
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    /// A clone of this group's shell: everything except child groups and
    /// controls
    pub fn clone_shell(&self) -> Self {
        Self {
            id: self.id.clone(),
            class: self.class.clone(),
            title: self.title.clone(),
            params: self.params.clone(),
            props: self.props.clone(),
            links: self.links.clone(),
            parts: self.parts.clone(),
            groups: Vec::new(),
            controls: Vec::new(),
        }
    }
}

/// Control - an identifier-addressable node carrying the catalog substance
///
/// Controls may nest sub-controls and carry parts, parameters, properties,
/// and links. Identity is the case-sensitive `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Control {
    pub id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<Parameter>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub props: Vec<Property>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Link>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parts: Vec<Part>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub controls: Vec<Control>,
}

impl Control {
    /// Create an empty control with the given id
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            class: None,
            title: None,
            params: Vec::new(),
            props: Vec::new(),
            links: Vec::new(),
            parts: Vec::new(),
            controls: Vec::new(),
        }
    }
}

/// Part - a named prose node within a control or group
///
/// Parts nest recursively and may carry parameter insertion markers in
/// their prose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ns: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub props: Vec<Property>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub prose: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parts: Vec<Part>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Link>,
}

impl Part {
    /// Create an empty part with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            ns: None,
            class: None,
            title: None,
            props: Vec::new(),
            prose: None,
            parts: Vec::new(),
            links: Vec::new(),
        }
    }

    /// Set the part id
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the part prose
    pub fn with_prose(mut self, prose: impl Into<String>) -> Self {
        self.prose = Some(prose.into());
        self
    }
}
