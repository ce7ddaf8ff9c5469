use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::back_matter::BackMatter;
use super::catalog::Part;
use super::metadata::{Link, Metadata, Property};
use super::parameter::{Parameter, ParameterConstraint, ParameterGuideline, ParameterSelection};

/// Profile - a layered overlay deriving a catalog from imported sources
///
/// A profile must declare at least one import; resolution enforces this.
/// The optional `merge` element selects the structuring directive and the
/// optional `modify` block carries set-parameter and alter instructions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Profile {
    pub uuid: Uuid,

    pub metadata: Metadata,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<ProfileImport>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge: Option<Merge>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub modify: Option<Modify>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub back_matter: Option<BackMatter>,
}

impl Profile {
    /// Create an empty profile with the given uuid
    pub fn new(uuid: Uuid) -> Self {
        Self {
            uuid,
            metadata: Metadata::new(),
            imports: Vec::new(),
            merge: None,
            modify: None,
            back_matter: None,
        }
    }
}

/// Import statement naming a source catalog or profile and the controls to
/// carry forward from it
///
/// An import with neither `include_all` nor `include_controls` selects
/// nothing; this is accepted, not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ProfileImport {
    /// Source URI; a `#<uuid>` fragment addresses a back-matter resource of
    /// the importing profile
    pub href: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_all: Option<IncludeAll>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include_controls: Vec<ControlSelection>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_controls: Vec<ControlSelection>,
}

impl ProfileImport {
    /// Create an import of the given href selecting nothing
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            include_all: None,
            include_controls: Vec::new(),
            exclude_controls: Vec::new(),
        }
    }

    /// Select every control of the source
    pub fn with_all(mut self) -> Self {
        self.include_all = Some(IncludeAll {});
        self
    }
}

/// Marker selecting every control of an import source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct IncludeAll {}

/// Selection rule matching controls by exact identifier
///
/// Matching is exact-string after normalization; there is no globbing or
/// pattern matching. A rule recurses to child controls unless
/// `with_child_controls` says otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ControlSelection {
    #[serde(default = "default_with_child_controls")]
    pub with_child_controls: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub with_ids: Vec<String>,
}

fn default_with_child_controls() -> bool {
    true
}

impl ControlSelection {
    /// Create a selection of the given control ids, recursing to children
    pub fn with_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            with_child_controls: true,
            with_ids: ids.into_iter().map(Into::into).collect(),
        }
    }

    /// Restrict this selection to the named controls only, not their
    /// children
    pub fn shallow(mut self) -> Self {
        self.with_child_controls = false;
        self
    }
}

/// Merge element selecting the structuring directive
///
/// Absent or flagless means flat structuring; `as_is = true` preserves the
/// imported nesting; a present `custom` grouping is unsupported and fails
/// resolution fast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct Merge {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub as_is: Option<bool>,

    /// Custom structuring directive; opaque because it is intentionally
    /// unsupported - presence alone fails resolution
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom: Option<serde_json::Value>,
}

/// Modify block carrying tree-editing instructions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct Modify {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub set_parameters: Vec<SetParameter>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alters: Vec<Alter>,
}

/// Field merge onto a parameter of the resolved catalog
///
/// The target parameter must already exist post-import/selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SetParameter {
    pub param_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub props: Vec<Property>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Link>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<ParameterConstraint>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub guidelines: Vec<ParameterGuideline>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub select: Option<ParameterSelection>,
}

impl SetParameter {
    /// Create a set-parameter instruction for the given target id
    pub fn new(param_id: impl Into<String>) -> Self {
        Self {
            param_id: param_id.into(),
            class: None,
            props: Vec::new(),
            links: Vec::new(),
            label: None,
            usage: None,
            constraints: Vec::new(),
            guidelines: Vec::new(),
            values: Vec::new(),
            select: None,
        }
    }
}

/// Structural edit of one control: removes, then adds, in that order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Alter {
    pub control_id: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub removes: Vec<Remove>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub adds: Vec<Add>,
}

impl Alter {
    /// Create an alter targeting the given control id
    pub fn new(control_id: impl Into<String>) -> Self {
        Self {
            control_id: control_id.into(),
            removes: Vec::new(),
            adds: Vec::new(),
        }
    }
}

/// Removal criteria within an altered control's subtree
///
/// Provided criteria are conjoined; omitted criteria are wildcards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct Remove {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub by_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub by_class: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub by_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub by_ns: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub by_item_name: Option<ItemName>,
}

/// Structural item kind addressed by a remove instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemName {
    Param,
    Prop,
    Link,
    Part,
}

/// Content insertion into an altered control
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct Add {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,

    /// Anchor node id within the control's subtree; absent means the
    /// control itself
    #[serde(skip_serializing_if = "Option::is_none")]
    pub by_id: Option<String>,

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
}

/// Insertion position relative to the add anchor
///
/// `Starting`/`Ending` insert as first/last child of the anchor;
/// `Before`/`After` insert among the anchor's same-kind siblings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    Before,
    After,
    Starting,
    Ending,
}

impl Default for Position {
    fn default() -> Self {
        Position::Ending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_selection_defaults_to_recursing() {
        let json = r#"{"with-ids": ["ac-1"]}"#;
        let selection: ControlSelection = serde_json::from_str(json).unwrap();

        assert!(selection.with_child_controls);
        assert_eq!(selection.with_ids, vec!["ac-1".to_string()]);
    }

    #[test]
    fn test_position_wire_names() {
        assert_eq!(
            serde_json::to_string(&Position::Starting).unwrap(),
            "\"starting\""
        );
        let back: Position = serde_json::from_str("\"after\"").unwrap();
        assert_eq!(back, Position::After);
    }

    #[test]
    fn test_merge_custom_is_opaque() {
        let json = r#"{"custom": {"groups": []}}"#;
        let merge: Merge = serde_json::from_str(json).unwrap();

        assert!(merge.custom.is_some());
        assert!(merge.as_is.is_none());
    }
}
