use serde::{Deserialize, Serialize};

use super::metadata::{Link, Property};

/// Parameter definition attached to a catalog, group, or control
///
/// Parameters are name-keyed and referenced from part prose through
/// `{{ insert: param, <id> }}` markers. Profile `set-parameter`
/// instructions merge into these fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Parameter {
    pub id: String,

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

impl Parameter {
    /// Create a parameter with the given id and no content
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
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

/// Constraint on permissible parameter values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct ParameterConstraint {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tests: Vec<ConstraintTest>,
}

/// Machine-checkable test expression for a parameter constraint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ConstraintTest {
    pub expression: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
}

/// Prose guidance on how to set a parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ParameterGuideline {
    pub prose: String,
}

/// Choice-based parameter selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct ParameterSelection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub how_many: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choice: Vec<String>,
}
