use tracing::debug;
use trellis_model::{Catalog, Control, Group, Parameter, Profile};

use crate::errors::{ResolveError, Result};

/// Structuring directive of a profile's `merge` element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuringDirective {
    /// Discard group nesting; controls become a flat top-level sequence
    Flat,
    /// Preserve the imported group/control nesting verbatim
    AsIs,
    /// Custom grouping - intentionally unsupported, fails resolution
    Custom,
}

impl StructuringDirective {
    /// The directive's display name
    pub fn name(&self) -> &'static str {
        match self {
            StructuringDirective::Flat => "flat",
            StructuringDirective::AsIs => "as-is",
            StructuringDirective::Custom => "custom",
        }
    }
}

/// Resolve the structuring directive a profile asks for
///
/// Absent `merge` or a flagless one means flat; `as_is = true` preserves
/// nesting; a present `custom` grouping selects the unsupported directive.
pub fn structuring_directive(profile: &Profile) -> StructuringDirective {
    match &profile.merge {
        None => StructuringDirective::Flat,
        Some(merge) => {
            if merge.as_is == Some(true) {
                StructuringDirective::AsIs
            } else if merge.custom.is_some() {
                StructuringDirective::Custom
            } else {
                StructuringDirective::Flat
            }
        }
    }
}

/// Apply the structuring directive to the accumulated catalog
pub(crate) fn apply_structuring(
    catalog: &mut Catalog,
    directive: StructuringDirective,
) -> Result<()> {
    match directive {
        StructuringDirective::AsIs => Ok(()),
        StructuringDirective::Custom => Err(ResolveError::UnsupportedStructuring {
            directive: directive.name().to_string(),
        }),
        StructuringDirective::Flat => {
            debug!("applying flat structuring directive");
            structure_flat(catalog);
            Ok(())
        }
    }
}

/// Flatten group nesting: group parameters hoist to catalog level and all
/// controls re-parent as top-level siblings in first-encounter order;
/// nested sub-controls stay nested under their parent control
fn structure_flat(catalog: &mut Catalog) {
    let groups = std::mem::take(&mut catalog.groups);
    for group in groups {
        flatten_group(group, &mut catalog.params, &mut catalog.controls);
    }
}

fn flatten_group(group: Group, params: &mut Vec<Parameter>, controls: &mut Vec<Control>) {
    params.extend(group.params);
    controls.extend(group.controls);
    for subgroup in group.groups {
        flatten_group(subgroup, params, controls);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_model::{Merge, Profile};
    use uuid::Uuid;

    fn profile_with_merge(merge: Option<Merge>) -> Profile {
        let mut profile = Profile::new(Uuid::new_v4());
        profile.merge = merge;
        profile
    }

    #[test]
    fn test_directive_defaults_to_flat() {
        assert_eq!(
            structuring_directive(&profile_with_merge(None)),
            StructuringDirective::Flat
        );
        assert_eq!(
            structuring_directive(&profile_with_merge(Some(Merge::default()))),
            StructuringDirective::Flat
        );
    }

    #[test]
    fn test_directive_as_is_requires_true() {
        let mut merge = Merge::default();
        merge.as_is = Some(false);
        assert_eq!(
            structuring_directive(&profile_with_merge(Some(merge.clone()))),
            StructuringDirective::Flat
        );

        merge.as_is = Some(true);
        assert_eq!(
            structuring_directive(&profile_with_merge(Some(merge))),
            StructuringDirective::AsIs
        );
    }

    #[test]
    fn test_custom_directive_fails_structuring() {
        let mut catalog = Catalog::new(Uuid::new_v4());
        let result = apply_structuring(&mut catalog, StructuringDirective::Custom);

        match result {
            Err(ResolveError::UnsupportedStructuring { directive }) => {
                assert_eq!(directive, "custom");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_flat_hoists_params_and_controls() {
        let mut catalog = Catalog::new(Uuid::new_v4());
        catalog.controls.push(Control::new("top-1"));

        let mut inner = Group::new("inner");
        inner.params.push(Parameter::new("g-prm"));
        inner.controls.push(Control::new("in-1"));

        let mut outer = Group::new("outer");
        outer.controls.push(Control::new("out-1"));
        outer.groups.push(inner);
        catalog.groups.push(outer);

        structure_flat(&mut catalog);

        assert!(catalog.groups.is_empty());
        let order: Vec<&str> = catalog.controls.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(order, vec!["top-1", "out-1", "in-1"]);
        assert_eq!(catalog.params.len(), 1);
    }
}
