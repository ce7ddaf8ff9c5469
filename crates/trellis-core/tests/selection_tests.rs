mod common;

use common::{
    catalog_with_controls, control_ids, control_with_children, group_with_controls,
    import_selecting, resolve,
};
use trellis_core::InMemoryLoader;
use trellis_model::{Catalog, Control, ControlSelection, Profile, ProfileImport};
use uuid::Uuid;

fn profile_with_import(import: ProfileImport) -> Profile {
    let mut profile = Profile::new(Uuid::new_v4());
    profile.imports = vec![import];
    profile
}

#[test]
fn test_exclusion_overrides_inclusion() {
    let catalog = catalog_with_controls(vec![Control::new("ac-1"), Control::new("ac-2")]);

    let mut import = ProfileImport::new("mem:src").with_all();
    import.exclude_controls = vec![ControlSelection::with_ids(["ac-1"])];

    let loader = InMemoryLoader::new()
        .with("mem:src", catalog)
        .with("mem:profile", profile_with_import(import));

    let resolved = resolve(&loader, "mem:profile").unwrap();
    assert_eq!(control_ids(&resolved), vec!["ac-2".to_string()]);
}

#[test]
fn test_children_inherit_a_match_with_children() {
    let catalog =
        catalog_with_controls(vec![control_with_children("ac-1", &["ac-1.1", "ac-1.2"])]);

    let loader = InMemoryLoader::new()
        .with("mem:src", catalog)
        .with(
            "mem:profile",
            profile_with_import(import_selecting("mem:src", &["ac-1"])),
        );

    let resolved = resolve(&loader, "mem:profile").unwrap();
    assert_eq!(control_ids(&resolved), vec!["ac-1".to_string()]);
    let children: Vec<&str> = resolved.controls[0]
        .controls
        .iter()
        .map(|c| c.id.as_str())
        .collect();
    assert_eq!(children, vec!["ac-1.1", "ac-1.2"]);
}

#[test]
fn test_explicit_exclusion_beats_inheritance() {
    let catalog =
        catalog_with_controls(vec![control_with_children("ac-1", &["ac-1.1", "ac-1.2"])]);

    let mut import = import_selecting("mem:src", &["ac-1"]);
    import.exclude_controls = vec![ControlSelection::with_ids(["ac-1.1"])];

    let loader = InMemoryLoader::new()
        .with("mem:src", catalog)
        .with("mem:profile", profile_with_import(import));

    let resolved = resolve(&loader, "mem:profile").unwrap();
    let children: Vec<&str> = resolved.controls[0]
        .controls
        .iter()
        .map(|c| c.id.as_str())
        .collect();
    assert_eq!(children, vec!["ac-1.2"]);
}

#[test]
fn test_shallow_selection_stops_at_the_named_control() {
    let catalog = catalog_with_controls(vec![control_with_children("ac-1", &["ac-1.1"])]);

    let mut import = ProfileImport::new("mem:src");
    import.include_controls = vec![ControlSelection::with_ids(["ac-1"]).shallow()];

    let loader = InMemoryLoader::new()
        .with("mem:src", catalog)
        .with("mem:profile", profile_with_import(import));

    let resolved = resolve(&loader, "mem:profile").unwrap();
    assert_eq!(control_ids(&resolved), vec!["ac-1".to_string()]);
    assert!(resolved.controls[0].controls.is_empty());
}

#[test]
fn test_import_without_selections_selects_nothing() {
    let catalog = catalog_with_controls(vec![Control::new("ac-1")]);

    let loader = InMemoryLoader::new()
        .with("mem:src", catalog)
        .with(
            "mem:profile",
            profile_with_import(ProfileImport::new("mem:src")),
        );

    // not an error: the import simply carries nothing forward
    let resolved = resolve(&loader, "mem:profile").unwrap();
    assert!(resolved.controls.is_empty());
}

#[test]
fn test_group_survives_only_around_matched_descendants() {
    let mut catalog = Catalog::new(Uuid::new_v4());
    catalog.groups = vec![
        group_with_controls("ac", vec![Control::new("ac-1"), Control::new("ac-2")]),
        group_with_controls("au", vec![Control::new("au-1")]),
    ];

    let mut profile = profile_with_import(import_selecting("mem:src", &["ac-2"]));
    profile.merge = Some(trellis_model::Merge {
        as_is: Some(true),
        custom: None,
    });

    let loader = InMemoryLoader::new()
        .with("mem:src", catalog)
        .with("mem:profile", profile);

    let resolved = resolve(&loader, "mem:profile").unwrap();
    assert_eq!(resolved.groups.len(), 1);
    assert_eq!(resolved.groups[0].id.as_deref(), Some("ac"));
    let kept: Vec<&str> = resolved.groups[0]
        .controls
        .iter()
        .map(|c| c.id.as_str())
        .collect();
    assert_eq!(kept, vec!["ac-2"]);
}

#[test]
fn test_matched_child_of_unmatched_parent_is_promoted() {
    let catalog = catalog_with_controls(vec![control_with_children("parent", &["child"])]);

    let loader = InMemoryLoader::new()
        .with("mem:src", catalog)
        .with(
            "mem:profile",
            profile_with_import(import_selecting("mem:src", &["child"])),
        );

    let resolved = resolve(&loader, "mem:profile").unwrap();
    assert_eq!(control_ids(&resolved), vec!["child".to_string()]);
}

#[test]
fn test_later_import_wins_on_control_collision() {
    let mut first = Control::new("ac-1");
    first.title = Some("from first import".to_string());
    let mut second = Control::new("ac-1");
    second.title = Some("from second import".to_string());

    let loader = InMemoryLoader::new()
        .with("mem:first", catalog_with_controls(vec![first]))
        .with("mem:second", catalog_with_controls(vec![second]))
        .with(
            "mem:profile",
            common::profile_importing_all(&["mem:first", "mem:second"]),
        );

    let resolved = resolve(&loader, "mem:profile").unwrap();
    assert_eq!(resolved.controls.len(), 1);
    assert_eq!(
        resolved.controls[0].title.as_deref(),
        Some("from second import")
    );
}
