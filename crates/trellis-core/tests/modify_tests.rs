mod common;

use common::{catalog_with_controls, resolve};
use trellis_core::{InMemoryLoader, ResolveError};
use trellis_model::{
    Add, Alter, Catalog, Control, ItemName, Modify, Parameter, Part, Position, Profile, Property,
    Remove, SetParameter,
};
use uuid::Uuid;

fn source_catalog() -> Catalog {
    let mut control = Control::new("ac-1");
    let mut param = Parameter::new("ac-1_prm_1");
    param.label = Some("original label".to_string());
    param.values = vec!["one".to_string()];
    control.params.push(param);
    control.parts.push(Part::new("statement").with_id("ac-1_smt"));
    control.parts.push(Part::new("guidance").with_id("ac-1_gdn"));
    catalog_with_controls(vec![control])
}

fn profile_with_modify(modify: Modify) -> Profile {
    let mut profile = common::profile_importing_all(&["mem:src"]);
    profile.modify = Some(modify);
    profile
}

fn loaded(modify: Modify) -> InMemoryLoader {
    InMemoryLoader::new()
        .with("mem:src", source_catalog())
        .with("mem:profile", profile_with_modify(modify))
}

#[test]
fn test_set_parameter_collection_merge_preserves_positions() {
    let u1 = Uuid::new_v4();
    let u2 = Uuid::new_v4();
    let u3 = Uuid::new_v4();

    // the parameter starts with properties {U1(old), U3}
    let mut catalog = source_catalog();
    catalog.controls[0].params[0].props = vec![
        Property::new("first", "old").with_uuid(u1),
        Property::new("third", "kept").with_uuid(u3),
    ];

    // the instruction supplies {U1(new), U2}
    let mut instruction = SetParameter::new("ac-1_prm_1");
    instruction.props = vec![
        Property::new("first", "new").with_uuid(u1),
        Property::new("second", "added").with_uuid(u2),
    ];

    let loader = InMemoryLoader::new()
        .with("mem:src", catalog)
        .with(
            "mem:profile",
            profile_with_modify(Modify {
                set_parameters: vec![instruction],
                alters: Vec::new(),
            }),
        );

    let resolved = resolve(&loader, "mem:profile").unwrap();
    let props = &resolved.controls[0].params[0].props;

    // result = {U1(new), U3, U2}: replaced key holds its position, the new
    // key appends
    assert_eq!(props.len(), 3);
    assert_eq!(props[0].uuid, Some(u1));
    assert_eq!(props[0].value, "new");
    assert_eq!(props[1].uuid, Some(u3));
    assert_eq!(props[2].uuid, Some(u2));
}

#[test]
fn test_set_parameter_scalar_and_values_policy() {
    let mut instruction = SetParameter::new("ac-1_prm_1");
    instruction.values = vec!["two".to_string(), "three".to_string()];
    // no label supplied: the original must survive

    let resolved = resolve(
        &loaded(Modify {
            set_parameters: vec![instruction],
            alters: Vec::new(),
        }),
        "mem:profile",
    )
    .unwrap();

    let param = &resolved.controls[0].params[0];
    assert_eq!(param.label.as_deref(), Some("original label"));
    assert_eq!(param.values, vec!["two".to_string(), "three".to_string()]);
}

#[test]
fn test_set_parameter_missing_target_fails_resolution() {
    let err = resolve(
        &loaded(Modify {
            set_parameters: vec![SetParameter::new("no-such-param")],
            alters: Vec::new(),
        }),
        "mem:profile",
    )
    .unwrap_err();

    match err.root_cause() {
        ResolveError::TargetNotFound { identifier, .. } => {
            assert_eq!(identifier, "no-such-param");
        }
        other => panic!("unexpected root cause: {other:?}"),
    }
}

#[test]
fn test_alter_missing_control_fails_resolution() {
    let err = resolve(
        &loaded(Modify {
            set_parameters: Vec::new(),
            alters: vec![Alter::new("no-such-control")],
        }),
        "mem:profile",
    )
    .unwrap_err();

    match err.root_cause() {
        ResolveError::TargetNotFound { identifier, .. } => {
            assert_eq!(identifier, "no-such-control");
        }
        other => panic!("unexpected root cause: {other:?}"),
    }
}

#[test]
fn test_remove_matching_nothing_fails_resolution() {
    let mut alter = Alter::new("ac-1");
    alter.removes = vec![Remove {
        by_id: Some("no-such-part".to_string()),
        ..Remove::default()
    }];

    let err = resolve(
        &loaded(Modify {
            set_parameters: Vec::new(),
            alters: vec![alter],
        }),
        "mem:profile",
    )
    .unwrap_err();

    match err.root_cause() {
        ResolveError::StructuralEdit { reason, .. } => {
            assert!(reason.contains("remove did not match"));
        }
        other => panic!("unexpected root cause: {other:?}"),
    }
}

#[test]
fn test_remove_then_add_within_one_alter() {
    let mut alter = Alter::new("ac-1");
    alter.removes = vec![Remove {
        by_item_name: Some(ItemName::Part),
        by_name: Some("guidance".to_string()),
        ..Remove::default()
    }];
    alter.adds = vec![Add {
        position: Some(Position::Ending),
        parts: vec![Part::new("assessment").with_id("ac-1_asm")],
        ..Add::default()
    }];

    let resolved = resolve(
        &loaded(Modify {
            set_parameters: Vec::new(),
            alters: vec![alter],
        }),
        "mem:profile",
    )
    .unwrap();

    let names: Vec<&str> = resolved.controls[0]
        .parts
        .iter()
        .map(|p| p.name.as_str())
        .collect();
    assert_eq!(names, vec!["statement", "assessment"]);
}

#[test]
fn test_add_after_anchor_inserts_among_same_kind_siblings() {
    let mut alter = Alter::new("ac-1");
    alter.adds = vec![Add {
        position: Some(Position::After),
        by_id: Some("ac-1_smt".to_string()),
        parts: vec![Part::new("inserted").with_id("ac-1_new")],
        ..Add::default()
    }];

    let resolved = resolve(
        &loaded(Modify {
            set_parameters: Vec::new(),
            alters: vec![alter],
        }),
        "mem:profile",
    )
    .unwrap();

    let ids: Vec<&str> = resolved.controls[0]
        .parts
        .iter()
        .filter_map(|p| p.id.as_deref())
        .collect();
    assert_eq!(ids, vec!["ac-1_smt", "ac-1_new", "ac-1_gdn"]);
}

#[test]
fn test_add_with_absent_anchor_fails_resolution() {
    let mut alter = Alter::new("ac-1");
    alter.adds = vec![Add {
        position: Some(Position::Before),
        by_id: Some("no-such-anchor".to_string()),
        parts: vec![Part::new("inserted")],
        ..Add::default()
    }];

    let err = resolve(
        &loaded(Modify {
            set_parameters: Vec::new(),
            alters: vec![alter],
        }),
        "mem:profile",
    )
    .unwrap_err();

    match err.root_cause() {
        ResolveError::StructuralEdit { reason, .. } => {
            assert!(reason.contains("add did not match"));
        }
        other => panic!("unexpected root cause: {other:?}"),
    }
}

#[test]
fn test_alters_apply_in_document_order() {
    // the second alter anchors on a part the first alter added
    let mut first = Alter::new("ac-1");
    first.adds = vec![Add {
        position: Some(Position::Ending),
        parts: vec![Part::new("added").with_id("ac-1_added")],
        ..Add::default()
    }];
    let mut second = Alter::new("ac-1");
    second.adds = vec![Add {
        position: Some(Position::After),
        by_id: Some("ac-1_added".to_string()),
        parts: vec![Part::new("trailer").with_id("ac-1_trailer")],
        ..Add::default()
    }];

    let resolved = resolve(
        &loaded(Modify {
            set_parameters: Vec::new(),
            alters: vec![first, second],
        }),
        "mem:profile",
    )
    .unwrap();

    let ids: Vec<&str> = resolved.controls[0]
        .parts
        .iter()
        .filter_map(|p| p.id.as_deref())
        .collect();
    assert_eq!(
        ids,
        vec!["ac-1_smt", "ac-1_gdn", "ac-1_added", "ac-1_trailer"]
    );
}
