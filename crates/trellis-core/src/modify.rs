use tracing::debug;
use trellis_model::{
    Add, Alter, Catalog, Control, Group, ItemName, Link, Modify, Parameter, Part, Position,
    Property, Remove, SetParameter,
};

use crate::errors::{ResolveError, Result};
use crate::index::{EntityIndex, ItemType};

/// Apply a profile's modify block to the resolved catalog
///
/// Set-parameters first, then alters, each in document order. Within one
/// alter, removes apply before adds. Targets are resolved through the
/// index built from the restructured catalog; a missing target is fatal.
pub(crate) fn apply_modify(catalog: &mut Catalog, modify: &Modify, index: &EntityIndex) -> Result<()> {
    for set_parameter in &modify.set_parameters {
        apply_set_parameter(catalog, set_parameter, index).map_err(|err| {
            ResolveError::SetParameter {
                param_id: set_parameter.param_id.clone(),
                source: Box::new(err),
            }
        })?;
    }

    for alter in &modify.alters {
        apply_alter(catalog, alter, index).map_err(|err| ResolveError::Alter {
            control_id: alter.control_id.clone(),
            source: Box::new(err),
        })?;
    }

    Ok(())
}

// ===== set-parameter =====

fn apply_set_parameter(
    catalog: &mut Catalog,
    set_parameter: &SetParameter,
    index: &EntityIndex,
) -> Result<()> {
    let param_id = &set_parameter.param_id;
    if !index.contains(ItemType::Parameter, param_id) {
        return Err(ResolveError::TargetNotFound {
            item_type: ItemType::Parameter,
            identifier: param_id.clone(),
        });
    }

    debug!(param_id = %param_id, "applying set-parameter");
    let param =
        find_parameter_mut(catalog, param_id).ok_or_else(|| ResolveError::TargetNotFound {
            item_type: ItemType::Parameter,
            identifier: param_id.clone(),
        })?;
    merge_parameter(param, set_parameter);
    Ok(())
}

/// Merge set-parameter fields into the target parameter
///
/// Scalars replace only when the incoming value is present; keyed
/// collections replace matching keys in place and append new ones; values
/// are a full replacement.
fn merge_parameter(param: &mut Parameter, set_parameter: &SetParameter) {
    if let Some(class) = &set_parameter.class {
        param.class = Some(class.clone());
    }
    if let Some(label) = &set_parameter.label {
        param.label = Some(label.clone());
    }
    if let Some(usage) = &set_parameter.usage {
        param.usage = Some(usage.clone());
    }
    if let Some(select) = &set_parameter.select {
        param.select = Some(select.clone());
    }

    merge_by(&mut param.props, set_parameter.props.clone(), property_same_key);
    merge_by(&mut param.links, set_parameter.links.clone(), |a, b| a == b);
    merge_by(
        &mut param.constraints,
        set_parameter.constraints.clone(),
        |a, b| a == b,
    );
    merge_by(
        &mut param.guidelines,
        set_parameter.guidelines.clone(),
        |a, b| a == b,
    );

    if !set_parameter.values.is_empty() {
        param.values = set_parameter.values.clone();
    }
}

/// Merge `incoming` into `existing`: an entry whose key matches an existing
/// entry replaces it in place (position preserved), new keys append, and
/// relative order is otherwise preserved
pub(crate) fn merge_by<T>(
    existing: &mut Vec<T>,
    incoming: Vec<T>,
    same_key: impl Fn(&T, &T) -> bool,
) {
    for item in incoming {
        match existing.iter_mut().find(|current| same_key(current, &item)) {
            Some(slot) => *slot = item,
            None => existing.push(item),
        }
    }
}

/// Properties are keyed by identifier when both carry one, else by full
/// structural identity
fn property_same_key(a: &Property, b: &Property) -> bool {
    match (&a.uuid, &b.uuid) {
        (Some(left), Some(right)) => left == right,
        (None, None) => a == b,
        _ => false,
    }
}

fn find_parameter_mut<'a>(catalog: &'a mut Catalog, id: &str) -> Option<&'a mut Parameter> {
    if let Some(param) = catalog.params.iter_mut().find(|p| p.id == id) {
        return Some(param);
    }
    for control in &mut catalog.controls {
        if let Some(param) = find_parameter_in_control(control, id) {
            return Some(param);
        }
    }
    for group in &mut catalog.groups {
        if let Some(param) = find_parameter_in_group(group, id) {
            return Some(param);
        }
    }
    None
}

fn find_parameter_in_control<'a>(control: &'a mut Control, id: &str) -> Option<&'a mut Parameter> {
    if let Some(param) = control.params.iter_mut().find(|p| p.id == id) {
        return Some(param);
    }
    for child in &mut control.controls {
        if let Some(param) = find_parameter_in_control(child, id) {
            return Some(param);
        }
    }
    None
}

fn find_parameter_in_group<'a>(group: &'a mut Group, id: &str) -> Option<&'a mut Parameter> {
    if let Some(param) = group.params.iter_mut().find(|p| p.id == id) {
        return Some(param);
    }
    for control in &mut group.controls {
        if let Some(param) = find_parameter_in_control(control, id) {
            return Some(param);
        }
    }
    for child in &mut group.groups {
        if let Some(param) = find_parameter_in_group(child, id) {
            return Some(param);
        }
    }
    None
}

// ===== alter =====

fn apply_alter(catalog: &mut Catalog, alter: &Alter, index: &EntityIndex) -> Result<()> {
    let control_id = &alter.control_id;
    if !index.contains(ItemType::Control, control_id) {
        return Err(ResolveError::TargetNotFound {
            item_type: ItemType::Control,
            identifier: control_id.clone(),
        });
    }

    debug!(control_id = %control_id, "applying alter");
    let control =
        find_control_mut(catalog, control_id).ok_or_else(|| ResolveError::TargetNotFound {
            item_type: ItemType::Control,
            identifier: control_id.clone(),
        })?;

    for remove in &alter.removes {
        if !remove_first(control, remove) {
            return Err(structural_edit(
                control_id,
                "the remove did not match a valid target",
            ));
        }
    }
    for add in &alter.adds {
        apply_add(control, add, control_id)?;
    }
    Ok(())
}

fn structural_edit(control_id: &str, reason: &str) -> ResolveError {
    ResolveError::StructuralEdit {
        control_id: control_id.to_string(),
        reason: reason.to_string(),
    }
}

fn find_control_mut<'a>(catalog: &'a mut Catalog, id: &str) -> Option<&'a mut Control> {
    for control in &mut catalog.controls {
        if let Some(found) = find_in_control(control, id) {
            return Some(found);
        }
    }
    for group in &mut catalog.groups {
        if let Some(found) = find_in_group(group, id) {
            return Some(found);
        }
    }
    None
}

fn find_in_control<'a>(control: &'a mut Control, id: &str) -> Option<&'a mut Control> {
    if control.id == id {
        return Some(control);
    }
    for child in &mut control.controls {
        if let Some(found) = find_in_control(child, id) {
            return Some(found);
        }
    }
    None
}

fn find_in_group<'a>(group: &'a mut Group, id: &str) -> Option<&'a mut Control> {
    for control in &mut group.controls {
        if let Some(found) = find_in_control(control, id) {
            return Some(found);
        }
    }
    for child in &mut group.groups {
        if let Some(found) = find_in_group(child, id) {
            return Some(found);
        }
    }
    None
}

// ===== alter / remove =====

/// Delete exactly the first node of the control's subtree matching the
/// conjunction of the provided criteria; omitted criteria are wildcards
///
/// Traversal order is params, props, links, then parts depth-first (each
/// part before its contents). Nested sub-controls are separate alter
/// targets and are not descended into.
fn remove_first(control: &mut Control, remove: &Remove) -> bool {
    if matches_kind(remove, ItemName::Param) {
        if let Some(slot) = control.params.iter().position(|p| param_matches(p, remove)) {
            control.params.remove(slot);
            return true;
        }
    }
    if matches_kind(remove, ItemName::Prop) {
        if let Some(slot) = control.props.iter().position(|p| prop_matches(p, remove)) {
            control.props.remove(slot);
            return true;
        }
    }
    if matches_kind(remove, ItemName::Link) {
        if let Some(slot) = control.links.iter().position(|l| link_matches(l, remove)) {
            control.links.remove(slot);
            return true;
        }
    }
    remove_first_in_parts(&mut control.parts, remove)
}

fn remove_first_in_parts(parts: &mut Vec<Part>, remove: &Remove) -> bool {
    let mut slot = 0;
    while slot < parts.len() {
        if matches_kind(remove, ItemName::Part) && part_matches(&parts[slot], remove) {
            parts.remove(slot);
            return true;
        }

        let part = &mut parts[slot];
        if matches_kind(remove, ItemName::Prop) {
            if let Some(at) = part.props.iter().position(|p| prop_matches(p, remove)) {
                part.props.remove(at);
                return true;
            }
        }
        if matches_kind(remove, ItemName::Link) {
            if let Some(at) = part.links.iter().position(|l| link_matches(l, remove)) {
                part.links.remove(at);
                return true;
            }
        }
        if remove_first_in_parts(&mut part.parts, remove) {
            return true;
        }
        slot += 1;
    }
    false
}

fn matches_kind(remove: &Remove, kind: ItemName) -> bool {
    remove.by_item_name.map_or(true, |name| name == kind)
}

/// A criterion addressing an attribute the node does not have never matches
fn param_matches(param: &Parameter, remove: &Remove) -> bool {
    remove.by_name.is_none()
        && remove.by_ns.is_none()
        && remove
            .by_class
            .as_ref()
            .map_or(true, |class| param.class.as_deref() == Some(class.as_str()))
        && remove.by_id.as_ref().map_or(true, |id| &param.id == id)
}

fn prop_matches(prop: &Property, remove: &Remove) -> bool {
    remove.by_id.is_none()
        && remove.by_name.as_ref().map_or(true, |name| &prop.name == name)
        && remove
            .by_class
            .as_ref()
            .map_or(true, |class| prop.class.as_deref() == Some(class.as_str()))
        && remove
            .by_ns
            .as_ref()
            .map_or(true, |ns| prop.ns.as_deref() == Some(ns.as_str()))
}

fn link_matches(link: &Link, remove: &Remove) -> bool {
    remove.by_id.is_none()
        && remove.by_class.is_none()
        && remove.by_ns.is_none()
        && remove
            .by_name
            .as_ref()
            .map_or(true, |name| link.rel.as_deref() == Some(name.as_str()))
}

fn part_matches(part: &Part, remove: &Remove) -> bool {
    remove.by_name.as_ref().map_or(true, |name| &part.name == name)
        && remove
            .by_class
            .as_ref()
            .map_or(true, |class| part.class.as_deref() == Some(class.as_str()))
        && remove
            .by_id
            .as_ref()
            .map_or(true, |id| part.id.as_deref() == Some(id.as_str()))
        && remove
            .by_ns
            .as_ref()
            .map_or(true, |ns| part.ns.as_deref() == Some(ns.as_str()))
}

// ===== alter / add =====

/// Insert the add's content at its position relative to the anchor
///
/// Without `by_id` the control itself is the anchor. A named anchor absent
/// from the control's subtree, or content the anchor cannot carry at that
/// position, fails the edit.
fn apply_add(control: &mut Control, add: &Add, control_id: &str) -> Result<()> {
    let position = add.position.unwrap_or_default();

    let target = match add.by_id.as_deref() {
        None => return add_into_control(control, add, position, control_id),
        Some(target) if target == control.id => {
            return add_into_control(control, add, position, control_id)
        }
        Some(target) => target,
    };

    if let Some(slot) = control.params.iter().position(|p| p.id == target) {
        return insert_beside_param(&mut control.params, slot, add, position, control_id);
    }

    if add_at_part(&mut control.parts, target, add, position, control_id)? {
        return Ok(());
    }
    Err(structural_edit(
        control_id,
        "the add did not match a valid target",
    ))
}

fn add_into_control(
    control: &mut Control,
    add: &Add,
    position: Position,
    control_id: &str,
) -> Result<()> {
    match position {
        Position::Before | Position::After => Err(structural_edit(
            control_id,
            "cannot insert before or after the control itself",
        )),
        Position::Starting => {
            if let Some(title) = &add.title {
                control.title = Some(title.clone());
            }
            control.params.splice(0..0, add.params.iter().cloned());
            control.props.splice(0..0, add.props.iter().cloned());
            control.links.splice(0..0, add.links.iter().cloned());
            control.parts.splice(0..0, add.parts.iter().cloned());
            Ok(())
        }
        Position::Ending => {
            if let Some(title) = &add.title {
                control.title = Some(title.clone());
            }
            control.params.extend(add.params.iter().cloned());
            control.props.extend(add.props.iter().cloned());
            control.links.extend(add.links.iter().cloned());
            control.parts.extend(add.parts.iter().cloned());
            Ok(())
        }
    }
}

fn insert_beside_param(
    params: &mut Vec<Parameter>,
    slot: usize,
    add: &Add,
    position: Position,
    control_id: &str,
) -> Result<()> {
    match position {
        Position::Before | Position::After => {
            if add.title.is_some()
                || !add.props.is_empty()
                || !add.links.is_empty()
                || !add.parts.is_empty()
            {
                return Err(structural_edit(
                    control_id,
                    "only parameters can be inserted beside a parameter",
                ));
            }
            let at = if position == Position::Before {
                slot
            } else {
                slot + 1
            };
            params.splice(at..at, add.params.iter().cloned());
            Ok(())
        }
        Position::Starting | Position::Ending => Err(structural_edit(
            control_id,
            "a parameter cannot receive child content",
        )),
    }
}

fn add_at_part(
    parts: &mut Vec<Part>,
    target: &str,
    add: &Add,
    position: Position,
    control_id: &str,
) -> Result<bool> {
    let mut slot = 0;
    while slot < parts.len() {
        if parts[slot].id.as_deref() == Some(target) {
            apply_add_at_part(parts, slot, add, position, control_id)?;
            return Ok(true);
        }
        if add_at_part(&mut parts[slot].parts, target, add, position, control_id)? {
            return Ok(true);
        }
        slot += 1;
    }
    Ok(false)
}

fn apply_add_at_part(
    parts: &mut Vec<Part>,
    slot: usize,
    add: &Add,
    position: Position,
    control_id: &str,
) -> Result<()> {
    match position {
        Position::Before | Position::After => {
            if add.title.is_some()
                || !add.params.is_empty()
                || !add.props.is_empty()
                || !add.links.is_empty()
            {
                return Err(structural_edit(
                    control_id,
                    "only parts can be inserted beside a part",
                ));
            }
            let at = if position == Position::Before {
                slot
            } else {
                slot + 1
            };
            parts.splice(at..at, add.parts.iter().cloned());
            Ok(())
        }
        Position::Starting | Position::Ending => {
            if !add.params.is_empty() {
                return Err(structural_edit(
                    control_id,
                    "a part cannot carry parameters",
                ));
            }
            let part = &mut parts[slot];
            if let Some(title) = &add.title {
                part.title = Some(title.clone());
            }
            if position == Position::Starting {
                part.props.splice(0..0, add.props.iter().cloned());
                part.links.splice(0..0, add.links.iter().cloned());
                part.parts.splice(0..0, add.parts.iter().cloned());
            } else {
                part.props.extend(add.props.iter().cloned());
                part.links.extend(add.links.iter().cloned());
                part.parts.extend(add.parts.iter().cloned());
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::index_catalog;
    use trellis_model::Property;
    use uuid::Uuid;

    fn catalog_with_param(param: Parameter) -> Catalog {
        let mut catalog = Catalog::new(Uuid::new_v4());
        let mut control = Control::new("c-1");
        control.params.push(param);
        catalog.controls.push(control);
        catalog
    }

    #[test]
    fn test_merge_by_replaces_in_place_and_appends() {
        let u1 = Uuid::new_v4();
        let u2 = Uuid::new_v4();
        let u3 = Uuid::new_v4();

        let mut existing = vec![
            Property::new("a", "old").with_uuid(u1),
            Property::new("c", "keep").with_uuid(u3),
        ];
        let incoming = vec![
            Property::new("a", "new").with_uuid(u1),
            Property::new("b", "added").with_uuid(u2),
        ];

        merge_by(&mut existing, incoming, property_same_key);

        assert_eq!(existing.len(), 3);
        assert_eq!(existing[0].value, "new");
        assert_eq!(existing[1].value, "keep");
        assert_eq!(existing[2].value, "added");
    }

    #[test]
    fn test_property_key_falls_back_to_structural_identity() {
        let mut existing = vec![Property::new("a", "v")];
        let incoming = vec![Property::new("a", "v"), Property::new("a", "w")];

        merge_by(&mut existing, incoming, property_same_key);

        // the identical entry replaced itself in place; the differing one
        // has a new structural key and appends
        assert_eq!(existing.len(), 2);
        assert_eq!(existing[1].value, "w");
    }

    #[test]
    fn test_set_parameter_values_replace_entirely() {
        let mut param = Parameter::new("p-1");
        param.values = vec!["one".to_string(), "two".to_string()];
        let mut catalog = catalog_with_param(param);
        let index = index_catalog(&catalog);

        let mut instruction = SetParameter::new("p-1");
        instruction.values = vec!["three".to_string()];
        let modify = Modify {
            set_parameters: vec![instruction],
            alters: Vec::new(),
        };

        apply_modify(&mut catalog, &modify, &index).unwrap();
        assert_eq!(
            catalog.controls[0].params[0].values,
            vec!["three".to_string()]
        );
    }

    #[test]
    fn test_set_parameter_scalars_retained_when_absent() {
        let mut param = Parameter::new("p-1");
        param.label = Some("old label".to_string());
        let mut catalog = catalog_with_param(param);
        let index = index_catalog(&catalog);

        let modify = Modify {
            set_parameters: vec![SetParameter::new("p-1")],
            alters: Vec::new(),
        };

        apply_modify(&mut catalog, &modify, &index).unwrap();
        assert_eq!(
            catalog.controls[0].params[0].label.as_deref(),
            Some("old label")
        );
    }

    #[test]
    fn test_set_parameter_unknown_target_is_fatal() {
        let mut catalog = catalog_with_param(Parameter::new("p-1"));
        let index = index_catalog(&catalog);

        let modify = Modify {
            set_parameters: vec![SetParameter::new("p-9")],
            alters: Vec::new(),
        };

        let err = apply_modify(&mut catalog, &modify, &index).unwrap_err();
        match err.root_cause() {
            ResolveError::TargetNotFound { identifier, .. } => assert_eq!(identifier, "p-9"),
            other => panic!("unexpected root cause: {other:?}"),
        }
    }

    #[test]
    fn test_remove_deletes_only_first_match() {
        let mut control = Control::new("c-1");
        control.props.push(Property::new("status", "draft"));
        control.props.push(Property::new("status", "final"));

        let remove = Remove {
            by_name: Some("status".to_string()),
            ..Remove::default()
        };
        assert!(remove_first(&mut control, &remove));

        assert_eq!(control.props.len(), 1);
        assert_eq!(control.props[0].value, "final");
    }

    #[test]
    fn test_remove_criteria_are_conjoined() {
        let mut control = Control::new("c-1");
        control
            .parts
            .push(Part::new("statement").with_id("c-1_smt"));

        let mismatch = Remove {
            by_name: Some("statement".to_string()),
            by_id: Some("other".to_string()),
            ..Remove::default()
        };
        assert!(!remove_first(&mut control, &mismatch));
        assert_eq!(control.parts.len(), 1);
    }

    #[test]
    fn test_add_after_part_anchor() {
        let mut control = Control::new("c-1");
        control.parts.push(Part::new("statement").with_id("s-1"));
        control.parts.push(Part::new("guidance").with_id("s-2"));

        let add = Add {
            position: Some(Position::After),
            by_id: Some("s-1".to_string()),
            parts: vec![Part::new("inserted").with_id("s-new")],
            ..Add::default()
        };
        apply_add(&mut control, &add, "c-1").unwrap();

        let ids: Vec<&str> = control
            .parts
            .iter()
            .filter_map(|p| p.id.as_deref())
            .collect();
        assert_eq!(ids, vec!["s-1", "s-new", "s-2"]);
    }

    #[test]
    fn test_add_missing_anchor_is_fatal() {
        let mut control = Control::new("c-1");

        let add = Add {
            position: Some(Position::After),
            by_id: Some("absent".to_string()),
            parts: vec![Part::new("inserted")],
            ..Add::default()
        };

        match apply_add(&mut control, &add, "c-1") {
            Err(ResolveError::StructuralEdit { reason, .. }) => {
                assert!(reason.contains("did not match a valid target"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_add_ending_creates_missing_collections() {
        let mut control = Control::new("c-1");
        assert!(control.props.is_empty());

        let add = Add {
            props: vec![Property::new("status", "final")],
            ..Add::default()
        };
        apply_add(&mut control, &add, "c-1").unwrap();

        assert_eq!(control.props.len(), 1);
    }
}
