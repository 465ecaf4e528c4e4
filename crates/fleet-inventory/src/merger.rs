//! Attribute merger: layers group, node and default attributes.
//!
//! Precedence, high to low:
//! 1. the node's own attributes
//! 2. groups, later-listed over earlier-listed
//! 3. site defaults, which only fill gaps, except for the script lists in
//!    [`APPEND_KEYS`] where the default is prepended to the current value

use fleet_core::{AttrMap, Resource, scalar_string};
use fleet_state::{GroupRecord, NodeRecord};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Group-management keys that never belong in a node's configuration.
pub const GROUP_BOOKKEEPING_KEYS: [&str; 3] = ["grouptype", "members", "wherevals"];

/// Where group bookkeeping lives inside a raw attribute map.
const OBJ_INFO: &str = "obj_info";

/// Script lists whose default value is prepended rather than filled.
pub const APPEND_KEYS: [&str; 2] = ["postbootscripts", "postscripts"];

/// Parent object of the [`APPEND_KEYS`].
pub const APPEND_PATH: [&str; 3] = ["engines", "netboot_engine", "engine_info"];

/// Resolved configuration of one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub name: String,
    pub attributes: AttrMap,
}

impl EffectiveConfig {
    /// Render as a `{ meta, spec }` resource envelope.
    pub fn into_resource(self) -> Resource {
        Resource::new(self.name, self.attributes)
    }
}

/// Merge `node` over its groups and the defaults.
///
/// Groups are applied in the node's membership order; names without a
/// matching record in `groups` are ignored.
pub fn merge(node: &NodeRecord, groups: &[GroupRecord], defaults: &AttrMap) -> EffectiveConfig {
    let mut acc = AttrMap::new();

    for name in &node.groups {
        if let Some(group) = groups.iter().find(|g| &g.name == name) {
            merge_override(&mut acc, &group.attributes);
        }
    }

    strip_bookkeeping(&mut acc);
    merge_override(&mut acc, &node.attributes);
    apply_defaults(&mut acc, defaults);

    EffectiveConfig {
        name: node.name.clone(),
        attributes: acc,
    }
}

/// Recursively merge `incoming` into `acc`. Objects merge key by key,
/// anything else in `incoming` replaces what `acc` holds.
pub fn merge_override(acc: &mut AttrMap, incoming: &AttrMap) {
    for (key, value) in incoming {
        match (acc.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(nested)) => {
                merge_override(existing, nested);
            }
            _ => {
                acc.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Insert keys of `defaults` that `acc` lacks, recursing into objects.
fn fill_missing(acc: &mut AttrMap, defaults: &AttrMap) {
    for (key, value) in defaults {
        match (acc.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(nested)) => {
                fill_missing(existing, nested);
            }
            (Some(_), _) => {}
            (None, _) => {
                acc.insert(key.clone(), value.clone());
            }
        }
    }
}

fn strip_bookkeeping(acc: &mut AttrMap) {
    for key in GROUP_BOOKKEEPING_KEYS {
        acc.remove(key);
    }
    if let Some(Value::Object(info)) = acc.get_mut(OBJ_INFO) {
        for key in GROUP_BOOKKEEPING_KEYS {
            info.remove(key);
        }
    }
}

fn apply_defaults(acc: &mut AttrMap, defaults: &AttrMap) {
    let mut fill = defaults.clone();
    let mut prepend = Vec::new();
    if let Some(info) = existing_object_mut(&mut fill, &APPEND_PATH) {
        for key in APPEND_KEYS {
            if let Some(value) = info.get(key).and_then(scalar_string) {
                info.remove(key);
                if !value.is_empty() {
                    prepend.push((key, value));
                }
            }
        }
    }

    fill_missing(acc, &fill);

    if prepend.is_empty() {
        return;
    }
    // A node that set a scalar somewhere along the path keeps it.
    let Some(info) = object_at_mut(acc, &APPEND_PATH) else {
        return;
    };
    for (key, default) in prepend {
        let joined = match info.get(key).and_then(scalar_string) {
            Some(current) if !current.is_empty() => format!("{default},{current}"),
            _ => default,
        };
        info.insert(key.to_string(), Value::String(joined));
    }
}

/// Walk `path`, creating empty objects where missing. `None` if a non-object
/// value is in the way.
fn object_at_mut<'a>(map: &'a mut AttrMap, path: &[&str]) -> Option<&'a mut AttrMap> {
    let mut current = map;
    for segment in path {
        current = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(AttrMap::new()))
            .as_object_mut()?;
    }
    Some(current)
}

fn existing_object_mut<'a>(map: &'a mut AttrMap, path: &[&str]) -> Option<&'a mut AttrMap> {
    let mut current = map;
    for segment in path {
        current = current.get_mut(*segment)?.as_object_mut()?;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attrs(value: Value) -> AttrMap {
        value.as_object().cloned().unwrap()
    }

    fn node(name: &str, groups: &[&str], attributes: Value) -> NodeRecord {
        NodeRecord {
            name: name.to_string(),
            groups: groups.iter().map(|g| g.to_string()).collect(),
            attributes: attrs(attributes),
            ..NodeRecord::default()
        }
    }

    fn group(name: &str, attributes: Value) -> GroupRecord {
        GroupRecord {
            name: name.to_string(),
            attributes: attrs(attributes),
            ..GroupRecord::default()
        }
    }

    fn scripts(key: &str, value: &str) -> Value {
        json!({"engines": {"netboot_engine": {"engine_info": {key: value}}}})
    }

    #[test]
    fn precedence_node_over_later_group_over_earlier_group_over_default() {
        let groups = vec![group("g1", json!({"k": "g1"})), group("g2", json!({"k": "g2"}))];
        let defaults = attrs(json!({"k": "default"}));

        let with_node = merge(&node("n", &["g1", "g2"], json!({"k": "node"})), &groups, &defaults);
        assert_eq!(with_node.attributes["k"], json!("node"));

        let from_g2 = merge(&node("n", &["g1", "g2"], json!({})), &groups, &defaults);
        assert_eq!(from_g2.attributes["k"], json!("g2"));

        let from_g1 = merge(&node("n", &["g1", "g2"], json!({})), &groups[..1], &defaults);
        assert_eq!(from_g1.attributes["k"], json!("g1"));

        let from_default = merge(&node("n", &["g1", "g2"], json!({})), &[], &defaults);
        assert_eq!(from_default.attributes["k"], json!("default"));
    }

    #[test]
    fn membership_order_decides_not_record_order() {
        // Records handed over in the opposite order of membership.
        let groups = vec![group("b", json!({"k": "b"})), group("a", json!({"k": "a"}))];
        let merged = merge(&node("n", &["b", "a"], json!({})), &groups, &AttrMap::new());
        assert_eq!(merged.attributes["k"], json!("a"));

        let merged = merge(&node("n", &["a", "b"], json!({})), &groups, &AttrMap::new());
        assert_eq!(merged.attributes["k"], json!("b"));
    }

    #[test]
    fn nested_maps_merge_recursively() {
        let groups = vec![
            group("g1", json!({"network_info": {"primarynic": "eth0", "mtu": 1500}})),
            group("g2", json!({"network_info": {"mtu": 9000}})),
        ];
        let merged = merge(
            &node("n", &["g1", "g2"], json!({"network_info": {"ip": "10.0.0.5"}})),
            &groups,
            &AttrMap::new(),
        );
        assert_eq!(
            merged.attributes["network_info"],
            json!({"primarynic": "eth0", "mtu": 9000, "ip": "10.0.0.5"})
        );
    }

    #[test]
    fn scalar_replaces_map_and_map_replaces_scalar() {
        let mut acc = attrs(json!({"a": {"x": 1}, "b": "flat"}));
        merge_override(&mut acc, &attrs(json!({"a": "flat", "b": {"y": 2}})));
        assert_eq!(Value::Object(acc), json!({"a": "flat", "b": {"y": 2}}));
    }

    #[test]
    fn unmatched_groups_are_ignored() {
        let groups = vec![group("rack1", json!({"rack": "r1"})), group("other", json!({"x": 1}))];
        let merged = merge(&node("n", &["rack1", "missing"], json!({})), &groups, &AttrMap::new());
        assert_eq!(Value::Object(merged.attributes), json!({"rack": "r1"}));
    }

    #[test]
    fn group_bookkeeping_is_stripped() {
        let groups = vec![group(
            "compute",
            json!({
                "members": "n1,n2",
                "grouptype": "static",
                "obj_info": {"grouptype": "dynamic", "members": "n1", "wherevals": "arch==ppc64", "description": "kept"},
                "role": "compute"
            }),
        )];
        let merged = merge(&node("n1", &["compute"], json!({})), &groups, &AttrMap::new());
        assert_eq!(
            Value::Object(merged.attributes),
            json!({"obj_info": {"description": "kept"}, "role": "compute"})
        );
    }

    #[test]
    fn defaults_prepend_scripts() {
        let merged = merge(
            &node("n", &[], scripts("postscripts", "a")),
            &[],
            &attrs(scripts("postscripts", "b")),
        );
        assert_eq!(
            merged.attributes["engines"]["netboot_engine"]["engine_info"]["postscripts"],
            json!("b,a")
        );
    }

    #[test]
    fn defaults_prepend_to_group_scripts() {
        let groups = vec![group("compute", scripts("postbootscripts", "confignetwork"))];
        let merged = merge(
            &node("n", &["compute"], json!({})),
            &groups,
            &attrs(scripts("postbootscripts", "otherpkgs")),
        );
        assert_eq!(
            merged.attributes["engines"]["netboot_engine"]["engine_info"]["postbootscripts"],
            json!("otherpkgs,confignetwork")
        );
    }

    #[test]
    fn default_script_alone_has_no_trailing_comma() {
        let merged = merge(&node("n", &[], json!({})), &[], &attrs(scripts("postscripts", "syslog")));
        assert_eq!(
            merged.attributes["engines"]["netboot_engine"]["engine_info"]["postscripts"],
            json!("syslog")
        );
    }

    #[test]
    fn both_script_lists_are_handled_independently() {
        let defaults = attrs(json!({"engines": {"netboot_engine": {"engine_info": {
            "postscripts": "syslog,remoteshell",
            "postbootscripts": "otherpkgs"
        }}}}));
        let merged = merge(&node("n", &[], scripts("postscripts", "mine")), &[], &defaults);
        let info = &merged.attributes["engines"]["netboot_engine"]["engine_info"];
        assert_eq!(info["postscripts"], json!("syslog,remoteshell,mine"));
        assert_eq!(info["postbootscripts"], json!("otherpkgs"));
    }

    #[test]
    fn defaults_only_fill_gaps() {
        let defaults = attrs(json!({
            "role": "default-role",
            "device_info": {"arch": "x86_64", "mtm": "7X02"},
            "domain": "cluster"
        }));
        let merged = merge(
            &node("n", &[], json!({"role": "compute", "device_info": {"arch": "ppc64le"}})),
            &[],
            &defaults,
        );
        assert_eq!(
            Value::Object(merged.attributes),
            json!({
                "role": "compute",
                "device_info": {"arch": "ppc64le", "mtm": "7X02"},
                "domain": "cluster"
            })
        );
    }

    #[test]
    fn scalar_on_script_path_is_not_overridden() {
        let merged = merge(
            &node("n", &[], json!({"engines": "none"})),
            &[],
            &attrs(scripts("postscripts", "syslog")),
        );
        assert_eq!(merged.attributes["engines"], json!("none"));
    }

    #[test]
    fn empty_inputs_give_empty_config() {
        let merged = merge(&node("lonely", &[], json!({})), &[], &AttrMap::new());
        assert_eq!(merged.name, "lonely");
        assert!(merged.attributes.is_empty());
    }

    #[test]
    fn resource_envelope() {
        let merged = merge(&node("n1", &[], json!({"role": "compute"})), &[], &AttrMap::new());
        let resource = merged.into_resource();
        assert_eq!(resource.meta.name, "n1");
        assert!(resource.validate(Some("n1")).is_ok());
        assert_eq!(resource.spec["role"], json!("compute"));
    }
}
