// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(missing_docs)]
#![allow(clippy::unwrap_used, clippy::panic)]
//! End-to-end description scenarios: parse, fetch, edit variables, refetch.

use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

use duality_cache::{CacheEvent, DataCache, ProviderIdentity};
use duality_scene::{
    parse_scene, Dataset, DatasetStatus, Geometry, PrimitiveType, SceneError, SceneWarning,
    Variable, View, Visibility,
};
use duality_transport::test_utils::{not_found_reply, ScriptedTransport};
use duality_transport::{method, RemoteLink, Reply};
use glam::{Mat4, Vec3};
use proptest::prelude::*;
use serde_json::{json, Value};

const WAIT: Duration = Duration::from_secs(10);

fn triangle() -> Vec<u8> {
    Geometry {
        primitive: PrimitiveType::Triangle,
        indices: vec![0, 1, 2],
        positions: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
        normals: None,
        tangents: None,
        colors: None,
        texcoords: None,
        alphas: None,
    }
    .encode()
}

fn node(name: &str, extra: &Value) -> Value {
    let mut node = json!({
        "type": "geometry",
        "name": name,
        "dataset": { "source": { "type": "download", "filename": format!("{name}.g3d") } }
    });
    if let (Some(target), Some(fields)) = (node.as_object_mut(), extra.as_object()) {
        for (k, v) in fields {
            target.insert(k.clone(), v.clone());
        }
    }
    node
}

fn description(nodes: &[Value]) -> Value {
    json!({
        "metadata": { "name": "demo", "description": "scenario" },
        "scene": nodes
    })
}

fn python_node() -> Value {
    json!({
        "type": "geometry",
        "name": "iso",
        "dataset": {
            "source": {
                "type": "python",
                "filename": "iso.py",
                "variables": [{
                    "type": "float", "name": "level", "label": "Iso level",
                    "lowerBound": 0.0, "upperBound": 1.0, "stepSize": 0.1, "defaultValue": 0.5
                }]
            }
        }
    })
}

fn next_event(rx: &Receiver<CacheEvent>) -> CacheEvent {
    rx.recv_timeout(WAIT).unwrap()
}

#[test]
fn hidden_in_2d_is_visible_in_3d_only() {
    let doc = description(&[node("a", &json!({ "view2d": false }))]);
    let parsed = parse_scene(&doc, &RemoteLink::offline()).unwrap();
    let node = &parsed.scene.nodes()[0];
    assert_eq!(node.visibility(), Visibility::Visible3D);
    assert!(parsed.warnings.is_empty());
    assert_eq!(parsed.scene.nodes_in_view(View::TwoD).count(), 0);
    assert_eq!(parsed.scene.nodes_in_view(View::ThreeD).count(), 1);
}

#[test]
fn hidden_everywhere_parses_with_a_warning() {
    let doc = description(&[node("ghost", &json!({ "view2d": false, "view3d": false }))]);
    let parsed = parse_scene(&doc, &RemoteLink::offline()).unwrap();
    assert_eq!(parsed.scene.nodes()[0].visibility(), Visibility::VisibleNone);
    assert_eq!(
        parsed.warnings,
        vec![SceneWarning::Visibility {
            node: "ghost".into()
        }]
    );
}

#[test]
fn variable_edit_fetches_a_new_payload() {
    let transport = ScriptedTransport::new(|_, _| Ok(Reply::with_payload(json!({}), triangle())));
    let log = transport.log();
    let link = RemoteLink::new(transport);
    let mut scene = parse_scene(&description(&[python_node()]), &link)
        .unwrap()
        .scene;
    let cache = DataCache::new();
    let (tx, rx) = mpsc::channel();

    assert_eq!(scene.update_datasets(&cache, &tx), 1);
    assert!(scene.apply_event(&next_event(&rx)));
    assert_eq!(scene.nodes()[0].dataset().status(), &DatasetStatus::Ready);
    let first = scene.nodes()[0].dataset().provider().identity(scene.variables()).unwrap();

    let stale = scene.set_float_variable("iso", "level", 0.7).unwrap();
    assert_eq!(stale, vec![first.clone()]);
    let second = scene.nodes()[0].dataset().provider().identity(scene.variables()).unwrap();
    assert_ne!(first.key(), second.key());

    // The old payload stays readable while the new one is pending.
    assert_eq!(scene.update_datasets(&cache, &tx), 1);
    assert_eq!(
        scene.nodes()[0].dataset().status(),
        &DatasetStatus::Pending(second.key())
    );
    match scene.nodes()[0].dataset() {
        Dataset::Geometry(g) => assert!(g.geometry().is_some()),
        Dataset::Volume(_) => panic!("expected geometry"),
    }
    assert!(scene.apply_event(&next_event(&rx)));
    assert_eq!(scene.nodes()[0].dataset().status(), &DatasetStatus::Ready);

    let calls = log.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|c| c.method == method::PYTHON));
    assert_eq!(calls[0].params["variables"]["level"], json!(0.5));
    assert!((calls[1].params["variables"]["level"].as_f64().unwrap() - 0.7).abs() < 1e-6);

    // Going back to the first value is served by the cache.
    scene.set_float_variable("iso", "level", 0.5).unwrap();
    assert_eq!(scene.update_datasets(&cache, &tx), 1);
    assert_eq!(scene.nodes()[0].dataset().status(), &DatasetStatus::Ready);
    assert_eq!(log.len(), 2);
}

#[test]
fn short_matrix_aborts_the_whole_parse() {
    let mut nodes = vec![node("ok", &json!({}))];
    nodes.push(node(
        "bad",
        &json!({
            "dataset": {
                "source": { "type": "download", "filename": "bad.g3d" },
                "transforms": [[1, 0, 0, 0, 0, 1, 0, 0, 0, 0, 1, 0, 0, 0, 0]]
            }
        }),
    ));
    let err = parse_scene(&description(&nodes), &RemoteLink::offline()).unwrap_err();
    assert!(matches!(err, SceneError::Format { .. }));
    assert_eq!(err.path(), "scene[1].dataset.transforms[0]");
}

#[test]
fn unresolved_transform_names_its_reference() {
    let mut doc = description(&[node(
        "a",
        &json!({
            "dataset": {
                "source": { "type": "download", "filename": "a.g3d" },
                "transforms": ["shift", "missing"]
            }
        }),
    )]);
    doc["transforms"] = json!({ "shift": Mat4::from_translation(Vec3::X).to_cols_array().to_vec() });
    let err = parse_scene(&doc, &RemoteLink::offline()).unwrap_err();
    assert_eq!(
        err,
        SceneError::UnresolvedTransform {
            path: "scene[0].dataset.transforms[1]".into(),
            name: "missing".into(),
        }
    );
}

#[test]
fn named_transforms_are_baked_into_geometry() {
    let transport = ScriptedTransport::new(|_, _| Ok(Reply::with_payload(json!({}), triangle())));
    let mut doc = description(&[node(
        "a",
        &json!({
            "dataset": {
                "source": { "type": "download", "filename": "a.g3d" },
                "transforms": ["shift", "shift"]
            }
        }),
    )]);
    doc["transforms"] = json!({ "shift": Mat4::from_translation(Vec3::Z).to_cols_array().to_vec() });
    let mut scene = parse_scene(&doc, &RemoteLink::new(transport)).unwrap().scene;
    let cache = DataCache::new();
    let (tx, rx) = mpsc::channel();
    scene.update_datasets(&cache, &tx);
    scene.apply_event(&next_event(&rx));
    let bounds = scene.bounding_box(View::ThreeD).unwrap();
    assert!((bounds.min().z - 2.0).abs() < 1e-6);
    assert!((bounds.max() - Vec3::new(1.0, 1.0, 2.0)).length() < 1e-6);
}

#[test]
fn variable_indices_restart_per_node() {
    let mut second = python_node();
    second["name"] = json!("iso2");
    second["dataset"]["source"]["variables"]
        .as_array_mut()
        .unwrap()
        .push(json!({ "type": "enum", "name": "mode", "values": ["a", "b"], "defaultValue": "a" }));
    let parsed = parse_scene(&description(&[python_node(), second]), &RemoteLink::offline()).unwrap();
    let vars = parsed.scene.variables();
    let first: Vec<usize> = vars.node("iso").unwrap().iter().map(Variable::index).collect();
    let second: Vec<usize> = vars.node("iso2").unwrap().iter().map(Variable::index).collect();
    assert_eq!(first, [0]);
    assert_eq!(second, [0, 1]);
    assert_eq!(
        vars.node("iso").unwrap().get("level").unwrap().label(),
        Some("Iso level")
    );
}

#[test]
fn missing_file_leaves_only_that_dataset_unavailable() {
    let transport = ScriptedTransport::new(|_, params| {
        if params["filename"] == "gone.g3d" {
            Ok(not_found_reply("gone.g3d"))
        } else {
            Ok(Reply::with_payload(json!({}), triangle()))
        }
    });
    let link = RemoteLink::new(transport);
    let mut scene = parse_scene(&description(&[node("ok", &json!({})), node("gone", &json!({}))]), &link)
        .unwrap()
        .scene;
    let cache = DataCache::new();
    let (tx, rx) = mpsc::channel();
    assert_eq!(scene.update_datasets(&cache, &tx), 2);
    scene.apply_event(&next_event(&rx));
    scene.apply_event(&next_event(&rx));

    assert_eq!(scene.node("ok").unwrap().dataset().status(), &DatasetStatus::Ready);
    assert!(matches!(
        scene.node("gone").unwrap().dataset().status(),
        DatasetStatus::Unavailable(_)
    ));
    // Failures are not retried until reset.
    assert_eq!(scene.update_datasets(&cache, &tx), 0);
    scene.reset_unavailable();
    assert_eq!(scene.update_datasets(&cache, &tx), 1);
}

#[test]
fn volume_transfer_function_variables_share_the_node_index_space() {
    let doc = description(&[json!({
        "type": "volume",
        "name": "vol",
        "dataset": {
            "source": {
                "type": "python",
                "filename": "vol.py",
                "variables": [{ "type": "enum", "name": "field", "values": ["p", "t"], "defaultValue": "p" }]
            }
        },
        "tf": {
            "source": {
                "type": "python",
                "filename": "tf.py",
                "variables": [{
                    "type": "float", "name": "gain",
                    "lowerBound": 0, "upperBound": 2, "stepSize": 0.5, "defaultValue": 1
                }]
            }
        }
    })]);
    let mut parsed = parse_scene(&doc, &RemoteLink::offline()).unwrap();
    let vars = parsed.scene.variables().node("vol").unwrap();
    assert_eq!(vars.get("field").unwrap().index(), 0);
    assert_eq!(vars.get("gain").unwrap().index(), 1);

    let identities = |scene: &duality_scene::Scene| {
        let node = &scene.nodes()[0];
        let volume = node.dataset().provider().identity(scene.variables()).unwrap();
        let tf = node
            .transfer_function()
            .and_then(|tf| tf.provider())
            .unwrap()
            .identity(scene.variables())
            .unwrap();
        (volume, tf)
    };
    let (volume, tf) = identities(&parsed.scene);
    assert_eq!(tf.filename(), "tf.py");
    assert!(matches!(
        &volume,
        ProviderIdentity::Parametrized { snapshot, .. } if snapshot.len() == 1 && snapshot[0].0 == "field"
    ));

    // Each provider is keyed by its own variables only.
    let stale = parsed.scene.set_float_variable("vol", "gain", 2.0).unwrap();
    assert_eq!(stale, vec![tf]);
    assert_eq!(identities(&parsed.scene).0, volume);

    let stale = parsed.scene.set_enum_variable("vol", "field", "t").unwrap();
    assert_eq!(stale, vec![volume]);
}

proptest! {
    #[test]
    fn parsing_is_deterministic(
        flags in prop::collection::vec((any::<bool>(), any::<bool>()), 1..8),
    ) {
        let nodes: Vec<Value> = flags
            .iter()
            .enumerate()
            .map(|(i, (v2, v3))| node(&format!("n{i}"), &json!({ "view2d": v2, "view3d": v3 })))
            .collect();
        let doc = description(&nodes);
        let a = parse_scene(&doc, &RemoteLink::offline()).unwrap();
        let b = parse_scene(&doc, &RemoteLink::offline()).unwrap();
        let vis = |p: &duality_scene::ParsedScene| -> Vec<Visibility> {
            p.scene.nodes().iter().map(duality_scene::SceneNode::visibility).collect()
        };
        prop_assert_eq!(vis(&a), vis(&b));
        prop_assert_eq!(&a.warnings, &b.warnings);
        let hidden = flags.iter().filter(|(v2, v3)| !v2 && !v3).count();
        prop_assert_eq!(a.warnings.len(), hidden);
    }
}
