//! Integration tests for the planning scene.
//!
//! Each test builds its own configuration root under the temp directory and a
//! synthetic atlas made of boxes, so no atlas data has to be installed.

use std::path::PathBuf;

use probescope::*;

fn temp_root(name: &str) -> PathBuf {
    let root = std::env::temp_dir().join(format!("probescope_it_{}_{name}", std::process::id()));
    std::fs::remove_dir_all(&root).ok();
    root
}

fn box_mesh(lo: [f64; 3], hi: [f64; 3]) -> TriMesh {
    TriMesh::cuboid(DVec3::from_array(lo), DVec3::from_array(hi))
}

/// A brain box with VISp over CP under the center.
fn two_box_atlas() -> Atlas {
    let surface = box_mesh([-6000.0, -9000.0, -8000.0], [6000.0, 6000.0, 0.0]);
    let regions = vec![
        AtlasRegion::new(385, "VISp", box_mesh([-1000.0, -1000.0, -1000.0], [1000.0, 1000.0, 0.0])),
        AtlasRegion::new(672, "CP", box_mesh([-1000.0, -1000.0, -3000.0], [1000.0, 1000.0, -1000.0])),
    ];
    Atlas::new("two_box", AtlasSpace::identity(), surface, regions).unwrap()
}

fn scene(name: &str) -> (Scene, PathBuf) {
    init_logging();
    let root = temp_root(name);
    let config = Config::load(ConfigPaths::new(&root)).unwrap();
    (Scene::new(config, two_box_atlas()), root)
}

#[test]
fn test_entry_depth_placement() {
    let (mut scene, root) = scene("entry");
    let angles = EulerAngles::new(115.0, 0.0, -10.0);
    let id = scene
        .add_object_at(
            &GeometryKind::builtin("NP24"),
            &InsertionSpec::EntryDepth {
                entry: DVec2::new(-1578.0, -2485.0),
                angles,
                depth: 3110.0,
            },
        )
        .unwrap();

    let report = scene.probe_report(id).unwrap();
    let entry = report.entrypoint.unwrap();
    assert!((entry.ml - -1578.0).abs() < 1e-3);
    assert!((entry.ap - -2485.0).abs() < 1e-3);
    assert!((report.depth_along_probe_axis - 3110.0).abs() < 1e-3);
    assert_eq!(report.angles, angles);

    // An entry point outside the brain is reported and adds nothing.
    let err = scene
        .add_object_at(
            &GeometryKind::builtin("NP1"),
            &InsertionSpec::EntryDepth {
                entry: DVec2::new(1.0e7, 0.0),
                angles,
                depth: 100.0,
            },
        )
        .unwrap_err();
    assert!(matches!(err, ProbescopeError::NoSurfaceIntersection));
    assert_eq!(scene.registry().len(), 1);
    std::fs::remove_dir_all(root).ok();
}

#[test]
fn test_next_cycles_through_three() {
    let (mut scene, root) = scene("cycle");
    let ids: Vec<ObjectId> = ["NP1", "NP24", "NP24a"]
        .into_iter()
        .map(|p| scene.add_object(&GeometryKind::builtin(p)).unwrap())
        .collect();
    assert_eq!(scene.registry().active_id(), Some(ids[2]));

    let mut seen = Vec::new();
    for _ in 0..4 {
        scene.handle_key(&KeyEvent::plain("n"));
        seen.push(scene.registry().active_id().unwrap());
    }
    assert_eq!(seen, vec![ids[0], ids[1], ids[2], ids[0]]);
    std::fs::remove_dir_all(root).ok();
}

#[test]
fn test_crossings_follow_movement() {
    let (mut scene, root) = scene("crossings");
    let id = scene
        .add_object_at(
            &GeometryKind::builtin("NP1"),
            &InsertionSpec::Tip {
                tip: DVec3::new(0.0, 0.0, -9500.0),
                angles: EulerAngles::VERTICAL,
            },
        )
        .unwrap();

    assert_eq!(scene.refresh(), vec![id]);
    let crossings = &scene.crossings(id).unwrap()[0].crossings;
    let summary: Vec<(&str, f64, f64)> = crossings
        .iter()
        .map(|c| (c.acronym.as_str(), c.entry_depth, c.exit_depth))
        .collect();
    assert_eq!(summary.len(), 2);
    assert_eq!((summary[0].0, summary[1].0), ("VISp", "CP"));
    // Depths run from the surface at DV 0, not from the shank top.
    assert!(summary[0].1.abs() < 1e-9 && (summary[0].2 - 1000.0).abs() < 1e-9);
    assert!((summary[1].1 - 1000.0).abs() < 1e-9 && (summary[1].2 - 3000.0).abs() < 1e-9);

    // Nothing moved: nothing to recompute.
    assert!(scene.refresh().is_empty());

    // Moving out of the boxes clears the crossings on the next refresh.
    for _ in 0..20 {
        scene.handle_key(&KeyEvent::plain("d"));
    }
    assert_eq!(scene.refresh(), vec![id]);
    assert!(scene.crossings(id).unwrap()[0].crossings.is_empty());
    std::fs::remove_dir_all(root).ok();
}

#[test]
fn test_fine_translation() {
    let (mut scene, root) = scene("fine");
    let id = scene.add_object(&GeometryKind::builtin("NP1")).unwrap();
    scene.handle_key(&KeyEvent::new("w", Modifiers::CTRL));
    let tip = scene.registry().get(id).unwrap().pose().tip();
    assert!(tip.abs_diff_eq(DVec3::new(0.0, 10.0, 0.0), 1e-12));
    std::fs::remove_dir_all(root).ok();
}

#[test]
fn test_delete_active_then_keys_are_noops() {
    let (mut scene, root) = scene("delete");
    let first = scene.add_object(&GeometryKind::builtin("NP1")).unwrap();
    let second = scene.add_object(&GeometryKind::builtin("NP1")).unwrap();
    scene.refresh();

    let events = scene.handle_key(&KeyEvent::plain("Delete"));
    assert_eq!(
        events,
        vec![SceneEvent::ObjectRemoved(second), SceneEvent::ActiveChanged(None)]
    );
    assert_eq!(scene.registry().active_id(), None);
    assert!(scene.crossings(second).is_none());

    let before = *scene.registry().get(first).unwrap().pose();
    assert!(scene.handle_key(&KeyEvent::plain("a")).is_empty());
    assert!(scene.handle_key(&KeyEvent::new("a", Modifiers::SHIFT)).is_empty());
    assert_eq!(*scene.registry().get(first).unwrap().pose(), before);
    assert!(scene.refresh().is_empty());
    std::fs::remove_dir_all(root).ok();
}

#[test]
fn test_render_items_mark_active() {
    let (mut scene, root) = scene("render");
    let a = scene.add_object(&GeometryKind::builtin("NP1")).unwrap();
    let b = scene.add_object(&GeometryKind::builtin("NP24")).unwrap();
    scene.handle_pick(&PickEvent { object: a });

    let items = scene.render_items();
    // One rectangle per shank.
    assert_eq!(items.len(), 5);
    for item in &items {
        let expected = if item.object == a {
            ColorState::Active
        } else {
            assert_eq!(item.object, b);
            ColorState::Inactive
        };
        assert_eq!(item.uniforms.color, expected.color());
    }
    std::fs::remove_dir_all(root).ok();
}

#[test]
fn test_experiment_roundtrip() {
    let (mut scene, root) = scene("experiment");
    let np1 = scene
        .add_object_at(
            &GeometryKind::builtin("NP1"),
            &InsertionSpec::Tip {
                tip: DVec3::new(-250.0, 400.0, -2200.0),
                angles: EulerAngles::new(100.0, 15.0, -30.0),
            },
        )
        .unwrap();
    scene.add_object(&GeometryKind::builtin("NP24")).unwrap();
    scene.handle_pick(&PickEvent { object: np1 });
    scene.atlas_mut().show_region("CP").unwrap();

    let path = root.join("experiments").join("plan.json");
    scene.save(&path).unwrap();
    let saved: Vec<(GeometryKind, ProbePose, bool)> = scene
        .registry()
        .iter()
        .map(|o| (o.kind().clone(), *o.pose(), o.is_active()))
        .collect();

    scene.handle_key(&KeyEvent::plain("s"));
    scene.atlas_mut().clear_visible();
    let report = scene.load(&path).unwrap();
    assert_eq!(report.loaded.len(), 2);
    assert!(report.skipped.is_empty());
    assert_eq!(scene.atlas().visible_regions(), ["CP"]);

    for (object, (kind, pose, active)) in scene.registry().iter().zip(&saved) {
        assert_eq!(object.kind(), kind);
        assert!(object.pose().tip().abs_diff_eq(pose.tip(), 1e-9));
        assert_eq!(object.pose().angles(), pose.angles());
        assert_eq!(object.is_active(), *active);
    }

    let export = root.join("exports").join("plan.json");
    scene.export(&export).unwrap();
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(export).unwrap()).unwrap();
    assert_eq!(json["atlas"], "two_box");
    assert_eq!(json["probes"].as_array().unwrap().len(), 2);
    std::fs::remove_dir_all(root).ok();
}

#[test]
fn test_keybinds_reload() {
    let (mut scene, root) = scene("reload");
    let id = scene.add_object(&GeometryKind::builtin("NP1")).unwrap();

    let path = scene.config().paths.movement_keybinds();
    let mut json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    json["bindings"]["w"]["step"] = serde_json::json!(250.0);
    std::fs::write(&path, serde_json::to_string_pretty(&json).unwrap()).unwrap();

    scene.reload_config().unwrap();
    scene.handle_key(&KeyEvent::plain("w"));
    let tip = scene.registry().get(id).unwrap().pose().tip();
    assert!(tip.abs_diff_eq(DVec3::new(0.0, 250.0, 0.0), 1e-9));
    std::fs::remove_dir_all(root).ok();
}

#[test]
fn test_custom_mesh_needs_registration() {
    let (mut scene, root) = scene("custom");
    let mesh_dir = scene.config().preferences.user_mesh_dir.clone();
    let file = mesh_dir.join("cannula.stl");
    std::fs::write(
        &file,
        "solid cannula\n\
         facet normal 0 0 1\n outer loop\n  vertex 0 0 0\n  vertex 1 0 0\n  vertex 0 2 0\n endloop\nendfacet\n\
         facet normal 1 0 0\n outer loop\n  vertex 0 0 0\n  vertex 0 2 0\n  vertex 0 0 1\n endloop\nendfacet\n\
         endsolid cannula\n",
    )
    .unwrap();

    let kind = GeometryKind::Custom { file: file.clone() };
    assert!(scene
        .available_objects()
        .iter()
        .any(|(name, k)| name == "cannula [CUSTOM OBJECT]" && *k == kind));

    let err = scene.add_object(&kind).unwrap_err();
    assert!(matches!(err, ProbescopeError::MissingMeshTransform(ref stem) if stem == "cannula"));
    assert!(scene.registry().is_empty());

    let transforms_path = scene.config().paths.mesh_transforms();
    let mut json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&transforms_path).unwrap()).unwrap();
    json["cannula"] = serde_json::json!({"angles": [0.0, 0.0, 0.0], "origin": [0.0, 0.0, 0.0], "scale": 1000.0});
    std::fs::write(&transforms_path, serde_json::to_string_pretty(&json).unwrap()).unwrap();
    scene.reload_config().unwrap();

    let id = scene.add_object(&kind).unwrap();
    let object = scene.registry().get(id).unwrap();
    assert_eq!(object.name(), "cannula [CUSTOM OBJECT]");
    assert_eq!(object.geometry().num_shanks(), 1);
    assert!((object.world_shanks()[0].length() - 2000.0).abs() < 1e-9);
    std::fs::remove_dir_all(root).ok();
}

proptest::proptest! {
    #![proptest_config(proptest::prelude::ProptestConfig::with_cases(32))]

    #[test]
    fn test_refreshed_crossings_match_fresh_query(
        keys in proptest::collection::vec(
            proptest::sample::select(vec!["a", "d", "w", "s", "f", "c", "q", "e"]),
            0..24,
        ),
        shifted in proptest::collection::vec(proptest::bool::ANY, 24),
    ) {
        let (mut scene, root) = scene("prop");
        let id = scene
            .add_object_at(
                &GeometryKind::builtin("NP1"),
                &InsertionSpec::Tip {
                    tip: DVec3::new(0.0, 0.0, -9500.0),
                    angles: EulerAngles::VERTICAL,
                },
            )
            .unwrap();
        for (key, shift) in keys.iter().zip(&shifted) {
            let modifiers = if *shift { Modifiers::SHIFT } else { Modifiers::NONE };
            scene.handle_key(&KeyEvent::new(*key, modifiers));
        }
        scene.refresh();

        let object = scene.registry().get(id).unwrap();
        let intersector = RegionIntersector::new(scene.atlas());
        let fresh = intersector.shank_crossings(object);
        proptest::prop_assert_eq!(scene.crossings(id).unwrap(), fresh.as_slice());
        proptest::prop_assert_eq!(intersector.shank_crossings(object), fresh);
        std::fs::remove_dir_all(root).ok();
    }
}
