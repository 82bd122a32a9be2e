/// Property tests: postprocessing always yields a valid scene.

use proptest::prelude::*;
use scene_forge::core::postprocess::{self, EnhanceOptions, Postprocessor};
use scene_forge::schema::scene::{AudioCues, Lighting};
use serde_json::{json, Map, Value};

fn arb_json() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        (-1e6f64..1e6).prop_map(Value::from),
        "[a-z0-9 .-]{0,8}".prop_map(Value::from),
    ];
    leaf.prop_recursive(3, 32, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::btree_map("[a-z_]{1,8}", inner, 0..6)
                .prop_map(|m| Value::Object(m.into_iter().collect::<Map<String, Value>>())),
        ]
    })
}

fn arb_component() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        (-2000.0f64..2000.0).prop_map(Value::from),
        "-?[0-9]{1,4}(\\.[0-9]{1,2})?".prop_map(Value::from),
        "[a-z ]{0,4}".prop_map(Value::from),
        Just(json!([])),
    ]
}

/// Typed blocks as a model might author them: partial, mistyped or junk.
fn arb_block() -> impl Strategy<Value = Value> {
    prop_oneof![
        arb_json(),
        (-10.0f64..10.0).prop_map(|mass| json!({"mass": mass})),
        Just(json!({"gravity": "yes"})),
        Just(json!({"offset": {"x": 0, "y": 0}})),
        Just(json!("dim")),
    ]
}

fn arb_entity() -> impl Strategy<Value = Value> {
    (
        prop::option::of("[a-z0-9_]{0,6}"),
        prop::option::of(prop_oneof![
            Just("player"),
            Just("enemy"),
            Just("platform"),
            Just("item"),
            Just("background"),
            Just("door"),
        ]),
        prop::option::of((arb_component(), arb_component())),
        prop::option::of((arb_component(), arb_component())),
        prop::option::of(arb_json()),
        prop::option::of(arb_block()),
        prop::option::of(arb_block()),
    )
        .prop_map(|(id, kind, position, size, properties, physics, collision_box)| {
            let mut entity = Map::new();
            if let Some(id) = id {
                entity.insert("id".to_string(), json!(id));
            }
            if let Some(kind) = kind {
                entity.insert("type".to_string(), json!(kind));
            }
            if let Some((x, y)) = position {
                entity.insert("position".to_string(), json!({"x": x, "y": y}));
            }
            if let Some((w, h)) = size {
                entity.insert("size".to_string(), json!({"width": w, "height": h}));
            }
            if let Some(properties) = properties {
                entity.insert("properties".to_string(), properties);
            }
            if let Some(physics) = physics {
                entity.insert("physics".to_string(), physics);
            }
            if let Some(collision_box) = collision_box {
                entity.insert("collision_box".to_string(), collision_box);
            }
            Value::Object(entity)
        })
}

fn arb_scene() -> impl Strategy<Value = Value> {
    (
        prop::option::of("[a-z_]{0,10}"),
        prop::option::of("[A-Za-z ]{0,10}"),
        prop::option::of(arb_json()),
        prop::option::of(arb_block()),
        prop::option::of(arb_block()),
        prop::collection::vec(arb_entity(), 0..8),
    )
        .prop_map(|(id, name, metadata, lighting, audio, entities)| {
            let mut scene = Map::new();
            if let Some(id) = id {
                scene.insert("id".to_string(), json!(id));
            }
            if let Some(name) = name {
                scene.insert("name".to_string(), json!(name));
            }
            if let Some(metadata) = metadata {
                scene.insert("metadata".to_string(), metadata);
            }
            if let Some(lighting) = lighting {
                scene.insert("lighting".to_string(), lighting);
            }
            if let Some(audio) = audio {
                scene.insert("audio".to_string(), audio);
            }
            scene.insert("entities".to_string(), Value::Array(entities));
            Value::Object(scene)
        })
}

proptest! {
    #[test]
    fn any_json_processes_to_a_valid_scene(raw in arb_json()) {
        let scene = Postprocessor::default().process(raw, "p1", None);
        prop_assert!(postprocess::validate(&scene.to_value()));
        prop_assert_eq!(scene.project_id.as_str(), "p1");
    }

    #[test]
    fn scene_shaped_input_processes_to_a_valid_scene(raw in arb_scene()) {
        let postprocessor = Postprocessor::default();
        let scene = postprocessor.process(raw, "p1", None);
        prop_assert!(postprocess::validate(&scene.to_value()));
        prop_assert_eq!(scene.metadata.entity_count, scene.entities.len());

        let options = EnhanceOptions::default().with_lighting().with_audio();
        let enhanced = postprocessor.enhance(scene, &options);
        let value = enhanced.to_value();
        prop_assert!(postprocess::validate(&value));
        prop_assert!(enhanced.entities.iter().all(|e| e.physics.is_some() && e.collision_box.is_some()));

        // The JSON form carries exactly what the typed fields hold.
        prop_assert_eq!(&value["lighting"], &serde_json::to_value(Lighting::default()).unwrap());
        prop_assert_eq!(&value["audio"], &serde_json::to_value(AudioCues::default()).unwrap());
        for (i, entity) in enhanced.entities.iter().enumerate() {
            prop_assert_eq!(&value["entities"][i]["physics"], &serde_json::to_value(entity.physics).unwrap());
            prop_assert_eq!(
                &value["entities"][i]["collision_box"],
                &serde_json::to_value(entity.collision_box).unwrap()
            );
        }
    }

    #[test]
    fn coincident_pair_is_pushed_past_the_first(
        x in -500.0f64..500.0,
        y in -500.0f64..500.0,
        w in 1.0f64..200.0,
        h in 1.0f64..200.0,
    ) {
        let raw = json!({
            "id": "s",
            "entities": [
                {"id": "a", "position": {"x": x, "y": y}, "size": {"width": w, "height": h}},
                {"id": "b", "position": {"x": x, "y": y}, "size": {"width": w, "height": h}}
            ]
        });
        let postprocessor = Postprocessor::default();
        let scene = postprocessor.enhance(postprocessor.process(raw, "p", None), &EnhanceOptions::default());
        prop_assert_eq!(scene.entities[0].position.x, x);
        prop_assert!(scene.entities[1].position.x >= x + w + 10.0 - 1e-9);
        prop_assert!(!scene.entities[0].overlaps(&scene.entities[1]));
    }
}
