/// Reference selection against the shipped reference scenes.

use scene_forge::core::context::{ContextBuilder, GenerationRequest};
use scene_forge::core::library::{Complexity, ReferenceLibrary};
use scene_forge::core::selector::{FallbackSelector, SelectionReason};
use std::sync::Arc;

fn shipped_library() -> Arc<ReferenceLibrary> {
    Arc::new(ReferenceLibrary::load_dir("reference_scenes"))
}

fn complexity_of(library: &ReferenceLibrary, name: &str) -> Complexity {
    library.get(name).unwrap().complexity
}

#[test]
fn all_shipped_scenes_load_in_name_order() {
    let library = shipped_library();
    let names: Vec<&str> = library.scenes().iter().map(|s| s.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "sample_asset_intensive",
            "sample_complex_structure",
            "sample_minimal_empty",
            "sample_simple_geometry",
            "sample_single_entity",
        ]
    );
    assert_eq!(complexity_of(&library, "sample_minimal_empty"), Complexity::EMPTY);
    assert_eq!(complexity_of(&library, "sample_single_entity"), Complexity::SINGLE_ENTITY);
    assert_eq!(complexity_of(&library, "sample_complex_structure"), Complexity::COMPLEX);
}

#[test]
fn simple_prompt_selects_low_complexity() {
    let library = shipped_library();
    let selector = FallbackSelector::new(library.clone()).with_seed(1);
    let selection = selector.select("simple basic geometry");
    assert_eq!(selection.reference_name, "sample_simple_geometry");
    assert_eq!(selection.reason, SelectionReason::KeywordMatch);
    assert!(complexity_of(&library, &selection.reference_name).value() <= 1.0);
}

#[test]
fn complex_prompt_selects_high_complexity() {
    let library = shipped_library();
    let selector = FallbackSelector::new(library.clone()).with_seed(1);
    let selection = selector.select("complex advanced layered puzzle");
    assert_eq!(selection.reference_name, "sample_complex_structure");
    assert!(complexity_of(&library, &selection.reference_name).value() >= 2.0);
}

#[test]
fn engineered_prompts_keep_the_complexity_preference() {
    let library = shipped_library();
    let selector = FallbackSelector::new(library.clone()).with_seed(1);
    let builder = ContextBuilder::default();

    let simple = builder.build(&GenerationRequest::new("simple basic geometry", "p1"));
    let chosen = selector.select(simple.selection_prompt()).reference_name;
    assert!(complexity_of(&library, &chosen).value() <= 1.0);

    let complex = builder.build(&GenerationRequest::new("complex advanced layered puzzle", "p1"));
    let chosen = selector.select(complex.selection_prompt()).reference_name;
    assert!(complexity_of(&library, &chosen).value() >= 2.0);
}

#[test]
fn edge_case_prompts_reach_edge_case_scenes() {
    let selector = FallbackSelector::new(shipped_library()).with_seed(1);
    for prompt in ["empty scene", "blank canvas", "a clean sandbox"] {
        assert_eq!(
            selector.select(prompt).reference_name,
            "sample_minimal_empty",
            "prompt: {}",
            prompt
        );
    }
    for prompt in ["one solo character", "a single entity"] {
        assert_eq!(
            selector.select(prompt).reference_name,
            "sample_single_entity",
            "prompt: {}",
            prompt
        );
    }
}

#[test]
fn keyword_selection_is_deterministic() {
    let library = shipped_library();
    let first = FallbackSelector::new(library.clone()).select("a detailed forest with animated sprites");
    assert_eq!(first.reference_name, "sample_asset_intensive");
    for seed in 0..10 {
        let selector = FallbackSelector::new(library.clone()).with_seed(seed);
        let again = selector.select("a detailed forest with animated sprites");
        assert_eq!(again.reference_name, first.reference_name);
        assert_eq!(again.document, first.document);
    }
}

#[test]
fn no_signal_prompt_is_reproducible_with_a_seed() {
    let library = shipped_library();
    let pick = |seed: u64| -> Vec<String> {
        let selector = FallbackSelector::new(library.clone()).with_seed(seed);
        (0..10).map(|_| selector.select("xyzzy").reference_name).collect()
    };
    let a = pick(11);
    assert_eq!(a, pick(11));
    assert!(a.iter().all(|name| library.get(name).is_some()));
    assert_eq!(
        FallbackSelector::new(library.clone()).select("xyzzy").reason,
        SelectionReason::Random
    );
}

#[test]
fn selection_never_mutates_the_library() {
    let library = shipped_library();
    let selector = FallbackSelector::new(library.clone());
    let mut selection = selector.select("empty scene");
    selection.document["entities"] = serde_json::json!([{"id": "intruder"}]);
    let stored = &library.get("sample_minimal_empty").unwrap().document;
    assert_eq!(stored["entities"], serde_json::json!([]));
}
