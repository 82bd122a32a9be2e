//! Fallback selection: score reference scenes against a prompt and pick one.
//!
//! Scoring is a pure function of (prompt, scene, rules) and the best-pick
//! step is a separate pure function, so both can be exercised without a
//! library or randomness.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde_json::Value;
use std::sync::Arc;

use crate::core::fallback;
use crate::core::library::{ReferenceLibrary, ReferenceScene};

/// Name reported when the library is empty and the error scene is used.
pub const ERROR_FALLBACK_NAME: &str = "error_fallback";

/// Weights and marker words used to score a reference scene.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringRules {
    /// Awarded when a keyword occurs verbatim in the prompt.
    pub exact_weight: f64,
    /// Awarded when only some space-separated part of a keyword occurs.
    pub partial_weight: f64,
    /// Prompt words that bias towards low complexity.
    pub simple_markers: Vec<String>,
    /// Prompt words that bias towards high complexity.
    pub complex_markers: Vec<String>,
    /// Simple-marker bias is `simplicity_ceiling - complexity`.
    pub simplicity_ceiling: f64,
}

impl Default for ScoringRules {
    fn default() -> Self {
        Self {
            exact_weight: 2.0,
            partial_weight: 1.0,
            simple_markers: vec!["simple".to_string(), "basic".to_string()],
            complex_markers: vec!["complex".to_string(), "advanced".to_string()],
            simplicity_ceiling: 4.0,
        }
    }
}

impl ScoringRules {
    /// Score of one keyword against an already lower-cased prompt.
    pub fn keyword_score(&self, prompt: &str, keyword: &str) -> f64 {
        if prompt.contains(keyword) {
            self.exact_weight
        } else if keyword.split(' ').any(|part| !part.is_empty() && prompt.contains(part)) {
            self.partial_weight
        } else {
            0.0
        }
    }

    /// Complexity preference expressed by the prompt. Simple markers win
    /// when both kinds are present.
    pub fn complexity_bias(&self, prompt: &str, complexity: f64) -> f64 {
        if self.simple_markers.iter().any(|m| prompt.contains(m.as_str())) {
            self.simplicity_ceiling - complexity
        } else if self.complex_markers.iter().any(|m| prompt.contains(m.as_str())) {
            complexity
        } else {
            0.0
        }
    }

    /// Total score of `scene` for an already lower-cased prompt.
    pub fn score(&self, prompt: &str, scene: &ReferenceScene) -> f64 {
        let keywords: f64 = scene
            .keywords
            .iter()
            .map(|k| self.keyword_score(prompt, k))
            .sum();
        keywords + self.complexity_bias(prompt, scene.complexity.value())
    }
}

/// Index of the highest score; the earliest wins ties.
pub fn pick_best(scores: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &score) in scores.iter().enumerate() {
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((i, score)),
        }
    }
    best.map(|(i, _)| i)
}

fn first_by_complexity(scenes: &[ReferenceScene], prefer_max: bool) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, scene) in scenes.iter().enumerate() {
        let replace = match best {
            None => true,
            Some(b) => {
                let current = scenes[b].complexity.value();
                let candidate = scene.complexity.value();
                if prefer_max {
                    candidate > current
                } else {
                    candidate < current
                }
            }
        };
        if replace {
            best = Some(i);
        }
    }
    best
}

/// Why a reference scene was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionReason {
    KeywordMatch,
    PreferComplex,
    PreferSimple,
    Random,
    EmptyLibrary,
}

/// A chosen scene. `document` is a copy; the library is never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub document: Value,
    pub reference_name: String,
    pub score: f64,
    pub reason: SelectionReason,
}

/// Picks reference scenes for prompts.
///
/// Shared across requests; the only mutable state is the RNG used when a
/// prompt carries no keyword signal.
pub struct FallbackSelector {
    library: Arc<ReferenceLibrary>,
    rules: ScoringRules,
    rng: Mutex<StdRng>,
}

impl std::fmt::Debug for FallbackSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackSelector")
            .field("scenes", &self.library.len())
            .field("rules", &self.rules)
            .finish()
    }
}

impl FallbackSelector {
    pub fn new(library: Arc<ReferenceLibrary>) -> Self {
        Self {
            library,
            rules: ScoringRules::default(),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Fix the RNG seed so prompts without keyword signal pick reproducibly.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    pub fn with_rules(mut self, rules: ScoringRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn library(&self) -> &ReferenceLibrary {
        &self.library
    }

    pub fn rules(&self) -> &ScoringRules {
        &self.rules
    }

    /// Select using the selector's own RNG.
    pub fn select(&self, prompt: &str) -> Selection {
        let mut rng = self.rng.lock();
        self.select_with(prompt, &mut *rng)
    }

    /// Select using a caller-supplied randomness source.
    pub fn select_with<R: Rng + ?Sized>(&self, prompt: &str, rng: &mut R) -> Selection {
        let scenes = self.library.scenes();
        if scenes.is_empty() {
            tracing::warn!("no reference scenes available, using error fallback");
            return Selection {
                document: fallback::error_scene(),
                reference_name: ERROR_FALLBACK_NAME.to_string(),
                score: 0.0,
                reason: SelectionReason::EmptyLibrary,
            };
        }

        let prompt = prompt.to_lowercase();
        let scores: Vec<f64> = scenes.iter().map(|s| self.rules.score(&prompt, s)).collect();

        // `scenes` is non-empty, so every branch finds an index.
        let (index, reason) = match pick_best(&scores) {
            Some(i) if scores[i] > 0.0 => (i, SelectionReason::KeywordMatch),
            _ if prompt.contains("complex") => (
                first_by_complexity(scenes, true).unwrap_or(0),
                SelectionReason::PreferComplex,
            ),
            _ if prompt.contains("simple") => (
                first_by_complexity(scenes, false).unwrap_or(0),
                SelectionReason::PreferSimple,
            ),
            _ => {
                let indices: Vec<usize> = (0..scenes.len()).collect();
                (
                    indices.choose(rng).copied().unwrap_or(0),
                    SelectionReason::Random,
                )
            }
        };

        let chosen = &scenes[index];
        tracing::info!(
            reference = %chosen.name,
            score = scores[index],
            reason = ?reason,
            "selected reference scene"
        );
        Selection {
            document: chosen.document.clone(),
            reference_name: chosen.name.clone(),
            score: scores[index],
            reason,
        }
    }
}
