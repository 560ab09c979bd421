//! Static, stage-specific suggestions attached to stage errors.

use petriflow_types::Stage;

const PARSE_HINTS: &[&str] = &[
    "Describe each step as a short imperative phrase, e.g. \"run tests\".",
    "Use words like \"then\", \"after\" or \"in parallel\" to express ordering.",
    "Avoid mixing several workflows in a single description.",
];

const BUILD_HINTS: &[&str] = &[
    "Check that every step in the parsed intent has a name.",
    "Steps that depend on each other must be connected by an explicit ordering.",
];

const VALIDATE_HINTS: &[&str] = &[
    "A deadlock usually means a step waits on an input that is never produced.",
    "Try raising the k-bound if the verifier reports an inconclusive result.",
    "Re-run parse with clearer ordering if the model has unreachable steps.",
];

const SIMULATE_HINTS: &[&str] = &[
    "Simulation requires a model that passed validation.",
    "Increase the step bound if the trace ends before the workflow completes.",
    "Use a fixed seed to reproduce a run.",
];

#[must_use]
pub fn stage_hints(stage: Stage) -> &'static [&'static str] {
    match stage {
        Stage::Parse => PARSE_HINTS,
        Stage::Build => BUILD_HINTS,
        Stage::Validate => VALIDATE_HINTS,
        Stage::Simulate => SIMULATE_HINTS,
    }
}

/// Remote suggestions first, then the static hints, without duplicates.
#[must_use]
pub fn merge_suggestions(stage: Stage, remote: Vec<String>) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(remote.len() + stage_hints(stage).len());
    let candidates = remote
        .into_iter()
        .chain(stage_hints(stage).iter().map(|hint| (*hint).to_string()));
    for suggestion in candidates {
        let trimmed = suggestion.trim();
        if trimmed.is_empty() || merged.iter().any(|existing| existing == trimmed) {
            continue;
        }
        merged.push(trimmed.to_string());
    }
    merged
}
