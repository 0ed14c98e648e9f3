//! Top-level separation entry point

use crate::classify::{classify, Overrides};
use crate::emit::{finalize, IncompleteTimeline, Separation};
use crate::score::ScoreModel;
use crate::timeline::merge_timelines;

/// Separate a recognized score into four SATB part timelines
///
/// Pure function of its inputs: no global state is read or written, so
/// independent invocations may run concurrently on different scores. Either
/// all four timelines come back complete or the call fails with
/// `IncompleteTimeline` and nothing is emitted.
pub fn separate(
    score: &ScoreModel,
    overrides: &Overrides,
) -> Result<Separation, IncompleteTimeline> {
    let classification = classify(score, overrides);
    let timelines = merge_timelines(score, &classification);
    finalize(score, timelines, classification.unclassified)
}
