//! Pure reconciliation of a partial update against the last known score.

use crate::{
    dao::models::ScoreFields,
    dto::score::{KnownScore, OptimisticPatch, ScoreUpdate},
};

/// What the view knows about the score being edited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeContext {
    /// Plain field-wise override of the known state.
    Simple(KnownScore),
    /// A feedback toggle click: the server receives only the clicked tag, but the
    /// queue must keep the complete good/bad state the click produced.
    Toggled {
        /// Known state for the grade and comments.
        current: KnownScore,
        /// Good tags after the click.
        resulting_good: String,
        /// Bad tags after the click.
        resulting_bad: String,
    },
}

impl MergeContext {
    fn current(&self) -> &KnownScore {
        match self {
            MergeContext::Simple(current) | MergeContext::Toggled { current, .. } => current,
        }
    }

    /// Same context over a different known state; toggled results are kept.
    pub fn with_current(&self, current: KnownScore) -> MergeContext {
        match self {
            MergeContext::Simple(_) => MergeContext::Simple(current),
            MergeContext::Toggled {
                resulting_good,
                resulting_bad,
                ..
            } => MergeContext::Toggled {
                current,
                resulting_good: resulting_good.clone(),
                resulting_bad: resulting_bad.clone(),
            },
        }
    }
}

impl Default for MergeContext {
    fn default() -> Self {
        MergeContext::Simple(KnownScore::default())
    }
}

/// Complete queue fields for `update` applied over `context`.
pub fn merge_for_offline(update: &ScoreUpdate, context: &MergeContext) -> ScoreFields {
    let current = context.current();

    let score = update
        .score
        .as_ref()
        .or(update.value.as_ref())
        .or(current.value.as_ref())
        .cloned()
        .unwrap_or_default();
    let comments = match &update.comments {
        Some(comments) => comments.clone(),
        None => current.comments.clone().unwrap_or_default(),
    };

    let touches_feedback = update.good.is_some() || update.bad.is_some();
    let (good, bad) = match context {
        MergeContext::Toggled {
            resulting_good,
            resulting_bad,
            ..
        } if touches_feedback => (resulting_good.clone(), resulting_bad.clone()),
        _ => (
            override_field(&update.good, &current.good),
            override_field(&update.bad, &current.bad),
        ),
    };

    ScoreFields {
        score,
        comments,
        good,
        bad,
    }
}

fn override_field(update: &Option<String>, current: &Option<String>) -> String {
    update
        .as_ref()
        .or(current.as_ref())
        .cloned()
        .unwrap_or_default()
}

/// Patch holding only the fields `update` carries, with `score`/`value` folded into `value`.
pub fn generate_optimistic_response(update: &ScoreUpdate) -> OptimisticPatch {
    OptimisticPatch {
        heat: update.heat,
        slot: update.slot,
        value: update.score.clone().or_else(|| update.value.clone()),
        comments: update.comments.clone(),
        good: update.good.clone(),
        bad: update.bad.clone(),
        person: update.person,
    }
}
