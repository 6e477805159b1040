use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::dao::models::{HeatId, PersonId, ScoreFields, SlotNumber, StoredScore};

const PLAIN_ENDPOINT: &str = "post";
const FEEDBACK_ENDPOINT: &str = "post-feedback";

/// Partial score change requested by a scoring view.
///
/// Only present fields express an intent to change; an absent field never clears.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ScoreUpdate {
    #[validate(range(min = 1))]
    pub heat: HeatId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1))]
    pub slot: Option<SlotNumber>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<String>,
    /// Overall feedback grade; routes the update to the feedback endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub good: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bad: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub person: Option<PersonId>,
}

/// Which server endpoint an update is sent to, decided by its shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateKind {
    /// Grade and/or comments.
    Plain,
    /// Good/bad tags or an overall value.
    Feedback,
}

impl UpdateKind {
    /// Last path segment of the endpoint under `/scores/{judge}/`.
    pub fn endpoint(self) -> &'static str {
        match self {
            UpdateKind::Plain => PLAIN_ENDPOINT,
            UpdateKind::Feedback => FEEDBACK_ENDPOINT,
        }
    }
}

impl ScoreUpdate {
    /// Update touching nothing but the given heat; fill fields with struct update syntax.
    pub fn new(heat: HeatId) -> Self {
        Self {
            heat,
            ..Self::default()
        }
    }

    /// Classify the update for endpoint routing.
    pub fn kind(&self) -> UpdateKind {
        if self.good.is_some() || self.bad.is_some() || self.value.is_some() {
            UpdateKind::Feedback
        } else {
            UpdateKind::Plain
        }
    }

    /// Body for `POST /scores/{judge}/post`.
    pub fn plain_body(&self) -> PlainScoreRequest<'_> {
        PlainScoreRequest {
            heat: self.heat,
            slot: self.slot,
            score: self.score.as_deref(),
            comments: self.comments.as_deref(),
            person: self.person,
        }
    }

    /// Body for `POST /scores/{judge}/post-feedback`.
    pub fn feedback_body(&self) -> FeedbackRequest<'_> {
        FeedbackRequest {
            heat: self.heat,
            slot: self.slot,
            value: self.value.as_deref(),
            good: self.good.as_deref(),
            bad: self.bad.as_deref(),
            person: self.person,
        }
    }
}

/// Wire body for a grade/comments update.
#[derive(Debug, Serialize)]
pub struct PlainScoreRequest<'a> {
    pub heat: HeatId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot: Option<SlotNumber>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub person: Option<PersonId>,
}

/// Wire body for a feedback update.
#[derive(Debug, Serialize)]
pub struct FeedbackRequest<'a> {
    pub heat: HeatId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot: Option<SlotNumber>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub good: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bad: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub person: Option<PersonId>,
}

/// Authoritative score state returned by both score endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreResponse {
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub comments: Option<String>,
    #[serde(default)]
    pub good: Option<String>,
    #[serde(default)]
    pub bad: Option<String>,
}

impl ScoreResponse {
    /// Resolve to complete fields, treating nulls as empty.
    pub fn to_fields(&self) -> ScoreFields {
        ScoreFields {
            score: self.value.clone().unwrap_or_default(),
            comments: self.comments.clone().unwrap_or_default(),
            good: self.good.clone().unwrap_or_default(),
            bad: self.bad.clone().unwrap_or_default(),
        }
    }
}

/// Last score state the view knows about for a heat/slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownScore {
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub comments: Option<String>,
    #[serde(default)]
    pub good: Option<String>,
    #[serde(default)]
    pub bad: Option<String>,
}

impl From<&ScoreResponse> for KnownScore {
    fn from(response: &ScoreResponse) -> Self {
        Self {
            value: response.value.clone(),
            comments: response.comments.clone(),
            good: response.good.clone(),
            bad: response.bad.clone(),
        }
    }
}

impl From<&StoredScore> for KnownScore {
    fn from(pending: &StoredScore) -> Self {
        Self {
            value: Some(pending.score.clone()),
            comments: Some(pending.comments.clone()),
            good: Some(pending.good.clone()),
            bad: Some(pending.bad.clone()),
        }
    }
}

/// Minimal patch a view applies immediately, carrying only the fields the update touched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OptimisticPatch {
    pub heat: HeatId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot: Option<SlotNumber>,
    /// Grade, whether the update called it `score` or `value`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub good: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bad: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub person: Option<PersonId>,
}

impl OptimisticPatch {
    /// Names of the fields carried by the patch, in wire order.
    pub fn keys(&self) -> Vec<&'static str> {
        let optional = [
            ("slot", self.slot.is_some()),
            ("value", self.value.is_some()),
            ("comments", self.comments.is_some()),
            ("good", self.good.is_some()),
            ("bad", self.bad.is_some()),
            ("person", self.person.is_some()),
        ];
        std::iter::once("heat")
            .chain(
                optional
                    .into_iter()
                    .filter_map(|(name, present)| present.then_some(name)),
            )
            .collect()
    }
}
