//! Adapter from the provider's game summary document to a game result.
//!
//! The summary payload is loosely structured and moves fields around between
//! endpoints, so every "look somewhere else" rule lives here:
//!
//! 1. Competitions are searched in order: the first entry of `competitions`,
//!    then the first entry of `header.competitions`. Each field below takes
//!    the first competition that carries it.
//! 2. Completion is `status.type.completed` when present. Otherwise the status
//!    marker (`status.type.state`, or `status.type.name` when the state is
//!    empty, or `status.type` itself when it is a bare string) is compared
//!    against [`FINAL_MARKERS`].
//! 3. Competitors come from the first competition with a non-empty list and
//!    are matched by their `homeAway` tag. Entries without one are ignored.
//! 4. Scores may be a number, a numeric string, or an object with a `value`.
//!
//! A field with an unexpected shape reads as absent instead of spoiling the
//! rest of the document. Only a non-object document, or one with no
//! competitors anywhere, is [`SummaryParse::Malformed`].

use crate::FinalScore;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Status markers that mean the game is over.
pub const FINAL_MARKERS: [&str; 3] = ["post", "final", "status_final"];

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Read a field as `T`, or as absent when it has some other shape.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

/// Read a list, dropping entries that are not a `T`. A non-list is empty.
fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let Some(Value::Array(items)) = Option::<Value>::deserialize(deserializer)? else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect())
}

#[derive(Debug, Deserialize, Default)]
struct SummaryDocument {
    #[serde(default, deserialize_with = "lenient_list")]
    competitions: Vec<Competition>,
    #[serde(default, deserialize_with = "lenient")]
    header: Option<Header>,
}

#[derive(Debug, Deserialize, Default)]
struct Header {
    #[serde(default, deserialize_with = "lenient_list")]
    competitions: Vec<Competition>,
}

#[derive(Debug, Deserialize, Default)]
struct Competition {
    #[serde(default, deserialize_with = "lenient")]
    status: Option<Status>,
    #[serde(default, deserialize_with = "lenient_list")]
    competitors: Vec<Competitor>,
}

#[derive(Debug, Deserialize)]
struct Status {
    #[serde(rename = "type", default, deserialize_with = "lenient")]
    status_type: Option<StatusKind>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StatusKind {
    Detailed(StatusType),
    Marker(String),
}

#[derive(Debug, Deserialize)]
struct StatusType {
    #[serde(default, deserialize_with = "lenient")]
    completed: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    state: Option<String>, // "pre", "in", "post"
    #[serde(default, deserialize_with = "lenient")]
    name: Option<String>, // "STATUS_SCHEDULED", "STATUS_FINAL"
}

#[derive(Debug, Deserialize)]
struct Competitor {
    #[serde(rename = "homeAway", default, deserialize_with = "lenient")]
    home_away: Option<String>,
    #[serde(default)]
    score: Value,
}

/// A score is a number, a numeric string, or an object with a numeric `value`.
fn score_points(score: &Value) -> Option<u16> {
    let value = match score {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        Value::Object(detail) => detail.get("value")?.as_f64()?,
        _ => return None,
    };
    whole_points(value)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn whole_points(value: f64) -> Option<u16> {
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value <= f64::from(u16::MAX) {
        Some(value as u16)
    } else {
        None
    }
}

impl SummaryDocument {
    fn competitions(&self) -> impl Iterator<Item = &Competition> {
        let top = self.competitions.first();
        let header = self.header.as_ref().and_then(|h| h.competitions.first());
        top.into_iter().chain(header)
    }

    fn status_type(&self) -> Option<&StatusKind> {
        self.competitions()
            .find_map(|c| c.status.as_ref().and_then(|s| s.status_type.as_ref()))
    }

    fn competitors(&self) -> Option<&[Competitor]> {
        self.competitions()
            .map(|c| c.competitors.as_slice())
            .find(|list| !list.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Parsed result
// ---------------------------------------------------------------------------

/// What the provider says about a game right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameResult {
    pub completed: bool,
    pub home_score: Option<u16>,
    pub away_score: Option<u16>,
}

impl GameResult {
    /// The score to record, only once the game is over and both sides parsed.
    pub fn final_score(&self) -> Option<FinalScore> {
        match (self.completed, self.home_score, self.away_score) {
            (true, Some(home), Some(away)) => Some(FinalScore { home, away }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryParse {
    Parsed(GameResult),
    Malformed(String),
}

impl SummaryParse {
    pub fn final_score(&self) -> Option<FinalScore> {
        match self {
            SummaryParse::Parsed(result) => result.final_score(),
            SummaryParse::Malformed(_) => None,
        }
    }
}

fn is_completed(status: &StatusKind) -> bool {
    let marker = match status {
        StatusKind::Marker(marker) => Some(marker.as_str()),
        StatusKind::Detailed(status) => {
            if let Some(completed) = status.completed {
                return completed;
            }
            status
                .state
                .as_deref()
                .filter(|s| !s.is_empty())
                .or(status.name.as_deref())
        }
    };
    marker.is_some_and(|m| FINAL_MARKERS.iter().any(|f| m.eq_ignore_ascii_case(f)))
}

fn score_for(competitors: &[Competitor], role: &str) -> Option<u16> {
    competitors
        .iter()
        .find(|c| c.home_away.as_deref() == Some(role))
        .and_then(|c| score_points(&c.score))
}

/// Read a summary document. Never fails: unreadable documents are `Malformed`.
pub fn parse_summary(doc: &Value) -> SummaryParse {
    if !doc.is_object() {
        return SummaryParse::Malformed("summary is not a JSON object".to_string());
    }
    let summary = match SummaryDocument::deserialize(doc) {
        Ok(summary) => summary,
        Err(e) => return SummaryParse::Malformed(format!("unexpected summary shape: {e}")),
    };
    let Some(competitors) = summary.competitors() else {
        return SummaryParse::Malformed("no competitors in summary".to_string());
    };

    SummaryParse::Parsed(GameResult {
        completed: summary.status_type().is_some_and(is_completed),
        home_score: score_for(competitors, "home"),
        away_score: score_for(competitors, "away"),
    })
}
