use serde::Serialize;
use time::OffsetDateTime;

use crate::duration::Duration;
use crate::validation::{unique, Validator};

pub const MAX_TITLE_BYTES: usize = 500;
pub const MIN_YEAR: i32 = 1888;
pub const MAX_GENRES: usize = 3;

/// A catalog record as the store returns it. `id`, `added_at`, and `version`
/// are store-assigned; `version` is the optimistic-concurrency token and is
/// bumped on every committed update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Song {
    pub id: i64,
    #[serde(skip_serializing)]
    pub added_at: OffsetDateTime,
    pub title: String,
    #[serde(skip_serializing_if = "year_is_absent")]
    pub year: i32,
    #[serde(skip_serializing_if = "duration_is_absent")]
    pub duration: Duration,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub genres: Vec<String>,
    pub version: i32,
}

/// The caller-supplied field set, used for inserts and as the payload of a
/// compare-and-swap update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SongDraft {
    pub title: String,
    pub year: i32,
    pub duration: Duration,
    pub genres: Vec<String>,
}

impl Song {
    /// The mutable fields of this record, for building an update payload.
    #[must_use]
    pub fn draft(&self) -> SongDraft {
        SongDraft {
            title: self.title.clone(),
            year: self.year,
            duration: self.duration,
            genres: self.genres.clone(),
        }
    }
}

fn year_is_absent(year: &i32) -> bool {
    *year == 0
}

fn duration_is_absent(duration: &Duration) -> bool {
    duration.seconds() == 0
}

/// Runs every field rule against the draft, accumulating failures into `v`.
pub fn validate_song(v: &mut Validator, draft: &SongDraft) {
    v.check(!draft.title.is_empty(), "title", "must be provided");
    v.check(
        draft.title.len() <= MAX_TITLE_BYTES,
        "title",
        "must not be more than 500 bytes long",
    );

    v.check(draft.year != 0, "year", "must be provided");
    v.check(draft.year >= MIN_YEAR, "year", "must not be earlier than 1888");
    v.check(
        draft.year <= OffsetDateTime::now_utc().year(),
        "year",
        "must not be in the future",
    );

    v.check(draft.duration.seconds() != 0, "duration", "must be provided");
    v.check(
        draft.duration.seconds() > 0,
        "duration",
        "must be a positive integer",
    );

    v.check(
        !draft.genres.is_empty(),
        "genres",
        "must contain at least 1 genre",
    );
    v.check(
        draft.genres.len() <= MAX_GENRES,
        "genres",
        "must not contain more than 3 genres",
    );
    v.check(
        unique(&draft.genres),
        "genres",
        "must not contain duplicate values",
    );
}
