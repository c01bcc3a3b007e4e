use async_trait::async_trait;
use tunevault_core::{Duration, Filters, Metadata, Song, SongDraft};

use super::{bounded, PostgresStorage};
use crate::{SongStorage, StorageError};

const SONG_COLUMNS: &str = r#"
    id,
    (EXTRACT(EPOCH FROM added_at) * 1000000)::BIGINT AS added_at_us,
    title,
    year,
    duration,
    genres,
    version
"#;

#[async_trait]
impl SongStorage for PostgresStorage {
    async fn insert(&self, draft: &SongDraft) -> Result<Song, StorageError> {
        let query = format!(
            r#"
            INSERT INTO songs (title, year, duration, genres)
            VALUES ($1, $2, $3, $4)
            RETURNING {SONG_COLUMNS}
            "#
        );
        bounded(async {
            let row = sqlx::query_as::<_, SongRow>(&query)
                .bind(&draft.title)
                .bind(draft.year)
                .bind(draft.duration.seconds())
                .bind(draft.genres.as_slice())
                .fetch_one(&self.pool)
                .await
                .map_err(|error| StorageError::Database(error.to_string()))?;
            Song::try_from(row)
        })
        .await
    }

    async fn get(&self, id: i64) -> Result<Song, StorageError> {
        if id < 1 {
            return Err(StorageError::RecordNotFound);
        }
        let query = format!("SELECT {SONG_COLUMNS} FROM songs WHERE id = $1");
        bounded(async {
            let row = sqlx::query_as::<_, SongRow>(&query)
                .bind(id)
                .fetch_one(&self.pool)
                .await
                .map_err(|error| match error {
                    sqlx::Error::RowNotFound => StorageError::RecordNotFound,
                    _ => StorageError::Database(error.to_string()),
                })?;
            Song::try_from(row)
        })
        .await
    }

    async fn update(
        &self,
        id: i64,
        expected_version: i32,
        draft: &SongDraft,
    ) -> Result<Song, StorageError> {
        // The version predicate makes this a compare-and-swap: zero rows
        // matched means a concurrent writer bumped the version first.
        let query = format!(
            r#"
            UPDATE songs
            SET title = $1, year = $2, duration = $3, genres = $4, version = version + 1
            WHERE id = $5 AND version = $6
            RETURNING {SONG_COLUMNS}
            "#
        );
        bounded(async {
            let row = sqlx::query_as::<_, SongRow>(&query)
                .bind(&draft.title)
                .bind(draft.year)
                .bind(draft.duration.seconds())
                .bind(draft.genres.as_slice())
                .bind(id)
                .bind(expected_version)
                .fetch_one(&self.pool)
                .await
                .map_err(|error| match error {
                    sqlx::Error::RowNotFound => StorageError::EditConflict,
                    _ => StorageError::Database(error.to_string()),
                })?;
            Song::try_from(row)
        })
        .await
    }

    async fn delete(&self, id: i64) -> Result<(), StorageError> {
        if id < 1 {
            return Err(StorageError::RecordNotFound);
        }
        bounded(async {
            let result = sqlx::query("DELETE FROM songs WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(|error| StorageError::Database(error.to_string()))?;
            if result.rows_affected() == 0 {
                return Err(StorageError::RecordNotFound);
            }
            Ok(())
        })
        .await
    }

    async fn list(
        &self,
        title: &str,
        genres: &[String],
        filters: &Filters,
    ) -> Result<(Vec<Song>, Metadata), StorageError> {
        let column = filters
            .sort_column()
            .ok_or_else(|| StorageError::UnsafeSortParameter(filters.sort.clone()))?;
        let direction = filters.sort_direction().as_sql();

        // count(*) OVER() puts the total in the same pass as the page, so
        // the count can never race the rows it describes. The ORDER BY
        // column comes from the safelist above, never from the caller.
        let query = format!(
            r#"
            SELECT count(*) OVER() AS total_records, {SONG_COLUMNS}
            FROM songs
            WHERE (to_tsvector('simple', title) @@ plainto_tsquery('simple', $1) OR $1 = '')
              AND (genres @> $2 OR $2 = '{{}}')
            ORDER BY {column} {direction}, id ASC
            LIMIT $3 OFFSET $4
            "#
        );
        bounded(async {
            let rows = sqlx::query_as::<_, CountedSongRow>(&query)
                .bind(title)
                .bind(genres)
                .bind(filters.limit())
                .bind(filters.offset())
                .fetch_all(&self.pool)
                .await
                .map_err(|error| StorageError::Database(error.to_string()))?;

            let total_records = rows.first().map_or(0, |row| row.total_records);
            let songs = rows
                .into_iter()
                .map(|row| Song::try_from(row.song))
                .collect::<Result<Vec<_>, _>>()?;
            let metadata = Metadata::calculate(total_records, filters.page, filters.page_size);
            Ok((songs, metadata))
        })
        .await
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SongRow {
    id: i64,
    added_at_us: i64,
    title: String,
    year: i32,
    duration: i32,
    genres: Vec<String>,
    version: i32,
}

#[derive(Debug, sqlx::FromRow)]
struct CountedSongRow {
    total_records: i64,
    #[sqlx(flatten)]
    song: SongRow,
}

impl TryFrom<SongRow> for Song {
    type Error = StorageError;

    fn try_from(value: SongRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.id,
            added_at: super::unix_micros_to_offset_datetime(value.added_at_us)?,
            title: value.title,
            year: value.year,
            duration: Duration::from_seconds(value.duration),
            genres: value.genres,
            version: value.version,
        })
    }
}

#[cfg(test)]
mod tests {
    use tunevault_core::{Filters, Metadata};

    use super::super::test_support::*;
    use crate::{SongStorage, StorageError};

    #[tokio::test]
    async fn insert_then_get_round_trips() {
        let Some(storage) = test_storage().await else {
            return;
        };

        let draft = song_draft("Nightcall", 2010, 258, &["synthwave", "electronic"]);
        let inserted = storage.insert(&draft).await.expect("insert song");
        assert!(inserted.id >= 1);
        assert_eq!(inserted.version, 1);
        assert_eq!(inserted.title, draft.title);

        let fetched = storage.get(inserted.id).await.expect("get song");
        assert_eq!(fetched, inserted);
    }

    #[tokio::test]
    async fn get_rejects_bad_ids() {
        let Some(storage) = test_storage().await else {
            return;
        };

        let error = storage.get(0).await.expect_err("id 0 should fail");
        assert_eq!(error, StorageError::RecordNotFound);

        let error = storage.get(-5).await.expect_err("negative id should fail");
        assert_eq!(error, StorageError::RecordNotFound);

        let error = storage.get(1_000_000).await.expect_err("missing row");
        assert_eq!(error, StorageError::RecordNotFound);
    }

    #[tokio::test]
    async fn update_bumps_version_on_match() {
        let Some(storage) = test_storage().await else {
            return;
        };

        let inserted = storage
            .insert(&song_draft("Old Title", 2001, 200, &["rock"]))
            .await
            .expect("insert song");

        let mut draft = inserted.draft();
        draft.title = "New Title".to_owned();
        let updated = storage
            .update(inserted.id, inserted.version, &draft)
            .await
            .expect("update song");
        assert_eq!(updated.version, 2);
        assert_eq!(updated.title, "New Title");
        assert_eq!(updated.added_at, inserted.added_at);
    }

    #[tokio::test]
    async fn stale_version_update_is_an_edit_conflict() {
        let Some(storage) = test_storage().await else {
            return;
        };

        let inserted = storage
            .insert(&song_draft("Contested", 2015, 180, &["pop"]))
            .await
            .expect("insert song");

        let mut first = inserted.draft();
        first.title = "First Writer".to_owned();
        let committed = storage
            .update(inserted.id, inserted.version, &first)
            .await
            .expect("first update");

        // Second writer still holds version 1.
        let mut second = inserted.draft();
        second.title = "Second Writer".to_owned();
        let error = storage
            .update(inserted.id, inserted.version, &second)
            .await
            .expect_err("stale update should conflict");
        assert_eq!(error, StorageError::EditConflict);

        // The record is exactly as the first writer left it.
        let current = storage.get(inserted.id).await.expect("get song");
        assert_eq!(current, committed);
        assert_eq!(current.title, "First Writer");
        assert_eq!(current.version, 2);
    }

    #[tokio::test]
    async fn delete_removes_exactly_once() {
        let Some(storage) = test_storage().await else {
            return;
        };

        let inserted = storage
            .insert(&song_draft("Short Lived", 1999, 120, &["punk"]))
            .await
            .expect("insert song");

        storage.delete(inserted.id).await.expect("delete song");
        let error = storage
            .delete(inserted.id)
            .await
            .expect_err("second delete should fail");
        assert_eq!(error, StorageError::RecordNotFound);

        let error = storage.delete(0).await.expect_err("id 0 should fail");
        assert_eq!(error, StorageError::RecordNotFound);
    }

    #[tokio::test]
    async fn list_filters_sorts_and_paginates() {
        let Some(storage) = test_storage().await else {
            return;
        };

        for (title, year, genres) in [
            ("Alpha", 1990, &["rock"][..]),
            ("Beta", 1991, &["rock", "indie"][..]),
            ("Gamma", 1992, &["jazz"][..]),
        ] {
            storage
                .insert(&song_draft(title, year, 100, genres))
                .await
                .expect("insert song");
        }

        let (all, metadata) = storage
            .list("", &[], &filters(1, 20, "year"))
            .await
            .expect("list all");
        assert_eq!(all.len(), 3);
        assert_eq!(metadata.total_records, 3);

        let (rock, _) = storage
            .list("", &["rock".to_owned()], &filters(1, 20, "year"))
            .await
            .expect("list rock");
        assert_eq!(
            rock.iter().map(|song| song.title.as_str()).collect::<Vec<_>>(),
            ["Alpha", "Beta"]
        );

        let (by_title, _) = storage
            .list("beta", &[], &filters(1, 20, "id"))
            .await
            .expect("list by title");
        assert_eq!(by_title.len(), 1);
        assert_eq!(by_title[0].title, "Beta");

        let (desc, _) = storage
            .list("", &[], &filters(1, 20, "-year"))
            .await
            .expect("list descending");
        assert_eq!(desc[0].title, "Gamma");

        let (page2, metadata) = storage
            .list("", &[], &filters(2, 2, "year"))
            .await
            .expect("list page 2");
        assert_eq!(page2.len(), 1);
        assert_eq!(page2[0].title, "Gamma");
        assert_eq!(metadata.current_page, 2);
        assert_eq!(metadata.last_page, 2);
        assert_eq!(metadata.total_records, 3);
    }

    #[tokio::test]
    async fn list_of_nothing_has_empty_metadata() {
        let Some(storage) = test_storage().await else {
            return;
        };

        let (songs, metadata) = storage
            .list("", &[], &filters(1, 20, "id"))
            .await
            .expect("list empty");
        assert!(songs.is_empty());
        assert_eq!(metadata, Metadata::default());
    }

    #[tokio::test]
    async fn list_rejects_unlisted_sort_column() {
        let Some(storage) = test_storage().await else {
            return;
        };

        let bad = Filters {
            page: 1,
            page_size: 20,
            sort: "version".to_owned(),
            sort_safelist: SONG_SORT_SAFELIST,
        };
        let error = storage
            .list("", &[], &bad)
            .await
            .expect_err("unlisted sort should fail");
        assert_eq!(error, StorageError::UnsafeSortParameter("version".to_owned()));
    }
}
