use std::path::Path;

use chrono::{Local, NaiveDateTime};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite};
use tracing::{debug, info};

use crate::error::Result;
use crate::models::{FeedbackBatch, FeedbackEntry, DATE_FORMAT};

const SELECT_COLUMNS: &str =
    "SELECT audit_no, date, project, category, subcategory, rating, comment FROM feedback";

/// Open (creating if missing) the feedback store and bring its schema up to date.
pub async fn connect(path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let newly_created = !path.exists();
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", path.display());
    } else {
        debug!("Opened existing database: {}", path.display());
    }

    init_db(&pool).await?;
    Ok(pool)
}

pub async fn init_db(pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Insert or overwrite one row per rated subcategory of the batch.
///
/// All rows share a single timestamp taken at call time. The batch commits
/// as a whole; an error leaves the table as it was.
pub async fn upsert_feedback(pool: &SqlitePool, batch: &FeedbackBatch) -> Result<usize> {
    let now = Local::now().naive_local().format(DATE_FORMAT).to_string();
    let mut tx = pool.begin().await?;

    for (subcategory, rating) in &batch.ratings {
        sqlx::query(
            r#"
            INSERT INTO feedback (audit_no, date, project, category, subcategory, rating, comment)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT (audit_no, project, category, subcategory) DO UPDATE
            SET date = excluded.date, rating = excluded.rating, comment = excluded.comment
            "#,
        )
        .bind(batch.audit_no)
        .bind(&now)
        .bind(&batch.project)
        .bind(&batch.category)
        .bind(subcategory)
        .bind(rating.label())
        .bind(batch.comment_for(subcategory))
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    info!(
        "Saved {} ratings for audit {} / {} / {}",
        batch.ratings.len(),
        batch.audit_no,
        batch.project,
        batch.category
    );
    Ok(batch.ratings.len())
}

pub async fn fetch_all(pool: &SqlitePool) -> Result<Vec<FeedbackEntry>> {
    let query = format!("{SELECT_COLUMNS} ORDER BY rowid");
    let rows = sqlx::query(&query).fetch_all(pool).await?;
    debug!("Fetched {} feedback rows", rows.len());
    rows.iter().map(row_to_entry).collect()
}

pub async fn fetch_by_audits(pool: &SqlitePool, audit_nos: &[i64]) -> Result<Vec<FeedbackEntry>> {
    if audit_nos.is_empty() {
        return Ok(Vec::new());
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT_COLUMNS);
    builder.push(" WHERE audit_no IN (");
    let mut separated = builder.separated(", ");
    for audit_no in audit_nos {
        separated.push_bind(*audit_no);
    }
    separated.push_unseparated(") ORDER BY rowid");

    let rows = builder.build().fetch_all(pool).await?;
    debug!("Fetched {} feedback rows for audits {:?}", rows.len(), audit_nos);
    rows.iter().map(row_to_entry).collect()
}

fn row_to_entry(row: &SqliteRow) -> Result<FeedbackEntry> {
    let raw_date: String = row.try_get("date")?;
    let date = NaiveDateTime::parse_from_str(&raw_date, DATE_FORMAT)
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

    Ok(FeedbackEntry {
        audit_no: row.try_get("audit_no")?,
        date,
        project: row.try_get("project")?,
        category: row.try_get("category")?,
        subcategory: row.try_get("subcategory")?,
        rating: row.try_get("rating")?,
        comment: row.try_get("comment")?,
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::BTreeMap;

    use sqlx::SqlitePool;
    use tempfile::TempDir;

    use crate::models::{FeedbackBatch, Rating};

    pub async fn temp_pool() -> (TempDir, SqlitePool) {
        let dir = tempfile::tempdir().unwrap();
        let pool = super::connect(&dir.path().join("feedback.db")).await.unwrap();
        (dir, pool)
    }

    pub fn batch(
        audit_no: i64,
        project: &str,
        category: &str,
        ratings: &[(&str, Rating, &str)],
    ) -> FeedbackBatch {
        let mut batch = FeedbackBatch {
            audit_no,
            project: project.to_string(),
            category: category.to_string(),
            ratings: BTreeMap::new(),
            comments: BTreeMap::new(),
        };
        for (subcategory, rating, comment) in ratings {
            batch.ratings.insert(subcategory.to_string(), *rating);
            if !comment.is_empty() {
                batch.comments.insert(subcategory.to_string(), comment.to_string());
            }
        }
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{batch, temp_pool};
    use super::*;
    use crate::models::Rating;
    use crate::scoring;

    const GENERAL: &str = "1. General";
    const ORG_CHART: &str = "1.01 Organization chart";
    const COMMS: &str = "1.02 Communication (Internet, cellular network, server etc)";

    #[tokio::test]
    async fn connect_creates_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("feedback.db");
        let pool = connect(&path).await.unwrap();
        assert!(path.exists());
        assert!(fetch_all(&pool).await.unwrap().is_empty());

        // Reopening runs the migration again without error
        drop(pool);
        assert!(connect(&path).await.is_ok());
    }

    #[tokio::test]
    async fn last_write_wins_for_same_key() {
        let (_dir, pool) = temp_pool().await;

        let first = batch(1, "Buxar-1", GENERAL, &[(ORG_CHART, Rating::Good, "chart pending")]);
        let second = batch(1, "Buxar-1", GENERAL, &[(ORG_CHART, Rating::WorkNotStarted, "")]);
        let third = batch(1, "Buxar-1", GENERAL, &[(ORG_CHART, Rating::Excellent, "signed off")]);

        for b in [&first, &second, &third] {
            assert_eq!(upsert_feedback(&pool, b).await.unwrap(), 1);
        }

        let rows = fetch_all(&pool).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].rating, "Excellent");
        assert_eq!(rows[0].comment, "signed off");
    }

    #[tokio::test]
    async fn resubmission_refreshes_date() {
        let (_dir, pool) = temp_pool().await;
        let b = batch(5, "Buxar-2", GENERAL, &[(ORG_CHART, Rating::NeedImprovement, "")]);
        upsert_feedback(&pool, &b).await.unwrap();

        sqlx::query("UPDATE feedback SET date = '2020-01-01 00:00:00' WHERE audit_no = 5")
            .execute(&pool)
            .await
            .unwrap();
        let stale = fetch_all(&pool).await.unwrap()[0].date;
        assert_eq!(stale.format(DATE_FORMAT).to_string(), "2020-01-01 00:00:00");

        upsert_feedback(&pool, &b).await.unwrap();
        let rows = fetch_all(&pool).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].date > stale);
    }

    #[tokio::test]
    async fn missing_comment_overwrites_with_empty() {
        let (_dir, pool) = temp_pool().await;
        upsert_feedback(&pool, &batch(2, "Khurja-1", GENERAL, &[(COMMS, Rating::Good, "slow link")]))
            .await
            .unwrap();
        upsert_feedback(&pool, &batch(2, "Khurja-1", GENERAL, &[(COMMS, Rating::Good, "")]))
            .await
            .unwrap();

        let rows = fetch_all(&pool).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].comment, "");
    }

    #[tokio::test]
    async fn distinct_keys_insert_new_rows() {
        let (_dir, pool) = temp_pool().await;
        upsert_feedback(&pool, &batch(1, "Buxar-1", GENERAL, &[(ORG_CHART, Rating::Good, "")]))
            .await
            .unwrap();
        upsert_feedback(&pool, &batch(2, "Buxar-1", GENERAL, &[(ORG_CHART, Rating::Good, "")]))
            .await
            .unwrap();
        upsert_feedback(&pool, &batch(1, "Buxar-2", GENERAL, &[(ORG_CHART, Rating::Good, "")]))
            .await
            .unwrap();

        assert_eq!(fetch_all(&pool).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn fetch_by_audits_filters_membership() {
        let (_dir, pool) = temp_pool().await;
        for audit_no in 1..=4 {
            upsert_feedback(
                &pool,
                &batch(audit_no, "Khurja-2", GENERAL, &[(ORG_CHART, Rating::Good, "")]),
            )
            .await
            .unwrap();
        }

        let rows = fetch_by_audits(&pool, &[2, 4, 9]).await.unwrap();
        let mut audits: Vec<i64> = rows.iter().map(|r| r.audit_no).collect();
        audits.sort_unstable();
        assert_eq!(audits, vec![2, 4]);

        assert!(fetch_by_audits(&pool, &[]).await.unwrap().is_empty());
        assert!(fetch_by_audits(&pool, &[42]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn two_ratings_for_buxar_average_ninety() {
        let (_dir, pool) = temp_pool().await;
        let b = batch(
            1,
            "Buxar-1",
            GENERAL,
            &[(ORG_CHART, Rating::Excellent, ""), (COMMS, Rating::Good, "")],
        );
        assert_eq!(upsert_feedback(&pool, &b).await.unwrap(), 2);

        let rows = fetch_by_audits(&pool, &[1]).await.unwrap();
        let scores = scoring::average_by_project(&rows);
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].label, "Buxar-1");
        assert!((scores[0].score - 90.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn batch_shares_one_timestamp() {
        let (_dir, pool) = temp_pool().await;
        let b = batch(
            3,
            "Ghatampur-1",
            GENERAL,
            &[(ORG_CHART, Rating::Good, ""), (COMMS, Rating::NeedImprovement, "")],
        );
        upsert_feedback(&pool, &b).await.unwrap();

        let rows = fetch_all(&pool).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date, rows[1].date);
    }
}
