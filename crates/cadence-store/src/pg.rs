//! Postgres adapter for the store ports.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{debug, info};

use cadence_model::{Account, ClaimedPost, Credential, NewPost, Post, PostSnapshot, PublishTask};

use crate::ports::{BookingStore, ClaimStore, ConflictInfo, InsertOutcome, PublishStore};
use crate::StoreError;

/// Maximum length persisted into `error_code`.
const ERROR_CODE_MAX_LEN: usize = 200;

/// Postgres-backed store.
///
/// All time comparisons in claim/reap SQL are evaluated on the database
/// clock, not the process clock; [`ClaimStore::clock`] exists so the
/// scheduler can warn when the two drift apart.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect to the database with a bounded pool.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        info!(max_connections, "connecting to Postgres");
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool (tests, shared wiring).
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run embedded migrations to the latest version.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Load a full post row.
    pub async fn get_post(&self, post_id: i64) -> Result<Option<Post>, StoreError> {
        let row: Option<PostRow> = sqlx::query_as(
            r#"
            SELECT id, account_id, post_type, media_url, caption, scheduled_at,
                   status, retry_count, next_attempt_at, error_code, publish_result,
                   locked_at, locked_by, job_id, client_request_id, created_at, updated_at
              FROM posts
             WHERE id = $1
            "#,
        )
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Post::try_from).transpose()
    }

    /// List accounts, optionally filtered on the pause switch.
    pub async fn list_accounts(&self, active: Option<bool>) -> Result<Vec<Account>, StoreError> {
        let rows: Vec<(i64, String, String, String, bool, DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT id, handle, platform_user_id, timezone, active, created_at
              FROM accounts
             WHERE $1::boolean IS NULL OR active = $1
             ORDER BY id ASC
            "#,
        )
        .bind(active)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(id, handle, platform_user_id, timezone, active, created_at)| Account {
                    id,
                    handle,
                    platform_user_id,
                    timezone,
                    active,
                    created_at,
                },
            )
            .collect())
    }

    /// Flip an account back to active (unfreeze).
    pub async fn resume_account(&self, account_id: i64) -> Result<(), StoreError> {
        sqlx::query("UPDATE accounts SET active = TRUE WHERE id = $1")
            .bind(account_id)
            .execute(&self.pool)
            .await?;
        info!(account_id, "account resumed");
        Ok(())
    }

    /// Freeze an account: pause it and force-fail its remaining scheduled
    /// posts, exactly like auto-pause.
    pub async fn freeze_account(&self, account_id: i64) -> Result<u64, StoreError> {
        self.pause_account(account_id).await?;
        let failed = self
            .fail_scheduled(account_id, cadence_model::codes::ACCOUNT_PAUSED)
            .await?;
        info!(account_id, failed, "account frozen");
        Ok(failed)
    }
}

fn clamp_code(code: &str) -> &str {
    if code.len() > ERROR_CODE_MAX_LEN {
        &code[..ERROR_CODE_MAX_LEN]
    } else {
        code
    }
}

/// Raw `posts` row; status and kind are validated on conversion.
#[derive(sqlx::FromRow)]
struct PostRow {
    id: i64,
    account_id: i64,
    post_type: String,
    media_url: String,
    caption: String,
    scheduled_at: DateTime<Utc>,
    status: String,
    retry_count: i32,
    next_attempt_at: Option<DateTime<Utc>>,
    error_code: Option<String>,
    publish_result: Option<serde_json::Value>,
    locked_at: Option<DateTime<Utc>>,
    locked_by: Option<String>,
    job_id: Option<String>,
    client_request_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PostRow> for Post {
    type Error = StoreError;

    fn try_from(row: PostRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse()
            .map_err(|_| StoreError::CorruptStatus(row.status.clone()))?;
        let kind = row
            .post_type
            .parse()
            .map_err(|_| StoreError::CorruptStatus(row.post_type.clone()))?;

        Ok(Post {
            id: row.id,
            account_id: row.account_id,
            kind,
            media_url: row.media_url,
            caption: row.caption,
            scheduled_at: row.scheduled_at,
            status,
            retry_count: row.retry_count,
            next_attempt_at: row.next_attempt_at,
            error_code: row.error_code,
            publish_result: row.publish_result,
            locked_at: row.locked_at,
            locked_by: row.locked_by,
            job_id: row.job_id,
            client_request_id: row.client_request_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl ClaimStore for PgStore {
    async fn claim_due(
        &self,
        lookahead_secs: u64,
        limit: i64,
    ) -> Result<Vec<ClaimedPost>, StoreError> {
        let rows: Vec<(i64, String)> = sqlx::query_as(
            r#"
            WITH due AS (
                SELECT p.id, 'publish-' || p.id AS job_id
                  FROM posts p
                  JOIN accounts a ON a.id = p.account_id
                 WHERE p.status = 'scheduled'
                   AND p.scheduled_at <= now() + make_interval(secs => $1)
                   AND now() >= COALESCE(p.next_attempt_at, now())
                   AND a.active = TRUE
                 ORDER BY p.scheduled_at ASC, p.id ASC
                 LIMIT $2
            )
            UPDATE posts AS p
               SET status = 'queued',
                   locked_at = now(),
                   job_id = due.job_id,
                   updated_at = now()
              FROM due
             WHERE p.id = due.id
            RETURNING p.id, p.job_id
            "#,
        )
        .bind(lookahead_secs as f64)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, job_id)| ClaimedPost { id, job_id })
            .collect())
    }

    async fn reap_stuck(
        &self,
        publishing_after_secs: u64,
        queued_after_secs: u64,
    ) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            WITH reaped AS (
                UPDATE posts
                   SET status = 'scheduled',
                       locked_at = NULL,
                       locked_by = NULL,
                       retry_count = retry_count + 1,
                       error_code = 'stuck_recovered',
                       updated_at = now()
                 WHERE (status = 'publishing' AND locked_at < now() - make_interval(secs => $1))
                    OR (status = 'queued'     AND locked_at < now() - make_interval(secs => $2))
                RETURNING id
            )
            SELECT count(*) FROM reaped
            "#,
        )
        .bind(publishing_after_secs as f64)
        .bind(queued_after_secs as f64)
        .fetch_one(&self.pool)
        .await?;

        Ok(count as u64)
    }

    async fn clock(&self) -> Result<DateTime<Utc>, StoreError> {
        let now: DateTime<Utc> = sqlx::query_scalar("SELECT now()")
            .fetch_one(&self.pool)
            .await?;
        Ok(now)
    }
}

#[async_trait]
impl PublishStore for PgStore {
    async fn begin_publishing(
        &self,
        post_id: i64,
        worker_id: &str,
    ) -> Result<Option<PublishTask>, StoreError> {
        let row: Option<(i64, i64, String, String, String, i32)> = sqlx::query_as(
            r#"
            UPDATE posts
               SET status = 'publishing',
                   locked_at = now(),
                   locked_by = $2,
                   updated_at = now()
             WHERE id = $1 AND status = 'queued'
            RETURNING id, account_id, post_type, media_url, caption, retry_count
            "#,
        )
        .bind(post_id)
        .bind(worker_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(
            |(id, account_id, kind, media_url, caption, retry_count)| PublishTask {
                id,
                account_id,
                kind,
                media_url,
                caption,
                retry_count,
            },
        ))
    }

    async fn heartbeat(&self, post_id: i64, worker_id: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE posts SET locked_at = now(), locked_by = $2 WHERE id = $1")
            .bind(post_id)
            .bind(worker_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn save_published(
        &self,
        post_id: i64,
        result: &serde_json::Value,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE posts
               SET status = 'published',
                   publish_result = COALESCE(publish_result, '{}'::jsonb) || $2,
                   retry_count = 0,
                   error_code = NULL,
                   locked_at = NULL,
                   locked_by = NULL,
                   updated_at = now()
             WHERE id = $1
            "#,
        )
        .bind(post_id)
        .bind(result)
        .execute(&self.pool)
        .await?;
        debug!(post_id, "post published");
        Ok(())
    }

    async fn schedule_retry(
        &self,
        post_id: i64,
        code: &str,
        payload: &serde_json::Value,
        delay_secs: u64,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE posts
               SET status = 'scheduled',
                   retry_count = retry_count + 1,
                   next_attempt_at = now() + make_interval(secs => $4),
                   error_code = $2,
                   publish_result = COALESCE(publish_result, '{}'::jsonb) || $3,
                   locked_at = NULL,
                   locked_by = NULL,
                   updated_at = now()
             WHERE id = $1
            "#,
        )
        .bind(post_id)
        .bind(clamp_code(code))
        .bind(payload)
        .bind(delay_secs as f64)
        .execute(&self.pool)
        .await?;
        debug!(post_id, code, delay_secs, "retry scheduled");
        Ok(())
    }

    async fn mark_failed(
        &self,
        post_id: i64,
        code: &str,
        payload: &serde_json::Value,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE posts
               SET status = 'failed',
                   retry_count = retry_count + 1,
                   error_code = $2,
                   publish_result = COALESCE(publish_result, '{}'::jsonb) || $3,
                   locked_at = NULL,
                   locked_by = NULL,
                   updated_at = now()
             WHERE id = $1
            "#,
        )
        .bind(post_id)
        .bind(clamp_code(code))
        .bind(payload)
        .execute(&self.pool)
        .await?;
        debug!(post_id, code, "post failed");
        Ok(())
    }

    async fn load_credential(&self, account_id: i64) -> Result<Option<Credential>, StoreError> {
        let row: Option<(String, String)> = sqlx::query_as(
            r#"
            SELECT platform_user_id, COALESCE(access_token, '')
              FROM accounts
             WHERE id = $1 AND active = TRUE
            "#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(platform_user_id, access_token)| Credential {
            platform_user_id,
            access_token,
        }))
    }

    async fn recent_posts(
        &self,
        account_id: i64,
        limit: usize,
    ) -> Result<Vec<PostSnapshot>, StoreError> {
        let rows: Vec<(i64, String, i32, Option<String>)> = sqlx::query_as(
            r#"
            SELECT id, status, retry_count, error_code
              FROM posts
             WHERE account_id = $1
             ORDER BY updated_at DESC
             LIMIT $2
            "#,
        )
        .bind(account_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(id, status, retry_count, error_code)| {
                let status = status
                    .parse()
                    .map_err(|_| StoreError::CorruptStatus(status.clone()))?;
                Ok(PostSnapshot {
                    id,
                    status,
                    retry_count,
                    error_code,
                })
            })
            .collect()
    }

    async fn pause_account(&self, account_id: i64) -> Result<(), StoreError> {
        sqlx::query("UPDATE accounts SET active = FALSE WHERE id = $1")
            .bind(account_id)
            .execute(&self.pool)
            .await?;
        info!(account_id, "account paused");
        Ok(())
    }

    async fn fail_scheduled(&self, account_id: i64, code: &str) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            WITH failed AS (
                UPDATE posts
                   SET status = 'failed',
                       error_code = $2,
                       publish_result = COALESCE(publish_result, '{}'::jsonb)
                           || jsonb_build_object('paused', TRUE),
                       updated_at = now()
                 WHERE account_id = $1 AND status = 'scheduled'
                RETURNING id
            )
            SELECT count(*) FROM failed
            "#,
        )
        .bind(account_id)
        .bind(clamp_code(code))
        .fetch_one(&self.pool)
        .await?;

        Ok(count as u64)
    }
}

#[async_trait]
impl BookingStore for PgStore {
    async fn committed_count(
        &self,
        account_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT count(*) FROM posts
             WHERE account_id = $1
               AND status IN ('scheduled', 'queued', 'publishing')
               AND scheduled_at >= $2 AND scheduled_at < $3
            "#,
        )
        .bind(account_id)
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await?;
        Ok(count as usize)
    }

    async fn committed_times(
        &self,
        account_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>, StoreError> {
        let rows: Vec<(DateTime<Utc>,)> = sqlx::query_as(
            r#"
            SELECT scheduled_at FROM posts
             WHERE account_id = $1
               AND status IN ('scheduled', 'queued', 'publishing')
               AND scheduled_at >= $2 AND scheduled_at < $3
             ORDER BY scheduled_at ASC
            "#,
        )
        .bind(account_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(t,)| t).collect())
    }

    async fn cancel_newest(
        &self,
        account_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        count: usize,
    ) -> Result<u64, StoreError> {
        let canceled: i64 = sqlx::query_scalar(
            r#"
            WITH to_cancel AS (
                SELECT id
                  FROM posts
                 WHERE account_id = $1
                   AND status IN ('scheduled', 'queued')
                   AND scheduled_at >= $2 AND scheduled_at < $3
                 ORDER BY scheduled_at DESC
                 LIMIT $4
            ),
            canceled AS (
                UPDATE posts p
                   SET status = 'canceled', updated_at = now()
                  FROM to_cancel tc
                 WHERE p.id = tc.id
                RETURNING p.id
            )
            SELECT count(*) FROM canceled
            "#,
        )
        .bind(account_id)
        .bind(from)
        .bind(to)
        .bind(count as i64)
        .fetch_one(&self.pool)
        .await?;
        Ok(canceled as u64)
    }

    async fn spacing_conflict(
        &self,
        account_id: i64,
        at: DateTime<Utc>,
        spacing_minutes: i64,
    ) -> Result<Option<ConflictInfo>, StoreError> {
        let row: Option<(i64, DateTime<Utc>, String)> = sqlx::query_as(
            r#"
            SELECT id, scheduled_at, status
              FROM posts
             WHERE account_id = $1
               AND scheduled_at BETWEEN $2 - make_interval(mins => $3)
                                    AND $2 + make_interval(mins => $3)
               AND status IN ('scheduled', 'queued', 'publishing')
             ORDER BY scheduled_at ASC
             LIMIT 1
            "#,
        )
        .bind(account_id)
        .bind(at)
        .bind(spacing_minutes as i32)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(id, scheduled_at, status)| {
            let status = status
                .parse()
                .map_err(|_| StoreError::CorruptStatus(status.clone()))?;
            Ok(ConflictInfo {
                id,
                scheduled_at,
                status,
            })
        })
        .transpose()
    }

    async fn insert_post(&self, post: &NewPost) -> Result<InsertOutcome, StoreError> {
        let (id, inserted): (i64, bool) = sqlx::query_as(
            r#"
            INSERT INTO posts
                (account_id, post_type, media_url, caption, scheduled_at, client_request_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (account_id, client_request_id) WHERE client_request_id IS NOT NULL
            DO UPDATE SET
                media_url = EXCLUDED.media_url,
                caption = EXCLUDED.caption,
                scheduled_at = EXCLUDED.scheduled_at,
                updated_at = now()
            RETURNING id, (xmax = 0) AS inserted
            "#,
        )
        .bind(post.account_id)
        .bind(post.kind.as_str())
        .bind(&post.media_url)
        .bind(&post.caption)
        .bind(post.scheduled_at)
        .bind(&post.client_request_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(if inserted {
            InsertOutcome::Created(id)
        } else {
            InsertOutcome::Updated(id)
        })
    }
}
