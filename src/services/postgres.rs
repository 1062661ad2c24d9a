use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::core::watcher::NegotiationStore;
use crate::models::{
    BoundingBox, Checkpoint, CheckpointStatus, CheckpointType, Garment, Measurements, Negotiation,
    NegotiationMessage, NegotiationStatus, NegotiationSummary, Professional, SearchFilters,
    UserProfile,
};

/// Errors that can occur when interacting with PostgreSQL
#[derive(Debug, Error)]
pub enum PostgresError {
    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrateError(#[from] sqlx::migrate::MigrateError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

const GARMENT_COLUMNS: &str = r#"
    c.id, c.owner_id, c.title, c.category, c.gender, c.price_per_day,
    c.is_available, c.in_use,
    c.shoulder_width, c.chest, c.waist, c.hip, c.inseam, c.shoe_size,
    c.rating, c.rentals_count, c.views_count, c.created_at,
    u.latitude AS owner_latitude, u.longitude AS owner_longitude
"#;

const NEGOTIATION_COLUMNS: &str = r#"
    id, clothing_item_id, initiator_id, recipient_id, professional_id,
    professional_confirmed, type, status, proposed_price,
    responded_at, closed_at, created_at, updated_at
"#;

const MESSAGE_COLUMNS: &str = "id, negotiation_id, sender_id, message, is_read, created_at";

const UPSERT_MEASUREMENTS: &str = r#"
    INSERT INTO user_measurements
        (user_id, shoulder_width, chest, waist, hip, inseam, shoe_size, updated_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
    ON CONFLICT (user_id)
    DO UPDATE SET
        shoulder_width = COALESCE(EXCLUDED.shoulder_width, user_measurements.shoulder_width),
        chest = COALESCE(EXCLUDED.chest, user_measurements.chest),
        waist = COALESCE(EXCLUDED.waist, user_measurements.waist),
        hip = COALESCE(EXCLUDED.hip, user_measurements.hip),
        inseam = COALESCE(EXCLUDED.inseam, user_measurements.inseam),
        shoe_size = COALESCE(EXCLUDED.shoe_size, user_measurements.shoe_size),
        updated_at = EXCLUDED.updated_at
    RETURNING shoulder_width, chest, waist, hip, inseam, shoe_size
"#;

const CHECKPOINT_COLUMNS: &str = r#"
    id, negotiation_id, type, qr_code, status, generated_by_user_id,
    scanned_by_user_id, scanned_at, notes, created_at
"#;

fn measurements_from_row(row: &PgRow) -> Measurements {
    Measurements {
        shoulder_width: row.get("shoulder_width"),
        chest: row.get("chest"),
        waist: row.get("waist"),
        hip: row.get("hip"),
        inseam: row.get("inseam"),
        shoe_size: row.get("shoe_size"),
    }
}

fn garment_from_row(row: &PgRow) -> Garment {
    Garment {
        id: row.get("id"),
        owner_id: row.get("owner_id"),
        title: row.get("title"),
        category: row.get("category"),
        gender: row.get("gender"),
        price_per_day: row.get("price_per_day"),
        is_available: row.get("is_available"),
        in_use: row.get("in_use"),
        measurements: measurements_from_row(row),
        rating: row.get("rating"),
        rentals_count: row.get("rentals_count"),
        views_count: row.get("views_count"),
        owner_latitude: row.get("owner_latitude"),
        owner_longitude: row.get("owner_longitude"),
        created_at: row.get("created_at"),
    }
}

fn negotiation_from_row(row: &PgRow) -> Negotiation {
    Negotiation {
        id: row.get("id"),
        clothing_item_id: row.get("clothing_item_id"),
        initiator_id: row.get("initiator_id"),
        recipient_id: row.get("recipient_id"),
        professional_id: row.get("professional_id"),
        professional_confirmed: row.get("professional_confirmed"),
        kind: row.get("type"),
        status: row.get("status"),
        proposed_price: row.get("proposed_price"),
        responded_at: row.get("responded_at"),
        closed_at: row.get("closed_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn message_from_row(row: &PgRow) -> NegotiationMessage {
    NegotiationMessage {
        id: row.get("id"),
        negotiation_id: row.get("negotiation_id"),
        sender_id: row.get("sender_id"),
        message: row.get("message"),
        is_read: row.get("is_read"),
        created_at: row.get("created_at"),
    }
}

fn checkpoint_from_row(row: &PgRow) -> Checkpoint {
    Checkpoint {
        id: row.get("id"),
        negotiation_id: row.get("negotiation_id"),
        kind: row.get("type"),
        qr_code: row.get("qr_code"),
        status: row.get("status"),
        generated_by_user_id: row.get("generated_by_user_id"),
        scanned_by_user_id: row.get("scanned_by_user_id"),
        scanned_at: row.get("scanned_at"),
        notes: row.get("notes"),
        created_at: row.get("created_at"),
    }
}

/// PostgreSQL client for the marketplace tables
///
/// Owns listings, profiles, negotiations and checkpoints. Ranking and the
/// handoff rules stay out of SQL; queries only narrow candidate sets.
pub struct PostgresClient {
    pool: PgPool,
}

impl PostgresClient {
    /// Create a new PostgreSQL client from a connection string
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
        acquire_timeout: Duration,
        idle_timeout: Duration,
    ) -> Result<Self, PostgresError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(acquire_timeout)
            .idle_timeout(idle_timeout)
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        // Run migrations on startup
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Create a new PostgreSQL client from settings
    pub async fn from_settings(
        url: &str,
        max_connections: Option<u32>,
        min_connections: Option<u32>,
        acquire_timeout_secs: Option<u64>,
        idle_timeout_secs: Option<u64>,
    ) -> Result<Self, PostgresError> {
        tracing::info!("Connecting to PostgreSQL");

        Self::new(
            url,
            max_connections.unwrap_or(10),
            min_connections.unwrap_or(1),
            Duration::from_secs(acquire_timeout_secs.unwrap_or(5)),
            Duration::from_secs(idle_timeout_secs.unwrap_or(600)),
        )
        .await
    }

    /// Profile of a user with their measurement set, if any
    pub async fn user_profile(&self, user_id: i64) -> Result<Option<UserProfile>, PostgresError> {
        let query = r#"
            SELECT u.id, u.name, u.latitude, u.longitude,
                   m.user_id AS measured_user,
                   m.shoulder_width, m.chest, m.waist, m.hip, m.inseam, m.shoe_size
            FROM users u
            LEFT JOIN user_measurements m ON m.user_id = u.id
            WHERE u.id = $1
        "#;

        let row = sqlx::query(query)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| {
            let measured: Option<i64> = row.get("measured_user");
            UserProfile {
                id: row.get("id"),
                name: row.get("name"),
                latitude: row.get("latitude"),
                longitude: row.get("longitude"),
                measurements: measured.map(|_| measurements_from_row(&row)),
            }
        }))
    }

    /// Insert or merge a user's measurement set
    ///
    /// Dimensions passed as `None` keep their stored value.
    pub async fn upsert_measurements(
        &self,
        user_id: i64,
        measurements: &Measurements,
    ) -> Result<Measurements, PostgresError> {
        let row = sqlx::query(UPSERT_MEASUREMENTS)
            .bind(user_id)
            .bind(measurements.shoulder_width)
            .bind(measurements.chest)
            .bind(measurements.waist)
            .bind(measurements.hip)
            .bind(measurements.inseam)
            .bind(measurements.shoe_size)
            .fetch_one(&self.pool)
            .await?;

        tracing::debug!("Updated measurements for user {}", user_id);

        Ok(measurements_from_row(&row))
    }

    /// Every available, not-in-use garment matching the search filters
    ///
    /// Ordering is left to the ranker, so the whole filtered set is loaded.
    pub async fn search_candidates(&self, filters: &SearchFilters) -> Result<Vec<Garment>, PostgresError> {
        let query = format!(
            r#"
            SELECT {GARMENT_COLUMNS}
            FROM clothing_items c
            JOIN users u ON u.id = c.owner_id
            WHERE c.is_available AND NOT c.in_use
              AND ($1::TEXT IS NULL OR c.category = $1)
              AND ($2::TEXT IS NULL OR c.gender = $2)
              AND ($3::DOUBLE PRECISION IS NULL OR c.price_per_day >= $3)
              AND ($4::DOUBLE PRECISION IS NULL OR c.price_per_day <= $4)
            "#
        );

        let rows = sqlx::query(&query)
            .bind(filters.category.as_deref())
            .bind(filters.gender.as_deref())
            .bind(filters.min_price)
            .bind(filters.max_price)
            .fetch_all(&self.pool)
            .await?;

        let garments: Vec<Garment> = rows.iter().map(garment_from_row).collect();
        tracing::debug!("Fetched {} search candidates", garments.len());

        Ok(garments)
    }

    /// Recommendation candidates for a requester
    ///
    /// Other users' available listings in the preferred categories (all
    /// categories when `categories` is empty) that are unrated or rated at
    /// least `min_rating`.
    pub async fn recommendation_candidates(
        &self,
        requester_id: i64,
        categories: &[String],
        min_rating: f64,
        fetch_limit: usize,
    ) -> Result<Vec<Garment>, PostgresError> {
        let query = format!(
            r#"
            SELECT {GARMENT_COLUMNS}
            FROM clothing_items c
            JOIN users u ON u.id = c.owner_id
            WHERE c.is_available AND NOT c.in_use
              AND c.owner_id <> $1
              AND (cardinality($2::TEXT[]) = 0 OR c.category = ANY($2))
              AND (c.rating IS NULL OR c.rating >= $3)
            ORDER BY c.created_at DESC
            LIMIT $4
            "#
        );

        let rows = sqlx::query(&query)
            .bind(requester_id)
            .bind(categories)
            .bind(min_rating)
            .bind(fetch_limit as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(garment_from_row).collect())
    }

    /// Categories the user favorited or rented
    pub async fn preferred_categories(&self, user_id: i64) -> Result<Vec<String>, PostgresError> {
        let query = r#"
            SELECT c.category
            FROM favorites f
            JOIN clothing_items c ON c.id = f.clothing_item_id
            WHERE f.user_id = $1
            UNION
            SELECT c.category
            FROM rentals r
            JOIN clothing_items c ON c.id = r.clothing_item_id
            WHERE r.renter_id = $1
        "#;

        let rows = sqlx::query(query).bind(user_id).fetch_all(&self.pool).await?;

        Ok(rows.iter().map(|row| row.get("category")).collect())
    }

    /// Available professionals with a workshop inside the bounding box
    pub async fn professionals_in_box(&self, bbox: &BoundingBox) -> Result<Vec<Professional>, PostgresError> {
        let query = r#"
            SELECT p.id, p.user_id, u.name, p.type, p.is_available, p.workshop_address,
                   p.workshop_latitude, p.workshop_longitude, p.rating
            FROM professionals p
            JOIN users u ON u.id = p.user_id
            WHERE p.is_available
              AND p.workshop_latitude BETWEEN $1 AND $2
              AND CASE WHEN $5
                       THEN p.workshop_longitude >= $3 OR p.workshop_longitude <= $4
                       ELSE p.workshop_longitude BETWEEN $3 AND $4
                  END
        "#;

        let rows = sqlx::query(query)
            .bind(bbox.min_lat)
            .bind(bbox.max_lat)
            .bind(bbox.min_lon)
            .bind(bbox.max_lon)
            .bind(bbox.crosses_antimeridian())
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| Professional {
                id: row.get("id"),
                user_id: row.get("user_id"),
                name: row.get("name"),
                kind: row.get("type"),
                is_available: row.get("is_available"),
                workshop_address: row.get("workshop_address"),
                workshop_latitude: row.get("workshop_latitude"),
                workshop_longitude: row.get("workshop_longitude"),
                rating: row.get("rating"),
            })
            .collect())
    }

    pub async fn professional_exists(&self, professional_id: i64) -> Result<bool, PostgresError> {
        let row = sqlx::query("SELECT EXISTS(SELECT 1 FROM professionals WHERE id = $1) AS present")
            .bind(professional_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.get("present"))
    }

    /// Negotiation by id, failing with `NotFound` when missing
    pub async fn require_negotiation(&self, negotiation_id: i64) -> Result<Negotiation, PostgresError> {
        self.negotiation(negotiation_id)
            .await?
            .ok_or_else(|| PostgresError::NotFound(format!("negotiation {}", negotiation_id)))
    }

    /// Append a message and bump the thread's `updated_at`
    pub async fn add_message(
        &self,
        negotiation_id: i64,
        sender_id: i64,
        message: &str,
    ) -> Result<NegotiationMessage, PostgresError> {
        let mut tx = self.pool.begin().await?;

        let insert = format!(
            r#"
            INSERT INTO negotiation_messages (negotiation_id, sender_id, message, is_read, created_at)
            VALUES ($1, $2, $3, FALSE, NOW())
            RETURNING {MESSAGE_COLUMNS}
            "#
        );

        let row = sqlx::query(&insert)
            .bind(negotiation_id)
            .bind(sender_id)
            .bind(message)
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query("UPDATE negotiations SET updated_at = NOW() WHERE id = $1")
            .bind(negotiation_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(message_from_row(&row))
    }

    /// Whole message thread, oldest first
    pub async fn messages(&self, negotiation_id: i64) -> Result<Vec<NegotiationMessage>, PostgresError> {
        let query = format!(
            r#"
            SELECT {MESSAGE_COLUMNS}
            FROM negotiation_messages
            WHERE negotiation_id = $1
            ORDER BY created_at ASC, id ASC
            "#
        );

        let rows = sqlx::query(&query)
            .bind(negotiation_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(message_from_row).collect())
    }

    /// Flag messages of one thread as read
    pub async fn mark_messages_read(&self, negotiation_id: i64, message_ids: &[i64]) -> Result<u64, PostgresError> {
        if message_ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(
            r#"
            UPDATE negotiation_messages
            SET is_read = TRUE
            WHERE negotiation_id = $1 AND id = ANY($2) AND NOT is_read
            "#,
        )
        .bind(negotiation_id)
        .bind(message_ids)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Negotiations a user takes part in, most recently active first
    ///
    /// `professional_id` is the user's professional profile, if any; threads
    /// they were assigned to as a professional are included too.
    pub async fn negotiations_for_user(
        &self,
        user_id: i64,
        professional_id: Option<i64>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<NegotiationSummary>, PostgresError> {
        let query = r#"
            SELECT n.id, n.clothing_item_id, n.initiator_id, n.recipient_id, n.professional_id,
                   n.professional_confirmed, n.type, n.status, n.proposed_price,
                   n.responded_at, n.closed_at, n.created_at, n.updated_at,
                   (SELECT COUNT(*)
                      FROM negotiation_messages u
                     WHERE u.negotiation_id = n.id AND u.sender_id <> $1 AND NOT u.is_read
                   ) AS unread_count,
                   lm.id AS last_id, lm.sender_id AS last_sender_id, lm.message AS last_message,
                   lm.is_read AS last_is_read, lm.created_at AS last_created_at
            FROM negotiations n
            LEFT JOIN LATERAL (
                SELECT id, sender_id, message, is_read, created_at
                FROM negotiation_messages
                WHERE negotiation_id = n.id
                ORDER BY created_at DESC, id DESC
                LIMIT 1
            ) lm ON TRUE
            WHERE n.initiator_id = $1
               OR n.recipient_id = $1
               OR ($2::BIGINT IS NOT NULL AND n.professional_id = $2)
            ORDER BY n.updated_at DESC, n.id DESC
            LIMIT $3 OFFSET $4
        "#;

        let rows = sqlx::query(query)
            .bind(user_id)
            .bind(professional_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let negotiation = negotiation_from_row(row);
                let last_id: Option<i64> = row.get("last_id");
                let last_message = last_id.map(|id| NegotiationMessage {
                    id,
                    negotiation_id: negotiation.id,
                    sender_id: row.get("last_sender_id"),
                    message: row.get("last_message"),
                    is_read: row.get("last_is_read"),
                    created_at: row.get("last_created_at"),
                });

                NegotiationSummary {
                    negotiation,
                    last_message,
                    unread_count: row.get("unread_count"),
                }
            })
            .collect())
    }

    /// Move an active negotiation to `status`
    ///
    /// Returns `None` when the negotiation stopped being active in the
    /// meantime, so a concurrent response cannot be overwritten.
    pub async fn respond(
        &self,
        negotiation_id: i64,
        status: NegotiationStatus,
    ) -> Result<Option<Negotiation>, PostgresError> {
        if !matches!(status, NegotiationStatus::Accepted | NegotiationStatus::Rejected) {
            return Err(PostgresError::InvalidInput(format!(
                "cannot respond with status {:?}",
                status
            )));
        }

        let query = format!(
            r#"
            UPDATE negotiations
            SET status = $2,
                responded_at = NOW(),
                closed_at = CASE WHEN $2 = 'rejected'::negotiation_status THEN NOW() ELSE closed_at END,
                updated_at = NOW()
            WHERE id = $1 AND status = 'active'
            RETURNING {NEGOTIATION_COLUMNS}
            "#
        );

        let row = sqlx::query(&query)
            .bind(negotiation_id)
            .bind(status)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(negotiation_from_row))
    }

    /// Assign a professional; a new assignment needs a new confirmation
    pub async fn assign_professional(
        &self,
        negotiation_id: i64,
        professional_id: i64,
    ) -> Result<Negotiation, PostgresError> {
        let query = format!(
            r#"
            UPDATE negotiations
            SET professional_id = $2, professional_confirmed = FALSE, updated_at = NOW()
            WHERE id = $1
            RETURNING {NEGOTIATION_COLUMNS}
            "#
        );

        let row = sqlx::query(&query)
            .bind(negotiation_id)
            .bind(professional_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| PostgresError::NotFound(format!("negotiation {}", negotiation_id)))?;

        Ok(negotiation_from_row(&row))
    }

    /// Confirm the assigned professional; `None` if already confirmed
    pub async fn confirm_professional(&self, negotiation_id: i64) -> Result<Option<Negotiation>, PostgresError> {
        let query = format!(
            r#"
            UPDATE negotiations
            SET professional_confirmed = TRUE, updated_at = NOW()
            WHERE id = $1 AND professional_id IS NOT NULL AND NOT professional_confirmed
            RETURNING {NEGOTIATION_COLUMNS}
            "#
        );

        let row = sqlx::query(&query)
            .bind(negotiation_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(negotiation_from_row))
    }

    /// All checkpoints of a negotiation in creation order
    pub async fn checkpoints(&self, negotiation_id: i64) -> Result<Vec<Checkpoint>, PostgresError> {
        self.checkpoints_after(negotiation_id, 0).await
    }

    /// Create the negotiation's checkpoint of `kind`, or return the existing one
    ///
    /// The flag is `true` when this call created the row. Concurrent callers
    /// meet on the `(negotiation_id, type)` key and the loser reads the
    /// winner's checkpoint.
    pub async fn create_checkpoint(
        &self,
        negotiation_id: i64,
        kind: CheckpointType,
        generated_by: i64,
    ) -> Result<(Checkpoint, bool), PostgresError> {
        let insert = format!(
            r#"
            INSERT INTO checkpoints (negotiation_id, type, qr_code, status, generated_by_user_id, created_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            ON CONFLICT (negotiation_id, type) DO NOTHING
            RETURNING {CHECKPOINT_COLUMNS}
            "#
        );

        let created = sqlx::query(&insert)
            .bind(negotiation_id)
            .bind(kind)
            .bind(Uuid::new_v4())
            .bind(CheckpointStatus::Pending)
            .bind(generated_by)
            .fetch_optional(&self.pool)
            .await?;

        if let Some(row) = created {
            tracing::debug!("Generated {} checkpoint for negotiation {}", kind, negotiation_id);
            return Ok((checkpoint_from_row(&row), true));
        }

        let select = format!(
            "SELECT {CHECKPOINT_COLUMNS} FROM checkpoints WHERE negotiation_id = $1 AND type = $2"
        );

        let row = sqlx::query(&select)
            .bind(negotiation_id)
            .bind(kind)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| {
                PostgresError::NotFound(format!("{} checkpoint of negotiation {}", kind, negotiation_id))
            })?;

        Ok((checkpoint_from_row(&row), false))
    }

    pub async fn checkpoint_by_token(&self, qr_code: Uuid) -> Result<Option<Checkpoint>, PostgresError> {
        let query = format!("SELECT {CHECKPOINT_COLUMNS} FROM checkpoints WHERE qr_code = $1");

        let row = sqlx::query(&query)
            .bind(qr_code)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(checkpoint_from_row))
    }

    /// Pending to scanned, at most once
    ///
    /// `None` means another scan won the race.
    pub async fn mark_scanned(
        &self,
        checkpoint_id: i64,
        scanned_by: i64,
        notes: Option<&str>,
    ) -> Result<Option<Checkpoint>, PostgresError> {
        let query = format!(
            r#"
            UPDATE checkpoints
            SET status = 'scanned', scanned_by_user_id = $2, scanned_at = NOW(), notes = $3
            WHERE id = $1 AND status = 'pending'
            RETURNING {CHECKPOINT_COLUMNS}
            "#
        );

        let row = sqlx::query(&query)
            .bind(checkpoint_id)
            .bind(scanned_by)
            .bind(notes)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(checkpoint_from_row))
    }

    /// Health check for the database connection
    pub async fn health_check(&self) -> Result<bool, PostgresError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| true)
            .map_err(Into::into)
    }
}

#[async_trait]
impl NegotiationStore for PostgresClient {
    async fn negotiation(&self, negotiation_id: i64) -> Result<Option<Negotiation>, PostgresError> {
        let query = format!("SELECT {NEGOTIATION_COLUMNS} FROM negotiations WHERE id = $1");

        let row = sqlx::query(&query)
            .bind(negotiation_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(negotiation_from_row))
    }

    async fn professional_id_for_user(&self, user_id: i64) -> Result<Option<i64>, PostgresError> {
        let row = sqlx::query("SELECT id FROM professionals WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| row.get("id")))
    }

    async fn checkpoints_after(
        &self,
        negotiation_id: i64,
        after_id: i64,
    ) -> Result<Vec<Checkpoint>, PostgresError> {
        let query = format!(
            r#"
            SELECT {CHECKPOINT_COLUMNS}
            FROM checkpoints
            WHERE negotiation_id = $1 AND id > $2
            ORDER BY id ASC
            "#
        );

        let rows = sqlx::query(&query)
            .bind(negotiation_id)
            .bind(after_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(checkpoint_from_row).collect())
    }
}
