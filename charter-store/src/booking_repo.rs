use async_trait::async_trait;
use charter_booking::{
    Booking, BookingFilter, BookingRepository, BookingUpdate, CommittedTransition, Route,
    TransitionCommit,
};
use charter_core::{CoreError, CoreResult};
use charter_shared::{CurrencyCode, Decimal};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::storage_err;
use crate::notification_repo::insert_notification_tx;

pub struct StoreBookingRepository {
    pool: PgPool,
}

impl StoreBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const BOOKING_COLUMNS: &str = "id, user_id, status, origin, destination, departure_date, return_date, \
     passengers, aircraft_type, final_price, currency, admin_notes, cancellation_reason, \
     created_at, updated_at";

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    user_id: Uuid,
    status: String,
    origin: String,
    destination: String,
    departure_date: NaiveDate,
    return_date: Option<NaiveDate>,
    passengers: i32,
    aircraft_type: String,
    final_price: Option<Decimal>,
    currency: String,
    admin_notes: Option<String>,
    cancellation_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = CoreError;

    fn try_from(row: BookingRow) -> CoreResult<Self> {
        Ok(Booking {
            id: row.id,
            user_id: row.user_id,
            status: row.status.parse()?,
            route: Route {
                origin: row.origin,
                destination: row.destination,
            },
            departure_date: row.departure_date,
            return_date: row.return_date,
            passengers: u32::try_from(row.passengers)
                .map_err(|_| CoreError::storage(format!("negative passengers on {}", row.id)))?,
            aircraft_type: row.aircraft_type,
            final_price: row.final_price,
            currency: CurrencyCode::new(row.currency.trim())?,
            admin_notes: row.admin_notes,
            cancellation_reason: row.cancellation_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct UpdateRow {
    id: Uuid,
    booking_id: Uuid,
    status: String,
    message: String,
    actor_id: Uuid,
    created_at: DateTime<Utc>,
}

impl TryFrom<UpdateRow> for BookingUpdate {
    type Error = CoreError;

    fn try_from(row: UpdateRow) -> CoreResult<Self> {
        Ok(BookingUpdate {
            id: row.id,
            booking_id: row.booking_id,
            status: row.status.parse()?,
            message: row.message,
            actor_id: row.actor_id,
            created_at: row.created_at,
        })
    }
}

async fn insert_update<'e, E>(executor: E, update: &BookingUpdate) -> CoreResult<()>
where
    E: sqlx::Executor<'e, Database = sqlx::Postgres>,
{
    sqlx::query(
        r#"
        INSERT INTO booking_updates (id, booking_id, status, message, actor_id, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(update.id)
    .bind(update.booking_id)
    .bind(update.status.as_str())
    .bind(&update.message)
    .bind(update.actor_id)
    .bind(update.created_at)
    .execute(executor)
    .await
    .map_err(storage_err)?;
    Ok(())
}

#[async_trait]
impl BookingRepository for StoreBookingRepository {
    async fn insert_booking(&self, booking: Booking) -> CoreResult<Booking> {
        let passengers = i32::try_from(booking.passengers).map_err(|_| {
            CoreError::ValidationError(format!("{} passengers is out of range", booking.passengers))
        })?;
        sqlx::query(
            r#"
            INSERT INTO bookings (id, user_id, status, origin, destination, departure_date, return_date,
                                  passengers, aircraft_type, final_price, currency, admin_notes,
                                  cancellation_reason, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(booking.id)
        .bind(booking.user_id)
        .bind(booking.status.as_str())
        .bind(&booking.route.origin)
        .bind(&booking.route.destination)
        .bind(booking.departure_date)
        .bind(booking.return_date)
        .bind(passengers)
        .bind(&booking.aircraft_type)
        .bind(booking.final_price)
        .bind(booking.currency.as_str())
        .bind(&booking.admin_notes)
        .bind(&booking.cancellation_reason)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(booking)
    }

    async fn get_booking(&self, id: Uuid) -> CoreResult<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE id = $1",
            BOOKING_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        row.map(Booking::try_from).transpose()
    }

    async fn list_bookings(&self, filter: &BookingFilter) -> CoreResult<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            r#"
            SELECT {} FROM bookings
            WHERE ($1::TEXT IS NULL OR status = $1)
              AND ($2::UUID IS NULL OR user_id = $2)
            ORDER BY created_at DESC, id DESC
            "#,
            BOOKING_COLUMNS
        ))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        rows.into_iter().map(Booking::try_from).collect()
    }

    async fn apply_transition(&self, commit: TransitionCommit) -> CoreResult<CommittedTransition> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;
        let booking = &commit.booking;

        // 1. Conditional update; zero rows means the status moved or the row is gone
        let updated = sqlx::query(
            r#"
            UPDATE bookings
            SET status = $1, final_price = $2, currency = $3, admin_notes = $4,
                cancellation_reason = $5, updated_at = $6
            WHERE id = $7 AND status = $8
            "#,
        )
        .bind(booking.status.as_str())
        .bind(booking.final_price)
        .bind(booking.currency.as_str())
        .bind(&booking.admin_notes)
        .bind(&booking.cancellation_reason)
        .bind(booking.updated_at)
        .bind(booking.id)
        .bind(commit.expected.as_str())
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?;

        if updated.rows_affected() == 0 {
            let actual: Option<String> =
                sqlx::query_scalar("SELECT status FROM bookings WHERE id = $1")
                    .bind(booking.id)
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(storage_err)?;
            return Err(match actual {
                Some(actual) => CoreError::ConcurrentModification {
                    expected: commit.expected.to_string(),
                    actual,
                },
                None => CoreError::NotFound(format!("booking {}", booking.id)),
            });
        }

        // 2. Audit entry
        insert_update(&mut *tx, &commit.update).await?;

        // 3. Notification, deduplicated on its key
        let (notification, notification_created) =
            insert_notification_tx(&mut tx, commit.notification).await?;

        tx.commit().await.map_err(storage_err)?;

        Ok(CommittedTransition {
            booking: commit.booking,
            update: commit.update,
            notification,
            notification_created,
        })
    }

    async fn booking_history(&self, booking_id: Uuid) -> CoreResult<Vec<BookingUpdate>> {
        let rows = sqlx::query_as::<_, UpdateRow>(
            r#"
            SELECT id, booking_id, status, message, actor_id, created_at
            FROM booking_updates WHERE booking_id = $1 ORDER BY seq
            "#,
        )
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        rows.into_iter().map(BookingUpdate::try_from).collect()
    }

    async fn append_update(&self, update: BookingUpdate) -> CoreResult<BookingUpdate> {
        insert_update(&self.pool, &update).await?;
        Ok(update)
    }
}
