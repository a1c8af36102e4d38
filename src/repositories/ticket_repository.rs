//! Repository for ticket inventory operations.
//!
//! All state transitions are conditional, filtered updates so that
//! concurrent claims against the shared store race safely: a claim only
//! lands on rows that are still free, and callers re-verify the claimed
//! count afterwards.

use crate::error::RepositoryError;
use crate::models::Ticket;
use chrono::NaiveDateTime;
use sqlx::PgPool;
use uuid::Uuid;

/// Per-number slot state used to compute the free set
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TicketSlot {
    pub ticket_number: i64,
    pub verified: bool,
    pub reserved_until: Option<NaiveDateTime>,
}

pub struct TicketRepository {
    pool: PgPool,
}

impl TicketRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Inventory counts
    // =========================================================================

    /// Count verified (paid and confirmed) tickets
    pub async fn count_paid(&self, raffle_id: Uuid) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM tickets
            WHERE raffle_id = $1 AND verified = TRUE
            "#,
        )
        .bind(raffle_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Count live holds: unverified tickets with a lease expiring in the future.
    /// A NULL lease counts as free.
    pub async fn count_active_holds(
        &self,
        raffle_id: Uuid,
        now: NaiveDateTime,
    ) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM tickets
            WHERE raffle_id = $1 AND verified = FALSE AND reserved_until > $2
            "#,
        )
        .bind(raffle_id)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Release expired reservations back into the free pool.
    /// Idempotent; returns the number of rows released.
    pub async fn release_expired(
        &self,
        raffle_id: Uuid,
        now: NaiveDateTime,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE tickets
            SET reserved_until = NULL, reserved_by = NULL, email = NULL
            WHERE raffle_id = $1
              AND verified = FALSE
              AND reserved_until IS NOT NULL
              AND reserved_until < $2
            "#,
        )
        .bind(raffle_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    // =========================================================================
    // Conditional claims
    // =========================================================================

    /// Claim specific existing tickets by id for a hold.
    /// Only rows that are still free take the claim; returns rows affected.
    pub async fn claim_by_ids(
        &self,
        raffle_id: Uuid,
        ticket_ids: &[Uuid],
        hold: &str,
        until: NaiveDateTime,
        now: NaiveDateTime,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE tickets
            SET reserved_until = $4, reserved_by = $5
            WHERE id = ANY($2)
              AND raffle_id = $1
              AND verified = FALSE
              AND (reserved_until IS NULL OR reserved_until < $3)
            "#,
        )
        .bind(raffle_id)
        .bind(ticket_ids)
        .bind(now)
        .bind(until)
        .bind(hold)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Claim specific existing tickets by number for a hold
    pub async fn claim_by_numbers(
        &self,
        raffle_id: Uuid,
        numbers: &[i64],
        hold: &str,
        until: NaiveDateTime,
        now: NaiveDateTime,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE tickets
            SET reserved_until = $4, reserved_by = $5
            WHERE ticket_number = ANY($2)
              AND raffle_id = $1
              AND verified = FALSE
              AND (reserved_until IS NULL OR reserved_until < $3)
            "#,
        )
        .bind(raffle_id)
        .bind(numbers)
        .bind(now)
        .bind(until)
        .bind(hold)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Fetch the rows a hold actually captured (post-claim verification)
    pub async fn find_claimed(
        &self,
        raffle_id: Uuid,
        hold: &str,
        now: NaiveDateTime,
    ) -> Result<Vec<Ticket>, RepositoryError> {
        let tickets = sqlx::query_as::<_, Ticket>(
            r#"
            SELECT id, raffle_id, ticket_number, verified, reserved_until,
                   reserved_by, email, reference, created_at
            FROM tickets
            WHERE raffle_id = $1
              AND reserved_by = $2
              AND verified = FALSE
              AND reserved_until > $3
            ORDER BY ticket_number
            "#,
        )
        .bind(raffle_id)
        .bind(hold)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(tickets)
    }

    /// Create a numbered row already claimed by a hold.
    /// Loses with `RepositoryError::Duplicate` when a concurrent creator
    /// inserted the same number first.
    pub async fn insert_numbered(
        &self,
        raffle_id: Uuid,
        number: i64,
        hold: &str,
        until: NaiveDateTime,
    ) -> Result<Ticket, RepositoryError> {
        let ticket = sqlx::query_as::<_, Ticket>(
            r#"
            INSERT INTO tickets (raffle_id, ticket_number, verified, reserved_until, reserved_by)
            VALUES ($1, $2, FALSE, $3, $4)
            RETURNING id, raffle_id, ticket_number, verified, reserved_until,
                      reserved_by, email, reference, created_at
            "#,
        )
        .bind(raffle_id)
        .bind(number)
        .bind(until)
        .bind(hold)
        .fetch_one(&self.pool)
        .await?;

        Ok(ticket)
    }

    /// Ensure unclaimed placeholder rows exist for the given numbers.
    /// Existing rows are left untouched.
    pub async fn upsert_placeholders(
        &self,
        raffle_id: Uuid,
        numbers: &[i64],
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO tickets (raffle_id, ticket_number, verified)
            SELECT $1::uuid, n, FALSE FROM UNNEST($2::bigint[]) AS n
            ON CONFLICT (raffle_id, ticket_number) DO NOTHING
            "#,
        )
        .bind(raffle_id)
        .bind(numbers)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // =========================================================================
    // State transitions
    // =========================================================================

    /// Clear reservation fields on unverified tickets (caller-facing release)
    pub async fn release(&self, ticket_ids: &[Uuid]) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE tickets
            SET reserved_until = NULL, reserved_by = NULL, email = NULL
            WHERE id = ANY($1) AND verified = FALSE
            "#,
        )
        .bind(ticket_ids)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Mark tickets sold: verified with the payment reference as proof,
    /// reservation fields cleared
    pub async fn mark_verified(
        &self,
        ticket_ids: &[Uuid],
        reference: &str,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE tickets
            SET verified = TRUE, reference = $2, reserved_until = NULL, reserved_by = NULL
            WHERE id = ANY($1)
            "#,
        )
        .bind(ticket_ids)
        .bind(reference)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Hand claimed tickets over to a buyer under admin review: clear the
    /// hold token, stamp the buyer email, and re-extend the lease window
    pub async fn assign_to_buyer(
        &self,
        ticket_ids: &[Uuid],
        email: &str,
        until: NaiveDateTime,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE tickets
            SET reserved_until = $3, email = $2, reserved_by = NULL
            WHERE id = ANY($1) AND verified = FALSE
            "#,
        )
        .bind(ticket_ids)
        .bind(email)
        .bind(until)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    /// Fetch tickets by id
    pub async fn find_by_ids(&self, ticket_ids: &[Uuid]) -> Result<Vec<Ticket>, RepositoryError> {
        let tickets = sqlx::query_as::<_, Ticket>(
            r#"
            SELECT id, raffle_id, ticket_number, verified, reserved_until,
                   reserved_by, email, reference, created_at
            FROM tickets
            WHERE id = ANY($1)
            ORDER BY ticket_number
            "#,
        )
        .bind(ticket_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(tickets)
    }

    /// Per-number slot state for every existing row of a raffle
    pub async fn slot_states(&self, raffle_id: Uuid) -> Result<Vec<TicketSlot>, RepositoryError> {
        let slots = sqlx::query_as::<_, TicketSlot>(
            r#"
            SELECT ticket_number, verified, reserved_until
            FROM tickets
            WHERE raffle_id = $1
            "#,
        )
        .bind(raffle_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(slots)
    }

    /// Verified tickets ordered by ticket number (the draw pool)
    pub async fn find_verified(&self, raffle_id: Uuid) -> Result<Vec<Ticket>, RepositoryError> {
        let tickets = sqlx::query_as::<_, Ticket>(
            r#"
            SELECT id, raffle_id, ticket_number, verified, reserved_until,
                   reserved_by, email, reference, created_at
            FROM tickets
            WHERE raffle_id = $1 AND verified = TRUE
            ORDER BY ticket_number
            "#,
        )
        .bind(raffle_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(tickets)
    }

    /// Ticket ids carrying a given number, across raffles (status lookup)
    pub async fn find_ids_by_number(&self, number: i64) -> Result<Vec<Uuid>, RepositoryError> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id FROM tickets WHERE ticket_number = $1
            "#,
        )
        .bind(number)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}
