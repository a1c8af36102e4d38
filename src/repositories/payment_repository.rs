//! Repository for payment claims and their ticket links

use crate::error::RepositoryError;
use crate::models::{Payment, PaymentStatus};
use sqlx::PgPool;
use uuid::Uuid;

pub struct PaymentRepository {
    pool: PgPool,
}

impl PaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a pending payment with its frozen financial figures
    pub async fn create(&self, payment: &Payment) -> Result<Payment, RepositoryError> {
        let created = sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments
                (id, raffle_id, email, quantity, reference, evidence_url, status,
                 method, document_id, state, phone, amount_local, rate_used)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING id, raffle_id, email, quantity, reference, evidence_url, status,
                      method, document_id, state, phone, amount_local, rate_used, created_at
            "#,
        )
        .bind(payment.id)
        .bind(payment.raffle_id)
        .bind(&payment.email)
        .bind(payment.quantity)
        .bind(&payment.reference)
        .bind(&payment.evidence_url)
        .bind(&payment.status)
        .bind(&payment.method)
        .bind(&payment.document_id)
        .bind(&payment.state)
        .bind(&payment.phone)
        .bind(payment.amount_local)
        .bind(payment.rate_used)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    /// Find a payment by UUID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>, RepositoryError> {
        let payment = sqlx::query_as::<_, Payment>(
            r#"
            SELECT id, raffle_id, email, quantity, reference, evidence_url, status,
                   method, document_id, state, phone, amount_local, rate_used, created_at
            FROM payments
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(payment)
    }

    /// Fetch payments by id
    pub async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Payment>, RepositoryError> {
        let payments = sqlx::query_as::<_, Payment>(
            r#"
            SELECT id, raffle_id, email, quantity, reference, evidence_url, status,
                   method, document_id, state, phone, amount_local, rate_used, created_at
            FROM payments
            WHERE id = ANY($1)
            ORDER BY created_at DESC
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(payments)
    }

    /// Link tickets to a payment through the join table
    pub async fn link_tickets(
        &self,
        payment_id: Uuid,
        ticket_ids: &[Uuid],
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO payment_tickets (payment_id, ticket_id)
            SELECT $1::uuid, t FROM UNNEST($2::uuid[]) AS t
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(payment_id)
        .bind(ticket_ids)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Ticket ids linked to a payment
    pub async fn linked_ticket_ids(&self, payment_id: Uuid) -> Result<Vec<Uuid>, RepositoryError> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT ticket_id FROM payment_tickets WHERE payment_id = $1
            "#,
        )
        .bind(payment_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    /// Payment ids linked to a ticket
    pub async fn payment_ids_for_ticket(
        &self,
        ticket_id: Uuid,
    ) -> Result<Vec<Uuid>, RepositoryError> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT payment_id FROM payment_tickets WHERE ticket_id = $1
            "#,
        )
        .bind(ticket_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    /// Set a payment's status, returning the updated row
    pub async fn set_status(
        &self,
        payment_id: Uuid,
        status: PaymentStatus,
    ) -> Result<Payment, RepositoryError> {
        let payment = sqlx::query_as::<_, Payment>(
            r#"
            UPDATE payments
            SET status = $2
            WHERE id = $1
            RETURNING id, raffle_id, email, quantity, reference, evidence_url, status,
                      method, document_id, state, phone, amount_local, rate_used, created_at
            "#,
        )
        .bind(payment_id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await?;

        payment.ok_or_else(|| RepositoryError::NotFound("Payment not found".to_string()))
    }

    /// Payment ids matching a buyer reference and/or email
    pub async fn find_ids_by_reference_or_email(
        &self,
        reference: Option<&str>,
        email: Option<&str>,
    ) -> Result<Vec<Uuid>, RepositoryError> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id FROM payments
            WHERE ($1::text IS NULL OR reference = $1)
              AND ($2::text IS NULL OR email = $2)
              AND ($1::text IS NOT NULL OR $2::text IS NOT NULL)
            "#,
        )
        .bind(reference)
        .bind(email)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    /// Ticket numbers linked to a payment, sorted ascending
    pub async fn linked_ticket_numbers(
        &self,
        payment_id: Uuid,
    ) -> Result<Vec<i64>, RepositoryError> {
        let numbers = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT t.ticket_number
            FROM payment_tickets pt
            JOIN tickets t ON t.id = pt.ticket_id
            WHERE pt.payment_id = $1
            ORDER BY t.ticket_number
            "#,
        )
        .bind(payment_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(numbers)
    }
}
