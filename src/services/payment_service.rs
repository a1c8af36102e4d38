//! Payment reconciliation: converts holds into durable payment claims
//! and resolves them on admin review.
//!
//! Financial figures are frozen at submission time: the applied rate and
//! the computed local-currency amount are stored on the payment row and
//! never recomputed, so later rate changes cannot alter a pending claim.

use crate::error::{AppError, AppResult};
use crate::masking::mask_email;
use crate::models::{BuyerInfo, Payment, PaymentStatus, Raffle};
use crate::money::{cents_to_usd, to_local, total_usd};
use crate::repositories::{PaymentRepository, TicketRepository};
use crate::services::rate_service::RateService;
use crate::services::reservation_service::{AllocationMode, ReservationService};
use chrono::{Duration, NaiveDateTime};
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

const DEFAULT_METHOD: &str = "pago_movil";

/// Submission receipt returned to the buyer
#[derive(Debug, Clone, serde::Serialize)]
pub struct PaymentReceipt {
    pub payment_id: Uuid,
    pub raffle_id: Uuid,
    pub status: String,
    pub amount_local: Decimal,
    pub rate_used: Decimal,
}

/// Result of an admin verification
#[derive(Debug, Clone)]
pub struct VerifiedPayment {
    pub payment: Payment,
    pub ticket_ids: Vec<Uuid>,
}

/// Price quote. Soft-fail: `error` is populated instead of returning
/// `Err`, so a display layer never breaks on an internal failure.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Quote {
    pub raffle_id: Option<Uuid>,
    pub method: String,
    pub unit_price_usd: Option<Decimal>,
    pub total_usd: Option<Decimal>,
    pub unit_price_local: Option<Decimal>,
    pub total_local: Option<Decimal>,
    pub error: Option<String>,
}

/// Public status-lookup row with the buyer email masked
#[derive(Debug, Clone, serde::Serialize)]
pub struct PaymentSummary {
    pub email_masked: String,
    pub reference: String,
    pub ticket_numbers: Vec<i64>,
    pub status: String,
    pub purchase_date: NaiveDateTime,
    pub amount_local: Decimal,
    pub rate_used: Decimal,
}

pub struct PaymentService {
    ticket_repo: Arc<TicketRepository>,
    payment_repo: Arc<PaymentRepository>,
    rate_service: Arc<RateService>,
    reservation_service: Arc<ReservationService>,
    reservation_minutes: i64,
}

impl PaymentService {
    pub fn new(
        ticket_repo: Arc<TicketRepository>,
        payment_repo: Arc<PaymentRepository>,
        rate_service: Arc<RateService>,
        reservation_service: Arc<ReservationService>,
        reservation_minutes: i64,
    ) -> Self {
        Self {
            ticket_repo,
            payment_repo,
            rate_service,
            reservation_service,
            reservation_minutes,
        }
    }

    fn validate_buyer(buyer: &BuyerInfo) -> AppResult<String> {
        let email = buyer.email_normalized();
        if email.is_empty() || !email.contains('@') {
            return Err(AppError::Validation("A valid buyer email is required".to_string()));
        }
        Ok(email)
    }

    /// Freeze the financial figures for `quantity` tickets of `raffle`
    /// at the current (stale-allowed) rate
    async fn frozen_figures(&self, raffle: &Raffle, quantity: i64) -> (Decimal, Decimal) {
        let total = total_usd(raffle.ticket_price_cents, quantity);
        let rate = self.rate_service.get_rate(true).await;
        (to_local(total, rate), rate)
    }

    /// Record a pending payment claim against tickets held under `hold_id`.
    ///
    /// Every referenced ticket must exist, belong to the raffle, be
    /// unverified, carry a live lease, and be stamped with the given hold
    /// token; any violation fails the whole submission.
    pub async fn submit(
        &self,
        raffle_id: Option<Uuid>,
        hold_id: &str,
        ticket_ids: &[Uuid],
        buyer: &BuyerInfo,
        reference: &str,
        evidence_url: Option<&str>,
        method: Option<&str>,
    ) -> AppResult<PaymentReceipt> {
        if ticket_ids.is_empty() {
            return Err(AppError::Validation(
                "Reserved tickets are required to record a payment".to_string(),
            ));
        }
        if hold_id.is_empty() {
            return Err(AppError::Validation("hold_id is required".to_string()));
        }
        if reference.trim().is_empty() {
            return Err(AppError::Validation("A payment reference is required".to_string()));
        }
        let email = Self::validate_buyer(buyer)?;

        let raffle = self.reservation_service.resolve_raffle(raffle_id).await?;
        let now = chrono::Utc::now().naive_utc();

        let ids: Vec<Uuid> = ticket_ids
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let tickets = self.ticket_repo.find_by_ids(&ids).await?;
        if tickets.len() != ids.len() {
            return Err(AppError::Validation("Some tickets do not exist".to_string()));
        }

        for ticket in &tickets {
            if ticket.raffle_id != raffle.id {
                return Err(AppError::Validation(
                    "Ticket does not belong to this raffle".to_string(),
                ));
            }
            if ticket.verified {
                return Err(AppError::Validation(
                    "Ticket is already verified (paid)".to_string(),
                ));
            }
            match ticket.reserved_until {
                Some(until) if until > now => {}
                _ => {
                    return Err(AppError::Validation(
                        "The ticket reservation has expired".to_string(),
                    ))
                }
            }
            if ticket.reserved_by.as_deref() != Some(hold_id) {
                return Err(AppError::Unavailable(
                    "Ticket is not held by this hold_id".to_string(),
                ));
            }
            if let Some(existing) = &ticket.email {
                if existing != &email {
                    return Err(AppError::Validation(
                        "The payment email does not match the reservation".to_string(),
                    ));
                }
            }
        }

        let quantity = ids.len() as i64;
        let (amount_local, rate_used) = self.frozen_figures(&raffle, quantity).await;

        let payment = self
            .insert_pending(
                &raffle,
                &email,
                quantity,
                reference,
                evidence_url,
                method,
                buyer,
                amount_local,
                rate_used,
            )
            .await?;

        self.payment_repo.link_tickets(payment.id, &ids).await?;

        // Hand the tickets to the buyer for the review window: hold token
        // cleared, email stamped, lease re-extended
        let review_until = now + Duration::minutes(self.reservation_minutes);
        self.ticket_repo
            .assign_to_buyer(&ids, &email, review_until)
            .await?;

        info!(
            "Payment {} recorded pending for raffle {} ({} tickets)",
            payment.id, raffle.id, quantity
        );
        Ok(PaymentReceipt {
            payment_id: payment.id,
            raffle_id: raffle.id,
            status: payment.status,
            amount_local,
            rate_used,
        })
    }

    /// Classic flow: reserve `quantity` fresh tickets and record the
    /// pending payment in one call. If the payment insert fails after the
    /// claim, the claimed tickets are released again (compensating
    /// release), leaving the store as if never attempted.
    pub async fn submit_with_auto_reserve(
        &self,
        raffle_id: Option<Uuid>,
        quantity: i64,
        buyer: &BuyerInfo,
        reference: &str,
        evidence_url: Option<&str>,
        method: Option<&str>,
    ) -> AppResult<PaymentReceipt> {
        if quantity < 1 {
            return Err(AppError::Validation("quantity must be >= 1".to_string()));
        }
        if reference.trim().is_empty() {
            return Err(AppError::Validation("A payment reference is required".to_string()));
        }
        let email = Self::validate_buyer(buyer)?;

        let raffle = self.reservation_service.resolve_raffle(raffle_id).await?;

        let hold = self
            .reservation_service
            .reserve(Some(raffle.id), AllocationMode::ByQuantity(quantity))
            .await?;
        let ids: Vec<Uuid> = hold.tickets.iter().map(|t| t.id).collect();

        let (amount_local, rate_used) = self.frozen_figures(&raffle, quantity).await;

        let payment = match self
            .insert_pending(
                &raffle,
                &email,
                quantity,
                reference,
                evidence_url,
                method,
                buyer,
                amount_local,
                rate_used,
            )
            .await
        {
            Ok(payment) => payment,
            Err(e) => {
                // Compensating release: no half-claimed state may survive
                if let Err(release_err) = self.ticket_repo.release(&ids).await {
                    warn!(
                        "Compensating release failed for hold {}: {}",
                        hold.hold_id, release_err
                    );
                }
                return Err(e);
            }
        };

        self.payment_repo.link_tickets(payment.id, &ids).await?;

        let review_until =
            chrono::Utc::now().naive_utc() + Duration::minutes(self.reservation_minutes);
        self.ticket_repo
            .assign_to_buyer(&ids, &email, review_until)
            .await?;

        Ok(PaymentReceipt {
            payment_id: payment.id,
            raffle_id: raffle.id,
            status: payment.status,
            amount_local,
            rate_used,
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn insert_pending(
        &self,
        raffle: &Raffle,
        email: &str,
        quantity: i64,
        reference: &str,
        evidence_url: Option<&str>,
        method: Option<&str>,
        buyer: &BuyerInfo,
        amount_local: Decimal,
        rate_used: Decimal,
    ) -> AppResult<Payment> {
        let payment = Payment {
            id: Uuid::new_v4(),
            raffle_id: raffle.id,
            email: email.to_string(),
            quantity,
            reference: reference.trim().to_string(),
            evidence_url: evidence_url.map(|s| s.to_string()),
            status: PaymentStatus::Pending.as_str().to_string(),
            method: method
                .map(|m| m.trim().to_lowercase())
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| DEFAULT_METHOD.to_string()),
            document_id: buyer.document_id.clone(),
            state: buyer.state.clone(),
            phone: buyer.phone.clone(),
            amount_local,
            rate_used,
            created_at: chrono::Utc::now().naive_utc(),
        };
        Ok(self.payment_repo.create(&payment).await?)
    }

    /// Admin resolution of a pending payment.
    ///
    /// Approving marks every linked ticket verified with the payment
    /// reference as proof; rejecting releases them back to free. The
    /// transition is terminal and idempotent-safe: a payment already
    /// resolved is returned unchanged.
    pub async fn verify(&self, payment_id: Uuid, approve: bool) -> AppResult<VerifiedPayment> {
        let payment = self
            .payment_repo
            .find_by_id(payment_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))?;

        let ticket_ids = self.payment_repo.linked_ticket_ids(payment_id).await?;

        if payment.is_terminal() {
            return Ok(VerifiedPayment { payment, ticket_ids });
        }

        if ticket_ids.is_empty() {
            return Err(AppError::NotFound(
                "Payment has no linked tickets".to_string(),
            ));
        }

        let status = if approve {
            self.ticket_repo
                .mark_verified(&ticket_ids, &payment.reference)
                .await?;
            PaymentStatus::Approved
        } else {
            self.ticket_repo.release(&ticket_ids).await?;
            PaymentStatus::Rejected
        };

        let payment = self.payment_repo.set_status(payment_id, status).await?;
        info!(
            "Payment {} {} ({} tickets)",
            payment_id,
            status.as_str(),
            ticket_ids.len()
        );
        Ok(VerifiedPayment { payment, ticket_ids })
    }

    /// Price quote for `quantity` tickets. Never returns `Err`: internal
    /// failures land in the `error` field so the caller's UI stays alive.
    pub async fn quote(
        &self,
        quantity: i64,
        raffle_id: Option<Uuid>,
        method: Option<&str>,
    ) -> Quote {
        let method = method
            .map(|m| m.trim().to_lowercase())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_METHOD.to_string());

        if quantity < 1 {
            return Quote {
                raffle_id: None,
                method,
                unit_price_usd: None,
                total_usd: None,
                unit_price_local: None,
                total_local: None,
                error: Some("quantity must be >= 1".to_string()),
            };
        }

        match self.quote_inner(quantity, raffle_id).await {
            Ok((rid, unit, total, unit_local, total_local)) => Quote {
                raffle_id: Some(rid),
                method,
                unit_price_usd: Some(unit),
                total_usd: Some(total),
                unit_price_local: Some(unit_local),
                total_local: Some(total_local),
                error: None,
            },
            Err(e) => Quote {
                raffle_id: None,
                method,
                unit_price_usd: None,
                total_usd: None,
                unit_price_local: None,
                total_local: None,
                error: Some(e.to_string()),
            },
        }
    }

    async fn quote_inner(
        &self,
        quantity: i64,
        raffle_id: Option<Uuid>,
    ) -> AppResult<(Uuid, Decimal, Decimal, Decimal, Decimal)> {
        let raffle = self.reservation_service.resolve_raffle(raffle_id).await?;
        let unit = cents_to_usd(raffle.ticket_price_cents);
        let total = total_usd(raffle.ticket_price_cents, quantity);
        let rate = self.rate_service.get_rate(true).await;
        Ok((
            raffle.id,
            unit,
            total,
            to_local(unit, rate),
            to_local(total, rate),
        ))
    }

    /// Public purchase-status lookup by ticket number, payment reference
    /// and/or buyer email. Emails in the result are always masked.
    pub async fn check_status(
        &self,
        ticket_number: Option<i64>,
        reference: Option<&str>,
        email: Option<&str>,
    ) -> AppResult<Vec<PaymentSummary>> {
        if ticket_number.is_none() && reference.is_none() && email.is_none() {
            return Err(AppError::Validation(
                "At least one search criterion is required".to_string(),
            ));
        }

        let mut payment_ids: BTreeSet<Uuid> = BTreeSet::new();

        if reference.is_some() || email.is_some() {
            let normalized = email.map(|e| e.trim().to_lowercase());
            let ids = self
                .payment_repo
                .find_ids_by_reference_or_email(reference, normalized.as_deref())
                .await?;
            payment_ids.extend(ids);
        }

        if let Some(number) = ticket_number {
            for ticket_id in self.ticket_repo.find_ids_by_number(number).await? {
                payment_ids.extend(self.payment_repo.payment_ids_for_ticket(ticket_id).await?);
            }
        }

        if payment_ids.is_empty() {
            return Ok(vec![]);
        }

        let ids: Vec<Uuid> = payment_ids.into_iter().collect();
        let payments = self.payment_repo.find_by_ids(&ids).await?;

        let mut summaries = Vec::with_capacity(payments.len());
        for payment in payments {
            let numbers = self.payment_repo.linked_ticket_numbers(payment.id).await?;
            summaries.push(PaymentSummary {
                email_masked: mask_email(&payment.email),
                reference: payment.reference,
                ticket_numbers: numbers,
                status: payment.status,
                purchase_date: payment.created_at,
                amount_local: payment.amount_local,
                rate_used: payment.rate_used,
            });
        }
        Ok(summaries)
    }
}
