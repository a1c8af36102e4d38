//! Reservation engine: atomically grants time-boxed holds over ticket slots.
//!
//! There is no in-process mutual exclusion; correctness under concurrent
//! reservations rests on conditional claims against the store plus a
//! post-claim count check. A short claim is rolled back and retried once,
//! never returned as a partial hold.

use crate::error::{AppError, AppResult};
use crate::models::{Raffle, Ticket};
use crate::money::round2;
use crate::repositories::{RaffleRepository, TicketRepository};
use crate::retry::with_retries;
use chrono::{Duration, NaiveDateTime};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// How a reservation call selects its tickets; modes are mutually exclusive
#[derive(Debug, Clone)]
pub enum AllocationMode {
    /// Claim specific already-existing rows
    ByIds(Vec<Uuid>),
    /// Claim specific numbers, creating missing rows on demand
    ByNumbers(Vec<i64>),
    /// Claim N randomly sampled free numbers
    ByQuantity(i64),
}

/// A granted hold: the opaque token plus the captured tickets
#[derive(Debug, Clone)]
pub struct Hold {
    pub hold_id: String,
    pub tickets: Vec<Ticket>,
}

/// Inventory snapshot for a raffle
#[derive(Debug, Clone, serde::Serialize)]
pub struct Progress {
    pub total: i64,
    pub sold: i64,
    pub reserved: i64,
    pub remaining: Option<i64>,
    pub percent_sold: Option<Decimal>,
    pub percent_available: Option<Decimal>,
}

pub struct ReservationService {
    raffle_repo: Arc<RaffleRepository>,
    ticket_repo: Arc<TicketRepository>,
    reservation_minutes: i64,
}

impl ReservationService {
    pub fn new(
        raffle_repo: Arc<RaffleRepository>,
        ticket_repo: Arc<TicketRepository>,
        reservation_minutes: i64,
    ) -> Self {
        Self {
            raffle_repo,
            ticket_repo,
            reservation_minutes,
        }
    }

    /// Resolve the target raffle: an explicit id must exist and be open
    /// for sales; otherwise the most recently opened raffle is used.
    pub async fn resolve_raffle(&self, raffle_id: Option<Uuid>) -> AppResult<Raffle> {
        let raffle = match raffle_id {
            Some(id) => self.raffle_repo.find_by_id(id).await.map_err(AppError::from)?,
            None => self
                .raffle_repo
                .find_current_open()
                .await
                .map_err(AppError::from)?,
        };

        match raffle {
            Some(r) if r.is_sales_open() => Ok(r),
            _ => Err(AppError::NoActiveRaffle),
        }
    }

    /// Capacity from raffle configuration; unset capacity blocks all
    /// reservation attempts
    fn capacity_of(raffle: &Raffle) -> AppResult<i64> {
        raffle
            .checked_capacity()
            .ok_or_else(|| AppError::Config("Raffle capacity is not configured".to_string()))
    }

    /// Enforce `count_paid + count_active_holds + extra <= capacity`
    async fn check_capacity(
        &self,
        raffle_id: Uuid,
        capacity: i64,
        extra: i64,
        now: NaiveDateTime,
    ) -> AppResult<()> {
        let sold = self.ticket_repo.count_paid(raffle_id).await?;
        let held = self.ticket_repo.count_active_holds(raffle_id, now).await?;
        if sold + held + extra > capacity {
            return Err(AppError::InsufficientCapacity(format!(
                "{} requested, {} available",
                extra,
                (capacity - sold - held).max(0)
            )));
        }
        Ok(())
    }

    /// Grant a hold over ticket slots for the configured lease window.
    ///
    /// All modes are all-or-nothing: a claim that captures fewer rows
    /// than requested is released and the call fails.
    pub async fn reserve(&self, raffle_id: Option<Uuid>, mode: AllocationMode) -> AppResult<Hold> {
        let raffle = self.resolve_raffle(raffle_id).await?;
        let capacity = Self::capacity_of(&raffle)?;

        let now = chrono::Utc::now().naive_utc();
        // Clear abandoned holds so they cannot cause phantom scarcity.
        // Cleanup failures must not block the reservation itself.
        if let Err(e) = self.ticket_repo.release_expired(raffle.id, now).await {
            warn!("Expired-reservation cleanup failed: {}", e);
        }

        let hold_id = Uuid::new_v4().to_string();
        let until = now + Duration::minutes(self.reservation_minutes);

        let tickets = match mode {
            AllocationMode::ByIds(ids) => {
                self.reserve_by_ids(&raffle, capacity, ids, &hold_id, until, now)
                    .await?
            }
            AllocationMode::ByNumbers(numbers) => {
                self.reserve_by_numbers(&raffle, capacity, numbers, &hold_id, until, now)
                    .await?
            }
            AllocationMode::ByQuantity(quantity) => {
                self.reserve_by_quantity(&raffle, capacity, quantity, &hold_id, until, now)
                    .await?
            }
        };

        info!(
            "Reserved {} ticket(s) for raffle {} under hold {}",
            tickets.len(),
            raffle.id,
            hold_id
        );
        Ok(Hold { hold_id, tickets })
    }

    /// Mode 1: explicit existing rows. No best-effort partial grant.
    async fn reserve_by_ids(
        &self,
        raffle: &Raffle,
        capacity: i64,
        ids: Vec<Uuid>,
        hold_id: &str,
        until: NaiveDateTime,
        now: NaiveDateTime,
    ) -> AppResult<Vec<Ticket>> {
        let ids: Vec<Uuid> = ids.into_iter().collect::<BTreeSet<_>>().into_iter().collect();
        if ids.is_empty() {
            return Err(AppError::Validation("ticket_ids must not be empty".to_string()));
        }

        self.check_capacity(raffle.id, capacity, ids.len() as i64, now)
            .await?;

        self.ticket_repo
            .claim_by_ids(raffle.id, &ids, hold_id, until, now)
            .await?;

        let claimed = self.ticket_repo.find_claimed(raffle.id, hold_id, now).await?;
        if claimed.len() != ids.len() {
            self.rollback_claim(&claimed).await;
            return Err(AppError::Unavailable(
                "Some tickets are no longer available".to_string(),
            ));
        }
        Ok(claimed)
    }

    /// Mode 2: explicit numbers; missing rows are created on demand.
    /// A creation attempt that loses to a concurrent creator falls back
    /// to claiming the now-existing row if still free.
    async fn reserve_by_numbers(
        &self,
        raffle: &Raffle,
        capacity: i64,
        numbers: Vec<i64>,
        hold_id: &str,
        until: NaiveDateTime,
        now: NaiveDateTime,
    ) -> AppResult<Vec<Ticket>> {
        let numbers: BTreeSet<i64> = numbers.into_iter().filter(|n| *n > 0).collect();
        if numbers.is_empty() {
            return Err(AppError::Validation("ticket_numbers must not be empty".to_string()));
        }
        if let Some(max) = numbers.iter().max() {
            if *max > capacity {
                return Err(AppError::Validation(format!(
                    "Ticket number {} exceeds capacity {}",
                    max, capacity
                )));
            }
        }
        let numbers: Vec<i64> = numbers.into_iter().collect();

        self.check_capacity(raffle.id, capacity, numbers.len() as i64, now)
            .await?;

        // Claim whichever of the requested numbers already exist and are free
        self.ticket_repo
            .claim_by_numbers(raffle.id, &numbers, hold_id, until, now)
            .await?;

        let claimed = self.ticket_repo.find_claimed(raffle.id, hold_id, now).await?;
        let claimed_numbers: BTreeSet<i64> = claimed.iter().map(|t| t.ticket_number).collect();

        // Create the missing rows, already stamped with this hold
        for number in numbers.iter().filter(|n| !claimed_numbers.contains(n)) {
            match self
                .ticket_repo
                .insert_numbered(raffle.id, *number, hold_id, until)
                .await
            {
                Ok(_) => {}
                Err(e) if e.is_duplicate() => {
                    // Lost the creation race; claim the row if still free
                    self.ticket_repo
                        .claim_by_numbers(raffle.id, &[*number], hold_id, until, now)
                        .await?;
                }
                Err(e) => {
                    let claimed = self.ticket_repo.find_claimed(raffle.id, hold_id, now).await?;
                    self.rollback_claim(&claimed).await;
                    return Err(e.into());
                }
            }
        }

        let claimed = self.ticket_repo.find_claimed(raffle.id, hold_id, now).await?;
        if claimed.len() != numbers.len() {
            let missing: Vec<i64> = {
                let got: BTreeSet<i64> = claimed.iter().map(|t| t.ticket_number).collect();
                numbers.iter().filter(|n| !got.contains(n)).copied().collect()
            };
            self.rollback_claim(&claimed).await;
            return Err(AppError::Unavailable(format!(
                "Ticket(s) {:?} no longer available",
                missing
            )));
        }
        Ok(claimed)
    }

    /// Mode 3: N randomly sampled free numbers. The conditional claim is
    /// re-validated by count; a short claim is rolled back and the whole
    /// allocation retried once before surfacing a capacity failure.
    async fn reserve_by_quantity(
        &self,
        raffle: &Raffle,
        capacity: i64,
        quantity: i64,
        hold_id: &str,
        until: NaiveDateTime,
        now: NaiveDateTime,
    ) -> AppResult<Vec<Ticket>> {
        if quantity < 1 {
            return Err(AppError::Validation("quantity must be >= 1".to_string()));
        }
        self.check_capacity(raffle.id, capacity, quantity, now).await?;

        let result = with_retries(2, std::time::Duration::from_millis(80), || {
            self.try_claim_quantity(raffle.id, capacity, quantity, hold_id, until, now)
        })
        .await;

        match result {
            Ok(tickets) => Ok(tickets),
            Err(e @ AppError::InsufficientCapacity(_)) => Err(e),
            Err(_) => Err(AppError::InsufficientCapacity(
                "Could not reserve the requested tickets, try again shortly".to_string(),
            )),
        }
    }

    /// One attempt of the quantity allocation: compute the free set,
    /// sample, upsert placeholders, claim, verify the captured count.
    async fn try_claim_quantity(
        &self,
        raffle_id: Uuid,
        capacity: i64,
        quantity: i64,
        hold_id: &str,
        until: NaiveDateTime,
        now: NaiveDateTime,
    ) -> AppResult<Vec<Ticket>> {
        let slots = self.ticket_repo.slot_states(raffle_id).await?;

        // Taken = verified or lease still live. Conservative: only a row
        // known to be free counts as free.
        let taken: BTreeSet<i64> = slots
            .iter()
            .filter(|s| s.verified || matches!(s.reserved_until, Some(u) if u > now))
            .map(|s| s.ticket_number)
            .collect();

        let mut free: Vec<i64> = (1..=capacity).filter(|n| !taken.contains(n)).collect();
        if (free.len() as i64) < quantity {
            return Err(AppError::InsufficientCapacity(format!(
                "{} requested, {} free",
                quantity,
                free.len()
            )));
        }

        let mut target: Vec<i64> = {
            let mut rng = rand::rngs::StdRng::from_entropy();
            free.shuffle(&mut rng);
            free.truncate(quantity as usize);
            free
        };
        target.sort_unstable();

        self.ticket_repo.upsert_placeholders(raffle_id, &target).await?;
        self.ticket_repo
            .claim_by_numbers(raffle_id, &target, hold_id, until, now)
            .await?;

        let claimed = self.ticket_repo.find_claimed(raffle_id, hold_id, now).await?;
        if (claimed.len() as i64) < quantity {
            // Another hold won part of the sample; start over cleanly
            self.rollback_claim(&claimed).await;
            return Err(AppError::Unavailable("claim incomplete".to_string()));
        }
        Ok(claimed)
    }

    /// Undo a partial claim so the store is indistinguishable from
    /// "never attempted". Best effort: leftover rows expire via lease.
    async fn rollback_claim(&self, claimed: &[Ticket]) {
        if claimed.is_empty() {
            return;
        }
        let ids: Vec<Uuid> = claimed.iter().map(|t| t.id).collect();
        if let Err(e) = self.ticket_repo.release(&ids).await {
            warn!("Failed to roll back partial claim of {} tickets: {}", ids.len(), e);
        }
    }

    /// Caller-facing release of held tickets (verified rows untouched)
    pub async fn release(&self, ticket_ids: &[Uuid]) -> AppResult<u64> {
        if ticket_ids.is_empty() {
            return Err(AppError::Validation("ticket_ids required".to_string()));
        }
        Ok(self.ticket_repo.release(ticket_ids).await?)
    }

    /// Inventory snapshot: totals, live holds, and sale percentages
    pub async fn progress(&self, raffle_id: Option<Uuid>) -> AppResult<Progress> {
        let raffle = match raffle_id {
            Some(id) => self
                .raffle_repo
                .find_by_id(id)
                .await
                .map_err(AppError::from)?
                .ok_or_else(|| AppError::NotFound("Raffle not found".to_string()))?,
            None => self
                .raffle_repo
                .find_current_open()
                .await
                .map_err(AppError::from)?
                .ok_or(AppError::NoActiveRaffle)?,
        };

        let now = chrono::Utc::now().naive_utc();
        let total = raffle.checked_capacity().unwrap_or(0);
        let sold = self.ticket_repo.count_paid(raffle.id).await?;
        let reserved = self.ticket_repo.count_active_holds(raffle.id, now).await?;

        let (remaining, percent_sold, percent_available) = if total > 0 {
            let remaining = (total - sold - reserved).max(0);
            let hundred = Decimal::from(100);
            let percent_sold = round2(Decimal::from(sold) * hundred / Decimal::from(total));
            let percent_available =
                round2(Decimal::from(remaining) * hundred / Decimal::from(total));
            (Some(remaining), Some(percent_sold), Some(percent_available))
        } else {
            (None, None, None)
        };

        Ok(Progress {
            total,
            sold,
            reserved,
            remaining,
            percent_sold,
            percent_available,
        })
    }
}
