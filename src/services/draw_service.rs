//! Draw engine: randomized winner selection over verified-paid tickets.
//!
//! Selection is seedable for reproducibility. Winner rows are an
//! append-only audit trail; repeated picks against the same draw add
//! further rounds instead of replacing earlier ones.

use crate::error::{AppError, AppResult};
use crate::masking::mask_email;
use crate::models::Ticket;
use crate::repositories::{DrawRepository, RaffleRepository, TicketRepository};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// One selected winner as returned to the caller (email masked)
#[derive(Debug, Clone, serde::Serialize)]
pub struct DrawnWinner {
    pub winner_id: Uuid,
    pub position: i32,
    pub ticket_id: Uuid,
    pub ticket_number: i64,
    pub email_masked: String,
}

pub struct DrawService {
    raffle_repo: Arc<RaffleRepository>,
    ticket_repo: Arc<TicketRepository>,
    draw_repo: Arc<DrawRepository>,
}

impl DrawService {
    pub fn new(
        raffle_repo: Arc<RaffleRepository>,
        ticket_repo: Arc<TicketRepository>,
        draw_repo: Arc<DrawRepository>,
    ) -> Self {
        Self {
            raffle_repo,
            ticket_repo,
            draw_repo,
        }
    }

    /// Start a drawing session for a raffle (the current open one when
    /// no id is given). No side effects on tickets.
    pub async fn start_draw(&self, raffle_id: Option<Uuid>, seed: Option<i64>) -> AppResult<Uuid> {
        let raffle = match raffle_id {
            Some(id) => self
                .raffle_repo
                .find_by_id(id)
                .await?
                .ok_or_else(|| AppError::NotFound("Raffle not found".to_string()))?,
            None => self
                .raffle_repo
                .find_current_open()
                .await?
                .ok_or(AppError::NoActiveRaffle)?,
        };

        let draw = self.draw_repo.create(raffle.id, seed).await?;
        info!("Draw {} started for raffle {}", draw.id, raffle.id);
        Ok(draw.id)
    }

    /// Most recent draw for a raffle, if any
    pub async fn latest_draw(&self, raffle_id: Option<Uuid>) -> AppResult<Option<Uuid>> {
        let raffle = match raffle_id {
            Some(id) => self
                .raffle_repo
                .find_by_id(id)
                .await?
                .ok_or_else(|| AppError::NotFound("Raffle not found".to_string()))?,
            None => self
                .raffle_repo
                .find_current_open()
                .await?
                .ok_or(AppError::NoActiveRaffle)?,
        };

        Ok(self
            .draw_repo
            .latest_for_raffle(raffle.id)
            .await?
            .map(|d| d.id))
    }

    /// Select `n` winners among the raffle's verified tickets and record
    /// them as one append-only batch with 1-based positions.
    ///
    /// With `unique`, winners are sampled without replacement; when `n`
    /// meets or exceeds the pool, the whole pool wins in shuffled order.
    /// Without `unique`, a ticket may win several positions.
    pub async fn pick_winners(
        &self,
        draw_id: Uuid,
        n: i64,
        unique: bool,
    ) -> AppResult<Vec<DrawnWinner>> {
        if n < 1 {
            return Err(AppError::Validation("n must be >= 1".to_string()));
        }

        let draw = self
            .draw_repo
            .find_by_id(draw_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Draw not found".to_string()))?;

        let pool = self.ticket_repo.find_verified(draw.raffle_id).await?;
        if pool.is_empty() {
            return Ok(vec![]);
        }

        // A stored seed makes each round reproducible; folding in the
        // count of winners already recorded keeps successive rounds from
        // repeating the same sequence.
        let prior = self.draw_repo.winner_count(draw.id).await?;
        let mut rng = match draw.seed {
            Some(seed) => StdRng::seed_from_u64((seed as u64).wrapping_add(prior as u64)),
            None => StdRng::from_entropy(),
        };

        let indices = select_indices(pool.len(), n as usize, unique, &mut rng);

        let picks: Vec<(Uuid, i32, i64)> = indices
            .iter()
            .enumerate()
            .map(|(i, &idx)| {
                let ticket = &pool[idx];
                (ticket.id, (i + 1) as i32, ticket.ticket_number)
            })
            .collect();

        let winners = self
            .draw_repo
            .insert_winners(draw.id, draw.raffle_id, &picks)
            .await?;

        info!(
            "Draw {}: recorded {} winner(s) from a pool of {}",
            draw.id,
            winners.len(),
            pool.len()
        );

        let by_id: std::collections::HashMap<Uuid, &Ticket> =
            pool.iter().map(|t| (t.id, t)).collect();

        Ok(winners
            .into_iter()
            .map(|w| {
                let email = by_id
                    .get(&w.ticket_id)
                    .and_then(|t| t.email.as_deref())
                    .unwrap_or("");
                DrawnWinner {
                    winner_id: w.id,
                    position: w.position,
                    ticket_id: w.ticket_id,
                    ticket_number: w.ticket_number,
                    email_masked: mask_email(email),
                }
            })
            .collect())
    }
}

/// Pick pool indices for one winner batch. Pure so selection behavior is
/// unit-testable with a seeded generator.
pub fn select_indices(pool_len: usize, n: usize, unique: bool, rng: &mut impl Rng) -> Vec<usize> {
    if pool_len == 0 || n == 0 {
        return vec![];
    }
    if unique {
        // Without replacement; the whole pool (shuffled) when n >= pool
        let amount = n.min(pool_len);
        rand::seq::index::sample(rng, pool_len, amount).into_vec()
    } else {
        // With replacement; duplicates across positions are allowed
        (0..n).map(|_| rng.gen_range(0..pool_len)).collect()
    }
}
