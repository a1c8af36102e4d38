//! Domain models for the raffle backend.
//!
//! This module contains all database-backed models representing
//! the core entities of the raffle platform.

pub mod draw;
pub mod payment;
pub mod raffle;
pub mod rate;
pub mod ticket;

// Re-export all models for convenient access
pub use draw::{Draw, Winner};
pub use payment::{BuyerInfo, Payment, PaymentStatus};
pub use raffle::{Raffle, RaffleStatus};
pub use rate::{RateEntry, RateInfo};
pub use ticket::Ticket;
