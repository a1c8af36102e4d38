//! Data access layer - repositories for each aggregate

pub mod draw_repository;
pub mod payment_repository;
pub mod raffle_repository;
pub mod rate_repository;
pub mod ticket_repository;

pub use draw_repository::DrawRepository;
pub use payment_repository::PaymentRepository;
pub use raffle_repository::RaffleRepository;
pub use rate_repository::RateRepository;
pub use ticket_repository::{TicketRepository, TicketSlot};
