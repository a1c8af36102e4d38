//! Business logic services

pub mod draw_service;
pub mod payment_service;
pub mod raffle_service;
pub mod rate_service;
pub mod reservation_service;
pub mod sweeper;

pub use draw_service::{DrawService, DrawnWinner};
pub use payment_service::{PaymentReceipt, PaymentService, PaymentSummary, Quote, VerifiedPayment};
pub use raffle_service::RaffleService;
pub use rate_service::RateService;
pub use reservation_service::{AllocationMode, Hold, Progress, ReservationService};
pub use sweeper::ExpirySweeper;
