mod helpers;

use helpers::*;
use raffle_backend::error::AppError;
use raffle_backend::services::AllocationMode;
use sqlx::PgPool;
use uuid::Uuid;

// ============================================================================
// Quantity allocation
// ============================================================================

#[sqlx::test]
async fn test_reserve_full_capacity_then_fail_then_release(pool: PgPool) {
    let app = TestApp::from_pool(pool);
    let raffle = create_open_raffle(&app, 1000, 10).await;

    // Reserve every slot
    let hold = app
        .state
        .reservation_service
        .reserve(Some(raffle.id), AllocationMode::ByQuantity(10))
        .await
        .expect("Full-capacity reservation should succeed");

    assert!(!hold.hold_id.is_empty());
    assert_eq!(hold.tickets.len(), 10);

    let mut numbers: Vec<i64> = hold.tickets.iter().map(|t| t.ticket_number).collect();
    numbers.sort_unstable();
    assert_eq!(numbers, (1..=10).collect::<Vec<i64>>());

    // One more must fail with a capacity error
    let err = app
        .state
        .reservation_service
        .reserve(Some(raffle.id), AllocationMode::ByQuantity(1))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InsufficientCapacity(_)));

    // Releasing one slot makes a new reservation possible
    app.state
        .reservation_service
        .release(&[hold.tickets[0].id])
        .await
        .expect("Release should succeed");

    let hold2 = app
        .state
        .reservation_service
        .reserve(Some(raffle.id), AllocationMode::ByQuantity(1))
        .await
        .expect("Reservation after release should succeed");
    assert_eq!(hold2.tickets.len(), 1);
}

#[sqlx::test]
async fn test_partial_failure_claims_nothing(pool: PgPool) {
    let app = TestApp::from_pool(pool);
    let raffle = create_open_raffle(&app, 1000, 5).await;

    // Take 3 of 5 slots
    app.state
        .reservation_service
        .reserve(Some(raffle.id), AllocationMode::ByQuantity(3))
        .await
        .expect("Initial reservation should succeed");

    // Asking for 3 more exceeds the free pool; nothing may be claimed
    let err = app
        .state
        .reservation_service
        .reserve(Some(raffle.id), AllocationMode::ByQuantity(3))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InsufficientCapacity(_)));

    let now = chrono::Utc::now().naive_utc();
    let held = app
        .state
        .ticket_repo
        .count_active_holds(raffle.id, now)
        .await
        .unwrap();
    assert_eq!(held, 3, "failed reservation must not leave claims behind");
}

#[sqlx::test]
async fn test_capacity_invariant_holds(pool: PgPool) {
    let app = TestApp::from_pool(pool);
    let raffle = create_open_raffle(&app, 1000, 8).await;

    for quantity in [3, 2, 3] {
        app.state
            .reservation_service
            .reserve(Some(raffle.id), AllocationMode::ByQuantity(quantity))
            .await
            .expect("Reservation within capacity should succeed");

        let now = chrono::Utc::now().naive_utc();
        let sold = app.state.ticket_repo.count_paid(raffle.id).await.unwrap();
        let held = app
            .state
            .ticket_repo
            .count_active_holds(raffle.id, now)
            .await
            .unwrap();
        assert!(sold + held <= raffle.capacity);
    }
}

// ============================================================================
// Number allocation
// ============================================================================

#[sqlx::test]
async fn test_reserve_by_numbers_deduplicates(pool: PgPool) {
    let app = TestApp::from_pool(pool);
    let raffle = create_open_raffle(&app, 1000, 10).await;

    let hold = app
        .state
        .reservation_service
        .reserve(
            Some(raffle.id),
            AllocationMode::ByNumbers(vec![5, 5, 7]),
        )
        .await
        .expect("Number reservation should succeed");

    let mut numbers: Vec<i64> = hold.tickets.iter().map(|t| t.ticket_number).collect();
    numbers.sort_unstable();
    assert_eq!(numbers, vec![5, 7]);
}

#[sqlx::test]
async fn test_reserve_by_numbers_conflict_fails_whole_call(pool: PgPool) {
    let app = TestApp::from_pool(pool);
    let raffle = create_open_raffle(&app, 1000, 10).await;

    app.state
        .reservation_service
        .reserve(Some(raffle.id), AllocationMode::ByNumbers(vec![3]))
        .await
        .expect("First claim of #3 should succeed");

    // #3 is held; asking for {2, 3} must claim neither
    let err = app
        .state
        .reservation_service
        .reserve(Some(raffle.id), AllocationMode::ByNumbers(vec![2, 3]))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unavailable(_)));

    let now = chrono::Utc::now().naive_utc();
    let held = app
        .state
        .ticket_repo
        .count_active_holds(raffle.id, now)
        .await
        .unwrap();
    assert_eq!(held, 1, "only the original hold may remain");
}

#[sqlx::test]
async fn test_reserve_number_beyond_capacity_rejected(pool: PgPool) {
    let app = TestApp::from_pool(pool);
    let raffle = create_open_raffle(&app, 1000, 10).await;

    let err = app
        .state
        .reservation_service
        .reserve(Some(raffle.id), AllocationMode::ByNumbers(vec![11]))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

// ============================================================================
// Id allocation
// ============================================================================

#[sqlx::test]
async fn test_reserve_by_ids_roundtrip(pool: PgPool) {
    let app = TestApp::from_pool(pool);
    let raffle = create_open_raffle(&app, 1000, 10).await;

    let hold = app
        .state
        .reservation_service
        .reserve(Some(raffle.id), AllocationMode::ByQuantity(2))
        .await
        .unwrap();
    let ids: Vec<Uuid> = hold.tickets.iter().map(|t| t.id).collect();

    // Free the rows, then claim the very same rows by id
    app.state.reservation_service.release(&ids).await.unwrap();

    let hold2 = app
        .state
        .reservation_service
        .reserve(Some(raffle.id), AllocationMode::ByIds(ids.clone()))
        .await
        .expect("Claiming freed rows by id should succeed");
    assert_eq!(hold2.tickets.len(), 2);

    // Claiming them again while held must fail
    let err = app
        .state
        .reservation_service
        .reserve(Some(raffle.id), AllocationMode::ByIds(ids))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unavailable(_)));
}

// ============================================================================
// Expiry
// ============================================================================

#[sqlx::test]
async fn test_expired_hold_is_reclaimable(pool: PgPool) {
    let app = TestApp::from_pool(pool);
    let raffle = create_open_raffle(&app, 1000, 10).await;

    let hold = app
        .state
        .reservation_service
        .reserve(Some(raffle.id), AllocationMode::ByNumbers(vec![4]))
        .await
        .unwrap();
    expire_ticket_lease(&app, hold.tickets[0].id).await;

    // A different hold can now take #4 without manual intervention
    let hold2 = app
        .state
        .reservation_service
        .reserve(Some(raffle.id), AllocationMode::ByNumbers(vec![4]))
        .await
        .expect("Expired lease should be reclaimable");
    assert_ne!(hold.hold_id, hold2.hold_id);
    assert_eq!(hold2.tickets[0].ticket_number, 4);
}

#[sqlx::test]
async fn test_release_expired_is_idempotent(pool: PgPool) {
    let app = TestApp::from_pool(pool);
    let raffle = create_open_raffle(&app, 1000, 10).await;

    let hold = app
        .state
        .reservation_service
        .reserve(Some(raffle.id), AllocationMode::ByQuantity(2))
        .await
        .unwrap();
    for ticket in &hold.tickets {
        expire_ticket_lease(&app, ticket.id).await;
    }

    let now = chrono::Utc::now().naive_utc();
    let first = app
        .state
        .ticket_repo
        .release_expired(raffle.id, now)
        .await
        .unwrap();
    assert_eq!(first, 2);

    let second = app
        .state
        .ticket_repo
        .release_expired(raffle.id, now)
        .await
        .unwrap();
    assert_eq!(second, 0, "repeat sweep must be side-effect free");
}

// ============================================================================
// Progress and raffle resolution
// ============================================================================

#[sqlx::test]
async fn test_progress_snapshot(pool: PgPool) {
    let app = TestApp::from_pool(pool);
    let raffle = create_open_raffle(&app, 1000, 10).await;

    app.state
        .reservation_service
        .reserve(Some(raffle.id), AllocationMode::ByQuantity(4))
        .await
        .unwrap();

    let progress = app
        .state
        .reservation_service
        .progress(Some(raffle.id))
        .await
        .unwrap();

    assert_eq!(progress.total, 10);
    assert_eq!(progress.sold, 0);
    assert_eq!(progress.reserved, 4);
    assert_eq!(progress.remaining, Some(6));
    assert_eq!(
        progress.percent_sold.unwrap(),
        rust_decimal::Decimal::ZERO
    );
    assert_eq!(
        progress.percent_available.unwrap(),
        rust_decimal::Decimal::from(60)
    );
}

#[sqlx::test]
async fn test_no_active_raffle(pool: PgPool) {
    let app = TestApp::from_pool(pool);

    let err = app
        .state
        .reservation_service
        .reserve(None, AllocationMode::ByQuantity(1))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NoActiveRaffle));
}

#[sqlx::test]
async fn test_draft_raffle_not_reservable(pool: PgPool) {
    let app = TestApp::from_pool(pool);
    let raffle = app
        .state
        .raffle_service
        .create_raffle("Draft", None, 1000, "VES", 10)
        .await
        .unwrap();

    let err = app
        .state
        .reservation_service
        .reserve(Some(raffle.id), AllocationMode::ByQuantity(1))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NoActiveRaffle));
}
