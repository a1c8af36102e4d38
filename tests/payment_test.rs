mod helpers;

use helpers::*;
use raffle_backend::error::AppError;
use raffle_backend::models::PaymentStatus;
use raffle_backend::services::AllocationMode;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

// ============================================================================
// Submission against a hold
// ============================================================================

#[sqlx::test]
async fn test_submit_freezes_amount_and_assigns_tickets(pool: PgPool) {
    let app = TestApp::from_pool(pool);
    pin_rate(&app, 40).await;
    let raffle = create_open_raffle(&app, 1000, 10).await;

    let hold = app
        .state
        .reservation_service
        .reserve(Some(raffle.id), AllocationMode::ByQuantity(3))
        .await
        .unwrap();
    let ids: Vec<Uuid> = hold.tickets.iter().map(|t| t.id).collect();

    let receipt = app
        .state
        .payment_service
        .submit(
            Some(raffle.id),
            &hold.hold_id,
            &ids,
            &test_buyer("Buyer@Example.com"),
            "REF-001",
            Some("https://evidence.example/1.jpg"),
            None,
        )
        .await
        .expect("Submission should succeed");

    assert_eq!(receipt.status, "pending");
    assert_eq!(receipt.amount_local.to_string(), "1200.00");
    assert_eq!(receipt.rate_used, Decimal::from(40));

    // Tickets stay reserved for admin review: hold cleared, email stamped
    let tickets = app.state.ticket_repo.find_by_ids(&ids).await.unwrap();
    let now = chrono::Utc::now().naive_utc();
    for ticket in &tickets {
        assert!(ticket.reserved_by.is_none());
        assert_eq!(ticket.email.as_deref(), Some("buyer@example.com"));
        assert!(ticket.reserved_until.unwrap() > now);
        assert!(!ticket.verified);
    }

    let linked = app
        .state
        .payment_repo
        .linked_ticket_ids(receipt.payment_id)
        .await
        .unwrap();
    assert_eq!(linked.len(), 3);
}

#[sqlx::test]
async fn test_submit_with_foreign_hold_fails(pool: PgPool) {
    let app = TestApp::from_pool(pool);
    pin_rate(&app, 40).await;
    let raffle = create_open_raffle(&app, 1000, 10).await;

    let hold = app
        .state
        .reservation_service
        .reserve(Some(raffle.id), AllocationMode::ByQuantity(2))
        .await
        .unwrap();
    let ids: Vec<Uuid> = hold.tickets.iter().map(|t| t.id).collect();

    let err = app
        .state
        .payment_service
        .submit(
            Some(raffle.id),
            "some-other-hold",
            &ids,
            &test_buyer("buyer@example.com"),
            "REF-002",
            None,
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unavailable(_)));

    // Ownership is never silently reassigned
    let tickets = app.state.ticket_repo.find_by_ids(&ids).await.unwrap();
    for ticket in &tickets {
        assert_eq!(ticket.reserved_by.as_deref(), Some(hold.hold_id.as_str()));
    }
}

#[sqlx::test]
async fn test_submit_with_expired_lease_fails(pool: PgPool) {
    let app = TestApp::from_pool(pool);
    pin_rate(&app, 40).await;
    let raffle = create_open_raffle(&app, 1000, 10).await;

    let hold = app
        .state
        .reservation_service
        .reserve(Some(raffle.id), AllocationMode::ByQuantity(1))
        .await
        .unwrap();
    expire_ticket_lease(&app, hold.tickets[0].id).await;

    let err = app
        .state
        .payment_service
        .submit(
            Some(raffle.id),
            &hold.hold_id,
            &[hold.tickets[0].id],
            &test_buyer("buyer@example.com"),
            "REF-003",
            None,
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

// ============================================================================
// Admin verification
// ============================================================================

#[sqlx::test]
async fn test_approve_marks_tickets_and_keeps_frozen_figures(pool: PgPool) {
    let app = TestApp::from_pool(pool);
    pin_rate(&app, 40).await;
    let raffle = create_open_raffle(&app, 1000, 10).await;

    let hold = app
        .state
        .reservation_service
        .reserve(Some(raffle.id), AllocationMode::ByQuantity(3))
        .await
        .unwrap();
    let ids: Vec<Uuid> = hold.tickets.iter().map(|t| t.id).collect();

    let receipt = app
        .state
        .payment_service
        .submit(
            Some(raffle.id),
            &hold.hold_id,
            &ids,
            &test_buyer("buyer@example.com"),
            "REF-100",
            None,
            None,
        )
        .await
        .unwrap();

    // The rate moves after submission; the frozen figures must not
    pin_rate(&app, 55).await;

    let verified = app
        .state
        .payment_service
        .verify(receipt.payment_id, true)
        .await
        .unwrap();

    assert_eq!(verified.payment.status_enum(), PaymentStatus::Approved);
    assert_eq!(verified.payment.amount_local.to_string(), "1200.00");
    assert_eq!(verified.payment.rate_used, Decimal::from(40));
    assert_eq!(verified.ticket_ids.len(), 3);

    let tickets = app.state.ticket_repo.find_by_ids(&ids).await.unwrap();
    for ticket in &tickets {
        assert!(ticket.verified);
        assert_eq!(ticket.reference.as_deref(), Some("REF-100"));
        assert!(ticket.reserved_until.is_none());
        assert!(ticket.reserved_by.is_none());
    }

    let sold = app.state.ticket_repo.count_paid(raffle.id).await.unwrap();
    assert_eq!(sold, 3);
}

#[sqlx::test]
async fn test_reject_releases_tickets_fully(pool: PgPool) {
    let app = TestApp::from_pool(pool);
    pin_rate(&app, 40).await;
    let raffle = create_open_raffle(&app, 1000, 10).await;

    let hold = app
        .state
        .reservation_service
        .reserve(Some(raffle.id), AllocationMode::ByQuantity(2))
        .await
        .unwrap();
    let ids: Vec<Uuid> = hold.tickets.iter().map(|t| t.id).collect();

    let receipt = app
        .state
        .payment_service
        .submit(
            Some(raffle.id),
            &hold.hold_id,
            &ids,
            &test_buyer("buyer@example.com"),
            "REF-200",
            None,
            None,
        )
        .await
        .unwrap();

    let verified = app
        .state
        .payment_service
        .verify(receipt.payment_id, false)
        .await
        .unwrap();
    assert_eq!(verified.payment.status_enum(), PaymentStatus::Rejected);

    // Rejected tickets return to the fully-free state, email included
    let now = chrono::Utc::now().naive_utc();
    let tickets = app.state.ticket_repo.find_by_ids(&ids).await.unwrap();
    for ticket in &tickets {
        assert!(ticket.is_free(now));
        assert!(ticket.email.is_none());
        assert!(!ticket.verified);
    }
}

#[sqlx::test]
async fn test_verify_is_idempotent_on_terminal_payment(pool: PgPool) {
    let app = TestApp::from_pool(pool);
    pin_rate(&app, 40).await;
    let raffle = create_open_raffle(&app, 1000, 10).await;

    let hold = app
        .state
        .reservation_service
        .reserve(Some(raffle.id), AllocationMode::ByQuantity(1))
        .await
        .unwrap();
    let ids: Vec<Uuid> = hold.tickets.iter().map(|t| t.id).collect();

    let receipt = app
        .state
        .payment_service
        .submit(
            Some(raffle.id),
            &hold.hold_id,
            &ids,
            &test_buyer("buyer@example.com"),
            "REF-300",
            None,
            None,
        )
        .await
        .unwrap();

    app.state
        .payment_service
        .verify(receipt.payment_id, true)
        .await
        .unwrap();

    // A repeated call, even with the opposite decision, changes nothing
    let again = app
        .state
        .payment_service
        .verify(receipt.payment_id, false)
        .await
        .unwrap();
    assert_eq!(again.payment.status_enum(), PaymentStatus::Approved);

    let tickets = app.state.ticket_repo.find_by_ids(&ids).await.unwrap();
    assert!(tickets.iter().all(|t| t.verified));
}

#[sqlx::test]
async fn test_verify_unknown_payment_not_found(pool: PgPool) {
    let app = TestApp::from_pool(pool);
    let err = app
        .state
        .payment_service
        .verify(Uuid::new_v4(), true)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

// ============================================================================
// Auto-reserve flow
// ============================================================================

#[sqlx::test]
async fn test_submit_with_auto_reserve(pool: PgPool) {
    let app = TestApp::from_pool(pool);
    pin_rate(&app, 40).await;
    let raffle = create_open_raffle(&app, 500, 10).await;

    let receipt = app
        .state
        .payment_service
        .submit_with_auto_reserve(
            Some(raffle.id),
            2,
            &test_buyer("auto@example.com"),
            "REF-400",
            None,
            Some("pago_movil"),
        )
        .await
        .expect("Auto-reserve submission should succeed");

    // 2 tickets at 5.00 USD, rate 40 -> 400.00
    assert_eq!(receipt.amount_local.to_string(), "400.00");

    let linked = app
        .state
        .payment_repo
        .linked_ticket_ids(receipt.payment_id)
        .await
        .unwrap();
    assert_eq!(linked.len(), 2);

    let tickets = app.state.ticket_repo.find_by_ids(&linked).await.unwrap();
    for ticket in &tickets {
        assert_eq!(ticket.email.as_deref(), Some("auto@example.com"));
        assert!(ticket.reserved_by.is_none());
    }
}

// ============================================================================
// Quotes (soft-fail) and status lookup
// ============================================================================

#[sqlx::test]
async fn test_quote_math(pool: PgPool) {
    let app = TestApp::from_pool(pool);
    pin_rate(&app, 40).await;
    let raffle = create_open_raffle(&app, 1000, 10).await;

    let quote = app.state.payment_service.quote(3, Some(raffle.id), None).await;
    assert!(quote.error.is_none());
    assert_eq!(quote.unit_price_usd.unwrap().to_string(), "10.00");
    assert_eq!(quote.total_usd.unwrap().to_string(), "30.00");
    assert_eq!(quote.unit_price_local.unwrap().to_string(), "400.00");
    assert_eq!(quote.total_local.unwrap().to_string(), "1200.00");
}

#[sqlx::test]
async fn test_quote_soft_fails(pool: PgPool) {
    let app = TestApp::from_pool(pool);

    // Invalid quantity
    let quote = app.state.payment_service.quote(0, None, None).await;
    assert!(quote.error.is_some());
    assert!(quote.total_usd.is_none());

    // No open raffle: still a response object, never an Err
    let quote = app.state.payment_service.quote(2, None, None).await;
    assert!(quote.error.is_some());
}

#[sqlx::test]
async fn test_check_status_masks_email(pool: PgPool) {
    let app = TestApp::from_pool(pool);
    pin_rate(&app, 40).await;
    let raffle = create_open_raffle(&app, 1000, 10).await;

    let hold = app
        .state
        .reservation_service
        .reserve(Some(raffle.id), AllocationMode::ByNumbers(vec![2, 6]))
        .await
        .unwrap();
    let ids: Vec<Uuid> = hold.tickets.iter().map(|t| t.id).collect();

    app.state
        .payment_service
        .submit(
            Some(raffle.id),
            &hold.hold_id,
            &ids,
            &test_buyer("abcdef@domain.com"),
            "REF-500",
            None,
            None,
        )
        .await
        .unwrap();

    let summaries = app
        .state
        .payment_service
        .check_status(None, Some("REF-500"), None)
        .await
        .unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].email_masked, "ab***@do***.com");
    assert_eq!(summaries[0].ticket_numbers, vec![2, 6]);
    assert_eq!(summaries[0].status, "pending");

    // Lookup by ticket number reaches the same payment
    let by_number = app
        .state
        .payment_service
        .check_status(Some(6), None, None)
        .await
        .unwrap();
    assert_eq!(by_number.len(), 1);
    assert_eq!(by_number[0].reference, "REF-500");

    // No criterion is a validation error
    let err = app
        .state
        .payment_service
        .check_status(None, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}
