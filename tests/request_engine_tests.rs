use std::time::Duration;

use bigdecimal::BigDecimal;
use pretty_assertions::assert_eq;
use uuid::Uuid;

use leave::AppError;
use leave::database::{LeaveStore, StoreTx};
use leave::database::models::{
    BalanceKey, HalfDayPeriod, LeaveRequestStatus, LeaveTypeUpdateInput, ReviewDecision,
    ReviewInput,
};
use leave::services::caller::{Claims, capability};

mod common;
use common::{Fixture, date, days, full_days, half_day};

fn approve() -> ReviewInput {
    ReviewInput {
        decision: ReviewDecision::Approve,
        note: Some("enjoy".into()),
    }
}

fn reject() -> ReviewInput {
    ReviewInput {
        decision: ReviewDecision::Reject,
        note: None,
    }
}

#[tokio::test]
async fn create_approve_cancel_moves_days_through_the_ledger() {
    let fx = Fixture::new();
    fx.seed_balance(fx.employee.id, &fx.annual, 20, 5);
    let engine = &fx.state.requests;

    // Two full working weeks.
    let created = engine
        .create(
            fx.employee.id,
            full_days(&fx.annual, date(2025, 3, 10), date(2025, 3, 21)),
        )
        .await
        .unwrap();
    assert_eq!(created.status, LeaveRequestStatus::Pending);
    assert_eq!(created.business_days, days("10"));
    assert_eq!(created.time_off_type_name, "Annual Leave");
    assert_eq!(created.employee_name, fx.employee.full_name);

    let balance = fx.balance(fx.employee.id, &fx.annual).await.unwrap();
    assert_eq!(balance.pending, days("10"));
    assert_eq!(balance.remaining(), days("5"));

    let approved = engine
        .review(created.id, fx.manager.id, approve())
        .await
        .unwrap();
    assert_eq!(approved.status, LeaveRequestStatus::Approved);
    assert_eq!(approved.reviewer_id, Some(fx.manager.id));
    assert_eq!(approved.reviewer_name.as_deref(), Some(fx.manager.full_name.as_str()));
    assert_eq!(approved.calendar_event_id.as_deref(), Some("evt-1"));
    assert!(approved.calendar_synced);

    let balance = fx.balance(fx.employee.id, &fx.annual).await.unwrap();
    assert_eq!(balance.pending, days("0"));
    assert_eq!(balance.used, days("15"));
    assert_eq!(balance.remaining(), days("5"));

    let cancelled = engine.cancel(created.id, fx.employee.id).await.unwrap();
    assert_eq!(cancelled.status, LeaveRequestStatus::Cancelled);
    assert_eq!(cancelled.calendar_event_id, None);
    assert!(!cancelled.calendar_synced);

    let balance = fx.balance(fx.employee.id, &fx.annual).await.unwrap();
    assert_eq!(balance.used, days("5"));
    assert_eq!(balance.remaining(), days("15"));
    assert_eq!(fx.calendar.deleted(), vec!["evt-1".to_string()]);

    let stored = fx.store.find_request(created.id).await.unwrap().unwrap();
    assert_eq!(stored.calendar_event_id, None);
}

#[tokio::test]
async fn approved_range_blocks_an_overlapping_day() {
    let fx = Fixture::new();
    let engine = &fx.state.requests;

    let first = engine
        .create(
            fx.employee.id,
            full_days(&fx.annual, date(2025, 3, 10), date(2025, 3, 12)),
        )
        .await
        .unwrap();
    engine.review(first.id, fx.manager.id, approve()).await.unwrap();

    let result = engine
        .create(
            fx.employee.id,
            full_days(&fx.annual, date(2025, 3, 11), date(2025, 3, 11)),
        )
        .await;
    assert!(matches!(result, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn overlap_spans_leave_types() {
    let fx = Fixture::new();
    let engine = &fx.state.requests;

    engine
        .create(
            fx.employee.id,
            full_days(&fx.annual, date(2025, 3, 10), date(2025, 3, 12)),
        )
        .await
        .unwrap();

    let result = engine
        .create(
            fx.employee.id,
            full_days(&fx.sick, date(2025, 3, 12), date(2025, 3, 13)),
        )
        .await;
    assert!(matches!(result, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn morning_and_afternoon_can_both_be_taken() {
    let fx = Fixture::new();
    let engine = &fx.state.requests;
    let day = date(2025, 3, 11);

    let morning = engine
        .create(fx.employee.id, half_day(&fx.annual, day, HalfDayPeriod::Morning))
        .await
        .unwrap();
    assert_eq!(morning.business_days, days("0.5"));

    let afternoon = engine
        .create(
            fx.employee.id,
            half_day(&fx.annual, day, HalfDayPeriod::Afternoon),
        )
        .await
        .unwrap();
    assert_eq!(afternoon.status, LeaveRequestStatus::Pending);

    let balance = fx.balance(fx.employee.id, &fx.annual).await.unwrap();
    assert_eq!(balance.pending, days("1"));

    let again = engine
        .create(fx.employee.id, half_day(&fx.annual, day, HalfDayPeriod::Morning))
        .await;
    assert!(matches!(again, Err(AppError::Conflict(_))));

    let whole_day = engine
        .create(fx.employee.id, full_days(&fx.annual, day, day))
        .await;
    assert!(matches!(whole_day, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn cancelled_and_rejected_requests_free_their_dates() {
    let fx = Fixture::new();
    let engine = &fx.state.requests;
    let range = || full_days(&fx.annual, date(2025, 3, 10), date(2025, 3, 12));

    let first = engine.create(fx.employee.id, range()).await.unwrap();
    engine.cancel(first.id, fx.employee.id).await.unwrap();

    let second = engine.create(fx.employee.id, range()).await.unwrap();
    engine.review(second.id, fx.manager.id, reject()).await.unwrap();

    assert!(engine.create(fx.employee.id, range()).await.is_ok());
}

#[tokio::test]
async fn self_review_is_denied_and_leaves_the_request_pending() {
    let fx = Fixture::new();
    let engine = &fx.state.requests;

    let created = engine
        .create(
            fx.employee.id,
            full_days(&fx.annual, date(2025, 3, 10), date(2025, 3, 10)),
        )
        .await
        .unwrap();

    let result = engine.review(created.id, fx.employee.id, approve()).await;
    assert!(matches!(result, Err(AppError::PermissionDenied(_))));

    let stored = fx.store.find_request(created.id).await.unwrap().unwrap();
    assert_eq!(stored.status, LeaveRequestStatus::Pending);
    let balance = fx.balance(fx.employee.id, &fx.annual).await.unwrap();
    assert_eq!(balance.pending, days("1"));
    assert_eq!(balance.used, days("0"));
}

#[tokio::test]
async fn decided_requests_cannot_be_reviewed_again() {
    let fx = Fixture::new();
    let engine = &fx.state.requests;

    let created = engine
        .create(
            fx.employee.id,
            full_days(&fx.annual, date(2025, 3, 10), date(2025, 3, 10)),
        )
        .await
        .unwrap();
    engine.review(created.id, fx.manager.id, reject()).await.unwrap();

    let result = engine.review(created.id, fx.manager.id, approve()).await;
    assert!(matches!(result, Err(AppError::Conflict(_))));

    let cancel = engine.cancel(created.id, fx.employee.id).await;
    assert!(matches!(cancel, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn rejection_releases_pending_days_only() {
    let fx = Fixture::new();
    fx.seed_balance(fx.employee.id, &fx.annual, 20, 0);
    let engine = &fx.state.requests;

    let created = engine
        .create(
            fx.employee.id,
            full_days(&fx.annual, date(2025, 3, 10), date(2025, 3, 14)),
        )
        .await
        .unwrap();
    let rejected = engine
        .review(created.id, fx.manager.id, reject())
        .await
        .unwrap();

    assert_eq!(rejected.status, LeaveRequestStatus::Rejected);
    assert!(rejected.reviewed_at.is_some());
    assert!(fx.calendar.created().is_empty());

    let balance = fx.balance(fx.employee.id, &fx.annual).await.unwrap();
    assert_eq!(balance.pending, days("0"));
    assert_eq!(balance.used, days("0"));
    assert_eq!(balance.remaining(), days("20"));
}

#[tokio::test]
async fn only_the_owner_can_cancel() {
    let fx = Fixture::new();
    let engine = &fx.state.requests;

    let created = engine
        .create(
            fx.employee.id,
            full_days(&fx.annual, date(2025, 3, 10), date(2025, 3, 10)),
        )
        .await
        .unwrap();

    let result = engine.cancel(created.id, fx.manager.id).await;
    assert!(matches!(result, Err(AppError::PermissionDenied(_))));

    let missing = engine.cancel(Uuid::new_v4(), fx.employee.id).await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn insufficient_balance_leaves_no_request_and_no_row() {
    let fx = Fixture::new();
    let engine = &fx.state.requests;

    // Personal leave opens with three days; ask for four.
    let result = engine
        .create(
            fx.employee.id,
            full_days(&fx.personal, date(2025, 3, 10), date(2025, 3, 13)),
        )
        .await;

    match result {
        Err(AppError::InsufficientBalance {
            requested,
            remaining,
        }) => {
            assert_eq!(requested, days("4"));
            assert_eq!(remaining, days("3"));
        }
        other => panic!("expected insufficient balance, got {other:?}"),
    }
    assert!(fx.store.requests().is_empty());
    assert!(fx.balance(fx.employee.id, &fx.personal).await.is_none());
}

#[tokio::test]
async fn lock_contention_fails_create_atomically() {
    let fx = Fixture::with_lock_wait(Duration::from_millis(100));
    fx.seed_balance(fx.employee.id, &fx.annual, 20, 0);

    let mut holder = fx.store.begin().await.unwrap();
    holder
        .lock_balance(BalanceKey::new(fx.employee.id, fx.annual.id, 2025))
        .await
        .unwrap();

    let result = fx
        .state
        .requests
        .create(
            fx.employee.id,
            full_days(&fx.annual, date(2025, 3, 10), date(2025, 3, 11)),
        )
        .await;
    assert!(matches!(result, Err(AppError::TransientConflict(_))));
    assert!(result.unwrap_err().is_retryable());
    drop(holder);

    assert!(fx.store.requests().is_empty());
    let balance = fx.balance(fx.employee.id, &fx.annual).await.unwrap();
    assert_eq!(balance.pending, days("0"));

    // Retrying once the lock is free succeeds.
    let retried = fx
        .state
        .requests
        .create(
            fx.employee.id,
            full_days(&fx.annual, date(2025, 3, 10), date(2025, 3, 11)),
        )
        .await
        .unwrap();
    assert_eq!(retried.status, LeaveRequestStatus::Pending);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_cannot_double_book() {
    let fx = Fixture::new();
    // Eight days left; each request wants five.
    fx.seed_balance(fx.employee.id, &fx.annual, 20, 12);

    let first = {
        let engine = fx.state.requests.clone();
        let input = full_days(&fx.annual, date(2025, 3, 3), date(2025, 3, 7));
        let employee_id = fx.employee.id;
        tokio::spawn(async move { engine.create(employee_id, input).await })
    };
    let second = {
        let engine = fx.state.requests.clone();
        let input = full_days(&fx.annual, date(2025, 3, 10), date(2025, 3, 14));
        let employee_id = fx.employee.id;
        tokio::spawn(async move { engine.create(employee_id, input).await })
    };

    let results = [first.await.unwrap(), second.await.unwrap()];
    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    let refused = results
        .iter()
        .filter(|r| matches!(r, Err(AppError::InsufficientBalance { .. })))
        .count();
    assert_eq!((succeeded, refused), (1, 1));

    let balance = fx.balance(fx.employee.id, &fx.annual).await.unwrap();
    assert_eq!(balance.pending, days("5"));
    assert_eq!(balance.remaining(), days("3"));
    assert_eq!(fx.store.requests().len(), 1);
}

#[tokio::test]
async fn interleaved_single_day_creates_stop_at_the_balance() {
    let fx = Fixture::new();
    fx.seed_balance(fx.employee.id, &fx.annual, 3, 0);
    let engine = &fx.state.requests;

    let attempts = (3..=7).map(|day| {
        engine.create(
            fx.employee.id,
            full_days(&fx.annual, date(2025, 3, day), date(2025, 3, day)),
        )
    });
    let results = futures::future::join_all(attempts).await;

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 3);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, AppError::InsufficientBalance { .. })));

    let balance = fx.balance(fx.employee.id, &fx.annual).await.unwrap();
    assert_eq!(balance.pending, days("3"));
    assert_eq!(balance.remaining(), days("0"));
}

#[tokio::test]
async fn unlimited_types_open_a_row_and_never_run_out() {
    let fx = Fixture::new();
    let engine = &fx.state.requests;

    let created = engine
        .create(
            fx.employee.id,
            full_days(&fx.sick, date(2025, 3, 3), date(2025, 3, 28)),
        )
        .await
        .unwrap();
    assert_eq!(created.business_days, days("20"));

    let balance = fx.balance(fx.employee.id, &fx.sick).await.unwrap();
    assert_eq!(balance.total_allocated, days("0"));
    assert_eq!(balance.pending, days("20"));

    engine.review(created.id, fx.manager.id, approve()).await.unwrap();
    let balance = fx.balance(fx.employee.id, &fx.sick).await.unwrap();
    assert_eq!(balance.used, days("20"));
    assert_eq!(balance.remaining(), days("-20"));
}

#[tokio::test]
async fn calendar_outage_never_blocks_approval() {
    let fx = Fixture::new();
    fx.calendar.go_offline();
    let engine = &fx.state.requests;

    let created = engine
        .create(
            fx.employee.id,
            full_days(&fx.annual, date(2025, 3, 10), date(2025, 3, 10)),
        )
        .await
        .unwrap();
    let approved = engine
        .review(created.id, fx.manager.id, approve())
        .await
        .unwrap();

    assert_eq!(approved.status, LeaveRequestStatus::Approved);
    assert!(!approved.calendar_synced);
    assert_eq!(fx.calendar.created().len(), 1);

    // Nothing to delete on cancel.
    engine.cancel(created.id, fx.employee.id).await.unwrap();
    assert!(fx.calendar.deleted().is_empty());
}

#[tokio::test]
async fn calendar_entry_describes_the_absence() {
    let fx = Fixture::new();
    let engine = &fx.state.requests;

    let created = engine
        .create(
            fx.employee.id,
            half_day(&fx.annual, date(2025, 3, 12), HalfDayPeriod::Morning),
        )
        .await
        .unwrap();
    engine.review(created.id, fx.manager.id, approve()).await.unwrap();

    let entries = fx.calendar.created();
    assert_eq!(entries.len(), 1);
    assert_eq!(
        entries[0].subject,
        format!("Annual Leave - {}", fx.employee.full_name)
    );
    assert_eq!(entries[0].body, "Time off: Annual Leave\nDays: 0.5");
    assert_eq!(entries[0].identity, fx.employee.calendar_identity.clone());
}

#[tokio::test]
async fn employee_without_calendar_identity_is_approved_unsynced() {
    let fx = Fixture::new();
    let engine = &fx.state.requests;

    let created = engine
        .create(
            fx.colleague.id,
            full_days(&fx.annual, date(2025, 3, 10), date(2025, 3, 10)),
        )
        .await
        .unwrap();
    let approved = engine
        .review(created.id, fx.manager.id, approve())
        .await
        .unwrap();

    assert_eq!(approved.status, LeaveRequestStatus::Approved);
    assert_eq!(approved.calendar_event_id, None);
}

#[tokio::test]
async fn create_rejects_bad_input() {
    let fx = Fixture::new();
    let engine = &fx.state.requests;

    let weekend = engine
        .create(
            fx.employee.id,
            full_days(&fx.annual, date(2025, 3, 8), date(2025, 3, 9)),
        )
        .await;
    assert!(matches!(weekend, Err(AppError::Validation(_))));

    let inverted = engine
        .create(
            fx.employee.id,
            full_days(&fx.annual, date(2025, 3, 12), date(2025, 3, 10)),
        )
        .await;
    assert!(matches!(inverted, Err(AppError::Validation(_))));

    let mut unknown = full_days(&fx.annual, date(2025, 3, 10), date(2025, 3, 10));
    unknown.time_off_type_id = Uuid::new_v4();
    assert!(matches!(
        engine.create(fx.employee.id, unknown).await,
        Err(AppError::NotFound(_))
    ));

    let stranger = engine
        .create(
            Uuid::new_v4(),
            full_days(&fx.annual, date(2025, 3, 10), date(2025, 3, 10)),
        )
        .await;
    assert!(matches!(stranger, Err(AppError::NotFound(_))));

    fx.state
        .leave_types
        .update(
            fx.personal.id,
            LeaveTypeUpdateInput {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let inactive = engine
        .create(
            fx.employee.id,
            full_days(&fx.personal, date(2025, 3, 10), date(2025, 3, 10)),
        )
        .await;
    assert!(matches!(inactive, Err(AppError::Validation(_))));

    assert!(fx.store.requests().is_empty());
}

#[tokio::test]
async fn requests_are_visible_to_owner_manager_and_read_all() {
    let fx = Fixture::new();
    let outsider = common::employee(None, false);
    fx.store.insert_employee(outsider.clone());
    let engine = &fx.state.requests;

    let created = engine
        .create(
            fx.employee.id,
            full_days(&fx.annual, date(2025, 3, 10), date(2025, 3, 10)),
        )
        .await
        .unwrap();

    let owner = Claims::new(fx.employee.id, &[]);
    let manager = Claims::new(fx.manager.id, &[]);
    let auditor = Claims::new(outsider.id, &[capability::REQUEST_READ_ALL]);
    let nosy = Claims::new(outsider.id, &[capability::REQUEST_READ_TEAM]);
    // A peer under the same manager is not the owner's manager.
    let peer = Claims::new(fx.colleague.id, &[]);

    for caller in [&owner, &manager, &auditor] {
        assert_eq!(
            engine.get_by_id(created.id, caller).await.unwrap().id,
            created.id
        );
    }
    for caller in [&nosy, &peer] {
        assert!(matches!(
            engine.get_by_id(created.id, caller).await,
            Err(AppError::PermissionDenied(_))
        ));
    }
}

#[tokio::test]
async fn listings_scope_and_order_requests() {
    let fx = Fixture::new();
    let engine = &fx.state.requests;

    let mine_early = engine
        .create(
            fx.employee.id,
            full_days(&fx.annual, date(2025, 3, 3), date(2025, 3, 4)),
        )
        .await
        .unwrap();
    let mine_late = engine
        .create(
            fx.employee.id,
            full_days(&fx.sick, date(2025, 3, 10), date(2025, 3, 10)),
        )
        .await
        .unwrap();
    let theirs = engine
        .create(
            fx.colleague.id,
            full_days(&fx.annual, date(2025, 3, 5), date(2025, 3, 6)),
        )
        .await
        .unwrap();

    let mine: Vec<Uuid> = engine
        .list_mine(fx.employee.id)
        .await
        .unwrap()
        .iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(mine, vec![mine_late.id, mine_early.id]);

    let team = engine.list_for_team(fx.manager.id).await.unwrap();
    assert_eq!(team.len(), 3);
    assert!(engine.list_for_team(fx.employee.id).await.unwrap().is_empty());

    let page = engine.list_all(2, 2).await.unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].id, mine_early.id);

    let clamped = engine.list_all(0, 1000).await.unwrap();
    assert_eq!((clamped.page, clamped.per_page), (1, 100));

    for id in [mine_early.id, mine_late.id, theirs.id] {
        engine.review(id, fx.manager.id, approve()).await.unwrap();
    }
    let calendar = engine
        .list_approved_between(date(2025, 3, 4), date(2025, 3, 10))
        .await
        .unwrap();
    let names: Vec<&str> = calendar
        .iter()
        .map(|r| r.time_off_type_name.as_str())
        .collect();
    assert_eq!(names[2], "Sick Leave");
    assert_eq!(calendar.len(), 3);

    let mut annual_names: Vec<String> = calendar[..2]
        .iter()
        .map(|r| r.employee_name.clone())
        .collect();
    let shown = annual_names.clone();
    annual_names.sort();
    assert_eq!(shown, annual_names);

    assert!(matches!(
        engine
            .list_approved_between(date(2025, 3, 10), date(2025, 3, 4))
            .await,
        Err(AppError::Validation(_))
    ));
}

#[tokio::test]
async fn half_day_charges_half_a_day() {
    let fx = Fixture::new();
    fx.seed_balance(fx.employee.id, &fx.personal, 3, 0);

    fx.state
        .requests
        .create(
            fx.employee.id,
            half_day(&fx.personal, date(2025, 3, 14), HalfDayPeriod::Afternoon),
        )
        .await
        .unwrap();

    let balance = fx.balance(fx.employee.id, &fx.personal).await.unwrap();
    assert_eq!(balance.pending, BigDecimal::new(5.into(), 1));
    assert_eq!(balance.remaining(), days("2.5"));
}

#[tokio::test]
async fn weekend_half_day_is_still_half_a_day() {
    let fx = Fixture::new();
    fx.seed_balance(fx.employee.id, &fx.annual, 20, 0);

    // 2025-03-08 is a Saturday.
    let created = fx
        .state
        .requests
        .create(
            fx.employee.id,
            half_day(&fx.annual, date(2025, 3, 8), HalfDayPeriod::Morning),
        )
        .await
        .unwrap();

    assert_eq!(created.status, LeaveRequestStatus::Pending);
    assert_eq!(created.business_days, days("0.5"));
    let balance = fx.balance(fx.employee.id, &fx.annual).await.unwrap();
    assert_eq!(balance.pending, days("0.5"));
}
