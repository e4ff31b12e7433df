use coinrig_server::{
    config::RewardsConfig,
    domain::{
        accrual::{Accrual, AccrualEngine},
        errors::{ApiError, DatabaseError, ReviewError, WorkflowError},
        fields::{Email, ReferralCode},
        mining::{MiningSession, MiningTimer},
        profile::{merge, ProfileUpdate},
        requests::{Decision, DepositRequest, RequestStatus, WithdrawalRequest},
        user::{Notification, Plan, PlanOffer, User},
    },
    repository::{
        begin, commit,
        notifications::{count_unread, get_notifications, insert_notification, mark_read},
        plans::{create_plan_offer, get_plans_for_user, insert_plan},
        requests::{
            get_deposit_requests, get_withdrawal_requests, insert_deposit_request,
            insert_withdrawal_request, set_request_status, RequestFilter, RequestTable,
        },
        users::{
            apply_accrual, apply_mining_settlement, debit_earnings, get_user_by_id, update_profile,
        },
        Page,
    },
    review::{review_deposit, review_withdrawal},
    routes::auth::{register, Registration},
};
use rust_decimal::Decimal;
use sqlx::PgPool;
use time::{macros::datetime, Duration, OffsetDateTime};
use uuid::Uuid;

fn rewards() -> RewardsConfig {
    RewardsConfig {
        signup_bonus: 200,
        referral_bonus: 50,
        mining_duration_secs: 3600,
        mining_cooldown_secs: 3600,
        mining_reward: 10,
        accrual_threshold_secs: 86400,
        accrual_check_interval_secs: 3600,
        min_withdrawal: Decimal::from(5),
        admin_emails: vec![],
    }
}

async fn sign_up(pool: &PgPool, email: &str, referrer: Option<&User>) -> User {
    let email = Email::parse(email).unwrap();
    let now = datetime!(2024-06-01 00:00 UTC);
    match register(pool, &rewards(), &email, referrer, || ReferralCode::new(&email), now)
        .await
        .unwrap()
    {
        Registration::Created(user) => user,
        Registration::Existing(_) => panic!("{} already registered", email),
    }
}

async fn reload(pool: &PgPool, id: Uuid) -> User {
    get_user_by_id(pool, id).await.unwrap().unwrap()
}

/// Credits `amount` of earnings through the accrual write path.
async fn fund(pool: &PgPool, user: &User, amount: i64) -> User {
    let accrual = Accrual {
        credit: Decimal::from(amount),
        periods: 1,
        last_update: datetime!(2024-06-01 12:00 UTC),
    };
    assert!(apply_accrual(pool, user.id, user.last_earnings_update, &accrual)
        .await
        .unwrap());
    reload(pool, user.id).await
}

fn all_requests(user_id: Uuid) -> RequestFilter {
    RequestFilter {
        user_id: Some(user_id),
        status: None,
        page: Page::new(None, None),
    }
}

#[sqlx::test]
async fn referral_sign_up_credits_the_referrer(pool: PgPool) {
    let referrer = sign_up(&pool, "referrer@example.com", None).await;
    let user = sign_up(&pool, "newbie@example.com", Some(&referrer)).await;

    assert_eq!(user.coins, 200);
    assert_eq!(user.referred_by, Some(referrer.id));

    let referrer = reload(&pool, referrer.id).await;
    assert_eq!(referrer.coins, 250);
    assert_eq!(referrer.referrals, 1);
    assert_eq!(count_unread(&pool, referrer.id).await.unwrap(), 1);
}

#[sqlx::test]
async fn taken_referral_code_is_redrawn(pool: PgPool) {
    let taken = ReferralCode::from("TAK1234".to_string());
    let fresh = ReferralCode::from("FRE5678".to_string());
    let now = datetime!(2024-06-01 00:00 UTC);

    let first = Email::parse("first@example.com").unwrap();
    register(&pool, &rewards(), &first, None, || taken.clone(), now)
        .await
        .unwrap();

    let second = Email::parse("second@example.com").unwrap();
    let mut codes = vec![taken.clone(), fresh.clone()].into_iter();
    let registration = register(&pool, &rewards(), &second, None, || codes.next().unwrap(), now)
        .await
        .unwrap();
    match registration {
        Registration::Created(user) => assert_eq!(user.referral_code, fresh),
        other => panic!("unexpected registration {:?}", other),
    }

    let third = Email::parse("third@example.com").unwrap();
    let err = register(&pool, &rewards(), &third, None, || taken.clone(), now)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::ServerError));
}

#[sqlx::test]
async fn registering_a_known_email_returns_the_stored_user(pool: PgPool) {
    let user = sign_up(&pool, "twice@example.com", None).await;
    let email = Email::parse("twice@example.com").unwrap();

    let registration = register(
        &pool,
        &rewards(),
        &email,
        None,
        || ReferralCode::new(&email),
        OffsetDateTime::now_utc(),
    )
    .await
    .unwrap();
    match registration {
        Registration::Existing(existing) => assert_eq!(existing.id, user.id),
        other => panic!("unexpected registration {:?}", other),
    }
}

#[sqlx::test]
async fn address_update_keeps_a_referral_applied_concurrently(pool: PgPool) {
    let me = sign_up(&pool, "me@example.com", None).await;
    let ref_a = sign_up(&pool, "alpha@example.com", None).await;
    let ref_b = sign_up(&pool, "bravo@example.com", None).await;
    let now = datetime!(2024-06-02 00:00 UTC);
    let snapshot = reload(&pool, me.id).await;

    let apply_a = ProfileUpdate {
        referral_code: Some(ref_a.referral_code.clone()),
        ..Default::default()
    };
    let merged = merge(&snapshot, apply_a, Some(&ref_a)).unwrap();
    update_profile(&pool, &merged, None, 50, now).await.unwrap();

    let address_only = ProfileUpdate {
        withdrawal_address: Some("TQn9Y2khEsLJW1ChVWFMSMeRDow5KcbLSE".into()),
        ..Default::default()
    };
    let merged = merge(&snapshot, address_only, None).unwrap();
    update_profile(&pool, &merged, None, 50, now).await.unwrap();

    let stored = reload(&pool, me.id).await;
    assert_eq!(stored.applied_referral_code, Some(ref_a.referral_code.clone()));
    assert_eq!(stored.referred_by, Some(ref_a.id));
    assert_eq!(
        stored.withdrawal_address.as_deref(),
        Some("TQn9Y2khEsLJW1ChVWFMSMeRDow5KcbLSE")
    );

    // the old snapshot still has no referral, so only the store can refuse B
    let apply_b = ProfileUpdate {
        referral_code: Some(ref_b.referral_code.clone()),
        ..Default::default()
    };
    let merged = merge(&snapshot, apply_b, Some(&ref_b)).unwrap();
    let err = update_profile(&pool, &merged, None, 50, now).await.unwrap_err();
    assert_eq!(err, DatabaseError::Conflict);

    assert_eq!(reload(&pool, ref_a.id).await.coins, 250);
    assert_eq!(reload(&pool, ref_b.id).await.coins, 200);
    assert_eq!(reload(&pool, me.id).await.referred_by, Some(ref_a.id));
}

#[sqlx::test]
async fn stale_expected_version_is_refused(pool: PgPool) {
    let me = sign_up(&pool, "versioned@example.com", None).await;
    let update = ProfileUpdate {
        withdrawal_address: Some("TAddr".into()),
        expected_version: Some(me.version),
        ..Default::default()
    };
    let now = datetime!(2024-06-02 00:00 UTC);

    let merged = merge(&me, update.clone(), None).unwrap();
    update_profile(&pool, &merged, update.expected_version, 50, now)
        .await
        .unwrap();

    let err = update_profile(&pool, &merged, update.expected_version, 50, now)
        .await
        .unwrap_err();
    assert_eq!(err, DatabaseError::Conflict);
}

#[sqlx::test]
async fn duplicate_accrual_is_applied_once(pool: PgPool) {
    let user = sign_up(&pool, "saver@example.com", None).await;
    let started = datetime!(2024-06-01 00:00 UTC);
    let plan = Plan {
        id: Uuid::new_v4(),
        user_id: user.id,
        offer_id: None,
        name: "Arbitrage Starter".into(),
        principal: Decimal::from(20),
        daily_rate: Decimal::new(8, 1),
        started_at: started,
        expires_at: started + Duration::days(28),
    };
    let mut tx = begin(&pool).await.unwrap();
    insert_plan(&mut tx, &plan).await.unwrap();
    commit(tx).await.unwrap();

    let engine = AccrualEngine::default();
    let plans = get_plans_for_user(&pool, user.id).await.unwrap();
    let first = engine.accrue_plans(None, started, &plans);
    assert!(apply_accrual(&pool, user.id, None, &first).await.unwrap());

    let now = started + Duration::days(3) + Duration::hours(2);
    let accrual = engine.accrue_plans(Some(first.last_update), now, &plans);
    assert_eq!(accrual.credit, Decimal::new(24, 1));

    assert!(apply_accrual(&pool, user.id, Some(first.last_update), &accrual)
        .await
        .unwrap());
    assert!(!apply_accrual(&pool, user.id, Some(first.last_update), &accrual)
        .await
        .unwrap());

    let stored = reload(&pool, user.id).await;
    assert_eq!(stored.earnings, Decimal::new(24, 1));
    assert_eq!(stored.last_earnings_update, Some(accrual.last_update));
}

#[sqlx::test]
async fn mining_payout_is_applied_once(pool: PgPool) {
    let user = sign_up(&pool, "digger@example.com", None).await;
    let timer = MiningTimer::new(Duration::hours(1), Duration::hours(1), 10);
    let start = datetime!(2024-06-05 08:00 UTC);

    let started = timer.start(MiningSession::Idle, start).unwrap();
    assert!(apply_mining_settlement(&pool, user.id, &started).await.unwrap());
    assert!(!apply_mining_settlement(&pool, user.id, &started).await.unwrap());

    let user = reload(&pool, user.id).await;
    let settled = timer.settle(user.mining, start + Duration::minutes(70));
    assert_eq!(settled.payout, 10);
    assert!(apply_mining_settlement(&pool, user.id, &settled).await.unwrap());
    assert!(!apply_mining_settlement(&pool, user.id, &settled).await.unwrap());

    let user = reload(&pool, user.id).await;
    assert_eq!(user.coins, 210);
    assert_eq!(
        user.mining,
        MiningSession::Cooldown {
            until: start + Duration::hours(2)
        }
    );
}

#[sqlx::test]
async fn debit_never_overdraws(pool: PgPool) {
    let user = sign_up(&pool, "thrifty@example.com", None).await;
    let user = fund(&pool, &user, 30).await;

    let mut tx = begin(&pool).await.unwrap();
    let err = debit_earnings(&mut tx, user.id, Decimal::from(31))
        .await
        .unwrap_err();
    assert_eq!(err, DatabaseError::Conflict);
    drop(tx);

    assert_eq!(reload(&pool, user.id).await.earnings, Decimal::from(30));
}

#[sqlx::test]
async fn approved_withdrawal_cannot_be_rejected(pool: PgPool) {
    let user = sign_up(&pool, "cashout@example.com", None).await;
    let user = fund(&pool, &user, 80).await;
    let now = datetime!(2024-06-05 12:00 UTC);

    let request =
        WithdrawalRequest::open(&user, Decimal::from(40), Some("TAddr".into()), Decimal::ONE, now)
            .unwrap();
    insert_withdrawal_request(&pool, &request).await.unwrap();

    let outcome = review_withdrawal(&pool, request.id, Decision::Approve, now)
        .await
        .unwrap();
    assert_eq!(outcome.request.status, RequestStatus::Approved);
    assert_eq!(reload(&pool, user.id).await.earnings, Decimal::from(40));

    let err = review_withdrawal(&pool, request.id, Decision::Reject, now)
        .await
        .unwrap_err();
    assert_eq!(err, ReviewError::Workflow(WorkflowError::AlreadyProcessed));

    let stored = get_withdrawal_requests(&pool, all_requests(user.id))
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].status, RequestStatus::Approved);
    assert_eq!(reload(&pool, user.id).await.earnings, Decimal::from(40));
    assert_eq!(count_unread(&pool, user.id).await.unwrap(), 1);

    let mut tx = begin(&pool).await.unwrap();
    let err = set_request_status(
        &mut tx,
        RequestTable::Withdrawals,
        request.id,
        RequestStatus::Rejected,
        Some(now),
    )
    .await
    .unwrap_err();
    assert_eq!(err, DatabaseError::Conflict);
}

#[sqlx::test]
async fn approval_without_funds_leaves_request_pending(pool: PgPool) {
    let user = sign_up(&pool, "spender@example.com", None).await;
    let user = fund(&pool, &user, 50).await;
    let now = datetime!(2024-06-05 12:00 UTC);

    let request =
        WithdrawalRequest::open(&user, Decimal::from(40), Some("TAddr".into()), Decimal::ONE, now)
            .unwrap();
    insert_withdrawal_request(&pool, &request).await.unwrap();

    let mut tx = begin(&pool).await.unwrap();
    debit_earnings(&mut tx, user.id, Decimal::from(30)).await.unwrap();
    commit(tx).await.unwrap();

    let err = review_withdrawal(&pool, request.id, Decision::Approve, now)
        .await
        .unwrap_err();
    assert_eq!(err, ReviewError::Workflow(WorkflowError::InsufficientBalance));

    let stored = get_withdrawal_requests(&pool, all_requests(user.id))
        .await
        .unwrap();
    assert_eq!(stored[0].status, RequestStatus::Pending);
    assert_eq!(stored[0].processed_at, None);
    assert_eq!(reload(&pool, user.id).await.earnings, Decimal::from(20));
    assert_eq!(count_unread(&pool, user.id).await.unwrap(), 0);
}

#[sqlx::test]
async fn approved_deposit_writes_plan_and_notification_once(pool: PgPool) {
    let user = sign_up(&pool, "investor@example.com", None).await;
    let offer = PlanOffer {
        id: Uuid::new_v4(),
        name: "Arbitrage Starter".into(),
        price: Decimal::from(20),
        daily_rate: Decimal::new(8, 1),
        duration_days: 28,
        is_active: true,
    };
    create_plan_offer(&pool, &offer).await.unwrap();

    let opened = datetime!(2024-06-02 09:00 UTC);
    let approved_at = datetime!(2024-06-03 15:30 UTC);
    let request = DepositRequest::open(&user, &offer, Some("tx-1".into()), opened).unwrap();
    insert_deposit_request(&pool, &request).await.unwrap();

    review_deposit(&pool, request.id, Decision::Approve, approved_at)
        .await
        .unwrap();
    let err = review_deposit(&pool, request.id, Decision::Reject, approved_at)
        .await
        .unwrap_err();
    assert_eq!(err, ReviewError::Workflow(WorkflowError::AlreadyProcessed));

    let plans = get_plans_for_user(&pool, user.id).await.unwrap();
    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0].expires_at, approved_at + Duration::days(28));
    assert_eq!(count_unread(&pool, user.id).await.unwrap(), 1);

    let stored = get_deposit_requests(&pool, all_requests(user.id))
        .await
        .unwrap();
    assert_eq!(stored[0].status, RequestStatus::Approved);
}

#[sqlx::test]
async fn unknown_request_is_not_found(pool: PgPool) {
    let err = review_withdrawal(
        &pool,
        Uuid::new_v4(),
        Decision::Approve,
        OffsetDateTime::now_utc(),
    )
    .await
    .unwrap_err();
    assert_eq!(err, ReviewError::Workflow(WorkflowError::NotFound));
}

#[sqlx::test]
async fn unread_count_is_not_limited_to_the_listed_page(pool: PgPool) {
    let user = sign_up(&pool, "reader@example.com", None).await;
    let now = datetime!(2024-06-05 12:00 UTC);

    let mut tx = begin(&pool).await.unwrap();
    for minute in 0..3 {
        let notification = Notification::new(
            user.id,
            format!("update {}", minute),
            now + Duration::minutes(minute),
        );
        insert_notification(&mut tx, &notification).await.unwrap();
    }
    commit(tx).await.unwrap();

    let page = get_notifications(&pool, user.id, 1).await.unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(count_unread(&pool, user.id).await.unwrap(), 3);

    mark_read(&pool, user.id, page[0].id).await.unwrap();
    assert_eq!(count_unread(&pool, user.id).await.unwrap(), 2);
}
