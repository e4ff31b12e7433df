use coinrig_server::domain::{
    accrual::AccrualEngine,
    errors::{MiningError, WorkflowError},
    fields::{Email, ReferralCode},
    mining::{MiningPhase, MiningSession, MiningTimer},
    requests::{process_deposit, process_withdrawal, Decision, DepositRequest, RequestStatus, WithdrawalRequest},
    user::{NewUser, PlanOffer, User, SIGNUP_BONUS},
};
use rust_decimal::Decimal;
use time::{macros::datetime, Duration, OffsetDateTime};
use uuid::Uuid;

fn member(earnings: i64) -> User {
    let email = Email::parse("member@example.com").unwrap();
    User {
        id: Uuid::new_v4(),
        referral_code: ReferralCode::new(&email),
        email,
        coins: SIGNUP_BONUS,
        earnings: Decimal::from(earnings),
        applied_referral_code: None,
        referred_by: None,
        withdrawal_address: Some("TQn9Y2khEsLJW1ChVWFMSMeRDow5KcbLSE".into()),
        last_earnings_update: None,
        mining: MiningSession::Idle,
        is_admin: false,
        referrals: 0,
        version: 1,
        created_on: datetime!(2024-06-01 00:00 UTC),
    }
}

fn starter_offer() -> PlanOffer {
    PlanOffer {
        id: Uuid::new_v4(),
        name: "Arbitrage Starter".into(),
        price: Decimal::from(20),
        daily_rate: Decimal::new(8, 1),
        duration_days: 28,
        is_active: true,
    }
}

#[test]
fn sign_up_grants_two_hundred_coins() {
    let email = Email::parse("fresh@example.com").unwrap();
    let referrer = member(0);
    let user = NewUser::new(email.clone(), ReferralCode::new(&email), SIGNUP_BONUS)
        .referred_by(&referrer);

    assert_eq!(user.coins, 200);
    assert_eq!(user.referred_by, Some(referrer.id));
    assert_eq!(user.applied_referral_code, Some(referrer.referral_code));
}

#[test]
fn approved_deposit_starts_a_28_day_plan_with_one_notification() {
    let user = member(0);
    let opened = datetime!(2024-06-02 09:00 UTC);
    let approved_at = datetime!(2024-06-03 15:30 UTC);

    let request = DepositRequest::open(&user, &starter_offer(), Some("tx-1".into()), opened).unwrap();
    assert_eq!(request.status, RequestStatus::Pending);
    assert_eq!(request.amount, Decimal::from(20));

    let outcome = process_deposit(request, Decision::Approve, approved_at).unwrap();
    let plan = outcome.plan.expect("approval creates a plan");

    assert_eq!(outcome.request.status, RequestStatus::Approved);
    assert_eq!(plan.expires_at, approved_at + Duration::days(28));
    assert!(plan.is_active(approved_at));
    assert_eq!(plan.user_id, user.id);
    assert_eq!(outcome.notification.user_id, user.id);
    assert!(!outcome.notification.read);
}

#[test]
fn withdrawal_over_balance_is_refused_up_front() {
    let user = member(50);
    let result = WithdrawalRequest::open(
        &user,
        Decimal::from(100),
        None,
        Decimal::from(5),
        OffsetDateTime::now_utc(),
    );
    assert_eq!(result.unwrap_err(), WorkflowError::InsufficientBalance);
}

#[test]
fn processed_requests_stay_processed() {
    let user = member(80);
    let now = datetime!(2024-06-05 12:00 UTC);
    let request = WithdrawalRequest::open(&user, Decimal::from(40), None, Decimal::from(5), now).unwrap();

    let approved = process_withdrawal(request, &user, Decision::Approve, now)
        .unwrap()
        .request;
    let err = process_withdrawal(approved.clone(), &user, Decision::Reject, now).unwrap_err();

    assert_eq!(err, WorkflowError::AlreadyProcessed);
    assert_eq!(approved.status, RequestStatus::Approved);
    assert_eq!(approved.processed_at, Some(now));
}

#[test]
fn plan_earnings_accrue_daily_and_only_once() {
    let user = member(0);
    let approved_at = datetime!(2024-06-03 00:00 UTC);
    let request = DepositRequest::open(&user, &starter_offer(), None, approved_at).unwrap();
    let plan = process_deposit(request, Decision::Approve, approved_at)
        .unwrap()
        .plan
        .unwrap();
    let plans = vec![plan];
    let engine = AccrualEngine::default();

    // first check only starts the clock
    let first = engine.accrue_plans(None, approved_at, &plans);
    assert_eq!(first.credit, Decimal::ZERO);

    let now = approved_at + Duration::days(3) + Duration::hours(5);
    let second = engine.accrue_plans(Some(first.last_update), now, &plans);
    assert_eq!(second.credit, Decimal::new(24, 1));

    let repeat = engine.accrue_plans(Some(second.last_update), now, &plans);
    assert_eq!(repeat.credit, Decimal::ZERO);

    // a long absence pays for the 28 plan days and nothing beyond
    let later = approved_at + Duration::days(90);
    let total = engine.accrue_plans(Some(first.last_update), later, &plans);
    assert_eq!(total.credit, Decimal::new(224, 1));
}

#[test]
fn mining_cycles_through_cooldown() {
    let timer = MiningTimer::new(Duration::hours(1), Duration::hours(1), 10);
    let start = datetime!(2024-06-05 08:00 UTC);

    let mining = timer.start(MiningSession::Idle, start).unwrap().session;
    assert_eq!(timer.status(mining, start + Duration::minutes(30)).progress, 50.0);

    let done = timer.settle(mining, start + Duration::minutes(61));
    assert_eq!(done.payout, 10);
    assert_eq!(
        timer.status(done.session, start + Duration::minutes(61)).phase,
        MiningPhase::Cooldown
    );

    let err = timer
        .start(done.session, start + Duration::minutes(90))
        .unwrap_err();
    assert_eq!(err, MiningError::CoolingDown { remaining_secs: 30 * 60 });

    let restarted = timer
        .start(done.session, start + Duration::hours(2))
        .unwrap();
    assert_eq!(restarted.payout, 0);
    assert_eq!(
        restarted.session,
        MiningSession::Mining {
            started_at: start + Duration::hours(2)
        }
    );
}
