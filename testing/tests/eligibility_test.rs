//! Eligibility scenarios: policy lookup, reason accumulation, reference-time
//! selection, and the interplay with `reserve`.

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]

use chrono::NaiveDate;
use rollcall_core::eligibility::{EligibilityOutcome, IneligibilityReason};
use rollcall_core::error::{EligibilityError, ReserveError};
use rollcall_core::store::EligibilityPolicyStore;
use rollcall_core::types::{
    EligibilityPolicy, EvaluationReference, GuardianId, ParticipantId, ProgramId,
};
use rollcall_testing::EnrollmentFixture;
use std::collections::BTreeSet;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn junior_policy(program_id: ProgramId) -> EligibilityPolicy {
    EligibilityPolicy {
        program_id,
        evaluation_reference: EvaluationReference::AtRequestTime,
        min_age_months: Some(48),
        max_age_months: Some(120),
        allowed_categories: Some(BTreeSet::from(["junior".to_string()])),
        min_rank: None,
        max_rank: None,
    }
}

#[tokio::test]
async fn program_without_policy_admits_unknown_participants() {
    let fixture = EnrollmentFixture::new();
    let program_id = ProgramId::new();

    // Nothing was seeded: no policy means the directory is never consulted.
    let outcome = fixture
        .service
        .check_eligibility(program_id, ParticipantId::new())
        .await
        .expect("no boundary lookups happen");
    assert_eq!(outcome, EligibilityOutcome::Eligible);
}

#[tokio::test]
async fn overage_member_gets_exactly_the_age_reason() {
    let fixture = EnrollmentFixture::new();
    let program_id = ProgramId::new();
    fixture
        .eligibility_policies
        .upsert(junior_policy(program_id))
        .await
        .expect("valid policy");

    // 200 months old at the fixed clock (2025-06-01), category passes.
    let participant_id = fixture.seed_participant(date(2008, 10, 1), "junior", 3);

    let outcome = fixture
        .service
        .check_eligibility(program_id, participant_id)
        .await
        .expect("lookup succeeds");
    assert_eq!(
        outcome,
        EligibilityOutcome::Ineligible(vec![IneligibilityReason::AgeTooHigh {
            max_months: 120,
            actual_months: 200,
        }])
    );
}

#[tokio::test]
async fn every_violated_predicate_is_reported() {
    let fixture = EnrollmentFixture::new();
    let program_id = ProgramId::new();
    let mut policy = junior_policy(program_id);
    policy.min_rank = Some(2);
    fixture
        .eligibility_policies
        .upsert(policy)
        .await
        .expect("valid policy");

    let participant_id = fixture.seed_participant(date(2008, 10, 1), "senior", 1);

    let outcome = fixture
        .service
        .check_eligibility(program_id, participant_id)
        .await
        .expect("lookup succeeds");
    let EligibilityOutcome::Ineligible(reasons) = outcome else {
        panic!("expected ineligible");
    };
    assert_eq!(reasons.len(), 3);
    assert!(matches!(reasons[0], IneligibilityReason::AgeTooHigh { .. }));
    assert!(matches!(
        reasons[1],
        IneligibilityReason::CategoryNotAllowed { .. }
    ));
    assert!(matches!(reasons[2], IneligibilityReason::RankTooLow { .. }));
}

#[tokio::test]
async fn program_start_reference_ages_the_participant_forward() {
    let fixture = EnrollmentFixture::new();
    let program_id = ProgramId::new();
    let mut policy = junior_policy(program_id);
    policy.evaluation_reference = EvaluationReference::AtProgramStart;
    fixture
        .eligibility_policies
        .upsert(policy)
        .await
        .expect("valid policy");

    // 47 months old today, 59 by the scheduled start a year out. Measured at
    // the start they clear the 48-month minimum.
    fixture.catalog.insert(program_id, Some(date(2026, 6, 1)));
    let participant_id = fixture.seed_participant(date(2021, 7, 1), "junior", 1);

    let outcome = fixture
        .service
        .check_eligibility(program_id, participant_id)
        .await
        .expect("lookup succeeds");
    assert_eq!(outcome, EligibilityOutcome::Eligible);
}

#[tokio::test]
async fn unscheduled_program_falls_back_to_request_time() {
    let fixture = EnrollmentFixture::new();
    let program_id = ProgramId::new();
    let mut policy = junior_policy(program_id);
    policy.evaluation_reference = EvaluationReference::AtProgramStart;
    fixture
        .eligibility_policies
        .upsert(policy)
        .await
        .expect("valid policy");

    // Program exists but has no start date yet; the same 47-month-old is
    // measured today and misses the minimum.
    fixture.catalog.insert(program_id, None);
    let participant_id = fixture.seed_participant(date(2021, 7, 1), "junior", 1);

    let outcome = fixture
        .service
        .check_eligibility(program_id, participant_id)
        .await
        .expect("lookup succeeds");
    assert_eq!(
        outcome,
        EligibilityOutcome::Ineligible(vec![IneligibilityReason::AgeTooLow {
            min_months: 48,
            actual_months: 47,
        }])
    );
}

#[tokio::test]
async fn unknown_participant_is_an_error_not_a_verdict() {
    let fixture = EnrollmentFixture::new();
    let program_id = ProgramId::new();
    fixture
        .eligibility_policies
        .upsert(junior_policy(program_id))
        .await
        .expect("valid policy");

    let unknown = ParticipantId::new();
    assert_eq!(
        fixture.service.check_eligibility(program_id, unknown).await,
        Err(EligibilityError::UnknownParticipant)
    );
    assert_eq!(
        fixture
            .service
            .reserve(program_id, unknown, GuardianId::new())
            .await,
        Err(ReserveError::NotFound)
    );
    assert!(fixture.store.all_enrollments().is_empty());
}

#[tokio::test]
async fn ineligible_reservation_writes_nothing() {
    let fixture = EnrollmentFixture::new();
    let program_id = ProgramId::new();
    fixture
        .eligibility_policies
        .upsert(junior_policy(program_id))
        .await
        .expect("valid policy");

    let participant_id = fixture.seed_participant(date(2008, 10, 1), "junior", 3);

    let result = fixture
        .service
        .reserve(program_id, participant_id, GuardianId::new())
        .await;
    assert!(matches!(result, Err(ReserveError::Ineligible(ref reasons)) if reasons.len() == 1));
    assert!(fixture.store.all_enrollments().is_empty());
}
