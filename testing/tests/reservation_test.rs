//! Reservation scenarios: capacity gating, duplicate prevention, and the
//! remaining-capacity queries.

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]

use rollcall_core::error::ReserveError;
use rollcall_core::store::CapacityPolicyStore;
use rollcall_core::types::{
    CapacityPolicy, EnrollmentStatus, GuardianId, ParticipantId, ProgramId, Remaining,
};
use rollcall_testing::EnrollmentFixture;

async fn set_maximum(fixture: &EnrollmentFixture, program_id: ProgramId, maximum: u32) {
    fixture
        .store
        .upsert(CapacityPolicy {
            program_id,
            minimum: None,
            maximum: Some(maximum),
        })
        .await
        .expect("valid policy");
}

#[tokio::test]
async fn program_without_policy_is_unlimited() {
    let fixture = EnrollmentFixture::new();
    let program_id = ProgramId::new();

    for _ in 0..5 {
        fixture
            .service
            .reserve(program_id, ParticipantId::new(), GuardianId::new())
            .await
            .expect("no capacity limit configured");
    }

    assert_eq!(
        fixture.service.remaining_capacity(program_id).await,
        Ok(Remaining::Unlimited)
    );
    assert_eq!(fixture.store.active_count(program_id), 5);
}

#[tokio::test]
async fn last_seat_full_and_duplicate_are_distinguishable() {
    let fixture = EnrollmentFixture::new();
    let program_id = ProgramId::new();
    set_maximum(&fixture, program_id, 1).await;

    let participant_a = ParticipantId::new();
    let participant_b = ParticipantId::new();

    let enrollment = fixture
        .service
        .reserve(program_id, participant_a, GuardianId::new())
        .await
        .expect("first seat is free");
    assert_eq!(enrollment.status, EnrollmentStatus::Pending);

    // B hears "full", A hears "already booked": the UI must be able to
    // explain the two differently.
    assert_eq!(
        fixture
            .service
            .reserve(program_id, participant_b, GuardianId::new())
            .await,
        Err(ReserveError::Full)
    );
    assert_eq!(
        fixture
            .service
            .reserve(program_id, participant_a, GuardianId::new())
            .await,
        Err(ReserveError::Duplicate)
    );

    assert_eq!(fixture.store.active_count(program_id), 1);
}

#[tokio::test]
async fn duplicate_persists_through_confirmation() {
    let fixture = EnrollmentFixture::new();
    let program_id = ProgramId::new();
    let participant_id = ParticipantId::new();

    let enrollment = fixture
        .service
        .reserve(program_id, participant_id, GuardianId::new())
        .await
        .expect("unlimited program");
    fixture
        .service
        .confirm(enrollment.id)
        .await
        .expect("pending confirms");

    assert_eq!(
        fixture
            .service
            .reserve(program_id, participant_id, GuardianId::new())
            .await,
        Err(ReserveError::Duplicate)
    );
}

#[tokio::test]
async fn cancellation_frees_the_seat_and_lifts_the_duplicate() {
    let fixture = EnrollmentFixture::new();
    let program_id = ProgramId::new();
    set_maximum(&fixture, program_id, 1).await;

    let participant_a = ParticipantId::new();
    let participant_b = ParticipantId::new();

    let enrollment = fixture
        .service
        .reserve(program_id, participant_a, GuardianId::new())
        .await
        .expect("first seat is free");

    fixture
        .service
        .cancel(enrollment.id, "schedule conflict")
        .await
        .expect("active enrollment cancels");

    // The cancelled row no longer counts against capacity or uniqueness.
    let reclaimed = fixture
        .service
        .reserve(program_id, participant_b, GuardianId::new())
        .await
        .expect("seat was freed");
    assert_eq!(reclaimed.status, EnrollmentStatus::Pending);
    assert_eq!(
        fixture
            .service
            .reserve(program_id, participant_a, GuardianId::new())
            .await,
        Err(ReserveError::Full)
    );
}

#[tokio::test]
async fn remaining_capacity_tracks_active_enrollments() {
    let fixture = EnrollmentFixture::new();
    let program_id = ProgramId::new();
    set_maximum(&fixture, program_id, 12).await;

    let mut first = None;
    for _ in 0..5 {
        let enrollment = fixture
            .service
            .reserve(program_id, ParticipantId::new(), GuardianId::new())
            .await
            .expect("seats remain");
        first.get_or_insert(enrollment);
    }
    assert_eq!(
        fixture.service.remaining_capacity(program_id).await,
        Ok(Remaining::Seats(7))
    );

    // Completion is terminal and releases the seat.
    let first = first.expect("at least one reservation");
    fixture.service.confirm(first.id).await.expect("confirms");
    fixture.service.complete(first.id).await.expect("completes");
    assert_eq!(
        fixture.service.remaining_capacity(program_id).await,
        Ok(Remaining::Seats(8))
    );
}

#[tokio::test]
async fn batched_remaining_capacity_covers_every_requested_program() {
    let fixture = EnrollmentFixture::new();
    let capped = ProgramId::new();
    let empty = ProgramId::new();
    let unlimited = ProgramId::new();
    set_maximum(&fixture, capped, 2).await;
    set_maximum(&fixture, empty, 5).await;

    fixture
        .service
        .reserve(capped, ParticipantId::new(), GuardianId::new())
        .await
        .expect("seats remain");

    let remaining = fixture
        .service
        .remaining_capacity_for(&[capped, empty, unlimited])
        .await
        .expect("batch query");

    assert_eq!(remaining.len(), 3);
    assert_eq!(remaining[&capped], Remaining::Seats(1));
    assert_eq!(remaining[&empty], Remaining::Seats(5));
    assert_eq!(remaining[&unlimited], Remaining::Unlimited);
}

#[tokio::test]
async fn lowering_a_policy_never_underflows_remaining() {
    let fixture = EnrollmentFixture::new();
    let program_id = ProgramId::new();
    set_maximum(&fixture, program_id, 5).await;

    for _ in 0..4 {
        fixture
            .service
            .reserve(program_id, ParticipantId::new(), GuardianId::new())
            .await
            .expect("seats remain");
    }

    // Staff shrink the program below its current occupancy.
    set_maximum(&fixture, program_id, 2).await;
    assert_eq!(
        fixture.service.remaining_capacity(program_id).await,
        Ok(Remaining::Seats(0))
    );
    assert_eq!(
        fixture
            .service
            .reserve(program_id, ParticipantId::new(), GuardianId::new())
            .await,
        Err(ReserveError::Full)
    );
}
