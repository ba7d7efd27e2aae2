//! Concurrency properties of the reservation transaction.
//!
//! The central guarantee: for a program with maximum N, any number of
//! concurrent `reserve` calls yields exactly N active enrollments; the rest
//! are told the program is full.

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]

use rollcall_core::error::ReserveError;
use rollcall_core::store::CapacityPolicyStore;
use rollcall_core::types::{CapacityPolicy, GuardianId, ParticipantId, ProgramId};
use rollcall_testing::EnrollmentFixture;
use std::sync::Arc;

const MAXIMUM: u32 = 8;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn no_overselling_under_concurrent_reservations() {
    let fixture = EnrollmentFixture::new();
    let program_id = ProgramId::new();
    fixture
        .store
        .upsert(CapacityPolicy {
            program_id,
            minimum: None,
            maximum: Some(MAXIMUM),
        })
        .await
        .expect("valid policy");

    let EnrollmentFixture { store, service, .. } = fixture;
    let service = Arc::new(service);

    // Twice as many hopefuls as seats, all racing.
    let mut tasks = Vec::new();
    for _ in 0..(2 * MAXIMUM) {
        let service = Arc::clone(&service);
        tasks.push(tokio::spawn(async move {
            service
                .reserve(program_id, ParticipantId::new(), GuardianId::new())
                .await
        }));
    }

    let mut accepted = 0usize;
    let mut rejected_full = 0usize;
    for task in tasks {
        match task.await.expect("task completes") {
            Ok(_) => accepted += 1,
            Err(ReserveError::Full) => rejected_full += 1,
            Err(other) => panic!("unexpected reservation outcome: {other:?}"),
        }
    }

    assert_eq!(accepted, MAXIMUM as usize);
    assert_eq!(rejected_full, MAXIMUM as usize);
    assert_eq!(store.active_count(program_id), MAXIMUM as usize);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_duplicates_yield_one_active_enrollment() {
    let fixture = EnrollmentFixture::new();
    let program_id = ProgramId::new();
    let participant_id = ParticipantId::new();

    let EnrollmentFixture { store, service, .. } = fixture;
    let service = Arc::new(service);

    let mut tasks = Vec::new();
    for _ in 0..6 {
        let service = Arc::clone(&service);
        tasks.push(tokio::spawn(async move {
            service
                .reserve(program_id, participant_id, GuardianId::new())
                .await
        }));
    }

    let mut accepted = 0usize;
    for task in tasks {
        match task.await.expect("task completes") {
            Ok(_) => accepted += 1,
            Err(ReserveError::Duplicate) => {}
            Err(other) => panic!("unexpected reservation outcome: {other:?}"),
        }
    }

    assert_eq!(accepted, 1);
    assert_eq!(store.active_count(program_id), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn contention_is_scoped_per_program() {
    // Reservations on one program must not be serialized away by a full,
    // contended sibling; both programs settle to their own maximums.
    let fixture = EnrollmentFixture::new();
    let contended = ProgramId::new();
    let quiet = ProgramId::new();
    for (program_id, maximum) in [(contended, 2), (quiet, 16)] {
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

    let EnrollmentFixture { store, service, .. } = fixture;
    let service = Arc::new(service);

    let mut tasks = Vec::new();
    for n in 0..24 {
        let service = Arc::clone(&service);
        let target = if n % 2 == 0 { contended } else { quiet };
        tasks.push(tokio::spawn(async move {
            service
                .reserve(target, ParticipantId::new(), GuardianId::new())
                .await
        }));
    }
    for task in tasks {
        let _ = task.await.expect("task completes");
    }

    assert_eq!(store.active_count(contended), 2);
    assert_eq!(store.active_count(quiet), 12);
}
