use super::*;
use shared::domain::{Criterion, CriterionId, RoundId};
use std::{sync::Barrier, time::Duration};

fn roster() -> Vec<TeamReference> {
    vec![
        TeamReference {
            id: TeamId(1),
            name: "Rhythm Collective".to_string(),
            member_count: 6,
        },
        TeamReference {
            id: TeamId(2),
            name: "Beat Street".to_string(),
            member_count: 4,
        },
    ]
}

fn catalog() -> CriterionCatalog {
    CriterionCatalog::new(
        RoundId(1),
        vec![
            Criterion {
                id: CriterionId(10),
                name: "Creativity".to_string(),
                max_score: 10,
            },
            Criterion {
                id: CriterionId(11),
                name: "Timing".to_string(),
                max_score: 10,
            },
        ],
    )
    .expect("catalog")
}

#[test]
fn starts_with_two_pending_loads() {
    let (gate, _roster, _criteria) = ReadinessGate::new();
    assert_eq!(gate.pending(), 2);
    assert!(!gate.is_loading_finished());
    assert!(!gate.can_score(Some(TeamId(1))));
}

#[test]
fn roster_success_with_criteria_failure_finishes_but_is_not_ready() {
    let (gate, roster_ticket, criteria_ticket) = ReadinessGate::new();

    roster_ticket.complete(Ok(roster()));
    assert!(!gate.is_loading_finished());

    criteria_ticket.complete(Err(ScoringError::external("criteria service unavailable")));

    assert!(gate.is_loading_finished());
    assert!(!gate.loads_succeeded());
    assert!(!gate.can_score(Some(TeamId(1))));
    assert_eq!(gate.failures(), vec!["criteria service unavailable".to_string()]);
    assert_eq!(
        gate.snapshot(),
        GateSnapshot {
            pending: 0,
            roster: LoadStatus::Loaded,
            criteria: LoadStatus::Failed("criteria service unavailable".to_string()),
        }
    );
}

#[test]
fn completion_order_does_not_change_final_state() {
    let (first, roster_a, criteria_a) = ReadinessGate::new();
    roster_a.complete(Ok(roster()));
    criteria_a.complete(Ok(catalog()));

    let (second, roster_b, criteria_b) = ReadinessGate::new();
    criteria_b.complete(Ok(catalog()));
    roster_b.complete(Ok(roster()));

    assert_eq!(first.snapshot(), second.snapshot());
    assert!(first.loads_succeeded());
    assert!(second.loads_succeeded());
    assert_eq!(first.can_score(Some(TeamId(2))), second.can_score(Some(TeamId(2))));
}

#[test]
fn team_selection_alone_is_not_enough() {
    let (gate, roster_ticket, criteria_ticket) = ReadinessGate::new();
    roster_ticket.complete(Ok(roster()));
    criteria_ticket.complete(Ok(catalog()));

    assert!(!gate.can_score(None));
    assert!(!gate.can_score(Some(TeamId(99))));
    assert!(gate.can_score(Some(TeamId(1))));
}

#[test]
fn dropped_ticket_counts_as_failed_load() {
    let (gate, roster_ticket, criteria_ticket) = ReadinessGate::new();
    criteria_ticket.complete(Ok(catalog()));
    drop(roster_ticket);

    assert!(gate.is_loading_finished());
    assert!(matches!(gate.snapshot().roster, LoadStatus::Failed(_)));
    assert!(gate.roster().is_none());
}

#[test]
fn simultaneous_completions_fire_exactly_once() {
    for _ in 0..200 {
        let (gate, roster_ticket, criteria_ticket) = ReadinessGate::new();
        let mut finished = gate.subscribe_finished();
        let barrier = Barrier::new(2);

        std::thread::scope(|scope| {
            scope.spawn(|| {
                barrier.wait();
                roster_ticket.complete(Ok(roster()));
            });
            scope.spawn(|| {
                barrier.wait();
                criteria_ticket.complete(Ok(catalog()));
            });
        });

        assert_eq!(gate.pending(), 0);
        assert!(finished.has_changed().expect("sender alive"));
        assert!(*finished.borrow_and_update());
        assert!(!finished.has_changed().expect("sender alive"));
        assert!(gate.loads_succeeded());
    }
}

#[tokio::test]
async fn waiters_resume_when_last_load_completes() {
    let (gate, roster_ticket, criteria_ticket) = ReadinessGate::new();
    let waiter = {
        let gate = gate.clone();
        tokio::spawn(async move { gate.wait_loading_finished().await })
    };

    roster_ticket.complete(Ok(roster()));
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(!waiter.is_finished());

    criteria_ticket.complete(Err(ScoringError::NotFound {
        round_id: RoundId(1),
    }));
    tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .expect("waiter resumes")
        .expect("join");
    assert!(gate.is_loading_finished());
}

#[tokio::test]
async fn late_subscribers_see_finished_signal() {
    let (gate, roster_ticket, criteria_ticket) = ReadinessGate::new();
    roster_ticket.complete(Ok(roster()));
    criteria_ticket.complete(Ok(catalog()));

    tokio::time::timeout(Duration::from_millis(100), gate.wait_loading_finished())
        .await
        .expect("already finished");
}
