use super::*;

fn criterion(id: i64, name: &str, max_score: u32) -> Criterion {
    Criterion {
        id: CriterionId(id),
        name: name.to_string(),
        max_score,
    }
}

#[test]
fn empty_rubric_is_not_found() {
    let err = CriterionCatalog::new(RoundId(4), Vec::new()).expect_err("must fail");
    assert_eq!(err, ScoringError::NotFound { round_id: RoundId(4) });
}

#[test]
fn keeps_authoring_order() {
    let catalog = CriterionCatalog::new(
        RoundId(1),
        vec![criterion(9, "Timing", 10), criterion(2, "Creativity", 5)],
    )
    .expect("catalog");

    let ids: Vec<_> = catalog.ids().collect();
    assert_eq!(ids, vec![CriterionId(9), CriterionId(2)]);
    assert_eq!(catalog.len(), 2);
    assert_eq!(catalog.max_total(), 15);
    assert_eq!(
        catalog.get(CriterionId(2)).map(|c| c.name.as_str()),
        Some("Creativity")
    );
    assert!(!catalog.contains(CriterionId(3)));
}

#[test]
fn rejects_blank_names_and_repeated_ids() {
    let blank = CriterionCatalog::new(RoundId(1), vec![criterion(1, "  ", 10)]);
    assert!(matches!(blank, Err(ScoringError::InvalidCriterion { .. })));

    let repeated = CriterionCatalog::new(
        RoundId(1),
        vec![criterion(1, "Timing", 10), criterion(1, "Timing again", 10)],
    );
    assert!(matches!(repeated, Err(ScoringError::InvalidCriterion { .. })));
}

#[test]
fn zero_max_score_is_a_valid_criterion() {
    let catalog =
        CriterionCatalog::new(RoundId(1), vec![criterion(1, "Attendance", 0)]).expect("catalog");
    assert_eq!(catalog.max_total(), 0);
}

#[test]
fn authored_criterion_needs_a_name() {
    assert!(validate_authored_criterion(&NewCriterion {
        name: "Stage presence".to_string(),
        max_score: 20,
    })
    .is_ok());
    assert!(validate_authored_criterion(&NewCriterion {
        name: String::new(),
        max_score: 20,
    })
    .is_err());
}
