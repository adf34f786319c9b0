use super::*;

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

fn entries(values: &[(i64, &str)]) -> HashMap<CriterionId, String> {
    values
        .iter()
        .map(|(id, raw)| (CriterionId(*id), raw.to_string()))
        .collect()
}

fn draft<'a>(
    catalog: Option<&'a CriterionCatalog>,
    entries: &'a HashMap<CriterionId, String>,
) -> SubmissionDraft<'a> {
    SubmissionDraft {
        round_id: RoundId(1),
        judge_id: JudgeId(7),
        team_id: Some(TeamId(3)),
        catalog,
        entries,
    }
}

#[test]
fn builds_submission_in_catalog_order() {
    let catalog = catalog();
    let entries = entries(&[(11, " 7 "), (10, "8")]);

    let submission = draft(Some(&catalog), &entries).build().expect("valid");

    assert_eq!(submission.team_id(), TeamId(3));
    assert_eq!(submission.judge_id(), JudgeId(7));
    assert_eq!(submission.total(), 15);
    assert_eq!(
        submission.to_request().scores_by_criterion,
        vec![
            CriterionScore {
                criterion_id: CriterionId(10),
                score: 8
            },
            CriterionScore {
                criterion_id: CriterionId(11),
                score: 7
            },
        ]
    );
}

#[test]
fn bounds_are_inclusive() {
    let catalog = catalog();
    for (value, ok) in [("-1", false), ("0", true), ("10", true), ("11", false)] {
        let entries = entries(&[(10, value), (11, "5")]);
        let result = draft(Some(&catalog), &entries).build();
        if ok {
            assert_eq!(
                result.expect("accepted").score_for(CriterionId(10)),
                Some(value.parse().expect("number"))
            );
        } else {
            assert_eq!(
                result.expect_err("rejected"),
                ScoringError::OutOfRange {
                    criterion: "Creativity".to_string(),
                    max_score: 10,
                }
            );
        }
    }
}

#[test]
fn missing_entry_names_the_criterion() {
    let catalog = catalog();
    let entries = entries(&[(10, "9")]);
    let err = draft(Some(&catalog), &entries).build().expect_err("missing");
    assert_eq!(
        err,
        ScoringError::MissingScore {
            criterion: "Timing".to_string()
        }
    );
    assert_eq!(err.to_string(), "enter a score for Timing");
}

#[test]
fn blank_entry_counts_as_missing() {
    let catalog = catalog();
    let entries = entries(&[(10, "   "), (11, "4")]);
    let err = draft(Some(&catalog), &entries).build().expect_err("blank");
    assert!(matches!(err, ScoringError::MissingScore { criterion } if criterion == "Creativity"));
}

#[test]
fn non_integer_entry_is_invalid() {
    let catalog = catalog();
    for raw in ["7.5", "seven", "99999999999999999999"] {
        let entries = entries(&[(10, raw), (11, "4")]);
        let err = draft(Some(&catalog), &entries).build().expect_err("invalid");
        assert!(matches!(err, ScoringError::InvalidScore { .. }), "{raw}: {err:?}");
    }
}

#[test]
fn first_failure_wins() {
    let catalog = catalog();
    let empty = HashMap::new();

    let mut no_team = draft(Some(&catalog), &empty);
    no_team.team_id = None;
    assert_eq!(no_team.build(), Err(ScoringError::NoTeamSelected));

    assert_eq!(
        draft(None, &empty).build(),
        Err(ScoringError::NoCriteriaLoaded)
    );

    let entries = entries(&[(10, "abc"), (11, "42")]);
    assert!(matches!(
        draft(Some(&catalog), &entries).build(),
        Err(ScoringError::InvalidScore { criterion }) if criterion == "Creativity"
    ));
}

#[test]
fn extra_entries_are_not_submitted() {
    let catalog = catalog();
    let entries = entries(&[(10, "1"), (11, "2"), (99, "5")]);
    let submission = draft(Some(&catalog), &entries).build().expect("valid");
    assert_eq!(submission.scores().len(), 2);
    assert_eq!(submission.score_for(CriterionId(99)), None);
}

fn request(scores: &[(i64, u32)]) -> ScoreSubmissionRequest {
    ScoreSubmissionRequest {
        team_id: TeamId(3),
        round_id: RoundId(1),
        judge_id: JudgeId(7),
        scores_by_criterion: scores
            .iter()
            .map(|(id, score)| CriterionScore {
                criterion_id: CriterionId(*id),
                score: *score,
            })
            .collect(),
    }
}

#[test]
fn wire_request_must_cover_catalog_exactly() {
    let catalog = catalog();

    let accepted =
        ScoreSubmission::from_request(&request(&[(11, 9), (10, 6)]), &catalog).expect("valid");
    assert_eq!(accepted.total(), 15);
    assert_eq!(accepted.scores()[0].criterion_id, CriterionId(10));

    assert_eq!(
        ScoreSubmission::from_request(&request(&[(10, 6)]), &catalog),
        Err(ScoringError::MissingScore {
            criterion: "Timing".to_string()
        })
    );
    assert_eq!(
        ScoreSubmission::from_request(&request(&[(10, 6), (11, 2), (12, 1)]), &catalog),
        Err(ScoringError::UnknownCriterion {
            criterion_id: CriterionId(12)
        })
    );
    assert_eq!(
        ScoreSubmission::from_request(&request(&[(10, 6), (10, 2), (11, 1)]), &catalog),
        Err(ScoringError::DuplicateCriterion {
            criterion_id: CriterionId(10)
        })
    );
    assert!(matches!(
        ScoreSubmission::from_request(&request(&[(10, 11), (11, 2)]), &catalog),
        Err(ScoringError::OutOfRange { max_score: 10, .. })
    ));
}

#[test]
fn wire_request_for_other_round_is_rejected() {
    let catalog = catalog();
    let mut other = request(&[(10, 1), (11, 1)]);
    other.round_id = RoundId(2);
    assert_eq!(
        ScoreSubmission::from_request(&other, &catalog),
        Err(ScoringError::RoundMismatch {
            expected: RoundId(1),
            actual: RoundId(2)
        })
    );
}
