#![allow(dead_code)]

use chrono::NaiveDate;
use conduct_engine::{ConductEngine, EngineConfig, SaveSelfAssessmentRequest, SelfAssessmentItem};
use conduct_storage::memory::InMemoryConductStore;
use conduct_types::{
    ClassId, ClassRef, Criterion, CriterionId, CriterionKind, CriterionOption, OptionId,
    StudentId, StudentRef, TermRef,
};
use std::sync::Arc;

pub const TERM: &str = "2024-1";
pub const PREVIOUS_TERM: &str = "2023-2";
pub const CLASS_A: &str = "K65-CNTT1";
pub const CLASS_B: &str = "K65-CNTT2";
pub const FACULTY: &str = "CNTT";

pub struct Fixture {
    pub store: InMemoryConductStore,
    pub engine: ConductEngine,
}

pub async fn fixture() -> Fixture {
    fixture_with(EngineConfig::default()).await
}

pub async fn fixture_with(config: EngineConfig) -> Fixture {
    let store = InMemoryConductStore::new();

    for (id, code) in [(1, CLASS_A), (2, CLASS_B)] {
        store
            .insert_class(ClassRef {
                id: ClassId(id),
                code: code.to_string(),
                name: code.to_string(),
                faculty_code: FACULTY.to_string(),
            })
            .await;
    }

    for (id, code, class_id) in [(1, "SV001", 1), (2, "SV002", 1), (3, "SV003", 2)] {
        store
            .insert_student(StudentRef {
                id: StudentId(id),
                code: code.to_string(),
                full_name: format!("Student {code}"),
                class_id: ClassId(class_id),
            })
            .await
            .unwrap();
    }

    store
        .insert_term(TermRef {
            code: TERM.to_string(),
            name: "HK1 2024-2025".to_string(),
            starts_on: NaiveDate::from_ymd_opt(2024, 9, 1).unwrap(),
            is_open: true,
        })
        .await;
    store
        .insert_term(TermRef {
            code: PREVIOUS_TERM.to_string(),
            name: "HK2 2023-2024".to_string(),
            starts_on: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            is_open: true,
        })
        .await;

    let catalog = [
        choice(1, TERM, "STUDY", 20, false, &[(101, 20), (102, 15), (103, 5)]),
        choice(2, TERM, "RULES", 25, false, &[(201, 25), (202, 10)]),
        choice(3, TERM, "VOLUNTEER", 10, true, &[(301, 8), (302, 10)]),
        text(4, TERM, "CLUB", 5, true),
        text(5, TERM, "SELF", 20, false),
        choice(11, PREVIOUS_TERM, "STUDY", 20, false, &[(1101, 20), (1102, 12)]),
    ];
    for criterion in catalog {
        store.insert_criterion(criterion).await.unwrap();
    }

    let engine = ConductEngine::new(Arc::new(store.clone()), config);
    Fixture { store, engine }
}

fn choice(
    id: i64,
    term: &str,
    code: &str,
    max_points: i32,
    requires_verification: bool,
    options: &[(i64, i32)],
) -> Criterion {
    Criterion {
        id: CriterionId(id),
        term_code: term.to_string(),
        code: code.to_string(),
        title: code.to_lowercase(),
        kind: CriterionKind::Choice,
        max_points,
        requires_verification,
        options: options
            .iter()
            .map(|(id, points)| CriterionOption {
                id: OptionId(*id),
                label: format!("{points} points"),
                points: *points,
            })
            .collect(),
    }
}

fn text(id: i64, term: &str, code: &str, max_points: i32, requires_verification: bool) -> Criterion {
    Criterion {
        id: CriterionId(id),
        term_code: term.to_string(),
        code: code.to_string(),
        title: code.to_lowercase(),
        kind: CriterionKind::Text,
        max_points,
        requires_verification,
        options: vec![],
    }
}

pub fn option(criterion_code: &str, option_id: i64) -> SelfAssessmentItem {
    SelfAssessmentItem {
        criterion_code: criterion_code.to_string(),
        option_id: Some(OptionId(option_id)),
        text_value: None,
        score: None,
    }
}

pub fn scored(criterion_code: &str, score: i32) -> SelfAssessmentItem {
    SelfAssessmentItem {
        criterion_code: criterion_code.to_string(),
        option_id: None,
        text_value: None,
        score: Some(score),
    }
}

pub fn described(criterion_code: &str, text: &str) -> SelfAssessmentItem {
    SelfAssessmentItem {
        criterion_code: criterion_code.to_string(),
        option_id: None,
        text_value: Some(text.to_string()),
        score: None,
    }
}

pub fn save_request(student: &str, items: Vec<SelfAssessmentItem>) -> SaveSelfAssessmentRequest {
    SaveSelfAssessmentRequest {
        student_code: student.to_string(),
        term_code: TERM.to_string(),
        items,
        submitted_by: None,
    }
}
