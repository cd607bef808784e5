//! Reference data owned by external catalog services and read by the core.

use crate::ids::{ClassId, CriterionId, OptionId, StudentId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentRef {
    pub id: StudentId,
    pub code: String,
    pub full_name: String,
    pub class_id: ClassId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassRef {
    pub id: ClassId,
    pub code: String,
    pub name: String,
    pub faculty_code: String,
}

/// An assessment term. Self assessments are accepted only while `is_open`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermRef {
    pub code: String,
    pub name: String,
    pub starts_on: NaiveDate,
    pub is_open: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CriterionKind {
    /// Student picks one of the criterion's options.
    Choice,
    /// Student describes participation in free text.
    Text,
}

impl CriterionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Choice => "choice",
            Self::Text => "text",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "choice" => Some(Self::Choice),
            "text" => Some(Self::Text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriterionOption {
    pub id: OptionId,
    pub label: String,
    pub points: i32,
}

/// One line of a term's criteria catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Criterion {
    pub id: CriterionId,
    pub term_code: String,
    pub code: String,
    pub title: String,
    pub kind: CriterionKind,
    pub max_points: i32,
    pub requires_verification: bool,
    #[serde(default)]
    pub options: Vec<CriterionOption>,
}

impl Criterion {
    pub fn option(&self, option_id: OptionId) -> Option<&CriterionOption> {
        self.options.iter().find(|o| o.id == option_id)
    }

    /// Points earned by a confirmed participation with the given submission.
    ///
    /// Choice criteria pay the matched option; text criteria pay full marks
    /// for any non-empty description.
    pub fn participation_points(
        &self,
        option_id: Option<OptionId>,
        text_value: Option<&str>,
    ) -> i32 {
        match self.kind {
            CriterionKind::Choice => option_id
                .and_then(|id| self.option(id))
                .map(|o| o.points)
                .unwrap_or(0),
            CriterionKind::Text => {
                if text_value.is_some_and(|t| !t.trim().is_empty()) {
                    self.max_points
                } else {
                    0
                }
            }
        }
    }
}
