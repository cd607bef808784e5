//! Conduct score domain types.
//!
//! Shared vocabulary for the approval core:
//! - reference data consumed from collaborators (students, classes, terms, criteria)
//! - the four persisted record kinds (self assessments, history snapshots,
//!   class/term gate status, term scores)
//! - the approval ladder (`Tier`) and the rank brackets (`Rank`)

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

mod ids;
mod rank;
mod record;
mod reference;
mod tier;

pub use ids::{ClassId, CriterionId, OptionId, StudentId};
pub use rank::Rank;
pub use record::{ClassTermStatus, HistorySnapshot, SelfAssessmentRecord, TermScore};
pub use reference::{ClassRef, Criterion, CriterionKind, CriterionOption, StudentRef, TermRef};
pub use tier::{ParseTierError, Tier};
