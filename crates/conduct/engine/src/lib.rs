//! Conduct score approval core.
//!
//! Turns students' self-reported criterion scores into an authoritative,
//! rank-classified term score through a fixed ladder of reviewing tiers:
//!
//! 1. the score ledger records self assessments while a term is open
//! 2. the verification sub-ledger holds selected criteria at zero until a
//!    verifier confirms participation
//! 3. each reviewing tier accepts a class (or faculty) in one transaction,
//!    carrying forward the nearest subordinate total and flipping its gate
//!
//! Every mutation goes through [`ConductEngine`], which opens one storage
//! transaction per call and commits only when the whole operation succeeds.

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

pub mod aggregation;
pub mod approval;
pub mod config;
mod engine;
pub mod error;
pub mod history;
pub mod ledger;
mod lookup;
pub mod verification;

pub use aggregation::Aggregate;
pub use approval::{AcceptOutcome, AcceptRequest, ApprovalScope, RecordTierScoreRequest};
pub use config::EngineConfig;
pub use engine::ConductEngine;
pub use error::{ConductError, ConductResult, ConstraintKind, GateReason};
pub use history::TermHistoryEntry;
pub use ledger::{SaveOutcome, SaveSelfAssessmentRequest, SelfAssessmentItem};
pub use verification::{
    ConfirmOutcome, ConfirmVerificationRequest, PendingVerification, UnconfirmOutcome,
};
