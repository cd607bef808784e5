use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }
    };
}

numeric_id!(
    /// Storage identifier of a student.
    StudentId
);
numeric_id!(
    /// Storage identifier of a class.
    ClassId
);
numeric_id!(
    /// Storage identifier of a criterion within a term's catalog.
    CriterionId
);
numeric_id!(
    /// Storage identifier of a choice option of a criterion.
    OptionId
);
