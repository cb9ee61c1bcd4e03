//! Handler return values and their mapping to process exit codes.

use std::fmt;

use serde_json::Value;

/// The normalized result of one handler invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Exit 0.
    Success,
    /// Exit 1.
    Failure,
    /// An explicit exit code; must lie in `0..=255` to be honored.
    ExitCode(i64),
    /// The handler reported an error or returned something unsupported.
    Internal(String),
}

/// Conversion of handler return values into an [`Outcome`].
///
/// # Examples
///
/// ```
/// use autocli_dispatch::{IntoOutcome, Outcome};
///
/// assert_eq!(().into_outcome(), Outcome::Success);
/// assert_eq!(false.into_outcome(), Outcome::Failure);
/// assert_eq!(7_i32.into_outcome(), Outcome::ExitCode(7));
/// assert_eq!(None::<bool>.into_outcome(), Outcome::Success);
/// assert!(matches!("oops".into_outcome(), Outcome::Internal(_)));
/// ```
pub trait IntoOutcome {
    fn into_outcome(self) -> Outcome;
}

impl IntoOutcome for Outcome {
    fn into_outcome(self) -> Outcome {
        self
    }
}

impl IntoOutcome for () {
    fn into_outcome(self) -> Outcome {
        Outcome::Success
    }
}

impl IntoOutcome for bool {
    fn into_outcome(self) -> Outcome {
        if self {
            Outcome::Success
        } else {
            Outcome::Failure
        }
    }
}

macro_rules! impl_int_outcome {
    ($($ty:ty),*) => {
        $(
            impl IntoOutcome for $ty {
                fn into_outcome(self) -> Outcome {
                    Outcome::ExitCode(i64::from(self))
                }
            }
        )*
    };
}

impl_int_outcome!(u8, i32, i64);

impl<T: IntoOutcome> IntoOutcome for Option<T> {
    fn into_outcome(self) -> Outcome {
        match self {
            Some(value) => value.into_outcome(),
            None => Outcome::Success,
        }
    }
}

impl<T: IntoOutcome, E: fmt::Display> IntoOutcome for Result<T, E> {
    fn into_outcome(self) -> Outcome {
        match self {
            Ok(value) => value.into_outcome(),
            Err(err) => Outcome::Internal(err.to_string()),
        }
    }
}

impl IntoOutcome for String {
    fn into_outcome(self) -> Outcome {
        Outcome::Internal(format!("unsupported return value {self:?}"))
    }
}

impl IntoOutcome for &'static str {
    fn into_outcome(self) -> Outcome {
        self.to_string().into_outcome()
    }
}

/// Dynamically typed returns follow the same rules as their static counterparts.
impl IntoOutcome for Value {
    fn into_outcome(self) -> Outcome {
        match self {
            Value::Null => Outcome::Success,
            Value::Bool(ok) => ok.into_outcome(),
            Value::Number(n) => match n.as_i64() {
                Some(code) => Outcome::ExitCode(code),
                None => Outcome::Internal(format!("unsupported return value {n}")),
            },
            other => Outcome::Internal(format!("unsupported return value {other}")),
        }
    }
}

/// A process exit code in `0..=255`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExitOutcome(u8);

impl ExitOutcome {
    pub const SUCCESS: Self = Self(0);
    pub const FAILURE: Self = Self(1);
    pub const USAGE: Self = Self(2);

    pub fn new(code: u8) -> Self {
        Self(code)
    }

    pub fn code(self) -> u8 {
        self.0
    }

    pub fn is_success(self) -> bool {
        self.0 == 0
    }

    /// Converts an explicit exit code, rejecting values outside `0..=255`.
    pub fn from_code(code: i64) -> Option<Self> {
        u8::try_from(code).ok().map(Self)
    }
}

impl fmt::Display for ExitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<ExitOutcome> for std::process::ExitCode {
    fn from(outcome: ExitOutcome) -> Self {
        std::process::ExitCode::from(outcome.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_outcomes() {
        let ok: Result<(), String> = Ok(());
        assert_eq!(ok.into_outcome(), Outcome::Success);

        let code: Result<i32, String> = Ok(3);
        assert_eq!(code.into_outcome(), Outcome::ExitCode(3));

        let err: Result<(), String> = Err("disk full".into());
        assert_eq!(err.into_outcome(), Outcome::Internal("disk full".into()));
    }

    #[test]
    fn test_string_is_internal() {
        match String::from("done").into_outcome() {
            Outcome::Internal(msg) => assert!(msg.contains("done")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_json_values() {
        assert_eq!(Value::Null.into_outcome(), Outcome::Success);
        assert_eq!(Value::Bool(false).into_outcome(), Outcome::Failure);
        assert_eq!(serde_json::json!(4).into_outcome(), Outcome::ExitCode(4));
        assert!(matches!(
            serde_json::json!(1.5).into_outcome(),
            Outcome::Internal(_)
        ));
        assert!(matches!(
            serde_json::json!({"a": 1}).into_outcome(),
            Outcome::Internal(_)
        ));
    }

    #[test]
    fn test_exit_code_range() {
        assert_eq!(ExitOutcome::from_code(0), Some(ExitOutcome::SUCCESS));
        assert_eq!(ExitOutcome::from_code(255).map(ExitOutcome::code), Some(255));
        assert_eq!(ExitOutcome::from_code(256), None);
        assert_eq!(ExitOutcome::from_code(-1), None);
    }
}
