//! The guarded value: a value that may not be initialized yet.
//!
//! `Uninitialized` is a single reserved state, not a language-level null.
//! Guarded computations propagate it with `?` on [`Guarded::get`] results,
//! so a body stops at the first uninitialized read.

use thiserror::Error;

/// Marker error returned when a guarded read hits an uninitialized value.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[error("value is not initialized")]
pub struct Uninitialized;

/// A value of type `T` or the `Uninitialized` state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Guarded<T> {
    #[default]
    Uninitialized,
    Initialized(T),
}

impl<T> Guarded<T> {
    pub fn is_initialized(&self) -> bool {
        matches!(self, Self::Initialized(_))
    }

    /// Unwraps into a `Result` suitable for `?` propagation.
    pub fn get(self) -> Result<T, Uninitialized> {
        match self {
            Self::Initialized(value) => Ok(value),
            Self::Uninitialized => Err(Uninitialized),
        }
    }

    pub fn as_ref(&self) -> Guarded<&T> {
        match self {
            Self::Initialized(value) => Guarded::Initialized(value),
            Self::Uninitialized => Guarded::Uninitialized,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Guarded<U> {
        match self {
            Self::Initialized(value) => Guarded::Initialized(f(value)),
            Self::Uninitialized => Guarded::Uninitialized,
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Initialized(value) => Some(value),
            Self::Uninitialized => None,
        }
    }
}

/// `None` is normalized to `Uninitialized`.
impl<T> From<Option<T>> for Guarded<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Self::Initialized(value),
            None => Self::Uninitialized,
        }
    }
}

impl<T> From<Result<Option<T>, Uninitialized>> for Guarded<T> {
    fn from(value: Result<Option<T>, Uninitialized>) -> Self {
        match value {
            Ok(Some(value)) => Self::Initialized(value),
            Ok(None) | Err(Uninitialized) => Self::Uninitialized,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_and_sentinel_collapse_to_uninitialized() {
        assert_eq!(Guarded::<u8>::from(None), Guarded::Uninitialized);
        assert_eq!(
            Guarded::<u8>::from(Ok::<_, Uninitialized>(None)),
            Guarded::Uninitialized
        );
        assert_eq!(
            Guarded::<u8>::from(Err::<Option<u8>, _>(Uninitialized)),
            Guarded::Uninitialized
        );
        assert_eq!(Guarded::from(Some(3u8)), Guarded::Initialized(3));
    }

    #[test]
    fn test_get_propagates_with_question_mark() {
        fn double(input: Guarded<u32>) -> Result<u32, Uninitialized> {
            Ok(input.get()? * 2)
        }

        assert_eq!(double(Guarded::Initialized(4)), Ok(8));
        assert_eq!(double(Guarded::Uninitialized), Err(Uninitialized));
    }
}
