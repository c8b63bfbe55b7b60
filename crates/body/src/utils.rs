//! Utility macros shared by the body decoders.

/// A macro for early returns with an error if a condition is not met.
///
/// This is similar to the `assert!` macro, but returns an error instead of panicking.
/// It's useful for limit checks where decoding must stop as soon as the
/// condition no longer holds.
///
/// # Arguments
///
/// * `$predicate` - A boolean expression that should evaluate to true
/// * `$error` - The error value to return if the predicate is false
///
/// # Example
///
/// ```ignore
/// ensure!(received <= limit, BodyError::payload_too_large(received, limit));
/// ```
macro_rules! ensure {
    ($predicate:expr, $error:expr) => {
        if !$predicate {
            return Err($error);
        }
    };
}

pub(crate) use ensure;
