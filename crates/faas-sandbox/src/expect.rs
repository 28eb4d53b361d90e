use std::fmt::Debug;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// A single assertion failure, as surfaced by one of the `expect_*` helpers
/// below into a test case's `Result`.
#[derive(Debug, Clone)]
pub struct TestFailure(pub String);

impl std::fmt::Display for TestFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub fn expect_to_be<T: PartialEq + Debug>(actual: T, expected: T) -> Result<(), TestFailure> {
    if actual == expected {
        Ok(())
    } else {
        Err(TestFailure(format!(
            "expected {actual:?} toBe {expected:?}"
        )))
    }
}

pub fn expect_to_equal<T: PartialEq + Debug>(actual: T, expected: T) -> Result<(), TestFailure> {
    if actual == expected {
        Ok(())
    } else {
        Err(TestFailure(format!(
            "expected {actual:?} toEqual {expected:?}"
        )))
    }
}

pub fn expect_truthy(actual: bool) -> Result<(), TestFailure> {
    if actual {
        Ok(())
    } else {
        Err(TestFailure("expected value toBeTruthy".to_string()))
    }
}

pub fn expect_falsy(actual: bool) -> Result<(), TestFailure> {
    if !actual {
        Ok(())
    } else {
        Err(TestFailure("expected value toBeFalsy".to_string()))
    }
}

pub fn expect_contain(haystack: &str, needle: &str) -> Result<(), TestFailure> {
    if haystack.contains(needle) {
        Ok(())
    } else {
        Err(TestFailure(format!(
            "expected {haystack:?} toContain {needle:?}"
        )))
    }
}

pub fn expect_match(actual: &str, pattern: &str) -> Result<(), TestFailure> {
    let re = regex::Regex::new(pattern)
        .map_err(|e| TestFailure(format!("invalid toMatch pattern {pattern:?}: {e}")))?;
    if re.is_match(actual) {
        Ok(())
    } else {
        Err(TestFailure(format!(
            "expected {actual:?} toMatch /{pattern}/"
        )))
    }
}

/// `toThrow`: the supplied closure is expected to panic. Since the sandbox
/// has no interpreted exception model, a Rust panic stands in for a thrown
/// error — this mirrors how the console/test harness as a whole represents
/// "code" as registered Rust callables rather than evaluated source text.
pub fn expect_to_throw<F: FnOnce() + std::panic::UnwindSafe>(f: F) -> Result<(), TestFailure> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(()) => Err(TestFailure("expected function toThrow".to_string())),
        Err(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_be_and_to_equal() {
        assert!(expect_to_be(1, 1).is_ok());
        assert!(expect_to_be(1, 2).is_err());
        assert!(expect_to_equal(vec![1, 2], vec![1, 2]).is_ok());
    }

    #[test]
    fn truthy_falsy() {
        assert!(expect_truthy(true).is_ok());
        assert!(expect_falsy(false).is_ok());
        assert!(expect_truthy(false).is_err());
    }

    #[test]
    fn contain_and_match() {
        assert!(expect_contain("hello world", "world").is_ok());
        assert!(expect_contain("hello world", "bye").is_err());
        assert!(expect_match("abc123", r"^\w+\d+$").is_ok());
        assert!(expect_match("abc123", r"^\d+$").is_err());
    }

    #[test]
    fn throw_catches_panic() {
        assert!(expect_to_throw(|| panic!("boom")).is_ok());
        assert!(expect_to_throw(|| {}).is_err());
    }
}
