/// Evaluates a stage condition.
///
/// Empty, `true`, `yes` and `1` hold; `false`, `no` and `0` do not. The
/// comparison is trimmed and case-insensitive. Anything else is treated as
/// true so that unrecognised expressions never silently drop a stage.
pub fn evaluate_condition(condition: &str) -> bool {
    match condition.trim().to_ascii_lowercase().as_str() {
        "" | "true" | "yes" | "1" => true,
        "false" | "no" | "0" => false,
        other => {
            tracing::debug!(condition = other, "unrecognised stage condition, running stage");
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluate_condition() {
        for c in ["", "  ", "true", "TRUE", " Yes ", "1", "env.CI == 'true'"] {
            assert!(evaluate_condition(c), "{c:?} should hold");
        }
        for c in ["false", "False", " no", "NO", "0"] {
            assert!(!evaluate_condition(c), "{c:?} should not hold");
        }
    }
}
