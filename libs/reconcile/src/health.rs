//! Health predicate over a service's check results.

use evalwatch_events::HealthCheck;

/// `true` when every check is `passing`.
///
/// An empty set is vacuously passing: the agent reports no checks for a
/// service that has none registered (yet).
pub fn all_passing(checks: &[HealthCheck]) -> bool {
    checks.iter().all(|check| check.status.is_passing())
}

#[cfg(test)]
mod tests {
    use super::*;
    use evalwatch_events::CheckStatus;
    use proptest::prelude::*;

    fn check(status: CheckStatus) -> HealthCheck {
        HealthCheck::new("web", status)
    }

    #[test]
    fn test_empty_is_passing() {
        assert!(all_passing(&[]));
    }

    #[test]
    fn test_warning_is_not_passing() {
        let checks = vec![check(CheckStatus::Passing), check(CheckStatus::Warning)];
        assert!(!all_passing(&checks));
    }

    fn status_strategy() -> impl Strategy<Value = CheckStatus> {
        prop_oneof![
            Just(CheckStatus::Passing),
            Just(CheckStatus::Warning),
            Just(CheckStatus::Critical),
            "[a-z]{1,8}".prop_map(CheckStatus::from),
        ]
    }

    proptest! {
        #[test]
        fn prop_only_passing_is_satisfied(n in 0usize..16) {
            let checks: Vec<_> = (0..n).map(|_| check(CheckStatus::Passing)).collect();
            prop_assert!(all_passing(&checks));
        }

        #[test]
        fn prop_any_non_passing_is_unsatisfied(
            statuses in proptest::collection::vec(status_strategy(), 1..16)
        ) {
            let checks: Vec<_> = statuses.iter().cloned().map(check).collect();
            let expected = statuses.iter().all(CheckStatus::is_passing);
            prop_assert_eq!(all_passing(&checks), expected);
        }
    }
}
