//! Method selection
//!
//! Candidates are ordered from least to most specific. The most specific
//! candidate whose required fields are all known wins.

/// Pick the 1-based rank of the most specific fully-applicable candidate.
///
/// Falls back to rank 1 when nothing applies, so some strategy is always tried.
pub fn select_method<V: AsRef<[bool]>>(candidates: &[V]) -> usize {
    candidates
        .iter()
        .rposition(|vector| vector.as_ref().iter().all(|known| *known))
        .map(|index| index + 1)
        .unwrap_or(1)
}

/// How a remote object is looked up, from least to most specific
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LookupStrategy {
    /// Nothing identifying is known
    Nothing,
    /// Page through the collection and match details on the secondary key
    ScanByKey,
    /// Direct get by secondary key
    ByKey,
    /// Direct get by id
    ById,
}

impl LookupStrategy {
    /// Choose a strategy from what the caller knows and what the kind supports
    pub fn choose(has_id: bool, has_key: bool, supports_key_lookup: bool) -> Self {
        let candidates: [&[bool]; 4] = [
            &[],
            &[has_key],
            &[has_key, supports_key_lookup],
            &[has_id],
        ];

        match select_method(&candidates) {
            4 => LookupStrategy::ById,
            3 => LookupStrategy::ByKey,
            2 => LookupStrategy::ScanByKey,
            _ => LookupStrategy::Nothing,
        }
    }

    /// Next less specific strategy to try after this one came up empty
    pub fn degrade(self, has_key: bool, supports_key_lookup: bool) -> Self {
        match self {
            LookupStrategy::ById => LookupStrategy::choose(false, has_key, supports_key_lookup),
            LookupStrategy::ByKey => LookupStrategy::ScanByKey,
            LookupStrategy::ScanByKey | LookupStrategy::Nothing => LookupStrategy::Nothing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_optional_name() {
        assert_eq!(select_method(&[vec![], vec![true]]), 2);
        assert_eq!(select_method(&[vec![], vec![false]]), 1);
    }

    #[test]
    fn test_highest_fully_true_wins() {
        let candidates = vec![vec![false], vec![true, true], vec![true]];
        assert_eq!(select_method(&candidates), 3);

        let candidates = vec![vec![true], vec![true, true], vec![true, false]];
        assert_eq!(select_method(&candidates), 2);
    }

    #[test]
    fn test_nothing_applicable_falls_back_to_first() {
        assert_eq!(select_method(&[vec![false], vec![false, true]]), 1);
        let empty: [Vec<bool>; 0] = [];
        assert_eq!(select_method(&empty), 1);
    }

    #[test]
    fn test_strategy_choice() {
        assert_eq!(LookupStrategy::choose(true, true, true), LookupStrategy::ById);
        assert_eq!(LookupStrategy::choose(false, true, true), LookupStrategy::ByKey);
        assert_eq!(LookupStrategy::choose(false, true, false), LookupStrategy::ScanByKey);
        assert_eq!(LookupStrategy::choose(false, false, true), LookupStrategy::Nothing);
    }

    #[test]
    fn test_strategy_degrades_towards_scan() {
        let mut strategy = LookupStrategy::ById;
        let mut seen = vec![strategy];
        while strategy != LookupStrategy::Nothing {
            strategy = strategy.degrade(true, true);
            seen.push(strategy);
        }
        assert_eq!(
            seen,
            vec![
                LookupStrategy::ById,
                LookupStrategy::ByKey,
                LookupStrategy::ScanByKey,
                LookupStrategy::Nothing
            ]
        );
        assert_eq!(LookupStrategy::ById.degrade(false, true), LookupStrategy::Nothing);
    }
}
