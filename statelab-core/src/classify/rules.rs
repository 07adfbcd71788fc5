//! Ordered decision tables.
//!
//! A pillar is a list of (predicate, result) rows evaluated top to bottom;
//! the first row whose predicate holds decides. Row order is part of the
//! rule set, so tables are written as `const` slices and never sorted.

/// One row of a decision table.
pub struct Rule<F, O> {
    pub when: fn(&F) -> bool,
    pub then: O,
    /// Human-readable reason shown alongside the result.
    pub note: &'static str,
}

/// First row whose predicate holds, if any.
pub fn first_match<'a, F, O>(rules: &'a [Rule<F, O>], facts: &F) -> Option<&'a Rule<F, O>> {
    rules.iter().find(|rule| (rule.when)(facts))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &[Rule<i32, &str>] = &[
        Rule {
            when: |x| *x > 10,
            then: "big",
            note: "over ten",
        },
        Rule {
            when: |x| *x > 0,
            then: "positive",
            note: "over zero",
        },
    ];

    #[test]
    fn earlier_rows_win() {
        assert_eq!(first_match(TABLE, &20).map(|r| r.then), Some("big"));
        assert_eq!(first_match(TABLE, &5).map(|r| r.then), Some("positive"));
        assert!(first_match(TABLE, &-1).is_none());
    }
}
