//! Built-in rules.

mod each;
mod exist;
mod scalar;

pub use each::{EachOptions, EachRule};
pub use exist::{ExistOptions, ExistRule, ExistRuleBuilder};
pub use scalar::{CompareOperator, CompareRule, CompareType, IntegerRule, RequiredRule, TrimRule};

/// Serde default for flags that are on unless configured otherwise.
pub(crate) fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn omitted_flags_default_to_true() {
        let integer: IntegerRule = serde_json::from_value(json!({})).unwrap();
        assert!(integer.skip_on_empty);

        let compare: CompareRule = serde_json::from_value(json!({"compare_value": 1})).unwrap();
        assert!(compare.skip_on_empty);

        let exist: ExistOptions = serde_json::from_value(json!({})).unwrap();
        assert!(exist.force_primary && exist.skip_on_empty);

        let each: EachOptions =
            serde_json::from_value(json!({"inner": {"rule": "integer"}})).unwrap();
        assert!(each.allow_message_from_rule && each.stop_on_first_error && each.skip_on_empty);
    }
}
