//! Evaluation of criteria, sort keys and groupings against stored rows.

use std::cmp::Ordering;

use datakit_core::{
    Condition, ConditionCombination, ConditionOperator, Criteria, DataDictionary, Grouping,
    Sorting, SortingMode, Value,
};

/// Whether `row` satisfies `criteria`. An empty collection matches everything.
pub fn matches(row: &DataDictionary, criteria: &Criteria) -> bool {
    match criteria {
        Criteria::Condition(condition) => matches_condition(row, condition),
        Criteria::Collection(collection) if collection.is_empty() => true,
        Criteria::Collection(collection) => match collection.combination() {
            ConditionCombination::And => collection.iter().all(|c| matches(row, c)),
            ConditionCombination::Or => collection.iter().any(|c| matches(row, c)),
        },
    }
}

/// Whether `row` satisfies `criteria`, treating `None` as match-all.
pub fn matches_optional(row: &DataDictionary, criteria: Option<&Criteria>) -> bool {
    criteria.is_none_or(|c| matches(row, c))
}

fn matches_condition(row: &DataDictionary, condition: &Condition) -> bool {
    let field = row.get(condition.name()).unwrap_or(&Value::Null);

    match condition.operator() {
        ConditionOperator::Equal => condition.value().is_some_and(|v| field.loosely_equals(v)),
        ConditionOperator::NotEqual => condition.value().is_some_and(|v| !field.loosely_equals(v)),
        ConditionOperator::GreaterThan => compare_with(field, condition, Ordering::is_gt),
        ConditionOperator::GreaterThanEqual => compare_with(field, condition, Ordering::is_ge),
        ConditionOperator::LessThan => compare_with(field, condition, Ordering::is_lt),
        ConditionOperator::LessThanEqual => compare_with(field, condition, Ordering::is_le),
        ConditionOperator::Like => match (text_of(field), condition.value().and_then(text_of)) {
            (Some(text), Some(pattern)) => like(&text, &pattern),
            _ => false,
        },
        ConditionOperator::Between => condition.bounds().is_some_and(|(low, high)| {
            let above = low.is_null() || field.compare(low).is_some_and(Ordering::is_ge);
            let below = high.is_null() || field.compare(high).is_some_and(Ordering::is_le);
            !field.is_null() && above && below
        }),
        ConditionOperator::In => condition
            .values()
            .is_some_and(|values| values.iter().any(|v| field.loosely_equals(v))),
        ConditionOperator::NotIn => condition
            .values()
            .is_some_and(|values| !values.iter().any(|v| field.loosely_equals(v))),
    }
}

fn compare_with(field: &Value, condition: &Condition, accept: fn(Ordering) -> bool) -> bool {
    condition
        .value()
        .and_then(|v| field.compare(v))
        .is_some_and(accept)
}

fn text_of(value: &Value) -> Option<String> {
    if value.is_null() {
        return None;
    }
    Some(match value.as_str() {
        Some(text) => text.to_string(),
        None => value.to_string(),
    })
}

/// SQL `LIKE` matching: `%` matches any run of characters, `_` exactly one.
/// Case-insensitive.
pub fn like(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.to_lowercase().chars().collect();
    let pattern: Vec<char> = pattern.to_lowercase().chars().collect();

    // matched[j]: pattern[..i] matches text[..j]
    let mut matched = vec![false; text.len() + 1];
    matched[0] = true;

    for &p in &pattern {
        let mut next = vec![false; text.len() + 1];
        if p == '%' {
            let mut seen = false;
            for (slot, &m) in next.iter_mut().zip(&matched) {
                seen |= m;
                *slot = seen;
            }
        } else {
            for j in 1..=text.len() {
                next[j] = matched[j - 1] && (p == '_' || p == text[j - 1]);
            }
        }
        matched = next;
    }

    matched[text.len()]
}

/// Order rows by `sortings`, earlier keys first. Nulls sort before values.
pub fn sort(rows: &mut [DataDictionary], sortings: &[Sorting]) {
    if sortings.is_empty() {
        return;
    }
    rows.sort_by(|a, b| {
        for sorting in sortings {
            let left = a.get(&sorting.name).unwrap_or(&Value::Null);
            let right = b.get(&sorting.name).unwrap_or(&Value::Null);
            let ordering = match (left.is_null(), right.is_null()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                (false, false) => left.compare(right).unwrap_or(Ordering::Equal),
            };
            let ordering = match sorting.mode {
                SortingMode::Ascending => ordering,
                SortingMode::Descending => ordering.reverse(),
            };
            if ordering.is_ne() {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

/// Field holding the row count of each group.
pub const GROUP_COUNT_FIELD: &str = "Count";

/// Collapse rows into one row per distinct combination of grouping keys.
///
/// Each group row carries the key fields plus [`GROUP_COUNT_FIELD`]. The
/// grouping filter is applied to the group rows.
pub fn group(rows: Vec<DataDictionary>, grouping: &Grouping) -> Vec<DataDictionary> {
    let mut groups: Vec<(Vec<Value>, u64)> = Vec::new();

    for row in rows {
        let key: Vec<Value> = grouping
            .keys
            .iter()
            .map(|k| row.get(k).cloned().unwrap_or_default())
            .collect();
        match groups
            .iter_mut()
            .find(|(existing, _)| existing.iter().zip(&key).all(|(a, b)| a.loosely_equals(b)))
        {
            Some((_, count)) => *count += 1,
            None => groups.push((key, 1)),
        }
    }

    groups
        .into_iter()
        .map(|(key, count)| {
            let mut row: DataDictionary = grouping.keys.iter().cloned().zip(key).collect();
            row.set(GROUP_COUNT_FIELD, count);
            row
        })
        .filter(|row| matches_optional(row, grouping.filter.as_ref()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use datakit_core::ConditionalRange;

    fn row(id: i64, name: &str, kind: &str) -> DataDictionary {
        [
            ("Id", Value::from(id)),
            ("Name", Value::from(name)),
            ("Kind", Value::from(kind)),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_like_wildcards() {
        assert!(like("Zongsoft", "zong%"));
        assert!(like("Zongsoft", "%SOFT"));
        assert!(like("abc", "a_c"));
        assert!(!like("abc", "a_"));
        assert!(like("", "%"));
        assert!(!like("abc", "b%"));
    }

    #[test]
    fn test_operators() {
        let r = row(5, "alpha", "x");
        assert!(matches(&r, &Condition::equal("Id", 5_i32).into()));
        assert!(matches(&r, &Condition::not_equal("Id", 6).into()));
        assert!(matches(&r, &Condition::greater_than_equal("Id", 5).into()));
        assert!(!matches(&r, &Condition::less_than("Id", 5).into()));
        assert!(matches(&r, &Condition::between("Id", 1, 9).into()));
        assert!(matches(&r, &Condition::in_list("Id", [1, 5, 7]).into()));
        assert!(matches(&r, &Condition::not_in("Name", ["beta"]).into()));
        assert!(matches(&r, &Condition::like("Name", "al%").into()));
        assert!(!matches(&r, &Condition::equal("Missing", 1).into()));
    }

    #[test]
    fn test_range_conditions() {
        let r = row(5, "alpha", "x");
        let range = ConditionalRange::parse::<i64>("(~5)").unwrap();
        assert!(matches(&r, &range.to_condition("Id").unwrap().into()));
        let range = ConditionalRange::parse::<i64>("(6)").unwrap();
        assert!(!matches(&r, &range.to_condition("Id").unwrap().into()));
    }

    #[test]
    fn test_combinations() {
        let r = row(5, "alpha", "x");
        let both = Criteria::from(Condition::equal("Id", 5)).and(Condition::equal("Kind", "y"));
        assert!(!matches(&r, &both));
        let either = Criteria::from(Condition::equal("Id", 5)).or(Condition::equal("Kind", "y"));
        assert!(matches(&r, &either));
    }

    #[test]
    fn test_sort_descending_with_nulls() {
        let mut rows = vec![row(2, "b", "x"), row(3, "c", "x"), row(1, "a", "x")];
        rows[1].set("Name", Value::Null);
        sort(&mut rows, &[Sorting::desc("Name")]);
        let names: Vec<_> = rows.iter().map(|r| r.get("Name").cloned()).collect();
        assert_eq!(
            names,
            vec![Some(Value::from("b")), Some(Value::from("a")), Some(Value::Null)]
        );
    }

    #[test]
    fn test_group_counts_and_filter() {
        let rows = vec![row(1, "a", "x"), row(2, "b", "y"), row(3, "c", "x")];
        let groups = group(rows.clone(), &Grouping::by(["Kind"]));
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].get("Kind"), Some(&Value::from("x")));
        assert_eq!(groups[0].get(GROUP_COUNT_FIELD), Some(&Value::from(2_u64)));

        let filtered = group(
            rows,
            &Grouping::by(["Kind"]).having(Condition::greater_than(GROUP_COUNT_FIELD, 1)),
        );
        assert_eq!(filtered.len(), 1);
    }
}
