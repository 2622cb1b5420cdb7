//! Condition expression trees.
//!
//! A [`Condition`] is a single predicate over a named field. A
//! [`ConditionCollection`] combines conditions (and nested collections) with
//! one combinator. Both convert into [`Criteria`], the type accepted wherever
//! a predicate is expected.
//!
//! ```
//! use datakit_core::{Condition, ConditionCollection, Criteria};
//!
//! let criteria = Criteria::from(Condition::equal("Namespace", "zongsoft"))
//!     .and(Condition::greater_than_equal("Age", 18));
//! assert_eq!(criteria.to_string(), "(Namespace = zongsoft AND Age >= 18)");
//! ```

use std::fmt;
use std::ops::Index;

use crate::error::{Error, Result};
use crate::value::Value;

/// Comparison operator of a [`Condition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionOperator {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanEqual,
    LessThan,
    LessThanEqual,
    Like,
    In,
    NotIn,
    Between,
}

impl ConditionOperator {
    /// Operator token used when rendering.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ConditionOperator::Equal => "=",
            ConditionOperator::NotEqual => "!=",
            ConditionOperator::GreaterThan => ">",
            ConditionOperator::GreaterThanEqual => ">=",
            ConditionOperator::LessThan => "<",
            ConditionOperator::LessThanEqual => "<=",
            ConditionOperator::Like => "LIKE",
            ConditionOperator::In => "IN",
            ConditionOperator::NotIn => "NOT IN",
            ConditionOperator::Between => "BETWEEN",
        }
    }
}

/// Right-hand side of a condition.
///
/// The shape always agrees with the operator: `Between` carries a pair,
/// `In`/`NotIn` a list, everything else a single value.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Single(Value),
    Pair(Value, Value),
    List(Vec<Value>),
}

/// An immutable predicate over a named field.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    name: String,
    operator: ConditionOperator,
    operand: Operand,
}

impl Condition {
    fn single(name: impl Into<String>, operator: ConditionOperator, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            operator,
            operand: Operand::Single(value.into()),
        }
    }

    /// Build a condition from parts, checking the name and operand shape.
    ///
    /// The typed factories below cannot produce an inconsistent shape; this
    /// constructor exists for names and operators only known at runtime.
    pub fn try_new(
        name: impl Into<String>,
        operator: ConditionOperator,
        operand: Operand,
    ) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::missing("name"));
        }

        let consistent = match operator {
            ConditionOperator::Between => matches!(operand, Operand::Pair(..)),
            ConditionOperator::In | ConditionOperator::NotIn => {
                matches!(operand, Operand::List(_))
            }
            _ => matches!(operand, Operand::Single(_)),
        };
        if !consistent {
            return Err(Error::invalid_argument(
                "operand",
                format!("operand shape does not match the '{}' operator", operator.as_str()),
            ));
        }

        Ok(Self {
            name,
            operator,
            operand,
        })
    }

    pub fn equal(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::single(name, ConditionOperator::Equal, value)
    }

    pub fn not_equal(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::single(name, ConditionOperator::NotEqual, value)
    }

    pub fn greater_than(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::single(name, ConditionOperator::GreaterThan, value)
    }

    pub fn greater_than_equal(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::single(name, ConditionOperator::GreaterThanEqual, value)
    }

    pub fn less_than(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::single(name, ConditionOperator::LessThan, value)
    }

    pub fn less_than_equal(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::single(name, ConditionOperator::LessThanEqual, value)
    }

    /// Pattern match; `%` and `_` wildcards are interpreted by the driver.
    pub fn like(name: impl Into<String>, pattern: impl Into<Value>) -> Self {
        Self::single(name, ConditionOperator::Like, pattern)
    }

    /// Inclusive range `low <= field <= high`.
    pub fn between(
        name: impl Into<String>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        Self {
            name: name.into(),
            operator: ConditionOperator::Between,
            operand: Operand::Pair(low.into(), high.into()),
        }
    }

    pub fn in_list<I, V>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self {
            name: name.into(),
            operator: ConditionOperator::In,
            operand: Operand::List(values.into_iter().map(Into::into).collect()),
        }
    }

    pub fn not_in<I, V>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self {
            name: name.into(),
            operator: ConditionOperator::NotIn,
            operand: Operand::List(values.into_iter().map(Into::into).collect()),
        }
    }

    /// Field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn operator(&self) -> ConditionOperator {
        self.operator
    }

    pub fn operand(&self) -> &Operand {
        &self.operand
    }

    /// The single value of a single-valued condition.
    pub fn value(&self) -> Option<&Value> {
        match &self.operand {
            Operand::Single(v) => Some(v),
            _ => None,
        }
    }

    /// `(low, high)` of a `Between` condition.
    pub fn bounds(&self) -> Option<(&Value, &Value)> {
        match &self.operand {
            Operand::Pair(low, high) => Some((low, high)),
            _ => None,
        }
    }

    /// Values of an `In`/`NotIn` condition.
    pub fn values(&self) -> Option<&[Value]> {
        match &self.operand {
            Operand::List(values) => Some(values),
            _ => None,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.operand {
            Operand::Single(v) => write!(f, "{} {} {}", self.name, self.operator.as_str(), v),
            Operand::Pair(low, high) => write!(
                f,
                "{} {} {} AND {}",
                self.name,
                self.operator.as_str(),
                low,
                high
            ),
            Operand::List(values) => {
                write!(f, "{} {} (", self.name, self.operator.as_str())?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                f.write_str(")")
            }
        }
    }
}

/// How the members of a [`ConditionCollection`] are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionCombination {
    And,
    Or,
}

impl ConditionCombination {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ConditionCombination::And => "AND",
            ConditionCombination::Or => "OR",
        }
    }
}

/// An ordered group of criteria sharing one combinator.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionCollection {
    combination: ConditionCombination,
    items: Vec<Criteria>,
}

impl ConditionCollection {
    /// An empty collection with the given combinator.
    pub fn new(combination: ConditionCombination) -> Self {
        Self {
            combination,
            items: Vec::new(),
        }
    }

    /// An empty AND collection.
    pub fn and() -> Self {
        Self::new(ConditionCombination::And)
    }

    /// An empty OR collection.
    pub fn or() -> Self {
        Self::new(ConditionCombination::Or)
    }

    /// Collect criteria into a collection with the given combinator.
    pub fn with_items<I, C>(combination: ConditionCombination, items: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Criteria>,
    {
        Self {
            combination,
            items: items.into_iter().map(Into::into).collect(),
        }
    }

    pub fn add(&mut self, item: impl Into<Criteria>) {
        self.items.push(item.into());
    }

    /// Builder-style [`add`](Self::add).
    pub fn with(mut self, item: impl Into<Criteria>) -> Self {
        self.add(item);
        self
    }

    pub fn combination(&self) -> ConditionCombination {
        self.combination
    }

    pub fn get(&self, index: usize) -> Option<&Criteria> {
        self.items.get(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Criteria> {
        self.items.iter()
    }

    /// Convert into [`Criteria`], unwrapping a collection of exactly one member.
    pub fn into_criteria(mut self) -> Criteria {
        if self.items.len() == 1 {
            if let Some(only) = self.items.pop() {
                return only;
            }
        }
        Criteria::Collection(self)
    }
}

impl Index<usize> for ConditionCollection {
    type Output = Criteria;

    fn index(&self, index: usize) -> &Self::Output {
        &self.items[index]
    }
}

impl<'a> IntoIterator for &'a ConditionCollection {
    type Item = &'a Criteria;
    type IntoIter = std::slice::Iter<'a, Criteria>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl fmt::Display for ConditionCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                write!(f, " {} ", self.combination.as_str())?;
            }
            write!(f, "{}", item)?;
        }
        f.write_str(")")
    }
}

/// A predicate: either a single condition or a combined collection.
#[derive(Debug, Clone, PartialEq)]
pub enum Criteria {
    Condition(Condition),
    Collection(ConditionCollection),
}

impl Criteria {
    /// Combine with another predicate using AND.
    ///
    /// When `self` is already an AND collection the new member is appended
    /// instead of nesting.
    pub fn and(self, other: impl Into<Criteria>) -> Criteria {
        self.combine(ConditionCombination::And, other.into())
    }

    /// Combine with another predicate using OR.
    pub fn or(self, other: impl Into<Criteria>) -> Criteria {
        self.combine(ConditionCombination::Or, other.into())
    }

    fn combine(self, combination: ConditionCombination, other: Criteria) -> Criteria {
        match self {
            Criteria::Collection(mut collection) if collection.combination == combination => {
                collection.add(other);
                Criteria::Collection(collection)
            }
            this => Criteria::Collection(ConditionCollection::with_items(
                combination,
                [this, other],
            )),
        }
    }

    /// Borrow as a single condition.
    pub fn as_condition(&self) -> Option<&Condition> {
        match self {
            Criteria::Condition(c) => Some(c),
            Criteria::Collection(_) => None,
        }
    }

    /// Borrow as a collection.
    pub fn as_collection(&self) -> Option<&ConditionCollection> {
        match self {
            Criteria::Collection(c) => Some(c),
            Criteria::Condition(_) => None,
        }
    }

    /// Find the first condition on `name`, searching nested collections depth-first.
    pub fn find(&self, name: &str) -> Option<&Condition> {
        match self {
            Criteria::Condition(c) => (c.name == name).then_some(c),
            Criteria::Collection(items) => items.iter().find_map(|item| item.find(name)),
        }
    }
}

impl From<Condition> for Criteria {
    fn from(condition: Condition) -> Self {
        Criteria::Condition(condition)
    }
}

impl From<ConditionCollection> for Criteria {
    fn from(collection: ConditionCollection) -> Self {
        Criteria::Collection(collection)
    }
}

impl fmt::Display for Criteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Criteria::Condition(c) => write!(f, "{}", c),
            Criteria::Collection(c) => write!(f, "{}", c),
        }
    }
}
