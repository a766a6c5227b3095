use crate::model::FieldType;
use sea_orm::sea_query::{Expr, SimpleExpr};
use serde::{Deserialize, Serialize};

/// Separator between a field name and its operator suffix, as in `age__le`.
pub const OPERATOR_SEPARATOR: &str = "__";

/// Comparison operators a filter field can be exploded into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    Lt,
    Gt,
    Le,
    Ge,
    Ne,
    Eq,
}

/// Operators used when a type has no explicit table entry and methods are enabled.
pub const DEFAULT_NUMERIC_OPERATORS: &[Operator] = &[Operator::Le, Operator::Ge];

impl Operator {
    pub const ALL: [Self; 6] = [Self::Lt, Self::Gt, Self::Le, Self::Ge, Self::Ne, Self::Eq];

    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Lt => "lt",
            Self::Gt => "gt",
            Self::Le => "le",
            Self::Ge => "ge",
            Self::Ne => "ne",
            Self::Eq => "eq",
        }
    }

    pub fn from_suffix(suffix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.suffix() == suffix)
    }

    /// Builds `target <op> value`.
    pub fn apply(self, target: SimpleExpr, value: impl Into<SimpleExpr>) -> SimpleExpr {
        let target = Expr::expr(target);
        match self {
            Self::Lt => target.lt(value),
            Self::Gt => target.gt(value),
            Self::Le => target.lte(value),
            Self::Ge => target.gte(value),
            Self::Ne => target.ne(value),
            Self::Eq => target.eq(value),
        }
    }
}

/// The default type table: integers and floats get `le` and `ge`.
pub fn default_operators_for(field_type: FieldType) -> Option<&'static [Operator]> {
    match field_type {
        FieldType::Integer | FieldType::Float => Some(DEFAULT_NUMERIC_OPERATORS),
        _ => None,
    }
}

/// Splits `name` on the first `__`: `("age", Some("le"))` for `age__le`.
pub fn split_operator(name: &str) -> (&str, Option<&str>) {
    name.split_once(OPERATOR_SEPARATOR)
        .map_or((name, None), |(field, op)| (field, Some(op)))
}
