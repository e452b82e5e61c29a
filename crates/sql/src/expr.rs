//! Typed filter trees shipped by the query engine.
//!
//! Trees are built once per request and only read afterwards.

use crate::types::CanonicalType;

/// Literal payload. The declared [`CanonicalType`] decides how it is bound:
/// `Int32` also carries 8 and 16 bit integers and dates (days since epoch),
/// `Int64` carries datetimes (seconds) and timestamps (microseconds), and
/// decimals arrive as 16 little-endian bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float(f32),
    Double(f64),
    Bytes(Vec<u8>),
    Text(String),
    /// Absent value of an `Optional` type.
    NullFlag,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypedValue {
    pub ty: CanonicalType,
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOp {
    Mul,
    Add,
    Sub,
    BitAnd,
    BitOr,
    BitXor,
    /// Division and modulo are never pushed down.
    Div,
    Mod,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Column(String),
    TypedValue(TypedValue),
    /// Untyped `NULL`.
    Null,
    Arithmetic {
        op: ArithmeticOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Coalesce(Vec<Expression>),
    Cast {
        value: Box<Expression>,
        to: CanonicalType,
    },
    If {
        condition: Box<Predicate>,
        then: Box<Expression>,
        otherwise: Box<Expression>,
    },
}

impl Expression {
    pub fn column(name: impl Into<String>) -> Self {
        Expression::Column(name.into())
    }

    pub fn typed(ty: CanonicalType, value: Value) -> Self {
        Expression::TypedValue(TypedValue { ty, value })
    }

    pub fn bool(v: bool) -> Self {
        Self::typed(CanonicalType::Bool, Value::Bool(v))
    }

    pub fn int32(v: i32) -> Self {
        Self::typed(CanonicalType::Int32, Value::Int32(v))
    }

    pub fn int64(v: i64) -> Self {
        Self::typed(CanonicalType::Int64, Value::Int64(v))
    }

    pub fn uint64(v: u64) -> Self {
        Self::typed(CanonicalType::UInt64, Value::UInt64(v))
    }

    pub fn double(v: f64) -> Self {
        Self::typed(CanonicalType::Float64, Value::Double(v))
    }

    pub fn text(v: impl Into<String>) -> Self {
        Self::typed(CanonicalType::Utf8, Value::Text(v.into()))
    }

    /// Typed null of `Optional<inner>`.
    pub fn null_of(inner: CanonicalType) -> Self {
        Self::typed(CanonicalType::optional(inner), Value::NullFlag)
    }

    pub fn arithmetic(op: ArithmeticOp, left: Expression, right: Expression) -> Self {
        Expression::Arithmetic {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn cast(value: Expression, to: CanonicalType) -> Self {
        Expression::Cast {
            value: Box::new(value),
            to,
        }
    }

    pub fn if_then_else(condition: Predicate, then: Expression, otherwise: Expression) -> Self {
        Expression::If {
            condition: Box::new(condition),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Less,
    LessOrEqual,
    Equal,
    NotEqual,
    GreaterOrEqual,
    Greater,
    StartsWith,
    EndsWith,
    Contains,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub op: ComparisonOp,
    pub left: Expression,
    pub right: Expression,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Negation(Box<Predicate>),
    Conjunction(Vec<Predicate>),
    Disjunction(Vec<Predicate>),
    Comparison(Comparison),
    IsNull(Expression),
    IsNotNull(Expression),
    Between {
        value: Expression,
        least: Expression,
        greatest: Expression,
    },
    InSet {
        value: Expression,
        set: Vec<Expression>,
    },
    Regexp {
        value: Expression,
        pattern: Expression,
    },
    BoolExpression(Expression),
    Coalesce(Vec<Predicate>),
}

impl Predicate {
    pub fn compare(op: ComparisonOp, left: Expression, right: Expression) -> Self {
        Predicate::Comparison(Comparison { op, left, right })
    }

    pub fn equal(left: Expression, right: Expression) -> Self {
        Self::compare(ComparisonOp::Equal, left, right)
    }

    pub fn not(operand: Predicate) -> Self {
        Predicate::Negation(Box::new(operand))
    }

    pub fn and(operands: Vec<Predicate>) -> Self {
        Predicate::Conjunction(operands)
    }

    pub fn or(operands: Vec<Predicate>) -> Self {
        Predicate::Disjunction(operands)
    }

    pub fn between(value: Expression, least: Expression, greatest: Expression) -> Self {
        Predicate::Between {
            value,
            least,
            greatest,
        }
    }

    pub fn in_set(value: Expression, set: Vec<Expression>) -> Self {
        Predicate::InSet { value, set }
    }
}
