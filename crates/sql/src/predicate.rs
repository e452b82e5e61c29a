//! Predicate pushdown compiler.
//!
//! Walks a [`Predicate`] tree and renders dialect SQL through a [`SqlFormatter`],
//! binding every literal as a placeholder argument in left-to-right order.

use crate::args::{ArgValue, QueryArgs};
use crate::decimal::decode_decimal;
use crate::error::PushdownError;
use crate::expr::{ArithmeticOp, Comparison, ComparisonOp, Expression, Predicate, TypedValue, Value};
use crate::formatter::SqlFormatter;
use crate::types::{min_date, CanonicalType};
use chrono::{DateTime, Duration};
use conflux_common::warnings::add_warning;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// How strictly the caller needs the filter to be applied by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FilteringMode {
    #[default]
    Unspecified,
    Optional,
    Mandatory,
}

impl fmt::Display for FilteringMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FilteringMode::Unspecified => "UNSPECIFIED",
            FilteringMode::Optional => "OPTIONAL",
            FilteringMode::Mandatory => "MANDATORY",
        };
        f.write_str(s)
    }
}

/// Rendered predicate text with its arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledPredicate {
    pub text: String,
    pub args: QueryArgs,
    /// Top-level conjunction operands that were dropped.
    pub suppressed: Vec<PushdownError>,
}

struct PredicateBuilder<'a> {
    formatter: &'a dyn SqlFormatter,
    args: QueryArgs,
    suppressed: Vec<PushdownError>,
}

impl<'a> PredicateBuilder<'a> {
    fn new(formatter: &'a dyn SqlFormatter) -> Self {
        Self {
            formatter,
            args: QueryArgs::new(),
            suppressed: Vec::new(),
        }
    }

    fn bind(&mut self, ty: &CanonicalType, value: ArgValue) -> String {
        let placeholder = self.formatter.placeholder(self.args.count());
        self.args.add_typed(ty.clone(), value);
        placeholder
    }

    fn format_value(&mut self, typed: &TypedValue) -> Result<String, PushdownError> {
        if let Value::NullFlag = typed.value {
            return self.format_null_flag(&typed.ty);
        }
        let value = native_value(typed.ty.strip_optional(), &typed.value)?;
        Ok(self.bind(&typed.ty, value))
    }

    fn format_null_flag(&mut self, ty: &CanonicalType) -> Result<String, PushdownError> {
        let CanonicalType::Optional(inner) = ty else {
            return Err(PushdownError::UnimplementedTypedValue(format!(
                "null flag values must be optionally typed, got {}",
                ty
            )));
        };
        match inner.as_ref() {
            CanonicalType::Tagged { .. }
            | CanonicalType::Struct(_)
            | CanonicalType::List(_)
            | CanonicalType::Optional(_) => Err(PushdownError::UnimplementedTypedValue(format!(
                "typed null of {}",
                inner
            ))),
            _ => Ok(self.bind(ty, ArgValue::Null)),
        }
    }

    fn format_arithmetic(
        &mut self,
        op: ArithmeticOp,
        left: &Expression,
        right: &Expression,
    ) -> Result<String, PushdownError> {
        let operation = match op {
            ArithmeticOp::Mul => " * ",
            ArithmeticOp::Add => " + ",
            ArithmeticOp::Sub => " - ",
            ArithmeticOp::BitAnd => " & ",
            ArithmeticOp::BitOr => " | ",
            ArithmeticOp::BitXor => " ^ ",
            ArithmeticOp::Div | ArithmeticOp::Mod => {
                return Err(PushdownError::UnimplementedArithmetic(format!("{:?}", op)))
            }
        };
        let left = self
            .format_expression(left)
            .map_err(|e| e.context("format left expression"))?;
        let right = self
            .format_expression(right)
            .map_err(|e| e.context("format right expression"))?;
        Ok(format!("({}{}{})", left, operation, right))
    }

    fn format_expression_list(&mut self, operands: &[Expression]) -> Result<String, PushdownError> {
        let mut rendered = Vec::with_capacity(operands.len());
        for operand in operands {
            rendered.push(self.format_expression(operand)?);
        }
        Ok(rendered.join(", "))
    }

    fn format_expression(&mut self, expression: &Expression) -> Result<String, PushdownError> {
        if !self.formatter.supports_expression(expression) {
            return Err(PushdownError::UnsupportedExpression(describe_expression(
                expression,
            )));
        }

        match expression {
            Expression::Column(name) => Ok(self.formatter.sanitise_identifier(name)),
            Expression::TypedValue(typed) => self
                .format_value(typed)
                .map_err(|e| e.context("format value")),
            Expression::Null => Ok("NULL".to_string()),
            Expression::Arithmetic { op, left, right } => self
                .format_arithmetic(*op, left, right)
                .map_err(|e| e.context("format arithmetical expression")),
            Expression::Coalesce(operands) => {
                if operands.len() < 2 {
                    return Err(PushdownError::InvalidRequest(format!(
                        "COALESCE needs at least 2 operands, got {}",
                        operands.len()
                    )));
                }
                let list = self
                    .format_expression_list(operands)
                    .map_err(|e| e.context("format coalesce"))?;
                Ok(format!("COALESCE({})", list))
            }
            Expression::Cast { value, to } => {
                let value = self
                    .format_expression(value)
                    .map_err(|e| e.context("format cast value"))?;
                self.formatter
                    .format_cast(&value, to)
                    .map_err(|e| e.context("format cast"))
            }
            Expression::If {
                condition,
                then,
                otherwise,
            } => {
                let condition = self
                    .format_predicate(condition, false)
                    .map_err(|e| e.context("format if condition"))?;
                let then = self
                    .format_expression(then)
                    .map_err(|e| e.context("format then expression"))?;
                let otherwise = self
                    .format_expression(otherwise)
                    .map_err(|e| e.context("format else expression"))?;
                self.formatter
                    .format_if(&condition, &then, &otherwise)
                    .map_err(|e| e.context("format if"))
            }
        }
    }

    fn format_comparison(&mut self, comparison: &Comparison) -> Result<String, PushdownError> {
        let comparison = self
            .formatter
            .transform_predicate_comparison(comparison.clone())?;

        let left = self
            .format_expression(&comparison.left)
            .map_err(|e| e.context("format left expression"))?;
        let right = self
            .format_expression(&comparison.right)
            .map_err(|e| e.context("format right expression"))?;

        let operation = match comparison.op {
            ComparisonOp::Less => " < ",
            ComparisonOp::LessOrEqual => " <= ",
            ComparisonOp::Equal => " = ",
            ComparisonOp::NotEqual => " <> ",
            ComparisonOp::GreaterOrEqual => " >= ",
            ComparisonOp::Greater => " > ",
            ComparisonOp::StartsWith => return self.formatter.format_starts_with(&left, &right),
            ComparisonOp::EndsWith => return self.formatter.format_ends_with(&left, &right),
            ComparisonOp::Contains => return self.formatter.format_contains(&left, &right),
        };

        Ok(format!("({}{}{})", left, operation, right))
    }

    fn format_conjunction(
        &mut self,
        operands: &[Predicate],
        top_level: bool,
    ) -> Result<String, PushdownError> {
        let mut rendered = Vec::with_capacity(operands.len());
        let mut last_error = None;

        for operand in operands {
            let mark = self.args.count();
            match self.format_predicate(operand, false) {
                Ok(statement) => rendered.push(statement),
                Err(e) if top_level => {
                    self.args.truncate(mark);
                    let e = e.context("format predicate");
                    self.suppressed.push(e.clone());
                    last_error = Some(e);
                }
                Err(e) => return Err(e.context("format predicate")),
            }
        }

        match rendered.len() {
            0 => Err(last_error.unwrap_or_else(|| {
                PushdownError::InvalidRequest("conjunction has no operands".to_string())
            })),
            1 => Ok(rendered.remove(0)),
            _ => Ok(format!("({})", rendered.join(" AND "))),
        }
    }

    fn format_disjunction(&mut self, operands: &[Predicate]) -> Result<String, PushdownError> {
        let mut rendered = Vec::with_capacity(operands.len());
        for operand in operands {
            let statement = self
                .format_predicate(operand, false)
                .map_err(|e| e.context("format predicate"))?;
            rendered.push(statement);
        }

        match rendered.len() {
            0 => Err(PushdownError::InvalidRequest(
                "disjunction has no operands".to_string(),
            )),
            1 => Ok(rendered.remove(0)),
            _ => Ok(format!("({})", rendered.join(" OR "))),
        }
    }

    fn format_predicate(
        &mut self,
        predicate: &Predicate,
        top_level: bool,
    ) -> Result<String, PushdownError> {
        match predicate {
            Predicate::Negation(operand) => {
                let inner = self
                    .format_predicate(operand, false)
                    .map_err(|e| e.context("format negation"))?;
                Ok(format!("(NOT {})", inner))
            }
            Predicate::Conjunction(operands) => self
                .format_conjunction(operands, top_level)
                .map_err(|e| e.context("format conjunction")),
            Predicate::Disjunction(operands) => self
                .format_disjunction(operands)
                .map_err(|e| e.context("format disjunction")),
            Predicate::Comparison(comparison) => self
                .format_comparison(comparison)
                .map_err(|e| e.context("format comparison")),
            Predicate::IsNull(value) => {
                let value = self
                    .format_expression(value)
                    .map_err(|e| e.context("format is null"))?;
                Ok(format!("({} IS NULL)", value))
            }
            Predicate::IsNotNull(value) => {
                let value = self
                    .format_expression(value)
                    .map_err(|e| e.context("format is not null"))?;
                Ok(format!("({} IS NOT NULL)", value))
            }
            Predicate::Between {
                value,
                least,
                greatest,
            } => {
                let value = self
                    .format_expression(value)
                    .map_err(|e| e.context("format between value"))?;
                let least = self
                    .format_expression(least)
                    .map_err(|e| e.context("format between least"))?;
                let greatest = self
                    .format_expression(greatest)
                    .map_err(|e| e.context("format between greatest"))?;
                self.formatter.render_between(&value, &least, &greatest)
            }
            Predicate::InSet { value, set } => {
                if set.is_empty() {
                    return Err(PushdownError::InvalidRequest(
                        "IN predicate with an empty set".to_string(),
                    ));
                }
                let value = self
                    .format_expression(value)
                    .map_err(|e| e.context("format in value"))?;
                let list = self
                    .format_expression_list(set)
                    .map_err(|e| e.context("format in set"))?;
                Ok(format!("({} IN ({}))", value, list))
            }
            Predicate::Regexp { value, pattern } => {
                let value = self
                    .format_expression(value)
                    .map_err(|e| e.context("format regexp value"))?;
                let pattern = self
                    .format_expression(pattern)
                    .map_err(|e| e.context("format regexp pattern"))?;
                self.formatter.format_regexp(&value, &pattern)
            }
            Predicate::BoolExpression(value) => self
                .format_expression(value)
                .map_err(|e| e.context("format bool expression")),
            Predicate::Coalesce(operands) => {
                if operands.len() < 2 {
                    return Err(PushdownError::InvalidRequest(format!(
                        "COALESCE needs at least 2 operands, got {}",
                        operands.len()
                    )));
                }
                let mut rendered = Vec::with_capacity(operands.len());
                for operand in operands {
                    rendered.push(
                        self.format_predicate(operand, false)
                            .map_err(|e| e.context("format coalesce"))?,
                    );
                }
                Ok(format!("COALESCE({})", rendered.join(", ")))
            }
        }
    }
}

/// Converts a literal into the driver value for its declared (non-optional) type.
fn native_value(ty: &CanonicalType, value: &Value) -> Result<ArgValue, PushdownError> {
    let out_of_range = || PushdownError::InvalidRequest(format!("{:?} does not fit {}", value, ty));

    let bound = match (ty, value) {
        (CanonicalType::Bool, Value::Bool(v)) => ArgValue::Bool(*v),
        (CanonicalType::Int8, Value::Int32(v)) => {
            ArgValue::Int8(i8::try_from(*v).map_err(|_| out_of_range())?)
        }
        (CanonicalType::Int16, Value::Int32(v)) => {
            ArgValue::Int16(i16::try_from(*v).map_err(|_| out_of_range())?)
        }
        (CanonicalType::Int32, Value::Int32(v)) => ArgValue::Int32(*v),
        (CanonicalType::Int64, Value::Int64(v)) => ArgValue::Int64(*v),
        (CanonicalType::UInt8, Value::UInt32(v)) => {
            ArgValue::UInt8(u8::try_from(*v).map_err(|_| out_of_range())?)
        }
        (CanonicalType::UInt16, Value::UInt32(v)) => {
            ArgValue::UInt16(u16::try_from(*v).map_err(|_| out_of_range())?)
        }
        (CanonicalType::UInt32, Value::UInt32(v)) => ArgValue::UInt32(*v),
        (CanonicalType::UInt64, Value::UInt64(v)) => ArgValue::UInt64(*v),
        (CanonicalType::Float32, Value::Float(v)) => ArgValue::Float32(*v),
        (CanonicalType::Float64, Value::Double(v)) => ArgValue::Float64(*v),
        (CanonicalType::Bytes, Value::Bytes(v)) => ArgValue::Bytes(v.clone()),
        (CanonicalType::Utf8 | CanonicalType::Json, Value::Text(v)) => ArgValue::Text(v.clone()),
        (CanonicalType::Date, Value::Int32(days)) => min_date()
            .checked_add_signed(Duration::days(i64::from(*days)))
            .map(ArgValue::Date)
            .ok_or_else(out_of_range)?,
        (CanonicalType::Datetime, Value::Int64(secs)) => DateTime::from_timestamp(*secs, 0)
            .map(|dt| ArgValue::Datetime(dt.naive_utc()))
            .ok_or_else(out_of_range)?,
        (CanonicalType::Timestamp, Value::Int64(micros)) => DateTime::from_timestamp_micros(*micros)
            .map(|dt| ArgValue::Datetime(dt.naive_utc()))
            .ok_or_else(out_of_range)?,
        (CanonicalType::Decimal { scale, .. }, Value::Bytes(raw)) => {
            let scale = u32::try_from(*scale).map_err(|_| {
                PushdownError::UnimplementedTypedValue(format!("negative decimal scale {}", scale))
            })?;
            let decimal = decode_decimal(raw, scale)
                .map_err(|e| PushdownError::UnimplementedTypedValue(e.to_string()))?;
            ArgValue::Decimal(decimal)
        }
        _ => {
            return Err(PushdownError::UnimplementedTypedValue(format!(
                "{} with value {:?}",
                ty, value
            )))
        }
    };
    Ok(bound)
}

fn describe_expression(expression: &Expression) -> String {
    match expression {
        Expression::Column(name) => format!("column '{}'", name),
        Expression::TypedValue(typed) => format!("literal of type {}", typed.ty),
        Expression::Null => "NULL".to_string(),
        Expression::Arithmetic { op, .. } => format!("arithmetic {:?}", op),
        Expression::Coalesce(_) => "COALESCE".to_string(),
        Expression::Cast { to, .. } => format!("CAST to {}", to),
        Expression::If { .. } => "IF".to_string(),
    }
}

/// Renders `predicate` without applying any filtering policy.
///
/// Failing operands of a top-level conjunction are dropped and reported in
/// [`CompiledPredicate::suppressed`]; every other failure fails the whole tree.
pub fn compile_predicate(
    predicate: &Predicate,
    formatter: &dyn SqlFormatter,
) -> Result<CompiledPredicate, PushdownError> {
    let mut builder = PredicateBuilder::new(formatter);
    let text = builder.format_predicate(predicate, true)?;
    Ok(CompiledPredicate {
        text,
        args: builder.args,
        suppressed: builder.suppressed,
    })
}

/// Compiles a WHERE predicate under `mode`.
///
/// `Ok(None)` means the filter was dropped entirely and the engine has to
/// filter rows itself.
pub fn compile(
    predicate: &Predicate,
    formatter: &dyn SqlFormatter,
    mode: FilteringMode,
) -> Result<Option<CompiledPredicate>, PushdownError> {
    let result = compile_predicate(predicate, formatter).map(|mut compiled| {
        let suppressed = std::mem::take(&mut compiled.suppressed);
        (compiled, suppressed)
    });

    let resolved = apply_filtering_mode(result, mode, formatter.dialect_name())?;
    Ok(resolved.map(|(compiled, suppressed)| CompiledPredicate {
        suppressed,
        ..compiled
    }))
}

/// Resolves a compilation outcome and its suppressed top-level errors against `mode`.
///
/// MANDATORY surfaces the first suppressed error. OPTIONAL and UNSPECIFIED
/// surface errors outside the acceptable class and log the rest.
pub(crate) fn apply_filtering_mode<T>(
    result: Result<(T, Vec<PushdownError>), PushdownError>,
    mode: FilteringMode,
    dialect: &str,
) -> Result<Option<(T, Vec<PushdownError>)>, PushdownError> {
    match mode {
        FilteringMode::Mandatory => {
            let (output, suppressed) = result?;
            if let Some(first) = suppressed.into_iter().next() {
                return Err(first);
            }
            Ok(Some((output, Vec::new())))
        }
        FilteringMode::Optional | FilteringMode::Unspecified => match result {
            Ok((output, suppressed)) => {
                if let Some(fatal) = suppressed.iter().find(|e| !e.is_acceptable()) {
                    return Err(fatal.clone());
                }
                for e in &suppressed {
                    report_suppressed(dialect, e);
                }
                Ok(Some((output, suppressed)))
            }
            Err(e) if e.is_acceptable() => {
                report_suppressed(dialect, &e);
                Ok(None)
            }
            Err(e) => Err(e),
        },
    }
}

fn report_suppressed(dialect: &str, error: &PushdownError) {
    warn!(
        dialect,
        error = %error,
        "Failed to format some part of WHERE clause"
    );
    add_warning(format!("pushdown skipped: {}", error));
}
