//! Native filter compiler for document stores.
//!
//! Produces a MongoDB-style query document from the same predicate trees the
//! SQL compiler consumes. Only `column <op> literal` shapes can be expressed;
//! anything else is reported through the usual pushdown errors so that the
//! filtering mode policy applies unchanged.

use crate::error::PushdownError;
use crate::expr::{Comparison, ComparisonOp, Expression, Predicate, TypedValue, Value};
use crate::predicate::{apply_filtering_mode, FilteringMode};
use crate::types::{CanonicalType, OBJECT_ID_TAG};
use serde_json::{json, Map, Value as Json};

const DIALECT: &str = "document";

/// A compiled filter document and the top-level operands it had to drop.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentFilter {
    pub filter: Json,
    pub suppressed: Vec<PushdownError>,
}

impl DocumentFilter {
    /// Matches every document.
    pub fn match_all() -> Self {
        Self {
            filter: Json::Object(Map::new()),
            suppressed: Vec::new(),
        }
    }
}

/// Renders `predicate` into a filter document without applying a filtering mode.
pub fn compile_document_predicate(predicate: &Predicate) -> Result<DocumentFilter, PushdownError> {
    let mut suppressed = Vec::new();
    let filter = match predicate {
        Predicate::Conjunction(operands) => {
            let mut rendered = Vec::with_capacity(operands.len());
            let mut last_error = None;
            for operand in operands {
                match format_predicate(operand) {
                    Ok(doc) => rendered.push(doc),
                    Err(e) => {
                        let e = e.context("format predicate");
                        suppressed.push(e.clone());
                        last_error = Some(e);
                    }
                }
            }
            match rendered.len() {
                0 => {
                    return Err(last_error
                        .unwrap_or_else(|| {
                            PushdownError::InvalidRequest("conjunction has no operands".to_string())
                        })
                        .context("format conjunction"))
                }
                1 => rendered.remove(0),
                _ => json!({ "$and": rendered }),
            }
        }
        other => format_predicate(other)?,
    };
    Ok(DocumentFilter { filter, suppressed })
}

/// Compiles an optional filter under `mode`. A missing or fully dropped filter yields `{}`.
pub fn compile_document_filter(
    predicate: Option<&Predicate>,
    mode: FilteringMode,
) -> Result<DocumentFilter, PushdownError> {
    let Some(predicate) = predicate else {
        return Ok(DocumentFilter::match_all());
    };

    let result = compile_document_predicate(predicate).map(|mut compiled| {
        let suppressed = std::mem::take(&mut compiled.suppressed);
        (compiled.filter, suppressed)
    });

    match apply_filtering_mode(result, mode, DIALECT)? {
        Some((filter, suppressed)) => Ok(DocumentFilter { filter, suppressed }),
        None => Ok(DocumentFilter::match_all()),
    }
}

fn format_predicate(predicate: &Predicate) -> Result<Json, PushdownError> {
    match predicate {
        Predicate::Negation(operand) => {
            let inner = format_predicate(operand).map_err(|e| e.context("format negation"))?;
            Ok(json!({ "$nor": [inner] }))
        }
        Predicate::Conjunction(operands) => format_list("$and", operands)
            .map_err(|e| e.context("format conjunction")),
        Predicate::Disjunction(operands) => format_list("$or", operands)
            .map_err(|e| e.context("format disjunction")),
        Predicate::Comparison(comparison) => {
            format_comparison(comparison).map_err(|e| e.context("format comparison"))
        }
        Predicate::IsNull(value) => {
            let field = field_name(value).map_err(|e| e.context("format is null"))?;
            Ok(single(field, json!({ "$eq": Json::Null })))
        }
        Predicate::IsNotNull(value) => {
            let field = field_name(value).map_err(|e| e.context("format is not null"))?;
            Ok(single(field, json!({ "$exists": true, "$ne": Json::Null })))
        }
        Predicate::Between {
            value,
            least,
            greatest,
        } => {
            let field = field_name(value).map_err(|e| e.context("format between value"))?;
            let least = literal(least).map_err(|e| e.context("format between least"))?;
            let greatest = literal(greatest).map_err(|e| e.context("format between greatest"))?;
            Ok(single(field, json!({ "$gte": least, "$lte": greatest })))
        }
        Predicate::InSet { value, set } => {
            if set.is_empty() {
                return Err(PushdownError::InvalidRequest(
                    "IN predicate with an empty set".to_string(),
                ));
            }
            let field = field_name(value).map_err(|e| e.context("format in value"))?;
            let values = set
                .iter()
                .map(literal)
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| e.context("format in set"))?;
            Ok(single(field, json!({ "$in": values })))
        }
        Predicate::Regexp { value, pattern } => {
            let field = field_name(value).map_err(|e| e.context("format regexp value"))?;
            let pattern = text_literal(pattern).map_err(|e| e.context("format regexp pattern"))?;
            Ok(single(field, json!({ "$regex": pattern })))
        }
        Predicate::BoolExpression(value) => {
            let field = field_name(value).map_err(|e| e.context("format bool expression"))?;
            Ok(single(field, json!({ "$eq": true })))
        }
        Predicate::Coalesce(_) => Err(PushdownError::UnimplementedPredicate(
            "COALESCE in document filters".to_string(),
        )),
    }
}

fn format_list(operator: &str, operands: &[Predicate]) -> Result<Json, PushdownError> {
    if operands.is_empty() {
        return Err(PushdownError::InvalidRequest(format!(
            "{} with no operands",
            operator
        )));
    }
    let mut rendered = operands
        .iter()
        .map(|p| format_predicate(p).map_err(|e| e.context("format predicate")))
        .collect::<Result<Vec<_>, _>>()?;
    if rendered.len() == 1 {
        return Ok(rendered.remove(0));
    }
    Ok(single(operator, Json::Array(rendered)))
}

fn format_comparison(comparison: &Comparison) -> Result<Json, PushdownError> {
    // Literal on the left is normalised by mirroring the operator.
    let (op, column, value) = match (&comparison.left, &comparison.right) {
        (Expression::Column(_), _) => (comparison.op, &comparison.left, &comparison.right),
        (_, Expression::Column(_)) => (mirror(comparison.op)?, &comparison.right, &comparison.left),
        _ => {
            return Err(PushdownError::UnsupportedExpression(
                "comparison without a field reference".to_string(),
            ))
        }
    };
    let field = field_name(column)?;

    let condition = match op {
        ComparisonOp::Equal => json!({ "$eq": literal(value)? }),
        ComparisonOp::NotEqual => json!({ "$ne": literal(value)? }),
        ComparisonOp::Less => json!({ "$lt": literal(value)? }),
        ComparisonOp::LessOrEqual => json!({ "$lte": literal(value)? }),
        ComparisonOp::Greater => json!({ "$gt": literal(value)? }),
        ComparisonOp::GreaterOrEqual => json!({ "$gte": literal(value)? }),
        ComparisonOp::StartsWith => {
            json!({ "$regex": format!("^{}", regex::escape(&text_literal(value)?)) })
        }
        ComparisonOp::EndsWith => {
            json!({ "$regex": format!("{}$", regex::escape(&text_literal(value)?)) })
        }
        ComparisonOp::Contains => json!({ "$regex": regex::escape(&text_literal(value)?) }),
    };
    Ok(single(field, condition))
}

fn mirror(op: ComparisonOp) -> Result<ComparisonOp, PushdownError> {
    match op {
        ComparisonOp::Less => Ok(ComparisonOp::Greater),
        ComparisonOp::LessOrEqual => Ok(ComparisonOp::GreaterOrEqual),
        ComparisonOp::Greater => Ok(ComparisonOp::Less),
        ComparisonOp::GreaterOrEqual => Ok(ComparisonOp::LessOrEqual),
        ComparisonOp::Equal | ComparisonOp::NotEqual => Ok(op),
        other => Err(PushdownError::UnimplementedOperation(format!(
            "{:?} with a literal on the left",
            other
        ))),
    }
}

fn single(field: &str, condition: Json) -> Json {
    let mut doc = Map::new();
    doc.insert(field.to_string(), condition);
    Json::Object(doc)
}

fn field_name(expression: &Expression) -> Result<&str, PushdownError> {
    match expression {
        Expression::Column(name) => Ok(name),
        other => Err(PushdownError::UnsupportedExpression(format!(
            "{:?} is not a field reference",
            other
        ))),
    }
}

fn text_literal(expression: &Expression) -> Result<String, PushdownError> {
    match expression {
        Expression::TypedValue(TypedValue {
            value: Value::Text(text),
            ..
        }) => Ok(text.clone()),
        other => Err(PushdownError::UnimplementedTypedValue(format!(
            "{:?} is not a string literal",
            other
        ))),
    }
}

fn literal(expression: &Expression) -> Result<Json, PushdownError> {
    let typed = match expression {
        Expression::TypedValue(typed) => typed,
        Expression::Null => return Ok(Json::Null),
        other => {
            return Err(PushdownError::UnsupportedExpression(format!(
                "{:?} is not a literal",
                other
            )))
        }
    };

    if let Value::NullFlag = typed.value {
        return if typed.ty.is_optional() {
            Ok(Json::Null)
        } else {
            Err(PushdownError::UnimplementedTypedValue(format!(
                "null flag values must be optionally typed, got {}",
                typed.ty
            )))
        };
    }

    let json = match (typed.ty.strip_optional(), &typed.value) {
        (CanonicalType::Bool, Value::Bool(v)) => json!(v),
        (
            CanonicalType::Int8 | CanonicalType::Int16 | CanonicalType::Int32,
            Value::Int32(v),
        ) => json!(v),
        (
            CanonicalType::UInt8 | CanonicalType::UInt16 | CanonicalType::UInt32,
            Value::UInt32(v),
        ) => json!(v),
        (CanonicalType::Int64, Value::Int64(v)) => json!(v),
        (CanonicalType::UInt64, Value::UInt64(v)) => json!(v),
        (CanonicalType::Float32, Value::Float(v)) => json!(v),
        (CanonicalType::Float64, Value::Double(v)) => json!(v),
        (CanonicalType::Utf8, Value::Text(v)) => json!(v),
        (CanonicalType::Tagged { tag, .. }, Value::Text(v)) if tag == OBJECT_ID_TAG => {
            if v.len() != 24 || hex::decode(v).is_err() {
                return Err(PushdownError::InvalidRequest(format!(
                    "'{}' is not a valid object identifier",
                    v
                )));
            }
            json!({ "$oid": v.to_ascii_lowercase() })
        }
        (ty, value) => {
            return Err(PushdownError::UnimplementedTypedValue(format!(
                "{} with value {:?}",
                ty, value
            )))
        }
    };
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{ArithmeticOp, Expression as E};

    fn failing() -> Predicate {
        Predicate::BoolExpression(E::arithmetic(ArithmeticOp::Add, E::column("a"), E::int32(1)))
    }

    #[test]
    fn test_absent_filter_matches_all() {
        let compiled = compile_document_filter(None, FilteringMode::Mandatory).unwrap();
        assert_eq!(compiled.filter, json!({}));
    }

    #[test]
    fn test_comparisons() {
        let predicate = Predicate::and(vec![
            Predicate::equal(E::column("a"), E::int32(1)),
            Predicate::compare(ComparisonOp::Less, E::int64(10), E::column("b")),
            Predicate::IsNotNull(E::column("c")),
        ]);
        let compiled = compile_document_predicate(&predicate).unwrap();
        assert_eq!(
            compiled.filter,
            json!({ "$and": [
                { "a": { "$eq": 1 } },
                { "b": { "$gt": 10 } },
                { "c": { "$exists": true, "$ne": null } },
            ]})
        );
    }

    #[test]
    fn test_like_operators_escape_pattern() {
        let predicate = Predicate::compare(
            ComparisonOp::StartsWith,
            E::column("path"),
            E::text("a.b"),
        );
        let compiled = compile_document_predicate(&predicate).unwrap();
        assert_eq!(compiled.filter, json!({ "path": { "$regex": "^a\\.b" } }));
    }

    #[test]
    fn test_negation_and_in() {
        let predicate = Predicate::not(Predicate::in_set(
            E::column("x"),
            vec![E::text("p"), E::text("q")],
        ));
        let compiled = compile_document_predicate(&predicate).unwrap();
        assert_eq!(
            compiled.filter,
            json!({ "$nor": [{ "x": { "$in": ["p", "q"] } }] })
        );
    }

    #[test]
    fn test_object_id_literal() {
        let id = "5f1d7a3e9b1e8a0012345678";
        let predicate = Predicate::equal(
            E::column("_id"),
            E::typed(
                CanonicalType::tagged(OBJECT_ID_TAG, CanonicalType::Utf8),
                Value::Text(id.to_string()),
            ),
        );
        let compiled = compile_document_predicate(&predicate).unwrap();
        assert_eq!(compiled.filter, json!({ "_id": { "$eq": { "$oid": id } } }));
    }

    #[test]
    fn test_partial_conjunction_policy() {
        let predicate = Predicate::and(vec![Predicate::IsNull(E::column("a")), failing()]);

        let optional =
            compile_document_filter(Some(&predicate), FilteringMode::Optional).unwrap();
        assert_eq!(optional.filter, json!({ "a": { "$eq": null } }));
        assert_eq!(optional.suppressed.len(), 1);

        let err =
            compile_document_filter(Some(&predicate), FilteringMode::Mandatory).unwrap_err();
        assert!(matches!(err.root(), PushdownError::UnsupportedExpression(_)));
    }

    #[test]
    fn test_disjunction_strict() {
        let predicate = Predicate::or(vec![Predicate::IsNull(E::column("a")), failing()]);
        assert!(compile_document_predicate(&predicate).is_err());
        let dropped = compile_document_filter(Some(&predicate), FilteringMode::Optional).unwrap();
        assert_eq!(dropped.filter, json!({}));
    }
}
