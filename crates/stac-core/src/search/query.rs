use std::cmp::Ordering;

use serde_json::Value;

use super::lookup_property;
use crate::client::QueryClient;
use crate::error::{ClientError, ClientResult};
use crate::types::{Item, QueryExpr, QueryOp};

/// Query extension evaluator over JSON item properties.
///
/// Numbers compare numerically and strings lexically; comparing values of
/// different kinds never matches. A missing property matches only `neq`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonQuery;

pub(crate) fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => l.as_f64()?.partial_cmp(&r.as_f64()?),
        (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
        (Value::Bool(l), Value::Bool(r)) => Some(l.cmp(r)),
        _ => None,
    }
}

fn text_op(value: &Value, operand: &Value, op: QueryOp) -> ClientResult<bool> {
    let operand = operand.as_str().ok_or_else(|| {
        ClientError::Validation(format!("operator {:?} requires a string operand", op))
    })?;
    let Some(value) = value.as_str() else {
        return Ok(false);
    };
    Ok(match op {
        QueryOp::StartsWith => value.starts_with(operand),
        QueryOp::EndsWith => value.ends_with(operand),
        _ => value.contains(operand),
    })
}

fn evaluate(value: Option<&Value>, op: QueryOp, operand: &Value) -> ClientResult<bool> {
    let Some(value) = value else {
        return Ok(op == QueryOp::Neq);
    };
    let ordering = || compare(value, operand);
    Ok(match op {
        QueryOp::Eq => value == operand || ordering() == Some(Ordering::Equal),
        QueryOp::Neq => !(value == operand || ordering() == Some(Ordering::Equal)),
        QueryOp::Lt => ordering() == Some(Ordering::Less),
        QueryOp::Lte => matches!(ordering(), Some(Ordering::Less | Ordering::Equal)),
        QueryOp::Gt => ordering() == Some(Ordering::Greater),
        QueryOp::Gte => matches!(ordering(), Some(Ordering::Greater | Ordering::Equal)),
        QueryOp::StartsWith | QueryOp::EndsWith | QueryOp::Contains => {
            return text_op(value, operand, op)
        }
        QueryOp::In => {
            let candidates = operand.as_array().ok_or_else(|| {
                ClientError::Validation("operator `in` requires a list operand".to_string())
            })?;
            candidates
                .iter()
                .any(|candidate| value == candidate || compare(value, candidate) == Some(Ordering::Equal))
        }
    })
}

impl QueryClient for JsonQuery {
    fn matches(&self, item: &Item, query: &QueryExpr) -> ClientResult<bool> {
        for (property, clauses) in query {
            let value = lookup_property(item, property);
            for (op, operand) in clauses {
                let op: QueryOp = op.parse()?;
                if !evaluate(value, op, operand)? {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }
}
