//! Wire tokens for user-authored conditions.
//!
//! Conditions arrive as flat JSON token lists. The raw `params` payload is a
//! free-form JSON value on the wire; [`coerce_num_params`] and
//! [`coerce_func_params`] convert it into typed shapes at the parser boundary
//! so later stages never touch untyped JSON.

use crate::domain::error::StratsimError;
use crate::domain::timeframe::Timeframe;
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Indicator,
    /// Math or comparison operator.
    Operator,
    Number,
    Function,
    /// AND / OR / NOT between clauses.
    Logical,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Token {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: TokenKind,
    #[serde(default)]
    pub timeframe: Option<String>,
    #[serde(default)]
    pub indicator: Option<String>,
    #[serde(default)]
    pub params: Option<serde_json::Value>,
    #[serde(default)]
    pub offset: u32,
    #[serde(default)]
    pub operator: Option<String>,
    #[serde(default)]
    pub value: f64,
    #[serde(default)]
    pub function: Option<String>,
}

impl Token {
    pub fn number(value: f64) -> Self {
        Token {
            id: String::new(),
            kind: TokenKind::Number,
            timeframe: None,
            indicator: None,
            params: None,
            offset: 0,
            operator: None,
            value,
            function: None,
        }
    }

    pub fn operator(op: &str) -> Self {
        Token {
            operator: Some(op.to_string()),
            ..Token::number(0.0)
        }
        .with_kind(TokenKind::Operator)
    }

    pub fn logical(op: &str) -> Self {
        Token {
            operator: Some(op.to_string()),
            ..Token::number(0.0)
        }
        .with_kind(TokenKind::Logical)
    }

    pub fn indicator(name: &str, timeframe: Timeframe, params: serde_json::Value) -> Self {
        Token {
            indicator: Some(name.to_string()),
            timeframe: Some(timeframe.as_str().to_string()),
            params: Some(params),
            ..Token::number(0.0)
        }
        .with_kind(TokenKind::Indicator)
    }

    pub fn function(name: &str, params: serde_json::Value) -> Self {
        Token {
            function: Some(name.to_string()),
            params: Some(params),
            ..Token::number(0.0)
        }
        .with_kind(TokenKind::Function)
    }

    fn with_kind(mut self, kind: TokenKind) -> Self {
        self.kind = kind;
        self
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Condition {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub tokens: Vec<Token>,
}

/// A function parameter after boundary coercion: a numeric scalar or a nested
/// expression given as a token sub-list.
#[derive(Debug, Clone)]
pub enum FuncParam {
    Number(f64),
    Expr(Vec<Token>),
}

/// Coerce an indicator `params` payload into a numeric map.
pub fn coerce_num_params(
    owner: &str,
    params: Option<&serde_json::Value>,
) -> Result<BTreeMap<String, f64>, StratsimError> {
    let mut out = BTreeMap::new();
    let Some(value) = params else {
        return Ok(out);
    };
    let map = value
        .as_object()
        .ok_or_else(|| StratsimError::NonNumericParam {
            owner: owner.to_string(),
            name: "params".to_string(),
        })?;
    for (k, v) in map {
        let num = v.as_f64().ok_or_else(|| StratsimError::NonNumericParam {
            owner: owner.to_string(),
            name: k.clone(),
        })?;
        out.insert(k.clone(), num);
    }
    Ok(out)
}

/// Coerce a function `params` payload: numbers stay scalars, arrays are nested
/// expression token lists.
pub fn coerce_func_params(
    owner: &str,
    params: Option<&serde_json::Value>,
) -> Result<BTreeMap<String, FuncParam>, StratsimError> {
    let mut out = BTreeMap::new();
    let Some(value) = params else {
        return Ok(out);
    };
    let map = value
        .as_object()
        .ok_or_else(|| StratsimError::NonNumericParam {
            owner: owner.to_string(),
            name: "params".to_string(),
        })?;
    for (k, v) in map {
        let param = match v {
            serde_json::Value::Number(n) => {
                FuncParam::Number(n.as_f64().ok_or_else(|| StratsimError::NonNumericParam {
                    owner: owner.to_string(),
                    name: k.clone(),
                })?)
            }
            serde_json::Value::Array(items) => {
                let tokens = items
                    .iter()
                    .map(|item| serde_json::from_value::<Token>(item.clone()))
                    .collect::<Result<Vec<_>, _>>()?;
                FuncParam::Expr(tokens)
            }
            _ => {
                return Err(StratsimError::NonNumericParam {
                    owner: owner.to_string(),
                    name: k.clone(),
                })
            }
        };
        out.insert(k.clone(), param);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserialize_indicator_token() {
        let raw = json!({
            "id": "t1",
            "type": "indicator",
            "indicator": "SMA",
            "timeframe": "5m",
            "params": {"period": 20},
            "offset": 1
        });
        let token: Token = serde_json::from_value(raw).unwrap();
        assert_eq!(token.kind, TokenKind::Indicator);
        assert_eq!(token.indicator.as_deref(), Some("SMA"));
        assert_eq!(token.timeframe.as_deref(), Some("5m"));
        assert_eq!(token.offset, 1);
    }

    #[test]
    fn deserialize_operator_and_number() {
        let op: Token = serde_json::from_value(json!({"type": "operator", "operator": ">"}))
            .unwrap();
        assert_eq!(op.kind, TokenKind::Operator);
        assert_eq!(op.operator.as_deref(), Some(">"));

        let num: Token =
            serde_json::from_value(json!({"type": "number", "value": 42.5})).unwrap();
        assert_eq!(num.kind, TokenKind::Number);
        assert!((num.value - 42.5).abs() < f64::EPSILON);
    }

    #[test]
    fn coerce_num_params_accepts_numbers() {
        let params = json!({"period": 14, "mult": 2.5});
        let map = coerce_num_params("SMA", Some(&params)).unwrap();
        assert_eq!(map["period"], 14.0);
        assert_eq!(map["mult"], 2.5);
    }

    #[test]
    fn coerce_num_params_empty_when_absent() {
        assert!(coerce_num_params("SMA", None).unwrap().is_empty());
    }

    #[test]
    fn coerce_num_params_rejects_strings() {
        let params = json!({"period": "fourteen"});
        let err = coerce_num_params("SMA", Some(&params)).unwrap_err();
        assert!(matches!(err, StratsimError::NonNumericParam { .. }));
    }

    #[test]
    fn coerce_func_params_scalar_and_expr() {
        let params = json!({
            "period": 5,
            "source": [
                {"type": "indicator", "indicator": "Close", "timeframe": "5m"}
            ]
        });
        let map = coerce_func_params("SMA", Some(&params)).unwrap();
        assert!(matches!(map["period"], FuncParam::Number(p) if p == 5.0));
        assert!(matches!(&map["source"], FuncParam::Expr(ts) if ts.len() == 1));
    }

    #[test]
    fn coerce_func_params_rejects_bool() {
        let params = json!({"flag": true});
        assert!(coerce_func_params("F", Some(&params)).is_err());
    }
}
