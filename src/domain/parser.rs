//! Token-list parser and validator.
//!
//! Converts a flat token list into a typed predicate tree:
//!
//! 1. The list is split into clause chunks around binary `AND`/`OR` tokens.
//!    A `NOT` token flags the *next* clause and stacks (double negation
//!    toggles). `AND` and `OR` have equal precedence and associate left.
//! 2. Each clause must contain exactly one comparison operator with
//!    non-empty sides.
//! 3. Expression sides go through a shunting-yard with precedence
//!    `^` over `* / %` over `+ -`; only `^` is right-associative.
//! 4. Indicator and function tokens are validated against the registry
//!    (timeframe legality, parameter schema) and their raw JSON params are
//!    coerced into typed maps here, at the boundary.

use crate::domain::ast::{CmpOp, ExprNode, LogicOp, MathOp, PredNode};
use crate::domain::error::StratsimError;
use crate::domain::registry::{check_params, Registry};
use crate::domain::timeframe::Timeframe;
use crate::domain::token::{coerce_func_params, coerce_num_params, Condition, FuncParam, Token, TokenKind};

pub struct Parser<'a> {
    registry: &'a Registry,
}

enum Item {
    Clause {
        negated: bool,
        start: usize,
        end: usize,
    },
    Op {
        op: LogicOp,
        pos: usize,
    },
}

impl<'a> Parser<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Parser { registry }
    }

    /// Structural check only; discards the tree.
    pub fn validate(&self, condition: &Condition) -> Result<(), StratsimError> {
        self.parse_predicate(&condition.tokens).map(|_| ())
    }

    pub fn parse_predicate(&self, tokens: &[Token]) -> Result<PredNode, StratsimError> {
        let items = self.split_clauses(tokens)?;
        if items.is_empty() {
            return Err(StratsimError::condition("empty condition", 0));
        }

        let mut pred: Option<PredNode> = None;
        let mut last_op: Option<LogicOp> = None;
        let mut expect_op = false;

        for item in items {
            match item {
                Item::Op { op, pos } => {
                    if !expect_op {
                        return Err(StratsimError::condition("unexpected logical operator", pos));
                    }
                    last_op = Some(op);
                    expect_op = false;
                }
                Item::Clause {
                    negated,
                    start,
                    end,
                } => {
                    let cmp = self.parse_comparison(&tokens[start..end], start)?;
                    let node = if negated {
                        PredNode::Not(Box::new(cmp))
                    } else {
                        cmp
                    };
                    pred = Some(match pred.take() {
                        None => node,
                        Some(prev) => {
                            let op = last_op.take().ok_or_else(|| {
                                StratsimError::condition(
                                    "missing logical operator between comparisons",
                                    start,
                                )
                            })?;
                            PredNode::Logical {
                                op,
                                lhs: Box::new(prev),
                                rhs: Box::new(node),
                            }
                        }
                    });
                    expect_op = true;
                }
            }
        }

        if last_op.is_some() {
            return Err(StratsimError::condition(
                "dangling logical operator",
                tokens.len(),
            ));
        }
        pred.ok_or_else(|| StratsimError::condition("empty condition", 0))
    }

    fn split_clauses(&self, tokens: &[Token]) -> Result<Vec<Item>, StratsimError> {
        let mut items = Vec::new();
        let mut pending_neg = false;
        let mut run_start: Option<usize> = None;

        for (i, t) in tokens.iter().enumerate() {
            if t.kind != TokenKind::Logical {
                if run_start.is_none() {
                    run_start = Some(i);
                }
                continue;
            }
            match t.operator.as_deref().unwrap_or("") {
                "NOT" => {
                    if run_start.is_some() {
                        // "X NOT Y" without a separator is invalid
                        return Err(StratsimError::condition(
                            "NOT must appear before a comparison or group",
                            i,
                        ));
                    }
                    pending_neg = !pending_neg;
                }
                op @ ("AND" | "OR") => {
                    if let Some(start) = run_start.take() {
                        items.push(Item::Clause {
                            negated: pending_neg,
                            start,
                            end: i,
                        });
                        pending_neg = false;
                    }
                    items.push(Item::Op {
                        op: if op == "AND" { LogicOp::And } else { LogicOp::Or },
                        pos: i,
                    });
                }
                other => {
                    return Err(StratsimError::UnknownLogicalOperator {
                        op: other.to_string(),
                    })
                }
            }
        }
        if let Some(start) = run_start {
            items.push(Item::Clause {
                negated: pending_neg,
                start,
                end: tokens.len(),
            });
        }
        Ok(items)
    }

    fn parse_comparison(
        &self,
        tokens: &[Token],
        base_pos: usize,
    ) -> Result<PredNode, StratsimError> {
        let mut idx: Option<usize> = None;
        let mut cmp_op = CmpOp::Gt;
        for (i, t) in tokens.iter().enumerate() {
            if t.kind != TokenKind::Operator {
                continue;
            }
            let Some(op) = t.operator.as_deref().and_then(|s| s.parse::<CmpOp>().ok()) else {
                continue;
            };
            if idx.is_some() {
                return Err(StratsimError::condition(
                    "multiple comparison operators in one clause",
                    base_pos + i,
                ));
            }
            idx = Some(i);
            cmp_op = op;
        }
        let Some(idx) = idx else {
            return Err(StratsimError::condition(
                "missing comparison operator",
                base_pos,
            ));
        };
        let (left_ts, right_ts) = (&tokens[..idx], &tokens[idx + 1..]);
        if left_ts.is_empty() || right_ts.is_empty() {
            return Err(StratsimError::condition(
                "incomplete comparison",
                base_pos + idx,
            ));
        }

        let left = self.parse_expr(left_ts, base_pos)?;
        let right = self.parse_expr(right_ts, base_pos + idx + 1)?;
        Ok(PredNode::Compare {
            left,
            op: cmp_op,
            right,
        })
    }

    fn parse_expr(&self, tokens: &[Token], base_pos: usize) -> Result<ExprNode, StratsimError> {
        let mut ops: Vec<MathOp> = Vec::new();
        let mut out: Vec<ExprNode> = Vec::new();

        fn emit(out: &mut Vec<ExprNode>, op: MathOp, pos: usize) -> Result<(), StratsimError> {
            let (Some(right), Some(left)) = (out.pop(), out.pop()) else {
                return Err(StratsimError::condition("malformed expression", pos));
            };
            out.push(ExprNode::BinaryMath {
                left: Box::new(left),
                op,
                right: Box::new(right),
            });
            Ok(())
        }

        for (i, t) in tokens.iter().enumerate() {
            let pos = base_pos + i;
            match t.kind {
                TokenKind::Number => out.push(ExprNode::Number(t.value)),
                TokenKind::Indicator => out.push(self.indicator_operand(t)?),
                TokenKind::Function => out.push(self.function_operand(t)?),
                TokenKind::Operator => {
                    let raw = t.operator.as_deref().unwrap_or("");
                    let Ok(op) = raw.parse::<MathOp>() else {
                        return Err(StratsimError::condition(
                            format!("unexpected operator {raw:?} in expression"),
                            pos,
                        ));
                    };
                    while let Some(&top) = ops.last() {
                        let binds_tighter = top.precedence() > op.precedence()
                            || (top.precedence() == op.precedence() && !op.right_assoc());
                        if !binds_tighter {
                            break;
                        }
                        ops.pop();
                        emit(&mut out, top, pos)?;
                    }
                    ops.push(op);
                }
                TokenKind::Logical => {
                    return Err(StratsimError::condition(
                        "unexpected logical token in expression",
                        pos,
                    ))
                }
            }
        }

        while let Some(op) = ops.pop() {
            emit(&mut out, op, base_pos + tokens.len())?;
        }

        match (out.pop(), out.is_empty()) {
            (Some(expr), true) => Ok(expr),
            _ => Err(StratsimError::condition(
                "malformed expression (extra values or operators)",
                base_pos,
            )),
        }
    }

    fn indicator_operand(&self, t: &Token) -> Result<ExprNode, StratsimError> {
        let name = t.indicator.clone().unwrap_or_default();
        let tf_raw = t.timeframe.clone().unwrap_or_default();
        let timeframe: Timeframe = tf_raw.parse()?;

        let spec = self
            .registry
            .indicators
            .get(&name)
            .ok_or_else(|| StratsimError::UnknownIndicator { name: name.clone() })?;

        let params = coerce_num_params(&name, t.params.as_ref())?;
        check_params(&name, &spec.params, params.keys())?;

        Ok(ExprNode::Indicator {
            name,
            timeframe,
            params,
            offset: t.offset,
        })
    }

    fn function_operand(&self, t: &Token) -> Result<ExprNode, StratsimError> {
        let name = t.function.clone().unwrap_or_default();
        let spec = self
            .registry
            .functions
            .get(&name)
            .ok_or_else(|| StratsimError::UnknownFunction { name: name.clone() })?;

        let raw = coerce_func_params(&name, t.params.as_ref())?;
        check_params(&name, &spec.params, raw.keys())?;

        let mut params = std::collections::BTreeMap::new();
        let mut args = Vec::new();
        for (key, value) in raw {
            match value {
                FuncParam::Number(v) => {
                    params.insert(key, v);
                }
                FuncParam::Expr(sub_tokens) => {
                    let expr = self.parse_expr(&sub_tokens, 0)?;
                    args.push((key, expr));
                }
            }
        }
        Ok(ExprNode::Function { name, params, args })
    }
}
