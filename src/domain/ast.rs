//! Typed expression and predicate trees.
//!
//! The parser produces these from a flat token list; the planner consumes
//! them. Numeric subtrees are [`ExprNode`], boolean subtrees are [`PredNode`].

use crate::domain::timeframe::Timeframe;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MathOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
}

impl MathOp {
    /// Shunting-yard precedence, higher binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            MathOp::Pow => 4,
            MathOp::Mul | MathOp::Div | MathOp::Rem => 3,
            MathOp::Add | MathOp::Sub => 2,
        }
    }

    /// `^` is the only right-associative operator.
    pub fn right_assoc(self) -> bool {
        matches!(self, MathOp::Pow)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MathOp::Add => "+",
            MathOp::Sub => "-",
            MathOp::Mul => "*",
            MathOp::Div => "/",
            MathOp::Rem => "%",
            MathOp::Pow => "^",
        }
    }
}

impl FromStr for MathOp {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "+" => Ok(MathOp::Add),
            "-" => Ok(MathOp::Sub),
            "*" => Ok(MathOp::Mul),
            "/" => Ok(MathOp::Div),
            "%" => Ok(MathOp::Rem),
            "^" => Ok(MathOp::Pow),
            _ => Err(()),
        }
    }
}

impl fmt::Display for MathOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmpOp {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
    Ne,
    /// True where the left series crosses from at-or-below to above the right.
    CrossesAbove,
    /// True where the left series crosses from at-or-above to below the right.
    CrossesBelow,
}

impl CmpOp {
    /// Cross-bar operators read bar `i-1` as well as bar `i`.
    pub fn is_cross(self) -> bool {
        matches!(self, CmpOp::CrossesAbove | CmpOp::CrossesBelow)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::CrossesAbove => "crosses_above",
            CmpOp::CrossesBelow => "crosses_below",
        }
    }
}

impl FromStr for CmpOp {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            ">" => Ok(CmpOp::Gt),
            ">=" => Ok(CmpOp::Ge),
            "<" => Ok(CmpOp::Lt),
            "<=" => Ok(CmpOp::Le),
            "==" => Ok(CmpOp::Eq),
            "!=" => Ok(CmpOp::Ne),
            "crosses_above" => Ok(CmpOp::CrossesAbove),
            "crosses_below" => Ok(CmpOp::CrossesBelow),
            _ => Err(()),
        }
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicOp {
    And,
    Or,
}

impl fmt::Display for LogicOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogicOp::And => "AND",
            LogicOp::Or => "OR",
        })
    }
}

/// Numeric expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprNode {
    Number(f64),
    Indicator {
        name: String,
        timeframe: Timeframe,
        params: BTreeMap<String, f64>,
        /// Bars to look back; 0 means the current bar.
        offset: u32,
    },
    Function {
        name: String,
        params: BTreeMap<String, f64>,
        /// Nested expression arguments in parameter-name order.
        args: Vec<(String, ExprNode)>,
    },
    BinaryMath {
        left: Box<ExprNode>,
        op: MathOp,
        right: Box<ExprNode>,
    },
}

/// Boolean predicate tree.
#[derive(Debug, Clone, PartialEq)]
pub enum PredNode {
    Compare {
        left: ExprNode,
        op: CmpOp,
        right: ExprNode,
    },
    Logical {
        op: LogicOp,
        lhs: Box<PredNode>,
        rhs: Box<PredNode>,
    },
    Not(Box<PredNode>),
}

impl fmt::Display for ExprNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExprNode::Number(v) => write!(f, "{v}"),
            ExprNode::Indicator {
                name,
                timeframe,
                offset,
                ..
            } => {
                write!(f, "{name}@{timeframe}")?;
                if *offset > 0 {
                    write!(f, "[-{offset}]")?;
                }
                Ok(())
            }
            ExprNode::Function { name, .. } => write!(f, "{name}(…)"),
            ExprNode::BinaryMath { left, op, right } => write!(f, "({left} {op} {right})"),
        }
    }
}

impl fmt::Display for PredNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredNode::Compare { left, op, right } => write!(f, "{left} {op} {right}"),
            PredNode::Logical { op, lhs, rhs } => write!(f, "({lhs} {op} {rhs})"),
            PredNode::Not(inner) => write!(f, "NOT ({inner})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn math_precedence_ladder() {
        assert!(MathOp::Pow.precedence() > MathOp::Mul.precedence());
        assert_eq!(MathOp::Mul.precedence(), MathOp::Div.precedence());
        assert_eq!(MathOp::Div.precedence(), MathOp::Rem.precedence());
        assert!(MathOp::Mul.precedence() > MathOp::Add.precedence());
        assert_eq!(MathOp::Add.precedence(), MathOp::Sub.precedence());
    }

    #[test]
    fn only_pow_is_right_assoc() {
        assert!(MathOp::Pow.right_assoc());
        for op in [MathOp::Add, MathOp::Sub, MathOp::Mul, MathOp::Div, MathOp::Rem] {
            assert!(!op.right_assoc());
        }
    }

    #[test]
    fn cmp_op_round_trip() {
        for s in [">", ">=", "<", "<=", "==", "!=", "crosses_above", "crosses_below"] {
            let op: CmpOp = s.parse().unwrap();
            assert_eq!(op.as_str(), s);
        }
        assert!("~=".parse::<CmpOp>().is_err());
    }

    #[test]
    fn cross_ops_flagged() {
        assert!(CmpOp::CrossesAbove.is_cross());
        assert!(CmpOp::CrossesBelow.is_cross());
        assert!(!CmpOp::Gt.is_cross());
    }

    #[test]
    fn display_nested_predicate() {
        let pred = PredNode::Logical {
            op: LogicOp::Or,
            lhs: Box::new(PredNode::Compare {
                left: ExprNode::Number(1.0),
                op: CmpOp::Gt,
                right: ExprNode::Number(2.0),
            }),
            rhs: Box::new(PredNode::Not(Box::new(PredNode::Compare {
                left: ExprNode::Number(3.0),
                op: CmpOp::Le,
                right: ExprNode::Number(4.0),
            }))),
        };
        assert_eq!(pred.to_string(), "(1 > 2 OR NOT (3 <= 4))");
    }
}
