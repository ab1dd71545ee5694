//! Predicate-tree to DAG lowering.
//!
//! The planner interns every subtree through a structural key map, so
//! semantically identical subtrees resolve to one node no matter where they
//! appear — including across the entry and exit predicates when both are
//! built by the same planner instance. Node ids are a hash of the structural
//! key; sharing is decided by key equality, so hash collisions cannot cause
//! two distinct subtrees to merge.
//!
//! Two node kinds are materialized explicitly rather than folded into
//! indicator dispatch: `align` (indicator timeframe differs from the base)
//! and `shift` (token offset), so a plan can be inspected offline. The plan
//! itself is pure structure: no I/O, no series buffers.

use crate::domain::ast::{CmpOp, ExprNode, LogicOp, MathOp, PredNode};
use crate::domain::error::StratsimError;
use crate::domain::timeframe::Timeframe;
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};

pub type NodeId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Numeric series.
    Series,
    /// Boolean series.
    Bool,
    /// Timeframe alignment of a numeric dependency.
    Align,
    /// Backward shift of a numeric dependency.
    Shift,
}

/// Operation tag plus the semantically relevant metadata.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanOp {
    Const(f64),
    Indicator {
        name: String,
        timeframe: Timeframe,
        params: BTreeMap<String, f64>,
    },
    Function {
        name: String,
        params: BTreeMap<String, f64>,
    },
    Math(MathOp),
    Align {
        from: Timeframe,
    },
    Shift {
        bars: u32,
    },
    Cmp(CmpOp),
    Logic(LogicOp),
    Not,
}

#[derive(Debug, Clone)]
pub struct PlanNode {
    pub id: NodeId,
    pub kind: NodeKind,
    pub op: PlanOp,
    /// Indices into the plan's node arena, in operand order.
    pub deps: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct Plan {
    pub nodes: Vec<PlanNode>,
    pub root: usize,
    /// Indices into `nodes`; every node appears once, after its dependencies.
    pub order: Vec<usize>,
}

impl Plan {
    pub fn root_id(&self) -> NodeId {
        self.nodes[self.root].id
    }
}

/// Structural identity of a node: operand ids plus the metadata that affects
/// the computed series. Interning on this key is what implements CSE.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum NodeKey {
    Const(u64),
    Indicator {
        name: String,
        timeframe: Timeframe,
        params: Vec<(String, u64)>,
    },
    Function {
        name: String,
        params: Vec<(String, u64)>,
        deps: Vec<NodeId>,
    },
    Math {
        op: MathOp,
        lhs: NodeId,
        rhs: NodeId,
    },
    Align {
        from: Timeframe,
        dep: NodeId,
    },
    Shift {
        bars: u32,
        dep: NodeId,
    },
    Cmp {
        op: CmpOp,
        lhs: NodeId,
        rhs: NodeId,
    },
    Not {
        dep: NodeId,
    },
    Logic {
        op: LogicOp,
        lhs: NodeId,
        rhs: NodeId,
    },
}

fn key_id(key: &NodeKey) -> NodeId {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish()
}

fn hash_params(params: &BTreeMap<String, f64>) -> Vec<(String, u64)> {
    params
        .iter()
        .map(|(k, v)| (k.clone(), v.to_bits()))
        .collect()
}

pub struct Planner {
    base_tf: Timeframe,
    nodes: Vec<PlanNode>,
    interned: HashMap<NodeKey, usize>,
}

impl Planner {
    pub fn new(base_tf: Timeframe) -> Self {
        Planner {
            base_tf,
            nodes: Vec::new(),
            interned: HashMap::new(),
        }
    }

    /// Lower a predicate tree into a plan with its topological order.
    /// Successive calls share the intern table, so a planner used for both
    /// entry and exit predicates emits shared node ids across the two plans.
    pub fn build(&mut self, root: &PredNode) -> Result<Plan, StratsimError> {
        let root_idx = self.plan_pred(root)?;

        let mut seen = vec![false; self.nodes.len()];
        let mut order = Vec::new();
        self.dfs(root_idx, &mut seen, &mut order);

        tracing::debug!(
            nodes = self.nodes.len(),
            scheduled = order.len(),
            "plan built"
        );
        Ok(Plan {
            nodes: self.nodes.clone(),
            root: root_idx,
            order,
        })
    }

    fn dfs(&self, idx: usize, seen: &mut Vec<bool>, order: &mut Vec<usize>) {
        if seen[idx] {
            return;
        }
        seen[idx] = true;
        for &dep in &self.nodes[idx].deps {
            self.dfs(dep, seen, order);
        }
        order.push(idx);
    }

    fn intern(&mut self, key: NodeKey, kind: NodeKind, op: PlanOp, deps: Vec<usize>) -> usize {
        if let Some(&idx) = self.interned.get(&key) {
            return idx;
        }
        let id = key_id(&key);
        let idx = self.nodes.len();
        self.nodes.push(PlanNode { id, kind, op, deps });
        self.interned.insert(key, idx);
        idx
    }

    fn plan_expr(&mut self, expr: &ExprNode) -> Result<usize, StratsimError> {
        match expr {
            ExprNode::Number(value) => Ok(self.intern(
                NodeKey::Const(value.to_bits()),
                NodeKind::Series,
                PlanOp::Const(*value),
                vec![],
            )),

            ExprNode::Indicator {
                name,
                timeframe,
                params,
                offset,
            } => {
                let key = NodeKey::Indicator {
                    name: name.clone(),
                    timeframe: *timeframe,
                    params: hash_params(params),
                };
                let mut idx = self.intern(
                    key,
                    NodeKind::Series,
                    PlanOp::Indicator {
                        name: name.clone(),
                        timeframe: *timeframe,
                        params: params.clone(),
                    },
                    vec![],
                );

                if *timeframe != self.base_tf {
                    let dep_id = self.nodes[idx].id;
                    idx = self.intern(
                        NodeKey::Align {
                            from: *timeframe,
                            dep: dep_id,
                        },
                        NodeKind::Align,
                        PlanOp::Align { from: *timeframe },
                        vec![idx],
                    );
                }
                if *offset > 0 {
                    let dep_id = self.nodes[idx].id;
                    idx = self.intern(
                        NodeKey::Shift {
                            bars: *offset,
                            dep: dep_id,
                        },
                        NodeKind::Shift,
                        PlanOp::Shift { bars: *offset },
                        vec![idx],
                    );
                }
                Ok(idx)
            }

            ExprNode::Function { name, params, args } => {
                let mut deps = Vec::with_capacity(args.len());
                for (_key, arg) in args {
                    deps.push(self.plan_expr(arg)?);
                }
                let dep_ids = deps.iter().map(|&d| self.nodes[d].id).collect();
                let key = NodeKey::Function {
                    name: name.clone(),
                    params: hash_params(params),
                    deps: dep_ids,
                };
                Ok(self.intern(
                    key,
                    NodeKind::Series,
                    PlanOp::Function {
                        name: name.clone(),
                        params: params.clone(),
                    },
                    deps,
                ))
            }

            ExprNode::BinaryMath { left, op, right } => {
                let l = self.plan_expr(left)?;
                let r = self.plan_expr(right)?;
                let key = NodeKey::Math {
                    op: *op,
                    lhs: self.nodes[l].id,
                    rhs: self.nodes[r].id,
                };
                Ok(self.intern(key, NodeKind::Series, PlanOp::Math(*op), vec![l, r]))
            }
        }
    }

    fn plan_pred(&mut self, pred: &PredNode) -> Result<usize, StratsimError> {
        match pred {
            PredNode::Compare { left, op, right } => {
                let l = self.plan_expr(left)?;
                let r = self.plan_expr(right)?;
                let key = NodeKey::Cmp {
                    op: *op,
                    lhs: self.nodes[l].id,
                    rhs: self.nodes[r].id,
                };
                Ok(self.intern(key, NodeKind::Bool, PlanOp::Cmp(*op), vec![l, r]))
            }
            PredNode::Not(inner) => {
                let dep = self.plan_pred(inner)?;
                let key = NodeKey::Not {
                    dep: self.nodes[dep].id,
                };
                Ok(self.intern(key, NodeKind::Bool, PlanOp::Not, vec![dep]))
            }
            PredNode::Logical { op, lhs, rhs } => {
                let l = self.plan_pred(lhs)?;
                let r = self.plan_pred(rhs)?;
                let key = NodeKey::Logic {
                    op: *op,
                    lhs: self.nodes[l].id,
                    rhs: self.nodes[r].id,
                };
                Ok(self.intern(key, NodeKind::Bool, PlanOp::Logic(*op), vec![l, r]))
            }
        }
    }
}
