//! Plan execution.
//!
//! [`EvalCtx`] owns the per-request state: the base candles, the numeric and
//! boolean caches keyed by plan-node id, lazily loaded candles for other
//! timeframes, and the NaN policy. [`Runtime::exec_plan`] walks a plan in
//! topological order, memoizing every node; running the entry and exit plans
//! through one runtime shares all common work between them.

use crate::domain::candle::Candle;
use crate::domain::error::StratsimError;
use crate::domain::planner::{NodeId, NodeKind, Plan, PlanNode, PlanOp};
use crate::domain::registry::Registry;
use crate::domain::timeframe::Timeframe;
use crate::domain::ast::{CmpOp, LogicOp, MathOp};
use std::collections::HashMap;

pub type Series = Vec<f64>;
pub type BoolSeries = Vec<bool>;

/// How comparisons treat NaN operands: with `nan_is_false` set (the default)
/// any comparison touching a NaN is false; clearing the flag makes those
/// positions true instead. Arithmetic never consults this policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NanPolicy {
    pub nan_is_false: bool,
}

impl Default for NanPolicy {
    fn default() -> Self {
        NanPolicy { nan_is_false: true }
    }
}

/// Fixed base-column names; the only non-plan-id keys the numeric cache
/// accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Time,
    Open,
    High,
    Low,
    Close,
    Volume,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum SeriesKey {
    Column(Column),
    Node(NodeId),
}

pub struct EvalCtx<'a> {
    symbol: String,
    base_tf: Timeframe,
    provider: &'a dyn crate::ports::data_port::DataProvider,
    pub policy: NanPolicy,
    base_candles: Vec<Candle>,
    tf_candles: HashMap<Timeframe, Vec<Candle>>,
    series: HashMap<SeriesKey, Series>,
    bools: HashMap<NodeId, BoolSeries>,
}

impl<'a> EvalCtx<'a> {
    /// Pre-loads the base OHLCV and materializes the six fixed columns.
    pub fn new(
        symbol: impl Into<String>,
        base_tf: Timeframe,
        provider: &'a dyn crate::ports::data_port::DataProvider,
        policy: NanPolicy,
    ) -> Result<Self, StratsimError> {
        let symbol = symbol.into();
        let started = std::time::Instant::now();
        let base_candles = provider.load_ohlcv(&symbol, base_tf)?;
        tracing::debug!(
            symbol = %symbol,
            timeframe = %base_tf,
            bars = base_candles.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "base OHLCV loaded"
        );
        if base_candles.is_empty() {
            return Err(StratsimError::NoData {
                symbol,
                timeframe: base_tf.to_string(),
            });
        }

        let mut series = HashMap::new();
        let columns: [(Column, Series); 6] = [
            (
                Column::Time,
                base_candles
                    .iter()
                    .map(|b| b.time.and_utc().timestamp() as f64)
                    .collect(),
            ),
            (Column::Open, base_candles.iter().map(|b| b.open).collect()),
            (Column::High, base_candles.iter().map(|b| b.high).collect()),
            (Column::Low, base_candles.iter().map(|b| b.low).collect()),
            (Column::Close, base_candles.iter().map(|b| b.close).collect()),
            (
                Column::Volume,
                base_candles.iter().map(|b| b.volume).collect(),
            ),
        ];
        for (col, values) in columns {
            series.insert(SeriesKey::Column(col), values);
        }

        Ok(EvalCtx {
            symbol,
            base_tf,
            provider,
            policy,
            base_candles,
            tf_candles: HashMap::new(),
            series,
            bools: HashMap::new(),
        })
    }

    pub fn base_tf(&self) -> Timeframe {
        self.base_tf
    }

    pub fn base_candles(&self) -> &[Candle] {
        &self.base_candles
    }

    pub fn base_len(&self) -> usize {
        self.base_candles.len()
    }

    /// Candles at `timeframe`; the base frame is pre-loaded, any other frame
    /// is fetched from the provider once and cached.
    pub fn candles(&mut self, timeframe: Timeframe) -> Result<&[Candle], StratsimError> {
        if timeframe == self.base_tf {
            return Ok(&self.base_candles);
        }
        if !self.tf_candles.contains_key(&timeframe) {
            let bars = self.provider.load_ohlcv(&self.symbol, timeframe)?;
            self.tf_candles.insert(timeframe, bars);
        }
        match self.tf_candles.get(&timeframe) {
            Some(bars) => Ok(bars),
            None => Err(StratsimError::NoData {
                symbol: self.symbol.clone(),
                timeframe: timeframe.to_string(),
            }),
        }
    }

    fn column(&self, column: Column) -> Result<&Series, StratsimError> {
        self.series
            .get(&SeriesKey::Column(column))
            .ok_or_else(|| StratsimError::UnsupportedOp {
                op: "base column missing".to_string(),
            })
    }

    fn node_series(&self, id: NodeId) -> Option<&Series> {
        self.series.get(&SeriesKey::Node(id))
    }
}

pub struct Runtime<'a, 'b> {
    ctx: &'b mut EvalCtx<'a>,
    registry: &'b Registry,
}

impl<'a, 'b> Runtime<'a, 'b> {
    pub fn new(ctx: &'b mut EvalCtx<'a>, registry: &'b Registry) -> Self {
        Runtime { ctx, registry }
    }

    /// Evaluate the plan in topological order and return the root boolean
    /// series. Already-cached nodes are skipped.
    pub fn exec_plan(&mut self, plan: &Plan) -> Result<BoolSeries, StratsimError> {
        for &idx in &plan.order {
            let node = &plan.nodes[idx];
            match node.kind {
                NodeKind::Series | NodeKind::Align | NodeKind::Shift => {
                    if self.ctx.node_series(node.id).is_some() {
                        continue;
                    }
                    let series = self.exec_series_node(plan, node)?;
                    self.ctx.series.insert(SeriesKey::Node(node.id), series);
                }
                NodeKind::Bool => {
                    if self.ctx.bools.contains_key(&node.id) {
                        continue;
                    }
                    let bools = self.exec_bool_node(plan, node)?;
                    self.ctx.bools.insert(node.id, bools);
                }
            }
        }
        self.ctx
            .bools
            .get(&plan.root_id())
            .cloned()
            .ok_or_else(|| StratsimError::UnsupportedOp {
                op: "plan root is not boolean".to_string(),
            })
    }

    fn series_dep(
        &self,
        plan: &Plan,
        node: &PlanNode,
        idx: usize,
    ) -> Result<&Series, StratsimError> {
        let dep = &plan.nodes[node.deps[idx]];
        self.ctx
            .node_series(dep.id)
            .ok_or_else(|| StratsimError::UnsupportedOp {
                op: format!("dependency {} evaluated out of order", dep.id),
            })
    }

    fn bool_dep(
        &self,
        plan: &Plan,
        node: &PlanNode,
        idx: usize,
    ) -> Result<&BoolSeries, StratsimError> {
        let dep = &plan.nodes[node.deps[idx]];
        self.ctx
            .bools
            .get(&dep.id)
            .ok_or_else(|| StratsimError::UnsupportedOp {
                op: format!("dependency {} evaluated out of order", dep.id),
            })
    }

    fn gather_series_deps(
        &self,
        plan: &Plan,
        node: &PlanNode,
    ) -> Result<Vec<Series>, StratsimError> {
        (0..node.deps.len())
            .map(|i| self.series_dep(plan, node, i).cloned())
            .collect()
    }

    fn exec_series_node(&mut self, plan: &Plan, node: &PlanNode) -> Result<Series, StratsimError> {
        match &node.op {
            PlanOp::Const(value) => {
                let len = self.ctx.column(Column::Close)?.len();
                Ok(vec![*value; len])
            }

            PlanOp::Indicator {
                name,
                timeframe,
                params,
            } => {
                let args = self.gather_series_deps(plan, node)?;
                let registry = self.registry;
                let spec = registry.indicators.get(name).ok_or_else(|| {
                    StratsimError::UnknownIndicator { name: name.clone() }
                })?;
                (spec.eval)(&mut *self.ctx, *timeframe, params, &args)
            }

            PlanOp::Function { name, params } => {
                let args = self.gather_series_deps(plan, node)?;
                let registry = self.registry;
                let spec = registry.functions.get(name).ok_or_else(|| {
                    StratsimError::UnknownFunction { name: name.clone() }
                })?;
                (spec.eval)(&mut *self.ctx, params, &args)
            }

            PlanOp::Align { from } => {
                let src = self.series_dep(plan, node, 0)?;
                let aligned = self.ctx.provider.align_to(self.ctx.base_tf, src, *from)?;
                if aligned.len() != self.ctx.base_len() {
                    return Err(StratsimError::Alignment {
                        reason: format!(
                            "aligned series has {} bars, base has {}",
                            aligned.len(),
                            self.ctx.base_len()
                        ),
                    });
                }
                Ok(aligned)
            }

            PlanOp::Shift { bars } => {
                let src = self.series_dep(plan, node, 0)?;
                let bars = *bars as usize;
                let mut out = vec![f64::NAN; src.len()];
                for i in bars..src.len() {
                    out[i] = src[i - bars];
                }
                Ok(out)
            }

            PlanOp::Math(op) => {
                let l = self.series_dep(plan, node, 0)?;
                let r = self.series_dep(plan, node, 1)?;
                if l.len() != r.len() {
                    return Err(StratsimError::LengthMismatch {
                        left: l.len(),
                        right: r.len(),
                    });
                }
                let out = l
                    .iter()
                    .zip(r)
                    .map(|(&a, &b)| match op {
                        MathOp::Add => a + b,
                        MathOp::Sub => a - b,
                        MathOp::Mul => a * b,
                        MathOp::Div => {
                            if b == 0.0 {
                                f64::NAN
                            } else {
                                a / b
                            }
                        }
                        MathOp::Rem => a % b,
                        MathOp::Pow => a.powf(b),
                    })
                    .collect();
                Ok(out)
            }

            other => Err(StratsimError::UnsupportedOp {
                op: format!("{other:?} is not a series op"),
            }),
        }
    }

    fn exec_bool_node(&mut self, plan: &Plan, node: &PlanNode) -> Result<BoolSeries, StratsimError> {
        match &node.op {
            PlanOp::Not => {
                let mut out = self.bool_dep(plan, node, 0)?.clone();
                for v in &mut out {
                    *v = !*v;
                }
                Ok(out)
            }

            PlanOp::Logic(op) => {
                let l = self.bool_dep(plan, node, 0)?;
                let r = self.bool_dep(plan, node, 1)?;
                if l.len() != r.len() {
                    return Err(StratsimError::LengthMismatch {
                        left: l.len(),
                        right: r.len(),
                    });
                }
                let out = l
                    .iter()
                    .zip(r)
                    .map(|(&a, &b)| match op {
                        LogicOp::And => a && b,
                        LogicOp::Or => a || b,
                    })
                    .collect();
                Ok(out)
            }

            PlanOp::Cmp(op) => {
                let l = self.series_dep(plan, node, 0)?;
                let r = self.series_dep(plan, node, 1)?;
                if l.len() != r.len() {
                    return Err(StratsimError::LengthMismatch {
                        left: l.len(),
                        right: r.len(),
                    });
                }
                Ok(compare_series(l, r, *op, self.ctx.policy))
            }

            other => Err(StratsimError::UnsupportedOp {
                op: format!("{other:?} is not a bool op"),
            }),
        }
    }
}

fn compare_series(l: &[f64], r: &[f64], op: CmpOp, policy: NanPolicy) -> BoolSeries {
    let nan_result = !policy.nan_is_false;
    if op.is_cross() {
        let mut out = vec![false; l.len()];
        // index 0 is always false for cross operators
        for i in 1..l.len() {
            let vals = [l[i - 1], r[i - 1], l[i], r[i]];
            out[i] = if vals.iter().any(|v| v.is_nan()) {
                nan_result
            } else {
                match op {
                    CmpOp::CrossesAbove => l[i - 1] <= r[i - 1] && l[i] > r[i],
                    CmpOp::CrossesBelow => l[i - 1] >= r[i - 1] && l[i] < r[i],
                    _ => unreachable!("is_cross covers exactly the cross ops"),
                }
            };
        }
        return out;
    }

    l.iter()
        .zip(r)
        .map(|(&a, &b)| {
            if a.is_nan() || b.is_nan() {
                nan_result
            } else {
                match op {
                    CmpOp::Gt => a > b,
                    CmpOp::Ge => a >= b,
                    CmpOp::Lt => a < b,
                    CmpOp::Le => a <= b,
                    CmpOp::Eq => a == b,
                    CmpOp::Ne => a != b,
                    CmpOp::CrossesAbove | CmpOp::CrossesBelow => unreachable!(),
                }
            }
        })
        .collect()
}
