//! Threshold predicates such as `p(95)<100` or `rate<0.0001`

use std::fmt;
use thiserror::Error;

use super::types::{BuiltinMetric, MetricKind};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ThresholdError {
    #[error("Unknown metric: {0}")]
    UnknownMetric(String),

    #[error("Malformed predicate: '{0}'")]
    Malformed(String),

    #[error("Unknown aggregation '{0}'")]
    UnknownAggregation(String),

    #[error("Percentile must be within 0-100 in '{0}'")]
    PercentileRange(String),

    #[error("Aggregation '{aggregation}' is not valid for {kind} metric {metric}")]
    InvalidAggregation {
        metric: String,
        kind: MetricKind,
        aggregation: String,
    },
}

/// Aggregated value a predicate compares against
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Aggregation {
    Avg,
    Min,
    Max,
    Med,
    Percentile(f64),
    Rate,
    Count,
    Value,
}

impl Aggregation {
    fn parse(s: &str) -> Result<Self, ThresholdError> {
        let s = s.trim();
        match s {
            "avg" => Ok(Aggregation::Avg),
            "min" => Ok(Aggregation::Min),
            "max" => Ok(Aggregation::Max),
            "med" => Ok(Aggregation::Med),
            "rate" => Ok(Aggregation::Rate),
            "count" => Ok(Aggregation::Count),
            "value" => Ok(Aggregation::Value),
            _ => {
                let inner = s
                    .strip_prefix("p(")
                    .and_then(|rest| rest.strip_suffix(')'))
                    .ok_or_else(|| ThresholdError::UnknownAggregation(s.to_string()))?;
                let p: f64 = inner
                    .trim()
                    .parse()
                    .map_err(|_| ThresholdError::UnknownAggregation(s.to_string()))?;
                if !(0.0..=100.0).contains(&p) {
                    return Err(ThresholdError::PercentileRange(s.to_string()));
                }
                Ok(Aggregation::Percentile(p))
            }
        }
    }

    fn valid_for(&self, kind: MetricKind) -> bool {
        match kind {
            MetricKind::Trend => matches!(
                self,
                Aggregation::Avg
                    | Aggregation::Min
                    | Aggregation::Max
                    | Aggregation::Med
                    | Aggregation::Percentile(_)
            ),
            MetricKind::Rate => matches!(self, Aggregation::Rate),
            MetricKind::Counter => matches!(self, Aggregation::Count | Aggregation::Rate),
            MetricKind::Gauge => matches!(self, Aggregation::Value),
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Aggregation::Avg => f.write_str("avg"),
            Aggregation::Min => f.write_str("min"),
            Aggregation::Max => f.write_str("max"),
            Aggregation::Med => f.write_str("med"),
            Aggregation::Percentile(p) => write!(f, "p({})", p),
            Aggregation::Rate => f.write_str("rate"),
            Aggregation::Count => f.write_str("count"),
            Aggregation::Value => f.write_str("value"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl Operator {
    // Longest tokens first so `<=` is not read as `<`
    const TOKENS: [(&'static str, Operator); 7] = [
        ("===", Operator::Eq),
        ("==", Operator::Eq),
        ("!=", Operator::Ne),
        ("<=", Operator::Le),
        (">=", Operator::Ge),
        ("<", Operator::Lt),
        (">", Operator::Gt),
    ];

    pub fn apply(self, lhs: f64, rhs: f64) -> bool {
        match self {
            Operator::Lt => lhs < rhs,
            Operator::Le => lhs <= rhs,
            Operator::Gt => lhs > rhs,
            Operator::Ge => lhs >= rhs,
            Operator::Eq => lhs == rhs,
            Operator::Ne => lhs != rhs,
        }
    }
}

/// A pass/fail predicate over one aggregated metric
#[derive(Debug, Clone, PartialEq)]
pub struct Threshold {
    metric: BuiltinMetric,
    predicate: String,
    aggregation: Aggregation,
    operator: Operator,
    value: f64,
}

impl Threshold {
    /// Parse `<aggregation> <op> <number>` for the named metric
    pub fn parse(metric_name: &str, predicate: &str) -> Result<Self, ThresholdError> {
        let metric = BuiltinMetric::from_name(metric_name.trim())
            .ok_or_else(|| ThresholdError::UnknownMetric(metric_name.to_string()))?;
        let malformed = || ThresholdError::Malformed(predicate.to_string());

        let op_start = predicate
            .find(['<', '>', '=', '!'])
            .ok_or_else(malformed)?;
        let (lhs, rest) = predicate.split_at(op_start);
        let (token, operator) = Operator::TOKENS
            .iter()
            .find(|(token, _)| rest.starts_with(token))
            .copied()
            .ok_or_else(malformed)?;

        let value: f64 = rest[token.len()..]
            .trim()
            .parse()
            .map_err(|_| malformed())?;
        if !value.is_finite() {
            return Err(malformed());
        }

        let aggregation = Aggregation::parse(lhs)?;
        if !aggregation.valid_for(metric.kind()) {
            return Err(ThresholdError::InvalidAggregation {
                metric: metric.name().to_string(),
                kind: metric.kind(),
                aggregation: aggregation.to_string(),
            });
        }

        Ok(Self {
            metric,
            predicate: predicate.trim().to_string(),
            aggregation,
            operator,
            value,
        })
    }

    pub fn metric(&self) -> BuiltinMetric {
        self.metric
    }

    pub fn predicate(&self) -> &str {
        &self.predicate
    }

    pub fn aggregation(&self) -> Aggregation {
        self.aggregation
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// True when the observed aggregate satisfies the predicate
    pub fn evaluate(&self, observed: f64) -> bool {
        self.operator.apply(observed, self.value)
    }
}
