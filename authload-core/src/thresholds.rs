/// Thresholds declared for one metric selector (`name` or `name{key:value,...}`).
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdSet {
    pub metric: String,
    /// Only series carrying every one of these tags are considered.
    pub tags: Vec<(String, String)>,
    pub expressions: Vec<String>,
}

impl ThresholdSet {
    /// Parses a selector such as `login_duration{endpoint:login}`; both `:` and `=`
    /// separate a tag key from its value.
    pub fn from_selector(selector: &str, expressions: Vec<String>) -> Result<Self, String> {
        let (metric, tags) = parse_selector(selector)?;
        Ok(Self {
            metric,
            tags,
            expressions,
        })
    }

    /// Display form of the selector, e.g. `login_duration{endpoint:login}`.
    pub fn selector(&self) -> String {
        if self.tags.is_empty() {
            return self.metric.clone();
        }
        let tags: Vec<String> = self.tags.iter().map(|(k, v)| format!("{k}:{v}")).collect();
        format!("{}{{{}}}", self.metric, tags.join(","))
    }
}

fn parse_selector(raw: &str) -> Result<(String, Vec<(String, String)>), String> {
    let raw = raw.trim();
    let Some(open) = raw.find('{') else {
        if raw.is_empty() {
            return Err("empty metric name".to_string());
        }
        return Ok((raw.to_string(), Vec::new()));
    };

    let name = raw[..open].trim();
    let inner = raw[open + 1..]
        .strip_suffix('}')
        .ok_or_else(|| format!("unterminated tag filter in `{raw}`"))?;
    if name.is_empty() {
        return Err(format!("missing metric name in `{raw}`"));
    }

    let mut tags = Vec::new();
    for pair in inner.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (k, v) = pair
            .split_once(':')
            .or_else(|| pair.split_once('='))
            .ok_or_else(|| format!("invalid tag filter `{pair}` in `{raw}`"))?;
        let (k, v) = (k.trim(), v.trim());
        if k.is_empty() || v.is_empty() {
            return Err(format!("invalid tag filter `{pair}` in `{raw}`"));
        }
        tags.push((k.to_string(), v.to_string()));
    }

    Ok((name.to_string(), tags))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdOp {
    Lt,
    Lte,
    Gt,
    Gte,
    Eq,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ThresholdAgg {
    Avg,
    Min,
    Max,
    Med,
    Count,
    Rate,
    P(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdExpr {
    pub agg: ThresholdAgg,
    pub op: ThresholdOp,
    /// Durations are normalized to milliseconds.
    pub value: f64,
}

/// Result of evaluating one expression.
#[derive(Debug, Clone)]
pub struct ThresholdOutcome {
    /// Selector as written back by [`ThresholdSet::selector`].
    pub metric: String,
    pub expression: String,
    /// `None` when the selected series received no observations.
    pub observed: Option<f64>,
    pub passed: bool,
}

pub fn parse_threshold_expr(raw: &str) -> Result<ThresholdExpr, String> {
    let s: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if s.is_empty() {
        return Err("empty threshold".to_string());
    }

    let ops = [
        ("<=", ThresholdOp::Lte),
        (">=", ThresholdOp::Gte),
        ("==", ThresholdOp::Eq),
        ("<", ThresholdOp::Lt),
        (">", ThresholdOp::Gt),
    ];
    let (op_pos, op_len, op) = ops
        .iter()
        .find_map(|(tok, op)| s.find(tok).map(|pos| (pos, tok.len(), *op)))
        .ok_or_else(|| format!("invalid threshold (missing operator): {raw}"))?;

    let (left, right_with_op) = s.split_at(op_pos);
    let right = &right_with_op[op_len..];
    if left.is_empty() || right.is_empty() {
        return Err(format!("invalid threshold: {raw}"));
    }

    let agg = if left.eq_ignore_ascii_case("avg") {
        ThresholdAgg::Avg
    } else if left.eq_ignore_ascii_case("min") {
        ThresholdAgg::Min
    } else if left.eq_ignore_ascii_case("max") {
        ThresholdAgg::Max
    } else if left.eq_ignore_ascii_case("med") {
        ThresholdAgg::Med
    } else if left.eq_ignore_ascii_case("count") {
        ThresholdAgg::Count
    } else if left.eq_ignore_ascii_case("rate") {
        ThresholdAgg::Rate
    } else if let Some(inner) = left.strip_prefix("p(").and_then(|v| v.strip_suffix(')')) {
        let p: f64 = inner
            .parse()
            .map_err(|_| format!("invalid percentile in threshold: {raw}"))?;
        if !(p > 0.0 && p <= 100.0) {
            return Err(format!("percentile out of range in threshold: {raw}"));
        }
        ThresholdAgg::P(p)
    } else {
        return Err(format!("unknown aggregation `{left}` in threshold: {raw}"));
    };

    let value = parse_value(right).ok_or_else(|| format!("invalid numeric value in threshold: {raw}"))?;

    Ok(ThresholdExpr { agg, op, value })
}

/// Plain number, or a duration with `ms`, `s` or `us` suffix (converted to milliseconds).
fn parse_value(raw: &str) -> Option<f64> {
    let (num, scale) = if let Some(v) = raw.strip_suffix("ms") {
        (v, 1.0)
    } else if let Some(v) = raw.strip_suffix("us") {
        (v, 0.001)
    } else if let Some(v) = raw.strip_suffix('s') {
        (v, 1_000.0)
    } else {
        (raw, 1.0)
    };

    let v: f64 = num.parse().ok()?;
    v.is_finite().then_some(v * scale)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_threshold_expr_trims_whitespace() {
        let expr = parse_threshold_expr("  avg  <=  123  ").unwrap_or_else(|e| panic!("{e}"));
        assert!(matches!(expr.agg, ThresholdAgg::Avg));
        assert!(matches!(expr.op, ThresholdOp::Lte));
        assert_eq!(expr.value, 123.0);
    }

    #[test]
    fn parse_threshold_expr_accepts_duration_units() {
        let expr = parse_threshold_expr("p(95)<500ms").unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(expr.agg, ThresholdAgg::P(95.0));
        assert_eq!(expr.op, ThresholdOp::Lt);
        assert_eq!(expr.value, 500.0);

        let expr = parse_threshold_expr("p(99.9) < 1.5s").unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(expr.agg, ThresholdAgg::P(99.9));
        assert_eq!(expr.value, 1_500.0);

        let expr = parse_threshold_expr("rate<0.02").unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(expr.agg, ThresholdAgg::Rate);
        assert_eq!(expr.value, 0.02);
    }

    #[test]
    fn parse_threshold_expr_rejects_out_of_range_percentiles() {
        let err = match parse_threshold_expr("p(101)<1") {
            Ok(_) => panic!("expected error"),
            Err(e) => e,
        };
        assert!(err.contains("out of range"));
        assert!(parse_threshold_expr("p(0)<1").is_err());
        assert!(parse_threshold_expr("avg<fast").is_err());
        assert!(parse_threshold_expr("stddev<1").is_err());
        assert!(parse_threshold_expr("rate").is_err());
    }

    #[test]
    fn selector_parses_tag_filters() {
        let set = ThresholdSet::from_selector("login_duration{endpoint:login}", vec![])
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(set.metric, "login_duration");
        assert_eq!(
            set.tags,
            vec![("endpoint".to_string(), "login".to_string())]
        );
        assert_eq!(set.selector(), "login_duration{endpoint:login}");

        let set = ThresholdSet::from_selector("http_reqs{ scenario = signup , status=201 }", vec![])
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(set.tags.len(), 2);
        assert_eq!(set.tags[1], ("status".to_string(), "201".to_string()));

        let plain = ThresholdSet::from_selector("http_req_failed", vec![])
            .unwrap_or_else(|e| panic!("{e}"));
        assert!(plain.tags.is_empty());

        assert!(ThresholdSet::from_selector("x{endpoint}", vec![]).is_err());
        assert!(ThresholdSet::from_selector("x{endpoint:login", vec![]).is_err());
        assert!(ThresholdSet::from_selector("{endpoint:login}", vec![]).is_err());
    }
}
