use std::time::Duration;

pub(crate) fn format_tags_inline(tags: &[(String, String)], exclude: &[&str]) -> String {
    let mut filtered: Vec<(String, String)> = tags
        .iter()
        .filter(|(k, _)| !exclude.iter().any(|e| e == &k.as_str()))
        .cloned()
        .collect();

    filtered.sort_by(|(ak, av), (bk, bv)| ak.cmp(bk).then_with(|| av.cmp(bv)));

    if filtered.is_empty() {
        return String::new();
    }

    let inner = filtered
        .into_iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(" ");

    format!("{{{inner}}}")
}

pub(crate) fn format_rate(v: f64) -> String {
    if v.is_finite() {
        format!("{v:.0}")
    } else {
        "0".to_string()
    }
}

pub(crate) fn format_percent(v: f64) -> String {
    if v.is_finite() {
        format!("{:.2}%", v * 100.0)
    } else {
        "n/a".to_string()
    }
}

pub(crate) fn format_ms_opt(v: Option<f64>) -> String {
    match v {
        Some(ms) if ms.is_finite() => format_ms(ms),
        _ => "n/a".to_string(),
    }
}

pub(crate) fn format_ms(ms: f64) -> String {
    if ms >= 1_000.0 {
        format!("{:.2}s", ms / 1_000.0)
    } else if ms >= 1.0 {
        format!("{ms:.2}ms")
    } else {
        format!("{:.0}µs", ms * 1_000.0)
    }
}

/// Renders in the largest unit that fits: `1h2m`, `3m5s`, `12s`, `250ms`.
pub(crate) fn format_duration(d: Duration) -> String {
    let total_ms = d.as_millis();
    if total_ms < 1_000 {
        return format!("{total_ms}ms");
    }

    let total_secs = d.as_secs();
    let (h, rem) = (total_secs / 3_600, total_secs % 3_600);
    let (m, s) = (rem / 60, rem % 60);

    if h > 0 {
        format!("{h}h{m}m")
    } else if m > 0 {
        format!("{m}m{s}s")
    } else {
        format!("{s}s")
    }
}

/// Measured threshold value in the unit of its aggregation.
pub(crate) fn format_observed(expression: &str, observed: Option<f64>) -> String {
    let Some(v) = observed else {
        return "n/a".to_string();
    };

    match authload_core::parse_threshold_expr(expression).map(|e| e.agg) {
        Ok(authload_core::ThresholdAgg::Rate) => format!("{v:.4}"),
        Ok(authload_core::ThresholdAgg::Count) => format!("{v:.0}"),
        Ok(_) => format_ms(v),
        Err(_) => format!("{v}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_tags_inline_sorts_and_excludes() {
        let tags = vec![
            ("status".to_string(), "200".to_string()),
            ("endpoint".to_string(), "login".to_string()),
            ("scenario".to_string(), "login_scn".to_string()),
        ];
        assert_eq!(
            format_tags_inline(&tags, &["scenario"]),
            "{endpoint=login status=200}"
        );
        assert_eq!(format_tags_inline(&tags[2..], &["scenario"]), "");
    }

    #[test]
    fn format_duration_picks_largest_unit() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_secs(12)), "12s");
        assert_eq!(format_duration(Duration::from_secs(185)), "3m5s");
        assert_eq!(format_duration(Duration::from_secs(3_720)), "1h2m");
    }

    #[test]
    fn format_ms_scales_units() {
        assert_eq!(format_ms(0.5), "500µs");
        assert_eq!(format_ms(12.345), "12.35ms");
        assert_eq!(format_ms(1_500.0), "1.50s");
        assert_eq!(format_ms_opt(None), "n/a");
    }

    #[test]
    fn format_observed_uses_aggregation_unit() {
        assert_eq!(format_observed("rate<0.02", Some(0.0125)), "0.0125");
        assert_eq!(format_observed("p(95)<500", Some(231.5)), "231.50ms");
        assert_eq!(format_observed("count>0", Some(12.0)), "12");
        assert_eq!(format_observed("p(95)<500", None), "n/a");
        assert_eq!(format_percent(0.25), "25.00%");
    }
}
