//! Legacy alias sugar
//!
//! Dashboards and URLs still carry the fixed legacy range names
//! (`rill-TD`, `rill-PWC`, ...) and bare ISO-8601 durations (`P7D`,
//! `PT24H`). Both are normalized to canonical grammar expressions before
//! parsing proper, and both carry a fixed human label used by the label
//! generator.

use std::borrow::Cow;

/// A legacy range name with its canonical expression and display label
pub struct Alias {
    pub token: &'static str,
    pub expression: &'static str,
    pub label: &'static str,
}

/// Fixed legacy range names
pub const ALIASES: &[Alias] = &[
    Alias { token: "inf", expression: "inf", label: "All time" },
    Alias { token: "rill-TD", expression: "DTD", label: "Today" },
    Alias { token: "rill-WTD", expression: "WTD", label: "Week to date" },
    Alias { token: "rill-MTD", expression: "MTD", label: "Month to date" },
    Alias { token: "rill-QTD", expression: "QTD", label: "Quarter to date" },
    Alias { token: "rill-YTD", expression: "YTD", label: "Year to date" },
    Alias { token: "rill-PDC", expression: "-1d,now/d", label: "Previous day" },
    Alias { token: "rill-PWC", expression: "-1w,now/w", label: "Previous week" },
    Alias { token: "rill-PMC", expression: "-1M,now/M", label: "Previous month" },
    Alias { token: "rill-PQC", expression: "-1Q,now/Q", label: "Previous quarter" },
    Alias { token: "rill-PYC", expression: "-1y,now/y", label: "Previous year" },
    Alias { token: "rill-6H", expression: "-6h", label: "Last 6 hours" },
    Alias { token: "rill-24H", expression: "-24h", label: "Last 24 hours" },
    Alias { token: "rill-7D", expression: "-7d", label: "Last 7 days" },
    Alias { token: "rill-14D", expression: "-14d", label: "Last 14 days" },
    Alias { token: "rill-30D", expression: "-30d", label: "Last 30 days" },
    Alias { token: "rill-90D", expression: "-90d", label: "Last 90 days" },
    Alias { token: "rill-365D", expression: "-365d", label: "Last 365 days" },
];

/// Rewrite a legacy alias or ISO-8601 duration to canonical grammar;
/// anything else passes through untouched.
pub fn normalize(input: &str) -> Cow<'_, str> {
    for alias in ALIASES {
        if alias.token.eq_ignore_ascii_case(input) {
            return Cow::Borrowed(alias.expression);
        }
    }
    if let Some(expression) = iso_duration_to_shorthand(input) {
        return Cow::Owned(expression);
    }
    Cow::Borrowed(input)
}

/// Fixed label for a legacy alias token
pub fn alias_label(input: &str) -> Option<&'static str> {
    ALIASES
        .iter()
        .find(|alias| alias.token.eq_ignore_ascii_case(input))
        .map(|alias| alias.label)
}

/// Captured unit counts of an ISO-8601 duration, coarse to fine
fn iso_duration_parts(input: &str) -> Option<Vec<(i64, &'static str, &'static str)>> {
    let re = regex::Regex::new(
        r"^P(?:(\d+)Y)?(?:(\d+)M)?(?:(\d+)W)?(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?)?$",
    )
    .ok()?;
    let caps = re.captures(input)?;

    // (capture index, grammar code, period name)
    let units = [
        (1, "y", "year"),
        (2, "M", "month"),
        (3, "w", "week"),
        (4, "d", "day"),
        (5, "h", "hour"),
        (6, "m", "minute"),
        (7, "s", "second"),
    ];
    let mut parts = Vec::new();
    for (idx, code, name) in units {
        if let Some(m) = caps.get(idx) {
            let n: i64 = m.as_str().parse().ok()?;
            if n > 0 {
                parts.push((n, code, name));
            }
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts)
}

/// `P7D` → `-7d`, `P1DT12H` → `-1d-12h`
///
/// A duration alias always looks back from the reference, so every unit
/// is emitted negative.
pub fn iso_duration_to_shorthand(input: &str) -> Option<String> {
    let parts = iso_duration_parts(input)?;
    let mut out = String::new();
    for (n, code, _) in parts {
        out.push_str(&format!("-{}{}", n, code));
    }
    Some(out)
}

/// `P7D` → "Last 7 days"
pub fn iso_duration_label(input: &str) -> Option<String> {
    let parts = iso_duration_parts(input)?;
    let mut out = String::from("Last");
    for (n, _, name) in parts {
        if n == 1 {
            out.push_str(&format!(" 1 {}", name));
        } else {
            out.push_str(&format!(" {} {}s", n, name));
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_legacy_aliases() {
        assert_eq!(normalize("rill-TD"), "DTD");
        assert_eq!(normalize("rill-PWC"), "-1w,now/w");
        assert_eq!(normalize("rill-30D"), "-30d");
        // case-insensitive
        assert_eq!(normalize("RILL-WTD"), "WTD");
    }

    #[test]
    fn test_normalize_iso_durations() {
        assert_eq!(normalize("P7D"), "-7d");
        assert_eq!(normalize("PT24H"), "-24h");
        assert_eq!(normalize("P1M"), "-1M");
        assert_eq!(normalize("P1DT12H"), "-1d-12h");
    }

    #[test]
    fn test_normalize_passthrough() {
        assert_eq!(normalize("-7d, now/d"), "-7d, now/d");
        assert_eq!(normalize("Production"), "Production");
        // an empty or zero duration is not a duration alias
        assert_eq!(normalize("P"), "P");
        assert_eq!(normalize("P0D"), "P0D");
    }

    #[test]
    fn test_alias_labels() {
        assert_eq!(alias_label("rill-TD"), Some("Today"));
        assert_eq!(alias_label("rill-PQC"), Some("Previous quarter"));
        assert_eq!(alias_label("inf"), Some("All time"));
        assert_eq!(alias_label("-7d"), None);
    }

    #[test]
    fn test_iso_duration_labels() {
        assert_eq!(iso_duration_label("P7D"), Some("Last 7 days".to_string()));
        assert_eq!(iso_duration_label("P1M"), Some("Last 1 month".to_string()));
        assert_eq!(
            iso_duration_label("P1DT12H"),
            Some("Last 1 day 12 hours".to_string())
        );
        assert_eq!(iso_duration_label("now"), None);
    }
}
