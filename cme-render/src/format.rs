//! Human-readable number formatting for labels and legends.

use cme_census::variables::ValueFormat;

/// Insert thousands separators into the integer part of a rounded value.
pub fn group_thousands(value: f64) -> String {
    let rounded = value.round();
    let digits = format!("{}", rounded.abs() as u64);
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if rounded < 0.0 {
        format!("-{}", out)
    } else {
        out
    }
}

pub fn format_value(value: Option<f64>, format: ValueFormat) -> String {
    let v = match value {
        Some(v) if v.is_finite() => v,
        _ => return "No data".to_string(),
    };
    match format {
        ValueFormat::Currency => format!("${}", group_thousands(v)),
        ValueFormat::Number => group_thousands(v),
        ValueFormat::Years => format!("{:.1} years", v),
        ValueFormat::Percent => format!("{:.1}%", v),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(0.0), "0");
        assert_eq!(group_thousands(999.4), "999");
        assert_eq!(group_thousands(1000.0), "1,000");
        assert_eq!(group_thousands(1234567.0), "1,234,567");
        assert_eq!(group_thousands(-52000.0), "-52,000");
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(Some(64226.0), ValueFormat::Currency), "$64,226");
        assert_eq!(format_value(Some(38.34), ValueFormat::Years), "38.3 years");
        assert_eq!(format_value(Some(7.0), ValueFormat::Percent), "7.0%");
        assert_eq!(format_value(None, ValueFormat::Number), "No data");
    }
}
