use serde::{Deserialize, Serialize};

/// What the weight of a sample measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WeightType {
    /// Every sample counts once (or by an integer weight).
    #[default]
    Samples,
    /// Weights are durations in milliseconds (tracing data).
    TracingMs,
    /// Weights are allocation sizes in bytes.
    Bytes,
}

impl WeightType {
    /// Format a total or self value for a call-tree column.
    ///
    /// Only tracing durations keep fractional digits; counts and byte sizes
    /// are shown as grouped integers.
    pub fn format_value(self, value: f64, is_high_precision: bool) -> String {
        match self {
            Self::TracingMs => format_number(value, 3, if is_high_precision { 3 } else { 1 }),
            Self::Samples | Self::Bytes => format_number(value, 0, 0),
        }
    }

    /// Append the unit to an already formatted value.
    ///
    /// The singular is picked from the displayed text, so a weight that
    /// rounds to `1` reads as one sample.
    pub fn with_unit(self, formatted: &str) -> String {
        match self {
            Self::TracingMs => format!("{formatted}ms"),
            Self::Samples if formatted == "1" => format!("{formatted} sample"),
            Self::Samples => format!("{formatted} samples"),
            Self::Bytes => format!("{formatted} bytes"),
        }
    }

    /// Accessibility label for a call-tree row.
    pub fn aria_label(
        self,
        name: &str,
        total_with_unit: &str,
        total_percent: &str,
        self_with_unit: &str,
    ) -> String {
        let (total_label, self_label) = match self {
            Self::TracingMs => ("running time", "self time"),
            Self::Samples => ("running count", "self count"),
            Self::Bytes => ("total size", "self size"),
        };
        format!(
            "{name}, {total_label} is {total_with_unit} ({total_percent}), {self_label} is {self_with_unit}"
        )
    }
}

/// Format `value` with roughly `significant_digits` significant digits, never
/// more than `max_fractional_digits` after the decimal point, grouping the
/// integer part by thousands.
///
/// Zero has no leading digit, so it always gets `max_fractional_digits`.
pub fn format_number(value: f64, significant_digits: u32, max_fractional_digits: usize) -> String {
    let digits_left = value.abs().log10().floor() + 1.0;
    let wanted = f64::from(significant_digits) - digits_left;
    let places = wanted.clamp(0.0, max_fractional_digits as f64);
    let places = if places.is_nan() { 0 } else { places as usize };
    group_thousands(&format!("{value:.places$}"))
}

/// Format a ratio as a percentage: `0.5` → `"50%"`, `0.05` → `"5.0%"`.
pub fn format_percent(ratio: f64) -> String {
    format!("{}%", format_number(ratio * 100.0, 2, 1))
}

fn group_thousands(formatted: &str) -> String {
    let (sign, unsigned) = match formatted.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", formatted),
    };
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (unsigned, None),
    };

    let mut out = String::with_capacity(formatted.len() + int_part.len() / 3);
    out.push_str(sign);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if let Some(frac_part) = frac_part {
        out.push('.');
        out.push_str(frac_part);
    }
    out
}
