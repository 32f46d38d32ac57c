// Display formatting shared by every consumer of the analysis results.

pub mod display_format {
    /// Groups the integer part with `,` every three digits: 1515000.0 -> "1,515,000".
    pub fn group_thousands(value: f64, decimals: usize) -> String {
        let formatted = format!("{:.decimals$}", value.abs(), decimals = decimals);
        let (int_part, frac_part) = match formatted.split_once('.') {
            Some((i, f)) => (i, Some(f)),
            None => (formatted.as_str(), None),
        };

        let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
        for (i, digit) in int_part.chars().enumerate() {
            if i > 0 && (int_part.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(digit);
        }

        let sign = if value < 0.0 && formatted.chars().any(|c| c.is_ascii_digit() && c != '0') {
            "-"
        } else {
            ""
        };
        match frac_part {
            Some(frac) => format!("{sign}{grouped}.{frac}"),
            None => format!("{sign}{grouped}"),
        }
    }

    pub fn format_usd(value: f64) -> String {
        if value < 0.0 {
            format!("-${}", group_thousands(-value, 2))
        } else {
            format!("${}", group_thousands(value, 2))
        }
    }

    pub fn format_idr(value: f64) -> String {
        if value < 0.0 {
            format!("-Rp {}", group_thousands(-value, 0))
        } else {
            format!("Rp {}", group_thousands(value, 0))
        }
    }

    pub fn format_volume(value: f64) -> String {
        group_thousands(value, 0)
    }

    /// Signed delta followed by the percentage, e.g. "1.00 (1.00%)" or "-2.50 (-0.80%)".
    pub fn format_delta(change: f64, change_percent: f64, decimals: usize) -> String {
        format!(
            "{:.decimals$} ({:.2}%)",
            change,
            change_percent,
            decimals = decimals
        )
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_group_thousands() {
            assert_eq!(group_thousands(1515000.0, 0), "1,515,000");
            assert_eq!(group_thousands(999.0, 0), "999");
            assert_eq!(group_thousands(1234.567, 2), "1,234.57");
            assert_eq!(group_thousands(-1234.5, 1), "-1,234.5");
            assert_eq!(group_thousands(0.0, 2), "0.00");
        }

        #[test]
        fn test_currency_formats() {
            assert_eq!(format_usd(101.0), "$101.00");
            assert_eq!(format_usd(-3.5), "-$3.50");
            assert_eq!(format_idr(1515000.0), "Rp 1,515,000");
            assert_eq!(format_volume(12345678.0), "12,345,678");
        }

        #[test]
        fn test_format_delta() {
            assert_eq!(format_delta(1.0, 1.0, 2), "1.00 (1.00%)");
            assert_eq!(format_delta(-15000.0, -0.8, 0), "-15000 (-0.80%)");
        }
    }
}
