/// Format a number with thousands separators and a fixed number of decimals.
///
/// # Examples
///
/// ```
/// use guardian_core::formatting::format_number;
///
/// assert_eq!(format_number(1234.5, 1), "1,234.5");
/// assert_eq!(format_number(0.0, 2), "0.00");
/// assert_eq!(format_number(-9876.5, 1), "-9,876.5");
/// ```
pub fn format_number(value: f64, decimals: u32) -> String {
    let negative = value < 0.0;
    let abs_value = value.abs();

    // Scaled epsilon so midpoints like 2.675 round up.
    let factor = 10_f64.powi(decimals as i32);
    let epsilon = f64::EPSILON * abs_value * factor;
    let rounded = ((abs_value * factor) + epsilon).round() / factor;

    let grouped = group_thousands(&(rounded.trunc() as u64).to_string());
    let body = if decimals == 0 {
        grouped
    } else {
        let frac = format!("{:.prec$}", rounded.fract(), prec = decimals as usize);
        // "0.xx" -> ".xx"
        format!("{}{}", grouped, &frac[1..])
    };

    if negative && rounded != 0.0 {
        format!("-{}", body)
    } else {
        body
    }
}

/// Format a US-dollar amount.
///
/// Hourly figures are small, so amounts under one dollar keep four
/// decimals.
///
/// # Examples
///
/// ```
/// use guardian_core::formatting::format_currency;
///
/// assert_eq!(format_currency(1234.56), "$1,234.56");
/// assert_eq!(format_currency(0.0104), "$0.0104");
/// assert_eq!(format_currency(0.0), "$0.00");
/// ```
pub fn format_currency(amount: f64) -> String {
    let decimals = if amount != 0.0 && amount.abs() < 1.0 { 4 } else { 2 };
    if amount < 0.0 {
        format!("$-{}", format_number(amount.abs(), decimals))
    } else {
        format!("${}", format_number(amount, decimals))
    }
}

/// Format a CO₂ mass in kilograms with three decimals.
///
/// ```
/// use guardian_core::formatting::format_kg;
///
/// assert_eq!(format_kg(0.0096), "0.010 kg");
/// ```
pub fn format_kg(kg: f64) -> String {
    format!("{} kg", format_number(kg, 3))
}

/// Format an optional reading, showing `N/A` when absent.
pub fn format_optional(value: Option<f64>, decimals: u32) -> String {
    value
        .map(|v| format_number(v, decimals))
        .unwrap_or_else(|| "N/A".to_string())
}

/// Calculate `(part / whole) * 100`, rounded to `decimal_places`.
///
/// Returns `0.0` if `whole` is zero.
pub fn percentage(part: f64, whole: f64, decimal_places: u32) -> f64 {
    if whole == 0.0 {
        return 0.0;
    }
    let factor = 10_f64.powi(decimal_places as i32);
    ((part / whole) * 100.0 * factor).round() / factor
}

/// Insert commas every three digits from the right of an integer string.
fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
