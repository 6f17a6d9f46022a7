use chrono::{DateTime, Utc};

/// Format a money amount with its currency code, e.g. `USD 1,250.00`
pub fn format_amount(amount: f64, currency: &str) -> String {
    let negative = amount < 0.0;
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();

    // Group thousands
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    format!(
        "{}{} {}.{:02}",
        if negative { "-" } else { "" },
        currency,
        grouped,
        cents % 100
    )
}

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

/// Format an optional date, returning `default` if None
pub fn format_date(date: Option<DateTime<Utc>>, default: &str) -> String {
    match date {
        Some(dt) => dt.format("%b %d, %Y").to_string(),
        None => default.to_string(),
    }
}

/// "in 3 days", "today", "2 days ago"
pub fn format_days(days: i64) -> String {
    match days {
        0 => "today".to_string(),
        1 => "tomorrow".to_string(),
        -1 => "yesterday".to_string(),
        d if d > 1 => format!("in {} days", d),
        d => format!("{} days ago", -d),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(50.0, "USD"), "USD 50.00");
        assert_eq!(format_amount(1250.5, "EUR"), "EUR 1,250.50");
        assert_eq!(format_amount(1234567.891, "USD"), "USD 1,234,567.89");
        assert_eq!(format_amount(-20.0, "USD"), "-USD 20.00");
        assert_eq!(format_amount(0.0, "USD"), "USD 0.00");
    }

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("Hello", 10), "Hello");
        assert_eq!(truncate_string("Hello World", 8), "Hello...");
        assert_eq!(truncate_string("Hi", 2), "Hi");
        assert_eq!(truncate_string("Müller-Lüdenscheidt", 6), "Mül...");
    }

    #[test]
    fn test_format_date() {
        let dt = Utc.with_ymd_and_hms(2024, 2, 10, 9, 30, 0).unwrap();
        assert_eq!(format_date(Some(dt), "-"), "Feb 10, 2024");
        assert_eq!(format_date(None, "never"), "never");
    }

    #[test]
    fn test_format_days() {
        assert_eq!(format_days(0), "today");
        assert_eq!(format_days(5), "in 5 days");
        assert_eq!(format_days(-3), "3 days ago");
    }
}
