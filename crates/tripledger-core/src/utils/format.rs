/// Format a rupee amount with Indian-system digit grouping,
/// e.g. 1234567 -> "₹12,34,567".
pub fn format_currency(value: i64) -> String {
    let negative = value < 0;
    let digits = value.unsigned_abs().to_string();

    let grouped = if digits.len() <= 3 {
        digits
    } else {
        // Last three digits form one group; the rest group in pairs
        let (head, tail) = digits.split_at(digits.len() - 3);
        let mut parts: Vec<String> = Vec::new();
        let head_bytes = head.as_bytes();
        let mut i = head_bytes.len();
        while i > 0 {
            let start = i.saturating_sub(2);
            parts.push(head[start..i].to_string());
            i = start;
        }
        parts.reverse();
        format!("{},{}", parts.join(","), tail)
    };

    if negative {
        format!("-₹{}", grouped)
    } else {
        format!("₹{}", grouped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_currency_small_values() {
        assert_eq!(format_currency(0), "₹0");
        assert_eq!(format_currency(999), "₹999");
    }

    #[test]
    fn test_format_currency_indian_grouping() {
        assert_eq!(format_currency(1500), "₹1,500");
        assert_eq!(format_currency(45000), "₹45,000");
        assert_eq!(format_currency(1234567), "₹12,34,567");
        assert_eq!(format_currency(123456789), "₹12,34,56,789");
    }

    #[test]
    fn test_format_currency_negative() {
        assert_eq!(format_currency(-1380), "-₹1,380");
    }
}
