//! Human-readable formatting for chat replies.

/// Join names as `a, b and c`; an empty list reads `no machines`.
pub fn format_list<S: AsRef<str>>(entries: &[S]) -> String {
    match entries {
        [] => "no machines".to_string(),
        [only] => only.as_ref().to_string(),
        [init @ .., last] => {
            let head: Vec<&str> = init.iter().map(AsRef::as_ref).collect();
            format!("{} and {}", head.join(", "), last.as_ref())
        }
    }
}

/// Round a duration in seconds down to its largest unit: `45s`, `12m`,
/// `5h`, `3d`.
pub fn format_interval(secs: i64) -> String {
    let secs = secs.max(0);
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3_600 {
        format!("{}m", secs / 60)
    } else if secs < 86_400 {
        format!("{}h", secs / 3_600)
    } else {
        format!("{}d", secs / 86_400)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_shapes() {
        let empty: [&str; 0] = [];
        assert_eq!(format_list(&empty), "no machines");
        assert_eq!(format_list(&["alpha"]), "alpha");
        assert_eq!(format_list(&["alpha", "bravo"]), "alpha and bravo");
        assert_eq!(
            format_list(&["alpha", "bravo", "charlie"]),
            "alpha, bravo and charlie"
        );
    }

    #[test]
    fn interval_units() {
        assert_eq!(format_interval(0), "0s");
        assert_eq!(format_interval(59), "59s");
        assert_eq!(format_interval(60), "1m");
        assert_eq!(format_interval(3_599), "59m");
        assert_eq!(format_interval(3_600), "1h");
        assert_eq!(format_interval(86_399), "23h");
        assert_eq!(format_interval(86_400), "1d");
        assert_eq!(format_interval(10 * 86_400 + 5), "10d");
    }

    #[test]
    fn negative_interval_clamps() {
        assert_eq!(format_interval(-5), "0s");
    }
}
