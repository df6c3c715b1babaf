use percent_encoding::percent_decode_str;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

pub fn decode_url(input: &str) -> String {
    percent_decode_str(input).decode_utf8_lossy().to_string()
}

/// Last path segment of a URL without query or fragment, decoded.
/// Falls back to the whole input when there is no usable segment.
pub fn display_name(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let segment = path
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty() && !s.contains(':'))
        .unwrap_or(path);
    decode_url(segment)
}

/// `MM:SS`, or `H:MM:SS` past the hour.
pub fn format_clock(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    let (h, m, s) = (total / 3600, (total / 60) % 60, total % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m:02}:{s:02}")
    }
}

/// Cuts `text` to at most `max` terminal columns, marking the cut with `…`.
pub fn truncate_to_width(text: &str, max: usize) -> String {
    if text.width() <= max {
        return text.to_string();
    }
    if max == 0 {
        return String::new();
    }
    let mut out = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let w = UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + w > max - 1 {
            break;
        }
        out.push(ch);
        used += w;
    }
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_takes_the_decoded_file_name() {
        assert_eq!(
            display_name("https://cdn.example.com/media/Big%20Buck%20Bunny.mp4?alt=media&token=x"),
            "Big Buck Bunny.mp4"
        );
        assert_eq!(display_name("clips/intro.mp4"), "intro.mp4");
        assert_eq!(display_name("https://example.com/"), "example.com");
    }

    #[test]
    fn truncation_counts_columns_not_chars() {
        assert_eq!(truncate_to_width("Sintel", 10), "Sintel");
        assert_eq!(truncate_to_width("Tears of Steel", 8), "Tears o…");
        assert_eq!(truncate_to_width("이어서 보기", 5), "이어…");
        assert_eq!(truncate_to_width("abc", 0), "");
    }

    #[test]
    fn clock_formatting() {
        assert_eq!(format_clock(0.0), "00:00");
        assert_eq!(format_clock(42.9), "00:42");
        assert_eq!(format_clock(63.0), "01:03");
        assert_eq!(format_clock(3723.0), "1:02:03");
        assert_eq!(format_clock(-5.0), "00:00");
        assert_eq!(format_clock(f64::NAN), "00:00");
    }
}
