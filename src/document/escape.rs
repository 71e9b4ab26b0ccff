/// Escapes character data between tags.
pub fn escape_text(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Escapes a value placed inside a double- or single-quoted attribute.
pub fn escape_attr(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '\n' => out.push_str("&#10;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Compact number formatting: two decimals, trailing zeros dropped.
pub fn num(value: f32) -> String {
    let value = if value.is_finite() { value } else { 0.0 };
    let mut s = format!("{value:.2}");
    if s.contains('.') {
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
    }
    if s == "-0" { "0".to_string() } else { s }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_keeps_quotes() {
        assert_eq!(escape_text(r#"a<b & "c""#), r#"a&lt;b &amp; "c""#);
    }

    #[test]
    fn attributes_escape_quotes() {
        assert_eq!(escape_attr(r#"x" onload='y'"#), "x&quot; onload=&#39;y&#39;");
    }

    #[test]
    fn numbers_are_compact() {
        assert_eq!(num(1.4), "1.4");
        assert_eq!(num(3.0), "3");
        assert_eq!(num(-0.001), "0");
        assert_eq!(num(12.345), "12.35");
    }
}
