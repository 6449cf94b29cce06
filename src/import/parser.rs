//! CSV line tokenizer.
//!
//! Quotes toggle a quoted section and are dropped; commas inside a quoted
//! section are kept. Inside a quoted section `""` stands for one literal quote,
//! which is how embedded variants JSON survives the split.

/// Splits one line into trimmed fields. Never fails.
pub fn parse_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                chars.next();
                current.push('"');
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current).trim().to_string()),
            _ => current.push(c),
        }
    }
    fields.push(current.trim().to_string());
    fields
}

/// Yields `(line_number, line)` pairs with 1-based numbers. Handles `\n` and
/// `\r\n` endings and drops a leading byte-order mark.
pub fn split_lines(contents: &str) -> impl Iterator<Item = (usize, &str)> {
    contents.trim_start_matches('\u{feff}').lines().enumerate().map(|(i, l)| (i + 1, l))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quoted_comma() {
        assert_eq!(parse_line(r#"a,"b,c",d"#), vec!["a", "b,c", "d"]);
    }

    #[test]
    fn test_trims_fields_and_keeps_empties() {
        assert_eq!(parse_line("  Whey , 1999,, PROTEIN  "), vec!["Whey", "1999", "", "PROTEIN"]);
        assert_eq!(parse_line(""), vec![""]);
        assert_eq!(parse_line("a,"), vec!["a", ""]);
    }

    #[test]
    fn test_embedded_json_variants() {
        let row = parse_line(r#"Whey,1999,"[{""flavor"":""x"",""price"":1}]""#);
        assert_eq!(row, vec!["Whey", "1999", r#"[{"flavor":"x","price":1}]"#]);
        let row = parse_line(r#"Whey,1999,"[{flavor:choc,weight:1kg}]""#);
        assert_eq!(row, vec!["Whey", "1999", "[{flavor:choc,weight:1kg}]"]);
    }

    #[test]
    fn test_empty_quoted_field() {
        assert_eq!(parse_line(r#"a,"",b"#), vec!["a", "", "b"]);
    }

    #[test]
    fn test_unbalanced_quote_swallows_rest() {
        assert_eq!(parse_line(r#"a,"b,c"#), vec!["a", "b,c"]);
    }

    #[test]
    fn test_split_lines() {
        let lines: Vec<_> = split_lines("\u{feff}name,price\r\nWhey,10\n\nCasein,12").collect();
        assert_eq!(lines, vec![(1, "name,price"), (2, "Whey,10"), (3, ""), (4, "Casein,12")]);
    }
}
