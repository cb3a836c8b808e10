//! Extraction of `*` bullet paragraphs.
//!
//! ```text
//! * TORNADO WARNING FOR...
//!   NORTHEASTERN LANE COUNTY IN WEST CENTRAL KANSAS...
//!
//! * UNTIL 830 PM CDT
//! ```

use crate::parser::lines_with_offsets;

fn bullet_start(line: &str) -> Option<&str> {
    let rest = line.trim_start().strip_prefix('*')?;
    match rest.chars().next() {
        None => Some(rest),
        Some(c) if c.is_whitespace() => Some(rest),
        Some(_) => None,
    }
}

fn normalize(parts: &[&str]) -> String {
    parts
        .iter()
        .flat_map(|part| part.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Extract the bullet paragraphs of a segment, in order.
///
/// A bullet starts at a line beginning with `*` and runs until the next
/// bullet or a blank line. Line breaks and runs of spaces inside a bullet
/// collapse to single spaces.
pub fn extract_bullets(text: &str) -> Vec<String> {
    let mut bullets = Vec::new();
    let mut current: Option<Vec<&str>> = None;

    let mut flush = |parts: Option<Vec<&str>>| {
        if let Some(parts) = parts {
            let bullet = normalize(&parts);
            if !bullet.is_empty() {
                bullets.push(bullet);
            }
        }
    };

    for (_, line) in lines_with_offsets(text) {
        if let Some(rest) = bullet_start(line) {
            flush(current.replace(vec![rest]));
        } else if line.trim().is_empty() {
            flush(current.take());
        } else if let Some(parts) = current.as_mut() {
            parts.push(line);
        }
    }
    flush(current);

    bullets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::samples::{TORNADO_WARNING, crlf};

    #[test]
    fn test_tornado_bullets() {
        let bullets = extract_bullets(&crlf(TORNADO_WARNING));
        assert_eq!(bullets.len(), 3);
        assert_eq!(
            bullets[0],
            "TORNADO WARNING FOR... NORTHEASTERN LANE COUNTY IN WEST CENTRAL KANSAS... \
             NORTHWESTERN NESS COUNTY IN WEST CENTRAL KANSAS..."
        );
        assert_eq!(bullets[1], "UNTIL 830 PM CDT");
        assert!(bullets[2].starts_with("AT 755 PM CDT"));
        assert!(bullets[2].ends_with("MOVING EAST AT 20 MPH."));
    }

    #[test]
    fn test_adjacent_bullets() {
        let bullets = extract_bullets("* ONE\n  MORE\n*   TWO\nTEXT AFTER\n");
        assert_eq!(bullets, vec!["ONE MORE", "TWO TEXT AFTER"]);
    }

    #[test]
    fn test_no_bullets() {
        assert!(extract_bullets("PLAIN TEXT\n\nMORE TEXT\n").is_empty());
        assert!(extract_bullets("**BOLD** IS NOT A BULLET\n").is_empty());
        assert!(extract_bullets("*\n\n").is_empty());
    }
}
