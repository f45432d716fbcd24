//! Structural validation of assembled artifacts.
//!
//! Validation is observational: violations are reported so the driver can
//! log them, but they never block publication. A structurally imperfect
//! article that ships is preferred over a publishing slot lost to a
//! formatting rule.

/// Minimum body size below which an article is almost certainly truncated.
const MIN_ARTICLE_CHARS: usize = 300;

/// Check `content` (front matter plus body) against the structural rules.
/// Returns one human-readable violation per broken rule; empty means clean.
pub fn validate_article(content: &str) -> Vec<String> {
    let mut violations = Vec::new();

    if content.chars().count() < MIN_ARTICLE_CHARS {
        violations.push(format!(
            "article is {} characters, below the {MIN_ARTICLE_CHARS} minimum",
            content.chars().count()
        ));
    }

    if !has_front_matter(content) {
        violations.push("missing YAML front matter block".to_string());
    }

    if !content.lines().any(|line| line.starts_with("# ") || line.starts_with("## ")) {
        violations.push("no markdown heading found".to_string());
    }

    let fence_count = content.matches("```").count();
    if fence_count % 2 != 0 {
        violations.push(format!("unbalanced code fences ({fence_count} markers)"));
    }

    if content.contains("(image_url)") {
        violations.push("unresolved image placeholder remains".to_string());
    }
    if content.contains("[AMAZON_LINK_") {
        violations.push("unresolved affiliate link placeholder remains".to_string());
    }

    violations
}

fn has_front_matter(content: &str) -> bool {
    let Some(rest) = content.strip_prefix("---\n") else {
        return false;
    };
    rest.contains("\n---\n") || rest.ends_with("\n---")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn well_formed() -> String {
        let body = "lorem ipsum dolor sit amet ".repeat(20);
        format!("---\ntitle: \"T\"\ndate: 2026-08-23\n---\n# Heading\n\n{body}")
    }

    #[test]
    fn clean_article_has_no_violations() {
        assert!(validate_article(&well_formed()).is_empty());
    }

    #[test]
    fn short_article_is_flagged() {
        let violations = validate_article("---\nt: 1\n---\n# H\nshort");
        assert!(violations.iter().any(|v| v.contains("below the")));
    }

    #[test]
    fn missing_front_matter_is_flagged() {
        let body = "# Heading\n".to_string() + &"x".repeat(400);
        let violations = validate_article(&body);
        assert!(violations.iter().any(|v| v.contains("front matter")));
    }

    #[test]
    fn missing_heading_is_flagged() {
        let content = format!("---\nt: 1\n---\n{}", "prose only ".repeat(40));
        let violations = validate_article(&content);
        assert!(violations.iter().any(|v| v.contains("heading")));
    }

    #[test]
    fn unbalanced_fences_are_flagged() {
        let content = well_formed() + "\n```rust\nlet x = 1;\n";
        let violations = validate_article(&content);
        assert!(violations.iter().any(|v| v.contains("unbalanced code fences")));

        let balanced = well_formed() + "\n```rust\nlet x = 1;\n```\n";
        assert!(validate_article(&balanced).is_empty());
    }

    #[test]
    fn leftover_placeholders_are_flagged() {
        let content = well_formed() + "\n![p](image_url) [AMAZON_LINK_P]";
        let violations = validate_article(&content);
        assert!(violations.iter().any(|v| v.contains("image placeholder")));
        assert!(violations.iter().any(|v| v.contains("affiliate link placeholder")));
    }
}
