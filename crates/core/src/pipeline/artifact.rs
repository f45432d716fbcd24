//! Artifact assembly: prompt construction, front matter, placeholder
//! fallback, and post-generation enrichment.
//!
//! Everything here is a pure function over domain types so it can be tested
//! without any collaborator.

use chrono::NaiveDate;
use draftpress_domain::Product;

/// Substituted for a product image when the lookup fails. Never blocks the
/// run; a broken image is strictly better than a lost article.
pub const FALLBACK_IMAGE_URL: &str = "https://placehold.co/800x600?text=image+unavailable";

/// Marker the generator is instructed to emit for each product image.
const IMAGE_PLACEHOLDER: &str = "image_url";

/// Slug used when a topic contains no ASCII-alphanumeric characters at all,
/// so the artifact never publishes under an empty name.
const EMPTY_TOPIC_SLUG: &str = "untitled";

/// Lowercase the topic and collapse every non-alphanumeric run into a
/// single hyphen. A topic with no sluggable characters maps to a stable
/// placeholder slug.
pub fn slugify(topic: &str) -> String {
    let mut slug = String::with_capacity(topic.len());
    let mut last_was_hyphen = true;
    for ch in topic.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_was_hyphen = false;
        } else if !last_was_hyphen {
            slug.push('-');
            last_was_hyphen = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        return EMPTY_TOPIC_SLUG.to_string();
    }
    slug
}

/// Filename the published artifact is stored under.
pub fn artifact_filename(topic: &str) -> String {
    format!("{}.md", slugify(topic))
}

/// Affiliate-link marker the generator is instructed to emit for a product.
pub fn affiliate_placeholder(product_name: &str) -> String {
    format!("[AMAZON_LINK_{}]", product_name.to_uppercase().replace(' ', "_"))
}

/// Build the generation prompt for a topic and its supporting products.
pub fn build_prompt(topic: &str, products: &[Product]) -> String {
    let product_lines: Vec<String> = products
        .iter()
        .map(|p| format!("- {}: ${}, rating {}/5", p.name, p.price, p.rating))
        .collect();

    format!(
        "You are an experienced reviewer writing a comprehensive, honest \
comparison article for readers researching a purchase.

Write a 2000-word article comparing these products for {topic}.

Products to compare:
{products}

Structure:
1. Introduction
2. Why this choice matters
3. Detailed comparison table (markdown)
4. In-depth review of each product with pros and cons
5. Frequently asked questions (FAQ)
6. Conclusion with recommendation

Tone: warm and trustworthy. For each product, include an affiliate link \
placeholder: [AMAZON_LINK_PRODUCT_NAME] where PRODUCT_NAME is the product \
name uppercased with spaces replaced by underscores.

Use Markdown formatting. Include an image placeholder like \
`![product name](image_url)` for each product.
",
        topic = topic,
        products = product_lines.join("\n"),
    )
}

/// YAML front matter prepended to every published artifact.
pub fn front_matter(topic: &str, date: NaiveDate) -> String {
    let title = title_case(topic);
    let slug = slugify(topic);
    let tags: Vec<String> =
        topic.split_whitespace().map(|word| format!("\"{}\"", word.to_lowercase())).collect();

    format!(
        "---\ntitle: \"{title}\"\ndate: {date}\nslug: \"{slug}\"\ntags: [{tags}]\n---\n",
        date = date.format("%Y-%m-%d"),
        tags = tags.join(", "),
    )
}

/// Degraded fallback body used when generation exhausts its retries. The
/// run still publishes this so the slot is not lost; the article is marked
/// degraded and can be regenerated later.
pub fn placeholder_article(topic: &str, products: &[Product]) -> String {
    let mut table = String::from("| Product | Price | Rating |\n|---------|-------|--------|\n");
    for p in products {
        table.push_str(&format!("| {} | ${} | {}/5 |\n", p.name, p.price, p.rating));
    }

    let listing: Vec<String> =
        products.iter().map(|p| format!("- [{}]({})", p.name, p.url)).collect();

    format!(
        "# {title}

*Note: this is a placeholder article; full content is pending regeneration.*

## Introduction

We understand you are looking for the best {topic}. This page is under \
construction and will be replaced with a full review.

## Top Products

{listing}

## Comparison Table

{table}
## Conclusion

Check back soon for the full review.
",
        title = title_case(topic),
        listing = listing.join("\n"),
    )
}

/// Substitute image and affiliate-link placeholders with real values.
///
/// `image_urls` is positionally aligned with `products`; a shorter slice
/// leaves the remaining placeholders untouched (validation flags them).
pub fn apply_enrichment(body: &str, products: &[Product], image_urls: &[String]) -> String {
    let mut enriched = body.to_string();
    for (product, image_url) in products.iter().zip(image_urls) {
        let image_marker = format!("![{}]({IMAGE_PLACEHOLDER})", product.name);
        let image_link = format!("![{}]({image_url})", product.name);
        enriched = enriched.replace(&image_marker, &image_link);

        if !product.url.is_empty() {
            enriched = enriched.replace(&affiliate_placeholder(&product.name), &product.url);
        }
    }
    enriched
}

/// Assemble the final publishable content.
pub fn assemble(topic: &str, body: &str, date: NaiveDate) -> String {
    format!("{}{body}", front_matter(topic, date))
}

fn title_case(topic: &str) -> String {
    topic
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(name: &str) -> Product {
        Product {
            name: name.to_string(),
            price: "49.99".to_string(),
            rating: 4.7,
            asin: "B0000000001".to_string(),
            url: format!("https://www.amazon.com/dp/B0000000001?tag=draftpress-{name}"),
        }
    }

    #[test]
    fn slugify_collapses_punctuation_and_case() {
        assert_eq!(slugify("Best Standing Desks 2026"), "best-standing-desks-2026");
        assert_eq!(slugify("  usb__hubs!! "), "usb-hubs");
        assert_eq!(slugify("plain"), "plain");
    }

    #[test]
    fn slugify_never_produces_an_empty_slug() {
        assert_eq!(slugify(""), "untitled");
        assert_eq!(slugify("???"), "untitled");
        assert_eq!(slugify("机械键盘"), "untitled");
        assert_eq!(artifact_filename("???"), "untitled.md");
    }

    #[test]
    fn filename_is_slug_with_extension() {
        assert_eq!(artifact_filename("Best Standing Desks"), "best-standing-desks.md");
    }

    #[test]
    fn prompt_lists_every_product() {
        let products = vec![product("Desk One"), product("Desk Two")];
        let prompt = build_prompt("standing desks", &products);
        assert!(prompt.contains("standing desks"));
        assert!(prompt.contains("- Desk One: $49.99, rating 4.7/5"));
        assert!(prompt.contains("- Desk Two: $49.99, rating 4.7/5"));
        assert!(prompt.contains("[AMAZON_LINK_PRODUCT_NAME]"));
    }

    #[test]
    fn front_matter_is_well_formed_yaml_block() {
        let date = NaiveDate::from_ymd_opt(2026, 8, 23).unwrap();
        let fm = front_matter("standing desks", date);
        assert!(fm.starts_with("---\n"));
        assert!(fm.contains("title: \"Standing Desks\""));
        assert!(fm.contains("date: 2026-08-23"));
        assert!(fm.contains("slug: \"standing-desks\""));
        assert!(fm.contains("tags: [\"standing\", \"desks\"]"));
        assert!(fm.ends_with("---\n"));
    }

    #[test]
    fn placeholder_includes_product_table_and_links() {
        let products = vec![product("Desk One")];
        let body = placeholder_article("standing desks", &products);
        assert!(body.contains("# Standing Desks"));
        assert!(body.contains("| Desk One | $49.99 | 4.7/5 |"));
        assert!(body.contains("- [Desk One]("));
        assert!(body.contains("placeholder article"));
    }

    #[test]
    fn enrichment_substitutes_image_and_affiliate_placeholders() {
        let products = vec![product("Desk One")];
        let body = "See ![Desk One](image_url) and buy at [AMAZON_LINK_DESK_ONE].";
        let urls = vec!["https://img.example/desk-one.jpg".to_string()];

        let enriched = apply_enrichment(body, &products, &urls);

        assert!(enriched.contains("![Desk One](https://img.example/desk-one.jpg)"));
        assert!(enriched.contains(&products[0].url));
        assert!(!enriched.contains("image_url"));
        assert!(!enriched.contains("[AMAZON_LINK_"));
    }

    #[test]
    fn enrichment_leaves_unmatched_placeholders_alone() {
        let products = vec![product("Desk One"), product("Desk Two")];
        let body = "![Desk One](image_url) ![Desk Two](image_url)";
        // Only one URL available; the second placeholder must survive.
        let urls = vec!["https://img.example/one.jpg".to_string()];

        let enriched = apply_enrichment(body, &products, &urls);

        assert!(enriched.contains("![Desk One](https://img.example/one.jpg)"));
        assert!(enriched.contains("![Desk Two](image_url)"));
    }

    #[test]
    fn assemble_prepends_front_matter() {
        let date = NaiveDate::from_ymd_opt(2026, 8, 23).unwrap();
        let content = assemble("standing desks", "# Body\n", date);
        assert!(content.starts_with("---\n"));
        assert!(content.ends_with("# Body\n"));
    }
}
