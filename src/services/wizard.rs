use serde::{Deserialize, Serialize};

use crate::models::PriceType;

pub const STEP_COUNT: u8 = 7;

/// Accumulated form state for the seven-step listing wizard. Every
/// presentation of the wizard (and the final server-side submit) validates
/// against the same predicates, so the step rules cannot drift apart.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListingDraft {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub district: Option<String>,
    #[serde(default = "default_price_type")]
    pub price_type: String,
    #[serde(default)]
    pub price: Option<String>,
}

fn default_price_type() -> String {
    "negotiable".to_string()
}

/// Steps are 1-based: title, description, category, images, location,
/// price, summary.
pub fn step_valid(draft: &ListingDraft, step: u8) -> bool {
    match step {
        1 => !draft.title.trim().is_empty(),
        2 => !draft.description.trim().is_empty(),
        3 => draft.category_id.as_deref().is_some_and(|c| !c.is_empty()),
        4 => !draft.images.is_empty(),
        5 => !draft.city.trim().is_empty(),
        6 => {
            if PriceType::parse(&draft.price_type) == PriceType::Free {
                return true;
            }
            draft
                .price
                .as_deref()
                .and_then(parse_price)
                .is_some()
        }
        _ => true,
    }
}

pub fn first_invalid_step(draft: &ListingDraft) -> Option<u8> {
    (1..=STEP_COUNT).find(|&step| !step_valid(draft, step))
}

/// Forward navigation is a no-op unless the current step validates.
pub fn next_step(draft: &ListingDraft, current: u8) -> u8 {
    if current < STEP_COUNT && step_valid(draft, current) {
        current + 1
    } else {
        current
    }
}

/// Accepts locale-ish input: thin/regular spaces as group separators and a
/// comma decimal mark. Only strictly positive amounts count.
pub fn parse_price(raw: &str) -> Option<f64> {
    let normalized: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    match normalized.parse::<f64>() {
        Ok(v) if v > 0.0 && v.is_finite() => Some(v),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_draft() -> ListingDraft {
        ListingDraft {
            title: "Mowing and edging".to_string(),
            description: "Weekly lawn care".to_string(),
            category_id: Some("cat-1".to_string()),
            images: vec!["img-1.jpg".to_string()],
            city: "Springfield".to_string(),
            district: None,
            price_type: "fixed".to_string(),
            price: Some("120".to_string()),
        }
    }

    #[test]
    fn test_all_steps_valid_on_complete_draft() {
        let draft = valid_draft();
        assert_eq!(first_invalid_step(&draft), None);
    }

    #[test]
    fn test_title_step() {
        let mut draft = valid_draft();
        draft.title = "   ".to_string();
        assert!(!step_valid(&draft, 1));
        assert_eq!(first_invalid_step(&draft), Some(1));
    }

    #[test]
    fn test_images_step_blocks_until_one_image() {
        let mut draft = valid_draft();
        draft.images.clear();
        assert!(!step_valid(&draft, 4));
        assert_eq!(next_step(&draft, 4), 4);

        draft.images.push("img.jpg".to_string());
        assert!(step_valid(&draft, 4));
        assert_eq!(next_step(&draft, 4), 5);
    }

    #[test]
    fn test_price_step_free_skips_amount() {
        let mut draft = valid_draft();
        draft.price_type = "free".to_string();
        draft.price = None;
        assert!(step_valid(&draft, 6));
    }

    #[test]
    fn test_price_step_requires_positive_number() {
        let mut draft = valid_draft();
        for bad in ["0", "-5", "abc", ""] {
            draft.price = Some(bad.to_string());
            assert!(!step_valid(&draft, 6), "price {bad:?} should fail");
        }
        draft.price = Some("49,99".to_string());
        assert!(step_valid(&draft, 6));
    }

    #[test]
    fn test_parse_price_locale_forms() {
        assert_eq!(parse_price("1 200,50"), Some(1200.50));
        assert_eq!(parse_price("120"), Some(120.0));
        assert_eq!(parse_price("49.99"), Some(49.99));
        assert_eq!(parse_price("0"), None);
        assert_eq!(parse_price("-5"), None);
        assert_eq!(parse_price("abc"), None);
    }

    #[test]
    fn test_next_step_caps_at_summary() {
        let draft = valid_draft();
        assert_eq!(next_step(&draft, 7), 7);
    }

    #[test]
    fn test_summary_step_always_valid() {
        let draft = ListingDraft::default();
        assert!(step_valid(&draft, 7));
    }
}
