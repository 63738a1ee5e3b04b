use serde_json::Value;

use crate::models::SectionType;

const MAX_LIST_LIMIT: i64 = 50;

/// Per-type config rules. Unknown keys are allowed; the config column is
/// free-form beyond these required fields.
pub fn validate_config(section_type: SectionType, config: &Value) -> Result<(), String> {
    if !config.is_object() {
        return Err("config must be a JSON object".to_string());
    }

    match section_type {
        SectionType::HeroBanner | SectionType::Cta => {
            require_string(config, "title")?;
        }
        SectionType::NewestPosts
        | SectionType::SeekingHelp
        | SectionType::OfferingHelp
        | SectionType::PopularCategories => {
            check_limit(config)?;
        }
        SectionType::CustomHtml => {
            require_string(config, "html")?;
        }
        SectionType::Faq => {
            let items = config
                .get("items")
                .and_then(Value::as_array)
                .ok_or_else(|| "faq config requires an items array".to_string())?;
            if items.is_empty() {
                return Err("faq items must not be empty".to_string());
            }
            for item in items {
                if item.get("question").and_then(Value::as_str).is_none()
                    || item.get("answer").and_then(Value::as_str).is_none()
                {
                    return Err("each faq item needs question and answer".to_string());
                }
            }
        }
        SectionType::Stats => {
            if let Some(items) = config.get("items") {
                if !items.is_array() {
                    return Err("stats items must be an array".to_string());
                }
            }
        }
    }

    Ok(())
}

fn require_string(config: &Value, key: &str) -> Result<(), String> {
    match config.get(key).and_then(Value::as_str) {
        Some(s) if !s.trim().is_empty() => Ok(()),
        _ => Err(format!("config requires a non-empty {key}")),
    }
}

fn check_limit(config: &Value) -> Result<(), String> {
    if let Some(limit) = config.get("limit") {
        match limit.as_i64() {
            Some(n) if (1..=MAX_LIST_LIMIT).contains(&n) => {}
            _ => return Err(format!("limit must be an integer between 1 and {MAX_LIST_LIMIT}")),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hero_requires_title() {
        assert!(validate_config(SectionType::HeroBanner, &json!({})).is_err());
        assert!(validate_config(SectionType::HeroBanner, &json!({"title": "  "})).is_err());
        assert!(validate_config(SectionType::HeroBanner, &json!({"title": "Find help"})).is_ok());
    }

    #[test]
    fn test_list_limit_bounds() {
        assert!(validate_config(SectionType::NewestPosts, &json!({})).is_ok());
        assert!(validate_config(SectionType::NewestPosts, &json!({"limit": 12})).is_ok());
        assert!(validate_config(SectionType::NewestPosts, &json!({"limit": 0})).is_err());
        assert!(validate_config(SectionType::NewestPosts, &json!({"limit": 51})).is_err());
        assert!(validate_config(SectionType::NewestPosts, &json!({"limit": "ten"})).is_err());
    }

    #[test]
    fn test_faq_items() {
        assert!(validate_config(SectionType::Faq, &json!({})).is_err());
        assert!(validate_config(SectionType::Faq, &json!({"items": []})).is_err());
        let good = json!({"items": [{"question": "How?", "answer": "Like this."}]});
        assert!(validate_config(SectionType::Faq, &good).is_ok());
        let bad = json!({"items": [{"question": "How?"}]});
        assert!(validate_config(SectionType::Faq, &bad).is_err());
    }

    #[test]
    fn test_custom_html() {
        assert!(validate_config(SectionType::CustomHtml, &json!({})).is_err());
        assert!(validate_config(SectionType::CustomHtml, &json!({"html": "<b>hi</b>"})).is_ok());
    }

    #[test]
    fn test_config_must_be_object() {
        assert!(validate_config(SectionType::Stats, &json!([1, 2])).is_err());
    }
}
