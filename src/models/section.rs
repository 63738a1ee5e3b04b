use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// An ordered, typed block of homepage content. `config` is free-form JSON
/// validated against per-type rules before any write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HomepageSection {
    pub id: String,
    pub section_type: SectionType,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub config: serde_json::Value,
    pub is_active: bool,
    pub visible_on_mobile: bool,
    pub visible_on_desktop: bool,
    pub sort_order: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SectionType {
    HeroBanner,
    NewestPosts,
    SeekingHelp,
    OfferingHelp,
    PopularCategories,
    Stats,
    Faq,
    Cta,
    CustomHtml,
}

impl SectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionType::HeroBanner => "hero_banner",
            SectionType::NewestPosts => "newest_posts",
            SectionType::SeekingHelp => "seeking_help",
            SectionType::OfferingHelp => "offering_help",
            SectionType::PopularCategories => "popular_categories",
            SectionType::Stats => "stats",
            SectionType::Faq => "faq",
            SectionType::Cta => "cta",
            SectionType::CustomHtml => "custom_html",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "hero_banner" => Some(SectionType::HeroBanner),
            "newest_posts" => Some(SectionType::NewestPosts),
            "seeking_help" => Some(SectionType::SeekingHelp),
            "offering_help" => Some(SectionType::OfferingHelp),
            "popular_categories" => Some(SectionType::PopularCategories),
            "stats" => Some(SectionType::Stats),
            "faq" => Some(SectionType::Faq),
            "cta" => Some(SectionType::Cta),
            "custom_html" => Some(SectionType::CustomHtml),
            _ => None,
        }
    }
}
