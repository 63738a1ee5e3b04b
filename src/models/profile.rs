use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub full_name: String,
    pub role: String,
    pub rating: f64,
    pub total_reviews: i64,
}

impl Profile {
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}
