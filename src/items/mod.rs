// ============================================================================
// Item Listings - ReWear Exchange
// ============================================================================
//
// Garments listed by users. Each item carries a fixed point value derived
// from its condition and category at creation time:
//
//   base 50
//   + condition bonus  Like New 20 | Excellent 15 | Very Good 10 | Good 5 | Fair 0
//   + category bonus   10 for outerwear, formal and shoes
//
// Status is owned by the availability gate (gate.rs) and the settlement
// executor. Nothing else writes it.
//
// ============================================================================

pub mod catalog;
pub mod gate;

pub use catalog::{BrowseQuery, ItemCatalog, ItemSort, ItemStatusCounts};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{ExchangeError, ExchangeResult};
use crate::models::{ItemId, Timestamp, UserId};

// ============================================================================
// CONSTANTS
// ============================================================================

pub const BASE_POINT_VALUE: u64 = 50;
pub const PREMIUM_CATEGORY_BONUS: u64 = 10;

pub const MIN_TITLE_LEN: usize = 3;
pub const MAX_TITLE_LEN: usize = 100;
pub const MIN_DESCRIPTION_LEN: usize = 10;
pub const MAX_DESCRIPTION_LEN: usize = 1000;
pub const MAX_PREFERENCES_LEN: usize = 500;

// ============================================================================
// ENUMS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Tops,
    Bottoms,
    Dresses,
    Outerwear,
    Shoes,
    Accessories,
    Activewear,
    Formal,
    Casual,
    Vintage,
}

impl Category {
    /// Categories that earn the premium bonus
    pub fn is_premium(&self) -> bool {
        matches!(self, Category::Outerwear | Category::Formal | Category::Shoes)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Size {
    XS,
    S,
    M,
    L,
    XL,
    XXL,
    #[serde(rename = "One Size")]
    OneSize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Condition {
    #[serde(rename = "Like New")]
    LikeNew,
    Excellent,
    #[serde(rename = "Very Good")]
    VeryGood,
    Good,
    Fair,
}

impl Condition {
    pub fn bonus(&self) -> u64 {
        match self {
            Condition::LikeNew => 20,
            Condition::Excellent => 15,
            Condition::VeryGood => 10,
            Condition::Good => 5,
            Condition::Fair => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Women,
    Men,
    #[default]
    Unisex,
}

/// Listing lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    /// Open for swaps, legacy requests and redemption
    Available,
    /// Accepted from older snapshots; nothing in the exchange sets it.
    /// Such items are not offered for swaps or redemption.
    Pending,
    /// Exchanged; final
    Swapped,
    /// Taken down by an admin or its owner
    Removed,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Available => "available",
            ItemStatus::Pending => "pending",
            ItemStatus::Swapped => "swapped",
            ItemStatus::Removed => "removed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemStatus::Swapped | ItemStatus::Removed)
    }
}

/// Fixed valuation of an item from its condition and category
pub fn point_value(condition: Condition, category: Category) -> u64 {
    let premium = if category.is_premium() { PREMIUM_CATEGORY_BONUS } else { 0 };
    BASE_POINT_VALUE + condition.bonus() + premium
}

// ============================================================================
// ITEM
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: ItemId,
    pub owner: UserId,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub size: Size,
    pub condition: Condition,
    pub gender: Gender,
    pub brand: Option<String>,
    pub color: Option<String>,
    pub material: Option<String>,
    pub tags: Vec<String>,
    pub images: Vec<String>,
    pub swap_preferences: Option<String>,
    pub point_value: u64,
    pub status: ItemStatus,
    pub views: u64,
    pub likes: BTreeSet<UserId>,
    pub removal_reason: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Item {
    pub fn is_owned_by(&self, user: UserId) -> bool {
        self.owner == user
    }

    pub fn like_count(&self) -> usize {
        self.likes.len()
    }

    fn matches_text(&self, pattern: &regex::Regex) -> bool {
        pattern.is_match(&self.title)
            || pattern.is_match(&self.description)
            || self.tags.iter().any(|t| pattern.is_match(t))
    }
}

/// Fields supplied when listing a new item
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewItem {
    pub title: String,
    pub description: String,
    pub category: Category,
    pub size: Size,
    pub condition: Condition,
    #[serde(default)]
    pub gender: Gender,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub material: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub swap_preferences: Option<String>,
}

impl NewItem {
    pub fn validate(&self) -> ExchangeResult<()> {
        check_title(&self.title)?;
        check_description(&self.description)?;
        if self.images.iter().all(|i| i.trim().is_empty()) {
            return Err(ExchangeError::validation("at least one image is required"));
        }
        check_preferences(self.swap_preferences.as_deref())
    }

    pub(crate) fn into_item(self, owner: UserId) -> Item {
        let now = Utc::now();
        Item {
            id: ItemId::new(),
            owner,
            title: self.title.trim().to_string(),
            description: self.description.trim().to_string(),
            point_value: point_value(self.condition, self.category),
            category: self.category,
            size: self.size,
            condition: self.condition,
            gender: self.gender,
            brand: self.brand,
            color: self.color,
            material: self.material,
            tags: normalize_tags(self.tags),
            images: self.images.into_iter().filter(|i| !i.trim().is_empty()).collect(),
            swap_preferences: self.swap_preferences,
            status: ItemStatus::Available,
            views: 0,
            likes: BTreeSet::new(),
            removal_reason: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Editable descriptive fields. Status and owner are not editable here.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<Category>,
    pub size: Option<Size>,
    pub condition: Option<Condition>,
    pub gender: Option<Gender>,
    pub brand: Option<String>,
    pub color: Option<String>,
    pub material: Option<String>,
    pub tags: Option<Vec<String>>,
    pub images: Option<Vec<String>>,
    pub swap_preferences: Option<String>,
}

impl ItemUpdate {
    pub fn validate(&self) -> ExchangeResult<()> {
        if let Some(title) = &self.title {
            check_title(title)?;
        }
        if let Some(description) = &self.description {
            check_description(description)?;
        }
        if let Some(images) = &self.images {
            if images.iter().all(|i| i.trim().is_empty()) {
                return Err(ExchangeError::validation("at least one image is required"));
            }
        }
        check_preferences(self.swap_preferences.as_deref())
    }

    /// Apply to `item`, recomputing the point value when condition or category change
    pub(crate) fn apply(self, item: &mut Item) {
        let revalue = self.condition.is_some() || self.category.is_some();

        if let Some(title) = self.title {
            item.title = title.trim().to_string();
        }
        if let Some(description) = self.description {
            item.description = description.trim().to_string();
        }
        if let Some(category) = self.category {
            item.category = category;
        }
        if let Some(size) = self.size {
            item.size = size;
        }
        if let Some(condition) = self.condition {
            item.condition = condition;
        }
        if let Some(gender) = self.gender {
            item.gender = gender;
        }
        if self.brand.is_some() {
            item.brand = self.brand;
        }
        if self.color.is_some() {
            item.color = self.color;
        }
        if self.material.is_some() {
            item.material = self.material;
        }
        if let Some(tags) = self.tags {
            item.tags = normalize_tags(tags);
        }
        if let Some(images) = self.images {
            item.images = images.into_iter().filter(|i| !i.trim().is_empty()).collect();
        }
        if self.swap_preferences.is_some() {
            item.swap_preferences = self.swap_preferences;
        }

        if revalue {
            item.point_value = point_value(item.condition, item.category);
        }
        item.updated_at = Utc::now();
    }
}

fn check_title(title: &str) -> ExchangeResult<()> {
    let len = title.trim().chars().count();
    if !(MIN_TITLE_LEN..=MAX_TITLE_LEN).contains(&len) {
        return Err(ExchangeError::validation(format!(
            "title must be between {} and {} characters",
            MIN_TITLE_LEN, MAX_TITLE_LEN
        )));
    }
    Ok(())
}

fn check_description(description: &str) -> ExchangeResult<()> {
    let len = description.trim().chars().count();
    if !(MIN_DESCRIPTION_LEN..=MAX_DESCRIPTION_LEN).contains(&len) {
        return Err(ExchangeError::validation(format!(
            "description must be between {} and {} characters",
            MIN_DESCRIPTION_LEN, MAX_DESCRIPTION_LEN
        )));
    }
    Ok(())
}

fn check_preferences(preferences: Option<&str>) -> ExchangeResult<()> {
    match preferences {
        Some(p) if p.chars().count() > MAX_PREFERENCES_LEN => Err(ExchangeError::validation(format!(
            "swap preferences cannot exceed {} characters",
            MAX_PREFERENCES_LEN
        ))),
        _ => Ok(()),
    }
}

fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    tags.into_iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample(condition: Condition, category: Category) -> NewItem {
        NewItem {
            title: "Denim jacket".into(),
            description: "Barely worn".into(),
            category,
            size: Size::M,
            condition,
            gender: Gender::Unisex,
            brand: None,
            color: Some("blue".into()),
            material: None,
            tags: vec!["Denim ".into(), "".into()],
            images: vec!["/uploads/jacket.jpg".into()],
            swap_preferences: None,
        }
    }

    #[test]
    fn test_point_value_table() {
        assert_eq!(point_value(Condition::Fair, Category::Tops), 50);
        assert_eq!(point_value(Condition::LikeNew, Category::Outerwear), 80);
        assert_eq!(point_value(Condition::VeryGood, Category::Tops), 60);
        assert_eq!(point_value(Condition::Excellent, Category::Shoes), 75);
        assert_eq!(point_value(Condition::Good, Category::Formal), 65);
    }

    #[test]
    fn test_new_item_validation() {
        let mut item = sample(Condition::Good, Category::Tops);
        assert!(item.validate().is_ok());

        item.title = "x".repeat(MAX_TITLE_LEN + 1);
        assert!(matches!(item.validate(), Err(ExchangeError::Validation(_))));
        item.title = "ab".into();
        assert!(item.validate().is_err());

        let mut item = sample(Condition::Good, Category::Tops);
        item.images.clear();
        assert!(item.validate().is_err());
    }

    #[test]
    fn test_update_recomputes_point_value() {
        let mut item = sample(Condition::Fair, Category::Tops).into_item(UserId::new());
        assert_eq!(item.point_value, 50);
        assert_eq!(item.tags, vec!["denim".to_string()]);

        ItemUpdate { title: Some("Wool coat".into()), ..Default::default() }.apply(&mut item);
        assert_eq!(item.point_value, 50);

        ItemUpdate {
            condition: Some(Condition::LikeNew),
            category: Some(Category::Outerwear),
            ..Default::default()
        }
        .apply(&mut item);
        assert_eq!(item.point_value, 80);
        assert_eq!(item.status, ItemStatus::Available);
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(serde_json::to_string(&Condition::LikeNew).unwrap(), "\"Like New\"");
        assert_eq!(serde_json::to_string(&Size::OneSize).unwrap(), "\"One Size\"");
        let parsed: Category = serde_json::from_str("\"outerwear\"").unwrap();
        assert_eq!(parsed, Category::Outerwear);
    }
}
