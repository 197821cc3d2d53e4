// Item catalog: listing storage, browse and search

use chrono::Utc;
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::{Category, Condition, Gender, Item, ItemStatus, ItemUpdate, Size};
use crate::error::{ExchangeError, ExchangeResult};
use crate::models::{paginate, ItemId, PageQuery, Paginated, SortOrder, UserId, DEFAULT_PAGE_SIZE};

/// Browse page size used by the listing grid
pub const BROWSE_PAGE_SIZE: usize = 12;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ItemSort {
    #[default]
    CreatedAt,
    PointValue,
    Views,
}

/// Filters accepted by `GET /api/items`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowseQuery {
    pub status: Option<ItemStatus>,
    pub category: Option<Category>,
    pub size: Option<Size>,
    pub condition: Option<Condition>,
    pub gender: Option<Gender>,
    pub search: Option<String>,
    #[serde(default)]
    pub sort_by: ItemSort,
    #[serde(default)]
    pub sort_order: SortOrder,
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ItemStatusCounts {
    pub available: usize,
    pub pending: usize,
    pub swapped: usize,
    pub removed: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemCatalog {
    items: HashMap<ItemId, Item>,
}

impl ItemCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub(crate) fn insert(&mut self, item: Item) -> ItemId {
        let id = item.id;
        self.items.insert(id, item);
        id
    }

    pub fn get(&self, id: ItemId) -> ExchangeResult<&Item> {
        self.items.get(&id).ok_or_else(|| ExchangeError::not_found("item", id))
    }

    pub(crate) fn get_mut(&mut self, id: ItemId) -> ExchangeResult<&mut Item> {
        self.items.get_mut(&id).ok_or_else(|| ExchangeError::not_found("item", id))
    }

    /// Put a previously captured item back as-is
    pub(crate) fn restore(&mut self, item: Item) {
        self.items.insert(item.id, item);
    }

    pub(crate) fn update(&mut self, id: ItemId, update: ItemUpdate) -> ExchangeResult<&Item> {
        update.validate()?;
        let item = self.get_mut(id)?;
        update.apply(item);
        Ok(&*item)
    }

    pub(crate) fn delete(&mut self, id: ItemId) -> ExchangeResult<Item> {
        self.items.remove(&id).ok_or_else(|| ExchangeError::not_found("item", id))
    }

    /// Flip `user`'s like on an item; returns whether the item is now liked
    pub fn toggle_like(&mut self, id: ItemId, user: UserId) -> ExchangeResult<bool> {
        let item = self.get_mut(id)?;
        let liked = if item.likes.remove(&user) {
            false
        } else {
            item.likes.insert(user);
            true
        };
        item.updated_at = Utc::now();
        Ok(liked)
    }

    pub fn record_view(&mut self, id: ItemId) -> ExchangeResult<&Item> {
        let item = self.get_mut(id)?;
        item.views += 1;
        Ok(&*item)
    }

    pub fn browse(&self, query: &BrowseQuery) -> ExchangeResult<Paginated<Item>> {
        let status = query.status.unwrap_or(ItemStatus::Available);
        let pattern = match query.search.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => Some(
                RegexBuilder::new(&regex::escape(text))
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| ExchangeError::validation(format!("invalid search: {}", e)))?,
            ),
            _ => None,
        };

        let mut found: Vec<Item> = self
            .items
            .values()
            .filter(|i| i.status == status)
            .filter(|i| query.category.map_or(true, |c| i.category == c))
            .filter(|i| query.size.map_or(true, |s| i.size == s))
            .filter(|i| query.condition.map_or(true, |c| i.condition == c))
            .filter(|i| query.gender.map_or(true, |g| i.gender == g))
            .filter(|i| pattern.as_ref().map_or(true, |p| i.matches_text(p)))
            .cloned()
            .collect();

        found.sort_by(|a, b| {
            let ord = match query.sort_by {
                ItemSort::CreatedAt => a.created_at.cmp(&b.created_at),
                ItemSort::PointValue => a.point_value.cmp(&b.point_value),
                ItemSort::Views => a.views.cmp(&b.views),
            }
            .then_with(|| a.id.cmp(&b.id));
            match query.sort_order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });

        let page = PageQuery { page: query.page, limit: query.limit }.resolve(BROWSE_PAGE_SIZE);
        Ok(paginate(found, page))
    }

    /// A user's own listings, newest first
    pub fn owned_by(&self, user: UserId, status: Option<ItemStatus>, page: PageQuery) -> Paginated<Item> {
        let mut mine: Vec<Item> = self
            .items
            .values()
            .filter(|i| i.owner == user)
            .filter(|i| status.map_or(true, |s| i.status == s))
            .cloned()
            .collect();
        mine.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        paginate(mine, page.resolve(DEFAULT_PAGE_SIZE))
    }

    pub fn count_by_status(&self) -> ItemStatusCounts {
        self.items.values().fold(ItemStatusCounts::default(), |mut acc, item| {
            match item.status {
                ItemStatus::Available => acc.available += 1,
                ItemStatus::Pending => acc.pending += 1,
                ItemStatus::Swapped => acc.swapped += 1,
                ItemStatus::Removed => acc.removed += 1,
            }
            acc
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::tests::sample;

    fn catalog_with(items: Vec<(UserId, crate::items::NewItem)>) -> (ItemCatalog, Vec<ItemId>) {
        let mut catalog = ItemCatalog::new();
        let ids = items
            .into_iter()
            .map(|(owner, new)| catalog.insert(new.into_item(owner)))
            .collect();
        (catalog, ids)
    }

    #[test]
    fn test_browse_filters_and_sorts() {
        let owner = UserId::new();
        let mut coat = sample(Condition::LikeNew, Category::Outerwear);
        coat.title = "Wool Coat".into();
        let (mut catalog, ids) = catalog_with(vec![
            (owner, sample(Condition::Fair, Category::Tops)),
            (owner, coat),
            (owner, sample(Condition::Good, Category::Shoes)),
        ]);

        let query = BrowseQuery { sort_by: ItemSort::PointValue, ..Default::default() };
        let result = catalog.browse(&query).unwrap();
        let values: Vec<u64> = result.items.iter().map(|i| i.point_value).collect();
        assert_eq!(values, vec![80, 65, 50]);

        let query = BrowseQuery { category: Some(Category::Shoes), ..Default::default() };
        assert_eq!(catalog.browse(&query).unwrap().pagination.total, 1);

        catalog.get_mut(ids[0]).unwrap().status = ItemStatus::Swapped;
        assert_eq!(catalog.browse(&BrowseQuery::default()).unwrap().pagination.total, 2);
    }

    #[test]
    fn test_search_is_case_insensitive_and_literal() {
        let mut odd = sample(Condition::Good, Category::Tops);
        odd.title = "Tee (size?) *rare*".into();
        let (catalog, _) = catalog_with(vec![
            (UserId::new(), odd),
            (UserId::new(), sample(Condition::Good, Category::Tops)),
        ]);

        let query = BrowseQuery { search: Some("(SIZE?)".into()), ..Default::default() };
        assert_eq!(catalog.browse(&query).unwrap().items.len(), 1);

        let query = BrowseQuery { search: Some("denim".into()), ..Default::default() };
        assert_eq!(catalog.browse(&query).unwrap().items.len(), 2);
    }

    #[test]
    fn test_toggle_like() {
        let (mut catalog, ids) = catalog_with(vec![(UserId::new(), sample(Condition::Good, Category::Tops))]);
        let fan = UserId::new();

        assert!(catalog.toggle_like(ids[0], fan).unwrap());
        assert_eq!(catalog.get(ids[0]).unwrap().like_count(), 1);
        assert!(!catalog.toggle_like(ids[0], fan).unwrap());
        assert_eq!(catalog.get(ids[0]).unwrap().like_count(), 0);
    }

    #[test]
    fn test_missing_item_is_not_found() {
        let catalog = ItemCatalog::new();
        assert!(matches!(
            catalog.get(ItemId::new()),
            Err(ExchangeError::NotFound { entity: "item", .. })
        ));
    }
}
