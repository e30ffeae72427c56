// 📄 Page envelope - {data, meta} for every list endpoint
//
// The server always answers lists with:
//   { "data": [...], "meta": { "total", "per_page", "current_page", "last_page" } }
//
// Older payload shapes are still accepted when reading (see Page::from_value):
// - a bare JSON array
// - { "movements": [...], "pagination": { "currentPage", "pageSize", "totalPages", "total" } }

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default page size used everywhere a limit is omitted
pub const DEFAULT_PER_PAGE: u32 = 10;

// ============================================================================
// PAGE META
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    pub total: u64,
    pub per_page: u32,
    pub current_page: u32,
    pub last_page: u32,
}

impl PageMeta {
    /// Build meta for a page of a result set with `total` rows
    ///
    /// last_page is never below 1, even for an empty result set.
    pub fn new(total: u64, current_page: u32, per_page: u32) -> Self {
        let per_page = per_page.max(1);
        let last_page = total.div_ceil(per_page as u64).max(1) as u32;

        PageMeta {
            total,
            per_page,
            current_page: current_page.max(1),
            last_page,
        }
    }

    pub fn has_next(&self) -> bool {
        self.current_page < self.last_page
    }

    pub fn has_previous(&self) -> bool {
        self.current_page > 1
    }

    /// Row offset of the first item on this page
    pub fn offset(&self) -> u64 {
        (self.current_page.saturating_sub(1) as u64) * self.per_page as u64
    }
}

// ============================================================================
// PAGE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, meta: PageMeta) -> Self {
        Page { data, meta }
    }

    /// Empty page for the requested position
    pub fn empty(current_page: u32, per_page: u32) -> Self {
        Page {
            data: Vec::new(),
            meta: PageMeta::new(0, current_page, per_page),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Transform every item, keeping meta
    pub fn map<U, F>(self, f: F) -> Page<U>
    where
        F: FnMut(T) -> U,
    {
        Page {
            data: self.data.into_iter().map(f).collect(),
            meta: self.meta,
        }
    }
}

/// Meta as it may arrive from the wire (every field optional)
#[derive(Debug, Default, Deserialize)]
struct LooseMeta {
    total: Option<u64>,
    per_page: Option<u32>,
    current_page: Option<u32>,
    last_page: Option<u32>,
}

/// Legacy movement pagination block
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyPagination {
    current_page: Option<u32>,
    page_size: Option<u32>,
    total_pages: Option<u32>,
    total: Option<u64>,
}

impl<T: DeserializeOwned> Page<T> {
    /// Reshape any known list payload into a Page
    ///
    /// `page`/`per_page` are the values that were requested; they fill in
    /// whatever the payload leaves out. Payloads of an unknown shape become
    /// an empty page rather than an error. Item decoding errors are returned.
    pub fn from_value(value: Value, page: u32, per_page: u32) -> Result<Self, serde_json::Error> {
        match value {
            Value::Array(items) => {
                let data: Vec<T> = serde_json::from_value(Value::Array(items))?;
                let meta = PageMeta::new(data.len() as u64, page, per_page);
                Ok(Page { data, meta })
            }
            Value::Object(mut object) => {
                if let Some(items) = object.remove("data").filter(Value::is_array) {
                    let data: Vec<T> = serde_json::from_value(items)?;
                    let loose: LooseMeta = object
                        .remove("meta")
                        .map(serde_json::from_value)
                        .transpose()?
                        .unwrap_or_default();

                    let meta = PageMeta {
                        total: loose.total.unwrap_or(0),
                        per_page: loose.per_page.unwrap_or(per_page),
                        current_page: loose.current_page.unwrap_or(page),
                        last_page: loose.last_page.unwrap_or(1),
                    };
                    return Ok(Page { data, meta });
                }

                if let Some(items) = object.remove("movements").filter(Value::is_array) {
                    let data: Vec<T> = serde_json::from_value(items)?;
                    let legacy: LegacyPagination = object
                        .remove("pagination")
                        .map(serde_json::from_value)
                        .transpose()?
                        .unwrap_or_default();

                    let meta = PageMeta {
                        total: legacy.total.unwrap_or(data.len() as u64),
                        per_page: legacy.page_size.unwrap_or(per_page),
                        current_page: legacy.current_page.unwrap_or(page),
                        last_page: legacy.total_pages.unwrap_or(1),
                    };
                    return Ok(Page { data, meta });
                }

                Ok(Page::empty(page, per_page))
            }
            _ => Ok(Page::empty(page, per_page)),
        }
    }
}

// ============================================================================
// PAGE QUERY
// ============================================================================

/// page / limit / search as sent on the query string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page")]
    pub page: u32,

    #[serde(default = "default_limit")]
    pub limit: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    DEFAULT_PER_PAGE
}

impl PageQuery {
    pub fn new(page: u32, limit: u32, search: Option<&str>) -> Self {
        PageQuery {
            page: page.max(1),
            limit: limit.max(1),
            search: normalize_search(search),
        }
    }

    /// Query-string pairs (search omitted when blank)
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("page".to_string(), self.page.to_string()),
            ("limit".to_string(), self.limit.to_string()),
        ];
        if let Some(search) = &self.search {
            pairs.push(("search".to_string(), search.clone()));
        }
        pairs
    }
}

impl Default for PageQuery {
    fn default() -> Self {
        PageQuery::new(1, DEFAULT_PER_PAGE, None)
    }
}

/// Blank or whitespace-only search terms mean "no search"
pub fn normalize_search(search: Option<&str>) -> Option<String> {
    search
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .map(str::to_string)
}
