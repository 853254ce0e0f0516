use serde::de::DeserializeOwned;
use serde_json::Value;

/// Zero-based index of a page in a paginated collection
pub type PageToken = u64;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct PageRequest {
    pub token: PageToken,
    pub size: usize,
}

/// One page of a paginated collection, as returned by the backend.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,

    /// `None` when the endpoint does not say whether this is the final page
    pub is_last_page: Option<bool>,
}

// Endpoints disagree on naming, these are all the spellings seen so far
const ITEM_FIELDS: [&str; 4] = ["items", "content", "data", "results"];
const LAST_PAGE_FIELDS: [&str; 3] = ["isLastPage", "last", "is_last_page"];

impl<T> Page<T> {
    pub fn new(items: Vec<T>, is_last_page: Option<bool>) -> Page<T> {
        Page {
            items,
            is_last_page,
        }
    }

    /// The page handed out in place of a payload that could not be understood
    pub fn malformed() -> Page<T> {
        Page {
            items: Vec::new(),
            is_last_page: Some(true),
        }
    }
}

impl<T: DeserializeOwned> Page<T> {
    /// Normalize a backend payload into a page.
    ///
    /// Accepts a bare array, or an object carrying the items under one of
    /// `items`, `content`, `data` or `results` (possibly nested once more
    /// under an object) and an optional final-page flag under `isLastPage`,
    /// `last` or `is_last_page`. Anything else yields [`Page::malformed`].
    pub fn from_json(value: Value) -> Page<T> {
        let (items, is_last_page) = match value {
            Value::Array(items) => (items, None),
            Value::Object(mut fields) => {
                let is_last_page = LAST_PAGE_FIELDS
                    .iter()
                    .find_map(|f| fields.get(*f).and_then(|v| v.as_bool()));
                match ITEM_FIELDS.iter().find_map(|f| fields.remove(*f)) {
                    Some(Value::Array(items)) => (items, is_last_page),
                    Some(inner @ Value::Object(_)) => {
                        let mut page = Page::from_json(inner);
                        page.is_last_page = page.is_last_page.or(is_last_page);
                        return page;
                    }
                    other => {
                        tracing::warn!(?other, "page payload has no item array");
                        return Page::malformed();
                    }
                }
            }
            other => {
                tracing::warn!(?other, "page payload is neither an array nor an object");
                return Page::malformed();
            }
        };
        let mut parsed = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            match serde_json::from_value(item) {
                Ok(item) => parsed.push(item),
                Err(err) => {
                    tracing::warn!(index, %err, "page item has an unexpected shape");
                    return Page::malformed();
                }
            }
        }
        Page {
            items: parsed,
            is_last_page,
        }
    }
}
