use std::{future::Future, sync::Arc};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::api::{Error, Keyed, Page, PageRequest, PageToken};

pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Messages the backend sends as errors when a listing simply has no entries
pub const EMPTY_COLLECTION_MARKERS: [&str; 2] =
    ["Không tìm thấy bài đăng trọ", "no results for this owner"];

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LoaderConfig {
    // at least 1, only set through `with_page_size`
    page_size: usize,

    /// An error whose message contains one of these is read as "no results"
    pub empty_collection_markers: Vec<String>,
}

impl Default for LoaderConfig {
    fn default() -> LoaderConfig {
        LoaderConfig {
            page_size: DEFAULT_PAGE_SIZE,
            empty_collection_markers: EMPTY_COLLECTION_MARKERS
                .iter()
                .map(|m| String::from(*m))
                .collect(),
        }
    }
}

impl LoaderConfig {
    pub fn with_page_size(mut self, page_size: usize) -> LoaderConfig {
        self.page_size = page_size.max(1);
        self
    }

    /// Number of items requested per page
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn with_empty_collection_marker(mut self, marker: impl Into<String>) -> LoaderConfig {
        self.empty_collection_markers.push(marker.into());
        self
    }

    fn is_empty_collection(&self, err: &Error) -> bool {
        let msg = err.message();
        self.empty_collection_markers
            .iter()
            .any(|m| msg.contains(m.as_str()))
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LoadStatus {
    Idle,
    Loading,
    Refreshing,
    Error,
}

impl LoadStatus {
    pub fn is_busy(&self) -> bool {
        matches!(self, LoadStatus::Loading | LoadStatus::Refreshing)
    }
}

/// Snapshot of a paginated collection.
///
/// `items` never holds two entries with the same key, and `seen_keys` holds
/// exactly the keys of `items`.
#[derive(Clone, Debug)]
pub struct PageState<T: Keyed> {
    pub items: im::Vector<T>,
    pub seen_keys: im::HashSet<T::Key>,
    pub next_page_token: PageToken,
    pub has_more: bool,
    pub status: LoadStatus,
    pub last_error: Option<Error>,

    // bumped on every reset, responses to older requests get dropped
    generation: u64,
}

impl<T: Keyed> Default for PageState<T> {
    fn default() -> PageState<T> {
        PageState {
            items: im::Vector::new(),
            seen_keys: im::HashSet::new(),
            next_page_token: 0,
            has_more: true,
            status: LoadStatus::Idle,
            last_error: None,
            generation: 0,
        }
    }
}

impl<T: Keyed> PageState<T> {
    pub fn new() -> PageState<T> {
        PageState::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn reset(&mut self) {
        *self = PageState {
            generation: self.generation + 1,
            ..PageState::new()
        };
    }

    /// Returns the number of items that were not already known
    fn append_page(&mut self, page: Page<T>, req: &PageRequest) -> usize {
        let received = page.items.len();
        let mut added = 0;
        for item in page.items {
            if self.seen_keys.insert(item.key()).is_none() {
                self.items.push_back(item);
                added += 1;
            }
        }
        self.next_page_token += 1;
        self.has_more = match page.is_last_page {
            _ if received == 0 && req.token > 0 => false,
            Some(last) => !last,
            None => received >= req.size,
        };
        added
    }
}

/// The backend side of a paginated collection
#[async_trait]
pub trait PageFetcher<T> {
    async fn fetch_page(&self, req: PageRequest) -> Result<Page<T>, Error>;
}

#[async_trait]
impl<T, F, Fut> PageFetcher<T> for F
where
    T: 'static,
    F: Fn(PageRequest) -> Fut + Send + Sync,
    Fut: 'static + Send + Future<Output = Result<Page<T>, Error>>,
{
    async fn fetch_page(&self, req: PageRequest) -> Result<Page<T>, Error> {
        (self)(req).await
    }
}

type Listener<T> = Arc<dyn Fn(&PageState<T>) + Send + Sync>;

#[derive(Clone, Copy, Debug)]
enum Trigger {
    NextPage,
    Refresh,
}

/// Loads a paginated collection page by page for an infinite-scroll list,
/// dropping entries the backend sends more than once.
///
/// At most one fetch is in flight at any time: load and refresh requests made
/// while one is running return the current state without fetching anything.
/// Failures are never retried automatically.
pub struct PagedLoader<T: Keyed, F> {
    config: LoaderConfig,
    fetcher: F,
    state: Mutex<PageState<T>>,
    listeners: Mutex<Vec<Listener<T>>>,
}

impl<T, F> PagedLoader<T, F>
where
    T: Keyed,
    F: PageFetcher<T>,
{
    pub fn new(mut config: LoaderConfig, fetcher: F) -> PagedLoader<T, F> {
        config.page_size = config.page_size.max(1);
        PagedLoader {
            config,
            fetcher,
            state: Mutex::new(PageState::new()),
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn snapshot(&self) -> PageState<T> {
        self.state.lock().clone()
    }

    /// Call `listener` with every new state. It runs with no lock held, so it
    /// may call back into the loader.
    pub fn subscribe(&self, listener: impl Fn(&PageState<T>) + Send + Sync + 'static) {
        self.listeners.lock().push(Arc::new(listener));
    }

    pub async fn load_next_page(&self) -> PageState<T> {
        let (req, generation, snapshot) = {
            let mut state = self.state.lock();
            if state.status.is_busy() || !state.has_more {
                tracing::debug!(
                    status = ?state.status,
                    has_more = state.has_more,
                    "ignoring request for next page"
                );
                return state.clone();
            }
            state.status = LoadStatus::Loading;
            let req = PageRequest {
                token: state.next_page_token,
                size: self.config.page_size,
            };
            (req, state.generation, state.clone())
        };
        self.publish(&snapshot);
        let res = self.fetcher.fetch_page(req).await;
        self.complete(req, generation, res, Trigger::NextPage)
    }

    /// Drop everything loaded so far and load the first page again.
    ///
    /// The list stays empty if that fails, with the failure in `last_error`.
    pub async fn refresh(&self) -> PageState<T> {
        let (req, generation, snapshot) = {
            let mut state = self.state.lock();
            if state.status.is_busy() {
                tracing::debug!(status = ?state.status, "ignoring refresh request");
                return state.clone();
            }
            state.reset();
            state.status = LoadStatus::Refreshing;
            let req = PageRequest {
                token: 0,
                size: self.config.page_size,
            };
            (req, state.generation, state.clone())
        };
        self.publish(&snapshot);
        let res = self.fetcher.fetch_page(req).await;
        self.complete(req, generation, res, Trigger::Refresh)
    }

    /// Forget everything, eg. when the filters of the list changed. A fetch
    /// that is still running will have its result ignored.
    pub fn reset(&self) -> PageState<T> {
        let snapshot = {
            let mut state = self.state.lock();
            state.reset();
            state.clone()
        };
        self.publish(&snapshot);
        snapshot
    }

    fn complete(
        &self,
        req: PageRequest,
        generation: u64,
        res: Result<Page<T>, Error>,
        trigger: Trigger,
    ) -> PageState<T> {
        let snapshot = {
            let mut state = self.state.lock();
            if state.generation != generation || state.next_page_token != req.token {
                tracing::debug!(
                    token = req.token,
                    "dropping response to a request made before the last reset"
                );
                return state.clone();
            }
            match res {
                Ok(page) => {
                    let added = state.append_page(page, &req);
                    tracing::trace!(
                        token = req.token,
                        added,
                        total = state.items.len(),
                        has_more = state.has_more,
                        "loaded page"
                    );
                    state.status = LoadStatus::Idle;
                    state.last_error = None;
                }
                Err(err) if self.config.is_empty_collection(&err) => {
                    tracing::debug!(token = req.token, %err, "backend reported no more results");
                    state.has_more = false;
                    state.status = LoadStatus::Idle;
                    state.last_error = None;
                }
                Err(err) => {
                    tracing::warn!(token = req.token, ?trigger, %err, "failed fetching page");
                    if !err.is_transient() {
                        state.has_more = false;
                    }
                    state.status = match trigger {
                        Trigger::NextPage => LoadStatus::Error,
                        Trigger::Refresh => LoadStatus::Idle,
                    };
                    state.last_error = Some(err);
                }
            }
            state.clone()
        };
        self.publish(&snapshot);
        snapshot
    }

    fn publish(&self, snapshot: &PageState<T>) {
        let listeners = self.listeners.lock().clone();
        for listener in listeners {
            listener(snapshot);
        }
    }
}
