// 📋 Paginated List Controller
//
// Drives any list screen: it owns the loaded rows, the search term, the
// view mode and a pagination summary, and fetches pages from a PageSource.
//
// Duplicate guard: with prevent_duplicate_calls on, a load whose page and
// search term equal the last *completed* load is skipped. There is no
// cache and no expiry; reload() always fetches.
//
// A failed load leaves rows and pagination exactly as they were and hands
// the error back to the caller.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::entities::{
    normalize_search, Movement, MovementFilter, Page, PageMeta, PageQuery, Person, User,
    DEFAULT_PER_PAGE,
};
use crate::error::{ApiError, ApiResult};
use crate::services::{MovementService, PersonService, UserService};

// ============================================================================
// PAGE SOURCE
// ============================================================================

#[async_trait]
pub trait PageSource<T>: Send + Sync {
    async fn fetch(&self, page: u32, per_page: u32, search: Option<&str>) -> ApiResult<Page<T>>;
}

#[async_trait]
impl PageSource<Person> for PersonService {
    async fn fetch(&self, page: u32, per_page: u32, search: Option<&str>) -> ApiResult<Page<Person>> {
        self.list(&PageQuery::new(page, per_page, search)).await
    }
}

#[async_trait]
impl PageSource<User> for UserService {
    async fn fetch(&self, page: u32, per_page: u32, search: Option<&str>) -> ApiResult<Page<User>> {
        self.list(&PageQuery::new(page, per_page, search)).await
    }
}

/// Movements under a fixed filter (period, status, type); the controller
/// supplies page, limit and search
#[derive(Clone)]
pub struct MovementSource {
    service: MovementService,
    filter: MovementFilter,
}

impl MovementSource {
    pub fn new(service: MovementService, filter: MovementFilter) -> Self {
        MovementSource { service, filter }
    }
}

#[async_trait]
impl PageSource<Movement> for MovementSource {
    async fn fetch(
        &self,
        page: u32,
        per_page: u32,
        search: Option<&str>,
    ) -> ApiResult<Page<Movement>> {
        let filter = self.filter.clone().page(page, per_page).search(search);
        self.service.list(&filter).await
    }
}

// ============================================================================
// CONTROLLER STATE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    #[default]
    Table,
    Grid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub current_page: u32,
    pub items_per_page: u32,
    pub total_items: u64,
    pub total_pages: u32,
}

impl Pagination {
    fn initial(items_per_page: u32) -> Self {
        Pagination {
            current_page: 1,
            items_per_page,
            total_items: 0,
            total_pages: 1,
        }
    }
}

impl From<PageMeta> for Pagination {
    fn from(meta: PageMeta) -> Self {
        Pagination {
            current_page: meta.current_page,
            items_per_page: meta.per_page,
            total_items: meta.total,
            total_pages: meta.last_page,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListOptions {
    pub initial_view_mode: ViewMode,
    pub items_per_page: u32,
    pub prevent_duplicate_calls: bool,
}

impl Default for ListOptions {
    fn default() -> Self {
        ListOptions {
            initial_view_mode: ViewMode::Table,
            items_per_page: DEFAULT_PER_PAGE,
            prevent_duplicate_calls: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Loaded,
    /// Same page and search as the last completed load
    Skipped,
    Failed(ApiError),
}

impl LoadOutcome {
    pub fn error(&self) -> Option<&ApiError> {
        match self {
            LoadOutcome::Failed(error) => Some(error),
            _ => None,
        }
    }
}

// ============================================================================
// LOADING FLAG
// ============================================================================

/// Shared view of whether a fetch is in flight
///
/// The controller is driven through `&mut self`, so whoever awaits a load
/// cannot look at it meanwhile; a spinner or another task holds one of
/// these instead.
#[derive(Debug, Clone, Default)]
pub struct LoadingFlag(Arc<AtomicBool>);

impl LoadingFlag {
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn raise(&self) -> LoadingGuard {
        self.0.store(true, Ordering::SeqCst);
        LoadingGuard(self.clone())
    }
}

/// Lowers the flag when the fetch finishes or is dropped
struct LoadingGuard(LoadingFlag);

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        (self.0).0.store(false, Ordering::SeqCst);
    }
}

// ============================================================================
// CONTROLLER
// ============================================================================

pub struct ListController<T, S> {
    source: S,
    options: ListOptions,
    data: Vec<T>,
    loading: LoadingFlag,
    view_mode: ViewMode,
    search_term: Option<String>,
    pagination: Pagination,
    /// (page, search) of the last completed load
    last_fetch: Option<(u32, Option<String>)>,
}

impl<T, S> ListController<T, S>
where
    T: Send,
    S: PageSource<T>,
{
    pub fn new(source: S, options: ListOptions) -> Self {
        let items_per_page = options.items_per_page.max(1);
        ListController {
            source,
            options: ListOptions {
                items_per_page,
                ..options
            },
            data: Vec::new(),
            loading: LoadingFlag::default(),
            view_mode: options.initial_view_mode,
            search_term: None,
            pagination: Pagination::initial(items_per_page),
            last_fetch: None,
        }
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// True while a fetch is in flight
    pub fn is_loading(&self) -> bool {
        self.loading.is_set()
    }

    /// Handle for watching `is_loading` from outside the load call
    pub fn loading_flag(&self) -> LoadingFlag {
        self.loading.clone()
    }

    pub fn view_mode(&self) -> ViewMode {
        self.view_mode
    }

    pub fn search_term(&self) -> Option<&str> {
        self.search_term.as_deref()
    }

    pub fn pagination(&self) -> Pagination {
        self.pagination
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Fetch `page` with `search`, honoring the duplicate guard
    pub async fn load(&mut self, page: u32, search: Option<&str>) -> LoadOutcome {
        let page = page.max(1);
        let search = normalize_search(search);

        if self.options.prevent_duplicate_calls {
            if let Some((last_page, last_search)) = &self.last_fetch {
                if *last_page == page && *last_search == search {
                    return LoadOutcome::Skipped;
                }
            }
        }

        self.fetch(page, search).await
    }

    async fn fetch(&mut self, page: u32, search: Option<String>) -> LoadOutcome {
        let guard = self.loading.raise();
        let result = self
            .source
            .fetch(page, self.options.items_per_page, search.as_deref())
            .await;
        drop(guard);

        match result {
            Ok(loaded) => {
                // The server may clamp an out-of-range page; key the guard
                // on the page it actually returned
                let served_page = loaded.meta.current_page;
                self.data = loaded.data;
                self.pagination = loaded.meta.into();
                self.search_term = search.clone();
                self.last_fetch = Some((served_page, search));
                LoadOutcome::Loaded
            }
            Err(error) => LoadOutcome::Failed(error),
        }
    }

    /// Go to `page` keeping the current search
    pub async fn handle_page_change(&mut self, page: u32) -> LoadOutcome {
        let search = self.search_term.clone();
        self.load(page, search.as_deref()).await
    }

    /// New search term: back to page 1 and fetch
    pub async fn handle_search_change(&mut self, term: &str) -> LoadOutcome {
        self.search_term = normalize_search(Some(term));
        let search = self.search_term.clone();
        self.load(1, search.as_deref()).await
    }

    /// Presentation only; nothing is fetched
    pub fn handle_view_mode_change(&mut self, mode: ViewMode) {
        self.view_mode = mode;
    }

    /// Fetch the current page and search again, bypassing the guard
    pub async fn reload(&mut self) -> LoadOutcome {
        let page = self.pagination.current_page;
        let search = self.search_term.clone();
        self.fetch(page, search).await
    }
}
