mod comment;
pub use comment::{CommentNode, CommentTree};

mod loader;
pub use loader::{
    LoadStatus, LoaderConfig, PageFetcher, PageState, PagedLoader, DEFAULT_PAGE_SIZE,
    EMPTY_COLLECTION_MARKERS,
};

mod thread;
pub use thread::{CommentPoster, CommentThread};

pub mod api {
    pub use nhatro_api::*;
}
