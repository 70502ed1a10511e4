use super::{page_from_slice, IdentityError, IdentityLister, IdentityPage, DEFAULT_PAGE_SIZE};
use crate::approval::SourceEntity;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// In-memory identity provider for local development and tests
#[derive(Clone)]
pub struct MemoryIdentityLister {
    entities: Arc<Vec<SourceEntity>>,
    page_size: usize,
    page_calls: Arc<AtomicUsize>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryIdentityLister {
    pub fn new(entities: Vec<SourceEntity>) -> Self {
        Self {
            entities: Arc::new(entities),
            page_size: DEFAULT_PAGE_SIZE,
            page_calls: Arc::new(AtomicUsize::new(0)),
            unavailable: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Number of pages served so far
    pub fn page_calls(&self) -> usize {
        self.page_calls.load(Ordering::SeqCst)
    }

    /// Make every page request fail as if the provider were down
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl IdentityLister for MemoryIdentityLister {
    async fn list_page(&self, page_token: Option<String>) -> Result<IdentityPage, IdentityError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(IdentityError::Unavailable(
                "memory identity provider marked unavailable".to_string(),
            ));
        }
        self.page_calls.fetch_add(1, Ordering::SeqCst);
        page_from_slice(&self.entities, page_token.as_deref(), self.page_size)
    }
}
