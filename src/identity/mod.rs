//! Identity providers listing the accounts that should have approval records.
//!
//! Providers hand out accounts one page at a time. [`IdentityLister::list_all`]
//! drains the pages so callers always see the complete listing.

mod export;
mod memory;

pub use export::AuthExportLister;
pub use memory::MemoryIdentityLister;

use crate::approval::SourceEntity;
use crate::utils::CancelSignal;
use async_trait::async_trait;
use std::collections::HashSet;
use thiserror::Error;
use tracing::debug;

/// Page size used by providers unless configured otherwise
pub const DEFAULT_PAGE_SIZE: usize = 1000;

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Identity provider unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid page token: {0}")]
    InvalidPageToken(String),

    #[error("Identity provider returned page token {0} twice")]
    PageLoop(String),

    #[error("Listing cancelled")]
    Cancelled,
}

/// One page of a listing
#[derive(Debug, Clone, Default)]
pub struct IdentityPage {
    pub entities: Vec<SourceEntity>,
    /// Token for the next page, `None` on the last page
    pub next_page_token: Option<String>,
}

#[async_trait]
pub trait IdentityLister: Send + Sync {
    /// Fetch the page starting at `page_token` (`None` for the first page).
    async fn list_page(&self, page_token: Option<String>) -> Result<IdentityPage, IdentityError>;

    /// Fetch every account, following page tokens to the end.
    /// Cancellation is checked before each page.
    async fn list_all(&self, cancel: &CancelSignal) -> Result<Vec<SourceEntity>, IdentityError> {
        let mut entities = Vec::new();
        let mut seen_tokens = HashSet::new();
        let mut page_token: Option<String> = None;

        loop {
            if cancel.is_cancelled() {
                return Err(IdentityError::Cancelled);
            }

            let page = self.list_page(page_token.clone()).await?;
            debug!(
                count = page.entities.len(),
                has_next = page.next_page_token.is_some(),
                "Fetched identity page"
            );
            entities.extend(page.entities);

            match page.next_page_token {
                Some(token) => {
                    if !seen_tokens.insert(token.clone()) {
                        return Err(IdentityError::PageLoop(token));
                    }
                    page_token = Some(token);
                }
                None => break,
            }
        }

        Ok(entities)
    }
}

/// Serve a page out of an in-memory listing. Page tokens are offsets.
pub(crate) fn page_from_slice(
    entities: &[SourceEntity],
    page_token: Option<&str>,
    page_size: usize,
) -> Result<IdentityPage, IdentityError> {
    let start = match page_token {
        None => 0,
        Some(token) => token
            .parse::<usize>()
            .ok()
            .filter(|offset| *offset <= entities.len())
            .ok_or_else(|| IdentityError::InvalidPageToken(token.to_string()))?,
    };

    let end = (start + page_size.max(1)).min(entities.len());
    let next_page_token = (end < entities.len()).then(|| end.to_string());

    Ok(IdentityPage {
        entities: entities[start..end].to_vec(),
        next_page_token,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn entities(n: usize) -> Vec<SourceEntity> {
        (0..n)
            .map(|i| SourceEntity::new(format!("u{}", i), format!("u{}@x.com", i), i as i64))
            .collect()
    }

    #[test]
    fn test_page_from_slice() {
        let all = entities(5);

        let first = page_from_slice(&all, None, 2).unwrap();
        assert_eq!(first.entities.len(), 2);
        assert_eq!(first.next_page_token.as_deref(), Some("2"));

        let last = page_from_slice(&all, Some("4"), 2).unwrap();
        assert_eq!(last.entities[0].id, "u4");
        assert!(last.next_page_token.is_none());
    }

    #[test]
    fn test_page_from_slice_rejects_bad_tokens() {
        let all = entities(3);
        assert!(matches!(
            page_from_slice(&all, Some("abc"), 2),
            Err(IdentityError::InvalidPageToken(_))
        ));
        assert!(page_from_slice(&all, Some("9"), 2).is_err());
    }

    #[test]
    fn test_page_from_empty_slice() {
        let page = page_from_slice(&[], None, 10).unwrap();
        assert!(page.entities.is_empty());
        assert!(page.next_page_token.is_none());
    }

    /// Provider that keeps returning the same token
    struct LoopingLister {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl IdentityLister for LoopingLister {
        async fn list_page(&self, _token: Option<String>) -> Result<IdentityPage, IdentityError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(IdentityPage {
                entities: entities(1),
                next_page_token: Some("same".to_string()),
            })
        }
    }

    #[tokio::test]
    async fn test_list_all_detects_page_loop() {
        let lister = LoopingLister {
            calls: AtomicUsize::new(0),
        };
        let result = lister.list_all(&CancelSignal::never()).await;

        assert!(matches!(result, Err(IdentityError::PageLoop(token)) if token == "same"));
        assert_eq!(lister.calls.load(Ordering::SeqCst), 2);
    }
}
