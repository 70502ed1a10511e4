use super::{page_from_slice, IdentityError, IdentityLister, IdentityPage, DEFAULT_PAGE_SIZE};
use crate::approval::SourceEntity;
use async_trait::async_trait;
use chrono::DateTime;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::warn;

/// Identity provider backed by an account export file:
///
/// ```json
/// {"users": [{"localId": "u1", "email": "a@x.com", "createdAt": "1000"}]}
/// ```
///
/// `createdAt` may be epoch milliseconds (number or string) or an RFC 3339
/// timestamp. The file is re-read at the start of every listing.
pub struct AuthExportLister {
    path: PathBuf,
    page_size: usize,
    cached: Mutex<Option<Arc<Vec<SourceEntity>>>>,
}

#[derive(Debug, Deserialize)]
struct AuthExport {
    #[serde(default)]
    users: Vec<ExportedUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExportedUser {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    created_at: Option<ExportTimestamp>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ExportTimestamp {
    Millis(i64),
    Text(String),
}

impl ExportTimestamp {
    fn to_millis(&self) -> Option<i64> {
        match self {
            ExportTimestamp::Millis(ms) => Some(*ms),
            ExportTimestamp::Text(text) => text.trim().parse::<i64>().ok().or_else(|| {
                DateTime::parse_from_rfc3339(text.trim())
                    .ok()
                    .map(|dt| dt.timestamp_millis())
            }),
        }
    }
}

impl AuthExportLister {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            page_size: DEFAULT_PAGE_SIZE,
            cached: Mutex::new(None),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    async fn load(&self) -> Result<Arc<Vec<SourceEntity>>, IdentityError> {
        let content = fs::read_to_string(&self.path).await?;
        let export: AuthExport = serde_json::from_str(&content)?;

        let entities = export
            .users
            .into_iter()
            .map(|user| {
                let created_at_ms = user.created_at.as_ref().and_then(|ts| {
                    let parsed = ts.to_millis();
                    if parsed.is_none() {
                        warn!(uid = %user.local_id, "Unparseable createdAt in identity export");
                    }
                    parsed
                });
                SourceEntity {
                    id: user.local_id,
                    email: user.email,
                    created_at_ms,
                }
            })
            .collect();

        Ok(Arc::new(entities))
    }
}

#[async_trait]
impl IdentityLister for AuthExportLister {
    async fn list_page(&self, page_token: Option<String>) -> Result<IdentityPage, IdentityError> {
        let mut cached = self.cached.lock().await;

        // Later pages reuse the listing loaded for the first page
        let reuse = if page_token.is_some() { cached.clone() } else { None };

        let entities = match reuse {
            Some(entities) => entities,
            None => {
                let loaded = self.load().await?;
                *cached = Some(Arc::clone(&loaded));
                loaded
            }
        };

        page_from_slice(&entities, page_token.as_deref(), self.page_size)
    }
}
