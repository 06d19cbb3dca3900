use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Records
// ============================================================================

/// A single prompt/image record from the remote collection.
///
/// The controller only looks at `id`. Everything else is carried through
/// untouched for the render layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedItem {
    pub id: String,
    #[serde(default)]
    pub collection_id: String,
    #[serde(default)]
    pub collection_name: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub publish_url: String,
    #[serde(default)]
    pub category: String,
    /// Creation timestamp as sent by the server (`2024-05-01 10:22:31.123Z`).
    #[serde(default)]
    pub created: Option<String>,
}

impl FeedItem {
    /// Parse `created` into a UTC timestamp.
    ///
    /// PocketBase uses a space-separated variant of RFC 3339; plain RFC 3339
    /// is accepted as well.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.created.as_deref()?.trim();
        if raw.is_empty() {
            return None;
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.fZ")
            .ok()
            .map(|naive| naive.and_utc())
    }

    /// URL best suited for display: the published (resized) image, falling
    /// back to the original upload.
    pub fn image_url(&self) -> &str {
        if self.publish_url.is_empty() {
            &self.url
        } else {
            &self.publish_url
        }
    }
}

/// One page of query results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedPage {
    pub items: Vec<FeedItem>,
    pub page: u32,
    #[serde(default)]
    pub per_page: u32,
    #[serde(default)]
    pub total_items: u64,
    pub total_pages: u32,
}

impl FeedPage {
    /// Whether the server reported pages beyond this one.
    pub fn has_more(&self) -> bool {
        self.page < self.total_pages
    }
}

// ============================================================================
// Queries
// ============================================================================

/// Parameters for a single page request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageQuery {
    /// Category filter; empty matches every record.
    pub category: String,
    /// 1-based page number.
    pub page: u32,
    pub page_size: u32,
    /// Sort expression, e.g. `-created`.
    pub sort: String,
}
