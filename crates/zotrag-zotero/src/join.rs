//! Pairing PDF attachments with their bibliographic records.

use std::collections::HashMap;

use tracing::{debug, info};
use zotrag_core::{ItemData, LibraryError, LibraryItem, LibrarySource, WorkItem, UNTITLED};

/// One [`WorkItem`] per PDF attachment whose parent record is in `items`.
///
/// Attachments without a known parent are skipped. Output follows the order
/// of the attachments in the listing.
#[must_use]
pub fn join_pdf_attachments(items: &[LibraryItem]) -> Vec<WorkItem> {
    let parents: HashMap<&str, &ItemData> = items
        .iter()
        .filter(|item| !item.data.is_attachment())
        .map(|item| (item.key.as_str(), &item.data))
        .collect();

    let mut work = Vec::new();
    for item in items.iter().filter(|item| item.data.is_pdf_attachment()) {
        let Some(parent_key) = item.data.parent_item.as_deref() else {
            debug!("Skipping standalone attachment {}", item.key);
            continue;
        };
        let Some(parent) = parents.get(parent_key) else {
            debug!("Skipping attachment {} with unknown parent {}", item.key, parent_key);
            continue;
        };

        let title = parent
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(UNTITLED)
            .to_string();

        work.push(WorkItem {
            parent_key: parent_key.to_string(),
            attachment_key: item.key.clone(),
            title,
            creators: parent.creators.clone(),
            date: parent.date.clone().filter(|d| !d.is_empty()),
            item_type: parent.item_type.clone(),
        });
    }
    work
}

/// List the library and join its PDF attachments.
pub async fn list_work_items(source: &dyn LibrarySource) -> Result<Vec<WorkItem>, LibraryError> {
    let items = source.list_items().await?;
    let work = join_pdf_attachments(&items);
    info!("Found {} items with PDF attachments", work.len());
    Ok(work)
}
