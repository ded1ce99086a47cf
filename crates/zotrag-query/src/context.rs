//! Formatting search results as model context.

use zotrag_core::{RecordMetadata, SearchResult};

/// Source line of one passage, e.g.
/// `Title by A, B (2020) [journalArticle] p. 3, 4`.
///
/// Missing fields are left out.
#[must_use]
pub fn format_source(metadata: &RecordMetadata) -> String {
    let mut parts = Vec::new();
    if let Some(title) = metadata.title.as_deref().filter(|t| !t.is_empty()) {
        parts.push(title.to_string());
    }
    if let Some(creators) = metadata.creators.as_deref().filter(|c| !c.is_empty()) {
        parts.push(format!("by {creators}"));
    }
    if let Some(date) = metadata.date.as_deref().filter(|d| !d.is_empty()) {
        parts.push(format!("({date})"));
    }
    if let Some(item_type) = metadata.item_type.as_deref().filter(|t| !t.is_empty()) {
        parts.push(format!("[{item_type}]"));
    }
    if let Some(pages) = metadata.page_numbers.as_ref().filter(|p| !p.is_empty()) {
        let pages: Vec<String> = pages.iter().map(u32::to_string).collect();
        parts.push(format!("p. {}", pages.join(", ")));
    }
    parts.join(" ")
}

/// One result as a context block: text, source line and key.
#[must_use]
pub fn format_result(result: &SearchResult) -> String {
    let mut block = format!("{}\nSource: {}", result.text, format_source(&result.metadata));
    if let Some(key) = result.metadata.zotero_key.as_deref().filter(|k| !k.is_empty()) {
        block.push_str("\nZotero Key: ");
        block.push_str(key);
    }
    block
}

/// All results as one context string, separated by blank lines.
#[must_use]
pub fn format_context(results: &[SearchResult]) -> String {
    results
        .iter()
        .map(format_result)
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn full_metadata() -> RecordMetadata {
        RecordMetadata {
            creators: Some("Jane Smith, Bob Jones".to_string()),
            date: Some("2020".to_string()),
            item_type: Some("journalArticle".to_string()),
            page_numbers: Some(vec![3, 4]),
            title: Some("Deep Learning".to_string()),
            zotero_key: Some("ABCD1234".to_string()),
        }
    }

    #[test]
    fn test_full_source_line() {
        assert_eq!(
            format_source(&full_metadata()),
            "Deep Learning by Jane Smith, Bob Jones (2020) [journalArticle] p. 3, 4"
        );
    }

    #[test]
    fn test_missing_fields_are_skipped() {
        let metadata = RecordMetadata {
            title: Some("Untitled".to_string()),
            date: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(format_source(&metadata), "Untitled");
    }

    #[test]
    fn test_context_blocks() {
        let first = SearchResult {
            id: Uuid::new_v4(),
            text: "Networks learn features.".to_string(),
            metadata: full_metadata(),
            score: 0.9,
        };
        let second = SearchResult {
            id: Uuid::new_v4(),
            text: "No metadata here.".to_string(),
            metadata: RecordMetadata::default(),
            score: 0.5,
        };

        let context = format_context(&[first, second]);

        assert_eq!(
            context,
            "Networks learn features.\n\
             Source: Deep Learning by Jane Smith, Bob Jones (2020) [journalArticle] p. 3, 4\n\
             Zotero Key: ABCD1234\n\
             \n\
             No metadata here.\n\
             Source: "
        );
    }

    #[test]
    fn test_empty_context() {
        assert_eq!(format_context(&[]), "");
    }
}
