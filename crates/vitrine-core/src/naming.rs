//! Deterministic gallery titles.
//!
//! With document context the title reads
//! `<title prefix>-<document id>-Converted-<timestamp>`; without it,
//! `Converted-<timestamp>`. The title prefix and the dash-separated id share
//! a budget of [`defaults::TITLE_NAME_BUDGET`] characters.

use crate::defaults;
use crate::models::NamingContext;

/// Placeholder used when a document has an id but no title.
const UNTITLED: &str = "Untitled";

/// Build the gallery title for a naming context.
pub fn gallery_title(ctx: &NamingContext) -> String {
    let timestamp = ctx
        .timestamp
        .format(defaults::TITLE_TIMESTAMP_FORMAT)
        .to_string();

    match ctx.document_id {
        Some(id) => {
            let title = ctx
                .document_title
                .as_deref()
                .filter(|t| !t.trim().is_empty())
                .unwrap_or(UNTITLED);
            format!(
                "{}-{}-{}-{}",
                truncate_title(title, id),
                id,
                defaults::CONVERTED_MARKER,
                timestamp
            )
        }
        None => format!("{}-{}", defaults::CONVERTED_MARKER, timestamp),
    }
}

/// Characters of the document title kept for a given id.
///
/// The id, the dashes on both sides of it and the marker's first character
/// come out of the shared budget.
pub fn title_prefix_len(document_id: i64) -> usize {
    let reserved = document_id.to_string().chars().count() + 3;
    defaults::TITLE_NAME_BUDGET.saturating_sub(reserved)
}

fn truncate_title(title: &str, document_id: i64) -> String {
    title.chars().take(title_prefix_len(document_id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    fn ts() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 9, 30, 5).unwrap()
    }

    #[test]
    fn test_title_with_document_context() {
        let ctx = NamingContext::for_document(42, "My Great Vacation Photos From Summer", ts());
        assert_eq!(
            gallery_title(&ctx),
            "My Great Vacati-42-Converted-2026-10-18 09:30:05"
        );
    }

    #[test]
    fn test_title_without_context() {
        let ctx = NamingContext::standalone(ts());
        assert_eq!(gallery_title(&ctx), "Converted-2026-10-18 09:30:05");
    }

    #[test]
    fn test_short_title_is_not_padded() {
        let ctx = NamingContext::for_document(7, "Trip", ts());
        assert_eq!(gallery_title(&ctx), "Trip-7-Converted-2026-10-18 09:30:05");
    }

    #[test]
    fn test_missing_title_uses_placeholder() {
        let ctx = NamingContext {
            document_title: None,
            document_id: Some(3),
            timestamp: ts(),
        };
        assert_eq!(gallery_title(&ctx), "Untitled-3-Converted-2026-10-18 09:30:05");
    }

    #[test]
    fn test_truncation_counts_chars_not_bytes() {
        let ctx = NamingContext::for_document(1, "ÉÉÉÉÉÉÉÉÉÉÉÉÉÉÉÉÉÉÉÉÉÉ", ts());
        let title = gallery_title(&ctx);
        let prefix: String = title.split("-1-").next().unwrap().to_string();
        assert_eq!(prefix.chars().count(), title_prefix_len(1));
    }

    proptest! {
        #[test]
        fn prop_title_is_deterministic(title in ".{0,60}", id in 1i64..1_000_000) {
            let a = gallery_title(&NamingContext::for_document(id, title.clone(), ts()));
            let b = gallery_title(&NamingContext::for_document(id, title, ts()));
            prop_assert_eq!(a, b);
        }

        #[test]
        fn prop_prefix_and_id_fit_budget(title in "[a-zA-Z ]{1,60}", id in 1i64..1_000_000) {
            let out = gallery_title(&NamingContext::for_document(id, title, ts()));
            let suffix = format!("-{}-Converted-", id);
            let head = &out[..out.find(&suffix).unwrap()];
            prop_assert!(head.chars().count() + id.to_string().len() + 3 <= defaults::TITLE_NAME_BUDGET);
        }
    }
}
