//! Optimization history: a newest-first bounded queue.

use serde::{Deserialize, Serialize};

/// One successful optimization.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItem {
    /// Stable identifier.
    pub id: String,
    /// Text the user wrote.
    pub original_prompt: String,
    /// Text the provider returned.
    pub optimized_prompt: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
    /// Site the optimization ran on.
    pub site_id: String,
}

impl HistoryItem {
    /// Creates an entry stamped with the current time.
    pub fn now(
        original_prompt: impl Into<String>,
        optimized_prompt: impl Into<String>,
        site_id: impl Into<String>,
    ) -> Self {
        let timestamp = chrono::Utc::now().timestamp_millis();
        Self {
            id: format!("history-{timestamp}"),
            original_prompt: original_prompt.into(),
            optimized_prompt: optimized_prompt.into(),
            timestamp,
            site_id: site_id.into(),
        }
    }
}

/// Prepends `item` and drops the oldest entries beyond `max_len`.
///
/// An id already present in `queue` gets a `-N` suffix.
pub fn append_bounded(
    queue: &[HistoryItem],
    mut item: HistoryItem,
    max_len: usize,
) -> Vec<HistoryItem> {
    item.id = unique_id(queue, &item.id);
    std::iter::once(item)
        .chain(queue.iter().cloned())
        .take(max_len)
        .collect()
}

fn unique_id(queue: &[HistoryItem], base: &str) -> String {
    let taken = |candidate: &str| queue.iter().any(|h| h.id == candidate);
    let mut id = base.to_string();
    let mut suffix = 1;
    while taken(&id) {
        id = format!("{base}-{suffix}");
        suffix += 1;
    }
    id
}

/// Case-insensitive search over original and optimized text.
pub fn search<'a>(queue: &'a [HistoryItem], query: &str) -> Vec<&'a HistoryItem> {
    let needle = query.to_lowercase();
    queue
        .iter()
        .filter(|h| {
            h.original_prompt.to_lowercase().contains(&needle)
                || h.optimized_prompt.to_lowercase().contains(&needle)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn item(n: usize) -> HistoryItem {
        HistoryItem {
            id: format!("h{n}"),
            original_prompt: format!("draft {n}"),
            optimized_prompt: format!("better {n}"),
            timestamp: n as i64,
            site_id: "chatgpt".into(),
        }
    }

    #[test]
    fn newest_first_and_bounded() {
        let queue = append_bounded(&[], item(1), 2);
        let queue = append_bounded(&queue, item(2), 2);
        let queue = append_bounded(&queue, item(3), 2);
        let ids: Vec<&str> = queue.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["h3", "h2"]);
    }

    #[test]
    fn same_millisecond_entries_get_distinct_ids() {
        let first = HistoryItem::now("a", "b", "chatgpt");
        let mut second = HistoryItem::now("c", "d", "chatgpt");
        let mut third = HistoryItem::now("e", "f", "chatgpt");
        second.id = first.id.clone();
        third.id = first.id.clone();

        let queue = append_bounded(&[], first.clone(), 10);
        let queue = append_bounded(&queue, second, 10);
        let queue = append_bounded(&queue, third, 10);

        let ids: Vec<String> = queue.iter().map(|h| h.id.clone()).collect();
        assert_eq!(
            ids,
            vec![
                format!("{}-2", first.id),
                format!("{}-1", first.id),
                first.id.clone(),
            ]
        );
    }

    #[test]
    fn search_matches_either_side() {
        let queue = vec![item(1), item(2)];
        assert_eq!(search(&queue, "BETTER 2").len(), 1);
        assert_eq!(search(&queue, "draft").len(), 2);
    }

    proptest! {
        #[test]
        fn never_exceeds_capacity(len in 0usize..30, cap in 1usize..20) {
            let queue: Vec<HistoryItem> = (0..len).map(item).collect();
            let next = append_bounded(&queue, item(99), cap);
            prop_assert!(next.len() <= cap);
            prop_assert_eq!(&next[0].id, "h99");
        }
    }
}
