#[cfg(test)]
mod tests;

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use tracing::debug;

use super::by_similarity_desc;
use crate::models::{Citation, CombinedChunk};

/// Page key used for chunks that carry no page number, so that all of a
/// document's page-less chunks land in one group.
pub const NO_PAGE: i64 = -1;

const CONTENT_SEPARATOR: &str = "\n\n";

/// Collapse matches that come from the same document page into one citation.
///
/// Each `(document, page)` group is represented by its highest-similarity
/// member. Groups with several members get their unique trimmed texts joined
/// in first-seen order. The result is sorted by similarity, descending.
///
/// Citations whose similarity is `NaN` have no place in that order and are
/// dropped, matching how [`super::find_top_k`] never lets them past its floor.
///
/// Running this on its own output returns the same citations.
#[inline]
pub fn deduplicate_by_page<I, T>(matches: I) -> Vec<Citation>
where
    I: IntoIterator<Item = T>,
    T: Into<Citation>,
{
    let mut groups: Vec<Vec<Citation>> = Vec::new();
    let mut group_index: HashMap<(String, i64), usize> = HashMap::new();
    let mut input_count = 0_usize;
    let mut unscored = 0_usize;

    for item in matches {
        let citation = item.into();
        input_count += 1;

        if citation.similarity.is_nan() {
            unscored += 1;
            continue;
        }

        match group_index.entry(page_key(&citation)) {
            Entry::Occupied(entry) => groups[*entry.get()].push(citation),
            Entry::Vacant(entry) => {
                entry.insert(groups.len());
                groups.push(vec![citation]);
            }
        }
    }

    let mut citations: Vec<Citation> = groups.into_iter().filter_map(merge_group).collect();
    citations.sort_by(|a, b| by_similarity_desc(a.similarity, b.similarity));

    debug!(
        "Deduplicated {} matches into {} citations ({} without a score dropped)",
        input_count,
        citations.len(),
        unscored
    );

    citations
}

fn page_key(citation: &Citation) -> (String, i64) {
    (
        citation.document.id.clone(),
        citation.page.map_or(NO_PAGE, i64::from),
    )
}

fn merge_group(mut group: Vec<Citation>) -> Option<Citation> {
    if group.len() <= 1 {
        return group.pop();
    }

    let representative = representative_index(&group);

    let (content, chunk_ids) = combine_members(&group);

    let mut merged = group.swap_remove(representative);
    merged.content = content;
    merged.combined = Some(CombinedChunk {
        merged_count: chunk_ids.len(),
        chunk_ids,
    });
    Some(merged)
}

/// Unique trimmed texts in first-seen order, plus every source chunk id
fn combine_members(group: &[Citation]) -> (String, Vec<String>) {
    let mut seen = HashSet::new();
    let mut parts = Vec::new();
    let mut chunk_ids = Vec::new();
    for member in group {
        let text = member.content.trim();
        if !text.is_empty() && seen.insert(text) {
            parts.push(text);
        }
        chunk_ids.extend(member.source_chunk_ids());
    }
    (parts.join(CONTENT_SEPARATOR), chunk_ids)
}

/// Highest similarity wins; the earliest member wins a tie
fn representative_index(group: &[Citation]) -> usize {
    let mut best = 0;
    for (i, member) in group.iter().enumerate().skip(1) {
        if member.similarity > group[best].similarity {
            best = i;
        }
    }
    best
}
