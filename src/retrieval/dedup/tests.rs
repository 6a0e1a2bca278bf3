use super::*;
use crate::models::DocumentSummary;

fn citation(id: &str, document_id: &str, page: Option<u32>, similarity: f32, content: &str) -> Citation {
    Citation {
        chunk_id: id.to_string(),
        document: DocumentSummary {
            id: document_id.to_string(),
            title: format!("Title of {}", document_id),
            file_name: None,
        },
        page,
        similarity,
        content: content.to_string(),
        combined: None,
    }
}

#[test]
fn merges_same_page_content() {
    let merged = deduplicate_by_page(vec![
        citation("a", "d1", Some(1), 1.0, "alpha"),
        citation("b", "d1", Some(1), 0.99, "beta"),
    ]);

    assert_eq!(merged.len(), 1);
    let only = &merged[0];
    assert_eq!(only.content, "alpha\n\nbeta");
    assert_eq!(only.chunk_id, "a");
    assert_eq!(only.page, Some(1));
    assert!(only.is_combined());
    assert_eq!(only.merged_count(), 2);
    assert_eq!(
        only.source_chunk_ids(),
        vec!["a".to_string(), "b".to_string()]
    );
}

#[test]
fn content_union_contains_each_text_once() {
    let merged = deduplicate_by_page(vec![
        citation("a", "d1", Some(3), 0.5, "  A  "),
        citation("b", "d1", Some(3), 0.4, "B"),
        citation("c", "d1", Some(3), 0.3, "A"),
    ]);

    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].content, "A\n\nB");
    assert_eq!(merged[0].content.matches('A').count(), 1);
    assert_eq!(merged[0].content.matches('B').count(), 1);
    assert_eq!(merged[0].merged_count(), 3);
}

#[test]
fn representative_is_highest_similarity() {
    let merged = deduplicate_by_page(vec![
        citation("low", "d1", Some(2), 0.6, "low text"),
        citation("high", "d1", Some(2), 0.9, "high text"),
    ]);

    assert_eq!(merged.len(), 1);
    let only = &merged[0];
    assert_eq!(only.similarity, 0.9);
    assert_eq!(only.chunk_id, "high");
    assert_eq!(only.document.id, "d1");
    // Text order follows input order, not rank
    assert_eq!(only.content, "low text\n\nhigh text");
}

#[test]
fn singletons_pass_through_unchanged() {
    let single = citation("a", "d1", Some(1), 0.7, "  padded  ");
    let merged = deduplicate_by_page(vec![single.clone()]);
    assert_eq!(merged, vec![single]);
}

#[test]
fn pageless_chunks_group_per_document() {
    let merged = deduplicate_by_page(vec![
        citation("a", "d1", None, 0.8, "one"),
        citation("b", "d1", None, 0.7, "two"),
        citation("c", "d2", None, 0.6, "three"),
    ]);

    assert_eq!(merged.len(), 2);
    assert_eq!(merged[0].content, "one\n\ntwo");
    assert_eq!(merged[0].page, None);
    assert_eq!(merged[1].chunk_id, "c");
}

#[test]
fn different_pages_stay_separate() {
    let merged = deduplicate_by_page(vec![
        citation("a", "d1", Some(1), 0.8, "one"),
        citation("b", "d1", Some(2), 0.7, "two"),
        citation("c", "d2", Some(1), 0.6, "three"),
    ]);
    assert_eq!(merged.len(), 3);
    assert!(merged.iter().all(|c| !c.is_combined()));
}

#[test]
fn output_is_sorted_by_similarity() {
    let merged = deduplicate_by_page(vec![
        citation("a", "d1", Some(1), 0.3, "one"),
        citation("b", "d2", Some(1), 0.9, "two"),
        citation("c", "d1", Some(1), 0.5, "three"),
        citation("d", "d3", Some(4), 0.7, "four"),
    ]);

    let order: Vec<&str> = merged.iter().map(|c| c.chunk_id.as_str()).collect();
    assert_eq!(order, vec!["b", "d", "c"]);
}

#[test]
fn deduplication_is_idempotent() {
    let input = vec![
        citation("a", "d1", Some(1), 0.3, "one"),
        citation("b", "d2", Some(1), 0.9, "two"),
        citation("c", "d1", Some(1), 0.5, "three"),
        citation("d", "d2", None, 0.7, "four"),
        citation("e", "d2", None, 0.7, "four"),
    ];

    let once = deduplicate_by_page(input);
    let twice = deduplicate_by_page(once.clone());
    assert_eq!(once, twice);
}

#[test]
fn empty_input_gives_empty_output() {
    let merged = deduplicate_by_page(Vec::<Citation>::new());
    assert!(merged.is_empty());
}

#[test]
fn remerging_combined_citations_keeps_all_chunk_ids() {
    let mut first = deduplicate_by_page(vec![
        citation("a", "d1", Some(1), 0.9, "alpha"),
        citation("b", "d1", Some(1), 0.8, "beta"),
    ]);
    first.push(citation("c", "d1", Some(1), 0.95, "gamma"));

    let merged = deduplicate_by_page(first);
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].chunk_id, "c");
    assert_eq!(merged[0].merged_count(), 3);
    assert_eq!(merged[0].content, "alpha\n\nbeta\n\ngamma");
}

#[test]
fn unscored_citations_are_dropped() {
    let merged = deduplicate_by_page(vec![
        citation("a", "d1", Some(1), 0.4, "one"),
        citation("nan", "d2", Some(7), f32::NAN, "unscored"),
        citation("b", "d3", Some(2), 0.8, "two"),
        citation("c", "d1", Some(1), f32::NAN, "same page, unscored"),
        citation("d", "d4", Some(3), 0.6, "three"),
    ]);

    let order: Vec<&str> = merged.iter().map(|c| c.chunk_id.as_str()).collect();
    assert_eq!(order, vec!["b", "d", "a"]);
    assert!(merged.iter().all(|c| !c.similarity.is_nan()));
    assert!(!merged[2].is_combined());
}

#[test]
fn blank_texts_count_but_add_no_content() {
    let merged = deduplicate_by_page(vec![
        citation("a", "d1", Some(4), 0.9, "alpha"),
        citation("blank", "d1", Some(4), 0.8, ""),
        citation("spaces", "d1", Some(4), 0.7, "  \n\t "),
        citation("b", "d1", Some(4), 0.6, "beta"),
    ]);

    assert_eq!(merged.len(), 1);
    let only = &merged[0];
    assert_eq!(only.content, "alpha\n\nbeta");
    assert!(!only.content.starts_with(CONTENT_SEPARATOR));
    assert!(!only.content.ends_with(CONTENT_SEPARATOR));
    assert_eq!(only.merged_count(), 4);
    assert_eq!(
        only.source_chunk_ids(),
        vec![
            "a".to_string(),
            "blank".to_string(),
            "spaces".to_string(),
            "b".to_string()
        ]
    );
}

#[test]
fn group_of_only_blank_texts_has_empty_content() {
    let merged = deduplicate_by_page(vec![
        citation("x", "d1", None, 0.5, " "),
        citation("y", "d1", None, 0.4, ""),
    ]);

    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].content, "");
    assert_eq!(merged[0].merged_count(), 2);
}
