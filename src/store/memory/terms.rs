// Term-overlap scoring for the in-memory more-like-this emulation

use std::collections::HashMap;

use crate::document::EmbeddedDocument;
use crate::store::{MoreLikeThisQuery, TextField};

const K1: f64 = 1.2;
const B: f64 = 0.75;

/// Split text the way a CJK-aware standard analyzer roughly does: every kana or
/// ideograph is its own term; other alphanumeric runs are lowercased words.
pub(super) fn analyze(text: &str) -> Vec<String> {
    let mut terms = Vec::new();
    let mut current = String::new();

    for c in text.chars() {
        if is_cjk(c) {
            flush(&mut current, &mut terms);
            terms.push(c.to_string());
        } else if c.is_alphanumeric() {
            current.push(c);
        } else {
            flush(&mut current, &mut terms);
        }
    }
    flush(&mut current, &mut terms);
    terms
}

fn flush(current: &mut String, terms: &mut Vec<String>) {
    if !current.is_empty() {
        terms.push(current.to_lowercase());
        current.clear();
    }
}

fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{3040}'..='\u{30ff}'
        | '\u{3400}'..='\u{4dbf}'
        | '\u{4e00}'..='\u{9fff}'
        | '\u{f900}'..='\u{faff}'
        | '\u{ff66}'..='\u{ff9f}')
}

fn field_terms(document: &EmbeddedDocument, field: TextField) -> Vec<String> {
    match field {
        TextField::Name => analyze(&document.name),
        TextField::Story => analyze(&document.story),
        TextField::Attributes => document.attributes.clone(),
    }
}

fn like_terms(like: &str, field: TextField) -> Vec<String> {
    if field.is_keyword() {
        let trimmed = like.trim();
        if trimmed.is_empty() {
            Vec::new()
        } else {
            vec![trimmed.to_string()]
        }
    } else {
        analyze(like)
    }
}

struct FieldStats {
    terms: Vec<Vec<String>>,
    average_length: f64,
}

struct SelectedTerm {
    field_index: usize,
    term: String,
    idf: f64,
}

/// Score every document against the query, in input order. Zero means no match.
///
/// Terms from `like` are kept when they occur at least `min_term_freq` times in
/// it and in at least `min_doc_freq` documents. The `max_query_terms` terms with
/// the highest tf × idf are then matched with BM25 per field.
pub(super) fn more_like_this(documents: &[&EmbeddedDocument], query: &MoreLikeThisQuery) -> Vec<f64> {
    let total = documents.len();
    if total == 0 {
        return Vec::new();
    }

    let stats: Vec<FieldStats> = query
        .fields
        .iter()
        .map(|&field| {
            let terms: Vec<Vec<String>> = documents.iter().map(|d| field_terms(d, field)).collect();
            let total_length: usize = terms.iter().map(Vec::len).sum();
            FieldStats {
                average_length: total_length as f64 / total as f64,
                terms,
            }
        })
        .collect();

    let mut candidates: Vec<(f64, SelectedTerm)> = Vec::new();
    for (field_index, &field) in query.fields.iter().enumerate() {
        let mut order: Vec<String> = Vec::new();
        let mut frequencies: HashMap<String, u32> = HashMap::new();
        for term in like_terms(&query.like, field) {
            let count = frequencies.entry(term.clone()).or_insert(0);
            if *count == 0 {
                order.push(term);
            }
            *count += 1;
        }

        for term in order {
            let tf = frequencies[&term];
            if tf < query.min_term_freq {
                continue;
            }
            let df = stats[field_index]
                .terms
                .iter()
                .filter(|terms| terms.contains(&term))
                .count();
            if df == 0 || df < query.min_doc_freq as usize {
                continue;
            }
            let idf = inverse_document_frequency(total, df);
            candidates.push((
                f64::from(tf) * idf,
                SelectedTerm {
                    field_index,
                    term,
                    idf,
                },
            ));
        }
    }

    candidates.sort_by(|a, b| b.0.total_cmp(&a.0));
    candidates.truncate(query.max_query_terms as usize);

    (0..total)
        .map(|doc| {
            candidates
                .iter()
                .map(|(_, selected)| {
                    let field = &stats[selected.field_index];
                    let terms = &field.terms[doc];
                    let tf = terms.iter().filter(|t| **t == selected.term).count() as f64;
                    if tf == 0.0 {
                        return 0.0;
                    }
                    let length_norm = 1.0 - B + B * terms.len() as f64 / field.average_length;
                    selected.idf * tf * (K1 + 1.0) / (tf + K1 * length_norm)
                })
                .sum()
        })
        .collect()
}

fn inverse_document_frequency(total: usize, df: usize) -> f64 {
    let (n, df) = (total as f64, df as f64);
    (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
}
