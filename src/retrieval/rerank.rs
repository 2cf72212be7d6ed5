//! Reranking algorithms for retrieved candidates (C6).


use std::collections::HashMap;

use tracing::warn;

use crate::provider::{CompletionRequest, LlmProvider};

use super::types::RetrievedDocument;

const K1: f32 = 1.5;
const B: f32 = 0.75;
const TITLE_BONUS: f32 = 2.0;
const RECENCY_WINDOW_DAYS: f32 = 30.0;
const MS_PER_DAY: f64 = 86_400_000.0;

const STOPWORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by", "is",
    "are", "was", "were", "be", "been", "being", "this", "that", "these", "those", "it", "as",
];

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .map(|w| w.to_lowercase())
        .filter(|w| w.len() >= 3 && !STOPWORDS.contains(&w.as_str()))
        .collect()
}

/// Lightweight BM25-like rerank, grounded on the document store's keyword
/// scoring (C2) generalized into a proper BM25 weighting (spec §4.6).
///
/// `now_ms` is the caller-supplied "current time" used for the recency bonus,
/// kept as a parameter so the algorithm stays deterministic and testable.
pub fn rerank_lightweight(
    query: &str,
    candidates: Vec<RetrievedDocument>,
    top_k: usize,
    now_ms: i64,
) -> Vec<RetrievedDocument> {
    let terms = tokenize(query);
    if terms.is_empty() || candidates.is_empty() {
        let mut out = candidates;
        out.truncate(top_k);
        return out;
    }

    let n = candidates.len() as f32;
    let doc_tokens: Vec<Vec<String>> = candidates
        .iter()
        .map(|d| tokenize(&format!("{} {}", d.title, d.content)))
        .collect();
    let avgdl = doc_tokens.iter().map(|t| t.len() as f32).sum::<f32>() / n;

    let mut df: HashMap<&str, f32> = HashMap::new();
    for term in &terms {
        let count = doc_tokens
            .iter()
            .filter(|tokens| tokens.iter().any(|t| t == term))
            .count() as f32;
        df.insert(term.as_str(), count);
    }

    let mut scored: Vec<(f32, RetrievedDocument)> = candidates
        .into_iter()
        .zip(doc_tokens.iter())
        .map(|(doc, tokens)| {
            let dl = tokens.len() as f32;
            let mut score = 0.0f32;
            for term in &terms {
                let df_t = df.get(term.as_str()).copied().unwrap_or(0.0);
                if df_t == 0.0 {
                    continue;
                }
                let tf = tokens.iter().filter(|t| *t == term).count() as f32;
                if tf == 0.0 {
                    continue;
                }
                let idf = (n / df_t).ln();
                score += idf * (tf * (K1 + 1.0)) / (tf + K1 * (1.0 - B + B * dl / avgdl));
            }

            let title_tokens = tokenize(&doc.title);
            for term in &terms {
                if title_tokens.iter().any(|t| t == term) {
                    score += TITLE_BONUS;
                }
            }

            if doc.updated_at > 0 {
                let age_days = ((now_ms - doc.updated_at) as f64 / MS_PER_DAY) as f32;
                if age_days >= 0.0 && age_days < RECENCY_WINDOW_DAYS {
                    score += (RECENCY_WINDOW_DAYS - age_days) / 5.0;
                }
            }

            (score, doc)
        })
        .collect();

    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored.into_iter().map(|(_, doc)| doc).take(top_k).collect()
}

fn format_candidates(candidates: &[RetrievedDocument]) -> String {
    candidates
        .iter()
        .enumerate()
        .map(|(i, doc)| {
            let content: String = doc.content.chars().take(500).collect();
            format!("[{}] {}\n{}", i + 1, doc.title, content)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn parse_ordering(text: &str, n: usize) -> Vec<usize> {
    let mut seen = std::collections::HashSet::new();
    let mut order = Vec::new();
    for token in text.split(|c: char| !c.is_ascii_digit()) {
        if token.is_empty() {
            continue;
        }
        if let Ok(value) = token.parse::<usize>()
            && value >= 1
            && value <= n
            && seen.insert(value)
        {
            order.push(value - 1);
        }
    }
    for i in 0..n {
        if seen.insert(i + 1) {
            order.push(i);
        }
    }
    order
}

/// LLM-based rerank: asks `provider` for a comma-separated ordering of
/// `candidates` and applies it. Falls back to original order (truncated to
/// `top_k`) if the response can't be parsed or the provider call fails.
pub async fn rerank_with_llm<P: LlmProvider>(
    provider: &P,
    query: &str,
    candidates: Vec<RetrievedDocument>,
    top_k: usize,
) -> Vec<RetrievedDocument> {
    if candidates.is_empty() {
        return candidates;
    }

    let n = candidates.len();
    let prompt = format!(
        "Query: {query}\n\nCandidates:\n{}\n\nReturn only a comma-separated list of candidate numbers, ordered from most to least relevant to the query.",
        format_candidates(&candidates)
    );

    let request = CompletionRequest::new(prompt).with_temperature(0.0);
    let response = match provider.complete(request).await {
        Ok(response) => response,
        Err(e) => {
            warn!(error = %e, "llm rerank failed; falling back to original order");
            let mut out = candidates;
            out.truncate(top_k);
            return out;
        }
    };

    let order = parse_ordering(&response.text, n);
    let mut slots: Vec<Option<RetrievedDocument>> = candidates.into_iter().map(Some).collect();
    order
        .into_iter()
        .filter_map(|idx| slots[idx].take())
        .take(top_k)
        .collect()
}
