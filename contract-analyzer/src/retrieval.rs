//! Chunking and TF-IDF ranking of contract text for question answering

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Split `text` into chunks of at most roughly `max_chars`, never breaking a line.
///
/// Blank lines are dropped and each kept line is trimmed. A single line longer
/// than `max_chars` becomes its own chunk.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut buffer: Vec<&str> = Vec::new();
    let mut current_len = 0;

    for line in text.split('\n').map(str::trim).filter(|l| !l.is_empty()) {
        let line_len = line.chars().count();
        if current_len + line_len + 1 > max_chars && !buffer.is_empty() {
            chunks.push(buffer.join("\n"));
            buffer.clear();
            current_len = 0;
        }
        buffer.push(line);
        current_len += line_len + 1;
    }

    if !buffer.is_empty() {
        chunks.push(buffer.join("\n"));
    }
    chunks
}

fn token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b\w\w+\b").expect("valid token regex"))
}

fn term_counts(text: &str) -> HashMap<String, f64> {
    let lowered = text.to_lowercase();
    let mut counts = HashMap::new();
    for token in token_regex().find_iter(&lowered) {
        *counts.entry(token.as_str().to_string()).or_insert(0.0) += 1.0;
    }
    counts
}

/// L2-normalized TF-IDF vector with smoothed idf: ln((1 + n) / (1 + df)) + 1
fn tfidf(counts: &HashMap<String, f64>, idf: &HashMap<&str, f64>) -> HashMap<String, f64> {
    let mut vector: HashMap<String, f64> = counts
        .iter()
        .map(|(term, tf)| (term.clone(), tf * idf.get(term.as_str()).copied().unwrap_or(1.0)))
        .collect();

    let norm = vector.values().map(|w| w * w).sum::<f64>().sqrt();
    if norm > 0.0 {
        for weight in vector.values_mut() {
            *weight /= norm;
        }
    }
    vector
}

/// The `top_k` chunks most similar to `question`, best first.
///
/// The question takes part in the document-frequency statistics. Ties keep
/// the original chunk order.
pub fn rank_chunks<'a>(question: &str, chunks: &'a [String], top_k: usize) -> Vec<&'a str> {
    if chunks.is_empty() || top_k == 0 {
        return Vec::new();
    }

    let mut documents: Vec<HashMap<String, f64>> =
        chunks.iter().map(|chunk| term_counts(chunk)).collect();
    documents.push(term_counts(question));

    let n = documents.len() as f64;
    let mut document_frequency: HashMap<&str, f64> = HashMap::new();
    for document in &documents {
        for term in document.keys() {
            *document_frequency.entry(term.as_str()).or_insert(0.0) += 1.0;
        }
    }
    let idf: HashMap<&str, f64> = document_frequency
        .into_iter()
        .map(|(term, df)| (term, ((1.0 + n) / (1.0 + df)).ln() + 1.0))
        .collect();

    let vectors: Vec<HashMap<String, f64>> = documents.iter().map(|d| tfidf(d, &idf)).collect();
    let Some((question_vector, chunk_vectors)) = vectors.split_last() else {
        return Vec::new();
    };

    let mut scored: Vec<(usize, f64)> = chunk_vectors
        .iter()
        .enumerate()
        .map(|(idx, vector)| {
            let score = question_vector
                .iter()
                .map(|(term, weight)| weight * vector.get(term).copied().unwrap_or(0.0))
                .sum::<f64>();
            (idx, score)
        })
        .collect();

    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored
        .into_iter()
        .take(top_k)
        .map(|(idx, _)| chunks[idx].as_str())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunking_respects_lines() {
        let text = "linha um\n\n  linha dois  \nlinha três";
        assert_eq!(chunk_text(text, 1000), vec!["linha um\nlinha dois\nlinha três"]);

        let chunks = chunk_text(text, 12);
        assert_eq!(chunks, vec!["linha um", "linha dois", "linha três"]);
    }

    #[test]
    fn test_oversized_line_is_kept_whole() {
        let long = "x".repeat(50);
        let chunks = chunk_text(&format!("curta\n{long}\nfim"), 20);
        assert_eq!(chunks, vec!["curta".to_string(), long, "fim".to_string()]);
    }

    #[test]
    fn test_empty_text_has_no_chunks() {
        assert!(chunk_text(" \n \n", 100).is_empty());
        assert!(rank_chunks("pergunta", &[], 5).is_empty());
    }

    #[test]
    fn test_ranking_prefers_matching_chunk() {
        let chunks = vec![
            "O pagamento será efetuado mensalmente por boleto.".to_string(),
            "A multa por rescisão antecipada é de três aluguéis.".to_string(),
            "O foro eleito é o da comarca de São Paulo.".to_string(),
        ];
        let ranked = rank_chunks("Qual é a multa por rescisão?", &chunks, 2);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0], chunks[1]);
    }

    #[test]
    fn test_ties_keep_document_order() {
        let chunks = vec!["alfa beta".to_string(), "gama delta".to_string()];
        assert_eq!(rank_chunks("zzz", &chunks, 5), vec!["alfa beta", "gama delta"]);
    }
}
