//! TF-IDF vector space over short documents.
//!
//! Tokens are runs of two or more word characters, lower-cased. Weights use
//! raw term frequency and smoothed inverse document frequency
//! `ln((1 + n) / (1 + df)) + 1`; every vector is L2-normalised, so cosine
//! similarity reduces to a dot product.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::LazyLock;

use regex::Regex;

static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\w\w+\b").unwrap());

/// Sparse vector as `(term index, weight)` pairs sorted by index.
pub type SparseVector = Vec<(usize, f32)>;

/// Vocabulary and idf weights fitted on a fixed document set.
#[derive(Debug, Clone)]
pub struct TfidfVectorizer {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f32>,
    max_ngram: usize,
}

impl TfidfVectorizer {
    /// Fit the vocabulary on `documents`, indexing n-grams up to `max_ngram`
    /// (clamped to at least 1).
    pub fn fit<S: AsRef<str>>(documents: &[S], max_ngram: usize) -> Self {
        let max_ngram = max_ngram.max(1);
        let doc_terms: Vec<BTreeSet<String>> = documents
            .iter()
            .map(|d| terms(d.as_ref(), max_ngram).into_iter().collect())
            .collect();

        let mut document_frequency: BTreeMap<&str, usize> = BTreeMap::new();
        for set in &doc_terms {
            for term in set {
                *document_frequency.entry(term.as_str()).or_insert(0) += 1;
            }
        }

        let n = documents.len() as f32;
        let mut vocabulary = HashMap::with_capacity(document_frequency.len());
        let mut idf = Vec::with_capacity(document_frequency.len());
        for (index, (term, df)) in document_frequency.into_iter().enumerate() {
            vocabulary.insert(term.to_string(), index);
            idf.push(((1.0 + n) / (1.0 + df as f32)).ln() + 1.0);
        }

        Self {
            vocabulary,
            idf,
            max_ngram,
        }
    }

    pub fn vocabulary_len(&self) -> usize {
        self.vocabulary.len()
    }

    /// Project `text` into the fitted space. Unknown terms are ignored; a text
    /// with no known terms yields an empty vector.
    pub fn transform(&self, text: &str) -> SparseVector {
        let mut counts: BTreeMap<usize, f32> = BTreeMap::new();
        for term in terms(text, self.max_ngram) {
            if let Some(&index) = self.vocabulary.get(&term) {
                *counts.entry(index).or_insert(0.0) += 1.0;
            }
        }

        let mut vector: SparseVector = counts
            .into_iter()
            .map(|(index, tf)| (index, tf * self.idf[index]))
            .collect();

        let norm = vector.iter().map(|(_, w)| w * w).sum::<f32>().sqrt();
        if norm > 0.0 {
            for (_, w) in &mut vector {
                *w /= norm;
            }
        }
        vector
    }
}

/// Cosine similarity of two L2-normalised sparse vectors.
pub fn cosine(a: &SparseVector, b: &SparseVector) -> f32 {
    let (mut i, mut j) = (0, 0);
    let mut dot = 0.0;
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                dot += a[i].1 * b[j].1;
                i += 1;
                j += 1;
            }
        }
    }
    dot
}

/// Lower-cased tokens followed by space-joined n-grams up to `max_ngram`.
fn terms(text: &str, max_ngram: usize) -> Vec<String> {
    let lowered = text.to_lowercase();
    let tokens: Vec<&str> = TOKEN_RE.find_iter(&lowered).map(|m| m.as_str()).collect();
    let mut out: Vec<String> = tokens.iter().map(|t| t.to_string()).collect();
    for n in 2..=max_ngram {
        out.extend(tokens.windows(n).map(|w| w.join(" ")));
    }
    out
}
