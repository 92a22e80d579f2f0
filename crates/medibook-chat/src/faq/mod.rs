//! Semantic FAQ matching.
//!
//! Every canonical question and variation becomes one TF-IDF document. A
//! query is answered by the most similar document when that similarity
//! reaches the configured threshold.

pub mod corpus;
pub mod vectorizer;

use serde::{Deserialize, Serialize};
use tracing::debug;

use medibook_core::config::FaqConfig;

use vectorizer::{cosine, SparseVector, TfidfVectorizer};

/// One FAQ item: a canonical question, its paraphrases and the answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaqEntry {
    pub question: String,
    #[serde(default)]
    pub variations: Vec<String>,
    pub answer: String,
}

/// Outcome of a lookup. `score` is the best similarity observed, reported
/// even when it stays below the threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct FaqMatch {
    pub answer: Option<String>,
    pub score: f32,
}

/// Static similarity index over an FAQ corpus.
pub struct FaqMatcher {
    entries: Vec<FaqEntry>,
    vectorizer: TfidfVectorizer,
    /// One vector per indexed string, in corpus order.
    vectors: Vec<SparseVector>,
    /// Entry index for each vector.
    owners: Vec<usize>,
    threshold: f32,
}

impl FaqMatcher {
    pub fn new(entries: Vec<FaqEntry>, config: &FaqConfig) -> Self {
        let mut documents = Vec::new();
        let mut owners = Vec::new();
        for (index, entry) in entries.iter().enumerate() {
            documents.push(entry.question.as_str());
            owners.push(index);
            for variation in &entry.variations {
                documents.push(variation.as_str());
                owners.push(index);
            }
        }

        let vectorizer = TfidfVectorizer::fit(&documents, config.max_ngram);
        let vectors = documents.iter().map(|d| vectorizer.transform(d)).collect();

        debug!(
            entries = entries.len(),
            documents = owners.len(),
            vocabulary = vectorizer.vocabulary_len(),
            "FAQ index built"
        );

        Self {
            entries,
            vectorizer,
            vectors,
            owners,
            threshold: config.threshold,
        }
    }

    /// Matcher over the built-in clinic corpus.
    pub fn with_default_corpus(config: &FaqConfig) -> Self {
        Self::new(corpus::default_corpus(), config)
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn entries(&self) -> &[FaqEntry] {
        &self.entries
    }

    /// Find the answer for `query`. Ties go to the earliest indexed string.
    pub fn find_answer(&self, query: &str) -> FaqMatch {
        let query_vector = self.vectorizer.transform(query);

        let mut best: Option<(usize, f32)> = None;
        for (doc, vector) in self.vectors.iter().enumerate() {
            let similarity = cosine(&query_vector, vector);
            if best.map_or(true, |(_, s)| similarity > s) {
                best = Some((doc, similarity));
            }
        }

        match best {
            Some((doc, score)) if score >= self.threshold => FaqMatch {
                answer: Some(self.entries[self.owners[doc]].answer.clone()),
                score,
            },
            Some((_, score)) => FaqMatch {
                answer: None,
                score,
            },
            None => FaqMatch {
                answer: None,
                score: 0.0,
            },
        }
    }
}
