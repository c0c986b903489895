//! Topic modeling over preprocessed comment tokens.
//!
//! The model is a batch variational-Bayes Latent Dirichlet Allocation with
//! symmetric priors. Every call to [`TopicModel::fit`] starts from a freshly
//! seeded state, so refitting with another topic count never reuses a previous
//! run and two fits with the same inputs agree exactly.

use crate::error::{Result, TubeTalkError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info, instrument};

/// A term with its score inside one topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicTerm {
    pub term: String,
    /// Natural log of the term's probability under the topic. Negative and not
    /// normalized over the reported terms.
    pub weight: f64,
}

/// One discovered topic with its most significant terms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub topic_id: usize,
    /// Most weighted first.
    pub terms: Vec<TopicTerm>,
}

/// Fitting parameters.
#[derive(Debug, Clone)]
pub struct LdaConfig {
    /// Full passes over the corpus.
    pub passes: usize,
    /// Maximum per-document inner iterations per pass.
    pub iterations: usize,
    /// Inner loop stops once the mean change of a document's topic weights
    /// drops below this.
    pub gamma_threshold: f64,
    pub seed: u64,
}

impl Default for LdaConfig {
    fn default() -> Self {
        Self {
            passes: 50,
            iterations: 50,
            gamma_threshold: 1e-3,
            seed: 42,
        }
    }
}

/// Bidirectional term/id mapping built from the observed tokens only.
#[derive(Debug, Clone, Default)]
pub struct Dictionary {
    term_to_id: HashMap<String, usize>,
    id_to_term: Vec<String>,
}

impl Dictionary {
    /// Build a dictionary; ids are assigned in first-seen order.
    pub fn from_documents(token_lists: &[Vec<String>]) -> Self {
        let mut dictionary = Self::default();
        for token in token_lists.iter().flatten() {
            if !dictionary.term_to_id.contains_key(token) {
                dictionary
                    .term_to_id
                    .insert(token.clone(), dictionary.id_to_term.len());
                dictionary.id_to_term.push(token.clone());
            }
        }
        dictionary
    }

    pub fn len(&self) -> usize {
        self.id_to_term.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_to_term.is_empty()
    }

    pub fn id(&self, term: &str) -> Option<usize> {
        self.term_to_id.get(term).copied()
    }

    pub fn term(&self, id: usize) -> Option<&str> {
        self.id_to_term.get(id).map(String::as_str)
    }

    /// Sparse term counts of one document, sorted by term id. Unknown tokens
    /// are skipped.
    pub fn doc2bow(&self, tokens: &[String]) -> Vec<(usize, u32)> {
        let mut counts: BTreeMap<usize, u32> = BTreeMap::new();
        for id in tokens.iter().filter_map(|t| self.id(t)) {
            *counts.entry(id).or_insert(0) += 1;
        }
        counts.into_iter().collect()
    }
}

/// Fitted variational parameters.
#[derive(Debug, Clone)]
struct FittedLda {
    num_topics: usize,
    /// Topic-term variational parameters, `num_topics` rows of vocabulary length.
    lambda: Vec<Vec<f64>>,
}

/// LDA topic model: `build`, then `fit`, then `extract`.
#[derive(Debug, Clone, Default)]
pub struct TopicModel {
    config: LdaConfig,
    dictionary: Dictionary,
    corpus: Vec<Vec<(usize, u32)>>,
    fitted: Option<FittedLda>,
}

impl TopicModel {
    pub fn new(config: LdaConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Replace any previous corpus, dictionary and model with one built from
    /// `token_lists`.
    pub fn build(&mut self, token_lists: &[Vec<String>]) {
        self.dictionary = Dictionary::from_documents(token_lists);
        self.corpus = token_lists
            .iter()
            .map(|tokens| self.dictionary.doc2bow(tokens))
            .collect();
        self.fitted = None;

        debug!(
            "Built corpus of {} documents over {} terms",
            self.corpus.len(),
            self.dictionary.len()
        );
    }

    pub fn dictionary(&self) -> &Dictionary {
        &self.dictionary
    }

    /// Bag-of-words documents, index-aligned with the token lists given to `build`.
    pub fn corpus(&self) -> &[Vec<(usize, u32)>] {
        &self.corpus
    }

    /// Number of topics of the current fit, if any.
    pub fn num_topics(&self) -> Option<usize> {
        self.fitted.as_ref().map(|f| f.num_topics)
    }

    /// Fit a fresh model with `num_topics` topics.
    #[instrument(skip(self), fields(documents = self.corpus.len(), terms = self.dictionary.len()))]
    pub fn fit(&mut self, num_topics: usize) -> Result<()> {
        self.fitted = None;

        if num_topics == 0 {
            return Err(TubeTalkError::InvalidInput(
                "number of topics must be at least 1".to_string(),
            ));
        }
        if self.dictionary.is_empty() {
            return Err(TubeTalkError::DegenerateCorpus(
                "vocabulary is empty after preprocessing".to_string(),
            ));
        }

        let distinct_documents = self
            .corpus
            .iter()
            .filter(|doc| !doc.is_empty())
            .collect::<HashSet<_>>()
            .len();
        if distinct_documents < num_topics {
            return Err(TubeTalkError::DegenerateCorpus(format!(
                "{} topics requested but the corpus has only {} distinct non-empty documents",
                num_topics, distinct_documents
            )));
        }

        let lambda = self.run_variational_bayes(num_topics);
        self.fitted = Some(FittedLda { num_topics, lambda });

        info!("Fitted topic model with {} topics", num_topics);
        Ok(())
    }

    /// The `num_words` most probable terms of every topic, keyed by topic id.
    pub fn extract(&self, num_words: usize) -> Result<BTreeMap<usize, Topic>> {
        if num_words == 0 {
            return Err(TubeTalkError::InvalidInput(
                "number of words must be at least 1".to_string(),
            ));
        }
        let fitted = self.fitted.as_ref().ok_or_else(|| {
            TubeTalkError::InvalidInput("topic model has not been fitted".to_string())
        })?;

        let topics = fitted
            .lambda
            .iter()
            .enumerate()
            .map(|(topic_id, row)| {
                let total: f64 = row.iter().sum();
                let mut terms: Vec<TopicTerm> = row
                    .iter()
                    .enumerate()
                    .filter_map(|(term_id, value)| {
                        self.dictionary.term(term_id).map(|term| TopicTerm {
                            term: term.to_string(),
                            weight: (value / total).ln(),
                        })
                    })
                    .collect();
                terms.sort_by(|a, b| {
                    b.weight
                        .total_cmp(&a.weight)
                        .then_with(|| a.term.cmp(&b.term))
                });
                terms.truncate(num_words);
                (topic_id, Topic { topic_id, terms })
            })
            .collect();

        Ok(topics)
    }

    fn run_variational_bayes(&self, num_topics: usize) -> Vec<Vec<f64>> {
        let vocab_size = self.dictionary.len();
        let alpha = 1.0 / num_topics as f64;
        let eta = 1.0 / num_topics as f64;

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut lambda: Vec<Vec<f64>> = (0..num_topics)
            .map(|_| {
                (0..vocab_size)
                    .map(|_| rng.random_range(0.9..1.1))
                    .collect()
            })
            .collect();

        for _ in 0..self.config.passes {
            let exp_elog_beta = exp_dirichlet_expectation_rows(&lambda);
            let mut sstats = vec![vec![0.0; vocab_size]; num_topics];

            for doc in self.corpus.iter().filter(|d| !d.is_empty()) {
                let gamma = self.infer_document(doc, &exp_elog_beta, alpha);
                let exp_elog_theta = exp_dirichlet_expectation(&gamma);

                for &(term_id, count) in doc {
                    let norm = phi_norm(&exp_elog_theta, &exp_elog_beta, term_id);
                    let scale = f64::from(count) / norm;
                    for k in 0..num_topics {
                        sstats[k][term_id] += exp_elog_theta[k] * scale * exp_elog_beta[k][term_id];
                    }
                }
            }

            for (lambda_row, sstats_row) in lambda.iter_mut().zip(&sstats) {
                for (value, stat) in lambda_row.iter_mut().zip(sstats_row) {
                    *value = eta + stat;
                }
            }
        }

        debug!("Completed {} passes", self.config.passes);
        lambda
    }

    /// Variational topic weights of a single document.
    fn infer_document(&self, doc: &[(usize, u32)], exp_elog_beta: &[Vec<f64>], alpha: f64) -> Vec<f64> {
        let num_topics = exp_elog_beta.len();
        let mut gamma = vec![1.0; num_topics];

        for _ in 0..self.config.iterations {
            let exp_elog_theta = exp_dirichlet_expectation(&gamma);
            let mut next = vec![alpha; num_topics];

            for &(term_id, count) in doc {
                let norm = phi_norm(&exp_elog_theta, exp_elog_beta, term_id);
                let scale = f64::from(count) / norm;
                for k in 0..num_topics {
                    next[k] += exp_elog_theta[k] * scale * exp_elog_beta[k][term_id];
                }
            }

            let mean_change = gamma
                .iter()
                .zip(&next)
                .map(|(old, new)| (old - new).abs())
                .sum::<f64>()
                / num_topics as f64;
            gamma = next;

            if mean_change < self.config.gamma_threshold {
                break;
            }
        }

        gamma
    }
}

fn phi_norm(exp_elog_theta: &[f64], exp_elog_beta: &[Vec<f64>], term_id: usize) -> f64 {
    exp_elog_theta
        .iter()
        .zip(exp_elog_beta)
        .map(|(theta, beta_row)| theta * beta_row[term_id])
        .sum::<f64>()
        + 1e-100
}

/// `exp(E[log x])` for `x ~ Dirichlet(params)`.
fn exp_dirichlet_expectation(params: &[f64]) -> Vec<f64> {
    let total = digamma(params.iter().sum());
    params.iter().map(|p| (digamma(*p) - total).exp()).collect()
}

fn exp_dirichlet_expectation_rows(rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
    rows.iter().map(|row| exp_dirichlet_expectation(row)).collect()
}

/// Digamma function via recurrence and asymptotic expansion. Valid for x > 0.
pub(crate) fn digamma(mut x: f64) -> f64 {
    let mut result = 0.0;
    while x < 6.0 {
        result -= 1.0 / x;
        x += 1.0;
    }
    let f = 1.0 / (x * x);
    result + x.ln()
        - 0.5 / x
        - f * (1.0 / 12.0 - f * (1.0 / 120.0 - f * (1.0 / 252.0 - f * (1.0 / 240.0 - f / 132.0))))
}
