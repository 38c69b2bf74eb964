use crate::config::rd::RD;
use crate::errors::{CoreError, CoreResult};
use crate::util::common::count_frequencies;
use jieba_rs::Jieba;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

lazy_static! {
    static ref PUNCTUATION: Regex =
        Regex::new(r"\p{P}").expect("Failed to compile punctuation regex");
    static ref HTML_TAG: Regex = Regex::new(r"<[^>]*>").expect("Failed to compile HTML tag regex");
    static ref STOP_WORDS: HashSet<&'static str> = vec![
        "a", "an", "and", "are", "as", "at", "be", "by", "can", "for", "from", "have", "if", "in",
        "is", "it", "may", "not", "of", "on", "or", "tbd", "that", "the", "this", "to", "us", "we",
        "when", "will", "with", "yet", "you", "your", "的", "了", "和", "着", "与"
    ]
    .into_iter()
    .collect();
}

/// A pluggable segmenter. `cut` does the language-specific word-splitting;
/// `analyze` is the full pipeline (HTML strip, punctuation strip, segment,
/// case-fold, stop-word filter) and is the same for every implementation.
pub trait Tokenizer: Send + Sync {
    fn cut<'a>(&self, text: &'a str) -> Vec<&'a str>;

    fn analyze(&self, text: &str) -> Vec<String> {
        let text = HTML_TAG.replace_all(text, " ");
        let text = PUNCTUATION.replace_all(&text, " ");

        self.cut(&text)
            .into_iter()
            .map(str::to_lowercase)
            .filter(|token| {
                let token = token.trim();
                !token.is_empty() && !STOP_WORDS.contains(token)
            })
            .map(String::from)
            .collect()
    }
}

impl Tokenizer for Jieba {
    fn cut<'a>(&self, text: &'a str) -> Vec<&'a str> {
        self.cut_for_search(text, false)
    }
}

/// `{token: count, ...}`. A newtype so the JSON payload round-trips as a
/// bare object; unknown/extra keys on read are simply extra map entries and
/// are never rejected.
#[derive(Debug, Serialize, Deserialize)]
struct TokenFrequency(HashMap<String, usize>);

impl TokenFrequency {
    fn total(&self) -> usize {
        self.0.values().sum()
    }
}

pub struct FullTextSearch {
    rd: Arc<RD>,
    tokenizer: Arc<dyn Tokenizer>,
    key_prefix: String,
}

impl FullTextSearch {
    pub fn new(rd: Arc<RD>, tokenizer: Arc<dyn Tokenizer>, key_prefix: String) -> Self {
        Self {
            rd,
            tokenizer,
            key_prefix,
        }
    }

    pub async fn indexed(&self, id: i64) -> CoreResult<bool> {
        Ok(self.rd.exists(self.doc_tokens_key(id)).await?)
    }

    pub async fn doc_count(&self) -> CoreResult<i64> {
        let raw: Option<String> = self.rd.get(self.doc_count_key()).await?;
        match raw {
            None => Ok(0),
            Some(raw) => raw.parse::<i64>().map_err(|e| {
                CoreError::DataCorruption(format!(
                    "doc count `{}` is not a valid integer: {}",
                    raw, e
                ))
            }),
        }
    }

    /// Loads and decodes the stored `TermFrequency` for `id`, turning a
    /// malformed payload into `CoreError::DataCorruption` rather than
    /// propagating the raw JSON error.
    async fn load_term_frequency(&self, id: i64) -> CoreResult<Option<TokenFrequency>> {
        let raw: Option<String> = self.rd.get(self.doc_tokens_key(id)).await?;
        match raw {
            None => Ok(None),
            Some(json) => serde_json::from_str::<TokenFrequency>(&json)
                .map(Some)
                .map_err(|e| {
                    CoreError::DataCorruption(format!(
                        "token frequency for doc `{}` is not valid JSON: {}",
                        id, e
                    ))
                }),
        }
    }

    pub async fn index(&self, id: i64, text: &str) -> CoreResult<()> {
        if self.indexed(id).await? {
            // a recursive async fn call must introduce indirection,
            // such as Box::pin to avoid an infinitely sized future
            return Box::pin(self.reindex(id, text)).await;
        }

        let tokens = self.tokenizer.analyze(text);
        if tokens.is_empty() {
            return Ok(());
        }

        let token_frequency = count_frequencies(&tokens);
        let freq_json = serde_json::to_string(&TokenFrequency(token_frequency))
            .map_err(|e| CoreError::DataCorruption(format!("failed to encode token frequency: {e}")))?;

        let token_set = tokens.into_iter().collect::<HashSet<String>>();

        let _: () = self
            .rd
            .pipeline(|pipe| {
                pipe.set(self.doc_tokens_key(id), freq_json);
                pipe.incr(self.doc_count_key(), 1);
                for token in token_set.iter() {
                    pipe.sadd(self.token_docs_key(token), id);
                }
            })
            .await?;

        Ok(())
    }

    pub async fn reindex(&self, id: i64, text: &str) -> CoreResult<()> {
        if !self.indexed(id).await? {
            return Box::pin(self.index(id, text)).await;
        }

        let new_tokens = self.tokenizer.analyze(text);
        if new_tokens.is_empty() {
            return self.deindex(id).await;
        }

        let old_freq = self.load_term_frequency(id).await?.ok_or_else(|| {
            CoreError::DataCorruption(format!(
                "doc `{}` is indexed but has no token frequency",
                id
            ))
        })?;

        let new_freq = count_frequencies(&new_tokens);
        let freq_json = serde_json::to_string(&TokenFrequency(new_freq))
            .map_err(|e| CoreError::DataCorruption(format!("failed to encode token frequency: {e}")))?;

        let old_token_set = old_freq.0.keys().collect::<HashSet<_>>();
        let new_token_set = new_tokens.iter().collect::<HashSet<_>>();
        let tokens_to_remove = old_token_set.difference(&new_token_set).collect::<Vec<_>>();
        let tokens_to_add = new_token_set.difference(&old_token_set).collect::<Vec<_>>();

        let _: () = self
            .rd
            .pipeline(|pipe| {
                pipe.set(self.doc_tokens_key(id), freq_json);
                for token in tokens_to_remove {
                    pipe.srem(self.token_docs_key(token), id);
                }
                for token in tokens_to_add {
                    pipe.sadd(self.token_docs_key(token), id);
                }
            })
            .await?;

        Ok(())
    }

    pub async fn deindex(&self, id: i64) -> CoreResult<()> {
        let token_freq = self
            .load_term_frequency(id)
            .await?
            .ok_or_else(|| CoreError::InvalidInput(format!("doc `{}` is not indexed", id)))?;

        let token_set = token_freq.0.keys().collect::<HashSet<_>>();

        let _: () = self
            .rd
            .pipeline(|pipe| {
                pipe.del(self.doc_tokens_key(id));
                pipe.decr(self.doc_count_key(), 1);
                for token in token_set.iter() {
                    pipe.srem(self.token_docs_key(token), id);
                }
            })
            .await?;

        Ok(())
    }

    pub async fn search(
        &self,
        query: &str,
        partial: bool,
        limit: usize,
    ) -> CoreResult<(Vec<String>, Vec<(i64, f64)>)> {
        let tokens = self.tokenizer.analyze(query);
        if tokens.is_empty() {
            return Ok((tokens, vec![]));
        }

        let doc_sets: Vec<HashSet<String>> = self
            .rd
            .pipeline(|pipe| {
                for token in tokens.iter() {
                    pipe.smembers(self.token_docs_key(token));
                }
            })
            .await?;

        let ids: HashSet<i64> = if partial {
            doc_sets
                .into_iter()
                .flatten()
                .filter_map(|id| id.parse().ok())
                .collect()
        } else {
            doc_sets
                .into_iter()
                .reduce(|acc, set| acc.intersection(&set).cloned().collect())
                .unwrap_or_default()
                .into_iter()
                .filter_map(|id| id.parse().ok())
                .collect()
        };

        if ids.is_empty() {
            return Ok((tokens, vec![]));
        }

        // Sort ascending up front so the final stable sort-by-score breaks
        // ties in id-ascending order, as required.
        let mut ordered_ids: Vec<i64> = ids.into_iter().collect();
        ordered_ids.sort_unstable();

        let mut ranked_results = self.rank(&tokens, &ordered_ids).await?;
        ranked_results.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());

        if limit > 0 && ranked_results.len() > limit {
            ranked_results.truncate(limit);
        }

        Ok((tokens, ranked_results))
    }

    async fn rank(&self, tokens: &[String], ids: &[i64]) -> CoreResult<Vec<(i64, f64)>> {
        let mut results = Vec::with_capacity(ids.len());

        let total_docs = self.doc_count().await? as f64;

        let keys: Vec<String> = ids.iter().map(|id| self.doc_tokens_key(*id)).collect();
        let raw_json: Vec<Option<String>> = self.rd.mget(keys).await?;

        let doc_frequencies: Vec<f64> = self
            .rd
            .pipeline(|pipe| {
                for token in tokens.iter() {
                    pipe.scard(self.token_docs_key(token));
                }
            })
            .await?;

        for (&id, raw) in ids.iter().zip(raw_json.iter()) {
            let raw = raw.as_ref().ok_or_else(|| {
                CoreError::DataCorruption(format!(
                    "doc `{}` was a search candidate but has no token frequency",
                    id
                ))
            })?;
            let token_freq: TokenFrequency = serde_json::from_str(raw).map_err(|e| {
                CoreError::DataCorruption(format!(
                    "token frequency for doc `{}` is not valid JSON: {}",
                    id, e
                ))
            })?;

            let mut score = 0.0;
            let mut matching_terms = 0;

            for (token, df) in tokens.iter().zip(doc_frequencies.iter()) {
                let tf = *token_freq.0.get(token).unwrap_or(&0) as f64;
                if tf > 0.0 {
                    matching_terms += 1;
                }

                // 1 + log10(tf) dampens the weight of high-frequency terms.
                let normalized_tf = if tf > 0.0 { 1.0 + tf.log10() } else { 0.0 };

                let idf = if *df > 0.0 {
                    (total_docs / df).max(1.0).log10()
                } else {
                    0.0
                };

                score += normalized_tf * idf;
            }

            // Length normalization counteracts the bias toward long documents.
            let total_terms = token_freq.total() as f64;
            if total_terms > 0.0 {
                score /= total_terms.sqrt();
            }

            // Coverage boost: full-coverage candidates score 2x.
            let coverage_ratio = matching_terms as f64 / tokens.len() as f64;
            score *= if coverage_ratio > 0.999 {
                2.0
            } else {
                coverage_ratio
            };

            results.push((id, score));
        }

        Ok(results)
    }

    fn doc_count_key(&self) -> String {
        format!("{}doc:count", self.key_prefix)
    }

    fn doc_tokens_key(&self, id: i64) -> String {
        format!("{}doc:{}:tokens", self.key_prefix, id)
    }

    fn token_docs_key(&self, token: &str) -> String {
        format!("{}token:{}:docs", self.key_prefix, token)
    }

    pub async fn clear_all(&self) -> CoreResult<()> {
        let prefixes = [
            format!("{}doc:", self.key_prefix),
            format!("{}token:", self.key_prefix),
        ];

        for prefix in prefixes.iter() {
            let keys: Vec<String> = self.rd.keys(format!("{}*", prefix)).await?;
            if !keys.is_empty() {
                self.rd.del(&keys).await?;
            }
        }

        Ok(())
    }
}
