use jieba_rs::Jieba;
use pebble_core::config::rd::RD;
use pebble_core::errors::CoreError;
use pebble_core::service::search_service::FullTextSearch;
use std::sync::Arc;

async fn setup(key_prefix: &str) -> FullTextSearch {
    let rd = Arc::new(RD::new("redis://127.0.0.1").await.unwrap());
    let tokenizer = Arc::new(Jieba::new());
    let fts = FullTextSearch::new(rd, tokenizer, key_prefix.to_string());
    fts.clear_all().await.unwrap();
    fts
}

#[tokio::test]
async fn intersection_search_requires_every_token() {
    let search = setup("test:e2e:intersection:").await;

    search.index(1, "hello world").await.unwrap();
    search.index(2, "hello rust").await.unwrap();
    search.index(3, "world of rust programming").await.unwrap();

    let (tokens, results) = search.search("hello world", false, 10).await.unwrap();
    assert_eq!(tokens, vec!["hello", "world"]);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].0, 1);

    search.clear_all().await.unwrap();
}

#[tokio::test]
async fn partial_search_unions_candidate_docs() {
    let search = setup("test:e2e:partial:").await;

    search.index(1, "rust programming").await.unwrap();
    search.index(2, "python programming").await.unwrap();
    search.index(3, "go language").await.unwrap();

    let (_, results) = search.search("rust python", true, 10).await.unwrap();
    let ids: Vec<i64> = results.iter().map(|(id, _)| *id).collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&1));
    assert!(ids.contains(&2));

    search.clear_all().await.unwrap();
}

#[tokio::test]
async fn shorter_document_outranks_longer_one_for_same_terms() {
    let search = setup("test:e2e:ranking:").await;

    search.index(1, "rust programming").await.unwrap();
    search.index(2, "rust programming complete tutorial guide").await.unwrap();

    let (_, results) = search.search("rust programming", false, 10).await.unwrap();
    assert_eq!(results[0].0, 1);

    search.clear_all().await.unwrap();
}

#[tokio::test]
async fn reindex_replaces_old_content() {
    let search = setup("test:e2e:reindex:").await;

    search.index(1, "initial content").await.unwrap();
    search.reindex(1, "updated content").await.unwrap();

    let (_, old_results) = search.search("initial", false, 10).await.unwrap();
    assert!(old_results.is_empty());

    let (_, new_results) = search.search("updated", false, 10).await.unwrap();
    assert_eq!(new_results.len(), 1);

    search.clear_all().await.unwrap();
}

#[tokio::test]
async fn deindex_twice_errors_the_second_time() {
    let search = setup("test:e2e:deindex-twice:").await;

    search.index(1, "test document").await.unwrap();
    search.deindex(1).await.unwrap();

    let err = search.deindex(1).await.unwrap_err();
    assert!(matches!(err, CoreError::InvalidInput(_)));
}

#[tokio::test]
async fn cjk_and_latin_tokens_are_both_searchable() {
    let search = setup("test:e2e:cjk:").await;

    search.index(1, "rust编程语言教程").await.unwrap();
    search.index(2, "python开发指南").await.unwrap();

    let (_, results) = search.search("编程", false, 10).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].0, 1);

    search.clear_all().await.unwrap();
}

#[tokio::test]
async fn result_limit_truncates_after_ranking() {
    let search = setup("test:e2e:limit:").await;

    for i in 1..=5 {
        search.index(i, "test document").await.unwrap();
    }

    let (_, results) = search.search("test", false, 3).await.unwrap();
    assert_eq!(results.len(), 3);

    search.clear_all().await.unwrap();
}

#[tokio::test]
async fn html_and_punctuation_are_stripped_before_matching() {
    let search = setup("test:e2e:html:").await;

    search.index(1, "<p>Hello World</p><div>Rust</div>").await.unwrap();

    let (_, results) = search.search("hello world rust", false, 10).await.unwrap();
    assert_eq!(results.len(), 1);

    search.clear_all().await.unwrap();
}
