use novel_navigator::cover::{placeholder_seed, CoverResolver, CoverSource, OpenLibraryClient};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn resolver(server: &MockServer) -> CoverResolver {
    CoverResolver::new(
        Arc::new(OpenLibraryClient::new(&server.uri(), "http://covers.test").unwrap()),
        "http://placeholder.test",
    )
}

#[tokio::test]
async fn test_cover_found_with_title_and_author() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search.json"))
        .and(query_param("title", "Dune"))
        .and(query_param("author", "Frank Herbert"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "numFound": 2,
            "docs": [{ "title": "Dune" }, { "title": "Dune", "cover_i": 12345 }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let cover = resolver(&server).resolve("Dune", "Frank Herbert").await;
    assert_eq!(cover.url, "http://covers.test/b/id/12345-L.jpg");
    assert_eq!(cover.source, CoverSource::TitleAndAuthor);
}

#[tokio::test]
async fn test_title_only_search_when_author_search_finds_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search.json"))
        .and(query_param("author", "F. Herbert"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "docs": [] })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search.json"))
        .and(query_param("title", "Dune"))
        .and(query_param_is_missing("author"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "docs": [{ "cover_i": 777 }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let cover = resolver(&server).resolve("Dune", "F. Herbert").await;
    assert_eq!(cover.url, "http://covers.test/b/id/777-L.jpg");
    assert_eq!(cover.source, CoverSource::TitleOnly);
}

#[tokio::test]
async fn test_failed_searches_fall_back_to_placeholder() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search.json"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let cover = resolver(&server).resolve("Dune", "Frank Herbert").await;
    assert!(cover.is_placeholder());
    assert_eq!(
        cover.url,
        format!(
            "http://placeholder.test/seed/{}/400/600",
            placeholder_seed("Dune", "Frank Herbert")
        )
    );
    assert_eq!(cover.url, "http://placeholder.test/seed/855243676/400/600");
}

#[tokio::test]
async fn test_unparsable_body_counts_as_no_result() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>busy</html>"))
        .mount(&server)
        .await;

    let cover = resolver(&server).resolve("Emma", "Jane Austen").await;
    assert_eq!(cover.source, CoverSource::Placeholder);
}

#[tokio::test]
async fn test_unreachable_lookup_still_resolves() {
    let resolver = CoverResolver::new(
        Arc::new(OpenLibraryClient::new("http://127.0.0.1:1", "http://covers.test").unwrap()),
        "http://placeholder.test",
    );

    let cover = resolver.resolve("", "").await;
    assert_eq!(cover.url, "http://placeholder.test/seed/0/400/600");
}

#[tokio::test]
async fn test_zero_cover_id_is_skipped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "docs": [{ "cover_i": 0 }, { "cover_i": 42 }]
        })))
        .mount(&server)
        .await;

    let cover = resolver(&server).resolve("Emma", "Jane Austen").await;
    assert_eq!(cover.url, "http://covers.test/b/id/42-L.jpg");
    assert_eq!(cover.source, CoverSource::TitleAndAuthor);
}

#[tokio::test]
async fn test_stalled_search_falls_back_to_placeholder() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search.json"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "docs": [{ "cover_i": 1 }] }))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let lookup = OpenLibraryClient::with_timeout(
        &server.uri(),
        "http://covers.test",
        Duration::from_millis(100),
    )
    .unwrap();
    let resolver = CoverResolver::new(Arc::new(lookup), "http://placeholder.test");

    let cover = tokio::time::timeout(Duration::from_secs(3), resolver.resolve("Dune", "Frank Herbert"))
        .await
        .expect("resolve should give up on a stalled search");
    assert!(cover.is_placeholder());
    assert_eq!(cover.url, "http://placeholder.test/seed/855243676/400/600");
}
