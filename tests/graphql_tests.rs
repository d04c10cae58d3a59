//! GraphQL integration tests against a seeded in-memory database
//!
//! Seed data: five posts ("Hello relay" first, with two comments) and six
//! comments in total. Post connections sort by `id` descending by default.

use axum::Router;
use pretty_assertions::assert_eq;
use relaykit::config::Config;
use relaykit::db::Database;
use relaykit::testing::{GraphqlTester, MutationCycle};
use relaykit::{AppState, blog, build_app};
use serde_json::json;

async fn app() -> Router {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    blog::migrate(db.pool()).await.unwrap();
    blog::seed(db.pool()).await.unwrap();
    build_app(AppState::new(Config::default(), db))
}

async fn tester() -> GraphqlTester {
    GraphqlTester::new(app().await, "/graphql")
}

// ============================================================================
// Connections
// ============================================================================

#[tokio::test]
async fn test_first_page_of_one() {
    let gql = tester().await;
    let data = gql
        .query_ok(
            "{ postConnection(first: 1, after: 0) {
                totalCount
                edges { cursor node { id title } }
                pageInfo { hasNextPage startCursor endCursor }
            } }",
            None,
        )
        .await;

    let conn = &data["postConnection"];
    assert_eq!(conn["totalCount"], json!(5));
    assert_eq!(conn["edges"].as_array().unwrap().len(), 1);
    assert_eq!(conn["edges"][0]["cursor"], json!(0));
    assert_eq!(conn["edges"][0]["node"]["title"], json!("Mutations"));
    assert_eq!(
        conn["pageInfo"],
        json!({"hasNextPage": true, "startCursor": 0, "endCursor": 1})
    );
}

#[tokio::test]
async fn test_last_page_has_no_next() {
    let gql = tester().await;
    let data = gql
        .query_ok(
            "{ postConnection(first: 2, after: 3) {
                edges { cursor node { title } }
                pageInfo { hasNextPage startCursor endCursor }
            } }",
            None,
        )
        .await;

    let conn = &data["postConnection"];
    assert_eq!(
        conn["edges"],
        json!([
            {"cursor": 3, "node": {"title": "Filtering connections"}},
            {"cursor": 4, "node": {"title": "Hello relay"}},
        ])
    );
    assert_eq!(conn["pageInfo"]["hasNextPage"], json!(false));
}

#[tokio::test]
async fn test_keyword_without_match_is_empty() {
    let gql = tester().await;
    let data = gql
        .query_ok(
            r#"{ postConnection(keyword: "Notexists") {
                totalCount
                edges { node { id } }
                pageInfo { hasNextPage }
            } }"#,
            None,
        )
        .await;

    let conn = &data["postConnection"];
    assert_eq!(conn["totalCount"], json!(0));
    assert_eq!(conn["edges"], json!([]));
    assert_eq!(conn["pageInfo"]["hasNextPage"], json!(false));
}

#[tokio::test]
async fn test_keyword_matches_content() {
    let gql = tester().await;
    let data = gql
        .query_ok(
            r#"{ postConnection(keyword: "leading dash") { edges { node { title } } } }"#,
            None,
        )
        .await;
    assert_eq!(
        data["postConnection"]["edges"],
        json!([{"node": {"title": "Sorting"}}])
    );
}

#[tokio::test]
async fn test_order_and_filter() {
    let gql = tester().await;
    let data = gql
        .query_ok(
            r#"{ postConnection(orderBy: "title", first: 2) { edges { node { title } } } }"#,
            None,
        )
        .await;
    assert_eq!(
        data["postConnection"]["edges"],
        json!([
            {"node": {"title": "Filtering connections"}},
            {"node": {"title": "Hello relay"}},
        ])
    );

    let data = gql
        .query_ok(
            r#"{ postConnection(filterBy: {title: "Search"}) { totalCount } }"#,
            None,
        )
        .await;
    assert_eq!(data["postConnection"]["totalCount"], json!(1));
}

#[tokio::test]
async fn test_filter_on_unlisted_column_is_ignored() {
    let gql = tester().await;
    let data = gql
        .query_ok(
            r#"{ postConnection(filterBy: {content: "x", title: null}) { totalCount } }"#,
            None,
        )
        .await;
    assert_eq!(data["postConnection"]["totalCount"], json!(5));
}

#[tokio::test]
async fn test_negative_first_is_rejected() {
    let gql = tester().await;
    let res = gql
        .query("{ postConnection(first: -1) { totalCount } }", None)
        .await;
    assert_eq!(res.error_code(), Some("INVALID_ARGUMENT"));
}

#[tokio::test]
async fn test_offset_plus_first_overflow_is_rejected() {
    let gql = tester().await;
    let res = gql
        .query(
            "{ postConnection(first: 10, after: 9223372036854775807) { totalCount } }",
            None,
        )
        .await;
    assert_eq!(res.error_code(), Some("INVALID_ARGUMENT"));

    let res = gql
        .query(
            "{ search(type: POST, first: 1, after: 9223372036854775807) { totalCount } }",
            None,
        )
        .await;
    assert_eq!(res.error_code(), Some("INVALID_ARGUMENT"));
}

// ============================================================================
// Relations
// ============================================================================

#[tokio::test]
async fn test_nested_comments() {
    let gql = tester().await;
    let data = gql
        .query_ok(
            "{ posts { title comments { title post { title } } } }",
            None,
        )
        .await;

    let posts = data["posts"].as_array().unwrap();
    assert_eq!(posts.len(), 5);
    assert_eq!(posts[0]["title"], json!("Hello relay"));
    assert_eq!(
        posts[0]["comments"],
        json!([
            {"title": "First!", "post": {"title": "Hello relay"}},
            {"title": "Nice write-up", "post": {"title": "Hello relay"}},
        ])
    );
    assert_eq!(posts[2]["comments"], json!([]));

    let total: usize = posts
        .iter()
        .map(|p| p["comments"].as_array().unwrap().len())
        .sum();
    assert_eq!(total, 6);
}

#[tokio::test]
async fn test_comment_connection_is_scoped_to_post() {
    let gql = tester().await;
    let data = gql
        .query_ok(
            "{ post(id: 4) { commentConnection(first: 1) {
                totalCount
                edges { node { title postId } }
                pageInfo { hasNextPage }
            } } }",
            None,
        )
        .await;

    let conn = &data["post"]["commentConnection"];
    assert_eq!(conn["totalCount"], json!(2));
    assert_eq!(conn["edges"][0]["node"]["postId"], json!(4));
    assert_eq!(conn["pageInfo"]["hasNextPage"], json!(true));
}

// ============================================================================
// Search
// ============================================================================

#[tokio::test]
async fn test_search_posts() {
    let gql = tester().await;
    let data = gql
        .query_ok(
            "{ search(type: POST, first: 2) {
                totalCount
                edges { cursor node { __typename ... on Post { title } } }
                pageInfo { hasNextPage }
            } }",
            None,
        )
        .await;

    let conn = &data["search"];
    assert_eq!(conn["totalCount"], json!(5));
    assert_eq!(
        conn["edges"],
        json!([
            {"cursor": 0, "node": {"__typename": "Post", "title": "Hello relay"}},
            {"cursor": 1, "node": {"__typename": "Post", "title": "Filtering connections"}},
        ])
    );
    assert_eq!(conn["pageInfo"]["hasNextPage"], json!(true));
}

#[tokio::test]
async fn test_search_comments() {
    let gql = tester().await;
    let data = gql
        .query_ok(
            "{ search(type: COMMENT, first: 10) {
                totalCount
                edges { node { __typename ... on Comment { title } } }
            } }",
            None,
        )
        .await;

    let conn = &data["search"];
    assert_eq!(conn["totalCount"], json!(6));
    for edge in conn["edges"].as_array().unwrap() {
        assert_eq!(edge["node"]["__typename"], json!("Comment"));
    }
}

#[tokio::test]
async fn test_fetch_by_type() {
    let gql = tester().await;
    let data = gql
        .query_ok(
            "{ fetch(id: 1, type: COMMENT) { __typename ... on Comment { title postId } } }",
            None,
        )
        .await;
    assert_eq!(
        data["fetch"],
        json!({"__typename": "Comment", "title": "First!", "postId": 1})
    );

    let res = gql
        .query("{ fetch(id: 999, type: POST) { __typename } }", None)
        .await;
    assert_eq!(res.error_code(), Some("NOT_FOUND"));
}

// ============================================================================
// Mutations
// ============================================================================

#[tokio::test]
async fn test_post_mutation_cycle() {
    let gql = tester().await;
    gql.mutation(MutationCycle {
        name: "Post".into(),
        create: json!({"title": "Draft", "content": "words"}),
        update: json!({"title": "Published"}),
    })
    .await;
}

#[tokio::test]
async fn test_comment_mutation_cycle() {
    let gql = tester().await;
    gql.mutation(MutationCycle {
        name: "Comment".into(),
        create: json!({"post_id": 2, "title": "Agreed"}),
        update: json!({"content": "edited"}),
    })
    .await;
}

#[tokio::test]
async fn test_update_missing_row() {
    let gql = tester().await;
    let res = gql
        .query(
            r#"mutation { updatePost(id: 999, attributes: {title: "x"}) { id } }"#,
            None,
        )
        .await;

    assert_eq!(res.error_code(), Some("NOT_FOUND"));
    assert!(res.data.is_null());
}

#[tokio::test]
async fn test_create_with_unknown_attribute() {
    let gql = tester().await;
    let res = gql
        .query(
            r#"mutation { createPost(attributes: {title: "x", rating: 5}) { id } }"#,
            None,
        )
        .await;
    assert_eq!(res.error_code(), Some("VALIDATION_ERROR"));
}

#[tokio::test]
async fn test_destroy_cascades_to_comments() {
    let gql = tester().await;
    let data = gql
        .query_ok("mutation { destroyPost(id: 1) }", None)
        .await;
    assert_eq!(data["destroyPost"], json!(true));

    let data = gql.query_ok("{ post(id: 1) { id } }", None).await;
    assert!(data["post"].is_null());

    let data = gql
        .query_ok("{ commentConnection { totalCount } }", None)
        .await;
    assert_eq!(data["commentConnection"]["totalCount"], json!(4));

    let res = gql.query("mutation { destroyPost(id: 1) }", None).await;
    assert_eq!(res.error_code(), Some("NOT_FOUND"));
}
