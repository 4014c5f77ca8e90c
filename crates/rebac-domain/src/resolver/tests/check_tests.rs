//! Check resolver test suite.

use std::time::Duration;

use super::mocks::{create_resolver, create_resolver_with, MockTupleReader, STORE};
use crate::error::DomainError;
use crate::resolver::{CancellationToken, CheckRequest, ContextualTuple, ResolverConfig};

const DOCUMENT_MODEL: &str = r#"
type user
type group
  relations
    define member as self
type folder
  relations
    define viewer as self
type document
  relations
    define parent as self
    define owner as self
    define editor as self or owner
    define viewer as self or editor or viewer from parent
    define blocked as self
    define can_view as viewer but not blocked
    define auditor as editor and viewer
"#;

fn check(user: &str, relation: &str, object: &str) -> CheckRequest {
    CheckRequest::new(STORE, user, relation, object)
}

// ========== Section 1: Direct Tuple Resolution ==========

#[tokio::test]
async fn test_check_returns_true_for_direct_tuple_assignment() {
    let (resolver, _) = create_resolver(DOCUMENT_MODEL, &["document:1#viewer@user:alice"]).await;

    let result = resolver
        .check(&check("user:alice", "viewer", "document:1"))
        .await
        .unwrap();
    assert!(result.allowed);
}

#[tokio::test]
async fn test_check_returns_false_when_no_tuple_exists() {
    let (resolver, _) = create_resolver(DOCUMENT_MODEL, &["document:1#viewer@user:alice"]).await;

    let result = resolver
        .check(&check("user:bob", "viewer", "document:1"))
        .await
        .unwrap();
    assert!(!result.allowed);
}

#[tokio::test]
async fn test_check_follows_userset_tuples() {
    let (resolver, _) = create_resolver(
        DOCUMENT_MODEL,
        &[
            "document:1#viewer@group:eng#member",
            "group:eng#member@user:alice",
        ],
    )
    .await;

    assert!(
        resolver
            .check(&check("user:alice", "viewer", "document:1"))
            .await
            .unwrap()
            .allowed
    );
    assert!(
        !resolver
            .check(&check("user:bob", "viewer", "document:1"))
            .await
            .unwrap()
            .allowed
    );
}

#[tokio::test]
async fn test_check_userset_as_requesting_user() {
    let (resolver, _) =
        create_resolver(DOCUMENT_MODEL, &["document:1#viewer@group:eng#member"]).await;

    let result = resolver
        .check(&check("group:eng#member", "viewer", "document:1"))
        .await
        .unwrap();
    assert!(result.allowed);
}

#[tokio::test]
async fn test_check_wildcard_tuple_grants_every_user_of_type() {
    let (resolver, _) = create_resolver(DOCUMENT_MODEL, &["document:1#viewer@user:*"]).await;

    assert!(
        resolver
            .check(&check("user:anyone", "viewer", "document:1"))
            .await
            .unwrap()
            .allowed
    );
    // A wildcard is never a valid requesting user.
    assert!(
        !resolver
            .check(&check("user:*", "viewer", "document:1"))
            .await
            .unwrap()
            .allowed
    );
}

// ========== Section 2: Computed Relations ==========

#[tokio::test]
async fn test_check_union_with_computed_userset() {
    let (resolver, _) = create_resolver(DOCUMENT_MODEL, &["document:1#editor@user:alice"]).await;

    assert!(
        resolver
            .check(&check("user:alice", "viewer", "document:1"))
            .await
            .unwrap()
            .allowed
    );
    assert!(
        !resolver
            .check(&check("user:bob", "viewer", "document:1"))
            .await
            .unwrap()
            .allowed
    );
}

#[tokio::test]
async fn test_check_tuple_to_userset_through_parent() {
    let (resolver, _) = create_resolver(
        DOCUMENT_MODEL,
        &["document:1#parent@folder:A", "folder:A#viewer@user:alice"],
    )
    .await;

    assert!(
        resolver
            .check(&check("user:alice", "viewer", "document:1"))
            .await
            .unwrap()
            .allowed
    );
}

#[tokio::test]
async fn test_check_tuple_to_userset_only_model() {
    let model = r#"
type user
type folder
  relations
    define viewer as self
type document
  relations
    define parent as self
    define viewer as viewer from parent
"#;
    let (resolver, _) = create_resolver(
        model,
        &["document:1#parent@folder:A", "folder:A#viewer@user:alice"],
    )
    .await;

    assert!(
        resolver
            .check(&check("user:alice", "viewer", "document:1"))
            .await
            .unwrap()
            .allowed
    );
    assert!(
        !resolver
            .check(&check("user:bob", "viewer", "document:1"))
            .await
            .unwrap()
            .allowed
    );
}

#[tokio::test]
async fn test_check_tuple_to_userset_skips_parents_without_relation() {
    // user:bob has no "viewer" relation in the model, so that parent is ignored.
    let (resolver, _) = create_resolver(
        DOCUMENT_MODEL,
        &[
            "document:1#parent@user:bob",
            "document:1#parent@folder:A",
            "folder:A#viewer@user:alice",
        ],
    )
    .await;

    assert!(
        resolver
            .check(&check("user:alice", "viewer", "document:1"))
            .await
            .unwrap()
            .allowed
    );
}

#[tokio::test]
async fn test_check_nested_parent_chain() {
    let model = r#"
type user
type folder
  relations
    define parent as self
    define viewer as self or viewer from parent
"#;
    let (resolver, _) = create_resolver(
        model,
        &[
            "folder:c#parent@folder:b",
            "folder:b#parent@folder:a",
            "folder:a#viewer@user:alice",
        ],
    )
    .await;

    assert!(
        resolver
            .check(&check("user:alice", "viewer", "folder:c"))
            .await
            .unwrap()
            .allowed
    );
}

// ========== Section 3: Intersection and Difference ==========

#[tokio::test]
async fn test_check_intersection_requires_all_children() {
    let (resolver, _) = create_resolver(
        DOCUMENT_MODEL,
        &["document:1#editor@user:alice", "document:1#editor@user:bob"],
    )
    .await;

    // editor implies viewer (union), so both children hold.
    assert!(
        resolver
            .check(&check("user:alice", "auditor", "document:1"))
            .await
            .unwrap()
            .allowed
    );

    let (resolver, _) = create_resolver(DOCUMENT_MODEL, &["document:1#viewer@user:alice"]).await;
    assert!(
        !resolver
            .check(&check("user:alice", "auditor", "document:1"))
            .await
            .unwrap()
            .allowed
    );
}

#[tokio::test]
async fn test_check_difference_excludes_subtract() {
    let (resolver, _) = create_resolver(
        DOCUMENT_MODEL,
        &[
            "document:1#viewer@user:alice",
            "document:1#viewer@user:bob",
            "document:1#blocked@user:bob",
        ],
    )
    .await;

    assert!(
        resolver
            .check(&check("user:alice", "can_view", "document:1"))
            .await
            .unwrap()
            .allowed
    );
    assert!(
        !resolver
            .check(&check("user:bob", "can_view", "document:1"))
            .await
            .unwrap()
            .allowed
    );
}

#[tokio::test]
async fn test_check_difference_false_base_ignores_failing_subtract() {
    let (resolver, reader) = create_resolver(DOCUMENT_MODEL, &[]).await;
    reader.fail_reads_of("document:1", "blocked").await;

    let result = resolver
        .check(&check("user:alice", "can_view", "document:1"))
        .await
        .unwrap();
    assert!(!result.allowed);
}

#[tokio::test]
async fn test_check_difference_true_base_with_failing_subtract_is_error() {
    let (resolver, reader) =
        create_resolver(DOCUMENT_MODEL, &["document:1#viewer@user:alice"]).await;
    reader.fail_reads_of("document:1", "blocked").await;

    let err = resolver
        .check(&check("user:alice", "can_view", "document:1"))
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::StoreUnavailable { .. }));
}

// ========== Section 4: Contextual Tuples ==========

#[tokio::test]
async fn test_contextual_tuples_apply_to_one_call_only() {
    let (resolver, _) = create_resolver(DOCUMENT_MODEL, &[]).await;

    let with_context = check("user:alice", "viewer", "document:1").with_contextual_tuples(vec![
        ContextualTuple::new("user:alice", "editor", "document:1"),
    ]);
    assert!(resolver.check(&with_context).await.unwrap().allowed);

    let without_context = check("user:alice", "viewer", "document:1");
    assert!(!resolver.check(&without_context).await.unwrap().allowed);
}

#[tokio::test]
async fn test_contextual_tuples_feed_tuple_to_userset() {
    let (resolver, _) = create_resolver(DOCUMENT_MODEL, &["folder:A#viewer@user:alice"]).await;

    let request = check("user:alice", "viewer", "document:1").with_contextual_tuples(vec![
        ContextualTuple::new("folder:A", "parent", "document:1"),
    ]);
    assert!(resolver.check(&request).await.unwrap().allowed);
}

#[tokio::test]
async fn test_contextual_tuples_are_validated() {
    let (resolver, _) = create_resolver(DOCUMENT_MODEL, &[]).await;

    let malformed = check("user:alice", "viewer", "document:1")
        .with_contextual_tuples(vec![ContextualTuple::new("alice", "viewer", "document:1")]);
    assert!(matches!(
        resolver.check(&malformed).await,
        Err(DomainError::InvalidContextualTuple { .. })
    ));

    let unknown_relation = check("user:alice", "viewer", "document:1")
        .with_contextual_tuples(vec![ContextualTuple::new("user:alice", "reader", "document:1")]);
    assert!(matches!(
        resolver.check(&unknown_relation).await,
        Err(DomainError::InvalidContextualTuple { .. })
    ));
}

#[tokio::test]
async fn test_contextual_tuples_limit() {
    let (resolver, _) = create_resolver_with(
        DOCUMENT_MODEL,
        &[],
        MockTupleReader::new(),
        ResolverConfig::default().with_max_contextual_tuples(1),
    )
    .await;

    let request = check("user:alice", "viewer", "document:1").with_contextual_tuples(vec![
        ContextualTuple::new("user:alice", "viewer", "document:1"),
        ContextualTuple::new("user:bob", "viewer", "document:1"),
    ]);
    assert!(matches!(
        resolver.check(&request).await,
        Err(DomainError::InvalidContextualTuple { .. })
    ));
}

// ========== Section 5: Safety (depth, cycles, timeouts, cancellation) ==========

const CHAIN_MODEL: &str = r#"
type user
type document
  relations
    define r0 as r1
    define r1 as r2
    define r2 as r3
    define r3 as self
"#;

#[tokio::test]
async fn test_depth_limit_boundary_for_computed_chain() {
    let tuples = ["document:1#r3@user:alice"];

    let (resolver, _) = create_resolver_with(
        CHAIN_MODEL,
        &tuples,
        MockTupleReader::new(),
        ResolverConfig::default().with_max_depth(3),
    )
    .await;
    let result = resolver
        .check(&check("user:alice", "r0", "document:1"))
        .await
        .unwrap();
    assert!(result.allowed);
    assert_eq!(result.metadata.depth_reached, 3);

    let (resolver, _) = create_resolver_with(
        CHAIN_MODEL,
        &tuples,
        MockTupleReader::new(),
        ResolverConfig::default().with_max_depth(2),
    )
    .await;
    let err = resolver
        .check(&check("user:alice", "r0", "document:1"))
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::DepthLimitExceeded { max_depth: 2 }));
}

#[tokio::test]
async fn test_depth_exceeded_is_not_a_denial() {
    // Without a matching tuple the chain still needs its full depth.
    let (resolver, _) = create_resolver_with(
        CHAIN_MODEL,
        &[],
        MockTupleReader::new(),
        ResolverConfig::default().with_max_depth(1),
    )
    .await;
    assert!(matches!(
        resolver.check(&check("user:alice", "r0", "document:1")).await,
        Err(DomainError::DepthLimitExceeded { .. })
    ));
}

#[tokio::test]
async fn test_rewrite_cycle_resolves_to_false() {
    let model = r#"
type user
type document
  relations
    define a as b
    define b as a
"#;
    let (resolver, _) = create_resolver(model, &[]).await;

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        resolver.check(&check("user:alice", "a", "document:1")),
    )
    .await
    .expect("check must terminate");
    assert!(!result.unwrap().allowed);

    // Closing the cycle costs no budget, so even the smallest limit answers.
    for max_depth in [1, 2] {
        let (resolver, _) = create_resolver_with(
            model,
            &[],
            MockTupleReader::new(),
            ResolverConfig::default().with_max_depth(max_depth),
        )
        .await;
        let result = resolver
            .check(&check("user:alice", "a", "document:1"))
            .await;
        assert!(
            matches!(result, Ok(ref r) if !r.allowed),
            "max_depth {max_depth}: {result:?}"
        );
    }
}

#[tokio::test]
async fn test_data_cycle_at_minimum_depth_resolves_to_false() {
    let (resolver, _) = create_resolver_with(
        DOCUMENT_MODEL,
        &[
            "group:a#member@group:b#member",
            "group:b#member@group:a#member",
        ],
        MockTupleReader::new(),
        ResolverConfig::default().with_max_depth(1),
    )
    .await;

    let result = resolver
        .check(&check("user:alice", "member", "group:a"))
        .await
        .unwrap();
    assert!(!result.allowed);
    assert_eq!(result.metadata.depth_reached, 1);
}

#[tokio::test]
async fn test_data_induced_cycle_resolves_to_false() {
    let (resolver, _) = create_resolver(
        DOCUMENT_MODEL,
        &[
            "group:a#member@group:b#member",
            "group:b#member@group:a#member",
            "document:1#viewer@group:a#member",
        ],
    )
    .await;

    let result = resolver
        .check(&check("user:alice", "viewer", "document:1"))
        .await
        .unwrap();
    assert!(!result.allowed);
}

#[tokio::test]
async fn test_cycle_does_not_hide_other_branch() {
    let (resolver, _) = create_resolver(
        DOCUMENT_MODEL,
        &[
            "group:a#member@group:b#member",
            "group:b#member@group:a#member",
            "group:b#member@user:alice",
            "document:1#viewer@group:a#member",
        ],
    )
    .await;

    let result = resolver
        .check(&check("user:alice", "viewer", "document:1"))
        .await
        .unwrap();
    assert!(result.allowed);
}

#[tokio::test]
async fn test_check_times_out() {
    let (resolver, _) = create_resolver_with(
        DOCUMENT_MODEL,
        &[],
        MockTupleReader::new().with_delay(Duration::from_millis(200)),
        ResolverConfig::default().with_timeout(Duration::from_millis(20)),
    )
    .await;

    let err = resolver
        .check(&check("user:alice", "viewer", "document:1"))
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Timeout { duration_ms: 20 }));
}

#[tokio::test]
async fn test_check_cancelled_by_token() {
    let (resolver, _) = create_resolver_with(
        DOCUMENT_MODEL,
        &[],
        MockTupleReader::new().with_delay(Duration::from_millis(500)),
        ResolverConfig::default(),
    )
    .await;

    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        canceller.cancel();
    });

    let err = resolver
        .check_with_cancellation(&check("user:alice", "viewer", "document:1"), token)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Cancelled));
}

#[tokio::test]
async fn test_check_already_cancelled_token() {
    let (resolver, reader) = create_resolver(DOCUMENT_MODEL, &[]).await;
    let token = CancellationToken::new();
    token.cancel();

    let err = resolver
        .check_with_cancellation(&check("user:alice", "viewer", "document:1"), token)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Cancelled));
    assert_eq!(reader.reads(), 0);
}

#[tokio::test]
async fn test_union_true_branch_wins_over_failing_branch() {
    let (resolver, reader) =
        create_resolver(DOCUMENT_MODEL, &["document:1#viewer@user:alice"]).await;
    reader.fail_reads_of("document:1", "parent").await;

    let result = resolver
        .check(&check("user:alice", "viewer", "document:1"))
        .await
        .unwrap();
    assert!(result.allowed);
}

#[tokio::test]
async fn test_union_without_true_branch_surfaces_store_error() {
    let (resolver, reader) = create_resolver(DOCUMENT_MODEL, &[]).await;
    reader.fail_reads_of("document:1", "parent").await;

    let err = resolver
        .check(&check("user:alice", "viewer", "document:1"))
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::StoreUnavailable { .. }));
}

// ========== Section 6: Request Validation and Model Selection ==========

#[tokio::test]
async fn test_check_rejects_malformed_request() {
    let (resolver, _) = create_resolver(DOCUMENT_MODEL, &[]).await;

    assert!(matches!(
        resolver.check(&check("alice", "viewer", "document:1")).await,
        Err(DomainError::InvalidUserFormat { .. })
    ));
    assert!(matches!(
        resolver.check(&check("user:alice", "viewer", "document")).await,
        Err(DomainError::InvalidObjectFormat { .. })
    ));
    assert!(matches!(
        resolver.check(&check("user:alice", "viewer", "document:*")).await,
        Err(DomainError::InvalidObjectFormat { .. })
    ));
    assert!(matches!(
        resolver.check(&check("user:alice", "", "document:1")).await,
        Err(DomainError::InvalidRelationFormat { .. })
    ));
}

#[tokio::test]
async fn test_check_unknown_type_and_relation() {
    let (resolver, _) = create_resolver(DOCUMENT_MODEL, &[]).await;

    assert!(matches!(
        resolver.check(&check("user:alice", "viewer", "repo:1")).await,
        Err(DomainError::TypeNotFound { .. })
    ));
    assert!(matches!(
        resolver.check(&check("user:alice", "reader", "document:1")).await,
        Err(DomainError::RelationNotFound { .. })
    ));
}

#[tokio::test]
async fn test_check_unknown_store_and_model() {
    let (resolver, _) = create_resolver(DOCUMENT_MODEL, &[]).await;

    let other_store = CheckRequest::new("store2", "user:alice", "viewer", "document:1");
    assert!(matches!(
        resolver.check(&other_store).await,
        Err(DomainError::StoreNotFound { .. })
    ));

    let missing_model = check("user:alice", "viewer", "document:1").with_model_id("nope");
    assert!(matches!(
        resolver.check(&missing_model).await,
        Err(DomainError::ModelNotFound { .. })
    ));
}

#[tokio::test]
async fn test_check_pinned_model_id() {
    let (resolver, _) = create_resolver(DOCUMENT_MODEL, &["document:1#owner@user:alice"]).await;

    let request = check("user:alice", "viewer", "document:1").with_model_id("model1");
    assert!(resolver.check(&request).await.unwrap().allowed);
}

#[tokio::test]
async fn test_check_reports_datastore_queries() {
    let (resolver, _) = create_resolver(DOCUMENT_MODEL, &["document:1#viewer@user:alice"]).await;

    let result = resolver
        .check(&check("user:alice", "viewer", "document:1"))
        .await
        .unwrap();
    assert!(result.metadata.datastore_queries >= 1);
}

#[tokio::test]
async fn test_check_respects_narrow_fan_out() {
    let (resolver, _) = create_resolver_with(
        DOCUMENT_MODEL,
        &[
            "document:1#parent@folder:A",
            "document:1#parent@folder:B",
            "document:1#parent@folder:C",
            "folder:C#viewer@user:alice",
        ],
        MockTupleReader::new(),
        ResolverConfig::default().with_max_concurrency(1),
    )
    .await;

    assert!(
        resolver
            .check(&check("user:alice", "viewer", "document:1"))
            .await
            .unwrap()
            .allowed
    );
}
