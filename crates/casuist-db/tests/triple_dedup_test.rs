//! Integration tests for the triple store and triple-level dedup.

use casuist_db::test_fixtures::TestDatabase;
use casuist_db::{
    CandidateTriple, Error, OwnerEntityType, TriplePattern, TripleStore,
};

fn candidate(owner_id: &str) -> CandidateTriple {
    CandidateTriple {
        subject: "case:190#s1".to_string(),
        predicate: "onto:mentions".to_string(),
        object: "onto:Autonomy".to_string(),
        is_literal: false,
        graph: "graph:main".to_string(),
        owner_entity_type: OwnerEntityType::Guideline,
        owner_entity_id: owner_id.to_string(),
        metadata: None,
    }
}

#[tokio::test]
#[ignore = "requires database server"]
async fn test_resolve_twice_yields_one_row_and_same_id() {
    let test_db = TestDatabase::new().await;

    let first = test_db.db.dedup.resolve(&candidate("42")).await.unwrap();
    assert!(first.is_new);

    let second = test_db.db.dedup.resolve(&candidate("42")).await.unwrap();
    assert!(!second.is_new);
    assert_eq!(first.triple_id, second.triple_id);

    let owned = test_db
        .db
        .triples
        .query(&TriplePattern::for_owner(OwnerEntityType::Guideline, "42"))
        .await
        .unwrap();
    assert_eq!(owned.len(), 1);

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires database server"]
async fn test_same_fact_different_owner_is_distinct() {
    let test_db = TestDatabase::new().await;

    let a = test_db.db.dedup.resolve(&candidate("42")).await.unwrap();
    let b = test_db.db.dedup.resolve(&candidate("43")).await.unwrap();

    assert!(a.is_new);
    assert!(b.is_new);
    assert_ne!(a.triple_id, b.triple_id);

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires database server"]
async fn test_put_is_idempotent() {
    let test_db = TestDatabase::new().await;

    let id1 = test_db.db.triples.put(&candidate("42")).await.unwrap();
    let id2 = test_db.db.triples.put(&candidate("42")).await.unwrap();
    assert_eq!(id1, id2);

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires database server"]
async fn test_put_rejects_malformed_candidates() {
    let test_db = TestDatabase::new().await;

    let mut missing_subject = candidate("42");
    missing_subject.subject = String::new();
    let err = test_db.db.triples.put(&missing_subject).await.unwrap_err();
    assert!(matches!(err, Error::ConstraintViolation(_)));

    // Empty object is fine only as a literal.
    let mut empty_uri = candidate("42");
    empty_uri.object = String::new();
    assert!(test_db.db.triples.put(&empty_uri).await.is_err());

    let mut empty_literal = candidate("42");
    empty_literal.object = String::new();
    empty_literal.is_literal = true;
    assert!(test_db.db.triples.put(&empty_literal).await.is_ok());

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires database server"]
async fn test_query_wildcards_and_field_match() {
    let test_db = TestDatabase::new().await;

    test_db.db.triples.put(&candidate("42")).await.unwrap();
    let mut other = candidate("42");
    other.object = "onto:Beneficence".to_string();
    test_db.db.triples.put(&other).await.unwrap();

    let all = test_db
        .db
        .triples
        .query(&TriplePattern::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 2);

    let narrowed = test_db
        .db
        .triples
        .query(&TriplePattern {
            object: Some("onto:Autonomy".to_string()),
            ..TriplePattern::default()
        })
        .await
        .unwrap();
    assert_eq!(narrowed.len(), 1);
    assert_eq!(narrowed[0].object, "onto:Autonomy");

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires database server"]
async fn test_delete_by_owner_counts_rows() {
    let test_db = TestDatabase::new().await;

    test_db.db.triples.put(&candidate("42")).await.unwrap();
    let mut other = candidate("42");
    other.predicate = "onto:cites".to_string();
    test_db.db.triples.put(&other).await.unwrap();
    test_db.db.triples.put(&candidate("43")).await.unwrap();

    let removed = test_db
        .db
        .triples
        .delete_by_owner(OwnerEntityType::Guideline, "42")
        .await
        .unwrap();
    assert_eq!(removed, 2);

    let survivors = test_db
        .db
        .triples
        .query(&TriplePattern::default())
        .await
        .unwrap();
    assert_eq!(survivors.len(), 1);
    assert_eq!(survivors[0].owner_entity_id, "43");

    test_db.cleanup().await;
}
