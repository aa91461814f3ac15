//! Integration tests for guideline consolidation (oldest wins).

use chrono::{Duration, Utc};

use casuist_db::test_fixtures::TestDatabase;
use casuist_db::{CandidateTriple, Error, OwnerEntityType, TriplePattern, TripleStore};

fn guideline_triple(owner_id: &str, object: &str) -> CandidateTriple {
    CandidateTriple {
        subject: "case:190".to_string(),
        predicate: "onto:recommends".to_string(),
        object: object.to_string(),
        is_literal: false,
        graph: "graph:main".to_string(),
        owner_entity_type: OwnerEntityType::Guideline,
        owner_entity_id: owner_id.to_string(),
        metadata: None,
    }
}

#[tokio::test]
#[ignore = "requires database server"]
async fn test_oldest_guideline_wins_and_triples_repoint() {
    let test_db = TestDatabase::new().await;

    let document_id = test_db.create_document("case 190").await;
    let t0 = Utc::now() - Duration::days(30);
    let t1 = Utc::now() - Duration::days(1);
    test_db.create_guideline_at(10, document_id, t0).await;
    test_db.create_guideline_at(15, document_id, t1).await;

    test_db
        .db
        .triples
        .put(&guideline_triple("15", "onto:EthicsCommitteeReview"))
        .await
        .unwrap();

    let canonical = test_db.db.dedup.resolve_guideline(document_id).await.unwrap();
    assert_eq!(canonical, 10);

    // Triples formerly owned by 15 now belong to 10.
    let owned_by_15 = test_db
        .db
        .triples
        .query(&TriplePattern::for_owner(OwnerEntityType::Guideline, "15"))
        .await
        .unwrap();
    assert!(owned_by_15.is_empty());

    let owned_by_10 = test_db
        .db
        .triples
        .query(&TriplePattern::for_owner(OwnerEntityType::Guideline, "10"))
        .await
        .unwrap();
    assert_eq!(owned_by_10.len(), 1);

    // Guideline 15 no longer exists; the document points at 10.
    assert!(!test_db.db.guidelines.exists(15).await.unwrap());
    let document = test_db.db.documents.get(document_id).await.unwrap().unwrap();
    assert_eq!(document.canonical_guideline_id, Some(10));

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires database server"]
async fn test_resolve_guideline_is_idempotent() {
    let test_db = TestDatabase::new().await;

    let document_id = test_db.create_document("case 7").await;
    let t0 = Utc::now() - Duration::days(10);
    test_db.create_guideline_at(20, document_id, t0).await;
    test_db
        .create_guideline_at(21, document_id, t0 + Duration::hours(1))
        .await;

    let first = test_db.db.dedup.resolve_guideline(document_id).await.unwrap();
    let second = test_db.db.dedup.resolve_guideline(document_id).await.unwrap();

    assert_eq!(first, 20);
    assert_eq!(second, 20, "no remaining duplicates means a no-op");
    assert_eq!(
        test_db
            .db
            .guidelines
            .list_for_document(document_id)
            .await
            .unwrap()
            .len(),
        1
    );

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires database server"]
async fn test_created_at_tie_breaks_on_lowest_id() {
    let test_db = TestDatabase::new().await;

    let document_id = test_db.create_document("case 8").await;
    let t = Utc::now() - Duration::days(3);
    test_db.create_guideline_at(31, document_id, t).await;
    test_db.create_guideline_at(30, document_id, t).await;

    let canonical = test_db.db.dedup.resolve_guideline(document_id).await.unwrap();
    assert_eq!(canonical, 30);

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires database server"]
async fn test_missing_guideline_reports_not_found() {
    let test_db = TestDatabase::new().await;

    let document_id = test_db.create_document("bare document").await;
    let err = test_db
        .db
        .dedup
        .resolve_guideline(document_id)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::GuidelineNotFound(id) if id == document_id));

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires database server"]
async fn test_duplicate_listing_feeds_consolidation() {
    let test_db = TestDatabase::new().await;

    let doc_a = test_db.create_document("a").await;
    let doc_b = test_db.create_document("b").await;
    let t = Utc::now() - Duration::days(2);
    test_db.create_guideline_at(40, doc_a, t).await;
    test_db.create_guideline_at(41, doc_a, t + Duration::hours(2)).await;
    test_db.create_guideline_at(42, doc_b, t).await;

    let duplicated = test_db.db.guidelines.documents_with_duplicates().await.unwrap();
    assert_eq!(duplicated, vec![doc_a]);

    test_db.cleanup().await;
}
