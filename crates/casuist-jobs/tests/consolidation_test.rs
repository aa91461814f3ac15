//! Integration tests for the consolidation maintenance job.

use chrono::{Duration, Utc};
use uuid::Uuid;

use casuist_db::test_fixtures::TestDatabase;
use casuist_db::{CandidateTriple, OwnerEntityType, TriplePattern, TripleStore};
use casuist_jobs::ConsolidationJob;

fn fact(owner_type: OwnerEntityType, owner_id: &str, object: &str) -> CandidateTriple {
    CandidateTriple {
        subject: "case:1".to_string(),
        predicate: "onto:coversConcept".to_string(),
        object: object.to_string(),
        is_literal: false,
        graph: "graph:main".to_string(),
        owner_entity_type: owner_type,
        owner_entity_id: owner_id.to_string(),
        metadata: None,
    }
}

/// Insert a triple row directly, bypassing dedup-key enforcement the
/// way legacy imports did.
async fn insert_legacy_triple(test_db: &TestDatabase, owner_id: &str, legacy_key: &str) -> Uuid {
    let id = casuist_db::new_v7();
    sqlx::query(
        "INSERT INTO triple (id, subject, predicate, object, is_literal, graph, \
                             owner_entity_type, owner_entity_id, dedup_key) \
         VALUES ($1, 'case:1', 'onto:coversConcept', 'onto:Autonomy', false, 'graph:main', \
                 'guideline', $2, $3)",
    )
    .bind(id)
    .bind(owner_id)
    .bind(legacy_key)
    .execute(&test_db.pool)
    .await
    .unwrap();
    id
}

#[tokio::test]
#[ignore = "requires database server"]
async fn test_orphaned_triples_removed_and_pass_is_idempotent() {
    let test_db = TestDatabase::new().await;

    let document_id = test_db.create_document("case").await;
    test_db
        .create_guideline_at(50, document_id, Utc::now())
        .await;

    // One live owner, one dangling owner.
    test_db
        .db
        .triples
        .put(&fact(OwnerEntityType::Guideline, "50", "onto:Autonomy"))
        .await
        .unwrap();
    test_db
        .db
        .triples
        .put(&fact(OwnerEntityType::Guideline, "999", "onto:Justice"))
        .await
        .unwrap();

    let job = ConsolidationJob::new(test_db.db.clone());
    let report = job.remove_orphaned_triples().await.unwrap();
    assert_eq!(report.examined, 1);
    assert_eq!(report.removed, 1);
    assert!(report.is_clean());

    let survivors = test_db
        .db
        .triples
        .query(&TriplePattern::default())
        .await
        .unwrap();
    assert_eq!(survivors.len(), 1);
    assert_eq!(survivors[0].owner_entity_id, "50");

    // Nothing left to do on a second run.
    let again = job.remove_orphaned_triples().await.unwrap();
    assert_eq!(again.examined, 0);
    assert_eq!(again.removed, 0);

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires database server"]
async fn test_duplicate_guidelines_merged_by_job() {
    let test_db = TestDatabase::new().await;

    let document_id = test_db.create_document("case 190").await;
    let t0 = Utc::now() - Duration::days(5);
    test_db.create_guideline_at(10, document_id, t0).await;
    test_db
        .create_guideline_at(15, document_id, t0 + Duration::days(1))
        .await;

    let job = ConsolidationJob::new(test_db.db.clone());
    let report = job.merge_duplicate_guidelines().await.unwrap();
    assert_eq!(report.examined, 1);
    assert_eq!(report.removed, 1);

    assert!(test_db.db.guidelines.exists(10).await.unwrap());
    assert!(!test_db.db.guidelines.exists(15).await.unwrap());

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires database server"]
async fn test_duplicate_triples_keep_lowest_id() {
    let test_db = TestDatabase::new().await;

    let document_id = test_db.create_document("case").await;
    test_db
        .create_guideline_at(60, document_id, Utc::now())
        .await;

    // Legacy rows with drifted keys escaped the unique index.
    let older = insert_legacy_triple(&test_db, "60", "legacy:0001").await;
    let newer = insert_legacy_triple(&test_db, "60", "legacy:0002").await;
    assert!(older < newer, "v7 ids are time-ordered");

    let job = ConsolidationJob::new(test_db.db.clone());
    let report = job.remove_duplicate_triples().await.unwrap();
    assert_eq!(report.examined, 1);
    assert_eq!(report.removed, 1);

    let survivors = test_db
        .db
        .triples
        .query(&TriplePattern::for_owner(OwnerEntityType::Guideline, "60"))
        .await
        .unwrap();
    assert_eq!(survivors.len(), 1);
    assert_eq!(survivors[0].id, older);

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires database server"]
async fn test_full_run_on_clean_store_is_a_no_op() {
    let test_db = TestDatabase::new().await;

    let document_id = test_db.create_document("case").await;
    test_db
        .create_guideline_at(70, document_id, Utc::now())
        .await;
    test_db
        .db
        .triples
        .put(&fact(OwnerEntityType::Guideline, "70", "onto:Autonomy"))
        .await
        .unwrap();

    let job = ConsolidationJob::new(test_db.db.clone());
    let report = job.run().await.unwrap();

    assert!(report.is_clean());
    assert_eq!(report.total_removed(), 0);
    assert!(report.as_partial_failure().is_none());

    test_db.cleanup().await;
}
