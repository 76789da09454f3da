//! End-to-end tests of the pipeline over the platform's views, backed by the
//! in-memory document index.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use view_aggregator::catalog;
use view_aggregator::composer::ComposerConfig;
use view_aggregator::reader::ReaderConfig;
use view_aggregator::repair::RepairOutcome;
use view_aggregator::{AggregationError, Pipeline, AGGREGATED_AT_FIELD};
use view_aggregator_repository::{
    DocumentIndexProvider, InMemoryIndexProvider, SearchHit, SearchIndexError, StatValues,
};
use view_aggregator_shared::{
    Document, FixedClock, IndexNaming, IndexQuery, SearchRequest, StatMetric,
};

const NAMESPACE: &str = "salesai1";

/// Delegates to an in-memory index, failing writes to one index.
struct FailingProvider {
    inner: Arc<InMemoryIndexProvider>,
    fail_writes_to: String,
}

#[async_trait]
impl DocumentIndexProvider for FailingProvider {
    async fn index_exists(&self, index: &str) -> Result<bool, SearchIndexError> {
        self.inner.index_exists(index).await
    }

    async fn create_index(&self, index: &str) -> Result<(), SearchIndexError> {
        self.inner.create_index(index).await
    }

    async fn search(
        &self,
        index: &str,
        request: &SearchRequest,
    ) -> Result<Vec<SearchHit>, SearchIndexError> {
        self.inner.search(index, request).await
    }

    async fn scan(
        &self,
        index: &str,
        query: &IndexQuery,
        projection: Option<&[String]>,
        page_size: usize,
    ) -> Result<Vec<SearchHit>, SearchIndexError> {
        self.inner.scan(index, query, projection, page_size).await
    }

    async fn stats(
        &self,
        index: &str,
        query: &IndexQuery,
        metrics: &[StatMetric],
    ) -> Result<StatValues, SearchIndexError> {
        self.inner.stats(index, query, metrics).await
    }

    async fn upsert_document(
        &self,
        index: &str,
        id: &str,
        document: &Document,
    ) -> Result<(), SearchIndexError> {
        if index == self.fail_writes_to {
            return Err(SearchIndexError::index("cluster is read-only"));
        }
        self.inner.upsert_document(index, id, document).await
    }

    async fn delete_document(&self, index: &str, id: &str) -> Result<(), SearchIndexError> {
        self.inner.delete_document(index, id).await
    }
}

fn naming() -> IndexNaming {
    IndexNaming::new(NAMESPACE).unwrap()
}

fn view_index(view: &str) -> String {
    naming().view_index(view)
}

async fn seed(provider: &InMemoryIndexProvider, entity: &str, documents: Vec<Value>) {
    provider
        .seed(&naming().entity_index(entity), documents)
        .await;
}

async fn seeded_provider() -> Arc<InMemoryIndexProvider> {
    let provider = Arc::new(InMemoryIndexProvider::new());
    seed(
        &provider,
        "store",
        vec![
            json!({"id": "s1", "name": "Main", "city": "Izmir", "avatar": "main.png", "active": true}),
            json!({"id": "s2", "name": "Harbour", "city": "Bodrum", "avatar": null, "active": true}),
        ],
    )
    .await;
    seed(
        &provider,
        "user",
        vec![
            json!({"id": "u1", "fullName": "Ada Lovelace", "email": "ada@example.com", "username": "ada"}),
            json!({"id": "u2", "fullName": "Alan Turing", "email": "alan@example.com", "username": "alan"}),
        ],
    )
    .await;
    seed(
        &provider,
        "saleTransaction",
        vec![
            json!({"id": "t1", "transactionDate": "2024-04-01", "amount": 100.0, "currency": "TRY",
                   "status": "completed", "sellerId": "u1", "storeId": "s1"}),
            json!({"id": "t2", "transactionDate": "2024-04-02", "amount": 40.0, "currency": "TRY",
                   "status": "completed", "sellerId": "u2", "storeId": "s1"}),
            json!({"id": "t3", "transactionDate": "2024-04-02", "amount": 15.5, "currency": "TRY",
                   "status": "refunded", "sellerId": "u9", "storeId": "s2"}),
        ],
    )
    .await;
    seed(
        &provider,
        "saleTransactionStatus",
        vec![
            json!({"id": "completed", "label": "Completed"}),
            json!({"id": "refunded", "label": "Refunded"}),
        ],
    )
    .await;
    seed(
        &provider,
        "storeAssignment",
        vec![json!({"id": "a1", "userId": "u1", "storeId": "s1", "role": "seller", "status": "active"})],
    )
    .await;
    provider
}

fn pipeline_over(provider: Arc<dyn DocumentIndexProvider>) -> Pipeline {
    Pipeline::builder(provider, naming(), catalog::default_views().unwrap())
        .clock(Arc::new(FixedClock(
            Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap(),
        )))
        .reader_config(ReaderConfig {
            scan_page_size: 2,
            ..ReaderConfig::default()
        })
        .composer_config(ComposerConfig { id_concurrency: 2 })
        .build()
}

#[tokio::test]
async fn test_composed_document_is_superset_of_projection() {
    let provider = seeded_provider().await;
    let pipeline = pipeline_over(provider.clone());

    let summary = pipeline.compose_view("salesDashboardView", "t1").await.unwrap();
    assert_eq!(summary.succeeded, 1);

    let doc = provider
        .document(&view_index("salesDashboardView"), "t1")
        .await
        .unwrap();
    for field in pipeline.view("salesDashboardView").unwrap().projection() {
        assert!(doc.contains_key(field), "missing projected field {}", field);
    }
    assert_eq!(doc["id"], "t1");
    assert_eq!(doc["storeInfo"]["name"], "Main");
    assert_eq!(doc["sellerInfo"]["username"], "ada");
    assert_eq!(doc["status"], json!({"id": "completed", "label": "Completed"}));
    assert_eq!(
        doc["saleTransaction"],
        json!({"totalSalesCount": 2, "totalSalesAmount": 140.0})
    );
    assert_eq!(doc[AGGREGATED_AT_FIELD], "2024-05-01T09:30:00+00:00");
}

#[tokio::test]
async fn test_compose_twice_is_byte_identical() {
    let provider = seeded_provider().await;
    let pipeline = pipeline_over(provider.clone());
    let index = view_index("salesDashboardView");

    pipeline
        .compose_view("salesDashboardView", vec!["t1", "t2", "t3"])
        .await
        .unwrap();
    let first = serde_json::to_vec(&provider.documents(&index).await).unwrap();

    pipeline
        .compose_view("salesDashboardView", vec!["t1", "t2", "t3"])
        .await
        .unwrap();
    let second = serde_json::to_vec(&provider.documents(&index).await).unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_missing_relation_leaves_key_absent() {
    let provider = seeded_provider().await;
    let pipeline = pipeline_over(provider.clone());

    pipeline.compose_view("salesDashboardView", "t3").await.unwrap();
    let doc = provider
        .document(&view_index("salesDashboardView"), "t3")
        .await
        .unwrap();
    assert!(!doc.contains_key("sellerInfo"));
    assert_eq!(doc["storeInfo"]["name"], "Harbour");
}

#[tokio::test]
async fn test_single_matching_lookup_is_resolved() {
    let provider = seeded_provider().await;
    let pipeline = pipeline_over(provider.clone());

    pipeline.compose_view("salesDashboardView", "t3").await.unwrap();
    let doc = provider
        .document(&view_index("salesDashboardView"), "t3")
        .await
        .unwrap();
    assert_eq!(doc["status"], json!({"id": "refunded", "label": "Refunded"}));
}

#[tokio::test]
async fn test_resync_only_rewrites_referencing_documents() {
    let provider = seeded_provider().await;
    let pipeline = pipeline_over(provider.clone());
    let index = view_index("salesDashboardView");

    pipeline
        .compose_view("salesDashboardView", vec!["t1", "t2", "t3"])
        .await
        .unwrap();
    let t3_before = serde_json::to_vec(&provider.document(&index, "t3").await).unwrap();
    let writes_before = provider.writes();

    seed(
        &provider,
        "user",
        vec![json!({"id": "u1", "fullName": "Ada King", "email": "ada@example.com", "username": "ada"})],
    )
    .await;
    let summary = pipeline
        .resync_relation("salesDashboardView", "sellerInfo", "u1")
        .await
        .unwrap();

    assert_eq!(summary.succeeded, 1);
    assert_eq!(provider.writes(), writes_before + 1);
    let t1 = provider.document(&index, "t1").await.unwrap();
    assert_eq!(t1["sellerInfo"]["fullName"], "Ada King");
    let t3_after = serde_json::to_vec(&provider.document(&index, "t3").await).unwrap();
    assert_eq!(t3_before, t3_after);
}

#[tokio::test]
async fn test_resync_scoped_stats() {
    let provider = seeded_provider().await;
    let pipeline = pipeline_over(provider.clone());
    let index = view_index("salesDashboardView");

    pipeline
        .compose_view("salesDashboardView", vec!["t1", "t2", "t3"])
        .await
        .unwrap();
    seed(
        &provider,
        "saleTransaction",
        vec![json!({"id": "t4", "amount": 10.0, "status": "completed", "sellerId": "u1", "storeId": "s1"})],
    )
    .await;

    let report = pipeline.entity_changed("saleTransaction", "t4").await;
    assert!(!report.has_failures());

    let t1 = provider.document(&index, "t1").await.unwrap();
    assert_eq!(
        t1["saleTransaction"],
        json!({"totalSalesCount": 3, "totalSalesAmount": 150.0})
    );
    let t3 = provider.document(&index, "t3").await.unwrap();
    assert_eq!(
        t3["saleTransaction"],
        json!({"totalSalesCount": 1, "totalSalesAmount": 15.5})
    );
    assert!(provider.document(&index, "t4").await.is_some());
}

#[tokio::test]
async fn test_repair_leaves_exactly_one_document_per_source_id() {
    let provider = seeded_provider().await;
    let pipeline = pipeline_over(provider.clone());
    let index = view_index("salesDashboardView");
    provider
        .seed(&index, vec![json!({"id": "t-deleted", "amount": 1.0})])
        .await;

    let summary = pipeline.repair_view("salesDashboardView").await.unwrap();
    assert_eq!(summary.source_documents, 3);
    assert_eq!(summary.removed, 1);

    let ids: HashSet<String> = provider.ids(&index).await.into_iter().collect();
    let expected: HashSet<String> = ["t1", "t2", "t3"].iter().map(|s| s.to_string()).collect();
    assert_eq!(ids, expected);
}

#[tokio::test]
async fn test_cross_store_comparison_example() {
    let provider = Arc::new(InMemoryIndexProvider::new());
    seed(&provider, "store", vec![json!({"id": "s1", "name": "Main"})]).await;
    seed(
        &provider,
        "storeAssignment",
        vec![json!({"id": "a1", "userId": "u1", "storeId": "s1", "role": "seller", "status": "active"})],
    )
    .await;
    let pipeline = pipeline_over(provider.clone());

    pipeline
        .compose_view("crossStoreComparisonView", "s1")
        .await
        .unwrap();
    let doc = provider
        .document(&view_index("crossStoreComparisonView"), "s1")
        .await
        .unwrap();

    assert_eq!(
        doc["activeSellers"],
        json!([{"userId": "u1", "role": "seller", "status": "active"}])
    );
    assert!(!doc.contains_key("activeManagers"));
    assert_eq!(doc["saleTransaction"]["totalSales"], 0);
    assert_eq!(doc["lowStockAlert"]["openLowStockAlerts"], 0);
}

#[tokio::test]
async fn test_chained_relations_and_nested_lookups() {
    let provider = seeded_provider().await;
    seed(
        &provider,
        "reportRequest",
        vec![json!({"id": "r1", "requestedByUserId": "u2", "reportType": "sales",
                    "status": "ready", "format": "pdf"})],
    )
    .await;
    seed(
        &provider,
        "reportFile",
        vec![json!({"id": "f1", "signedUrl": "https://files/f1", "format": "pdf", "reportRequestId": "r1"})],
    )
    .await;
    seed(&provider, "reportStatus", vec![json!({"id": "ready", "label": "Ready"})]).await;
    let pipeline = pipeline_over(provider.clone());

    pipeline
        .compose_view("reportReadyForDownloadView", "f1")
        .await
        .unwrap();
    let doc = provider
        .document(&view_index("reportReadyForDownloadView"), "f1")
        .await
        .unwrap();

    assert_eq!(doc["requestingUser"]["fullName"], "Alan Turing");
    assert_eq!(doc["reportRequest"]["status"], json!({"id": "ready", "label": "Ready"}));
    assert_eq!(doc["reportRequest"]["reportType"], json!({"id": "sales"}));
}

#[tokio::test]
async fn test_failing_view_does_not_stop_other_repairs() {
    let inner = seeded_provider().await;
    let provider = Arc::new(FailingProvider {
        inner: inner.clone(),
        fail_writes_to: view_index("salesDashboardView"),
    });
    let pipeline = pipeline_over(provider);

    let report = pipeline.run_all_repair().await;
    assert_eq!(report.outcomes.len(), 9);
    assert_eq!(report.unclean_views(), vec!["salesDashboardView"]);

    let cross_store = report
        .outcomes
        .iter()
        .find(|o| o.view() == "crossStoreComparisonView")
        .unwrap();
    match cross_store {
        RepairOutcome::Completed(summary) => assert_eq!(summary.composed, 2),
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(
        inner.ids(&view_index("crossStoreComparisonView")).await,
        vec!["s1", "s2"]
    );
}

#[tokio::test]
async fn test_on_demand_views_are_previewed_not_written() {
    let provider = seeded_provider().await;
    seed(&provider, "storeRole", vec![json!({"id": "seller", "label": "Seller"})]).await;
    let pipeline = pipeline_over(provider.clone());

    let docs = pipeline
        .preview("accountRegistrationConfirmationView", "a1")
        .await
        .unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0]["userInfo"]["email"], "ada@example.com");
    assert_eq!(docs[0]["storeInfo"], json!({"name": "Main"}));
    assert_eq!(docs[0]["role"], json!({"id": "seller", "label": "Seller"}));

    assert!(matches!(
        pipeline
            .compose_view("accountRegistrationConfirmationView", "a1")
            .await,
        Err(AggregationError::NotMaterialized(_))
    ));
    assert!(!provider
        .index_exists(&view_index("accountRegistrationConfirmationView"))
        .await
        .unwrap());
}

#[tokio::test]
async fn test_removed_related_documents_refresh_views() {
    let provider = seeded_provider().await;
    let pipeline = pipeline_over(provider.clone());
    pipeline.repair_view("crossStoreComparisonView").await.unwrap();
    pipeline.repair_view("salesDashboardView").await.unwrap();

    provider
        .remove(&naming().entity_index("storeAssignment"), "a1")
        .await;
    let report = pipeline.entity_removed("storeAssignment", "a1").await;
    assert!(!report.has_failures(), "{:?}", report.errors);

    provider
        .remove(&naming().entity_index("saleTransaction"), "t1")
        .await;
    let report = pipeline.entity_removed("saleTransaction", "t1").await;
    assert!(!report.has_failures(), "{:?}", report.errors);

    let s1 = provider
        .document(&view_index("crossStoreComparisonView"), "s1")
        .await
        .unwrap();
    assert!(!s1.contains_key("activeSellers"));
    assert_eq!(
        s1["saleTransaction"],
        json!({"totalSales": 1, "salesAmount": 40.0})
    );

    let sales = view_index("salesDashboardView");
    assert_eq!(provider.ids(&sales).await, vec!["t2", "t3"]);
    let t2 = provider.document(&sales, "t2").await.unwrap();
    assert_eq!(
        t2["saleTransaction"],
        json!({"totalSalesCount": 1, "totalSalesAmount": 40.0})
    );
    let t3 = provider.document(&sales, "t3").await.unwrap();
    assert_eq!(
        t3["saleTransaction"],
        json!({"totalSalesCount": 1, "totalSalesAmount": 15.5})
    );
}

#[tokio::test]
async fn test_moved_assignment_leaves_its_old_store() {
    let provider = seeded_provider().await;
    let pipeline = pipeline_over(provider.clone());
    pipeline.repair_view("crossStoreComparisonView").await.unwrap();

    seed(
        &provider,
        "storeAssignment",
        vec![json!({"id": "a1", "userId": "u1", "storeId": "s2", "role": "seller", "status": "active"})],
    )
    .await;
    let report = pipeline.entity_changed("storeAssignment", "a1").await;
    assert!(!report.has_failures(), "{:?}", report.errors);

    let index = view_index("crossStoreComparisonView");
    let s1 = provider.document(&index, "s1").await.unwrap();
    assert!(!s1.contains_key("activeSellers"));
    let s2 = provider.document(&index, "s2").await.unwrap();
    assert_eq!(
        s2["activeSellers"],
        json!([{"userId": "u1", "role": "seller", "status": "active"}])
    );
}

#[tokio::test]
async fn test_lookup_fields_stay_objects() {
    let provider = seeded_provider().await;
    seed(
        &provider,
        "saleTransaction",
        vec![json!({"id": "t5", "amount": 5.0, "status": "voided", "storeId": "s2"})],
    )
    .await;
    let pipeline = pipeline_over(provider.clone());
    let index = view_index("salesDashboardView");
    pipeline.repair_view("salesDashboardView").await.unwrap();

    let t5 = provider.document(&index, "t5").await.unwrap();
    assert_eq!(t5["status"], json!({"id": "voided"}));

    provider
        .remove(&naming().entity_index("saleTransactionStatus"), "refunded")
        .await;
    let report = pipeline
        .entity_removed("saleTransactionStatus", "refunded")
        .await;
    assert!(!report.has_failures(), "{:?}", report.errors);

    for doc in provider.documents(&index).await {
        assert!(doc["status"].is_object(), "status of {} is {}", doc["id"], doc["status"]);
    }
    let t3 = provider.document(&index, "t3").await.unwrap();
    assert_eq!(t3["status"], json!({"id": "refunded"}));
}
