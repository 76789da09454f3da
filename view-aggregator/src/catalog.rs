//! The views kept by the sales platform.

use view_aggregator_shared::StatMetric;

use crate::definition::{FieldBinding, LookupBinding, StatBinding, ViewDefinition, ViewRegistry};
use crate::errors::AggregationError;

const STORE_SUMMARY: &[&str] = &["id", "name", "city", "avatar"];
const USER_SUMMARY: &[&str] = &["id", "fullName", "email", "username"];
const ASSIGNMENT_SUMMARY: &[&str] = &["userId", "role", "status"];

fn store_staff(target_key: &str, source_path: &str, role: &str) -> FieldBinding {
    FieldBinding::many(target_key, source_path, "storeAssignment", "storeId")
        .project(ASSIGNMENT_SUMMARY)
        .filter("role", role)
        .filter("status", "active")
}

pub fn sales_dashboard_view() -> Result<ViewDefinition, AggregationError> {
    ViewDefinition::builder("salesDashboardView", "saleTransaction")
        .project(&[
            "id",
            "transactionDate",
            "amount",
            "currency",
            "status",
            "sellerId",
            "storeId",
        ])
        .field(FieldBinding::one("storeInfo", "storeId", "store").project(STORE_SUMMARY))
        .field(FieldBinding::one("sellerInfo", "sellerId", "user").project(USER_SUMMARY))
        .lookup(LookupBinding::new("status", "saleTransactionStatus"))
        .stat(
            StatBinding::scoped("saleTransaction", "saleTransaction", "storeId", "storeId")
                .metric(StatMetric::count("totalSalesCount", "id"))
                .metric(StatMetric::sum("totalSalesAmount", "amount")),
        )
        .build()
}

pub fn inventory_dashboard_view() -> Result<ViewDefinition, AggregationError> {
    ViewDefinition::builder("inventoryDashboardView", "inventoryItem")
        .project(&[
            "id",
            "storeId",
            "productId",
            "quantity",
            "status",
            "lowStockThreshold",
        ])
        .field(
            FieldBinding::one("storeInfo", "storeId", "store")
                .project(&["id", "name", "city", "avatar", "active"]),
        )
        .field(
            FieldBinding::many("lowStockAlerts", "id", "lowStockAlert", "inventoryItemId")
                .project(&["id", "alertType", "alertTimestamp", "resolved"]),
        )
        .lookup(LookupBinding::new("status", "inventoryStatus"))
        .stat(
            StatBinding::scoped("inventoryItem", "inventoryItem", "storeId", "storeId")
                .metric(StatMetric::count("totalProducts", "id"))
                .metric(StatMetric::sum("totalQuantity", "quantity")),
        )
        .build()
}

pub fn audit_log_view() -> Result<ViewDefinition, AggregationError> {
    ViewDefinition::builder("auditLogView", "auditLog")
        .project(&[
            "id",
            "userId",
            "storeId",
            "actionType",
            "entityType",
            "entityId",
            "createdAt",
            "severity",
            "message",
        ])
        .field(
            FieldBinding::one("userInfo", "userId", "user")
                .project(&["id", "email", "fullName", "username"]),
        )
        .field(FieldBinding::one("storeInfo", "storeId", "store").project(&["id", "name"]))
        .lookup(LookupBinding::new("severity", "auditLogSeverity"))
        .build()
}

pub fn cross_store_comparison_view() -> Result<ViewDefinition, AggregationError> {
    ViewDefinition::builder("crossStoreComparisonView", "store")
        .project(&["id", "name", "city", "avatar", "active"])
        .field(store_staff("activeSellers", "id", "seller"))
        .field(store_staff("activeManagers", "id", "manager"))
        .stat(
            StatBinding::scoped("saleTransaction", "saleTransaction", "id", "storeId")
                .metric(StatMetric::count("totalSales", "id"))
                .metric(StatMetric::sum("salesAmount", "amount")),
        )
        .stat(
            StatBinding::scoped("inventoryItem", "inventoryItem", "id", "storeId")
                .metric(StatMetric::count("productsInStock", "id")),
        )
        .stat(
            StatBinding::scoped("lowStockAlert", "lowStockAlert", "id", "storeId")
                .filter("resolved", false)
                .metric(StatMetric::count("openLowStockAlerts", "id")),
        )
        .build()
}

pub fn low_stock_alert_view() -> Result<ViewDefinition, AggregationError> {
    ViewDefinition::builder("lowStockAlertView", "lowStockAlert")
        .project(&[
            "id",
            "inventoryItemId",
            "storeId",
            "alertType",
            "alertTimestamp",
            "resolved",
            "resolvedByUserId",
            "resolvedTimestamp",
        ])
        .field(
            FieldBinding::one("inventoryItem", "inventoryItemId", "inventoryItem")
                .project(&["productId", "quantity", "status", "lowStockThreshold"]),
        )
        .field(FieldBinding::one("storeInfo", "storeId", "store").project(STORE_SUMMARY))
        .field(store_staff("storeSellers", "storeId", "seller"))
        .field(store_staff("storeManagers", "storeId", "manager"))
        .lookup(LookupBinding::new("alertType", "inventoryAlertType"))
        .build()
}

pub fn report_ready_for_download_view() -> Result<ViewDefinition, AggregationError> {
    ViewDefinition::builder("reportReadyForDownloadView", "reportFile")
        .project(&[
            "id",
            "signedUrl",
            "signedUrlExpiry",
            "format",
            "downloadCount",
            "reportRequestId",
        ])
        .field(
            FieldBinding::one("reportRequest", "reportRequestId", "reportRequest").project(&[
                "id",
                "requestedByUserId",
                "reportType",
                "storeIds",
                "dateFrom",
                "dateTo",
                "status",
                "format",
            ]),
        )
        .field(
            FieldBinding::one("requestingUser", "reportRequest.requestedByUserId", "user")
                .project(USER_SUMMARY),
        )
        .lookup(LookupBinding::new("reportRequest.reportType", "reportType"))
        .lookup(LookupBinding::new("reportRequest.status", "reportStatus"))
        .build()
}

pub fn sale_transaction_correction_audit_view() -> Result<ViewDefinition, AggregationError> {
    ViewDefinition::builder("saleTransactionCorrectionAuditView", "saleTransactionHistory")
        .project(&[
            "id",
            "transactionId",
            "changeType",
            "changedByUserId",
            "changeTimestamp",
            "correctionJustification",
            "previousData",
            "newData",
        ])
        .field(
            FieldBinding::one("saleTransaction", "transactionId", "saleTransaction").project(&[
                "id",
                "storeId",
                "amount",
                "currency",
                "transactionDate",
                "status",
                "sellerId",
            ]),
        )
        .field(FieldBinding::one("changedByUser", "changedByUserId", "user").project(USER_SUMMARY))
        .field(
            FieldBinding::one("storeInfo", "saleTransaction.storeId", "store")
                .project(STORE_SUMMARY),
        )
        .field(
            FieldBinding::one("sellerInfo", "saleTransaction.sellerId", "user")
                .project(USER_SUMMARY),
        )
        .lookup(LookupBinding::new("changeType", "saleChangeType"))
        .lookup(LookupBinding::new("saleTransaction.status", "saleTransactionStatus"))
        .build()
}

pub fn store_override_granted_view() -> Result<ViewDefinition, AggregationError> {
    ViewDefinition::builder("storeOverrideGrantedView", "storeAssignment")
        .project(&[
            "id",
            "userId",
            "storeId",
            "role",
            "assignmentType",
            "status",
            "overrideJustification",
            "validFrom",
            "validUntil",
        ])
        .field(FieldBinding::one("userInfo", "userId", "user").project(USER_SUMMARY))
        .field(FieldBinding::one("storeInfo", "storeId", "store").project(STORE_SUMMARY))
        .lookup(LookupBinding::new("role", "userRole"))
        .lookup(LookupBinding::new("assignmentType", "assignmentType"))
        .lookup(LookupBinding::new("status", "assignmentStatus"))
        .build()
}

pub fn system_health_incident_view() -> Result<ViewDefinition, AggregationError> {
    const INCIDENT_USER: &[&str] = &["id", "fullName", "email"];

    ViewDefinition::builder("systemHealthIncidentView", "anomalyEvent")
        .project(&[
            "id",
            "anomalyType",
            "storeId",
            "detectedAt",
            "severity",
            "status",
            "description",
            "reviewedByUserId",
            "triggeredByUserId",
        ])
        .field(
            FieldBinding::one("affectedStore", "storeId", "store").project(&["id", "name", "city"]),
        )
        .field(
            FieldBinding::one("triggeredByUser", "triggeredByUserId", "user")
                .project(INCIDENT_USER),
        )
        .field(
            FieldBinding::one("reviewedByUser", "reviewedByUserId", "user").project(INCIDENT_USER),
        )
        .lookup(LookupBinding::new("severity", "anomalySeverity"))
        .lookup(LookupBinding::new("anomalyType", "anomalyType"))
        .lookup(LookupBinding::new("status", "anomalyStatus"))
        .build()
}

/// Welcome details for a new store assignment, composed when the
/// confirmation is sent.
pub fn account_registration_confirmation_view() -> Result<ViewDefinition, AggregationError> {
    ViewDefinition::builder("accountRegistrationConfirmationView", "storeAssignment")
        .project(&["id", "userId", "role", "storeId"])
        .on_demand()
        .field(
            FieldBinding::one("userInfo", "userId", "user")
                .project(&["username", "fullname", "email"]),
        )
        .field(FieldBinding::one("storeInfo", "storeId", "store").project(&["name"]))
        .lookup(LookupBinding::new("role", "storeRole"))
        .build()
}

pub fn ci_cd_job_status_notification_view() -> Result<ViewDefinition, AggregationError> {
    ViewDefinition::builder("ciCdJobStatusNotificationView", "openApiSchema")
        .project(&["id", "version", "description", "createdAt", "updatedAt"])
        .on_demand()
        .build()
}

/// Every view of the platform, materialized views first.
pub fn default_views() -> Result<ViewRegistry, AggregationError> {
    let mut registry = ViewRegistry::new();
    for view in [
        sales_dashboard_view()?,
        inventory_dashboard_view()?,
        audit_log_view()?,
        cross_store_comparison_view()?,
        low_stock_alert_view()?,
        report_ready_for_download_view()?,
        sale_transaction_correction_audit_view()?,
        store_override_granted_view()?,
        system_health_incident_view()?,
        account_registration_confirmation_view()?,
        ci_cd_job_status_notification_view()?,
    ] {
        registry.register(view)?;
    }
    Ok(registry)
}
