//! SQLite report snapshots: staged build, atomic publish, and read queries.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use advisor_core::{
    ClientInfo, RecommendationInstance, RecommendationType, Resource, ResourceAttributes,
    ResourceGroup, Subscription,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::migrate::{MigrateError, Migrator};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use thiserror::Error;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

mod query;

pub use query::{
    GroupCount, Grouping, RecommendationFilter, RecommendationQuery, RecommendationRow,
    RecommendationSort, ResourceFilter, ResourceQuery, ResourceSort, ResourceSummary, SortOrder,
    StoreCounts, SubscriptionBreakdown, SubscriptionCounts, RESOURCE_NOT_IMPORTED,
};

pub const CRATE_NAME: &str = "advisor-storage";

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("applying schema: {0}")]
    Migrate(#[from] MigrateError),
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
    #[error("undecodable row: {0}")]
    Decode(String),
}

/// Outcome recorded for each input file of a load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    Loaded,
    Absent,
    Disabled,
    Rejected,
}

impl SourceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceStatus::Loaded => "loaded",
            SourceStatus::Absent => "absent",
            SourceStatus::Disabled => "disabled",
            SourceStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for SourceStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "loaded" => Ok(SourceStatus::Loaded),
            "absent" => Ok(SourceStatus::Absent),
            "disabled" => Ok(SourceStatus::Disabled),
            "rejected" => Ok(SourceStatus::Rejected),
            other => Err(StoreError::Decode(format!("unknown source status `{other}`"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFileRecord {
    pub kind: String,
    pub path: Option<String>,
    pub sha256: Option<String>,
    pub rows_read: i64,
    pub entities: i64,
    pub status: SourceStatus,
}

/// A report snapshot database. Writers are only used while a snapshot is staged.
#[derive(Debug, Clone)]
pub struct ReportStore {
    pool: SqlitePool,
}

impl ReportStore {
    /// Open a published snapshot for reading.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .read_only(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    /// Create an empty snapshot file with the full schema.
    pub async fn create(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Delete);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        MIGRATOR.run(&pool).await?;
        Ok(Self { pool })
    }

    /// Schema-initialized store that lives only as long as its single connection.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        MIGRATOR.run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub async fn write_client_info(&self, info: &ClientInfo) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM client_info").execute(&mut *tx).await?;
        sqlx::query("INSERT INTO client_info (id, name, report_date, loaded_at) VALUES (1, ?, ?, ?)")
            .bind(info.name.as_str())
            .bind(info.report_date.as_str())
            .bind(info.loaded_at)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn write_source_files(&self, records: &[SourceFileRecord]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        for record in records {
            sqlx::query(
                r#"
                INSERT INTO source_files (kind, path, sha256, rows_read, entities, status)
                VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT (kind) DO UPDATE
                   SET path = excluded.path,
                       sha256 = excluded.sha256,
                       rows_read = excluded.rows_read,
                       entities = excluded.entities,
                       status = excluded.status
                "#,
            )
            .bind(record.kind.as_str())
            .bind(record.path.as_deref())
            .bind(record.sha256.as_deref())
            .bind(record.rows_read)
            .bind(record.entities)
            .bind(record.status.as_str())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Insert and commit one stage of subscriptions.
    pub async fn write_subscriptions(&self, subscriptions: &[Subscription]) -> Result<usize, StoreError> {
        let mut tx = self.pool.begin().await?;
        for sub in subscriptions {
            sqlx::query("INSERT INTO subscriptions (id, name) VALUES (?, ?)")
                .bind(sub.id.as_str())
                .bind(sub.name.as_str())
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        debug!(count = subscriptions.len(), "committed subscriptions");
        Ok(subscriptions.len())
    }

    pub async fn write_resource_groups(&self, groups: &[ResourceGroup]) -> Result<usize, StoreError> {
        let mut tx = self.pool.begin().await?;
        for group in groups {
            sqlx::query("INSERT INTO resource_groups (id, name, subscription_id) VALUES (?, ?, ?)")
                .bind(group.id.as_str())
                .bind(group.name.as_str())
                .bind(group.subscription_id.as_str())
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        debug!(count = groups.len(), "committed resource groups");
        Ok(groups.len())
    }

    /// Insert resources of any kind: one base row plus the kind's attribute row.
    pub async fn write_resources(&self, resources: &[Resource]) -> Result<usize, StoreError> {
        let mut tx = self.pool.begin().await?;
        for resource in resources {
            sqlx::query(
                "INSERT INTO resources (id, kind, name, location, resource_group_id) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(resource.id.as_str())
            .bind(resource.kind().as_str())
            .bind(resource.name.as_str())
            .bind(resource.location.as_deref())
            .bind(resource.resource_group_id.as_str())
            .execute(&mut *tx)
            .await?;

            match &resource.attributes {
                ResourceAttributes::VirtualMachine(vm) => {
                    sqlx::query(
                        "INSERT INTO virtual_machines (id, status, os, size, public_ip, disks) VALUES (?, ?, ?, ?, ?, ?)",
                    )
                    .bind(resource.id.as_str())
                    .bind(vm.status.as_deref())
                    .bind(vm.os.as_deref())
                    .bind(vm.size.as_deref())
                    .bind(vm.public_ip.as_deref())
                    .bind(vm.disks)
                    .execute(&mut *tx)
                    .await?;
                }
                ResourceAttributes::ScaleSet(ss) => {
                    sqlx::query(
                        r#"
                        INSERT INTO scale_sets
                            (id, provisioning_state, status, os, size, instances, orchestration_mode, public_ip)
                        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                        "#,
                    )
                    .bind(resource.id.as_str())
                    .bind(ss.provisioning_state.as_deref())
                    .bind(ss.status.as_deref())
                    .bind(ss.os.as_deref())
                    .bind(ss.size.as_deref())
                    .bind(ss.instances)
                    .bind(ss.orchestration_mode.as_deref())
                    .bind(ss.public_ip.as_deref())
                    .execute(&mut *tx)
                    .await?;
                }
                ResourceAttributes::StorageAccount(sa) => {
                    sqlx::query("INSERT INTO storage_accounts (id, sku, account_kind) VALUES (?, ?, ?)")
                        .bind(resource.id.as_str())
                        .bind(sa.sku.as_deref())
                        .bind(sa.account_kind.as_deref())
                        .execute(&mut *tx)
                        .await?;
                }
            }
        }
        tx.commit().await?;
        debug!(count = resources.len(), "committed resources");
        Ok(resources.len())
    }

    pub async fn write_recommendations(
        &self,
        types: &[RecommendationType],
        instances: &[RecommendationInstance],
    ) -> Result<usize, StoreError> {
        let mut tx = self.pool.begin().await?;
        for rec_type in types {
            sqlx::query(
                "INSERT INTO recommendation_types (id, text, category, impact, impact_rank) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(rec_type.id)
            .bind(rec_type.text.as_str())
            .bind(rec_type.category.as_str())
            .bind(rec_type.impact.label())
            .bind(rec_type.impact.rank())
            .execute(&mut *tx)
            .await?;
        }
        for instance in instances {
            sqlx::query(
                r#"
                INSERT INTO recommendation_instances
                    (id, recommendation_type_id, resource_id, resource_kind_label, subscription_id,
                     subscription_name, resource_group_name, resource_name, resource_uri, potential_savings)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(instance.id)
            .bind(instance.recommendation_type_id)
            .bind(instance.resource_id.as_deref())
            .bind(instance.resource_kind_label.as_deref())
            .bind(instance.subscription_id.as_deref())
            .bind(instance.subscription_name.as_deref())
            .bind(instance.resource_group_name.as_deref())
            .bind(instance.resource_name.as_deref())
            .bind(instance.resource_uri.as_deref())
            .bind(instance.potential_savings)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        debug!(types = types.len(), instances = instances.len(), "committed recommendations");
        Ok(instances.len())
    }

    pub async fn client_info(&self) -> Result<Option<ClientInfo>, StoreError> {
        let row = sqlx::query("SELECT name, report_date, loaded_at FROM client_info WHERE id = 1")
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| -> Result<ClientInfo, StoreError> {
            Ok(ClientInfo {
                name: row.try_get("name")?,
                report_date: row.try_get("report_date")?,
                loaded_at: row.try_get::<DateTime<Utc>, _>("loaded_at")?,
            })
        })
        .transpose()
    }

    pub async fn source_files(&self) -> Result<Vec<SourceFileRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT kind, path, sha256, rows_read, entities, status FROM source_files ORDER BY kind",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| -> Result<SourceFileRecord, StoreError> {
                let status: String = row.try_get("status")?;
                Ok(SourceFileRecord {
                    kind: row.try_get("kind")?,
                    path: row.try_get("path")?,
                    sha256: row.try_get("sha256")?,
                    rows_read: row.try_get("rows_read")?,
                    entities: row.try_get("entities")?,
                    status: status.parse()?,
                })
            })
            .collect()
    }
}

/// Hidden sibling file a snapshot is built in before it replaces `target`.
pub fn building_path_for(target: &Path, build_id: Uuid) -> PathBuf {
    let file_name = target
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "report.db".to_string());
    let parent = target.parent().unwrap_or_else(|| Path::new(""));
    parent.join(format!(".{file_name}.{build_id}.building"))
}

/// A snapshot under construction. Nothing is visible at `target` until
/// [`StagedSnapshot::publish`] renames the finished file over it.
#[derive(Debug)]
pub struct StagedSnapshot {
    store: ReportStore,
    building_path: PathBuf,
    target_path: PathBuf,
}

impl StagedSnapshot {
    pub async fn begin(target: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let target_path = target.into();
        if let Some(parent) = target_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(|source| StoreError::Io {
                context: format!("creating snapshot directory {}", parent.display()),
                source,
            })?;
        }
        let building_path = building_path_for(&target_path, Uuid::new_v4());
        let store = ReportStore::create(&building_path).await?;
        debug!(path = %building_path.display(), "staging snapshot");
        Ok(Self {
            store,
            building_path,
            target_path,
        })
    }

    pub fn store(&self) -> &ReportStore {
        &self.store
    }

    pub fn building_path(&self) -> &Path {
        &self.building_path
    }

    pub fn target_path(&self) -> &Path {
        &self.target_path
    }

    /// Close the build connection and atomically replace the published snapshot.
    pub async fn publish(self) -> Result<PathBuf, StoreError> {
        self.store.close().await;
        if let Err(source) = fs::rename(&self.building_path, &self.target_path).await {
            let _ = fs::remove_file(&self.building_path).await;
            return Err(StoreError::Io {
                context: format!(
                    "publishing snapshot {} -> {}",
                    self.building_path.display(),
                    self.target_path.display()
                ),
                source,
            });
        }
        info!(path = %self.target_path.display(), "published snapshot");
        Ok(self.target_path)
    }

    /// Drop the half-built file; the published snapshot is left as it was.
    pub async fn discard(self) {
        self.store.close().await;
        if let Err(err) = fs::remove_file(&self.building_path).await {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.building_path.display(), error = %err, "failed to remove staged snapshot");
            }
        }
    }
}

/// The snapshot in-process readers should query. Repointing swaps the whole
/// store at once, so a reader sees either the old or the new snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotHandle {
    current: Arc<RwLock<Arc<ReportStore>>>,
}

impl SnapshotHandle {
    pub fn new(store: ReportStore) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(store))),
        }
    }

    pub async fn current(&self) -> Arc<ReportStore> {
        Arc::clone(&*self.current.read().await)
    }

    /// Install `store` and hand back the one it replaced.
    pub async fn repoint(&self, store: ReportStore) -> Arc<ReportStore> {
        let mut guard = self.current.write().await;
        std::mem::replace(&mut *guard, Arc::new(store))
    }

    /// Open the snapshot at `path` and repoint to it.
    pub async fn reload(&self, path: impl AsRef<Path>) -> Result<Arc<ReportStore>, StoreError> {
        let store = ReportStore::open(path).await?;
        Ok(self.repoint(store).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use advisor_core::{
        resource_group_id, resource_id, subscription_id, Impact, PageRequest, ResourceKind,
        StorageAccountAttributes, VirtualMachineAttributes,
    };
    use tempfile::tempdir;

    fn vm(rg: &str, name: &str, status: &str, os: &str) -> Resource {
        Resource {
            id: resource_id(rg, ResourceKind::VirtualMachine, name),
            name: name.to_string(),
            location: Some("westeurope".to_string()),
            resource_group_id: rg.to_string(),
            attributes: ResourceAttributes::VirtualMachine(VirtualMachineAttributes {
                status: Some(status.to_string()),
                os: Some(os.to_string()),
                size: Some("Standard_B2s".to_string()),
                public_ip: None,
                disks: Some(2),
            }),
        }
    }

    fn instance(id: i64, type_id: i64, resource: Option<String>, savings: f64) -> RecommendationInstance {
        RecommendationInstance {
            id,
            recommendation_type_id: type_id,
            resource_name: resource
                .as_deref()
                .and_then(|id| id.rsplit('/').next())
                .map(str::to_string),
            resource_id: resource,
            resource_kind_label: Some("Virtual machine".to_string()),
            subscription_id: Some("guid-1".to_string()),
            subscription_name: Some("Contoso".to_string()),
            resource_group_name: Some("RG1".to_string()),
            resource_uri: None,
            potential_savings: savings,
        }
    }

    async fn seeded(store: &ReportStore) {
        let contoso = subscription_id("GUID-1");
        let fabrikam = subscription_id("guid-2");
        store
            .write_subscriptions(&[
                Subscription {
                    id: contoso.clone(),
                    name: "Contoso".to_string(),
                },
                Subscription {
                    id: fabrikam.clone(),
                    name: "Fabrikam".to_string(),
                },
            ])
            .await
            .expect("subscriptions");
        let rg = resource_group_id(&contoso, "RG1");
        store
            .write_resource_groups(&[ResourceGroup {
                id: rg.clone(),
                name: "RG1".to_string(),
                subscription_id: contoso.clone(),
            }])
            .await
            .expect("resource groups");

        let storage = Resource {
            id: resource_id(&rg, ResourceKind::StorageAccount, "logs"),
            name: "logs".to_string(),
            location: Some("northeurope".to_string()),
            resource_group_id: rg.clone(),
            attributes: ResourceAttributes::StorageAccount(StorageAccountAttributes {
                sku: Some("Standard_LRS".to_string()),
                account_kind: Some("StorageV2".to_string()),
            }),
        };
        store
            .write_resources(&[
                vm(&rg, "vm-A", "Running", "Linux"),
                vm(&rg, "vm-B", "Stopped", "Windows"),
                storage,
            ])
            .await
            .expect("resources");

        let types = [
            RecommendationType {
                id: 1,
                text: "Right-size underused VMs".to_string(),
                category: "Cost".to_string(),
                impact: Impact::High,
            },
            RecommendationType {
                id: 2,
                text: "Enable backup".to_string(),
                category: "High Availability".to_string(),
                impact: Impact::Medium,
            },
        ];
        let vm_a = resource_id(&rg, ResourceKind::VirtualMachine, "vm-a");
        let gone = resource_id(&rg, ResourceKind::VirtualMachine, "vm-gone");
        store
            .write_recommendations(
                &types,
                &[
                    instance(1, 1, Some(vm_a.clone()), 1000.0),
                    instance(2, 2, Some(vm_a), 0.0),
                    instance(3, 1, Some(gone), 50.0),
                    instance(4, 2, None, 0.0),
                ],
            )
            .await
            .expect("recommendations");
    }

    #[tokio::test]
    async fn resource_listing_filters_sorts_and_clamps_pages() {
        let store = ReportStore::in_memory().await.expect("store");
        seeded(&store).await;

        let query = ResourceQuery::new()
            .kind(ResourceKind::VirtualMachine)
            .sort_by(ResourceSort::from_param("savings"), SortOrder::Desc);
        let page = store.list_resources(&query).await.expect("list");
        assert_eq!(page.total_items, 2);
        assert_eq!(page.items[0].name, "vm-A");
        assert_eq!(page.items[0].recommendation_count, 2);
        assert_eq!(page.items[0].potential_savings, 1000.0);
        assert_eq!(page.items[1].recommendation_count, 0);

        let running = ResourceQuery::new().filter(ResourceFilter::Status, ["Stopped"]);
        let page = store.list_resources(&running).await.expect("filtered");
        assert_eq!(page.total_items, 1);
        assert_eq!(page.items[0].name, "vm-B");

        let beyond = ResourceQuery::new().page(PageRequest::new(9, 10));
        let page = store.list_resources(&beyond).await.expect("clamped");
        assert_eq!(page.page, 1);
        assert_eq!(page.total_pages, 1);
        assert_eq!(page.items.len(), 3);
        assert_eq!(page.items[0].subscription_name, "Contoso");
    }

    #[tokio::test]
    async fn get_resource_ignores_identifier_case() {
        let store = ReportStore::in_memory().await.expect("store");
        seeded(&store).await;

        let id = "GUID-1/resourceGroups/RG1/providers/Microsoft.Compute/virtualMachines/VM-A";
        let resource = store.get_resource(id).await.expect("get").expect("present");
        assert_eq!(resource.kind, ResourceKind::VirtualMachine);
        assert_eq!(resource.resource_group_name, "RG1");

        let recommendations = store.recommendations_for_resource(id).await.expect("recs");
        assert_eq!(recommendations.len(), 2);
        assert_eq!(recommendations[0].impact, Impact::High);
        assert!(store.get_resource("guid-1/nothing").await.expect("get").is_none());
    }

    #[tokio::test]
    async fn dangling_recommendations_are_flagged_not_hidden() {
        let store = ReportStore::in_memory().await.expect("store");
        seeded(&store).await;

        let page = store
            .list_recommendations(&RecommendationQuery::new())
            .await
            .expect("list");
        assert_eq!(page.total_items, 4);
        assert_eq!(page.items[0].potential_savings, 1000.0);
        assert!(page.items[0].resource_imported);
        assert_eq!(page.items[0].resource_display(), "vm-A");

        let dangling = page.items.iter().find(|row| row.id == 3).expect("row 3");
        assert!(!dangling.resource_imported);
        assert_eq!(dangling.resource_display(), RESOURCE_NOT_IMPORTED);

        let cost = RecommendationQuery::new().filter(RecommendationFilter::Category, ["cost"]);
        let page = store.list_recommendations(&cost).await.expect("cost");
        assert_eq!(page.total_items, 2);
    }

    #[tokio::test]
    async fn aggregates_cover_categories_impacts_and_subscriptions() {
        let store = ReportStore::in_memory().await.expect("store");
        seeded(&store).await;

        let categories = store.counts_by_category().await.expect("categories");
        assert_eq!(categories.len(), 2);
        assert_eq!(categories[0].count, 2);

        let impacts = store
            .counts_by_impact(Some("high-availability"))
            .await
            .expect("impacts");
        assert_eq!(
            impacts,
            vec![GroupCount {
                label: "Medium".to_string(),
                count: 2
            }]
        );

        let matrix = store
            .counts_by_subscription(Grouping::Impact)
            .await
            .expect("matrix");
        assert_eq!(matrix.columns, vec!["High", "Medium", "Low"]);
        assert_eq!(matrix.rows.len(), 2);
        assert_eq!(matrix.rows[0].counts, vec![2, 2, 0]);
        assert_eq!(matrix.rows[1].subscription_name, "Fabrikam");
        assert_eq!(matrix.rows[1].counts, vec![0, 0, 0]);
        assert_eq!(matrix.rows[1].total, 0);

        let distinct = store
            .distinct_resource_values(Some(ResourceKind::VirtualMachine), ResourceFilter::Os)
            .await
            .expect("distinct");
        assert_eq!(distinct, vec!["Linux", "Windows"]);
    }

    #[tokio::test]
    async fn counts_split_linked_dangling_and_unresolved() {
        let store = ReportStore::in_memory().await.expect("store");
        seeded(&store).await;

        let counts = store.counts().await.expect("counts");
        assert_eq!(counts.subscriptions, 2);
        assert_eq!(counts.resource_groups, 1);
        assert_eq!(counts.virtual_machines, 2);
        assert_eq!(counts.storage_accounts, 1);
        assert_eq!(counts.recommendation_types, 2);
        assert_eq!(counts.recommendation_instances, 4);
        assert_eq!(counts.linked_instances, 2);
        assert_eq!(counts.dangling_instances, 1);
        assert_eq!(counts.unresolved_instances, 1);
    }

    #[tokio::test]
    async fn client_info_and_source_files_round_trip() {
        let store = ReportStore::in_memory().await.expect("store");
        let loaded_at = DateTime::parse_from_rfc3339("2026-10-16T08:00:00Z")
            .expect("ts")
            .with_timezone(&Utc);
        let info = ClientInfo {
            name: "Contoso Ltd".to_string(),
            report_date: "October 16, 2026".to_string(),
            loaded_at,
        };
        store.write_client_info(&info).await.expect("client info");
        store
            .write_source_files(&[SourceFileRecord {
                kind: "scale_sets".to_string(),
                path: None,
                sha256: None,
                rows_read: 0,
                entities: 0,
                status: SourceStatus::Absent,
            }])
            .await
            .expect("source files");

        assert_eq!(store.client_info().await.expect("read"), Some(info));
        let files = store.source_files().await.expect("files");
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].status, SourceStatus::Absent);
    }

    #[tokio::test]
    async fn publish_replaces_snapshot_and_discard_keeps_it() {
        let dir = tempdir().expect("tempdir");
        let target = dir.path().join("report.db");

        let first = StagedSnapshot::begin(&target).await.expect("begin");
        seeded(first.store()).await;
        let building = first.building_path().to_path_buf();
        assert!(!target.exists());
        first.publish().await.expect("publish");
        assert!(target.exists());
        assert!(!building.exists());

        let handle = SnapshotHandle::new(ReportStore::open(&target).await.expect("open"));
        assert_eq!(handle.current().await.counts().await.expect("counts").subscriptions, 2);

        let second = StagedSnapshot::begin(&target).await.expect("begin");
        let abandoned = second.building_path().to_path_buf();
        second.discard().await;
        assert!(!abandoned.exists());

        let reopened = ReportStore::open(&target).await.expect("reopen");
        assert_eq!(reopened.counts().await.expect("counts").resource_groups, 1);

        let previous = handle.repoint(ReportStore::in_memory().await.expect("empty")).await;
        assert_eq!(previous.counts().await.expect("counts").subscriptions, 2);
        assert_eq!(handle.current().await.counts().await.expect("counts").subscriptions, 0);
    }

    #[test]
    fn building_path_is_a_hidden_sibling() {
        let id = Uuid::nil();
        let path = building_path_for(Path::new("/data/report.db"), id);
        assert_eq!(
            path,
            PathBuf::from(format!("/data/.report.db.{id}.building"))
        );
    }
}
