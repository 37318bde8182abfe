use std::collections::HashMap;

use advisor_core::{fold_case, Impact, Page, PageRequest, ResourceKind};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite};

use crate::{ReportStore, StoreError};

/// Shown in place of a resource name when a recommendation points at a
/// resource that was never loaded.
pub const RESOURCE_NOT_IMPORTED: &str = "resource not imported";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn from_param(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("desc") {
            SortOrder::Desc
        } else {
            SortOrder::Asc
        }
    }

    fn sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Columns of `resource_overview` that may be filtered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceFilter {
    Location,
    Status,
    Os,
    Size,
    Sku,
    AccountKind,
    Subscription,
    ResourceGroup,
}

impl ResourceFilter {
    pub const ALL: [ResourceFilter; 8] = [
        ResourceFilter::Location,
        ResourceFilter::Status,
        ResourceFilter::Os,
        ResourceFilter::Size,
        ResourceFilter::Sku,
        ResourceFilter::AccountKind,
        ResourceFilter::Subscription,
        ResourceFilter::ResourceGroup,
    ];

    pub fn from_param(value: &str) -> Option<Self> {
        let value = fold_case(value);
        Self::ALL.into_iter().find(|filter| filter.param() == value)
    }

    pub fn param(self) -> &'static str {
        match self {
            ResourceFilter::Location => "location",
            ResourceFilter::Status => "status",
            ResourceFilter::Os => "os",
            ResourceFilter::Size => "size",
            ResourceFilter::Sku => "sku",
            ResourceFilter::AccountKind => "account_kind",
            ResourceFilter::Subscription => "subscription",
            ResourceFilter::ResourceGroup => "resource_group",
        }
    }

    fn column(self) -> &'static str {
        match self {
            ResourceFilter::Subscription => "subscription_name",
            ResourceFilter::ResourceGroup => "resource_group_name",
            other => other.param(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceSort {
    #[default]
    Name,
    Location,
    Status,
    Os,
    Size,
    Instances,
    Disks,
    RecommendationCount,
    PotentialSavings,
}

impl ResourceSort {
    /// Unknown columns sort by name.
    pub fn from_param(value: &str) -> Self {
        match fold_case(value).as_str() {
            "location" => ResourceSort::Location,
            "status" => ResourceSort::Status,
            "os" => ResourceSort::Os,
            "size" => ResourceSort::Size,
            "instances" => ResourceSort::Instances,
            "disks" => ResourceSort::Disks,
            "recommendation_count" | "recommendations" => ResourceSort::RecommendationCount,
            "potential_savings" | "savings" => ResourceSort::PotentialSavings,
            _ => ResourceSort::Name,
        }
    }

    fn column(self) -> &'static str {
        match self {
            ResourceSort::Name => "name",
            ResourceSort::Location => "location",
            ResourceSort::Status => "status",
            ResourceSort::Os => "os",
            ResourceSort::Size => "size",
            ResourceSort::Instances => "instances",
            ResourceSort::Disks => "disks",
            ResourceSort::RecommendationCount => "recommendation_count",
            ResourceSort::PotentialSavings => "potential_savings",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceQuery {
    pub kind: Option<ResourceKind>,
    pub filters: Vec<(ResourceFilter, Vec<String>)>,
    pub sort: ResourceSort,
    pub order: SortOrder,
    pub page: PageRequest,
}

impl ResourceQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(mut self, kind: ResourceKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Keep rows whose column equals any of `values`. Empty value lists are ignored.
    pub fn filter<I, S>(mut self, filter: ResourceFilter, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        if !values.is_empty() {
            self.filters.push((filter, values));
        }
        self
    }

    pub fn sort_by(mut self, sort: ResourceSort, order: SortOrder) -> Self {
        self.sort = sort;
        self.order = order;
        self
    }

    pub fn page(mut self, page: PageRequest) -> Self {
        self.page = page;
        self
    }
}

/// One row of the resource listing: the resource, where it lives, and its
/// recommendation totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSummary {
    pub id: String,
    pub kind: ResourceKind,
    pub name: String,
    pub location: Option<String>,
    pub resource_group_id: String,
    pub resource_group_name: String,
    pub subscription_id: String,
    pub subscription_name: String,
    pub status: Option<String>,
    pub os: Option<String>,
    pub size: Option<String>,
    pub public_ip: Option<String>,
    pub disks: Option<i64>,
    pub instances: Option<i64>,
    pub provisioning_state: Option<String>,
    pub orchestration_mode: Option<String>,
    pub sku: Option<String>,
    pub account_kind: Option<String>,
    pub recommendation_count: i64,
    pub potential_savings: f64,
}

impl ResourceSummary {
    fn from_row(row: &SqliteRow) -> Result<Self, StoreError> {
        let kind: String = row.try_get("kind")?;
        Ok(Self {
            id: row.try_get("id")?,
            kind: kind
                .parse()
                .map_err(|err: advisor_core::ParseLabelError| StoreError::Decode(err.to_string()))?,
            name: row.try_get("name")?,
            location: row.try_get("location")?,
            resource_group_id: row.try_get("resource_group_id")?,
            resource_group_name: row.try_get("resource_group_name")?,
            subscription_id: row.try_get("subscription_id")?,
            subscription_name: row.try_get("subscription_name")?,
            status: row.try_get("status")?,
            os: row.try_get("os")?,
            size: row.try_get("size")?,
            public_ip: row.try_get("public_ip")?,
            disks: row.try_get("disks")?,
            instances: row.try_get("instances")?,
            provisioning_state: row.try_get("provisioning_state")?,
            orchestration_mode: row.try_get("orchestration_mode")?,
            sku: row.try_get("sku")?,
            account_kind: row.try_get("account_kind")?,
            recommendation_count: row.try_get("recommendation_count")?,
            potential_savings: row.try_get("potential_savings")?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationFilter {
    Category,
    Impact,
    KindLabel,
    SubscriptionId,
    ResourceId,
}

impl RecommendationFilter {
    pub fn from_param(value: &str) -> Option<Self> {
        match fold_case(value).as_str() {
            "category" => Some(RecommendationFilter::Category),
            "impact" => Some(RecommendationFilter::Impact),
            "kind" | "kind_label" | "type" => Some(RecommendationFilter::KindLabel),
            "subscription" | "subscription_id" => Some(RecommendationFilter::SubscriptionId),
            "resource" | "resource_id" => Some(RecommendationFilter::ResourceId),
            _ => None,
        }
    }

    fn column(self) -> &'static str {
        match self {
            RecommendationFilter::Category => "category",
            RecommendationFilter::Impact => "impact",
            RecommendationFilter::KindLabel => "resource_kind_label",
            RecommendationFilter::SubscriptionId => "subscription_id",
            RecommendationFilter::ResourceId => "resource_id",
        }
    }

    /// Identifier columns hold folded values; label columns compare without case.
    fn is_identifier(self) -> bool {
        matches!(
            self,
            RecommendationFilter::SubscriptionId | RecommendationFilter::ResourceId
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationSort {
    #[default]
    PotentialSavings,
    Impact,
    Category,
    ResourceName,
}

impl RecommendationSort {
    pub fn from_param(value: &str) -> Self {
        match fold_case(value).as_str() {
            "impact" => RecommendationSort::Impact,
            "category" => RecommendationSort::Category,
            "resource_name" | "resource" => RecommendationSort::ResourceName,
            _ => RecommendationSort::PotentialSavings,
        }
    }

    fn column(self) -> &'static str {
        match self {
            RecommendationSort::PotentialSavings => "potential_savings",
            RecommendationSort::Impact => "impact_rank",
            RecommendationSort::Category => "category",
            RecommendationSort::ResourceName => "resource_name",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecommendationQuery {
    pub filters: Vec<(RecommendationFilter, Vec<String>)>,
    pub sort: RecommendationSort,
    pub order: SortOrder,
    pub page: PageRequest,
}

impl Default for RecommendationQuery {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            sort: RecommendationSort::PotentialSavings,
            order: SortOrder::Desc,
            page: PageRequest::default(),
        }
    }
}

impl RecommendationQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter<I, S>(mut self, filter: RecommendationFilter, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        if !values.is_empty() {
            self.filters.push((filter, values));
        }
        self
    }

    pub fn sort_by(mut self, sort: RecommendationSort, order: SortOrder) -> Self {
        self.sort = sort;
        self.order = order;
        self
    }

    pub fn page(mut self, page: PageRequest) -> Self {
        self.page = page;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationRow {
    pub id: i64,
    pub recommendation_type_id: i64,
    pub text: String,
    pub category: String,
    pub impact: Impact,
    pub resource_id: Option<String>,
    pub resource_kind_label: Option<String>,
    pub subscription_id: Option<String>,
    pub subscription_name: Option<String>,
    pub resource_group_name: Option<String>,
    pub resource_name: Option<String>,
    pub resource_uri: Option<String>,
    pub potential_savings: f64,
    /// False when `resource_id` is unset or names a resource that was not loaded.
    pub resource_imported: bool,
}

impl RecommendationRow {
    /// Resource name for display, or [`RESOURCE_NOT_IMPORTED`] for dangling rows.
    pub fn resource_display(&self) -> &str {
        match (&self.resource_name, self.resource_imported) {
            (Some(name), true) => name.as_str(),
            _ => RESOURCE_NOT_IMPORTED,
        }
    }

    fn from_row(row: &SqliteRow) -> Result<Self, StoreError> {
        let impact: String = row.try_get("impact")?;
        let imported: i64 = row.try_get("resource_imported")?;
        Ok(Self {
            id: row.try_get("id")?,
            recommendation_type_id: row.try_get("recommendation_type_id")?,
            text: row.try_get("text")?,
            category: row.try_get("category")?,
            impact: impact
                .parse()
                .map_err(|err: advisor_core::ParseLabelError| StoreError::Decode(err.to_string()))?,
            resource_id: row.try_get("resource_id")?,
            resource_kind_label: row.try_get("resource_kind_label")?,
            subscription_id: row.try_get("subscription_id")?,
            subscription_name: row.try_get("subscription_name")?,
            resource_group_name: row.try_get("resource_group_name")?,
            resource_name: row.try_get("resource_name")?,
            resource_uri: row.try_get("resource_uri")?,
            potential_savings: row.try_get("potential_savings")?,
            resource_imported: imported != 0,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupCount {
    pub label: String,
    pub count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grouping {
    Category,
    Impact,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionCounts {
    pub subscription_id: String,
    pub subscription_name: String,
    /// Aligned with [`SubscriptionBreakdown::columns`].
    pub counts: Vec<i64>,
    pub total: i64,
}

/// Recommendation counts per subscription, one column per category or impact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionBreakdown {
    pub columns: Vec<String>,
    pub rows: Vec<SubscriptionCounts>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreCounts {
    pub subscriptions: i64,
    pub resource_groups: i64,
    pub virtual_machines: i64,
    pub scale_sets: i64,
    pub storage_accounts: i64,
    pub recommendation_types: i64,
    pub recommendation_instances: i64,
    pub linked_instances: i64,
    pub dangling_instances: i64,
    pub unresolved_instances: i64,
}

fn push_resource_where(builder: &mut QueryBuilder<'_, Sqlite>, query: &ResourceQuery) {
    builder.push(" WHERE 1 = 1");
    if let Some(kind) = query.kind {
        builder.push(" AND kind = ").push_bind(kind.as_str());
    }
    for (filter, values) in &query.filters {
        builder.push(" AND ").push(filter.column()).push(" IN (");
        let mut separated = builder.separated(", ");
        for value in values {
            separated.push_bind(value.clone());
        }
        separated.push_unseparated(")");
    }
}

fn push_recommendation_where(builder: &mut QueryBuilder<'_, Sqlite>, query: &RecommendationQuery) {
    builder.push(" WHERE 1 = 1");
    for (filter, values) in &query.filters {
        if filter.is_identifier() {
            builder.push(" AND ").push(filter.column()).push(" IN (");
        } else {
            builder.push(" AND lower(").push(filter.column()).push(") IN (");
        }
        let mut separated = builder.separated(", ");
        for value in values {
            separated.push_bind(fold_case(value));
        }
        separated.push_unseparated(")");
    }
}

fn to_usize(value: i64) -> usize {
    usize::try_from(value).unwrap_or_default()
}

fn to_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

const IMPACT_COLUMNS: [Impact; 3] = [Impact::High, Impact::Medium, Impact::Low];

impl ReportStore {
    /// Filtered, sorted page of resources. Out-of-range pages are clamped.
    pub async fn list_resources(&self, query: &ResourceQuery) -> Result<Page<ResourceSummary>, StoreError> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM resource_overview");
        push_resource_where(&mut count, query);
        let total_items = to_usize(count.build_query_scalar::<i64>().fetch_one(&self.pool).await?);

        let page = query.page;
        let mut select = QueryBuilder::<Sqlite>::new("SELECT * FROM resource_overview");
        push_resource_where(&mut select, query);
        select
            .push(" ORDER BY ")
            .push(query.sort.column())
            .push(" ")
            .push(query.order.sql())
            .push(", name ASC, id ASC LIMIT ")
            .push_bind(to_i64(page.per_page))
            .push(" OFFSET ")
            .push_bind(to_i64(page.offset(total_items)));
        let rows = select.build().fetch_all(&self.pool).await?;
        let items = rows
            .iter()
            .map(ResourceSummary::from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page {
            items,
            page: page.clamped_page(total_items),
            per_page: page.per_page,
            total_items,
            total_pages: page.total_pages(total_items),
        })
    }

    /// Look up a resource by identifier, ignoring case.
    pub async fn get_resource(&self, id: &str) -> Result<Option<ResourceSummary>, StoreError> {
        let row = sqlx::query("SELECT * FROM resource_overview WHERE id = ?")
            .bind(fold_case(id))
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(ResourceSummary::from_row).transpose()
    }

    pub async fn recommendations_for_resource(&self, id: &str) -> Result<Vec<RecommendationRow>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM recommendation_overview WHERE resource_id = ? ORDER BY impact_rank DESC, potential_savings DESC, id ASC",
        )
        .bind(fold_case(id))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(RecommendationRow::from_row).collect()
    }

    pub async fn list_recommendations(
        &self,
        query: &RecommendationQuery,
    ) -> Result<Page<RecommendationRow>, StoreError> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM recommendation_overview");
        push_recommendation_where(&mut count, query);
        let total_items = to_usize(count.build_query_scalar::<i64>().fetch_one(&self.pool).await?);

        let page = query.page;
        let mut select = QueryBuilder::<Sqlite>::new("SELECT * FROM recommendation_overview");
        push_recommendation_where(&mut select, query);
        select
            .push(" ORDER BY ")
            .push(query.sort.column())
            .push(" ")
            .push(query.order.sql())
            .push(", id ASC LIMIT ")
            .push_bind(to_i64(page.per_page))
            .push(" OFFSET ")
            .push_bind(to_i64(page.offset(total_items)));
        let rows = select.build().fetch_all(&self.pool).await?;
        let items = rows
            .iter()
            .map(RecommendationRow::from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page {
            items,
            page: page.clamped_page(total_items),
            per_page: page.per_page,
            total_items,
            total_pages: page.total_pages(total_items),
        })
    }

    /// Sorted non-null values of a filterable resource column, for building filter choices.
    pub async fn distinct_resource_values(
        &self,
        kind: Option<ResourceKind>,
        column: ResourceFilter,
    ) -> Result<Vec<String>, StoreError> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT DISTINCT ");
        builder
            .push(column.column())
            .push(" FROM resource_overview WHERE ")
            .push(column.column())
            .push(" IS NOT NULL");
        if let Some(kind) = kind {
            builder.push(" AND kind = ").push_bind(kind.as_str());
        }
        builder.push(" ORDER BY ").push(column.column());
        Ok(builder.build_query_scalar::<String>().fetch_all(&self.pool).await?)
    }

    pub async fn distinct_recommendation_values(
        &self,
        column: RecommendationFilter,
    ) -> Result<Vec<String>, StoreError> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT DISTINCT ");
        builder
            .push(column.column())
            .push(" FROM recommendation_overview WHERE ")
            .push(column.column())
            .push(" IS NOT NULL ORDER BY ")
            .push(column.column());
        Ok(builder.build_query_scalar::<String>().fetch_all(&self.pool).await?)
    }

    /// Instance counts per category, largest first.
    pub async fn counts_by_category(&self) -> Result<Vec<GroupCount>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT category AS label, COUNT(*) AS count
              FROM recommendation_overview
             GROUP BY category
             ORDER BY count DESC, label ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| -> Result<GroupCount, StoreError> {
                Ok(GroupCount {
                    label: row.try_get("label")?,
                    count: row.try_get("count")?,
                })
            })
            .collect()
    }

    /// Instance counts per impact, highest impact first. `category` is matched
    /// without case, with `-` standing in for a space.
    pub async fn counts_by_impact(&self, category: Option<&str>) -> Result<Vec<GroupCount>, StoreError> {
        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT impact AS label, impact_rank, COUNT(*) AS count FROM recommendation_overview",
        );
        if let Some(category) = category {
            builder
                .push(" WHERE lower(category) = ")
                .push_bind(fold_case(&category.replace('-', " ")));
        }
        builder.push(" GROUP BY impact, impact_rank ORDER BY impact_rank DESC");
        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| -> Result<GroupCount, StoreError> {
                Ok(GroupCount {
                    label: row.try_get("label")?,
                    count: row.try_get("count")?,
                })
            })
            .collect()
    }

    /// Every subscription with its recommendation counts split by `grouping`.
    /// Subscriptions without recommendations get a row of zeros.
    pub async fn counts_by_subscription(&self, grouping: Grouping) -> Result<SubscriptionBreakdown, StoreError> {
        let columns: Vec<String> = match grouping {
            Grouping::Impact => IMPACT_COLUMNS.iter().map(|impact| impact.label().to_string()).collect(),
            Grouping::Category => {
                sqlx::query_scalar::<_, String>(
                    "SELECT DISTINCT category FROM recommendation_types ORDER BY category",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };
        let group_column = match grouping {
            Grouping::Category => "category",
            Grouping::Impact => "impact",
        };

        let mut builder = QueryBuilder::<Sqlite>::new("SELECT subscription_id, ");
        builder
            .push(group_column)
            .push(" AS label, COUNT(*) AS count FROM recommendation_overview WHERE subscription_id IS NOT NULL GROUP BY subscription_id, ")
            .push(group_column);
        let grouped = builder.build().fetch_all(&self.pool).await?;

        let mut cells: HashMap<(String, String), i64> = HashMap::new();
        for row in &grouped {
            let subscription_id: String = row.try_get("subscription_id")?;
            let label: String = row.try_get("label")?;
            let count: i64 = row.try_get("count")?;
            cells.insert((subscription_id, label), count);
        }

        let subscriptions = sqlx::query("SELECT id, name FROM subscriptions ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        let mut rows = Vec::with_capacity(subscriptions.len());
        for subscription in &subscriptions {
            let subscription_id: String = subscription.try_get("id")?;
            let counts: Vec<i64> = columns
                .iter()
                .map(|label| {
                    cells
                        .get(&(subscription_id.clone(), label.clone()))
                        .copied()
                        .unwrap_or(0)
                })
                .collect();
            rows.push(SubscriptionCounts {
                total: counts.iter().sum(),
                subscription_name: subscription.try_get("name")?,
                subscription_id,
                counts,
            });
        }

        Ok(SubscriptionBreakdown { columns, rows })
    }

    pub async fn counts(&self) -> Result<StoreCounts, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM subscriptions) AS subscriptions,
                (SELECT COUNT(*) FROM resource_groups) AS resource_groups,
                (SELECT COUNT(*) FROM virtual_machines) AS virtual_machines,
                (SELECT COUNT(*) FROM scale_sets) AS scale_sets,
                (SELECT COUNT(*) FROM storage_accounts) AS storage_accounts,
                (SELECT COUNT(*) FROM recommendation_types) AS recommendation_types,
                (SELECT COUNT(*) FROM recommendation_overview) AS recommendation_instances,
                (SELECT COUNT(*) FROM recommendation_overview WHERE resource_imported = 1) AS linked_instances,
                (SELECT COUNT(*) FROM recommendation_overview
                  WHERE resource_id IS NOT NULL AND resource_imported = 0) AS dangling_instances,
                (SELECT COUNT(*) FROM recommendation_overview WHERE resource_id IS NULL) AS unresolved_instances
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(StoreCounts {
            subscriptions: row.try_get("subscriptions")?,
            resource_groups: row.try_get("resource_groups")?,
            virtual_machines: row.try_get("virtual_machines")?,
            scale_sets: row.try_get("scale_sets")?,
            storage_accounts: row.try_get("storage_accounts")?,
            recommendation_types: row.try_get("recommendation_types")?,
            recommendation_instances: row.try_get("recommendation_instances")?,
            linked_instances: row.try_get("linked_instances")?,
            dangling_instances: row.try_get("dangling_instances")?,
            unresolved_instances: row.try_get("unresolved_instances")?,
        })
    }
}
