//! Entity and recommendation linkers plus the lookup context they share.
//!
//! Linkers are pure: they consume decoded records, consult and extend the
//! [`LinkContext`], and return the entities to persist along with counters.
//! Row-level decode failures are logged and counted; only source-level
//! failures (I/O, malformed CSV) abort a stage.

use std::collections::HashMap;

use advisor_adapters::{
    subscription_display_name, AdapterError, AdvisorRecord, ResourceGroupRecord, ResourceRecord,
    SourceError, SubscriptionRecord,
};
use advisor_core::{
    fold_case, resource_group_id, resource_id, resource_id_from_parts, subscription_id, Impact,
    RecommendationInstance, RecommendationType, Resource, ResourceGroup, ResourceKind,
    Subscription,
};
use serde::Serialize;
use tracing::{debug, warn};

/// What a later stage needs to know about a loaded resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRef {
    pub name: String,
    pub kind: ResourceKind,
}

/// Lookup tables built up stage by stage during one load, then dropped.
#[derive(Debug, Clone, Default)]
pub struct LinkContext {
    subscriptions_by_name: HashMap<String, Subscription>,
    subscription_ids: HashMap<String, String>,
    resource_groups: HashMap<(String, String), ResourceGroup>,
    resources: HashMap<String, ResourceRef>,
}

impl LinkContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a subscription by name, ignoring case. Names written in the
    /// `Name (guid)` display form resolve by their name part.
    pub fn subscription(&self, name: &str) -> Option<&Subscription> {
        self.subscriptions_by_name
            .get(&fold_case(name))
            .or_else(|| {
                self.subscriptions_by_name
                    .get(&fold_case(subscription_display_name(name)))
            })
    }

    pub fn subscription_name_for_id(&self, id: &str) -> Option<&str> {
        self.subscription_ids.get(&fold_case(id)).map(String::as_str)
    }

    pub fn resource_group(&self, name: &str, subscription_id: &str) -> Option<&ResourceGroup> {
        self.resource_groups
            .get(&(fold_case(name), fold_case(subscription_id)))
    }

    pub fn resource(&self, id: &str) -> Option<&ResourceRef> {
        self.resources.get(&fold_case(id))
    }

    pub fn resource_group_count(&self) -> usize {
        self.resource_groups.len()
    }

    fn insert_subscription(&mut self, subscription: Subscription) {
        self.subscription_ids
            .insert(subscription.id.clone(), subscription.name.clone());
        self.subscriptions_by_name
            .insert(fold_case(&subscription.name), subscription);
    }
}

/// Per-stage counters for the entity linkers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StageStats {
    pub rows_read: usize,
    pub created: usize,
    /// Rows naming a subscription or resource group outside the snapshot.
    pub orphaned: usize,
    pub duplicates: usize,
    /// Rows that failed to decode (missing required cell, bad number).
    pub invalid: usize,
}

impl StageStats {
    pub fn skipped(&self) -> usize {
        self.orphaned + self.duplicates + self.invalid
    }
}

#[derive(Debug, Clone)]
pub struct StageOutput<T> {
    pub entities: Vec<T>,
    pub stats: StageStats,
}

/// Walk decoded records, counting rows. Undecodable rows and row-level CSV
/// failures are counted as invalid; a failing reader aborts the stage.
fn for_each_record<R, I, F>(records: I, stats: &mut StageStats, stage: &str, mut apply: F) -> Result<(), SourceError>
where
    I: IntoIterator<Item = Result<R, AdapterError>>,
    F: FnMut(R, &mut StageStats),
{
    for record in records {
        stats.rows_read += 1;
        match record {
            Ok(record) => apply(record, stats),
            Err(AdapterError::Source(err)) if !err.is_row_level() => return Err(err),
            Err(err) => {
                warn!(stage, error = %err, "skipping undecodable row");
                stats.invalid += 1;
            }
        }
    }
    Ok(())
}

pub fn link_subscriptions<I>(ctx: &mut LinkContext, records: I) -> Result<StageOutput<Subscription>, SourceError>
where
    I: IntoIterator<Item = Result<SubscriptionRecord, AdapterError>>,
{
    let mut stats = StageStats::default();
    let mut entities = Vec::new();
    for_each_record(records, &mut stats, "subscriptions", |record, stats| {
        let id = match record.native_id.as_deref() {
            Some(native) => subscription_id(native),
            None => {
                warn!(line = record.line, name = %record.name, "subscription has no id; using its name");
                fold_case(&record.name)
            }
        };
        if ctx.subscriptions_by_name.contains_key(&fold_case(&record.name))
            || ctx.subscription_ids.contains_key(&id)
        {
            warn!(line = record.line, name = %record.name, "duplicate subscription skipped");
            stats.duplicates += 1;
            return;
        }
        let subscription = Subscription {
            id,
            name: record.name,
        };
        ctx.insert_subscription(subscription.clone());
        entities.push(subscription);
        stats.created += 1;
    })?;
    Ok(StageOutput { entities, stats })
}

pub fn link_resource_groups<I>(
    ctx: &mut LinkContext,
    records: I,
) -> Result<StageOutput<ResourceGroup>, SourceError>
where
    I: IntoIterator<Item = Result<ResourceGroupRecord, AdapterError>>,
{
    let mut stats = StageStats::default();
    let mut entities = Vec::new();
    for_each_record(records, &mut stats, "resource_groups", |record, stats| {
        let Some(subscription_id) = ctx.subscription(&record.subscription_name).map(|s| s.id.clone()) else {
            debug!(line = record.line, subscription = %record.subscription_name, "resource group outside snapshot");
            stats.orphaned += 1;
            return;
        };
        let key = (fold_case(&record.name), subscription_id.clone());
        if ctx.resource_groups.contains_key(&key) {
            warn!(line = record.line, name = %record.name, "duplicate resource group skipped");
            stats.duplicates += 1;
            return;
        }
        let group = ResourceGroup {
            id: resource_group_id(&subscription_id, &record.name),
            name: record.name,
            subscription_id,
        };
        ctx.resource_groups.insert(key, group.clone());
        entities.push(group);
        stats.created += 1;
    })?;
    Ok(StageOutput { entities, stats })
}

/// Link one kind's inventory rows to their resource groups.
pub fn link_resources<I>(
    ctx: &mut LinkContext,
    kind: ResourceKind,
    records: I,
) -> Result<StageOutput<Resource>, SourceError>
where
    I: IntoIterator<Item = Result<ResourceRecord, AdapterError>>,
{
    let mut stats = StageStats::default();
    let mut entities = Vec::new();
    for_each_record(records, &mut stats, kind.as_str(), |record, stats| {
        let Some(subscription_id) = ctx.subscription(&record.subscription_name).map(|s| s.id.clone()) else {
            debug!(line = record.line, name = %record.name, "resource subscription outside snapshot");
            stats.orphaned += 1;
            return;
        };
        let Some(group_id) = ctx
            .resource_group(&record.resource_group_name, &subscription_id)
            .map(|g| g.id.clone())
        else {
            debug!(line = record.line, name = %record.name, "resource group outside snapshot");
            stats.orphaned += 1;
            return;
        };
        let id = resource_id(&group_id, kind, &record.name);
        if let Some(existing) = ctx.resources.get(&id) {
            warn!(line = record.line, id = %id, existing = %existing.kind, "duplicate resource id skipped");
            stats.duplicates += 1;
            return;
        }
        ctx.resources.insert(
            id.clone(),
            ResourceRef {
                name: record.name.clone(),
                kind,
            },
        );
        entities.push(Resource {
            id,
            name: record.name,
            location: record.location,
            resource_group_id: group_id,
            attributes: record.attributes,
        });
        stats.created += 1;
    })?;
    Ok(StageOutput { entities, stats })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RecommendationStats {
    pub rows_read: usize,
    pub instances: usize,
    pub types: usize,
    /// Instances whose resource was loaded.
    pub linked: usize,
    /// Instances pointing at a resource that was not loaded.
    pub dangling: usize,
    /// Subscription-scope cost rows.
    pub redundant: usize,
    /// Rows missing a subscription, resource group, resource name or type.
    pub unresolvable: usize,
    pub unmapped_kind: usize,
    pub unknown_impact: usize,
    pub invalid: usize,
}

impl RecommendationStats {
    pub fn dropped(&self) -> usize {
        self.rows_read - self.instances
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecommendationPolicy {
    /// Keep rows that cannot be resolved, with no resource reference.
    pub keep_unresolved: bool,
}

#[derive(Debug, Clone)]
pub struct RecommendationOutput {
    pub types: Vec<RecommendationType>,
    pub instances: Vec<RecommendationInstance>,
    pub stats: RecommendationStats,
}

/// Why a row could not be given a candidate resource id.
enum Unresolved {
    MissingField,
    UnmappedKind,
}

fn candidate_resource_id(record: &AdvisorRecord) -> Result<String, Unresolved> {
    let (Some(subscription), Some(group), Some(name), Some(label)) = (
        record.subscription_id.as_deref(),
        record.resource_group.as_deref(),
        record.resource_name.as_deref(),
        record.resource_type.as_deref(),
    ) else {
        return Err(Unresolved::MissingField);
    };
    let kind = ResourceKind::from_label(label).ok_or(Unresolved::UnmappedKind)?;
    Ok(resource_id_from_parts(&subscription_id(subscription), group, kind, name))
}

#[derive(Debug, Default)]
struct TypeCatalog {
    by_text: HashMap<String, i64>,
    types: Vec<RecommendationType>,
}

impl TypeCatalog {
    /// The first row seen for a text fixes its category and impact.
    fn intern(&mut self, record: &AdvisorRecord, stats: &mut RecommendationStats) -> i64 {
        if let Some(id) = self.by_text.get(&record.recommendation) {
            return *id;
        }
        let impact = match record.impact.as_deref().map(str::parse::<Impact>) {
            Some(Ok(impact)) => impact,
            other => {
                warn!(
                    line = record.line,
                    impact = ?record.impact,
                    parsed = other.is_some(),
                    "unknown business impact; using Low"
                );
                stats.unknown_impact += 1;
                Impact::Low
            }
        };
        let id = self.types.len() as i64 + 1;
        self.types.push(RecommendationType {
            id,
            text: record.recommendation.clone(),
            category: record.category.clone(),
            impact,
        });
        self.by_text.insert(record.recommendation.clone(), id);
        id
    }
}

pub fn link_recommendations<I>(
    ctx: &LinkContext,
    policy: RecommendationPolicy,
    records: I,
) -> Result<RecommendationOutput, SourceError>
where
    I: IntoIterator<Item = Result<AdvisorRecord, AdapterError>>,
{
    let mut stats = RecommendationStats::default();
    let mut catalog = TypeCatalog::default();
    let mut instances = Vec::new();

    for record in records {
        stats.rows_read += 1;
        let record = match record {
            Ok(record) => record,
            Err(AdapterError::Source(err)) if !err.is_row_level() => return Err(err),
            Err(err) => {
                warn!(stage = "advisor", error = %err, "skipping undecodable row");
                stats.invalid += 1;
                continue;
            }
        };

        if record.is_subscription_scope() && record.is_cost() {
            stats.redundant += 1;
            continue;
        }

        let candidate = match candidate_resource_id(&record) {
            Ok(id) => Some(id),
            Err(reason) => {
                match reason {
                    Unresolved::MissingField => stats.unresolvable += 1,
                    Unresolved::UnmappedKind => {
                        debug!(line = record.line, kind = ?record.resource_type, "no provider namespace for kind");
                        stats.unmapped_kind += 1;
                    }
                }
                if !policy.keep_unresolved {
                    continue;
                }
                None
            }
        };

        let type_id = catalog.intern(&record, &mut stats);
        let loaded = candidate.as_deref().and_then(|id| ctx.resource(id));
        match (&candidate, loaded) {
            (Some(_), Some(_)) => stats.linked += 1,
            (Some(_), None) => stats.dangling += 1,
            (None, _) => {}
        }

        let owner_id = record.subscription_id.as_deref().map(subscription_id);
        let subscription_name = record.subscription_name.clone().or_else(|| {
            owner_id
                .as_deref()
                .and_then(|id| ctx.subscription_name_for_id(id))
                .map(str::to_string)
        });
        instances.push(RecommendationInstance {
            id: instances.len() as i64 + 1,
            recommendation_type_id: type_id,
            resource_id: candidate,
            resource_kind_label: record.resource_type.clone(),
            subscription_id: owner_id,
            subscription_name,
            resource_group_name: record.resource_group.clone(),
            resource_name: loaded
                .map(|resource| resource.name.clone())
                .or_else(|| record.resource_name.clone()),
            resource_uri: record.resource_uri.clone(),
            potential_savings: record.potential_savings,
        });
    }

    stats.instances = instances.len();
    stats.types = catalog.types.len();
    Ok(RecommendationOutput {
        types: catalog.types,
        instances,
        stats,
    })
}
