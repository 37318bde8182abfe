//! Load orchestration: turns a directory of inventory exports plus an advisor
//! export into a freshly published report snapshot.

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use advisor_adapters::{
    decode_rows, hash_file, AdvisorAdapter, CsvSource, ResourceAdapter, ResourceGroupAdapter,
    SourceAdapter, SourceError, SourceKind, SubscriptionAdapter,
};
use advisor_core::{ClientInfo, ResourceKind};
use advisor_storage::{ReportStore, SourceFileRecord, SourceStatus, StagedSnapshot, StoreError};
use chrono::{DateTime, Local, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tracing::{info, info_span, warn, Instrument};

mod link;

pub use link::{
    link_recommendations, link_resource_groups, link_resources, link_subscriptions, LinkContext,
    RecommendationOutput, RecommendationPolicy, RecommendationStats, ResourceRef, StageOutput,
    StageStats,
};

pub const CRATE_NAME: &str = "advisor-seed";

pub const DEFAULT_ADVISOR_PREFIX: &str = "Advisor";
static REPORT_DATE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_(\d{4}-\d{2}-\d{2})T").expect("valid report date pattern"));
const REPORT_DATE_FORMAT: &str = "%B %d, %Y";

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("required source `{}` not found at {}", .kind.as_str(), .path.display())]
    MissingSource { kind: SourceKind, path: PathBuf },
    #[error("no advisor export matching `{prefix}*.csv` in {}", .dir.display())]
    NoAdvisorFile { dir: PathBuf, prefix: String },
    #[error("source `{0}` is required and cannot be disabled")]
    RequiredSourceDisabled(&'static str),
    #[error("parsing source registry {}: {source}", .path.display())]
    Registry {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedConfig {
    pub input_dir: PathBuf,
    pub database_path: PathBuf,
    pub keep_unresolved: bool,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self::new(".", "report.db")
    }
}

impl SeedConfig {
    pub fn new(input_dir: impl Into<PathBuf>, database_path: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            database_path: database_path.into(),
            keep_unresolved: false,
        }
    }

    pub fn from_env() -> Self {
        Self {
            input_dir: std::env::var("ADVISOR_INPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".")),
            database_path: std::env::var("ADVISOR_DATABASE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("report.db")),
            keep_unresolved: std::env::var("ADVISOR_KEEP_UNRESOLVED")
                .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "True"))
                .unwrap_or(false),
        }
    }
}

/// Optional `sources.yaml` beside the exports.
///
/// ```yaml
/// advisor_prefix: Advisor
/// sources:
///   - kind: virtual_machines
///     file: VMs.csv
///   - kind: scale_sets
///     enabled: false
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceRegistry {
    #[serde(default)]
    pub advisor_prefix: Option<String>,
    #[serde(default)]
    pub sources: Vec<SourceOverride>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceOverride {
    pub kind: SourceKind,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl SourceRegistry {
    pub const FILE_NAME: &'static str = "sources.yaml";

    /// Read the registry from `dir`, or the built-in defaults when there is none.
    pub async fn load(dir: &Path) -> Result<Self, SeedError> {
        let path = dir.join(Self::FILE_NAME);
        let text = match fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => return Err(SourceError::Io { path, source }.into()),
        };
        let registry: Self =
            serde_yaml::from_str(&text).map_err(|source| SeedError::Registry { path, source })?;
        registry.validate()?;
        Ok(registry)
    }

    pub fn validate(&self) -> Result<(), SeedError> {
        match self
            .sources
            .iter()
            .find(|entry| !entry.enabled && entry.kind.is_required())
        {
            Some(entry) => Err(SeedError::RequiredSourceDisabled(entry.kind.as_str())),
            None => Ok(()),
        }
    }

    fn entry(&self, kind: SourceKind) -> Option<&SourceOverride> {
        self.sources.iter().rev().find(|entry| entry.kind == kind)
    }

    pub fn is_enabled(&self, kind: SourceKind) -> bool {
        self.entry(kind).map_or(true, |entry| entry.enabled)
    }

    /// Configured file name; `None` for the advisor export unless pinned here.
    pub fn file_name(&self, kind: SourceKind) -> Option<String> {
        self.entry(kind)
            .and_then(|entry| entry.file.clone())
            .or_else(|| kind.default_file_name().map(str::to_string))
    }

    pub fn advisor_prefix(&self) -> &str {
        self.advisor_prefix
            .as_deref()
            .unwrap_or(DEFAULT_ADVISOR_PREFIX)
    }
}

/// The latest `{prefix}*.csv` in `dir`. Export names embed an ISO timestamp,
/// so the lexicographically greatest name is the newest.
pub async fn discover_advisor_file(dir: &Path, prefix: &str) -> Result<Option<PathBuf>, SeedError> {
    let io_err = |source| SourceError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut entries = fs::read_dir(dir).await.map_err(io_err)?;
    let mut best: Option<(String, PathBuf)> = None;
    while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with(prefix) || !name.to_ascii_lowercase().ends_with(".csv") {
            continue;
        }
        if !entry.file_type().await.map_err(io_err)?.is_file() {
            continue;
        }
        if best.as_ref().map_or(true, |(current, _)| name > *current) {
            best = Some((name, entry.path()));
        }
    }
    Ok(best.map(|(_, path)| path))
}

/// The `_YYYY-MM-DDT` date embedded in an advisor export name, if any.
pub fn report_date_from_file_name(file_name: &str) -> Option<NaiveDate> {
    REPORT_DATE_PATTERN
        .captures(file_name)
        .and_then(|caps| caps.get(1))
        .and_then(|token| NaiveDate::parse_from_str(token.as_str(), "%Y-%m-%d").ok())
}

/// Human-readable report date, e.g. `March 05, 2024`. Falls back to `today`.
pub fn format_report_date(file_name: &str, today: NaiveDate) -> String {
    report_date_from_file_name(file_name)
        .unwrap_or(today)
        .format(REPORT_DATE_FORMAT)
        .to_string()
}

#[derive(Debug, Clone, Serialize)]
pub struct SeedSummary {
    pub client_name: String,
    pub report_date: String,
    pub database_path: PathBuf,
    pub advisor_file: PathBuf,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub subscriptions: StageStats,
    pub resource_groups: StageStats,
    pub resources: BTreeMap<ResourceKind, StageStats>,
    pub recommendations: RecommendationStats,
    pub sources: Vec<SourceFileRecord>,
}

impl SeedSummary {
    pub fn resources_created(&self) -> usize {
        self.resources.values().map(|stats| stats.created).sum()
    }
}

impl fmt::Display for SeedSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} ({}) -> {}",
            self.client_name,
            self.report_date,
            self.database_path.display()
        )?;
        writeln!(
            f,
            "  subscriptions: {} ({} skipped)",
            self.subscriptions.created,
            self.subscriptions.skipped()
        )?;
        writeln!(
            f,
            "  resource groups: {} ({} skipped)",
            self.resource_groups.created,
            self.resource_groups.skipped()
        )?;
        for (kind, stats) in &self.resources {
            writeln!(f, "  {}: {} ({} skipped)", kind.as_str(), stats.created, stats.skipped())?;
        }
        let recs = &self.recommendations;
        writeln!(
            f,
            "  recommendations: {} instances of {} types ({} linked, {} dangling)",
            recs.instances, recs.types, recs.linked, recs.dangling
        )?;
        write!(
            f,
            "  dropped: {} redundant, {} unresolvable, {} unmapped kind, {} invalid; {} unknown impact",
            recs.redundant, recs.unresolvable, recs.unmapped_kind, recs.invalid, recs.unknown_impact
        )
    }
}

fn to_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn unloaded(kind: SourceKind, path: Option<&Path>, status: SourceStatus) -> SourceFileRecord {
    SourceFileRecord {
        kind: kind.as_str().to_string(),
        path: path.map(|p| p.display().to_string()),
        sha256: None,
        rows_read: 0,
        entities: 0,
        status,
    }
}

fn loaded(kind: SourceKind, path: &Path, sha256: String, rows_read: usize, entities: usize) -> SourceFileRecord {
    SourceFileRecord {
        kind: kind.as_str().to_string(),
        path: Some(path.display().to_string()),
        sha256: Some(sha256),
        rows_read: to_i64(rows_read),
        entities: to_i64(entities),
        status: SourceStatus::Loaded,
    }
}

/// Open a source that must exist and carry the adapter's columns.
fn open_required<A: SourceAdapter>(adapter: &A, path: &Path) -> Result<CsvSource, SeedError> {
    let source = CsvSource::open(path)?.ok_or_else(|| SeedError::MissingSource {
        kind: adapter.source(),
        path: path.to_path_buf(),
    })?;
    source.require_columns(adapter.required_columns())?;
    Ok(source)
}

/// Mandatory sources, opened and header-checked before anything is written.
struct RequiredSources {
    subscriptions: CsvSource,
    resource_groups: CsvSource,
    advisor: CsvSource,
}

pub struct SeedPipeline {
    config: SeedConfig,
}

impl SeedPipeline {
    pub fn new(config: SeedConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SeedConfig {
        &self.config
    }

    /// Build a complete snapshot for `client_name` and publish it over the
    /// configured database. On error the previously published snapshot is
    /// left untouched.
    pub async fn run(&self, client_name: &str) -> Result<SeedSummary, SeedError> {
        let started_at = Utc::now();
        let dir = &self.config.input_dir;
        let registry = SourceRegistry::load(dir).await?;

        let advisor_path = match registry.file_name(SourceKind::Advisor) {
            Some(name) => dir.join(name),
            None => discover_advisor_file(dir, registry.advisor_prefix())
                .await?
                .ok_or_else(|| SeedError::NoAdvisorFile {
                    dir: dir.clone(),
                    prefix: registry.advisor_prefix().to_string(),
                })?,
        };
        let advisor_name = advisor_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let report_date = format_report_date(&advisor_name, Local::now().date_naive());

        let required = RequiredSources {
            subscriptions: open_required(&SubscriptionAdapter, &self.path_for(&registry, SourceKind::Subscriptions))?,
            resource_groups: open_required(&ResourceGroupAdapter, &self.path_for(&registry, SourceKind::ResourceGroups))?,
            advisor: open_required(&AdvisorAdapter, &advisor_path)?,
        };
        info!(
            client = client_name,
            report_date = %report_date,
            advisor = %advisor_path.display(),
            "starting load"
        );

        let staged = StagedSnapshot::begin(&self.config.database_path).await?;
        let outcome = self
            .load(staged.store(), &registry, required, client_name, &report_date)
            .await;
        match outcome {
            Ok(mut summary) => {
                summary.database_path = staged.publish().await?;
                summary.started_at = started_at;
                summary.finished_at = Utc::now();
                info!(
                    instances = summary.recommendations.instances,
                    resources = summary.resources_created(),
                    "load complete"
                );
                Ok(summary)
            }
            Err(err) => {
                warn!(error = %err, "load failed; discarding staged snapshot");
                staged.discard().await;
                Err(err)
            }
        }
    }

    fn path_for(&self, registry: &SourceRegistry, kind: SourceKind) -> PathBuf {
        let name = registry
            .file_name(kind)
            .unwrap_or_else(|| kind.as_str().to_string());
        self.config.input_dir.join(name)
    }

    async fn load(
        &self,
        store: &ReportStore,
        registry: &SourceRegistry,
        required: RequiredSources,
        client_name: &str,
        report_date: &str,
    ) -> Result<SeedSummary, SeedError> {
        let mut ctx = LinkContext::new();
        let mut files = Vec::new();
        let advisor_file = required.advisor.path().to_path_buf();
        let RequiredSources {
            subscriptions: subscription_source,
            resource_groups: group_source,
            advisor: advisor_source,
        } = required;

        let subscriptions = async {
            let source = subscription_source;
            let path = source.path().to_path_buf();
            let sha256 = hash_file(&path)?;
            let out = link_subscriptions(&mut ctx, decode_rows(&SubscriptionAdapter, source.rows()))?;
            store.write_subscriptions(&out.entities).await?;
            log_stage(&out.stats);
            files.push(loaded(SourceKind::Subscriptions, &path, sha256, out.stats.rows_read, out.stats.created));
            Ok::<_, SeedError>(out.stats)
        }
        .instrument(info_span!("stage", kind = SourceKind::Subscriptions.as_str()))
        .await?;

        let resource_groups = async {
            let source = group_source;
            let path = source.path().to_path_buf();
            let sha256 = hash_file(&path)?;
            let out = link_resource_groups(&mut ctx, decode_rows(&ResourceGroupAdapter, source.rows()))?;
            store.write_resource_groups(&out.entities).await?;
            log_stage(&out.stats);
            files.push(loaded(SourceKind::ResourceGroups, &path, sha256, out.stats.rows_read, out.stats.created));
            Ok::<_, SeedError>(out.stats)
        }
        .instrument(info_span!("stage", kind = SourceKind::ResourceGroups.as_str()))
        .await?;

        let mut resources = BTreeMap::new();
        for kind in ResourceKind::ALL {
            let adapter = ResourceAdapter::new(kind);
            let source_kind = adapter.source();
            let path = registry
                .is_enabled(source_kind)
                .then(|| self.path_for(registry, source_kind));
            let (stats, record) = self
                .load_resources(store, &mut ctx, adapter, path)
                .instrument(info_span!("stage", kind = source_kind.as_str()))
                .await?;
            resources.insert(kind, stats);
            files.push(record);
        }

        let policy = RecommendationPolicy {
            keep_unresolved: self.config.keep_unresolved,
        };
        let recommendations = async {
            let source = advisor_source;
            let path = source.path().to_path_buf();
            let sha256 = hash_file(&path)?;
            let out = link_recommendations(&ctx, policy, decode_rows(&AdvisorAdapter, source.rows()))?;
            store.write_recommendations(&out.types, &out.instances).await?;
            log_recommendations(&out.stats);
            files.push(loaded(SourceKind::Advisor, &path, sha256, out.stats.rows_read, out.stats.instances));
            Ok::<_, SeedError>(out.stats)
        }
        .instrument(info_span!("stage", kind = SourceKind::Advisor.as_str()))
        .await?;

        store
            .write_client_info(&ClientInfo {
                name: client_name.to_string(),
                report_date: report_date.to_string(),
                loaded_at: Utc::now(),
            })
            .await?;
        store.write_source_files(&files).await?;

        Ok(SeedSummary {
            client_name: client_name.to_string(),
            report_date: report_date.to_string(),
            database_path: self.config.database_path.clone(),
            advisor_file,
            started_at: Utc::now(),
            finished_at: Utc::now(),
            subscriptions,
            resource_groups,
            resources,
            recommendations,
            sources: files,
        })
    }

    /// One optional inventory stage. Absent, disabled, or headerless files
    /// yield no resources of that kind but never fail the load.
    async fn load_resources(
        &self,
        store: &ReportStore,
        ctx: &mut LinkContext,
        adapter: ResourceAdapter,
        path: Option<PathBuf>,
    ) -> Result<(StageStats, SourceFileRecord), SeedError> {
        let kind = adapter.source();
        let Some(path) = path else {
            info!("source disabled in registry");
            return Ok((StageStats::default(), unloaded(kind, None, SourceStatus::Disabled)));
        };
        let rejected = |err: SourceError| {
            warn!(error = %err, "optional source unusable; loading none of this kind");
            (StageStats::default(), unloaded(kind, Some(&path), SourceStatus::Rejected))
        };
        let source = match CsvSource::open(&path) {
            Ok(Some(source)) => source,
            Ok(None) => {
                warn!(path = %path.display(), "optional source absent; loading none of this kind");
                return Ok((StageStats::default(), unloaded(kind, Some(&path), SourceStatus::Absent)));
            }
            Err(err) => return Ok(rejected(err)),
        };
        if let Err(err) = source.require_columns(adapter.required_columns()) {
            return Ok(rejected(err));
        }

        let sha256 = match hash_file(&path) {
            Ok(sha256) => sha256,
            Err(err) => return Ok(rejected(err)),
        };
        // Link against a copy so a reader failure leaves no half-registered resources.
        let mut staged = ctx.clone();
        let out = match link_resources(&mut staged, adapter.kind(), decode_rows(&adapter, source.rows())) {
            Ok(out) => out,
            Err(err) => return Ok(rejected(err)),
        };
        *ctx = staged;
        store.write_resources(&out.entities).await?;
        log_stage(&out.stats);
        let record = loaded(kind, &path, sha256, out.stats.rows_read, out.stats.created);
        Ok((out.stats, record))
    }
}

fn log_stage(stats: &StageStats) {
    info!(rows = stats.rows_read, created = stats.created, "stage committed");
    if stats.orphaned > 0 {
        warn!(skipped = stats.orphaned, "rows outside the loaded subscriptions/resource groups");
    }
    if stats.duplicates > 0 {
        warn!(skipped = stats.duplicates, "duplicate rows skipped");
    }
    if stats.invalid > 0 {
        warn!(skipped = stats.invalid, "undecodable rows skipped");
    }
}

fn log_recommendations(stats: &RecommendationStats) {
    info!(
        rows = stats.rows_read,
        instances = stats.instances,
        types = stats.types,
        linked = stats.linked,
        dangling = stats.dangling,
        "stage committed"
    );
    let drops = [
        (stats.redundant, "subscription-scope cost recommendations dropped"),
        (stats.unresolvable, "recommendations missing resource fields"),
        (stats.unmapped_kind, "recommendations with an unmapped resource kind"),
        (stats.invalid, "undecodable recommendation rows skipped"),
        (stats.unknown_impact, "recommendation types with an unknown impact stored as Low"),
    ];
    for (count, message) in drops {
        if count > 0 {
            warn!(skipped = count, "{message}");
        }
    }
}

/// Load using [`SeedConfig::from_env`].
pub async fn run_seed_from_env(client_name: &str) -> Result<SeedSummary, SeedError> {
    SeedPipeline::new(SeedConfig::from_env()).run(client_name).await
}
