//! CSV source readers + typed row adapters for the cloud inventory and advisor exports.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use advisor_core::{
    fold_case, ResourceAttributes, ResourceKind, ScaleSetAttributes, StorageAccountAttributes,
    VirtualMachineAttributes,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

pub const CRATE_NAME: &str = "advisor-adapters";

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
const DEFAULT_DELIMITER: u8 = b',';

/// Every input the loader knows how to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Subscriptions,
    ResourceGroups,
    VirtualMachines,
    ScaleSets,
    StorageAccounts,
    Advisor,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Subscriptions => "subscriptions",
            SourceKind::ResourceGroups => "resource_groups",
            SourceKind::VirtualMachines => "virtual_machines",
            SourceKind::ScaleSets => "scale_sets",
            SourceKind::StorageAccounts => "storage_accounts",
            SourceKind::Advisor => "advisor",
        }
    }

    /// File name in the export bundle. The advisor file is discovered by prefix instead.
    pub fn default_file_name(self) -> Option<&'static str> {
        match self {
            SourceKind::Subscriptions => Some("Subscriptions.csv"),
            SourceKind::ResourceGroups => Some("Azureresourcegroups.csv"),
            SourceKind::VirtualMachines => Some("AzureVirtualMachines.csv"),
            SourceKind::ScaleSets => Some("AzurevirtualMachineScaleSets.csv"),
            SourceKind::StorageAccounts => Some("AzureStorageAccounts.csv"),
            SourceKind::Advisor => None,
        }
    }

    /// Nothing downstream links without these.
    pub fn is_required(self) -> bool {
        matches!(
            self,
            SourceKind::Subscriptions | SourceKind::ResourceGroups | SourceKind::Advisor
        )
    }

    pub fn resource_kind(self) -> Option<ResourceKind> {
        match self {
            SourceKind::VirtualMachines => Some(ResourceKind::VirtualMachine),
            SourceKind::ScaleSets => Some(ResourceKind::ScaleSet),
            SourceKind::StorageAccounts => Some(ResourceKind::StorageAccount),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("parsing {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("{} is missing required columns: {}", .path.display(), .missing.join(", "))]
    MissingColumns { path: PathBuf, missing: Vec<String> },
}

impl SourceError {
    /// A failure confined to one record (bad UTF-8, broken quoting). The
    /// reader has already moved past it, so iteration may continue.
    pub fn is_row_level(&self) -> bool {
        matches!(self, SourceError::Csv { source, .. } if !source.is_io_error())
    }
}

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("line {line}: missing value for column `{column}`")]
    MissingField { line: u64, column: &'static str },
    #[error("line {line}: column `{column}` expects a whole number, got `{value}`")]
    InvalidNumber {
        line: u64,
        column: &'static str,
        value: String,
    },
    #[error(transparent)]
    Source(#[from] SourceError),
}

/// Header names in file order plus a case-folded lookup.
#[derive(Debug)]
struct ColumnIndex {
    headers: Vec<String>,
    by_name: HashMap<String, usize>,
}

impl ColumnIndex {
    fn new(headers: &csv::StringRecord) -> Self {
        let headers: Vec<String> = headers.iter().map(|h| h.trim().to_string()).collect();
        let mut by_name = HashMap::with_capacity(headers.len());
        for (idx, header) in headers.iter().enumerate() {
            by_name.entry(fold_case(header)).or_insert(idx);
        }
        Self { headers, by_name }
    }

    fn position(&self, column: &str) -> Option<usize> {
        self.by_name.get(&fold_case(column)).copied()
    }
}

/// A delimited text file with a header row.
pub struct CsvSource {
    path: PathBuf,
    delimiter: u8,
    columns: Arc<ColumnIndex>,
    reader: csv::Reader<Box<dyn Read + Send>>,
}

impl std::fmt::Debug for CsvSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsvSource")
            .field("path", &self.path)
            .field("delimiter", &(self.delimiter as char))
            .field("headers", &self.columns.headers)
            .finish()
    }
}

impl CsvSource {
    /// Open `path`, or `Ok(None)` when the file does not exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Option<Self>, SourceError> {
        let path = path.as_ref();
        let file = match File::open(path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(SourceError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        Self::from_reader(path, file).map(Some)
    }

    /// Build a source over any byte stream; `path` is only used for messages.
    pub fn from_reader<R: Read + Send + 'static>(
        path: impl Into<PathBuf>,
        reader: R,
    ) -> Result<Self, SourceError> {
        let path = path.into();
        let (body, delimiter) =
            strip_prelude(BufReader::new(reader)).map_err(|source| SourceError::Io {
                path: path.clone(),
                source,
            })?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .delimiter(delimiter)
            .from_reader(body);
        let headers = reader.headers().map_err(|source| SourceError::Csv {
            path: path.clone(),
            source,
        })?;
        let columns = Arc::new(ColumnIndex::new(headers));
        debug!(path = %path.display(), delimiter = %(delimiter as char), columns = columns.headers.len(), "opened csv source");
        Ok(Self {
            path,
            delimiter,
            columns,
            reader,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn delimiter(&self) -> u8 {
        self.delimiter
    }

    pub fn headers(&self) -> &[String] {
        &self.columns.headers
    }

    pub fn require_columns(&self, required: &[&str]) -> Result<(), SourceError> {
        let missing: Vec<String> = required
            .iter()
            .filter(|column| self.columns.position(column).is_none())
            .map(|column| column.to_string())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(SourceError::MissingColumns {
                path: self.path.clone(),
                missing,
            })
        }
    }

    /// Lazily yield the data rows beneath the header.
    pub fn rows(self) -> SourceRows {
        SourceRows {
            path: self.path,
            columns: self.columns,
            records: self.reader.into_records(),
        }
    }
}

/// Drop a byte-order mark and a leading `sep=` hint line, returning the
/// remaining stream and the delimiter to use.
fn strip_prelude<R: BufRead + Send + 'static>(mut reader: R) -> io::Result<(Box<dyn Read + Send>, u8)> {
    let mut first = Vec::new();
    reader.read_until(b'\n', &mut first)?;
    if first.starts_with(UTF8_BOM) {
        first.drain(..UTF8_BOM.len());
    }
    if let Some(delimiter) = separator_hint(&first) {
        return Ok((Box::new(reader), delimiter));
    }
    Ok((Box::new(io::Cursor::new(first).chain(reader)), DEFAULT_DELIMITER))
}

fn separator_hint(line: &[u8]) -> Option<u8> {
    let text = String::from_utf8_lossy(line);
    let text = text.trim_end_matches(['\r', '\n']).trim_matches('"');
    if !text.to_ascii_lowercase().starts_with("sep=") {
        return None;
    }
    match text.as_bytes()[4..] {
        [delimiter] => Some(delimiter),
        _ => Some(DEFAULT_DELIMITER),
    }
}

pub struct SourceRows {
    path: PathBuf,
    columns: Arc<ColumnIndex>,
    records: csv::StringRecordsIntoIter<Box<dyn Read + Send>>,
}

impl Iterator for SourceRows {
    type Item = Result<SourceRow, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.records.next()?;
        Some(
            record
                .map(|record| SourceRow {
                    columns: Arc::clone(&self.columns),
                    record,
                })
                .map_err(|source| SourceError::Csv {
                    path: self.path.clone(),
                    source,
                }),
        )
    }
}

/// One data row, addressable by header name (case-insensitive).
#[derive(Debug, Clone)]
pub struct SourceRow {
    columns: Arc<ColumnIndex>,
    record: csv::StringRecord,
}

impl SourceRow {
    /// Trimmed cell value; empty cells and unknown columns are `None`.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns
            .position(column)
            .and_then(|idx| self.record.get(idx))
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    pub fn line(&self) -> u64 {
        self.record.position().map(|p| p.line()).unwrap_or_default()
    }

    /// `(header, value)` pairs in file order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.columns
            .headers
            .iter()
            .map(String::as_str)
            .zip(self.record.iter())
    }

    fn required(&self, column: &'static str) -> Result<String, AdapterError> {
        self.get(column)
            .map(ToString::to_string)
            .ok_or(AdapterError::MissingField {
                line: self.line(),
                column,
            })
    }

    fn optional(&self, column: &str) -> Option<String> {
        self.get(column).map(ToString::to_string)
    }

    fn count(&self, column: &'static str) -> Result<Option<i64>, AdapterError> {
        parse_count(self.get(column)).map_err(|value| AdapterError::InvalidNumber {
            line: self.line(),
            column,
            value,
        })
    }
}

/// Savings amount: thousands separators stripped, blank/garbage/negative become 0.
pub fn parse_savings(value: Option<&str>) -> f64 {
    let Some(value) = value else {
        return 0.0;
    };
    let cleaned: String = value.trim().chars().filter(|c| *c != ',').collect();
    match cleaned.parse::<f64>() {
        Ok(amount) if amount.is_finite() && amount > 0.0 => amount,
        _ => 0.0,
    }
}

/// Whole, non-negative count. Blank is `Ok(None)`; anything else unparseable is
/// returned as the offending text.
pub fn parse_count(value: Option<&str>) -> Result<Option<i64>, String> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    let cleaned: String = value.chars().filter(|c| *c != ',').collect();
    match cleaned.parse::<i64>() {
        Ok(count) if count >= 0 => Ok(Some(count)),
        _ => Err(value.to_string()),
    }
}

/// Display name part of `Name (guid)`.
pub fn subscription_display_name(value: &str) -> &str {
    value.split(" (").next().unwrap_or(value).trim()
}

/// The guid in `Name (guid)`, if present.
pub fn subscription_id_from_display_name(value: &str) -> Option<&str> {
    let open = value.rfind('(')?;
    let close = value[open..].find(')')? + open;
    let id = value[open + 1..close].trim();
    (!id.is_empty()).then_some(id)
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

pub fn hash_file(path: impl AsRef<Path>) -> Result<String, SourceError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut hasher = Sha256::new();
    io::copy(&mut BufReader::new(file), &mut hasher).map_err(|source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(hex::encode(hasher.finalize()))
}

/// Decodes the rows of one source kind into typed records.
pub trait SourceAdapter {
    type Record;

    fn source(&self) -> SourceKind;

    /// Header columns that must exist for the file to be usable at all.
    fn required_columns(&self) -> &'static [&'static str];

    fn decode(&self, row: &SourceRow) -> Result<Self::Record, AdapterError>;
}

pub fn decode_rows<'a, A: SourceAdapter>(
    adapter: &'a A,
    rows: SourceRows,
) -> impl Iterator<Item = Result<A::Record, AdapterError>> + 'a {
    rows.map(move |row| -> Result<A::Record, AdapterError> { adapter.decode(&row?) })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionRecord {
    pub name: String,
    pub native_id: Option<String>,
    pub line: u64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SubscriptionAdapter;

impl SourceAdapter for SubscriptionAdapter {
    type Record = SubscriptionRecord;

    fn source(&self) -> SourceKind {
        SourceKind::Subscriptions
    }

    fn required_columns(&self) -> &'static [&'static str] {
        &["SUBSCRIPTION NAME", "SUBSCRIPTION ID"]
    }

    fn decode(&self, row: &SourceRow) -> Result<Self::Record, AdapterError> {
        Ok(SubscriptionRecord {
            name: row.required("SUBSCRIPTION NAME")?,
            native_id: row.optional("SUBSCRIPTION ID"),
            line: row.line(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceGroupRecord {
    pub name: String,
    pub subscription_name: String,
    pub line: u64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceGroupAdapter;

impl SourceAdapter for ResourceGroupAdapter {
    type Record = ResourceGroupRecord;

    fn source(&self) -> SourceKind {
        SourceKind::ResourceGroups
    }

    fn required_columns(&self) -> &'static [&'static str] {
        &["NAME", "SUBSCRIPTION"]
    }

    fn decode(&self, row: &SourceRow) -> Result<Self::Record, AdapterError> {
        Ok(ResourceGroupRecord {
            name: row.required("NAME")?,
            subscription_name: row.required("SUBSCRIPTION")?,
            line: row.line(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRecord {
    pub name: String,
    pub subscription_name: String,
    pub resource_group_name: String,
    pub location: Option<String>,
    pub attributes: ResourceAttributes,
    pub line: u64,
}

/// Inventory export for one resource kind.
#[derive(Debug, Clone, Copy)]
pub struct ResourceAdapter {
    kind: ResourceKind,
}

impl ResourceAdapter {
    pub fn new(kind: ResourceKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    fn attributes(&self, row: &SourceRow) -> Result<ResourceAttributes, AdapterError> {
        Ok(match self.kind {
            ResourceKind::VirtualMachine => {
                ResourceAttributes::VirtualMachine(VirtualMachineAttributes {
                    status: row.optional("STATUS"),
                    os: row.optional("OPERATING SYSTEM"),
                    size: row.optional("SIZE"),
                    public_ip: row.optional("PUBLIC IP ADDRESS"),
                    disks: row.count("DISKS")?,
                })
            }
            ResourceKind::ScaleSet => ResourceAttributes::ScaleSet(ScaleSetAttributes {
                provisioning_state: row.optional("PROVISIONING STATE"),
                status: row.optional("STATUS"),
                os: row.optional("OPERATING SYSTEM"),
                size: row.optional("SIZE"),
                instances: row.count("INSTANCES")?,
                orchestration_mode: row.optional("ORCHESTRATION MODE"),
                public_ip: row.optional("PUBLIC IP ADDRESS"),
            }),
            ResourceKind::StorageAccount => {
                ResourceAttributes::StorageAccount(StorageAccountAttributes {
                    sku: row.optional("TYPE"),
                    account_kind: row.optional("KIND"),
                })
            }
        })
    }
}

impl SourceAdapter for ResourceAdapter {
    type Record = ResourceRecord;

    fn source(&self) -> SourceKind {
        match self.kind {
            ResourceKind::VirtualMachine => SourceKind::VirtualMachines,
            ResourceKind::ScaleSet => SourceKind::ScaleSets,
            ResourceKind::StorageAccount => SourceKind::StorageAccounts,
        }
    }

    fn required_columns(&self) -> &'static [&'static str] {
        &["NAME", "SUBSCRIPTION", "RESOURCE GROUP"]
    }

    fn decode(&self, row: &SourceRow) -> Result<Self::Record, AdapterError> {
        Ok(ResourceRecord {
            name: row.required("NAME")?,
            subscription_name: row.required("SUBSCRIPTION")?,
            resource_group_name: row.required("RESOURCE GROUP")?,
            location: row.optional("LOCATION"),
            attributes: self.attributes(row)?,
            line: row.line(),
        })
    }
}

/// One advisor row, before any linking.
#[derive(Debug, Clone, PartialEq)]
pub struct AdvisorRecord {
    /// The export's `Type` column: a resource-kind label or `Subscription`.
    pub resource_type: Option<String>,
    pub category: String,
    pub impact: Option<String>,
    pub recommendation: String,
    pub subscription_id: Option<String>,
    pub subscription_name: Option<String>,
    pub resource_group: Option<String>,
    pub resource_name: Option<String>,
    pub resource_uri: Option<String>,
    pub potential_savings: f64,
    pub line: u64,
}

impl AdvisorRecord {
    pub fn is_subscription_scope(&self) -> bool {
        self.resource_type
            .as_deref()
            .is_some_and(|t| fold_case(t) == "subscription")
    }

    pub fn is_cost(&self) -> bool {
        fold_case(&self.category) == "cost"
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AdvisorAdapter;

impl SourceAdapter for AdvisorAdapter {
    type Record = AdvisorRecord;

    fn source(&self) -> SourceKind {
        SourceKind::Advisor
    }

    fn required_columns(&self) -> &'static [&'static str] {
        &["Type", "Category", "Recommendation"]
    }

    fn decode(&self, row: &SourceRow) -> Result<Self::Record, AdapterError> {
        let subscription_label = row.get("Subscription Name");
        let subscription_id = row
            .get("Subscription ID")
            .or_else(|| subscription_label.and_then(subscription_id_from_display_name))
            .map(ToString::to_string);
        Ok(AdvisorRecord {
            resource_type: row.optional("Type"),
            category: row.required("Category")?,
            impact: row.optional("Business Impact"),
            recommendation: row.required("Recommendation")?,
            subscription_id,
            subscription_name: subscription_label
                .map(subscription_display_name)
                .map(ToString::to_string),
            resource_group: row.optional("Resource Group"),
            resource_name: row.optional("Resource Name"),
            resource_uri: row.optional("Resource Id"),
            potential_savings: parse_savings(row.get("Potential Annual Cost Savings")),
            line: row.line(),
        })
    }
}
