//! Core domain model and canonical identity rules for the advisor report.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CRATE_NAME: &str = "advisor-core";

/// Page sizes the browsing layer accepts; anything else falls back to the default.
pub const ALLOWED_PAGE_SIZES: [usize; 4] = [10, 25, 50, 100];
pub const DEFAULT_PAGE_SIZE: usize = 25;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseLabelError {
    #[error("unknown resource kind `{0}`")]
    ResourceKind(String),
    #[error("unknown business impact `{0}`")]
    Impact(String),
}

/// Resource kinds that share the single resource identifier namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    VirtualMachine,
    ScaleSet,
    StorageAccount,
}

/// Human-readable kind labels (as the advisor export spells them) to provider namespaces.
/// A label missing from this table cannot be resolved to a resource identifier.
const PROVIDER_NAMESPACES: &[(&str, ResourceKind, &str)] = &[
    (
        "virtual machine",
        ResourceKind::VirtualMachine,
        "Microsoft.Compute/virtualMachines",
    ),
    (
        "virtual machine scale set",
        ResourceKind::ScaleSet,
        "Microsoft.Compute/virtualMachineScaleSets",
    ),
    (
        "storage account",
        ResourceKind::StorageAccount,
        "Microsoft.Storage/storageAccounts",
    ),
];

impl ResourceKind {
    pub const ALL: [ResourceKind; 3] = [
        ResourceKind::VirtualMachine,
        ResourceKind::ScaleSet,
        ResourceKind::StorageAccount,
    ];

    /// Resolve an advisor "Type" label, ignoring case and surrounding whitespace.
    pub fn from_label(label: &str) -> Option<Self> {
        let folded = fold_case(label);
        PROVIDER_NAMESPACES
            .iter()
            .find(|(known, _, _)| *known == folded)
            .map(|(_, kind, _)| *kind)
    }

    pub fn label(self) -> &'static str {
        match self {
            ResourceKind::VirtualMachine => "Virtual machine",
            ResourceKind::ScaleSet => "Virtual machine scale set",
            ResourceKind::StorageAccount => "Storage account",
        }
    }

    pub fn provider_namespace(self) -> &'static str {
        PROVIDER_NAMESPACES
            .iter()
            .find(|(_, kind, _)| *kind == self)
            .map(|(_, _, namespace)| *namespace)
            .unwrap_or_default()
    }

    /// Stable token used in storage columns.
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::VirtualMachine => "virtual_machine",
            ResourceKind::ScaleSet => "scale_set",
            ResourceKind::StorageAccount => "storage_account",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ResourceKind {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .or_else(|| ResourceKind::from_label(s))
            .ok_or_else(|| ParseLabelError::ResourceKind(s.to_string()))
    }
}

/// Advisor business impact. Ordered `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Impact {
    Low,
    Medium,
    High,
}

impl Impact {
    pub fn label(self) -> &'static str {
        match self {
            Impact::Low => "Low",
            Impact::Medium => "Medium",
            Impact::High => "High",
        }
    }

    pub fn rank(self) -> i64 {
        match self {
            Impact::Low => 1,
            Impact::Medium => 2,
            Impact::High => 3,
        }
    }
}

impl fmt::Display for Impact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Impact {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match fold_case(s).as_str() {
            "low" => Ok(Impact::Low),
            "medium" => Ok(Impact::Medium),
            "high" => Ok(Impact::High),
            _ => Err(ParseLabelError::Impact(s.to_string())),
        }
    }
}

/// The single case-folding function used for every identifier and lookup key.
pub fn fold_case(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Canonical subscription identifier: the native id, case-folded.
pub fn subscription_id(native_id: &str) -> String {
    fold_case(native_id)
}

/// `{subscription_id}/resourceGroups/{name}`, case-folded.
pub fn resource_group_id(subscription_id: &str, resource_group_name: &str) -> String {
    fold_case(&format!(
        "{}/resourceGroups/{}",
        subscription_id.trim(),
        resource_group_name.trim()
    ))
}

/// `{resource_group_id}/providers/{namespace}/{name}`, case-folded.
pub fn resource_id(resource_group_id: &str, kind: ResourceKind, resource_name: &str) -> String {
    fold_case(&format!(
        "{}/providers/{}/{}",
        resource_group_id.trim(),
        kind.provider_namespace(),
        resource_name.trim()
    ))
}

/// Rebuild a resource identifier from loose name components alone.
pub fn resource_id_from_parts(
    subscription_id: &str,
    resource_group_name: &str,
    kind: ResourceKind,
    resource_name: &str,
) -> String {
    resource_id(
        &resource_group_id(subscription_id, resource_group_name),
        kind,
        resource_name,
    )
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub name: String,
    pub report_date: String,
    pub loaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceGroup {
    pub id: String,
    pub name: String,
    pub subscription_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualMachineAttributes {
    pub status: Option<String>,
    pub os: Option<String>,
    pub size: Option<String>,
    pub public_ip: Option<String>,
    pub disks: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaleSetAttributes {
    pub provisioning_state: Option<String>,
    pub status: Option<String>,
    pub os: Option<String>,
    pub size: Option<String>,
    pub instances: Option<i64>,
    pub orchestration_mode: Option<String>,
    pub public_ip: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageAccountAttributes {
    pub sku: Option<String>,
    pub account_kind: Option<String>,
}

/// Kind-specific attributes; the variant decides the resource kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceAttributes {
    VirtualMachine(VirtualMachineAttributes),
    ScaleSet(ScaleSetAttributes),
    StorageAccount(StorageAccountAttributes),
}

impl ResourceAttributes {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceAttributes::VirtualMachine(_) => ResourceKind::VirtualMachine,
            ResourceAttributes::ScaleSet(_) => ResourceKind::ScaleSet,
            ResourceAttributes::StorageAccount(_) => ResourceKind::StorageAccount,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    pub name: String,
    pub location: Option<String>,
    pub resource_group_id: String,
    pub attributes: ResourceAttributes,
}

impl Resource {
    pub fn kind(&self) -> ResourceKind {
        self.attributes.kind()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendationType {
    pub id: i64,
    pub text: String,
    pub category: String,
    pub impact: Impact,
}

/// One advisory occurrence. `resource_id` is a weak reference and may name a
/// resource that was never loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationInstance {
    pub id: i64,
    pub recommendation_type_id: i64,
    pub resource_id: Option<String>,
    pub resource_kind_label: Option<String>,
    pub subscription_id: Option<String>,
    pub subscription_name: Option<String>,
    pub resource_group_name: Option<String>,
    pub resource_name: Option<String>,
    pub resource_uri: Option<String>,
    pub potential_savings: f64,
}

/// Requested page, normalized against [`ALLOWED_PAGE_SIZES`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: usize,
    pub per_page: usize,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    pub fn new(page: usize, per_page: usize) -> Self {
        let per_page = if ALLOWED_PAGE_SIZES.contains(&per_page) {
            per_page
        } else {
            DEFAULT_PAGE_SIZE
        };
        Self {
            page: page.max(1),
            per_page,
        }
    }

    pub fn total_pages(&self, total_items: usize) -> usize {
        total_items.max(1).div_ceil(self.per_page)
    }

    /// Page clamped into `1..=total_pages` for the given item count.
    pub fn clamped_page(&self, total_items: usize) -> usize {
        self.page.clamp(1, self.total_pages(total_items))
    }

    pub fn offset(&self, total_items: usize) -> usize {
        (self.clamped_page(total_items) - 1) * self.per_page
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub per_page: usize,
    pub total_items: usize,
    pub total_pages: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_ignore_case_of_every_component() {
        let a = resource_id_from_parts("GUID-1", "Prod-RG", ResourceKind::VirtualMachine, "vm-A");
        let b = resource_id_from_parts("guid-1", "prod-rg", ResourceKind::VirtualMachine, "VM-a");
        assert_eq!(a, b);
        assert_eq!(
            a,
            "guid-1/resourcegroups/prod-rg/providers/microsoft.compute/virtualmachines/vm-a"
        );
    }

    #[test]
    fn resource_id_extends_resource_group_id() {
        let rg = resource_group_id("guid-1", "RG1");
        assert_eq!(rg, "guid-1/resourcegroups/rg1");
        let id = resource_id(&rg, ResourceKind::StorageAccount, "LogsAcct");
        assert!(id.starts_with(&rg));
        assert!(id.ends_with("/providers/microsoft.storage/storageaccounts/logsacct"));
    }

    #[test]
    fn kinds_with_same_name_get_distinct_ids() {
        let rg = resource_group_id("guid-1", "rg1");
        let vm = resource_id(&rg, ResourceKind::VirtualMachine, "web");
        let vmss = resource_id(&rg, ResourceKind::ScaleSet, "web");
        assert_ne!(vm, vmss);
    }

    #[test]
    fn kind_labels_map_case_insensitively() {
        assert_eq!(
            ResourceKind::from_label("Virtual machine"),
            Some(ResourceKind::VirtualMachine)
        );
        assert_eq!(
            ResourceKind::from_label("  VIRTUAL MACHINE SCALE SET "),
            Some(ResourceKind::ScaleSet)
        );
        assert_eq!(
            ResourceKind::from_label("storage account"),
            Some(ResourceKind::StorageAccount)
        );
        assert_eq!(ResourceKind::from_label("App service"), None);
        assert_eq!(ResourceKind::from_label("Subscription"), None);
    }

    #[test]
    fn kind_round_trips_through_storage_token() {
        for kind in ResourceKind::ALL {
            assert_eq!(kind.as_str().parse::<ResourceKind>(), Ok(kind));
            assert!(!kind.provider_namespace().is_empty());
        }
    }

    #[test]
    fn impact_is_ordinal() {
        assert!(Impact::Low < Impact::Medium);
        assert!(Impact::Medium < Impact::High);
        assert_eq!("high".parse::<Impact>(), Ok(Impact::High));
        assert_eq!(" Medium ".parse::<Impact>(), Ok(Impact::Medium));
        assert!("urgent".parse::<Impact>().is_err());
    }

    #[test]
    fn page_request_normalizes_size_and_clamps_page() {
        let req = PageRequest::new(0, 7);
        assert_eq!(req.page, 1);
        assert_eq!(req.per_page, DEFAULT_PAGE_SIZE);

        let req = PageRequest::new(9, 10);
        assert_eq!(req.total_pages(0), 1);
        assert_eq!(req.total_pages(21), 3);
        assert_eq!(req.clamped_page(21), 3);
        assert_eq!(req.offset(21), 20);
        assert_eq!(req.offset(0), 0);
    }
}
