use std::fs;
use std::path::Path;

use advisor_adapters::SourceKind;
use advisor_core::{resource_id_from_parts, ResourceKind};
use advisor_seed::{SeedConfig, SeedError, SeedPipeline};
use advisor_storage::{
    RecommendationQuery, ReportStore, ResourceQuery, SourceStatus, RESOURCE_NOT_IMPORTED,
};
use tempfile::tempdir;

const ADVISOR_FILE: &str = "Advisor_contoso_2024-03-05T10_15_00.csv";
const ADVISOR_HEADER: &str = "Type,Category,Business Impact,Recommendation,Subscription ID,Subscription Name,Resource Group,Resource Name,Potential Annual Cost Savings,Resource Id\n";
const VM_HEADER: &str =
    "NAME,SUBSCRIPTION,RESOURCE GROUP,LOCATION,STATUS,OPERATING SYSTEM,SIZE,PUBLIC IP ADDRESS,DISKS\n";

fn write(dir: &Path, name: &str, contents: &str) {
    fs::write(dir.join(name), contents).expect("write fixture");
}

fn write_core_exports(dir: &Path, group: &str) {
    write(
        dir,
        "Subscriptions.csv",
        "SUBSCRIPTION NAME,SUBSCRIPTION ID\nContoso,guid-1\n",
    );
    write(
        dir,
        "Azureresourcegroups.csv",
        &format!("NAME,SUBSCRIPTION\n{group},Contoso\n"),
    );
}

fn config(input: &Path, output: &Path) -> SeedConfig {
    SeedConfig::new(input, output.join("report.db"))
}

#[tokio::test]
async fn single_vm_recommendation_links_across_case() {
    let input = tempdir().expect("input dir");
    let output = tempdir().expect("output dir");
    write_core_exports(input.path(), "RG1");
    write(
        input.path(),
        "AzureVirtualMachines.csv",
        &format!("{VM_HEADER}vm-A,Contoso,RG1,westeurope,Running,Linux,Standard_B2s,,2\n"),
    );
    write(
        input.path(),
        ADVISOR_FILE,
        &format!(
            "{ADVISOR_HEADER}Virtual machine,Cost,High,Right-size or shutdown underutilized virtual machines,guid-1,Contoso (guid-1),RG1,VM-A,\"1,000\",/subscriptions/guid-1/resourceGroups/RG1/providers/Microsoft.Compute/virtualMachines/vm-A\n"
        ),
    );

    let summary = SeedPipeline::new(config(input.path(), output.path()))
        .run("Contoso Ltd")
        .await
        .expect("load succeeds");
    assert_eq!(summary.report_date, "March 05, 2024");
    assert_eq!(summary.recommendations.linked, 1);
    assert_eq!(summary.recommendations.dangling, 0);

    let store = ReportStore::open(output.path().join("report.db"))
        .await
        .expect("open snapshot");
    let counts = store.counts().await.expect("counts");
    assert_eq!(counts.subscriptions, 1);
    assert_eq!(counts.resource_groups, 1);
    assert_eq!(counts.virtual_machines, 1);
    assert_eq!(counts.recommendation_types, 1);
    assert_eq!(counts.recommendation_instances, 1);

    let vm_id = resource_id_from_parts("guid-1", "RG1", ResourceKind::VirtualMachine, "vm-A");
    let vm = store.get_resource(&vm_id).await.expect("get").expect("vm loaded");
    assert_eq!(vm.name, "vm-A");
    assert_eq!(vm.disks, Some(2));
    assert_eq!(vm.recommendation_count, 1);

    let recs = store
        .list_recommendations(&RecommendationQuery::new())
        .await
        .expect("recommendations");
    let rec = &recs.items[0];
    assert_eq!(rec.resource_id.as_deref(), Some(vm.id.as_str()));
    assert_eq!(rec.potential_savings, 1000.0);
    assert!(rec.resource_imported);
    assert_eq!(rec.subscription_name.as_deref(), Some("Contoso"));

    let info = store.client_info().await.expect("client info").expect("row");
    assert_eq!(info.name, "Contoso Ltd");
    assert_eq!(info.report_date, "March 05, 2024");
}

#[tokio::test]
async fn absent_inventory_leaves_recommendations_dangling() {
    let input = tempdir().expect("input dir");
    let output = tempdir().expect("output dir");
    write_core_exports(input.path(), "RG1");
    write(
        input.path(),
        ADVISOR_FILE,
        &format!("{ADVISOR_HEADER}Virtual machine,Cost,High,Buy reserved instances,guid-1,Contoso,RG1,vm-A,250,\n"),
    );

    let summary = SeedPipeline::new(config(input.path(), output.path()))
        .run("Contoso Ltd")
        .await
        .expect("optional sources may be absent");
    assert_eq!(summary.resources_created(), 0);
    assert_eq!(summary.recommendations.dangling, 1);

    let store = ReportStore::open(output.path().join("report.db"))
        .await
        .expect("open snapshot");
    let recs = store
        .list_recommendations(&RecommendationQuery::new())
        .await
        .expect("recommendations");
    assert_eq!(recs.total_items, 1);
    let rec = &recs.items[0];
    assert!(!rec.resource_imported);
    assert_eq!(rec.resource_display(), RESOURCE_NOT_IMPORTED);
    let target = rec.resource_id.as_deref().expect("candidate id kept");
    assert!(store.get_resource(target).await.expect("get").is_none());

    let files = store.source_files().await.expect("source files");
    let vms = files
        .iter()
        .find(|f| f.kind == SourceKind::VirtualMachines.as_str())
        .expect("vm row");
    assert_eq!(vms.status, SourceStatus::Absent);
    let subs = files
        .iter()
        .find(|f| f.kind == SourceKind::Subscriptions.as_str())
        .expect("subscription row");
    assert_eq!(subs.status, SourceStatus::Loaded);
    assert_eq!(subs.sha256.as_ref().map(String::len), Some(64));
}

#[tokio::test]
async fn cost_advice_at_subscription_scope_is_dropped() {
    let input = tempdir().expect("input dir");
    let output = tempdir().expect("output dir");
    write_core_exports(input.path(), "Prod-RG");
    write(
        input.path(),
        "AzureVirtualMachines.csv",
        &format!("{VM_HEADER}web-01,contoso,prod-rg,westeurope,Running,Linux,Standard_D2s_v3,10.0.0.4,1\n"),
    );
    write(
        input.path(),
        ADVISOR_FILE,
        &format!(
            "{ADVISOR_HEADER}Subscription,Cost,High,Consider reserved capacity,guid-1,Contoso,,,\"5,000\",\n\
             Virtual machine,Security,Medium,Enable disk encryption,guid-1,Contoso,PROD-RG,WEB-01,,\n"
        ),
    );

    let summary = SeedPipeline::new(config(input.path(), output.path()))
        .run("Contoso Ltd")
        .await
        .expect("load succeeds");
    assert_eq!(summary.resource_groups.created, 1);
    assert_eq!(summary.resources_created(), 1);
    assert_eq!(summary.recommendations.redundant, 1);
    assert_eq!(summary.recommendations.instances, 1);
    assert_eq!(summary.recommendations.linked, 1);

    let store = ReportStore::open(output.path().join("report.db"))
        .await
        .expect("open snapshot");
    let resources = store
        .list_resources(&ResourceQuery::new())
        .await
        .expect("resources");
    assert_eq!(resources.total_items, 1);
    assert_eq!(resources.items[0].resource_group_name, "Prod-RG");
    assert_eq!(resources.items[0].recommendation_count, 1);
    assert_eq!(resources.items[0].potential_savings, 0.0);
}

#[tokio::test]
async fn failed_load_keeps_the_published_snapshot() {
    let input = tempdir().expect("input dir");
    let output = tempdir().expect("output dir");
    write_core_exports(input.path(), "RG1");
    write(
        input.path(),
        ADVISOR_FILE,
        &format!("{ADVISOR_HEADER}Virtual machine,Cost,High,Buy reserved instances,guid-1,Contoso,RG1,vm-A,250,\n"),
    );
    let pipeline = SeedPipeline::new(config(input.path(), output.path()));
    pipeline.run("Contoso Ltd").await.expect("first load");

    fs::remove_file(input.path().join("Azureresourcegroups.csv")).expect("remove");
    let err = pipeline.run("Contoso Ltd").await.expect_err("mandatory source missing");
    assert!(matches!(
        err,
        SeedError::MissingSource {
            kind: SourceKind::ResourceGroups,
            ..
        }
    ));

    let leftovers: Vec<_> = fs::read_dir(output.path())
        .expect("read output")
        .filter_map(Result::ok)
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(leftovers, vec!["report.db".to_string()]);

    let store = ReportStore::open(output.path().join("report.db"))
        .await
        .expect("open snapshot");
    assert_eq!(store.counts().await.expect("counts").recommendation_instances, 1);
}

#[tokio::test]
async fn missing_advisor_export_is_fatal() {
    let input = tempdir().expect("input dir");
    let output = tempdir().expect("output dir");
    write_core_exports(input.path(), "RG1");

    let err = SeedPipeline::new(config(input.path(), output.path()))
        .run("Contoso Ltd")
        .await
        .expect_err("no advisor file");
    assert!(matches!(err, SeedError::NoAdvisorFile { .. }));
    assert!(!output.path().join("report.db").exists());
}

#[tokio::test]
async fn undecodable_inventory_row_is_skipped_not_fatal() {
    let input = tempdir().expect("input dir");
    let output = tempdir().expect("output dir");
    write_core_exports(input.path(), "RG1");
    let mut vms = VM_HEADER.as_bytes().to_vec();
    vms.extend_from_slice(b"vm-\xe9,Contoso,RG1,westeurope,Running,Linux,Standard_B2s,,1\n");
    vms.extend_from_slice(b"vm-b,Contoso,RG1,westeurope,Running,Linux,Standard_B2s,,1\n");
    fs::write(input.path().join("AzureVirtualMachines.csv"), vms).expect("write vms");
    write(
        input.path(),
        ADVISOR_FILE,
        &format!("{ADVISOR_HEADER}Virtual machine,Cost,High,Buy reserved instances,guid-1,Contoso,RG1,vm-b,250,\n"),
    );

    let summary = SeedPipeline::new(config(input.path(), output.path()))
        .run("Contoso Ltd")
        .await
        .expect("a bad optional row does not abort the load");
    let vm_stats = summary.resources[&ResourceKind::VirtualMachine];
    assert_eq!(vm_stats.rows_read, 2);
    assert_eq!(vm_stats.created, 1);
    assert_eq!(vm_stats.invalid, 1);
    assert_eq!(summary.recommendations.linked, 1);

    let store = ReportStore::open(output.path().join("report.db"))
        .await
        .expect("open snapshot");
    assert_eq!(store.counts().await.expect("counts").virtual_machines, 1);
    let files = store.source_files().await.expect("source files");
    let vms = files
        .iter()
        .find(|f| f.kind == SourceKind::VirtualMachines.as_str())
        .expect("vm row");
    assert_eq!(vms.status, SourceStatus::Loaded);
}
