use conflux_control::{ControlPlane, ControlPlaneBuilder, ControlPlaneConfig, InMemorySubstrate};
use conflux_runtime::{CodeArtifactStore, IdentityClaims};
use conflux_types::{
    ApiAccess, DeploymentEvent, DeploymentState, Effect, ErrorKind, Processor, ProcessorName,
    TenantId,
};

fn control_plane() -> (ControlPlane, InMemorySubstrate) {
    let (builder, substrate) = ControlPlaneBuilder::new(ControlPlaneConfig::development())
        .with_holder("cp-test")
        .with_in_memory_substrate();
    (builder.build().expect("control plane should build"), substrate)
}

fn acme() -> TenantId {
    TenantId::from("acme")
}

#[tokio::test]
async fn deploy_status_and_teardown_through_the_facade() {
    let (plane, substrate) = control_plane();
    substrate.catalog.upsert_processor(
        Processor::new("acme", "enricher")
            .with_inputs(["raw"])
            .with_outputs(["enriched"]),
    );
    let artifact = substrate.artifacts.put(b"v1".to_vec()).await.unwrap();
    let processor = ProcessorName::from("enricher");
    let mut events = plane.subscribe();

    let record = plane.deploy(&acme(), &processor, &artifact).await.unwrap();
    assert_eq!(record.state, DeploymentState::Active);

    let status = plane.get_deployment_status(&acme(), &processor).await.unwrap();
    assert!(status.is_fully_wired());
    assert_eq!(plane.list_deployments(&acme()).await.unwrap().len(), 1);

    let mut activated = false;
    while let Ok(envelope) = events.try_recv() {
        activated |= matches!(envelope.event, DeploymentEvent::DeploymentActivated { .. });
    }
    assert!(activated);

    let record = plane.teardown(&acme(), &processor).await.unwrap();
    assert_eq!(record.state, DeploymentState::Deleted);
    assert!(substrate.functions.all_mappings().is_empty());
}

#[tokio::test]
async fn cyclic_topology_is_a_validation_error() {
    let (plane, substrate) = control_plane();
    substrate
        .catalog
        .upsert_processor(Processor::new("acme", "a").with_inputs(["q1"]).with_outputs(["q2"]));
    substrate
        .catalog
        .upsert_processor(Processor::new("acme", "b").with_inputs(["q2"]).with_outputs(["q1"]));
    let artifact = substrate.artifacts.put(b"v1".to_vec()).await.unwrap();

    let err = plane
        .deploy(&acme(), &ProcessorName::from("a"), &artifact)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(!err.is_retryable());
    assert_eq!(substrate.functions.hooks().calls("create_function"), 0);
}

#[tokio::test]
async fn authorize_bearer_tokens_and_api_keys() {
    let (plane, substrate) = control_plane();
    substrate
        .identity
        .register("tok-alice", IdentityClaims::new("alice", ["acme"]));
    substrate
        .access
        .insert(ApiAccess::for_user("key-1", "acme", "ingest-bot").with_whitelist(["q1"]));

    let policy = plane.authorize("Bearer tok-alice").await.unwrap();
    assert_eq!(policy.evaluate("/organization/acme/target/q2"), Effect::Allow);
    assert_eq!(policy.evaluate("/organization/other/target/q2"), Effect::Deny);

    let policy = plane.authorize("key-1").await.unwrap();
    assert_eq!(policy.evaluate("/organization/acme/target/q1"), Effect::Allow);
    assert_eq!(policy.evaluate("/organization/acme/target/q2"), Effect::Deny);

    let err = plane.authorize("Bearer forged").await.unwrap_err();
    assert!(err.is_unauthorized());
}

#[tokio::test]
async fn shutdown_closes_the_substrate() {
    let (plane, _substrate) = control_plane();
    assert!(plane.shutdown().await.is_ok());
}
