//! Trust and access policy documents

use conflux_types::naming::permission_boundary_name;
use conflux_types::{
    FunctionName, PolicyDocument, PolicyStatement, Principal, Processor, SubstrateAccount,
    TenantId,
};

/// Name of the inline policy attached to every execution role
pub const ACCESS_POLICY_NAME: &str = "processor-access";

/// Service principal that runs processor functions
pub const DEFAULT_EXECUTION_PRINCIPAL: &str = "lambda.amazonaws.com";

const CONSUME_ACTIONS: [&str; 4] = [
    "sqs:ReceiveMessage",
    "sqs:DeleteMessage",
    "sqs:GetQueueAttributes",
    "sqs:ChangeMessageVisibility",
];

const PRODUCE_ACTIONS: [&str; 2] = ["sqs:SendMessage", "sqs:GetQueueAttributes"];

const LOG_ACTIONS: [&str; 3] = [
    "logs:CreateLogGroup",
    "logs:CreateLogStream",
    "logs:PutLogEvents",
];

/// Trust policy letting only `principal` assume the role
pub fn execution_trust_policy(principal: &str) -> PolicyDocument {
    PolicyDocument::new(vec![PolicyStatement::allow(
        ["sts:AssumeRole"],
        Vec::<String>::new(),
    )
    .with_principal(Principal::Service(principal.to_string()))])
}

/// ARN of the permission boundary shared by a tenant's roles
pub fn tenant_boundary_arn(account: &SubstrateAccount, tenant: &TenantId) -> String {
    account.policy_arn(&permission_boundary_name(tenant))
}

/// Least-privilege policy for a processor's execution role.
///
/// Consume on declared inputs, send on declared outputs and log writes to
/// the function's own log group. Nothing else.
pub fn processor_access_policy(
    account: &SubstrateAccount,
    processor: &Processor,
    function: &FunctionName,
) -> PolicyDocument {
    let mut document = PolicyDocument::default();

    let inputs: Vec<String> = processor
        .inputs
        .iter()
        .map(|q| account.queue_arn(&processor.tenant, q))
        .collect();
    if !inputs.is_empty() {
        document = document
            .with_statement(PolicyStatement::allow(CONSUME_ACTIONS, inputs).with_sid("ConsumeInputs"));
    }

    let outputs: Vec<String> = processor
        .outputs
        .iter()
        .map(|q| account.queue_arn(&processor.tenant, q))
        .collect();
    if !outputs.is_empty() {
        document = document
            .with_statement(PolicyStatement::allow(PRODUCE_ACTIONS, outputs).with_sid("ProduceOutputs"));
    }

    document.with_statement(
        PolicyStatement::allow(LOG_ACTIONS, [account.log_group_arn(function)]).with_sid("WriteLogs"),
    )
}
