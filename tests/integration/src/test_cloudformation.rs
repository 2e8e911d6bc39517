//! CloudFormation integration tests against a running Rustack server.

#[cfg(test)]
mod tests {
    use aws_sdk_cloudformation::error::ProvideErrorMetadata;
    use aws_sdk_cloudformation::types::{
        Capability, ChangeSetStatus, ChangeSetType, ExecutionStatus, Parameter, StackStatus,
    };

    use crate::{cleanup_stack, cloudformation_client, cloudformation_client_in, test_stack_name};

    const QUEUE_TEMPLATE: &str = r#"{
        "Description": "queue stack",
        "Parameters": {"Env": {"Type": "String", "Default": "dev"}},
        "Resources": {"Queue": {"Type": "AWS::SQS::Queue",
                                "Properties": {"QueueName": {"Fn::Sub": "${AWS::StackName}-${Env}"}}}},
        "Outputs": {"QueueRef": {"Value": {"Ref": "Queue"}},
                    "Env": {"Value": {"Ref": "Env"}, "Export": {"Name": {"Fn::Sub": "${AWS::StackName}-env"}}}}
    }"#;

    async fn create_queue_stack(client: &aws_sdk_cloudformation::Client, name: &str) -> String {
        client
            .create_stack()
            .stack_name(name)
            .template_body(QUEUE_TEMPLATE)
            .send()
            .await
            .unwrap_or_else(|e| panic!("failed to create stack {name}: {e}"))
            .stack_id()
            .unwrap_or_default()
            .to_owned()
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_create_describe_and_delete_stack() {
        let client = cloudformation_client();
        let name = test_stack_name("lifecycle");
        let stack_id = create_queue_stack(&client, &name).await;
        assert!(stack_id.contains(&format!(":stack/{name}/")));

        let described = client.describe_stacks().stack_name(&name).send().await.unwrap();
        let stack = &described.stacks()[0];
        assert_eq!(stack.stack_id(), Some(stack_id.as_str()));
        assert_eq!(stack.stack_status(), Some(&StackStatus::CreateComplete));
        assert_eq!(stack.description(), Some("queue stack"));

        let env = stack
            .outputs()
            .iter()
            .find(|o| o.output_key() == Some("Env"))
            .unwrap();
        assert_eq!(env.output_value(), Some("dev"));
        assert_eq!(env.export_name(), Some(format!("{name}-env").as_str()));

        client.delete_stack().stack_name(&name).send().await.unwrap();
        let err = client
            .describe_stacks()
            .stack_name(&name)
            .send()
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some("ValidationError"));
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_assign_new_id_when_recreating_stack() {
        let client = cloudformation_client();
        let name = test_stack_name("recreate");
        let first = create_queue_stack(&client, &name).await;
        cleanup_stack(&client, &name).await;
        let second = create_queue_stack(&client, &name).await;
        assert_ne!(first, second);
        cleanup_stack(&client, &name).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_describe_and_list_stack_resources() {
        let client = cloudformation_client();
        let name = test_stack_name("resources");
        create_queue_stack(&client, &name).await;

        let detail = client
            .describe_stack_resource()
            .stack_name(&name)
            .logical_resource_id("Queue")
            .send()
            .await
            .unwrap();
        let detail = detail.stack_resource_detail().unwrap();
        assert_eq!(detail.resource_type(), Some("AWS::SQS::Queue"));
        let physical_id = detail.physical_resource_id().unwrap().to_owned();

        let listed = client
            .list_stack_resources()
            .stack_name(&name)
            .send()
            .await
            .unwrap();
        assert_eq!(listed.stack_resource_summaries().len(), 1);

        let err = client
            .describe_stack_resources()
            .stack_name(&name)
            .physical_resource_id(&physical_id)
            .send()
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some("ValidationError"));

        let err = client
            .describe_stack_resource()
            .stack_name(&name)
            .logical_resource_id("Missing")
            .send()
            .await
            .unwrap_err();
        assert!(err.message().unwrap_or_default().contains("\"Missing\""));

        cleanup_stack(&client, &name).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_update_stack_with_previous_template() {
        let client = cloudformation_client();
        let name = test_stack_name("update");
        create_queue_stack(&client, &name).await;

        client
            .update_stack()
            .stack_name(&name)
            .use_previous_template(true)
            .parameters(
                Parameter::builder()
                    .parameter_key("Env")
                    .parameter_value("prod")
                    .build(),
            )
            .send()
            .await
            .unwrap();

        let described = client.describe_stacks().stack_name(&name).send().await.unwrap();
        let stack = &described.stacks()[0];
        assert_eq!(stack.stack_status(), Some(&StackStatus::UpdateComplete));
        let env = stack
            .parameters()
            .iter()
            .find(|p| p.parameter_key() == Some("Env"))
            .unwrap();
        assert_eq!(env.parameter_value(), Some("prod"));

        cleanup_stack(&client, &name).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_create_and_execute_change_set_for_new_stack() {
        let client = cloudformation_client();
        let name = test_stack_name("changeset");
        let created = client
            .create_change_set()
            .stack_name(&name)
            .change_set_name("initial")
            .change_set_type(ChangeSetType::Create)
            .template_body(QUEUE_TEMPLATE)
            .send()
            .await
            .unwrap();
        let change_set_id = created.id().unwrap().to_owned();

        let review = client.describe_stacks().stack_name(&name).send().await.unwrap();
        assert_eq!(
            review.stacks()[0].stack_status(),
            Some(&StackStatus::ReviewInProgress)
        );

        let described = client
            .describe_change_set()
            .change_set_name("initial")
            .stack_name(&name)
            .send()
            .await
            .unwrap();
        assert_eq!(described.status(), Some(&ChangeSetStatus::CreateComplete));
        assert_eq!(
            described.execution_status(),
            Some(&ExecutionStatus::Available)
        );

        client
            .execute_change_set()
            .change_set_name(&change_set_id)
            .send()
            .await
            .unwrap();

        let described = client.describe_stacks().stack_name(&name).send().await.unwrap();
        let stack = &described.stacks()[0];
        assert_eq!(stack.stack_status(), Some(&StackStatus::CreateComplete));
        assert_eq!(stack.change_set_id(), Some(change_set_id.as_str()));

        let summaries = client.list_change_sets().stack_name(&name).send().await.unwrap();
        assert_eq!(summaries.summaries().len(), 1);

        client
            .delete_change_set()
            .change_set_name("initial")
            .stack_name(&name)
            .send()
            .await
            .unwrap();
        let resources = client
            .describe_stack_resources()
            .stack_name(&name)
            .send()
            .await
            .unwrap();
        assert_eq!(resources.stack_resources().len(), 1);

        cleanup_stack(&client, &name).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_report_missing_change_set() {
        let client = cloudformation_client();
        let err = client
            .describe_change_set()
            .change_set_name(test_stack_name("ghost"))
            .send()
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some("ChangeSetNotFound"));
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_list_exports_of_all_stacks() {
        let client = cloudformation_client();
        let name = test_stack_name("exports");
        create_queue_stack(&client, &name).await;

        let exports = client.list_exports().send().await.unwrap();
        let export_name = format!("{name}-env");
        let export = exports
            .exports()
            .iter()
            .find(|e| e.name() == Some(export_name.as_str()))
            .unwrap();
        assert_eq!(export.value(), Some("dev"));

        cleanup_stack(&client, &name).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_return_events_and_template() {
        let client = cloudformation_client();
        let name = test_stack_name("events");
        create_queue_stack(&client, &name).await;

        let events = client
            .describe_stack_events()
            .stack_name(&name)
            .send()
            .await
            .unwrap();
        let newest = &events.stack_events()[0];
        assert_eq!(newest.logical_resource_id(), Some(name.as_str()));
        assert_eq!(
            newest.resource_status().map(|s| s.as_str()),
            Some("CREATE_COMPLETE")
        );

        let template = client.get_template().stack_name(&name).send().await.unwrap();
        let body: serde_json::Value =
            serde_json::from_str(template.template_body().unwrap()).unwrap();
        assert_eq!(body["Resources"]["Queue"]["Type"], "AWS::SQS::Queue");

        cleanup_stack(&client, &name).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_validate_template() {
        let client = cloudformation_client();
        let validated = client
            .validate_template()
            .template_body(
                r#"{"Parameters": {"Size": {"Type": "Number", "Default": "3"}},
                    "Resources": {"Role": {"Type": "AWS::IAM::Role"}}}"#,
            )
            .send()
            .await
            .unwrap();
        assert_eq!(validated.parameters().len(), 1);
        assert_eq!(validated.parameters()[0].default_value(), Some("3"));
        assert_eq!(validated.capabilities(), &[Capability::CapabilityIam]);

        let err = client
            .validate_template()
            .template_body("{\"Resources\": ")
            .send()
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some("ValidationError"));
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_keep_regions_apart() {
        let east = cloudformation_client();
        let west = cloudformation_client_in("eu-west-1");
        let name = test_stack_name("regions");
        create_queue_stack(&east, &name).await;

        let err = west
            .describe_stacks()
            .stack_name(&name)
            .send()
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some("ValidationError"));

        cleanup_stack(&east, &name).await;
    }
}
