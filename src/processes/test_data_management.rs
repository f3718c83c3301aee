//! Test data generation, masking and provisioning.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::Result;
use crate::review::Breakpoint;
use crate::task::{schema, TaskContext, TaskDef, TaskSpec};
use crate::workflow::aggregate::{self, RunMetadata};
use crate::workflow::{parse_inputs, Process, QualityGate, WorkflowRun};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inputs {
    pub project_name: String,
    #[serde(default)]
    pub data_sources: Vec<String>,
    #[serde(default)]
    pub environments: Vec<String>,
    #[serde(default = "default_compliance")]
    pub compliance: Vec<String>,
    #[serde(default = "default_volume")]
    pub target_volume: u64,
    #[serde(default = "default_min_validation_score")]
    pub min_validation_score: f64,
    #[serde(default = "default_min_compliance_score")]
    pub min_compliance_score: f64,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

fn default_compliance() -> Vec<String> {
    vec!["GDPR".to_string()]
}

fn default_volume() -> u64 {
    10_000
}

fn default_min_validation_score() -> f64 {
    85.0
}

fn default_min_compliance_score() -> f64 {
    95.0
}

fn default_output_dir() -> String {
    "test-data".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Requirements {
    pub success: bool,
    #[serde(default)]
    pub entities: Vec<String>,
    #[serde(default)]
    pub sensitive_fields: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaDiscovery {
    pub schemas_found: u64,
    #[serde(default)]
    pub missing_schemas: Vec<String>,
    #[serde(default)]
    pub relationships: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationStrategy {
    pub approach: String,
    #[serde(default)]
    pub synthetic_entities: Vec<String>,
    #[serde(default)]
    pub masked_entities: Vec<String>,
}

/// Output of each data preparation branch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSet {
    pub records: u64,
    #[serde(default)]
    pub tables: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataValidation {
    pub validation_score: f64,
    pub compliance_score: f64,
    #[serde(default)]
    pub violations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provisioning {
    pub environments_provisioned: Vec<String>,
    #[serde(default)]
    pub refresh_command: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Documentation {
    pub catalog_path: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryArgs {
    pub data_sources: Vec<String>,
    pub requirements: Requirements,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyArgs {
    pub compliance: Vec<String>,
    pub target_volume: u64,
    pub requirements: Requirements,
    pub schemas: SchemaDiscovery,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparationArgs {
    pub technique: String,
    pub project_name: String,
    pub target_volume: u64,
    pub compliance: Vec<String>,
    pub sensitive_fields: Vec<String>,
    pub strategy: GenerationStrategy,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationArgs {
    pub compliance: Vec<String>,
    pub sensitive_fields: Vec<String>,
    pub data_sets: Vec<DataSet>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisioningArgs {
    pub environments: Vec<String>,
    pub output_dir: String,
    pub total_records: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentationArgs {
    pub project_name: String,
    pub output_dir: String,
    pub strategy: GenerationStrategy,
    pub validation: DataValidation,
    pub provisioning: Provisioning,
}

const ROLE: &str = "a test data engineer with data privacy expertise";

fn build_requirements(args: &Inputs, ctx: &TaskContext) -> TaskSpec {
    TaskSpec::agent("test-data-analyst", "Test data requirements", ctx)
        .role(ROLE)
        .task(format!(
            "Gather test data requirements for {}",
            args.project_name
        ))
        .context(json!({
            "dataSources": args.data_sources,
            "compliance": args.compliance,
            "targetVolume": args.target_volume,
        }))
        .instructions([
            "List the entities tests need and the volumes required",
            "Identify fields holding personal or sensitive data",
            "Report success: false if requirements cannot be determined",
        ])
        .output(
            &["success"],
            json!({
                "success": schema::boolean(),
                "entities": schema::strings(),
                "sensitiveFields": schema::strings(),
            }),
        )
        .labels(&["test-data", "requirements"])
        .build()
}

fn build_schema_discovery(args: &DiscoveryArgs, ctx: &TaskContext) -> TaskSpec {
    TaskSpec::agent("schema-discoverer", "Schema discovery", ctx)
        .role(ROLE)
        .task("Discover the schemas of every data source")
        .context(json!({
            "dataSources": args.data_sources,
            "entities": args.requirements.entities,
        }))
        .instructions([
            "Extract table and field definitions with constraints",
            "Map foreign-key relationships between entities",
            "List required entities with no discoverable schema as missingSchemas",
        ])
        .output(
            &["schemasFound"],
            json!({
                "schemasFound": schema::integer(),
                "missingSchemas": schema::strings(),
                "relationships": schema::strings(),
            }),
        )
        .labels(&["test-data", "schema"])
        .build()
}

fn build_strategy(args: &StrategyArgs, ctx: &TaskContext) -> TaskSpec {
    TaskSpec::agent("test-data-strategist", "Generation strategy", ctx)
        .role(ROLE)
        .task("Decide how each entity's test data will be produced")
        .context(json!({
            "compliance": args.compliance,
            "targetVolume": args.target_volume,
            "sensitiveFields": args.requirements.sensitive_fields,
            "relationships": args.schemas.relationships,
        }))
        .instructions([
            "Choose synthesis, masking of production data, or subsetting per entity",
            "Never copy sensitive fields unmasked",
        ])
        .output(
            &["approach"],
            json!({
                "approach": schema::string(),
                "syntheticEntities": schema::strings(),
                "maskedEntities": schema::strings(),
            }),
        )
        .labels(&["test-data", "strategy"])
        .build()
}

fn build_preparation(args: &PreparationArgs, ctx: &TaskContext) -> TaskSpec {
    TaskSpec::agent(
        "test-data-engineer",
        &format!("Data {}", args.technique),
        ctx,
    )
    .role(ROLE)
    .task(format!(
        "Produce {} test data for {} following the strategy",
        args.technique, args.project_name
    ))
    .context(json!({
        "technique": args.technique,
        "targetVolume": args.target_volume,
        "compliance": args.compliance,
        "sensitiveFields": args.sensitive_fields,
        "approach": args.strategy.approach,
    }))
    .instructions([
        "Preserve referential integrity across tables",
        "Write generated data and scripts to files listed as artifacts",
    ])
    .output(
        &["records"],
        json!({ "records": schema::integer(), "tables": schema::strings() }),
    )
    .labels(&["test-data", "generation"])
    .build()
}

fn build_validation(args: &ValidationArgs, ctx: &TaskContext) -> TaskSpec {
    TaskSpec::agent("test-data-validator", "Data validation", ctx)
        .role(ROLE)
        .task("Validate the produced data for quality and compliance")
        .context(json!({
            "compliance": args.compliance,
            "sensitiveFields": args.sensitive_fields,
            "dataSets": args.data_sets,
        }))
        .instructions([
            "Check constraints, referential integrity and value distributions",
            "Scan for unmasked personal data",
            "Score validation and compliance from 0 to 100",
        ])
        .output(
            &["validationScore", "complianceScore"],
            json!({
                "validationScore": schema::number(),
                "complianceScore": schema::number(),
                "violations": schema::strings(),
            }),
        )
        .labels(&["test-data", "validation"])
        .build()
}

fn build_provisioning(args: &ProvisioningArgs, ctx: &TaskContext) -> TaskSpec {
    TaskSpec::agent("test-data-provisioner", "Data provisioning", ctx)
        .role(ROLE)
        .task("Provision the validated data into the test environments")
        .context(json!({
            "environments": args.environments,
            "outputDir": args.output_dir,
            "totalRecords": args.total_records,
        }))
        .instructions([
            "Load data with idempotent scripts",
            "Provide a single command to refresh each environment",
        ])
        .output(
            &["environmentsProvisioned"],
            json!({
                "environmentsProvisioned": schema::strings(),
                "refreshCommand": schema::string(),
            }),
        )
        .labels(&["test-data", "provisioning"])
        .build()
}

fn build_documentation(args: &DocumentationArgs, ctx: &TaskContext) -> TaskSpec {
    TaskSpec::agent("test-data-documenter", "Data catalog", ctx)
        .role(ROLE)
        .task(format!(
            "Document the test data catalog for {} in {}",
            args.project_name, args.output_dir
        ))
        .context(json!({
            "approach": args.strategy.approach,
            "validationScore": args.validation.validation_score,
            "complianceScore": args.validation.compliance_score,
            "environments": args.provisioning.environments_provisioned,
        }))
        .instructions(["Describe each data set, its origin and how to refresh it"])
        .output(&["catalogPath"], json!({ "catalogPath": schema::string() }))
        .labels(&["test-data", "documentation"])
        .build()
}

pub const REQUIREMENTS: TaskDef<Inputs, Requirements> = TaskDef::fatal(
    "data-requirements",
    "Failed to analyse test data requirements",
    build_requirements,
);
pub const SCHEMA_DISCOVERY: TaskDef<DiscoveryArgs, SchemaDiscovery> =
    TaskDef::new("schema-discovery", build_schema_discovery);
pub const STRATEGY: TaskDef<StrategyArgs, GenerationStrategy> =
    TaskDef::new("generation-strategy", build_strategy);
pub const SYNTHESIS: TaskDef<PreparationArgs, DataSet> =
    TaskDef::new("data-synthesis", build_preparation);
pub const MASKING: TaskDef<PreparationArgs, DataSet> =
    TaskDef::new("data-masking", build_preparation);
pub const SUBSETTING: TaskDef<PreparationArgs, DataSet> =
    TaskDef::new("data-subsetting", build_preparation);
pub const VALIDATION: TaskDef<ValidationArgs, DataValidation> =
    TaskDef::new("data-validation", build_validation);
pub const PROVISIONING: TaskDef<ProvisioningArgs, Provisioning> =
    TaskDef::new("data-provisioning", build_provisioning);
pub const DOCUMENTATION: TaskDef<DocumentationArgs, Documentation> =
    TaskDef::new("data-documentation", build_documentation);

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Output {
    pub success: bool,
    pub project_name: String,
    pub schemas_found: u64,
    pub total_records: u64,
    pub validation_score: f64,
    pub compliance_score: f64,
    pub meets_validation: bool,
    pub meets_compliance: bool,
    pub environments_provisioned: Vec<String>,
    pub catalog_path: String,
    pub metadata: RunMetadata,
}

pub struct TestDataManagement;

#[async_trait]
impl Process for TestDataManagement {
    fn id(&self) -> &'static str {
        "test-data-management"
    }

    fn description(&self) -> &'static str {
        "Generate, mask, validate and provision compliant test data"
    }

    async fn run(&self, inputs: Value, run: &mut WorkflowRun) -> Result<Value> {
        let inputs: Inputs = parse_inputs(inputs)?;
        run.set_output_dir(&inputs.output_dir);

        run.phase("Requirements Analysis");
        let requirements = run.task(&REQUIREMENTS, &inputs).await?.payload;

        run.phase("Schema Discovery");
        let schemas = run
            .task(
                &SCHEMA_DISCOVERY,
                &DiscoveryArgs {
                    data_sources: inputs.data_sources.clone(),
                    requirements: requirements.clone(),
                },
            )
            .await?
            .payload;
        run.breakpoint_if(
            !schemas.missing_schemas.is_empty(),
            Breakpoint {
                title: "Missing Schemas".to_string(),
                question: format!(
                    "No schema was found for {}. Continue generating data for the remaining entities?",
                    schemas.missing_schemas.join(", ")
                ),
                context: json!({
                    "schemasFound": schemas.schemas_found,
                    "missingSchemas": schemas.missing_schemas,
                }),
                artifacts: Vec::new(),
            },
        )
        .await?;

        run.phase("Generation Strategy");
        let strategy = run
            .task(
                &STRATEGY,
                &StrategyArgs {
                    compliance: inputs.compliance.clone(),
                    target_volume: inputs.target_volume,
                    requirements: requirements.clone(),
                    schemas: schemas.clone(),
                },
            )
            .await?
            .payload;

        run.phase("Data Preparation");
        let mut branches = Vec::new();
        for (technique, def) in [
            ("synthesis", &SYNTHESIS),
            ("masking", &MASKING),
            ("subsetting", &SUBSETTING),
        ] {
            let args = PreparationArgs {
                technique: technique.to_string(),
                project_name: inputs.project_name.clone(),
                target_volume: inputs.target_volume,
                compliance: inputs.compliance.clone(),
                sensitive_fields: requirements.sensitive_fields.clone(),
                strategy: strategy.clone(),
            };
            branches.push(run.prepare(def, &args)?);
        }
        let data_sets = run.all(branches).await?;
        let total_records = aggregate::total(&data_sets, |d| d.records);

        run.phase("Data Validation");
        let validation = run
            .task(
                &VALIDATION,
                &ValidationArgs {
                    compliance: inputs.compliance.clone(),
                    sensitive_fields: requirements.sensitive_fields.clone(),
                    data_sets: data_sets.into_iter().map(|d| d.payload).collect(),
                },
            )
            .await?
            .payload;
        let meets_validation = run
            .gate(
                &QualityGate::at_least(
                    "validationScore",
                    validation.validation_score,
                    inputs.min_validation_score,
                ),
                Breakpoint {
                    title: "Data Validation Score".to_string(),
                    question: format!(
                        "Validation score {:.1} is below {:.1}. Provision the data anyway?",
                        validation.validation_score, inputs.min_validation_score
                    ),
                    context: json!({
                        "validationScore": validation.validation_score,
                        "minValidationScore": inputs.min_validation_score,
                        "violations": validation.violations,
                    }),
                    artifacts: Vec::new(),
                },
            )
            .await?;
        let meets_compliance = run
            .gate(
                &QualityGate::at_least(
                    "complianceScore",
                    validation.compliance_score,
                    inputs.min_compliance_score,
                ),
                Breakpoint {
                    title: "Data Compliance Score".to_string(),
                    question: format!(
                        "Compliance score {:.1} is below {:.1} for {}. Provision the data anyway?",
                        validation.compliance_score,
                        inputs.min_compliance_score,
                        inputs.compliance.join(", ")
                    ),
                    context: json!({
                        "complianceScore": validation.compliance_score,
                        "minComplianceScore": inputs.min_compliance_score,
                        "violations": validation.violations,
                    }),
                    artifacts: Vec::new(),
                },
            )
            .await?;

        run.phase("Provisioning");
        let provisioning = run
            .task(
                &PROVISIONING,
                &ProvisioningArgs {
                    environments: inputs.environments.clone(),
                    output_dir: inputs.output_dir.clone(),
                    total_records,
                },
            )
            .await?
            .payload;

        run.phase("Documentation");
        let documentation = run
            .task(
                &DOCUMENTATION,
                &DocumentationArgs {
                    project_name: inputs.project_name.clone(),
                    output_dir: inputs.output_dir.clone(),
                    strategy,
                    validation: validation.clone(),
                    provisioning: provisioning.clone(),
                },
            )
            .await?
            .payload;

        let output = Output {
            success: meets_validation,
            project_name: inputs.project_name,
            schemas_found: schemas.schemas_found,
            total_records,
            validation_score: validation.validation_score,
            compliance_score: validation.compliance_score,
            meets_validation,
            meets_compliance,
            environments_provisioned: provisioning.environments_provisioned,
            catalog_path: documentation.catalog_path,
            metadata: aggregate::metadata(run),
        };
        Ok(serde_json::to_value(output)?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::review::ReviewDecision;
    use crate::testing::{run_with, RecordingReviewer, ScriptedExecutor};
    use crate::workflow::{execute, RunState};

    fn executor(validation_score: f64, compliance_score: f64) -> ScriptedExecutor {
        ScriptedExecutor::new()
            .respond(
                "data-requirements",
                json!({ "success": true, "entities": ["customer", "order"], "sensitiveFields": ["email"] }),
            )
            .respond("schema-discovery", json!({ "schemasFound": 2 }))
            .respond("generation-strategy", json!({ "approach": "hybrid" }))
            .respond("data-synthesis", json!({ "records": 5000, "artifacts": [{ "path": "data/synthetic.sql" }] }))
            .respond("data-masking", json!({ "records": 3000, "artifacts": [{ "path": "data/masked.sql" }] }))
            .respond("data-subsetting", json!({ "records": 2000, "artifacts": [{ "path": "data/subset.sql" }] }))
            .respond(
                "data-validation",
                json!({ "validationScore": validation_score, "complianceScore": compliance_score }),
            )
            .respond("data-provisioning", json!({ "environmentsProvisioned": ["qa", "staging"] }))
            .respond("data-documentation", json!({ "catalogPath": "test-data/CATALOG.md" }))
    }

    fn inputs() -> Value {
        json!({ "projectName": "shop", "environments": ["qa", "staging"] })
    }

    #[tokio::test]
    async fn test_full_run_totals_records() {
        let executor = Arc::new(executor(92.0, 99.0));
        let reviewer = Arc::new(RecordingReviewer::new());
        let run = run_with("test-data-management", &executor, &reviewer);

        let record = execute(&TestDataManagement, inputs(), run).await.unwrap();
        let output = record.output.unwrap();

        assert!(record.success);
        assert_eq!(output["totalRecords"], 10_000);
        assert_eq!(output["meetsCompliance"], true);
        assert_eq!(record.artifacts.len(), 3);
        assert!(reviewer.breakpoints().is_empty());
    }

    #[tokio::test]
    async fn test_low_validation_score_fails_top_level() {
        let executor = Arc::new(executor(70.0, 99.0));
        let reviewer = Arc::new(RecordingReviewer::new());
        let run = run_with("test-data-management", &executor, &reviewer);

        let record = execute(&TestDataManagement, inputs(), run).await.unwrap();

        assert!(!record.success);
        assert_eq!(record.state, RunState::Completed);
        assert_eq!(reviewer.titles(), ["Data Validation Score"]);
        assert!(executor.called("data-documentation"));
    }

    #[tokio::test]
    async fn test_low_compliance_raises_breakpoint_without_failing() {
        let executor = Arc::new(executor(92.0, 90.0));
        let reviewer = Arc::new(RecordingReviewer::new());
        let run = run_with("test-data-management", &executor, &reviewer);

        let record = execute(&TestDataManagement, inputs(), run).await.unwrap();

        assert!(record.success);
        assert_eq!(reviewer.titles(), ["Data Compliance Score"]);
        assert_eq!(record.output.unwrap()["meetsCompliance"], false);
    }

    #[tokio::test]
    async fn test_rejected_missing_schemas_stop_the_run() {
        let executor = Arc::new(executor(92.0, 99.0).respond(
            "schema-discovery",
            json!({ "schemasFound": 1, "missingSchemas": ["order"] }),
        ));
        let reviewer = Arc::new(RecordingReviewer::answering(vec![ReviewDecision::Reject {
            reason: Some("order data is essential".to_string()),
        }]));
        let run = run_with("test-data-management", &executor, &reviewer);

        let record = execute(&TestDataManagement, inputs(), run).await.unwrap();

        assert!(!record.success);
        assert_eq!(reviewer.titles(), ["Missing Schemas"]);
        assert_eq!(record.details.unwrap()["reason"], "order data is essential");
        assert!(!executor.called("generation-strategy"));
    }

    #[tokio::test]
    async fn test_requirements_failure_aborts() {
        let executor = Arc::new(
            executor(92.0, 99.0).respond("data-requirements", json!({ "success": false })),
        );
        let reviewer = Arc::new(RecordingReviewer::new());
        let run = run_with("test-data-management", &executor, &reviewer);

        let record = execute(&TestDataManagement, inputs(), run).await.unwrap();

        assert!(!record.success);
        assert_eq!(
            record.error.as_deref(),
            Some("Failed to analyse test data requirements")
        );
        assert_eq!(executor.calls(), ["data-requirements"]);
    }
}
