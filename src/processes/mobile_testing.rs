//! Mobile application testing across iOS and Android.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::Result;
use crate::review::Breakpoint;
use crate::task::{schema, TaskContext, TaskDef, TaskSpec};
use crate::workflow::aggregate::{self, RunMetadata};
use crate::workflow::{parse_inputs, Process, QualityGate, WorkflowRun};

/// Fewer planned scenarios than this raises the coverage breakpoint.
const MIN_SCENARIOS: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inputs {
    pub app_name: String,
    #[serde(default = "default_platforms")]
    pub platforms: Vec<String>,
    #[serde(default = "default_test_types")]
    pub test_types: Vec<String>,
    #[serde(default)]
    pub devices: Vec<String>,
    #[serde(default)]
    pub acceptance_criteria: AcceptanceCriteria,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptanceCriteria {
    #[serde(default = "default_min_pass_rate")]
    pub min_pass_rate: f64,
}

impl Default for AcceptanceCriteria {
    fn default() -> Self {
        Self {
            min_pass_rate: default_min_pass_rate(),
        }
    }
}

fn default_platforms() -> Vec<String> {
    vec!["iOS".to_string(), "Android".to_string()]
}

fn default_test_types() -> Vec<String> {
    vec![
        "functional".to_string(),
        "ui".to_string(),
        "performance".to_string(),
    ]
}

fn default_min_pass_rate() -> f64 {
    90.0
}

fn default_output_dir() -> String {
    "mobile-testing-output".to_string()
}

// --- Phase payloads ---

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentSetup {
    pub success: bool,
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub simulators: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub title: String,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioPlan {
    pub scenarios: Vec<Scenario>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceTarget {
    pub name: String,
    pub platform: String,
    #[serde(default)]
    pub os_version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceMatrix {
    pub devices: Vec<DeviceTarget>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSuite {
    pub tests_created: u64,
    #[serde(default)]
    pub framework: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReport {
    pub total_tests: u64,
    pub pass_rate: f64,
    #[serde(default)]
    pub failed: Option<u64>,
    #[serde(default)]
    pub crashes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompatibilityAnalysis {
    #[serde(default)]
    pub compatibility_score: Option<f64>,
    #[serde(default)]
    pub issues: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub report_path: String,
    #[serde(default)]
    pub summary: Option<String>,
}

// --- Task arguments ---

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanningArgs {
    pub inputs: Inputs,
    pub environment: EnvironmentSetup,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImplementationArgs {
    pub test_type: String,
    pub app_name: String,
    pub platforms: Vec<String>,
    pub scenarios: Vec<Scenario>,
    pub devices: Vec<DeviceTarget>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionArgs {
    pub app_name: String,
    pub suites: Vec<TestSuite>,
    pub devices: Vec<DeviceTarget>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportArgs {
    pub inputs: Inputs,
    pub scenario_count: usize,
    pub execution: ExecutionReport,
    pub compatibility: CompatibilityAnalysis,
}

// --- Task definitions ---

const ROLE: &str = "a senior mobile QA automation engineer";

fn build_environment_setup(args: &Inputs, ctx: &TaskContext) -> TaskSpec {
    TaskSpec::agent("mobile-environment-engineer", "Mobile test environment setup", ctx)
        .role(ROLE)
        .task(format!(
            "Set up a mobile test automation environment for {} on {}",
            args.app_name,
            args.platforms.join(", ")
        ))
        .context(json!({ "appName": args.app_name, "platforms": args.platforms }))
        .instructions([
            "Install and configure the automation framework for every target platform",
            "Provision simulators or emulators for each platform",
            "Verify the app can be installed and launched",
            "Report success: false if the environment cannot be made usable",
        ])
        .output(
            &["success"],
            json!({
                "success": schema::boolean(),
                "tools": schema::strings(),
                "simulators": schema::strings(),
            }),
        )
        .labels(&["mobile-testing", "setup"])
        .build()
}

fn build_scenario_planning(args: &PlanningArgs, ctx: &TaskContext) -> TaskSpec {
    TaskSpec::agent("mobile-test-planner", "Test scenario planning", ctx)
        .role(ROLE)
        .task(format!("Plan mobile test scenarios for {}", args.inputs.app_name))
        .context(json!({
            "platforms": args.inputs.platforms,
            "testTypes": args.inputs.test_types,
            "simulators": args.environment.simulators,
        }))
        .instructions([
            "Identify critical user journeys and platform-specific behaviour",
            "Cover gestures, orientation changes, interruptions and offline mode",
            "Assign each scenario a platform and priority",
        ])
        .output(
            &["scenarios"],
            json!({
                "scenarios": schema::array_of(json!({
                    "type": "object",
                    "properties": {
                        "title": schema::string(),
                        "platform": schema::string(),
                        "priority": schema::string(),
                    },
                    "required": ["title"],
                })),
            }),
        )
        .labels(&["mobile-testing", "planning"])
        .build()
}

fn build_device_matrix(args: &PlanningArgs, ctx: &TaskContext) -> TaskSpec {
    TaskSpec::agent("device-matrix-planner", "Device matrix", ctx)
        .role(ROLE)
        .task("Select the device and OS version matrix to test against")
        .context(json!({
            "platforms": args.inputs.platforms,
            "requestedDevices": args.inputs.devices,
        }))
        .instructions([
            "Include requested devices first",
            "Cover the oldest and newest supported OS version per platform",
            "Balance phone and tablet form factors",
        ])
        .output(
            &["devices"],
            json!({
                "devices": schema::array_of(json!({
                    "type": "object",
                    "properties": {
                        "name": schema::string(),
                        "platform": schema::string(),
                        "osVersion": schema::string(),
                    },
                    "required": ["name", "platform"],
                })),
            }),
        )
        .labels(&["mobile-testing", "devices"])
        .build()
}

fn build_test_implementation(args: &ImplementationArgs, ctx: &TaskContext) -> TaskSpec {
    TaskSpec::agent(
        "mobile-test-developer",
        &format!("Implement {} tests", args.test_type),
        ctx,
    )
    .role(ROLE)
    .task(format!(
        "Implement {} tests for {} covering the planned scenarios",
        args.test_type, args.app_name
    ))
    .context(json!({
        "testType": args.test_type,
        "platforms": args.platforms,
        "scenarioCount": args.scenarios.len(),
        "deviceCount": args.devices.len(),
    }))
    .instructions([
        "Write tests using page objects shared across platforms",
        "Keep platform-specific selectors isolated",
        "List every test file written as an artifact",
    ])
    .output(
        &["testsCreated"],
        json!({
            "testsCreated": schema::integer(),
            "framework": schema::string(),
        }),
    )
    .labels(&["mobile-testing", "implementation"])
    .build()
}

fn build_test_execution(args: &ExecutionArgs, ctx: &TaskContext) -> TaskSpec {
    TaskSpec::agent("mobile-test-runner", "Test execution", ctx)
        .role(ROLE)
        .task(format!("Execute the mobile test suites for {}", args.app_name))
        .context(json!({
            "suites": args.suites.len(),
            "devices": args.devices.iter().map(|d| &d.name).collect::<Vec<_>>(),
        }))
        .instructions([
            "Run every suite on every device in the matrix",
            "Record crashes and ANRs separately from assertion failures",
            "Report passRate as a percentage of all executed tests",
        ])
        .output(
            &["totalTests", "passRate"],
            json!({
                "totalTests": schema::integer(),
                "passRate": schema::number(),
                "failed": schema::integer(),
                "crashes": schema::strings(),
            }),
        )
        .labels(&["mobile-testing", "execution"])
        .build()
}

fn build_compatibility_analysis(args: &ExecutionArgs, ctx: &TaskContext) -> TaskSpec {
    TaskSpec::agent("device-compatibility-analyst", "Device compatibility analysis", ctx)
        .role(ROLE)
        .task("Analyse results per device and OS version for compatibility issues")
        .context(json!({ "devices": args.devices }))
        .instructions([
            "Group failures by device, OS version and screen size",
            "Flag issues that reproduce on a single platform only",
        ])
        .output(
            &[],
            json!({
                "compatibilityScore": schema::number(),
                "issues": schema::strings(),
            }),
        )
        .labels(&["mobile-testing", "analysis"])
        .build()
}

fn build_report(args: &ReportArgs, ctx: &TaskContext) -> TaskSpec {
    TaskSpec::agent("mobile-test-reporter", "Mobile testing report", ctx)
        .role(ROLE)
        .task(format!(
            "Write the mobile testing report for {} into {}",
            args.inputs.app_name, args.inputs.output_dir
        ))
        .context(json!({
            "scenarioCount": args.scenario_count,
            "passRate": args.execution.pass_rate,
            "compatibilityIssues": args.compatibility.issues,
        }))
        .instructions([
            "Summarise coverage, results and compatibility findings",
            "List recommended next steps",
        ])
        .output(
            &["reportPath"],
            json!({ "reportPath": schema::string(), "summary": schema::string() }),
        )
        .labels(&["mobile-testing", "report"])
        .build()
}

pub const ENVIRONMENT_SETUP: TaskDef<Inputs, EnvironmentSetup> = TaskDef::fatal(
    "mobile-environment-setup",
    "Failed to set up mobile testing environment",
    build_environment_setup,
);
pub const SCENARIO_PLANNING: TaskDef<PlanningArgs, ScenarioPlan> =
    TaskDef::new("scenario-planning", build_scenario_planning);
pub const DEVICE_MATRIX: TaskDef<PlanningArgs, DeviceMatrix> =
    TaskDef::new("device-matrix", build_device_matrix);
pub const FUNCTIONAL_TESTS: TaskDef<ImplementationArgs, TestSuite> =
    TaskDef::new("functional-tests", build_test_implementation);
pub const UI_TESTS: TaskDef<ImplementationArgs, TestSuite> =
    TaskDef::new("ui-tests", build_test_implementation);
pub const PERFORMANCE_TESTS: TaskDef<ImplementationArgs, TestSuite> =
    TaskDef::new("performance-tests", build_test_implementation);
pub const TEST_EXECUTION: TaskDef<ExecutionArgs, ExecutionReport> =
    TaskDef::new("test-execution", build_test_execution);
pub const COMPATIBILITY_ANALYSIS: TaskDef<ExecutionArgs, CompatibilityAnalysis> =
    TaskDef::new("compatibility-analysis", build_compatibility_analysis);
pub const REPORT: TaskDef<ReportArgs, Report> = TaskDef::new("mobile-report", build_report);

/// Implementation branches in declaration order, keyed by test type.
const IMPLEMENTATION_BRANCHES: [(&str, &TaskDef<ImplementationArgs, TestSuite>); 3] = [
    ("functional", &FUNCTIONAL_TESTS),
    ("ui", &UI_TESTS),
    ("performance", &PERFORMANCE_TESTS),
];

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Output {
    pub success: bool,
    pub app_name: String,
    pub platforms: Vec<String>,
    pub scenario_count: usize,
    pub device_count: usize,
    pub tests_implemented: u64,
    pub pass_rate: f64,
    pub meets_pass_rate: bool,
    pub compatibility_score: Option<f64>,
    pub report_path: String,
    pub metadata: RunMetadata,
}

pub struct MobileTesting;

#[async_trait]
impl Process for MobileTesting {
    fn id(&self) -> &'static str {
        "mobile-testing"
    }

    fn description(&self) -> &'static str {
        "Plan, implement and execute mobile tests across platforms and devices"
    }

    async fn run(&self, inputs: Value, run: &mut WorkflowRun) -> Result<Value> {
        let inputs: Inputs = parse_inputs(inputs)?;
        run.set_output_dir(&inputs.output_dir);

        run.phase("Environment Setup");
        let environment = run.task(&ENVIRONMENT_SETUP, &inputs).await?;

        let planning = PlanningArgs {
            inputs: inputs.clone(),
            environment: environment.payload,
        };

        run.phase("Scenario Planning");
        let plan = run.task(&SCENARIO_PLANNING, &planning).await?.payload;
        let scenario_count = plan.scenarios.len();
        run.gate(
            &QualityGate::at_least(
                "scenarioCount",
                scenario_count as f64,
                MIN_SCENARIOS as f64,
            ),
            Breakpoint {
                title: "Scenario Coverage".to_string(),
                question: format!(
                    "Only {scenario_count} test scenarios were planned (expected at least {MIN_SCENARIOS}). Proceed with implementation?"
                ),
                context: json!({
                    "scenarioCount": scenario_count,
                    "minimum": MIN_SCENARIOS,
                    "platforms": inputs.platforms,
                }),
                artifacts: Vec::new(),
            },
        )
        .await?;

        run.phase("Device Matrix");
        let devices = run.task(&DEVICE_MATRIX, &planning).await?.payload.devices;

        run.phase("Parallel Test Implementation");
        let mut branches = Vec::new();
        for (test_type, def) in IMPLEMENTATION_BRANCHES {
            if !inputs.test_types.iter().any(|t| t.eq_ignore_ascii_case(test_type)) {
                continue;
            }
            let args = ImplementationArgs {
                test_type: test_type.to_string(),
                app_name: inputs.app_name.clone(),
                platforms: inputs.platforms.clone(),
                scenarios: plan.scenarios.clone(),
                devices: devices.clone(),
            };
            branches.push(run.prepare(def, &args)?);
        }
        let suites = run.all(branches).await?;
        let tests_implemented = aggregate::total(&suites, |s| s.tests_created);

        let execution_args = ExecutionArgs {
            app_name: inputs.app_name.clone(),
            suites: suites.into_iter().map(|s| s.payload).collect(),
            devices: devices.clone(),
        };

        run.phase("Test Execution");
        let execution = run.task(&TEST_EXECUTION, &execution_args).await?.payload;
        let min_pass_rate = inputs.acceptance_criteria.min_pass_rate;
        let meets_pass_rate = run
            .gate(
                &QualityGate::at_least("passRate", execution.pass_rate, min_pass_rate),
                Breakpoint {
                    title: "Test Execution Results".to_string(),
                    question: format!(
                        "Pass rate {:.1}% is below the {:.1}% acceptance criterion. Continue to analysis?",
                        execution.pass_rate, min_pass_rate
                    ),
                    context: json!({
                        "passRate": execution.pass_rate,
                        "minPassRate": min_pass_rate,
                        "totalTests": execution.total_tests,
                        "crashes": execution.crashes,
                    }),
                    artifacts: Vec::new(),
                },
            )
            .await?;

        run.phase("Device Compatibility Analysis");
        let compatibility = run
            .task(&COMPATIBILITY_ANALYSIS, &execution_args)
            .await?
            .payload;

        run.phase("Report");
        let report = run
            .task(
                &REPORT,
                &ReportArgs {
                    inputs: inputs.clone(),
                    scenario_count,
                    execution: execution.clone(),
                    compatibility: compatibility.clone(),
                },
            )
            .await?
            .payload;

        let output = Output {
            success: true,
            app_name: inputs.app_name,
            platforms: inputs.platforms,
            scenario_count,
            device_count: devices.len(),
            tests_implemented,
            pass_rate: execution.pass_rate,
            meets_pass_rate,
            compatibility_score: compatibility.compatibility_score,
            report_path: report.report_path,
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

    fn scenarios(count: usize) -> Value {
        let list: Vec<Value> = (0..count)
            .map(|i| json!({ "title": format!("Scenario {i}"), "platform": "iOS" }))
            .collect();
        json!({ "scenarios": list, "artifacts": [{ "path": "plan/scenarios.md" }] })
    }

    fn executor(scenario_count: usize, pass_rate: f64) -> ScriptedExecutor {
        ScriptedExecutor::new()
            .respond("mobile-environment-setup", json!({ "success": true, "simulators": ["iPhone 15"] }))
            .respond("scenario-planning", scenarios(scenario_count))
            .respond(
                "device-matrix",
                json!({ "devices": [
                    { "name": "iPhone 15", "platform": "iOS" },
                    { "name": "Pixel 8", "platform": "Android" }
                ] }),
            )
            .respond("functional-tests", json!({ "testsCreated": 20, "artifacts": [{ "path": "tests/functional.spec.ts" }] }))
            .respond("ui-tests", json!({ "testsCreated": 12, "artifacts": [{ "path": "tests/ui.spec.ts" }] }))
            .respond("performance-tests", json!({ "testsCreated": 3, "artifacts": [{ "path": "tests/perf.spec.ts" }] }))
            .respond("test-execution", json!({ "totalTests": 35, "passRate": pass_rate }))
            .respond("compatibility-analysis", json!({ "compatibilityScore": 92.5, "issues": [] }))
            .respond("mobile-report", json!({ "reportPath": "mobile-testing-output/report.md" }))
    }

    fn inputs() -> Value {
        json!({ "appName": "Shop", "platforms": ["iOS", "Android"] })
    }

    #[tokio::test]
    async fn test_few_scenarios_raise_coverage_breakpoint() {
        let executor = Arc::new(executor(8, 97.0));
        let reviewer = Arc::new(RecordingReviewer::new());
        let run = run_with("mobile-testing", &executor, &reviewer);

        let record = execute(&MobileTesting, inputs(), run).await.unwrap();

        assert!(record.success);
        assert_eq!(reviewer.titles(), ["Scenario Coverage"]);
        assert_eq!(reviewer.breakpoints()[0].context["scenarioCount"], 8);
        assert_eq!(record.output.unwrap()["scenarioCount"], 8);
    }

    #[tokio::test]
    async fn test_full_run_without_breakpoints() {
        let executor = Arc::new(executor(12, 95.0));
        let reviewer = Arc::new(RecordingReviewer::new());
        let run = run_with("mobile-testing", &executor, &reviewer);

        let record = execute(&MobileTesting, inputs(), run).await.unwrap();
        let output = record.output.clone().unwrap();

        assert!(record.success);
        assert_eq!(record.state, RunState::Completed);
        assert!(reviewer.breakpoints().is_empty());
        assert_eq!(output["testsImplemented"], 35);
        assert_eq!(output["deviceCount"], 2);
        assert_eq!(output["meetsPassRate"], true);

        let paths: Vec<_> = record.artifacts.iter().map(|a| a.path.as_str()).collect();
        assert_eq!(
            paths,
            [
                "plan/scenarios.md",
                "tests/functional.spec.ts",
                "tests/ui.spec.ts",
                "tests/perf.spec.ts"
            ]
        );
    }

    #[tokio::test]
    async fn test_huge_branch_count_saturates_total() {
        let executor = Arc::new(
            executor(12, 95.0)
                .respond("functional-tests", json!({ "testsCreated": u64::MAX }))
                .respond("ui-tests", json!({ "testsCreated": 1 }))
                .respond("performance-tests", json!({ "testsCreated": 1 })),
        );
        let reviewer = Arc::new(RecordingReviewer::new());
        let run = run_with("mobile-testing", &executor, &reviewer);

        let record = execute(&MobileTesting, inputs(), run).await.unwrap();

        assert!(record.success);
        assert_eq!(record.output.unwrap()["testsImplemented"], u64::MAX);
    }

    #[tokio::test]
    async fn test_record_carries_process_output_dir() {
        let executor = Arc::new(executor(12, 95.0));
        let reviewer = Arc::new(RecordingReviewer::new());
        let run = run_with("mobile-testing", &executor, &reviewer);

        let record = execute(
            &MobileTesting,
            json!({ "appName": "Shop", "outputDir": "qa/mobile" }),
            run,
        )
        .await
        .unwrap();

        assert_eq!(record.output_dir.as_deref(), Some("qa/mobile"));
        assert_eq!(serde_json::to_value(&record).unwrap()["outputDir"], "qa/mobile");
    }

    #[tokio::test]
    async fn test_low_pass_rate_raises_breakpoint() {
        let executor = Arc::new(executor(12, 39.0));
        let reviewer = Arc::new(RecordingReviewer::new());
        let run = run_with("mobile-testing", &executor, &reviewer);

        let record = execute(
            &MobileTesting,
            json!({ "appName": "Shop", "acceptanceCriteria": { "minPassRate": 40 } }),
            run,
        )
        .await
        .unwrap();

        assert!(record.success);
        assert_eq!(reviewer.titles(), ["Test Execution Results"]);
        assert_eq!(record.output.unwrap()["meetsPassRate"], false);
    }

    #[tokio::test]
    async fn test_pass_rate_at_threshold_does_not_fire() {
        let executor = Arc::new(executor(12, 40.0));
        let reviewer = Arc::new(RecordingReviewer::new());
        let run = run_with("mobile-testing", &executor, &reviewer);

        execute(
            &MobileTesting,
            json!({ "appName": "Shop", "acceptanceCriteria": { "minPassRate": 40 } }),
            run,
        )
        .await
        .unwrap();

        assert!(reviewer.breakpoints().is_empty());
    }

    #[tokio::test]
    async fn test_environment_failure_short_circuits() {
        let executor = Arc::new(
            executor(12, 95.0).respond("mobile-environment-setup", json!({ "success": false })),
        );
        let reviewer = Arc::new(RecordingReviewer::new());
        let run = run_with("mobile-testing", &executor, &reviewer);

        let record = execute(&MobileTesting, inputs(), run).await.unwrap();

        assert!(!record.success);
        assert_eq!(
            record.error.as_deref(),
            Some("Failed to set up mobile testing environment")
        );
        assert_eq!(record.output_dir.as_deref(), Some("mobile-testing-output"));
        assert_eq!(executor.calls(), ["mobile-environment-setup"]);
    }

    #[tokio::test]
    async fn test_only_requested_test_types_are_implemented() {
        let executor = Arc::new(executor(12, 95.0));
        let reviewer = Arc::new(RecordingReviewer::new());
        let run = run_with("mobile-testing", &executor, &reviewer);

        let record = execute(
            &MobileTesting,
            json!({ "appName": "Shop", "testTypes": ["functional"] }),
            run,
        )
        .await
        .unwrap();

        assert!(!executor.called("ui-tests"));
        assert!(!executor.called("performance-tests"));
        assert_eq!(record.output.unwrap()["testsImplemented"], 20);
    }

    #[tokio::test]
    async fn test_rejecting_coverage_stops_before_implementation() {
        let executor = Arc::new(executor(3, 95.0));
        let reviewer = Arc::new(RecordingReviewer::answering(vec![ReviewDecision::Reject {
            reason: None,
        }]));
        let run = run_with("mobile-testing", &executor, &reviewer);

        let record = execute(&MobileTesting, inputs(), run).await.unwrap();

        assert!(!record.success);
        assert_eq!(record.state, RunState::Failed);
        assert!(!executor.called("device-matrix"));
    }

    #[test]
    fn test_inputs_defaults() {
        let inputs: Inputs = parse_inputs(json!({ "appName": "Shop" })).unwrap();
        assert_eq!(inputs.platforms, ["iOS", "Android"]);
        assert_eq!(inputs.test_types.len(), 3);
        assert_eq!(inputs.acceptance_criteria.min_pass_rate, 90.0);
        assert!(parse_inputs::<Inputs>(json!({})).is_err());
    }
}
