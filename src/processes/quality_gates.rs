//! Release quality gates over coverage, static analysis, security and performance.

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
    pub branch: Option<String>,
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thresholds {
    #[serde(default = "default_min_coverage")]
    pub min_coverage: f64,
    #[serde(default)]
    pub max_blocker_issues: u64,
    #[serde(default)]
    pub max_critical_vulnerabilities: u64,
    #[serde(default = "default_max_p95")]
    pub max_p95_response_ms: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_coverage: default_min_coverage(),
            max_blocker_issues: 0,
            max_critical_vulnerabilities: 0,
            max_p95_response_ms: default_max_p95(),
        }
    }
}

fn default_min_coverage() -> f64 {
    80.0
}

fn default_max_p95() -> f64 {
    500.0
}

fn default_output_dir() -> String {
    "quality-gates".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsCollection {
    pub success: bool,
    #[serde(default)]
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageEvaluation {
    pub coverage: f64,
    #[serde(default)]
    pub uncovered_modules: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticAnalysisEvaluation {
    pub blocker_issues: u64,
    #[serde(default)]
    pub major_issues: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityEvaluation {
    pub critical_vulnerabilities: u64,
    #[serde(default)]
    pub high_vulnerabilities: u64,
    #[serde(default)]
    pub advisories: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceEvaluation {
    pub p95_response_ms: f64,
    #[serde(default)]
    pub error_rate: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemediationPlan {
    pub actions: Vec<String>,
    #[serde(default)]
    pub estimated_effort: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub report_path: String,
}

/// Outcome of one gate, as shown to reviewers and the report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GateOutcome {
    pub gate: &'static str,
    pub metric: &'static str,
    pub value: f64,
    pub threshold: f64,
    pub passed: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationArgs {
    pub project_name: String,
    pub branch: Option<String>,
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemediationArgs {
    pub project_name: String,
    pub failed_gates: Vec<GateOutcome>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportArgs {
    pub project_name: String,
    pub output_dir: String,
    pub gates: Vec<GateOutcome>,
    pub remediation: Option<RemediationPlan>,
}

const ROLE: &str = "a release quality engineer";

fn build_collection(args: &Inputs, ctx: &TaskContext) -> TaskSpec {
    TaskSpec::agent("quality-metrics-collector", "Quality metrics collection", ctx)
        .role(ROLE)
        .task(format!(
            "Collect the latest quality metrics for {}",
            args.project_name
        ))
        .context(json!({ "branch": args.branch }))
        .instructions([
            "Gather coverage, static analysis, dependency audit and load test results",
            "Report success: false if the results cannot be collected",
        ])
        .output(
            &["success"],
            json!({ "success": schema::boolean(), "sources": schema::strings() }),
        )
        .labels(&["quality-gates", "collection"])
        .build()
}

fn evaluation_spec(
    name: &str,
    title: &str,
    focus: &str,
    required: &[&str],
    properties: Value,
    args: &EvaluationArgs,
    ctx: &TaskContext,
) -> TaskSpec {
    TaskSpec::agent(name, title, ctx)
        .role(ROLE)
        .task(format!("Evaluate {focus} for {}", args.project_name))
        .context(json!({ "branch": args.branch, "sources": args.sources }))
        .instructions([
            "Report the measured values exactly as the tooling produced them",
            "Do not judge pass or fail",
        ])
        .output(required, properties)
        .labels(&["quality-gates", "evaluation"])
        .build()
}

fn build_coverage(args: &EvaluationArgs, ctx: &TaskContext) -> TaskSpec {
    evaluation_spec(
        "coverage-evaluator",
        "Coverage gate",
        "line coverage",
        &["coverage"],
        json!({ "coverage": schema::number(), "uncoveredModules": schema::strings() }),
        args,
        ctx,
    )
}

fn build_static_analysis(args: &EvaluationArgs, ctx: &TaskContext) -> TaskSpec {
    evaluation_spec(
        "static-analysis-evaluator",
        "Static analysis gate",
        "static analysis findings",
        &["blockerIssues"],
        json!({ "blockerIssues": schema::integer(), "majorIssues": schema::integer() }),
        args,
        ctx,
    )
}

fn build_security(args: &EvaluationArgs, ctx: &TaskContext) -> TaskSpec {
    evaluation_spec(
        "security-evaluator",
        "Security gate",
        "known vulnerabilities",
        &["criticalVulnerabilities"],
        json!({
            "criticalVulnerabilities": schema::integer(),
            "highVulnerabilities": schema::integer(),
            "advisories": schema::strings(),
        }),
        args,
        ctx,
    )
}

fn build_performance(args: &EvaluationArgs, ctx: &TaskContext) -> TaskSpec {
    evaluation_spec(
        "performance-evaluator",
        "Performance gate",
        "response time under load",
        &["p95ResponseMs"],
        json!({ "p95ResponseMs": schema::number(), "errorRate": schema::number() }),
        args,
        ctx,
    )
}

fn build_remediation(args: &RemediationArgs, ctx: &TaskContext) -> TaskSpec {
    TaskSpec::agent("quality-remediation-planner", "Remediation plan", ctx)
        .role(ROLE)
        .task(format!(
            "Plan remediation for the failed quality gates of {}",
            args.project_name
        ))
        .context(json!({ "failedGates": args.failed_gates }))
        .instructions(["Order actions by release risk", "Estimate effort per action"])
        .output(
            &["actions"],
            json!({ "actions": schema::strings(), "estimatedEffort": schema::string() }),
        )
        .labels(&["quality-gates", "remediation"])
        .build()
}

fn build_report(args: &ReportArgs, ctx: &TaskContext) -> TaskSpec {
    TaskSpec::agent("quality-gate-reporter", "Quality gate report", ctx)
        .role(ROLE)
        .task(format!(
            "Write the quality gate report for {} into {}",
            args.project_name, args.output_dir
        ))
        .context(json!({ "gates": args.gates, "remediation": args.remediation }))
        .instructions(["Show each gate with its value and threshold"])
        .output(&["reportPath"], json!({ "reportPath": schema::string() }))
        .labels(&["quality-gates", "report"])
        .build()
}

pub const COLLECTION: TaskDef<Inputs, MetricsCollection> = TaskDef::fatal(
    "metrics-collection",
    "Failed to collect quality metrics",
    build_collection,
);
pub const COVERAGE: TaskDef<EvaluationArgs, CoverageEvaluation> =
    TaskDef::new("coverage-gate", build_coverage);
pub const STATIC_ANALYSIS: TaskDef<EvaluationArgs, StaticAnalysisEvaluation> =
    TaskDef::new("static-analysis-gate", build_static_analysis);
pub const SECURITY: TaskDef<EvaluationArgs, SecurityEvaluation> =
    TaskDef::new("security-gate", build_security);
pub const PERFORMANCE: TaskDef<EvaluationArgs, PerformanceEvaluation> =
    TaskDef::new("performance-gate", build_performance);
pub const REMEDIATION: TaskDef<RemediationArgs, RemediationPlan> =
    TaskDef::new("remediation-plan", build_remediation);
pub const REPORT: TaskDef<ReportArgs, Report> =
    TaskDef::new("quality-gate-report", build_report);

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Output {
    pub success: bool,
    pub project_name: String,
    pub gates_passed: bool,
    pub passed_count: usize,
    pub gate_count: usize,
    pub gates: Vec<GateOutcome>,
    pub remediation_actions: Vec<String>,
    pub report_path: String,
    pub metadata: RunMetadata,
}

pub struct QualityGates;

impl QualityGates {
    fn outcome(gate: &'static str, check: &QualityGate) -> GateOutcome {
        GateOutcome {
            gate,
            metric: check.metric,
            value: check.value,
            threshold: check.threshold,
            passed: check.passes(),
        }
    }
}

#[async_trait]
impl Process for QualityGates {
    fn id(&self) -> &'static str {
        "quality-gates"
    }

    fn description(&self) -> &'static str {
        "Evaluate release quality gates and plan remediation for failures"
    }

    async fn run(&self, inputs: Value, run: &mut WorkflowRun) -> Result<Value> {
        let inputs: Inputs = parse_inputs(inputs)?;
        run.set_output_dir(&inputs.output_dir);
        let thresholds = inputs.thresholds.clone();

        run.phase("Metrics Collection");
        let collection = run.task(&COLLECTION, &inputs).await?.payload;

        let args = EvaluationArgs {
            project_name: inputs.project_name.clone(),
            branch: inputs.branch.clone(),
            sources: collection.sources,
        };

        run.phase("Gate Evaluation");
        let coverage = run.prepare(&COVERAGE, &args)?;
        let static_analysis = run.prepare(&STATIC_ANALYSIS, &args)?;
        let security = run.prepare(&SECURITY, &args)?;
        let performance = run.prepare(&PERFORMANCE, &args)?;
        let (coverage, static_analysis, security, performance) = futures::join!(
            coverage.execute(),
            static_analysis.execute(),
            security.execute(),
            performance.execute()
        );
        let coverage = run.settle(coverage)?.payload;
        let static_analysis = run.settle(static_analysis)?.payload;
        let security = run.settle(security)?.payload;
        let performance = run.settle(performance)?.payload;

        run.phase("Gate Decision");
        let checks = [
            (
                "coverage",
                QualityGate::at_least("coverage", coverage.coverage, thresholds.min_coverage),
                json!({ "uncoveredModules": coverage.uncovered_modules }),
            ),
            (
                "static-analysis",
                QualityGate::at_most(
                    "blockerIssues",
                    static_analysis.blocker_issues as f64,
                    thresholds.max_blocker_issues as f64,
                ),
                json!({ "majorIssues": static_analysis.major_issues }),
            ),
            (
                "security",
                QualityGate::at_most(
                    "criticalVulnerabilities",
                    security.critical_vulnerabilities as f64,
                    thresholds.max_critical_vulnerabilities as f64,
                ),
                json!({
                    "highVulnerabilities": security.high_vulnerabilities,
                    "advisories": security.advisories,
                }),
            ),
            (
                "performance",
                QualityGate::at_most(
                    "p95ResponseMs",
                    performance.p95_response_ms,
                    thresholds.max_p95_response_ms,
                ),
                json!({ "errorRate": performance.error_rate }),
            ),
        ];

        let mut gates = Vec::with_capacity(checks.len());
        for (gate, check, details) in checks {
            let outcome = Self::outcome(gate, &check);
            run.gate(
                &check,
                Breakpoint {
                    title: format!("Quality Gate Failed: {gate}"),
                    question: format!(
                        "{} is {} against a threshold of {}. Override this gate?",
                        check.metric, check.value, check.threshold
                    ),
                    context: json!({ "gate": outcome, "details": details }),
                    artifacts: Vec::new(),
                },
            )
            .await?;
            gates.push(outcome);
        }

        let failed_gates: Vec<GateOutcome> = gates.iter().filter(|g| !g.passed).cloned().collect();
        let gates_passed = failed_gates.is_empty();

        let remediation = if gates_passed {
            None
        } else {
            run.phase("Remediation Plan");
            let plan = run
                .task(
                    &REMEDIATION,
                    &RemediationArgs {
                        project_name: inputs.project_name.clone(),
                        failed_gates,
                    },
                )
                .await?
                .payload;
            Some(plan)
        };

        run.phase("Report");
        let report = run
            .task(
                &REPORT,
                &ReportArgs {
                    project_name: inputs.project_name.clone(),
                    output_dir: inputs.output_dir.clone(),
                    gates: gates.clone(),
                    remediation: remediation.clone(),
                },
            )
            .await?
            .payload;

        let output = Output {
            success: true,
            project_name: inputs.project_name,
            gates_passed,
            passed_count: gates.iter().filter(|g| g.passed).count(),
            gate_count: gates.len(),
            gates,
            remediation_actions: remediation.map(|r| r.actions).unwrap_or_default(),
            report_path: report.report_path,
            metadata: aggregate::metadata(run),
        };
        Ok(serde_json::to_value(output)?)
    }
}
