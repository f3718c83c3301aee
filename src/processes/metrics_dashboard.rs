//! Quality metrics dashboard: from raw data sources to validated panels.

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
    #[serde(default = "default_sources")]
    pub data_sources: Vec<String>,
    #[serde(default = "default_platform")]
    pub dashboard_platform: String,
    #[serde(default = "default_min_quality_score")]
    pub min_quality_score: f64,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

fn default_sources() -> Vec<String> {
    vec![
        "test-results".to_string(),
        "coverage".to_string(),
        "defect-tracker".to_string(),
    ]
}

fn default_platform() -> String {
    "grafana".to_string()
}

fn default_min_quality_score() -> f64 {
    80.0
}

fn default_output_dir() -> String {
    "metrics-dashboard".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceAnalysis {
    pub success: bool,
    #[serde(default)]
    pub available_sources: Vec<String>,
    #[serde(default)]
    pub data_gaps: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricDefinition {
    pub name: String,
    #[serde(default)]
    pub formula: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricCatalogue {
    pub metrics: Vec<MetricDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionPipeline {
    pub pipeline_configured: bool,
    #[serde(default)]
    pub missing_data: Vec<String>,
    #[serde(default)]
    pub schedule: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryPanel {
    pub panels: u64,
    #[serde(default)]
    pub headline_metrics: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPanel {
    pub panels: u64,
    #[serde(default)]
    pub window_days: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoveragePanel {
    pub panels: u64,
    #[serde(default)]
    pub current_coverage: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefectPanel {
    pub panels: u64,
    #[serde(default)]
    pub open_defects: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alerting {
    pub alert_rules: u64,
    #[serde(default)]
    pub channels: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Validation {
    pub quality_score: f64,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub dashboard_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionArgs {
    pub project_name: String,
    pub sources: SourceAnalysis,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineArgs {
    pub project_name: String,
    pub sources: Vec<String>,
    pub metrics: Vec<MetricDefinition>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelArgs {
    pub project_name: String,
    pub platform: String,
    pub metrics: Vec<MetricDefinition>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationArgs {
    pub project_name: String,
    pub platform: String,
    pub panels: u64,
    pub alert_rules: u64,
    pub output_dir: String,
}

const ROLE: &str = "a QA metrics and observability engineer";

fn build_source_analysis(args: &Inputs, ctx: &TaskContext) -> TaskSpec {
    TaskSpec::agent("metrics-source-analyst", "Data source analysis", ctx)
        .role(ROLE)
        .task(format!(
            "Analyse the quality data sources available for {}",
            args.project_name
        ))
        .context(json!({ "dataSources": args.data_sources }))
        .instructions([
            "Check every data source is reachable and exports machine-readable data",
            "List data that is expected but missing as dataGaps",
            "Report success: false if no source is usable",
        ])
        .output(
            &["success"],
            json!({
                "success": schema::boolean(),
                "availableSources": schema::strings(),
                "dataGaps": schema::strings(),
            }),
        )
        .labels(&["metrics-dashboard", "sources"])
        .build()
}

fn build_metric_definitions(args: &DefinitionArgs, ctx: &TaskContext) -> TaskSpec {
    TaskSpec::agent("metrics-designer", "Metric definitions", ctx)
        .role(ROLE)
        .task("Define the quality metrics the dashboard will track")
        .context(json!({
            "project": args.project_name,
            "availableSources": args.sources.available_sources,
        }))
        .instructions([
            "Define each metric with a formula and its source",
            "Prefer metrics that can be computed from available sources",
        ])
        .output(
            &["metrics"],
            json!({
                "metrics": schema::array_of(json!({
                    "type": "object",
                    "properties": {
                        "name": schema::string(),
                        "formula": schema::string(),
                        "source": schema::string(),
                    },
                    "required": ["name"],
                })),
            }),
        )
        .labels(&["metrics-dashboard", "definitions"])
        .build()
}

fn build_collection_pipeline(args: &PipelineArgs, ctx: &TaskContext) -> TaskSpec {
    TaskSpec::agent("metrics-pipeline-engineer", "Collection pipeline", ctx)
        .role(ROLE)
        .task("Build the pipeline that collects and stores metric data")
        .context(json!({
            "sources": args.sources,
            "metrics": args.metrics.iter().map(|m| &m.name).collect::<Vec<_>>(),
        }))
        .instructions([
            "Collect each metric from its source on a schedule",
            "List metrics for which no data could be collected as missingData",
        ])
        .output(
            &["pipelineConfigured"],
            json!({
                "pipelineConfigured": schema::boolean(),
                "missingData": schema::strings(),
                "schedule": schema::string(),
            }),
        )
        .labels(&["metrics-dashboard", "pipeline"])
        .build()
}

fn panel_spec(
    name: &str,
    title: &str,
    focus: &str,
    extra: Value,
    args: &PanelArgs,
    ctx: &TaskContext,
) -> TaskSpec {
    let mut properties = json!({ "panels": schema::integer() });
    if let (Value::Object(map), Value::Object(extra)) = (&mut properties, extra) {
        map.extend(extra);
    }

    TaskSpec::agent(name, title, ctx)
        .role(ROLE)
        .task(format!(
            "Build the {focus} panels of the {} dashboard on {}",
            args.project_name, args.platform
        ))
        .context(json!({
            "metrics": args.metrics.iter().map(|m| &m.name).collect::<Vec<_>>(),
        }))
        .instructions([
            "Write panel definitions as code in the dashboard platform's format",
            "List every dashboard file written as an artifact",
        ])
        .output(&["panels"], properties)
        .labels(&["metrics-dashboard", "panels"])
        .build()
}

fn build_summary_panel(args: &PanelArgs, ctx: &TaskContext) -> TaskSpec {
    panel_spec(
        "dashboard-summary-builder",
        "Executive summary panel",
        "executive summary",
        json!({ "headlineMetrics": schema::strings() }),
        args,
        ctx,
    )
}

fn build_trend_panel(args: &PanelArgs, ctx: &TaskContext) -> TaskSpec {
    panel_spec(
        "dashboard-trends-builder",
        "Trend panels",
        "historical trend",
        json!({ "windowDays": schema::integer() }),
        args,
        ctx,
    )
}

fn build_coverage_panel(args: &PanelArgs, ctx: &TaskContext) -> TaskSpec {
    panel_spec(
        "dashboard-coverage-builder",
        "Coverage panels",
        "test coverage",
        json!({ "currentCoverage": schema::number() }),
        args,
        ctx,
    )
}

fn build_defect_panel(args: &PanelArgs, ctx: &TaskContext) -> TaskSpec {
    panel_spec(
        "dashboard-defects-builder",
        "Defect panels",
        "defect tracking",
        json!({ "openDefects": schema::integer() }),
        args,
        ctx,
    )
}

fn build_alerting(args: &PanelArgs, ctx: &TaskContext) -> TaskSpec {
    TaskSpec::agent("metrics-alerting-engineer", "Alerting rules", ctx)
        .role(ROLE)
        .task("Configure alerts for quality regressions")
        .context(json!({
            "platform": args.platform,
            "metrics": args.metrics.iter().map(|m| &m.name).collect::<Vec<_>>(),
        }))
        .instructions([
            "Alert on sustained regressions rather than single data points",
            "Route alerts to the owning team's channel",
        ])
        .output(
            &["alertRules"],
            json!({ "alertRules": schema::integer(), "channels": schema::strings() }),
        )
        .labels(&["metrics-dashboard", "alerting"])
        .build()
}

fn build_validation(args: &ValidationArgs, ctx: &TaskContext) -> TaskSpec {
    TaskSpec::agent("metrics-dashboard-validator", "Dashboard validation", ctx)
        .role(ROLE)
        .task(format!(
            "Validate the {} dashboard end to end and score its quality",
            args.project_name
        ))
        .context(json!({
            "platform": args.platform,
            "panels": args.panels,
            "alertRules": args.alert_rules,
            "outputDir": args.output_dir,
        }))
        .instructions([
            "Verify every panel renders with live data",
            "Score the dashboard from 0 to 100 as qualityScore",
        ])
        .output(
            &["qualityScore"],
            json!({
                "qualityScore": schema::number(),
                "issues": schema::strings(),
                "dashboardUrl": schema::string(),
            }),
        )
        .labels(&["metrics-dashboard", "validation"])
        .build()
}

pub const SOURCE_ANALYSIS: TaskDef<Inputs, SourceAnalysis> = TaskDef::fatal(
    "data-source-analysis",
    "Failed to analyse metrics data sources",
    build_source_analysis,
);
pub const METRIC_DEFINITIONS: TaskDef<DefinitionArgs, MetricCatalogue> =
    TaskDef::new("metric-definitions", build_metric_definitions);
pub const COLLECTION_PIPELINE: TaskDef<PipelineArgs, CollectionPipeline> =
    TaskDef::new("collection-pipeline", build_collection_pipeline);
pub const SUMMARY_PANEL: TaskDef<PanelArgs, SummaryPanel> =
    TaskDef::new("summary-panel", build_summary_panel);
pub const TREND_PANEL: TaskDef<PanelArgs, TrendPanel> =
    TaskDef::new("trend-panel", build_trend_panel);
pub const COVERAGE_PANEL: TaskDef<PanelArgs, CoveragePanel> =
    TaskDef::new("coverage-panel", build_coverage_panel);
pub const DEFECT_PANEL: TaskDef<PanelArgs, DefectPanel> =
    TaskDef::new("defect-panel", build_defect_panel);
pub const ALERTING: TaskDef<PanelArgs, Alerting> = TaskDef::new("alerting", build_alerting);
pub const VALIDATION: TaskDef<ValidationArgs, Validation> =
    TaskDef::new("dashboard-validation", build_validation);

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Output {
    pub success: bool,
    pub project_name: String,
    pub metrics_defined: usize,
    pub panels: u64,
    pub alert_rules: u64,
    pub data_gaps: Vec<String>,
    pub quality_score: f64,
    pub meets_quality_threshold: bool,
    pub dashboard_url: Option<String>,
    pub metadata: RunMetadata,
}

pub struct MetricsDashboard;

#[async_trait]
impl Process for MetricsDashboard {
    fn id(&self) -> &'static str {
        "metrics-dashboard"
    }

    fn description(&self) -> &'static str {
        "Design, build and validate a quality metrics dashboard"
    }

    async fn run(&self, inputs: Value, run: &mut WorkflowRun) -> Result<Value> {
        let inputs: Inputs = parse_inputs(inputs)?;
        run.set_output_dir(&inputs.output_dir);

        run.phase("Data Source Analysis");
        let sources = run.task(&SOURCE_ANALYSIS, &inputs).await?.payload;

        run.phase("Metric Definitions");
        let metrics = run
            .task(
                &METRIC_DEFINITIONS,
                &DefinitionArgs {
                    project_name: inputs.project_name.clone(),
                    sources: sources.clone(),
                },
            )
            .await?
            .payload
            .metrics;

        run.phase("Collection Pipeline");
        let pipeline = run
            .task(
                &COLLECTION_PIPELINE,
                &PipelineArgs {
                    project_name: inputs.project_name.clone(),
                    sources: sources.available_sources.clone(),
                    metrics: metrics.clone(),
                },
            )
            .await?
            .payload;

        let data_gaps: Vec<String> = sources
            .data_gaps
            .iter()
            .chain(&pipeline.missing_data)
            .cloned()
            .collect();
        run.breakpoint_if(
            !data_gaps.is_empty(),
            Breakpoint {
                title: "Metric Data Gaps".to_string(),
                question: format!(
                    "{} metric data gaps were found. Build the dashboard with partial data?",
                    data_gaps.len()
                ),
                context: json!({
                    "dataGaps": data_gaps,
                    "pipelineConfigured": pipeline.pipeline_configured,
                }),
                artifacts: Vec::new(),
            },
        )
        .await?;

        let panel_args = PanelArgs {
            project_name: inputs.project_name.clone(),
            platform: inputs.dashboard_platform.clone(),
            metrics: metrics.clone(),
        };

        run.phase("Dashboard Components");
        let summary = run.prepare(&SUMMARY_PANEL, &panel_args)?;
        let trends = run.prepare(&TREND_PANEL, &panel_args)?;
        let coverage = run.prepare(&COVERAGE_PANEL, &panel_args)?;
        let defects = run.prepare(&DEFECT_PANEL, &panel_args)?;
        let (summary, trends, coverage, defects) = futures::join!(
            summary.execute(),
            trends.execute(),
            coverage.execute(),
            defects.execute()
        );
        let summary = run.settle(summary)?;
        let trends = run.settle(trends)?;
        let coverage = run.settle(coverage)?;
        let defects = run.settle(defects)?;
        let panels = aggregate::saturating_sum([
            summary.payload.panels,
            trends.payload.panels,
            coverage.payload.panels,
            defects.payload.panels,
        ]);

        run.phase("Alerting");
        let alerting = run.task(&ALERTING, &panel_args).await?.payload;

        run.phase("Validation");
        let validation = run
            .task(
                &VALIDATION,
                &ValidationArgs {
                    project_name: inputs.project_name.clone(),
                    platform: inputs.dashboard_platform.clone(),
                    panels,
                    alert_rules: alerting.alert_rules,
                    output_dir: inputs.output_dir.clone(),
                },
            )
            .await?
            .payload;
        let meets_quality_threshold = run
            .gate(
                &QualityGate::at_least(
                    "qualityScore",
                    validation.quality_score,
                    inputs.min_quality_score,
                ),
                Breakpoint {
                    title: "Dashboard Quality Review".to_string(),
                    question: format!(
                        "Dashboard quality score {:.1} is below the minimum of {:.1}. Accept the dashboard as is?",
                        validation.quality_score, inputs.min_quality_score
                    ),
                    context: json!({
                        "qualityScore": validation.quality_score,
                        "minQualityScore": inputs.min_quality_score,
                        "issues": validation.issues,
                    }),
                    artifacts: Vec::new(),
                },
            )
            .await?;

        let output = Output {
            success: meets_quality_threshold,
            project_name: inputs.project_name,
            metrics_defined: metrics.len(),
            panels,
            alert_rules: alerting.alert_rules,
            data_gaps,
            quality_score: validation.quality_score,
            meets_quality_threshold,
            dashboard_url: validation.dashboard_url,
            metadata: aggregate::metadata(run),
        };
        Ok(serde_json::to_value(output)?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::review::ReviewDecision;
    use crate::testing::{run_with, RecordingReviewer, ScriptedExecutor};
    use crate::workflow::{execute, RunState};

    fn executor(quality_score: f64) -> ScriptedExecutor {
        ScriptedExecutor::new()
            .respond(
                "data-source-analysis",
                json!({ "success": true, "availableSources": ["junit", "lcov"] }),
            )
            .respond(
                "metric-definitions",
                json!({ "metrics": [{ "name": "pass-rate" }, { "name": "coverage" }] }),
            )
            .respond("collection-pipeline", json!({ "pipelineConfigured": true }))
            .respond("summary-panel", json!({ "panels": 2, "artifacts": [{ "path": "dash/summary.json" }] }))
            .respond("trend-panel", json!({ "panels": 3, "artifacts": [{ "path": "dash/trends.json" }] }))
            .respond("coverage-panel", json!({ "panels": 1, "artifacts": [{ "path": "dash/coverage.json" }] }))
            .respond("defect-panel", json!({ "panels": 2, "artifacts": [{ "path": "dash/defects.json" }] }))
            .respond("alerting", json!({ "alertRules": 4 }))
            .respond(
                "dashboard-validation",
                json!({ "qualityScore": quality_score, "dashboardUrl": "http://grafana/d/qa" }),
            )
    }

    #[tokio::test]
    async fn test_success_follows_quality_score() {
        let executor = Arc::new(executor(85.0));
        let reviewer = Arc::new(RecordingReviewer::new());
        let run = run_with("metrics-dashboard", &executor, &reviewer);

        let record = execute(&MetricsDashboard, json!({ "projectName": "shop" }), run)
            .await
            .unwrap();
        let output = record.output.unwrap();

        assert!(record.success);
        assert_eq!(output["panels"], 8);
        assert_eq!(output["metricsDefined"], 2);
        assert!(reviewer.breakpoints().is_empty());
    }

    #[tokio::test]
    async fn test_huge_panel_count_saturates() {
        let executor = Arc::new(
            executor(85.0).respond("summary-panel", json!({ "panels": u64::MAX })),
        );
        let reviewer = Arc::new(RecordingReviewer::new());
        let run = run_with("metrics-dashboard", &executor, &reviewer);

        let record = execute(&MetricsDashboard, json!({ "projectName": "shop" }), run)
            .await
            .unwrap();

        assert!(record.success);
        assert_eq!(record.output.unwrap()["panels"], u64::MAX);
    }

    #[tokio::test]
    async fn test_low_quality_score_completes_unsuccessfully() {
        let executor = Arc::new(executor(79.5));
        let reviewer = Arc::new(RecordingReviewer::new());
        let run = run_with("metrics-dashboard", &executor, &reviewer);

        let record = execute(&MetricsDashboard, json!({ "projectName": "shop" }), run)
            .await
            .unwrap();

        assert!(!record.success);
        assert_eq!(record.state, RunState::Completed);
        assert_eq!(reviewer.titles(), ["Dashboard Quality Review"]);
        assert_eq!(record.output.unwrap()["meetsQualityThreshold"], false);
    }

    #[tokio::test]
    async fn test_panel_artifacts_follow_declaration_order() {
        let executor = Arc::new(
            executor(90.0)
                .delay("summary-panel", Duration::from_millis(50))
                .delay("trend-panel", Duration::from_millis(25)),
        );
        let reviewer = Arc::new(RecordingReviewer::new());
        let run = run_with("metrics-dashboard", &executor, &reviewer);

        let record = execute(&MetricsDashboard, json!({ "projectName": "shop" }), run)
            .await
            .unwrap();

        let paths: Vec<_> = record.artifacts.iter().map(|a| a.path.as_str()).collect();
        assert_eq!(
            paths,
            [
                "dash/summary.json",
                "dash/trends.json",
                "dash/coverage.json",
                "dash/defects.json"
            ]
        );
    }

    #[tokio::test]
    async fn test_data_gaps_raise_breakpoint_and_feedback_reaches_panels() {
        let executor = Arc::new(
            executor(90.0).respond(
                "collection-pipeline",
                json!({ "pipelineConfigured": true, "missingData": ["flaky-test-history"] }),
            ),
        );
        let reviewer = Arc::new(RecordingReviewer::answering(vec![ReviewDecision::Modify {
            feedback: "Hide the flakiness panel".to_string(),
        }]));
        let run = run_with("metrics-dashboard", &executor, &reviewer);

        execute(&MetricsDashboard, json!({ "projectName": "shop" }), run)
            .await
            .unwrap();

        assert_eq!(reviewer.titles(), ["Metric Data Gaps"]);
        let trend = executor
            .specs()
            .into_iter()
            .find(|s| s.agent.name == "dashboard-trends-builder")
            .unwrap();
        assert_eq!(
            trend.agent.prompt.context["reviewerFeedback"],
            json!(["Hide the flakiness panel"])
        );
    }

    #[tokio::test]
    async fn test_failing_panel_branch_fails_run() {
        let executor = Arc::new(executor(90.0).respond(
            "coverage-panel",
            json!({ "success": false, "panels": 0, "reason": "no lcov data" }),
        ));
        let reviewer = Arc::new(RecordingReviewer::new());
        let run = run_with("metrics-dashboard", &executor, &reviewer);

        let record = execute(&MetricsDashboard, json!({ "projectName": "shop" }), run)
            .await
            .unwrap();

        assert!(!record.success);
        assert_eq!(record.error.as_deref(), Some("Task coverage-panel reported failure"));
        assert!(!executor.called("alerting"));
        // Branches before the failing one are still folded in.
        let paths: Vec<_> = record.artifacts.iter().map(|a| a.path.as_str()).collect();
        assert_eq!(paths, ["dash/summary.json", "dash/trends.json"]);
    }
}
