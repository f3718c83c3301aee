//! Visual regression testing: baselines, masking, comparison and triage.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::Result;
use crate::review::Breakpoint;
use crate::task::{schema, TaskContext, TaskDef, TaskSpec};
use crate::workflow::aggregate::{self, RunMetadata};
use crate::workflow::{parse_inputs, Process, WorkflowRun};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inputs {
    pub base_url: String,
    #[serde(default)]
    pub pages: Vec<String>,
    #[serde(default = "default_viewports")]
    pub viewports: Vec<String>,
    #[serde(default = "default_tool")]
    pub tool: String,
    #[serde(default = "default_threshold")]
    pub diff_threshold: f64,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

fn default_viewports() -> Vec<String> {
    vec![
        "mobile".to_string(),
        "tablet".to_string(),
        "desktop".to_string(),
    ]
}

fn default_tool() -> String {
    "playwright".to_string()
}

fn default_threshold() -> f64 {
    0.1
}

fn default_output_dir() -> String {
    "visual-regression".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolingSetup {
    pub success: bool,
    #[serde(default)]
    pub config_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInventory {
    pub pages: Vec<String>,
    #[serde(default)]
    pub components: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewport {
    pub name: String,
    pub width: u64,
    pub height: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewportConfig {
    pub viewports: Vec<Viewport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Baseline {
    pub viewport: String,
    pub screenshots: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Masking {
    pub masked_regions: u64,
    #[serde(default)]
    pub selectors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonConfig {
    pub threshold: f64,
    #[serde(default)]
    pub algorithm: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CiIntegration {
    pub workflow_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Difference {
    pub page: String,
    pub viewport: String,
    #[serde(default)]
    pub diff_percentage: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comparison {
    pub comparisons_run: u64,
    pub differences_found: u64,
    #[serde(default)]
    pub differences: Vec<Difference>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Triage {
    pub regressions: u64,
    pub intentional_changes: u64,
    #[serde(default)]
    pub false_positives: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub report_path: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryArgs {
    pub base_url: String,
    pub pages: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BaselineArgs {
    pub base_url: String,
    pub tool: String,
    pub viewport: Viewport,
    pub pages: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaskingArgs {
    pub pages: Vec<String>,
    pub baselines: Vec<Baseline>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuiteArgs {
    pub tool: String,
    pub diff_threshold: f64,
    pub pages: Vec<String>,
    pub viewports: Vec<Viewport>,
    pub masking: Masking,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriageArgs {
    pub base_url: String,
    pub comparison: Comparison,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportArgs {
    pub output_dir: String,
    pub pages: usize,
    pub screenshots: u64,
    pub comparison: Comparison,
    pub triage: Option<Triage>,
}

const ROLE: &str = "a front-end test engineer specialising in visual testing";

fn build_tooling_setup(args: &Inputs, ctx: &TaskContext) -> TaskSpec {
    TaskSpec::agent("visual-tooling-engineer", "Visual testing tooling setup", ctx)
        .role(ROLE)
        .task(format!("Set up {} visual comparison tooling", args.tool))
        .context(json!({ "baseUrl": args.base_url, "tool": args.tool }))
        .instructions([
            "Install the screenshot and comparison tooling",
            "Verify the base URL is reachable from the test runner",
            "Report success: false if tooling cannot be set up",
        ])
        .output(
            &["success"],
            json!({ "success": schema::boolean(), "configPath": schema::string() }),
        )
        .labels(&["visual-regression", "setup"])
        .build()
}

fn build_page_inventory(args: &InventoryArgs, ctx: &TaskContext) -> TaskSpec {
    TaskSpec::agent("page-inventory-analyst", "Page inventory", ctx)
        .role(ROLE)
        .task(format!("Inventory the pages of {} to cover", args.base_url))
        .context(json!({ "requestedPages": args.pages }))
        .instructions([
            "Start from the requested pages and add key templates",
            "List shared components worth isolating",
        ])
        .output(
            &["pages"],
            json!({ "pages": schema::strings(), "components": schema::strings() }),
        )
        .labels(&["visual-regression", "inventory"])
        .build()
}

fn build_viewport_config(args: &Inputs, ctx: &TaskContext) -> TaskSpec {
    TaskSpec::agent("viewport-planner", "Viewport configuration", ctx)
        .role(ROLE)
        .task("Define concrete viewport sizes")
        .context(json!({ "viewports": args.viewports }))
        .instructions(["Give each requested viewport a width and height in pixels"])
        .output(
            &["viewports"],
            json!({
                "viewports": schema::array_of(json!({
                    "type": "object",
                    "properties": {
                        "name": schema::string(),
                        "width": schema::integer(),
                        "height": schema::integer(),
                    },
                    "required": ["name", "width", "height"],
                })),
            }),
        )
        .labels(&["visual-regression", "viewports"])
        .build()
}

fn build_baseline_capture(args: &BaselineArgs, ctx: &TaskContext) -> TaskSpec {
    TaskSpec::agent(
        "baseline-capture",
        &format!("Baseline capture ({})", args.viewport.name),
        ctx,
    )
    .role(ROLE)
    .task(format!(
        "Capture baseline screenshots at {}x{}",
        args.viewport.width, args.viewport.height
    ))
    .context(json!({
        "baseUrl": args.base_url,
        "tool": args.tool,
        "viewport": args.viewport,
        "pages": args.pages,
    }))
    .instructions([
        "Wait for fonts, images and animations to settle before capturing",
        "List every baseline image as an artifact",
    ])
    .output(
        &["viewport", "screenshots"],
        json!({ "viewport": schema::string(), "screenshots": schema::integer() }),
    )
    .labels(&["visual-regression", "baseline"])
    .build()
}

fn build_masking(args: &MaskingArgs, ctx: &TaskContext) -> TaskSpec {
    TaskSpec::agent("dynamic-content-masker", "Dynamic content masking", ctx)
        .role(ROLE)
        .task("Mask dynamic content that would cause false positives")
        .context(json!({ "pages": args.pages, "baselines": args.baselines }))
        .instructions(["Mask dates, ads, avatars, carousels and live counters"])
        .output(
            &["maskedRegions"],
            json!({ "maskedRegions": schema::integer(), "selectors": schema::strings() }),
        )
        .labels(&["visual-regression", "masking"])
        .build()
}

fn build_comparison_config(args: &SuiteArgs, ctx: &TaskContext) -> TaskSpec {
    TaskSpec::agent("comparison-configurator", "Comparison configuration", ctx)
        .role(ROLE)
        .task("Configure screenshot comparison thresholds")
        .context(json!({
            "tool": args.tool,
            "requestedThreshold": args.diff_threshold,
            "maskedSelectors": args.masking.selectors,
        }))
        .instructions(["Tune thresholds to ignore anti-aliasing noise"])
        .output(
            &["threshold"],
            json!({ "threshold": schema::number(), "algorithm": schema::string() }),
        )
        .labels(&["visual-regression", "comparison"])
        .build()
}

fn build_ci_integration(args: &SuiteArgs, ctx: &TaskContext) -> TaskSpec {
    TaskSpec::agent("visual-ci-engineer", "CI integration", ctx)
        .role(ROLE)
        .task("Run visual comparisons on every pull request")
        .context(json!({ "tool": args.tool, "viewports": args.viewports }))
        .instructions([
            "Upload diff images as build artifacts",
            "Document how to approve new baselines",
        ])
        .output(&["workflowPath"], json!({ "workflowPath": schema::string() }))
        .labels(&["visual-regression", "ci"])
        .build()
}

fn build_initial_comparison(args: &SuiteArgs, ctx: &TaskContext) -> TaskSpec {
    TaskSpec::agent("visual-comparator", "Initial visual comparison", ctx)
        .role(ROLE)
        .task("Run the first comparison of the current build against the baselines")
        .context(json!({
            "pages": args.pages,
            "viewports": args.viewports.iter().map(|v| &v.name).collect::<Vec<_>>(),
            "threshold": args.diff_threshold,
        }))
        .instructions(["Report each page and viewport whose diff exceeds the threshold"])
        .output(
            &["comparisonsRun", "differencesFound"],
            json!({
                "comparisonsRun": schema::integer(),
                "differencesFound": schema::integer(),
                "differences": schema::array_of(json!({
                    "type": "object",
                    "properties": {
                        "page": schema::string(),
                        "viewport": schema::string(),
                        "diffPercentage": schema::number(),
                    },
                    "required": ["page", "viewport"],
                })),
            }),
        )
        .labels(&["visual-regression", "comparison"])
        .build()
}

fn build_triage(args: &TriageArgs, ctx: &TaskContext) -> TaskSpec {
    TaskSpec::agent("visual-diff-triager", "Difference triage", ctx)
        .role(ROLE)
        .task(format!("Triage visual differences found on {}", args.base_url))
        .context(json!({ "differences": args.comparison.differences }))
        .instructions([
            "Classify each difference as regression, intentional change or false positive",
            "File regressions with the diff image attached",
        ])
        .output(
            &["regressions", "intentionalChanges"],
            json!({
                "regressions": schema::integer(),
                "intentionalChanges": schema::integer(),
                "falsePositives": schema::integer(),
            }),
        )
        .labels(&["visual-regression", "triage"])
        .build()
}

fn build_report(args: &ReportArgs, ctx: &TaskContext) -> TaskSpec {
    TaskSpec::agent("visual-regression-reporter", "Visual regression report", ctx)
        .role(ROLE)
        .task(format!("Write the visual regression report into {}", args.output_dir))
        .context(json!({
            "pages": args.pages,
            "screenshots": args.screenshots,
            "differencesFound": args.comparison.differences_found,
            "triage": args.triage,
        }))
        .instructions(["Summarise baseline coverage and any regressions"])
        .output(&["reportPath"], json!({ "reportPath": schema::string() }))
        .labels(&["visual-regression", "report"])
        .build()
}

pub const TOOLING_SETUP: TaskDef<Inputs, ToolingSetup> = TaskDef::fatal(
    "visual-tooling-setup",
    "Failed to set up visual testing tooling",
    build_tooling_setup,
);
pub const PAGE_INVENTORY: TaskDef<InventoryArgs, PageInventory> =
    TaskDef::new("page-inventory", build_page_inventory);
pub const VIEWPORT_CONFIG: TaskDef<Inputs, ViewportConfig> =
    TaskDef::new("viewport-config", build_viewport_config);
pub const BASELINE_CAPTURE: TaskDef<BaselineArgs, Baseline> =
    TaskDef::new("baseline-capture", build_baseline_capture);
pub const MASKING: TaskDef<MaskingArgs, Masking> =
    TaskDef::new("dynamic-content-masking", build_masking);
pub const COMPARISON_CONFIG: TaskDef<SuiteArgs, ComparisonConfig> =
    TaskDef::new("comparison-config", build_comparison_config);
pub const CI_INTEGRATION: TaskDef<SuiteArgs, CiIntegration> =
    TaskDef::new("visual-ci-integration", build_ci_integration);
pub const INITIAL_COMPARISON: TaskDef<SuiteArgs, Comparison> =
    TaskDef::new("initial-comparison", build_initial_comparison);
pub const TRIAGE: TaskDef<TriageArgs, Triage> = TaskDef::new("difference-triage", build_triage);
pub const REPORT: TaskDef<ReportArgs, Report> =
    TaskDef::new("visual-regression-report", build_report);

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Output {
    pub success: bool,
    pub base_url: String,
    pub pages_covered: usize,
    pub viewports: Vec<String>,
    pub baseline_screenshots: u64,
    pub masked_regions: u64,
    pub differences_found: u64,
    pub regressions: u64,
    pub ci_workflow: String,
    pub report_path: String,
    pub metadata: RunMetadata,
}

pub struct VisualRegression;

#[async_trait]
impl Process for VisualRegression {
    fn id(&self) -> &'static str {
        "visual-regression"
    }

    fn description(&self) -> &'static str {
        "Capture visual baselines per viewport and detect visual regressions"
    }

    async fn run(&self, inputs: Value, run: &mut WorkflowRun) -> Result<Value> {
        let inputs: Inputs = parse_inputs(inputs)?;
        run.set_output_dir(&inputs.output_dir);

        run.phase("Tooling Setup");
        run.task(&TOOLING_SETUP, &inputs).await?;

        run.phase("Page Inventory");
        let pages = run
            .task(
                &PAGE_INVENTORY,
                &InventoryArgs {
                    base_url: inputs.base_url.clone(),
                    pages: inputs.pages.clone(),
                },
            )
            .await?
            .payload
            .pages;

        run.phase("Viewport Configuration");
        let viewports = run.task(&VIEWPORT_CONFIG, &inputs).await?.payload.viewports;

        run.phase("Baseline Capture");
        let captures = viewports
            .iter()
            .map(|viewport| {
                run.prepare(
                    &BASELINE_CAPTURE,
                    &BaselineArgs {
                        base_url: inputs.base_url.clone(),
                        tool: inputs.tool.clone(),
                        viewport: viewport.clone(),
                        pages: pages.clone(),
                    },
                )
            })
            .collect::<Result<Vec<_>>>()?;
        let baselines = run.all(captures).await?;
        let baseline_screenshots = aggregate::total(&baselines, |b| b.screenshots);

        run.phase("Dynamic Content Masking");
        let masking = run
            .task(
                &MASKING,
                &MaskingArgs {
                    pages: pages.clone(),
                    baselines: baselines.into_iter().map(|b| b.payload).collect(),
                },
            )
            .await?
            .payload;

        let suite = SuiteArgs {
            tool: inputs.tool.clone(),
            diff_threshold: inputs.diff_threshold,
            pages: pages.clone(),
            viewports: viewports.clone(),
            masking: masking.clone(),
        };

        run.phase("Comparison Configuration");
        run.task(&COMPARISON_CONFIG, &suite).await?;

        run.phase("CI Integration");
        let ci = run.task(&CI_INTEGRATION, &suite).await?.payload;

        run.phase("Initial Comparison");
        let comparison = run.task(&INITIAL_COMPARISON, &suite).await?.payload;
        let differences_found = comparison.differences_found;
        run.breakpoint_if(
            differences_found > 0,
            Breakpoint {
                title: "Initial Visual Comparison Results".to_string(),
                question: format!(
                    "{differences_found} visual differences were found in {} comparisons. Proceed to triage?",
                    comparison.comparisons_run
                ),
                context: json!({
                    "differencesFound": differences_found,
                    "comparisonsRun": comparison.comparisons_run,
                    "differences": comparison.differences,
                }),
                artifacts: Vec::new(),
            },
        )
        .await?;

        let triage = if differences_found > 0 {
            run.phase("Difference Triage");
            let triage = run
                .task(
                    &TRIAGE,
                    &TriageArgs {
                        base_url: inputs.base_url.clone(),
                        comparison: comparison.clone(),
                    },
                )
                .await?
                .payload;
            Some(triage)
        } else {
            None
        };

        run.phase("Report");
        let report = run
            .task(
                &REPORT,
                &ReportArgs {
                    output_dir: inputs.output_dir.clone(),
                    pages: pages.len(),
                    screenshots: baseline_screenshots,
                    comparison,
                    triage: triage.clone(),
                },
            )
            .await?
            .payload;

        let output = Output {
            success: true,
            base_url: inputs.base_url,
            pages_covered: pages.len(),
            viewports: viewports.into_iter().map(|v| v.name).collect(),
            baseline_screenshots,
            masked_regions: masking.masked_regions,
            differences_found,
            regressions: triage.map(|t| t.regressions).unwrap_or(0),
            ci_workflow: ci.workflow_path,
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
    use crate::testing::{run_with, RecordingReviewer, ScriptedExecutor};
    use crate::workflow::execute;

    fn executor(differences_found: u64) -> ScriptedExecutor {
        let differences: Vec<Value> = (0..differences_found)
            .map(|i| json!({ "page": format!("/page-{i}"), "viewport": "mobile" }))
            .collect();

        ScriptedExecutor::new()
            .respond("visual-tooling-setup", json!({ "success": true }))
            .respond("page-inventory", json!({ "pages": ["/", "/cart", "/checkout"] }))
            .respond(
                "viewport-config",
                json!({ "viewports": [
                    { "name": "mobile", "width": 375, "height": 812 },
                    { "name": "desktop", "width": 1440, "height": 900 }
                ] }),
            )
            .respond("004-baseline-capture", json!({ "viewport": "mobile", "screenshots": 3, "artifacts": [{ "path": "baselines/mobile" }] }))
            .respond("005-baseline-capture", json!({ "viewport": "desktop", "screenshots": 3, "artifacts": [{ "path": "baselines/desktop" }] }))
            .respond("dynamic-content-masking", json!({ "maskedRegions": 4 }))
            .respond("comparison-config", json!({ "threshold": 0.1 }))
            .respond("visual-ci-integration", json!({ "workflowPath": ".github/workflows/visual.yml" }))
            .respond(
                "initial-comparison",
                json!({
                    "comparisonsRun": 6,
                    "differencesFound": differences_found,
                    "differences": differences,
                }),
            )
            .respond("difference-triage", json!({ "regressions": 1, "intentionalChanges": 1 }))
            .respond("visual-regression-report", json!({ "reportPath": "visual-regression/report.md" }))
    }

    fn inputs() -> Value {
        json!({ "baseUrl": "https://shop.test", "viewports": ["mobile", "desktop"] })
    }

    #[tokio::test]
    async fn test_no_differences_skips_breakpoint_and_triage() {
        let executor = Arc::new(executor(0));
        let reviewer = Arc::new(RecordingReviewer::new());
        let run = run_with("visual-regression", &executor, &reviewer);

        let record = execute(&VisualRegression, inputs(), run).await.unwrap();
        let output = record.output.unwrap();

        assert!(record.success);
        assert!(reviewer.breakpoints().is_empty());
        assert!(!executor.called("difference-triage"));
        assert_eq!(output["differencesFound"], 0);
        assert_eq!(output["baselineScreenshots"], 6);
    }

    #[tokio::test]
    async fn test_differences_raise_breakpoint_and_triage() {
        let executor = Arc::new(executor(2));
        let reviewer = Arc::new(RecordingReviewer::new());
        let run = run_with("visual-regression", &executor, &reviewer);

        let record = execute(&VisualRegression, inputs(), run).await.unwrap();

        assert_eq!(reviewer.titles(), ["Initial Visual Comparison Results"]);
        assert_eq!(reviewer.breakpoints()[0].context["differencesFound"], 2);
        assert!(executor.called("difference-triage"));
        assert_eq!(record.output.unwrap()["regressions"], 1);
        assert_eq!(record.breakpoints[0].phase, 8);
    }

    #[tokio::test]
    async fn test_one_baseline_per_viewport_in_order() {
        let executor = Arc::new(executor(0));
        let reviewer = Arc::new(RecordingReviewer::new());
        let run = run_with("visual-regression", &executor, &reviewer);

        let record = execute(&VisualRegression, inputs(), run).await.unwrap();

        let paths: Vec<_> = record.artifacts.iter().map(|a| a.path.as_str()).collect();
        assert_eq!(paths, ["baselines/mobile", "baselines/desktop"]);
        assert_eq!(
            record.output.unwrap()["viewports"],
            json!(["mobile", "desktop"])
        );
    }

    #[tokio::test]
    async fn test_tooling_failure_aborts() {
        let executor =
            Arc::new(executor(0).respond("visual-tooling-setup", json!({ "success": false })));
        let reviewer = Arc::new(RecordingReviewer::new());
        let run = run_with("visual-regression", &executor, &reviewer);

        let record = execute(&VisualRegression, inputs(), run).await.unwrap();

        assert!(!record.success);
        assert_eq!(
            record.error.as_deref(),
            Some("Failed to set up visual testing tooling")
        );
        assert_eq!(executor.calls(), ["visual-tooling-setup"]);
    }
}
