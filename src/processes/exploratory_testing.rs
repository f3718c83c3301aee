//! Charter-driven exploratory testing sessions.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::Result;
use crate::review::{Breakpoint, Checkpoint};
use crate::task::{schema, TaskContext, TaskDef, TaskSpec};
use crate::workflow::aggregate::{self, RunMetadata};
use crate::workflow::{parse_inputs, Process, QualityGate, WorkflowRun};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inputs {
    pub application: String,
    #[serde(default)]
    pub focus_areas: Vec<String>,
    #[serde(default = "default_session_minutes")]
    pub session_minutes: u64,
    #[serde(default = "default_min_coverage_score")]
    pub min_coverage_score: f64,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

fn default_session_minutes() -> u64 {
    60
}

fn default_min_coverage_score() -> f64 {
    75.0
}

fn default_output_dir() -> String {
    "exploratory-testing".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Charter {
    pub id: String,
    pub mission: String,
    #[serde(default)]
    pub area: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Charters {
    pub charters: Vec<Charter>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Risk {
    pub area: String,
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAnalysis {
    pub risks: Vec<Risk>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPlan {
    pub order: Vec<String>,
    #[serde(default)]
    pub heuristics: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionNotes {
    pub charter_id: String,
    pub bugs_found: u64,
    #[serde(default)]
    pub observations: Vec<String>,
    #[serde(default)]
    pub questions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Findings {
    pub unique_issues: u64,
    #[serde(default)]
    pub critical_issues: u64,
    #[serde(default)]
    pub themes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageAnalysis {
    pub coverage_score: f64,
    #[serde(default)]
    pub untested_areas: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub report_path: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisArgs {
    pub application: String,
    pub charters: Vec<Charter>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanningArgs {
    pub charters: Vec<Charter>,
    pub risks: Vec<Risk>,
    pub session_minutes: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionArgs {
    pub application: String,
    pub charter: Charter,
    pub heuristics: Vec<String>,
    pub session_minutes: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidationArgs {
    pub application: String,
    pub sessions: Vec<SessionNotes>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageArgs {
    pub charters: Vec<Charter>,
    pub risks: Vec<Risk>,
    pub findings: Findings,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportArgs {
    pub application: String,
    pub output_dir: String,
    pub findings: Findings,
    pub coverage: CoverageAnalysis,
}

const ROLE: &str = "an experienced exploratory tester";

fn build_charters(args: &Inputs, ctx: &TaskContext) -> TaskSpec {
    TaskSpec::agent("charter-writer", "Test charters", ctx)
        .role(ROLE)
        .task(format!("Write exploratory test charters for {}", args.application))
        .context(json!({ "focusAreas": args.focus_areas }))
        .instructions([
            "Use the Explore <target> with <resources> to discover <information> format",
            "Give each charter a short unique id",
        ])
        .output(
            &["charters"],
            json!({
                "charters": schema::array_of(json!({
                    "type": "object",
                    "properties": {
                        "id": schema::string(),
                        "mission": schema::string(),
                        "area": schema::string(),
                    },
                    "required": ["id", "mission"],
                })),
            }),
        )
        .labels(&["exploratory-testing", "charters"])
        .build()
}

fn build_risk_analysis(args: &AnalysisArgs, ctx: &TaskContext) -> TaskSpec {
    TaskSpec::agent("risk-analyst", "Risk analysis", ctx)
        .role(ROLE)
        .task(format!("Identify the riskiest areas of {}", args.application))
        .context(json!({ "charters": args.charters }))
        .instructions(["Rate each area high, medium or low"])
        .output(
            &["risks"],
            json!({
                "risks": schema::array_of(json!({
                    "type": "object",
                    "properties": { "area": schema::string(), "level": schema::string() },
                    "required": ["area", "level"],
                })),
            }),
        )
        .labels(&["exploratory-testing", "risk"])
        .build()
}

fn build_session_planning(args: &PlanningArgs, ctx: &TaskContext) -> TaskSpec {
    TaskSpec::agent("session-planner", "Session planning", ctx)
        .role(ROLE)
        .task("Order the charters into time-boxed sessions")
        .context(json!({
            "charters": args.charters.iter().map(|c| &c.id).collect::<Vec<_>>(),
            "risks": args.risks,
            "sessionMinutes": args.session_minutes,
        }))
        .instructions([
            "Schedule high-risk charters first",
            "Suggest test heuristics to apply in every session",
        ])
        .output(
            &["order"],
            json!({ "order": schema::strings(), "heuristics": schema::strings() }),
        )
        .labels(&["exploratory-testing", "planning"])
        .build()
}

fn build_session(args: &SessionArgs, ctx: &TaskContext) -> TaskSpec {
    TaskSpec::agent(
        "exploratory-tester",
        &format!("Session {}", args.charter.id),
        ctx,
    )
    .role(ROLE)
    .task(format!(
        "Run a {}-minute exploratory session on {}: {}",
        args.session_minutes, args.application, args.charter.mission
    ))
    .context(json!({ "charter": args.charter, "heuristics": args.heuristics }))
    .instructions([
        "Keep session notes of what was tested and how",
        "Record every bug with reproduction steps as an artifact",
        "Note open questions for the team",
    ])
    .output(
        &["charterId", "bugsFound"],
        json!({
            "charterId": schema::string(),
            "bugsFound": schema::integer(),
            "observations": schema::strings(),
            "questions": schema::strings(),
        }),
    )
    .labels(&["exploratory-testing", "session"])
    .build()
}

fn build_consolidation(args: &ConsolidationArgs, ctx: &TaskContext) -> TaskSpec {
    TaskSpec::agent("findings-analyst", "Findings consolidation", ctx)
        .role(ROLE)
        .task("Consolidate findings across all sessions")
        .context(json!({ "application": args.application, "sessions": args.sessions }))
        .instructions([
            "Deduplicate bugs reported by more than one session",
            "Group findings into themes",
        ])
        .output(
            &["uniqueIssues"],
            json!({
                "uniqueIssues": schema::integer(),
                "criticalIssues": schema::integer(),
                "themes": schema::strings(),
            }),
        )
        .labels(&["exploratory-testing", "findings"])
        .build()
}

fn build_coverage_analysis(args: &CoverageArgs, ctx: &TaskContext) -> TaskSpec {
    TaskSpec::agent("exploration-coverage-analyst", "Coverage analysis", ctx)
        .role(ROLE)
        .task("Assess how much of the risk surface the sessions covered")
        .context(json!({
            "charters": args.charters.len(),
            "risks": args.risks,
            "themes": args.findings.themes,
        }))
        .instructions([
            "Score coverage from 0 to 100 weighted by risk",
            "List risk areas no session touched",
        ])
        .output(
            &["coverageScore"],
            json!({
                "coverageScore": schema::number(),
                "untestedAreas": schema::strings(),
            }),
        )
        .labels(&["exploratory-testing", "coverage"])
        .build()
}

fn build_report(args: &ReportArgs, ctx: &TaskContext) -> TaskSpec {
    TaskSpec::agent("exploratory-reporter", "Exploratory testing report", ctx)
        .role(ROLE)
        .task(format!(
            "Write the exploratory testing report for {} into {}",
            args.application, args.output_dir
        ))
        .context(json!({ "findings": args.findings, "coverage": args.coverage }))
        .instructions(["Lead with critical issues", "Recommend follow-up charters"])
        .output(&["reportPath"], json!({ "reportPath": schema::string() }))
        .labels(&["exploratory-testing", "report"])
        .build()
}

pub const CHARTERS: TaskDef<Inputs, Charters> = TaskDef::new("test-charters", build_charters);
pub const RISK_ANALYSIS: TaskDef<AnalysisArgs, RiskAnalysis> =
    TaskDef::new("risk-analysis", build_risk_analysis);
pub const SESSION_PLANNING: TaskDef<PlanningArgs, SessionPlan> =
    TaskDef::new("session-planning", build_session_planning);
pub const SESSION: TaskDef<SessionArgs, SessionNotes> =
    TaskDef::new("exploratory-session", build_session);
pub const CONSOLIDATION: TaskDef<ConsolidationArgs, Findings> =
    TaskDef::new("findings-consolidation", build_consolidation);
pub const COVERAGE_ANALYSIS: TaskDef<CoverageArgs, CoverageAnalysis> =
    TaskDef::new("coverage-analysis", build_coverage_analysis);
pub const REPORT: TaskDef<ReportArgs, Report> =
    TaskDef::new("exploratory-report", build_report);

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Output {
    pub success: bool,
    pub application: String,
    pub sessions_run: usize,
    pub bugs_reported: u64,
    pub unique_issues: u64,
    pub critical_issues: u64,
    pub coverage_score: f64,
    pub meets_coverage: bool,
    pub untested_areas: Vec<String>,
    pub report_path: String,
    pub metadata: RunMetadata,
}

pub struct ExploratoryTesting;

#[async_trait]
impl Process for ExploratoryTesting {
    fn id(&self) -> &'static str {
        "exploratory-testing"
    }

    fn description(&self) -> &'static str {
        "Run charter-based exploratory testing sessions and consolidate findings"
    }

    async fn run(&self, inputs: Value, run: &mut WorkflowRun) -> Result<Value> {
        let inputs: Inputs = parse_inputs(inputs)?;
        run.set_output_dir(&inputs.output_dir);

        run.phase("Test Charters");
        let charters = run.task(&CHARTERS, &inputs).await?.payload.charters;

        run.phase("Risk Analysis");
        let risks = run
            .task(
                &RISK_ANALYSIS,
                &AnalysisArgs {
                    application: inputs.application.clone(),
                    charters: charters.clone(),
                },
            )
            .await?
            .payload
            .risks;

        run.phase("Session Planning");
        let plan = run
            .task(
                &SESSION_PLANNING,
                &PlanningArgs {
                    charters: charters.clone(),
                    risks: risks.clone(),
                    session_minutes: inputs.session_minutes,
                },
            )
            .await?
            .payload;

        run.phase("Exploratory Sessions");
        let sessions = charters
            .iter()
            .map(|charter| {
                run.prepare(
                    &SESSION,
                    &SessionArgs {
                        application: inputs.application.clone(),
                        charter: charter.clone(),
                        heuristics: plan.heuristics.clone(),
                        session_minutes: inputs.session_minutes,
                    },
                )
            })
            .collect::<Result<Vec<_>>>()?;
        let sessions = run.all(sessions).await?;
        let bugs_reported = aggregate::total(&sessions, |s| s.bugs_found);

        run.checkpoint(Checkpoint {
            title: "Exploratory Sessions Complete".to_string(),
            message: format!(
                "{} sessions finished with {} bugs reported",
                sessions.len(),
                bugs_reported
            ),
            context: json!({
                "sessions": sessions.len(),
                "bugsReported": bugs_reported,
                "notes": aggregate::artifact_paths(&sessions),
            }),
        })
        .await?;

        let sessions: Vec<SessionNotes> = sessions.into_iter().map(|s| s.payload).collect();
        let sessions_run = sessions.len();

        run.phase("Findings Consolidation");
        let findings = run
            .task(
                &CONSOLIDATION,
                &ConsolidationArgs {
                    application: inputs.application.clone(),
                    sessions,
                },
            )
            .await?
            .payload;

        run.phase("Coverage Analysis");
        let coverage = run
            .task(
                &COVERAGE_ANALYSIS,
                &CoverageArgs {
                    charters,
                    risks,
                    findings: findings.clone(),
                },
            )
            .await?
            .payload;
        let meets_coverage = run
            .gate(
                &QualityGate::at_least(
                    "coverageScore",
                    coverage.coverage_score,
                    inputs.min_coverage_score,
                ),
                Breakpoint {
                    title: "Exploration Coverage".to_string(),
                    question: format!(
                        "Exploration coverage {:.1} is below {:.1}. Write the report anyway?",
                        coverage.coverage_score, inputs.min_coverage_score
                    ),
                    context: json!({
                        "coverageScore": coverage.coverage_score,
                        "minCoverageScore": inputs.min_coverage_score,
                        "untestedAreas": coverage.untested_areas,
                    }),
                    artifacts: Vec::new(),
                },
            )
            .await?;

        run.phase("Report");
        let report = run
            .task(
                &REPORT,
                &ReportArgs {
                    application: inputs.application.clone(),
                    output_dir: inputs.output_dir.clone(),
                    findings: findings.clone(),
                    coverage: coverage.clone(),
                },
            )
            .await?
            .payload;

        let output = Output {
            success: true,
            application: inputs.application,
            sessions_run,
            bugs_reported,
            unique_issues: findings.unique_issues,
            critical_issues: findings.critical_issues,
            coverage_score: coverage.coverage_score,
            meets_coverage,
            untested_areas: coverage.untested_areas,
            report_path: report.report_path,
            metadata: aggregate::metadata(run),
        };
        Ok(serde_json::to_value(output)?)
    }
}
