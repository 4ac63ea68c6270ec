#![deny(warnings)]

//! Headless CLI for inspecting saved wizard drafts, zone estimates and
//! what-if scenarios.

use anyhow::{anyhow, bail, Context, Result};
use grid_core::{validate_metrics, DerivedMetrics, ZoneClass};
use grid_econ::{
    alerts, co2_reduction_tonnes, estimate_static_defaults, installation_cost_estimate,
    population_band, simulate, Perturbation, ScenarioOutcome, ScenarioState,
};
use grid_wizard::{slot, CreationPayload, Step, Wizard, WizardConfig};
use persistence::FileMedium;
use serde::Deserialize;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage:
  grid-cli status --draft <file> [--config <yaml>]
  grid-cli estimate --zone <A-D> [--population <n>] [--config <yaml>]
  grid-cli what-if --metrics <yaml> [--preset <name> | --perturb kind=value] [--config <yaml>]";

#[derive(Debug, Default, PartialEq)]
struct Args {
    command: Option<String>,
    config: Option<String>,
    draft: Option<String>,
    zone: Option<String>,
    population: Option<u64>,
    metrics: Option<String>,
    preset: Option<String>,
    perturb: Option<String>,
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Args {
    let mut out = Args::default();
    let mut it = args.into_iter();
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--config" => out.config = it.next(),
            "--draft" => out.draft = it.next(),
            "--zone" => out.zone = it.next(),
            "--population" => out.population = it.next().and_then(|s| s.parse().ok()),
            "--metrics" => out.metrics = it.next(),
            "--preset" => out.preset = it.next(),
            "--perturb" => out.perturb = it.next(),
            other if out.command.is_none() && !other.starts_with("--") => {
                out.command = Some(other.to_string())
            }
            _ => {}
        }
    }
    out
}

/// Metrics file for `what-if`. Base quantities fall back to the configured
/// defaults; installation cost falls back to a share of the budget.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetricsFile {
    metrics: DerivedMetrics,
    #[serde(default)]
    monthly_consumption_kwh: Option<f64>,
    #[serde(default)]
    electricity_price: Option<f64>,
    #[serde(default)]
    installation_cost: Option<f64>,
    #[serde(default)]
    budget: Option<f64>,
}

fn load_config(path: Option<&str>) -> Result<WizardConfig> {
    match path {
        Some(p) => WizardConfig::load(p).with_context(|| format!("loading config {p}")),
        None => Ok(WizardConfig::default()),
    }
}

fn status(args: &Args, cfg: WizardConfig) -> Result<()> {
    let path = args.draft.as_deref().ok_or_else(|| anyhow!("--draft is required"))?;
    let wizard = Wizard::open(FileMedium::open(path), cfg);
    let draft = wizard.draft();
    println!("Draft {path}");
    println!("  resume at step {}: {}", wizard.step().number(), wizard.step().title());
    for step in Step::ALL {
        let mark = if draft.is_complete(step) { "x" } else { " " };
        println!("  [{mark}] {}. {}", step.number(), step.title());
    }
    for key in [
        slot::LOCATION,
        slot::PROJECT_CONSTRAINTS,
        slot::CALCULATION_INPUTS,
        slot::OBJECTIVE,
        slot::SCORE,
    ] {
        match wizard.store().saved_at(key) {
            Some(at) => println!("  {key:<20} saved {at}"),
            None => println!("  {key:<20} -"),
        }
    }
    for issue in wizard.constraint_issues() {
        println!("  ! {issue}");
    }
    if let Some(score) = &draft.score {
        println!("  score {:.0}/100", score.score);
    }
    match CreationPayload::from_draft(draft) {
        Ok(payload) => println!("{}", serde_json::to_string_pretty(&payload)?),
        Err(e) => println!("  not ready to submit: {e}"),
    }
    Ok(())
}

fn estimate(args: &Args, cfg: WizardConfig) -> Result<()> {
    let code = args.zone.as_deref().ok_or_else(|| anyhow!("--zone is required"))?;
    let zone = ZoneClass::parse(code).ok_or_else(|| anyhow!("unknown zone {code:?}"))?;
    let est = estimate_static_defaults(Some(zone), &cfg.econ);
    println!("Zone {zone} ({})", zone.label());
    println!("  budget  {} DH", est.budget_dh);
    println!("  surface {} m²", est.surface_m2);
    if let Some(pop) = args.population {
        let (lo, hi) = population_band(pop, &cfg.econ);
        println!("  population {pop} (interval {lo} - {hi})");
    }
    Ok(())
}

fn pick_perturbations(args: &Args) -> Result<Vec<(String, Perturbation)>> {
    if let Some(directive) = &args.perturb {
        let p: Perturbation = directive.parse()?;
        return Ok(vec![(directive.clone(), p)]);
    }
    let presets = Perturbation::presets();
    match &args.preset {
        None => Ok(presets
            .into_iter()
            .map(|(label, p)| (label.to_string(), p))
            .collect()),
        Some(name) => presets
            .into_iter()
            .find(|(label, p)| p.kind() == name.as_str() || *label == name.as_str())
            .map(|(label, p)| vec![(label.to_string(), p)])
            .ok_or_else(|| anyhow!("unknown preset {name:?}")),
    }
}

fn print_outcome(title: &str, outcome: &ScenarioOutcome) {
    println!("{title}: {}", outcome.description);
    for row in &outcome.rows {
        println!(
            "  {:<28} {:>14} -> {:>14}  {}",
            row.label, row.current_text, row.scenario_text, row.change_text
        );
    }
}

fn what_if(args: &Args, cfg: WizardConfig) -> Result<()> {
    let path = args.metrics.as_deref().ok_or_else(|| anyhow!("--metrics is required"))?;
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
    let file: MetricsFile = serde_yaml::from_str(&text).with_context(|| format!("parsing {path}"))?;
    validate_metrics(&file.metrics)?;

    let econ = &cfg.econ;
    let mut state = ScenarioState::new(file.metrics, econ);
    if let Some(kwh) = file.monthly_consumption_kwh {
        state = state.with_consumption(kwh);
    }
    if let Some(price) = file.electricity_price {
        state = state.with_price(price);
    }
    let cost = file
        .installation_cost
        .or_else(|| file.budget.map(|b| installation_cost_estimate(b, econ)));
    if let Some(cost) = cost {
        state = state.with_installation_cost(cost);
    }

    for alert in alerts(&state.metrics) {
        println!("[{}] {}", alert.title, alert.message);
    }
    let annual_pv_kwh = state.monthly_consumption_kwh * state.metrics.autonomy_pct / 100.0 * 12.0;
    println!(
        "CO2 avoided: {:.1} t/yr",
        co2_reduction_tonnes(annual_pv_kwh, econ)
    );
    let runs = pick_perturbations(args)?;
    if runs.is_empty() {
        bail!("nothing to simulate");
    }
    for (title, p) in runs {
        let outcome = simulate(&state, p, econ)?;
        info!(kind = p.kind(), "scenario simulated");
        print_outcome(&title, &outcome);
    }
    Ok(())
}

fn main() -> Result<()> {
    // Logging setup
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::INFO)
        .init();

    println!(
        "grid-cli {} ({} {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_SHA"),
        env!("BUILD_DATE")
    );

    let args = parse_args(std::env::args().skip(1));
    info!(command = ?args.command, "starting CLI");
    let cfg = load_config(args.config.as_deref())?;

    match args.command.as_deref() {
        Some("status") => status(&args, cfg),
        Some("estimate") => estimate(&args, cfg),
        Some("what-if") => what_if(&args, cfg),
        _ => {
            eprintln!("{USAGE}");
            bail!("missing or unknown command")
        }
    }
}
