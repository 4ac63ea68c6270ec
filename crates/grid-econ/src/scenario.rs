//! Local what-if simulator.
//!
//! Applies one perturbation to a project's current figures and recomputes
//! autonomy, bills, savings and ROI. This is an instant approximation of the
//! backend computation, not a replacement for it.

use crate::{EconConfig, EconError};
use grid_core::{validate_metrics, DerivedMetrics};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::debug;

/// A single-variable change fed to [`simulate`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Perturbation {
    /// Scale monthly consumption.
    Consumption { multiplier: f64 },
    /// Add PV surface in m² (negative removes surface).
    Surface { delta_m2: f64 },
    /// Scale battery capacity.
    Battery { multiplier: f64 },
    /// Scale the electricity price.
    Price { multiplier: f64 },
}

impl Perturbation {
    /// The four directives offered on the results screen.
    pub fn presets() -> [(&'static str, Perturbation); 4] {
        [
            ("+20% Consommation", Perturbation::Consumption { multiplier: 1.2 }),
            ("+100 m² PV", Perturbation::Surface { delta_m2: 100.0 }),
            ("×2 Capacité batterie", Perturbation::Battery { multiplier: 2.0 }),
            ("+20% Prix électricité", Perturbation::Price { multiplier: 1.2 }),
        ]
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Perturbation::Consumption { .. } => "consumption",
            Perturbation::Surface { .. } => "surface",
            Perturbation::Battery { .. } => "battery",
            Perturbation::Price { .. } => "price",
        }
    }

    pub fn validate(&self) -> Result<(), EconError> {
        match *self {
            Perturbation::Surface { delta_m2 } => {
                if !delta_m2.is_finite() {
                    return Err(EconError::NonFinite("surface delta"));
                }
            }
            Perturbation::Consumption { multiplier }
            | Perturbation::Battery { multiplier }
            | Perturbation::Price { multiplier } => {
                if !multiplier.is_finite() || multiplier < 0.0 {
                    return Err(EconError::InvalidMultiplier(multiplier));
                }
            }
        }
        Ok(())
    }
}

/// Parses `kind=value`, e.g. `consumption=1.2` or `surface=100`.
impl FromStr for Perturbation {
    type Err = EconError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || EconError::UnknownPerturbation(s.to_string());
        let (kind, value) = s.split_once('=').ok_or_else(unknown)?;
        let value: f64 = value.trim().parse().map_err(|_| unknown())?;
        let p = match kind.trim().to_ascii_lowercase().as_str() {
            "consumption" => Perturbation::Consumption { multiplier: value },
            "surface" => Perturbation::Surface { delta_m2: value },
            "battery" => Perturbation::Battery { multiplier: value },
            "price" => Perturbation::Price { multiplier: value },
            _ => return Err(unknown()),
        };
        p.validate()?;
        Ok(p)
    }
}

/// Figures a scenario is computed from: metrics plus the base quantities
/// the metrics were derived from.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioState {
    pub metrics: DerivedMetrics,
    pub monthly_consumption_kwh: f64,
    /// Price per kWh in DH.
    pub electricity_price: f64,
    pub installation_cost: f64,
}

impl ScenarioState {
    /// State with the configured default consumption and price and no known
    /// installation cost.
    pub fn new(metrics: DerivedMetrics, cfg: &EconConfig) -> Self {
        Self {
            metrics,
            monthly_consumption_kwh: cfg.default_monthly_consumption_kwh,
            electricity_price: cfg.default_electricity_price,
            installation_cost: 0.0,
        }
    }

    pub fn with_consumption(mut self, kwh_per_month: f64) -> Self {
        self.monthly_consumption_kwh = kwh_per_month;
        self
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.electricity_price = price;
        self
    }

    pub fn with_installation_cost(mut self, cost: f64) -> Self {
        self.installation_cost = cost;
        self
    }

    fn check_finite(&self) -> Result<(), EconError> {
        let m = &self.metrics;
        let values = [
            ("autonomy", m.autonomy_pct),
            ("annual savings", m.annual_savings),
            ("roi", m.roi_years),
            ("monthly bill", m.monthly_bill),
            ("annual bill", m.annual_bill),
            ("pv power", m.pv_power_kwc),
            ("pv surface", m.pv_surface_m2),
            ("battery capacity", m.battery_capacity_kwh),
            ("consumption", self.monthly_consumption_kwh),
            ("electricity price", self.electricity_price),
            ("installation cost", self.installation_cost),
        ];
        for (name, v) in values {
            if !v.is_finite() {
                return Err(EconError::NonFinite(name));
            }
        }
        Ok(())
    }

    /// Reject a state the simulator cannot start from: metrics outside
    /// their domain or a negative base quantity.
    fn check(&self) -> Result<(), EconError> {
        self.check_finite()?;
        validate_metrics(&self.metrics)?;
        let bases = [
            ("consumption", self.monthly_consumption_kwh),
            ("electricity price", self.electricity_price),
            ("installation cost", self.installation_cost),
        ];
        for (name, v) in bases {
            if v < 0.0 {
                return Err(EconError::Negative(name));
            }
        }
        Ok(())
    }
}

/// The five metrics compared between current and scenario figures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackedMetric {
    Autonomy,
    AnnualSavings,
    Roi,
    MonthlyBill,
    AnnualBill,
}

impl TrackedMetric {
    pub const ALL: [TrackedMetric; 5] = [
        TrackedMetric::Autonomy,
        TrackedMetric::AnnualSavings,
        TrackedMetric::Roi,
        TrackedMetric::MonthlyBill,
        TrackedMetric::AnnualBill,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            TrackedMetric::Autonomy => "Autonomie énergétique",
            TrackedMetric::AnnualSavings => "Économies annuelles",
            TrackedMetric::Roi => "ROI",
            TrackedMetric::MonthlyBill => "Facture mensuelle",
            TrackedMetric::AnnualBill => "Facture annuelle",
        }
    }

    /// Payback time and bills improve when they go down.
    pub fn lower_is_better(&self) -> bool {
        matches!(
            self,
            TrackedMetric::Roi | TrackedMetric::MonthlyBill | TrackedMetric::AnnualBill
        )
    }

    pub fn value(&self, m: &DerivedMetrics) -> f64 {
        match self {
            TrackedMetric::Autonomy => m.autonomy_pct,
            TrackedMetric::AnnualSavings => m.annual_savings,
            TrackedMetric::Roi => m.roi_years,
            TrackedMetric::MonthlyBill => m.monthly_bill,
            TrackedMetric::AnnualBill => m.annual_bill,
        }
    }

    fn decimals(&self) -> usize {
        match self {
            TrackedMetric::Autonomy | TrackedMetric::Roi => 1,
            _ => 0,
        }
    }

    fn suffix(&self) -> &'static str {
        match self {
            TrackedMetric::Autonomy => "%",
            TrackedMetric::Roi => " ans",
            _ => " DH",
        }
    }

    fn format(&self, v: f64) -> String {
        format!("{:.*}{}", self.decimals(), v, self.suffix())
    }
}

/// Before/after line for one tracked metric.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonRow {
    pub metric: TrackedMetric,
    pub label: String,
    pub current: f64,
    pub scenario: f64,
    /// `scenario - current`.
    pub delta: f64,
    pub current_text: String,
    pub scenario_text: String,
    /// Magnitude of the change, prefixed `+` when favourable and `-` when not.
    pub change_text: String,
    /// Whether the change is favourable to the user.
    pub is_positive: bool,
}

impl ComparisonRow {
    fn build(metric: TrackedMetric, current: &DerivedMetrics, scenario: &DerivedMetrics) -> Self {
        let c = metric.value(current);
        let s = metric.value(scenario);
        let delta = s - c;
        let is_positive = if metric.lower_is_better() {
            delta < 0.0
        } else {
            delta > 0.0
        };
        let sign = if is_positive {
            "+"
        } else if delta != 0.0 {
            "-"
        } else {
            ""
        };
        Self {
            metric,
            label: metric.label().to_string(),
            current: c,
            scenario: s,
            delta,
            current_text: metric.format(c),
            scenario_text: metric.format(s),
            change_text: format!("{sign}{}", metric.format(delta.abs())),
            is_positive,
        }
    }
}

/// Result of a what-if run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioOutcome {
    pub perturbation: Perturbation,
    /// One-line summary of the changed base quantity.
    pub description: String,
    pub current: ScenarioState,
    pub scenario: ScenarioState,
    pub rows: Vec<ComparisonRow>,
}

impl ScenarioOutcome {
    pub fn row(&self, metric: TrackedMetric) -> Option<&ComparisonRow> {
        self.rows.iter().find(|r| r.metric == metric)
    }
}

fn clamp_pct(v: f64) -> f64 {
    v.clamp(0.0, 100.0)
}

/// Recompute a project's figures under one perturbation.
///
/// Only the perturbed base quantity changes; autonomy follows it (inversely
/// for consumption, proportionally for surface, a fixed bonus for battery,
/// unchanged for price), then bills, savings and ROI are derived from the
/// new autonomy, consumption and price. New hardware cost is only added for
/// surface and battery changes.
///
/// ```
/// use grid_core::DerivedMetrics;
/// use grid_econ::{simulate, EconConfig, Perturbation, ScenarioState};
///
/// let cfg = EconConfig::default();
/// let metrics = DerivedMetrics { autonomy_pct: 40.0, ..DerivedMetrics::default() };
/// let cur = ScenarioState::new(metrics, &cfg);
/// let out = simulate(&cur, Perturbation::Consumption { multiplier: 1.2 }, &cfg).unwrap();
/// assert!((out.scenario.monthly_consumption_kwh - 60_000.0).abs() < 1e-6);
/// ```
pub fn simulate(
    current: &ScenarioState,
    perturbation: Perturbation,
    cfg: &EconConfig,
) -> Result<ScenarioOutcome, EconError> {
    perturbation.validate()?;
    current.check()?;

    let cur = current.metrics;
    let mut next = *current;
    let autonomy = cur.autonomy_pct;

    let description = match perturbation {
        Perturbation::Consumption { multiplier } => {
            let old_c = current.monthly_consumption_kwh;
            let new_c = old_c * multiplier;
            next.monthly_consumption_kwh = new_c;
            next.metrics.autonomy_pct = clamp_pct(autonomy * old_c / new_c.max(1.0));
            format!("Consommation: {old_c:.0} → {new_c:.0} kWh/mois")
        }
        Perturbation::Surface { delta_m2 } => {
            let old_s = cur.pv_surface_m2;
            let new_s = (old_s + delta_m2).max(0.0);
            next.metrics.pv_surface_m2 = new_s;
            next.metrics.pv_power_kwc = new_s / cfg.m2_per_kwc;
            if old_s > 0.0 {
                next.metrics.autonomy_pct = clamp_pct(autonomy * new_s / old_s);
            }
            next.installation_cost +=
                (next.metrics.pv_power_kwc - cur.pv_power_kwc) * cfg.cost_per_kwc_dh;
            format!("Surface PV: {old_s:.0} → {new_s:.0} m²")
        }
        Perturbation::Battery { multiplier } => {
            let old_b = cur.battery_capacity_kwh;
            let new_b = old_b * multiplier;
            next.metrics.battery_capacity_kwh = new_b;
            next.metrics.autonomy_pct = clamp_pct(autonomy * cfg.battery_autonomy_bonus);
            next.installation_cost += (new_b - old_b) * cfg.cost_per_battery_kwh_dh;
            format!("Capacité batterie: {old_b:.0} → {new_b:.0} kWh")
        }
        Perturbation::Price { multiplier } => {
            let old_p = current.electricity_price;
            next.electricity_price = old_p * multiplier;
            format!(
                "Prix électricité: {old_p:.2} → {:.2} DH/kWh",
                next.electricity_price
            )
        }
    };

    let share = next.metrics.autonomy_pct / 100.0;
    let grid_consumption = next.monthly_consumption_kwh * (1.0 - share);
    next.metrics.monthly_bill = grid_consumption * next.electricity_price;
    next.metrics.annual_bill = next.metrics.monthly_bill * 12.0;

    let pv_production = next.monthly_consumption_kwh * share;
    next.metrics.annual_savings = pv_production * 12.0 * next.electricity_price;

    // Removing hardware never refunds more than was spent.
    next.installation_cost = next.installation_cost.max(0.0);
    if next.metrics.annual_savings > 0.0 {
        next.metrics.roi_years = next.installation_cost / next.metrics.annual_savings;
    }
    validate_metrics(&next.metrics)?;

    let rows = TrackedMetric::ALL
        .iter()
        .map(|&m| ComparisonRow::build(m, &cur, &next.metrics))
        .collect();

    debug!(kind = perturbation.kind(), %description, "scenario simulated");
    Ok(ScenarioOutcome {
        perturbation,
        description,
        current: *current,
        scenario: next,
        rows,
    })
}
