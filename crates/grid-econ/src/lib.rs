#![deny(warnings)]

//! Economic models for the microgrid wizard.
//!
//! This crate provides validated, I/O-free utilities for:
//! - Zone-based default estimates for budget, surface and population
//! - The recommendation score shown before submission
//! - The local what-if scenario simulator and its comparison rows
//! - Alerts derived from a set of project metrics

pub mod alerts;
pub mod estimate;
pub mod scenario;

pub use alerts::{alerts, Alert};
pub use estimate::{
    co2_reduction_tonnes, estimate_static_defaults, installation_cost_estimate,
    population_band, project_score, zone_multiplier, StaticEstimate,
};
pub use scenario::{
    simulate, ComparisonRow, Perturbation, ScenarioOutcome, ScenarioState, TrackedMetric,
};

use grid_core::ValidationError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced by economic helpers.
#[derive(Debug, Error, PartialEq)]
pub enum EconError {
    /// Multipliers must be finite and non-negative.
    #[error("invalid multiplier: {0}")]
    InvalidMultiplier(f64),
    /// Numeric input was NaN or infinite.
    #[error("non-finite numeric value for {0}")]
    NonFinite(&'static str),
    /// A perturbation directive could not be parsed.
    #[error("unrecognised perturbation: {0}")]
    UnknownPerturbation(String),
    /// Metrics break the derived-metrics rules.
    #[error("invalid metrics: {0}")]
    InvalidMetrics(#[from] ValidationError),
    /// A base quantity of a scenario is negative.
    #[error("{0} must be non-negative")]
    Negative(&'static str),
}

/// Per-zone multipliers applied to the base estimates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneMultipliers {
    pub a: Decimal,
    pub b: Decimal,
    pub c: Decimal,
    pub d: Decimal,
}

impl Default for ZoneMultipliers {
    fn default() -> Self {
        Self {
            a: Decimal::new(12, 1),
            b: Decimal::new(11, 1),
            c: Decimal::ONE,
            d: Decimal::new(9, 1),
        }
    }
}

/// Numeric constants of the estimation and simulation models.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EconConfig {
    /// Budget estimate before zone adjustment, in DH.
    pub base_budget_dh: Decimal,
    /// Surface estimate before zone adjustment, in m².
    pub base_surface_m2: Decimal,
    pub zone_multipliers: ZoneMultipliers,
    /// Lower factor of the population band written in interval mode.
    pub population_band_low: f64,
    /// Upper factor of the population band written in interval mode.
    pub population_band_high: f64,
    /// Panel surface needed per installed kWc.
    pub m2_per_kwc: f64,
    /// Multiplicative autonomy gain credited to added storage.
    pub battery_autonomy_bonus: f64,
    /// Hardware cost per added kWc, in DH.
    pub cost_per_kwc_dh: f64,
    /// Hardware cost per added battery kWh, in DH.
    pub cost_per_battery_kwh_dh: f64,
    /// Monthly consumption assumed when the establishment reports none.
    pub default_monthly_consumption_kwh: f64,
    /// Grid electricity price, in DH/kWh.
    pub default_electricity_price: f64,
    /// Share of the budget counted as installation cost.
    pub installation_cost_share: f64,
    /// Avoided emissions per PV kWh, in kg.
    pub co2_kg_per_kwh: f64,
}

impl Default for EconConfig {
    fn default() -> Self {
        Self {
            base_budget_dh: Decimal::new(2_000_000, 0),
            base_surface_m2: Decimal::new(5_000, 0),
            zone_multipliers: ZoneMultipliers::default(),
            population_band_low: 0.8,
            population_band_high: 1.2,
            m2_per_kwc: 5.0,
            battery_autonomy_bonus: 1.05,
            cost_per_kwc_dh: 8_000.0,
            cost_per_battery_kwh_dh: 4_500.0,
            default_monthly_consumption_kwh: 50_000.0,
            default_electricity_price: 1.2,
            installation_cost_share: 0.8,
            co2_kg_per_kwh: 0.5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_constants() {
        let cfg = EconConfig::default();
        assert_eq!(cfg.base_budget_dh, Decimal::new(2_000_000, 0));
        assert_eq!(cfg.zone_multipliers.a, Decimal::new(12, 1));
        assert_eq!(cfg.m2_per_kwc, 5.0);
        assert_eq!(cfg.cost_per_kwc_dh, 8_000.0);
        assert_eq!(cfg.cost_per_battery_kwh_dh, 4_500.0);
    }
}
