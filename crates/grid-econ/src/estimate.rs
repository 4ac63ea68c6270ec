//! Default estimates and scoring derived from location and project figures.

use crate::EconConfig;
use grid_core::{ResolvedConstraints, ZoneClass};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Suggested budget and surface for a site.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticEstimate {
    /// Budget in whole DH.
    pub budget_dh: Decimal,
    /// Total surface in whole m².
    pub surface_m2: Decimal,
}

/// Multiplier for an irradiation class. An unknown zone counts as neutral (1.0).
pub fn zone_multiplier(zone: Option<ZoneClass>, cfg: &EconConfig) -> Decimal {
    let m = &cfg.zone_multipliers;
    match zone {
        Some(ZoneClass::A) => m.a,
        Some(ZoneClass::B) => m.b,
        Some(ZoneClass::C) => m.c,
        Some(ZoneClass::D) => m.d,
        None => Decimal::ONE,
    }
}

/// Base budget and surface scaled by the zone multiplier, rounded to units.
///
/// ```
/// use grid_core::ZoneClass;
/// use grid_econ::{estimate_static_defaults, EconConfig};
/// use rust_decimal::Decimal;
///
/// let e = estimate_static_defaults(Some(ZoneClass::A), &EconConfig::default());
/// assert_eq!(e.budget_dh, Decimal::new(2_400_000, 0));
/// ```
pub fn estimate_static_defaults(zone: Option<ZoneClass>, cfg: &EconConfig) -> StaticEstimate {
    let mult = zone_multiplier(zone, cfg);
    StaticEstimate {
        budget_dh: (cfg.base_budget_dh * mult).round_dp(0),
        surface_m2: (cfg.base_surface_m2 * mult).round_dp(0),
    }
}

/// Interval written when a population estimate is applied in interval mode.
pub fn population_band(estimate: u64, cfg: &EconConfig) -> (u64, u64) {
    let e = estimate as f64;
    let lo = (e * cfg.population_band_low).round();
    let hi = (e * cfg.population_band_high).round();
    (lo.max(0.0) as u64, hi.max(0.0) as u64)
}

/// Recommendation score in [0, 100] from the resolved solar surface and budget.
pub fn project_score(resolved: &ResolvedConstraints) -> f64 {
    let mut s = 70.0;
    if resolved.solar_surface > 3_000.0 {
        s += 10.0;
    } else if resolved.solar_surface > 1_500.0 {
        s += 5.0;
    }
    if resolved.budget > 3_000_000.0 {
        s += 10.0;
    } else if resolved.budget > 1_500_000.0 {
        s += 5.0;
    }
    f64::clamp(s, 0.0, 100.0)
}

/// Installation cost assumed before the backend prices the project.
pub fn installation_cost_estimate(budget_dh: f64, cfg: &EconConfig) -> f64 {
    (budget_dh * cfg.installation_cost_share).max(0.0)
}

/// Avoided CO₂ in tonnes per year for an annual PV production in kWh.
pub fn co2_reduction_tonnes(annual_pv_kwh: f64, cfg: &EconConfig) -> f64 {
    (annual_pv_kwh * cfg.co2_kg_per_kwh / 1000.0).max(0.0)
}
