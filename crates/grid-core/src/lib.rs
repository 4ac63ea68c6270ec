#![deny(warnings)]

//! Core domain models and invariants for the microgrid project wizard.
//!
//! This crate defines the serializable types shared by the estimation,
//! scenario and wizard crates, with validation helpers that enforce the
//! per-field input rules without any view or storage concern.

pub mod quantity;

pub use quantity::{
    Bound, ConstraintsForm, FieldSlot, InputMode, Quantity, QuantityInput, QuantityKind,
    ResolvedConstraints,
};

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Solar irradiation class of a site, from the sunniest (A) to the least sunny (D).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ZoneClass {
    /// Sahara, very high irradiation.
    A,
    /// Centre, high irradiation.
    B,
    /// Coasts, medium irradiation.
    C,
    /// Rif, low irradiation.
    D,
}

impl ZoneClass {
    pub const ALL: [ZoneClass; 4] = [ZoneClass::A, ZoneClass::B, ZoneClass::C, ZoneClass::D];

    /// Parse a single-letter class code. Unknown codes yield `None`.
    pub fn parse(code: &str) -> Option<Self> {
        match code.trim() {
            "A" | "a" => Some(ZoneClass::A),
            "B" | "b" => Some(ZoneClass::B),
            "C" | "c" => Some(ZoneClass::C),
            "D" | "d" => Some(ZoneClass::D),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ZoneClass::A => "A",
            ZoneClass::B => "B",
            ZoneClass::C => "C",
            ZoneClass::D => "D",
        }
    }

    /// Human-readable zone description shown next to the location.
    pub fn label(&self) -> &'static str {
        match self {
            ZoneClass::A => "Zone A - Sahara (Très élevée)",
            ZoneClass::B => "Zone B - Centre (Élevée)",
            ZoneClass::C => "Zone C - Côtes (Moyenne)",
            ZoneClass::D => "Zone D - Rif (Faible)",
        }
    }
}

impl fmt::Display for ZoneClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Latitude band accepted for device-derived positions.
pub const SERVICE_AREA_LATITUDE: (f64, f64) = (20.0, 36.0);
/// Longitude band accepted for device-derived positions.
pub const SERVICE_AREA_LONGITUDE: (f64, f64) = (-17.0, -1.0);

/// Site position with its resolved irradiation context.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
    /// Irradiation class, `None` when zone resolution failed or is pending.
    #[serde(default)]
    pub irradiation_class: Option<ZoneClass>,
    /// Nearest known city, when the location service reports one.
    #[serde(default)]
    pub nearest_city: Option<String>,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            irradiation_class: None,
            nearest_city: None,
        }
    }

    pub fn is_within_service_area(&self) -> bool {
        within_service_area(self.latitude, self.longitude)
    }
}

fn within_service_area(lat: f64, lng: f64) -> bool {
    (SERVICE_AREA_LATITUDE.0..=SERVICE_AREA_LATITUDE.1).contains(&lat)
        && (SERVICE_AREA_LONGITUDE.0..=SERVICE_AREA_LONGITUDE.1).contains(&lng)
}

/// Project priority offered to the user on the objective step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];

    /// Display label persisted in the objective slot.
    pub fn label(&self) -> &'static str {
        match self {
            Priority::High => "Haute - Production maximale d'énergie",
            Priority::Medium => "Moyenne - Équilibre coût/efficacité",
            Priority::Low => "Basse - Coût minimal",
        }
    }

    pub fn objective(&self) -> ObjectiveCode {
        match self {
            Priority::High => ObjectiveCode::MaximizeAutonomy,
            Priority::Medium => ObjectiveCode::OptimizeRoi,
            Priority::Low => ObjectiveCode::MinimizeCost,
        }
    }
}

/// Canonical optimisation objective understood by the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObjectiveCode {
    MaximizeAutonomy,
    OptimizeRoi,
    MinimizeCost,
}

impl ObjectiveCode {
    /// Map a free-text priority label to an objective by substring match.
    ///
    /// Labels are checked in order high, medium, low; anything unmatched
    /// (including an empty label) falls back to [`ObjectiveCode::OptimizeRoi`].
    pub fn from_priority_label(label: &str) -> Self {
        if label.contains("Haute") || label.contains("maximale") {
            ObjectiveCode::MaximizeAutonomy
        } else if label.contains("Moyenne") || label.contains("Équilibre") {
            ObjectiveCode::OptimizeRoi
        } else if label.contains("Basse") || label.contains("minimal") {
            ObjectiveCode::MinimizeCost
        } else {
            ObjectiveCode::OptimizeRoi
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectiveCode::MaximizeAutonomy => "MAXIMIZE_AUTONOMY",
            ObjectiveCode::OptimizeRoi => "OPTIMIZE_ROI",
            ObjectiveCode::MinimizeCost => "MINIMIZE_COST",
        }
    }
}

/// Computed project outputs, from the backend or from local simulation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedMetrics {
    /// Share of consumption covered by PV and storage, in [0, 100].
    pub autonomy_pct: f64,
    /// Annual savings in DH.
    pub annual_savings: f64,
    /// Payback time in years.
    pub roi_years: f64,
    /// Remaining grid bill per month in DH.
    pub monthly_bill: f64,
    /// Remaining grid bill per year in DH.
    pub annual_bill: f64,
    /// Installed PV power in kWc.
    pub pv_power_kwc: f64,
    /// PV panel surface in m².
    pub pv_surface_m2: f64,
    /// Battery capacity in kWh.
    pub battery_capacity_kwh: f64,
}

impl DerivedMetrics {
    /// Clamp autonomy into [0, 100] and floor every other figure at zero.
    ///
    /// Non-finite values are replaced by zero.
    pub fn normalized(self) -> Self {
        let floor = |v: f64| if v.is_finite() { v.max(0.0) } else { 0.0 };
        Self {
            autonomy_pct: floor(self.autonomy_pct).min(100.0),
            annual_savings: floor(self.annual_savings),
            roi_years: floor(self.roi_years),
            monthly_bill: floor(self.monthly_bill),
            annual_bill: floor(self.annual_bill),
            pv_power_kwc: floor(self.pv_power_kwc),
            pv_surface_m2: floor(self.pv_surface_m2),
            battery_capacity_kwh: floor(self.battery_capacity_kwh),
        }
    }
}

/// Validation errors for wizard inputs and derived figures.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// A required value has not been entered.
    #[error("{field} is required")]
    Missing { field: &'static str },
    /// Value is NaN or infinite.
    #[error("{field} must be a finite number")]
    NonFinite { field: &'static str },
    /// Value is below the domain minimum of its field.
    #[error("{field} must be >= {min} (got {value})")]
    BelowMinimum {
        field: &'static str,
        min: f64,
        value: f64,
    },
    /// Interval bounds do not satisfy `min < max`.
    #[error("{field}: interval minimum must be lower than maximum")]
    InvertedInterval { field: &'static str },
    /// Coordinates are not valid degrees.
    #[error("coordinates out of range: ({lat}, {lng})")]
    CoordinatesOutOfRange { lat: f64, lng: f64 },
    /// Device position is outside the supported territory.
    #[error("position ({lat}, {lng}) is outside the service area")]
    OutsideServiceArea { lat: f64, lng: f64 },
    /// Autonomy must lie within [0, 100].
    #[error("autonomy {0} is outside [0, 100]")]
    AutonomyOutOfRange(f64),
    /// Derived figures must be non-negative.
    #[error("{0} must be non-negative")]
    NegativeMetric(&'static str),
}

/// Validate coordinates as plain geographic degrees.
pub fn validate_coordinates(lat: f64, lng: f64) -> Result<(), ValidationError> {
    if !(lat.is_finite() && lng.is_finite()) {
        return Err(ValidationError::CoordinatesOutOfRange { lat, lng });
    }
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        return Err(ValidationError::CoordinatesOutOfRange { lat, lng });
    }
    Ok(())
}

/// Validate a device-derived position: well-formed and inside the service area.
pub fn validate_service_area(lat: f64, lng: f64) -> Result<(), ValidationError> {
    validate_coordinates(lat, lng)?;
    if !within_service_area(lat, lng) {
        return Err(ValidationError::OutsideServiceArea { lat, lng });
    }
    Ok(())
}

/// Validate derived metrics: finite, non-negative, autonomy in [0, 100].
pub fn validate_metrics(m: &DerivedMetrics) -> Result<(), ValidationError> {
    if !(0.0..=100.0).contains(&m.autonomy_pct) {
        return Err(ValidationError::AutonomyOutOfRange(m.autonomy_pct));
    }
    let figures = [
        ("annualSavings", m.annual_savings),
        ("roi", m.roi_years),
        ("monthlyBill", m.monthly_bill),
        ("annualBill", m.annual_bill),
        ("pvPower", m.pv_power_kwc),
        ("pvSurface", m.pv_surface_m2),
        ("batteryCapacity", m.battery_capacity_kwh),
    ];
    for (name, v) in figures {
        if !v.is_finite() {
            return Err(ValidationError::NonFinite { field: name });
        }
        if v < 0.0 {
            return Err(ValidationError::NegativeMetric(name));
        }
    }
    Ok(())
}
