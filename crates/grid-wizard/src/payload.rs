//! The establishment-creation request assembled from a finished draft.

use crate::error::WizardError;
use crate::wizard::{ObjectiveSlot, ProjectDraft};
use grid_core::{ObjectiveCode, ValidationError, ZoneClass};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

const MISSING_LOCATION: &str =
    "Données de localisation manquantes. Veuillez recommencer depuis l'étape 1.";
const MISSING_PROJECT: &str = "Données du projet manquantes. Veuillez recommencer depuis l'étape 2.";
const MISSING_OBJECTIVE: &str =
    "Données d'objectif manquantes. Veuillez recommencer depuis l'étape 3.";
const MISSING_TYPE: &str = "Type d'établissement non sélectionné. Veuillez compléter l'étape 3.";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreationPayload {
    pub name: String,
    #[serde(rename = "type")]
    pub establishment_type: String,
    pub number_of_beds: u32,
    pub latitude: f64,
    pub longitude: f64,
    pub irradiation_class: Option<ZoneClass>,
    pub project_budget_dh: Decimal,
    pub total_available_surface_m2: Decimal,
    pub installable_surface_m2: Decimal,
    pub population_served: u64,
    pub project_priority: ObjectiveCode,
}

/// Bed count derived from the population served; at least one.
pub fn number_of_beds(population: u64) -> u32 {
    let beds = (population as f64 / 100.0).round();
    (beds as u32).max(1)
}

fn money(value: f64, field: &'static str) -> Result<Decimal, ValidationError> {
    Decimal::from_f64(value)
        .map(|d| d.round_dp(2))
        .ok_or(ValidationError::NonFinite { field })
}

impl CreationPayload {
    /// Build the request from the persisted slots. Each missing slot yields
    /// the message telling the user which step to go back to.
    pub fn from_draft(draft: &ProjectDraft) -> Result<Self, WizardError> {
        use crate::Step;

        let location = draft
            .location
            .as_ref()
            .ok_or_else(|| WizardError::incomplete(Step::Location, MISSING_LOCATION))?;
        let inputs = draft
            .calculation_inputs
            .as_ref()
            .ok_or_else(|| WizardError::incomplete(Step::ProjectConstraints, MISSING_PROJECT))?;
        let ObjectiveSlot {
            establishment_type,
            priority,
        } = &draft.objective;
        if establishment_type.is_none() && priority.is_none() {
            return Err(WizardError::incomplete(Step::Objective, MISSING_OBJECTIVE));
        }
        let establishment_type = establishment_type
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| WizardError::incomplete(Step::Objective, MISSING_TYPE))?;
        let priority = priority.as_deref().unwrap_or_default();

        Ok(Self {
            name: establishment_type.to_string(),
            establishment_type: establishment_type.to_string(),
            number_of_beds: number_of_beds(inputs.population),
            latitude: location.latitude,
            longitude: location.longitude,
            irradiation_class: location.irradiation_class,
            project_budget_dh: money(inputs.budget, "budget")?,
            total_available_surface_m2: money(inputs.total_surface, "totalSurface")?,
            installable_surface_m2: money(inputs.solar_surface, "solarSurface")?,
            population_served: inputs.population,
            project_priority: ObjectiveCode::from_priority_label(priority),
        })
    }
}
