//! Five-step project wizard over a persisted draft.
//!
//! Every edit is written to its draft slot immediately, so a reload restores
//! in-progress input. Leaving a step forward requires it to be valid; moving
//! back is always allowed and never discards data.

use crate::collaborators::{
    CollaboratorError, EstablishmentId, EstablishmentService, LocationService,
};
use crate::config::WizardConfig;
use crate::error::{SubmissionError, UpstreamError, WizardError};
use crate::estimation::{apply_static, static_estimate, PopulationEstimator};
use crate::payload::CreationPayload;
use grid_core::{
    validate_coordinates, validate_service_area, Bound, ConstraintsForm, InputMode, Location,
    Priority, QuantityKind, ResolvedConstraints, ValidationError,
};
use grid_econ::{project_score, StaticEstimate};
use persistence::{DraftStore, SessionMedium};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Steps in order. Navigation is linear.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Step {
    Location,
    ProjectConstraints,
    Objective,
    ScoreReview,
    FinalizeAndSubmit,
}

impl Step {
    pub const ALL: [Step; 5] = [
        Step::Location,
        Step::ProjectConstraints,
        Step::Objective,
        Step::ScoreReview,
        Step::FinalizeAndSubmit,
    ];

    /// 1-based position shown to the user.
    pub fn number(&self) -> usize {
        *self as usize + 1
    }

    pub fn next(&self) -> Option<Step> {
        Step::ALL.get(*self as usize + 1).copied()
    }

    pub fn previous(&self) -> Option<Step> {
        (*self as usize).checked_sub(1).map(|i| Step::ALL[i])
    }

    pub fn title(&self) -> &'static str {
        match self {
            Step::Location => "Localisation",
            Step::ProjectConstraints => "Informations du Projet",
            Step::Objective => "Objectif & Priorité",
            Step::ScoreReview => "Recommandation",
            Step::FinalizeAndSubmit => "Décision Finale",
        }
    }
}

/// Draft slot names.
pub mod slot {
    pub const LOCATION: &str = "location";
    pub const PROJECT_CONSTRAINTS: &str = "project-constraints";
    pub const CALCULATION_INPUTS: &str = "calculation-inputs";
    pub const OBJECTIVE: &str = "objective";
    pub const SCORE: &str = "score";
}

const INVALID_INTERVALS: &str = "Veuillez vérifier les intervalles (min < max) et les valeurs.";
const OBJECTIVE_REQUIRED: &str =
    "Veuillez sélectionner le type d'établissement et la priorité.";
const LOCATION_REQUIRED: &str =
    "Localisation non définie. Veuillez sélectionner une localisation à l'étape 1.";

/// Selections of the objective step. The priority is kept as its display label.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectiveSlot {
    #[serde(default)]
    pub establishment_type: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
}

impl ObjectiveSlot {
    pub fn is_complete(&self) -> bool {
        let filled = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        filled(&self.establishment_type) && filled(&self.priority)
    }
}

/// Recommendation computed when the score step is entered.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreSlot {
    pub score: f64,
    pub recommended_type: String,
    pub budget: f64,
    pub solar_surface: f64,
    pub population: u64,
}

/// Typed view of every draft slot.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProjectDraft {
    pub location: Option<Location>,
    pub constraints: ConstraintsForm,
    /// Resolved constraints, written when the constraints step is left.
    pub calculation_inputs: Option<ResolvedConstraints>,
    pub objective: ObjectiveSlot,
    pub score: Option<ScoreSlot>,
}

impl ProjectDraft {
    /// Read every slot; absent or undecodable slots come back empty.
    pub fn load<M: SessionMedium>(store: &DraftStore<M>) -> Self {
        Self {
            location: store.get(slot::LOCATION),
            constraints: store.get(slot::PROJECT_CONSTRAINTS).unwrap_or_default(),
            calculation_inputs: store.get(slot::CALCULATION_INPUTS),
            objective: store.get(slot::OBJECTIVE).unwrap_or_default(),
            score: store.get(slot::SCORE),
        }
    }

    /// Whether `step` holds everything needed to move past it.
    pub fn is_complete(&self, step: Step) -> bool {
        match step {
            Step::Location => self
                .location
                .as_ref()
                .is_some_and(|l| validate_coordinates(l.latitude, l.longitude).is_ok()),
            Step::ProjectConstraints => self.calculation_inputs.is_some(),
            Step::Objective => self.objective.is_complete(),
            Step::ScoreReview => self.score.is_some(),
            Step::FinalizeAndSubmit => false,
        }
    }

    /// First step that cannot be skipped over yet.
    pub fn first_incomplete(&self) -> Step {
        Step::ALL
            .into_iter()
            .find(|s| !self.is_complete(*s))
            .unwrap_or(Step::FinalizeAndSubmit)
    }
}

/// Submission progress of the terminal step.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum SubmissionState {
    #[default]
    Idle,
    InFlight,
    Failed(SubmissionError),
    Completed(EstablishmentId),
}

/// The wizard state machine bound to a draft store.
pub struct Wizard<M: SessionMedium> {
    store: DraftStore<M>,
    config: WizardConfig,
    draft: ProjectDraft,
    step: Step,
    population: PopulationEstimator,
    submission: SubmissionState,
}

impl<M: SessionMedium> Wizard<M> {
    /// Open over `medium`, restoring any saved draft and resuming at the
    /// first step that is not complete yet.
    pub fn open(medium: M, config: WizardConfig) -> Self {
        let store = DraftStore::with_prefix(medium, config.draft_prefix.clone());
        let draft = ProjectDraft::load(&store);
        let step = draft.first_incomplete();
        info!(?step, slots = store.keys().len(), "wizard opened");
        Self {
            store,
            config,
            draft,
            step,
            population: PopulationEstimator::new(),
            submission: SubmissionState::Idle,
        }
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn draft(&self) -> &ProjectDraft {
        &self.draft
    }

    pub fn config(&self) -> &WizardConfig {
        &self.config
    }

    pub fn store(&self) -> &DraftStore<M> {
        &self.store
    }

    pub fn submission(&self) -> &SubmissionState {
        &self.submission
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.submission, SubmissionState::Completed(_))
    }

    pub fn into_medium(self) -> M {
        self.store.into_inner()
    }

    fn persist<T: Serialize>(&mut self, key: &str, value: &T) {
        if let Err(e) = self.store.set(key, value) {
            warn!(key, error = %e, "draft slot not saved");
        }
    }

    fn drop_slot(&mut self, key: &str) {
        if let Err(e) = self.store.clear(key) {
            warn!(key, error = %e, "draft slot not cleared");
        }
    }

    fn ensure_open(&self) -> Result<(), WizardError> {
        if self.is_completed() {
            return Err(WizardError::Completed);
        }
        Ok(())
    }

    /// Check that every step before `target` is complete.
    pub fn can_enter(&self, target: Step) -> Result<(), WizardError> {
        match Step::ALL
            .into_iter()
            .take_while(|s| *s < target)
            .find(|s| !self.draft.is_complete(*s))
        {
            Some(missing) => Err(WizardError::PreconditionFailed { target, missing }),
            None => Ok(()),
        }
    }

    fn enter(&mut self, target: Step) {
        if target == Step::ScoreReview {
            self.compute_score();
        }
        debug!(from = ?self.step, to = ?target, "step changed");
        self.step = target;
    }

    /// Validate the current step, commit its derived slot and move forward.
    /// On failure the wizard stays put and all entered values are kept.
    pub fn advance(&mut self) -> Result<Step, WizardError> {
        self.ensure_open()?;
        let current = self.step;
        let Some(next) = current.next() else {
            return Err(WizardError::WrongStep {
                expected: Step::ScoreReview,
                actual: current,
            });
        };
        if let Err(e) = self.commit(current) {
            warn!(step = ?current, error = %e, "step blocked");
            return Err(e);
        }
        self.can_enter(next)?;
        self.enter(next);
        info!(step = ?next, "advanced");
        Ok(next)
    }

    fn commit(&mut self, step: Step) -> Result<(), WizardError> {
        match step {
            Step::Location => {
                let loc = self
                    .draft
                    .location
                    .as_ref()
                    .ok_or_else(|| WizardError::incomplete(step, LOCATION_REQUIRED))?;
                validate_coordinates(loc.latitude, loc.longitude)?;
                Ok(())
            }
            Step::ProjectConstraints => {
                let resolved = self
                    .draft
                    .constraints
                    .resolve_all()
                    .map_err(|e| WizardError::incomplete(step, constraint_message(&e)))?;
                self.draft.calculation_inputs = Some(resolved);
                self.persist(slot::CALCULATION_INPUTS, &resolved);
                Ok(())
            }
            Step::Objective => {
                if self.draft.objective.is_complete() {
                    Ok(())
                } else {
                    Err(WizardError::incomplete(step, OBJECTIVE_REQUIRED))
                }
            }
            Step::ScoreReview => {
                if self.draft.score.is_none() {
                    self.compute_score();
                }
                Ok(())
            }
            Step::FinalizeAndSubmit => Ok(()),
        }
    }

    /// Move one step back. Has no effect on the first step.
    pub fn back(&mut self) -> Step {
        if let Some(prev) = self.step.previous() {
            if !self.is_completed() {
                self.enter(prev);
            }
        }
        self.step
    }

    /// Jump to `target`. Earlier steps are always reachable; later ones
    /// require their predecessors to be complete.
    pub fn go_to(&mut self, target: Step) -> Result<Step, WizardError> {
        self.ensure_open()?;
        if target > self.step {
            self.can_enter(target)?;
        }
        self.enter(target);
        Ok(target)
    }

    /// Accept a device position fix. Fixes outside the service area are
    /// rejected and the current location is kept.
    pub fn apply_gps_fix(&mut self, lat: f64, lng: f64) -> Result<(), WizardError> {
        validate_coordinates(lat, lng)?;
        if let Err(e) = validate_service_area(lat, lng) {
            warn!(lat, lng, "position fix outside service area");
            return Err(e.into());
        }
        self.set_location(lat, lng)
    }

    /// Set the site from a map pick. The zone is resolved separately.
    pub fn set_location(&mut self, lat: f64, lng: f64) -> Result<(), WizardError> {
        self.ensure_open()?;
        validate_coordinates(lat, lng)?;
        let loc = Location::new(lat, lng);
        self.persist(slot::LOCATION, &loc);
        self.draft.location = Some(loc);
        Ok(())
    }

    /// Ask the location service for the zone of the current site. A failed
    /// lookup degrades to an unknown zone; the location itself stays valid.
    pub async fn resolve_zone<S>(&mut self, service: &S) -> Result<(), WizardError>
    where
        S: LocationService + ?Sized,
    {
        let (lat, lng) = match &self.draft.location {
            Some(l) => (l.latitude, l.longitude),
            None => return Err(WizardError::NoLocation),
        };
        let info = match service.resolve_zone(lat, lng).await {
            Ok(info) => info,
            Err(e) => {
                warn!(error = %e, "zone lookup failed, continuing without zone");
                Default::default()
            }
        };
        // The site may have moved while the lookup was pending.
        let Some(loc) = self.draft.location.as_mut() else {
            return Ok(());
        };
        if loc.latitude != lat || loc.longitude != lng {
            debug!("discarding zone for a superseded position");
            return Ok(());
        }
        loc.irradiation_class = info.irradiation_class;
        loc.nearest_city = info.nearest_city;
        let loc = loc.clone();
        self.persist(slot::LOCATION, &loc);
        Ok(())
    }

    fn constraints_changed(&mut self) {
        let form = self.draft.constraints.clone();
        self.persist(slot::PROJECT_CONSTRAINTS, &form);
        if self.draft.calculation_inputs.take().is_some() {
            self.drop_slot(slot::CALCULATION_INPUTS);
        }
        self.refresh_score();
    }

    pub fn set_mode(&mut self, kind: QuantityKind, mode: InputMode) -> Result<(), WizardError> {
        self.ensure_open()?;
        if self.draft.constraints.set_mode(kind, mode) {
            self.constraints_changed();
        }
        Ok(())
    }

    pub fn set_exact(&mut self, kind: QuantityKind, value: Option<f64>) -> Result<(), WizardError> {
        self.ensure_open()?;
        self.draft.constraints.set_exact(kind, value);
        self.constraints_changed();
        Ok(())
    }

    pub fn set_bound(
        &mut self,
        kind: QuantityKind,
        bound: Bound,
        value: Option<f64>,
    ) -> Result<(), WizardError> {
        self.ensure_open()?;
        self.draft.constraints.set_bound(kind, bound, value);
        self.constraints_changed();
        Ok(())
    }

    /// Field-level problems of the constraints form, for display.
    pub fn constraint_issues(&self) -> Vec<ValidationError> {
        self.draft.constraints.issues()
    }

    /// Budget and surface defaults for the current zone.
    pub fn static_estimate(&self) -> StaticEstimate {
        static_estimate(self.draft.location.as_ref(), &self.config.econ)
    }

    /// Copy the static estimate into the exact value of `kind`.
    pub fn use_static_estimate(&mut self, kind: QuantityKind) -> Result<bool, WizardError> {
        self.ensure_open()?;
        let est = self.static_estimate();
        let written = apply_static(&mut self.draft.constraints, kind, &est);
        if written {
            self.constraints_changed();
        }
        Ok(written)
    }

    pub fn population_estimate(&self) -> Option<u64> {
        self.population.latest()
    }

    pub fn is_estimating(&self) -> bool {
        self.population.is_in_flight()
    }

    /// Fetch a population estimate. Only updates the estimate; the form is
    /// untouched. Failures are logged and yield `None`.
    pub async fn fetch_population_estimate<S>(
        &mut self,
        service: &S,
    ) -> Result<Option<u64>, WizardError>
    where
        S: LocationService + ?Sized,
    {
        let req = self.population.begin(self.draft.location.as_ref())?;
        let pending = self.population.pending();
        let result: Result<u64, CollaboratorError> =
            service.estimate_population(req.latitude, req.longitude).await;
        pending.settle();
        Ok(self.population.finish(result))
    }

    /// Fill an empty exact-mode population field with the first estimate.
    pub fn apply_estimate_if_empty(&mut self) -> bool {
        if self.is_completed() {
            return false;
        }
        let written = self.population.apply_if_empty(&mut self.draft.constraints);
        if written {
            info!("population prefilled from estimate");
            self.constraints_changed();
        }
        written
    }

    /// Fetch an estimate, then offer it to an empty population field.
    pub async fn prefill_population<S>(&mut self, service: &S) -> Result<bool, WizardError>
    where
        S: LocationService + ?Sized,
    {
        self.fetch_population_estimate(service).await?;
        Ok(self.apply_estimate_if_empty())
    }

    /// Explicit "use estimate": overwrite the population field with the
    /// latest estimate, fetching one first if none is known yet.
    pub async fn use_population_estimate<S>(&mut self, service: &S) -> Result<bool, WizardError>
    where
        S: LocationService + ?Sized,
    {
        self.ensure_open()?;
        if self.population.latest().is_none() {
            self.fetch_population_estimate(service).await?;
        }
        let written = self
            .population
            .overwrite(&mut self.draft.constraints, &self.config.econ);
        if written {
            self.constraints_changed();
        }
        Ok(written)
    }

    pub fn set_establishment_type(&mut self, value: Option<String>) -> Result<(), WizardError> {
        self.ensure_open()?;
        self.draft.objective.establishment_type = value;
        let obj = self.draft.objective.clone();
        self.persist(slot::OBJECTIVE, &obj);
        self.refresh_score();
        Ok(())
    }

    pub fn select_priority(&mut self, priority: Priority) -> Result<(), WizardError> {
        self.set_priority_label(Some(priority.label().to_string()))
    }

    /// Free-text priority; mapped to an objective code at submission.
    pub fn set_priority_label(&mut self, label: Option<String>) -> Result<(), WizardError> {
        self.ensure_open()?;
        self.draft.objective.priority = label;
        let obj = self.draft.objective.clone();
        self.persist(slot::OBJECTIVE, &obj);
        Ok(())
    }

    /// Keep a saved score in step with its inputs after an edit.
    fn refresh_score(&mut self) {
        if self.draft.score.is_some() {
            self.compute_score();
        }
    }

    /// Without calculation inputs there is no score; a stale one is dropped.
    fn compute_score(&mut self) {
        let Some(inputs) = self.draft.calculation_inputs else {
            if self.draft.score.take().is_some() {
                self.drop_slot(slot::SCORE);
            }
            return;
        };
        let score = ScoreSlot {
            score: project_score(&inputs),
            recommended_type: self
                .draft
                .objective
                .establishment_type
                .clone()
                .unwrap_or_default(),
            budget: inputs.budget,
            solar_surface: inputs.solar_surface,
            population: inputs.population,
        };
        debug!(score = score.score, "score computed");
        self.persist(slot::SCORE, &score);
        self.draft.score = Some(score);
    }

    /// Payload for the current draft.
    pub fn creation_payload(&self) -> Result<CreationPayload, WizardError> {
        CreationPayload::from_draft(&self.draft)
    }

    /// Start a submission. Only one may be in flight.
    pub fn begin_submission(&mut self) -> Result<CreationPayload, WizardError> {
        self.ensure_open()?;
        if self.step != Step::FinalizeAndSubmit {
            return Err(WizardError::WrongStep {
                expected: Step::FinalizeAndSubmit,
                actual: self.step,
            });
        }
        if self.submission == SubmissionState::InFlight {
            return Err(WizardError::SubmissionInFlight);
        }
        let payload = self.creation_payload()?;
        self.submission = SubmissionState::InFlight;
        info!(name = %payload.name, "submitting establishment");
        Ok(payload)
    }

    /// Record the outcome of the submission. Success clears the whole draft;
    /// failure keeps it so the user can retry.
    pub fn finish_submission(
        &mut self,
        result: Result<EstablishmentId, UpstreamError>,
    ) -> Result<EstablishmentId, SubmissionError> {
        match result {
            Ok(id) => {
                if let Err(e) = self.store.clear_all() {
                    warn!(error = %e, "draft not cleared after submission");
                }
                self.draft = ProjectDraft::default();
                self.population = PopulationEstimator::new();
                self.submission = SubmissionState::Completed(id);
                info!(%id, "establishment created");
                Ok(id)
            }
            Err(upstream) => {
                let err = SubmissionError::from(upstream);
                warn!(error = %err, "submission failed, draft kept");
                self.submission = SubmissionState::Failed(err.clone());
                Err(err)
            }
        }
    }

    pub async fn submit<S>(&mut self, service: &S) -> Result<EstablishmentId, WizardError>
    where
        S: EstablishmentService + ?Sized,
    {
        let payload = self.begin_submission()?;
        let pending = PendingSubmission(Some(&mut self.submission));
        let result = service.create_establishment(&payload).await;
        pending.settle();
        Ok(self.finish_submission(result)?)
    }

    /// Abandon the wizard: wipe every draft slot and start over.
    pub fn reset(&mut self) {
        if let Err(e) = self.store.clear_all() {
            warn!(error = %e, "draft not cleared on reset");
        }
        self.draft = ProjectDraft::default();
        self.population = PopulationEstimator::new();
        self.submission = SubmissionState::Idle;
        self.step = Step::Location;
        info!("wizard reset");
    }
}

/// Returns an in-flight submission to idle if the awaiting future is
/// dropped before a response arrives.
struct PendingSubmission<'a>(Option<&'a mut SubmissionState>);

impl PendingSubmission<'_> {
    fn settle(mut self) {
        self.0 = None;
    }
}

impl Drop for PendingSubmission<'_> {
    fn drop(&mut self) {
        if let Some(state) = self.0.take() {
            if *state == SubmissionState::InFlight {
                *state = SubmissionState::Idle;
                warn!("submission abandoned before a response");
            }
        }
    }
}

fn constraint_message(e: &ValidationError) -> String {
    match e {
        ValidationError::InvertedInterval { .. } => INVALID_INTERVALS.to_string(),
        other => format!("{INVALID_INTERVALS} ({other})"),
    }
}
