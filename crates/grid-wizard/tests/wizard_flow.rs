use async_trait::async_trait;
use grid_core::{Bound, InputMode, ObjectiveCode, Priority, QuantityKind, ZoneClass};
use grid_wizard::{
    slot, CollaboratorError, CreationPayload, EstablishmentId, EstablishmentService,
    LocationService, Step, SubmissionError, SubmissionState, UpstreamError, Wizard, WizardConfig,
    WizardError, ZoneInfo,
};
use persistence::{MemoryMedium, SessionMedium};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

struct FakeLocation {
    zone: Option<ZoneClass>,
    population: Result<u64, CollaboratorError>,
    population_calls: AtomicUsize,
}

impl FakeLocation {
    fn zone(zone: ZoneClass, population: u64) -> Self {
        Self {
            zone: Some(zone),
            population: Ok(population),
            population_calls: AtomicUsize::new(0),
        }
    }

    fn down() -> Self {
        Self {
            zone: None,
            population: Err(CollaboratorError::Unavailable("503".into())),
            population_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl LocationService for FakeLocation {
    async fn resolve_zone(&self, _lat: f64, _lng: f64) -> Result<ZoneInfo, CollaboratorError> {
        match self.zone {
            Some(z) => Ok(ZoneInfo {
                irradiation_class: Some(z),
                nearest_city: Some("Marrakech".into()),
            }),
            None => Err(CollaboratorError::Unavailable("503".into())),
        }
    }

    async fn estimate_population(&self, _lat: f64, _lng: f64) -> Result<u64, CollaboratorError> {
        self.population_calls.fetch_add(1, Ordering::SeqCst);
        self.population.clone()
    }
}

/// Replays scripted outcomes and records every payload it receives.
struct FakeBackend {
    outcomes: Mutex<Vec<Result<EstablishmentId, UpstreamError>>>,
    received: Mutex<Vec<CreationPayload>>,
}

impl FakeBackend {
    fn scripted(mut outcomes: Vec<Result<EstablishmentId, UpstreamError>>) -> Self {
        outcomes.reverse();
        Self {
            outcomes: Mutex::new(outcomes),
            received: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl EstablishmentService for FakeBackend {
    async fn create_establishment(
        &self,
        payload: &CreationPayload,
    ) -> Result<EstablishmentId, UpstreamError> {
        self.received.lock().unwrap().push(payload.clone());
        self.outcomes
            .lock()
            .unwrap()
            .pop()
            .unwrap_or(Err(UpstreamError::unreachable()))
    }
}

/// Collaborator that never answers.
struct Stalled;

#[async_trait]
impl LocationService for Stalled {
    async fn resolve_zone(&self, _lat: f64, _lng: f64) -> Result<ZoneInfo, CollaboratorError> {
        std::future::pending().await
    }

    async fn estimate_population(&self, _lat: f64, _lng: f64) -> Result<u64, CollaboratorError> {
        std::future::pending().await
    }
}

#[async_trait]
impl EstablishmentService for Stalled {
    async fn create_establishment(
        &self,
        _payload: &CreationPayload,
    ) -> Result<EstablishmentId, UpstreamError> {
        std::future::pending().await
    }
}

fn session_with_foreign_key() -> MemoryMedium {
    let mut m = MemoryMedium::new();
    m.set_item("auth_token", "abc".into()).unwrap();
    m
}

async fn walk_to_submission(w: &mut Wizard<MemoryMedium>, loc: &FakeLocation) {
    w.set_location(31.63, -8.0).unwrap();
    w.resolve_zone(loc).await.unwrap();
    w.advance().unwrap();

    assert!(w.prefill_population(loc).await.unwrap());
    w.use_static_estimate(QuantityKind::Budget).unwrap();
    w.use_static_estimate(QuantityKind::TotalSurface).unwrap();
    w.set_mode(QuantityKind::SolarSurface, InputMode::Interval).unwrap();
    w.set_bound(QuantityKind::SolarSurface, Bound::Min, Some(1_000.0)).unwrap();
    w.set_bound(QuantityKind::SolarSurface, Bound::Max, Some(3_000.0)).unwrap();
    w.advance().unwrap();

    w.set_establishment_type(Some("Hôpital Provincial".into())).unwrap();
    w.select_priority(Priority::High).unwrap();
    assert_eq!(w.advance().unwrap(), Step::ScoreReview);
    assert_eq!(w.advance().unwrap(), Step::FinalizeAndSubmit);
}

#[tokio::test]
async fn full_flow_submits_and_clears_only_the_draft() {
    let loc = FakeLocation::zone(ZoneClass::A, 42_000);
    let backend = FakeBackend::scripted(vec![Ok(EstablishmentId(17))]);
    let mut w = Wizard::open(session_with_foreign_key(), WizardConfig::default());
    walk_to_submission(&mut w, &loc).await;

    let score = w.draft().score.clone().unwrap();
    // zone A budget 2.4e6 and solar midpoint 2000 each give +5
    assert_eq!(score.score, 80.0);

    let id = w.submit(&backend).await.unwrap();
    assert_eq!(id, EstablishmentId(17));
    assert!(w.is_completed());

    let sent = backend.received.lock().unwrap()[0].clone();
    assert_eq!(sent.number_of_beds, 420);
    assert_eq!(sent.irradiation_class, Some(ZoneClass::A));
    assert_eq!(sent.project_priority, ObjectiveCode::MaximizeAutonomy);
    assert_eq!(sent.population_served, 42_000);

    assert!(w.store().keys().is_empty());
    assert_eq!(
        w.store().medium().get_item("auth_token").as_deref(),
        Some("abc")
    );
    assert_eq!(w.set_location(30.0, -9.0), Err(WizardError::Completed));
}

#[tokio::test]
async fn failed_submission_keeps_draft_and_allows_retry() {
    let loc = FakeLocation::zone(ZoneClass::C, 8_000);
    let backend = FakeBackend::scripted(vec![
        Err(UpstreamError::status(401)),
        Err(UpstreamError::status(400).with_message("Nom déjà utilisé")),
        Ok(EstablishmentId(3)),
    ]);
    let mut w = Wizard::open(MemoryMedium::new(), WizardConfig::default());
    walk_to_submission(&mut w, &loc).await;
    let slots_before = w.store().keys().len();

    let err = w.submit(&backend).await.unwrap_err();
    assert_eq!(err, WizardError::Submission(SubmissionError::AuthExpired));
    assert_eq!(
        w.submission(),
        &SubmissionState::Failed(SubmissionError::AuthExpired)
    );
    assert_eq!(w.store().keys().len(), slots_before);

    let err = w.submit(&backend).await.unwrap_err();
    assert_eq!(err.to_string(), "Nom déjà utilisé");

    assert_eq!(w.submit(&backend).await.unwrap(), EstablishmentId(3));
    assert_eq!(backend.received.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn unreachable_backend_message() {
    let loc = FakeLocation::zone(ZoneClass::B, 1_000);
    let backend = FakeBackend::scripted(vec![]);
    let mut w = Wizard::open(MemoryMedium::new(), WizardConfig::default());
    walk_to_submission(&mut w, &loc).await;
    let err = w.submit(&backend).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Impossible de contacter le serveur. Vérifiez votre connexion internet."
    );
}

#[tokio::test]
async fn service_outage_degrades_gracefully() {
    let loc = FakeLocation::down();
    let mut w = Wizard::open(MemoryMedium::new(), WizardConfig::default());
    w.set_location(33.0, -7.0).unwrap();
    w.resolve_zone(&loc).await.unwrap();
    let site = w.draft().location.clone().unwrap();
    assert_eq!(site.irradiation_class, None);
    assert_eq!(site.latitude, 33.0);
    assert_eq!(w.advance().unwrap(), Step::ProjectConstraints);

    assert!(!w.prefill_population(&loc).await.unwrap());
    assert!(!w.is_estimating());
    assert_eq!(w.draft().constraints.population.exact, None);
    // Unknown zone falls back to the neutral multiplier.
    assert_eq!(w.static_estimate().budget_dh, w.config().econ.base_budget_dh);
}

#[tokio::test]
async fn use_estimate_fetches_when_needed_and_writes_band() {
    let loc = FakeLocation::zone(ZoneClass::B, 50_000);
    let mut w = Wizard::open(MemoryMedium::new(), WizardConfig::default());
    w.set_location(33.0, -7.0).unwrap();
    w.advance().unwrap();
    w.set_mode(QuantityKind::Population, InputMode::Interval).unwrap();

    assert!(w.use_population_estimate(&loc).await.unwrap());
    assert_eq!(loc.population_calls.load(Ordering::SeqCst), 1);
    let pop = w.draft().constraints.population;
    assert_eq!((pop.min, pop.max), (Some(40_000.0), Some(60_000.0)));

    w.set_mode(QuantityKind::Population, InputMode::Exact).unwrap();
    w.set_exact(QuantityKind::Population, Some(5.0)).unwrap();
    assert!(w.use_population_estimate(&loc).await.unwrap());
    assert_eq!(loc.population_calls.load(Ordering::SeqCst), 1);
    assert_eq!(w.draft().constraints.population.exact, Some(50_000.0));
}

#[tokio::test]
async fn reopening_resumes_where_the_user_left() {
    let loc = FakeLocation::zone(ZoneClass::A, 42_000);
    let mut w = Wizard::open(MemoryMedium::new(), WizardConfig::default());
    w.set_location(31.63, -8.0).unwrap();
    w.resolve_zone(&loc).await.unwrap();
    w.advance().unwrap();
    w.prefill_population(&loc).await.unwrap();

    let w = Wizard::open(w.into_medium(), WizardConfig::default());
    assert_eq!(w.step(), Step::ProjectConstraints);
    assert_eq!(w.draft().constraints.population.exact, Some(42_000.0));
    let site = w.draft().location.clone().unwrap();
    assert_eq!(site.irradiation_class, Some(ZoneClass::A));
    assert!(w.store().get::<serde_json::Value>(slot::LOCATION).is_some());
}

#[tokio::test]
async fn submission_requires_final_step() {
    let backend = FakeBackend::scripted(vec![Ok(EstablishmentId(1))]);
    let mut w = Wizard::open(MemoryMedium::new(), WizardConfig::default());
    assert_eq!(
        w.submit(&backend).await.unwrap_err(),
        WizardError::WrongStep {
            expected: Step::FinalizeAndSubmit,
            actual: Step::Location
        }
    );
    assert!(backend.received.lock().unwrap().is_empty());
}

#[tokio::test]
async fn cancelled_submission_can_be_retried() {
    let loc = FakeLocation::zone(ZoneClass::A, 42_000);
    let mut w = Wizard::open(MemoryMedium::new(), WizardConfig::default());
    walk_to_submission(&mut w, &loc).await;

    let timed_out = tokio::time::timeout(Duration::from_millis(20), w.submit(&Stalled)).await;
    assert!(timed_out.is_err());
    assert_eq!(w.submission(), &SubmissionState::Idle);

    let backend = FakeBackend::scripted(vec![Ok(EstablishmentId(9))]);
    assert_eq!(w.submit(&backend).await.unwrap(), EstablishmentId(9));
    assert!(w.is_completed());
}

#[tokio::test]
async fn cancelled_population_request_can_be_retried() {
    let mut w = Wizard::open(MemoryMedium::new(), WizardConfig::default());
    w.set_location(33.0, -7.0).unwrap();

    let timed_out = tokio::time::timeout(
        Duration::from_millis(20),
        w.fetch_population_estimate(&Stalled),
    )
    .await;
    assert!(timed_out.is_err());
    assert!(!w.is_estimating());

    let loc = FakeLocation::zone(ZoneClass::B, 12_000);
    assert_eq!(w.fetch_population_estimate(&loc).await.unwrap(), Some(12_000));
    assert!(!w.is_estimating());
}
