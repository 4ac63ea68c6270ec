//! Estimation provider: static zone defaults plus the asynchronous
//! population estimate and the rules for writing it into the form.

use crate::collaborators::CollaboratorError;
use crate::error::WizardError;
use grid_core::{Bound, ConstraintsForm, InputMode, Location, QuantityKind, ZoneClass};
use grid_econ::{estimate_static_defaults, population_band, EconConfig, StaticEstimate};
use rust_decimal::prelude::ToPrimitive;
use tracing::{debug, info, warn};

/// Coordinates of an accepted population request.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PopulationRequest {
    pub latitude: f64,
    pub longitude: f64,
}

/// Lifecycle of the population estimate for one wizard session.
///
/// At most one request is in flight; a second `begin` is refused until the
/// first one finishes. The latest successful estimate is kept.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PopulationEstimator {
    in_flight: bool,
    latest: Option<u64>,
    /// The one-time auto-fill after the first successful estimate was used.
    auto_fill_spent: bool,
}

impl PopulationEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn latest(&self) -> Option<u64> {
        self.latest
    }

    pub fn begin(&mut self, location: Option<&Location>) -> Result<PopulationRequest, WizardError> {
        if self.in_flight {
            return Err(WizardError::EstimateInFlight);
        }
        let loc = location.ok_or(WizardError::NoLocation)?;
        self.in_flight = true;
        debug!(lat = loc.latitude, lng = loc.longitude, "population estimate requested");
        Ok(PopulationRequest {
            latitude: loc.latitude,
            longitude: loc.longitude,
        })
    }

    /// Guard for an awaited request. Dropping it before [`Self::finish`]
    /// (a cancelled future) releases the in-flight flag.
    pub fn pending(&mut self) -> PendingEstimate<'_> {
        PendingEstimate {
            estimator: Some(self),
        }
    }

    /// Record the outcome of the request started by [`Self::begin`]. A failed
    /// request leaves the previous estimate in place.
    pub fn finish(&mut self, result: Result<u64, CollaboratorError>) -> Option<u64> {
        self.in_flight = false;
        match result {
            Ok(pop) => {
                info!(population = pop, "population estimate received");
                self.latest = Some(pop);
                Some(pop)
            }
            Err(e) => {
                warn!(error = %e, "population estimate unavailable");
                None
            }
        }
    }

    /// Write the latest estimate into an empty exact-mode population field.
    /// Only the first successful estimate of the session may do this, and
    /// never over a value or in interval mode. Returns whether it wrote.
    pub fn apply_if_empty(&mut self, form: &mut ConstraintsForm) -> bool {
        let Some(pop) = self.latest else {
            return false;
        };
        if self.auto_fill_spent {
            return false;
        }
        self.auto_fill_spent = true;
        let input = form.get(QuantityKind::Population);
        if input.mode != InputMode::Exact || input.exact.is_some() {
            debug!("population already entered, estimate not applied");
            return false;
        }
        form.set_exact(QuantityKind::Population, Some(pop as f64));
        true
    }

    /// Explicit "use estimate": overwrite the active representation with the
    /// latest estimate, as a band in interval mode. Returns whether it wrote.
    pub fn overwrite(&self, form: &mut ConstraintsForm, cfg: &EconConfig) -> bool {
        let Some(pop) = self.latest else {
            return false;
        };
        let kind = QuantityKind::Population;
        match form.mode(kind) {
            InputMode::Exact => form.set_exact(kind, Some(pop as f64)),
            InputMode::Interval => {
                let (lo, hi) = population_band(pop, cfg);
                form.set_bound(kind, Bound::Min, Some(lo as f64));
                form.set_bound(kind, Bound::Max, Some(hi as f64));
            }
        }
        true
    }
}

/// Clears the in-flight flag of a [`PopulationEstimator`] when dropped
/// before [`PendingEstimate::settle`].
pub struct PendingEstimate<'a> {
    estimator: Option<&'a mut PopulationEstimator>,
}

impl PendingEstimate<'_> {
    /// The request produced a result; leave the flag for `finish`.
    pub fn settle(mut self) {
        self.estimator = None;
    }
}

impl Drop for PendingEstimate<'_> {
    fn drop(&mut self) {
        if let Some(est) = self.estimator.take() {
            if est.in_flight {
                est.in_flight = false;
                warn!("population request abandoned before a response");
            }
        }
    }
}

/// Static defaults for the zone of `location`; neutral without a zone.
pub fn static_estimate(location: Option<&Location>, cfg: &EconConfig) -> StaticEstimate {
    let zone: Option<ZoneClass> = location.and_then(|l| l.irradiation_class);
    estimate_static_defaults(zone, cfg)
}

/// Pull a static estimate into the exact value of budget or total surface.
/// Other quantities have no static estimate and are left alone.
pub fn apply_static(form: &mut ConstraintsForm, kind: QuantityKind, est: &StaticEstimate) -> bool {
    let value = match kind {
        QuantityKind::Budget => est.budget_dh,
        QuantityKind::TotalSurface => est.surface_m2,
        _ => return false,
    };
    match value.to_f64() {
        Some(v) => {
            form.set_exact(kind, Some(v));
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grid_core::QuantityInput;
    use proptest::prelude::*;

    fn site() -> Location {
        Location {
            irradiation_class: Some(ZoneClass::A),
            ..Location::new(31.6, -8.0)
        }
    }

    #[test]
    fn one_request_at_a_time() {
        let mut p = PopulationEstimator::new();
        assert_eq!(p.begin(None), Err(WizardError::NoLocation));
        let req = p.begin(Some(&site())).unwrap();
        assert_eq!(req.latitude, 31.6);
        assert!(p.is_in_flight());
        assert_eq!(p.begin(Some(&site())), Err(WizardError::EstimateInFlight));
        assert_eq!(p.finish(Ok(50_000)), Some(50_000));
        assert!(!p.is_in_flight());
        p.begin(Some(&site())).unwrap();
        assert_eq!(
            p.finish(Err(CollaboratorError::Unavailable("timeout".into()))),
            None
        );
        assert_eq!(p.latest(), Some(50_000));
    }

    #[test]
    fn dropped_request_releases_flag() {
        let mut p = PopulationEstimator::new();
        p.begin(Some(&site())).unwrap();
        {
            let _pending = p.pending();
        }
        assert!(!p.is_in_flight());
        assert!(p.begin(Some(&site())).is_ok());
        assert_eq!(p.latest(), None);

        p.pending().settle();
        assert!(p.is_in_flight());
        assert_eq!(p.finish(Ok(7_000)), Some(7_000));
        assert!(!p.is_in_flight());
    }

    #[test]
    fn auto_fill_only_once_and_only_when_empty() {
        let mut p = PopulationEstimator::new();
        let mut form = ConstraintsForm::default();
        assert!(!p.apply_if_empty(&mut form));
        p.begin(Some(&site())).unwrap();
        p.finish(Ok(12_000));
        assert!(p.apply_if_empty(&mut form));
        assert_eq!(form.population.exact, Some(12_000.0));

        form.set_exact(QuantityKind::Population, None);
        p.begin(Some(&site())).unwrap();
        p.finish(Ok(13_000));
        assert!(!p.apply_if_empty(&mut form));
        assert_eq!(form.population.exact, None);
    }

    #[test]
    fn auto_fill_respects_user_value_and_interval_mode() {
        let mut p = PopulationEstimator::new();
        p.begin(Some(&site())).unwrap();
        p.finish(Ok(12_000));
        let mut typed = ConstraintsForm::default();
        typed.population = QuantityInput::exact(900.0);
        assert!(!p.clone().apply_if_empty(&mut typed));
        assert_eq!(typed.population.exact, Some(900.0));

        let mut interval = ConstraintsForm::default();
        interval.set_mode(QuantityKind::Population, InputMode::Interval);
        assert!(!p.apply_if_empty(&mut interval));
        assert_eq!(interval.population.exact, None);
    }

    #[test]
    fn overwrite_uses_band_in_interval_mode() {
        let cfg = EconConfig::default();
        let mut p = PopulationEstimator::new();
        let mut form = ConstraintsForm::default();
        assert!(!p.overwrite(&mut form, &cfg));
        p.begin(Some(&site())).unwrap();
        p.finish(Ok(50_000));

        form.population = QuantityInput::exact(10.0);
        assert!(p.overwrite(&mut form, &cfg));
        assert_eq!(form.population.exact, Some(50_000.0));

        form.set_mode(QuantityKind::Population, InputMode::Interval);
        assert!(p.overwrite(&mut form, &cfg));
        assert_eq!(form.population.min, Some(40_000.0));
        assert_eq!(form.population.max, Some(60_000.0));
        assert_eq!(form.population.exact, Some(50_000.0));
    }

    #[test]
    fn static_estimate_follows_zone() {
        let cfg = EconConfig::default();
        let est = static_estimate(Some(&site()), &cfg);
        let mut form = ConstraintsForm::default();
        assert!(apply_static(&mut form, QuantityKind::Budget, &est));
        assert!(apply_static(&mut form, QuantityKind::TotalSurface, &est));
        assert!(!apply_static(&mut form, QuantityKind::Population, &est));
        assert_eq!(form.budget.exact, Some(2_400_000.0));
        assert_eq!(form.total_surface.exact, Some(6_000.0));

        let neutral = static_estimate(None, &cfg);
        assert_eq!(neutral.budget_dh, cfg.base_budget_dh);
    }

    proptest! {
        #[test]
        fn auto_fill_never_clobbers(existing in 1.0f64..1e7, estimate in 1u64..10_000_000) {
            let mut p = PopulationEstimator::new();
            p.begin(Some(&site())).unwrap();
            p.finish(Ok(estimate));
            let mut form = ConstraintsForm::default();
            form.population = QuantityInput::exact(existing);
            p.apply_if_empty(&mut form);
            prop_assert_eq!(form.population.exact, Some(existing));
        }
    }
}
