//! Measurable quantities entered either as an exact value or as an interval.
//!
//! Both representations are stored side by side so that switching the input
//! mode never loses what the user typed; only the active representation is
//! validated and resolved.

use crate::ValidationError;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// The four quantities captured on the project-constraints step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuantityKind {
    /// Global project budget in DH.
    Budget,
    /// Total site surface in m².
    TotalSurface,
    /// Non-critical surface usable for panels in m².
    SolarSurface,
    /// Population served around the site.
    Population,
}

impl QuantityKind {
    pub const ALL: [QuantityKind; 4] = [
        QuantityKind::Budget,
        QuantityKind::TotalSurface,
        QuantityKind::SolarSurface,
        QuantityKind::Population,
    ];

    /// Smallest accepted value, in either representation.
    pub fn domain_min(&self) -> f64 {
        match self {
            QuantityKind::SolarSurface => 0.0,
            _ => 1.0,
        }
    }

    /// Field name used in persisted slots and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            QuantityKind::Budget => "budget",
            QuantityKind::TotalSurface => "totalSurface",
            QuantityKind::SolarSurface => "solarSurface",
            QuantityKind::Population => "population",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            QuantityKind::Budget => "Budget global (DH)",
            QuantityKind::TotalSurface => "Surface totale (m²)",
            QuantityKind::SolarSurface => "Surface non critique exploitable pour panneaux (m²)",
            QuantityKind::Population => "Population environnante",
        }
    }
}

/// Which representation of a quantity is active.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputMode {
    #[default]
    Exact,
    Interval,
}

/// One end of an interval.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bound {
    Min,
    Max,
}

/// An individual input of a quantity; used to report which validators are live.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldSlot {
    Exact,
    Min,
    Max,
}

/// Active view of a quantity. Resolution is total over this type.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Quantity {
    Exact(Option<f64>),
    Interval { min: Option<f64>, max: Option<f64> },
}

impl Quantity {
    /// Single value for the quantity: the exact value as entered, or the
    /// midpoint of a well-ordered interval. Missing or inverted (including
    /// equal) bounds resolve to `None`.
    pub fn resolve(&self) -> Option<f64> {
        match *self {
            Quantity::Exact(v) => v,
            Quantity::Interval {
                min: Some(lo),
                max: Some(hi),
            } if lo < hi => Some(lo / 2.0 + hi / 2.0),
            Quantity::Interval { .. } => None,
        }
    }
}

/// Raw user input for one quantity, holding both representations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QuantityInput {
    #[serde(default)]
    pub mode: InputMode,
    #[serde(default)]
    pub exact: Option<f64>,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

impl QuantityInput {
    pub fn exact(value: f64) -> Self {
        Self {
            exact: Some(value),
            ..Default::default()
        }
    }

    pub fn interval(min: f64, max: f64) -> Self {
        Self {
            mode: InputMode::Interval,
            min: Some(min),
            max: Some(max),
            ..Default::default()
        }
    }

    pub fn active(&self) -> Quantity {
        match self.mode {
            InputMode::Exact => Quantity::Exact(self.exact),
            InputMode::Interval => Quantity::Interval {
                min: self.min,
                max: self.max,
            },
        }
    }

    pub fn resolve(&self) -> Option<f64> {
        self.active().resolve()
    }

    /// Inputs whose validators are currently applied. Inputs of the inactive
    /// representation are suspended, their values kept.
    pub fn validated_slots(&self) -> &'static [FieldSlot] {
        match self.mode {
            InputMode::Exact => &[FieldSlot::Exact],
            InputMode::Interval => &[FieldSlot::Min, FieldSlot::Max],
        }
    }

    pub fn value_of(&self, slot: FieldSlot) -> Option<f64> {
        match slot {
            FieldSlot::Exact => self.exact,
            FieldSlot::Min => self.min,
            FieldSlot::Max => self.max,
        }
    }

    /// Input-time rules on the active representation: required, numeric and
    /// at least the domain minimum. Interval ordering is deliberately not
    /// checked here; a transient `min > max` is a normal editing state.
    pub fn validate(&self, kind: QuantityKind) -> Result<(), ValidationError> {
        let field = kind.name();
        for &slot in self.validated_slots() {
            let value = self
                .value_of(slot)
                .ok_or(ValidationError::Missing { field })?;
            if !value.is_finite() {
                return Err(ValidationError::NonFinite { field });
            }
            if value < kind.domain_min() {
                return Err(ValidationError::BelowMinimum {
                    field,
                    min: kind.domain_min(),
                    value,
                });
            }
        }
        Ok(())
    }
}

/// Resolved figures of the project-constraints step.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedConstraints {
    pub budget: f64,
    pub total_surface: f64,
    pub solar_surface: f64,
    /// Population rounded to whole inhabitants.
    pub population: u64,
}

/// Input mode resolver over the four quantities of the constraints step.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintsForm {
    #[serde(default)]
    pub budget: QuantityInput,
    #[serde(default)]
    pub total_surface: QuantityInput,
    #[serde(default)]
    pub solar_surface: QuantityInput,
    #[serde(default)]
    pub population: QuantityInput,
}

impl ConstraintsForm {
    pub fn get(&self, kind: QuantityKind) -> &QuantityInput {
        match kind {
            QuantityKind::Budget => &self.budget,
            QuantityKind::TotalSurface => &self.total_surface,
            QuantityKind::SolarSurface => &self.solar_surface,
            QuantityKind::Population => &self.population,
        }
    }

    pub fn get_mut(&mut self, kind: QuantityKind) -> &mut QuantityInput {
        match kind {
            QuantityKind::Budget => &mut self.budget,
            QuantityKind::TotalSurface => &mut self.total_surface,
            QuantityKind::SolarSurface => &mut self.solar_surface,
            QuantityKind::Population => &mut self.population,
        }
    }

    /// Switch the active representation. Entered values are left untouched.
    /// Returns whether the mode actually changed.
    pub fn set_mode(&mut self, kind: QuantityKind, mode: InputMode) -> bool {
        let input = self.get_mut(kind);
        if input.mode == mode {
            return false;
        }
        input.mode = mode;
        debug!(quantity = kind.name(), ?mode, "input mode switched");
        true
    }

    pub fn mode(&self, kind: QuantityKind) -> InputMode {
        self.get(kind).mode
    }

    pub fn set_exact(&mut self, kind: QuantityKind, value: Option<f64>) {
        self.get_mut(kind).exact = value;
    }

    pub fn set_bound(&mut self, kind: QuantityKind, bound: Bound, value: Option<f64>) {
        let input = self.get_mut(kind);
        match bound {
            Bound::Min => input.min = value,
            Bound::Max => input.max = value,
        }
    }

    /// Whether the validators of `slot` are applied for `kind`.
    pub fn is_validated(&self, kind: QuantityKind, slot: FieldSlot) -> bool {
        self.get(kind).validated_slots().contains(&slot)
    }

    pub fn resolve(&self, kind: QuantityKind) -> Option<f64> {
        self.get(kind).resolve()
    }

    /// Input-time validation of every quantity; the first failure is reported.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for kind in QuantityKind::ALL {
            self.get(kind).validate(kind)?;
        }
        Ok(())
    }

    /// All input-time failures, one per offending quantity.
    pub fn issues(&self) -> Vec<ValidationError> {
        QuantityKind::ALL
            .iter()
            .filter_map(|&k| self.get(k).validate(k).err())
            .collect()
    }

    /// Validate and resolve every quantity. An interval that passes input
    /// validation but cannot be resolved is reported as inverted.
    pub fn resolve_all(&self) -> Result<ResolvedConstraints, ValidationError> {
        self.validate()?;
        let value = |kind: QuantityKind| {
            self.resolve(kind)
                .ok_or(ValidationError::InvertedInterval { field: kind.name() })
        };
        let population = value(QuantityKind::Population)?;
        Ok(ResolvedConstraints {
            budget: value(QuantityKind::Budget)?,
            total_surface: value(QuantityKind::TotalSurface)?,
            solar_surface: value(QuantityKind::SolarSurface)?,
            population: population.round() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn filled_form() -> ConstraintsForm {
        ConstraintsForm {
            budget: QuantityInput::exact(2_000_000.0),
            total_surface: QuantityInput::exact(5_000.0),
            solar_surface: QuantityInput::exact(0.0),
            population: QuantityInput::interval(40_000.0, 60_001.0),
        }
    }

    #[test]
    fn resolves_exact_and_midpoint() {
        let form = filled_form();
        let r = form.resolve_all().unwrap();
        assert_eq!(r.budget, 2_000_000.0);
        assert_eq!(r.solar_surface, 0.0);
        // (40000 + 60001) / 2 = 50000.5, rounded half away from zero
        assert_eq!(r.population, 50_001);
    }

    #[test]
    fn toggle_moves_validators_without_touching_values() {
        let mut form = filled_form();
        form.set_bound(QuantityKind::Budget, Bound::Min, Some(10.0));
        assert!(form.is_validated(QuantityKind::Budget, FieldSlot::Exact));
        assert!(!form.is_validated(QuantityKind::Budget, FieldSlot::Min));

        assert!(form.set_mode(QuantityKind::Budget, InputMode::Interval));
        assert!(!form.is_validated(QuantityKind::Budget, FieldSlot::Exact));
        assert!(form.is_validated(QuantityKind::Budget, FieldSlot::Min));
        assert!(form.is_validated(QuantityKind::Budget, FieldSlot::Max));
        // Max is missing in interval mode, exact value no longer counts.
        assert_eq!(
            form.validate(),
            Err(ValidationError::Missing { field: "budget" })
        );
        assert_eq!(form.budget.exact, Some(2_000_000.0));

        assert!(!form.set_mode(QuantityKind::Budget, InputMode::Interval));
        form.set_mode(QuantityKind::Budget, InputMode::Exact);
        assert!(form.validate().is_ok());
        assert_eq!(form.budget.min, Some(10.0));
    }

    #[test]
    fn inverted_interval_passes_input_rules_but_not_resolution() {
        let mut form = filled_form();
        form.population = QuantityInput::interval(60_000.0, 40_000.0);
        assert!(form.validate().is_ok());
        assert_eq!(form.resolve(QuantityKind::Population), None);
        assert_eq!(
            form.resolve_all(),
            Err(ValidationError::InvertedInterval {
                field: "population"
            })
        );
    }

    #[test]
    fn midpoint_of_huge_bounds_stays_finite() {
        let q = QuantityInput::interval(1e308, 1.7e308);
        let mid = q.resolve().unwrap();
        assert!(mid.is_finite());
        assert!(mid > 1e308 && mid < 1.7e308);
    }

    #[test]
    fn domain_minimums() {
        let mut form = filled_form();
        form.solar_surface = QuantityInput::exact(-1.0);
        assert!(matches!(
            form.validate(),
            Err(ValidationError::BelowMinimum {
                field: "solarSurface",
                ..
            })
        ));
        form.solar_surface = QuantityInput::exact(0.0);
        form.budget = QuantityInput::interval(0.5, 10.0);
        assert!(matches!(
            form.validate(),
            Err(ValidationError::BelowMinimum { field: "budget", .. })
        ));
        form.budget = QuantityInput::exact(f64::NAN);
        assert_eq!(
            form.validate(),
            Err(ValidationError::NonFinite { field: "budget" })
        );
        assert_eq!(form.issues().len(), 1);
    }

    #[test]
    fn form_slot_roundtrip() {
        let form = filled_form();
        let s = serde_json::to_string(&form).unwrap();
        assert!(s.contains("totalSurface"));
        let back: ConstraintsForm = serde_json::from_str(&s).unwrap();
        assert_eq!(back, form);
        let empty: ConstraintsForm = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, ConstraintsForm::default());
    }

    fn any_kind() -> impl Strategy<Value = QuantityKind> {
        prop_oneof![
            Just(QuantityKind::Budget),
            Just(QuantityKind::TotalSurface),
            Just(QuantityKind::SolarSurface),
            Just(QuantityKind::Population),
        ]
    }

    proptest! {
        #[test]
        fn toggling_back_restores_entries(kind in any_kind(),
                                          exact in proptest::option::of(-1e9f64..1e9),
                                          lo in proptest::option::of(-1e9f64..1e9),
                                          hi in proptest::option::of(-1e9f64..1e9)) {
            let mut form = ConstraintsForm::default();
            form.set_exact(kind, exact);
            form.set_bound(kind, Bound::Min, lo);
            form.set_bound(kind, Bound::Max, hi);
            let before = *form.get(kind);
            form.set_mode(kind, InputMode::Interval);
            form.set_mode(kind, InputMode::Exact);
            prop_assert_eq!(*form.get(kind), before);
            form.set_mode(kind, InputMode::Interval);
            prop_assert_eq!(form.get(kind).min, lo);
            prop_assert_eq!(form.get(kind).max, hi);
            prop_assert_eq!(form.get(kind).exact, exact);
        }

        #[test]
        fn interval_without_strict_order_is_undefined(lo in -1e9f64..1e9, gap in 0.0f64..1e9) {
            let q = Quantity::Interval { min: Some(lo), max: Some(lo - gap) };
            prop_assert_eq!(q.resolve(), None);
        }

        #[test]
        fn exact_resolves_unchanged(v in proptest::num::f64::NORMAL | proptest::num::f64::ZERO) {
            prop_assert_eq!(Quantity::Exact(Some(v)).resolve(), Some(v));
        }

        #[test]
        fn ordered_interval_resolves_to_midpoint(lo in -1e6f64..1e6, width in 1e-3f64..1e6) {
            let hi = lo + width;
            let got = QuantityInput::interval(lo, hi).resolve().unwrap();
            prop_assert!(got > lo && got < hi);
        }
    }
}
