//! Advisory alerts over a project's metrics.

use grid_core::DerivedMetrics;
use serde::Serialize;

/// Autonomy below this percentage is flagged.
pub const LOW_AUTONOMY_PCT: f64 = 30.0;
/// Payback above this many years is flagged.
pub const HIGH_ROI_YEARS: f64 = 15.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Alert {
    pub title: &'static str,
    pub message: &'static str,
}

/// Alerts for low autonomy and long payback; a single all-clear entry otherwise.
pub fn alerts(m: &DerivedMetrics) -> Vec<Alert> {
    let mut out = Vec::new();
    if m.autonomy_pct < LOW_AUTONOMY_PCT {
        out.push(Alert {
            title: "Autonomie faible",
            message: "L'autonomie est inférieure à 30%. Recommandation: augmenter la surface PV.",
        });
    }
    if m.roi_years > HIGH_ROI_YEARS {
        out.push(Alert {
            title: "ROI élevé",
            message: "Le retour sur investissement est supérieur à 15 ans. Optimisation recommandée.",
        });
    }
    if out.is_empty() {
        out.push(Alert {
            title: "Aucune alerte",
            message: "Votre configuration est optimale.",
        });
    }
    out
}
