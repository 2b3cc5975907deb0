//! Geofence evaluator — distance plus network-origin location check.
//!
//! Distance uses the great-circle (haversine) formula on a spherical
//! earth: accurate to a fraction of a percent at campus scale, which is
//! all the acceptance radii need. Acceptance is an ordered list of named
//! rules evaluated first-match-wins; the true distance is always reported
//! so downstream logging keeps the real discrepancy even when a network
//! rule accepted the attempt.

use rollcall_store::CampusSite;
use rollcall_types::PipelineParams;

/// Mean earth radius in meters (spherical approximation).
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two (lat, lon) points, in meters.
pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();

    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_M * c
}

/// Named acceptance rules, in evaluation order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcceptanceRule {
    /// Accurate GPS inside the campus radius.
    WithinRadius,
    /// Caller's network is on the trusted allow-list — compensates for
    /// disabled or denied GPS on campus premises, regardless of distance.
    TrustedNetwork,
    /// Coarse (IP-derived) geolocation tolerance for devices without GPS.
    CoarseLocation,
}

impl AcceptanceRule {
    /// Evaluation order. First match wins.
    pub const ORDER: [AcceptanceRule; 3] = [
        AcceptanceRule::WithinRadius,
        AcceptanceRule::TrustedNetwork,
        AcceptanceRule::CoarseLocation,
    ];

    pub fn label(self) -> &'static str {
        match self {
            AcceptanceRule::WithinRadius => "accurate GPS",
            AcceptanceRule::TrustedNetwork => "trusted network",
            AcceptanceRule::CoarseLocation => "coarse geolocation",
        }
    }

    fn admits(self, probe: &GeoProbe) -> bool {
        match self {
            AcceptanceRule::WithinRadius => probe.distance_m <= probe.radius_m,
            AcceptanceRule::TrustedNetwork => probe.on_trusted_network,
            AcceptanceRule::CoarseLocation => probe.distance_m <= probe.coarse_radius_m,
        }
    }
}

struct GeoProbe {
    distance_m: f64,
    radius_m: f64,
    coarse_radius_m: f64,
    on_trusted_network: bool,
}

/// The outcome of a geofence check.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeoDecision {
    pub accepted: bool,
    /// Which rule admitted the attempt; `None` when rejected.
    pub rule: Option<AcceptanceRule>,
    /// True great-circle distance, reported on every outcome.
    pub distance_m: f64,
}

pub struct GeofenceEvaluator {
    coarse_radius_m: f64,
}

impl GeofenceEvaluator {
    pub fn new(params: &PipelineParams) -> Self {
        Self {
            coarse_radius_m: params.coarse_radius_m,
        }
    }

    pub fn evaluate(
        &self,
        site: &CampusSite,
        latitude: f64,
        longitude: f64,
        on_trusted_network: bool,
    ) -> GeoDecision {
        let distance_m = haversine_m(site.latitude, site.longitude, latitude, longitude);
        let probe = GeoProbe {
            distance_m,
            radius_m: site.radius_m,
            coarse_radius_m: self.coarse_radius_m,
            on_trusted_network,
        };

        for rule in AcceptanceRule::ORDER {
            if rule.admits(&probe) {
                tracing::debug!(distance_m, rule = rule.label(), "geofence accepted");
                return GeoDecision {
                    accepted: true,
                    rule: Some(rule),
                    distance_m,
                };
            }
        }
        GeoDecision {
            accepted: false,
            rule: None,
            distance_m,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn site(radius_m: f64) -> CampusSite {
        CampusSite {
            latitude: 12.9716,
            longitude: 77.5946,
            radius_m,
        }
    }

    /// A point offset due north of the site by `meters`.
    fn north_of(site: &CampusSite, meters: f64) -> (f64, f64) {
        let dlat = (meters / EARTH_RADIUS_M).to_degrees();
        (site.latitude + dlat, site.longitude)
    }

    fn evaluator() -> GeofenceEvaluator {
        GeofenceEvaluator::new(&PipelineParams::defaults())
    }

    #[test]
    fn exact_reference_point_is_distance_zero() {
        let site = site(100.0);
        let decision = evaluator().evaluate(&site, site.latitude, site.longitude, false);
        assert!(decision.accepted);
        assert_eq!(decision.rule, Some(AcceptanceRule::WithinRadius));
        assert!(decision.distance_m < 1e-6);
    }

    #[test]
    fn just_outside_radius_is_rejected_without_network() {
        // Radius beyond the coarse tolerance so no later rule rescues it.
        let site = site(4000.0);
        let (lat, lon) = north_of(&site, 4001.0);
        let decision = evaluator().evaluate(&site, lat, lon, false);
        assert!(!decision.accepted);
        assert_eq!(decision.rule, None);
        assert!((decision.distance_m - 4001.0).abs() < 1.0);
    }

    #[test]
    fn trusted_network_admits_and_distance_is_unchanged() {
        let site = site(4000.0);
        let (lat, lon) = north_of(&site, 4001.0);
        let decision = evaluator().evaluate(&site, lat, lon, true);
        assert!(decision.accepted);
        assert_eq!(decision.rule, Some(AcceptanceRule::TrustedNetwork));
        assert!((decision.distance_m - 4001.0).abs() < 1.0);
    }

    #[test]
    fn coarse_tolerance_admits_gps_less_devices_near_campus() {
        let site = site(100.0);
        let (lat, lon) = north_of(&site, 2500.0);
        let decision = evaluator().evaluate(&site, lat, lon, false);
        assert!(decision.accepted);
        assert_eq!(decision.rule, Some(AcceptanceRule::CoarseLocation));
    }

    #[test]
    fn far_away_is_rejected() {
        let site = site(100.0);
        let (lat, lon) = north_of(&site, 12_000.0);
        let decision = evaluator().evaluate(&site, lat, lon, false);
        assert!(!decision.accepted);
        assert!(decision.distance_m > 11_000.0);
    }

    #[test]
    fn within_radius_wins_over_trusted_network() {
        let site = site(100.0);
        let decision = evaluator().evaluate(&site, site.latitude, site.longitude, true);
        assert_eq!(decision.rule, Some(AcceptanceRule::WithinRadius));
    }

    proptest! {
        /// Distance is symmetric in its endpoints.
        #[test]
        fn haversine_symmetric(
            lat1 in -85.0f64..85.0, lon1 in -180.0f64..180.0,
            lat2 in -85.0f64..85.0, lon2 in -180.0f64..180.0,
        ) {
            let ab = haversine_m(lat1, lon1, lat2, lon2);
            let ba = haversine_m(lat2, lon2, lat1, lon1);
            prop_assert!((ab - ba).abs() < 1e-6);
        }

        /// Distance is non-negative and zero from a point to itself.
        #[test]
        fn haversine_non_negative(lat in -85.0f64..85.0, lon in -180.0f64..180.0) {
            prop_assert!(haversine_m(lat, lon, lat, lon) < 1e-6);
            prop_assert!(haversine_m(lat, lon, -lat, lon) >= 0.0);
        }
    }
}
