use std::collections::HashMap;

use crate::elevation::{elevation_risk, ElevationLookup};
use crate::geo::CoordKey;
use crate::models::{Report, ScoredReport, UrgencyTier, WaterLevel, WeatherContext};

pub const MAX_SCORE: u32 = 100;
const PEOPLE_CAP: u32 = 10;
const LOW_BATTERY_PERCENT: u32 = 20;

pub fn water_level_points(level: WaterLevel) -> u32 {
    match level {
        WaterLevel::Roof => 40,
        WaterLevel::Neck => 35,
        WaterLevel::Chest => 25,
        WaterLevel::Waist => 15,
        WaterLevel::Ankle => 5,
        WaterLevel::Unknown => 10,
    }
}

/// Points for how long the people say they can stay safe. First matching
/// bucket wins.
pub fn time_pressure_points(safe_for_hours: f64) -> (u32, &'static str) {
    if safe_for_hours <= 1.0 {
        (20, "<=1")
    } else if safe_for_hours <= 3.0 {
        (15, "<=3")
    } else if safe_for_hours <= 6.0 {
        (10, "<=6")
    } else if safe_for_hours <= 12.0 {
        (5, "<=12")
    } else {
        (0, ">12")
    }
}

pub fn forecast_rain_points(forecast_mm: f64) -> u32 {
    if forecast_mm > 100.0 {
        15
    } else if forecast_mm > 50.0 {
        10
    } else if forecast_mm > 25.0 {
        5
    } else {
        0
    }
}

/// Score one report. Pure: the elevation must already be resolved.
pub fn score_report(
    report: &Report,
    weather: &WeatherContext,
    elevation: ElevationLookup,
) -> ScoredReport {
    let mut score = 0u32;
    let mut factors = Vec::new();

    let water = water_level_points(report.water_level);
    score += water;
    factors.push(format!("water_level:{}={water}", report.water_level.as_str()));

    for (present, label, points) in [
        (report.has_medical_emergency, "medical_emergency", 15),
        (report.has_disabled, "disabled", 8),
        (report.has_elderly, "elderly", 5),
        (report.has_children, "children", 2),
    ] {
        if present {
            score += points;
            factors.push(format!("{label}={points}"));
        }
    }

    if let Some(hours) = report.safe_for_hours {
        let (points, bucket) = time_pressure_points(hours);
        if points > 0 {
            score += points;
            factors.push(format!("safe_hours{bucket}={points}"));
        }
    }

    let people = report.people().min(PEOPLE_CAP);
    score += people;
    factors.push(format!("people={people}"));

    if !report.has_food {
        score += 3;
        factors.push("no_food=3".to_string());
    }
    if !report.has_water {
        score += 5;
        factors.push("no_water=5".to_string());
    }
    if !report.has_power && report.battery_percent.unwrap_or(0) < LOW_BATTERY_PERCENT {
        score += 2;
        factors.push("low_battery=2".to_string());
    }

    let weather_risk = weather
        .get(&report.district)
        .map(|w| {
            let rain = w.forecast_precip_24h_mm;
            let points = forecast_rain_points(rain);
            if points > 0 {
                factors.push(format!("forecast_rain:{rain}mm={points}"));
            }
            points
        })
        .unwrap_or(0);
    score += weather_risk;

    let elevation_m = elevation.meters();
    let (terrain_risk, elevation_risk_level) = elevation_risk(elevation_m);
    if let Some(m) = elevation_m {
        if terrain_risk > 0 {
            score += terrain_risk;
            factors.push(format!("elevation:{m}m={terrain_risk}"));
        }
    }

    let urgency_score = score.min(MAX_SCORE);

    ScoredReport {
        report: report.clone(),
        urgency_score,
        urgency_tier: UrgencyTier::from_score(urgency_score),
        score_factors: factors,
        weather_risk,
        elevation_m,
        elevation_risk: terrain_risk,
        elevation_risk_level,
    }
}

/// Score every report and rank them by urgency, highest first.
///
/// The sort is stable, so equal scores keep their input order.
pub fn score_reports(
    reports: &[Report],
    weather: &WeatherContext,
    elevations: &HashMap<CoordKey, ElevationLookup>,
) -> Vec<ScoredReport> {
    let mut scored: Vec<ScoredReport> = reports
        .iter()
        .map(|report| {
            let elevation = report
                .coordinates()
                .and_then(|(lat, lon)| elevations.get(&CoordKey::new(lat, lon)).copied())
                .unwrap_or_default();
            score_report(report, weather, elevation)
        })
        .collect();

    scored.sort_by(|a, b| b.urgency_score.cmp(&a.urgency_score));
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DistrictWeather;
    use crate::testkit::report;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn weather(district: &str, forecast_mm: f64) -> WeatherContext {
        WeatherContext::from_records(vec![DistrictWeather {
            district: district.to_string(),
            forecast_precip_24h_mm: forecast_mm,
            alert_level: "red".to_string(),
            extra: serde_json::Map::new(),
        }])
    }

    #[test]
    fn worst_case_report_is_capped_at_100() {
        let mut sos = report("r1", "Colombo");
        sos.water_level = WaterLevel::Roof;
        sos.number_of_people = 12;
        sos.has_medical_emergency = true;
        sos.has_food = false;
        sos.has_water = false;
        sos.has_power = true;
        sos.safe_for_hours = Some(0.5);

        let scored = score_report(&sos, &weather("Colombo", 120.0), ElevationLookup::Resolved(3.0));
        assert_eq!(scored.urgency_score, 100);
        assert_eq!(scored.urgency_tier, UrgencyTier::Critical);
        assert_eq!(scored.weather_risk, 15);
        assert_eq!(scored.elevation_risk, 15);
        assert_eq!(
            scored.score_factors,
            vec![
                "water_level:ROOF=40",
                "medical_emergency=15",
                "safe_hours<=1=20",
                "people=10",
                "no_food=3",
                "no_water=5",
                "forecast_rain:120mm=15",
                "elevation:3m=15",
            ]
        );
    }

    #[test]
    fn minimal_report_scores_water_and_people_only() {
        let sos = report("r1", "Kandy");
        let scored = score_report(&sos, &WeatherContext::default(), ElevationLookup::Unresolved);
        // UNKNOWN water 10, one person 1; defaults have food, water and power
        assert_eq!(scored.urgency_score, 11);
        assert_eq!(scored.urgency_tier, UrgencyTier::Low);
        assert_eq!(scored.elevation_m, None);
        assert_eq!(scored.elevation_risk_level.as_str(), "UNKNOWN");
    }

    #[test]
    fn low_battery_needs_both_conditions() {
        let mut sos = report("r1", "Kandy");
        sos.has_power = false;
        sos.battery_percent = Some(19);
        let low = score_report(&sos, &WeatherContext::default(), ElevationLookup::Unresolved);
        assert!(low.score_factors.contains(&"low_battery=2".to_string()));

        sos.battery_percent = Some(20);
        let ok = score_report(&sos, &WeatherContext::default(), ElevationLookup::Unresolved);
        assert_eq!(low.urgency_score, ok.urgency_score + 2);

        sos.has_power = true;
        sos.battery_percent = None;
        let powered = score_report(&sos, &WeatherContext::default(), ElevationLookup::Unresolved);
        assert_eq!(powered.urgency_score, ok.urgency_score);
    }

    #[test]
    fn time_pressure_buckets_are_exclusive() {
        assert_eq!(time_pressure_points(1.0).0, 20);
        assert_eq!(time_pressure_points(1.5).0, 15);
        assert_eq!(time_pressure_points(3.0).0, 15);
        assert_eq!(time_pressure_points(6.0).0, 10);
        assert_eq!(time_pressure_points(12.0).0, 5);
        assert_eq!(time_pressure_points(12.5).0, 0);
    }

    #[test]
    fn forecast_rain_buckets_are_strict() {
        assert_eq!(forecast_rain_points(25.0), 0);
        assert_eq!(forecast_rain_points(25.1), 5);
        assert_eq!(forecast_rain_points(50.0), 5);
        assert_eq!(forecast_rain_points(100.0), 10);
        assert_eq!(forecast_rain_points(100.5), 15);
    }

    #[test]
    fn weather_matches_district_case_insensitively() {
        let sos = report("r1", "GALLE");
        let scored = score_report(&sos, &weather("galle", 60.0), ElevationLookup::Unresolved);
        assert_eq!(scored.weather_risk, 10);

        let elsewhere = score_report(&sos, &weather("Matara", 160.0), ElevationLookup::Unresolved);
        assert_eq!(elsewhere.weather_risk, 0);
    }

    #[test]
    fn ranking_is_descending_and_stable() {
        let mut roof = report("roof", "Galle");
        roof.water_level = WaterLevel::Roof;
        let first_tie = report("tie-a", "Galle");
        let second_tie = report("tie-b", "Galle");

        let scored = score_reports(
            &[first_tie, roof, second_tie],
            &WeatherContext::default(),
            &HashMap::new(),
        );
        let ids: Vec<&str> = scored.iter().map(|s| s.report.id.as_str()).collect();
        assert_eq!(ids, vec!["roof", "tie-a", "tie-b"]);
    }

    #[test]
    fn batch_scoring_uses_resolved_elevation() {
        let mut sos = report("r1", "Galle");
        sos.latitude = Some(6.0312);
        sos.longitude = Some(80.2149);
        let mut elevations = HashMap::new();
        elevations.insert(CoordKey::new(6.03, 80.21), ElevationLookup::Resolved(12.0));

        let scored = score_reports(&[sos], &WeatherContext::default(), &elevations);
        assert_eq!(scored[0].elevation_m, Some(12.0));
        assert_eq!(scored[0].elevation_risk, 10);
    }

    fn arb_water_level() -> impl Strategy<Value = WaterLevel> {
        prop_oneof![
            Just(WaterLevel::Ankle),
            Just(WaterLevel::Unknown),
            Just(WaterLevel::Waist),
            Just(WaterLevel::Chest),
            Just(WaterLevel::Neck),
            Just(WaterLevel::Roof),
        ]
    }

    fn arb_report() -> impl Strategy<Value = Report> {
        (
            arb_water_level(),
            0u32..500,
            any::<[bool; 7]>(),
            proptest::option::of(0u32..=100),
            proptest::option::of(-5.0f64..48.0),
        )
            .prop_map(|(level, people, flags, battery, hours)| {
                let mut sos = report("p", "Colombo");
                sos.water_level = level;
                sos.number_of_people = people;
                sos.has_medical_emergency = flags[0];
                sos.has_disabled = flags[1];
                sos.has_elderly = flags[2];
                sos.has_children = flags[3];
                sos.has_food = flags[4];
                sos.has_water = flags[5];
                sos.has_power = flags[6];
                sos.battery_percent = battery;
                sos.safe_for_hours = hours;
                sos
            })
    }

    /// Score with no weather and no elevation.
    fn calm_score(sos: &Report) -> u32 {
        score_report(sos, &WeatherContext::default(), ElevationLookup::Unresolved).urgency_score
    }

    proptest! {
        #[test]
        fn score_is_bounded_and_deterministic(
            sos in arb_report(),
            rain in 0.0f64..300.0,
            elevation in proptest::option::of(-10.0f64..500.0),
        ) {
            let context = weather("Colombo", rain);
            let lookup = elevation.map(ElevationLookup::Resolved).unwrap_or_default();
            let first = score_report(&sos, &context, lookup);
            let second = score_report(&sos, &context, lookup);
            prop_assert!(first.urgency_score <= MAX_SCORE);
            prop_assert_eq!(first.urgency_tier, UrgencyTier::from_score(first.urgency_score));
            prop_assert_eq!(first, second);
        }

        #[test]
        fn worse_water_never_lowers_score(
            sos in arb_report(),
            a in arb_water_level(),
            b in arb_water_level(),
        ) {
            let (low, high) = if a <= b { (a, b) } else { (b, a) };
            let mut lower = sos.clone();
            lower.water_level = low;
            let mut higher = sos;
            higher.water_level = high;
            prop_assert!(calm_score(&higher) >= calm_score(&lower));
        }

        #[test]
        fn more_rain_never_lowers_score(
            sos in arb_report(),
            a in 0.0f64..300.0,
            b in 0.0f64..300.0,
        ) {
            let (low, high) = if a <= b { (a, b) } else { (b, a) };
            let score = |rain| {
                score_report(&sos, &weather("Colombo", rain), ElevationLookup::Unresolved)
                    .urgency_score
            };
            prop_assert!(score(high) >= score(low));
        }

        #[test]
        fn lower_ground_never_lowers_score(
            sos in arb_report(),
            a in -20.0f64..400.0,
            b in -20.0f64..400.0,
        ) {
            let (low, high) = if a <= b { (a, b) } else { (b, a) };
            let context = WeatherContext::default();
            let score = |meters| {
                score_report(&sos, &context, ElevationLookup::Resolved(meters)).urgency_score
            };
            prop_assert!(score(low) >= score(high));
        }

        #[test]
        fn less_safe_time_never_lowers_score(
            sos in arb_report(),
            a in 0.0f64..48.0,
            b in 0.0f64..48.0,
        ) {
            let (short, long) = if a <= b { (a, b) } else { (b, a) };
            let mut urgent = sos.clone();
            urgent.safe_for_hours = Some(short);
            let mut patient = sos;
            patient.safe_for_hours = Some(long);
            prop_assert!(calm_score(&urgent) >= calm_score(&patient));
        }

        #[test]
        fn more_people_never_lowers_score(
            sos in arb_report(),
            a in 0u32..50,
            b in 0u32..50,
        ) {
            let (few, many) = if a <= b { (a, b) } else { (b, a) };
            let mut small = sos.clone();
            small.number_of_people = few;
            let mut large = sos;
            large.number_of_people = many;
            prop_assert!(calm_score(&large) >= calm_score(&small));
        }
    }
}
