//! Route matching: pure filtering and ranking, no I/O
//!
//! A route qualifies when it carries every required accessibility tag;
//! ranking is ascending straight-line distance from the user position
//! to the nearest point of the route geometry. This deliberately does
//! not compute street-network paths; the engine consumes pre-tagged
//! routes and a proximity ranking is all the product ever promised.

use crate::domain::{AccessibilityTag, Coordinate, Route};
use std::collections::HashSet;

/// One ranked match result
#[derive(Debug, Clone, PartialEq)]
pub struct RouteMatch {
    pub route: Route,
    /// Straight-line distance in meters from the query position to the
    /// nearest geometry point
    pub distance_m: f64,
}

/// Distance from a position to the nearest point of a route geometry.
/// Geometries hold at least one point; an empty geometry ranks last.
pub fn nearest_distance_m(position: &Coordinate, route: &Route) -> f64 {
    route
        .geometry
        .iter()
        .map(|point| position.distance_m(point))
        .fold(f64::INFINITY, f64::min)
}

/// Filter and rank catalog routes against a position and required tags.
///
/// Empty `required_tags` qualifies every route. Ties on distance break
/// on ascending route id so the ranking is deterministic. An empty
/// catalog or a requirement nothing satisfies yields an empty result,
/// not an error.
pub fn match_routes(
    position: &Coordinate,
    required_tags: &HashSet<AccessibilityTag>,
    routes: &[Route],
) -> Vec<RouteMatch> {
    let mut matches: Vec<RouteMatch> = routes
        .iter()
        .filter(|route| route.satisfies(required_tags))
        .map(|route| RouteMatch {
            route: route.clone(),
            distance_m: nearest_distance_m(position, route),
        })
        .collect();

    matches.sort_by(|a, b| {
        a.distance_m
            .partial_cmp(&b.distance_m)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.route.id.cmp(&b.route.id))
    });
    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    fn route(id: &str, tags: &[AccessibilityTag], geometry: &[Coordinate]) -> Route {
        Route {
            id: id.to_string(),
            name: format!("Route {id}"),
            description: String::new(),
            duration: String::new(),
            tags: tags.iter().copied().collect(),
            geometry: geometry.iter().copied().collect(),
        }
    }

    fn no_tags() -> HashSet<AccessibilityTag> {
        HashSet::new()
    }

    #[test]
    fn test_nearest_point_of_geometry_is_used() {
        let position = Coordinate::new(14.55, 120.99);
        let r = route(
            "1",
            &[],
            &[Coordinate::new(14.90, 121.20), Coordinate::new(14.55, 120.99)],
        );
        assert!(nearest_distance_m(&position, &r) < 1.0);
    }

    #[test]
    fn test_ranks_by_ascending_distance() {
        let position = Coordinate::new(14.55, 120.99);
        let near = route("near", &[], &[Coordinate::new(14.551, 120.99)]);
        let far = route("far", &[], &[Coordinate::new(14.70, 121.10)]);

        let ranked = match_routes(&position, &no_tags(), &[far, near]);
        let ids: Vec<&str> = ranked.iter().map(|m| m.route.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "far"]);
        assert!(ranked[0].distance_m < ranked[1].distance_m);
    }

    #[test]
    fn test_ties_break_on_route_id() {
        let position = Coordinate::new(14.55, 120.99);
        let point = Coordinate::new(14.56, 121.00);
        let b = route("b", &[], &[point]);
        let a = route("a", &[], &[point]);
        let c = route("c", &[], &[point]);

        let ranked = match_routes(&position, &no_tags(), &[b, c, a]);
        let ids: Vec<&str> = ranked.iter().map(|m| m.route.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_required_tags_filter_beats_distance() {
        // A step-free route 1 km away wins over an untagged route 100 m
        // away when step-free is required.
        let position = Coordinate::new(14.5995, 120.9842);
        let tagged_far = route(
            "tagged",
            &[AccessibilityTag::StepFree],
            // ~1 km north
            &[Coordinate::new(14.6085, 120.9842)],
        );
        let untagged_near = route(
            "untagged",
            &[],
            // ~100 m north
            &[Coordinate::new(14.6004, 120.9842)],
        );

        let required: HashSet<_> = [AccessibilityTag::StepFree].into_iter().collect();
        let ranked = match_routes(&position, &required, &[untagged_near, tagged_far]);

        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].route.id, "tagged");
    }

    #[test]
    fn test_empty_required_tags_matches_everything() {
        let position = Coordinate::new(14.55, 120.99);
        let routes = vec![
            route("1", &[AccessibilityTag::StepFree], &[Coordinate::new(14.56, 121.0)]),
            route("2", &[], &[Coordinate::new(14.57, 121.0)]),
        ];
        assert_eq!(match_routes(&position, &no_tags(), &routes).len(), 2);
    }

    #[test]
    fn test_multiple_required_tags_need_all() {
        let position = Coordinate::new(14.55, 120.99);
        let partial = route("1", &[AccessibilityTag::Ramp], &[Coordinate::new(14.56, 121.0)]);
        let full = route(
            "2",
            &[AccessibilityTag::Ramp, AccessibilityTag::Elevator],
            &[Coordinate::new(14.57, 121.0)],
        );

        let required: HashSet<_> =
            [AccessibilityTag::Ramp, AccessibilityTag::Elevator].into_iter().collect();
        let ranked = match_routes(&position, &required, &[partial, full]);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].route.id, "2");
    }

    #[test]
    fn test_empty_catalog_yields_empty_result() {
        let position = Coordinate::new(14.55, 120.99);
        assert!(match_routes(&position, &no_tags(), &[]).is_empty());
    }

    #[test]
    fn test_unsatisfiable_requirement_yields_empty_result() {
        let position = Coordinate::new(14.55, 120.99);
        let routes = vec![route("1", &[], &[Coordinate::new(14.56, 121.0)])];
        let required: HashSet<_> = [AccessibilityTag::TactilePaving].into_iter().collect();
        assert!(match_routes(&position, &required, &routes).is_empty());
    }
}
