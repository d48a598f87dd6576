//! Budget accounting
//!
//! Phase 4: tickets + local transport estimate + minimum food spend, per day
//! and for the trip, plus the minimum feasible budget the validator compares
//! against the user's stated ceiling.

use crate::domain::{Itinerary, TransportMode, TripConstraints, UserProfile};

/// Fill cost fields on the itinerary in place
pub fn apply_budget(
    itinerary: &mut Itinerary,
    constraints: &TripConstraints,
    profile: &UserProfile,
    food_min_per_person_per_day: f64,
) {
    let travelers = constraints.resolve_travelers_count(profile);
    let food_per_day = food_min_per_person_per_day * travelers as f64;

    let mut tickets_total = 0.0;
    let mut transport_total = 0.0;
    let mut cheapest_transport_total = 0.0;
    let mut food_total = 0.0;

    let Itinerary { days, pois, .. } = itinerary;
    for day in days.iter_mut() {
        let mode = day.transport_mode.unwrap_or(constraints.transport_mode);
        let travel_minutes: f64 = day.items.iter().map(|i| i.travel_minutes).sum();

        let day_tickets: f64 = day
            .items
            .iter()
            .filter_map(|item| pois.get(&item.poi_id))
            .map(|poi| poi.effective_ticket() * travelers as f64)
            .sum();

        let day_transport = transport_cost(travel_minutes, mode, travelers);
        // The floor assumes the cheapest motorized mode
        let day_cheapest = transport_cost(travel_minutes, TransportMode::PublicTransit, travelers)
            .min(day_transport);

        day.estimated_cost = round2(day_tickets + day_transport + food_per_day);
        day.total_travel_minutes = round2(travel_minutes);

        tickets_total += day_tickets;
        transport_total += day_transport;
        cheapest_transport_total += day_cheapest;
        food_total += food_per_day;
    }

    // Empty trailing days still need feeding
    let planned_days = itinerary.days.len() as f64;
    let trip_days = f64::from(constraints.days.max(1));
    if trip_days > planned_days {
        food_total += (trip_days - planned_days) * food_per_day;
    }

    itinerary.budget_breakdown.tickets = round2(tickets_total);
    itinerary.budget_breakdown.local_transport = round2(transport_total);
    itinerary.budget_breakdown.food_min = round2(food_total);
    itinerary.total_cost = round2(tickets_total + transport_total + food_total);
    itinerary.minimum_feasible_budget = round2(tickets_total + cheapest_transport_total + food_total);

    itinerary.budget_warning = match constraints.total_budget() {
        Some(limit) if limit + 1e-6 < itinerary.minimum_feasible_budget => {
            let gap = itinerary.minimum_feasible_budget - limit;
            Some(format!(
                "Stated budget {limit:.0} is below the minimum feasible {:.0} (gap {gap:.0}). \
                 Consider fewer ticketed sights, less cross-district travel, or a higher budget.",
                itinerary.minimum_feasible_budget
            ))
        }
        _ => None,
    };
}

fn transport_cost(travel_minutes: f64, mode: TransportMode, travelers: u32) -> f64 {
    let per_group = travel_minutes * mode.cost_per_minute();
    if mode.cost_is_per_traveler() {
        per_group * travelers as f64
    } else {
        per_group
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ItineraryDay, Poi, PoiArena, ScheduleItem, TimeSlot};

    fn ticketed_poi(id: &str, ticket: f64) -> Poi {
        Poi {
            id: id.to_string(),
            name: id.to_string(),
            city: "Test".to_string(),
            lat: 39.9,
            lon: 116.4,
            themes: vec![],
            duration_hours: 2.0,
            cost: ticket,
            indoor: false,
            ticket_price: ticket,
            reservation_required: false,
            closed_weekdays: vec![],
            closed_rules: String::new(),
            open_hours: None,
            description: String::new(),
            popularity: 0.5,
            pinned: false,
            fact_sources: Default::default(),
        }
    }

    fn item(poi_id: &str, travel: f64) -> ScheduleItem {
        ScheduleItem {
            poi_id: poi_id.to_string(),
            time_slot: TimeSlot::Morning,
            start_time: None,
            end_time: None,
            travel_minutes: travel,
            buffer_minutes: 0.0,
            notes: String::new(),
            is_backup: false,
            cluster: String::new(),
        }
    }

    fn two_day_itinerary() -> Itinerary {
        let mut arena = PoiArena::new();
        arena.insert(ticketed_poi("a", 60.0));
        arena.insert(ticketed_poi("b", 0.0));
        arena.insert(ticketed_poi("c", 40.0));

        let mut day1 = ItineraryDay::new(1, None);
        day1.items = vec![item("a", 0.0), item("b", 30.0)];
        let mut day2 = ItineraryDay::new(2, None);
        day2.items = vec![item("c", 0.0)];

        Itinerary {
            city: "Test".to_string(),
            days: vec![day1, day2],
            pois: arena,
            ..Default::default()
        }
    }

    #[test]
    fn test_budget_breakdown_components() {
        let mut itinerary = two_day_itinerary();
        let mut constraints = TripConstraints::new("Test", 2);
        constraints.travelers_count = Some(2);
        let profile = UserProfile::default();

        apply_budget(&mut itinerary, &constraints, &profile, 60.0);

        // Tickets: (60 + 0 + 40) * 2 travelers
        assert_eq!(itinerary.budget_breakdown.tickets, 200.0);
        // Transit: 30 min * 0.2 per minute * 2 travelers
        assert_eq!(itinerary.budget_breakdown.local_transport, 12.0);
        // Food: 2 days * 2 travelers * 60
        assert_eq!(itinerary.budget_breakdown.food_min, 240.0);
        assert_eq!(itinerary.total_cost, 452.0);
        assert_eq!(itinerary.total_cost, itinerary.budget_breakdown.total());
    }

    #[test]
    fn test_minimum_feasible_uses_cheapest_transport() {
        let mut itinerary = two_day_itinerary();
        let mut constraints = TripConstraints::new("Test", 2);
        constraints.transport_mode = TransportMode::Taxi;
        constraints.travelers_count = Some(1);
        let profile = UserProfile::default();

        apply_budget(&mut itinerary, &constraints, &profile, 60.0);

        // Taxi leg is per group: 30 * 1.5 = 45; transit floor: 30 * 0.2 = 6
        assert_eq!(itinerary.budget_breakdown.local_transport, 45.0);
        assert!(itinerary.minimum_feasible_budget < itinerary.total_cost);
    }

    #[test]
    fn test_budget_warning_when_infeasible() {
        let mut itinerary = two_day_itinerary();
        let mut constraints = TripConstraints::new("Test", 2);
        constraints.daily_budget = Some(100.0);
        constraints.travelers_count = Some(2);
        let profile = UserProfile::default();

        apply_budget(&mut itinerary, &constraints, &profile, 60.0);

        assert!(itinerary.minimum_feasible_budget > 200.0);
        let warning = itinerary.budget_warning.as_deref().unwrap();
        assert!(warning.contains("below the minimum feasible"));
    }

    #[test]
    fn test_no_warning_with_generous_budget() {
        let mut itinerary = two_day_itinerary();
        let mut constraints = TripConstraints::new("Test", 2);
        constraints.daily_budget = Some(1000.0);
        let profile = UserProfile::default();

        apply_budget(&mut itinerary, &constraints, &profile, 60.0);
        assert!(itinerary.budget_warning.is_none());
    }
}
