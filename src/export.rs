//! Itinerary export formatting

use std::fmt::Write;

use crate::domain::Itinerary;

/// Render a finished itinerary as Markdown
pub fn to_markdown(itinerary: &Itinerary) -> String {
    let mut out = String::new();

    let _ = writeln!(
        out,
        "# {} - {} day itinerary\n",
        itinerary.city,
        itinerary.days.len()
    );
    let _ = writeln!(
        out,
        "Estimated cost: {:.0} (tickets {:.0}, transport {:.0}, food {:.0}) · confidence {:.2} · {}\n",
        itinerary.total_cost,
        itinerary.budget_breakdown.tickets,
        itinerary.budget_breakdown.local_transport,
        itinerary.budget_breakdown.food_min,
        itinerary.confidence_score,
        itinerary.degrade_level
    );

    if let Some(warning) = &itinerary.budget_warning {
        let _ = writeln!(out, "> **Budget note:** {warning}\n");
    }

    for day in &itinerary.days {
        match day.date {
            Some(date) => {
                let _ = writeln!(out, "## Day {} ({date})\n", day.day_number);
            }
            None => {
                let _ = writeln!(out, "## Day {}\n", day.day_number);
            }
        }

        for item in &day.items {
            let name = itinerary
                .pois
                .get(&item.poi_id)
                .map(|p| p.name.as_str())
                .unwrap_or(item.poi_id.as_str());
            let times = match (item.start_time, item.end_time) {
                (Some(start), Some(end)) => format!("{start}-{end}"),
                _ => "-".to_string(),
            };
            let _ = writeln!(out, "- **{times}** {name} ({} min travel)", item.travel_minutes as i64);
        }

        if !day.backups.is_empty() {
            let backups: Vec<&str> = day
                .backups
                .iter()
                .filter_map(|b| itinerary.pois.get(&b.poi_id))
                .map(|p| p.name.as_str())
                .collect();
            if !backups.is_empty() {
                let _ = writeln!(out, "- _Backup: {}_", backups.join(", "));
            }
        }
        let _ = writeln!(out);
    }

    if !itinerary.assumptions.is_empty() {
        let _ = writeln!(out, "## Assumptions\n");
        for assumption in &itinerary.assumptions {
            let _ = writeln!(out, "- {assumption}");
        }
    }

    out
}
