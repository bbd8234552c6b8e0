//! Splitting a unit in two at an activity boundary

use super::Activity;

/// How a unit's activities and hours divide between the source and the new unit
#[derive(Debug, Clone, PartialEq)]
pub struct SplitPlan {
    pub kept: Vec<Activity>,
    pub moved: Vec<Activity>,
    pub kept_hours: f64,
    pub moved_hours: f64,
}

/// Partition `activities` after position `split_after` (zero-based).
///
/// Activities at positions `> split_after` move to the new unit. Hours are
/// divided in proportion to activity minutes, or to activity count when no
/// activity has a duration. Both halves must be non-empty.
pub fn plan(activities: &[Activity], hours: f64, split_after: usize) -> Result<SplitPlan, String> {
    if activities.len() < 2 {
        return Err("A unit needs at least two activities to be split".to_string());
    }
    if split_after >= activities.len() - 1 {
        return Err(format!(
            "split_after_order_index must be between 0 and {}",
            activities.len() - 2
        ));
    }

    let (kept, moved) = activities.split_at(split_after + 1);

    let minutes = |items: &[Activity]| items.iter().map(|a| a.duration_minutes as f64).sum::<f64>();
    let total_minutes = minutes(activities);

    let moved_share = if total_minutes > 0.0 {
        minutes(moved) / total_minutes
    } else {
        moved.len() as f64 / activities.len() as f64
    };

    let moved_hours = round_hours(hours * moved_share).min(hours);
    let kept_hours = hours - moved_hours;

    Ok(SplitPlan {
        kept: kept.to_vec(),
        moved: moved.to_vec(),
        kept_hours,
        moved_hours,
    })
}

// Only the moved half is rounded; the kept half takes the remainder
fn round_hours(h: f64) -> f64 {
    (h * 4.0).round() / 4.0
}
