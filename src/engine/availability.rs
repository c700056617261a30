use crate::model::*;

/// Free sub-ranges of `window` on a court: the window minus every active
/// booking, clamped to the window.
pub fn free_slots(court: &CourtState, window: &Span) -> Vec<Span> {
    let taken: Vec<Span> = court
        .active_overlapping(window)
        .map(|b| b.span)
        .collect();
    // bookings are already sorted by start
    subtract_intervals(&[*window], &merge_overlapping(&taken))
}

/// A court is available for a window when no active booking overlaps it.
pub fn is_available(court: &CourtState, window: &Span) -> bool {
    court.active_overlapping(window).next().is_none()
}

/// Merge sorted overlapping/adjacent intervals into disjoint intervals.
pub fn merge_overlapping(sorted: &[Span]) -> Vec<Span> {
    let mut merged: Vec<Span> = Vec::with_capacity(sorted.len());
    for &span in sorted {
        match merged.last_mut() {
            Some(last) if span.start <= last.end => last.end = last.end.max(span.end),
            _ => merged.push(span),
        }
    }
    merged
}

/// Subtract sorted, disjoint `to_remove` spans from sorted, disjoint `base`.
pub fn subtract_intervals(base: &[Span], to_remove: &[Span]) -> Vec<Span> {
    let mut result = Vec::new();
    let mut first = 0;

    for &b in base {
        let mut cursor = b.start;

        while first < to_remove.len() && to_remove[first].end <= cursor {
            first += 1;
        }

        for r in to_remove[first..].iter().take_while(|r| r.start < b.end) {
            if r.start > cursor {
                result.push(Span::new(cursor, r.start));
            }
            cursor = cursor.max(r.end);
        }

        if cursor < b.end {
            result.push(Span::new(cursor, b.end));
        }
    }

    result
}
