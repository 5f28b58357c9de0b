use log::{debug, warn};

use crate::engine::{DisplayTarget, LocationStart, RenderingEngine};
use crate::session::ReadySession;
use crate::toc::{normalize_locator, resolve_chapter_title};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadingPosition {
    pub normalized_locator: String,
    pub progress_percentage: f64,
}

/// Completion fraction to a displayable percentage with one decimal.
/// Anything non-finite counts as the start of the book.
pub fn percentage_from_fraction(fraction: f64) -> f64 {
    if !fraction.is_finite() {
        return 0.0;
    }
    (fraction.clamp(0.0, 1.0) * 1000.0).round() / 10.0
}

pub fn fraction_from_percentage(percentage: f64) -> f64 {
    if !percentage.is_finite() {
        return 0.0;
    }
    percentage.clamp(0.0, 100.0) / 100.0
}

pub fn round_percentage(percentage: f64) -> f64 {
    percentage_from_fraction(fraction_from_percentage(percentage))
}

pub fn apply_relocation<E: RenderingEngine>(
    engine: &E,
    ready: &mut ReadySession,
    start: &LocationStart,
) {
    let locator = normalize_locator(&start.href).to_string();
    ready.chapter_title = resolve_chapter_title(&locator, &ready.toc);
    ready.active_locator = locator.clone();
    ready.position.normalized_locator = locator;
    ready.last_start = Some(start.clone());

    if ready.locations_ready {
        update_percentage(engine, ready);
    }
}

/// Marks the location index as available and places the last known start on it.
pub fn apply_locations_ready<E: RenderingEngine>(engine: &E, ready: &mut ReadySession) {
    ready.locations_ready = true;
    update_percentage(engine, ready);
}

fn update_percentage<E: RenderingEngine>(engine: &E, ready: &mut ReadySession) {
    let Some(start) = &ready.last_start else {
        return;
    };
    let fraction = engine
        .percentage_from_cfi(ready.session.book, &start.cfi)
        .unwrap_or(f64::NAN);
    ready.position.progress_percentage = percentage_from_fraction(fraction);
}

/// Jumps to a slider percentage. Returns false when the index is not ready.
pub fn commit_percentage<E: RenderingEngine>(
    engine: &mut E,
    ready: &mut ReadySession,
    target: f64,
) -> bool {
    if !ready.locations_ready {
        debug!("Ignoring progress commit: no location index yet");
        return false;
    }

    let fraction = fraction_from_percentage(target);
    let Some(cfi) = engine.cfi_from_percentage(ready.session.book, fraction) else {
        warn!("Location index could not place {target}%");
        return false;
    };

    ready.position.progress_percentage = percentage_from_fraction(fraction);
    if let Err(e) = engine.display(ready.session.rendition, &DisplayTarget::Cfi(cfi)) {
        warn!("Failed to display position at {target}%: {e}");
    }
    true
}

/// Requests a jump to a chapter list entry, highlighting it right away.
pub fn activate_toc_entry<E: RenderingEngine>(
    engine: &mut E,
    ready: &mut ReadySession,
    index: usize,
) -> bool {
    let Some(entry) = ready.toc.get(index) else {
        debug!("Ignoring activation of missing TOC entry {index}");
        return false;
    };
    let target = entry.target_locator.clone();

    ready.active_locator = normalize_locator(&target).to_string();
    if let Err(e) = engine.display(ready.session.rendition, &DisplayTarget::Href(target)) {
        warn!("Failed to display TOC entry {index}: {e}");
    }
    true
}
