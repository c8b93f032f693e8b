use crate::score::{Bar, Score};

const CANONICAL_TICKS: [i64; 16] = [
    192, 144, 96, 72, 48, 36, 32, 24, 18, 16, 12, 9, 8, 6, 4, 3,
];
const SNAP_TOLERANCE: i64 = 6;
const SMALLEST_CANONICAL: i64 = 3;

/// Snaps one raw tick duration to the nearest canonical value not exceeding
/// `cap`, falling back to a clamped raw value outside tolerance.
fn snap_value(raw: i64, cap: i64) -> i64 {
    if raw <= 0 {
        return SMALLEST_CANONICAL;
    }
    let cap = cap.max(SMALLEST_CANONICAL);
    let best = CANONICAL_TICKS
        .iter()
        .copied()
        .filter(|&c| c <= cap)
        .min_by_key(|&c| (raw - c).abs());
    match best {
        Some(c) if (raw - c).abs() <= SNAP_TOLERANCE => c,
        _ => raw.clamp(SMALLEST_CANONICAL, cap),
    }
}

/// Quantizes every chord's `duration_ticks` in a bar to a canonical value,
/// then clamps the final chord so the bar's total never exceeds its
/// `duration_ticks()`.
pub fn snap_bar(bar: &mut Bar) {
    let cap = bar.duration_ticks();
    for chord in &mut bar.chords {
        chord.duration_ticks = snap_value(chord.duration_ticks, cap);
    }

    let Some((last, rest)) = bar.chords.split_last_mut() else {
        return;
    };
    let used: i64 = rest.iter().map(|c| c.duration_ticks).sum();
    if used < cap && last.duration_ticks > cap - used {
        last.duration_ticks = cap - used;
    } else if used >= cap {
        last.duration_ticks = SMALLEST_CANONICAL;
    }
}

/// Applies [`snap_bar`] to every bar of every track in a score, in place.
pub fn snap_score(score: &mut Score) {
    for track in &mut score.tracks {
        for bar in &mut track.bars {
            snap_bar(bar);
        }
    }
}
