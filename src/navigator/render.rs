use std::fmt::Write as _;

use crate::origin::{FeedStats, LabelState};

use super::backfill::BackfillProgress;
use super::cursor::ActiveItem;
use super::keymap::DESTINATION_KEYS;

/// Plain-text card for the active item, written to stdout after every action.
pub fn item_card(active: &ActiveItem) -> String {
    let item = &active.item;
    let view = &active.view;
    let mut out = String::new();

    let state = match item.label_state {
        LabelState::Unlabeled => "unlabeled",
        LabelState::Labeled => "labeled",
        LabelState::Skipped => "skipped",
    };
    let _ = writeln!(out, "── {} [{}] ──", item.external_id, state);
    if let Some(caption) = item.caption.as_deref().filter(|c| !c.is_empty()) {
        let _ = writeln!(out, "{caption}");
    }
    if let Some(location) = item.location.as_deref() {
        let _ = writeln!(out, "at {location}");
    }
    if let Some(taken) = item.taken_at {
        let _ = writeln!(out, "taken {}", taken.format("%Y-%m-%d %H:%M"));
    }
    if !item.media.is_empty() {
        let media = &item.media[view.media_index.min(item.media.len() - 1)];
        let _ = writeln!(
            out,
            "media {}/{} ({}){}",
            view.media_index + 1,
            item.media.len(),
            media.media_type.as_deref().unwrap_or("unknown"),
            if item.cover_media_id == Some(media.id) { " cover" } else { "" },
        );
    }

    for (i, trip) in item.trip_suggestions.iter().take(9).enumerate() {
        let mark = if view.trip_id == Some(trip.trip_id) { '*' } else { ' ' };
        let _ = writeln!(out, " {mark}{} {}", i + 1, trip.name);
    }
    for (key, dest) in DESTINATION_KEYS.iter().zip(active.destination_options()) {
        let mark = if view.destination_id == Some(dest.id) { '*' } else { ' ' };
        let _ = writeln!(out, "   {mark}{key} {}", dest.name);
    }

    let flags = [(view.is_aerial, "aerial"), (view.is_cover, "cover")]
        .iter()
        .filter(|(on, _)| *on)
        .map(|(_, name)| *name)
        .collect::<Vec<_>>();
    if !flags.is_empty() {
        let _ = writeln!(out, "flags: {}", flags.join(", "));
    }
    let _ = write!(
        out,
        "prev: {}  next: {}",
        active.edge.prev_id.as_deref().unwrap_or("-"),
        active.edge.next_id.as_deref().unwrap_or("-"),
    );
    out
}

pub fn stats_line(stats: Option<&FeedStats>, quota_limited: bool, backfill: Option<&BackfillProgress>) -> String {
    let mut parts = Vec::new();
    match stats {
        Some(s) => parts.push(format!(
            "{} total · {} labeled · {} skipped · {} left",
            s.total, s.labeled, s.skipped, s.unlabeled
        )),
        None => parts.push("stats unavailable".to_string()),
    }
    if quota_limited {
        parts.push("quota hit, press i to retry".to_string());
    }
    if let Some(p) = backfill {
        parts.push(format!("backfill p{} checked {} found {}", p.page, p.checked, p.fetched));
    }
    parts.join(" | ")
}
