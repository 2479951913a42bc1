//! EPG emitter (C8).
//!
//! Takes a completed partial event (both `TITLE` and `SUMMARY` bits set)
//! and upserts it into the external EPG store, per §4.8. Grounded on the
//! back half of `original_source/src/epggrab/opentv.c`'s
//! `_opentv_parse_event_section`, from the `uri = epg_hash(...)` line
//! onward.

use crate::{external::EpgStore, partial_event::PartialEvent};

/// Resolve and upsert one completed event. Discards silently (no EPG
/// calls at all) if the channel is unresolved, unnamed, or there's no
/// content to hash — matching §4.8 and scenario 4 in §8.
pub fn emit_completed_event(
    provider_id: &str,
    channel_id: u16,
    event_id: u16,
    event: &PartialEvent,
    epg: &mut dyn EpgStore,
) {
    let chid = format!("{provider_id}-{channel_id}");

    let Some(channel) = epg.find_channel(&chid) else {
        log::debug!("opentv: discarding event {event_id} on {chid}: channel unresolved");
        return;
    };
    match epg.channel_broadcast_name(&chid) {
        Some(name) if !name.is_empty() => {}
        _ => {
            log::debug!("opentv: discarding event {event_id} on {chid}: unnamed channel");
            return;
        }
    }

    let Some(episode_uri) = epg.epg_hash(
        event.title.as_deref(),
        event.summary.as_deref(),
        event.description.as_deref(),
    ) else {
        log::debug!("opentv: discarding event {event_id} on {chid}: nothing to hash");
        return;
    };

    let mut changed = false;
    let (episode, _created) = epg.epg_episode_find_by_uri(&episode_uri, true);

    if let Some(title) = &event.title {
        changed |= epg.epg_episode_set_title(&episode, title);
    }
    if let Some(summary) = &event.summary {
        changed |= epg.epg_episode_set_summary(&episode, summary);
    }
    if let Some(description) = &event.description {
        changed |= epg.epg_episode_set_description(&episode, description);
    }
    if event.category != 0 {
        changed |= epg.epg_episode_set_genre(&episode, event.category);
    }
    // Season binding is conditional on absence: channel-scoped series-link
    // ids differ across bouquets and must not thrash the assignment.
    if event.series_link != 0 && !epg.epg_episode_has_season(&episode) {
        let season_uri = format!("{provider_id}-{channel_id}-{}", event.series_link);
        let (season, _created) = epg.epg_season_find_by_uri(&season_uri, true);
        changed |= epg.epg_episode_set_season(&episode, &season);
    }

    let (broadcast, _created) =
        epg.epg_broadcast_find_by_time(&channel, event.start, event.stop, event_id, true);
    changed |= epg.epg_broadcast_set_episode(&broadcast, &episode);

    if changed {
        epg.epg_updated();
    }
}
