//! BAT (Bouquet Association) decoder (C5).
//!
//! Parses the Bouquet Association Table body per §4.5, grounded on
//! `original_source/src/epggrab/opentv.c`'s `_opentv_bat_section`. Only
//! descriptor tag `0xB1` is understood; whether `0xB2` should also be
//! handled is the Open Question named in §9 and is left unhandled here.

use crate::external::{EpgStore, ServiceLookup};

const CHANNEL_MAPPING_DESCRIPTOR_TAG: u8 = 0xB1;
/// Each channel-mapping record inside a `0xB1` descriptor is 9 bytes:
/// `u16 service_id, u8 ?, u16 channel_id, u16 channel_number, 2 bytes ?`.
const CHANNEL_MAPPING_RECORD_LEN: usize = 9;

/// A single `(tsid, service_id) -> channel_id` binding extracted from a
/// BAT's transport-stream descriptor loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelBinding {
    pub tsid: u16,
    pub service_id: u16,
    pub channel_id: u16,
}

/// Walk the BAT body and extract every channel-mapping record from every
/// `0xB1` descriptor in every transport-stream loop entry.
pub fn parse_bindings(payload: &[u8]) -> Vec<ChannelBinding> {
    let mut bindings = Vec::new();
    if payload.len() < 7 {
        return bindings;
    }

    let bouquet_desc_len = (((payload[5] & 0x0F) as usize) << 8) | payload[6] as usize;
    let mut offset = 7 + bouquet_desc_len;
    if offset + 2 > payload.len() {
        return bindings;
    }

    let mut ts_loop_len = (((payload[offset] & 0x0F) as usize) << 8) | payload[offset + 1] as usize;
    offset += 2;

    while ts_loop_len > 0 && offset + 6 <= payload.len() {
        let tsid = u16::from_be_bytes([payload[offset], payload[offset + 1]]);
        // NID at offset+2..=3 is not used by this decoder.
        let td_len = (((payload[offset + 4] & 0x0F) as usize) << 8) | payload[offset + 5] as usize;
        let desc_start = offset + 6;
        offset += 6 + td_len;
        if ts_loop_len < 6 + td_len {
            break;
        }
        ts_loop_len -= 6 + td_len;

        if desc_start + td_len > payload.len() {
            break;
        }
        parse_descriptor_loop(&payload[desc_start..desc_start + td_len], tsid, &mut bindings);
    }

    bindings
}

fn parse_descriptor_loop(buf: &[u8], tsid: u16, bindings: &mut Vec<ChannelBinding>) {
    let mut j = 0;
    while j + 2 <= buf.len() {
        let tag = buf[j];
        let len = buf[j + 1] as usize;
        let body_start = j + 2;
        if body_start + len > buf.len() {
            break;
        }
        if tag == CHANNEL_MAPPING_DESCRIPTOR_TAG {
            parse_channel_mapping(&buf[body_start..body_start + len], tsid, bindings);
        } else {
            log::trace!("opentv: skipping BAT descriptor tag {tag:#x}");
        }
        j = body_start + len;
    }
}

fn parse_channel_mapping(buf: &[u8], tsid: u16, bindings: &mut Vec<ChannelBinding>) {
    if buf.len() < 2 {
        return;
    }
    let mut k = 2;
    while k + CHANNEL_MAPPING_RECORD_LEN <= buf.len() {
        let service_id = u16::from_be_bytes([buf[k], buf[k + 1]]);
        let channel_id = u16::from_be_bytes([buf[k + 3], buf[k + 4]]);
        bindings.push(ChannelBinding { tsid, service_id, channel_id });
        k += CHANNEL_MAPPING_RECORD_LEN;
    }
}

/// Resolve each binding against the service-manager collaborator and bind
/// the discovered channel into the EPG store, per §4.5. Bindings are
/// resolved across every TSID the BAT names, not just the provider's own
/// mux — the BAT's transport-stream loop routinely covers other muxes in
/// the same bouquet.
pub fn apply_bindings(
    provider_id: &str,
    module_id: &str,
    bindings: &[ChannelBinding],
    services: &dyn ServiceLookup,
    epg: &mut dyn EpgStore,
) {
    for binding in bindings {
        let Some(service) = services.find_service(binding.tsid, binding.service_id) else {
            continue;
        };
        let Some(channel) = service.channel() else {
            continue;
        };
        if channel.name().is_empty() {
            continue;
        }

        let chid = format!("{provider_id}-{}", binding.channel_id);
        let (_epg_channel, created) = epg.epggrab_channel_find(module_id, &chid, true);
        if created {
            epg.bind_channel(&chid, channel);
        }
    }
}
