//! Section input type and router (C3).
//!
//! Sections arrive tagged with `(pid, table_id)` from the demux layer
//! (out of scope, §1) and are dispatched to the BAT or event decoder based
//! on which of a provider's three PID sets the PID belongs to.

use crate::provider::{Pid, Provider, SectionRole};

/// Minimum section length accepted for parsing; anything shorter is
/// dropped without any state change (§4.3, §8 boundary behaviour).
pub const MIN_SECTION_LEN: usize = 20;

pub const BAT_TABLE_ID: u8 = 0x4A;
/// High six bits of a title-class table id.
const TITLE_TABLE_ID_MASK: u8 = 0xFC;
const TITLE_TABLE_ID_BASE: u8 = 0xA0;
const SUMMARY_TABLE_ID_BASE: u8 = 0xA8;

/// A raw MPEG private section as delivered by the demux (§6 "Section input").
#[derive(Debug, Clone)]
pub struct Section<'a> {
    pub pid: Pid,
    pub table_id: u8,
    pub payload: &'a [u8],
}

impl<'a> Section<'a> {
    pub fn new(pid: Pid, table_id: u8, payload: &'a [u8]) -> Self {
        Section { pid, table_id, payload }
    }

    fn is_title_class(&self) -> bool {
        self.table_id & TITLE_TABLE_ID_MASK == TITLE_TABLE_ID_BASE
    }

    fn is_summary_class(&self) -> bool {
        self.table_id & TITLE_TABLE_ID_MASK == SUMMARY_TABLE_ID_BASE
    }
}

/// The decoder a routed section should be handed to, decided purely from
/// `(pid, table_id)` membership in the active provider (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteTarget {
    Bat,
    Event(SectionRole),
}

/// Route `section` against `provider`'s PID sets. Returns `None` if the
/// section is too short, or if the PID/table-id combination doesn't match
/// any recognised role.
pub fn route(provider: &Provider, section: &Section<'_>) -> Option<RouteTarget> {
    if section.payload.len() < MIN_SECTION_LEN {
        log::debug!(
            "opentv: dropping section on pid {} (len {} < {})",
            section.pid,
            section.payload.len(),
            MIN_SECTION_LEN
        );
        return None;
    }

    match provider.role_of(section.pid) {
        Some(SectionRole::Channel) if section.table_id == BAT_TABLE_ID => Some(RouteTarget::Bat),
        Some(SectionRole::Title) if section.is_title_class() => {
            Some(RouteTarget::Event(SectionRole::Title))
        }
        Some(SectionRole::Summary) if section.is_summary_class() => {
            Some(RouteTarget::Event(SectionRole::Summary))
        }
        _ => {
            log::trace!(
                "opentv: no route for pid {} table_id {:#x}",
                section.pid,
                section.table_id
            );
            None
        }
    }
}
