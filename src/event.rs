//! Event section decoder (C6).
//!
//! Parses title and summary MPEG private sections into the shared
//! partial-event store (C7), merging fields under first-writer-wins and
//! handing a record to C8 once both substreams have contributed. Grounded
//! on `original_source/src/epggrab/opentv.c`'s `_opentv_parse_event_section`
//! / `_opentv_parse_event` / `_opentv_parse_event_record`.

use crate::{
    huffman::HuffmanTree,
    partial_event::{EventKey, PartialEvent, PartialEventStore},
    provider::SectionRole,
};

const EVENT_SECTION_HEADER_LEN: usize = 7;
const EVENT_BLOCK_HEADER_LEN: usize = 4;
const TITLE_RECORD_MIN_LEN: usize = 5;
const TITLE_RECORD_PREFIX_LEN: usize = 7;

const TAG_TITLE: u8 = 0xB5;
const TAG_SUMMARY: u8 = 0xB9;
const TAG_DESCRIPTION: u8 = 0xBB;
const TAG_SERIES_LINK: u8 = 0xC1;

/// MJD day zero (17 Nov 1858) translated to the Unix epoch. `mjd = 40587`
/// is 1 Jan 1970 and maps to Unix time `0` (§8 "Round-trip / idempotence").
const MJD_UNIX_EPOCH_OFFSET: i64 = 40587;
const SECONDS_PER_DAY: i64 = 86400;
const HUFFMAN_STOP_BYTE: u8 = 0x20;

pub fn mjd_to_unix(mjd: u16) -> i64 {
    (mjd as i64 - MJD_UNIX_EPOCH_OFFSET) * SECONDS_PER_DAY
}

/// A single TLV record parsed into its tagged variant, before any merge
/// into the partial event takes place (§9 "Tag dispatch").
#[derive(Debug, Clone, PartialEq)]
enum FieldRecord {
    Title { start_offset: i64, duration_offset: i64, category: u8, huffman: Option<Vec<u8>> },
    Summary(Vec<u8>),
    Description(Vec<u8>),
    SeriesLink(u16),
    Unknown,
}

fn parse_record(tag: u8, body: &[u8]) -> FieldRecord {
    match tag {
        TAG_TITLE if body.len() >= TITLE_RECORD_MIN_LEN => {
            let start_offset = ((body[0] as i64) << 9) | ((body[1] as i64) << 1);
            let duration_offset = ((body[2] as i64) << 9) | ((body[3] as i64) << 1);
            let category = body[4];
            let huffman = (body.len() > TITLE_RECORD_PREFIX_LEN)
                .then(|| body[TITLE_RECORD_PREFIX_LEN..].to_vec());
            FieldRecord::Title { start_offset, duration_offset, category, huffman }
        }
        TAG_TITLE => {
            log::debug!("opentv: title record too short to carry start/stop/category");
            FieldRecord::Unknown
        }
        TAG_SUMMARY => FieldRecord::Summary(body.to_vec()),
        TAG_DESCRIPTION => FieldRecord::Description(body.to_vec()),
        TAG_SERIES_LINK if body.len() >= 2 => {
            FieldRecord::SeriesLink(u16::from_be_bytes([body[0], body[1]]))
        }
        other => {
            log::trace!("opentv: skipping event record tag {other:#x}");
            FieldRecord::Unknown
        }
    }
}

/// Walk the TLV records of one event block. Each record always advances
/// the cursor by `len + 2` (§8 invariant); a record whose declared length
/// runs past the buffer end truncates the loop rather than panicking.
fn parse_records(buf: &[u8]) -> Vec<FieldRecord> {
    let mut records = Vec::new();
    let mut j = 0;
    while j + 2 <= buf.len() {
        let tag = buf[j];
        let len = buf[j + 1] as usize;
        let rec_end = j + 2 + len;
        if rec_end > buf.len() {
            log::debug!("opentv: truncated TLV record tag {tag:#x}, dropping remainder");
            break;
        }
        records.push(parse_record(tag, &buf[j + 2..rec_end]));
        j = rec_end;
    }
    records
}

fn apply_record(event: &mut PartialEvent, record: FieldRecord, dict: &HuffmanTree, mjd_base: i64) {
    match record {
        FieldRecord::Title { start_offset, duration_offset, category, huffman } => {
            event.start = mjd_base + start_offset;
            event.stop = event.start + duration_offset;
            event.category = category;
            if let Some(bytes) = huffman {
                if let Some(text) = dict.decode(&bytes, 0, HUFFMAN_STOP_BYTE) {
                    event.set_title_if_absent(text);
                }
            }
        }
        FieldRecord::Summary(bytes) => {
            if let Some(text) = dict.decode(&bytes, 0, HUFFMAN_STOP_BYTE) {
                event.set_summary_if_absent(text);
            }
        }
        FieldRecord::Description(bytes) => {
            if let Some(text) = dict.decode(&bytes, 0, HUFFMAN_STOP_BYTE) {
                event.set_description_if_absent(text);
            }
        }
        FieldRecord::SeriesLink(id) => event.series_link = id,
        FieldRecord::Unknown => {}
    }
}

/// Decode one title or summary section, merging every event block it
/// carries into `store`. Returns the events that became complete (both
/// `TITLE` and `SUMMARY` bits set) as a result, already removed from the
/// store and ready to hand to the emitter (§4.6, §4.8).
pub fn decode_section(
    role: SectionRole,
    payload: &[u8],
    dict: &HuffmanTree,
    store: &mut PartialEventStore,
) -> Vec<(EventKey, PartialEvent)> {
    let mut completed = Vec::new();
    if payload.len() < EVENT_SECTION_HEADER_LEN {
        return completed;
    }

    let channel_id = u16::from_be_bytes([payload[0], payload[1]]);
    let mjd = u16::from_be_bytes([payload[5], payload[6]]);
    let mjd_base = mjd_to_unix(mjd);

    let mut i = EVENT_SECTION_HEADER_LEN;
    while i + EVENT_BLOCK_HEADER_LEN <= payload.len() {
        let event_id = u16::from_be_bytes([payload[i], payload[i + 1]]);
        let slen = (((payload[i + 2] & 0x0F) as usize) << 8) | payload[i + 3] as usize;
        let block_end = i + EVENT_BLOCK_HEADER_LEN + slen;
        if block_end > payload.len() {
            log::debug!("opentv: truncated event block for channel {channel_id}, stopping section");
            break;
        }

        let key: EventKey = (channel_id, event_id);
        let records = parse_records(&payload[i + EVENT_BLOCK_HEADER_LEN..block_end]);
        {
            let event = store.lookup_or_insert(key);
            for record in records {
                apply_record(event, record, dict, mjd_base);
            }
            match role {
                SectionRole::Title => event.status.title = true,
                SectionRole::Summary => event.status.summary = true,
                SectionRole::Channel => {}
            }
        }

        if store.lookup_or_insert(key).status.is_complete() {
            if let Some(done) = store.remove(key) {
                completed.push((key, done));
            }
        }

        i = block_end;
    }

    completed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::huffman::HuffmanTree;

    fn hello_dict() -> HuffmanTree {
        // 'H'=0 'e'=100 'l'=101 'o'=110 stop(' ')=111 -- enough to spell "Hello"
        HuffmanTree::build([
            ("0", b"H".as_slice()),
            ("100", b"e"),
            ("101", b"l"),
            ("110", b"o"),
            ("111", b" "),
        ])
        .unwrap()
    }

    fn huffman_bytes_for(bits: &str) -> Vec<u8> {
        let mut padded = bits.to_string();
        while padded.len() % 8 != 0 {
            padded.push('0');
        }
        padded
            .as_bytes()
            .chunks(8)
            .map(|chunk| {
                let s = std::str::from_utf8(chunk).unwrap();
                u8::from_str_radix(s, 2).unwrap()
            })
            .collect()
    }

    #[test]
    fn mjd_maps_zero_at_epoch() {
        assert_eq!(mjd_to_unix(40587), 0);
    }

    #[test]
    fn title_then_summary_join_matches_scenario_one() {
        let dict = hello_dict();
        let mut store = PartialEventStore::new();

        // "Hello" = H e l l o <stop> = 0 100 101 101 110 111
        let hello_bits = "0100101101110111";
        let hello_bytes = huffman_bytes_for(hello_bits);

        let mut title_record = vec![TAG_TITLE, 0];
        let mut title_body = vec![
            0x02, 0x00, // start_offset hi/lo -> (0x02<<9)|(0x00<<1) = 1024
            0x00, 0x80, // duration_offset -> (0<<9)|(0x80<<1) = 256
            0x10, // category
            0, 0, // skipped
        ];
        title_body.extend_from_slice(&hello_bytes);
        title_record[1] = title_body.len() as u8;
        title_record.extend_from_slice(&title_body);

        let mut title_section = vec![0x00, 0x42, 0, 0, 0];
        title_section.extend_from_slice(&59000u16.to_be_bytes());
        title_section.extend_from_slice(&0x1234u16.to_be_bytes()); // event_id
        let event_payload_len = title_record.len();
        title_section.push(((event_payload_len >> 8) & 0x0F) as u8);
        title_section.push((event_payload_len & 0xFF) as u8);
        title_section.extend_from_slice(&title_record);

        let completed = decode_section(SectionRole::Title, &title_section, &dict, &mut store);
        assert!(completed.is_empty());
        assert_eq!(store.len(), 1);

        // "World" isn't in our toy dictionary; reuse "Hello" bytes for the
        // summary tag to keep the test self-contained.
        let mut summary_record = vec![TAG_SUMMARY, hello_bytes.len() as u8];
        summary_record.extend_from_slice(&hello_bytes);

        let mut summary_section = vec![0x00, 0x42, 0, 0, 0];
        summary_section.extend_from_slice(&59000u16.to_be_bytes());
        summary_section.extend_from_slice(&0x1234u16.to_be_bytes());
        let summary_payload_len = summary_record.len();
        summary_section.push(((summary_payload_len >> 8) & 0x0F) as u8);
        summary_section.push((summary_payload_len & 0xFF) as u8);
        summary_section.extend_from_slice(&summary_record);

        let completed = decode_section(SectionRole::Summary, &summary_section, &dict, &mut store);
        assert_eq!(completed.len(), 1);
        assert!(store.is_empty());

        let (key, event) = &completed[0];
        assert_eq!(*key, (0x0042, 0x1234));
        assert_eq!(event.title.as_deref(), Some("Hello"));
        assert_eq!(event.summary.as_deref(), Some("Hello"));
        assert_eq!(event.category, 0x10);
        let expected_start = mjd_to_unix(59000) + 1024;
        assert_eq!(event.start, expected_start);
        assert_eq!(event.stop, expected_start + 256);
    }

    #[test]
    fn feeding_the_same_title_section_twice_does_not_overwrite() {
        let dict = hello_dict();
        let mut store = PartialEventStore::new();

        let hello_bytes = huffman_bytes_for("0100101101110111");
        let mut title_record = vec![TAG_TITLE, 0];
        let mut title_body = vec![0, 0, 0, 0, 0x01, 0, 0];
        title_body.extend_from_slice(&hello_bytes);
        title_record[1] = title_body.len() as u8;
        title_record.extend_from_slice(&title_body);

        let mut section = vec![0x00, 0x01, 0, 0, 0];
        section.extend_from_slice(&59000u16.to_be_bytes());
        section.extend_from_slice(&1u16.to_be_bytes());
        let plen = title_record.len();
        section.push(((plen >> 8) & 0x0F) as u8);
        section.push((plen & 0xFF) as u8);
        section.extend_from_slice(&title_record);

        decode_section(SectionRole::Title, &section, &dict, &mut store);
        decode_section(SectionRole::Title, &section, &dict, &mut store);

        assert_eq!(store.len(), 1);
        let event = store.lookup_or_insert((0x0001, 1));
        assert_eq!(event.title.as_deref(), Some("Hello"));
    }

    #[test]
    fn short_section_below_header_length_is_ignored() {
        let dict = hello_dict();
        let mut store = PartialEventStore::new();
        let completed = decode_section(SectionRole::Title, &[0u8; 6], &dict, &mut store);
        assert!(completed.is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn truncated_event_block_stops_without_panicking() {
        let dict = hello_dict();
        let mut store = PartialEventStore::new();
        let mut section = vec![0x00, 0x01, 0, 0, 0];
        section.extend_from_slice(&59000u16.to_be_bytes());
        section.extend_from_slice(&1u16.to_be_bytes());
        // Declare a payload length far larger than what follows.
        section.push(0x0F);
        section.push(0xFF);
        let completed = decode_section(SectionRole::Title, &section, &dict, &mut store);
        assert!(completed.is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn title_record_shorter_than_seven_sets_fields_but_not_title() {
        let dict = hello_dict();
        let mut store = PartialEventStore::new();
        // Record body has exactly 5 bytes: enough for start/stop/category,
        // no huffman payload (§8 boundary behaviour).
        let body = vec![0x00, 0x00, 0x00, 0x00, 0x22];
        let mut title_record = vec![TAG_TITLE, body.len() as u8];
        title_record.extend_from_slice(&body);

        let mut section = vec![0x00, 0x01, 0, 0, 0];
        section.extend_from_slice(&59000u16.to_be_bytes());
        section.extend_from_slice(&1u16.to_be_bytes());
        let plen = title_record.len();
        section.push(((plen >> 8) & 0x0F) as u8);
        section.push((plen & 0xFF) as u8);
        section.extend_from_slice(&title_record);

        decode_section(SectionRole::Title, &section, &dict, &mut store);
        let event = store.lookup_or_insert((0x0001, 1));
        assert_eq!(event.category, 0x22);
        assert!(event.title.is_none());
    }
}
