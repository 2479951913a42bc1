//! # `opentv-epg`
//! An OpenTV Electronic Program Guide grabber for DVB transport streams.
//!
//! OpenTV providers carry their EPG as a proprietary, Huffman-compressed
//! data carousel spread across several MPEG private-section PIDs. This
//! crate turns that carousel into upserts against an external EPG store:
//! it decodes the provider-specific Huffman dictionaries ([`huffman`]),
//! tracks each provider's configuration ([`provider`]), routes incoming
//! sections by PID/table-id ([`section`]), detects a full carousel
//! revolution ([`carousel`]), resolves channel bindings from the Bouquet
//! Association Table ([`bat`]), joins the asynchronous title/summary
//! substreams into complete event records ([`event`], [`partial_event`]),
//! and finally emits them ([`emitter`]).
//!
//! The DVB tuner/demux layer, the service manager, and the EPG store
//! itself live outside this crate; [`external`] defines the narrow trait
//! boundary this crate consumes from them. [`registry`] ties every piece
//! together into one [`registry::Grabber`] per configuration directory,
//! and [`module`] holds the per-provider runtime state that crosses an
//! enable/disable cycle.

pub mod bat;
pub mod carousel;
pub mod config;
pub mod emitter;
pub mod error;
pub mod event;
pub mod external;
pub mod huffman;
pub mod module;
pub mod partial_event;
pub mod provider;
pub mod registry;
pub mod section;
