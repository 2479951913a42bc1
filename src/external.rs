//! External collaborator interfaces (§6).
//!
//! The DVB tuner/demux, the service manager, and the EPG store all live
//! outside this crate's scope (§1 "Out of scope"). This module defines
//! only the narrow traits the core consumes from them, so the decoders in
//! `bat.rs`, `emitter.rs` and `module.rs` can be exercised against fakes in
//! tests without a real receiver.

/// A broadcast channel as known to the service manager (§6 "Service
/// lookup").
pub trait Channel {
    fn name(&self) -> &str;
}

/// A broadcast service as known to the service manager.
pub trait Service {
    fn channel(&self) -> Option<&dyn Channel>;
}

/// `find_service(tsid, sid) -> service | nil` (§6).
pub trait ServiceLookup {
    fn find_service(&self, tsid: u16, sid: u16) -> Option<Box<dyn Service>>;
}

/// Opaque handle to a carousel subscription, returned by `register`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CarouselHandle(pub u64);

/// The carousel subscription layer (§6 "Carousel subscription (consumed)").
pub trait CarouselSubscription {
    fn register(
        &mut self,
        module: &str,
        mux: u16,
        max_seconds: u64,
        period_seconds: u64,
    ) -> Option<CarouselHandle>;
    fn is_complete(&self, handle: CarouselHandle) -> bool;
    fn begin(&mut self, handle: CarouselHandle) -> bool;
    fn complete(&mut self, handle: CarouselHandle);
    fn unregister(&mut self, module: &str, mux: u16);
}

/// The external EPG store (§6 "EPG store (consumed)"). Every method here
/// mirrors one named call in the spec; the core holds only the opaque
/// string URIs the store hands back (§3 "the core holds only opaque
/// references").
pub trait EpgStore {
    /// `epggrab_channel_find(module, chid, create, &changed) -> epg_channel`.
    fn epggrab_channel_find(&mut self, module: &str, chid: &str, create: bool) -> (String, bool);

    /// Look up an already-created EPG channel without creating it.
    fn find_channel(&self, chid: &str) -> Option<String>;

    /// Bind the service-manager's broadcast channel onto an EPG channel,
    /// as the BAT decoder does once a service lookup succeeds (§4.5).
    fn bind_channel(&mut self, chid: &str, channel: &dyn Channel);

    /// The name of the broadcast channel bound to `chid`, if any. `None`
    /// means unresolved or unbound; `Some("")` means bound to an unnamed
    /// channel — both cases cause the emitter to discard (§4.8).
    fn channel_broadcast_name(&self, chid: &str) -> Option<String>;

    /// `epg_hash(title, summary, desc) -> uri | nil`.
    fn epg_hash(
        &self,
        title: Option<&str>,
        summary: Option<&str>,
        description: Option<&str>,
    ) -> Option<String>;

    fn epg_episode_find_by_uri(&mut self, uri: &str, create: bool) -> (String, bool);
    fn epg_episode_set_title(&mut self, episode: &str, title: &str) -> bool;
    fn epg_episode_set_summary(&mut self, episode: &str, summary: &str) -> bool;
    fn epg_episode_set_description(&mut self, episode: &str, description: &str) -> bool;
    fn epg_episode_set_genre(&mut self, episode: &str, genre: u8) -> bool;
    fn epg_episode_has_season(&self, episode: &str) -> bool;
    fn epg_episode_set_season(&mut self, episode: &str, season: &str) -> bool;

    fn epg_season_find_by_uri(&mut self, uri: &str, create: bool) -> (String, bool);

    fn epg_broadcast_find_by_time(
        &mut self,
        chid: &str,
        start: i64,
        stop: i64,
        event_id: u16,
        create: bool,
    ) -> (String, bool);
    fn epg_broadcast_set_episode(&mut self, broadcast: &str, episode: &str) -> bool;

    fn epg_updated(&mut self);
}
