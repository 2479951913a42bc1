//! Module instance: runtime state owned per provider.
//!
//! Aggregates the carousel tracker (C4) and partial-event store (C7) for
//! one provider, plus the enable/disable lifecycle grounded on
//! `original_source/src/epggrab/opentv.c`'s `_opentv_enable` /
//! `opentv_init` / `opentv_load`.

use crate::{
    carousel::CarouselTracker,
    external::CarouselSubscription,
    partial_event::PartialEventStore,
    provider::Provider,
};

/// The single capability flag every OpenTV module advertises (§6 "Module
/// identity"). Room is deliberately not left for more variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleCapability {
    OverTheAir,
}

/// Identity a module publishes to the host application once providers are
/// frozen (§10.5 "Module identity construction").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDescriptor {
    pub id: String,
    pub display_name: String,
    pub capability: ModuleCapability,
}

/// One provider's runtime grabbing state: carousel progress, in-flight
/// partial events, and whether its section filters are currently active.
#[derive(Debug)]
pub struct Module {
    pub id: String,
    pub display_name: String,
    pub capability: ModuleCapability,
    provider_id: String,
    enabled: bool,
    carousel_handle: Option<crate::external::CarouselHandle>,
    pub carousel: CarouselTracker,
    pub events: PartialEventStore,
}

impl Module {
    pub fn new(provider: &Provider) -> Self {
        Module {
            id: format!("opentv-{}", provider.id),
            display_name: format!("OpenTV: {}", provider.name),
            capability: ModuleCapability::OverTheAir,
            provider_id: provider.id.clone(),
            enabled: false,
            carousel_handle: None,
            carousel: CarouselTracker::new(provider.all_pids()),
            events: PartialEventStore::new(),
        }
    }

    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }

    pub fn descriptor(&self) -> ModuleDescriptor {
        ModuleDescriptor {
            id: self.id.clone(),
            display_name: self.display_name.clone(),
            capability: self.capability,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Toggle the module's subscription to its owning mux. Enabling
    /// re-registers the carousel filters; disabling tears them down while
    /// leaving the partial-event store untouched, so an in-flight
    /// revolution survives an enable/disable cycle (§5 "Cancellation").
    pub fn set_enabled(&mut self, enabled: bool, mux: u16, subs: &mut dyn CarouselSubscription) {
        if enabled == self.enabled {
            return;
        }
        if enabled {
            self.carousel_handle =
                subs.register(&self.id, mux, crate::carousel::MAX_PASS_DURATION.as_secs(), self.carousel.period().as_secs());
            log::info!("opentv: module {} enabled", self.id);
        } else {
            subs.unregister(&self.id, mux);
            self.carousel_handle = None;
            log::info!("opentv: module {} disabled", self.id);
        }
        self.enabled = enabled;
    }

    pub fn carousel_handle(&self) -> Option<crate::external::CarouselHandle> {
        self.carousel_handle
    }

    /// `opentv_load` is a stub in the source; kept as a documented no-op
    /// unless a persistence contract emerges (§9 Open Question, §10.5).
    pub fn load_persisted(&self) {}
}
