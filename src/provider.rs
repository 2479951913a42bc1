//! Provider registry (C2): per-broadcaster configuration.

use std::collections::BTreeMap;

use crate::{
    config::{RecordFields, read_record_dir},
    error::ConfigError,
    huffman::{DictionaryRegistry, HuffmanTree},
};

/// Packet identifier, as carried by the provider's three ordered PID sets.
pub type Pid = u16;

/// Immutable per-broadcaster configuration (§3 "Provider").
#[derive(Debug, Clone)]
pub struct Provider {
    pub id: String,
    pub name: String,
    pub dict_id: String,
    pub nid: u16,
    pub tsid: u16,
    pub sid: u16,
    pub channel_pids: Vec<Pid>,
    pub title_pids: Vec<Pid>,
    pub summary_pids: Vec<Pid>,
}

impl Provider {
    fn from_fields(id: &str, fields: &RecordFields) -> Result<Provider, ConfigError> {
        let name = fields.get("name")?.to_string();
        let dict_id = fields.get("dict")?.to_string();
        let nid = fields.get_u16("nid")?;
        let tsid = fields.get_u16("tsid")?;
        let sid = fields.get_u16("sid")?;
        let channel_pids = fields.get_pid_list("channel")?;
        let title_pids = fields.get_pid_list("title")?;
        let summary_pids = fields.get_pid_list("summary")?;
        Ok(Provider {
            id: id.to_string(),
            name,
            dict_id,
            nid,
            tsid,
            sid,
            channel_pids,
            title_pids,
            summary_pids,
        })
    }

    /// Whether `pid` is a member of exactly one of the three role sets
    /// (invariant 2: the three sets are disjoint within a module).
    pub fn role_of(&self, pid: Pid) -> Option<SectionRole> {
        if self.channel_pids.contains(&pid) {
            Some(SectionRole::Channel)
        } else if self.title_pids.contains(&pid) {
            Some(SectionRole::Title)
        } else if self.summary_pids.contains(&pid) {
            Some(SectionRole::Summary)
        } else {
            None
        }
    }

    /// Every PID this provider subscribes to, across all three roles —
    /// the set C4 must see reach `COMPLETE` for a full revolution.
    pub fn all_pids(&self) -> Vec<Pid> {
        let mut pids = Vec::with_capacity(
            self.channel_pids.len() + self.title_pids.len() + self.summary_pids.len(),
        );
        pids.extend(&self.channel_pids);
        pids.extend(&self.title_pids);
        pids.extend(&self.summary_pids);
        pids
    }
}

/// Which of a provider's three PID roles a PID belongs to (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionRole {
    Channel,
    Title,
    Summary,
}

/// Frozen-after-load collection of providers (§4.2).
#[derive(Debug, Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, Provider>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and insert one provider record. Returns `Ok(false)` (not an
    /// error) for a duplicate id, consistent with §7c: duplicates are
    /// logged and skipped, not fatal.
    pub fn insert(
        &mut self,
        id: &str,
        fields: &RecordFields,
        dicts: &DictionaryRegistry,
    ) -> Result<bool, ConfigError> {
        if self.providers.contains_key(id) {
            log::warn!("opentv: ignore duplicate provider {id}");
            return Ok(false);
        }
        let provider = Provider::from_fields(id, fields)?;
        if dicts.get(&provider.dict_id).is_none() {
            return Err(ConfigError::UnknownDictionary(provider.dict_id.clone()));
        }
        log::info!("opentv: provider {id} loaded");
        self.providers.insert(id.to_string(), provider);
        Ok(true)
    }

    pub fn get(&self, id: &str) -> Option<&Provider> {
        self.providers.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Provider> {
        self.providers.values()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

/// Load `epggrab/opentv/dict` into a [`DictionaryRegistry`]. Per-record
/// failures (bad hex, code collisions) are logged and the record is
/// skipped; the whole directory is never rejected for one bad file (§7c).
pub fn load_dictionaries(dir: &std::path::Path) -> Result<DictionaryRegistry, ConfigError> {
    let mut registry = DictionaryRegistry::new();
    for (id, contents) in read_record_dir(dir)? {
        let entries = match crate::config::parse_dict_file(&contents) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("opentv: dictionary {id} failed to load: {e}");
                continue;
            }
        };
        let refs: Vec<(&str, &[u8])> =
            entries.iter().map(|(c, b)| (c.as_str(), b.as_slice())).collect();
        match HuffmanTree::build(refs) {
            Ok(tree) => {
                registry.insert(id, tree);
            }
            Err(e) => log::warn!("opentv: dictionary {id} failed to build: {e}"),
        }
    }
    Ok(registry)
}

/// Load `epggrab/opentv/prov` into a [`ProviderRegistry`], given an
/// already-loaded dictionary registry to validate `dict` references
/// against.
pub fn load_providers(
    dir: &std::path::Path,
    dicts: &DictionaryRegistry,
) -> Result<ProviderRegistry, ConfigError> {
    let mut registry = ProviderRegistry::new();
    for (id, contents) in read_record_dir(dir)? {
        let fields = RecordFields::parse(&contents);
        match registry.insert(&id, &fields, dicts) {
            Ok(true) => {}
            Ok(false) => {}
            Err(e) => log::warn!("opentv: provider {id} failed to load: {e}"),
        }
    }
    Ok(registry)
}
