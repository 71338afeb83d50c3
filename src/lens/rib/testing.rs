//! In-memory fakes of the pipeline's collaborators, counting every call

use crate::database::{DocumentStore, NameCache, PathDocument};
use crate::lens::rib::{AddressFamily, RegistryLookup};
use crate::speaker::{apipb, AttributeEnvelope, BgpSpeaker, RawPath};
use anyhow::{anyhow, Result};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::time::Duration;

#[derive(Default)]
struct CacheState {
    values: HashMap<String, String>,
    gets: usize,
    sets: usize,
    last_ttl: Option<Duration>,
    failing: bool,
}

/// Shared name cache fake; clones share state
#[derive(Clone, Default)]
pub struct FakeCache(Rc<RefCell<CacheState>>);

impl FakeCache {
    pub fn failing() -> Self {
        let cache = Self::default();
        cache.0.borrow_mut().failing = true;
        cache
    }

    pub fn insert(&self, key: &str, value: &str) {
        self.0
            .borrow_mut()
            .values
            .insert(key.to_string(), value.to_string());
    }

    pub fn value(&self, key: &str) -> Option<String> {
        self.0.borrow().values.get(key).cloned()
    }

    pub fn gets(&self) -> usize {
        self.0.borrow().gets
    }

    pub fn sets(&self) -> usize {
        self.0.borrow().sets
    }

    pub fn last_ttl(&self) -> Option<Duration> {
        self.0.borrow().last_ttl
    }
}

impl NameCache for FakeCache {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let mut state = self.0.borrow_mut();
        state.gets += 1;
        if state.failing {
            return Err(anyhow!("cache unavailable"));
        }
        Ok(state.values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut state = self.0.borrow_mut();
        state.sets += 1;
        if state.failing {
            return Err(anyhow!("cache unavailable"));
        }
        state.last_ttl = Some(ttl);
        state.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Registry fake answering from a fixed table
#[derive(Clone, Default)]
pub struct FakeRegistry {
    names: Rc<HashMap<u32, String>>,
    calls: Rc<RefCell<usize>>,
}

impl FakeRegistry {
    pub fn with_names(names: &[(u32, &str)]) -> Self {
        Self {
            names: Rc::new(
                names
                    .iter()
                    .map(|(asn, name)| (*asn, name.to_string()))
                    .collect(),
            ),
            calls: Rc::default(),
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.borrow()
    }
}

impl RegistryLookup for FakeRegistry {
    fn lookup(&self, asn: u32) -> Result<String> {
        *self.calls.borrow_mut() += 1;
        self.names
            .get(&asn)
            .cloned()
            .ok_or_else(|| anyhow!("AS{} not registered", asn))
    }
}

#[derive(Default)]
struct StoreState {
    docs: HashMap<String, PathDocument>,
    creates: usize,
    updates: usize,
    failures_left: HashMap<String, usize>,
    always_fail: HashSet<String>,
}

/// Document store fake; clones share state
#[derive(Clone, Default)]
pub struct FakeStore(Rc<RefCell<StoreState>>);

impl FakeStore {
    /// Make the next `times` writes of `id` fail
    pub fn fail_writes(&self, id: &str, times: usize) {
        self.0
            .borrow_mut()
            .failures_left
            .insert(id.to_string(), times);
    }

    /// Make every write of `id` fail
    pub fn always_fail(&self, id: &str) {
        self.0.borrow_mut().always_fail.insert(id.to_string());
    }

    pub fn len(&self) -> usize {
        self.0.borrow().docs.len()
    }

    pub fn doc(&self, id: &str) -> Option<PathDocument> {
        self.0.borrow().docs.get(id).cloned()
    }

    pub fn docs(&self) -> Vec<PathDocument> {
        self.0.borrow().docs.values().cloned().collect()
    }

    pub fn creates(&self) -> usize {
        self.0.borrow().creates
    }

    pub fn updates(&self) -> usize {
        self.0.borrow().updates
    }

    fn check_write(&self, id: &str) -> Result<()> {
        let mut state = self.0.borrow_mut();
        if state.always_fail.contains(id) {
            return Err(anyhow!("write of {} rejected", id));
        }
        if let Some(left) = state.failures_left.get_mut(id) {
            if *left > 0 {
                *left -= 1;
                return Err(anyhow!("write of {} rejected", id));
            }
        }
        Ok(())
    }
}

impl DocumentStore for FakeStore {
    fn exists(&self, id: &str) -> Result<bool> {
        Ok(self.0.borrow().docs.contains_key(id))
    }

    fn get(&self, id: &str) -> Result<Option<PathDocument>> {
        Ok(self.0.borrow().docs.get(id).cloned())
    }

    fn create(&self, doc: &PathDocument) -> Result<()> {
        self.check_write(&doc.id)?;
        let mut state = self.0.borrow_mut();
        if state.docs.contains_key(&doc.id) {
            return Err(anyhow!("{} already exists", doc.id));
        }
        state.creates += 1;
        state.docs.insert(doc.id.clone(), doc.clone());
        Ok(())
    }

    fn update(&self, doc: &PathDocument) -> Result<()> {
        self.check_write(&doc.id)?;
        let mut state = self.0.borrow_mut();
        if !state.docs.contains_key(&doc.id) {
            return Err(anyhow!("{} does not exist", doc.id));
        }
        state.updates += 1;
        state.docs.insert(doc.id.clone(), doc.clone());
        Ok(())
    }
}

/// Speaker fake serving fixed tables per family
#[derive(Clone, Default)]
pub struct FakeSpeaker {
    pub ipv4: Vec<RawPath>,
    pub ipv6: Vec<RawPath>,
    pub unreachable: bool,
    calls: Rc<RefCell<Vec<AddressFamily>>>,
}

impl FakeSpeaker {
    pub fn new(ipv4: Vec<RawPath>, ipv6: Vec<RawPath>) -> Self {
        Self {
            ipv4,
            ipv6,
            ..Default::default()
        }
    }

    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Default::default()
        }
    }

    /// Families requested so far, in order
    pub fn calls(&self) -> Vec<AddressFamily> {
        self.calls.borrow().clone()
    }
}

impl BgpSpeaker for FakeSpeaker {
    fn list_path(&self, family: AddressFamily) -> Result<Vec<RawPath>> {
        self.calls.borrow_mut().push(family);
        if self.unreachable {
            return Err(anyhow!("connection refused"));
        }
        Ok(match family {
            AddressFamily::Ipv4 => self.ipv4.clone(),
            AddressFamily::Ipv6 => self.ipv6.clone(),
        })
    }
}

/// A raw path as GoBGP would list it
///
/// `prefix` is `address/len`; an empty `asns` omits the AS path attribute.
pub fn raw_path(prefix: &str, neighbor: &str, asns: &[u32], next_hop: &str) -> RawPath {
    let (addr, len) = prefix.split_once('/').unwrap_or((prefix, "32"));
    let nlri = AttributeEnvelope::pack(
        "IPAddressPrefix",
        &apipb::IpAddressPrefix {
            prefix_len: len.parse().unwrap_or(32),
            prefix: addr.to_string(),
        },
    );

    let mut pattrs = vec![AttributeEnvelope::pack(
        "NextHopAttribute",
        &apipb::NextHopAttribute {
            next_hop: next_hop.to_string(),
        },
    )];
    if !asns.is_empty() {
        pattrs.push(AttributeEnvelope::pack(
            "AsPathAttribute",
            &apipb::AsPathAttribute {
                segments: vec![apipb::AsSegment {
                    r#type: 2,
                    numbers: asns.to_vec(),
                }],
            },
        ));
    }

    RawPath {
        nlri: Some(nlri),
        pattrs,
        age_secs: 60,
        neighbor_ip: neighbor.to_string(),
        source_id: neighbor.to_string(),
        source_asn: asns.first().copied().unwrap_or(0),
    }
}
