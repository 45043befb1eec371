//! In-memory cache of analysis results.
//!
//! Keys are blake3 digests over everything that can change a result: the
//! normalized path, the content, the effective language and every
//! output-affecting request option.

use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::analysis::{AnalysisRequest, AnalysisResult};

/// Hit/miss counters and occupancy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub total_requests: u64,
    pub hit_rate: f64,
    pub size: usize,
    pub max_entries: usize,
    pub enabled: bool,
}

#[derive(Default)]
struct Entries {
    map: HashMap<String, Arc<AnalysisResult>>,
    /// Insertion order, oldest first.
    order: VecDeque<String>,
}

/// Bounded result cache with aggregate counters.
pub struct CacheService {
    entries: RwLock<Entries>,
    hits: AtomicU64,
    misses: AtomicU64,
    max_entries: usize,
    enabled: bool,
}

impl CacheService {
    pub fn new(max_entries: usize, enabled: bool) -> Self {
        Self {
            entries: RwLock::new(Entries::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            max_entries: max_entries.max(1),
            enabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Look up `key`, counting a hit or a miss.
    pub fn get(&self, key: &str) -> Option<Arc<AnalysisResult>> {
        let found = if self.enabled {
            self.entries
                .read()
                .ok()
                .and_then(|entries| entries.map.get(key).cloned())
        } else {
            None
        };

        match found {
            Some(result) => {
                self.hits.fetch_add(1, Ordering::SeqCst);
                Some(result)
            }
            None => {
                self.misses.fetch_add(1, Ordering::SeqCst);
                None
            }
        }
    }

    /// Store a result. The entry becomes visible to readers in one step.
    pub fn set(&self, key: String, result: AnalysisResult) {
        if !self.enabled {
            return;
        }
        let Ok(mut entries) = self.entries.write() else {
            return;
        };

        if entries.map.insert(key.clone(), Arc::new(result)).is_some() {
            entries.order.retain(|k| k != &key);
        }
        entries.order.push_back(key);

        while entries.map.len() > self.max_entries {
            let Some(oldest) = entries.order.pop_front() else {
                break;
            };
            entries.map.remove(&oldest);
        }
    }

    /// Remove all entries and zero the counters.
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.map.clear();
            entries.order.clear();
        }
        self.hits.store(0, Ordering::SeqCst);
        self.misses.store(0, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::SeqCst);
        let misses = self.misses.load(Ordering::SeqCst);
        let total = hits + misses;
        CacheStats {
            hits,
            misses,
            total_requests: total,
            hit_rate: if total == 0 {
                0.0
            } else {
                hits as f64 / total as f64
            },
            size: self.len(),
            max_entries: self.max_entries,
            enabled: self.enabled,
        }
    }
}

/// Compute the cache key for a request.
///
/// `path` is the validated, normalized path, `content` the exact text that
/// will be analyzed and `language` the effective language.
pub fn cache_key(path: &Path, content: &[u8], language: &str, request: &AnalysisRequest) -> String {
    let mut hasher = blake3::Hasher::new();
    let mut field = |tag: &str, bytes: &[u8]| {
        hasher.update(tag.as_bytes());
        hasher.update(&(bytes.len() as u64).to_le_bytes());
        hasher.update(bytes);
    };

    field("path", path.to_string_lossy().as_bytes());
    field("content", blake3::hash(content).as_bytes());
    field("language", language.as_bytes());
    match &request.queries {
        Some(queries) => {
            field("queries", &(queries.len() as u64).to_le_bytes());
            for q in queries {
                field("query", q.as_bytes());
            }
        }
        None => field("queries", b"default"),
    }
    field("elements", &[request.include_elements as u8]);
    field("query_results", &[request.include_queries as u8]);
    field("complexity", &[request.include_complexity as u8]);
    field("details", &[request.include_details as u8]);
    field("format", request.format_type.as_bytes());

    hasher.finalize().to_hex().to_string()
}
