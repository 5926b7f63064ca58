//! Full MZM evaluation: expand both arms, then combine them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::{
    combiner::{combine, CombinedSpectrum},
    expander::{BesselExpander, DEFAULT_TRUNCATION},
    params::{ModulationParameters, MzmParameters, SpectrumError, TONES},
    spectrum::{SpectrumMap, DEFAULT_HALF_WIDTH, DEFAULT_PRUNE_THRESHOLD},
};

/// Spectral model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectralConfig {
    /// Drive tone frequency in GHz; only used to label sidebands.
    pub fundamental_ghz: f64,
    /// Bound `M` on each Bessel summation index.
    pub truncation: usize,
    /// Reporting window half-width `W`.
    pub half_width: usize,
    pub prune_threshold: f64,
    /// Memoise arm spectra by exact parameter bits (0 disables the cache).
    pub cache_capacity: usize,
}

impl Default for SpectralConfig {
    fn default() -> Self {
        Self {
            fundamental_ghz: 10.0,
            truncation: DEFAULT_TRUNCATION,
            half_width: DEFAULT_HALF_WIDTH,
            prune_threshold: DEFAULT_PRUNE_THRESHOLD,
            cache_capacity: 0,
        }
    }
}

impl SpectralConfig {
    pub fn validate(&self) -> Result<(), SpectrumError> {
        BesselExpander::new(self.truncation, self.half_width, self.prune_threshold).map(|_| ())
    }

    /// Optical frequency offset of `order` from the carrier, in GHz.
    pub fn offset_ghz(&self, order: i32) -> f64 {
        order as f64 * self.fundamental_ghz
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub entries: usize,
}

/// Arm spectra keyed by the exact bit pattern of their six parameters.
///
/// When full, the cache is cleared rather than evicting entry by entry.
pub struct SpectrumCache {
    capacity: usize,
    entries: Mutex<HashMap<[u64; 2 * TONES], SpectrumMap>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl SpectrumCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(HashMap::with_capacity(capacity.min(4096))),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    fn get_or_expand(
        &self,
        expander: &BesselExpander,
        params: &ModulationParameters,
    ) -> Result<SpectrumMap, SpectrumError> {
        let key = params.cache_key();
        if let Some(hit) = self.entries.lock().get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(hit.clone());
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        // Expand outside the lock; concurrent misses on one key compute the same value.
        let spectrum = expander.expand(params)?;
        let mut entries = self.entries.lock();
        if entries.len() >= self.capacity {
            entries.clear();
        }
        entries.insert(key, spectrum.clone());
        Ok(spectrum)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.lock().len(),
        }
    }
}

/// Evaluates complete modulator settings into arm and output spectra.
pub struct MzmAnalyzer {
    config: SpectralConfig,
    expander: BesselExpander,
    cache: Option<SpectrumCache>,
}

impl MzmAnalyzer {
    pub fn new(config: SpectralConfig) -> Result<Self, SpectrumError> {
        let expander =
            BesselExpander::new(config.truncation, config.half_width, config.prune_threshold)?;
        if expander.truncates_at_window() {
            log::info!(
                "truncation M={} reaches order ±{} but the window is ±{}; triples beyond the window are dropped",
                expander.truncation(),
                expander.reach(),
                expander.half_width()
            );
        }
        let cache = (config.cache_capacity > 0).then(|| SpectrumCache::new(config.cache_capacity));
        Ok(Self {
            config,
            expander,
            cache,
        })
    }

    pub fn config(&self) -> &SpectralConfig {
        &self.config
    }

    pub fn expander(&self) -> &BesselExpander {
        &self.expander
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(SpectrumCache::stats)
    }

    pub fn expand_arm(&self, params: &ModulationParameters) -> Result<SpectrumMap, SpectrumError> {
        match &self.cache {
            Some(cache) => cache.get_or_expand(&self.expander, params),
            None => self.expander.expand(params),
        }
    }

    pub fn analyze(&self, params: &MzmParameters) -> Result<CombinedSpectrum, SpectrumError> {
        params.validate()?;
        let upper = self.expand_arm(&params.upper)?;
        let lower = self.expand_arm(&params.lower)?;
        Ok(combine(upper, lower, params.delta_phi))
    }
}
