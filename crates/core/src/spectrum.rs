//! Windowed sideband spectrum storage.
//!
//! A spectrum holds one complex amplitude per sideband order in the fixed
//! reporting window `[-W, W]`, stored contiguously at index `order + W`.
//! An order counts as populated when its magnitude exceeds the prune
//! threshold; slots below it behave as absent.

use num_complex::Complex64;

/// Default reporting window half-width.
pub const DEFAULT_HALF_WIDTH: usize = 10;

/// Default amplitude below which an order is treated as absent.
pub const DEFAULT_PRUNE_THRESHOLD: f64 = 1e-8;

#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumMap {
    half_width: usize,
    threshold: f64,
    slots: Vec<Complex64>,
}

impl SpectrumMap {
    pub(crate) fn zeros(half_width: usize, threshold: f64) -> Self {
        Self {
            half_width,
            threshold,
            slots: vec![Complex64::default(); 2 * half_width + 1],
        }
    }

    /// Build a spectrum from explicit `(order, amplitude)` pairs.
    ///
    /// Orders outside the window are dropped; repeated orders add up.
    pub fn from_entries<I>(half_width: usize, threshold: f64, entries: I) -> Self
    where
        I: IntoIterator<Item = (i32, Complex64)>,
    {
        let mut map = Self::zeros(half_width, threshold);
        for (order, amplitude) in entries {
            map.accumulate(order, amplitude);
        }
        map
    }

    #[inline]
    fn slot_index(&self, order: i32) -> Option<usize> {
        let w = self.half_width as i32;
        if (-w..=w).contains(&order) {
            Some((order + w) as usize)
        } else {
            None
        }
    }

    /// Add `amplitude` into `order`; returns false when the order is outside the window.
    #[inline]
    pub(crate) fn accumulate(&mut self, order: i32, amplitude: Complex64) -> bool {
        match self.slot_index(order) {
            Some(idx) => {
                self.slots[idx] += amplitude;
                true
            }
            None => false,
        }
    }

    pub fn half_width(&self) -> usize {
        self.half_width
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Whether `order` lies inside the reporting window.
    pub fn in_window(&self, order: i32) -> bool {
        self.slot_index(order).is_some()
    }

    /// All orders of the reporting window, ascending.
    pub fn orders(&self) -> impl Iterator<Item = i32> {
        let w = self.half_width as i32;
        -w..=w
    }

    /// Amplitude of a populated order, `None` when absent or outside the window.
    pub fn get(&self, order: i32) -> Option<Complex64> {
        self.slot_index(order)
            .map(|idx| self.slots[idx])
            .filter(|value| value.norm() > self.threshold)
    }

    /// Amplitude of `order`, with absent orders reading as exact zero.
    pub fn amplitude(&self, order: i32) -> Complex64 {
        self.get(order).unwrap_or_default()
    }

    pub fn magnitude(&self, order: i32) -> f64 {
        self.amplitude(order).norm()
    }

    /// Optical power `|a|²` of `order`.
    pub fn power(&self, order: i32) -> f64 {
        self.amplitude(order).norm_sqr()
    }

    pub fn contains(&self, order: i32) -> bool {
        self.get(order).is_some()
    }

    /// Populated `(order, amplitude)` pairs, ascending by order.
    pub fn iter(&self) -> impl Iterator<Item = (i32, Complex64)> + '_ {
        let w = self.half_width as i32;
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, value)| value.norm() > self.threshold)
            .map(move |(idx, value)| (idx as i32 - w, *value))
    }

    pub fn populated_orders(&self) -> Vec<i32> {
        self.iter().map(|(order, _)| order).collect()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw slot storage ordered from `-W` to `W`, including sub-threshold values.
    pub fn as_slice(&self) -> &[Complex64] {
        &self.slots
    }

    /// A copy with every amplitude multiplied by `exp(i·phase)`.
    pub fn rotated(&self, phase: f64) -> Self {
        let rotation = Complex64::from_polar(1.0, phase);
        Self {
            half_width: self.half_width,
            threshold: self.threshold,
            slots: self.slots.iter().map(|value| value * rotation).collect(),
        }
    }

    /// Total power over all populated orders.
    pub fn total_power(&self) -> f64 {
        self.iter().map(|(_, value)| value.norm_sqr()).sum()
    }
}
