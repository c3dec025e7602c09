use crate::error::{AdError, Result};
use crate::node::{LeafSpec, Node, NodeRef};
use crate::numeric::Numeric;
use crate::tangent::Tangent;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::rc::Rc;

/// Settings for a [`Registry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Replace cached entries unconditionally instead of returning them.
    /// Forces every construction to recompute; used to measure what caching
    /// saves.
    pub overwrite: bool,
    /// Emit a warning when an explicit leaf construction hits an existing
    /// symbol and the passed value/tangent are ignored.
    pub warn_on_existing: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            overwrite: false,
            warn_on_existing: true,
        }
    }
}

/// Counters for cache behaviour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryStats {
    /// Nodes whose value and tangent were actually computed.
    pub evaluations: usize,
    /// Constructions answered from the cache.
    pub hits: usize,
}

/// Content-addressed store of nodes keyed by canonical symbol.
///
/// The registry is the only owner of cached nodes. At most one node is
/// registered per symbol; a construction for a known symbol returns the
/// cached instance unless overwriting is requested. Every lookup-then-insert
/// happens under `&mut self`, so the invariant cannot be raced.
///
/// Independent computations use independent registries.
#[derive(Debug, Default)]
pub struct Registry {
    nodes: HashMap<String, NodeRef>,
    config: RegistryConfig,
    stats: RegistryStats,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> RegistryConfig {
        self.config
    }

    pub fn set_overwrite_mode(&mut self, enabled: bool) {
        debug!("registry overwrite mode set to {enabled}");
        self.config.overwrite = enabled;
    }

    pub fn overwrite_mode(&self) -> bool {
        self.config.overwrite
    }

    pub fn stats(&self) -> RegistryStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = RegistryStats::default();
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.nodes.contains_key(symbol)
    }

    pub fn get(&self, symbol: &str) -> Option<NodeRef> {
        self.nodes.get(symbol).cloned()
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    /// Drops every cached node. Handles held by callers stay valid but are
    /// no longer shared with new constructions.
    pub fn clear(&mut self) {
        debug!("clearing {} registered nodes", self.nodes.len());
        self.nodes.clear();
    }

    /// Builds (or returns) the leaf `symbol`.
    ///
    /// When `overwrite` is false, overwrite mode is off and `symbol` is
    /// already registered, the cached node is returned and `value`/`tangent`
    /// are ignored. Otherwise both are validated and the new node replaces
    /// any previous entry.
    pub fn make_node(
        &mut self,
        symbol: impl Into<String>,
        value: impl Into<Numeric>,
        tangent: impl Into<Numeric>,
        overwrite: bool,
    ) -> Result<NodeRef> {
        self.make_leaf(symbol.into(), value.into(), tangent.into(), None, overwrite)
    }

    /// Builds a multi-input leaf whose tangent is `derivative * seed`.
    pub fn make_seeded_node(
        &mut self,
        symbol: impl Into<String>,
        value: impl Into<Numeric>,
        derivative: impl Into<Numeric>,
        seed: &[f64],
        overwrite: bool,
    ) -> Result<NodeRef> {
        self.make_leaf(
            symbol.into(),
            value.into(),
            derivative.into(),
            Some(seed),
            overwrite,
        )
    }

    /// Single-input leaf shorthand.
    pub fn leaf(&mut self, symbol: impl Into<String>, value: f64, derivative: f64) -> Result<NodeRef> {
        self.make_node(symbol, value, derivative, false)
    }

    pub fn declare(&mut self, spec: &LeafSpec) -> Result<NodeRef> {
        self.make_leaf(
            spec.symbol.clone(),
            spec.value.clone(),
            spec.derivative.clone(),
            spec.seed_vector.as_deref(),
            false,
        )
    }

    /// Declares `inputs.len()` independent variables, the i-th seeded with
    /// the i-th unit vector.
    pub fn variables(&mut self, inputs: &[(&str, f64)]) -> Result<Vec<NodeRef>> {
        let dim = inputs.len();
        inputs
            .iter()
            .enumerate()
            .map(|(i, (symbol, value))| {
                let seed = Tangent::one_hot(1.0, i, dim)?;
                self.make_seeded_node(*symbol, *value, 1, seed.as_slice(), false)
            })
            .collect()
    }

    fn make_leaf(
        &mut self,
        symbol: String,
        value: Numeric,
        derivative: Numeric,
        seed: Option<&[f64]>,
        overwrite: bool,
    ) -> Result<NodeRef> {
        if !(overwrite || self.config.overwrite) {
            if let Some(existing) = self.nodes.get(&symbol) {
                if self.config.warn_on_existing {
                    warn!("node with symbol {symbol} already exists, using existing node");
                }
                self.stats.hits += 1;
                return Ok(existing.clone());
            }
        }

        let value = value.into_value()?;
        let tangent = derivative.into_tangent(seed)?;
        Ok(self.insert(symbol, value, tangent))
    }

    /// Returns the constant leaf for a literal, keyed by the text of the
    /// `f64` it holds.
    pub(crate) fn literal(&mut self, value: f64) -> Result<NodeRef> {
        self.memoize(literal_symbol(value), "literal", |_| Ok((value, Tangent::Zero)))
    }

    /// Looks `symbol` up and only runs `compute` on a miss (or always, in
    /// overwrite mode). The result is registered before it is returned.
    pub(crate) fn memoize<F>(&mut self, symbol: String, function: &str, compute: F) -> Result<NodeRef>
    where
        F: FnOnce(&mut Self) -> Result<(f64, Tangent)>,
    {
        if !self.config.overwrite {
            if let Some(hit) = self.nodes.get(&symbol) {
                self.stats.hits += 1;
                return Ok(hit.clone());
            }
        }

        let (value, tangent) = compute(self)?;
        if value.is_nan() {
            return Err(AdError::domain(function, value, "inputs with a real-valued result"));
        }
        if tangent.as_slice().iter().any(|d| d.is_nan()) {
            return Err(AdError::domain(function, value, "inputs with a defined derivative"));
        }
        Ok(self.insert(symbol, value, tangent))
    }

    fn insert(&mut self, symbol: String, value: f64, tangent: Tangent) -> NodeRef {
        self.stats.evaluations += 1;
        let node = Rc::new(Node::new(symbol.clone(), value, tangent));
        self.nodes.insert(symbol, Rc::clone(&node));
        node
    }
}

pub(crate) fn literal_symbol(value: f64) -> String {
    value.to_string()
}
