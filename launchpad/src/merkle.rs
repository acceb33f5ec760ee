//! Whitelist inclusion proofs.
//!
//! - Leaves are account addresses hashed with a 0x00 prefix, interior nodes with
//!   0x01, so a leaf can never be replayed as a node.
//! - Pairs are hashed in sorted order, so a proof is just the sibling list.
//! - A lone node at the end of a level is promoted unchanged.
//! - Hash: SHA-256.

use sha2::{Digest, Sha256};
use std::collections::HashMap;

use crate::Address;

pub type Hash32 = [u8; 32];

const LEAF_PREFIX: u8 = 0x00;
const NODE_PREFIX: u8 = 0x01;

/// Inclusion-proof check consumed by sale pools.
pub trait ProofVerifier: Send + Sync + 'static {
    fn verify(&self, proof: &[Hash32], root: &Hash32, leaf: &Hash32) -> bool;
}

/// Sorted-pair SHA-256 verifier matching [`WhitelistTree`].
#[derive(Clone, Copy, Debug, Default)]
pub struct Sha256Verifier;

impl ProofVerifier for Sha256Verifier {
    fn verify(&self, proof: &[Hash32], root: &Hash32, leaf: &Hash32) -> bool {
        let acc = proof.iter().fold(*leaf, |acc, sibling| hash_node(&acc, sibling));
        &acc == root
    }
}

pub fn leaf_hash(who: &Address) -> Hash32 {
    let mut h = Sha256::new();
    h.update([LEAF_PREFIX]);
    h.update(who.0);
    h.finalize().into()
}

fn hash_node(a: &Hash32, b: &Hash32) -> Hash32 {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let mut h = Sha256::new();
    h.update([NODE_PREFIX]);
    h.update(lo);
    h.update(hi);
    h.finalize().into()
}

/// Builder for whitelist roots and per-address proofs.
pub struct WhitelistTree {
    levels: Vec<Vec<Hash32>>, // levels[0] = hashed leaves; last = root layer
    index: HashMap<Address, usize>,
}

impl WhitelistTree {
    /// Duplicate addresses keep their first position.
    pub fn build(members: &[Address]) -> Self {
        let mut index = HashMap::new();
        let mut level = Vec::with_capacity(members.len());
        for m in members {
            if !index.contains_key(m) {
                index.insert(*m, level.len());
                level.push(leaf_hash(m));
            }
        }

        let mut levels = vec![level.clone()];
        while level.len() > 1 {
            level = level
                .chunks(2)
                .map(|pair| match pair {
                    [a, b] => hash_node(a, b),
                    [lone] => *lone,
                    _ => unreachable!("chunks(2) yields one or two nodes"),
                })
                .collect();
            levels.push(level.clone());
        }
        Self { levels, index }
    }

    /// None for an empty whitelist.
    pub fn root(&self) -> Option<Hash32> {
        self.levels.last().and_then(|l| l.first()).copied()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn proof(&self, who: &Address) -> Option<Vec<Hash32>> {
        let mut idx = *self.index.get(who)?;
        let mut steps = Vec::new();
        for layer in &self.levels[..self.levels.len() - 1] {
            let sibling = idx ^ 1;
            // promoted lone node contributes no step
            if sibling < layer.len() {
                steps.push(layer[sibling]);
            }
            idx /= 2;
        }
        Some(steps)
    }
}
