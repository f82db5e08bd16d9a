//! Commitment Tree Hashing
//!
//! Incremental Poseidon Merkle tree over the BN254 scalar field. Leaves are
//! note hashes; the root after each append is a pure function of the leaf
//! sequence so far.
//!
//! ```text
//!                    Root
//!                   /    \
//!                 H01    H23
//!                /  \   /   \
//!               H0  H1 H2   H3
//!               |   |   |    |
//!              N0  N1  N2   N3  (Note Hashes)
//! ```
//!
//! Only the frontier (the rightmost left-child at each level) is needed to
//! append, so an insert is O(depth).

use std::sync::OnceLock;

use ark_crypto_primitives::sponge::{
    CryptographicSponge,
    poseidon::{PoseidonConfig, PoseidonSponge, find_poseidon_ark_and_mds},
};
use ark_ed_on_bn254::Fq;
use core::fmt;

use crate::curve::CurveError;
use crate::field::{FieldElement, NoteHash};

/// Tree depth (supports 2^20 notes)
pub const TREE_DEPTH: usize = 20;

/// Maximum number of leaves
pub const TREE_CAPACITY: u64 = 1 << TREE_DEPTH;

static SHARED_HASHER: OnceLock<MerkleHasher> = OnceLock::new();

/// A commitment tree root
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TreeRoot(pub FieldElement);

impl TreeRoot {
    pub fn from_decimal(field: &'static str, text: &str) -> Result<Self, CurveError> {
        FieldElement::from_decimal(field, text).map(Self)
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    pub fn from_canonical_bytes(bytes: &[u8]) -> Option<Self> {
        FieldElement::from_canonical_bytes(bytes).map(Self)
    }
}

impl fmt::Display for TreeRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Poseidon-based Merkle hash function
pub struct MerkleHasher {
    config: PoseidonConfig<Fq>,
    /// Precomputed empty subtree roots at each level
    empty_roots: Vec<Fq>,
}

impl MerkleHasher {
    pub fn new() -> Self {
        let config = Self::poseidon_config();
        let empty_roots = Self::compute_empty_roots(&config);

        Self {
            config,
            empty_roots,
        }
    }

    /// Process-wide hasher; parameter generation is not free
    pub fn shared() -> &'static MerkleHasher {
        SHARED_HASHER.get_or_init(MerkleHasher::new)
    }

    /// Hash two children to get parent
    pub fn hash_pair(&self, left: &Fq, right: &Fq) -> Fq {
        Self::hash_with(&self.config, left, right)
    }

    /// Get the empty root at a given depth
    pub fn empty_root(&self, depth: usize) -> Fq {
        self.empty_roots[depth]
    }

    /// Root of the tree with no leaves
    pub fn empty_tree_root(&self) -> TreeRoot {
        TreeRoot(FieldElement(self.empty_roots[TREE_DEPTH]))
    }

    /// Every intermediate root for a leaf sequence, `roots[i]` covering
    /// `leaves[0..=i]`
    pub fn compute_roots(&self, leaves: &[NoteHash]) -> Vec<TreeRoot> {
        let mut frontier = TreeFrontier::new();
        leaves
            .iter()
            .map(|leaf| frontier.insert(leaf, self))
            .collect()
    }

    fn hash_with(config: &PoseidonConfig<Fq>, left: &Fq, right: &Fq) -> Fq {
        let mut sponge = PoseidonSponge::new(config);
        sponge.absorb(left);
        sponge.absorb(right);
        let result: Fq = sponge.squeeze_field_elements(1)[0];
        result
    }

    fn poseidon_config() -> PoseidonConfig<Fq> {
        let prime_bits: u64 = 254;
        let rate: usize = 2;
        let capacity: usize = 1;
        let full_rounds: u64 = 8;
        let partial_rounds: u64 = 57;
        let alpha: u64 = 5;

        let (ark, mds) =
            find_poseidon_ark_and_mds::<Fq>(prime_bits, rate, full_rounds, partial_rounds, 0);

        PoseidonConfig::new(
            full_rounds as usize,
            partial_rounds as usize,
            alpha,
            mds,
            ark,
            rate,
            capacity,
        )
    }

    fn compute_empty_roots(config: &PoseidonConfig<Fq>) -> Vec<Fq> {
        let mut sponge = PoseidonSponge::new(config);
        sponge.absorb(&Fq::from(0u64));
        let empty_leaf: Fq = sponge.squeeze_field_elements(1)[0];

        let mut roots = Vec::with_capacity(TREE_DEPTH + 1);
        let mut current = empty_leaf;
        roots.push(current);
        for _ in 0..TREE_DEPTH {
            current = Self::hash_with(config, &current, &current);
            roots.push(current);
        }
        roots
    }
}

impl Default for MerkleHasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Rightmost nodes at each level needed to compute the next root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeFrontier {
    /// Frontier nodes at each level (index 0 = leaf level)
    frontier: Vec<Option<Fq>>,
    /// Next insertion position
    next_position: u64,
}

impl TreeFrontier {
    /// Create empty frontier
    pub fn new() -> Self {
        Self {
            frontier: vec![None; TREE_DEPTH],
            next_position: 0,
        }
    }

    pub fn next_position(&self) -> u64 {
        self.next_position
    }

    /// Append a leaf and return the new root.
    ///
    /// Callers enforce [`TREE_CAPACITY`].
    pub fn insert(&mut self, leaf: &NoteHash, hasher: &MerkleHasher) -> TreeRoot {
        let mut current = leaf.0.inner();
        let mut current_position = self.next_position;
        self.next_position += 1;

        for level in 0..TREE_DEPTH {
            if current_position & 1 == 1 {
                // Right child: the left sibling is final and kept in the
                // frontier until the next left child at this level replaces it
                let left = self.frontier[level].unwrap_or_else(|| hasher.empty_root(level));
                current = hasher.hash_pair(&left, &current);
            } else {
                self.frontier[level] = Some(current);
                current = hasher.hash_pair(&current, &hasher.empty_root(level));
            }
            current_position >>= 1;
        }

        TreeRoot(FieldElement(current))
    }
}

impl Default for TreeFrontier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reference root computed level by level over the whole leaf set
    fn naive_root(hasher: &MerkleHasher, leaves: &[NoteHash]) -> TreeRoot {
        let mut level: Vec<Fq> = leaves.iter().map(|l| l.0.inner()).collect();
        for depth in 0..TREE_DEPTH {
            if level.len() % 2 == 1 {
                level.push(hasher.empty_root(depth));
            }
            if level.is_empty() {
                level.push(hasher.empty_root(depth + 1));
                continue;
            }
            level = level
                .chunks(2)
                .map(|pair| hasher.hash_pair(&pair[0], &pair[1]))
                .collect();
        }
        TreeRoot(FieldElement(level[0]))
    }

    #[test]
    fn test_empty_tree() {
        let hasher = MerkleHasher::shared();
        assert_eq!(naive_root(hasher, &[]), hasher.empty_tree_root());
        assert!(hasher.compute_roots(&[]).is_empty());
    }

    #[test]
    fn test_frontier_matches_full_recompute() {
        let hasher = MerkleHasher::shared();
        let leaves: Vec<NoteHash> = (1..=9u64).map(NoteHash::from).collect();

        let roots = hasher.compute_roots(&leaves);
        assert_eq!(roots.len(), leaves.len());
        for (i, root) in roots.iter().enumerate() {
            assert_eq!(
                *root,
                naive_root(hasher, &leaves[..=i]),
                "incremental root {i} must match recomputation"
            );
        }
    }

    #[test]
    fn test_root_changes() {
        let hasher = MerkleHasher::shared();
        let roots = hasher.compute_roots(&[NoteHash::from(1), NoteHash::from(2)]);

        assert_ne!(roots[0], hasher.empty_tree_root(), "root should change after insert");
        assert_ne!(roots[0], roots[1], "root should change after each insert");
    }

    #[test]
    fn test_roots_are_deterministic() {
        let leaves: Vec<NoteHash> = (10..20u64).map(NoteHash::from).collect();
        let a = MerkleHasher::new().compute_roots(&leaves);
        let b = MerkleHasher::shared().compute_roots(&leaves);
        assert_eq!(a, b);
    }

    #[test]
    fn test_leaf_order_matters() {
        let hasher = MerkleHasher::shared();
        let ab = hasher.compute_roots(&[NoteHash::from(1), NoteHash::from(2)]);
        let ba = hasher.compute_roots(&[NoteHash::from(2), NoteHash::from(1)]);
        assert_ne!(ab[1], ba[1]);
    }
}
