//! Merkle Trees for Note Commitments
//!
//! Commitments are appended to fixed-depth Poseidon trees. When one tree
//! fills up the pool starts the next, so every note is addressed by
//! `(tree, position)`.
//!
//! ```text
//!                    Root
//!                   /    \
//!                 H01    H23
//!                /  \   /   \
//!               H0  H1 H2   H3
//!               |   |   |    |
//!              C0  C1  C2   C3  (Note Commitments)
//! ```
//!
//! Tree storage is an external collaborator behind [`MerkleTreeService`].
//! [`MemoryMerkleTree`] is a sparse in-memory implementation for tests and
//! light clients.

use std::collections::HashMap;
use std::future::Future;
use std::sync::OnceLock;

use ark_bls12_381::Fr;

use crate::hash::note_hash;

/// Tree depth (2^16 commitments per tree)
pub const MERKLE_TREE_DEPTH: usize = 16;

/// Inclusion witness of one leaf
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleWitness {
    /// Sibling hashes from leaf to root
    pub elements: Vec<Fr>,
    /// Leaf position; bit `i` set means the node at level `i` is a right child
    pub indices: u64,
}

impl MerkleWitness {
    /// Verify that this witness proves inclusion of `leaf` under `root`
    pub fn verify(&self, leaf: &Fr, root: &Fr) -> bool {
        let mut current = *leaf;
        for (level, sibling) in self.elements.iter().enumerate() {
            current = if (self.indices >> level) & 1 == 1 {
                hash_pair(sibling, &current)
            } else {
                hash_pair(&current, sibling)
            };
        }
        current == *root
    }
}

/// Commitment tree storage as seen by the transaction builder
pub trait MerkleTreeService {
    fn get_root(&self, tree: u32) -> impl Future<Output = anyhow::Result<Fr>>;

    fn get_merkle_witness(
        &self,
        tree: u32,
        position: u64,
    ) -> impl Future<Output = anyhow::Result<MerkleWitness>>;
}

/// Hash two children to get parent
pub fn hash_pair(left: &Fr, right: &Fr) -> Fr {
    note_hash(&[*left, *right])
}

static EMPTY_ROOTS: OnceLock<Vec<Fr>> = OnceLock::new();

/// Root of an empty subtree of height `level`
pub fn empty_root(level: usize) -> Fr {
    EMPTY_ROOTS.get_or_init(|| {
        let mut roots = vec![note_hash(&[Fr::from(0u64)])];
        for level in 0..MERKLE_TREE_DEPTH {
            let prev = roots[level];
            roots.push(hash_pair(&prev, &prev));
        }
        roots
    })[level]
}

/// One sparse tree; only non-empty nodes are stored
#[derive(Debug, Clone)]
struct SparseTree {
    /// (level, index) -> hash
    nodes: HashMap<(usize, u64), Fr>,
    next_index: u64,
    root: Fr,
}

impl SparseTree {
    fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            next_index: 0,
            root: empty_root(MERKLE_TREE_DEPTH),
        }
    }

    fn node(&self, level: usize, index: u64) -> Fr {
        self.nodes
            .get(&(level, index))
            .copied()
            .unwrap_or_else(|| empty_root(level))
    }

    fn insert(&mut self, leaf: Fr) -> u64 {
        let position = self.next_index;
        self.nodes.insert((0, position), leaf);

        let mut current_index = position;
        let mut current_hash = leaf;
        for level in 0..MERKLE_TREE_DEPTH {
            let sibling = self.node(level, current_index ^ 1);
            current_hash = if current_index & 1 == 1 {
                hash_pair(&sibling, &current_hash)
            } else {
                hash_pair(&current_hash, &sibling)
            };
            current_index /= 2;
            self.nodes.insert((level + 1, current_index), current_hash);
        }

        self.root = current_hash;
        self.next_index += 1;
        position
    }

    fn witness(&self, position: u64) -> Option<MerkleWitness> {
        if position >= self.next_index {
            return None;
        }
        let elements = (0..MERKLE_TREE_DEPTH)
            .map(|level| self.node(level, (position >> level) ^ 1))
            .collect();
        Some(MerkleWitness {
            elements,
            indices: position,
        })
    }
}

/// In-memory set of commitment trees
#[derive(Debug, Clone, Default)]
pub struct MemoryMerkleTree {
    trees: HashMap<u32, SparseTree>,
}

impl MemoryMerkleTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a commitment to `tree`, returning its position
    pub fn insert(&mut self, tree: u32, commitment: Fr) -> anyhow::Result<u64> {
        let sparse = self.trees.entry(tree).or_insert_with(SparseTree::new);
        if sparse.next_index >= 1u64 << MERKLE_TREE_DEPTH {
            anyhow::bail!("tree {tree} is full");
        }
        Ok(sparse.insert(commitment))
    }

    pub fn root(&self, tree: u32) -> Fr {
        self.trees
            .get(&tree)
            .map(|t| t.root)
            .unwrap_or_else(|| empty_root(MERKLE_TREE_DEPTH))
    }

    pub fn next_position(&self, tree: u32) -> u64 {
        self.trees.get(&tree).map(|t| t.next_index).unwrap_or(0)
    }

    pub fn witness(&self, tree: u32, position: u64) -> Option<MerkleWitness> {
        self.trees.get(&tree)?.witness(position)
    }
}

impl MerkleTreeService for MemoryMerkleTree {
    async fn get_root(&self, tree: u32) -> anyhow::Result<Fr> {
        Ok(self.root(tree))
    }

    async fn get_merkle_witness(&self, tree: u32, position: u64) -> anyhow::Result<MerkleWitness> {
        self.witness(tree, position)
            .ok_or_else(|| anyhow::anyhow!("no leaf at position {position}"))
    }
}
