//! Storage-backed sparse Merkle tree: insert, lookup, proofs, snapshots and
//! the dump/import codec.

use super::node::Node;
use super::proof::Proof;
use super::SmtError;
use crate::constant::{
    KEY_CURRENT_ROOT, MAX_LEVELS_CAP, NODE_TAG_EMPTY, PREFIX_NODES,
};
use crate::hash::path_from_index;
use crate::types::{Entry, Hash, HASH_ZERO};
use crate::traits::{KvStorage, KvTx, TxCommit};
use std::collections::HashMap;
use std::io::{self, Read, Write};

/// A sparse Merkle tree rooted in a prefix-scoped store.
///
/// Writers must be serialised by the caller; concurrent readers against
/// historical roots are safe because nodes are content-addressed and never
/// overwritten. Stale nodes of superseded paths are not garbage-collected.
#[derive(Debug)]
pub struct MerkleTree<S: KvStorage> {
    storage: S,
    root_key: Hash,
    max_levels: usize,
}

impl<S: KvStorage> MerkleTree<S> {
    /// Opens the tree stored under `storage`, creating it if absent. On first
    /// open the root pointer is initialised to the zero hash.
    pub fn new(storage: S, max_levels: usize) -> Result<Self, SmtError> {
        if max_levels == 0 || max_levels > MAX_LEVELS_CAP {
            return Err(SmtError::InvalidMaxLevels(max_levels));
        }
        let root_key = match storage.get(KEY_CURRENT_ROOT) {
            Ok(bytes) => Hash::from_slice(&bytes).ok_or(SmtError::InvalidNode)?,
            Err(crate::traits::StorageError::NotFound) => {
                let mut tx = storage.new_tx()?;
                tx.put(KEY_CURRENT_ROOT, &HASH_ZERO.0);
                tx.commit()?;
                HASH_ZERO
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            storage,
            root_key,
            max_levels,
        })
    }

    /// The current root.
    #[inline]
    pub fn root_key(&self) -> Hash {
        self.root_key
    }

    #[inline]
    pub fn max_levels(&self) -> usize {
        self.max_levels
    }

    /// Inserts a leaf in its own transaction.
    pub fn add(&mut self, h_index: &Hash, h_value: &Hash) -> Result<(), SmtError> {
        let mut tx = self.storage.new_tx()?;
        let new_root = self.add_raw(&mut tx, h_index, h_value)?;
        tx.commit()?;
        self.root_key = new_root;
        Ok(())
    }

    /// Inserts an entry, validating that every slot is a field element.
    pub fn add_entry(&mut self, entry: &Entry) -> Result<(), SmtError> {
        self.add(&entry.h_index()?, &entry.h_value()?)
    }

    /// Inserts a leaf into an open transaction and returns the new root. All
    /// node writes land before the root pointer; the caller commits and then
    /// installs the root with [`set_root`](Self::set_root). Reads resolve
    /// against committed data, which is sound because content-addressed nodes
    /// written by this very transaction are never re-read.
    pub fn add_raw<T: KvTx>(
        &self,
        tx: &mut T,
        h_index: &Hash,
        h_value: &Hash,
    ) -> Result<Hash, SmtError> {
        h_index.to_fr()?;
        h_value.to_fr()?;
        let path = path_from_index(h_index, self.max_levels);
        let new_root = self.add_at(tx, &self.root_key, h_index, h_value, &path, 0)?;
        tx.put(KEY_CURRENT_ROOT, &new_root.0);
        Ok(new_root)
    }

    /// Installs a root previously returned by [`add_raw`](Self::add_raw),
    /// after its transaction committed.
    pub(crate) fn set_root(&mut self, root: Hash) {
        self.root_key = root;
    }

    fn add_at<T: KvTx>(
        &self,
        tx: &mut T,
        key: &Hash,
        h_index: &Hash,
        h_value: &Hash,
        path: &[bool],
        lvl: usize,
    ) -> Result<Hash, SmtError> {
        if lvl == self.max_levels {
            return Err(SmtError::ReachedMaxLevel);
        }
        match self.get_node(key)? {
            Node::Empty => self.put_node(
                tx,
                &Node::Leaf {
                    h_index: *h_index,
                    h_value: *h_value,
                },
            ),
            Node::Leaf {
                h_index: old_hi,
                h_value: old_hv,
            } => {
                if old_hi == *h_index {
                    return Err(SmtError::EntryIndexAlreadyExists);
                }
                let old_path = path_from_index(&old_hi, self.max_levels);
                self.extend_leaf(tx, h_index, h_value, &old_hi, &old_hv, path, &old_path, lvl)
            }
            Node::Middle { left, right } => {
                let (next, sib, went_right) = if path[lvl] {
                    (right, left, true)
                } else {
                    (left, right, false)
                };
                let child = self.add_at(tx, &next, h_index, h_value, path, lvl + 1)?;
                let mid = if went_right {
                    Node::Middle {
                        left: sib,
                        right: child,
                    }
                } else {
                    Node::Middle {
                        left: child,
                        right: sib,
                    }
                };
                self.put_node(tx, &mid)
            }
        }
    }

    /// Pushes an existing leaf down until its path diverges from the new one,
    /// then hangs both under a fresh middle node.
    #[allow(clippy::too_many_arguments)]
    fn extend_leaf<T: KvTx>(
        &self,
        tx: &mut T,
        h_index: &Hash,
        h_value: &Hash,
        old_hi: &Hash,
        old_hv: &Hash,
        path: &[bool],
        old_path: &[bool],
        lvl: usize,
    ) -> Result<Hash, SmtError> {
        if lvl == self.max_levels {
            return Err(SmtError::ReachedMaxLevel);
        }
        if path[lvl] == old_path[lvl] {
            let child =
                self.extend_leaf(tx, h_index, h_value, old_hi, old_hv, path, old_path, lvl + 1)?;
            let mid = if path[lvl] {
                Node::Middle {
                    left: HASH_ZERO,
                    right: child,
                }
            } else {
                Node::Middle {
                    left: child,
                    right: HASH_ZERO,
                }
            };
            return self.put_node(tx, &mid);
        }
        let new_leaf = self.put_node(
            tx,
            &Node::Leaf {
                h_index: *h_index,
                h_value: *h_value,
            },
        )?;
        let old_leaf = Node::Leaf {
            h_index: *old_hi,
            h_value: *old_hv,
        }
        .key()?;
        let mid = if path[lvl] {
            Node::Middle {
                left: old_leaf,
                right: new_leaf,
            }
        } else {
            Node::Middle {
                left: new_leaf,
                right: old_leaf,
            }
        };
        self.put_node(tx, &mid)
    }

    /// Returns the leaf found walking the path of `h_index` from the current
    /// root, along with the traversed siblings. A returned index different
    /// from the queried one is an exclusion witness: the path is occupied by
    /// another leaf.
    pub fn get(&self, h_index: &Hash) -> Result<(Hash, Hash, Vec<Hash>), SmtError> {
        self.get_at_root(h_index, &self.root_key)
    }

    /// [`get`](Self::get) against a historical root.
    pub fn get_at_root(
        &self,
        h_index: &Hash,
        root: &Hash,
    ) -> Result<(Hash, Hash, Vec<Hash>), SmtError> {
        let path = path_from_index(h_index, self.max_levels);
        let (terminal, siblings) = self.walk_down(root, &path)?;
        match terminal {
            Node::Leaf { h_index, h_value } => Ok((h_index, h_value, siblings)),
            _ => Err(SmtError::NotFound),
        }
    }

    /// Builds an inclusion proof if `h_index` is present in the tree rooted at
    /// the current root, an exclusion proof otherwise.
    pub fn generate_proof(&self, h_index: &Hash) -> Result<Proof, SmtError> {
        self.generate_proof_from_root(h_index, &self.root_key)
    }

    /// [`generate_proof`](Self::generate_proof) against a historical root.
    pub fn generate_proof_from_root(
        &self,
        h_index: &Hash,
        root: &Hash,
    ) -> Result<Proof, SmtError> {
        let path = path_from_index(h_index, self.max_levels);
        let (terminal, siblings) = self.walk_down(root, &path)?;
        Ok(match terminal {
            Node::Empty => Proof::new_exclusion(siblings, None),
            Node::Leaf {
                h_index: found_hi,
                h_value: found_hv,
            } => {
                if found_hi == *h_index {
                    Proof::new_inclusion(siblings)
                } else {
                    Proof::new_exclusion(siblings, Some((found_hi, found_hv)))
                }
            }
            Node::Middle { .. } => unreachable!("walk_down only stops at empty or leaf"),
        })
    }

    /// A read-only view pinned to `root`. Fails if the root is not resolvable
    /// in the node store.
    pub fn snapshot(&self, root: Hash) -> Result<Snapshot<'_, S>, SmtError> {
        if !root.is_zero() {
            self.get_node(&root)?;
        }
        Ok(Snapshot { tree: self, root })
    }

    /// Writes every node reachable from `root` (the current root when absent)
    /// as `<tag:1><payload:64>` frames in depth-first order, suitable for
    /// bit-exact re-import.
    pub fn dump_tree<W: Write>(&self, w: &mut W, root: Option<&Hash>) -> Result<(), SmtError> {
        let root = root.copied().unwrap_or(self.root_key);
        self.walk(&root, &mut |node| w.write_all(&node.to_bytes()).map_err(Into::into))
    }

    /// Depth-first pre-order traversal of all nodes reachable from `root`.
    pub fn walk<F>(&self, root: &Hash, f: &mut F) -> Result<(), SmtError>
    where
        F: FnMut(&Node) -> Result<(), SmtError>,
    {
        if root.is_zero() {
            return Ok(());
        }
        let node = self.get_node(root)?;
        f(&node)?;
        if let Node::Middle { left, right } = node {
            self.walk(&left, f)?;
            self.walk(&right, f)?;
        }
        Ok(())
    }

    /// Rebuilds the node store from a [`dump_tree`](Self::dump_tree) stream,
    /// recomputing every node hash, and installs the recomputed root. The
    /// stream must be self-contained: a middle node referencing a node absent
    /// from the stream is rejected.
    pub fn import_tree<R: Read>(&mut self, r: &mut R) -> Result<Hash, SmtError> {
        let mut nodes: Vec<(Hash, Node)> = Vec::new();
        loop {
            let mut tag = [0u8; 1];
            match r.read_exact(&mut tag) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            }
            if tag[0] == NODE_TAG_EMPTY {
                return Err(SmtError::BadImport("empty node in dump".to_string()));
            }
            let mut payload = [0u8; crate::constant::NODE_PAYLOAD_LEN];
            r.read_exact(&mut payload)
                .map_err(|_| SmtError::BadImport("truncated frame".to_string()))?;
            let mut frame = Vec::with_capacity(1 + payload.len());
            frame.push(tag[0]);
            frame.extend_from_slice(&payload);
            let node = Node::from_bytes(&frame)
                .map_err(|_| SmtError::BadImport("unknown node tag".to_string()))?;
            nodes.push((node.key()?, node));
        }
        let Some(&(root, _)) = nodes.first() else {
            return Err(SmtError::BadImport("empty dump".to_string()));
        };

        // Every reference must resolve within the imported set before any
        // write happens.
        let by_key: HashMap<Hash, Node> = nodes.iter().copied().collect();
        let mut stack = vec![root];
        while let Some(key) = stack.pop() {
            match by_key.get(&key) {
                Some(Node::Middle { left, right }) => {
                    for child in [left, right] {
                        if !child.is_zero() {
                            stack.push(*child);
                        }
                    }
                }
                Some(_) => {}
                None => {
                    return Err(SmtError::BadImport(format!(
                        "dangling reference to node {key}"
                    )))
                }
            }
        }

        let mut tx = self.storage.new_tx()?;
        for (key, node) in &nodes {
            tx.put(&node_storage_key(key), &node.to_bytes());
        }
        tx.put(KEY_CURRENT_ROOT, &root.0);
        tx.commit()?;
        self.root_key = root;
        Ok(root)
    }

    fn walk_down(&self, root: &Hash, path: &[bool]) -> Result<(Node, Vec<Hash>), SmtError> {
        let mut siblings = Vec::new();
        let mut key = *root;
        loop {
            let node = self.get_node(&key)?;
            match node {
                Node::Empty | Node::Leaf { .. } => return Ok((node, siblings)),
                Node::Middle { left, right } => {
                    let lvl = siblings.len();
                    if lvl == path.len() {
                        return Err(SmtError::ReachedMaxLevel);
                    }
                    let (next, sib) = if path[lvl] { (right, left) } else { (left, right) };
                    siblings.push(sib);
                    key = next;
                }
            }
        }
    }

    fn get_node(&self, key: &Hash) -> Result<Node, SmtError> {
        if key.is_zero() {
            return Ok(Node::Empty);
        }
        let bytes = self.storage.get(&node_storage_key(key))?;
        Node::from_bytes(&bytes)
    }

    fn put_node<T: KvTx>(&self, tx: &mut T, node: &Node) -> Result<Hash, SmtError> {
        let key = node.key()?;
        if !key.is_zero() {
            tx.put(&node_storage_key(&key), &node.to_bytes());
        }
        Ok(key)
    }
}

fn node_storage_key(key: &Hash) -> Vec<u8> {
    let mut full = Vec::with_capacity(PREFIX_NODES.len() + key.0.len());
    full.extend_from_slice(PREFIX_NODES);
    full.extend_from_slice(&key.0);
    full
}

/// A read-only view of a tree pinned to one root.
#[derive(Debug)]
pub struct Snapshot<'a, S: KvStorage> {
    tree: &'a MerkleTree<S>,
    root: Hash,
}

impl<S: KvStorage> Snapshot<'_, S> {
    #[inline]
    pub fn root_key(&self) -> Hash {
        self.root
    }

    pub fn get(&self, h_index: &Hash) -> Result<(Hash, Hash, Vec<Hash>), SmtError> {
        self.tree.get_at_root(h_index, &self.root)
    }

    pub fn generate_proof(&self, h_index: &Hash) -> Result<Proof, SmtError> {
        self.tree.generate_proof_from_root(h_index, &self.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem_store::MemStore;
    use crate::smt::verify_proof;

    fn new_tree(max_levels: usize) -> MerkleTree<MemStore> {
        MerkleTree::new(MemStore::new(), max_levels).unwrap()
    }

    #[test]
    fn test_new_initialises_root() {
        let store = MemStore::new();
        let mt = MerkleTree::new(store.clone(), 140).unwrap();
        assert_eq!(mt.root_key(), HASH_ZERO);
        assert_eq!(store.get(KEY_CURRENT_ROOT).unwrap(), HASH_ZERO.0.to_vec());
        // Reopening picks the stored root up.
        let mt2 = MerkleTree::new(store, 140).unwrap();
        assert_eq!(mt2.root_key(), HASH_ZERO);

        assert!(matches!(
            MerkleTree::new(MemStore::new(), 0),
            Err(SmtError::InvalidMaxLevels(0))
        ));
        assert!(matches!(
            MerkleTree::new(MemStore::new(), MAX_LEVELS_CAP + 1),
            Err(SmtError::InvalidMaxLevels(_))
        ));
    }

    /// Insert `(1, 2)` and `(3, 4)` at depth 140, then look both sides up.
    #[test]
    fn test_add_and_get() {
        let mut mt = new_tree(140);
        mt.add(&Hash::from_u64(1), &Hash::from_u64(2)).unwrap();
        mt.add(&Hash::from_u64(3), &Hash::from_u64(4)).unwrap();
        assert!(!mt.root_key().is_zero());

        let (hi, hv, _) = mt.get(&Hash::from_u64(1)).unwrap();
        assert_eq!((hi, hv), (Hash::from_u64(1), Hash::from_u64(2)));

        // 5 shares its first path bit with 1 and ends on 1's leaf: an
        // exclusion witness by another occupant.
        let (hi, hv, _) = mt.get(&Hash::from_u64(5)).unwrap();
        assert_eq!((hi, hv), (Hash::from_u64(1), Hash::from_u64(2)));

        // 4 walks into an empty subtree.
        assert!(matches!(
            mt.get(&Hash::from_u64(4)),
            Err(SmtError::NotFound)
        ));
    }

    #[test]
    fn test_duplicate_index_rejected() {
        let mut mt = new_tree(140);
        mt.add(&Hash::from_u64(1), &Hash::from_u64(2)).unwrap();
        assert!(matches!(
            mt.add(&Hash::from_u64(1), &Hash::from_u64(9)),
            Err(SmtError::EntryIndexAlreadyExists)
        ));
    }

    #[test]
    fn test_out_of_field_rejected() {
        let mut mt = new_tree(140);
        let modulus = {
            use ark_ff::{BigInteger, PrimeField};
            let bytes = <crate::hash::Fr as PrimeField>::MODULUS.to_bytes_be();
            let mut out = [0u8; 32];
            out[32 - bytes.len()..].copy_from_slice(&bytes);
            Hash(out)
        };
        assert!(matches!(
            mt.add(&modulus, &Hash::from_u64(1)),
            Err(SmtError::Hash(crate::hash::HashError::OutOfField))
        ));
    }

    /// Keys whose paths only diverge below the maximum depth cannot coexist.
    #[test]
    fn test_reached_max_level() {
        let mut mt = new_tree(2);
        mt.add(&Hash::from_u64(1), &Hash::from_u64(1)).unwrap();
        // 1 = 0b001 and 5 = 0b101 share their two lowest bits.
        assert!(matches!(
            mt.add(&Hash::from_u64(5), &Hash::from_u64(1)),
            Err(SmtError::ReachedMaxLevel)
        ));
    }

    /// The root is a set commitment: insertion order must not matter.
    #[test]
    fn test_insertion_order_independence() {
        let entries: Vec<(Hash, Hash)> = (1u64..=9)
            .map(|i| (Hash::from_u64(i * 7 + 1), Hash::from_u64(i * 31)))
            .collect();

        let mut forward = new_tree(140);
        for (hi, hv) in &entries {
            forward.add(hi, hv).unwrap();
        }
        let mut backward = new_tree(140);
        for (hi, hv) in entries.iter().rev() {
            backward.add(hi, hv).unwrap();
        }
        assert_eq!(forward.root_key(), backward.root_key());
    }

    #[test]
    fn test_proofs_inclusion_and_exclusion() {
        let mut mt = new_tree(140);
        mt.add(&Hash::from_u64(1), &Hash::from_u64(2)).unwrap();
        mt.add(&Hash::from_u64(3), &Hash::from_u64(4)).unwrap();
        let root = mt.root_key();

        let proof = mt.generate_proof(&Hash::from_u64(1)).unwrap();
        assert!(proof.existence());
        assert!(verify_proof(
            &root,
            &proof,
            &Hash::from_u64(1),
            &Hash::from_u64(2)
        ));
        // Wrong value or wrong root must not verify.
        assert!(!verify_proof(
            &root,
            &proof,
            &Hash::from_u64(1),
            &Hash::from_u64(9)
        ));
        assert!(!verify_proof(
            &HASH_ZERO,
            &proof,
            &Hash::from_u64(1),
            &Hash::from_u64(2)
        ));

        // Path occupied by another leaf.
        let proof = mt.generate_proof(&Hash::from_u64(5)).unwrap();
        assert!(!proof.existence());
        assert!(proof.aux_node().is_some());
        assert!(verify_proof(&root, &proof, &Hash::from_u64(5), &HASH_ZERO));

        // Path ending in an empty subtree.
        let proof = mt.generate_proof(&Hash::from_u64(4)).unwrap();
        assert!(!proof.existence());
        assert!(proof.aux_node().is_none());
        assert!(verify_proof(&root, &proof, &Hash::from_u64(4), &HASH_ZERO));
    }

    /// Proofs generated from an old root keep verifying against that root.
    #[test]
    fn test_historical_roots() {
        let mut mt = new_tree(140);
        mt.add(&Hash::from_u64(1), &Hash::from_u64(2)).unwrap();
        let old_root = mt.root_key();
        mt.add(&Hash::from_u64(3), &Hash::from_u64(4)).unwrap();
        assert_ne!(old_root, mt.root_key());

        let proof = mt
            .generate_proof_from_root(&Hash::from_u64(1), &old_root)
            .unwrap();
        assert!(verify_proof(
            &old_root,
            &proof,
            &Hash::from_u64(1),
            &Hash::from_u64(2)
        ));
        assert!(!verify_proof(
            &mt.root_key(),
            &proof,
            &Hash::from_u64(1),
            &Hash::from_u64(2)
        ));

        // 3 is absent from the old root but present in the current one.
        let proof = mt
            .generate_proof_from_root(&Hash::from_u64(3), &old_root)
            .unwrap();
        assert!(!proof.existence());

        let snap = mt.snapshot(old_root).unwrap();
        assert_eq!(snap.root_key(), old_root);
        let (hi, _, _) = snap.get(&Hash::from_u64(1)).unwrap();
        assert_eq!(hi, Hash::from_u64(1));

        assert!(mt.snapshot(Hash::from_u64(0xbad)).is_err());
    }

    /// `import_tree(dump_tree(root)) == root`, and the imported store answers
    /// identically.
    #[test]
    fn test_dump_import_round_trip() {
        let mut mt = new_tree(140);
        for i in 1u64..=10 {
            mt.add(&Hash::from_u64(i * 3), &Hash::from_u64(i)).unwrap();
        }
        let mut blob = Vec::new();
        mt.dump_tree(&mut blob, None).unwrap();

        let mut imported = new_tree(140);
        let root = imported.import_tree(&mut blob.as_slice()).unwrap();
        assert_eq!(root, mt.root_key());
        assert_eq!(imported.root_key(), mt.root_key());

        for i in 1u64..=10 {
            let key = Hash::from_u64(i * 3);
            assert_eq!(imported.get(&key).unwrap(), mt.get(&key).unwrap());
            let proof = imported.generate_proof(&key).unwrap();
            assert!(verify_proof(&root, &proof, &key, &Hash::from_u64(i)));
        }

        // A re-dump of the imported tree is bit-exact.
        let mut blob2 = Vec::new();
        imported.dump_tree(&mut blob2, None).unwrap();
        assert_eq!(blob, blob2);
    }

    #[test]
    fn test_import_rejects_bad_streams() {
        let mut mt = new_tree(140);
        mt.add(&Hash::from_u64(1), &Hash::from_u64(2)).unwrap();
        mt.add(&Hash::from_u64(3), &Hash::from_u64(4)).unwrap();
        let mut blob = Vec::new();
        mt.dump_tree(&mut blob, None).unwrap();

        let mut imported = new_tree(140);
        // Truncated mid-frame.
        assert!(matches!(
            imported.import_tree(&mut &blob[..blob.len() - 1]),
            Err(SmtError::BadImport(_))
        ));
        // Missing the trailing frame leaves a dangling reference.
        assert!(matches!(
            imported.import_tree(&mut &blob[..blob.len() - 65]),
            Err(SmtError::BadImport(_))
        ));
        // Empty stream.
        assert!(matches!(
            imported.import_tree(&mut &blob[..0]),
            Err(SmtError::BadImport(_))
        ));
    }
}
