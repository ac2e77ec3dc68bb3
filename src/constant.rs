//! Constants that define the shape of the identity trees and the issuer's
//! storage layout.

/// Byte length of a serialised field element.
pub const ELEM_BYTES_LEN: usize = 32;
/// Number of 32-byte slots in a tree entry: four index slots plus four value slots.
pub const DATA_LEN: usize = 8;
/// Number of index slots in an entry. The remaining slots carry the value.
pub const INDEX_SLOTS: usize = 4;
/// Byte length of a whole serialised entry.
pub const ENTRY_BYTES_LEN: usize = ELEM_BYTES_LEN * DATA_LEN;
/// Maximum number of field elements a single Poseidon hash call accepts.
pub const MAX_HASH_ELEMS: usize = 8;

/// Hard cap on the depth of a sparse Merkle tree. Path bits are taken from a
/// 253-bit index, so deeper trees cannot discriminate keys.
pub const MAX_LEVELS_CAP: usize = 248;
/// Default depth used for the three identity trees.
pub const DEFAULT_MAX_LEVELS: usize = 140;

/// One-byte node tags of the on-disk node format.
pub const NODE_TAG_EMPTY: u8 = 0;
pub const NODE_TAG_LEAF: u8 = 1;
pub const NODE_TAG_MIDDLE: u8 = 2;
/// Byte length of a node payload: two 32-byte hashes.
pub const NODE_PAYLOAD_LEN: usize = 2 * ELEM_BYTES_LEN;

/// Storage key holding a tree's root pointer.
pub const KEY_CURRENT_ROOT: &[u8] = b"currentroot";
/// Storage prefix under which content-addressed tree nodes live.
pub const PREFIX_NODES: &[u8] = b"n/";

/// Issuer storage keys.
pub const KEY_CONFIG: &[u8] = b"config";
pub const KEY_ID: &[u8] = b"id";
pub const KEY_KOP: &[u8] = b"kop";
pub const KEY_STATE_ON_CHAIN: &[u8] = b"idenstateonchain";
pub const KEY_STATE_ON_CHAIN_DATA: &[u8] = b"idenstateonchaindata";
pub const KEY_STATE_PENDING: &[u8] = b"idenstatepending";
pub const PREFIX_STATE_LIST: &[u8] = b"idenstatelist/";
pub const PREFIX_CLAIM_STATE: &[u8] = b"claimtostate/";

/// Sub-prefixes delegating to the three tree stores.
pub const PREFIX_CLAIMS_TREE: &[u8] = b"claims/";
pub const PREFIX_REVOCATIONS_TREE: &[u8] = b"revocations/";
pub const PREFIX_ROOTS_TREE: &[u8] = b"roots/";
/// Sub-prefix delegating to the off-chain publisher store.
pub const PREFIX_OFFCHAIN: &[u8] = b"offchain/";

/// Publisher storage keys. Slot records are suffixed by the one-byte slot index.
pub const KEY_CACHE_IDX: &[u8] = b"cacheidx";
pub const KEY_PUB_IDEN_STATE: &[u8] = b"idenstate";
pub const KEY_PUB_CLAIMS_ROOT: &[u8] = b"claimsroot";
pub const KEY_PUB_ROOTS_ROOT: &[u8] = b"rootsroot";
pub const KEY_PUB_REVOCATIONS_ROOT: &[u8] = b"revocationsroot";
pub const KEY_PUB_ROOTS_TREE: &[u8] = b"rootstree";
pub const KEY_PUB_REVOCATIONS_TREE: &[u8] = b"revocationstree";

/// Signature domain tags, prepended to the message before hashing.
pub const SIG_PREFIX_SET_STATE: &[u8] = b"setState";
pub const SIG_PREFIX_AUTHZ: &[u8] = b"authz";

/// 64-bit claim type tags, stored in the low bytes of the first index slot.
pub const CLAIM_TYPE_BASIC: u64 = 0;
pub const CLAIM_TYPE_AUTHORIZE_KSIGN_BABYJUB: u64 = 1;

/// Free-form payload sizes of [`ClaimBasic`](crate::claims::ClaimBasic): two
/// 31-byte index pieces and three 31-byte value pieces. The top byte of every
/// slot stays zero so each slot is a valid field element.
pub const CLAIM_BASIC_INDEX_LEN: usize = 62;
pub const CLAIM_BASIC_VALUE_LEN: usize = 93;

/// Identifier layout: two-byte type, 27-byte genesis cut, two-byte checksum.
pub const ID_LEN: usize = 31;
pub const ID_TYPE_LEN: usize = 2;
pub const ID_GENESIS_LEN: usize = 27;
pub const ID_CHECKSUM_LEN: usize = 2;
/// Identifier type of issuers whose operational key is a Baby JubJub key.
pub const ID_TYPE_BJ_P0: [u8; ID_TYPE_LEN] = [0x00, 0x00];
