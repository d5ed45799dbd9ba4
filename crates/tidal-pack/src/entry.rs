use tidal_store::{Block, BlockKind};
use tidal_types::Cid;

/// Magic bytes opening every archive.
pub const MAGIC: &[u8; 4] = b"TDLA";

/// Current archive format version.
pub const VERSION: u32 = 1;

/// Header length: magic, version, root CID, block count.
pub const HEADER_LEN: usize = 4 + 4 + 32 + 4;

/// Trailer length: BLAKE3 checksum of everything before it.
pub const TRAILER_LEN: usize = 32;

/// A single block carried by an archive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackEntry {
    /// CID the block is claimed to have. Verified on read.
    pub cid: Cid,
    /// The block itself.
    pub block: Block,
}

impl PackEntry {
    pub fn new(cid: Cid, block: Block) -> Self {
        Self { cid, block }
    }

    /// Build an entry from a block, computing its CID.
    pub fn from_block(block: Block) -> Self {
        Self {
            cid: block.compute_cid(),
            block,
        }
    }

    pub fn kind(&self) -> BlockKind {
        self.block.kind
    }

    pub fn into_parts(self) -> (Cid, Block) {
        (self.cid, self.block)
    }
}

impl From<(Cid, Block)> for PackEntry {
    fn from((cid, block): (Cid, Block)) -> Self {
        Self::new(cid, block)
    }
}
