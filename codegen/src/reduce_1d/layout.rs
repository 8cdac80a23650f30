//! Scratch workspace layout.
//!
//! The partial kernel writes one slot per group for every descriptor and the
//! final kernel reads them back. Both kernels, and the workspace-size query,
//! call [`ScratchLayout::compute`] independently; agreement follows from the
//! function being pure over the descriptor order.

use reductor_dtype::INDEX_DTYPE;

use super::descriptor::ReductionDescriptor;

/// Alignment of every region start, enough for the widest vector load.
pub const REGION_ALIGN: usize = 16;

/// Byte offsets of one descriptor's slots inside the workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Region {
    /// Position slots, present for indexing reductions.
    pub index_offset: Option<usize>,
    pub value_offset: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScratchLayout {
    regions: Vec<Region>,
    total_bytes: usize,
}

const fn align_up(offset: usize) -> usize {
    offset.div_ceil(REGION_ALIGN) * REGION_ALIGN
}

impl ScratchLayout {
    /// Partition the workspace for `group_count` slots per descriptor.
    ///
    /// Indexing descriptors get an index region followed by a value region;
    /// value-only descriptors get a value region.
    pub fn compute(descriptors: &[ReductionDescriptor], group_count: usize) -> Self {
        let mut offset = 0;
        let mut regions = Vec::with_capacity(descriptors.len());
        for rd in descriptors {
            let index_offset = if rd.is_indexing() {
                let start = align_up(offset);
                offset = start + group_count * INDEX_DTYPE.bytes();
                Some(start)
            } else {
                None
            };
            let value_offset = align_up(offset);
            offset = value_offset + group_count * rd.params.dtype.bytes();
            regions.push(Region { index_offset, value_offset });
        }
        Self { regions, total_bytes: offset }
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }
}
