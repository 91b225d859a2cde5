//! Classified block lists carried by a buffer.

use mediabuf_block::{ConstGraphicBlock, ConstLinearBlock};

/// Shape classification of a buffer, derived from the kind and count of
/// its blocks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferKind {
    /// A single linear block.
    Linear,
    /// Multiple linear chunks, in order.
    LinearChunks,
    /// A single graphic block.
    Graphic,
    /// Multiple graphic chunks, in order.
    GraphicChunks,
}

/// The ordered, uniform-kind block list of a buffer.
///
/// Mixing linear and graphic blocks in one buffer is unrepresentable: the
/// two kinds are distinct variants. Classification is recomputed from the
/// block count, never stored.
#[derive(Clone)]
pub enum BufferData {
    Linear(Vec<ConstLinearBlock>),
    Graphic(Vec<ConstGraphicBlock>),
}

impl BufferData {
    /// Wraps an ordered list of linear blocks.
    ///
    /// # Panics
    ///
    /// Panics if `blocks` is empty; a buffer without blocks is caller
    /// misuse, not a recoverable condition.
    pub fn from_linear_blocks(blocks: Vec<ConstLinearBlock>) -> BufferData {
        assert!(!blocks.is_empty(), "buffer data requires at least one block");
        BufferData::Linear(blocks)
    }

    /// Wraps an ordered list of graphic blocks.
    ///
    /// # Panics
    ///
    /// Panics if `blocks` is empty.
    pub fn from_graphic_blocks(blocks: Vec<ConstGraphicBlock>) -> BufferData {
        assert!(!blocks.is_empty(), "buffer data requires at least one block");
        BufferData::Graphic(blocks)
    }

    /// Returns the shape classification.
    pub fn kind(&self) -> BufferKind {
        match self {
            BufferData::Linear(blocks) if blocks.len() == 1 => BufferKind::Linear,
            BufferData::Linear(_) => BufferKind::LinearChunks,
            BufferData::Graphic(blocks) if blocks.len() == 1 => BufferKind::Graphic,
            BufferData::Graphic(_) => BufferKind::GraphicChunks,
        }
    }

    /// Returns the linear blocks in aggregation order, or an empty slice
    /// for graphic data.
    pub fn linear_blocks(&self) -> &[ConstLinearBlock] {
        match self {
            BufferData::Linear(blocks) => blocks,
            BufferData::Graphic(_) => &[],
        }
    }

    /// Returns the graphic blocks in aggregation order, or an empty slice
    /// for linear data.
    pub fn graphic_blocks(&self) -> &[ConstGraphicBlock] {
        match self {
            BufferData::Linear(_) => &[],
            BufferData::Graphic(blocks) => blocks,
        }
    }
}

impl std::fmt::Debug for BufferData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = match self {
            BufferData::Linear(blocks) => blocks.len(),
            BufferData::Graphic(blocks) => blocks.len(),
        };
        f.debug_struct("BufferData")
            .field("kind", &self.kind())
            .field("blocks", &count)
            .finish()
    }
}
