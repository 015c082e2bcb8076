//! Bounded window of height-contiguous block headers

use crate::error::{BftError, BftResult};
use crate::header::BlockHeader;
use crate::store::HeaderHistory;
use kestrel_primitives::PublicKey;
use std::collections::VecDeque;

/// Fixed-capacity buffer of recent headers with contiguous heights, ordered
/// from lowest to highest.
#[derive(Debug, Clone, Default)]
pub struct HeadersList {
    items: VecDeque<BlockHeader>,
    size: usize,
}

impl HeadersList {
    /// Create an empty list holding at most `size` headers
    pub fn new(size: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(size),
            size,
        }
    }

    /// Lowest header
    pub fn first(&self) -> Option<&BlockHeader> {
        self.items.front()
    }

    /// Highest header
    pub fn last(&self) -> Option<&BlockHeader> {
        self.items.back()
    }

    /// Capacity
    pub fn size(&self) -> usize {
        self.size
    }

    /// Change capacity; shrinking evicts the lowest headers immediately.
    pub fn set_size(&mut self, size: usize) {
        if self.items.len() > size {
            let excess = self.items.len() - size;
            self.items.drain(..excess);
        }
        self.size = size;
    }

    /// Number of headers held
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate from lowest to highest
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &BlockHeader> {
        self.items.iter()
    }

    /// Append above the highest header or prepend below the lowest one.
    ///
    /// On overflow the header at the opposite end is evicted and returned.
    pub fn add(&mut self, header: BlockHeader) -> BftResult<Option<BlockHeader>> {
        let (first, last) = match (self.items.front(), self.items.back()) {
            (Some(first), Some(last)) => (first.height, last.height),
            _ => {
                self.items.push_back(header);
                return Ok(self.evict_front_overflow());
            }
        };

        if last.checked_add(1) == Some(header.height) {
            self.items.push_back(header);
            Ok(self.evict_front_overflow())
        } else if first.checked_sub(1) == Some(header.height) {
            self.items.push_front(header);
            if self.items.len() > self.size {
                return Ok(self.items.pop_back());
            }
            Ok(None)
        } else {
            Err(BftError::NonContiguousHeader {
                height: header.height,
                first,
                last,
            })
        }
    }

    fn evict_front_overflow(&mut self) -> Option<BlockHeader> {
        if self.items.len() > self.size {
            return self.items.pop_front();
        }
        None
    }

    /// Remove every header above `above_height` and return them in ascending
    /// order. Without a height, everything but the lowest header is removed.
    pub fn remove(&mut self, above_height: Option<u32>) -> Vec<BlockHeader> {
        let Some(first) = self.items.front().map(|h| h.height) else {
            return Vec::new();
        };
        let above_height = above_height.unwrap_or(first);
        let keep = self
            .items
            .iter()
            .take_while(|h| h.height <= above_height)
            .count();
        self.items.drain(keep..).collect()
    }

    /// Highest `n` headers, ascending
    pub fn top(&self, n: usize) -> Vec<&BlockHeader> {
        let skip = self.items.len().saturating_sub(n);
        self.items.iter().skip(skip).collect()
    }

    /// Drain all headers, ascending
    pub fn empty(&mut self) -> Vec<BlockHeader> {
        self.items.drain(..).collect()
    }

    /// Header at `height`, located by offset from the lowest height
    pub fn get(&self, height: u32) -> Option<&BlockHeader> {
        let first = self.items.front()?.height;
        let offset = height.checked_sub(first)? as usize;
        self.items.get(offset)
    }
}

impl HeaderHistory for HeadersList {
    fn len(&self) -> usize {
        self.items.len()
    }

    fn header_at(&self, height: u32) -> Option<&BlockHeader> {
        self.get(height)
    }

    fn recent_header(
        &self,
        generator: Option<&PublicKey>,
        max_height: Option<u32>,
    ) -> Option<&BlockHeader> {
        self.items.iter().rev().find(|h| {
            max_height.map_or(true, |max| h.height <= max)
                && generator.map_or(true, |key| &h.generator_public_key == key)
        })
    }
}
