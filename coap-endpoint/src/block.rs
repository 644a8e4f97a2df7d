// Copyright 2019 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

use std::fmt::{Debug, Display, Formatter};

/// Type for interpreting `Block1` and `Block2` option values.
///
/// The wire form packs the block number into the upper 28 bits, the
/// more flag into bit 3, and the block size exponent into the low three
/// bits, where `size = 2**(szx + 4)`.
#[derive(Copy, Clone, Eq, Ord, Hash, PartialOrd, PartialEq)]
pub struct BlockInfo(pub u32);

impl BlockInfo {
    const MORE_FLAG: u32 = 0b1000;

    /// Maximum legal value for `num`.
    pub const NUM_MAX: u32 = (1 << 20) - 1;

    const SZX_RESERVED: u8 = 0b111;

    /// Maximum legal value for `szx`, giving a 1024-byte block size.
    pub const SZX_MAX: u8 = Self::SZX_RESERVED - 1;

    /// Constructs a new `BlockInfo` from the number, more flag, and size
    /// exponent.
    pub fn new(num: u32, m: bool, szx: u8) -> Option<BlockInfo> {
        if num > Self::NUM_MAX || szx > Self::SZX_MAX {
            None
        } else {
            Some(BlockInfo((num << 4) | ((m as u32) << 3) | szx as u32))
        }
    }

    /// Constructs a new `BlockInfo` from the number, more flag, and block
    /// size in bytes. The size must be a power of two between 16 and 1024
    /// inclusive.
    pub fn with_size(num: u32, m: bool, size: u32) -> Option<BlockInfo> {
        if !size.is_power_of_two() || !(16..=1024).contains(&size) {
            return None;
        }
        Self::new(num, m, (size.trailing_zeros() - 4) as u8)
    }

    /// Block number value.
    #[inline]
    pub fn num(&self) -> u32 {
        self.0 >> 4
    }

    /// More flag value. If set, there are more blocks to follow.
    #[inline]
    pub fn more_flag(&self) -> bool {
        (self.0 & Self::MORE_FLAG) == Self::MORE_FLAG
    }

    /// Block size exponent field value.
    #[inline]
    pub fn szx(&self) -> u8 {
        self.0 as u8 & 0b111
    }

    /// The length of this block, in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        1 << (self.szx() as usize + 4)
    }

    /// The offset (in bytes) that this block starts at.
    #[inline]
    pub fn offset(&self) -> usize {
        self.num() as usize * self.len()
    }

    /// Checks the validity of the contained value.
    pub fn is_invalid(&self) -> bool {
        self.num() > Self::NUM_MAX || self.szx() == Self::SZX_RESERVED
    }

    /// Checks the contained value for validity and, if valid, returns it
    /// in an `Option`.
    pub fn valid(self) -> Option<BlockInfo> {
        if self.is_invalid() {
            None
        } else {
            Some(self)
        }
    }

    /// Calculates what the next block will be, if any.
    pub fn next(&self) -> Option<BlockInfo> {
        if self.num() < Self::NUM_MAX {
            BlockInfo(self.0 + 0x10).valid()
        } else {
            None
        }
    }

    /// Calculates a smaller block size that maintains this block's offset.
    pub fn smaller(&self) -> Option<BlockInfo> {
        let szx = self.szx();
        if szx != Self::SZX_RESERVED && szx > 0 {
            Self::new(self.num() * 2, self.more_flag(), szx - 1)
        } else {
            None
        }
    }

    /// Returns this `BlockInfo`'s value *with* the more flag set.
    pub fn with_more_flag(&self) -> BlockInfo {
        BlockInfo(self.0 | Self::MORE_FLAG)
    }

    /// Returns this `BlockInfo`'s value *without* the more flag set.
    pub fn without_more_flag(&self) -> BlockInfo {
        BlockInfo(self.0 & !Self::MORE_FLAG)
    }
}

impl From<u32> for BlockInfo {
    fn from(x: u32) -> Self {
        BlockInfo(x)
    }
}

impl Default for BlockInfo {
    /// Returns a block info with an offset of zero and a block size of 1024.
    fn default() -> Self {
        BlockInfo(6)
    }
}

impl Display for BlockInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.num(),
            self.more_flag() as u8,
            self.len()
        )?;
        if self.is_invalid() {
            f.write_str("(!)")
        } else {
            Ok(())
        }
    }
}

impl Debug for BlockInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "BlockInfo(0x{:06X};", self.0)?;
        Display::fmt(self, f)?;
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let block = BlockInfo::default();
        assert_eq!(false, block.more_flag());
        assert_eq!(6, block.szx());
        assert_eq!(0, block.num());
        assert_eq!(1024, block.len());
        assert_eq!(0, block.offset());
        assert_eq!(false, block.is_invalid());
    }

    #[test]
    fn round_trip_all_sizes() {
        for &size in &[16u32, 32, 64, 128, 256, 512, 1024] {
            for &num in &[0u32, 1, 7, 0x1234, BlockInfo::NUM_MAX] {
                for &more in &[false, true] {
                    let block = BlockInfo::with_size(num, more, size).unwrap();
                    let decoded = BlockInfo(block.0).valid().unwrap();
                    assert_eq!(num, decoded.num());
                    assert_eq!(more, decoded.more_flag());
                    assert_eq!(size as usize, decoded.len());
                }
            }
        }
    }

    #[test]
    fn rejects_bad_sizes() {
        assert_eq!(None, BlockInfo::with_size(0, false, 8));
        assert_eq!(None, BlockInfo::with_size(0, false, 2048));
        assert_eq!(None, BlockInfo::with_size(0, false, 100));
        assert_eq!(None, BlockInfo::new(0, false, 7));
        assert_eq!(None, BlockInfo::new(BlockInfo::NUM_MAX + 1, false, 0));
    }

    #[test]
    fn reserved_szx_is_invalid() {
        let block = BlockInfo(0b111);
        assert!(block.is_invalid());
        assert_eq!(None, block.valid());
    }

    #[test]
    fn next_and_smaller() {
        let block = BlockInfo::default().next().unwrap();
        assert_eq!(1, block.num());
        assert_eq!(1024, block.offset());

        let smaller = block.smaller().unwrap();
        assert_eq!(512, smaller.len());
        assert_eq!(block.offset(), smaller.offset());

        let last = BlockInfo::new(BlockInfo::NUM_MAX, false, 6).unwrap();
        assert_eq!(None, last.next());
    }
}
