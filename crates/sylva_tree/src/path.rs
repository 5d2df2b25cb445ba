//! Nibble-packed child-offset paths.
//!
//! A path is the sequence of child offsets leading from some ascendant down
//! to a node. Offsets are written as 4-bit nibbles, high nibble first:
//!
//! | nibble | meaning                                |
//! |--------|----------------------------------------|
//! | `0..=13` | add the value and end the offset     |
//! | `0xE`  | add 14 and continue                    |
//! | `0xF`  | add 32 and continue                    |
//!
//! An odd number of nibbles is completed with a `0xF` low nibble. Since an
//! offset never ends with a continuation nibble, a trailing `0xF` is always
//! padding, which lets [`NodePath::last_position`] read the last offset
//! backwards without decoding the path.

use crate::error::{TreeError, TreeResult};
use serde::{Deserialize, Serialize};
use std::fmt;

const ADD_14: u8 = 0xE;
const ADD_32: u8 = 0xF;
const PAD: u8 = 0xF;

/// A compact path of child offsets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Vec<u8>", into = "Vec<u8>")]
pub struct NodePath {
    bytes: Vec<u8>,
}

impl NodePath {
    /// The empty path, addressing the ascendant itself.
    pub fn root() -> Self {
        Self::default()
    }

    /// Encodes a sequence of offsets.
    pub fn encode(offsets: &[usize]) -> Self {
        let mut nibbles = Vec::with_capacity(offsets.len());
        for &offset in offsets {
            push_offset(&mut nibbles, offset);
        }
        let path = Self::pack(&nibbles);
        debug_assert_eq!(decode(&path.bytes).ok().as_deref(), Some(offsets));
        path
    }

    /// Wraps packed bytes, rejecting anything [`decode`] rejects.
    pub fn from_bytes(bytes: Vec<u8>) -> TreeResult<Self> {
        decode(&bytes)?;
        Ok(Self { bytes })
    }

    /// The packed representation.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns the offsets in order, root side first.
    pub fn offsets(&self) -> Offsets<'_> {
        Offsets {
            path: self,
            index: 0,
            count: self.nibble_count(),
        }
    }

    /// Returns the decoded offsets as a vector.
    pub fn to_vec(&self) -> Vec<usize> {
        self.offsets().collect()
    }

    /// Returns the number of offsets, i.e. the depth below the ascendant.
    pub fn len(&self) -> usize {
        (0..self.nibble_count())
            .filter(|&i| self.nibble(i) < ADD_14)
            .count()
    }

    /// Returns `true` for the empty path.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Returns the last offset, reading backwards from the end.
    pub fn last_position(&self) -> Option<usize> {
        let start = self.last_offset_start()?;
        let end = self.nibble_count();
        Some((start..end).map(|i| nibble_value(self.nibble(i))).sum())
    }

    /// Returns the path with `offset` appended.
    pub fn child(&self, offset: usize) -> Self {
        let mut nibbles = self.nibbles();
        push_offset(&mut nibbles, offset);
        Self::pack(&nibbles)
    }

    /// Appends an offset in place.
    pub fn push(&mut self, offset: usize) {
        *self = self.child(offset);
    }

    /// Returns the path without its last offset, or `None` for the empty path.
    pub fn parent(&self) -> Option<Self> {
        let start = self.last_offset_start()?;
        let nibbles = self.nibbles();
        Some(Self::pack(&nibbles[..start]))
    }

    fn nibble(&self, index: usize) -> u8 {
        nibble_at(&self.bytes, index)
    }

    fn nibble_count(&self) -> usize {
        match self.bytes.last() {
            Some(&last) if last & 0x0F == PAD => self.bytes.len() * 2 - 1,
            Some(_) => self.bytes.len() * 2,
            None => 0,
        }
    }

    fn nibbles(&self) -> Vec<u8> {
        (0..self.nibble_count()).map(|i| self.nibble(i)).collect()
    }

    /// Index of the first nibble of the last offset.
    fn last_offset_start(&self) -> Option<usize> {
        let terminal = self.nibble_count().checked_sub(1)?;
        let mut start = terminal;
        while start > 0 && self.nibble(start - 1) >= ADD_14 {
            start -= 1;
        }
        Some(start)
    }

    fn pack(nibbles: &[u8]) -> Self {
        let bytes = nibbles
            .chunks(2)
            .map(|pair| (pair[0] << 4) | pair.get(1).copied().unwrap_or(PAD))
            .collect();
        Self { bytes }
    }
}

/// Iterator over the offsets of a [`NodePath`].
#[derive(Debug, Clone)]
pub struct Offsets<'a> {
    path: &'a NodePath,
    index: usize,
    count: usize,
}

impl Iterator for Offsets<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let mut value = 0;
        while self.index < self.count {
            let nibble = self.path.nibble(self.index);
            self.index += 1;
            value += nibble_value(nibble);
            if nibble < ADD_14 {
                return Some(value);
            }
        }
        None
    }
}

impl TryFrom<Vec<u8>> for NodePath {
    type Error = TreeError;

    fn try_from(bytes: Vec<u8>) -> TreeResult<Self> {
        Self::from_bytes(bytes)
    }
}

impl From<NodePath> for Vec<u8> {
    fn from(path: NodePath) -> Self {
        path.bytes
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, offset) in self.offsets().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{offset}")?;
        }
        write!(f, "]")
    }
}

/// Decodes packed bytes into offsets.
///
/// Fails on a dangling continuation (the last offset never terminates) and
/// on a padding nibble anywhere but the very end.
pub fn decode(bytes: &[u8]) -> TreeResult<Vec<usize>> {
    let mut offsets = Vec::new();
    let mut value = 0;
    let mut pending = false;
    let total = bytes.len() * 2;
    for index in 0..total {
        let nibble = nibble_at(bytes, index);
        if index == total - 1 && nibble == PAD && !pending {
            break;
        }
        value += nibble_value(nibble);
        if nibble < ADD_14 {
            offsets.push(value);
            value = 0;
            pending = false;
        } else {
            pending = true;
        }
    }
    if pending {
        return Err(TreeError::MalformedPath {
            reason: format!("dangling continuation after {} offsets", offsets.len()),
        });
    }
    Ok(offsets)
}

fn push_offset(nibbles: &mut Vec<u8>, mut value: usize) {
    while value >= 32 {
        nibbles.push(ADD_32);
        value -= 32;
    }
    while value >= 14 {
        nibbles.push(ADD_14);
        value -= 14;
    }
    nibbles.push(value as u8);
}

fn nibble_at(bytes: &[u8], index: usize) -> u8 {
    let byte = bytes[index / 2];
    if index % 2 == 0 {
        byte >> 4
    } else {
        byte & 0x0F
    }
}

fn nibble_value(nibble: u8) -> usize {
    match nibble {
        ADD_14 => 14,
        ADD_32 => 32,
        terminal => terminal as usize,
    }
}
