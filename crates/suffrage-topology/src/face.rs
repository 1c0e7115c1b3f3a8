//! Physical faces (link ports) of a unit.
//!
//! A unit is a square board with one connector per side. Faces are numbered
//! `0..FACE_COUNT` in the order north, south, east, west.

use std::fmt;

use crate::FACE_COUNT;

/// One physical link port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Face(u8);

impl Face {
    pub const NORTH: Self = Self(0);
    pub const SOUTH: Self = Self(1);
    pub const EAST: Self = Self(2);
    pub const WEST: Self = Self(3);

    /// Every face, in port order.
    pub const ALL: [Self; FACE_COUNT] = [Self::NORTH, Self::SOUTH, Self::EAST, Self::WEST];

    /// Face for a port number, if the board has that port.
    pub const fn new(index: usize) -> Option<Self> {
        if index < FACE_COUNT {
            Some(Self(index as u8))
        } else {
            None
        }
    }

    /// Port number of this face.
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Short side name, used in logs.
    pub const fn name(self) -> &'static str {
        match self.0 {
            0 => "north",
            1 => "south",
            2 => "east",
            _ => "west",
        }
    }
}

impl fmt::Display for Face {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A small set of faces, stored as a bit mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FaceSet(u8);

impl FaceSet {
    /// No faces.
    pub const EMPTY: Self = Self(0);

    /// Every face of the board.
    pub const ALL: Self = Self((1 << FACE_COUNT) - 1);

    pub const fn contains(self, face: Face) -> bool {
        self.0 & (1 << face.0) != 0
    }

    #[must_use]
    pub const fn with(self, face: Face) -> Self {
        Self(self.0 | (1 << face.0))
    }

    #[must_use]
    pub const fn without(self, face: Face) -> Self {
        Self(self.0 & !(1 << face.0))
    }

    pub fn insert(&mut self, face: Face) {
        *self = self.with(face);
    }

    pub fn remove(&mut self, face: Face) {
        *self = self.without(face);
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Faces in the set, in port order.
    pub fn iter(self) -> impl Iterator<Item = Face> {
        Face::ALL.into_iter().filter(move |&f| self.contains(f))
    }
}

impl FromIterator<Face> for FaceSet {
    fn from_iter<I: IntoIterator<Item = Face>>(iter: I) -> Self {
        iter.into_iter().fold(Self::EMPTY, FaceSet::with)
    }
}
