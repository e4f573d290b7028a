#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::geometry::Point;

/// Axis-aligned bounding box.
///
/// The empty envelope is `(+inf, +inf, -inf, -inf)`, which is the identity
/// for [`Envelope::union`] and is disjoint from every other box.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    pub minx: f64,
    pub miny: f64,
    pub maxx: f64,
    pub maxy: f64,
}

impl Envelope {
    pub const fn new(minx: f64, miny: f64, maxx: f64, maxy: f64) -> Self {
        Self {
            minx,
            miny,
            maxx,
            maxy,
        }
    }

    pub const fn empty() -> Self {
        Self::new(
            f64::INFINITY,
            f64::INFINITY,
            f64::NEG_INFINITY,
            f64::NEG_INFINITY,
        )
    }

    pub const fn from_point(x: f64, y: f64) -> Self {
        Self::new(x, y, x, y)
    }

    /// Bounding box of `points`; empty when there are none.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point>) -> Self {
        points
            .into_iter()
            .fold(Self::empty(), |env, p| env.union(&Self::from_point(p.x, p.y)))
    }

    pub fn is_empty(&self) -> bool {
        self.minx > self.maxx || self.miny > self.maxy
    }

    pub fn union(&self, other: &Envelope) -> Envelope {
        Envelope {
            minx: self.minx.min(other.minx),
            miny: self.miny.min(other.miny),
            maxx: self.maxx.max(other.maxx),
            maxy: self.maxy.max(other.maxy),
        }
    }

    /// True when the boxes share no point. Touching edges intersect.
    pub fn disjoint(&self, other: &Envelope) -> bool {
        other.minx > self.maxx
            || other.maxx < self.minx
            || other.miny > self.maxy
            || other.maxy < self.miny
    }

    /// Like [`Envelope::disjoint`], but an absent box never excludes.
    pub fn disjoined(a: Option<&Envelope>, b: Option<&Envelope>) -> bool {
        match (a, b) {
            (Some(a), Some(b)) => a.disjoint(b),
            _ => false,
        }
    }
}

impl Default for Envelope {
    fn default() -> Self {
        Self::empty()
    }
}
