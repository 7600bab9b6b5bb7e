//! R-tree over feature envelopes for candidate pre-filtering.
//!
//! Stores each feature's position in its collection alongside its
//! bounding box. Queries return candidate positions in ascending order so
//! callers can keep "first in collection order wins" semantics while only
//! testing features whose envelopes can possibly match.

use geo::Rect;
use rstar::{AABB, RTree, RTreeObject};

/// A feature envelope stored in the R-tree with its collection position.
struct IndexEntry {
    position: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Envelope index over the features of one collection.
pub struct EnvelopeIndex {
    tree: RTree<IndexEntry>,
}

impl EnvelopeIndex {
    /// Bulk-loads `(position, bounding box)` pairs. Features without a
    /// bounding box are simply left out and never returned.
    #[must_use]
    pub fn build(envelopes: impl IntoIterator<Item = (usize, Rect<f64>)>) -> Self {
        let entries = envelopes
            .into_iter()
            .map(|(position, rect)| IndexEntry {
                position,
                envelope: to_aabb(&rect),
            })
            .collect();
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// Positions of every indexed feature whose envelope intersects
    /// `rect`, in ascending order.
    #[must_use]
    pub fn candidates(&self, rect: &Rect<f64>) -> Vec<usize> {
        let mut positions: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&to_aabb(rect))
            .map(|entry| entry.position)
            .collect();
        positions.sort_unstable();
        positions
    }

    /// Number of indexed features.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Whether nothing was indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

fn to_aabb(rect: &Rect<f64>) -> AABB<[f64; 2]> {
    AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y])
}
