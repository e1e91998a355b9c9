use thiserror::Error;

/// Error returned by [`IterableUnionFind`] operations.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum UnionFindError {
    /// An element index was outside the valid range `[0, bound)`.
    #[error("index {index} is out of range [0, {bound})")]
    IndexOutOfRange {
        /// The offending index.
        index: usize,
        /// The exclusive upper bound at the time of the call.
        bound: usize,
    },
    /// Creating another element would overflow the index type.
    #[error("cannot create more than {capacity} elements")]
    CapacityExceeded {
        /// The maximum number of elements the index type admits.
        capacity: usize,
    },
    /// A bulk operation required an empty structure.
    #[error("operation requires an empty structure")]
    InvariantViolation,
}

/// Unsigned index types usable as [`IterableUnionFind`] element indices.
///
/// Implemented for `u8`, `u16`, `u32`, `u64` and `usize`. The index type
/// bounds the number of elements the structure can hold.
pub trait SetIndex: Copy + Eq + core::fmt::Debug {
    /// The maximum number of elements representable by this index type.
    const MAX_COUNT: usize;

    /// Converts from `usize`. Only called with values below
    /// [`Self::MAX_COUNT`].
    fn from_usize(value: usize) -> Self;
    /// Widens to `usize`.
    fn to_usize(self) -> usize;
}

macro_rules! impl_set_index {
    ($($ty:ty),*) => {$(
        impl SetIndex for $ty {
            const MAX_COUNT: usize = <$ty>::MAX as usize;

            #[inline]
            fn from_usize(value: usize) -> Self {
                value as $ty
            }

            #[inline]
            fn to_usize(self) -> usize {
                self as usize
            }
        }
    )*};
}

impl_set_index!(u8, u16, u32, u64, usize);

/// Per-element union-find metadata.
///
/// All fields use the same index type for uniformity and cache
/// efficiency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Node<Idx> {
    /// Parent pointer (self if root).
    pub parent: Idx,
    /// Tree rank for union-by-rank; bounded by `log2(n)`.
    pub rank: Idx,
    /// Class size. Valid only at the root; zero elsewhere.
    pub size: Idx,
    /// Next element in the circular linked list of the class.
    pub next: Idx,
}

/// A disjoint-set structure with O(class size) member enumeration.
///
/// Combines the classic machinery with an intrusive circular list per
/// class:
/// - **Union by rank** keeps trees balanced, and **two-pass path
///   compression** flattens them during [`find`](Self::find), giving
///   effectively constant amortized operations.
/// - Every element carries a `next` pointer into a circular list of its
///   class; [`unite`](Self::unite) splices the two lists in O(1), so
///   [`class_members`](Self::class_members) walks a class in time
///   proportional to its size.
/// - Class sizes are tracked exactly: the size stored at a root is the
///   cardinality of its class, and sizes at non-roots are zero.
///
/// Elements are created with [`make_set`](Self::make_set) (or in bulk
/// with [`init_sets`](Self::init_sets)) and receive consecutive indices
/// starting from 0. The index type `Idx` bounds the capacity; exceeding
/// it fails with [`UnionFindError::CapacityExceeded`] and leaves the
/// structure untouched.
///
/// Every public operation that takes an index range-checks it and fails
/// with [`UnionFindError::IndexOutOfRange`] carrying the index and the
/// exclusive bound.
///
/// The structure is not thread-safe; callers synchronize externally.
#[must_use]
#[derive(Debug, Clone, Default)]
pub struct IterableUnionFind<Idx = usize> {
    nodes: Vec<Node<Idx>>,
    class_count: usize,
}

impl<Idx: SetIndex> IterableUnionFind<Idx> {
    /// Creates an empty structure.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            class_count: 0,
        }
    }

    /// Creates a new singleton class and returns its element index.
    ///
    /// Indices are assigned sequentially starting from 0.
    ///
    /// # Errors
    /// [`UnionFindError::CapacityExceeded`] if the index type cannot
    /// represent another element. Prior elements remain fully usable.
    pub fn make_set(&mut self) -> Result<Idx, UnionFindError> {
        if self.nodes.len() >= Idx::MAX_COUNT {
            return Err(UnionFindError::CapacityExceeded {
                capacity: Idx::MAX_COUNT,
            });
        }
        let x = Idx::from_usize(self.nodes.len());
        self.nodes.push(Node {
            parent: x,
            rank: Idx::from_usize(0),
            size: Idx::from_usize(1),
            next: x,
        });
        self.class_count += 1;
        Ok(x)
    }

    /// Creates `n` singleton classes at once.
    ///
    /// Equivalent to `n` [`make_set`](Self::make_set) calls.
    ///
    /// # Errors
    /// [`UnionFindError::InvariantViolation`] if the structure is not
    /// empty, [`UnionFindError::CapacityExceeded`] if `n` exceeds the
    /// index type's capacity.
    pub fn init_sets(&mut self, n: usize) -> Result<(), UnionFindError> {
        if !self.nodes.is_empty() {
            return Err(UnionFindError::InvariantViolation);
        }
        if n > Idx::MAX_COUNT {
            return Err(UnionFindError::CapacityExceeded {
                capacity: Idx::MAX_COUNT,
            });
        }
        self.nodes.reserve(n);
        for i in 0..n {
            let x = Idx::from_usize(i);
            self.nodes.push(Node {
                parent: x,
                rank: Idx::from_usize(0),
                size: Idx::from_usize(1),
                next: x,
            });
        }
        self.class_count = n;
        Ok(())
    }

    /// Returns the number of elements created so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if no element has been created yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the number of distinct classes.
    #[must_use]
    pub fn num_classes(&self) -> usize {
        self.class_count
    }

    /// Finds the root of the class containing `x`, with path compression.
    ///
    /// Two-pass iterative compression: the first pass locates the root,
    /// the second rewrites every intermediate parent pointer to point at
    /// it. Use [`class_root`](Self::class_root) when `&self` access is
    /// required.
    ///
    /// # Errors
    /// [`UnionFindError::IndexOutOfRange`] if `x` is out of range.
    pub fn find(&mut self, x: Idx) -> Result<Idx, UnionFindError> {
        self.check_index(x)?;

        let mut root = x;
        while self.nodes[root.to_usize()].parent != root {
            root = self.nodes[root.to_usize()].parent;
        }

        let mut cursor = x;
        while self.nodes[cursor.to_usize()].parent != root {
            let next = self.nodes[cursor.to_usize()].parent;
            self.nodes[cursor.to_usize()].parent = root;
            cursor = next;
        }

        Ok(root)
    }

    /// Merges the classes containing `a` and `b`.
    ///
    /// Union by rank: the lower-rank root is attached under the higher,
    /// and the rank increments on a tie. The combined size moves to the
    /// surviving root and the old root's size is zeroed. The circular
    /// lists are spliced by swapping the `next` pointers at the two input
    /// positions, which yields a deterministic merged list; the resulting
    /// member iteration order is nevertheless an implementation detail.
    ///
    /// Returns `true` if a merge occurred, `false` if `a` and `b` were
    /// already in the same class.
    ///
    /// # Errors
    /// [`UnionFindError::IndexOutOfRange`] if `a` or `b` is out of range.
    pub fn unite(&mut self, a: Idx, b: Idx) -> Result<bool, UnionFindError> {
        let root_a = self.find(a)?;
        let root_b = self.find(b)?;

        if root_a == root_b {
            return Ok(false);
        }

        // The sum cannot overflow Idx: total size <= element count, which
        // make_set bounds by Idx::MAX_COUNT.
        let combined_size = Idx::from_usize(
            self.nodes[root_a.to_usize()].size.to_usize()
                + self.nodes[root_b.to_usize()].size.to_usize(),
        );

        let rank_a = self.nodes[root_a.to_usize()].rank.to_usize();
        let rank_b = self.nodes[root_b.to_usize()].rank.to_usize();
        let (new_root, old_root) = if rank_a < rank_b {
            self.nodes[root_a.to_usize()].parent = root_b;
            (root_b, root_a)
        } else if rank_a > rank_b {
            self.nodes[root_b.to_usize()].parent = root_a;
            (root_a, root_b)
        } else {
            self.nodes[root_b.to_usize()].parent = root_a;
            // Rank stays below the bit width of Idx: rank <= log2(n).
            self.nodes[root_a.to_usize()].rank =
                Idx::from_usize(rank_a + 1);
            (root_a, root_b)
        };

        self.nodes[new_root.to_usize()].size = combined_size;
        self.nodes[old_root.to_usize()].size = Idx::from_usize(0);

        // Splice the circular lists at the two input positions. Since a
        // and b belong to different cycles, swapping their successors
        // joins the cycles into one.
        let next_a = self.nodes[a.to_usize()].next;
        let next_b = self.nodes[b.to_usize()].next;
        self.nodes[a.to_usize()].next = next_b;
        self.nodes[b.to_usize()].next = next_a;

        self.class_count -= 1;
        Ok(true)
    }

    /// Returns the size of the class containing `x`.
    ///
    /// # Errors
    /// [`UnionFindError::IndexOutOfRange`] if `x` is out of range.
    pub fn class_size(&self, x: Idx) -> Result<usize, UnionFindError> {
        let root = self.class_root(x)?;
        Ok(self.nodes[root.to_usize()].size.to_usize())
    }

    /// Finds the root of the class containing `x` without path
    /// compression.
    ///
    /// # Errors
    /// [`UnionFindError::IndexOutOfRange`] if `x` is out of range.
    pub fn class_root(&self, x: Idx) -> Result<Idx, UnionFindError> {
        self.check_index(x)?;
        let mut cursor = x;
        while self.nodes[cursor.to_usize()].parent != cursor {
            cursor = self.nodes[cursor.to_usize()].parent;
        }
        Ok(cursor)
    }

    /// Checks whether `a` and `b` belong to the same class.
    ///
    /// # Errors
    /// [`UnionFindError::IndexOutOfRange`] if `a` or `b` is out of range.
    pub fn same_class(&self, a: Idx, b: Idx) -> Result<bool, UnionFindError> {
        Ok(self.class_root(a)? == self.class_root(b)?)
    }

    /// Returns every member of the class containing `x`, in O(class
    /// size), by walking the circular list starting at `x`.
    ///
    /// Each member appears exactly once; the order beyond that is an
    /// implementation detail.
    ///
    /// # Errors
    /// [`UnionFindError::IndexOutOfRange`] if `x` is out of range.
    pub fn class_members(&self, x: Idx) -> Result<Vec<Idx>, UnionFindError> {
        self.check_index(x)?;
        let mut out = Vec::with_capacity(self.nodes[self.class_root(x)?.to_usize()].size.to_usize());
        let mut cursor = x;
        loop {
            out.push(cursor);
            cursor = self.nodes[cursor.to_usize()].next;
            if cursor == x {
                break;
            }
        }
        Ok(out)
    }

    /// Returns the root of every class, in element-index order.
    #[must_use]
    pub fn class_representatives(&self) -> Vec<Idx> {
        let mut out = Vec::with_capacity(self.class_count);
        for (i, node) in self.nodes.iter().enumerate() {
            if node.parent == Idx::from_usize(i) {
                out.push(node.parent);
            }
        }
        out
    }

    /// Returns every class as a member list, ordered by the classes'
    /// root indices.
    #[must_use]
    pub fn classes(&self) -> Vec<Vec<Idx>> {
        self.class_representatives()
            .into_iter()
            .map(|root| {
                self.class_members(root)
                    .expect("IterableUnionFind::classes: [1]")
            })
            .collect()
    }

    /// Returns a copy of the raw per-element node array.
    ///
    /// Intended for inspection and testing; the node layout is part of
    /// the public contract (parent/rank/size/next).
    #[must_use]
    pub fn export_nodes(&self) -> Vec<Node<Idx>> {
        self.nodes.clone()
    }

    fn check_index(&self, x: Idx) -> Result<(), UnionFindError> {
        if x.to_usize() >= self.nodes.len() {
            return Err(UnionFindError::IndexOutOfRange {
                index: x.to_usize(),
                bound: self.nodes.len(),
            });
        }
        Ok(())
    }
}
