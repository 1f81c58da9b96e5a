//! Volume classification and its precedence order.

/// Kinds of liquid. They share one precedence class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Liquid {
    Water,
    Slime,
    Lava,
}

/// What fills a volume of space.
///
/// Ordering of the non-empty kinds follows CSG priority:
/// illusionary-detail < liquid < fence-detail < solid-detail < sky < solid.
/// `Empty`, `AreaPortal` and `Clip` sit outside that chain; see [`Contents::precedence`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Contents {
    #[default]
    Empty,
    /// Q2 area separator; non-solid, flood-blocking for area numbering only
    AreaPortal,
    DetailIllusionary,
    Liquid(Liquid),
    DetailFence,
    DetailSolid,
    Sky,
    Solid,
    /// Collision-only brushes, present in hulls > 0 where they act as solid
    Clip,
}

impl Contents {
    /// Rank used when two volumes overlap; higher wins.
    pub const fn precedence(self) -> u8 {
        match self {
            Contents::Empty => 0,
            Contents::AreaPortal => 1,
            Contents::DetailIllusionary => 2,
            Contents::Liquid(_) => 3,
            Contents::DetailFence => 4,
            Contents::DetailSolid => 5,
            Contents::Sky => 6,
            Contents::Solid | Contents::Clip => 7,
        }
    }

    /// Pick whichever of two contents takes priority.
    pub fn max_precedence(self, other: Contents) -> Contents {
        if other.precedence() > self.precedence() {
            other
        } else {
            self
        }
    }

    /// Blocks sight, so faces hidden inside it can be dropped.
    pub const fn is_opaque(self) -> bool {
        matches!(
            self,
            Contents::Solid | Contents::Sky | Contents::DetailSolid | Contents::Clip
        )
    }

    /// Seals the level against the outside fill.
    pub const fn is_sealing(self) -> bool {
        matches!(self, Contents::Solid | Contents::Sky | Contents::Clip)
    }

    /// Treated as solid in the exported tree.
    pub const fn is_solid(self) -> bool {
        matches!(
            self,
            Contents::Solid | Contents::Clip | Contents::DetailSolid
        )
    }

    pub const fn is_liquid(self) -> bool {
        matches!(self, Contents::Liquid(_))
    }

    pub const fn is_detail(self) -> bool {
        matches!(
            self,
            Contents::DetailSolid | Contents::DetailFence | Contents::DetailIllusionary
        )
    }

    /// A vis portal may pass through a leaf with these contents.
    pub const fn is_see_through(self, transwater: bool) -> bool {
        match self {
            Contents::Empty
            | Contents::AreaPortal
            | Contents::DetailIllusionary
            | Contents::DetailFence => true,
            Contents::Liquid(_) => transwater,
            _ => false,
        }
    }

    /// Inside faces of these brushes are mirrored so they render from within.
    pub const fn mirrors_inside(self) -> bool {
        matches!(self, Contents::Liquid(_))
    }

    /// Contents after detail has served its purpose in the BSP and fill.
    pub const fn resolve_detail(self, hull: usize) -> Contents {
        match self {
            Contents::DetailSolid => Contents::Solid,
            Contents::DetailFence if hull > 0 => Contents::Solid,
            Contents::DetailFence | Contents::DetailIllusionary => Contents::Empty,
            Contents::AreaPortal if hull > 0 => Contents::Empty,
            other => other,
        }
    }
}
