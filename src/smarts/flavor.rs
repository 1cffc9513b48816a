bitflags::bitflags! {
    /// SMARTS dialect accepted by the parser.
    ///
    /// Several toolkits extend Daylight SMARTS with their own primitives.
    /// A primitive that is not in the selected dialect is a syntax error.
    /// `LOOSE` accepts the union of all extensions.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Flavor: u32 {
        const LOOSE      = 0x01;
        const DAYLIGHT   = 0x02;
        const CACTVS     = 0x04;
        const MOE        = 0x08;
        const OECHEM     = 0x10;
        const CDK_LEGACY = 0x40;
        const CDK        = Self::LOOSE.bits();
    }
}

impl Default for Flavor {
    fn default() -> Self {
        Flavor::LOOSE
    }
}

impl Flavor {
    /// `D` reads as heavy-atom degree instead of total degree.
    pub(crate) fn heavy_degree(self) -> bool {
        self.contains(Flavor::CDK_LEGACY)
    }

    /// `r<n>` reads as "in any ring of size n" instead of "smallest ring is n".
    pub(crate) fn any_ring_size(self) -> bool {
        self.contains(Flavor::CDK_LEGACY)
    }

    /// `d<n>`: non-hydrogen degree.
    pub(crate) fn allows_heavy_degree_prim(self) -> bool {
        self.intersects(Flavor::LOOSE | Flavor::MOE)
    }

    /// `^<n>`: hybridisation number.
    pub(crate) fn allows_hybridisation(self) -> bool {
        self.intersects(Flavor::LOOSE | Flavor::OECHEM)
    }

    /// `z`, `Z`, `G<n>` and `i`.
    pub(crate) fn allows_cactvs_prims(self) -> bool {
        self.intersects(Flavor::LOOSE | Flavor::CACTVS)
    }

    /// `{lo-hi}` numeric ranges.
    pub(crate) fn allows_ranges(self) -> bool {
        self.intersects(Flavor::LOOSE | Flavor::OECHEM)
    }

    /// `<n` and `>n` numeric comparisons.
    pub(crate) fn allows_comparisons(self) -> bool {
        self.intersects(Flavor::LOOSE | Flavor::MOE)
    }
}
