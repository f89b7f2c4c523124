use bitflags::bitflags;

bitflags! {
    /// Per-node pipeline state.
    ///
    /// RESOLVE, PAINT and COMPOSITE are phase requests. BOUNDS through FONT
    /// record which category of style input changed since the last resolve.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct NodeFlags: u32 {
        const LEAF = 1;
        const RESOLVE = 1 << 1;
        const PAINT = 1 << 2;
        const COMPOSITE = 1 << 3;
        const BOUNDS = 1 << 4;
        const SHAPE = 1 << 5;
        const COLOR = 1 << 6;
        const TEXT = 1 << 7;
        const FONT = 1 << 8;

        const RESOLVE_INPUTS = Self::BOUNDS.bits()
            | Self::SHAPE.bits()
            | Self::COLOR.bits()
            | Self::TEXT.bits()
            | Self::FONT.bits();
    }
}
