use crate::{
    error::{Error, Result},
    jpeg::{coefficients::Block, header::MAX_COMPONENTS},
};

/// Every block of one component, row by row over its padded block grid.
#[derive(Debug)]
pub struct ComponentCoefficients {
    blocks: Vec<Block>,
    blocks_wide: usize,
}

impl ComponentCoefficients {
    fn new(blocks_wide: usize, blocks_high: usize) -> Result<Self> {
        let count = blocks_wide
            .checked_mul(blocks_high)
            .ok_or(Error::Unsupported("image too large"))?;
        let mut blocks = Vec::new();
        blocks
            .try_reserve_exact(count)
            .map_err(|_| Error::Unsupported("not enough memory for coefficients"))?;
        blocks.resize(count, [0; 64]);
        Ok(Self {
            blocks,
            blocks_wide,
        })
    }

    pub fn block(&self, bx: usize, by: usize) -> &Block {
        &self.blocks[by * self.blocks_wide + bx]
    }

    pub fn block_mut(&mut self, bx: usize, by: usize) -> &mut Block {
        &mut self.blocks[by * self.blocks_wide + bx]
    }
}

/// Coefficients kept between the scans of an image, one arena per frame component.
///
/// An arena is allocated the first time a scan touches its component and is never resized
/// afterwards. Nothing is freed until [`clear`](Self::clear).
#[derive(Debug, Default)]
pub struct CoefficientStore {
    components: [Option<ComponentCoefficients>; MAX_COMPONENTS],
}

impl CoefficientStore {
    pub fn new() -> Self {
        Default::default()
    }

    /// Returns the arena for `component_index`, allocating a zeroed one of the given grid size
    /// if there is none yet.
    pub fn ensure(
        &mut self,
        component_index: usize,
        blocks_wide: usize,
        blocks_high: usize,
    ) -> Result<&mut ComponentCoefficients> {
        let slot = &mut self.components[component_index];
        if slot.is_none() {
            *slot = Some(ComponentCoefficients::new(blocks_wide, blocks_high)?);
        }
        slot.as_mut().ok_or(Error::Format("missing coefficients"))
    }

    pub fn get(&self, component_index: usize) -> Option<&ComponentCoefficients> {
        self.components.get(component_index)?.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.components.iter().all(Option::is_none)
    }

    pub fn clear(&mut self) {
        self.components = Default::default();
    }
}
