use tracing::{debug, warn};

use crate::{
    bitstream::EntropySource,
    error::{Error, Result},
    jpeg::{coefficients::CoefficientDecoder, jpeg_reader::JPEGMarker},
};

/// Tracks the restart interval of a scan and the RSTn marker due next.
#[derive(Debug, Clone, Copy)]
pub struct RestartState {
    interval: usize,
    // 0 through 7, the n of the next RSTn.
    expected: u8,
}

impl RestartState {
    /// An interval of 0 disables restart markers.
    pub fn new(interval: u16) -> Self {
        Self {
            interval: interval as usize,
            expected: 0,
        }
    }

    /// A marker follows MCU number `mcus_done - 1` when it closes an interval and is not the
    /// last MCU of the scan.
    pub fn is_due(&self, mcus_done: usize, mcu_total: usize) -> bool {
        self.interval > 0 && mcus_done % self.interval == 0 && mcus_done < mcu_total
    }

    /// Consumes the expected RSTn marker and resets the entropy decoding state, as specified in
    /// section F.2.1.3.
    pub fn resync<E: EntropySource>(
        &mut self,
        source: &mut E,
        decoder: &mut CoefficientDecoder,
    ) -> Result<()> {
        let mut marker = [0u8; 2];
        source.read_full(&mut marker)?;
        if marker == [0xFF, 0x00] {
            warn!("stuffed zero byte in place of a restart marker");
            source.read_full(&mut marker)?;
        }

        let expected = JPEGMarker::RST0.code() + self.expected;
        if marker != [0xFF, expected] {
            return Err(Error::Format("bad RST marker"));
        }
        debug!(marker = format_args!("RST{}", self.expected), "restart");

        source.reset();
        decoder.reset();
        self.expected = (self.expected + 1) % 8;
        Ok(())
    }
}
