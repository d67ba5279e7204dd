//! Byte-array backed word targets: read/write RAM and read-only flash.

use crate::{BusFault, ConfigError, Direction, Response, Tick, TraceSink, Transaction, WordTarget};

fn read_le(cells: &[u8], request: &Transaction) -> Response {
    let start = request.address as usize;
    let Some(bytes) = cells.get(start..start + usize::from(request.width.bytes())) else {
        return Response::Error(BusFault::BoundaryCrossing);
    };
    let data = bytes
        .iter()
        .zip(0u8..)
        .filter(|(_, lane)| request.byte_lanes.is_enabled(*lane))
        .fold(0u32, |acc, (byte, lane)| acc | u32::from(*byte) << (8 * lane));
    Response::Ack { data }
}

/// Zero-initialised read/write memory with byte-lane masked writes.
///
/// Contents survive reset.
#[derive(Debug, Clone)]
pub struct Ram {
    cells: Box<[u8]>,
    pending: Option<Transaction>,
}

impl Ram {
    /// Allocates `size` zeroed bytes.
    #[must_use]
    pub fn new(size: u32) -> Self {
        Self {
            cells: vec![0; size as usize].into_boxed_slice(),
            pending: None,
        }
    }

    /// Current contents.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.cells
    }

    /// Capacity in bytes.
    #[must_use]
    pub fn size(&self) -> u32 {
        u32::try_from(self.cells.len()).unwrap_or(u32::MAX)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn write(&mut self, request: &Transaction) -> Response {
        let start = request.address as usize;
        let Some(bytes) = self
            .cells
            .get_mut(start..start + usize::from(request.width.bytes()))
        else {
            return Response::Error(BusFault::BoundaryCrossing);
        };
        for (byte, lane) in bytes.iter_mut().zip(0u8..) {
            if request.byte_lanes.is_enabled(lane) {
                *byte = (request.data >> (8 * lane)) as u8;
            }
        }
        Response::Ack { data: 0 }
    }
}

impl WordTarget for Ram {
    fn start(&mut self, request: Transaction) {
        self.pending = Some(request);
    }

    fn step(&mut self, _tick: Tick, _trace: &mut dyn TraceSink) -> Option<Response> {
        let request = self.pending.take()?;
        Some(match request.direction {
            Direction::Read => read_le(&self.cells, &request),
            Direction::Write => self.write(&request),
        })
    }

    fn reset(&mut self) {
        self.pending = None;
    }
}

/// Read-only memory holding a fixed image; writes answer [`BusFault::WriteProtected`].
#[derive(Debug, Clone)]
pub struct Flash {
    cells: Box<[u8]>,
    pending: Option<Transaction>,
}

impl Flash {
    /// Creates a flash of `size` bytes whose leading bytes hold `image`; the rest reads `0xFF`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ImageTooLarge`] when `image` does not fit.
    pub fn with_image(name: &str, size: u32, image: &[u8]) -> Result<Self, ConfigError> {
        if image.len() > size as usize {
            return Err(ConfigError::ImageTooLarge {
                name: name.to_string(),
                image_len: image.len(),
                size,
            });
        }
        let mut cells = vec![0xFF; size as usize];
        cells[..image.len()].copy_from_slice(image);
        Ok(Self {
            cells: cells.into_boxed_slice(),
            pending: None,
        })
    }

    /// Current contents.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.cells
    }

    /// Capacity in bytes.
    #[must_use]
    pub fn size(&self) -> u32 {
        u32::try_from(self.cells.len()).unwrap_or(u32::MAX)
    }
}

impl WordTarget for Flash {
    fn start(&mut self, request: Transaction) {
        self.pending = Some(request);
    }

    fn step(&mut self, _tick: Tick, _trace: &mut dyn TraceSink) -> Option<Response> {
        let request = self.pending.take()?;
        Some(match request.direction {
            Direction::Read => read_le(&self.cells, &request),
            Direction::Write => Response::Error(BusFault::WriteProtected),
        })
    }

    fn reset(&mut self) {
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::{Flash, Ram};
    use crate::{
        AccessWidth, BusFault, ByteLanes, ConfigError, InitiatorId, NoTrace, Response, Tick,
        Transaction, WordTarget,
    };

    const CPU: InitiatorId = InitiatorId::new(0);

    fn serve(target: &mut dyn WordTarget, request: Transaction) -> Response {
        target.start(request);
        target
            .step(Tick::new(0), &mut NoTrace)
            .expect("memories answer in one cycle")
    }

    #[test]
    fn ram_stores_little_endian() {
        let mut ram = Ram::new(16);
        serve(&mut ram, Transaction::write(CPU, 4, AccessWidth::Word, 0x0403_0201));
        assert_eq!(&ram.as_bytes()[4..8], &[0x01, 0x02, 0x03, 0x04]);
        assert_eq!(
            serve(&mut ram, Transaction::read(CPU, 6, AccessWidth::Half)),
            Response::Ack { data: 0x0403 }
        );
    }

    #[test]
    fn ram_honours_byte_lanes() {
        let mut ram = Ram::new(8);
        serve(&mut ram, Transaction::write(CPU, 0, AccessWidth::Word, 0x1111_1111));
        let partial = Transaction::write(CPU, 0, AccessWidth::Word, 0xAABB_CCDD)
            .with_byte_lanes(ByteLanes::from_bits(0b0101));
        serve(&mut ram, partial);
        assert_eq!(&ram.as_bytes()[0..4], &[0xDD, 0x11, 0xBB, 0x11]);
    }

    #[test]
    fn idle_step_yields_nothing() {
        let mut ram = Ram::new(4);
        assert_eq!(ram.step(Tick::new(0), &mut NoTrace), None);
    }

    #[test]
    fn flash_reads_image_and_rejects_writes() {
        let mut flash = Flash::with_image("spiflash", 8, &[0xEF, 0xBE]).expect("image fits");
        assert_eq!(
            serve(&mut flash, Transaction::read(CPU, 0, AccessWidth::Word)),
            Response::Ack { data: 0xFFFF_BEEF }
        );
        assert_eq!(
            serve(&mut flash, Transaction::write(CPU, 0, AccessWidth::Byte, 0)),
            Response::Error(BusFault::WriteProtected)
        );
        assert_eq!(flash.as_bytes()[0], 0xEF);
    }

    #[test]
    fn oversized_flash_image_is_rejected() {
        assert!(matches!(
            Flash::with_image("spiflash", 2, &[0; 3]),
            Err(ConfigError::ImageTooLarge { image_len: 3, size: 2, .. })
        ));
    }
}
