//! Plain-data fabric description, loadable from any serde format.

use crate::{
    ConfigError, DeltaSigma, Fabric, FabricBuilder, Flash, Gpio, Peripheral, SocId,
    REFERENCE_TYPE_ID,
};

/// Kind of word-protocol memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum MemoryKind {
    /// Zero-initialised read/write memory.
    Ram,
    /// Read-only memory holding `image`.
    Flash,
}

/// One memory on the system bus.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct MemoryConfig {
    /// Target name.
    pub name: String,
    /// RAM or flash.
    pub kind: MemoryKind,
    /// Absolute base address.
    pub base: u32,
    /// Size in bytes.
    pub size: u32,
    /// Initial flash contents; ignored for RAM.
    #[cfg_attr(feature = "serde", serde(default))]
    pub image: Vec<u8>,
}

/// Address window claimed by the bridged CSR cluster.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct CsrWindowConfig {
    /// Target name.
    pub name: String,
    /// Absolute base address.
    pub base: u32,
    /// Size in bytes.
    pub size: u32,
}

/// One peripheral instance, tagged by its `class`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(tag = "class", rename_all = "snake_case"))]
pub enum PeripheralConfig {
    /// Delta-sigma output modulator.
    Pdm {
        /// Instance name.
        name: String,
        /// Absolute base address.
        base: u32,
        /// Code width in bits.
        bitwidth: u8,
    },
    /// GPIO bank.
    Gpio {
        /// Instance name.
        name: String,
        /// Absolute base address.
        base: u32,
        /// Pin count.
        width: u8,
    },
    /// Identification block.
    SocId {
        /// Instance name.
        name: String,
        /// Absolute base address.
        base: u32,
        /// Published type identifier.
        type_id: u32,
        /// Published version.
        #[cfg_attr(feature = "serde", serde(default))]
        version: u32,
    },
}

impl PeripheralConfig {
    /// Instance name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Pdm { name, .. } | Self::Gpio { name, .. } | Self::SocId { name, .. } => name,
        }
    }

    /// Absolute base address.
    #[must_use]
    pub const fn base(&self) -> u32 {
        match self {
            Self::Pdm { base, .. } | Self::Gpio { base, .. } | Self::SocId { base, .. } => *base,
        }
    }

    /// Creates the described peripheral in its reset state.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for an unsupported bit width or pin count.
    pub fn instantiate(&self) -> Result<Box<dyn Peripheral>, ConfigError> {
        Ok(match *self {
            Self::Pdm { bitwidth, .. } => Box::new(DeltaSigma::new(bitwidth)?),
            Self::Gpio { width, .. } => Box::new(Gpio::new(width)?),
            Self::SocId {
                type_id, version, ..
            } => Box::new(SocId::new(type_id, version)?),
        })
    }
}

/// Complete fabric description.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct FabricConfig {
    /// Initiator names in rotation order.
    pub initiators: Vec<String>,
    /// Memories on the system bus.
    #[cfg_attr(feature = "serde", serde(default))]
    pub memories: Vec<MemoryConfig>,
    /// CSR window; required when any peripheral is declared.
    #[cfg_attr(feature = "serde", serde(default))]
    pub csr_window: Option<CsrWindowConfig>,
    /// Peripherals in publication order.
    #[cfg_attr(feature = "serde", serde(default))]
    pub peripherals: Vec<PeripheralConfig>,
}

/// Spacing between instances of the same class in the reference map.
const PERIPHERAL_STRIDE: u32 = 0x0010_0000;

impl FabricConfig {
    /// The reference SoC: a CPU with instruction and data ports plus a debug port,
    /// SPI flash, SRAM, two GPIO banks, the SoC ID block and six delta-sigma channels.
    #[must_use]
    pub fn reference() -> Self {
        let mut peripherals: Vec<PeripheralConfig> = (0..2u32)
            .map(|index| PeripheralConfig::Gpio {
                name: format!("GPIO_{index}"),
                base: 0xB100_0000 + index * PERIPHERAL_STRIDE,
                width: 8,
            })
            .collect();
        peripherals.push(PeripheralConfig::SocId {
            name: "SOC_ID".to_string(),
            base: 0xB400_0000,
            type_id: REFERENCE_TYPE_ID,
            version: 1,
        });
        peripherals.extend((0..6u32).map(|index| PeripheralConfig::Pdm {
            name: format!("PDM{index}"),
            base: 0xB800_0000 + index * 0x10,
            bitwidth: 10,
        }));

        Self {
            initiators: ["cpu.ibus", "cpu.dbus", "debug"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            memories: vec![
                MemoryConfig {
                    name: "spiflash".to_string(),
                    kind: MemoryKind::Flash,
                    base: 0x0000_0000,
                    size: 0x0020_0000,
                    image: Vec::new(),
                },
                MemoryConfig {
                    name: "sram".to_string(),
                    kind: MemoryKind::Ram,
                    base: 0x1000_0000,
                    size: 0x800,
                    image: Vec::new(),
                },
            ],
            csr_window: Some(CsrWindowConfig {
                name: "csr".to_string(),
                base: 0xB000_0000,
                size: 0x1000_0000,
            }),
            peripherals,
        }
    }

    /// Validates the description and builds the fabric.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn build(&self) -> Result<Fabric, ConfigError> {
        let mut builder = FabricBuilder::new();
        for name in &self.initiators {
            builder.initiator(name.as_str());
        }
        for memory in &self.memories {
            match memory.kind {
                MemoryKind::Ram => builder.ram(memory.name.as_str(), memory.base, memory.size),
                MemoryKind::Flash => builder.flash(
                    memory.name.as_str(),
                    memory.base,
                    Flash::with_image(&memory.name, memory.size, &memory.image)?,
                ),
            };
        }
        if let Some(window) = &self.csr_window {
            builder.csr_window(window.name.as_str(), window.base, window.size);
        }
        for peripheral in &self.peripherals {
            builder.peripheral(peripheral.name(), peripheral.base(), peripheral.instantiate()?);
        }
        builder.build()
    }
}
