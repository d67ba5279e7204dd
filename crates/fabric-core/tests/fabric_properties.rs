//! Fabric-level properties: build-time rejection, register round-trip, arbitration
//! fairness, unmapped access, bridge atomicity and delta-sigma accuracy.

#![allow(
    clippy::pedantic,
    clippy::nursery,
    clippy::cast_possible_truncation,
    clippy::too_many_lines
)]

use fabric_core::{
    Access, AccessWidth, AddressRange, BusFault, ByteLanes, Clock, ConfigError, Decoder, DeltaSigma,
    DeltaSigmaCore, Fabric, Field, InitiatorId, NoTrace, Peripheral, Protocol, Ram, Register,
    RegisterFile, RegisterId, Response, Tick, TraceEvent, Transaction,
};
use proptest::prelude::*;
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;
use tracing as _;

const SCRATCH_BASE: u32 = 0xB000_0000;
const PDM_BASE: u32 = 0xB800_0000;
const SRAM_BASE: u32 = 0x1000_0000;
const SCRATCH_RESET: u32 = 0xAABB_CCDD;

/// Register file with a plain word register and a free-running counter.
#[derive(Debug)]
struct Scratch {
    registers: RegisterFile,
    counter: RegisterId,
    count: u32,
}

impl Scratch {
    fn new(counter_start: u32) -> Self {
        let mut builder = RegisterFile::builder("scratch", 0x10);
        builder.add(
            Register::new("data", 0x0, AccessWidth::Word, Access::ReadWrite)
                .field(Field::plain("value", 0, 32))
                .with_reset(SCRATCH_RESET),
        );
        let counter = builder.add(
            Register::new("counter", 0x4, AccessWidth::Word, Access::ReadOnly)
                .with_reset(counter_start),
        );
        builder.add(Register::new("kick", 0x8, AccessWidth::Half, Access::WriteOnly));
        Self {
            registers: builder.build().expect("scratch layout"),
            counter,
            count: counter_start,
        }
    }
}

impl Peripheral for Scratch {
    fn class(&self) -> &'static str {
        "scratch"
    }

    fn registers(&self) -> &RegisterFile {
        &self.registers
    }

    fn registers_mut(&mut self) -> &mut RegisterFile {
        &mut self.registers
    }

    fn tick(&mut self, _tick: Tick) {
        self.count = self.count.wrapping_add(1);
        self.registers.set_value(self.counter, self.count);
    }

    fn reset(&mut self) {
        self.registers.reset();
        self.count = self.registers.value(self.counter).unwrap_or(0);
    }
}

fn fabric_with(initiators: usize, counter_start: u32) -> Fabric {
    let mut builder = Fabric::builder();
    for index in 0..initiators {
        builder.initiator(format!("initiator{index}"));
    }
    builder
        .ram("sram", SRAM_BASE, 0x800)
        .csr_window("csr", 0xB000_0000, 0x1000_0000)
        .peripheral("SCRATCH", SCRATCH_BASE, Box::new(Scratch::new(counter_start)))
        .peripheral("PDM0", PDM_BASE, Box::new(DeltaSigma::new(10).expect("width")));
    builder.build().expect("valid fabric")
}

fn execute(fabric: &mut Fabric, clock: &mut Clock, txn: Transaction) -> Response {
    fabric
        .execute(txn.initiator, txn, clock, &mut NoTrace)
        .expect("port is free")
        .response
}

fn pdm_output(fabric: &Fabric) -> bool {
    fabric.peripheral("PDM0").expect("mapped").pins().output & 1 == 1
}

const CPU: InitiatorId = InitiatorId::new(0);

fn le_value(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .rev()
        .fold(0, |value, byte| (value << 8) | u32::from(*byte))
}

proptest! {
    #[test]
    fn overlapping_decoder_ranges_never_build(
        first_base in 0u32..0x4000,
        first_size in 1u32..0x400,
        second_base in 0u32..0x4000,
        second_size in 1u32..0x400,
    ) {
        let first = AddressRange::new(first_base, first_size);
        let second = AddressRange::new(second_base, second_size);
        let mut builder = Decoder::builder();
        builder.add("first", first, Protocol::Word, Ram::new(first_size));
        builder.add("second", second, Protocol::Word, Ram::new(second_size));
        let built = builder.build();
        if first.overlaps(second) {
            prop_assert!(
                matches!(built, Err(ConfigError::OverlappingRanges { .. })),
                "overlap must be rejected"
            );
        } else {
            prop_assert!(built.is_ok());
        }
    }

    #[test]
    fn overlapping_registers_never_build(
        first_offset in 0u32..12,
        second_offset in 0u32..12,
        first_wide in any::<bool>(),
        second_wide in any::<bool>(),
    ) {
        let width = |wide: bool| if wide { AccessWidth::Word } else { AccessWidth::Byte };
        let first = Register::new("a", first_offset, width(first_wide), Access::ReadWrite);
        let second = Register::new("b", second_offset, width(second_wide), Access::ReadWrite);
        let overlap = first.range().overlaps(second.range());
        let mut builder = RegisterFile::builder("pair", 16);
        builder.add(first);
        builder.add(second);
        prop_assert_eq!(builder.build().is_err(), overlap);
    }

    #[test]
    fn read_write_registers_round_trip(
        register in prop::sample::select(vec![
            (SCRATCH_BASE, AccessWidth::Word, SCRATCH_RESET),
            (PDM_BASE, AccessWidth::Half, 0),
            (PDM_BASE + 4, AccessWidth::Byte, 0),
            (SRAM_BASE + 0x10, AccessWidth::Word, 0),
        ]),
        accesses in prop::collection::vec(
            (
                prop::sample::select(vec![AccessWidth::Byte, AccessWidth::Half, AccessWidth::Word]),
                0u32..4,
                0u8..16,
                any::<u32>(),
                any::<bool>(),
            ),
            1..6,
        ),
    ) {
        let (base, register_width, reset) = register;
        let mut model = reset.to_le_bytes()[..usize::from(register_width.bytes())].to_vec();
        let mut fabric = fabric_with(1, 0);
        let mut clock = Clock::new();

        for (width, slot, lanes, value, is_write) in accesses {
            let width = if width.bytes() > register_width.bytes() { register_width } else { width };
            let size = usize::from(width.bytes());
            let offset = (slot as usize % (model.len() / size)) * size;
            let address = base + offset as u32;

            if is_write {
                let lanes = ByteLanes::from_bits(lanes);
                let txn = Transaction::write(CPU, address, width, value).with_byte_lanes(lanes);
                prop_assert!(execute(&mut fabric, &mut clock, txn).is_ack());
                for (lane, byte) in value.to_le_bytes()[..size].iter().enumerate() {
                    if lanes.is_enabled(lane as u8) {
                        model[offset + lane] = *byte;
                    }
                }
            } else {
                let read = execute(&mut fabric, &mut clock, Transaction::read(CPU, address, width));
                prop_assert_eq!(read, Response::Ack { data: le_value(&model[offset..offset + size]) });
            }
        }

        let whole = execute(&mut fabric, &mut clock, Transaction::read(CPU, base, register_width));
        prop_assert_eq!(whole, Response::Ack { data: le_value(&model) });
    }

    #[test]
    fn continuously_requesting_initiators_rotate(initiators in 1usize..=6, cycles in 16u64..160) {
        let mut fabric = fabric_with(initiators, 0);
        let ids: Vec<_> = (0..initiators).map(InitiatorId::new).collect();
        let mut clock = Clock::new();
        let mut trace = Vec::new();

        for _ in 0..cycles {
            for &id in &ids {
                let _ = fabric.take_completion(id);
                let address = if id.index() % 2 == 0 { SRAM_BASE } else { SCRATCH_BASE };
                let _ = fabric.submit(id, Transaction::read(id, address, AccessWidth::Word));
            }
            fabric.step(clock.advance(), &mut trace);
        }

        let grants: Vec<usize> = trace
            .iter()
            .filter_map(|event| match event {
                TraceEvent::Granted { initiator, .. } => Some(initiator.index()),
                _ => None,
            })
            .collect();
        prop_assert!(grants.len() >= initiators);
        for window in grants.windows(initiators) {
            let mut seen = window.to_vec();
            seen.sort_unstable();
            prop_assert_eq!(seen, (0..initiators).collect::<Vec<_>>());
        }
    }
}

#[test]
fn unmapped_top_address_faults_without_side_effects() {
    let mut empty = {
        let mut builder = Fabric::builder();
        builder.initiator("cpu");
        builder.build().expect("bare fabric")
    };
    let mut clock = Clock::new();
    let completion = empty
        .execute(
            CPU,
            Transaction::read(CPU, 0xFFFF_FFFF, AccessWidth::Byte),
            &mut clock,
            &mut NoTrace,
        )
        .expect("port is free");
    assert_eq!(completion.response, Response::Error(BusFault::Unmapped));
    assert_eq!(completion.bus_cycles(), 1);

    let mut fabric = fabric_with(1, 0);
    let mut clock = Clock::new();
    let response = execute(
        &mut fabric,
        &mut clock,
        Transaction::write(CPU, 0xFFFF_FFFF, AccessWidth::Byte, 0xFF),
    );
    assert_eq!(response, Response::Error(BusFault::Unmapped));
    assert!(fabric
        .memory("sram")
        .expect("sram")
        .iter()
        .all(|byte| *byte == 0));
    let scratch = fabric.peripheral("SCRATCH").expect("mapped");
    assert_eq!(
        scratch.registers().field_value("data", "value"),
        Some(SCRATCH_RESET)
    );
}

#[test]
fn concurrent_read_sees_whole_pre_or_post_write_value() {
    for (writer, reader) in [(0, 1), (1, 0)] {
        let mut fabric = fabric_with(2, 0);
        let mut clock = Clock::new();
        let writer = InitiatorId::new(writer);
        let reader = InitiatorId::new(reader);
        fabric
            .submit(writer, Transaction::write(writer, SCRATCH_BASE, AccessWidth::Word, 0x1122_3344))
            .expect("writer");
        fabric
            .submit(reader, Transaction::read(reader, SCRATCH_BASE, AccessWidth::Word))
            .expect("reader");
        fabric.run(12, &mut clock, &mut NoTrace);

        let read = fabric.take_completion(reader).expect("read done");
        let write = fabric.take_completion(writer).expect("write done");
        let observed = read.response.data().expect("ack");
        assert!(observed == SCRATCH_RESET || observed == 0x1122_3344, "{observed:#x}");
        let expected = if write.completed_at < read.granted_at {
            0x1122_3344
        } else {
            SCRATCH_RESET
        };
        assert_eq!(observed, expected);
    }
}

#[test]
fn multi_byte_read_of_a_changing_register_does_not_tear() {
    let start = 0x00FF_FFFF;
    let mut fabric = fabric_with(1, start);
    let mut clock = Clock::new();

    for _ in 0..4 {
        let completion = fabric
            .execute(
                CPU,
                Transaction::read(CPU, SCRATCH_BASE + 4, AccessWidth::Word),
                &mut clock,
                &mut NoTrace,
            )
            .expect("port is free");
        let value = completion.response.data().expect("ack");
        assert_eq!(value, start.wrapping_add(completion.granted_at as u32));
    }
}

#[test]
fn sub_word_write_keeps_the_untouched_bytes() {
    let mut fabric = fabric_with(1, 0);
    let mut clock = Clock::new();

    let written = execute(
        &mut fabric,
        &mut clock,
        Transaction::write(CPU, SCRATCH_BASE, AccessWidth::Half, 0x1234),
    );
    assert_eq!(written, Response::Ack { data: 0 });
    let read = execute(&mut fabric, &mut clock, Transaction::read(CPU, SCRATCH_BASE, AccessWidth::Word));
    assert_eq!(read, Response::Ack { data: 0xAABB_1234 });
}

#[test]
fn lane_masked_write_only_changes_enabled_bytes() {
    let mut fabric = fabric_with(1, 0);
    let mut clock = Clock::new();

    let write = Transaction::write(CPU, SCRATCH_BASE, AccessWidth::Word, 0x1122_3344)
        .with_byte_lanes(ByteLanes::from_bits(0b0011));
    assert_eq!(execute(&mut fabric, &mut clock, write), Response::Ack { data: 0 });
    let read = execute(&mut fabric, &mut clock, Transaction::read(CPU, SCRATCH_BASE, AccessWidth::Word));
    assert_eq!(read, Response::Ack { data: 0xAABB_3344 });
    let scratch = fabric.peripheral("SCRATCH").expect("mapped");
    assert_eq!(scratch.registers().field_value("data", "value"), Some(0xAABB_3344));
}

#[test]
fn partial_read_does_not_serve_later_reads_stale_bytes() {
    let mut fabric = fabric_with(1, 0);
    let mut clock = Clock::new();

    let low = execute(&mut fabric, &mut clock, Transaction::read(CPU, SCRATCH_BASE, AccessWidth::Half));
    assert_eq!(low, Response::Ack { data: 0xCCDD });
    execute(
        &mut fabric,
        &mut clock,
        Transaction::write(CPU, SCRATCH_BASE, AccessWidth::Word, 0x1122_3344),
    );
    let byte = execute(&mut fabric, &mut clock, Transaction::read(CPU, SCRATCH_BASE + 2, AccessWidth::Byte));
    assert_eq!(byte, Response::Ack { data: 0x22 });
}

#[test]
fn half_scale_code_density_holds_in_every_window() {
    let mut core = DeltaSigmaCore::new(10).expect("width");
    let bits: Vec<bool> = (0..4096).map(|_| core.step(512)).collect();
    for window in bits.windows(1024) {
        let ones = window.iter().filter(|bit| **bit).count();
        assert!((511..=513).contains(&ones), "{ones} ones");
    }
}

#[test]
fn half_scale_code_through_the_bus() {
    let mut fabric = fabric_with(1, 0);
    let mut clock = Clock::new();
    execute(&mut fabric, &mut clock, Transaction::write(CPU, PDM_BASE, AccessWidth::Half, 512));
    execute(&mut fabric, &mut clock, Transaction::write(CPU, PDM_BASE + 4, AccessWidth::Byte, 1));

    let mut ones = 0;
    for _ in 0..1024 {
        fabric.step(clock.advance(), &mut NoTrace);
        ones += usize::from(pdm_output(&fabric));
    }
    assert!((511..=513).contains(&ones), "{ones} ones");
}

#[test]
fn conf_enable_and_full_scale_code_drive_the_output() {
    let mut fabric = fabric_with(1, 0);
    let mut clock = Clock::new();

    let written = execute(&mut fabric, &mut clock, Transaction::write(CPU, PDM_BASE + 4, AccessWidth::Byte, 0x01));
    assert_eq!(written, Response::Ack { data: 0 });
    let conf = execute(&mut fabric, &mut clock, Transaction::read(CPU, PDM_BASE + 4, AccessWidth::Byte));
    assert_eq!(conf, Response::Ack { data: 0x01 });

    execute(&mut fabric, &mut clock, Transaction::write(CPU, PDM_BASE, AccessWidth::Half, 0x3FF));

    let mut ones = 0;
    for _ in 0..1024 {
        fabric.step(clock.advance(), &mut NoTrace);
        ones += usize::from(pdm_output(&fabric));
    }
    assert!(ones == 1023 || ones == 1024, "{ones} ones");
}
