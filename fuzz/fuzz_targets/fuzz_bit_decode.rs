#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use voltage_sample::bitfield::{decode_bits, encode_bits, extract_bits, BitOrigin};
use voltage_sample::ByteOrder;

#[derive(Debug, Arbitrary)]
struct Input {
    payload: Vec<u8>,
    bit_offset: u16,
    bit_length: u8,
    order: u8,
    most_significant: bool,
    signed: bool,
    value: u64,
}

fuzz_target!(|input: Input| {
    let order = match input.order % 4 {
        0 => ByteOrder::BigEndian,
        1 => ByteOrder::LittleEndian,
        2 => ByteOrder::BigEndianSwap,
        _ => ByteOrder::LittleEndianSwap,
    };
    let origin = if input.most_significant {
        BitOrigin::MostSignificant
    } else {
        BitOrigin::LeastSignificant
    };

    // Decoding never panics, whatever the offsets.
    let _ = decode_bits(
        &input.payload,
        input.bit_offset,
        input.bit_length,
        order,
        input.signed,
        origin,
    );

    // A field that fits reads back what was written.
    let mut buf = input.payload.clone();
    if encode_bits(&mut buf, input.bit_offset, input.bit_length, order, origin, input.value) {
        let mask = if input.bit_length >= 64 {
            u64::MAX
        } else {
            (1u64 << input.bit_length) - 1
        };
        let read = extract_bits(&buf, input.bit_offset, input.bit_length, order, origin);
        assert_eq!(read, Some(input.value & mask));
    }
});
