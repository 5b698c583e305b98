#![no_main]

use bitstream::BufferReader;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut reader = BufferReader::new(data);
    let mut idx = 0usize;

    // Use input bytes to drive a bounded sequence of operations.
    while idx < data.len() && idx < 1024 {
        let op = data[idx] % 8;
        idx += 1;

        match op {
            0 => {
                let _ = reader.read_byte();
            }
            1 => {
                let _ = reader.read_value::<u32>();
            }
            2 => {
                let _ = reader.read_varu32();
            }
            3 => {
                let _ = reader.read_vars64();
            }
            4 => {
                let _ = reader.read_len();
            }
            5 => {
                let count = usize::from(data[idx - 1] % 32);
                let _ = reader.read_bytes(count);
            }
            6 => {
                let bits = (data[idx - 1] % 64).saturating_add(1);
                let mut bitwise = reader.enter_bitwise();
                let _ = bitwise.read_bits(bits);
                let _ = bitwise.read_bit();
            }
            _ => {
                let _ = reader.skip(usize::from(data[idx - 1] % 8));
            }
        }
    }
});
