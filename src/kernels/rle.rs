//! Run-length compression

/// Longest run a single (count, value) pair can describe.
pub const MAX_RUN: u8 = u8::MAX;

/// Encode `input` as (count, value) byte pairs.
pub fn run_length_encode(input: &[u8]) -> Vec<u8> {
    let mut output = Vec::with_capacity(input.len() * 2);
    let mut bytes = input.iter().copied().peekable();

    while let Some(value) = bytes.next() {
        let mut count: u8 = 1;
        while count < MAX_RUN && bytes.peek() == Some(&value) {
            bytes.next();
            count += 1;
        }
        output.push(count);
        output.push(value);
    }

    output
}

/// Deterministic long-run input: every ten consecutive bytes share a value.
pub fn compression_input(len: usize) -> Vec<u8> {
    (0..len).map(|i| ((i / 10) % 255) as u8).collect()
}

/// Encode the fixed input of `len` bytes and return the encoded length.
pub fn compression_kernel(len: usize) -> usize {
    let input = compression_input(len);
    run_length_encode(&input).len()
}
