// Byte candidates ordered by how likely they are to appear in English text.
//
// The attacks in this crate brute force one plaintext byte at a time, asking
// the oracle about each of the 256 possible values until one is confirmed.
// The plaintexts we are after are English, so trying the common letters first
// means we usually stop after a handful of queries instead of a hundred or so.
// The order only changes how quickly we find a byte, never which byte we
// find, since every value is still tried eventually.

// http://practicalcryptography.com/cryptanalysis/letter-frequencies-various-languages/english-letter-frequencies/
const LETTER_FREQUENCIES: [f64; 26] = [
    0.08551690673195275,   // A
    0.016047959168228293,  // B
    0.03164435380900101,   // C
    0.03871183735737418,   // D
    0.1209652247516903,    // E
    0.021815103969122528,  // F
    0.020863354250923158,  // G
    0.04955707280570641,   // H
    0.0732511860723129,    // I
    0.002197788956104563,  // J
    0.008086975227142329,  // K
    0.04206464329306453,   // L
    0.025263217360184446,  // M
    0.07172184876283856,   // N
    0.07467265410810447,   // O
    0.020661660788966266,  // P
    0.0010402453014323196, // Q
    0.0633271013284023,    // R
    0.06728203117491646,   // S
    0.08938126949659495,   // T
    0.026815809362304373,  // U
    0.01059346274662571,   // V
    0.018253618950416498,  // W
    0.0019135048594134572, // X
    0.017213606152473405,  // Y
    0.001137563214703838,  // Z
];
const PUNCTUATION_CHARS: &[u8] = b",.'\"!?:;-\n";

/// Every byte value exactly once, most likely English characters first.
///
/// Lowercase letters by frequency, then space, uppercase letters, digits,
/// punctuation and PKCS#7 padding values, then everything else ascending.
pub fn candidate_order() -> [u8; 256] {
    let mut letters: Vec<u8> = (b'a'..=b'z').collect();
    letters.sort_by(|a, b| letter_frequency(*b).total_cmp(&letter_frequency(*a)));

    let likely_bytes = letters
        .iter()
        .copied()
        .chain(std::iter::once(b' '))
        .chain(letters.iter().map(u8::to_ascii_uppercase))
        .chain(b'0'..=b'9')
        .chain(PUNCTUATION_CHARS.iter().copied())
        .chain(1..=16);

    let mut order = [0u8; 256];
    let mut seen = [false; 256];
    let mut n_ordered = 0;
    for byte in likely_bytes.chain(0..=u8::MAX) {
        if !seen[byte as usize] {
            seen[byte as usize] = true;
            order[n_ordered] = byte;
            n_ordered += 1;
        }
    }
    order
}

fn letter_frequency(lowercase: u8) -> f64 {
    LETTER_FREQUENCIES[(lowercase - b'a') as usize]
}
