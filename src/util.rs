//! Small formatting helpers: fourcc codes and hexdumps.

/// Packs up to four ASCII characters big-endian, the way content
/// handles name their region and usage.
pub fn encode_fourcc(code: &str) -> u32 {
    debug_assert!(code.len() <= 4 && code.is_ascii());
    code.bytes().fold(0u32, |acc, b| (acc << 8) | u32::from(b))
}

/// Unpacks a fourcc, skipping leading NULs of short codes.
pub fn decode_fourcc(value: u32) -> String {
    let bytes = value.to_be_bytes();
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    bytes[start..].iter().map(|&b| char::from(b)).collect()
}

/// Renders a classic 16-bytes-per-line hexdump.
pub fn hexdump(data: &[u8]) -> String {
    const WIDTH: usize = 16;
    let mut out = String::new();
    for (index, chunk) in data.chunks(WIDTH).enumerate() {
        let hex: Vec<String> = chunk.iter().map(|b| format!("{b:02x}")).collect();
        let printable: String = chunk
            .iter()
            .map(|&b| {
                if (0x20..0x7f).contains(&b) {
                    char::from(b)
                } else {
                    '.'
                }
            })
            .collect();
        out.push_str(&format!(
            "{:08x}:  {:width$}  |{}|\n",
            index * WIDTH,
            hex.join(" "),
            printable,
            width = WIDTH * 3 - 1,
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fourcc_roundtrip() {
        assert_eq!(encode_fourcc("REGI"), 0x52454749);
        assert_eq!(decode_fourcc(0x52454749), "REGI");
        // Short codes keep their trailing characters only.
        assert_eq!(decode_fourcc(encode_fourcc("eu")), "eu");
    }

    #[test]
    fn hexdump_layout() {
        let dump = hexdump(b"Hello, world! \x00\xff tail");
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("00000000:  48 65 6c 6c 6f"));
        assert!(lines[0].ends_with("|Hello, world! ..|"));
        assert!(lines[1].starts_with("00000010:"));
    }
}
