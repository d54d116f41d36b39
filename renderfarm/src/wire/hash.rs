/// DJB rolling hash of a command name
///
/// `h = 5381; h = h * 33 + byte` for every byte, wrapping at 32 bits.
/// Both ends of the protocol use it as the stable identity of a command.
pub const fn djb_hash(name: &str) -> u32 {
    let bytes = name.as_bytes();
    let mut hash: u32 = 5381;
    let mut i = 0;
    while i < bytes.len() {
        hash = (hash << 5).wrapping_add(hash).wrapping_add(bytes[i] as u32);
        i += 1;
    }
    hash
}
