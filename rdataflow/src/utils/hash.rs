use std::io::Cursor;

use murmur3::murmur3_32;

const HASH_SEED: u32 = 0x19264330;

pub fn hash_code(v: &[u8]) -> std::io::Result<u32> {
    let mut cursor = Cursor::new(v);
    murmur3_32(&mut cursor, HASH_SEED)
}

#[cfg(test)]
mod tests {
    use crate::utils::hash::hash_code;

    #[test]
    pub fn hash_code_test() {
        let a = hash_code(b"rdataflow").unwrap();
        assert_eq!(a, hash_code(b"rdataflow").unwrap());
        assert_ne!(a, hash_code(b"rdataflows").unwrap());
    }
}
