use rand::Rng;

const CODE_ALPHABET: &[u8] = b"0123456789ABCDEF";

fn random_hex(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Human-friendly order code, e.g. `BB-3F91A2C4`.
pub fn generate_order_code() -> String {
    format!("BB-{}", random_hex(8))
}

/// Provider/refund reference, e.g. `REF-5D0B7E12A9`.
pub fn generate_reference_code(prefix: &str) -> String {
    format!("{}-{}", prefix, random_hex(10))
}

/// Voucher code handed to the customer, e.g. `VCH-A1B2C3D4`.
pub fn generate_voucher_code() -> String {
    format!("VCH-{}", random_hex(8))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_code_format() {
        let code = generate_order_code();
        assert!(code.starts_with("BB-"));
        assert_eq!(code.len(), 11);
        assert!(code[3..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_reference_code_uses_prefix() {
        let code = generate_reference_code("REFUND");
        assert!(code.starts_with("REFUND-"));
        assert_eq!(code.len(), "REFUND-".len() + 10);
    }

    #[test]
    fn test_voucher_codes_differ() {
        // Collisions are possible in principle; this mainly exercises the
        // generator.
        let a = generate_voucher_code();
        let b = generate_voucher_code();
        assert_eq!(a.len(), 12);
        assert_eq!(b.len(), 12);
    }
}
