use aes::cipher::{KeyIvInit, StreamCipher};

use super::crypto::SrtpCryptoKey;
use super::Aes128Ctr;
use crate::error::Error;
use crate::Result;

/// Label values for SRTP key derivation (RFC 3711 Section 4.3.1)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDerivationLabel {
    /// RTP encryption key
    RtpEncryption = 0,

    /// RTP authentication key
    RtpAuthentication = 1,

    /// RTP salt (for IV creation)
    RtpSalt = 2,
}

/// Derive a session key from the master key using the AES-CM PRF.
///
/// The key derivation rate is zero, so the packet index never enters the
/// derivation: `x = label << 48 XOR master_salt`, and the output is the
/// AES-CM keystream for IV `x * 2^16`.
pub fn srtp_kdf(
    master_key: &SrtpCryptoKey,
    label: KeyDerivationLabel,
    output_len: usize,
) -> Result<Vec<u8>> {
    if master_key.key().len() != 16 {
        return Err(Error::SrtpError(format!(
            "AES-CM key derivation needs a 16-byte master key, got {}",
            master_key.key().len()
        )));
    }
    if master_key.salt().len() != 14 {
        return Err(Error::SrtpError(format!(
            "AES-CM key derivation needs a 14-byte master salt, got {}",
            master_key.salt().len()
        )));
    }

    let mut x = [0u8; 16];
    x[..14].copy_from_slice(master_key.salt());
    x[7] ^= label as u8;

    let mut output = vec![0u8; output_len];
    let mut cipher = Aes128Ctr::new(master_key.key().into(), x.as_slice().into());
    cipher.apply_keystream(&mut output);

    Ok(output)
}

/// Create the AES-CM initialization vector for one packet.
///
/// `IV = (salt * 2^16) XOR (SSRC * 2^64) XOR (index * 2^16)`
pub fn create_srtp_iv(salt: &[u8], ssrc: u32, packet_index: u64) -> Result<[u8; 16]> {
    if salt.len() < 14 {
        return Err(Error::SrtpError(format!(
            "Salt too short: expected at least 14 bytes, got {}",
            salt.len()
        )));
    }

    let mut iv = [0u8; 16];
    iv[..14].copy_from_slice(&salt[..14]);

    for (dst, src) in iv[4..8].iter_mut().zip(ssrc.to_be_bytes()) {
        *dst ^= src;
    }

    // 48-bit index
    for (dst, src) in iv[8..14].iter_mut().zip(&packet_index.to_be_bytes()[2..]) {
        *dst ^= src;
    }

    Ok(iv)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    /// RFC 3711 Appendix B.3 key derivation test vectors
    #[test]
    fn test_srtp_kdf_rfc3711_vectors() {
        let master = SrtpCryptoKey::new(
            hex("E1F97A0D3E018BE0D64FA32C06DE4139"),
            hex("0EC675AD498AFEEBB6960B3AABE6"),
        );

        let enc = srtp_kdf(&master, KeyDerivationLabel::RtpEncryption, 16).unwrap();
        assert_eq!(enc, hex("C61E7A93744F39EE10734AFE3FF7A087"));

        let salt = srtp_kdf(&master, KeyDerivationLabel::RtpSalt, 14).unwrap();
        assert_eq!(salt, hex("30CBBC08863D8C85D49DB34A9AE1"));

        let auth = srtp_kdf(&master, KeyDerivationLabel::RtpAuthentication, 20).unwrap();
        assert_eq!(auth, hex("CEBE321F6FF7716B6FD4AB49AF256A156D38BAA4"));
    }

    #[test]
    fn test_kdf_rejects_short_key() {
        let master = SrtpCryptoKey::new(vec![0; 10], vec![0; 14]);
        assert!(srtp_kdf(&master, KeyDerivationLabel::RtpEncryption, 16).is_err());
    }

    #[test]
    fn test_create_srtp_iv() {
        let salt = [0u8; 14];
        let iv = create_srtp_iv(&salt, 0x12345678, 0x0000_AABB_CCDD_EEFF).unwrap();
        assert_eq!(&iv[4..8], &[0x12, 0x34, 0x56, 0x78]);
        assert_eq!(&iv[8..14], &[0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
        assert_eq!(&iv[14..], &[0, 0]);

        let short_salt = [0u8; 8];
        assert!(create_srtp_iv(&short_salt, 0x12345678, 1000).is_err());
    }
}
