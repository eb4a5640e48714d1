use bytes::Bytes;
use voxcall_rtp_core::prelude::*;
use voxcall_rtp_core::{Error, SRTP_AES128_CM_SHA1_80};

/// Keys travel as an `a=crypto` line; the receiver rebuilds the context from text.
#[test]
fn test_stream_protected_with_sdes_key() {
    let suite = SRTP_AES128_CM_SHA1_80;
    let local_key = SrtpCryptoKey::random(&suite);
    let line = format!("a=crypto:{}", SdesCryptoAttribute::new(1, &suite, &local_key));

    let attr = SdesCryptoAttribute::parse(&line).unwrap();
    let remote_suite = SrtpCryptoSuite::from_name(&attr.crypto_suite).unwrap();
    let remote_key = SrtpCryptoKey::from_base64(&remote_suite, attr.key_material()).unwrap();

    let mut tx = SrtpContext::new(suite, &local_key, 64).unwrap();
    let mut rx = SrtpContext::new(remote_suite, &remote_key, 64).unwrap();

    let mut packetizer = RtpPacketizer::with_sequence_base(116, 0xdeadbeef, 960, 65500);
    let mut sent = Vec::new();
    for i in 0..100u32 {
        let payload = i.to_be_bytes();
        let mut wire = packetizer.packetize(&payload).unwrap();
        tx.protect(&mut wire).unwrap();
        sent.push((i, wire));
    }

    // Deliver with some reordering and a lost packet
    sent.swap(10, 11);
    sent.remove(40);

    for (i, mut wire) in sent {
        rx.unprotect(&mut wire).unwrap();
        let packet = RtpPacket::parse(&wire).unwrap();
        assert_eq!(packet.payload, Bytes::copy_from_slice(&i.to_be_bytes()));
        assert_eq!(packet.header.timestamp, i * 960);
    }

    // The stream crossed the 16-bit sequence boundary
    assert_eq!(rx.roc(), 1);
}

#[test]
fn test_plain_rtp_is_rejected_by_srtp_receiver() {
    let suite = SRTP_AES128_CM_SHA1_80;
    let key = SrtpCryptoKey::random(&suite);
    let mut rx = SrtpContext::new(suite, &key, 64).unwrap();

    let mut packetizer = RtpPacketizer::with_sequence_base(102, 1, 960, 1);
    let mut wire = packetizer.packetize(b"not encrypted at all").unwrap();

    assert_eq!(rx.unprotect(&mut wire), Err(Error::AuthenticationFailed));
}
