use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use serial_test::serial;
use voxcall_media_core::prelude::*;
use voxcall_media_core::{G711CodecFactory, ToneDevice, MAX_PACKET_BYTES};

/// Tone captured by one device, encoded, decoded, and played by another
#[test]
#[serial]
fn test_tone_crosses_codec_into_playback() {
    let factory = G711CodecFactory::pcmu();
    let frame = factory.descriptor().frame_samples;

    let local_meter = Arc::new(LevelMeter::new());
    let mut local = AudioStream::open(frame, 0, local_meter.clone()).unwrap();
    let mut local_device = ToneDevice::new(8000, frame).with_amplitude(0.5);

    let remote_meter = Arc::new(LevelMeter::new());
    let mut remote = AudioStream::open(frame, 0, remote_meter.clone()).unwrap();
    let mut remote_device = ToneDevice::new(8000, frame).with_amplitude(0.0);
    let remote_stats = remote_device.stats();

    local_device.start(local.endpoint).unwrap();
    remote_device.start(remote.endpoint).unwrap();

    let mut encoder = factory.new_encoder().unwrap();
    let mut decoder = factory.new_decoder().unwrap();
    let mut pcm = vec![0 as Sample; frame];
    let mut packet = [0u8; MAX_PACKET_BYTES];

    let deadline = Instant::now() + Duration::from_secs(3);
    let mut frames = 0;
    while frames < 10 {
        assert!(Instant::now() < deadline, "capture stalled after {} frames", frames);
        if local.capture.read_frame(&mut pcm) == 0 {
            thread::sleep(Duration::from_millis(5));
            continue;
        }
        let len = encoder.encode(&pcm, &mut packet).unwrap();
        let decoded = decoder.decode(&packet[..len], &mut pcm).unwrap();
        assert_eq!(remote.playback.write_frame(&pcm[..decoded]), decoded);
        frames += 1;
    }

    // The output meter only reads non-zero while decoded audio is playing
    while remote_meter.output_level() == 0.0 {
        assert!(Instant::now() < deadline, "nothing was played");
        thread::sleep(Duration::from_millis(5));
    }

    local_device.stop().unwrap();
    remote_device.stop().unwrap();

    assert!(local_meter.input_level() > 0.0);
    assert_eq!(remote_meter.input_level(), 0.0);
    assert!(remote_stats.audible_samples() > 0);
}
