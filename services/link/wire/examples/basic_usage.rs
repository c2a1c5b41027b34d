//! Basic usage example for the serial link wire protocol.

use link_wire::{
    encode_frame, split, FrameParser, Reassembler, SegmentOutcome, TlvMsg, MAX_PAYLOAD,
    TLV_VERSION,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Serial Link Wire Protocol Example ===\n");

    // 1. Encode a frame
    println!("1. Encoding a frame...");
    let frame = encode_frame(b"Hello, link!")?;
    println!("   Encoded frame size: {} bytes", frame.len());
    println!("   Raw bytes: {:02X?}", frame.as_ref());

    // 2. Parse it back out of a noisy byte stream
    println!("\n2. Parsing the frame out of a noisy stream...");
    let mut parser = FrameParser::new();
    let mut stream = vec![0x00, 0xFF, 0x42]; // line noise before the frame
    stream.extend_from_slice(&frame);

    for rx in parser.feed(&stream) {
        println!("   Payload: {:?}", std::str::from_utf8(&rx.data));
    }
    let stats = parser.stats();
    println!(
        "   Parser stats: {} ok, {} bad length, {} crc errors",
        stats.frames_ok, stats.bad_length, stats.crc_errors
    );

    // 3. Split a large payload into segments
    println!("\n3. Splitting a large payload into segments...");
    let large_payload = vec![0x42u8; 300];
    let segments = split(&large_payload, 7)?;
    println!(
        "   Split {} bytes into {} segment chunks",
        large_payload.len(),
        segments.len()
    );

    // 4. Frame each chunk, then reassemble on the receiving side
    println!("\n4. Reassembling the segments...");
    let mut reassembler = Reassembler::new();
    let mut reassembled = None;

    for segment in &segments {
        // A chunk is frame DATA; it still needs SYNC/LEN/CRC framing.
        let framed = encode_frame(segment)?;
        for rx in parser.feed(&framed) {
            match reassembler.accept(&rx.data) {
                SegmentOutcome::Progress { received, total, .. } => {
                    println!("   Progress: {}/{} bytes", received, total)
                }
                SegmentOutcome::Complete { payload, .. } => reassembled = Some(payload),
                SegmentOutcome::NotSegmented => println!("   Unexpected unsegmented frame"),
            }
        }
    }

    if let Some(payload) = reassembled {
        println!("   Reassembled payload size: {} bytes", payload.len());
        println!(
            "   Original matches reassembled: {}",
            payload == large_payload
        );
    }

    // 5. Wrap a TLV message in a frame
    println!("\n5. Sending a TLV message...");
    let msg = TlvMsg::new(TLV_VERSION, vec![1, 0]);
    let encoded = msg.encode()?;
    println!(
        "   TLV record is {} bytes, fits one frame: {}",
        encoded.len(),
        encoded.len() <= MAX_PAYLOAD
    );

    let frame = encode_frame(&encoded)?;
    for rx in parser.feed(&frame) {
        let decoded = TlvMsg::decode(&rx.data)?;
        println!("   Decoded TLV id {} value {:?}", decoded.id, &decoded.value[..]);
    }

    println!("\n=== Example completed successfully! ===");
    Ok(())
}
