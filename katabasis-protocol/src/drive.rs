//! Paired drive-unit protocol
//!
//! The winch motor hangs off a commodity brushed drive with its own
//! microcontroller and a 128-byte configuration image. At every boot,
//! before the control loop starts, the firmware reads the image back,
//! verifies the model string, and rewrites any configuration bytes that
//! drifted from the compiled table - a drive swapped in the field comes
//! up with the wrong current limits otherwise.
//!
//! Packets in both directions carry a header byte, a body length, the
//! body, and an additive 8-bit checksum over everything before it.

/// Interface/version query.
pub const REQ_INFO: u8 = 0x11;
/// Wake-up poke, repeated while the drive boots.
pub const REQ_WAKE: u8 = 0xf1;
/// Read one 16-byte window of the config image.
pub const REQ_READ: u8 = 0xf2;
/// Write one sub-block of the config image.
pub const REQ_WRITE: u8 = 0xf3;
/// Commit written blocks to the drive's flash.
pub const REQ_COMMIT: u8 = 0xf4;

/// Size of the drive's configuration image.
pub const CONFIG_IMAGE_LEN: usize = 128;
/// Read window size.
pub const BLOCK_LEN: usize = 16;
/// Payload bytes per write sub-block.
pub const SUB_BLOCK_LEN: usize = 13;
/// Body length of a write request (offset, length, flag, padded data).
pub const WRITE_BODY_LEN: usize = 16;
/// Body length of the info reply.
pub const INFO_REPLY_LEN: u8 = 3;

/// Offset and length of the model string within the image.
pub const MODEL_OFFSET: usize = 0x40;
pub const MODEL_LEN: usize = 8;
/// The drive model this controller is built for.
pub const EXPECTED_MODEL: [u8; MODEL_LEN] = *b"GD350-12";

/// Configuration bytes this controller requires, as (offset, value).
/// Current limit, ramp rate, and the analog-throttle input mode.
pub const CONFIG_PATCH: &[(usize, u8)] = &[
    (0x10, 0x23), // phase current limit, 35A
    (0x11, 0x0f), // ramp rate
    (0x16, 0x01), // throttle input: analog CV
    (0x17, 0x00), // regen braking off (brake CV relay instead)
    (0x2c, 0x64), // low-voltage cutout, matches the supervisor floor
];

/// Largest frame either side sends.
pub const MAX_FRAME_LEN: usize = 3 + BLOCK_LEN;

/// Errors from drive-link framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DriveError {
    /// Fewer bytes arrived than the expected frame.
    Truncated,
    /// Header byte did not match the request.
    BadHeader,
    /// Reported body length did not match the expected reply.
    BadLength,
    /// Additive checksum mismatch.
    BadChecksum,
    /// Encode buffer too small.
    BufferTooSmall,
    /// Transport failure on the link (transports map their I/O errors
    /// and reply timeouts here).
    Link,
}

/// Additive 8-bit checksum over a byte run.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |sum, b| sum.wrapping_add(*b))
}

/// Encode a request frame. Returns the number of bytes written.
pub fn encode_request(buf: &mut [u8], header: u8, body: &[u8]) -> Result<usize, DriveError> {
    let total = body.len() + 3;
    if buf.len() < total {
        return Err(DriveError::BufferTooSmall);
    }
    buf[0] = header;
    buf[1] = body.len() as u8;
    buf[2..2 + body.len()].copy_from_slice(body);
    buf[total - 1] = checksum(&buf[..total - 1]);
    Ok(total)
}

/// Validate a reply frame against the expected header and body length,
/// returning the body on success.
pub fn parse_reply(raw: &[u8], header: u8, body_len: u8) -> Result<&[u8], DriveError> {
    let total = usize::from(body_len) + 3;
    if raw.len() < total {
        return Err(DriveError::Truncated);
    }
    let frame = &raw[..total];
    if frame[0] != header {
        return Err(DriveError::BadHeader);
    }
    if frame[1] != body_len {
        return Err(DriveError::BadLength);
    }
    if checksum(&frame[..total - 1]) != frame[total - 1] {
        return Err(DriveError::BadChecksum);
    }
    Ok(&frame[2..total - 1])
}

/// Encode the wake poke.
pub fn wake_request(buf: &mut [u8]) -> Result<usize, DriveError> {
    encode_request(buf, REQ_WAKE, &[])
}

/// Encode the info query.
pub fn info_request(buf: &mut [u8]) -> Result<usize, DriveError> {
    encode_request(buf, REQ_INFO, &[])
}

/// Encode a read of the 16-byte window at `offset`.
pub fn read_block_request(buf: &mut [u8], offset: u8) -> Result<usize, DriveError> {
    encode_request(buf, REQ_READ, &[offset, BLOCK_LEN as u8, 0x00])
}

/// Encode a write of the sub-block at `offset`. Short tails are padded
/// with 0xff. Returns the frame length and the payload length consumed.
pub fn write_block_request(
    buf: &mut [u8],
    image: &[u8; CONFIG_IMAGE_LEN],
    offset: usize,
) -> Result<(usize, usize), DriveError> {
    let remain = CONFIG_IMAGE_LEN - offset;
    let plen = SUB_BLOCK_LEN.min(remain);

    let mut body = [0xffu8; WRITE_BODY_LEN];
    body[0] = offset as u8;
    body[1] = plen as u8;
    body[2] = 0x00;
    body[3..3 + plen].copy_from_slice(&image[offset..offset + plen]);

    let len = encode_request(buf, REQ_WRITE, &body)?;
    Ok((len, plen))
}

/// Encode the commit request.
pub fn commit_request(buf: &mut [u8]) -> Result<usize, DriveError> {
    encode_request(buf, REQ_COMMIT, &[])
}

/// Whether the image carries the expected model string.
pub fn model_matches(image: &[u8; CONFIG_IMAGE_LEN]) -> bool {
    image[MODEL_OFFSET..MODEL_OFFSET + MODEL_LEN] == EXPECTED_MODEL
}

/// The model string bytes, for logging an unknown drive.
pub fn model_bytes(image: &[u8; CONFIG_IMAGE_LEN]) -> &[u8] {
    &image[MODEL_OFFSET..MODEL_OFFSET + MODEL_LEN]
}

/// Rewrite the image with the compiled configuration table.
/// Returns true when the image already matched (nothing to write).
pub fn apply_patch(image: &mut [u8; CONFIG_IMAGE_LEN]) -> bool {
    let mut unchanged = true;
    for &(offset, value) in CONFIG_PATCH {
        if image[offset] != value {
            image[offset] = value;
            unchanged = false;
        }
    }
    unchanged
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn patched_image() -> [u8; CONFIG_IMAGE_LEN] {
        let mut image = [0u8; CONFIG_IMAGE_LEN];
        image[MODEL_OFFSET..MODEL_OFFSET + MODEL_LEN].copy_from_slice(&EXPECTED_MODEL);
        apply_patch(&mut image);
        image
    }

    #[test]
    fn checksum_is_additive() {
        assert_eq!(checksum(&[]), 0);
        assert_eq!(checksum(&[0x11, 0x00]), 0x11);
        assert_eq!(checksum(&[0xff, 0x02]), 0x01); // wraps
    }

    #[test]
    fn empty_request_layout() {
        let mut buf = [0u8; MAX_FRAME_LEN];
        let len = wake_request(&mut buf).unwrap();
        assert_eq!(len, 3);
        assert_eq!(&buf[..3], &[REQ_WAKE, 0x00, REQ_WAKE]);
    }

    #[test]
    fn read_request_layout() {
        let mut buf = [0u8; MAX_FRAME_LEN];
        let len = read_block_request(&mut buf, 0x30).unwrap();
        assert_eq!(len, 6);
        assert_eq!(&buf[..5], &[REQ_READ, 0x03, 0x30, 0x10, 0x00]);
        assert_eq!(buf[5], checksum(&buf[..5]));
    }

    #[test]
    fn encode_rejects_short_buffer() {
        let mut buf = [0u8; 2];
        assert_eq!(
            info_request(&mut buf),
            Err(DriveError::BufferTooSmall)
        );
    }

    #[test]
    fn reply_round_trip() {
        let mut buf = [0u8; MAX_FRAME_LEN];
        let len = encode_request(&mut buf, REQ_INFO, &[2, 0, 7]).unwrap();
        let body = parse_reply(&buf[..len], REQ_INFO, 3).unwrap();
        assert_eq!(body, &[2, 0, 7]);
    }

    #[test]
    fn reply_validation_failures() {
        let mut buf = [0u8; MAX_FRAME_LEN];
        let len = encode_request(&mut buf, REQ_READ, &[1, 2, 3]).unwrap();

        assert_eq!(
            parse_reply(&buf[..len - 1], REQ_READ, 3),
            Err(DriveError::Truncated)
        );
        assert_eq!(
            parse_reply(&buf[..len], REQ_WRITE, 3),
            Err(DriveError::BadHeader)
        );
        assert_eq!(
            parse_reply(&buf[..len], REQ_READ, 2),
            Err(DriveError::BadLength)
        );

        buf[len - 1] ^= 0xff;
        assert_eq!(
            parse_reply(&buf[..len], REQ_READ, 3),
            Err(DriveError::BadChecksum)
        );
    }

    #[test]
    fn write_request_pads_short_tail() {
        let image = patched_image();
        let mut buf = [0u8; MAX_FRAME_LEN];

        // 128 = 9 full sub-blocks of 13 plus a tail of 11
        let tail_offset = 9 * SUB_BLOCK_LEN;
        let (len, plen) = write_block_request(&mut buf, &image, tail_offset).unwrap();
        assert_eq!(plen, CONFIG_IMAGE_LEN - tail_offset);
        assert_eq!(len, 3 + WRITE_BODY_LEN);
        assert_eq!(buf[2], tail_offset as u8);
        assert_eq!(buf[3], plen as u8);
        // Padding after the payload
        assert_eq!(buf[5 + plen], 0xff);
        assert_eq!(buf[5 + SUB_BLOCK_LEN - 1], 0xff);
    }

    #[test]
    fn sub_blocks_cover_the_image() {
        let image = patched_image();
        let mut buf = [0u8; MAX_FRAME_LEN];
        let mut offset = 0;
        let mut passes = 0;
        while offset < CONFIG_IMAGE_LEN {
            let (_, plen) = write_block_request(&mut buf, &image, offset).unwrap();
            offset += plen;
            passes += 1;
        }
        assert_eq!(offset, CONFIG_IMAGE_LEN);
        assert_eq!(passes, 10);
    }

    #[test]
    fn patch_detects_drift_and_is_idempotent() {
        let mut image = patched_image();
        assert!(apply_patch(&mut image), "clean image needs no write");

        image[CONFIG_PATCH[0].0] ^= 0x40;
        assert!(!apply_patch(&mut image), "drift must report a change");
        assert!(apply_patch(&mut image), "second pass is clean");
    }

    #[test]
    fn model_check() {
        let image = patched_image();
        assert!(model_matches(&image));

        let mut wrong = image;
        wrong[MODEL_OFFSET] = b'X';
        assert!(!model_matches(&wrong));
        assert_eq!(model_bytes(&wrong)[1..], EXPECTED_MODEL[1..]);
    }

    proptest! {
        /// Any body survives an encode/parse round trip.
        #[test]
        fn frame_round_trip(header in 0u8..=255, body in proptest::collection::vec(0u8..=255u8, 0..=BLOCK_LEN)) {
            let mut buf = [0u8; MAX_FRAME_LEN];
            let len = encode_request(&mut buf, header, &body).unwrap();
            let parsed = parse_reply(&buf[..len], header, body.len() as u8).unwrap();
            prop_assert_eq!(parsed, &body[..]);
        }

        /// Flipping any single frame byte is caught by the layered
        /// header/length/checksum validation.
        #[test]
        fn single_byte_corruption_detected(
            body in proptest::collection::vec(0u8..=255u8, 0..=BLOCK_LEN),
            pos_seed: usize,
            flip in 1u8..=255,
        ) {
            let mut buf = [0u8; MAX_FRAME_LEN];
            let len = encode_request(&mut buf, REQ_READ, &body).unwrap();
            let pos = pos_seed % len;
            buf[pos] ^= flip;
            prop_assert!(parse_reply(&buf[..len], REQ_READ, body.len() as u8).is_err());
        }
    }
}
