//! Boot-time drive-unit check
//!
//! Runs strictly before the control loop spawns: powers the drive,
//! wakes it, reads its configuration image back, verifies the model,
//! and rewrites any drifted configuration bytes. A drive that just took
//! new configuration must not be trusted in the same boot - the caller
//! holds the system for a watchdog reset instead of entering the
//! control loop.
//!
//! Every blocking wait in here feeds the watchdog.

use defmt::*;
use embassy_rp::gpio::Output;
use embassy_rp::uart::{Async, Uart};
use embassy_time::{with_timeout, Duration, Timer};

use katabasis_core::traits::WatchdogFeed;
use katabasis_protocol::drive::{
    self, DriveError, BLOCK_LEN, CONFIG_IMAGE_LEN, INFO_REPLY_LEN, MAX_FRAME_LEN, REQ_COMMIT,
    REQ_INFO, REQ_READ, REQ_WRITE,
};

/// How long to wait for any single reply.
const REPLY_TIMEOUT: Duration = Duration::from_millis(200);
/// Wake pokes before the first real request.
const WAKE_TRIES: u8 = 3;
/// Drive power-up settle before talking to it.
const POWER_UP_MS: u64 = 500;
/// Power-up settle chunk between watchdog feeds.
const POWER_UP_SLICE_MS: u64 = 50;

/// Result of the boot-time check, logged by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Outcome {
    /// Image read back clean; nothing written.
    Verified,
    /// The drive never answered; boot continues with it unpowered.
    NotConnected,
    /// Connected but the image would not read back.
    ReadError,
    /// The image belongs to a drive model this firmware is not
    /// configured for; nothing was written.
    UnknownModel,
    /// Configuration was rewritten and committed. The caller must not
    /// enter the control loop this boot.
    ConfigUpdated,
    /// A write or the commit failed mid-way.
    UpdateError,
}

/// Run the check. A clean check leaves the drive powered for the
/// control loop; every other outcome powers it back down.
pub async fn run(
    uart: &mut Uart<'static, Async>,
    power: &mut Output<'static>,
    watchdog: &mut impl WatchdogFeed,
) -> Outcome {
    power.set_high();
    settle(watchdog).await;

    let outcome = check(uart, watchdog).await;

    if outcome != Outcome::Verified {
        power.set_low();
    }
    outcome
}

async fn check(uart: &mut Uart<'static, Async>, watchdog: &mut impl WatchdogFeed) -> Outcome {
    if !connect(uart, watchdog).await {
        return Outcome::NotConnected;
    }

    let mut image = [0u8; CONFIG_IMAGE_LEN];
    if !read_image(uart, watchdog, &mut image).await {
        warn!("drive: read error");
        return Outcome::ReadError;
    }

    if !drive::model_matches(&image) {
        warn!("drive: unknown model {=[u8]:a}", drive::model_bytes(&image));
        return Outcome::UnknownModel;
    }

    if drive::apply_patch(&mut image) {
        // Serial number window, for the boot log
        info!("drive: config verified, sn {=[u8]:x}", &image[0x4c..0x50]);
        return Outcome::Verified;
    }

    watchdog.feed();
    if write_image(uart, watchdog, &image).await {
        Outcome::ConfigUpdated
    } else {
        warn!("drive: update error");
        Outcome::UpdateError
    }
}

/// Chunked power-up settle, watchdog fed between slices.
async fn settle(watchdog: &mut impl WatchdogFeed) {
    let mut remaining = POWER_UP_MS;
    while remaining > 0 {
        let slice = remaining.min(POWER_UP_SLICE_MS);
        Timer::after_millis(slice).await;
        watchdog.feed();
        remaining -= slice;
    }
}

/// Poke the drive awake, then confirm it answers the info request.
async fn connect(uart: &mut Uart<'static, Async>, watchdog: &mut impl WatchdogFeed) -> bool {
    drain(uart).await;
    for _ in 0..WAKE_TRIES {
        watchdog.feed();
        let _ = send(uart, drive::wake_request).await;
        drain(uart).await;
    }
    watchdog.feed();

    match transact(uart, drive::info_request, REQ_INFO, INFO_REPLY_LEN).await {
        Ok(version) => {
            info!(
                "drive: interface v{}.{}.{}",
                version[0], version[1], version[2]
            );
            true
        }
        Err(_) => false,
    }
}

async fn read_image(
    uart: &mut Uart<'static, Async>,
    watchdog: &mut impl WatchdogFeed,
    image: &mut [u8; CONFIG_IMAGE_LEN],
) -> bool {
    let mut offset = 0;
    while offset < CONFIG_IMAGE_LEN {
        let result = transact(
            uart,
            |buf| drive::read_block_request(buf, offset as u8),
            REQ_READ,
            BLOCK_LEN as u8,
        )
        .await;
        match result {
            Ok(block) => image[offset..offset + BLOCK_LEN].copy_from_slice(&block),
            Err(_) => return false,
        }
        watchdog.feed();
        offset += BLOCK_LEN;
    }
    true
}

async fn write_image(
    uart: &mut Uart<'static, Async>,
    watchdog: &mut impl WatchdogFeed,
    image: &[u8; CONFIG_IMAGE_LEN],
) -> bool {
    let mut offset = 0;
    while offset < CONFIG_IMAGE_LEN {
        let mut written = 0;
        let result = transact(
            uart,
            |buf| {
                drive::write_block_request(buf, image, offset).map(|(len, plen)| {
                    written = plen;
                    len
                })
            },
            REQ_WRITE,
            1,
        )
        .await;
        if result.is_err() {
            return false;
        }
        watchdog.feed();
        offset += written;
    }

    let committed = transact(uart, drive::commit_request, REQ_COMMIT, 0).await;
    watchdog.feed();
    committed.is_ok()
}

/// Encode with `build` and transmit.
async fn send(
    uart: &mut Uart<'static, Async>,
    build: impl FnOnce(&mut [u8]) -> Result<usize, DriveError>,
) -> Result<(), DriveError> {
    let mut buf = [0u8; MAX_FRAME_LEN];
    let len = build(&mut buf)?;
    uart.write(&buf[..len]).await.map_err(|_| DriveError::Link)
}

/// One request/reply exchange. The reply body is copied into a fixed
/// scratch frame and validated before use.
async fn transact(
    uart: &mut Uart<'static, Async>,
    build: impl FnOnce(&mut [u8]) -> Result<usize, DriveError>,
    header: u8,
    body_len: u8,
) -> Result<[u8; BLOCK_LEN], DriveError> {
    send(uart, build).await?;

    let total = usize::from(body_len) + 3;
    let mut raw = [0u8; MAX_FRAME_LEN];
    match with_timeout(REPLY_TIMEOUT, uart.read(&mut raw[..total])).await {
        Ok(Ok(())) => {}
        _ => return Err(DriveError::Link),
    }

    let body = drive::parse_reply(&raw[..total], header, body_len)?;
    let mut out = [0u8; BLOCK_LEN];
    out[..body.len()].copy_from_slice(body);
    Ok(out)
}

/// Swallow whatever the drive spat out while waking up.
async fn drain(uart: &mut Uart<'static, Async>) {
    let mut byte = [0u8; 1];
    while with_timeout(Duration::from_millis(20), uart.read(&mut byte))
        .await
        .is_ok()
    {}
}
