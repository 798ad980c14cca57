//! Flash-backed parameter page
//!
//! The kernel's store expects EEPROM-like word-addressed nonvolatile
//! memory. The RP2040 only has sector-erase flash, so the last 4KB
//! sector holds the 1KB parameter page (entropy ring + parameter
//! words), shadowed in RAM: reads come from the shadow, a word write
//! updates the shadow and reprograms the sector.
//!
//! Each reprogram runs inside a critical section so the tick interrupt
//! can never observe a torn field write, per the [`NonVolatile`]
//! contract.

use embassy_rp::flash::{Blocking, Flash, ERASE_SIZE};
use embassy_rp::peripherals::FLASH;

use katabasis_core::traits::NonVolatile;

/// Total flash fitted on the board.
pub const FLASH_SIZE: usize = 2 * 1024 * 1024;
/// The parameter page lives in the last erase sector.
pub const PARAM_SECTOR_SIZE: usize = ERASE_SIZE;
pub const PARAM_SECTOR_START: usize = FLASH_SIZE - PARAM_SECTOR_SIZE;
/// Bytes of the sector actually used (ring + parameter block).
pub const PAGE_LEN: usize = 0x400;

/// RAM-shadowed parameter page over the chip flash.
pub struct ParamFlash<'d> {
    flash: Flash<'d, FLASH, Blocking, FLASH_SIZE>,
    shadow: [u8; PAGE_LEN],
}

impl<'d> ParamFlash<'d> {
    /// Take the flash peripheral and load the shadow page.
    pub fn new(flash: FLASH) -> Self {
        let mut flash = Flash::new_blocking(flash);
        // A failed read leaves the erased pattern, which the store
        // treats as first boot
        let mut shadow = [0xff; PAGE_LEN];
        let _ = flash.blocking_read(PARAM_SECTOR_START as u32, &mut shadow);
        Self { flash, shadow }
    }

    /// Reprogram the sector from the shadow. The backing store is
    /// assumed reliable; a failed program is caught by the sentinel
    /// check on the next boot.
    fn program(&mut self) {
        critical_section::with(|_| {
            let _ = self.flash.blocking_erase(
                PARAM_SECTOR_START as u32,
                (PARAM_SECTOR_START + PARAM_SECTOR_SIZE) as u32,
            );
            let _ = self
                .flash
                .blocking_write(PARAM_SECTOR_START as u32, &self.shadow);
        });
    }
}

impl NonVolatile for ParamFlash<'_> {
    fn read_word(&mut self, offset: u16) -> u16 {
        let o = usize::from(offset);
        u16::from_le_bytes([self.shadow[o], self.shadow[o + 1]])
    }

    fn write_word(&mut self, offset: u16, value: u16) {
        let o = usize::from(offset);
        self.shadow[o..o + 2].copy_from_slice(&value.to_le_bytes());
        self.program();
    }

    fn read_seed(&mut self, offset: u16) -> u32 {
        let o = usize::from(offset);
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&self.shadow[o..o + 4]);
        u32::from_le_bytes(bytes)
    }

    fn write_seed(&mut self, offset: u16, value: u32) {
        let o = usize::from(offset);
        self.shadow[o..o + 4].copy_from_slice(&value.to_le_bytes());
        self.program();
    }
}
