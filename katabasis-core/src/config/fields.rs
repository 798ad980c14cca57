//! Configuration field table
//!
//! Each field maps to a fixed word offset in the parameter page and a
//! compiled default used on first boot or after a corrupted sentinel.

/// Persisted tunables, one 16-bit word each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Field {
    /// Home -> P1 travel time, ticks
    P1Timeout,
    /// P1 -> P2 travel time, ticks
    P2Timeout,
    /// Manual jog cutoff, ticks
    ManualTimeout,
    /// Maximum return-home travel time, ticks
    HomeTimeout,
    /// Dwell at P1 before auto-raise, minutes (0 = stay)
    FeedDuration,
    /// Scheduled feeds per week (0 = scheduling off)
    FeedsPerWeek,
    /// Home re-seat check interval, ticks (0 = off)
    HomeRetry,
    /// Console unlock PIN
    ConsolePin,
}

impl Field {
    /// All fields, in parameter-page order.
    pub const ALL: [Field; 8] = [
        Field::P1Timeout,
        Field::P2Timeout,
        Field::ManualTimeout,
        Field::HomeTimeout,
        Field::FeedDuration,
        Field::FeedsPerWeek,
        Field::HomeRetry,
        Field::ConsolePin,
    ];

    /// Byte offset of this field's word within the parameter block.
    pub const fn offset(self) -> u16 {
        match self {
            Field::P1Timeout => 0x0,
            Field::P2Timeout => 0x2,
            Field::ManualTimeout => 0x4,
            Field::HomeTimeout => 0x6,
            Field::FeedDuration => 0x8,
            Field::FeedsPerWeek => 0xa,
            Field::HomeRetry => 0xc,
            Field::ConsolePin => 0xe,
        }
    }

    /// Compiled default, written on first boot.
    pub const fn default_value(self) -> u16 {
        match self {
            Field::P1Timeout => 1250,    // 12.5s H -> P1
            Field::P2Timeout => 1500,    // 15s P1 -> P2
            Field::ManualTimeout => 250, // 2.5s jog
            Field::HomeTimeout => 4000,  // 40s max return-home
            Field::FeedDuration => 30,   // 30 minutes at P1
            Field::FeedsPerWeek => 3,
            Field::HomeRetry => 3000, // re-seat check every 30s
            Field::ConsolePin => 1234,
        }
    }

    /// Display name, as echoed on the console.
    pub const fn name(self) -> &'static str {
        match self {
            Field::P1Timeout => "H-P1 time",
            Field::P2Timeout => "P1-P2 time",
            Field::ManualTimeout => "Man time",
            Field::HomeTimeout => "H time",
            Field::FeedDuration => "Feed min",
            Field::FeedsPerWeek => "Feeds/week",
            Field::HomeRetry => "H-Retry time",
            Field::ConsolePin => "PIN",
        }
    }
}

/// In-memory copy of the persisted configuration, loaded once at boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    pub p1_timeout: u16,
    pub p2_timeout: u16,
    pub manual_timeout: u16,
    pub home_timeout: u16,
    pub feed_duration: u16,
    pub feeds_per_week: u16,
    pub home_retry: u16,
    pub console_pin: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self::compiled_defaults()
    }
}

impl Config {
    /// The compiled defaults as a struct.
    pub fn compiled_defaults() -> Self {
        let mut cfg = Self {
            p1_timeout: 0,
            p2_timeout: 0,
            manual_timeout: 0,
            home_timeout: 0,
            feed_duration: 0,
            feeds_per_week: 0,
            home_retry: 0,
            console_pin: 0,
        };
        for field in Field::ALL {
            cfg.set(field, field.default_value());
        }
        cfg
    }

    /// Read a field.
    pub fn get(&self, field: Field) -> u16 {
        match field {
            Field::P1Timeout => self.p1_timeout,
            Field::P2Timeout => self.p2_timeout,
            Field::ManualTimeout => self.manual_timeout,
            Field::HomeTimeout => self.home_timeout,
            Field::FeedDuration => self.feed_duration,
            Field::FeedsPerWeek => self.feeds_per_week,
            Field::HomeRetry => self.home_retry,
            Field::ConsolePin => self.console_pin,
        }
    }

    /// Update a field.
    pub fn set(&mut self, field: Field, value: u16) {
        match field {
            Field::P1Timeout => self.p1_timeout = value,
            Field::P2Timeout => self.p2_timeout = value,
            Field::ManualTimeout => self.manual_timeout = value,
            Field::HomeTimeout => self.home_timeout = value,
            Field::FeedDuration => self.feed_duration = value,
            Field::FeedsPerWeek => self.feeds_per_week = value,
            Field::HomeRetry => self.home_retry = value,
            Field::ConsolePin => self.console_pin = value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_are_contiguous_words() {
        for (i, field) in Field::ALL.iter().enumerate() {
            assert_eq!(field.offset(), (i as u16) * 2);
        }
    }

    #[test]
    fn get_set_round_trip() {
        let mut cfg = Config::compiled_defaults();
        for field in Field::ALL {
            cfg.set(field, 0x5a00 | field.offset());
            assert_eq!(cfg.get(field), 0x5a00 | field.offset());
        }
    }

    #[test]
    fn defaults_match_field_table() {
        let cfg = Config::compiled_defaults();
        assert_eq!(cfg.p1_timeout, 1250);
        assert_eq!(cfg.home_timeout, 4000);
        assert_eq!(cfg.feeds_per_week, 3);
        for field in Field::ALL {
            assert_eq!(cfg.get(field), field.default_value());
        }
    }
}
