//! Logging shims.
//!
//! Forwards to whichever backend is enabled through the `log`, `defmt` or
//! `esp32-log` features. With none of them enabled the macros only borrow
//! their arguments so call sites stay warning-free.
//!
//! Format strings must stay within the subset `defmt` understands: plain `{}`
//! and `{:?}` placeholders, no width or precision.
#![allow(unused_macros)]

macro_rules! log_event {
    ($level:ident, $prefix:literal, $s:literal $(, $x:expr)* $(,)?) => {
        {
            #[cfg(feature = "log")]
            ::log::$level!($s $(, $x)*);
            #[cfg(feature = "defmt")]
            ::defmt::$level!($s $(, $x)*);
            #[cfg(feature = "esp32-log")]
            ::esp_println::println!(concat!($prefix, $s) $(, $x)*);
            #[cfg(not(any(feature = "log", feature = "defmt", feature = "esp32-log")))]
            let _ = ($( & $x ),*);
        }
    };
}

macro_rules! trace {
    ($s:literal $(, $x:expr)* $(,)?) => {
        log_event!(trace, "TRACE mqtt: ", $s $(, $x)*)
    };
}

macro_rules! debug {
    ($s:literal $(, $x:expr)* $(,)?) => {
        log_event!(debug, "DEBUG mqtt: ", $s $(, $x)*)
    };
}

macro_rules! info {
    ($s:literal $(, $x:expr)* $(,)?) => {
        log_event!(info, "INFO mqtt: ", $s $(, $x)*)
    };
}

macro_rules! warn {
    ($s:literal $(, $x:expr)* $(,)?) => {
        log_event!(warn, "WARN mqtt: ", $s $(, $x)*)
    };
}

macro_rules! error {
    ($s:literal $(, $x:expr)* $(,)?) => {
        log_event!(error, "ERROR mqtt: ", $s $(, $x)*)
    };
}
