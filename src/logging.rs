//! Crate-internal logging macros.
//!
//! Embedded builds log through `defmt`. Host builds have no global defmt logger to link
//! against, so the macros only type-check their arguments there.

macro_rules! log_info {
    ($($arg:tt)*) => {{
        #[cfg(not(feature = "host"))]
        ::defmt::info!($($arg)*);

        #[cfg(feature = "host")]
        {
            let _ = ::core::format_args!($($arg)*);
        }
    }};
}

macro_rules! log_debug {
    ($($arg:tt)*) => {{
        #[cfg(not(feature = "host"))]
        ::defmt::debug!($($arg)*);

        #[cfg(feature = "host")]
        {
            let _ = ::core::format_args!($($arg)*);
        }
    }};
}

macro_rules! log_warn {
    ($($arg:tt)*) => {{
        #[cfg(not(feature = "host"))]
        ::defmt::warn!($($arg)*);

        #[cfg(feature = "host")]
        {
            let _ = ::core::format_args!($($arg)*);
        }
    }};
}

pub(crate) use log_debug;
pub(crate) use log_info;
pub(crate) use log_warn;
