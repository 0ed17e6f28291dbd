#[allow(unused)]
#[cfg(all(not(test), not(feature = "defmt"), not(feature = "test-utils")))]
mod noop {
    #[macro_export]
    macro_rules! debug {
        ($($arg:expr),*) => {{let _ = ($($arg),*);}};
    }

    #[macro_export]
    macro_rules! info {
        ($($arg:expr),*) => {{let _ = ($($arg),*);}};
    }

    #[macro_export]
    macro_rules! warn {
        ($($arg:expr),*) => {{let _ = ($($arg),*);}};
    }

    #[macro_export]
    macro_rules! error {
        ($($arg:expr),*) => {{let _ = ($($arg),*);}};
    }
}

#[cfg(all(not(test), not(feature = "test-utils"), feature = "defmt"))]
mod defmt_log {
    /// Log debug messages through [defmt::debug]. Only the `Debug` style
    /// format syntax may be used so the same call sites also work on the
    /// host during tests.
    #[macro_export]
    macro_rules! debug {
        ($($arg:expr),*) => {
            defmt::debug!($($arg,)*)
        };
    }

    #[macro_export]
    macro_rules! info {
        ($($arg:expr),*) => {
            defmt::info!($($arg,)*)
        };
    }

    #[macro_export]
    macro_rules! warn {
        ($($arg:expr),*) => {
            defmt::warn!($($arg,)*)
        };
    }

    #[macro_export]
    macro_rules! error {
        ($($arg:expr),*) => {
            defmt::error!($($arg,)*)
        };
    }
}

#[cfg(any(test, feature = "test-utils"))]
mod host {
    #[macro_export]
    macro_rules! debug {
        ($($arg:expr),*) => {{
            extern crate std;
            std::eprintln!("DEBUG: {}", format_args!($($arg,)*))
        }};
    }

    #[macro_export]
    macro_rules! info {
        ($($arg:expr),*) => {{
            extern crate std;
            std::eprintln!("INFO: {}", std::format!($($arg,)*))
        }};
    }

    #[macro_export]
    macro_rules! warn {
        ($($arg:expr),*) => {{
            extern crate std;
            std::eprintln!("WARN: {}", std::format!($($arg,)*))
        }};
    }

    #[macro_export]
    macro_rules! error {
        ($($arg:expr),*) => {{
            extern crate std;
            if cfg!(test) {
                panic!("{}", std::format!($($arg,)*));
            } else {
                std::eprintln!("ERROR: at ./{}:{}: {}", file!(), line!(), std::format!($($arg,)*));
            }
        }};
    }
}
