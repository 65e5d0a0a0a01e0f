//! Diagnostic statements, routed through the `log` facade.
//!
//! `warn!` appends the source location like it always did; prefix the
//! name with `no` to compile a statement out without deleting it.

#[macro_export]
macro_rules! warn {
    ($formatstr:expr $(,$arg:expr)*) => {
        $crate::log::warn!("{} at {:?} line {}",
                           format_args!($formatstr $(,$arg)*),
                           file!(), line!())
    }
}

#[macro_export]
macro_rules! nowarn {
    ($formatstr:expr $(,$arg:expr)*) => {
    }
}

/// Like `warn!` but at debug level, for tracing what gets bound and
/// rendered.
#[macro_export]
macro_rules! dt {
    ($formatstr:expr $(,$arg:expr)*) => {
        $crate::log::debug!("{} at {:?} line {}",
                            format_args!($formatstr $(,$arg)*),
                            file!(), line!())
    }
}

#[macro_export]
macro_rules! nodt {
    ($formatstr:expr $(,$arg:expr)*) => {
    }
}
