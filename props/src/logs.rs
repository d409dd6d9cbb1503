// Every line carries the pid: the library is loaded by zygote and then lives
// on in each forked app, so one logcat interleaves many processes.

#[macro_export]
macro_rules! info {
    ($fmt: literal $( ,$args: expr )*) => {
        log::info!(concat!("[{}] ", $fmt), std::process::id(), $( $args ),*)
    };
}

#[macro_export]
macro_rules! debug {
    ($fmt: literal $( ,$args: expr )*) => {
        log::debug!(concat!("[{}] ", $fmt), std::process::id(), $( $args ),*)
    };
}

#[macro_export]
macro_rules! warn {
    ($fmt: literal $( ,$args: expr )*) => {
        log::warn!(concat!("[{}] ", $fmt), std::process::id(), $( $args ),*)
    };
}

#[macro_export]
macro_rules! error {
    ($fmt: literal $( ,$args: expr )*) => {
        log::error!(concat!("[{}] ", $fmt), std::process::id(), $( $args ),*)
    };
}
