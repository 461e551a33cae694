mod error;
mod helpers;
mod lifecycle;
#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod win32;
