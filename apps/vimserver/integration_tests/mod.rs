mod cli;
#[cfg(unix)]
mod send;
