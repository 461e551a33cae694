mod error;
mod listen;
mod logger;
