mod endpoint;
mod server;
