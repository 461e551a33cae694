mod class_table;
mod config;
mod dispatcher;
mod frame;
mod identity;
mod local_registrar;
mod protocol;
