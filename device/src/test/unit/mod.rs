mod buffer;
mod kernel;
mod registry;
