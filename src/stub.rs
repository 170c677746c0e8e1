//! Stub files: provenance headers and on-disk layout.

pub mod header;
pub mod inventory;
pub mod layout;

pub use header::{read_header, write_stub, Header, HeaderFormat};
pub use inventory::{inventory, StubEntry};
pub use layout::{StubLayout, INIT_FILE_NAME, STUB_EXTENSION};
