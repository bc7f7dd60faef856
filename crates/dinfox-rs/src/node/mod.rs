// crates/dinfox-rs/src/node/mod.rs
//! Board descriptors, node table and string data of the discovered nodes.

pub mod board;
pub mod bpsm;
pub mod common;
pub mod data;
pub mod lvrm;
pub mod manager;
pub mod r4s8cr;
pub mod registers;
pub mod table;
pub mod uhfm;

pub use board::{Board, Protocol, RegisterAccess, RegisterRead};
pub use data::{NodeData, StringDataSlot};
pub use manager::NodeManager;
pub use table::{Node, NodeTable};
