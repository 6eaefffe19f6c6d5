pub mod access;
pub mod connectivity;
pub mod database;
pub mod dynamics;
pub mod elements;
pub mod fields;
pub mod lookup;
pub mod network;
pub mod powerflow;
pub mod search;
pub mod topology;
