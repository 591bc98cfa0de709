#![allow(dead_code)] // not every test binary uses every helper

pub mod mock_store;
