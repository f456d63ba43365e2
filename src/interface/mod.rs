//! Interface layer - operational endpoints

pub mod api;
