//! Infrastructure layer - protocol codecs and external I/O

pub mod ai;
pub mod directory;
pub mod media;
pub mod protocol;
pub mod telephony;
