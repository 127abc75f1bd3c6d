pub mod codec;
pub mod compression;

pub use compression::Compressor;
